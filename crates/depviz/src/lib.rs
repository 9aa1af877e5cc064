//! # Depviz: Python Import Dependency Graphs
//!
//! Depviz parses Python sources with tree-sitter, follows their imports
//! breadth-first from an entry file and lays the resulting graph out for
//! display: concentric shells by BFS level, refined by a spring/repulsion
//! simulation that supports dragging nodes around.
//!
//! ## Pipeline
//!
//! ```text
//! entry.py ─▶ ImportResolver ─▶ GraphBuilder (BFS) ─▶ DependencyTree + LevelMap
//!                                     │                        │
//!                                CacheStore (JSON)      shell_layout ─▶ Simulation
//! ```
//!
//! - **Import resolution** maps each imported name onto a project file, or
//!   classifies it as [`ModuleType::Builtin`]
//! - **Graph building** resolves every reachable file once, tolerating
//!   cycles and broken files
//! - **Caching** persists graphs per entry file, invalidated by content hash
//! - **Layout** places nodes on shells and simulates them at a fixed timestep
//!
//! ## Quick Start
//!
//! ```no_run
//! use depviz::graph::build_dependency_tree;
//! use depviz::layout::Simulation;
//! use depviz::Config;
//! use std::path::Path;
//!
//! let root = Path::new("/path/to/project");
//! let (tree, report) = build_dependency_tree(&root.join("main.py"), root)?;
//! println!("{} files, {} errors", tree.len(), report.errors.len());
//!
//! let config = Config::default();
//! let mut sim = Simulation::new(&tree, &config.layout, config.physics.clone());
//! for _ in 0..120 {
//!     sim.step();
//! }
//! for node in sim.positions().iter() {
//!     println!("{}: {:?}", node.path.display(), node.position);
//! }
//! # Ok::<(), depviz::Error>(())
//! ```

pub mod cache;
pub mod config;
mod error;
pub mod graph;
pub mod languages;
pub mod layout;
pub mod resolver;
pub mod service;
pub mod session;
pub mod state;
mod types;

pub use config::Config;
pub use error::{Error, FileError, FileErrorKind, Result};
pub use resolver::{ImportResolver, find_imports};
pub use types::{ImportInfo, ModuleType};

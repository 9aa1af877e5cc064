//! Layout engine: node placement for rendering.
//!
//! Two sources of positions:
//!
//! - [`shell_layout`]: deterministic concentric rings keyed by BFS level
//! - [`Simulation`]: spring/repulsion physics seeded from the shell layout,
//!   with drag interaction and reset
//!
//! Both hand out [`Layout`] snapshots; renderers never touch simulation
//! state directly.

mod physics;
mod shell;
mod vector;

pub use physics::{
    DRAGGED_VELOCITY_FACTOR, FOLLOWER_VELOCITY_FACTOR, NodeState, Simulation, VelocityUpdate,
    default_velocity, dragged_velocity, follower_velocity,
};
pub use shell::shell_layout;
pub use vector::Vec2;

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Position of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePosition {
    /// Canonical file path
    pub path: PathBuf,
    /// Scene coordinate
    pub position: Vec2,
}

/// Positions of every node, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Layout {
    entries: Vec<NodePosition>,
    #[serde(skip)]
    index: HashMap<PathBuf, usize>,
}

impl Layout {
    /// Create an empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the position of `path`, appending it if new.
    pub fn insert(&mut self, path: PathBuf, position: Vec2) {
        if let Some(&i) = self.index.get(&path) {
            self.entries[i].position = position;
            return;
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push(NodePosition { path, position });
    }

    /// Position of a node.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Vec2> {
        self.index.get(path).map(|&i| self.entries[i].position)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &NodePosition> {
        self.entries.iter()
    }

    /// Number of positioned nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the layout is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(PathBuf, Vec2)> for Layout {
    fn from_iter<I: IntoIterator<Item = (PathBuf, Vec2)>>(iter: I) -> Self {
        let mut layout = Self::new();
        for (path, position) in iter {
            layout.insert(path, position);
        }
        layout
    }
}

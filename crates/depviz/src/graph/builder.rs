//! Breadth-first construction of a [`DependencyTree`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    GraphBuilder::build                   │
//! ├──────────────────────────────────────────────────────────┤
//! │  validate entry + root, seed queue with (entry, 0)       │
//! │  loop per BFS wave (all queued files of one level):      │
//! │    Phase 1 (Parallel):   rayon map_init, one resolver    │
//! │                          per worker thread               │
//! │    Phase 2 (Sequential): link edges in queue order,      │
//! │                          record levels, enqueue children │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Resolution results of a wave are merged in queue order, so the resulting
//! tree is identical to a sequential build.
//!
//! A file's level is recorded the first time it is enqueued and a file is only
//! enqueued when it has no level yet. Files that fail to read or parse stay in
//! the tree as leaves; their errors are collected in the [`BuildReport`].

use rayon::prelude::*;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{DependencyTree, NodeId};
use crate::error::{Error, FileError, Result};
use crate::resolver::ImportResolver;
use crate::types::{ImportInfo, ModuleType};

type FileImports = std::result::Result<Vec<ImportInfo>, FileError>;

/// Limits and switches for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Files at this level are added as leaves without resolving their imports
    pub max_depth: Option<u32>,
    /// Stop resolving once this many files have been resolved
    pub max_files: Option<usize>,
    /// Abort with [`Error::TimedOut`] once exceeded
    pub timeout: Option<Duration>,
    /// Resolve each BFS wave on the rayon pool
    pub parallel: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_files: None,
            timeout: None,
            parallel: true,
        }
    }
}

impl BuildOptions {
    /// Set the depth limit.
    #[must_use]
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set the file limit.
    #[must_use]
    pub fn with_max_files(mut self, files: usize) -> Self {
        self.max_files = Some(files);
        self
    }

    /// Set the time budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve files one at a time on the calling thread.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Whether a depth or file limit can cut the graph short.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.max_depth.is_some() || self.max_files.is_some()
    }
}

/// Shared flag that asks a running build to stop.
///
/// Checked between BFS waves and before every file, so a cancelled build
/// returns [`Error::Cancelled`] after at most one file per worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Files whose imports were resolved successfully
    pub files_resolved: usize,
    /// Edges added to the tree
    pub edges: usize,
    /// Imports that did not map to a project file
    pub unresolved_imports: usize,
    /// Files that could not be read or parsed
    pub errors: Vec<FileError>,
    /// Whether a depth or file limit left some files unresolved
    pub truncated: bool,
    /// Wall-clock build time
    pub duration: Duration,
}

impl BuildReport {
    /// Whether every reached file was resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && !self.truncated
    }
}

/// Builds dependency trees for entry files of one project.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    project_root: PathBuf,
    options: BuildOptions,
    cancel: CancellationToken,
}

impl GraphBuilder {
    /// Create a builder for the project at `project_root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProjectRootNotFound`] if the root does not exist or is
    /// not a directory.
    pub fn new(project_root: &Path) -> Result<Self> {
        let project_root = canonical_root(project_root)?;
        Ok(Self {
            project_root,
            options: BuildOptions::default(),
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the build options.
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Canonical project root.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Options in effect for [`Self::build`].
    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the dependency tree rooted at `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if the entry cannot be opened,
    /// [`Error::Cancelled`] or [`Error::TimedOut`] when interrupted, and
    /// [`Error::Parser`] if the grammar cannot be loaded. Problems with any
    /// other file end up in the report instead.
    pub fn build(&self, entry: &Path) -> Result<(DependencyTree, BuildReport)> {
        let start = Instant::now();
        let entry = canonical_entry(entry)?;

        info!(
            entry = %entry.display(),
            root = %self.project_root.display(),
            parallel = self.options.parallel,
            "Building dependency graph"
        );

        let mut tree = DependencyTree::with_root(entry, self.project_root.clone());
        let mut report = BuildReport::default();
        let mut queue: VecDeque<(NodeId, u32)> = VecDeque::from([(tree.root_id(), 0)]);
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut sequential = if self.options.parallel {
            None
        } else {
            Some(ImportResolver::new(&self.project_root)?)
        };

        while let Some(&(_, level)) = queue.front() {
            self.check_interrupt(start)?;

            let mut wave = Vec::new();
            while let Some(&(id, queued_level)) = queue.front() {
                if queued_level != level {
                    break;
                }
                queue.pop_front();
                if !visited.insert(id) {
                    continue;
                }
                if self.options.max_depth.is_some_and(|max| level >= max) {
                    report.truncated = true;
                    continue;
                }
                if self
                    .options
                    .max_files
                    .is_some_and(|max| report.files_resolved + report.errors.len() + wave.len() >= max)
                {
                    report.truncated = true;
                    continue;
                }
                wave.push((id, tree.node(id).path().to_path_buf()));
            }

            let results = match sequential.as_mut() {
                Some(resolver) => self.resolve_sequential(resolver, &wave, start)?,
                None => self.resolve_parallel(&wave, start)?,
            };

            for (id, result) in results {
                match result {
                    Ok(imports) => {
                        report.files_resolved += 1;
                        link_imports(&mut tree, &mut queue, &mut report, id, level, imports);
                    }
                    Err(error) => {
                        warn!(error = %error, "Treating file as leaf");
                        report.errors.push(error);
                    }
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            nodes = tree.len(),
            edges = report.edges,
            errors = report.errors.len(),
            truncated = report.truncated,
            elapsed_ms = report.duration.as_millis(),
            "Dependency graph built"
        );

        Ok((tree, report))
    }

    fn check_interrupt(&self, start: Instant) -> Result<()> {
        if self.cancel.is_cancelled() {
            debug!("Build cancelled");
            return Err(Error::Cancelled);
        }
        if let Some(limit) = self.options.timeout {
            if start.elapsed() > limit {
                return Err(Error::TimedOut(limit));
            }
        }
        Ok(())
    }

    fn resolve_sequential(
        &self,
        resolver: &mut ImportResolver,
        wave: &[(NodeId, PathBuf)],
        start: Instant,
    ) -> Result<Vec<(NodeId, FileImports)>> {
        wave.iter()
            .map(|(id, path)| {
                self.check_interrupt(start)?;
                debug!(file = %path.display(), "Resolving imports");
                Ok((*id, resolver.find_imports(path)))
            })
            .collect()
    }

    fn resolve_parallel(
        &self,
        wave: &[(NodeId, PathBuf)],
        start: Instant,
    ) -> Result<Vec<(NodeId, FileImports)>> {
        wave.par_iter()
            .map_init(
                || ImportResolver::new(&self.project_root),
                |resolver, (id, path)| {
                    self.check_interrupt(start)?;
                    let resolver = resolver
                        .as_mut()
                        .map_err(|e| Error::Parser(e.to_string()))?;
                    debug!(file = %path.display(), "Resolving imports");
                    Ok((*id, resolver.find_imports(path)))
                },
            )
            .collect()
    }
}

/// Build the dependency tree of `entry` with default options.
///
/// # Errors
///
/// See [`GraphBuilder::new`] and [`GraphBuilder::build`].
pub fn build_dependency_tree(entry: &Path, project_root: &Path) -> Result<(DependencyTree, BuildReport)> {
    GraphBuilder::new(project_root)?.build(entry)
}

fn link_imports(
    tree: &mut DependencyTree,
    queue: &mut VecDeque<(NodeId, u32)>,
    report: &mut BuildReport,
    from: NodeId,
    level: u32,
    imports: Vec<ImportInfo>,
) {
    for import in imports {
        if import.module_type() != ModuleType::Local || !import.path().is_file() {
            report.unresolved_imports += 1;
            continue;
        }

        let target = std::fs::canonicalize(import.path())
            .unwrap_or_else(|_| import.path().to_path_buf());
        let (to, _) = tree.get_or_insert(target.clone());
        tree.add_edge(from, to, import);
        report.edges += 1;

        if tree.levels_mut().record_first(&target, level + 1) {
            queue.push_back((to, level + 1));
        }
    }
}

fn canonical_root(path: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(path).map_err(|source| Error::ProjectRootNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(Error::ProjectRootNotFound {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        });
    }
    Ok(canonical)
}

fn canonical_entry(path: &Path) -> Result<PathBuf> {
    let not_found = |source| Error::EntryNotFound {
        path: path.to_path_buf(),
        source,
    };
    let canonical = std::fs::canonicalize(path).map_err(not_found)?;
    if !canonical.is_file() {
        return Err(not_found(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    std::fs::File::open(&canonical).map_err(not_found)?;
    Ok(canonical)
}

//! Dependency graph data model.
//!
//! The authoritative structure is [`DependencyTree`]: a node map keyed by
//! canonical file path, holding one [`DependencyNode`] per distinct file plus
//! the BFS [`LevelMap`]. Everything else is derived from it:
//!
//! - [`DependencyGraph`] is a petgraph view with one edge per distinct
//!   importer/imported pair, used for cycle detection and set comparisons
//! - layouts read node order and levels straight from the tree
//!
//! Nodes are stored in discovery order, which is what makes the shell layout
//! and the cache document deterministic.

mod builder;
mod view;

pub use builder::{BuildOptions, BuildReport, CancellationToken, GraphBuilder, build_dependency_tree};
pub use view::{Cycle, DependencyGraph};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::types::ImportInfo;

/// Index of a node inside its [`DependencyTree`].
///
/// Only meaningful for the tree that handed it out. Persisted data refers to
/// nodes by path instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in discovery order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One edge endpoint together with the import that created it.
///
/// In `dependencies` the node is the imported file; in `dependents` it is the
/// importing file. The same `ImportInfo` appears on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The other end of the edge
    pub node: NodeId,
    /// Import statement metadata
    pub import: ImportInfo,
}

/// A source file in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    name: String,
    path: PathBuf,
    dependencies: Vec<Edge>,
    dependents: Vec<Edge>,
}

impl DependencyNode {
    fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            name,
            path,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        }
    }

    /// File name without directories.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical path; the node's identity.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Outgoing edges in import order.
    #[must_use]
    pub fn dependencies(&self) -> &[Edge] {
        &self.dependencies
    }

    /// Incoming edges in the order they were discovered.
    #[must_use]
    pub fn dependents(&self) -> &[Edge] {
        &self.dependents
    }
}

/// BFS distance of every node from the root file.
///
/// The root has level 0. A level is recorded once, the first time a file is
/// reached, which under BFS is its shortest hop distance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelMap {
    levels: HashMap<PathBuf, u32>,
}

impl LevelMap {
    /// Create an empty level map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Level of a file, if it was reached.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<u32> {
        self.levels.get(path).copied()
    }

    /// Record `level` for `path` unless one is already recorded.
    ///
    /// Returns `true` when the level was newly recorded.
    pub fn record_first(&mut self, path: &Path, level: u32) -> bool {
        if self.levels.contains_key(path) {
            return false;
        }
        self.levels.insert(path.to_path_buf(), level);
        true
    }

    /// Number of files with a level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether no level has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Highest recorded level.
    #[must_use]
    pub fn max_level(&self) -> Option<u32> {
        self.levels.values().copied().max()
    }

    /// Iterate over `(path, level)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, u32)> {
        self.levels.iter().map(|(p, l)| (p.as_path(), *l))
    }
}

impl FromIterator<(PathBuf, u32)> for LevelMap {
    fn from_iter<I: IntoIterator<Item = (PathBuf, u32)>>(iter: I) -> Self {
        Self {
            levels: iter.into_iter().collect(),
        }
    }
}

/// The node map built for one entry file.
///
/// Mutated only while the builder (or the cache loader) appends nodes and
/// edges; read-only once handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTree {
    project_root: PathBuf,
    root: NodeId,
    nodes: Vec<DependencyNode>,
    index: HashMap<PathBuf, NodeId>,
    levels: LevelMap,
}

impl DependencyTree {
    /// Start a tree containing only the entry file at level 0.
    pub(crate) fn with_root(entry: PathBuf, project_root: PathBuf) -> Self {
        let mut tree = Self {
            project_root,
            root: NodeId(0),
            nodes: Vec::new(),
            index: HashMap::new(),
            levels: LevelMap::new(),
        };
        let (root, _) = tree.get_or_insert(entry.clone());
        tree.root = root;
        tree.levels.record_first(&entry, 0);
        tree
    }

    /// Look up a node by path, creating it if this is the first sighting.
    ///
    /// Returns the node and whether it was created.
    pub(crate) fn get_or_insert(&mut self, path: PathBuf) -> (NodeId, bool) {
        if let Some(id) = self.index.get(&path) {
            return (*id, false);
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(path.clone(), id);
        self.nodes.push(DependencyNode::new(path));
        (id, true)
    }

    /// Append an edge `from -> to` on both endpoints.
    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId, import: ImportInfo) {
        self.nodes[to.0].dependents.push(Edge {
            node: from,
            import: import.clone(),
        });
        self.nodes[from.0].dependencies.push(Edge { node: to, import });
    }

    pub(crate) fn levels_mut(&mut self) -> &mut LevelMap {
        &mut self.levels
    }

    /// Directory absolute imports were resolved against.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The entry file's node.
    #[must_use]
    pub fn root(&self) -> &DependencyNode {
        &self.nodes[self.root.0]
    }

    /// Id of the entry file's node.
    #[must_use]
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different tree and is out of range.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    /// Node by canonical path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&DependencyNode> {
        self.id_of(path).map(|id| self.node(id))
    }

    /// Id of the node with the given canonical path.
    #[must_use]
    pub fn id_of(&self, path: &Path) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DependencyNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Number of distinct files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree holds at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of import edges, counting repeated imports separately.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.dependencies.len()).sum()
    }

    /// BFS levels of every node.
    #[must_use]
    pub fn levels(&self) -> &LevelMap {
        &self.levels
    }

    /// Level of one node.
    #[must_use]
    pub fn level_of(&self, id: NodeId) -> Option<u32> {
        self.levels.get(self.node(id).path())
    }

    /// Derive the petgraph view of this tree.
    #[must_use]
    pub fn to_graph(&self) -> DependencyGraph {
        DependencyGraph::from_tree(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import_of(path: &str) -> ImportInfo {
        ImportInfo::local(
            "mod",
            PathBuf::from(path),
            Path::new("/p"),
            1,
            false,
            None,
        )
    }

    #[test]
    fn root_starts_at_level_zero() {
        let tree = DependencyTree::with_root(PathBuf::from("/p/main.py"), PathBuf::from("/p"));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root().name(), "main.py");
        assert_eq!(tree.levels().get(Path::new("/p/main.py")), Some(0));
    }

    #[test]
    fn get_or_insert_never_duplicates() {
        let mut tree = DependencyTree::with_root(PathBuf::from("/p/main.py"), PathBuf::from("/p"));

        let (a, created_a) = tree.get_or_insert(PathBuf::from("/p/a.py"));
        let (again, created_again) = tree.get_or_insert(PathBuf::from("/p/a.py"));

        assert!(created_a);
        assert!(!created_again);
        assert_eq!(a, again);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn add_edge_is_symmetric() {
        let mut tree = DependencyTree::with_root(PathBuf::from("/p/main.py"), PathBuf::from("/p"));
        let (a, _) = tree.get_or_insert(PathBuf::from("/p/a.py"));

        tree.add_edge(tree.root_id(), a, import_of("/p/a.py"));

        assert_eq!(tree.root().dependencies()[0].node, a);
        assert_eq!(tree.node(a).dependents()[0].node, tree.root_id());
        assert_eq!(tree.edge_count(), 1);
    }

    #[test]
    fn record_first_keeps_earliest_level() {
        let mut levels = LevelMap::new();

        assert!(levels.record_first(Path::new("a.py"), 1));
        assert!(!levels.record_first(Path::new("a.py"), 3));
        assert_eq!(levels.get(Path::new("a.py")), Some(1));
    }
}

//! Petgraph view of a dependency tree.
//!
//! | Operation | Algorithm |
//! |-----------|-----------|
//! | Cycle detection | Tarjan's SCC algorithm |
//! | Neighbour lookup | incoming + outgoing edges |
//! | Isomorphism checks | vertex and edge sets keyed by path |

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::DependencyTree;

/// A set of files that import each other, directly or transitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Files in the cycle, in discovery order
    pub files: Vec<PathBuf>,
}

/// Directed graph of files, one edge per distinct importer/imported pair.
///
/// Derived from a [`DependencyTree`]; the tree stays the source of truth.
/// Node indices follow the tree's discovery order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<PathBuf, ()>,
    index: HashMap<PathBuf, NodeIndex>,
}

impl DependencyGraph {
    /// Build the view from a tree.
    #[must_use]
    pub fn from_tree(tree: &DependencyTree) -> Self {
        let mut graph = DiGraph::with_capacity(tree.len(), tree.edge_count());
        let mut index = HashMap::with_capacity(tree.len());

        for (_, node) in tree.nodes() {
            let idx = graph.add_node(node.path().to_path_buf());
            index.insert(node.path().to_path_buf(), idx);
        }

        for (id, node) in tree.nodes() {
            let from = NodeIndex::new(id.index());
            for edge in node.dependencies() {
                // Repeated imports of the same file collapse into one edge
                graph.update_edge(from, NodeIndex::new(edge.node.index()), ());
            }
        }

        Self { graph, index }
    }

    /// Number of files.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct import relationships.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the file is part of the graph.
    #[must_use]
    pub fn contains_node(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    /// Whether `from` imports `to`.
    #[must_use]
    pub fn contains_edge(&self, from: &Path, to: &Path) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(*a, *b),
            _ => false,
        }
    }

    /// Files in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &Path> {
        self.graph.node_weights().map(PathBuf::as_path)
    }

    /// `(importer, imported)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.graph.edge_references().map(|e| {
            (
                self.graph[e.source()].as_path(),
                self.graph[e.target()].as_path(),
            )
        })
    }

    /// All files, ordered by path.
    #[must_use]
    pub fn vertex_set(&self) -> BTreeSet<PathBuf> {
        self.graph.node_weights().cloned().collect()
    }

    /// All edges, ordered by path.
    #[must_use]
    pub fn edge_set(&self) -> BTreeSet<(PathBuf, PathBuf)> {
        self.edges()
            .map(|(a, b)| (a.to_path_buf(), b.to_path_buf()))
            .collect()
    }

    /// Files that import `path` or are imported by it, without duplicates.
    #[must_use]
    pub fn neighbors(&self, path: &Path) -> Vec<&Path> {
        let Some(&idx) = self.index.get(path) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        let both = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .chain(self.graph.neighbors_directed(idx, Direction::Incoming));
        for other in both {
            if other != idx && seen.insert(other) {
                result.push(self.graph[other].as_path());
            }
        }
        result
    }

    /// Circular imports, including files that import themselves.
    ///
    /// Cycles are ordered by the discovery position of their first file.
    #[must_use]
    pub fn cycles(&self) -> Vec<Cycle> {
        let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.first().is_some_and(|n| self.graph.contains_edge(*n, *n))
            })
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .collect();
        components.sort();

        components
            .into_iter()
            .map(|scc| Cycle {
                files: scc.into_iter().map(|n| self.graph[n].clone()).collect(),
            })
            .collect()
    }

    /// The underlying petgraph graph.
    #[must_use]
    pub fn inner(&self) -> &DiGraph<PathBuf, ()> {
        &self.graph
    }
}

//! JSON persistence cache for dependency graphs.
//!
//! One document per analysis context (project root + entry file):
//!
//! ```text
//! <base>/contexts/<sha256(root, entry)[..16]>/dependency_graph.json
//! ```
//!
//! ## Document layout
//!
//! ```json
//! {
//!   "version": 1,
//!   "data": {
//!     "nodes": ["/abs/main.py", "/abs/utils.py"],
//!     "edges": [{"source": "/abs/main.py", "target": "/abs/utils.py",
//!                "name": "utils", "line": 3, "conditional": false}]
//!   },
//!   "levels": {"/abs/main.py": 0, "/abs/utils.py": 1},
//!   "meta": {"entry": "...", "project_root": "...", "created_at": "...",
//!            "fingerprints": {"/abs/main.py": "<sha256 hex>"}}
//! }
//! ```
//!
//! Nodes are listed in discovery order, so a loaded tree lays out exactly
//! like a fresh one. Only `source` and `target` are required on edges.
//!
//! ## Invalidation
//!
//! A document is used only if its entry and root match the request and every
//! recorded file still hashes to its fingerprint. Anything else is stale and
//! triggers a rebuild that overwrites the document. A new file that would
//! satisfy a previously unresolved import is not noticed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::app_support_dir;
use crate::error::{Error, Result};
use crate::graph::{BuildReport, DependencyTree, GraphBuilder};
use crate::types::ImportInfo;

/// Current document format version
pub const CACHE_VERSION: u32 = 1;

/// File name of a cache document
pub const CACHE_FILE_NAME: &str = "dependency_graph.json";

/// Directory under the cache base holding one directory per context
pub const CONTEXTS_DIR_NAME: &str = "contexts";

/// Serialized form of a dependency tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDocument {
    /// Format version
    pub version: u32,
    /// Node-link graph
    pub data: NodeLinkData,
    /// BFS level per node
    pub levels: BTreeMap<PathBuf, u32>,
    /// Provenance; documents without it are always stale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CacheMeta>,
}

/// Nodes and directed edges by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLinkData {
    /// Node paths in discovery order
    pub nodes: Vec<PathBuf>,
    /// One entry per import edge
    pub edges: Vec<CachedEdge>,
}

/// One import edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEdge {
    /// Importing file
    pub source: PathBuf,
    /// Imported file
    pub target: PathBuf,
    /// Imported name
    #[serde(default)]
    pub name: String,
    /// Source line of the import
    #[serde(default)]
    pub line: u32,
    /// Whether the import is inside an `if` branch
    #[serde(default)]
    pub conditional: bool,
    /// Rebind name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Provenance of a cache document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Canonical entry file
    pub entry: PathBuf,
    /// Canonical project root
    pub project_root: PathBuf,
    /// When the document was written
    pub created_at: DateTime<Utc>,
    /// SHA-256 of every node file at build time
    pub fingerprints: BTreeMap<PathBuf, String>,
}

impl CacheDocument {
    /// Serialize a tree with the given file fingerprints.
    #[must_use]
    pub fn from_tree(tree: &DependencyTree, fingerprints: BTreeMap<PathBuf, String>) -> Self {
        let nodes = tree.nodes().map(|(_, n)| n.path().to_path_buf()).collect();

        let edges = tree
            .nodes()
            .flat_map(|(_, node)| {
                node.dependencies().iter().map(move |edge| CachedEdge {
                    source: node.path().to_path_buf(),
                    target: tree.node(edge.node).path().to_path_buf(),
                    name: edge.import.name().to_string(),
                    line: edge.import.import_line(),
                    conditional: edge.import.is_conditional(),
                    alias: edge.import.alias().map(str::to_string),
                })
            })
            .collect();

        let levels = tree
            .levels()
            .iter()
            .map(|(path, level)| (path.to_path_buf(), level))
            .collect();

        Self {
            version: CACHE_VERSION,
            data: NodeLinkData { nodes, edges },
            levels,
            meta: Some(CacheMeta {
                entry: tree.root().path().to_path_buf(),
                project_root: tree.project_root().to_path_buf(),
                created_at: Utc::now(),
                fingerprints,
            }),
        }
    }

    /// Rebuild the tree this document describes.
    ///
    /// Node identity is re-established by path. Imports are rebuilt as local
    /// imports of their target file.
    ///
    /// # Errors
    ///
    /// Returns a description of the first inconsistency: no nodes, an edge
    /// to an unknown node, a node the root cannot reach, or a level that is
    /// not the node's shortest import distance from the root.
    pub fn into_tree(self) -> std::result::Result<DependencyTree, String> {
        let mut nodes = self.data.nodes.into_iter();
        let root = nodes.next().ok_or("document has no nodes")?;
        let project_root = match self.meta {
            Some(meta) => meta.project_root,
            None => root.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        let mut tree = DependencyTree::with_root(root, project_root.clone());
        for path in nodes {
            tree.get_or_insert(path);
        }

        for edge in self.data.edges {
            let from = tree
                .id_of(&edge.source)
                .ok_or_else(|| format!("edge source {} is not a node", edge.source.display()))?;
            let to = tree
                .id_of(&edge.target)
                .ok_or_else(|| format!("edge target {} is not a node", edge.target.display()))?;
            let import = ImportInfo::local(
                edge.name,
                edge.target,
                &project_root,
                edge.line,
                edge.conditional,
                edge.alias,
            );
            tree.add_edge(from, to, import);
        }

        // Levels must be exactly the BFS distances the edges imply
        let distances = import_distances(&tree);
        let mut levels = Vec::with_capacity(tree.len());
        for (id, node) in tree.nodes() {
            let path = node.path();
            let Some(expected) = distances[id.index()] else {
                return Err(format!("node {} is not reachable from the root", path.display()));
            };
            match self.levels.get(path) {
                Some(&level) if level == expected => levels.push((path.to_path_buf(), level)),
                Some(&level) => {
                    return Err(format!(
                        "node {} has level {level}, expected {expected}",
                        path.display()
                    ));
                }
                None => return Err(format!("node {} has no level", path.display())),
            }
        }
        if self.levels.len() != levels.len() {
            return Err("levels list files that are not nodes".to_string());
        }

        for (path, level) in levels {
            tree.levels_mut().record_first(&path, level);
        }
        Ok(tree)
    }
}

/// Shortest import distance of every node from the root, by node index.
fn import_distances(tree: &DependencyTree) -> Vec<Option<u32>> {
    let mut distances = vec![None; tree.len()];
    let root = tree.root_id();
    distances[root.index()] = Some(0);
    let mut queue = VecDeque::from([(root, 0u32)]);

    while let Some((id, level)) = queue.pop_front() {
        for edge in tree.node(id).dependencies() {
            let slot = &mut distances[edge.node.index()];
            if slot.is_none() {
                *slot = Some(level + 1);
                queue.push_back((edge.node, level + 1));
            }
        }
    }
    distances
}

/// Where a loaded tree came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphSource {
    /// Read from a valid cache document
    Cache,
    /// Built by the graph builder
    Fresh,
}

impl std::fmt::Display for GraphSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Fresh => write!(f, "fresh build"),
        }
    }
}

/// Result of [`load_or_build`].
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// The dependency tree
    pub tree: DependencyTree,
    /// Whether it was loaded or built
    pub source: GraphSource,
    /// Build report; `None` for cache hits
    pub report: Option<BuildReport>,
}

/// Result of looking up a cache document.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// A valid document was found
    Hit(DependencyTree),
    /// No document exists for this context
    Missing,
    /// A document exists but no longer matches the sources
    Stale(String),
}

/// Reads and writes cache documents below one base directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    base: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Create a store in the application-support directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the platform has no such directory.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(app_support_dir()?))
    }

    /// Directory holding all context directories.
    #[must_use]
    pub fn contexts_dir(&self) -> PathBuf {
        self.base.join(CONTEXTS_DIR_NAME)
    }

    /// Document path for an entry file and project root.
    ///
    /// Paths are canonicalized when possible so that different spellings of
    /// the same context share a document.
    #[must_use]
    pub fn path_for(&self, entry: &Path, project_root: &Path) -> PathBuf {
        let entry = std::fs::canonicalize(entry).unwrap_or_else(|_| entry.to_path_buf());
        let root = std::fs::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());

        let mut hasher = Sha256::new();
        hasher.update(root.as_os_str().as_encoded_bytes());
        hasher.update(b"\0");
        hasher.update(entry.as_os_str().as_encoded_bytes());
        let digest = format!("{:x}", hasher.finalize());

        self.contexts_dir().join(&digest[..16]).join(CACHE_FILE_NAME)
    }

    /// Look up the document for a context and validate it against the
    /// current sources.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheCorrupt`] if the document cannot be parsed or is
    /// internally inconsistent, and [`Error::Io`] if it cannot be read.
    pub fn load(&self, entry: &Path, project_root: &Path) -> Result<CacheLookup> {
        let path = self.path_for(entry, project_root);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheLookup::Missing),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| Error::CacheCorrupt {
            path: path.clone(),
            reason,
        };

        let document: CacheDocument =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if document.version != CACHE_VERSION {
            return Ok(CacheLookup::Stale(format!(
                "format version {} (expected {CACHE_VERSION})",
                document.version
            )));
        }

        let entry = std::fs::canonicalize(entry).unwrap_or_else(|_| entry.to_path_buf());
        let root = std::fs::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());
        if let Some(reason) = staleness(&document, &entry, &root) {
            return Ok(CacheLookup::Stale(reason));
        }

        let tree = document.into_tree().map_err(corrupt)?;
        debug!(path = %path.display(), nodes = tree.len(), "Cache hit");
        Ok(CacheLookup::Hit(tree))
    }

    /// Write the document for a tree, replacing any previous one.
    ///
    /// The write goes to a temporary file first, then renames it into place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a node file cannot be hashed or the document
    /// cannot be written.
    pub fn store(&self, tree: &DependencyTree) -> Result<PathBuf> {
        let fingerprints = tree
            .nodes()
            .map(|(_, node)| Ok((node.path().to_path_buf(), fingerprint(node.path())?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let document = CacheDocument::from_tree(tree, fingerprints);
        let path = self.path_for(tree.root().path(), tree.project_root());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&document)?;
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &path)?;

        info!(path = %path.display(), nodes = tree.len(), "Cache written");
        Ok(path)
    }

    /// Delete every cached document. Returns the number of contexts removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be removed.
    pub fn clear(&self) -> Result<usize> {
        let dir = self.contexts_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let count = entries.filter_map(std::result::Result::ok).count();
        std::fs::remove_dir_all(&dir)?;
        info!(dir = %dir.display(), contexts = count, "Cache cleared");
        Ok(count)
    }
}

/// SHA-256 of a file's contents as lowercase hex.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be read.
pub fn fingerprint(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

fn staleness(document: &CacheDocument, entry: &Path, root: &Path) -> Option<String> {
    let Some(meta) = &document.meta else {
        return Some("document has no provenance".to_string());
    };
    if meta.entry != entry {
        return Some(format!("entry changed from {}", meta.entry.display()));
    }
    if meta.project_root != root {
        return Some(format!("project root changed from {}", meta.project_root.display()));
    }

    for node in &document.data.nodes {
        let Some(expected) = meta.fingerprints.get(node) else {
            return Some(format!("{} has no fingerprint", node.display()));
        };
        match fingerprint(node) {
            Ok(actual) if actual == *expected => {}
            Ok(_) => return Some(format!("{} changed", node.display())),
            Err(e) => return Some(format!("{} unreadable: {e}", node.display())),
        }
    }
    None
}

/// Load the tree for `entry` from the cache, or build and cache it.
///
/// Stale and corrupt documents are rebuilt and overwritten. Failing to write
/// the cache is logged and otherwise ignored. Pass `None` to always build.
///
/// A builder with a depth or file limit bypasses the cache in both
/// directions, and a truncated tree is never written.
///
/// # Errors
///
/// Returns whatever [`GraphBuilder::build`] returns for a fresh build.
pub fn load_or_build(
    store: Option<&CacheStore>,
    builder: &GraphBuilder,
    entry: &Path,
) -> Result<LoadOutcome> {
    let store = match store {
        Some(_) if builder.options().is_bounded() => {
            debug!(entry = %entry.display(), "Limited build, bypassing cache");
            None
        }
        store => store,
    };

    if let Some(store) = store {
        match store.load(entry, builder.project_root()) {
            Ok(CacheLookup::Hit(tree)) => {
                info!(entry = %entry.display(), nodes = tree.len(), "Loaded graph from cache");
                return Ok(LoadOutcome {
                    tree,
                    source: GraphSource::Cache,
                    report: None,
                });
            }
            Ok(CacheLookup::Missing) => debug!(entry = %entry.display(), "No cached graph"),
            Ok(CacheLookup::Stale(reason)) => {
                info!(entry = %entry.display(), reason = %reason, "Cached graph is stale");
            }
            Err(e) => warn!(error = %e, "Ignoring unusable cache"),
        }
    }

    let (tree, report) = builder.build(entry)?;

    match store {
        Some(_) if report.truncated => {
            debug!(entry = %entry.display(), "Truncated graph not cached");
        }
        Some(store) => {
            if let Err(e) = store.store(&tree) {
                warn!(error = %e, "Failed to write graph cache");
            }
        }
        None => {}
    }

    Ok(LoadOutcome {
        tree,
        source: GraphSource::Fresh,
        report: Some(report),
    })
}

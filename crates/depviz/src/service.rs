//! Asynchronous graph builds.
//!
//! [`BuildService::request`] starts a build on the blocking thread pool and
//! returns immediately with a generation number. Exactly one [`BuildEvent`]
//! arrives on the event channel for every request that is not superseded:
//!
//! ```text
//! request(A) ─▶ gen 1 ─▶ build A ──────────────▶ (discarded)
//! request(B) ─▶ gen 2 ─▶ cancels gen 1's token
//!                        build B ──────────────▶ Ready { generation: 2 }
//! ```
//!
//! A newer request cancels the previous build's token, and any result of an
//! older generation that still completes is dropped instead of being sent.
//! Consumers can additionally compare `generation` against
//! [`BuildService::latest_generation`].

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, GraphSource, LoadOutcome, load_or_build};
use crate::error::{Error, Result};
use crate::graph::{BuildOptions, BuildReport, CancellationToken, DependencyGraph, DependencyTree, GraphBuilder};

/// A finished build.
#[derive(Debug, Clone)]
pub struct GraphReady {
    /// Generation of the request this answers
    pub generation: u64,
    /// The dependency tree, root node and level map
    pub tree: Arc<DependencyTree>,
    /// Petgraph view of the tree
    pub graph: Arc<DependencyGraph>,
    /// Whether the tree came from the cache
    pub source: GraphSource,
    /// Build report; `None` for cache hits
    pub report: Option<BuildReport>,
}

/// Completion message of a build request.
#[derive(Debug)]
pub enum BuildEvent {
    /// The build succeeded
    Ready(GraphReady),
    /// The build failed; no partial graph is produced
    Failed {
        /// Generation of the failed request
        generation: u64,
        /// Why it failed
        error: Error,
    },
}

impl BuildEvent {
    /// Generation of the request this event answers.
    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::Ready(ready) => ready.generation,
            Self::Failed { generation, .. } => *generation,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

impl Shared {
    fn swap_token(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, token)
    }
}

/// Runs graph builds off the caller's thread.
#[derive(Debug, Clone)]
pub struct BuildService {
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<BuildEvent>,
    options: BuildOptions,
    cache: Option<CacheStore>,
}

impl BuildService {
    /// Create a service with default options and no cache.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BuildEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let service = Self {
            shared: Arc::new(Shared::default()),
            events,
            options: BuildOptions::default(),
            cache: None,
        };
        (service, receiver)
    }

    /// Use these options for subsequent builds.
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Read and write graphs through this cache.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Generation of the most recent request, 0 before the first one.
    #[must_use]
    pub fn latest_generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Start building the graph of `entry` under `project_root`.
    ///
    /// Supersedes any build still in flight. Returns the new generation.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn request(&self, entry: &Path, project_root: &Path) -> u64 {
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let token = CancellationToken::new();
        if let Some(previous) = self.shared.swap_token(Some(token.clone())) {
            debug!(generation, "Cancelling superseded build");
            previous.cancel();
        }

        info!(
            generation,
            entry = %entry.display(),
            root = %project_root.display(),
            "Build requested"
        );

        let entry = entry.to_path_buf();
        let project_root = project_root.to_path_buf();
        let options = self.options.clone();
        let cache = self.cache.clone();
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();

        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || {
                run_build(&entry, &project_root, options, token, cache.as_ref())
            })
            .await
            .map_err(|e| Error::Task(e.to_string()))
            .and_then(|result| result);

            if shared.generation.load(Ordering::Acquire) != generation {
                debug!(generation, "Discarding result of superseded build");
                return;
            }

            let event = match outcome {
                Ok(outcome) => {
                    let graph = Arc::new(outcome.tree.to_graph());
                    BuildEvent::Ready(GraphReady {
                        generation,
                        tree: Arc::new(outcome.tree),
                        graph,
                        source: outcome.source,
                        report: outcome.report,
                    })
                }
                Err(error) => {
                    warn!(generation, error = %error, "Build failed");
                    BuildEvent::Failed { generation, error }
                }
            };

            if events.send(event).is_err() {
                debug!(generation, "Build event receiver dropped");
            }
        });

        generation
    }

    /// Cancel the build in flight, if any.
    ///
    /// The request still completes with a `Failed` event carrying
    /// [`Error::Cancelled`] unless a newer request supersedes it first.
    pub fn cancel(&self) {
        if let Some(token) = self.shared.swap_token(None) {
            token.cancel();
        }
    }
}

fn run_build(
    entry: &Path,
    project_root: &Path,
    options: BuildOptions,
    token: CancellationToken,
    cache: Option<&CacheStore>,
) -> Result<LoadOutcome> {
    let builder = GraphBuilder::new(project_root)?
        .with_options(options)
        .with_cancellation(token);
    load_or_build(cache, &builder, entry)
}

//! CLI command implementations.

mod display;

pub mod analyze;
pub mod cache;
pub mod cycles;
pub mod imports;
pub mod layout;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use depviz::cache::CacheStore;
use depviz::config::{CONFIG_FILE_NAME, app_support_dir};
use depviz::service::{BuildEvent, BuildService, GraphReady};
use depviz::state::SessionState;
use depviz::Config;

/// Settings and remembered state shared by all commands.
pub struct Context {
    pub config: Config,
    pub support_dir: PathBuf,
    pub state: SessionState,
}

impl Context {
    /// Load configuration and session state.
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let support_dir = app_support_dir()?;
        let config = match config_path {
            Some(path) => Config::load(path)
                .await
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => Config::load_or_default(&support_dir)
                .await
                .with_context(|| format!("failed to load {CONFIG_FILE_NAME}"))?,
        };
        let state = match SessionState::load(&support_dir).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable session state");
                SessionState::default()
            }
        };

        Ok(Self {
            config,
            support_dir,
            state,
        })
    }

    /// Project root for `entry`: the explicit argument, else the remembered
    /// root if it contains the entry, else the entry's directory.
    pub fn project_root(&self, entry: &Path, explicit: Option<PathBuf>) -> PathBuf {
        if let Some(root) = explicit {
            return root;
        }

        let entry = std::fs::canonicalize(entry).unwrap_or_else(|_| entry.to_path_buf());
        if let Some(remembered) = &self.state.project_root {
            if entry.starts_with(remembered) {
                return remembered.clone();
            }
        }

        entry
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    /// Cache store per configuration, or `None` when disabled.
    pub fn cache_store(&self, no_cache: bool) -> Result<Option<CacheStore>> {
        if no_cache || !self.config.cache.enabled {
            return Ok(None);
        }
        Ok(Some(CacheStore::new(self.config.cache_base()?)))
    }

    /// Persist the selection so later runs default to it.
    pub async fn remember(&mut self, entry: &Path, root: &Path) {
        let entry = std::fs::canonicalize(entry).unwrap_or_else(|_| entry.to_path_buf());
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        self.state.remember(&entry, &root);
        if let Err(e) = self.state.save(&self.support_dir).await {
            tracing::warn!(error = %e, "Failed to save session state");
        }
    }
}

/// Build or load the graph of `entry` through the build service.
pub async fn load_graph(
    ctx: &mut Context,
    entry: &Path,
    root: Option<PathBuf>,
    no_cache: bool,
) -> Result<GraphReady> {
    let root = ctx.project_root(entry, root);

    let (service, mut events) = BuildService::new();
    let mut service = service.with_options(ctx.config.build.to_options());
    if let Some(store) = ctx.cache_store(no_cache)? {
        service = service.with_cache(store);
    }

    let generation = service.request(entry, &root);
    while let Some(event) = events.recv().await {
        if event.generation() != generation {
            continue;
        }
        return match event {
            BuildEvent::Ready(ready) => {
                ctx.remember(entry, &root).await;
                Ok(ready)
            }
            BuildEvent::Failed { error, .. } => {
                Err(error).with_context(|| format!("failed to analyze {}", entry.display()))
            }
        };
    }
    bail!("build service stopped without a result")
}

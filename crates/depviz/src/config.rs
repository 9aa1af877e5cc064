//! Configuration management for depviz.
//!
//! Configuration is a YAML file (`config.yaml`) in the application-support
//! directory. Every field has a default, so a partial file (or none at all)
//! is valid.
//!
//! ```yaml
//! layout:
//!   scale: 100.0
//! physics:
//!   stiffness: 20.0
//!   rest_length_from_layout: true
//! build:
//!   timeout_secs: 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::{Error, Result};
use crate::graph::BuildOptions;

/// Name of the application-support directory
pub const APP_DIR_NAME: &str = "depviz";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Per-user application-support directory (`<config dir>/depviz`).
///
/// # Errors
///
/// Returns [`Error::Config`] on platforms without a configuration directory.
pub fn app_support_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| Error::Config("no configuration directory on this platform".to_string()))
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Shell layout settings
    pub layout: LayoutConfig,
    /// Spring/repulsion simulation settings
    pub physics: PhysicsConfig,
    /// Graph build limits
    pub build: BuildConfig,
    /// Persistence cache settings
    pub cache: CacheConfig,
    /// Interactive session settings
    pub session: SessionConfig,
}

/// Shell layout section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Radius step between consecutive shells
    pub scale: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { scale: 100.0 }
    }
}

/// Physics section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Fixed integration step in seconds
    pub timestep: f64,
    /// Fraction of velocity kept per second
    pub space_damping: f64,
    /// Hit radius of a node for pointer selection
    pub node_radius: f64,
    /// Spring rest length
    pub rest_length: f64,
    /// Use each edge's initial shell-layout distance as its rest length
    pub rest_length_from_layout: bool,
    /// Spring stiffness
    pub stiffness: f64,
    /// Spring damping along the spring axis
    pub spring_damping: f64,
    /// Pairwise repulsion strength (force at distance d is `repulsion / d²`)
    pub repulsion: f64,
    /// Distance floor for repulsion
    pub min_distance: f64,
    /// Upper bound on the force applied to one body per step
    pub max_force: f64,
    /// Mass of every body
    pub mass: f64,
    /// Speed below which a released node counts as at rest
    pub rest_speed: f64,
    /// Most steps `advance` runs for one call before dropping the backlog
    pub max_substeps: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            space_damping: 0.8,
            node_radius: 20.0,
            rest_length: 100.0,
            rest_length_from_layout: false,
            stiffness: 20.0,
            spring_damping: 5.0,
            repulsion: 50_000.0,
            min_distance: 20.0,
            max_force: 50_000.0,
            mass: 1.0,
            rest_speed: 0.5,
            max_substeps: 8,
        }
    }
}

/// Build section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    /// Abort builds running longer than this
    pub timeout_secs: Option<u64>,
    /// Stop resolving after this many files
    pub max_files: Option<usize>,
    /// Do not resolve files deeper than this level
    pub max_depth: Option<u32>,
    /// Parse each BFS wave in parallel
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_files: None,
            max_depth: None,
            parallel: true,
        }
    }
}

impl BuildConfig {
    /// Builder options for this section.
    #[must_use]
    pub fn to_options(&self) -> BuildOptions {
        BuildOptions {
            max_depth: self.max_depth,
            max_files: self.max_files,
            timeout: self.timeout_secs.map(Duration::from_secs),
            parallel: self.parallel,
        }
    }
}

/// Cache section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Read and write the graph cache
    pub enabled: bool,
    /// Replaces the application-support directory as the cache base
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

/// Session section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Simulation ticks per second
    pub tick_hz: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { tick_hz: 60 }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it is not valid YAML or holds out-of-range values.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.yaml` from `dir`, or the defaults if there is none.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub async fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !fs::try_exists(&path).await? {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path).await
    }

    /// Save configuration to a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails and [`Error::Io`] if
    /// the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        Ok(())
    }

    /// Reject values the layout engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("layout.scale", self.layout.scale),
            ("physics.timestep", self.physics.timestep),
            ("physics.mass", self.physics.mass),
            ("physics.min_distance", self.physics.min_distance),
            ("physics.max_force", self.physics.max_force),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{field} must be positive, got {value}")));
            }
        }
        let non_negative = [
            ("physics.node_radius", self.physics.node_radius),
            ("physics.rest_length", self.physics.rest_length),
            ("physics.stiffness", self.physics.stiffness),
            ("physics.spring_damping", self.physics.spring_damping),
            ("physics.repulsion", self.physics.repulsion),
            ("physics.rest_speed", self.physics.rest_speed),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!("{field} must not be negative, got {value}")));
            }
        }
        if !(0.0..=1.0).contains(&self.physics.space_damping) {
            return Err(Error::Config(format!(
                "physics.space_damping must be within 0..=1, got {}",
                self.physics.space_damping
            )));
        }
        if self.physics.max_substeps == 0 {
            return Err(Error::Config("physics.max_substeps must be at least 1".to_string()));
        }
        if self.session.tick_hz == 0 {
            return Err(Error::Config("session.tick_hz must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Base directory for cache documents.
    ///
    /// # Errors
    ///
    /// See [`app_support_dir`].
    pub fn cache_base(&self) -> Result<PathBuf> {
        match &self.cache.directory {
            Some(dir) => Ok(dir.clone()),
            None => app_support_dir(),
        }
    }

    /// Interval between simulation ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.session.tick_hz.max(1)))
    }
}

//! Remembered session state.
//!
//! Stores the last analyzed project root and entry file as pretty JSON
//! (`state.json`) in the application-support directory, so the CLI can
//! default `--root` to the previous project.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::Result;

/// Name of the state file
pub const STATE_FILE_NAME: &str = "state.json";

/// Last selection made by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Project root of the last analysis
    #[serde(default)]
    pub project_root: Option<PathBuf>,
    /// Entry file of the last analysis
    #[serde(default)]
    pub entry_file: Option<PathBuf>,
}

impl SessionState {
    /// Load the state from `dir`; a missing file yields the default state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file exists but cannot
    /// be read and [`Error::Json`](crate::Error::Json) if it is malformed.
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(STATE_FILE_NAME);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the state into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be written.
    pub async fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).await?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(STATE_FILE_NAME), content).await?;
        Ok(())
    }

    /// Remember a new selection.
    pub fn remember(&mut self, entry_file: &Path, project_root: &Path) {
        self.entry_file = Some(entry_file.to_path_buf());
        self.project_root = Some(project_root.to_path_buf());
    }
}

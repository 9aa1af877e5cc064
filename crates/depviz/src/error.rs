//! Error types for depviz operations.
//!
//! Errors are split into two tiers:
//!
//! - **`Error`**: failures that abort a whole operation (the entry file or
//!   project root is inaccessible, the grammar failed to load, a build was
//!   cancelled, ...)
//! - **`FileError`**: failures contained to a single source file. They are
//!   collected in a build report while the traversal carries on.
//!
//! An import that cannot be mapped to a project file is not an error at all;
//! it is classified as [`ModuleType::Builtin`](crate::ModuleType::Builtin).
//! Circular imports are not errors either, the builder's visited set absorbs
//! them.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for depviz operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for depviz operations.
#[derive(Debug, Error)]
pub enum Error {
    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The entry file of a build could not be accessed
    #[error("entry file not accessible: {}", path.display())]
    EntryNotFound {
        /// Path as supplied by the caller
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The project root could not be accessed or is not a directory
    #[error("project root not accessible: {}", path.display())]
    ProjectRootNotFound {
        /// Path as supplied by the caller
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Tree-sitter parsing infrastructure failed
    #[error("parser error: {0}")]
    Parser(String),

    /// A single source file could not be analyzed
    #[error(transparent)]
    File(#[from] FileError),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// A persisted cache document is unreadable or inconsistent
    #[error("cache at {} is corrupt: {reason}", path.display())]
    CacheCorrupt {
        /// Location of the cache document
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The build was cancelled through its token
    #[error("build cancelled")]
    Cancelled,

    /// The build exceeded its time budget
    #[error("build timed out after {0:?}")]
    TimedOut(Duration),

    /// A background build task panicked or was aborted
    #[error("build task failed: {0}")]
    Task(String),
}

/// Error encountered while resolving the imports of one file.
///
/// These never stop a build. The file becomes a leaf node and the error is
/// reported alongside the finished graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    /// Path to the file that failed
    pub path: PathBuf,
    /// Category of the error
    pub kind: FileErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for FileError {}

/// Categorization of per-file failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    /// The file could not be opened or read
    FileUnreadable,

    /// The file is not syntactically valid Python
    ParseError,

    /// File content is not valid UTF-8
    EncodingError,
}

impl std::fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileUnreadable => write!(f, "file unreadable"),
            Self::ParseError => write!(f, "parse error"),
            Self::EncodingError => write!(f, "encoding error"),
        }
    }
}

impl FileError {
    /// Create a new per-file error.
    #[must_use]
    pub fn new(path: PathBuf, kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Create an error for a file that could not be read.
    #[must_use]
    pub fn unreadable(path: PathBuf, error: &std::io::Error) -> Self {
        Self::new(path, FileErrorKind::FileUnreadable, error.to_string())
    }

    /// Create a parse error for a file.
    #[must_use]
    pub fn parse_failed(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(path, FileErrorKind::ParseError, message)
    }

    /// Create an encoding error for a file.
    #[must_use]
    pub fn encoding_error(path: PathBuf) -> Self {
        Self::new(
            path,
            FileErrorKind::EncodingError,
            "file is not valid UTF-8",
        )
    }
}

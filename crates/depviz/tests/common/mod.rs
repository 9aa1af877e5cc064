//! Shared helpers for depviz integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// A throwaway Python project on disk.
pub struct Project {
    /// Kept alive for the duration of the test
    pub dir: TempDir,
    /// Canonical project root
    pub root: PathBuf,
}

impl Project {
    /// Canonical path of a project file.
    pub fn file(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

/// Create a project with the given `(relative path, source)` files.
pub fn project(files: &[(&str, &str)]) -> Project {
    let dir = tempfile::tempdir().expect("should create temp dir");

    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("should create parent dirs");
        }
        fs::write(&full_path, content).expect("should write file");
    }

    let root = dir.path().canonicalize().expect("should canonicalize root");
    Project { dir, root }
}

/// Python source importing each of `modules` on its own line.
pub fn importing(modules: &[String]) -> String {
    modules.iter().map(|m| format!("import {m}\n")).collect()
}

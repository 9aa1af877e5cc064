//! Domain value types shared by the resolver, builder and cache.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Classification of an import target.
///
/// Resolution only ever produces `Local` or `Builtin`: anything that does not
/// map onto a project file is treated as `Builtin`, whether it is a standard
/// library module or an installed package. `ThirdParty` is kept so callers
/// and persisted data can carry the distinction once it is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    /// Resolved to a source file inside the project
    Local,
    /// An installed package outside the project
    ThirdParty,
    /// Standard library module, or anything unresolved
    Builtin,
}

impl ModuleType {
    /// String form used in CLI output and persisted documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::ThirdParty => "third_party",
            Self::Builtin => "builtin",
        }
    }
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One imported name together with where it resolved to.
///
/// Values are immutable once created: fields are read through accessors and
/// the only constructors are [`ImportInfo::local`] and
/// [`ImportInfo::unresolved`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportInfo {
    name: String,
    parent: String,
    path: PathBuf,
    module_type: ModuleType,
    import_line: u32,
    is_conditional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alias: Option<String>,
}

impl ImportInfo {
    /// An import that resolved to the project file at `path`.
    ///
    /// `parent` is `path` relative to `project_root`, rendered with `/`
    /// separators regardless of platform.
    #[must_use]
    pub fn local(
        name: impl Into<String>,
        path: PathBuf,
        project_root: &Path,
        import_line: u32,
        is_conditional: bool,
        alias: Option<String>,
    ) -> Self {
        let parent = relative_display(&path, project_root);
        Self {
            name: name.into(),
            parent,
            path,
            module_type: ModuleType::Local,
            import_line,
            is_conditional,
            alias,
        }
    }

    /// An import that did not map onto a project file.
    #[must_use]
    pub fn unresolved(
        name: impl Into<String>,
        import_line: u32,
        is_conditional: bool,
        alias: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parent: String::new(),
            path: PathBuf::new(),
            module_type: ModuleType::Builtin,
            import_line,
            is_conditional,
            alias,
        }
    }

    /// Imported symbol or module name, as written in the source.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved file relative to the project root; empty when unresolved.
    #[must_use]
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Absolute path of the resolved file; empty when unresolved.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the import resolved to anything.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    /// Classification of the import target.
    #[must_use]
    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    /// 1-based source line of the imported name.
    #[must_use]
    pub fn import_line(&self) -> u32 {
        self.import_line
    }

    /// Whether the import sits inside an `if`/`elif`/`else` branch.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.is_conditional
    }

    /// Rebind name from `as`, if any.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

/// Render `path` relative to `root` with forward slashes.
///
/// Falls back to the full path when `path` is not under `root`.
pub(crate) fn relative_display(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_import_records_relative_parent() {
        let root = Path::new("/project");
        let info = ImportInfo::local(
            "helpers",
            PathBuf::from("/project/pkg/helpers.py"),
            root,
            4,
            false,
            Some("h".to_string()),
        );

        assert_eq!(info.parent(), "pkg/helpers.py");
        assert_eq!(info.module_type(), ModuleType::Local);
        assert_eq!(info.alias(), Some("h"));
        assert!(info.is_resolved());
    }

    #[test]
    fn unresolved_import_is_builtin_with_empty_path() {
        let info = ImportInfo::unresolved("os", 1, true, None);

        assert_eq!(info.module_type(), ModuleType::Builtin);
        assert!(info.path().as_os_str().is_empty());
        assert!(info.parent().is_empty());
        assert!(info.is_conditional());
        assert!(!info.is_resolved());
    }

    #[test]
    fn module_type_serializes_snake_case() {
        let json = serde_json::to_string(&ModuleType::ThirdParty).unwrap();
        assert_eq!(json, "\"third_party\"");
    }
}

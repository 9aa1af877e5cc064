//! Import resolution for Python source files.
//!
//! Parses one file, extracts its import statements and maps every imported
//! name onto a project file where possible. Anything that does not land on an
//! existing `.py` file inside the project is classified as
//! [`ModuleType::Builtin`](crate::ModuleType::Builtin) with an empty path.
//!
//! ## Resolution rules
//!
//! | Form | Candidate |
//! |------|-----------|
//! | `import a.b` | `<root>/a/b` |
//! | `from a.b import x` | `<root>/a/b` |
//! | `from . import x` | directory of the importing file |
//! | `from ..a import x` | one directory up from the importing file, then `a` |
//!
//! A candidate becomes a concrete file by trying, in order: the imported
//! name as a submodule (`<candidate>/x.py`, from-imports only), a
//! same-named file inside a package directory (`<candidate>/b.py` for
//! `a/b`), and the candidate itself with the `.py` extension.
//!
//! Relative imports are not bounded by the project root. Walking up too far
//! just yields a candidate outside the project, which fails the existence
//! check and falls back to `Builtin`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Error, FileError, Result};
use crate::languages::python::{self, ImportForm, ImportStatement, ImportedName};
use crate::languages::tree_sitter_utils::first_error;
use crate::types::ImportInfo;

/// Resolves the imports of Python files against one project root.
///
/// Holds a tree-sitter parser so repeated calls do not pay for grammar
/// setup. Not `Sync`; create one per thread.
pub struct ImportResolver {
    parser: tree_sitter::Parser,
    project_root: PathBuf,
}

impl std::fmt::Debug for ImportResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportResolver")
            .field("project_root", &self.project_root)
            .finish_non_exhaustive()
    }
}

impl ImportResolver {
    /// Create a resolver for a project.
    ///
    /// The root is made absolute but not canonicalized; callers that need
    /// canonical node identities canonicalize it first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parser`] if the Python grammar cannot be loaded and
    /// [`Error::Io`] if the root cannot be made absolute.
    pub fn new(project_root: &Path) -> Result<Self> {
        Ok(Self {
            parser: python::new_parser()?,
            project_root: std::path::absolute(project_root)?,
        })
    }

    /// The directory absolute imports are resolved against.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Read, parse and resolve one file.
    ///
    /// # Errors
    ///
    /// Returns a [`FileError`] when the file cannot be read, is not UTF-8 or
    /// does not parse. Callers building a graph treat these as leaf nodes.
    pub fn find_imports(&mut self, file: &Path) -> std::result::Result<Vec<ImportInfo>, FileError> {
        let bytes = std::fs::read(file).map_err(|e| FileError::unreadable(file.to_path_buf(), &e))?;
        let source =
            String::from_utf8(bytes).map_err(|_| FileError::encoding_error(file.to_path_buf()))?;
        self.resolve_source(file, &source)
    }

    /// Resolve the imports of already-loaded source text.
    ///
    /// `file` is only used as the anchor for relative imports and for error
    /// reporting; it does not have to exist.
    ///
    /// # Errors
    ///
    /// Returns a [`FileError`] of kind `ParseError` when the source contains
    /// syntax errors.
    pub fn resolve_source(
        &mut self,
        file: &Path,
        source: &str,
    ) -> std::result::Result<Vec<ImportInfo>, FileError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);

        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| FileError::parse_failed(file.to_path_buf(), "parser produced no tree"))?;

        if let Some(bad) = first_error(&tree.root_node()) {
            let position = bad.start_position();
            return Err(FileError::parse_failed(
                file.to_path_buf(),
                format!(
                    "syntax error at line {}, column {}",
                    position.row + 1,
                    position.column + 1
                ),
            ));
        }

        let importing_file = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
        let statements = python::extract_imports(&tree, source.as_bytes());

        let imports: Vec<ImportInfo> = statements
            .iter()
            .flat_map(|statement| self.resolve_statement(&importing_file, statement))
            .collect();

        tracing::trace!(
            file = %file.display(),
            statements = statements.len(),
            imports = imports.len(),
            "Resolved imports"
        );

        Ok(imports)
    }

    fn resolve_statement(&self, importing_file: &Path, statement: &ImportStatement) -> Vec<ImportInfo> {
        match &statement.form {
            ImportForm::Plain => statement
                .names
                .iter()
                .map(|name| {
                    let resolved = resolve_plain_import(&name.name, &self.project_root);
                    self.info(name, resolved, statement.is_conditional)
                })
                .collect(),
            ImportForm::From { level, module } => {
                let candidate =
                    module_candidate(*level, module, importing_file, &self.project_root);
                statement
                    .names
                    .iter()
                    .map(|name| {
                        let resolved = resolve_from_import(&candidate, module, &name.name);
                        self.info(name, resolved, statement.is_conditional)
                    })
                    .collect()
            }
            ImportForm::Future => statement
                .names
                .iter()
                .map(|name| self.info(name, None, statement.is_conditional))
                .collect(),
        }
    }

    fn info(&self, name: &ImportedName, resolved: Option<PathBuf>, is_conditional: bool) -> ImportInfo {
        match resolved {
            Some(path) => ImportInfo::local(
                name.name.clone(),
                path,
                &self.project_root,
                name.line,
                is_conditional,
                name.alias.clone(),
            ),
            None => ImportInfo::unresolved(
                name.name.clone(),
                name.line,
                is_conditional,
                name.alias.clone(),
            ),
        }
    }
}

/// Resolve the imports of one file against a project root.
///
/// Convenience wrapper that builds a throwaway [`ImportResolver`].
///
/// # Errors
///
/// Returns [`Error::File`] for per-file failures and [`Error::Parser`] if the
/// grammar cannot be loaded.
pub fn find_imports(file: &Path, project_root: &Path) -> Result<Vec<ImportInfo>> {
    let mut resolver = ImportResolver::new(project_root)?;
    resolver.find_imports(file).map_err(Error::from)
}

/// Resolve `import a.b.c` to a project file.
///
/// The candidate is `<root>/a/b/c`; it resolves when it is a package
/// directory holding `c.py`, or when `<root>/a/b/c.py` exists.
#[must_use]
pub fn resolve_plain_import(dotted: &str, project_root: &Path) -> Option<PathBuf> {
    let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
    let last = *segments.last()?;

    let mut candidate = project_root.to_path_buf();
    candidate.extend(&segments);

    concrete_module_file(&candidate, Some(last))
}

/// Compute the candidate path of a from-import's module part.
///
/// For `level == 0` this is the project root joined with the module
/// segments. Otherwise the base is the importing file's directory walked up
/// `level - 1` times. Walking past the filesystem root stops there.
#[must_use]
pub fn module_candidate(
    level: u32,
    module: &[String],
    importing_file: &Path,
    project_root: &Path,
) -> PathBuf {
    let mut candidate = if level == 0 {
        project_root.to_path_buf()
    } else {
        let mut base = importing_file.parent().unwrap_or(Path::new(""));
        for _ in 1..level {
            base = base.parent().unwrap_or(base);
        }
        base.to_path_buf()
    };

    candidate.extend(module);
    candidate
}

/// Resolve one name of `from <module> import <name>` given the module's
/// candidate path.
#[must_use]
pub fn resolve_from_import(candidate: &Path, module: &[String], name: &str) -> Option<PathBuf> {
    if name != "*" && candidate.is_dir() {
        let submodule = with_source_extension(&candidate.join(name));
        if submodule.is_file() {
            return Some(submodule);
        }
    }

    concrete_module_file(candidate, module.last().map(String::as_str))
}

/// Turn a candidate path into an existing `.py` file, if there is one.
fn concrete_module_file(candidate: &Path, same_named: Option<&str>) -> Option<PathBuf> {
    if let Some(stem) = same_named {
        if candidate.is_dir() {
            let inner = with_source_extension(&candidate.join(stem));
            if inner.is_file() {
                return Some(inner);
            }
        }
    }

    let file = with_source_extension(candidate);
    file.is_file().then_some(file)
}

/// Append `.py` without touching any dots already in the file name.
fn with_source_extension(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".");
    raw.push(python::EXTENSION);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModuleType;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_project() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::write(root.join("main.py"), "import utils\n").unwrap();
        fs::write(root.join("utils.py"), "").unwrap();

        // Package directory with a same-named module inside it
        fs::create_dir_all(root.join("widgets")).unwrap();
        fs::write(root.join("widgets").join("widgets.py"), "").unwrap();
        fs::write(root.join("widgets").join("buttons.py"), "").unwrap();

        // Nested package for relative imports
        fs::create_dir_all(root.join("app").join("core")).unwrap();
        fs::write(root.join("app").join("helpers.py"), "").unwrap();
        fs::write(root.join("app").join("core").join("engine.py"), "").unwrap();
        fs::write(root.join("app").join("core").join("physics.py"), "").unwrap();

        dir
    }

    #[test]
    fn resolves_plain_import_to_file() {
        let dir = create_test_project();

        let resolved = resolve_plain_import("utils", dir.path()).unwrap();
        assert!(resolved.ends_with("utils.py"));
    }

    #[test]
    fn resolves_plain_import_of_package_to_same_named_file() {
        let dir = create_test_project();

        let resolved = resolve_plain_import("widgets", dir.path()).unwrap();
        assert!(resolved.ends_with("widgets/widgets.py"));
    }

    #[test]
    fn resolves_dotted_plain_import() {
        let dir = create_test_project();

        let resolved = resolve_plain_import("app.core.engine", dir.path()).unwrap();
        assert!(resolved.ends_with("app/core/engine.py"));
    }

    #[test]
    fn plain_import_of_stdlib_is_unresolved() {
        let dir = create_test_project();

        assert!(resolve_plain_import("os", dir.path()).is_none());
        assert!(resolve_plain_import("os.path", dir.path()).is_none());
    }

    #[test]
    fn package_without_same_named_file_is_unresolved() {
        let dir = create_test_project();

        // app/ exists but app/app.py does not
        assert!(resolve_plain_import("app", dir.path()).is_none());
    }

    #[test]
    fn same_package_relative_candidate_is_file_directory() {
        let dir = create_test_project();
        let importing = dir.path().join("app/core/engine.py");

        let candidate = module_candidate(1, &[], &importing, dir.path());
        assert_eq!(candidate, dir.path().join("app/core"));
    }

    #[test]
    fn parent_relative_candidate_walks_up() {
        let dir = create_test_project();
        let importing = dir.path().join("app/core/engine.py");

        let module = vec!["helpers".to_string()];
        let candidate = module_candidate(2, &module, &importing, dir.path());
        assert_eq!(candidate, dir.path().join("app/helpers"));
    }

    #[test]
    fn relative_import_beyond_root_is_permissive() {
        let dir = create_test_project();
        let importing = dir.path().join("main.py");

        let candidate = module_candidate(40, &["nowhere".to_string()], &importing, dir.path());
        assert!(!candidate.starts_with(dir.path()));
        assert!(resolve_from_import(&candidate, &["nowhere".to_string()], "x").is_none());
    }

    #[test]
    fn from_import_prefers_submodule() {
        let dir = create_test_project();
        let candidate = dir.path().join("app/core");

        let resolved = resolve_from_import(&candidate, &[], "physics").unwrap();
        assert!(resolved.ends_with("app/core/physics.py"));
    }

    #[test]
    fn from_import_of_symbol_resolves_to_module_file() {
        let dir = create_test_project();
        let module = vec!["app".to_string(), "helpers".to_string()];
        let candidate = dir.path().join("app/helpers");

        let resolved = resolve_from_import(&candidate, &module, "format_path").unwrap();
        assert!(resolved.ends_with("app/helpers.py"));
    }

    #[test]
    fn resolver_produces_import_info_records() {
        let dir = create_test_project();
        let file = dir.path().join("app/core/engine.py");
        fs::write(
            &file,
            "import os\nfrom . import physics\nfrom ..helpers import fmt as f\n",
        )
        .unwrap();

        let mut resolver = ImportResolver::new(dir.path()).unwrap();
        let imports = resolver.find_imports(&file).unwrap();

        assert_eq!(imports.len(), 3);

        assert_eq!(imports[0].name(), "os");
        assert_eq!(imports[0].module_type(), ModuleType::Builtin);
        assert_eq!(imports[0].import_line(), 1);

        assert_eq!(imports[1].name(), "physics");
        assert_eq!(imports[1].module_type(), ModuleType::Local);
        assert_eq!(imports[1].parent(), "app/core/physics.py");

        assert_eq!(imports[2].alias(), Some("f"));
        assert_eq!(imports[2].parent(), "app/helpers.py");
        assert_eq!(imports[2].import_line(), 3);
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let dir = create_test_project();
        let file = dir.path().join("broken.py");
        fs::write(&file, "import os\ndef broken(:\n    pass\n").unwrap();

        let mut resolver = ImportResolver::new(dir.path()).unwrap();
        let err = resolver.find_imports(&file).unwrap_err();

        assert_eq!(err.kind, crate::FileErrorKind::ParseError);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = create_test_project();

        let err = find_imports(&dir.path().join("ghost.py"), dir.path()).unwrap_err();
        match err {
            Error::File(file_err) => assert_eq!(file_err.kind, crate::FileErrorKind::FileUnreadable),
            other => panic!("expected file error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_encoding_error() {
        let dir = create_test_project();
        let file = dir.path().join("latin1.py");
        fs::write(&file, [0x69, 0x6d, 0x70, 0xff, 0xfe]).unwrap();

        let mut resolver = ImportResolver::new(dir.path()).unwrap();
        let err = resolver.find_imports(&file).unwrap_err();

        assert_eq!(err.kind, crate::FileErrorKind::EncodingError);
    }

    #[test]
    fn future_imports_never_resolve() {
        let dir = create_test_project();
        fs::write(dir.path().join("annotations.py"), "").unwrap();
        let file = dir.path().join("main.py");

        let mut resolver = ImportResolver::new(dir.path()).unwrap();
        let imports = resolver
            .resolve_source(&file, "from __future__ import annotations\n")
            .unwrap();

        assert_eq!(imports[0].module_type(), ModuleType::Builtin);
    }
}

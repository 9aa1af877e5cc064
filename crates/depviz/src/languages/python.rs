//! Python import extraction using tree-sitter-python.
//!
//! Walks a syntax tree and collects every statically visible import
//! statement. Dynamic imports (`importlib`, `__import__`) are not detected.

// Tree-sitter returns usize for positions, but lines are stored as u32.
#![allow(clippy::cast_possible_truncation)]

use super::tree_sitter_utils::{node_line, node_text};
use crate::error::{Error, Result};

/// File extension of Python source files.
pub const EXTENSION: &str = "py";

/// Tree-sitter node kind constants for the Python grammar.
mod node_kinds {
    // Statements
    pub const IMPORT_STATEMENT: &str = "import_statement";
    pub const IMPORT_FROM_STATEMENT: &str = "import_from_statement";
    pub const FUTURE_IMPORT_STATEMENT: &str = "future_import_statement";
    pub const IF_STATEMENT: &str = "if_statement";

    // Import structure
    pub const DOTTED_NAME: &str = "dotted_name";
    pub const ALIASED_IMPORT: &str = "aliased_import";
    pub const RELATIVE_IMPORT: &str = "relative_import";
    pub const IMPORT_PREFIX: &str = "import_prefix";
    pub const WILDCARD_IMPORT: &str = "wildcard_import";
    pub const IDENTIFIER: &str = "identifier";
}

/// Create a parser configured for Python.
///
/// # Errors
///
/// Returns [`Error::Parser`] if the grammar is incompatible with the linked
/// tree-sitter runtime.
pub fn new_parser() -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| Error::Parser(e.to_string()))?;
    Ok(parser)
}

/// The syntactic form of an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportForm {
    /// `import a.b.c` - every imported name is itself a dotted module path
    Plain,
    /// `from <dots><module> import ...`
    From {
        /// Number of leading dots (0 for an absolute import)
        level: u32,
        /// Module segments after the dots; empty for `from . import x`
        module: Vec<String>,
    },
    /// `from __future__ import ...`
    Future,
}

/// One name listed in an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    /// Name as written; dotted for plain imports, `*` for wildcards
    pub name: String,
    /// Rebind name from `as`
    pub alias: Option<String>,
    /// Line of the name itself (1-indexed)
    pub line: u32,
}

/// An extracted import statement.
///
/// This is a transient parsing type; the resolver turns it into
/// [`ImportInfo`](crate::ImportInfo) records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// Which kind of import this is
    pub form: ImportForm,
    /// Names in source order
    pub names: Vec<ImportedName>,
    /// Whether the statement is nested inside an `if`/`elif`/`else`
    pub is_conditional: bool,
    /// Line where the statement starts (1-indexed)
    pub line: u32,
}

/// Extract import statements from a Python syntax tree, in source order.
pub fn extract_imports(tree: &tree_sitter::Tree, content: &[u8]) -> Vec<ImportStatement> {
    let mut collector = ImportCollector {
        content,
        in_conditional: false,
        imports: Vec::new(),
    };
    collector.visit(&tree.root_node());
    collector.imports
}

/// Tree walker that tracks whether it is inside a conditional branch.
struct ImportCollector<'a> {
    content: &'a [u8],
    in_conditional: bool,
    imports: Vec<ImportStatement>,
}

impl ImportCollector<'_> {
    fn visit(&mut self, node: &tree_sitter::Node) {
        use node_kinds::{
            FUTURE_IMPORT_STATEMENT, IF_STATEMENT, IMPORT_FROM_STATEMENT, IMPORT_STATEMENT,
        };

        let parsed = match node.kind() {
            IMPORT_STATEMENT => self.parse_import(node),
            IMPORT_FROM_STATEMENT => self.parse_import_from(node),
            FUTURE_IMPORT_STATEMENT => Some(self.statement(node, ImportForm::Future)),
            IF_STATEMENT => {
                self.visit_if(node);
                return;
            }
            _ => {
                self.visit_children(node);
                return;
            }
        };

        if let Some(statement) = parsed {
            self.imports.push(statement);
        }
    }

    /// Everything under an `if` statement, including `elif` and `else`
    /// clauses, is conditional. The previous flag is restored on exit so
    /// nesting behaves correctly.
    fn visit_if(&mut self, node: &tree_sitter::Node) {
        let saved = self.in_conditional;
        self.in_conditional = true;
        self.visit_children(node);
        self.in_conditional = saved;
    }

    fn visit_children(&mut self, node: &tree_sitter::Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(&child);
        }
    }

    /// `import a.b, c as d`
    fn parse_import(&self, node: &tree_sitter::Node) -> Option<ImportStatement> {
        let statement = self.statement(node, ImportForm::Plain);
        if statement.names.is_empty() {
            return None;
        }
        Some(statement)
    }

    /// `from .pkg import a, b as c` / `from pkg import *`
    fn parse_import_from(&self, node: &tree_sitter::Node) -> Option<ImportStatement> {
        use node_kinds::{DOTTED_NAME, RELATIVE_IMPORT};

        let module_node = node.child_by_field_name("module_name")?;
        let form = match module_node.kind() {
            DOTTED_NAME => ImportForm::From {
                level: 0,
                module: dotted_segments(&module_node, self.content),
            },
            RELATIVE_IMPORT => self.parse_relative(&module_node),
            other => {
                tracing::trace!(node_kind = other, "Unexpected module_name node in import");
                return None;
            }
        };

        let statement = self.statement(node, form);
        if statement.names.is_empty() {
            return None;
        }
        Some(statement)
    }

    /// `..pkg.sub` -> level 2, module `["pkg", "sub"]`
    fn parse_relative(&self, node: &tree_sitter::Node) -> ImportForm {
        use node_kinds::{DOTTED_NAME, IMPORT_PREFIX};

        let mut level = 0;
        let mut module = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                IMPORT_PREFIX => {
                    level = node_text(&child, self.content)
                        .map_or(0, |prefix| prefix.chars().filter(|c| *c == '.').count() as u32);
                }
                DOTTED_NAME => module = dotted_segments(&child, self.content),
                _ => {}
            }
        }

        ImportForm::From { level, module }
    }

    fn statement(&self, node: &tree_sitter::Node, form: ImportForm) -> ImportStatement {
        ImportStatement {
            form,
            names: self.imported_names(node),
            is_conditional: self.in_conditional,
            line: node_line(node),
        }
    }

    /// Collect the `name` fields of an import statement, plus a wildcard if present.
    fn imported_names(&self, node: &tree_sitter::Node) -> Vec<ImportedName> {
        use node_kinds::{ALIASED_IMPORT, DOTTED_NAME, WILDCARD_IMPORT};

        let mut names = Vec::new();

        let mut cursor = node.walk();
        for child in node.children_by_field_name("name", &mut cursor) {
            match child.kind() {
                DOTTED_NAME => {
                    let segments = dotted_segments(&child, self.content);
                    if !segments.is_empty() {
                        names.push(ImportedName {
                            name: segments.join("."),
                            alias: None,
                            line: node_line(&child),
                        });
                    }
                }
                ALIASED_IMPORT => {
                    if let Some(name) = self.parse_aliased(&child) {
                        names.push(name);
                    }
                }
                _ => {}
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == WILDCARD_IMPORT {
                names.push(ImportedName {
                    name: "*".to_string(),
                    alias: None,
                    line: node_line(&child),
                });
            }
        }

        names
    }

    /// `a.b as c`
    fn parse_aliased(&self, node: &tree_sitter::Node) -> Option<ImportedName> {
        let name_node = node.child_by_field_name("name")?;
        let segments = dotted_segments(&name_node, self.content);
        if segments.is_empty() {
            return None;
        }
        let alias = node
            .child_by_field_name("alias")
            .and_then(|alias| node_text(&alias, self.content));

        Some(ImportedName {
            name: segments.join("."),
            alias,
            line: node_line(node),
        })
    }
}

/// Identifier segments of a `dotted_name` node.
///
/// Rebuilt from the identifier children so that stray whitespace around the
/// dots (`a . b`) does not leak into the segments.
fn dotted_segments(node: &tree_sitter::Node, content: &[u8]) -> Vec<String> {
    use node_kinds::IDENTIFIER;

    if node.kind() == IDENTIFIER {
        return node_text(node, content).into_iter().collect();
    }

    let mut segments = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == IDENTIFIER {
            if let Some(text) = node_text(&child, content) {
                segments.push(text);
            }
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_python(code: &str) -> tree_sitter::Tree {
        let mut parser = new_parser().expect("tree-sitter-python language should be valid");
        parser
            .parse(code, None)
            .expect("parsing test code should succeed")
    }

    fn imports_of(code: &str) -> Vec<ImportStatement> {
        let tree = parse_python(code);
        extract_imports(&tree, code.as_bytes())
    }

    #[test]
    fn extracts_plain_import() {
        let imports = imports_of("import os\n");

        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].form, ImportForm::Plain);
        assert_eq!(imports[0].names[0].name, "os");
        assert_eq!(imports[0].names[0].line, 1);
        assert!(!imports[0].is_conditional);
    }

    #[test]
    fn extracts_dotted_and_aliased_plain_imports() {
        let imports = imports_of("import pkg.sub as s, json\n");

        let names: Vec<_> = imports[0]
            .names
            .iter()
            .map(|n| (n.name.as_str(), n.alias.as_deref()))
            .collect();
        assert_eq!(names, vec![("pkg.sub", Some("s")), ("json", None)]);
    }

    #[test]
    fn extracts_absolute_from_import() {
        let imports = imports_of("from pkg.util import helper, other as o\n");

        assert_eq!(
            imports[0].form,
            ImportForm::From {
                level: 0,
                module: vec!["pkg".to_string(), "util".to_string()],
            }
        );
        assert_eq!(imports[0].names.len(), 2);
        assert_eq!(imports[0].names[1].alias.as_deref(), Some("o"));
    }

    #[test]
    fn extracts_relative_levels() {
        let imports = imports_of("from . import b\nfrom ..pkg.mod import thing\n");

        assert_eq!(
            imports[0].form,
            ImportForm::From {
                level: 1,
                module: vec![],
            }
        );
        assert_eq!(imports[0].names[0].name, "b");
        assert_eq!(imports[0].line, 1);

        assert_eq!(
            imports[1].form,
            ImportForm::From {
                level: 2,
                module: vec!["pkg".to_string(), "mod".to_string()],
            }
        );
        assert_eq!(imports[1].line, 2);
    }

    #[test]
    fn extracts_wildcard_and_parenthesized_lists() {
        let imports = imports_of("from a import *\nfrom b import (\n    x,\n    y,\n)\n");

        assert_eq!(imports[0].names[0].name, "*");
        let lines: Vec<_> = imports[1].names.iter().map(|n| n.line).collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn future_imports_have_their_own_form() {
        let imports = imports_of("from __future__ import annotations\n");

        assert_eq!(imports[0].form, ImportForm::Future);
        assert_eq!(imports[0].names[0].name, "annotations");
    }

    #[test]
    fn flags_imports_inside_if_elif_else() {
        let code = "\
import always
if DEBUG:
    import debug_tools
elif FAST:
    import fast_path
else:
    import slow_path
import after
";
        let imports = imports_of(code);
        let flags: Vec<_> = imports
            .iter()
            .map(|i| (i.names[0].name.as_str(), i.is_conditional))
            .collect();

        assert_eq!(
            flags,
            vec![
                ("always", false),
                ("debug_tools", true),
                ("fast_path", true),
                ("slow_path", true),
                ("after", false),
            ]
        );
    }

    #[test]
    fn nested_conditionals_restore_state() {
        let code = "\
def load():
    if a:
        if b:
            import inner
        import outer
    import in_function
";
        let imports = imports_of(code);
        let flags: Vec<_> = imports.iter().map(|i| i.is_conditional).collect();

        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn imports_in_functions_and_try_blocks_are_unconditional() {
        let code = "\
try:
    import fast_json
except ImportError:
    import json
def f():
    import local_only
";
        let imports = imports_of(code);
        assert_eq!(imports.len(), 3);
        assert!(imports.iter().all(|i| !i.is_conditional));
    }
}

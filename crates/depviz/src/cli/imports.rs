//! `depviz imports` command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use colored::Colorize;
use depviz::ImportResolver;

use super::Context;
use super::display::{describe_import, module_type_label, relative};

/// Run the imports command.
pub fn run(ctx: &Context, file: &Path, root: Option<PathBuf>) -> Result<()> {
    let root = ctx.project_root(file, root);
    let mut resolver = ImportResolver::new(&root)?;
    let imports = resolver
        .find_imports(file)
        .with_context(|| format!("failed to read imports of {}", file.display()))?;

    if imports.is_empty() {
        println!("{}", "No imports found.".dimmed());
        return Ok(());
    }

    println!(
        "{} imports in {}:",
        imports.len().to_string().bold(),
        file.display()
    );
    for import in &imports {
        let target = if import.is_resolved() {
            relative(import.path(), resolver.project_root())
        } else {
            "-".to_string()
        };
        println!(
            "  {:<10} {} {} {}",
            module_type_label(import.module_type()),
            describe_import(import),
            "→".dimmed(),
            target
        );
    }

    Ok(())
}

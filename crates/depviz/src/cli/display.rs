//! Common display utilities for CLI commands.

use std::path::Path;

use colored::{ColoredString, Colorize};
use depviz::{FileError, ImportInfo, ModuleType};

const MAX_DISPLAY_ITEMS: usize = 10;

/// Path relative to `root` when possible, for compact output.
pub fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Module type label with a color per category.
pub fn module_type_label(module_type: ModuleType) -> ColoredString {
    match module_type {
        ModuleType::Local => module_type.as_str().green(),
        ModuleType::ThirdParty => module_type.as_str().blue(),
        ModuleType::Builtin => module_type.as_str().dimmed(),
    }
}

/// One-line description of an import: `name as alias (line N, conditional)`.
pub fn describe_import(import: &ImportInfo) -> String {
    let mut text = import.name().to_string();
    if let Some(alias) = import.alias() {
        text.push_str(" as ");
        text.push_str(alias);
    }
    text.push_str(&format!(" (line {}", import.import_line()));
    if import.is_conditional() {
        text.push_str(", conditional");
    }
    text.push(')');
    text
}

/// Display per-file errors with optional truncation.
pub fn print_file_errors(errors: &[FileError], root: &Path) {
    if errors.is_empty() {
        return;
    }

    println!();
    println!(
        "{} {} could not be analyzed:",
        errors.len().to_string().yellow().bold(),
        if errors.len() == 1 { "file" } else { "files" }
    );
    for error in errors.iter().take(MAX_DISPLAY_ITEMS) {
        println!(
            "    {} {}: {} ({})",
            "•".dimmed(),
            relative(&error.path, root),
            error.message,
            error.kind.to_string().dimmed()
        );
    }
    if errors.len() > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            errors.len() - MAX_DISPLAY_ITEMS
        );
    }
}

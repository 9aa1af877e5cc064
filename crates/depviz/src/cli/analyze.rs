//! `depviz analyze` command implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;

use super::display::{describe_import, print_file_errors, relative};
use super::{Context, load_graph};

/// Run the analyze command.
pub async fn run(ctx: &mut Context, entry: &Path, root: Option<PathBuf>, no_cache: bool) -> Result<()> {
    let ready = load_graph(ctx, entry, root, no_cache).await?;
    let tree = &ready.tree;
    let root = tree.project_root();

    println!(
        "{} {} ({} files, {} imports, from {})",
        "Dependency graph of".bold(),
        relative(tree.root().path(), root).white().bold(),
        tree.len(),
        tree.edge_count(),
        ready.source
    );

    let max_level = tree.levels().max_level().unwrap_or(0);
    for level in 0..=max_level {
        let nodes: Vec<_> = tree
            .nodes()
            .filter(|(id, _)| tree.level_of(*id) == Some(level))
            .collect();
        if nodes.is_empty() {
            continue;
        }

        println!();
        println!("  {} {}", "Level".cyan().bold(), level);
        for (_, node) in nodes {
            println!("    {}", relative(node.path(), root).white());
            for edge in node.dependencies() {
                println!(
                    "      {} {} {}",
                    "→".dimmed(),
                    relative(tree.node(edge.node).path(), root),
                    describe_import(&edge.import).dimmed()
                );
            }
        }
    }

    if let Some(report) = &ready.report {
        println!();
        println!(
            "Resolved {} files, {} unresolved imports in {} ms",
            report.files_resolved,
            report.unresolved_imports,
            report.duration.as_millis()
        );
        if report.truncated {
            println!("{}", "Build limits left some files unresolved.".yellow());
        }
        print_file_errors(&report.errors, root);
    }

    Ok(())
}

//! `depviz cycles` command implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;

use super::display::{describe_import, relative};
use super::{Context, load_graph};

/// Run the cycles command.
///
/// Lists every strongly connected group of files, each member with its
/// level, followed by the import statements that keep the group connected.
pub async fn run(ctx: &mut Context, entry: &Path, root: Option<PathBuf>) -> Result<()> {
    let ready = load_graph(ctx, entry, root, false).await?;
    let tree = &ready.tree;
    let root = tree.project_root();

    let cycles = ready.graph.cycles();
    if cycles.is_empty() {
        println!(
            "{} ({} files checked)",
            "No circular imports.".green(),
            tree.len()
        );
        return Ok(());
    }

    let noun = if cycles.len() == 1 { "group" } else { "groups" };
    println!(
        "{} circular import {noun}:",
        cycles.len().to_string().red().bold()
    );

    for (n, cycle) in cycles.iter().enumerate() {
        let members: HashSet<&Path> = cycle.files.iter().map(PathBuf::as_path).collect();

        println!();
        println!(
            "  {} {} ({} files)",
            "#".yellow().bold(),
            (n + 1).to_string().yellow().bold(),
            cycle.files.len()
        );
        for file in &cycle.files {
            let level = tree
                .levels()
                .get(file)
                .map_or_else(|| "?".to_string(), |l| l.to_string());
            println!("    {} {}", format!("L{level}").cyan(), relative(file, root));
        }

        for file in &cycle.files {
            let Some(node) = tree.get(file) else {
                continue;
            };
            for edge in node.dependencies() {
                let target = tree.node(edge.node).path();
                if !members.contains(target) {
                    continue;
                }
                println!(
                    "      {} {} {} {}",
                    relative(file, root).dimmed(),
                    "imports".dimmed(),
                    relative(target, root),
                    describe_import(&edge.import).dimmed()
                );
            }
        }
    }

    Ok(())
}

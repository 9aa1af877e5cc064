//! `depviz cache` command implementation.

use anyhow::Result;
use colored::Colorize;
use depviz::cache::CacheStore;

use super::Context;

/// Print the directory holding cached graphs.
pub fn path(ctx: &Context) -> Result<()> {
    let store = CacheStore::new(ctx.config.cache_base()?);
    println!("{}", store.contexts_dir().display());
    if !ctx.config.cache.enabled {
        println!("{}", "(caching is disabled in the configuration)".dimmed());
    }
    Ok(())
}

/// Delete every cached graph.
pub fn clear(ctx: &Context) -> Result<()> {
    let store = CacheStore::new(ctx.config.cache_base()?);
    let removed = store.clear()?;
    println!(
        "Removed {} cached {}.",
        removed.to_string().bold(),
        if removed == 1 { "graph" } else { "graphs" }
    );
    Ok(())
}

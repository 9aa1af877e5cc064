//! `depviz layout` command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use depviz::session::Session;

use super::{Context, load_graph};

/// Run the layout command.
///
/// Prints the shell layout, or the positions after `ticks` simulation steps,
/// as a JSON array of `{path, position: {x, y}}`.
pub async fn run(ctx: &mut Context, entry: &Path, root: Option<PathBuf>, ticks: u32) -> Result<()> {
    let ready = load_graph(ctx, entry, root, false).await?;

    let session = Session::new(ctx.config.clone());
    session.install(&ready).await;
    for _ in 0..ticks {
        session.tick().await;
    }

    let Some(positions) = session.positions().await else {
        bail!("no graph installed");
    };
    println!("{}", serde_json::to_string_pretty(&positions)?);
    Ok(())
}

//! Pad export — `padctl export`.

use std::path::Path;

use anyhow::Result;
use padctl::export::export_pad;

use crate::Cli;

pub async fn cmd_export(cli: &Cli, pads: &[String], output: Option<&Path>) -> Result<()> {
    let session = super::open_session(cli, true).await?;
    let (_, targets) = super::resolve_targets(&session, pads).await?;
    if targets.is_empty() {
        println!("No pad to export");
        return Ok(());
    }

    for (i, pad) in targets.iter().enumerate() {
        super::inter_pad_pause(cli, i).await;
        let path = export_pad(&session, pad, output).await?;
        println!("Exported pad {pad} ({}) to {}", pad.title, path.display());
    }
    Ok(())
}

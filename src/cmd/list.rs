//! Pad listing — `padctl list`.

use anyhow::Result;
use console::style;
use padctl::pads::Pad;

use crate::{Cli, OutputFormat};

pub async fn cmd_list(cli: &Cli, pads: &[String], format: OutputFormat) -> Result<()> {
    let session = super::open_session(cli, true).await?;
    let (_, targets) = super::resolve_targets(&session, pads).await?;

    match format {
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = targets.iter().map(pad_json).collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Table => {
            if targets.is_empty() {
                println!("No pad");
                return Ok(());
            }
            println!("{}", style("Pad ID|Pad name").bold());
            println!("{}", style("===============").dim());
            for pad in &targets {
                println!("{} {}", pad.id, pad.title);
            }
            println!();
            let plural = if targets.len() >= 2 { "pads" } else { "pad" };
            println!("{} {plural}", targets.len());
        }
    }
    Ok(())
}

fn pad_json(pad: &Pad) -> serde_json::Value {
    serde_json::json!({
        "id": pad.id,
        "hash": pad.hash,
        "title": pad.title,
        "access": pad.access,
        "columns": pad.columns,
        "creator": pad.creator.username,
        "created": pad.created.map(|d| d.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_json_carries_identity_and_metadata() {
        let mut pad = Pad::stub(3, "ccc");
        pad.title = "Third".into();
        pad.columns = vec!["A".into(), "B".into()];
        let value = pad_json(&pad);
        assert_eq!(value["id"], 3);
        assert_eq!(value["hash"], "ccc");
        assert_eq!(value["title"], "Third");
        assert_eq!(value["columns"][1], "B");
        assert!(value["created"].is_null());
    }
}

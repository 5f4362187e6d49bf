//! Companion web UI server — `padctl serve`.

use anyhow::Result;
use padctl::session::DEFAULT_DOMAIN;
use padctl::web::{WebConfig, start_server};

use crate::Cli;

pub async fn cmd_serve(cli: &Cli, port: u16, open: bool) -> Result<()> {
    if open {
        let url = format!("http://localhost:{port}");
        tokio::spawn(async move {
            // Small delay to let the server start binding
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                eprintln!("Failed to open browser: {e}");
            }
        });
    }

    start_server(WebConfig {
        port,
        domain: cli
            .domain
            .clone()
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
    })
    .await?;
    Ok(())
}

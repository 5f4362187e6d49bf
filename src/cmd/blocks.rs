//! Block and column mutations — `padctl create-block`, `padctl rename-column`.
//!
//! Batches run strictly sequentially: one connection lifecycle fully opened
//! and closed per pad, fail-fast on the first error.

use anyhow::Result;
use padctl::errors::PadError;
use padctl::ops::BlockContent;
use padctl::pads::Pad;
use padctl::progress::Progress;
use padctl::session::Session;

use crate::Cli;

pub async fn cmd_create_block(
    cli: &Cli,
    pads: &[String],
    title: &str,
    text: &str,
    column: u32,
    hidden: bool,
    comment: Option<&str>,
) -> Result<()> {
    let content = BlockContent {
        title: title.to_string(),
        text: text.to_string(),
        hidden,
        column: super::column_index(column)?,
    };

    let mut session = super::open_session(cli, false).await?;
    let (_, targets) = super::resolve_targets(&session, pads).await?;
    if targets.is_empty() {
        println!("No pad");
        return Ok(());
    }

    let mut progress = Progress::new();
    for (i, pad) in targets.iter().enumerate() {
        super::inter_pad_pause(cli, i).await;
        progress.start(&format!("Creating block in pad {pad}"));
        let result = create_on_pad(&mut session, pad, &content, comment, &mut progress).await;
        session.close_connection(pad.id).await;
        match result {
            Ok(block_id) => {
                progress.finish();
                tracing::debug!(pad = pad.id, block_id, "block created");
            }
            Err(e) => {
                progress.fail();
                return Err(e.into());
            }
        }
    }
    Ok(())
}

async fn create_on_pad(
    session: &mut Session,
    pad: &Pad,
    content: &BlockContent,
    comment: Option<&str>,
    progress: &mut Progress,
) -> Result<String, PadError> {
    let conn = session.connection(pad).await?;
    let block_id = conn.create_block(content).await?;
    if let Some(comment) = comment {
        progress.start("adding comment");
        let conn = session.connection(pad).await?;
        conn.comment_block(&block_id, &content.title, comment).await?;
    }
    Ok(block_id)
}

pub async fn cmd_rename_column(
    cli: &Cli,
    pads: &[String],
    column: u32,
    title: &str,
) -> Result<()> {
    let index = super::column_index(column)?;

    let mut session = super::open_session(cli, false).await?;
    let (_, targets) = super::resolve_targets(&session, pads).await?;
    if targets.is_empty() {
        println!("No pad");
        return Ok(());
    }

    let mut progress = Progress::new();
    for (i, pad) in targets.iter().enumerate() {
        super::inter_pad_pause(cli, i).await;
        progress.start(&format!("Renaming column {column} of pad {pad}"));
        let result = async {
            let conn = session.connection(pad).await?;
            conn.rename_column(index, title).await
        }
        .await;
        session.close_connection(pad.id).await;
        match result {
            Ok(()) => progress.finish(),
            Err(e) => {
                progress.fail();
                return Err(e.into());
            }
        }
    }
    Ok(())
}

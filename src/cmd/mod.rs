//! CLI command implementations.
//!
//! | Module   | Commands handled                          |
//! |----------|-------------------------------------------|
//! | `blocks` | `CreateBlock`, `RenameColumn`             |
//! | `list`   | `List`                                    |
//! | `export` | `Export`                                  |
//! | `auth`   | `Login`, `Cookie`                         |
//! | `serve`  | `Serve`                                   |

use anyhow::Result;
use padctl::credentials::Credentials;
use padctl::pads::{self, Pad, PadsOnAccount};
use padctl::session::Session;

use crate::Cli;

pub mod auth;
pub mod blocks;
pub mod export;
pub mod list;
pub mod serve;

pub use auth::{cmd_cookie, cmd_login};
pub use blocks::{cmd_create_block, cmd_rename_column};
pub use export::cmd_export;
pub use list::cmd_list;
pub use serve::cmd_serve;

/// Build a session from the CLI boundary. With `needed`, a missing cookie is
/// an error; otherwise the session may stay anonymous.
pub(crate) async fn open_session(cli: &Cli, needed: bool) -> Result<Session> {
    let credentials = Credentials::from_cli_args(cli.cookie.clone());
    let session = Session::from_credentials(&credentials, needed, cli.domain.clone()).await?;
    Ok(session)
}

/// The pad names a batch command targets; `created` when none were given.
pub(crate) fn target_names(pads: &[String]) -> Vec<String> {
    if pads.is_empty() {
        vec!["created".to_string()]
    } else {
        pads.to_vec()
    }
}

/// Fetch the account snapshot and resolve the targets against it.
pub(crate) async fn resolve_targets(
    session: &Session,
    pads: &[String],
) -> Result<(PadsOnAccount, Vec<Pad>)> {
    let snapshot = pads::fetch_pads(session).await?;
    let targets = pads::resolve_collection(&target_names(pads), &snapshot, session).await?;
    Ok((snapshot, targets))
}

/// Optional fixed pause between pads, to avoid hammering the service.
pub(crate) async fn inter_pad_pause(cli: &Cli, index: usize) {
    if index > 0 {
        if let Some(delay) = cli.delay.filter(|d| *d > 0.0) {
            tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
        }
    }
}

/// Convert a one-based CLI column number to the protocol's zero-based index.
pub(crate) fn column_index(column: u32) -> Result<u32> {
    column
        .checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("Column numbers start at 1"))
}

//! Pad mutations: block creation/edit, comments, column renames.
//!
//! Each operation is one command over the pad's connection, expressed as the
//! fixed positional argument tuple the external protocol defines. Column
//! indices are zero-based here; user-facing surfaces convert at the boundary.

use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::connection::Connection;
use crate::errors::PadError;

const ADD_BLOCK: &str = "ajouterbloc";
const MODIFY_BLOCK: &str = "modifierbloc";
const COMMENT_BLOCK: &str = "commenterbloc";
const RENAME_COLUMN: &str = "modifiertitrecolonne";

/// Content of a block to create or edit.
#[derive(Debug, Clone, Default)]
pub struct BlockContent {
    pub title: String,
    pub text: String,
    pub hidden: bool,
    /// Zero-based column index.
    pub column: u32,
}

/// A locally-unique block id: current millis plus a short random suffix.
/// Uniqueness is only required within one pad's lifetime.
fn synthesize_block_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("bloc-id-{}{}", Utc::now().timestamp_millis(), &suffix[..5])
}

impl Connection {
    /// Create a block and return the server-assigned block id.
    pub async fn create_block(&mut self, content: &BlockContent) -> Result<String, PadError> {
        self.send_block(ADD_BLOCK, synthesize_block_id(), content)
            .await
    }

    /// Edit an existing block; same payload shape, no id synthesis.
    pub async fn edit_block(
        &mut self,
        block_id: &str,
        content: &BlockContent,
    ) -> Result<String, PadError> {
        self.send_block(MODIFY_BLOCK, block_id.to_string(), content)
            .await
    }

    async fn send_block(
        &mut self,
        command: &str,
        block_id: String,
        content: &BlockContent,
    ) -> Result<String, PadError> {
        let cfg = self.config().clone();
        // 15 positional fields; the five empty strings are media-related
        // fields reserved by the protocol.
        let args = vec![
            json!(block_id),
            json!(cfg.pad_id.to_string()),
            json!(cfg.pad_hash),
            json!(content.title),
            json!(content.text),
            json!(""),
            json!(""),
            json!(""),
            json!(""),
            json!(""),
            json!(cfg.color),
            json!(content.column),
            json!(content.hidden),
            json!(cfg.username),
            json!(cfg.name),
        ];
        let reply = self.run(command, args).await?;
        match reply.get("bloc").and_then(Value::as_str) {
            Some(id) => Ok(id.to_string()),
            None => Err(PadError::CommandFailed {
                command: command.to_string(),
                pad: self.pad_label(),
                reply: reply.to_string(),
            }),
        }
    }

    /// Add a comment on a block.
    pub async fn comment_block(
        &mut self,
        block_id: &str,
        title: &str,
        text: &str,
    ) -> Result<(), PadError> {
        let cfg = self.config().clone();
        self.run(
            COMMENT_BLOCK,
            vec![
                json!(block_id),
                json!(cfg.pad_id.to_string()),
                json!(title),
                json!(text),
                json!(cfg.color),
                json!(cfg.username),
                json!(cfg.name),
            ],
        )
        .await?;
        Ok(())
    }

    /// Rename a column (zero-based index).
    pub async fn rename_column(&mut self, column: u32, title: &str) -> Result<(), PadError> {
        let cfg = self.config().clone();
        self.run(
            RENAME_COLUMN,
            vec![
                json!(cfg.pad_id.to_string()),
                json!(title),
                json!(column),
                json!(cfg.username),
            ],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::scripted_connection;

    #[test]
    fn synthesized_block_ids_are_distinct() {
        let a = synthesize_block_id();
        let b = synthesize_block_id();
        assert!(a.starts_with("bloc-id-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn create_block_sends_fifteen_fields_and_returns_server_id() {
        let (mut conn, sent) = scripted_connection(
            7,
            vec![json!(["ajouterbloc", {"bloc": "bloc-id-server"}])],
        );
        let content = BlockContent {
            title: "Hello".into(),
            text: "World".into(),
            hidden: false,
            column: 2,
        };
        let id = conn.create_block(&content).await.unwrap();
        assert_eq!(id, "bloc-id-server");

        let frames = sent.lock().unwrap();
        let frame = frames[0].as_array().unwrap();
        assert_eq!(frame[0], "ajouterbloc");
        // command + 15 positional fields
        assert_eq!(frame.len(), 16);
        assert!(frame[1].as_str().unwrap().starts_with("bloc-id-"));
        assert_eq!(frame[2], "7");
        assert_eq!(frame[3], "abc");
        assert_eq!(frame[4], "Hello");
        assert_eq!(frame[5], "World");
        assert_eq!(frame[11], "#112233");
        assert_eq!(frame[12], 2);
        assert_eq!(frame[13], false);
        assert_eq!(frame[14], "alice");
        assert_eq!(frame[15], "Alice A.");
    }

    #[tokio::test]
    async fn edit_block_reuses_the_given_id() {
        let (mut conn, sent) = scripted_connection(
            7,
            vec![json!(["modifierbloc", {"bloc": "bloc-id-existing"}])],
        );
        let id = conn
            .edit_block("bloc-id-existing", &BlockContent::default())
            .await
            .unwrap();
        assert_eq!(id, "bloc-id-existing");
        let frames = sent.lock().unwrap();
        assert_eq!(frames[0][1], "bloc-id-existing");
    }

    #[tokio::test]
    async fn comment_block_sends_seven_fields() {
        let (mut conn, sent) =
            scripted_connection(7, vec![json!(["commenterbloc", null])]);
        conn.comment_block("bloc-1", "Re", "Nice").await.unwrap();
        let frames = sent.lock().unwrap();
        let frame = frames[0].as_array().unwrap();
        assert_eq!(frame.len(), 8);
        assert_eq!(
            frame[1..].iter().collect::<Vec<_>>(),
            vec![
                &json!("bloc-1"),
                &json!("7"),
                &json!("Re"),
                &json!("Nice"),
                &json!("#112233"),
                &json!("alice"),
                &json!("Alice A.")
            ]
        );
    }

    #[tokio::test]
    async fn rename_column_sends_exactly_one_frame_with_the_fixed_payload() {
        let (mut conn, sent) =
            scripted_connection(9, vec![json!(["modifiertitrecolonne", null])]);
        conn.rename_column(3, "New title").await.unwrap();
        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0],
            json!(["modifiertitrecolonne", "9", "New title", 3, "alice"])
        );
    }

    #[tokio::test]
    async fn reply_without_block_id_is_command_failed() {
        let (mut conn, _sent) =
            scripted_connection(7, vec![json!(["ajouterbloc", {}])]);
        let err = conn
            .create_block(&BlockContent::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PadError::CommandFailed { .. }));
    }
}

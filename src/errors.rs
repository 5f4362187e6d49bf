//! Typed error taxonomy for padctl.
//!
//! One enum covers the failure families callers branch on:
//! - `NotLoggedIn` / `MissingCookie` — authentication problems, user-facing
//! - `Connection` — the service could not be reached at all
//! - `Identification` / `FolderNotFound` — a pad reference did not resolve
//! - `CommandFailed` / `CommandTimeout` — a socket command went wrong
//! - `ExportUnauthorized` — the export endpoints rejected the session
//!
//! Callers pattern-match variants; messages are for display only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PadError {
    #[error("Not logged in — run `padctl login` or pass --cookie")]
    NotLoggedIn,

    #[error("Can't reach the service, check your internet connection: {source}")]
    Connection {
        #[source]
        source: reqwest::Error,
    },

    #[error("Could not extract a pad ID from '{designator}'")]
    Identification { designator: String },

    #[error("Can't find folder {name}")]
    FolderNotFound { name: String },

    #[error("Can't run command {command} on pad {pad} (reply: {reply})")]
    CommandFailed {
        command: String,
        pad: String,
        reply: String,
    },

    #[error("No reply to command {command} on pad {pad} within {timeout_secs}s")]
    CommandTimeout {
        command: String,
        pad: String,
        timeout_secs: u64,
    },

    #[error("The service refused to export pad {pad}: not logged in")]
    ExportUnauthorized { pad: String },

    #[error("Can't get cookie, please pass --cookie or use `padctl cookie set`")]
    MissingCookie,

    #[error("Can't extract embedded page data: {0}")]
    Scrape(String),

    #[error("Socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PadError {
    /// True for outcomes that mean a single pad reference was bad rather
    /// than the whole session.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            PadError::Identification { .. } | PadError::FolderNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_names_command_and_pad() {
        let err = PadError::CommandFailed {
            command: "ajouterbloc".into(),
            pad: "#42".into(),
            reply: "[\"erreur\",null]".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ajouterbloc"));
        assert!(msg.contains("#42"));
        assert!(msg.contains("erreur"));
    }

    #[test]
    fn command_timeout_carries_duration() {
        let err = PadError::CommandTimeout {
            command: "connexion".into(),
            pad: "#1".into(),
            timeout_secs: 10,
        };
        assert!(err.to_string().contains("10"));
        assert!(matches!(err, PadError::CommandTimeout { .. }));
    }

    #[test]
    fn identification_error_carries_designator() {
        let err = PadError::Identification {
            designator: "not-a-pad".into(),
        };
        match &err {
            PadError::Identification { designator } => assert_eq!(designator, "not-a-pad"),
            _ => panic!("Expected Identification variant"),
        }
        assert!(err.is_resolution_failure());
    }

    #[test]
    fn auth_variants_are_distinct() {
        assert!(matches!(PadError::NotLoggedIn, PadError::NotLoggedIn));
        assert!(matches!(PadError::MissingCookie, PadError::MissingCookie));
        assert!(!matches!(PadError::NotLoggedIn, PadError::MissingCookie));
        assert!(!PadError::NotLoggedIn.is_resolution_failure());
    }

    #[test]
    fn export_unauthorized_names_pad() {
        let err = PadError::ExportUnauthorized { pad: "#7".into() };
        assert!(err.to_string().contains("#7"));
    }

    #[test]
    fn all_variants_implement_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&PadError::NotLoggedIn);
        assert_std_error(&PadError::FolderNotFound { name: "x".into() });
        assert_std_error(&PadError::Scrape("no script tag".into()));
    }
}

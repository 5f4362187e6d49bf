//! Cookie persistence and the credentials boundary type.
//!
//! The service's session token is an opaque string carried as a cookie. It is
//! persisted as a single plain-text file, overwritten wholesale on save. No
//! expiry tracking: a stale token simply makes later authentication probes
//! report "not logged in".

use std::path::PathBuf;

use crate::errors::PadError;

/// Environment override for the cookie file location (used by tests).
pub const COOKIE_FILE_ENV: &str = "PADCTL_COOKIE_FILE";

const COOKIE_FILE_NAME: &str = ".padctl_cookie";

/// Where the session token lives on disk.
pub fn cookie_file() -> PathBuf {
    if let Ok(path) = std::env::var(COOKIE_FILE_ENV) {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(COOKIE_FILE_NAME)
}

/// The persisted cookie store: one token, one file.
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new() -> Self {
        Self {
            path: cookie_file(),
        }
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// The stored token, if any. Surrounding whitespace is not part of it.
    pub fn load(&self) -> Option<String> {
        let token = std::fs::read_to_string(&self.path).ok()?;
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    pub fn save(&self, token: &str) -> Result<(), PadError> {
        std::fs::write(&self.path, token)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), PadError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a session token comes from. Resolved once at the boundary, before a
/// `Session` is constructed.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// A token supplied directly (web UI form, API caller).
    Token(String),
    /// CLI invocation: an optional `--cookie` override, falling back to the
    /// stored file.
    CliArgs { cookie: Option<String> },
    /// The stored cookie file only.
    StoredFile,
}

impl Credentials {
    pub fn from_token(token: impl Into<String>) -> Self {
        Credentials::Token(token.into())
    }

    pub fn from_cli_args(cookie: Option<String>) -> Self {
        Credentials::CliArgs { cookie }
    }

    pub fn from_stored_file() -> Self {
        Credentials::StoredFile
    }

    /// Resolve to a concrete token. `needed` decides whether an absent token
    /// is `MissingCookie` or simply `None` (anonymous operation).
    pub fn resolve(&self, needed: bool) -> Result<Option<String>, PadError> {
        let token = match self {
            Credentials::Token(token) => Some(token.clone()),
            Credentials::CliArgs { cookie } => match cookie {
                Some(token) => Some(token.clone()),
                None => CookieStore::new().load(),
            },
            Credentials::StoredFile => CookieStore::new().load(),
        };
        if token.is_none() && needed {
            return Err(PadError::MissingCookie);
        }
        Ok(token)
    }
}

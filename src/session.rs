//! Session state and user identity resolution.
//!
//! A `Session` is created per CLI invocation (or per web request), holds the
//! authentication cookie and the resolved `UserInfo`, and owns the registry of
//! open pad connections. Nothing is persisted beyond the cookie file.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, LOCATION, SET_COOKIE};
use serde_json::Value;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionConfig};
use crate::credentials::Credentials;
use crate::errors::PadError;
use crate::pads::Pad;
use crate::scrape::{extract_page_data, page_props};

/// The public instance of the service.
pub const DEFAULT_DOMAIN: &str = "https://digipad.app";

/// Name of the service's session cookie.
pub const AUTH_COOKIE: &str = "digipad";

/// `statut` value for a registered account; anything else (notably
/// `"invite"`) is a guest.
pub const STATUS_REGISTERED: &str = "utilisateur";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_COLOR: &str = "#495057";

/// A resolved user identity. Immutable: re-authentication produces a fresh
/// instance. `logged_in == false` means pad-derived data is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    pub name: String,
    pub color: String,
    pub logged_in: bool,
    pub cookie: String,
}

impl UserInfo {
    pub fn not_logged_in(cookie: impl Into<String>) -> Self {
        UserInfo {
            username: String::new(),
            name: String::new(),
            color: DEFAULT_COLOR.to_string(),
            logged_in: false,
            cookie: cookie.into(),
        }
    }

    /// Creator identity embedded in a pad object.
    pub fn from_pad_value(value: &Value) -> Self {
        UserInfo {
            username: string_field(value, "identifiant"),
            name: string_field(value, "nom"),
            color: {
                let c = string_field(value, "couleur");
                if c.is_empty() { DEFAULT_COLOR.to_string() } else { c }
            },
            logged_in: true,
            cookie: String::new(),
        }
    }
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.username)
        } else {
            write!(f, "{} ({})", self.username, self.name)
        }
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// A session against one service instance.
///
/// Owns the HTTP client (redirects disabled: redirect responses are
/// meaningful probes, not detours to follow) and the open pad connections.
pub struct Session {
    pub domain: String,
    pub userinfo: Option<UserInfo>,
    http: reqwest::Client,
    connections: HashMap<u64, Connection>,
}

impl Session {
    pub fn new(domain: Option<String>) -> Result<Self, PadError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| PadError::Other(anyhow::anyhow!("failed to build HTTP client: {e}")))?;
        Ok(Session {
            domain: domain.unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            userinfo: None,
            http,
            connections: HashMap::new(),
        })
    }

    /// Build a session from boundary credentials. With `needed`, a missing
    /// token is an error; otherwise the session starts anonymous.
    pub async fn from_credentials(
        credentials: &Credentials,
        needed: bool,
        domain: Option<String>,
    ) -> Result<Self, PadError> {
        let mut session = Session::new(domain)?;
        if let Some(token) = credentials.resolve(needed)? {
            let userinfo = session.resolve_user(&token).await?;
            session.userinfo = Some(userinfo);
        }
        Ok(session)
    }

    /// The cookie of the authenticated user.
    pub fn cookie(&self) -> Result<&str, PadError> {
        match &self.userinfo {
            Some(user) if !user.cookie.is_empty() => Ok(&user.cookie),
            _ => Err(PadError::NotLoggedIn),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// True when the session holds a logged-in registered account.
    pub fn is_logged_in(&self) -> bool {
        self.userinfo.as_ref().is_some_and(|u| u.logged_in)
    }

    /// Probe the service root with the given token.
    ///
    /// Outcomes are distinct, matchable variants:
    /// - redirect to `/u/{username}` — authenticated, identity scraped from
    ///   the profile page (username-only fallback when scraping fails)
    /// - any non-redirect response — `Ok` with `logged_in: false`
    /// - network failure — `Err(PadError::Connection)`
    pub async fn resolve_user(&self, token: &str) -> Result<UserInfo, PadError> {
        let resp = self
            .http
            .get(format!("{}/", self.domain))
            .header(COOKIE, format!("{AUTH_COOKIE}={token}"))
            .send()
            .await
            .map_err(connection_error)?;

        if !resp.status().is_redirection() {
            debug!(status = %resp.status(), "session probe did not redirect, not logged in");
            return Ok(UserInfo::not_logged_in(token));
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let username = match username_from_location(location) {
            Some(name) => name,
            None => return Ok(UserInfo::not_logged_in(token)),
        };

        // Enrich from the profile page; degrade to a username-only identity
        // when the page or its embedded payload is unusable.
        let mut userinfo = UserInfo {
            username: username.clone(),
            name: String::new(),
            color: DEFAULT_COLOR.to_string(),
            logged_in: true,
            cookie: token.to_string(),
        };
        match self.fetch_profile(&username, token).await {
            Ok(props) => {
                userinfo.name = string_field(&props, "nom");
                let color = string_field(&props, "couleur");
                if !color.is_empty() {
                    userinfo.color = color;
                }
                if let Some(statut) = props.get("statut").and_then(Value::as_str) {
                    userinfo.logged_in = statut == STATUS_REGISTERED;
                }
            }
            Err(e) => warn!(username, error = %e, "could not scrape profile page"),
        }
        Ok(userinfo)
    }

    async fn fetch_profile(&self, username: &str, token: &str) -> Result<Value, PadError> {
        let resp = self
            .http
            .get(format!("{}/u/{username}", self.domain))
            .header(COOKIE, format!("{AUTH_COOKIE}={token}"))
            .send()
            .await
            .map_err(connection_error)?;
        let data = extract_page_data(&resp.text().await?)?;
        Ok(page_props(&data).clone())
    }

    /// Mint an anonymous guest identity from a pad's public page. The
    /// service sets a fresh guest cookie on that response.
    pub async fn resolve_anonymous(&self, pad_id: u64, pad_hash: &str) -> Result<UserInfo, PadError> {
        let resp = self
            .http
            .get(format!("{}/p/{pad_id}/{pad_hash}", self.domain))
            .send()
            .await
            .map_err(connection_error)?;

        let cookie = auth_cookie_from_headers(resp.headers())
            .ok_or_else(|| PadError::Scrape("no guest cookie on pad page".into()))?;
        let data = extract_page_data(&resp.text().await?)?;
        let props = page_props(&data);
        debug!(pad_id, "minted anonymous identity");
        Ok(UserInfo {
            username: string_field(props, "identifiant"),
            name: string_field(props, "nom"),
            color: DEFAULT_COLOR.to_string(),
            logged_in: props
                .get("statut")
                .and_then(Value::as_str)
                .is_some_and(|s| s == STATUS_REGISTERED),
            cookie,
        })
    }

    /// Log in with username and password, store the returned cookie on the
    /// session and resolve the full identity.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<UserInfo, PadError> {
        let resp = self
            .http
            .post(format!("{}/api/connexion", self.domain))
            .json(&serde_json::json!({
                "identifiant": username,
                "motdepasse": password,
            }))
            .send()
            .await
            .map_err(connection_error)?;

        if !resp.status().is_success() {
            return Err(PadError::NotLoggedIn);
        }
        let token = auth_cookie_from_headers(resp.headers()).ok_or(PadError::NotLoggedIn)?;
        let userinfo = self.resolve_user(&token).await?;
        if !userinfo.logged_in {
            return Err(PadError::NotLoggedIn);
        }
        self.userinfo = Some(userinfo.clone());
        Ok(userinfo)
    }

    /// The open connection for a pad, created on first use. Ensures the
    /// session has an identity first, minting an anonymous one from the
    /// pad's public page when there is none.
    pub async fn connection(&mut self, pad: &Pad) -> Result<&mut Connection, PadError> {
        let user = match self.userinfo.clone() {
            Some(user) => user,
            None => {
                let user = self.resolve_anonymous(pad.id, &pad.hash).await?;
                self.userinfo = Some(user.clone());
                user
            }
        };
        let config = ConnectionConfig {
            domain: self.domain.clone(),
            cookie: user.cookie.clone(),
            pad_id: pad.id,
            pad_hash: pad.hash.clone(),
            username: user.username,
            name: user.name,
            color: user.color,
        };
        Ok(self
            .connections
            .entry(pad.id)
            .or_insert_with(|| Connection::new(config)))
    }

    /// Close and evict the connection for one pad, if open.
    pub async fn close_connection(&mut self, pad_id: u64) {
        if let Some(mut conn) = self.connections.remove(&pad_id) {
            conn.close().await;
        }
    }

    /// Close and evict every open connection.
    pub async fn close_all(&mut self) {
        let ids: Vec<u64> = self.connections.keys().copied().collect();
        for id in ids {
            self.close_connection(id).await;
        }
    }
}

/// Map transport-level HTTP failures to the connection-error outcome so the
/// user is told to check connectivity rather than re-login.
pub(crate) fn connection_error(source: reqwest::Error) -> PadError {
    PadError::Connection { source }
}

/// Username from a redirect target like `/u/alice` or a full URL.
fn username_from_location(location: &str) -> Option<String> {
    let trimmed = location.trim_end_matches('/');
    let segment = trimmed.rsplit('/').next()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// The service's auth cookie out of `Set-Cookie` response headers.
fn auth_cookie_from_headers(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{AUTH_COOKIE}=");
    for value in headers.get_all(SET_COOKIE) {
        let Ok(text) = value.to_str() else { continue };
        if let Some(rest) = text.strip_prefix(&prefix) {
            let token = rest.split(';').next().unwrap_or(rest);
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn username_from_redirect_path() {
        assert_eq!(username_from_location("/u/alice"), Some("alice".into()));
        assert_eq!(username_from_location("/u/alice/"), Some("alice".into()));
        assert_eq!(
            username_from_location("https://digipad.app/u/bob"),
            Some("bob".into())
        );
        assert_eq!(username_from_location(""), None);
    }

    #[test]
    fn auth_cookie_is_extracted_from_set_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("other=1; Path=/"),
        );
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("digipad=s%3Aabc.def; Path=/; HttpOnly"),
        );
        assert_eq!(
            auth_cookie_from_headers(&headers),
            Some("s%3Aabc.def".to_string())
        );
    }

    #[test]
    fn missing_auth_cookie_is_none() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("other=1"));
        assert_eq!(auth_cookie_from_headers(&headers), None);
    }

    #[test]
    fn userinfo_display_includes_name_when_present() {
        let mut user = UserInfo::not_logged_in("");
        user.username = "alice".into();
        assert_eq!(user.to_string(), "alice");
        user.name = "Alice A.".into();
        assert_eq!(user.to_string(), "alice (Alice A.)");
    }

    #[test]
    fn creator_identity_from_pad_value() {
        let value = serde_json::json!({
            "identifiant": "bob",
            "nom": "Bob B.",
            "couleur": "#112233"
        });
        let user = UserInfo::from_pad_value(&value);
        assert_eq!(user.username, "bob");
        assert_eq!(user.color, "#112233");
        let bare = UserInfo::from_pad_value(&serde_json::json!({}));
        assert_eq!(bare.color, DEFAULT_COLOR);
    }

    #[test]
    fn cookie_requires_logged_in_identity() {
        let session = Session::new(None).unwrap();
        assert!(matches!(session.cookie(), Err(PadError::NotLoggedIn)));
    }
}

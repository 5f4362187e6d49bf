//! Companion web UI: a few HTML pages mirroring the CLI commands.
//!
//! The service token travels in a `padctl_token` browser cookie; each request
//! builds its own short-lived `Session` from it. Errors render as an inline
//! message on an error page rather than a bare status code.

mod templates;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Form, Router,
    extract::{Path as UrlPath, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::warn;

use crate::errors::PadError;
use crate::export::export_pad;
use crate::ops::BlockContent;
use crate::pads::{self, Pad};
use crate::session::Session;
use templates::{escape, page};

/// Name of the browser cookie holding the service token.
const BROWSER_COOKIE: &str = "padctl_token";

/// Name of the browser cookie holding the chosen service instance. Absent
/// means the instance the server was started with.
const INSTANCE_COOKIE: &str = "padctl_instance";

/// Directory exported archives are written to and served from.
const EXPORT_DIR: &str = "exports";

pub struct WebConfig {
    pub port: u16,
    pub domain: String,
}

pub struct WebState {
    pub domain: String,
}

type SharedState = Arc<WebState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
struct WebError(anyhow::Error);

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = format!(
            r#"<div class="error">{}</div><p><a href="/">Back</a></p>"#,
            escape(&self.0.to_string())
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(page("Error", "", &body)),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for WebError {
    fn from(err: E) -> Self {
        WebError(err.into())
    }
}

type WebResult = Result<Response, WebError>;

// ── Router ────────────────────────────────────────────────────────────

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_form).post(login_submit))
        .route("/instance", get(instance_form).post(instance_submit))
        .route("/logout", get(logout))
        .route("/list", get(list_pads))
        .route("/create", get(create_form).post(create_submit))
        .route(
            "/rename-column",
            get(rename_form).post(rename_submit),
        )
        .route("/export", get(export_form).post(export_submit))
        .route("/exports/{name}", get(serve_export))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Start the UI server with graceful ctrl-c shutdown.
pub async fn start_server(config: WebConfig) -> anyhow::Result<()> {
    let state = Arc::new(WebState {
        domain: config.domain,
    });
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    println!("padctl web UI running at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}

// ── Session plumbing ──────────────────────────────────────────────────

fn browser_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookies.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(&format!("{name}=")) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn browser_token(headers: &HeaderMap) -> Option<String> {
    browser_cookie(headers, BROWSER_COOKIE)
}

/// The service instance the browser selected, falling back to the one the
/// server was started with.
fn request_domain(state: &WebState, headers: &HeaderMap) -> String {
    browser_cookie(headers, INSTANCE_COOKIE).unwrap_or_else(|| state.domain.clone())
}

/// A per-request session resolved from the browser cookies, plus the header
/// line shown at the top of every page.
async fn session_from(
    state: &WebState,
    headers: &HeaderMap,
) -> Result<(Session, String), WebError> {
    let mut session = Session::new(Some(request_domain(state, headers)))?;
    let Some(token) = browser_token(headers) else {
        return Ok((session, user_line(None, false)));
    };
    match session.resolve_user(&token).await {
        Ok(userinfo) => {
            let line = user_line(Some(&userinfo.to_string()), userinfo.logged_in);
            session.userinfo = Some(userinfo);
            Ok((session, line))
        }
        Err(PadError::Connection { .. }) => {
            Ok((session, "Could not verify the connection".to_string()))
        }
        Err(e) => {
            warn!(error = %e, "user resolution failed");
            Ok((session, user_line(None, false)))
        }
    }
}

fn user_line(user: Option<&str>, logged_in: bool) -> String {
    match user {
        Some(display) if logged_in => {
            format!(r#"{} — <a href="/logout">Log out</a>"#, escape(display))
        }
        _ => r#"Not logged in — <a href="/login">Log in</a>"#.to_string(),
    }
}

// ── Pages ─────────────────────────────────────────────────────────────

async fn home(State(state): State<SharedState>, headers: HeaderMap) -> WebResult {
    let (_, user) = session_from(&state, &headers).await?;
    let body = r#"<ul>
<li><a href="/create">Create blocks</a></li>
<li><a href="/rename-column">Rename columns</a></li>
<li><a href="/list">List pads</a></li>
<li><a href="/export">Export pads</a></li>
<li><a href="/instance">Switch instance</a></li>
</ul>"#;
    Ok(Html(page("Home", &user, body)).into_response())
}

async fn login_form(State(state): State<SharedState>, headers: HeaderMap) -> WebResult {
    let (_, user) = session_from(&state, &headers).await?;
    let body = r#"<h3>With username and password</h3>
<form method="post">
<label for="username">Username</label>
<input type="text" name="username" id="username">
<label for="password">Password</label>
<input type="password" name="password" id="password">
<h3>Or paste a session cookie</h3>
<label for="token">Cookie</label>
<input type="text" name="token" id="token">
<button type="submit">Log in</button>
</form>"#;
    Ok(Html(page("Log in", &user, body)).into_response())
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    token: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login_submit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> WebResult {
    let token = if !form.token.is_empty() {
        form.token
    } else {
        let mut session = Session::new(Some(request_domain(&state, &headers)))?;
        let userinfo = session.login(&form.username, &form.password).await?;
        userinfo.cookie
    };
    let cookie = format!("{BROWSER_COOKIE}={token}; Path=/; SameSite=Lax");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to("/"),
    )
        .into_response())
}

async fn instance_form(State(state): State<SharedState>, headers: HeaderMap) -> WebResult {
    let (_, user) = session_from(&state, &headers).await?;
    let body = format!(
        r#"<form method="post">
<label for="instance">Instance</label>
<input type="text" name="instance" id="instance" value="{}">
<button type="submit">Switch</button>
</form>"#,
        escape(&request_domain(&state, &headers))
    );
    Ok(Html(page("Switch instance", &user, &body)).into_response())
}

#[derive(Deserialize)]
struct InstanceForm {
    #[serde(default)]
    instance: String,
}

/// Store the chosen instance in its own browser cookie; an empty field goes
/// back to the instance the server was started with.
async fn instance_submit(
    State(state): State<SharedState>,
    Form(form): Form<InstanceForm>,
) -> WebResult {
    let instance = form.instance.trim();
    let domain = if instance.is_empty() {
        state.domain.clone()
    } else {
        instance.trim_end_matches('/').to_string()
    };
    let cookie = format!("{INSTANCE_COOKIE}={domain}; Path=/; SameSite=Lax");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to("/"),
    )
        .into_response())
}

async fn logout() -> WebResult {
    let cookie = format!("{BROWSER_COOKIE}=; Path=/; Max-Age=0");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to("/"),
    )
        .into_response())
}

async fn list_pads(State(state): State<SharedState>, headers: HeaderMap) -> WebResult {
    let (session, user) = session_from(&state, &headers).await?;
    let snapshot = pads::fetch_pads(&session).await?;
    let all = snapshot.all();
    let body = if all.is_empty() {
        "<p>No pad</p>".to_string()
    } else {
        let mut rows = String::new();
        for pad in &all {
            rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                pad.id,
                escape(&pad.title),
                escape(&pad.access),
            ));
        }
        format!(
            "<table><tr><th>ID</th><th>Title</th><th>Access</th></tr>\n{rows}</table>\n<p>{} pad(s)</p>",
            all.len()
        )
    };
    Ok(Html(page("Pads", &user, &body)).into_response())
}

fn pads_field() -> &'static str {
    r#"<label for="pads">Pads (ids, URLs, categories or folders; one per line or space-separated)</label>
<input type="text" name="pads" id="pads" value="created">"#
}

async fn create_form(State(state): State<SharedState>, headers: HeaderMap) -> WebResult {
    let (_, user) = session_from(&state, &headers).await?;
    let body = format!(
        r#"<form method="post">
{}
<label for="title">Title</label>
<input type="text" name="title" id="title">
<label for="text">Text</label>
<textarea name="text" id="text" rows="4"></textarea>
<label for="column">Column number (starting from 1)</label>
<input type="text" name="column" id="column" value="1">
<label><input type="checkbox" name="hidden" value="on"> Hidden</label>
<label for="comment">Comment (optional)</label>
<input type="text" name="comment" id="comment">
<button type="submit">Create</button>
</form>"#,
        pads_field()
    );
    Ok(Html(page("Create blocks", &user, &body)).into_response())
}

#[derive(Deserialize)]
struct CreateForm {
    pads: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    column: String,
    #[serde(default)]
    hidden: Option<String>,
    #[serde(default)]
    comment: String,
}

async fn create_submit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<CreateForm>,
) -> WebResult {
    let (mut session, user) = session_from(&state, &headers).await?;
    let names = split_names(&form.pads);
    let content = BlockContent {
        title: form.title.clone(),
        text: form.text.clone(),
        hidden: form.hidden.as_deref() == Some("on"),
        column: parse_column(&form.column)?,
    };

    let targets = resolve_names(&session, &names).await?;
    let mut done: Vec<String> = Vec::new();
    for pad in &targets {
        let result = async {
            let conn = session.connection(pad).await?;
            let block_id = conn.create_block(&content).await?;
            if !form.comment.is_empty() {
                let conn = session.connection(pad).await?;
                conn.comment_block(&block_id, &content.title, &form.comment)
                    .await?;
            }
            Ok::<_, PadError>(block_id)
        }
        .await;
        session.close_connection(pad.id).await;
        result?;
        done.push(pad.to_string());
    }
    Ok(done_page(&user, &format!("Block created in {}", done.join(", "))))
}

async fn rename_form(State(state): State<SharedState>, headers: HeaderMap) -> WebResult {
    let (_, user) = session_from(&state, &headers).await?;
    let body = format!(
        r#"<form method="post">
{}
<label for="column">Column number (starting from 1)</label>
<input type="text" name="column" id="column" value="1">
<label for="title">New title</label>
<input type="text" name="title" id="title">
<button type="submit">Rename</button>
</form>"#,
        pads_field()
    );
    Ok(Html(page("Rename columns", &user, &body)).into_response())
}

#[derive(Deserialize)]
struct RenameForm {
    pads: String,
    #[serde(default)]
    column: String,
    #[serde(default)]
    title: String,
}

async fn rename_submit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<RenameForm>,
) -> WebResult {
    let (mut session, user) = session_from(&state, &headers).await?;
    let index = parse_column(&form.column)?;
    let names = split_names(&form.pads);
    let targets = resolve_names(&session, &names).await?;
    let mut done: Vec<String> = Vec::new();
    for pad in &targets {
        let result = async {
            let conn = session.connection(pad).await?;
            conn.rename_column(index, &form.title).await
        }
        .await;
        session.close_connection(pad.id).await;
        result?;
        done.push(pad.to_string());
    }
    Ok(done_page(&user, &format!("Column renamed in {}", done.join(", "))))
}

async fn export_form(State(state): State<SharedState>, headers: HeaderMap) -> WebResult {
    let (_, user) = session_from(&state, &headers).await?;
    let body = format!(
        r#"<form method="post">
{}
<button type="submit">Export</button>
</form>"#,
        pads_field()
    );
    Ok(Html(page("Export pads", &user, &body)).into_response())
}

#[derive(Deserialize)]
struct ExportForm {
    pads: String,
}

async fn export_submit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<ExportForm>,
) -> WebResult {
    let (session, user) = session_from(&state, &headers).await?;
    let names = split_names(&form.pads);
    let targets = resolve_names(&session, &names).await?;
    if targets.is_empty() {
        return Ok(done_page(&user, "No pad to export"));
    }

    let directory = PathBuf::from(EXPORT_DIR);
    std::fs::create_dir_all(&directory).map_err(PadError::Io)?;
    let mut links = String::new();
    for pad in &targets {
        let path = export_pad(&session, pad, Some(&directory)).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        links.push_str(&format!(
            r#"<li><a href="/exports/{0}">{0}</a></li>"#,
            escape(&name)
        ));
    }
    let body = format!(r#"<div class="ok">Exported {} pad(s)</div><ul>{links}</ul>"#, targets.len());
    Ok(Html(page("Export pads", &user, &body)).into_response())
}

async fn serve_export(UrlPath(name): UrlPath<String>) -> Response {
    // Flat directory only; reject anything path-like.
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return (StatusCode::BAD_REQUEST, "invalid file name").into_response();
    }
    match tokio::fs::read(PathBuf::from(EXPORT_DIR).join(&name)).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "application/zip")],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "no such export").into_response(),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

/// One-based column field to the protocol's zero-based index. Empty means
/// the first column; anything unparsable renders as an inline error page
/// instead of a bare 422.
fn parse_column(raw: &str) -> Result<u32, WebError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    let column: u32 = raw
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid column number '{raw}'"))?;
    match column.checked_sub(1) {
        Some(index) => Ok(index),
        None => Err(anyhow::anyhow!("Column numbers start at 1").into()),
    }
}

fn split_names(raw: &str) -> Vec<String> {
    let names: Vec<String> = raw
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        vec!["created".to_string()]
    } else {
        names
    }
}

async fn resolve_names(session: &Session, names: &[String]) -> Result<Vec<Pad>, PadError> {
    let snapshot = pads::fetch_pads(session).await?;
    pads::resolve_collection(names, &snapshot, session).await
}

fn done_page(user: &str, message: &str) -> Response {
    let body = format!(
        r#"<div class="ok">{}</div><p><a href="/">Back</a></p>"#,
        escape(message)
    );
    Html(page("Done", user, &body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        build_router(Arc::new(WebState {
            domain: "https://pads.example".to_string(),
        }))
    }

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }

    #[tokio::test]
    async fn home_renders_without_a_session() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let text = body_text(resp).await;
        assert!(text.contains("padctl"));
        assert!(text.contains("Not logged in"));
    }

    #[tokio::test]
    async fn anonymous_list_shows_no_pads_without_network() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/list").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("No pad"));
    }

    #[tokio::test]
    async fn logout_clears_the_browser_cookie() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.contains("padctl_token="));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn export_download_rejects_path_traversal() {
        let app = test_router();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/exports/..%2Fsecret.zip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn split_names_defaults_to_created() {
        assert_eq!(split_names(""), vec!["created"]);
        assert_eq!(split_names("1 2/abc"), vec!["1", "2/abc"]);
    }

    #[test]
    fn parse_column_converts_to_zero_based() {
        assert_eq!(parse_column("").unwrap(), 0);
        assert_eq!(parse_column(" 3 ").unwrap(), 2);
        assert!(parse_column("0").is_err());
        assert!(parse_column("abc").is_err());
    }

    #[tokio::test]
    async fn bad_column_renders_an_inline_error_page() {
        let app = test_router();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/create")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("pads=created&text=hi&column=abc"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body_text(resp).await;
        assert!(text.contains("Invalid column number"));
        assert!(text.contains(r#"<div class="error">"#));
    }

    #[test]
    fn browser_cookies_are_read_independently() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "padctl_token=tok; padctl_instance=https://other.example"
                .parse()
                .unwrap(),
        );
        assert_eq!(browser_token(&headers).as_deref(), Some("tok"));
        assert_eq!(
            browser_cookie(&headers, INSTANCE_COOKIE).as_deref(),
            Some("https://other.example")
        );
    }

    #[tokio::test]
    async fn instance_form_shows_the_selected_instance() {
        let app = test_router();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/instance")
                    .header(header::COOKIE, "padctl_instance=https://other.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("https://other.example"));
    }

    #[tokio::test]
    async fn instance_switch_sets_the_cookie_and_redirects_home() {
        let app = test_router();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/instance")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("instance=https://other.example/"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.contains("padctl_instance=https://other.example;"));
    }

    #[tokio::test]
    async fn empty_instance_falls_back_to_the_startup_domain() {
        let app = test_router();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/instance")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("instance="))
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.contains("padctl_instance=https://pads.example;"));
    }
}

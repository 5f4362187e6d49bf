//! Pad export: trigger the server-side job, download the archive, rename it
//! from the metadata embedded in the archive itself.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use reqwest::header::COOKIE;
use tracing::debug;

use crate::errors::PadError;
use crate::pads::Pad;
use crate::session::{AUTH_COOKIE, Session};

/// Literal body the export endpoints return for an unauthenticated session,
/// distinct from HTTP-level errors.
const NOT_AUTHENTICATED_SENTINEL: &str = "non_connecte";

/// Name of the metadata entry inside the exported archive.
const METADATA_ENTRY: &str = "donnees.json";

const DOWNLOAD_CHUNK: usize = 65536;

/// Export a pad and return the path of the renamed ZIP file.
pub async fn export_pad(
    session: &Session,
    pad: &Pad,
    directory: Option<&Path>,
) -> Result<PathBuf, PadError> {
    let user = session
        .userinfo
        .as_ref()
        .filter(|u| u.logged_in && !u.cookie.is_empty())
        .ok_or(PadError::NotLoggedIn)?;

    let resp = session
        .http()
        .post(format!("{}/api/exporter-pad", session.domain))
        .header(COOKIE, format!("{AUTH_COOKIE}={}", user.cookie))
        .json(&serde_json::json!({
            "padId": pad.id,
            "identifiant": user.username,
            "admin": "",
        }))
        .send()
        .await
        .map_err(crate::session::connection_error)?
        .error_for_status()?;
    let filename = resp.text().await?;
    check_export_body(&filename, pad)?;
    check_export_filename(&filename)?;
    debug!(pad = pad.id, filename, "export job ready");

    let directory = match directory {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let output = directory.join(&filename);
    download_archive(session, pad, &filename, &output).await?;

    // The title comes from the archive the server built; keep it path-safe.
    let title = read_pad_title(&output)?.replace(['/', '\\'], "_");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let renamed = directory.join(format!("{title}_{}_{stamp}.zip", pad.id));
    fs::rename(&output, &renamed)?;
    Ok(renamed)
}

/// Stream the archive to disk in fixed-size chunks, applying the same
/// sentinel check to the download body.
async fn download_archive(
    session: &Session,
    pad: &Pad,
    filename: &str,
    output: &Path,
) -> Result<(), PadError> {
    let mut resp = session
        .http()
        .get(format!("{}/temp/{filename}", session.domain))
        .send()
        .await
        .map_err(crate::session::connection_error)?
        .error_for_status()?;

    let mut file = fs::File::create(output)?;
    let mut head: Vec<u8> = Vec::new();
    let mut total = 0usize;
    let mut buffer: Vec<u8> = Vec::with_capacity(DOWNLOAD_CHUNK);
    while let Some(chunk) = resp.chunk().await? {
        if head.len() < NOT_AUTHENTICATED_SENTINEL.len() {
            head.extend_from_slice(&chunk);
        }
        total += chunk.len();
        buffer.extend_from_slice(&chunk);
        if buffer.len() >= DOWNLOAD_CHUNK {
            file.write_all(&buffer)?;
            buffer.clear();
        }
    }
    file.write_all(&buffer)?;
    file.flush()?;

    if total == NOT_AUTHENTICATED_SENTINEL.len()
        && head == NOT_AUTHENTICATED_SENTINEL.as_bytes()
    {
        let _ = fs::remove_file(output);
        return Err(PadError::ExportUnauthorized {
            pad: pad.to_string(),
        });
    }
    Ok(())
}

/// The server names the file to download; it must stay a flat file name. A
/// compromised or hostile instance must not steer the write elsewhere.
pub(crate) fn check_export_filename(filename: &str) -> Result<(), PadError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(PadError::Other(anyhow::anyhow!(
            "refusing unsafe export file name {filename:?}"
        )));
    }
    Ok(())
}

/// Classify the export-trigger response body. The sentinel means the export
/// endpoints consider the session unauthenticated.
pub(crate) fn check_export_body(body: &str, pad: &Pad) -> Result<(), PadError> {
    if body == NOT_AUTHENTICATED_SENTINEL {
        Err(PadError::ExportUnauthorized {
            pad: pad.to_string(),
        })
    } else {
        Ok(())
    }
}

/// The pad title stored in the archive's metadata entry.
pub(crate) fn read_pad_title(archive_path: &Path) -> Result<String, PadError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = archive.by_name(METADATA_ENTRY)?;
    let mut raw = String::new();
    entry.read_to_string(&mut raw)?;
    let data: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| PadError::Scrape(format!("invalid {METADATA_ENTRY}: {e}")))?;
    data.get("pad")
        .and_then(|p| p.get("titre"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PadError::Scrape(format!("no pad.titre in {METADATA_ENTRY}")))
}

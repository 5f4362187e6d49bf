//! Pad model, account collection fetching and pad reference resolution.
//!
//! A pad designator accepted on the CLI/web surface can be a bare numeric id,
//! an `id/hash` path, a full pad URL, one of the fixed category keywords
//! (`created`, `visited`, `admin`, `favourite`, `all`) or a folder name/id.
//! Resolution consults the account snapshot first and only then the network.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::PadError;
use crate::scrape::{extract_page_data, page_props};
use crate::session::{Session, UserInfo, connection_error};

/// Fixed category keywords, in listing order.
pub const CATEGORIES: [&str; 4] = ["created", "visited", "admin", "favourite"];

/// A pad on the service. Identity is the numeric id alone; hash and title are
/// mutable metadata. A bare stub (id + hash) is used for pads referenced by
/// URL that were never listed.
#[derive(Debug, Clone)]
pub struct Pad {
    pub id: u64,
    pub hash: String,
    pub title: String,
    pub code: Option<u64>,
    pub access: String,
    pub columns: Vec<String>,
    pub creator: UserInfo,
    pub created: Option<NaiveDateTime>,
}

impl Pad {
    pub fn stub(id: u64, hash: impl Into<String>) -> Self {
        Pad {
            id,
            hash: hash.into(),
            title: String::new(),
            code: None,
            access: "public".to_string(),
            columns: Vec::new(),
            creator: UserInfo::not_logged_in(""),
            created: None,
        }
    }

    /// Build a pad from a service JSON object. `None` when the object lacks
    /// the identity fields.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id").and_then(Value::as_u64)?;
        let hash = value
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Pad {
            id,
            hash,
            title: value
                .get("titre")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            code: value.get("code").and_then(Value::as_u64),
            access: value
                .get("acces")
                .and_then(Value::as_str)
                .unwrap_or("public")
                .to_string(),
            columns: parse_columns(value.get("colonnes")),
            creator: UserInfo::from_pad_value(value),
            created: value
                .get("date")
                .and_then(Value::as_str)
                .and_then(parse_date),
        })
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

impl PartialEq for Pad {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Pad {}

/// Column titles arrive either as a JSON array or as a JSON-encoded string.
fn parse_columns(value: Option<&Value>) -> Vec<String> {
    let as_vec = |v: &Value| -> Vec<String> {
        v.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    match value {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map(|v| as_vec(&v))
            .unwrap_or_default(),
        Some(v) => as_vec(v),
        None => Vec::new(),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    raw.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| chrono::DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_utc()))
}

/// Read-only snapshot of every pad an account can see, grouped into the four
/// fixed categories plus user-defined folders.
#[derive(Debug, Clone, Default)]
pub struct PadsOnAccount {
    pub created: Vec<Pad>,
    pub visited: Vec<Pad>,
    pub admin: Vec<Pad>,
    pub favourite: Vec<Pad>,
    /// folder id → display name
    pub folder_names: HashMap<String, String>,
    /// folder id → member pads (subset of the category union)
    pub folders: HashMap<String, Vec<Pad>>,
    /// id → hash cache for bare-id designators
    pub pad_hashes: HashMap<u64, String>,
}

impl PadsOnAccount {
    /// Union of the four categories, de-duplicated by id, first-seen order.
    pub fn all(&self) -> Vec<Pad> {
        dedup_by_id(
            self.created
                .iter()
                .chain(&self.visited)
                .chain(&self.admin)
                .chain(&self.favourite)
                .cloned()
                .collect(),
        )
    }

    pub fn category(&self, name: &str) -> Option<&[Pad]> {
        match name {
            "created" => Some(&self.created),
            "visited" => Some(&self.visited),
            "admin" => Some(&self.admin),
            "favourite" => Some(&self.favourite),
            _ => None,
        }
    }

    fn find(&self, id: u64) -> Option<&Pad> {
        self.created
            .iter()
            .chain(&self.visited)
            .chain(&self.admin)
            .chain(&self.favourite)
            .find(|pad| pad.id == id)
    }

    fn folder(&self, name: &str) -> Result<&[Pad], PadError> {
        // Folder id first, then display name.
        if let Some(pads) = self.folders.get(name) {
            return Ok(pads);
        }
        for (id, folder_name) in &self.folder_names {
            if folder_name == name {
                if let Some(pads) = self.folders.get(id) {
                    return Ok(pads);
                }
            }
        }
        Err(PadError::FolderNotFound { name: name.into() })
    }
}

fn dedup_by_id(pads: Vec<Pad>) -> Vec<Pad> {
    let mut seen = std::collections::HashSet::new();
    pads.into_iter()
        .filter(|pad| seen.insert(pad.id))
        .collect()
}

/// Parse the account listing payload into a snapshot. Pure; the network side
/// lives in `fetch_pads`.
pub fn parse_account_pads(data: &Value) -> Result<PadsOnAccount, PadError> {
    let props = page_props(data);
    let mut snapshot = PadsOnAccount::default();

    snapshot.created = read_category(props, "padsCrees", &mut snapshot.pad_hashes);
    snapshot.visited = read_category(props, "padsRejoints", &mut snapshot.pad_hashes);
    snapshot.admin = read_category(props, "padsAdmins", &mut snapshot.pad_hashes);
    snapshot.favourite = read_category(props, "padsFavoris", &mut snapshot.pad_hashes);

    let union = snapshot.all();
    if let Some(folders) = props.get("dossiers").and_then(Value::as_array) {
        for folder in folders {
            let Some(folder_id) = folder_id_string(folder.get("id")) else {
                continue;
            };
            let name = folder
                .get("nom")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let members: Vec<u64> = folder
                .get("pads")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(member_id).collect())
                .unwrap_or_default();
            let pads = union
                .iter()
                .filter(|pad| members.contains(&pad.id))
                .cloned()
                .collect();
            snapshot.folder_names.insert(folder_id.clone(), name);
            snapshot.folders.insert(folder_id, pads);
        }
    }
    Ok(snapshot)
}

fn read_category(props: &Value, key: &str, hashes: &mut HashMap<u64, String>) -> Vec<Pad> {
    let pads: Vec<Pad> = props
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Pad::from_value).collect())
        .unwrap_or_default();
    for pad in &pads {
        hashes.insert(pad.id, pad.hash.clone());
    }
    pads
}

fn folder_id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn member_id(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Fetch the account's pad collection.
///
/// An anonymous session yields an empty snapshot without touching the
/// network. A redirect on the listing page means "not authenticated" and also
/// yields an empty snapshot, so batch operations over mixed pad lists degrade
/// gracefully for expired sessions. Any other error status fails.
pub async fn fetch_pads(session: &Session) -> Result<PadsOnAccount, PadError> {
    let Some(user) = session.userinfo.as_ref().filter(|u| !u.cookie.is_empty()) else {
        return Ok(PadsOnAccount::default());
    };

    let resp = session
        .http()
        .get(format!("{}/u/{}", session.domain, user.username))
        .header(
            reqwest::header::COOKIE,
            format!("{}={}", crate::session::AUTH_COOKIE, user.cookie),
        )
        .send()
        .await
        .map_err(connection_error)?;

    if resp.status().is_redirection() {
        debug!("listing page redirected, treating session as anonymous");
        return Ok(PadsOnAccount::default());
    }
    let resp = resp.error_for_status()?;
    let data = extract_page_data(&resp.text().await?)?;
    parse_account_pads(&data)
}

/// A parsed pad designator: id plus optional hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadRef {
    pub id: u64,
    pub hash: String,
}

/// Parse one of the accepted designator shapes:
/// a bare integer, `"{id}"`, `"{id}/"`, `"{id}/{hash}"`, or a URL ending in
/// `/p/{id}[/{hash}]`.
pub fn parse_designator(designator: &str) -> Result<PadRef, PadError> {
    let identification = || PadError::Identification {
        designator: designator.to_string(),
    };

    if let Ok(id) = designator.parse::<u64>() {
        return Ok(PadRef {
            id,
            hash: String::new(),
        });
    }

    let trimmed = designator.trim_end_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();
    match segments.as_slice() {
        // "{id}/" collapses to a single segment
        [only] => {
            let id = only.parse().map_err(|_| identification())?;
            Ok(PadRef {
                id,
                hash: String::new(),
            })
        }
        [.., second_last, last] => {
            // URL without a hash: the trailing segment after the literal
            // "p" path marker is the id itself.
            if *second_last == "p" {
                let id = last.parse().map_err(|_| identification())?;
                return Ok(PadRef {
                    id,
                    hash: String::new(),
                });
            }
            let id = second_last.parse().map_err(|_| identification())?;
            Ok(PadRef {
                id,
                hash: (*last).to_string(),
            })
        }
        [] => Err(identification()),
    }
}

/// Resolve a single designator into a concrete pad.
///
/// Lookup order: exact id match in the snapshot, then a direct fetch of the
/// pad's public page, degrading to a bare stub on any network or parse
/// failure.
pub async fn resolve(
    designator: &str,
    snapshot: &PadsOnAccount,
    session: &Session,
) -> Result<Pad, PadError> {
    let mut padref = parse_designator(designator)?;
    if padref.hash.is_empty() {
        if let Some(hash) = snapshot.pad_hashes.get(&padref.id) {
            padref.hash = hash.clone();
        }
    }
    if let Some(pad) = snapshot.find(padref.id) {
        return Ok(pad.clone());
    }
    Ok(fetch_pad_info(session, padref.id, &padref.hash).await)
}

/// Fetch pad metadata from its public page; a bare stub on any failure.
async fn fetch_pad_info(session: &Session, id: u64, hash: &str) -> Pad {
    let url = format!("{}/p/{id}/{hash}", session.domain);
    let page = async {
        let resp = session.http().get(&url).send().await?;
        resp.text().await
    }
    .await;
    let html = match page {
        Ok(html) => html,
        Err(e) => {
            warn!(id, error = %e, "pad page fetch failed, using bare stub");
            return Pad::stub(id, hash);
        }
    };
    let Ok(data) = extract_page_data(&html) else {
        return Pad::stub(id, hash);
    };
    page_props(&data)
        .get("pad")
        .and_then(Pad::from_value)
        .unwrap_or_else(|| Pad::stub(id, hash))
}

/// Resolve a list of names (categories, `all`, folders, individual
/// designators) into pads, de-duplicated by id in first-seen order.
pub async fn resolve_collection(
    names: &[String],
    snapshot: &PadsOnAccount,
    session: &Session,
) -> Result<Vec<Pad>, PadError> {
    let mut out: Vec<Pad> = Vec::new();
    for name in names {
        if let Some(pads) = snapshot.category(name) {
            out.extend_from_slice(pads);
            continue;
        }
        if name == "all" {
            out.extend(snapshot.all());
            continue;
        }
        match resolve(name, snapshot, session).await {
            Ok(pad) => out.push(pad),
            Err(PadError::Identification { .. }) => {
                out.extend_from_slice(snapshot.folder(name)?);
            }
            Err(other) => return Err(other),
        }
    }
    Ok(dedup_by_id(out))
}

//! Extraction of the JSON payload the service embeds in its HTML pages.
//!
//! Every page of the service ships its data inside a
//! `<script id="vike_pageContext">…</script>` tag. All scraping goes through
//! `extract_page_data`; callers then walk the `pageProps` object.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::errors::PadError;

fn page_context_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<script id="vike_pageContext"[^>]*>(.*?)</script>"#)
            .expect("static regex")
    })
}

/// Pull the embedded JSON document out of a service HTML response.
pub fn extract_page_data(html: &str) -> Result<Value, PadError> {
    let captures = page_context_re()
        .captures(html)
        .ok_or_else(|| PadError::Scrape("no vike_pageContext script tag".into()))?;
    let raw = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    serde_json::from_str(raw).map_err(|e| PadError::Scrape(format!("invalid embedded JSON: {e}")))
}

/// The `pageProps` object of an embedded payload, or the payload itself when
/// the wrapper is absent (some pages inline the props directly).
pub fn page_props(data: &Value) -> &Value {
    data.get("pageProps").unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_embedded_json() {
        let html = r#"<html><body>
            <script id="vike_pageContext" type="application/json">{"pageProps":{"nom":"Alice"}}</script>
        </body></html>"#;
        let data = extract_page_data(html).unwrap();
        assert_eq!(data["pageProps"]["nom"], "Alice");
    }

    #[test]
    fn missing_tag_is_scrape_error() {
        let err = extract_page_data("<html>nothing here</html>").unwrap_err();
        assert!(matches!(err, PadError::Scrape(_)));
    }

    #[test]
    fn invalid_json_is_scrape_error() {
        let html = r#"<script id="vike_pageContext">{broken</script>"#;
        let err = extract_page_data(html).unwrap_err();
        assert!(matches!(err, PadError::Scrape(_)));
    }

    #[test]
    fn multiline_payload_is_captured() {
        let html = "<script id=\"vike_pageContext\">{\n\"a\": 1\n}</script>";
        let data = extract_page_data(html).unwrap();
        assert_eq!(data["a"], 1);
    }

    #[test]
    fn page_props_falls_back_to_root() {
        let wrapped: Value = serde_json::json!({"pageProps": {"x": 1}});
        let bare: Value = serde_json::json!({"x": 2});
        assert_eq!(page_props(&wrapped)["x"], 1);
        assert_eq!(page_props(&bare)["x"], 2);
    }
}

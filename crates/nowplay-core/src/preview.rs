//! Preview-URL resolver.
//!
//! The provider stopped returning preview clips through its documented
//! API, but the public embed page still carries one in an inline JSON
//! blob. We fetch the page and scan the raw HTML for that blob. This is
//! a best-effort workaround over an undocumented page structure; revisit
//! the pattern if upstream changes its markup.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ResolveError;

fn audio_preview_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""audioPreview"\s*:\s*\{\s*"url"\s*:\s*"([^"]+)""#)
            .expect("audio preview pattern is valid")
    })
}

/// Extracts the first preview URL from raw embed-page HTML. `None` when
/// the page carries no preview, which is a frequent and expected outcome.
pub fn extract_preview_url(html: &str) -> Option<String> {
    audio_preview_pattern()
        .captures(html)
        .map(|caps| caps[1].to_string())
}

/// Fetches the embed document for a track id and scans it for a preview
/// URL. Errors only on transport or status failure reading the document.
pub async fn resolve_preview(
    http: &reqwest::Client,
    embed_url: &str,
    track_id: &str,
) -> Result<Option<String>, ResolveError> {
    let url = format!("{}/{}", embed_url.trim_end_matches('/'), track_id);
    let response = http.get(&url).send().await?;

    if !response.status().is_success() {
        return Err(ResolveError::Status(response.status()));
    }

    let html = response.text().await?;
    Ok(extract_preview_url(&html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_url() {
        let html = r#"<script>{"audioPreview":{"url":"https://p.example/clip/9f2.mp3"},"duration":29}</script>"#;
        assert_eq!(
            extract_preview_url(html).as_deref(),
            Some("https://p.example/clip/9f2.mp3")
        );
    }

    #[test]
    fn test_tolerates_whitespace() {
        let html = r#""audioPreview" : {
            "url" : "https://p.example/clip/abc.mp3"
        }"#;
        assert_eq!(
            extract_preview_url(html).as_deref(),
            Some("https://p.example/clip/abc.mp3")
        );
    }

    #[test]
    fn test_missing_pattern_is_absent() {
        assert_eq!(extract_preview_url("<html><body>no preview here</body></html>"), None);
        assert_eq!(extract_preview_url(""), None);
    }

    #[test]
    fn test_first_match_wins() {
        let html = r#""audioPreview":{"url":"https://p.example/first"} "audioPreview":{"url":"https://p.example/second"}"#;
        assert_eq!(
            extract_preview_url(html).as_deref(),
            Some("https://p.example/first")
        );
    }
}

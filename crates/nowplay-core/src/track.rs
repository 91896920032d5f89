//! Provider track payloads and their normalized, display-ready form.

use serde::{Deserialize, Serialize};

// ── wire shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApiTrack {
    pub name: String,
    pub artists: Vec<ApiArtist>,
    pub album: ApiAlbum,
    pub external_urls: ApiExternalUrls,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiImage {
    pub url: String,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct ApiExternalUrls {
    pub spotify: String,
}

/// 200 body of the currently-playing endpoint. `item` may be null.
#[derive(Debug, Deserialize)]
pub struct NowPlayingResponse {
    pub item: Option<ApiTrack>,
    #[serde(default)]
    pub is_playing: bool,
}

/// Body of the recently-played endpoint (queried with limit=1).
#[derive(Debug, Deserialize)]
pub struct RecentlyPlayedResponse {
    #[serde(default)]
    pub items: Vec<RecentItem>,
}

#[derive(Debug, Deserialize)]
pub struct RecentItem {
    pub track: ApiTrack,
}

// ── normalized record ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkSize {
    Small,
    Medium,
    Large,
}

/// Artwork size class from pixel height. Pure; the boundaries are part of
/// the widget contract.
pub fn size_class(height: u32) -> ArtworkSize {
    if height <= 64 {
        ArtworkSize::Small
    } else if height <= 300 {
        ArtworkSize::Medium
    } else {
        ArtworkSize::Large
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkImage {
    pub url: String,
    pub size: ArtworkSize,
}

/// Normalized projection of a provider track payload. Recomputed fresh on
/// every fetch cycle; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub is_playing: bool,
    pub name: String,
    /// Artist names joined with ", " in provider order.
    pub artist: String,
    pub album: String,
    pub images: Vec<ArtworkImage>,
    pub url: String,
    pub id: String,
}

impl TrackRecord {
    pub fn from_api(track: ApiTrack, is_playing: bool) -> Self {
        Self {
            is_playing,
            name: track.name,
            artist: track
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            album: track.album.name,
            images: track
                .album
                .images
                .into_iter()
                .map(|img| ArtworkImage {
                    size: size_class(img.height),
                    url: img.url,
                })
                .collect(),
            url: track.external_urls.spotify,
            id: track.id,
        }
    }

    /// First artwork variant of the given size class, if any.
    pub fn artwork(&self, size: ArtworkSize) -> Option<&str> {
        self.images
            .iter()
            .find(|img| img.size == size)
            .map(|img| img.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_class_boundaries() {
        assert_eq!(size_class(64), ArtworkSize::Small);
        assert_eq!(size_class(65), ArtworkSize::Medium);
        assert_eq!(size_class(300), ArtworkSize::Medium);
        assert_eq!(size_class(301), ArtworkSize::Large);
    }

    fn sample_track() -> ApiTrack {
        serde_json::from_value(serde_json::json!({
            "name": "Paranoid Android",
            "artists": [{ "name": "Radiohead" }, { "name": "Someone Else" }],
            "album": {
                "name": "OK Computer",
                "images": [
                    { "url": "https://img/640", "height": 640 },
                    { "url": "https://img/300", "height": 300 },
                    { "url": "https://img/64", "height": 64 }
                ]
            },
            "external_urls": { "spotify": "https://open.example/track/6LgJv" },
            "id": "6LgJv"
        }))
        .unwrap()
    }

    #[test]
    fn test_normalization() {
        let record = TrackRecord::from_api(sample_track(), true);
        assert!(record.is_playing);
        assert_eq!(record.artist, "Radiohead, Someone Else");
        assert_eq!(record.album, "OK Computer");
        assert_eq!(record.id, "6LgJv");
        assert_eq!(
            record.images.iter().map(|i| i.size).collect::<Vec<_>>(),
            vec![ArtworkSize::Large, ArtworkSize::Medium, ArtworkSize::Small]
        );
    }

    #[test]
    fn test_artwork_lookup() {
        let record = TrackRecord::from_api(sample_track(), false);
        assert_eq!(record.artwork(ArtworkSize::Medium), Some("https://img/300"));
        let none = TrackRecord {
            images: Vec::new(),
            ..record
        };
        assert_eq!(none.artwork(ArtworkSize::Medium), None);
    }

    #[test]
    fn test_now_playing_item_may_be_null() {
        let response: NowPlayingResponse =
            serde_json::from_str(r#"{ "item": null, "is_playing": false }"#).unwrap();
        assert!(response.item.is_none());
    }
}

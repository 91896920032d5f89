use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Long-lived secrets for the refresh exchange. Left empty in the config
/// file by default; the environment variables `SPOTIFY_CLIENT_ID`,
/// `SPOTIFY_CLIENT_SECRET` and `SPOTIFY_REFRESH_TOKEN` take precedence
/// so the TOML file never has to contain them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: String,
}

/// Provider endpoint URLs. Defaults point at production; tests override
/// them to target a local mock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_now_playing_url")]
    pub now_playing_url: String,
    #[serde(default = "default_recently_played_url")]
    pub recently_played_url: String,
    /// Base URL for the public embed page; the track id is appended.
    #[serde(default = "default_embed_url")]
    pub embed_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Seconds between now-playing polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Target volume for preview playback (0.0 - 1.0).
    #[serde(default = "default_preview_volume")]
    pub preview_volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// File-backed token store shared between server and widget.
    #[serde(default = "default_token_store")]
    pub token_store: PathBuf,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            now_playing_url: default_now_playing_url(),
            recently_played_url: default_recently_played_url(),
            embed_url: default_embed_url(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            preview_volume: default_preview_volume(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            token_store: default_token_store(),
        }
    }
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_now_playing_url() -> String {
    "https://api.spotify.com/v1/me/player/currently-playing".to_string()
}

fn default_recently_played_url() -> String {
    "https://api.spotify.com/v1/me/player/recently-played?limit=1".to_string()
}

fn default_embed_url() -> String {
    "https://open.spotify.com/embed/track".to_string()
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_preview_volume() -> f32 {
    0.2
}

fn default_token_store() -> PathBuf {
    platform::data_dir().join("token.json")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config.with_env_overrides());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config.with_env_overrides())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = v;
        }
        if let Ok(v) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = v;
        }
        if let Ok(v) = std::env::var("SPOTIFY_REFRESH_TOKEN") {
            self.spotify.refresh_token = v;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.http.enabled);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert_eq!(config.widget.poll_interval_secs, 60);
        assert!(config.endpoints.token_url.starts_with("https://"));
        assert!(config.paths.token_store.ends_with("nowplay/token.json"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [widget]
            poll_interval_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.widget.poll_interval_secs, 30);
        assert_eq!(config.widget.preview_volume, 0.2);
        assert_eq!(config.http.port, 8990);
    }
}

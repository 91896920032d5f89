//! Now-playing fetcher.
//!
//! One fetch cycle walks a small state machine over the provider's
//! responses: 204 substitutes the most recent history entry, 401 forces
//! exactly one token refresh and one retry, anything else non-success is
//! an error for this cycle. All requests within a cycle run sequentially.

use reqwest::StatusCode;
use tracing::debug;

use crate::auth::TokenCache;
use crate::config::{Config, EndpointsConfig};
use crate::error::{FetchError, ResolveError};
use crate::preview;
use crate::store::TokenStore;
use crate::track::{NowPlayingResponse, RecentlyPlayedResponse, TrackRecord};

pub struct SpotifyClient {
    http: reqwest::Client,
    endpoints: EndpointsConfig,
    tokens: TokenCache,
}

impl SpotifyClient {
    pub fn new(config: &Config, store: Option<TokenStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints: config.endpoints.clone(),
            tokens: TokenCache::new(config, store),
        }
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Fetches the currently playing track, falling back to the single
    /// most recent history entry when nothing is live. `Ok(None)` means
    /// there is nothing to show at all.
    pub async fn fetch_current(&self) -> Result<Option<TrackRecord>, FetchError> {
        let token = self.tokens.get_token(&self.http, false).await?;
        let response = self.query_now_playing(&token).await?;

        match response.status() {
            StatusCode::NO_CONTENT => return self.fetch_recent(&token).await,
            StatusCode::UNAUTHORIZED => {
                // Exactly one forced refresh and one retry; a second 401
                // propagates rather than looping.
                debug!("now-playing returned 401, forcing one token refresh");
                let token = self.tokens.get_token(&self.http, true).await?;
                let retry = self.query_now_playing(&token).await?;
                return match retry.status() {
                    StatusCode::NO_CONTENT => self.fetch_recent(&token).await,
                    status if !status.is_success() => Err(FetchError::Status(status)),
                    _ => Self::parse_now_playing(retry).await,
                };
            }
            status if !status.is_success() => return Err(FetchError::Status(status)),
            _ => {}
        }

        Self::parse_now_playing(response).await
    }

    /// Resolves the short preview-clip URL for a track id via the embed
    /// page workaround. `Ok(None)` is common; not every track has one.
    pub async fn resolve_preview(&self, track_id: &str) -> Result<Option<String>, ResolveError> {
        preview::resolve_preview(&self.http, &self.endpoints.embed_url, track_id).await
    }

    async fn query_now_playing(&self, token: &str) -> Result<reqwest::Response, FetchError> {
        Ok(self
            .http
            .get(&self.endpoints.now_playing_url)
            .bearer_auth(token)
            .send()
            .await?)
    }

    async fn parse_now_playing(
        response: reqwest::Response,
    ) -> Result<Option<TrackRecord>, FetchError> {
        let body: NowPlayingResponse = response.json().await?;
        // A 200 with a null item is "nothing to show", not the recent
        // fallback; only 204 triggers that.
        Ok(body
            .item
            .map(|track| TrackRecord::from_api(track, body.is_playing)))
    }

    async fn fetch_recent(&self, token: &str) -> Result<Option<TrackRecord>, FetchError> {
        let response = self
            .http
            .get(&self.endpoints.recently_played_url)
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body: RecentlyPlayedResponse = response.json().await?;
        Ok(body
            .items
            .into_iter()
            .next()
            .map(|item| TrackRecord::from_api(item.track, false)))
    }
}

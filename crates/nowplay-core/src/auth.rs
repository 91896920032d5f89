//! Credential cache for the provider's bearer tokens.
//!
//! A credential is replaced wholesale on every refresh exchange and is
//! considered usable only up to a fixed safety margin before its nominal
//! expiry, so a token never goes stale mid-request. The cache is
//! process-local; successful refreshes are also mirrored to the shared
//! file store so the server and widget can reuse each other's tokens.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{Config, SpotifyConfig};
use crate::error::CredentialError;
use crate::store::TokenStore;

/// Buffer subtracted from the reported TTL so we never present a token
/// that expires mid-flight.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    /// Already includes the safety margin.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn from_exchange(access_token: String, expires_in_secs: i64) -> Self {
        let expires_at =
            Utc::now() + Duration::seconds(expires_in_secs - EXPIRY_SAFETY_MARGIN_SECS);
        Self {
            access_token,
            expires_at,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Wire shape of the refresh exchange response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

pub struct TokenCache {
    credentials: SpotifyConfig,
    token_url: String,
    cached: Mutex<Option<Credential>>,
    store: Option<TokenStore>,
}

impl TokenCache {
    pub fn new(config: &Config, store: Option<TokenStore>) -> Self {
        Self {
            credentials: config.spotify.clone(),
            token_url: config.endpoints.token_url.clone(),
            cached: Mutex::new(None),
            store,
        }
    }

    /// Returns a usable bearer token, refreshing only when the cached one
    /// is missing, expired, or a refresh is forced.
    pub async fn get_token(
        &self,
        http: &reqwest::Client,
        force_refresh: bool,
    ) -> Result<String, CredentialError> {
        let mut cached = self.cached.lock().await;

        if !force_refresh {
            if let Some(credential) = cached.as_ref() {
                if credential.is_usable() {
                    return Ok(credential.access_token.clone());
                }
            }

            // Another process may have refreshed more recently.
            if let Some(stored) = self.store.as_ref().and_then(|s| s.load()) {
                debug!("using token from shared store");
                let credential = Credential {
                    access_token: stored.access_token.clone(),
                    expires_at: stored.expires_at,
                };
                *cached = Some(credential);
                return Ok(stored.access_token);
            }
        }

        let response = self.exchange(http).await?;
        let credential = Credential::from_exchange(response.access_token, response.expires_in);
        info!("refreshed bearer token, valid until {}", credential.expires_at);

        if let Some(store) = &self.store {
            store.save(&credential.access_token, credential.expires_at);
        }

        let token = credential.access_token.clone();
        *cached = Some(credential);
        Ok(token)
    }

    /// Performs one refresh exchange without touching the cache. Also used
    /// directly by the thin `/api/token` route.
    pub async fn exchange(&self, http: &reqwest::Client) -> Result<TokenResponse, CredentialError> {
        let creds = &self.credentials;
        if creds.client_id.is_empty() {
            return Err(CredentialError::MissingCredentials("client_id"));
        }
        if creds.client_secret.is_empty() {
            return Err(CredentialError::MissingCredentials("client_secret"));
        }
        if creds.refresh_token.is_empty() {
            return Err(CredentialError::MissingCredentials("refresh_token"));
        }

        let response = http
            .post(&self.token_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", creds.refresh_token.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CredentialError::ExchangeStatus(response.status()));
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}

//! Error taxonomy for the now-playing pipeline.
//!
//! All four families are recoverable at the cycle boundary: callers catch
//! them where they occur and turn them into an absent result or a logged
//! warning. Nothing here is allowed to take the widget or the server down.

use thiserror::Error;

/// Obtaining or refreshing a bearer token failed. Fatal for the current
/// fetch cycle only; the next cycle tries again from scratch.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing credentials: {0} is not configured")]
    MissingCredentials(&'static str),

    #[error("token exchange returned status {0}")]
    ExchangeStatus(reqwest::StatusCode),

    #[error("token exchange transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The now-playing or recently-played query failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Non-success, non-204 status that wasn't resolved by the single
    /// unauthorized retry.
    #[error("now-playing endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("now-playing transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Reading the embed document failed. A missing preview pattern is NOT an
/// error; resolvers report that as an absent URL.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("embed endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("embed transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The preview audio backend failed. Resets playback to stopped; never
/// affects polling.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio backend unavailable: {0}")]
    Backend(String),

    #[error("audio command failed: {0}")]
    Command(String),
}

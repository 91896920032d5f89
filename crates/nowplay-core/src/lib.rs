//! Shared library for the nowplay service and widget.
//!
//! Holds everything both binaries need: configuration, the credential
//! cache and its file-backed store, the now-playing fetcher with its
//! normalized track model, and the preview-URL resolver.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod platform;
pub mod preview;
pub mod store;
pub mod track;

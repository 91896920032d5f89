//! Now-playing controller.
//!
//! Owns the fixed-interval polling loop and the displayed-track state,
//! and drives preview playback through the mpv player. A failed fetch
//! cycle keeps the previous record on screen and simply waits for the
//! next tick; no accelerated retry.

use nowplay_core::client::SpotifyClient;
use nowplay_core::error::{FetchError, PlaybackError, ResolveError};
use nowplay_core::track::{ArtworkSize, TrackRecord};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::fade::{PlaybackState, VolumeLevel, FADE_TICK_MS};
use crate::player::{PlayerEvent, PreviewPlayer};

/// Where track records and preview URLs come from. The widget talks to
/// the provider directly; tests substitute a scripted source.
pub trait TrackSource {
    async fn fetch_current(&self) -> Result<Option<TrackRecord>, FetchError>;
    async fn resolve_preview(&self, track_id: &str) -> Result<Option<String>, ResolveError>;
}

impl TrackSource for SpotifyClient {
    async fn fetch_current(&self) -> Result<Option<TrackRecord>, FetchError> {
        SpotifyClient::fetch_current(self).await
    }

    async fn resolve_preview(&self, track_id: &str) -> Result<Option<String>, ResolveError> {
        SpotifyClient::resolve_preview(self, track_id).await
    }
}

/// Preview state for the currently displayed track. At most one exists,
/// and a record with a different track id replaces it outright.
#[derive(Debug)]
pub struct PreviewHandle {
    pub track_id: String,
    /// Resolved lazily on the first play request, then cached here.
    pub url: Option<String>,
    pub playback: PlaybackState,
}

impl PreviewHandle {
    fn new(track_id: String) -> Self {
        Self {
            track_id,
            url: None,
            playback: PlaybackState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Same track, same live flag; nothing to redraw.
    Unchanged,
    /// Same track, but the live flag flipped; the label needs a redraw
    /// while the preview handle stays valid.
    Relabelled,
    /// A different track is now displayed.
    Changed,
    /// Nothing to display any more.
    Cleared,
    /// The cycle failed; previous state kept.
    Failed,
}

#[derive(Debug, Default)]
pub struct WidgetState {
    pub track: Option<TrackRecord>,
    pub preview: Option<PreviewHandle>,
}

impl WidgetState {
    /// Folds one fetch result into the displayed state. A new track id
    /// invalidates the preview handle; a failure changes nothing.
    pub fn apply_fetch(&mut self, result: Result<Option<TrackRecord>, FetchError>) -> FetchOutcome {
        match result {
            Err(e) => {
                warn!("fetch cycle failed, waiting for next tick: {}", e);
                FetchOutcome::Failed
            }
            Ok(None) => {
                if self.track.is_none() {
                    return FetchOutcome::Unchanged;
                }
                self.track = None;
                self.preview = None;
                FetchOutcome::Cleared
            }
            Ok(Some(record)) => {
                if let Some(current) = self.track.as_ref().filter(|c| c.id == record.id) {
                    // A track commonly reappears from history with the live
                    // flag cleared once it finishes; the label must follow.
                    let flipped = current.is_playing != record.is_playing;
                    self.track = Some(record);
                    return if flipped {
                        FetchOutcome::Relabelled
                    } else {
                        FetchOutcome::Unchanged
                    };
                }
                self.track = Some(record);
                self.preview = None;
                FetchOutcome::Changed
            }
        }
    }

    fn preview_audible(&self) -> bool {
        matches!(
            self.preview.as_ref().map(|p| p.playback),
            Some(PlaybackState::FadingIn | PlaybackState::Playing)
        )
    }
}

pub struct Controller<S> {
    source: S,
    state: WidgetState,
    player: PreviewPlayer,
    event_tx: mpsc::Sender<PlayerEvent>,
    event_rx: mpsc::Receiver<PlayerEvent>,
    preview_volume: f32,
    volume: VolumeLevel,
}

impl<S: TrackSource> Controller<S> {
    pub fn new(source: S, preview_volume: f32) -> Self {
        let (event_tx, event_rx) = mpsc::channel(16);
        Self {
            source,
            state: WidgetState::default(),
            player: PreviewPlayer::new(),
            event_tx,
            event_rx,
            preview_volume,
            volume: VolumeLevel::silent(),
        }
    }

    /// One polling cycle: fetch, fold into state, silence a preview whose
    /// track disappeared, and redraw if anything changed.
    pub async fn poll_once(&mut self) {
        let was_audible = self.state.preview_audible();
        let outcome = self.state.apply_fetch(self.source.fetch_current().await);

        match outcome {
            FetchOutcome::Changed | FetchOutcome::Cleared => {
                if was_audible {
                    if let Some(handle) = self.player.current_handle() {
                        if let Err(e) = handle.stop().await {
                            warn!("failed to stop stale preview: {}", e);
                        }
                    }
                }
                self.display();
            }
            // Same track, new label; the preview may keep playing.
            FetchOutcome::Relabelled => self.display(),
            FetchOutcome::Unchanged | FetchOutcome::Failed => {}
        }
    }

    /// Play/pause toggle. Resolution is lazy: the embed page is only hit
    /// on the first play request for a track, then cached on the handle.
    pub async fn toggle_preview(&mut self) {
        let Some(track) = self.state.track.clone() else {
            println!("nothing to preview");
            return;
        };

        let stale = self
            .state
            .preview
            .as_ref()
            .map_or(true, |p| p.track_id != track.id);
        if stale {
            self.state.preview = Some(PreviewHandle::new(track.id.clone()));
        }

        if self.state.preview_audible() {
            if let Err(e) = self.fade_out_and_pause().await {
                warn!("preview pause failed: {}", e);
            }
            self.set_playback(PlaybackState::Stopped);
            return;
        }

        let url = match self.state.preview.as_ref().and_then(|p| p.url.clone()) {
            Some(url) => url,
            None => match self.source.resolve_preview(&track.id).await {
                Ok(Some(url)) => {
                    if let Some(preview) = self.state.preview.as_mut() {
                        preview.url = Some(url.clone());
                    }
                    url
                }
                Ok(None) => {
                    println!("no preview available for this track");
                    return;
                }
                Err(e) => {
                    warn!("preview resolve failed: {}", e);
                    return;
                }
            },
        };

        if let Err(e) = self.start_preview(&url).await {
            warn!("preview playback failed: {}", e);
            self.set_playback(PlaybackState::Stopped);
        }
    }

    async fn start_preview(&mut self, url: &str) -> Result<(), PlaybackError> {
        let handle = self.player.handle(&self.event_tx).await?;
        self.set_playback(PlaybackState::FadingIn);
        handle.load(url).await?;
        self.volume.set(0.0);

        let mut fade = self.volume.fade_to(self.preview_volume);
        while !fade.done() {
            tokio::time::sleep(Duration::from_millis(FADE_TICK_MS)).await;
            let level = fade.advance();
            handle.set_volume(level).await?;
            self.volume.set(level);
        }

        self.set_playback(PlaybackState::Playing);
        Ok(())
    }

    async fn fade_out_and_pause(&mut self) -> Result<(), PlaybackError> {
        let Some(handle) = self.player.current_handle().cloned() else {
            return Ok(());
        };
        self.set_playback(PlaybackState::FadingOut);

        let mut fade = self.volume.fade_to(0.0);
        while !fade.done() {
            tokio::time::sleep(Duration::from_millis(FADE_TICK_MS)).await;
            let level = fade.advance();
            handle.set_volume(level).await?;
            self.volume.set(level);
        }

        handle.set_pause(true).await
    }

    fn set_playback(&mut self, playback: PlaybackState) {
        if let Some(preview) = self.state.preview.as_mut() {
            preview.playback = playback;
        }
    }

    fn display(&self) {
        match &self.state.track {
            Some(track) => {
                let label = if track.is_playing {
                    "currently listening to"
                } else {
                    "last played"
                };
                println!("{}: {} - {} [{}]", label, track.name, track.artist, track.album);
                if let Some(art) = track.artwork(ArtworkSize::Medium) {
                    println!("  art: {}", art);
                }
                println!("  {}", track.url);
            }
            None => println!("nothing playing"),
        }
    }

    /// Polling loop. Runs until `q` or stdin closes; teardown kills the
    /// audio process. In-flight fetch results after that are discarded
    /// with the process.
    pub async fn run(mut self, poll_interval: Duration) -> anyhow::Result<()> {
        println!("nowplay (p = preview, q = quit)");
        info!("polling every {:?}", poll_interval);

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                _ = interval.tick() => self.poll_once().await,
                event = self.event_rx.recv() => {
                    if let Some(PlayerEvent::Ended) = event {
                        self.set_playback(PlaybackState::Stopped);
                    }
                }
                line = lines.next_line() => match line {
                    Ok(Some(command)) => match command.trim() {
                        "p" => self.toggle_preview().await,
                        "q" => break,
                        "" => {}
                        other => println!("unknown command: {}", other),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin read error: {}", e);
                        break;
                    }
                },
            }
        }

        self.player.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nowplay_core::track::{ArtworkImage, ArtworkSize};

    fn record(id: &str, is_playing: bool) -> TrackRecord {
        TrackRecord {
            is_playing,
            name: format!("Track {}", id),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            images: vec![ArtworkImage {
                url: "https://img/300".to_string(),
                size: ArtworkSize::Medium,
            }],
            url: format!("https://open.example/track/{}", id),
            id: id.to_string(),
        }
    }

    #[test]
    fn test_new_track_replaces_and_invalidates_preview() {
        let mut state = WidgetState::default();
        assert_eq!(state.apply_fetch(Ok(Some(record("a", true)))), FetchOutcome::Changed);

        state.preview = Some(PreviewHandle::new("a".to_string()));
        assert_eq!(state.apply_fetch(Ok(Some(record("b", true)))), FetchOutcome::Changed);
        assert!(state.preview.is_none(), "handle for the old track must go");
        assert_eq!(state.track.as_ref().unwrap().id, "b");
    }

    #[test]
    fn test_live_flag_flip_relabels_and_keeps_preview() {
        // A finished song reappears from history with the flag cleared;
        // that must come back as a redraw, not as Unchanged.
        let mut state = WidgetState::default();
        state.apply_fetch(Ok(Some(record("a", true))));
        state.preview = Some(PreviewHandle::new("a".to_string()));

        assert_eq!(state.apply_fetch(Ok(Some(record("a", false)))), FetchOutcome::Relabelled);
        assert!(state.preview.is_some());
        assert!(!state.track.as_ref().unwrap().is_playing);
    }

    #[test]
    fn test_identical_record_is_unchanged() {
        let mut state = WidgetState::default();
        state.apply_fetch(Ok(Some(record("a", true))));
        state.preview = Some(PreviewHandle::new("a".to_string()));

        assert_eq!(state.apply_fetch(Ok(Some(record("a", true)))), FetchOutcome::Unchanged);
        assert!(state.preview.is_some());
    }

    #[test]
    fn test_absent_clears_track_and_preview() {
        let mut state = WidgetState::default();
        state.apply_fetch(Ok(Some(record("a", true))));
        state.preview = Some(PreviewHandle::new("a".to_string()));

        assert_eq!(state.apply_fetch(Ok(None)), FetchOutcome::Cleared);
        assert!(state.track.is_none());
        assert!(state.preview.is_none());
    }

    #[test]
    fn test_absent_when_already_empty_is_unchanged() {
        let mut state = WidgetState::default();
        assert_eq!(state.apply_fetch(Ok(None)), FetchOutcome::Unchanged);
    }

    #[test]
    fn test_failure_keeps_previous_display() {
        let mut state = WidgetState::default();
        state.apply_fetch(Ok(Some(record("a", true))));
        state.preview = Some(PreviewHandle::new("a".to_string()));

        let error = Err(FetchError::Credential(
            nowplay_core::error::CredentialError::MissingCredentials("client_id"),
        ));
        assert_eq!(state.apply_fetch(error), FetchOutcome::Failed);
        assert_eq!(state.track.as_ref().unwrap().id, "a");
        assert!(state.preview.is_some());
    }
}

//! Preview audio through an mpv subprocess, driven over its JSON IPC
//! socket.
//!
//! One mpv instance is spawned lazily on the first play request and kept
//! idle between previews. A writer task serialises commands onto the
//! socket; a reader task matches responses back to callers by request id
//! and forwards end-of-file events so the controller can drop back to the
//! stopped state when a clip runs out.

use nowplay_core::error::PlaybackError;
use nowplay_core::platform;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy)]
pub enum PlayerEvent {
    /// The loaded clip ran to its end.
    Ended,
}

struct PendingRequest {
    req_id: u64,
    /// Serialised JSON line, newline included.
    payload: String,
    reply: oneshot::Sender<Result<Value, PlaybackError>>,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, PlaybackError>>>>>;

/// Cheaply cloneable handle to the writer task.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl PlayerHandle {
    async fn send(&self, command: Value) -> Result<Value, PlaybackError> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = msg.to_string();
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| PlaybackError::Backend("mpv writer task gone".to_string()))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| PlaybackError::Command(format!("mpv IPC timeout for req={}", req_id)))?
            .map_err(|_| PlaybackError::Command("mpv reply channel dropped".to_string()))?
    }

    /// Loads a clip at volume zero, unpaused; the caller ramps the volume
    /// up afterwards. The volume is zeroed before `loadfile`, since the
    /// previous clip may have left it at the ramp target.
    pub async fn load(&self, url: &str) -> Result<(), PlaybackError> {
        debug!("mpv: loadfile {}", url);
        self.send(json!(["set_property", "volume", 0.0])).await?;
        self.send(json!(["loadfile", url])).await?;
        self.send(json!(["set_property", "pause", false])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        let pct = (volume * 100.0).clamp(0.0, 100.0);
        self.send(json!(["set_property", "volume", pct])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> Result<(), PlaybackError> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }
}

/// Owns the mpv child process; spawns it on first use.
pub struct PreviewPlayer {
    process: Option<tokio::process::Child>,
    handle: Option<PlayerHandle>,
}

impl PreviewPlayer {
    pub fn new() -> Self {
        Self {
            process: None,
            handle: None,
        }
    }

    /// Handle to the running player, if one has been spawned.
    pub fn current_handle(&self) -> Option<&PlayerHandle> {
        self.handle.as_ref()
    }

    /// Returns a handle, spawning and connecting mpv first if needed.
    pub async fn handle(
        &mut self,
        event_tx: &mpsc::Sender<PlayerEvent>,
    ) -> Result<PlayerHandle, PlaybackError> {
        if !self.process_alive() {
            self.handle = None;
        }
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }

        let handle = self.spawn_and_connect(event_tx.clone()).await?;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    fn process_alive(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    warn!("mpv process exited: {}", status);
                    false
                }
                Err(e) => {
                    warn!("mpv liveness check failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<PlayerEvent>,
    ) -> Result<PlayerHandle, PlaybackError> {
        if let Some(mut stale) = self.process.take() {
            let _ = stale.kill().await;
        }

        let socket_path = std::path::PathBuf::from(platform::mpv_socket_path());
        let _ = tokio::fs::remove_file(&socket_path).await;

        let binary = platform::find_mpv_binary()
            .ok_or_else(|| PlaybackError::Backend("mpv binary not found".to_string()))?;

        info!("mpv: spawning {:?}", binary);
        let child = tokio::process::Command::new(&binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--quiet")
            .arg("--volume=0")
            .arg(platform::mpv_socket_arg())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| PlaybackError::Backend(format!("failed to spawn mpv: {}", e)))?;
        self.process = Some(child);

        // Wait for the IPC socket to appear.
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            return Err(PlaybackError::Backend(
                "mpv IPC socket did not appear".to_string(),
            ));
        }

        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| PlaybackError::Backend(format!("mpv IPC connect failed: {}", e)))?;
        debug!("mpv: connected to IPC socket");

        let (read_half, write_half) = stream.into_split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

        tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
        tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

        Ok(PlayerHandle { tx: cmd_tx })
    }

    /// Kills the mpv process. Called on widget teardown.
    pub async fn shutdown(&mut self) {
        self.handle = None;
        if let Some(mut child) = self.process.take() {
            let _ = child.kill().await;
        }
    }
}

impl Default for PreviewPlayer {
    fn default() -> Self {
        Self::new()
    }
}

async fn writer_task(
    mut writer: tokio::net::unix::OwnedWriteHalf,
    mut rx: mpsc::Receiver<PendingRequest>,
    pending: PendingMap,
) {
    while let Some(req) = rx.recv().await {
        // Register the reply channel before writing so the reader can
        // always match the response.
        {
            let mut map = pending.lock().await;
            map.insert(req.req_id, req.reply);
        }
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&req.req_id) {
                let _ = tx.send(Err(PlaybackError::Backend(format!("mpv write error: {}", e))));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

async fn reader_task(
    mut reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    pending: PendingMap,
    event_tx: mpsc::Sender<PlayerEvent>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error");
                            Err(PlaybackError::Command(err.to_string()))
                        };
                        let _ = tx.send(result);
                    }
                } else if val.get("event").and_then(|v| v.as_str()) == Some("end-file") {
                    // Only a natural end counts; stop and loadfile also
                    // emit end-file, with a different reason.
                    let reason = val.get("reason").and_then(|v| v.as_str()).unwrap_or("eof");
                    if reason == "eof" {
                        let _ = event_tx.send(PlayerEvent::Ended).await;
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, &format!("mpv IPC read error: {}", e)).await;
                break;
            }
        }
    }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(PlaybackError::Backend(reason.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Handle wired to a task that records every command line and answers
    /// each one with success.
    fn scripted_handle() -> (PlayerHandle, Arc<std::sync::Mutex<Vec<String>>>) {
        let (tx, mut rx) = mpsc::channel::<PendingRequest>(8);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                log.lock().unwrap().push(req.payload.clone());
                let _ = req.reply.send(Ok(serde_json::json!({ "error": "success" })));
            }
        });
        (PlayerHandle { tx }, seen)
    }

    #[tokio::test]
    async fn test_load_zeroes_volume_before_loading() {
        let (handle, seen) = scripted_handle();
        handle.load("https://p.example/clip.mp3").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        // The previous clip may have ended at full ramp volume, so the
        // zeroing must land before the file starts.
        assert!(seen[0].contains("\"volume\""));
        assert!(seen[1].contains("loadfile"));
        assert!(seen[2].contains("\"pause\""));
    }

    #[test]
    fn test_no_process_is_never_alive() {
        let mut player = PreviewPlayer::new();
        assert!(!player.process_alive());
    }

    #[tokio::test]
    async fn test_dead_writer_task_errors_instead_of_hanging() {
        let (tx, rx) = mpsc::channel::<PendingRequest>(1);
        drop(rx);
        let orphan = PlayerHandle { tx };
        assert!(orphan.set_volume(0.1).await.is_err());
    }
}

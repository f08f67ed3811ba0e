//! Preview relay: camera UDP emission into a segmented local stream.
//!
//! `start()` asks the camera to begin emitting its preview over UDP, then
//! launches an external transcoder that republishes it as a rolling HLS
//! playlist under the segment directory. The child process is owned by a
//! supervisor task, so an unexpected exit is observed rather than silently
//! leaving a dead stream behind. At most one transcoder is alive per relay;
//! a second `start()` always tears the first one down.

use crate::config::PreviewConfig;
use crate::connection::ConnectionSession;
use crate::errors::CameraError;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const STREAM_START_ENDPOINT: &str = "/gopro/camera/stream/start";
const STREAM_STOP_ENDPOINT: &str = "/gopro/camera/stream/stop";
const PRESET_GROUP_ENDPOINT: &str = "/gopro/camera/presets/set_group";

/// Preset group for video; the camera only emits preview in a video mode.
const VIDEO_PRESET_GROUP: u32 = 1000;

/// Bounded wait for the supervisor to reap a killed transcoder.
const KILL_TIMEOUT: Duration = Duration::from_secs(3);

const PLAYLIST_NAME: &str = "index.m3u8";
const LOG_NAME: &str = "transcoder.log";

struct ActiveStream {
    token: CancellationToken,
    exit: watch::Receiver<Option<ExitStatus>>,
    supervisor: JoinHandle<()>,
}

/// Relays the camera preview through an external transcoder.
pub struct PreviewRelay {
    session: ConnectionSession,
    config: PreviewConfig,
    stream: Mutex<Option<ActiveStream>>,
}

impl PreviewRelay {
    pub fn new(session: ConnectionSession, config: &PreviewConfig) -> Self {
        Self {
            session,
            config: config.clone(),
            stream: Mutex::new(None),
        }
    }

    pub fn segment_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.segment_dir)
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.segment_dir().join(PLAYLIST_NAME)
    }

    /// Start the preview stream. Any previous transcoder is torn down
    /// first; stale segments are cleared so the playlist starts fresh.
    pub async fn start(&self) -> Result<(), CameraError> {
        let mut guard = self.stream.lock().await;
        teardown(&mut guard).await;

        let segment_dir = self.segment_dir();
        std::fs::create_dir_all(&segment_dir)?;
        clear_stale_segments(&segment_dir)?;

        // The camera only emits preview from a video mode; a rejection here
        // is tolerated since the camera may already be in one.
        if self
            .session
            .request(
                PRESET_GROUP_ENDPOINT,
                &[("id", VIDEO_PRESET_GROUP.to_string())],
            )
            .await
            .is_none()
        {
            log::warn!("Video preset group not confirmed before preview start");
        }

        if self.session.request(STREAM_START_ENDPOINT, &[]).await.is_none() {
            return Err(CameraError::CommandFailed(STREAM_START_ENDPOINT.to_string()));
        }

        // Give the camera time to start emitting before the transcoder
        // binds the UDP socket.
        tokio::time::sleep(Duration::from_millis(self.config.stream_settle_ms)).await;

        let log_file = std::fs::File::create(segment_dir.join(LOG_NAME))?;
        let stderr_log = log_file.try_clone()?;

        let args = transcoder_args(&self.config);
        log::debug!("Launching {} {}", self.config.ffmpeg_path, args.join(" "));

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr_log))
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CameraError::TranscoderMissing(self.config.ffmpeg_path.clone())
                } else {
                    CameraError::Io(e)
                }
            })?;

        let pid = child.id();
        let token = CancellationToken::new();
        let (exit_tx, exit_rx) = watch::channel(None);
        let supervisor = tokio::spawn(supervise(child, token.clone(), exit_tx));

        *guard = Some(ActiveStream {
            token,
            exit: exit_rx,
            supervisor,
        });

        log::info!(
            "Preview transcoder started (pid {:?}), playlist at {}",
            pid,
            self.playlist_path().display()
        );
        Ok(())
    }

    /// Stop the preview stream: kill the transcoder, then ask the camera to
    /// end its UDP emission. Stopping an idle relay still sends the
    /// camera-side stop.
    pub async fn stop(&self) -> Result<(), CameraError> {
        let mut guard = self.stream.lock().await;
        teardown(&mut guard).await;
        drop(guard);

        if self.session.request(STREAM_STOP_ENDPOINT, &[]).await.is_none() {
            return Err(CameraError::CommandFailed(STREAM_STOP_ENDPOINT.to_string()));
        }
        log::info!("Preview stream stopped");
        Ok(())
    }

    /// Whether a transcoder is running right now. Reflects unexpected child
    /// exits, not just explicit stops.
    pub async fn is_active(&self) -> bool {
        match &*self.stream.lock().await {
            Some(stream) => stream.exit.borrow().is_none(),
            None => false,
        }
    }
}

async fn teardown(guard: &mut Option<ActiveStream>) {
    let Some(stream) = guard.take() else {
        return;
    };
    stream.token.cancel();
    if tokio::time::timeout(KILL_TIMEOUT, stream.supervisor)
        .await
        .is_err()
    {
        log::warn!("Transcoder supervisor did not finish within {:?}", KILL_TIMEOUT);
    }
}

/// Owns the transcoder child: reaps its exit status, or kills it when the
/// relay cancels the token.
async fn supervise(
    mut child: Child,
    token: CancellationToken,
    exit_tx: watch::Sender<Option<ExitStatus>>,
) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                log::warn!("Transcoder exited unexpectedly: {}", status);
                let _ = exit_tx.send(Some(status));
            }
            Err(e) => {
                log::warn!("Transcoder wait failed: {}", e);
            }
        },
        _ = token.cancelled() => {
            if let Err(e) = child.start_kill() {
                log::debug!("Transcoder kill failed (already gone?): {}", e);
            }
            match child.wait().await {
                Ok(status) => {
                    let _ = exit_tx.send(Some(status));
                }
                Err(e) => log::warn!("Transcoder reap failed: {}", e),
            }
        }
    }
}

/// Fixed transcoder argument list: consume the UDP source with low latency,
/// drop audio, keep keyframes close together, emit a rolling HLS window
/// with old-segment deletion.
fn transcoder_args(config: &PreviewConfig) -> Vec<String> {
    let playlist = Path::new(&config.segment_dir)
        .join(PLAYLIST_NAME)
        .to_string_lossy()
        .into_owned();
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "warning".to_string(),
        "-fflags".to_string(),
        "nobuffer".to_string(),
        "-flags".to_string(),
        "low_delay".to_string(),
        "-i".to_string(),
        config.udp_source.clone(),
        "-an".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-tune".to_string(),
        "zerolatency".to_string(),
        "-g".to_string(),
        "30".to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        config.segment_seconds.to_string(),
        "-hls_list_size".to_string(),
        config.window_segments.to_string(),
        "-hls_flags".to_string(),
        "delete_segments".to_string(),
        playlist,
    ]
}

/// Remove leftover playlist and segment files from a previous run.
fn clear_stale_segments(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let stale = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "ts" || ext == "m3u8")
            .unwrap_or(false);
        if stale {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Could not remove stale segment {}: {}", path.display(), e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeroConfig;

    #[test]
    fn test_transcoder_args_shape() {
        let config = HeroConfig::default().preview;
        let args = transcoder_args(&config);

        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"zerolatency".to_string()));
        assert!(args.contains(&"delete_segments".to_string()));
        assert!(args.contains(&config.udp_source));
        assert_eq!(args.last().unwrap(), "./stream/index.m3u8");

        let hls_time_pos = args.iter().position(|a| a == "-hls_time").unwrap();
        assert_eq!(args[hls_time_pos + 1], config.segment_seconds.to_string());
        let window_pos = args.iter().position(|a| a == "-hls_list_size").unwrap();
        assert_eq!(args[window_pos + 1], config.window_segments.to_string());
    }

    #[test]
    fn test_clear_stale_segments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("seg0001.ts"), b"x").unwrap();
        std::fs::write(dir.path().join("index.m3u8"), b"x").unwrap();
        std::fs::write(dir.path().join("transcoder.log"), b"x").unwrap();

        clear_stale_segments(dir.path()).unwrap();

        assert!(!dir.path().join("seg0001.ts").exists());
        assert!(!dir.path().join("index.m3u8").exists());
        assert!(dir.path().join("transcoder.log").exists());
    }
}

//! Camera command facade: presets, shutter, settings, and timed capture.
//!
//! Every action maps to one or a short fixed sequence of GET requests
//! against vendor endpoints. Composite actions (photo, video) confirm the
//! preset change by polling camera state with a bounded timeout before
//! triggering the shutter, instead of sleeping and hoping.

use crate::config::CaptureConfig;
use crate::connection::ConnectionSession;
use crate::errors::CameraError;
use crate::types::{CameraStatus, Preset};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PRESET_LOAD_ENDPOINT: &str = "/gopro/camera/presets/load";
const SHUTTER_START_ENDPOINT: &str = "/gopro/camera/shutter/start";
const SHUTTER_STOP_ENDPOINT: &str = "/gopro/camera/shutter/stop";
const SETTING_ENDPOINT: &str = "/gopro/camera/setting";
const POWER_OFF_ENDPOINT: &str = "/gopro/camera/control/power_off";

/// Status key reporting the active preset ID in the camera state body.
const ACTIVE_PRESET_STATUS: &str = "97";

/// Video resolution setting ID and its option codes.
const RESOLUTION_SETTING: u32 = 2;
const RESOLUTION_CODES: &[(&str, u32)] = &[
    ("5.3k", 100),
    ("4k", 1),
    ("2.7k", 4),
    ("1080", 9),
    ("720", 12),
];

/// Frame rate setting ID and its option codes.
const FPS_SETTING: u32 = 3;
const FPS_CODES: &[(u32, u32)] = &[(240, 0), (120, 1), (60, 5), (30, 8), (24, 10)];

/// Bounded wait for the interval task to drain after cancellation.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Option code for a resolution key like "4k" or "1080", if supported.
pub fn resolution_code(key: &str) -> Option<u32> {
    let key = key.to_ascii_lowercase();
    RESOLUTION_CODES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, code)| *code)
}

/// Option code for a frame rate, if supported.
pub fn fps_code(fps: u32) -> Option<u32> {
    FPS_CODES
        .iter()
        .find(|(value, _)| *value == fps)
        .map(|(_, code)| *code)
}

struct IntervalTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct CameraInner {
    session: ConnectionSession,
    recording: AtomicBool,
    interval: Mutex<Option<IntervalTask>>,
    settle_timeout: Duration,
    poll_interval: Duration,
}

/// Cheaply cloneable camera control handle.
#[derive(Clone)]
pub struct Camera {
    inner: Arc<CameraInner>,
}

impl Camera {
    pub fn new(session: ConnectionSession, config: &CaptureConfig) -> Self {
        Self {
            inner: Arc::new(CameraInner {
                session,
                recording: AtomicBool::new(false),
                interval: Mutex::new(None),
                settle_timeout: Duration::from_millis(config.settle_timeout_ms),
                poll_interval: Duration::from_millis(config.poll_interval_ms),
            }),
        }
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.inner.session
    }

    // === Mode control ===

    pub async fn set_preset(&self, preset: Preset) -> bool {
        self.inner
            .session
            .request(PRESET_LOAD_ENDPOINT, &[("id", preset.id().to_string())])
            .await
            .is_some()
    }

    /// Poll camera state until the active preset matches, bounded by the
    /// configured settle timeout.
    pub async fn wait_for_preset(&self, preset: Preset) -> bool {
        let deadline = tokio::time::Instant::now() + self.inner.settle_timeout;
        loop {
            if let Some(state) = self.inner.session.get_state().await {
                let active = state
                    .get("status")
                    .and_then(|s| s.get(ACTIVE_PRESET_STATUS))
                    .and_then(|v| v.as_u64());
                if active == Some(preset.id() as u64) {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                log::warn!(
                    "Preset {:?} not confirmed within {:?}",
                    preset,
                    self.inner.settle_timeout
                );
                return false;
            }
            tokio::time::sleep(self.inner.poll_interval).await;
        }
    }

    // === Shutter control ===

    pub async fn shutter_start(&self) -> bool {
        let ok = self
            .inner
            .session
            .request(SHUTTER_START_ENDPOINT, &[])
            .await
            .is_some();
        if ok {
            self.inner.recording.store(true, Ordering::Relaxed);
        }
        ok
    }

    pub async fn shutter_stop(&self) -> bool {
        let ok = self
            .inner
            .session
            .request(SHUTTER_STOP_ENDPOINT, &[])
            .await
            .is_some();
        if ok {
            self.inner.recording.store(false, Ordering::Relaxed);
        }
        ok
    }

    /// Take a single photo: switch to the photo preset, confirm the switch,
    /// then trigger the shutter.
    pub async fn take_photo(&self) -> bool {
        if !self.set_preset(Preset::Photo).await {
            return false;
        }
        if !self.wait_for_preset(Preset::Photo).await {
            return false;
        }
        self.shutter_start().await
    }

    pub async fn start_video(&self) -> bool {
        if !self.set_preset(Preset::Video).await {
            return false;
        }
        if !self.wait_for_preset(Preset::Video).await {
            return false;
        }
        self.shutter_start().await
    }

    pub async fn stop_video(&self) -> bool {
        self.shutter_stop().await
    }

    pub fn is_recording(&self) -> bool {
        self.inner.recording.load(Ordering::Relaxed)
    }

    // === Timed capture ===

    /// Take a photo after a delay, on a background task.
    pub fn delayed_photo<F>(&self, delay: Duration, on_shot: F) -> JoinHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let camera = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let ok = camera.take_photo().await;
            on_shot(ok);
        })
    }

    /// Start taking photos on a fixed period until stopped. Fails without
    /// spawning anything if a loop is already running.
    pub async fn start_interval<F>(&self, period: Duration, on_shot: F) -> Result<(), CameraError>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut guard = self.inner.interval.lock().await;
        if guard.is_some() {
            return Err(CameraError::Busy("interval capture".to_string()));
        }

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let camera = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let ok = camera.take_photo().await;
                        if !ok {
                            log::warn!("Interval capture shot failed");
                        }
                        on_shot(ok);
                    }
                }
            }
            log::debug!("Interval capture loop drained");
        });

        *guard = Some(IntervalTask { token, handle });
        log::info!("Interval capture started with period {:?}", period);
        Ok(())
    }

    /// Stop interval capture. Cancellation is observed mid-sleep; an
    /// in-flight shot is allowed to finish within a bounded join. A no-op
    /// success when nothing is running.
    pub async fn stop_interval(&self) -> bool {
        let task = self.inner.interval.lock().await.take();
        let Some(task) = task else {
            return true;
        };

        task.token.cancel();
        if tokio::time::timeout(STOP_JOIN_TIMEOUT, task.handle)
            .await
            .is_err()
        {
            log::warn!(
                "Interval capture task did not drain within {:?}",
                STOP_JOIN_TIMEOUT
            );
        }
        log::info!("Interval capture stopped");
        true
    }

    pub async fn interval_running(&self) -> bool {
        self.inner.interval.lock().await.is_some()
    }

    // === Settings ===

    /// Set video resolution by key ("5.3k", "4k", "2.7k", "1080", "720").
    /// Unsupported keys fail without issuing a request.
    pub async fn set_resolution(&self, resolution: &str) -> Result<(), CameraError> {
        let code = resolution_code(resolution).ok_or_else(|| CameraError::Unsupported {
            what: "resolution",
            value: resolution.to_string(),
        })?;
        self.apply_setting(RESOLUTION_SETTING, code).await
    }

    /// Set video frame rate. Unsupported values fail without a request.
    pub async fn set_fps(&self, fps: u32) -> Result<(), CameraError> {
        let code = fps_code(fps).ok_or_else(|| CameraError::Unsupported {
            what: "fps",
            value: fps.to_string(),
        })?;
        self.apply_setting(FPS_SETTING, code).await
    }

    async fn apply_setting(&self, setting: u32, option: u32) -> Result<(), CameraError> {
        let params = [
            ("setting", setting.to_string()),
            ("option", option.to_string()),
        ];
        self.inner
            .session
            .request(SETTING_ENDPOINT, &params)
            .await
            .map(|_| ())
            .ok_or_else(|| CameraError::CommandFailed(SETTING_ENDPOINT.to_string()))
    }

    // === Status and power ===

    /// Connection, recording, and raw state in one snapshot.
    pub async fn status(&self) -> CameraStatus {
        match self.inner.session.get_state().await {
            Some(state) => CameraStatus {
                connected: true,
                recording: self.is_recording(),
                state: Some(state),
            },
            None => CameraStatus {
                connected: false,
                recording: self.is_recording(),
                state: None,
            },
        }
    }

    pub async fn power_off(&self) -> bool {
        self.inner
            .session
            .request(POWER_OFF_ENDPOINT, &[])
            .await
            .is_some()
    }
}

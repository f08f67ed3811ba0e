//! Shared data types: transport kinds, session info, presets, media entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the camera is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Wifi,
    Usb,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Wifi => "wifi",
            Transport::Usb => "usb",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the connection session's reachability state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub connected: bool,
    pub address: Option<String>,
    pub transport: Option<Transport>,
    pub base_url: Option<String>,
}

/// Camera-side configuration bundle, selected by numeric ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Video,
    Photo,
    Timelapse,
}

impl Preset {
    /// Vendor preset ID used with `/gopro/camera/presets/load`.
    pub fn id(&self) -> u32 {
        match self {
            Preset::Video => 0,
            Preset::Photo => 1,
            Preset::Timelapse => 2,
        }
    }
}

/// One file on the camera's media index, with a synthesized download URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEntry {
    pub directory: String,
    pub filename: String,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub url: String,
}

/// Combined connection and recording status reported by the facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraStatus {
    pub connected: bool,
    pub recording: bool,
    pub state: Option<serde_json::Value>,
}

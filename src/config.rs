//! Configuration management for heroctl.
//!
//! Provides TOML-backed loading, saving, and validation for connection
//! addresses, capture timing, storage paths, and preview relay options.

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub preview: PreviewConfig,
}

/// Connection session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Fixed WiFi address of the camera's access point
    pub wifi_address: String,
    /// HTTP API port
    pub port: u16,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Reachability probe timeout in milliseconds
    pub probe_timeout_ms: u64,
}

/// Capture sequencing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Upper bound on waiting for a preset change to be confirmed (ms)
    pub settle_timeout_ms: u64,
    /// State poll period while waiting for a preset change (ms)
    pub poll_interval_ms: u64,
    /// Default period for interval photo capture (seconds)
    pub default_interval_secs: u64,
}

/// Local storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for downloaded media
    pub download_dir: String,
}

/// Preview relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Transcoder binary (looked up on PATH if not absolute)
    pub ffmpeg_path: String,
    /// UDP source the camera emits to
    pub udp_source: String,
    /// Directory for playlist and segment output
    pub segment_dir: String,
    /// Segment duration in seconds
    pub segment_seconds: u32,
    /// Rolling window size in segments
    pub window_segments: u32,
    /// Fixed wait after stream/start before launching the transcoder (ms)
    pub stream_settle_ms: u64,
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                wifi_address: "10.5.5.9".to_string(),
                port: 8080,
                request_timeout_ms: 5000,
                probe_timeout_ms: 2000,
            },
            capture: CaptureConfig {
                settle_timeout_ms: 3000,
                poll_interval_ms: 100,
                default_interval_secs: 10,
            },
            storage: StorageConfig {
                download_dir: "./downloads".to_string(),
            },
            preview: PreviewConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                udp_source: "udp://0.0.0.0:8554".to_string(),
                segment_dir: "./stream".to_string(),
                segment_seconds: 1,
                window_segments: 5,
                stream_settle_ms: 3000,
            },
        }
    }
}

impl HeroConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::Config(format!("failed to read config file: {}", e)))?;

        let config: HeroConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::Config(format!("failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CameraError::Config(format!("failed to create config dir: {}", e)))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::Config(format!("failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::Config(format!("failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from("heroctl.toml")
    }

    /// Load from the default location or fall back to defaults.
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.wifi_address.is_empty() {
            return Err("WiFi address must not be empty".to_string());
        }
        if self.camera.port == 0 {
            return Err("Camera port must be non-zero".to_string());
        }
        if self.camera.request_timeout_ms == 0 || self.camera.probe_timeout_ms == 0 {
            return Err("Timeouts must be non-zero".to_string());
        }

        if self.capture.poll_interval_ms == 0 {
            return Err("Poll interval must be non-zero".to_string());
        }
        if self.capture.settle_timeout_ms < self.capture.poll_interval_ms {
            return Err("Settle timeout must be at least one poll interval".to_string());
        }
        if self.capture.default_interval_secs == 0 {
            return Err("Default capture interval must be non-zero".to_string());
        }

        if self.storage.download_dir.is_empty() {
            return Err("Download directory must not be empty".to_string());
        }

        if self.preview.ffmpeg_path.is_empty() {
            return Err("Transcoder path must not be empty".to_string());
        }
        if self.preview.segment_seconds == 0 || self.preview.segment_seconds > 10 {
            return Err("Segment duration must be between 1 and 10 seconds".to_string());
        }
        if self.preview.window_segments == 0 || self.preview.window_segments > 60 {
            return Err("Segment window must be between 1 and 60".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HeroConfig::default();
        assert_eq!(config.camera.wifi_address, "10.5.5.9");
        assert_eq!(config.camera.port, 8080);
        assert_eq!(config.preview.segment_seconds, 1);
    }

    #[test]
    fn test_config_validation() {
        let config = HeroConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_port = config.clone();
        bad_port.camera.port = 0;
        assert!(bad_port.validate().is_err());

        let mut bad_window = HeroConfig::default();
        bad_window.preview.window_segments = 0;
        assert!(bad_window.validate().is_err());

        let mut bad_settle = HeroConfig::default();
        bad_settle.capture.settle_timeout_ms = 10;
        bad_settle.capture.poll_interval_ms = 100;
        assert!(bad_settle.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("heroctl.toml");

        let mut config = HeroConfig::default();
        config.camera.wifi_address = "10.71.79.1".to_string();
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = HeroConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.camera.wifi_address, "10.71.79.1");
        assert_eq!(loaded.preview.window_segments, config.preview.window_segments);
    }

    #[test]
    fn test_config_toml_format() {
        let config = HeroConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("[preview]"));
        assert!(toml_string.contains("wifi_address"));
        assert!(toml_string.contains("segment_seconds"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = HeroConfig::load_from_file("nonexistent_heroctl.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().camera.port, 8080);
    }
}

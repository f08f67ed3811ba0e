//! heroctl: remote control, media, and live-preview utility for GoPro
//! action cameras.
//!
//! The camera exposes a GET-only HTTP API on a fixed port over WiFi or USB
//! networking. This crate wraps that API into four pieces:
//! - [`connection::ConnectionSession`]: discovery, reachability, and the
//!   single request primitive
//! - [`camera::Camera`]: shutter, presets, settings, and timed capture
//! - [`media::MediaStore`]: listing, downloading, and deleting media
//! - [`preview::PreviewRelay`]: the UDP preview emission relayed through an
//!   external transcoder into a segmented local stream
//!
//! With the `ble` feature, [`ble::wake_wifi`] can turn the camera's WiFi
//! access point on over Bluetooth before connecting.
//!
//! # Usage
//! ```rust,no_run
//! use heroctl::{Camera, ConnectionSession, HeroConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = HeroConfig::load_or_default();
//!     let session = ConnectionSession::new(&config.camera).unwrap();
//!     if session.connect().await {
//!         let camera = Camera::new(session, &config.capture);
//!         camera.take_photo().await;
//!     }
//! }
//! ```

pub mod camera;
pub mod config;
pub mod connection;
pub mod errors;
pub mod media;
pub mod preview;
pub mod types;

#[cfg(feature = "ble")]
pub mod ble;

// Re-exports for convenience
pub use camera::Camera;
pub use config::HeroConfig;
pub use connection::ConnectionSession;
pub use errors::CameraError;
pub use media::MediaStore;
pub use preview::PreviewRelay;
pub use types::{CameraStatus, MediaEntry, Preset, SessionInfo, Transport};

/// Initialize logging for the control utility
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "heroctl=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_metadata() {
        assert_eq!(NAME, "heroctl");
        assert!(!VERSION.is_empty());
        assert!(!DESCRIPTION.is_empty());
    }

    #[test]
    fn test_reexports_compile() {
        let _ = Preset::Photo.id();
        let _ = Transport::Wifi.as_str();
    }
}

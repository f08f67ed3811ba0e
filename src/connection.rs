//! Connection session: reachability state and the single HTTP request
//! primitive everything else is built on.
//!
//! The camera exposes a GET-only REST API on a fixed port. Over WiFi it sits
//! at a fixed address; over USB it shows up somewhere on a `172.2x.1xx.51`
//! subnet, so discovery probes that grid before falling back to WiFi. All
//! link fields live behind one lock so foreground commands, keep-alive, and
//! reconnect paths never race each other.

use crate::config::CameraConfig;
use crate::errors::CameraError;
use crate::types::{SessionInfo, Transport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

/// Fixed address of the camera's own WiFi access point.
pub const WIFI_ADDRESS: &str = "10.5.5.9";
/// HTTP API port, same for WiFi and USB.
pub const CAMERA_PORT: u16 = 8080;

const STATE_ENDPOINT: &str = "/gopro/camera/state";
const KEEP_ALIVE_ENDPOINT: &str = "/gopro/camera/keep_alive";

/// How many discovery probes run concurrently.
const DISCOVERY_FANOUT: usize = 32;

#[derive(Debug, Default)]
struct LinkState {
    address: Option<String>,
    transport: Option<Transport>,
    connected: bool,
}

struct Inner {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    wifi_address: String,
    port: u16,
    state: RwLock<LinkState>,
}

/// Cheaply cloneable handle to the camera link.
#[derive(Clone)]
pub struct ConnectionSession {
    inner: Arc<Inner>,
}

impl ConnectionSession {
    pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
        Self::build(
            &config.wifi_address,
            config.port,
            Duration::from_millis(config.request_timeout_ms),
            Duration::from_millis(config.probe_timeout_ms),
            None,
        )
    }

    /// Session pinned to a known address, skipping discovery.
    pub fn direct(address: &str, port: u16) -> Result<Self, CameraError> {
        let transport = if address.starts_with("172.") {
            Transport::Usb
        } else {
            Transport::Wifi
        };
        Self::build(
            address,
            port,
            Duration::from_millis(5000),
            Duration::from_millis(2000),
            Some((address.to_string(), transport)),
        )
    }

    fn build(
        wifi_address: &str,
        port: u16,
        request_timeout: Duration,
        probe_timeout: Duration,
        pinned: Option<(String, Transport)>,
    ) -> Result<Self, CameraError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CameraError::Config(format!("failed to build http client: {}", e)))?;
        let probe_client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .map_err(|e| CameraError::Config(format!("failed to build probe client: {}", e)))?;

        let mut state = LinkState::default();
        if let Some((address, transport)) = pinned {
            state.address = Some(address);
            state.transport = Some(transport);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                probe_client,
                wifi_address: wifi_address.to_string(),
                port,
                state: RwLock::new(state),
            }),
        })
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub async fn address(&self) -> Option<String> {
        self.inner.state.read().await.address.clone()
    }

    pub async fn base_url(&self) -> Option<String> {
        let state = self.inner.state.read().await;
        state
            .address
            .as_ref()
            .map(|addr| format!("http://{}:{}", addr, self.inner.port))
    }

    pub async fn info(&self) -> SessionInfo {
        let state = self.inner.state.read().await;
        SessionInfo {
            connected: state.connected,
            address: state.address.clone(),
            transport: state.transport,
            base_url: state
                .address
                .as_ref()
                .map(|addr| format!("http://{}:{}", addr, self.inner.port)),
        }
    }

    /// Test reachability of the current address and update the connected
    /// flag. Falls through to [`connect`](Self::connect) when no address has
    /// been adopted yet.
    pub async fn probe(&self) -> bool {
        let address = self.address().await;
        let Some(address) = address else {
            return self.connect().await;
        };

        let reachable = self.probe_address(&address).await;
        self.inner.state.write().await.connected = reachable;
        reachable
    }

    /// Probe plus self-heal: on a lost link, rediscover the camera.
    pub async fn check_connection(&self) -> bool {
        let address = self.address().await;
        let Some(address) = address else {
            return self.connect().await;
        };

        if self.probe_address(&address).await {
            self.inner.state.write().await.connected = true;
            return true;
        }

        log::warn!("Connection to {} lost, attempting to reconnect", address);
        self.connect().await
    }

    /// Scan for the camera: USB candidate grid first, then the fixed WiFi
    /// address. Returns the first reachable endpoint.
    pub async fn discover(&self) -> Option<(String, Transport)> {
        for chunk in usb_candidates().chunks(DISCOVERY_FANOUT) {
            let mut probes: JoinSet<(String, bool)> = JoinSet::new();
            for address in chunk {
                let session = self.clone();
                let address = address.clone();
                probes.spawn(async move {
                    let up = session.probe_address(&address).await;
                    (address, up)
                });
            }
            while let Some(joined) = probes.join_next().await {
                if let Ok((address, true)) = joined {
                    probes.abort_all();
                    return Some((address, Transport::Usb));
                }
            }
        }

        let wifi = self.inner.wifi_address.clone();
        if self.probe_address(&wifi).await {
            return Some((wifi, Transport::Wifi));
        }

        None
    }

    /// Discover the camera and adopt its address.
    pub async fn connect(&self) -> bool {
        log::info!("Searching for camera...");

        match self.discover().await {
            Some((address, transport)) => {
                let mut state = self.inner.state.write().await;
                state.address = Some(address.clone());
                state.transport = Some(transport);
                state.connected = true;
                log::info!("Connected to camera via {} at {}", transport, address);
                true
            }
            None => {
                self.inner.state.write().await.connected = false;
                log::warn!(
                    "Camera not found; check that it is on and USB mode is set to connect"
                );
                false
            }
        }
    }

    /// Issue a GET against a vendor endpoint. Non-200 responses and
    /// transport errors are logged and collapse to `None`; a 200 with an
    /// empty body yields `Value::Null` as the generic success marker.
    pub async fn request(&self, endpoint: &str, params: &[(&str, String)]) -> Option<Value> {
        let base = match self.base_url().await {
            Some(base) => base,
            None => {
                // Unset session: one discovery attempt before giving up.
                if !self.connect().await {
                    return None;
                }
                self.base_url().await?
            }
        };

        let url = format!("{}{}", base, endpoint);
        let mut req = self.inner.client.get(&url);
        if !params.is_empty() {
            req = req.query(params);
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) if body.trim().is_empty() => Some(Value::Null),
                Ok(body) => match serde_json::from_str(&body) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        log::debug!("Non-JSON body from {}: {}", endpoint, e);
                        Some(Value::Null)
                    }
                },
                Err(e) => {
                    log::warn!("Error reading response from {}: {}", endpoint, e);
                    None
                }
            },
            Ok(resp) => {
                log::warn!("Command failed: {} returned HTTP {}", endpoint, resp.status());
                None
            }
            Err(e) => {
                log::warn!("Error sending command {}: {}", endpoint, e);
                None
            }
        }
    }

    /// Current camera state and settings.
    pub async fn get_state(&self) -> Option<Value> {
        self.request(STATE_ENDPOINT, &[]).await
    }

    /// Keep-alive ping so the camera does not sleep mid-session.
    pub async fn keep_alive(&self) -> bool {
        self.request(KEEP_ALIVE_ENDPOINT, &[]).await.is_some()
    }

    async fn probe_address(&self, address: &str) -> bool {
        let url = format!(
            "http://{}:{}{}",
            address, self.inner.port, STATE_ENDPOINT
        );
        match self.inner.probe_client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Candidate USB addresses: the camera lands at `.51` on a `172.2x.1xx`
/// subnet, x varying by host NDIS setup.
fn usb_candidates() -> Vec<String> {
    let mut addresses = Vec::with_capacity(200);
    for second in 20..30 {
        for third in 100..120 {
            addresses.push(format!("172.{}.{}.51", second, third));
        }
    }
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usb_candidate_grid() {
        let candidates = usb_candidates();
        assert_eq!(candidates.len(), 200);
        assert!(candidates.iter().all(|a| a.ends_with(".51")));
        assert!(candidates.contains(&"172.20.100.51".to_string()));
        assert!(candidates.contains(&"172.29.119.51".to_string()));
    }

    #[tokio::test]
    async fn test_direct_session_adopts_address() {
        let session = ConnectionSession::direct("10.5.5.9", 8080).unwrap();
        assert_eq!(session.address().await.as_deref(), Some("10.5.5.9"));
        assert_eq!(
            session.base_url().await.as_deref(),
            Some("http://10.5.5.9:8080")
        );

        let info = session.info().await;
        assert!(!info.connected);
        assert_eq!(info.transport, Some(Transport::Wifi));
    }

    #[tokio::test]
    async fn test_direct_usb_address_is_usb_transport() {
        let session = ConnectionSession::direct("172.25.105.51", 8080).unwrap();
        assert_eq!(session.info().await.transport, Some(Transport::Usb));
    }
}

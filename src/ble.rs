//! BLE WiFi-radio wake (feature `ble`).
//!
//! The camera keeps a BLE service up even when its WiFi access point is
//! asleep. Writing the wake payload to the vendor command characteristic
//! turns the AP back on, after which the normal HTTP discovery path works.
//! No acknowledgment is parsed beyond the write itself succeeding.

use crate::errors::CameraError;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use uuid::Uuid;

/// Vendor command characteristic.
const COMMAND_CHARACTERISTIC: Uuid = Uuid::from_u128(0xb5f9_0072_aa8d_11e3_9046_0002_a5d5_c51b);

/// "Enable WiFi AP" payload.
const WIFI_AP_ON: [u8; 4] = [0x03, 0x17, 0x01, 0x01];

/// Settle wait after the write; the AP takes a moment to come up.
const WAKE_SETTLE: Duration = Duration::from_secs(2);

fn ble_err(e: btleplug::Error) -> CameraError {
    CameraError::Ble(e.to_string())
}

/// Scan for the camera over BLE and ask it to enable its WiFi AP.
///
/// `scan_window` bounds the advertisement scan; ten seconds is usually
/// plenty when the camera is on and not paired elsewhere.
pub async fn wake_wifi(scan_window: Duration) -> Result<(), CameraError> {
    let manager = Manager::new().await.map_err(ble_err)?;
    let adapter = manager
        .adapters()
        .await
        .map_err(ble_err)?
        .into_iter()
        .next()
        .ok_or_else(|| CameraError::Ble("no bluetooth adapter found".to_string()))?;

    let camera = find_camera(&adapter, scan_window).await?;
    log::info!("Found camera over BLE, waking WiFi radio");

    camera.connect().await.map_err(ble_err)?;
    let result = write_wake(&camera).await;
    let _ = camera.disconnect().await;
    result
}

async fn find_camera(adapter: &Adapter, scan_window: Duration) -> Result<Peripheral, CameraError> {
    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(ble_err)?;
    tokio::time::sleep(scan_window).await;
    let _ = adapter.stop_scan().await;

    for peripheral in adapter.peripherals().await.map_err(ble_err)? {
        let name = peripheral
            .properties()
            .await
            .map_err(ble_err)?
            .and_then(|props| props.local_name);
        if let Some(name) = name {
            if name.contains("GoPro") {
                log::debug!("BLE scan matched '{}'", name);
                return Ok(peripheral);
            }
        }
    }

    Err(CameraError::Ble(
        "no camera found via bluetooth scan".to_string(),
    ))
}

async fn write_wake(camera: &Peripheral) -> Result<(), CameraError> {
    camera.discover_services().await.map_err(ble_err)?;

    let characteristic = camera
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == COMMAND_CHARACTERISTIC)
        .ok_or_else(|| CameraError::Ble("command characteristic not found".to_string()))?;

    camera
        .write(&characteristic, &WIFI_AP_ON, WriteType::WithResponse)
        .await
        .map_err(ble_err)?;

    tokio::time::sleep(WAKE_SETTLE).await;
    Ok(())
}

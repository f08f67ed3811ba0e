mod common;

use common::StubCamera;
use heroctl::config::CaptureConfig;
use heroctl::{Camera, CameraError, ConnectionSession};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn capture_config() -> CaptureConfig {
    CaptureConfig {
        settle_timeout_ms: 500,
        poll_interval_ms: 20,
        default_interval_secs: 10,
    }
}

fn camera_for(stub: &StubCamera) -> Camera {
    let session = ConnectionSession::direct("127.0.0.1", stub.port).unwrap();
    Camera::new(session, &capture_config())
}

#[tokio::test]
async fn test_take_photo_confirms_preset_before_shutter() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    assert!(camera.take_photo().await);

    let requests = stub.requests();
    let load_idx = requests
        .iter()
        .position(|r| r.starts_with("/gopro/camera/presets/load") && r.contains("id=1"))
        .expect("photo preset load");
    let shutter_idx = requests
        .iter()
        .position(|r| r.starts_with("/gopro/camera/shutter/start"))
        .expect("shutter trigger");
    assert!(load_idx < shutter_idx);

    // At least one state poll confirmed the preset between the two.
    assert!(requests[load_idx..shutter_idx]
        .iter()
        .any(|r| r.starts_with("/gopro/camera/state")));
}

#[tokio::test]
async fn test_take_photo_fails_when_preset_never_confirms() {
    let stub = StubCamera::start().await;
    stub.fail_path("/gopro/camera/state");
    let camera = camera_for(&stub);

    assert!(!camera.take_photo().await);

    // Shutter must not fire when the mode switch is unconfirmed.
    assert!(!stub
        .requests()
        .iter()
        .any(|r| r.starts_with("/gopro/camera/shutter")));
}

#[tokio::test]
async fn test_video_recording_flag() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    assert!(!camera.is_recording());
    assert!(camera.start_video().await);
    assert!(camera.is_recording());
    assert!(camera.stop_video().await);
    assert!(!camera.is_recording());
}

#[tokio::test]
async fn test_set_resolution_maps_to_option_code() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    camera.set_resolution("4k").await.unwrap();

    let requests = stub.requests();
    assert!(requests
        .iter()
        .any(|r| r.starts_with("/gopro/camera/setting")
            && r.contains("setting=2")
            && r.contains("option=1")));
}

#[tokio::test]
async fn test_set_fps_maps_to_option_code() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    camera.set_fps(60).await.unwrap();

    let requests = stub.requests();
    assert!(requests
        .iter()
        .any(|r| r.starts_with("/gopro/camera/setting")
            && r.contains("setting=3")
            && r.contains("option=5")));
}

#[tokio::test]
async fn test_unsupported_keys_fail_without_request() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    let res = camera.set_resolution("8k").await;
    assert!(matches!(res, Err(CameraError::Unsupported { .. })));

    let fps = camera.set_fps(25).await;
    assert!(matches!(fps, Err(CameraError::Unsupported { .. })));

    assert!(!stub
        .requests()
        .iter()
        .any(|r| r.starts_with("/gopro/camera/setting")));
}

#[tokio::test]
async fn test_interval_capture_lifecycle() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    let shots = Arc::new(AtomicUsize::new(0));
    let counter = shots.clone();
    camera
        .start_interval(Duration::from_millis(50), move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .await
        .unwrap();
    assert!(camera.interval_running().await);

    // A second start fails without spawning another loop.
    let second = camera.start_interval(Duration::from_millis(50), |_| {}).await;
    assert!(matches!(second, Err(CameraError::Busy(_))));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(camera.stop_interval().await);
    assert!(!camera.interval_running().await);

    let taken = shots.load(Ordering::Relaxed);
    assert!(taken >= 1, "expected at least one shot, got {}", taken);

    // No further shots after stop.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(shots.load(Ordering::Relaxed), taken);
}

#[tokio::test]
async fn test_stop_interval_when_idle_is_noop_success() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    assert!(camera.stop_interval().await);
}

#[tokio::test]
async fn test_status_reports_connection_and_state() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    let status = camera.status().await;
    assert!(status.connected);
    assert!(status.state.is_some());
    assert!(!status.recording);
}

#[tokio::test]
async fn test_delayed_photo_fires_after_delay() {
    let stub = StubCamera::start().await;
    let camera = camera_for(&stub);

    let (tx, rx) = tokio::sync::oneshot::channel();
    camera.delayed_photo(Duration::from_millis(50), move |ok| {
        let _ = tx.send(ok);
    });

    let ok = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("callback within timeout")
        .expect("callback delivered");
    assert!(ok);
}

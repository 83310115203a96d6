//! Session end-to-end scenarios
//!
//! Drives a `SessionTask` through its inbound queue and checks what reached
//! the pointer backend.

use bytes::Bytes;
use image::{imageops, GrayImage, Luma};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use airmouse_server::config::Config;
use airmouse_server::input::{shared, PointerCommand, RecordingPointer};
use airmouse_server::protocol::{Button, ServerMessage};
use airmouse_server::session::{
    Inbound, RegistryEvent, SessionContext, SessionError, SessionId, SessionPhase,
    SessionRegistry, SessionTask,
};

struct Harness {
    inbound: mpsc::Sender<Inbound>,
    outbound: mpsc::Receiver<ServerMessage>,
    recorder: RecordingPointer,
    registry: Arc<SessionRegistry>,
    id: SessionId,
    handle: JoinHandle<Result<(), SessionError>>,
}

impl Harness {
    async fn start() -> Self {
        Self::with_recorder(RecordingPointer::new()).await
    }

    async fn with_recorder(recorder: RecordingPointer) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let ctx = SessionContext::new(
            &Config::default(),
            Arc::clone(&registry),
            shared(recorder.clone()),
        );
        let (out_tx, outbound) = mpsc::channel(64);
        let (inbound, in_rx) = mpsc::channel(64);
        let task = SessionTask::start(ctx, "test-device", out_tx).await;
        let id = task.id();
        let handle = tokio::spawn(task.run(in_rx));
        Self {
            inbound,
            outbound,
            recorder,
            registry,
            id,
            handle,
        }
    }

    async fn send(&self, message: Value) {
        self.inbound
            .send(Inbound::Text(message.to_string()))
            .await
            .unwrap();
    }

    async fn send_raw(&self, text: &str) {
        self.inbound
            .send(Inbound::Text(text.to_string()))
            .await
            .unwrap();
    }

    async fn send_binary(&self, data: Vec<u8>) {
        self.inbound
            .send(Inbound::Binary(Bytes::from(data)))
            .await
            .unwrap();
    }

    async fn configure(&mut self, config: Value) {
        let mut message = config;
        message["t"] = json!("config");
        self.send(message).await;
        assert_eq!(self.outbound.recv().await, Some(ServerMessage::configured()));
    }

    /// Disconnect and wait for teardown
    async fn close(self) -> (Result<(), SessionError>, Closed) {
        let Harness {
            inbound,
            mut outbound,
            recorder,
            registry,
            handle,
            ..
        } = self;
        drop(inbound);
        let result = handle.await.unwrap();

        let mut replies = Vec::new();
        while let Ok(message) = outbound.try_recv() {
            replies.push(message);
        }
        (
            result,
            Closed {
                recorder,
                registry,
                replies,
            },
        )
    }
}

struct Closed {
    recorder: RecordingPointer,
    registry: Arc<SessionRegistry>,
    replies: Vec<ServerMessage>,
}

fn imu(ts: f64, accel: (f64, f64), gyro: (f64, f64), orientation: (f64, f64)) -> Value {
    json!({
        "t": "imu.sample",
        "ts": ts,
        "accel": { "x": accel.0, "y": accel.1, "z": 9.81 },
        "gyro": { "alpha": gyro.0, "beta": gyro.1, "gamma": 0.0 },
        "orientation": { "alpha": orientation.0, "beta": orientation.1, "gamma": 0.0 },
    })
}

fn accel_only(ts: f64, x: f64, y: f64) -> Value {
    json!({
        "t": "imu.sample",
        "ts": ts,
        "accel": { "x": x, "y": y, "z": 9.81 },
    })
}

fn moves(recorder: &RecordingPointer) -> usize {
    recorder
        .commands()
        .iter()
        .filter(|c| matches!(c, PointerCommand::Move { .. }))
        .count()
}

/// Deterministic desk texture
fn desk(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let mut h = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263) ^ 5;
        h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
        Luma([(h >> 24) as u8])
    })
}

fn camera_view(desk: &GrayImage, ox: u32, oy: u32) -> Vec<u8> {
    imageops::crop_imm(desk, ox, oy, 64, 48).to_image().into_raw()
}

fn frame_header(seq: u64, ts: f64) -> Value {
    json!({
        "t": "cam.frame",
        "seq": seq,
        "ts": ts,
        "width": 64,
        "height": 48,
        "mime": "gray8",
    })
}

#[tokio::test]
async fn accelerometer_only_moves_right() {
    let mut h = Harness::start().await;
    h.configure(json!({ "sensitivity": 1.0, "deadzonePx": 0.5, "enabled": { "accel": true } }))
        .await;

    h.send(accel_only(1000.0, 1.0, 0.0)).await;
    h.send(accel_only(1050.0, 1.0, 0.0)).await;

    let (result, closed) = h.close().await;
    assert!(result.is_ok());
    let (x, y) = closed.recorder.total_motion();
    assert!(x > 0, "expected rightward motion, got {}", x);
    assert_eq!(y, 0);
}

#[tokio::test]
async fn split_vote_produces_no_motion() {
    let mut h = Harness::start().await;
    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true, "gyro": true } }))
        .await;

    // Accel pushes right; positive yaw rate turns the device left
    h.send(imu(0.0, (1.0, 0.0), (40.0, 0.0), (0.0, 0.0))).await;
    h.send(imu(50.0, (1.0, 0.0), (40.0, 0.0), (0.0, 0.0))).await;
    h.send(imu(100.0, (1.0, 0.0), (40.0, 0.0), (0.0, 0.0))).await;

    let (_, closed) = h.close().await;
    assert_eq!(moves(&closed.recorder), 0);
    assert_eq!(closed.recorder.total_motion(), (0, 0));
}

#[tokio::test]
async fn majority_direction_wins_with_averaged_magnitude() {
    let mut h = Harness::start().await;
    h.configure(json!({
        "sensitivity": 1.0,
        "enabled": { "accel": true, "gyro": true, "orientation": true },
    }))
    .await;

    h.send(imu(0.0, (0.0, 0.0), (0.0, 0.0), (0.0, 0.0))).await;
    // accel up 6px, gyro up 4px, orientation down 4px over 50ms
    h.send(imu(50.0, (0.0, -1.0), (0.0, 40.0), (0.0, -10.0))).await;

    let (_, closed) = h.close().await;
    assert_eq!(closed.recorder.total_motion(), (0, -5));
}

#[tokio::test]
async fn disconnect_releases_held_button() {
    let mut h = Harness::start().await;
    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true } }))
        .await;
    h.send(json!({ "t": "input.click", "button": "left", "state": "down" }))
        .await;

    let (result, closed) = h.close().await;
    assert!(result.is_ok());
    assert_eq!(
        closed.recorder.button_events(),
        vec![(Button::Left, true), (Button::Left, false)]
    );
    assert_eq!(closed.registry.count().await, 0);
}

#[tokio::test]
async fn final_snapshot_has_no_held_buttons() {
    let mut h = Harness::start().await;
    let mut events = h.registry.subscribe();
    h.send(json!({ "t": "input.click", "button": "left", "state": "down" }))
        .await;
    h.send(json!({ "t": "input.click", "button": "right", "state": "down" }))
        .await;
    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true } }))
        .await;
    let snapshot = h.registry.snapshot(&h.id).await.unwrap();
    assert_eq!(snapshot.held_buttons.len(), 2);

    let (result, _) = h.close().await;
    assert!(result.is_ok());

    let mut removed = None;
    while let Ok(event) = events.try_recv() {
        if let RegistryEvent::Removed(snapshot) = event {
            removed = Some(snapshot);
        }
    }
    let removed = removed.expect("no removal event");
    assert!(removed.held_buttons.is_empty());
    assert_eq!(removed.last_button, Some(Button::Right));
}

#[tokio::test]
async fn repeated_down_is_single_press() {
    let h = Harness::start().await;
    h.send(json!({ "t": "input.click", "button": "right", "state": "down" }))
        .await;
    h.send(json!({ "t": "input.click", "button": "right", "state": "down" }))
        .await;
    h.send(json!({ "t": "input.click", "button": "right", "state": "up" }))
        .await;

    let (_, closed) = h.close().await;
    assert_eq!(
        closed.recorder.button_events(),
        vec![(Button::Right, true), (Button::Right, false)]
    );
}

#[tokio::test]
async fn dispatch_failure_ends_session_with_release() {
    // Accepts the press, then rejects everything but releases
    let mut h = Harness::with_recorder(RecordingPointer::failing_after(1)).await;
    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true } }))
        .await;
    h.send(json!({ "t": "input.click", "button": "left", "state": "down" }))
        .await;
    h.send(json!({ "t": "input.scroll", "delta": 2.0 })).await;

    let registry = Arc::clone(&h.registry);
    let id = h.id;
    let (result, closed) = h.close().await;

    assert!(matches!(result, Err(SessionError::Dispatch(_))));
    assert_eq!(
        closed.recorder.button_events(),
        vec![(Button::Left, true), (Button::Left, false)]
    );
    assert!(registry.snapshot(&id).await.is_none());
}

#[tokio::test]
async fn sensor_data_before_config_is_discarded() {
    let mut h = Harness::start().await;
    h.send(accel_only(0.0, 5.0, 0.0)).await;
    h.send(accel_only(50.0, 5.0, 0.0)).await;
    h.send(json!({ "t": "move.delta", "dx": 10.0, "dy": 10.0 })).await;

    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true } }))
        .await;
    // First sample after config only seeds the estimator
    h.send(accel_only(100.0, 5.0, 0.0)).await;

    let (_, closed) = h.close().await;
    assert_eq!(moves(&closed.recorder), 0);
}

#[tokio::test]
async fn move_delta_scaled_by_sensitivity() {
    let mut h = Harness::start().await;
    h.configure(json!({ "sensitivity": 2.0, "enabled": { "accel": true } }))
        .await;
    h.send(json!({ "t": "move.delta", "dx": 3.0, "dy": -1.5 })).await;

    let (_, closed) = h.close().await;
    assert_eq!(closed.recorder.total_motion(), (6, -3));
}

#[tokio::test]
async fn hello_is_acknowledged() {
    let mut h = Harness::start().await;
    h.send(json!({ "t": "hello", "clientVersion": "web-1.0", "device": "phone" }))
        .await;
    match h.outbound.recv().await {
        Some(ServerMessage::State { ok, version, .. }) => {
            assert_eq!(ok, Some(true));
            assert_eq!(version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
        }
        other => panic!("Expected server.state, got {:?}", other),
    }

    let snapshot = h.registry.snapshot(&h.id).await.unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Identified);
    assert_eq!(snapshot.client_version.as_deref(), Some("web-1.0"));
    h.close().await;
}

#[tokio::test]
async fn protocol_faults_are_reported_and_survived() {
    let mut h = Harness::start().await;
    h.send(json!({ "t": "telemetry" })).await;
    h.send_raw("{not json").await;
    h.send(json!({ "t": "config", "enabled": { "accel": true } })).await;
    for _ in 0..3 {
        assert!(matches!(
            h.outbound.recv().await,
            Some(ServerMessage::Error { .. })
        ));
    }

    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true } }))
        .await;
    h.send(json!({ "t": "move.delta", "dx": 2.0, "dy": 0.0 })).await;

    let (result, closed) = h.close().await;
    assert!(result.is_ok());
    assert_eq!(closed.recorder.total_motion(), (2, 0));
    assert!(closed.replies.is_empty());
}

#[tokio::test]
async fn protocol_fault_replies_carry_message() {
    let mut h = Harness::start().await;
    h.send(json!({ "t": "telemetry" })).await;
    match h.outbound.recv().await {
        Some(ServerMessage::Error { message }) => assert!(message.contains("telemetry")),
        other => panic!("Expected error, got {:?}", other),
    }

    h.send(json!({ "t": "config", "sensitivity": -1.0, "enabled": {} }))
        .await;
    match h.outbound.recv().await {
        Some(ServerMessage::Error { message }) => assert!(message.contains("sensitivity")),
        other => panic!("Expected error, got {:?}", other),
    }
    h.close().await;
}

#[tokio::test]
async fn camera_dropout_does_not_corrupt_next_pair() {
    let mut h = Harness::start().await;
    h.configure(json!({ "sensitivity": 1.0, "enabled": { "camera": true } }))
        .await;
    let desk = desk(96, 72);

    // Payload with no header
    h.send_binary(camera_view(&desk, 30, 5)).await;

    h.send(frame_header(1, 0.0)).await;
    h.send_binary(camera_view(&desk, 10, 10)).await;
    h.send(frame_header(2, 66.0)).await;
    h.send_binary(camera_view(&desk, 12, 10)).await;

    let (result, closed) = h.close().await;
    assert!(result.is_ok());
    // Content moved 2px left: device moved right, scaled by pixel_scale
    let expected = (2.0 * Config::default().camera.pixel_scale) as i64;
    assert_eq!(closed.recorder.total_motion(), (expected, 0));
    // Pairing faults are not sent to the device
    assert!(closed.replies.is_empty());
}

#[tokio::test]
async fn camera_payload_ignored_when_camera_disabled() {
    let mut h = Harness::start().await;
    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true } }))
        .await;
    let desk = desk(96, 72);

    h.send(frame_header(1, 0.0)).await;
    h.send_binary(camera_view(&desk, 10, 10)).await;
    h.send(frame_header(2, 66.0)).await;
    h.send_binary(camera_view(&desk, 14, 10)).await;

    let (_, closed) = h.close().await;
    assert_eq!(moves(&closed.recorder), 0);
}

#[tokio::test]
async fn reconfigure_keeps_held_buttons() {
    let mut h = Harness::start().await;
    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true } }))
        .await;
    h.send(json!({ "t": "input.click", "button": "left", "state": "down" }))
        .await;
    h.configure(json!({ "sensitivity": 3.0, "enabled": { "accel": true } }))
        .await;
    h.send(json!({ "t": "move.delta", "dx": 1.0, "dy": 0.0 })).await;

    let snapshot = h.registry.snapshot(&h.id).await.unwrap();
    assert_eq!(snapshot.held_buttons, vec![Button::Left]);

    let (_, closed) = h.close().await;
    assert_eq!(closed.recorder.total_motion(), (3, 0));
    assert_eq!(
        closed.recorder.button_events(),
        vec![(Button::Left, true), (Button::Left, false)]
    );
}

#[tokio::test]
async fn enabled_sources_fixed_after_config() {
    let mut h = Harness::start().await;
    h.configure(json!({ "sensitivity": 1.0, "enabled": { "accel": true } }))
        .await;
    h.send(json!({ "t": "config", "sensitivity": 5.0, "enabled": { "gyro": true } }))
        .await;
    match h.outbound.recv().await {
        Some(ServerMessage::Error { message }) => assert!(message.contains("enabled")),
        other => panic!("Expected error, got {:?}", other),
    }

    // The original session config stays in force
    h.send(json!({ "t": "move.delta", "dx": 2.0, "dy": 0.0 })).await;
    let snapshot = h.registry.snapshot(&h.id).await.unwrap();
    assert_eq!(snapshot.enabled.map(|e| e.accel), Some(true));

    let (_, closed) = h.close().await;
    assert_eq!(closed.recorder.total_motion(), (2, 0));
}

#[tokio::test]
async fn camera_disagreeing_with_recent_accel_is_suppressed() {
    let mut h = Harness::start().await;
    h.configure(json!({
        "sensitivity": 1.0,
        "deadzonePx": 0.0,
        "enabled": { "camera": true, "accel": true },
    }))
    .await;
    let desk = desk(96, 72);

    // Camera frames and IMU samples arrive as separate messages; accel keeps
    // pushing left while the camera sees the device move right
    h.send(accel_only(0.0, -0.5, 0.0)).await;
    h.send(frame_header(1, 10.0)).await;
    h.send_binary(camera_view(&desk, 10, 10)).await;
    h.send(accel_only(50.0, -0.5, 0.0)).await;
    h.send(frame_header(2, 60.0)).await;
    h.send_binary(camera_view(&desk, 12, 10)).await;
    h.send(accel_only(100.0, -0.5, 0.0)).await;

    let (result, closed) = h.close().await;
    assert!(result.is_ok());
    // Only the accel tick before the camera had a vector moved the pointer
    assert_eq!(moves(&closed.recorder), 1);
    let (x, y) = closed.recorder.total_motion();
    assert!(x < 0, "expected leftward motion, got {}", x);
    assert_eq!(y, 0);
    assert!(closed
        .recorder
        .commands()
        .iter()
        .all(|c| !matches!(c, PointerCommand::Move { dx, .. } if *dx > 0)));
}

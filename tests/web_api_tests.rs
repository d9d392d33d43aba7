//! Integration tests for the HTTP control surface.
//!
//! The broker adapter is disabled so publishes are no-ops and nothing
//! touches the network.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use trem_dash::services::{
    build_router, ApiResponse, BrokerStatusResponse, FullStatusResponse, StatusResponse,
    TelemetryResponse,
};
use trem_dash::{
    ActivityLog, BrokerClient, BrokerConfig, Direction, SharedTrainState, TrainMachine, WebConfig,
};

fn test_app() -> (axum::Router, Arc<SharedTrainState>) {
    let broker = Arc::new(BrokerClient::new(BrokerConfig::default().with_enabled(false)));
    let state = Arc::new(SharedTrainState::new(
        TrainMachine::new(),
        broker,
        Arc::new(ActivityLog::new()),
    ));
    let router = build_router(Arc::clone(&state), &WebConfig::default());
    (router, state)
}

async fn post_command(app: axum::Router, body: &str) -> ApiResponse<StatusResponse> {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/command")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn get_json(app: axum::Router, uri: &str) -> serde_json::Value {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn status_starts_powered_off() {
    let (app, _state) = test_app();
    let json = get_json(app, "/api/status").await;
    let response: ApiResponse<FullStatusResponse> = serde_json::from_value(json).unwrap();

    assert!(response.success);
    let data = response.data.unwrap();
    assert!(!data.train.power);
    assert_eq!(data.train.current_speed, 0);
    assert_eq!(data.train.direction, Direction::Forward);
    assert_eq!(data.telemetry.operation_time, 0);
    assert_eq!(data.telemetry.max_speed, 0);
}

#[tokio::test]
async fn power_on_then_duplicate_rejected() {
    let (app, _state) = test_app();

    let first = post_command(app.clone(), r#"{"status": "on"}"#).await;
    assert!(first.success);
    assert_eq!(first.message.as_deref(), Some("train powered on"));
    assert!(first.data.unwrap().power);

    let second = post_command(app, r#"{"status": "on"}"#).await;
    assert!(!second.success);
    assert_eq!(second.message.as_deref(), Some("train is already powered on"));
}

#[tokio::test]
async fn speed_requires_power() {
    let (app, _state) = test_app();
    let response = post_command(app, r#"{"velocidade": 50}"#).await;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("train is powered off"));
}

#[tokio::test]
async fn speed_command_updates_target_and_telemetry() {
    let (app, _state) = test_app();
    post_command(app.clone(), r#"{"status": "on"}"#).await;

    let response = post_command(app.clone(), r#"{"velocidade": 100}"#).await;
    assert!(response.success);
    let data = response.data.unwrap();
    assert_eq!(data.target_speed, 100);
    // Current speed only moves on ramp ticks
    assert_eq!(data.current_speed, 0);

    let telemetry: ApiResponse<TelemetryResponse> =
        serde_json::from_value(get_json(app, "/api/telemetry").await).unwrap();
    let telemetry = telemetry.data.unwrap();
    assert_eq!(telemetry.max_speed, 100);
    assert_eq!(telemetry.avg_speed, 50.0);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let (app, _state) = test_app();
    post_command(app.clone(), r#"{"status": "on"}"#).await;

    let response = post_command(app.clone(), r#"{"velocidade": 200}"#).await;
    assert!(!response.success);

    let response = post_command(app.clone(), r#"{"direcao": "sideways"}"#).await;
    assert!(!response.success);

    let response = post_command(app.clone(), r#"{"status": "ON"}"#).await;
    assert!(!response.success);

    let response = post_command(app, r#"{}"#).await;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("unrecognized command"));
}

#[tokio::test]
async fn direction_change_under_motion_is_deferred() {
    let (app, state) = test_app();
    post_command(app.clone(), r#"{"status": "on"}"#).await;
    post_command(app.clone(), r#"{"velocidade": 10}"#).await;

    // Let a ramp tick bring the train into motion
    let now = state.now_ms();
    state.with_train(|train, _| {
        train.advance(now + 500);
    });
    assert!(state.state().current_speed > 1);

    let response = post_command(app, r#"{"direcao": "re"}"#).await;
    assert!(response.success);
    assert!(response.message.unwrap().contains("slowing down"));
    let data = response.data.unwrap();
    assert_eq!(data.pending_direction, Some(Direction::Reverse));
    assert_eq!(data.direction, Direction::Forward);
    assert_eq!(data.target_speed, 0);
}

#[tokio::test]
async fn emergency_locks_out_and_non_truthy_is_noop() {
    let (app, _state) = test_app();
    post_command(app.clone(), r#"{"status": "on"}"#).await;

    // Non-truthy emergencia does nothing
    let response = post_command(app.clone(), r#"{"emergencia": "false"}"#).await;
    assert!(response.success);
    assert!(!response.data.unwrap().emergency_active);

    let response = post_command(app.clone(), r#"{"emergencia": "true"}"#).await;
    assert!(response.success);
    assert_eq!(response.message.as_deref(), Some("emergency stop triggered"));
    assert!(response.data.unwrap().emergency_active);

    // Everything manual is now locked out
    let response = post_command(app, r#"{"velocidade": 10}"#).await;
    assert!(!response.success);
    assert_eq!(
        response.message.as_deref(),
        Some("emergency stop active, controls are locked out")
    );
}

#[tokio::test]
async fn logs_record_commands_newest_first() {
    let (app, _state) = test_app();
    post_command(app.clone(), r#"{"status": "on"}"#).await;
    post_command(app.clone(), r#"{"velocidade": 30}"#).await;

    let json = get_json(app.clone(), "/api/logs").await;
    assert_eq!(json["success"], true);
    let entries = json["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "speed");
    assert_eq!(entries[1]["kind"], "power");

    let json = get_json(app, "/api/logs?limit=1").await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn broker_endpoint_reports_disabled() {
    let (app, _state) = test_app();
    let response: ApiResponse<BrokerStatusResponse> =
        serde_json::from_value(get_json(app, "/api/broker").await).unwrap();
    let data = response.data.unwrap();
    assert!(!data.enabled);
    assert!(!data.connected);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _state) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

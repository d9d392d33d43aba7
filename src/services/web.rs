//! Axum HTTP control surface.
//!
//! Routes:
//! - POST `/api/command` - One command per request, keyed by wire field
//!   (`status`, `velocidade`, `direcao`, `emergencia`, `aceleracao`)
//! - GET `/api/status` - Current train state
//! - GET `/api/telemetry` - Derived statistics
//! - GET `/api/broker` - Broker connectivity
//! - GET `/api/logs` - Recent activity entries, newest first
//!
//! Every response uses the [`ApiResponse`] envelope. Command handling holds
//! the state lock only for the transition itself; the broker relay happens
//! afterwards, and a relay failure after a committed transition downgrades
//! the response message rather than rolling anything back.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::activity::{ActivityEntry, ActivityLevel};
use crate::command::{validate, CommandRequest};
use crate::config::WebConfig;

use super::api::{
    ApiResponse, BrokerStatusResponse, FullStatusResponse, StatusResponse, TelemetryResponse,
};
use super::shared::SharedTrainState;

/// POST /api/command - validate, transition, then relay.
async fn post_command(
    State(state): State<Arc<SharedTrainState>>,
    Json(request): Json<CommandRequest>,
) -> Json<ApiResponse<StatusResponse>> {
    let intent = match validate(&request) {
        Ok(Some(intent)) => intent,
        Ok(None) => {
            // Non-truthy emergencia is a protocol-level no-op.
            return Json(ApiResponse::ok_with_message(
                "emergency flag not set, nothing to do",
                StatusResponse::from(&state.state()),
            ));
        }
        Err(error) => {
            state.activity().record(
                "command",
                format!("rejected: {error}"),
                None,
                ActivityLevel::Error,
            );
            return Json(ApiResponse::err(error.to_string()));
        }
    };

    let applied = match state.apply_intent(intent) {
        Ok(applied) => applied,
        Err(error) => {
            state.activity().record(
                intent.kind(),
                format!("rejected: {error}"),
                None,
                ActivityLevel::Error,
            );
            return Json(ApiResponse::err(error.to_string()));
        }
    };

    let level = if applied.emergency {
        ActivityLevel::Critical
    } else {
        ActivityLevel::Info
    };
    state.activity().record(
        applied.intent.kind(),
        applied.message.clone(),
        Some(json!({"state": applied.state})),
        level,
    );

    // Relay outside the lock. The transition stays committed either way.
    let mut message = applied.message.clone();
    if let Some(publication) = &applied.publication {
        let result = state
            .broker()
            .publish(
                publication.topic,
                publication.payload.clone(),
                publication.qos,
                publication.retain,
            )
            .await;
        if let Err(error) = result {
            state.activity().record(
                "broker",
                format!("publish failed after committed command: {error}"),
                None,
                ActivityLevel::Warning,
            );
            message = format!("{message} (broker relay failed)");
        }
    }

    Json(ApiResponse::ok_with_message(
        message,
        StatusResponse::from(&applied.state),
    ))
}

/// GET /api/status - train state plus telemetry in one poll.
async fn get_status(
    State(state): State<Arc<SharedTrainState>>,
) -> Json<ApiResponse<FullStatusResponse>> {
    Json(ApiResponse::ok(FullStatusResponse {
        train: StatusResponse::from(&state.state()),
        telemetry: TelemetryResponse::from(&state.telemetry()),
    }))
}

/// GET /api/telemetry
async fn get_telemetry(
    State(state): State<Arc<SharedTrainState>>,
) -> Json<ApiResponse<TelemetryResponse>> {
    Json(ApiResponse::ok(TelemetryResponse::from(&state.telemetry())))
}

/// GET /api/broker
async fn get_broker(
    State(state): State<Arc<SharedTrainState>>,
) -> Json<ApiResponse<BrokerStatusResponse>> {
    Json(ApiResponse::ok(BrokerStatusResponse {
        enabled: state.broker().is_enabled(),
        connected: state.broker().is_connected(),
    }))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

/// GET /api/logs?limit=N - newest entries first, capped at the ring size.
async fn get_logs(
    State(state): State<Arc<SharedTrainState>>,
    Query(query): Query<LogsQuery>,
) -> Json<ApiResponse<Vec<ActivityEntry>>> {
    let limit = query.limit.unwrap_or(100);
    Json(ApiResponse::ok(state.activity().recent(limit)))
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::err("not found")),
    )
}

/// Build the axum router with all routes.
pub fn build_router(state: Arc<SharedTrainState>, config: &WebConfig) -> Router {
    let mut router = Router::new()
        .route("/api/command", post(post_command))
        .route("/api/status", get(get_status))
        .route("/api/telemetry", get(get_telemetry))
        .route("/api/broker", get(get_broker))
        .route("/api/logs", get(get_logs))
        .fallback(not_found)
        .with_state(state);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<SharedTrainState>, config: &WebConfig) -> anyhow::Result<()> {
    let router = build_router(state, config);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "http server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

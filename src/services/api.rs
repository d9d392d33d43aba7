//! API response types for the HTTP control surface.

use serde::{Deserialize, Serialize};

use crate::telemetry::{round_2dp, TelemetrySnapshot};
use crate::train::{AccelMode, Direction, TrainState};

/// Response envelope shared by every endpoint: `success` says whether the
/// request took effect, `message` carries the operator-facing text, `data`
/// the endpoint-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was accepted and applied.
    pub success: bool,
    /// Operator-facing description of what happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Endpoint-specific payload (present when success=true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful response with data and no message.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Successful response with both a message and data.
    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    /// Failed response with a message and no data.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Train state as exposed by `GET /api/status` and echoed after commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the train is powered on.
    pub power: bool,
    /// Current direction (`frente` / `re` on the wire).
    pub direction: Direction,
    /// Current speed in km/h.
    pub current_speed: u16,
    /// Target speed in km/h.
    pub target_speed: u16,
    /// Active acceleration profile.
    pub accel_mode: AccelMode,
    /// Whether the emergency lockout is active.
    pub emergency_active: bool,
    /// Direction change waiting for the train to slow down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_direction: Option<Direction>,
}

impl From<&TrainState> for StatusResponse {
    fn from(state: &TrainState) -> Self {
        Self {
            power: state.power,
            direction: state.direction,
            current_speed: state.current_speed,
            target_speed: state.target_speed,
            accel_mode: state.accel_mode,
            emergency_active: state.emergency_active,
            pending_direction: state.pending_direction,
        }
    }
}

/// Telemetry as exposed by `GET /api/telemetry`. Distance and average are
/// rounded to two decimals for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryResponse {
    /// Seconds since power-on (frozen while off).
    pub operation_time: u64,
    /// Accumulated distance in km, rounded to 2 decimals.
    pub distance: f64,
    /// Highest speed seen since startup, in km/h.
    pub max_speed: u16,
    /// Blended average speed in km/h, rounded to 2 decimals.
    pub avg_speed: f64,
}

impl From<&TelemetrySnapshot> for TelemetryResponse {
    fn from(snapshot: &TelemetrySnapshot) -> Self {
        Self {
            operation_time: snapshot.operation_time,
            distance: round_2dp(snapshot.distance),
            max_speed: snapshot.max_speed,
            avg_speed: round_2dp(snapshot.avg_speed),
        }
    }
}

/// Combined payload for `GET /api/status`: the train state with the derived
/// telemetry alongside, so the dashboard refreshes both in one poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullStatusResponse {
    /// Train state fields, flattened to the top level.
    #[serde(flatten)]
    pub train: StatusResponse,
    /// Derived statistics.
    pub telemetry: TelemetryResponse,
}

/// Broker connectivity as exposed by `GET /api/broker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerStatusResponse {
    /// Whether the broker adapter is enabled at all.
    pub enabled: bool,
    /// Whether the adapter currently holds a live connection.
    pub connected: bool,
}

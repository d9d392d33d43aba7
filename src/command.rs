//! Command intents and the pure command validator.
//!
//! The control surface accepts one command object per request, keyed by the
//! wire protocol field names (`status`, `velocidade`, `direcao`,
//! `emergencia`, `aceleracao`). [`validate`] normalizes the raw payload into
//! a [`CommandIntent`] or rejects it with a [`ValidationError`]; it never
//! touches any state and is safe to call concurrently.
//!
//! Keys are checked in the protocol's fixed order, so a payload carrying
//! several keys resolves to the first recognized one. Values are lenient in
//! the same way the wire protocol is: `velocidade` may arrive as a JSON
//! number or a numeric string, and a non-truthy `emergencia` is silently
//! ignored rather than rejected.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::train::{AccelMode, Direction, MAX_SPEED_KMH};

/// A normalized, validated command. Created per request, consumed
/// immediately by the state machine, never retained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandIntent {
    /// Power the train on or off.
    Power(bool),
    /// Set the target speed in km/h.
    Speed(u16),
    /// Change the direction of travel.
    Direction(Direction),
    /// Select an acceleration profile.
    Acceleration(AccelMode),
    /// Emergency stop.
    Emergency,
}

impl CommandIntent {
    /// Short name used in log entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Power(_) => "power",
            Self::Speed(_) => "speed",
            Self::Direction(_) => "direction",
            Self::Acceleration(_) => "acceleration",
            Self::Emergency => "emergency",
        }
    }
}

/// Raw command payload as received over HTTP. Fields stay untyped
/// (`serde_json::Value`) so that shape errors surface as [`ValidationError`]
/// rather than as a deserialization failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CommandRequest {
    /// Power command: `"on"` or `"off"`.
    #[serde(default)]
    pub status: Option<Value>,
    /// Speed command: integer 0..=150 (number or numeric string).
    #[serde(default)]
    pub velocidade: Option<Value>,
    /// Direction command: `"frente"` or `"re"`.
    #[serde(default)]
    pub direcao: Option<Value>,
    /// Emergency command: `"true"` or `true`.
    #[serde(default)]
    pub emergencia: Option<Value>,
    /// Acceleration command: `"slow"`, `"normal"`, or `"fast"`.
    #[serde(default)]
    pub aceleracao: Option<Value>,
}

/// Why a payload failed validation. Always recoverable and reported to the
/// caller; no state is touched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The power value was not exactly `"on"` or `"off"`.
    #[error("invalid status, expected \"on\" or \"off\"")]
    InvalidPower,
    /// The speed was non-numeric or outside `[0, 150]`.
    #[error("invalid speed, expected an integer between 0 and {MAX_SPEED_KMH}")]
    InvalidSpeed,
    /// The direction was not `"frente"` or `"re"`.
    #[error("invalid direction, expected \"frente\" or \"re\"")]
    InvalidDirection,
    /// The acceleration mode was not `slow`/`normal`/`fast`.
    #[error("invalid acceleration mode, expected \"slow\", \"normal\" or \"fast\"")]
    InvalidAcceleration,
    /// No recognized command key was present.
    #[error("unrecognized command")]
    UnknownCommand,
}

/// Validate a raw payload into a [`CommandIntent`].
///
/// Returns `Ok(None)` for the one case the protocol treats as a silent
/// no-op: an `emergencia` key whose value is not truthy.
pub fn validate(req: &CommandRequest) -> Result<Option<CommandIntent>, ValidationError> {
    if let Some(value) = &req.status {
        return match value.as_str() {
            Some("on") => Ok(Some(CommandIntent::Power(true))),
            Some("off") => Ok(Some(CommandIntent::Power(false))),
            _ => Err(ValidationError::InvalidPower),
        };
    }

    if let Some(value) = &req.velocidade {
        let speed = parse_speed(value).ok_or(ValidationError::InvalidSpeed)?;
        return Ok(Some(CommandIntent::Speed(speed)));
    }

    if let Some(value) = &req.direcao {
        let dir = value
            .as_str()
            .and_then(Direction::from_wire)
            .ok_or(ValidationError::InvalidDirection)?;
        return Ok(Some(CommandIntent::Direction(dir)));
    }

    if let Some(value) = &req.emergencia {
        let truthy = matches!(value.as_str(), Some("true")) || value.as_bool() == Some(true);
        return Ok(truthy.then_some(CommandIntent::Emergency));
    }

    if let Some(value) = &req.aceleracao {
        let mode = value
            .as_str()
            .and_then(AccelMode::from_wire)
            .ok_or(ValidationError::InvalidAcceleration)?;
        return Ok(Some(CommandIntent::Acceleration(mode)));
    }

    Err(ValidationError::UnknownCommand)
}

/// Accepts a JSON integer or a numeric string, bounded to `[0, 150]`.
fn parse_speed(value: &Value) -> Option<u16> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    (n <= MAX_SPEED_KMH as u64).then_some(n as u16)
}

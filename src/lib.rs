//! # trem-dash
//!
//! Backend for a simulated train control dashboard. An operator powers the
//! train on and off, sets target speed and direction, picks an acceleration
//! profile, and can trigger an emergency stop; every accepted command is
//! relayed to an MQTT broker and reflected in derived telemetry (operation
//! time, distance, max/avg speed) plus an activity log.
//!
//! ## Architecture
//!
//! - `command` - Command intents and the pure validator
//! - `train` - The authoritative train state machine (power, direction,
//!   speed ramping, emergency lockout)
//! - `telemetry` - Derived statistics over state transitions
//! - `activity` - Bounded in-memory activity log
//! - `broker` - MQTT adapter with logical topic mapping
//! - `services` - Axum HTTP API, shared state, and the tick runner
//!
//! Commands flow through the validator, then the state machine applies a
//! legal transition (or returns a typed rejection), and only then is the
//! intent published to the broker. A failed publish after a committed
//! transition is reported as a warning, never rolled back; the state machine
//! has no compensating undo for a control that was already accepted.
//!
//! ## Example
//!
//! ```rust
//! use trem_dash::{AccelMode, TrainMachine};
//!
//! let mut train = TrainMachine::new();
//! train.set_power(true, 0).unwrap();
//! train.set_accel_mode(AccelMode::Normal).unwrap();
//! train.set_target_speed(100).unwrap();
//!
//! // Ramp ticks move current speed toward the target.
//! let report = train.advance(500);
//! assert!(report.speed_changed);
//! assert_eq!(train.state().current_speed, 5);
//! ```

#![warn(missing_docs)]

/// Bounded in-memory activity/audit log.
pub mod activity;
/// MQTT broker adapter with logical topic mapping and lazy connect.
pub mod broker;
/// Command intents and the pure command validator.
pub mod command;
/// Runtime configuration for the train, web server, and broker.
pub mod config;
/// Telemetry aggregation (operation time, distance, max/avg speed).
pub mod telemetry;
/// The train state machine: power, direction, ramping, emergency stop.
pub mod train;

/// HTTP API, shared state, and the periodic tick runner.
pub mod services;

// Re-exports for convenience
pub use activity::{ActivityLevel, ActivityLog};
pub use broker::{BrokerClient, BrokerError, Topic};
pub use command::{validate, CommandIntent, CommandRequest, ValidationError};
pub use config::{BrokerConfig, Config, TrainConfig, WebConfig};
pub use telemetry::{TelemetryAggregator, TelemetrySnapshot};
pub use train::{AccelMode, Direction, TickReport, TrainMachine, TrainState, TransitionError};

pub use services::shared::SharedTrainState;

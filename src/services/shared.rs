//! Shared state for the HTTP handlers and the tick runner.
//!
//! [`SharedTrainState`] owns the [`TrainMachine`] and the
//! [`TelemetryAggregator`] behind a single mutex so that every transition and
//! its telemetry update commit atomically. Handlers apply a validated intent
//! with [`SharedTrainState::apply_intent`], which returns an
//! [`AppliedCommand`] describing what committed, including the broker
//! publication to perform. The caller performs that publish *after* the lock
//! is released; a failed publish never rolls a transition back.
//!
//! Time comes from one `Instant` captured at construction, so all `now_ms`
//! values share a monotonic base.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::json;

use crate::activity::ActivityLog;
use crate::broker::{BrokerClient, Topic};
use crate::command::CommandIntent;
use crate::telemetry::{TelemetryAggregator, TelemetrySnapshot};
use crate::train::{
    DirectionOutcome, TrainMachine, TrainState, TransitionError,
};

/// A publish the caller should perform once the state lock is released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publication {
    /// Logical destination topic.
    pub topic: Topic,
    /// Payload bytes (textual for this protocol).
    pub payload: String,
    /// QoS override; `None` uses the configured default. Emergency intents
    /// set this to 2.
    pub qos: Option<u8>,
    /// Whether the message should be retained by the broker.
    pub retain: bool,
}

/// What a committed command did: the message for the API response, the
/// publication to relay, and the state after the transition.
#[derive(Clone, Debug)]
pub struct AppliedCommand {
    /// The intent that was applied.
    pub intent: CommandIntent,
    /// Operator-facing description of the outcome.
    pub message: String,
    /// Broker relay to perform outside the lock, if any.
    pub publication: Option<Publication>,
    /// State snapshot taken right after the transition committed.
    pub state: TrainState,
    /// Whether this was an emergency stop (logged at critical severity).
    pub emergency: bool,
}

struct Inner {
    train: TrainMachine,
    telemetry: TelemetryAggregator,
}

/// Thread-safe owner of the train machine and its telemetry.
///
/// Cheap to share via `Arc`; the web handlers and the runner both hold one.
pub struct SharedTrainState {
    inner: Mutex<Inner>,
    started: Instant,
    activity: Arc<ActivityLog>,
    broker: Arc<BrokerClient>,
}

impl SharedTrainState {
    /// Wrap a machine together with its collaborators.
    pub fn new(train: TrainMachine, broker: Arc<BrokerClient>, activity: Arc<ActivityLog>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                train,
                telemetry: TelemetryAggregator::new(),
            }),
            started: Instant::now(),
            activity,
            broker,
        }
    }

    /// Milliseconds since this state was created. Monotonic.
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// The shared activity log.
    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// The shared broker adapter.
    pub fn broker(&self) -> &BrokerClient {
        &self.broker
    }

    /// Snapshot the train state.
    pub fn state(&self) -> TrainState {
        self.inner.lock().unwrap().train.state()
    }

    /// Snapshot the derived telemetry.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.inner.lock().unwrap().telemetry.snapshot()
    }

    /// Run a closure with exclusive access to the machine and telemetry.
    /// Keep the closure short; publishes belong outside the lock.
    pub fn with_train<R>(&self, f: impl FnOnce(&mut TrainMachine, &mut TelemetryAggregator) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        let Inner { train, telemetry } = &mut *inner;
        f(train, telemetry)
    }

    /// Apply a validated intent to the machine.
    ///
    /// All-or-nothing: a [`TransitionError`] means nothing changed, neither
    /// in the machine nor in telemetry. On success the returned
    /// [`AppliedCommand`] carries the publication the caller must relay.
    pub fn apply_intent(&self, intent: CommandIntent) -> Result<AppliedCommand, TransitionError> {
        let now_ms = self.now_ms();
        let mut inner = self.inner.lock().unwrap();
        let Inner { train, telemetry } = &mut *inner;

        let (message, publication, emergency) = match intent {
            CommandIntent::Power(true) => {
                train.set_power(true, now_ms)?;
                telemetry.on_power_on();
                (
                    "train powered on".to_string(),
                    Some(Publication {
                        topic: Topic::Command,
                        payload: "on".to_string(),
                        qos: None,
                        retain: false,
                    }),
                    false,
                )
            }
            CommandIntent::Power(false) => {
                train.set_power(false, now_ms)?;
                (
                    "train powered off".to_string(),
                    Some(Publication {
                        topic: Topic::Command,
                        payload: "off".to_string(),
                        qos: None,
                        retain: false,
                    }),
                    false,
                )
            }
            CommandIntent::Speed(speed) => {
                train.set_target_speed(speed)?;
                telemetry.on_speed_accepted(speed);
                (
                    format!("target speed set to {speed} km/h"),
                    Some(Publication {
                        topic: Topic::Speed,
                        payload: speed.to_string(),
                        qos: None,
                        retain: false,
                    }),
                    false,
                )
            }
            CommandIntent::Direction(dir) => {
                let outcome = train.set_direction(dir)?;
                let message = match outcome {
                    DirectionOutcome::Applied => {
                        format!("direction set to {}", dir.wire_name())
                    }
                    DirectionOutcome::Deferred => format!(
                        "slowing down, direction will change to {} once stopped",
                        dir.wire_name()
                    ),
                    DirectionOutcome::Unchanged => {
                        format!("direction already {}", dir.wire_name())
                    }
                };
                // The intent is relayed even when deferred; the runner
                // reports the actual flip via the status topic later.
                let publication = (outcome != DirectionOutcome::Unchanged).then(|| Publication {
                    topic: Topic::Direction,
                    payload: dir.wire_name().to_string(),
                    qos: None,
                    retain: false,
                });
                (message, publication, false)
            }
            CommandIntent::Acceleration(mode) => {
                train.set_accel_mode(mode)?;
                (
                    format!("acceleration mode set to {}", mode.wire_name()),
                    None,
                    false,
                )
            }
            CommandIntent::Emergency => {
                train.trigger_emergency(now_ms);
                (
                    "emergency stop triggered".to_string(),
                    Some(Publication {
                        topic: Topic::Emergency,
                        payload: "true".to_string(),
                        qos: Some(2),
                        retain: true,
                    }),
                    true,
                )
            }
        };

        Ok(AppliedCommand {
            intent,
            message,
            publication,
            state: train.state(),
            emergency,
        })
    }

    /// Serialize the current state for the status topic.
    pub fn status_payload(&self) -> String {
        let state = self.state();
        json!({
            "power": state.power,
            "direction": state.direction,
            "current_speed": state.current_speed,
            "target_speed": state.target_speed,
            "emergency_active": state.emergency_active,
        })
        .to_string()
    }
}

//! Periodic tick runner.
//!
//! Drives [`TrainMachine::advance`] on a fixed cadence (100 ms by default,
//! the pending-direction poll interval; the machine applies the slower 500 ms
//! ramp internally) and feeds elapsed time into the telemetry aggregator.
//! Committed effects from each tick are published and logged after the state
//! lock is released.
//!
//! [`TrainMachine::advance`]: crate::train::TrainMachine::advance

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::activity::ActivityLevel;
use crate::broker::Topic;
use crate::train::TickReport;

use super::shared::SharedTrainState;

/// Spawn the runner on the current tokio runtime.
pub fn spawn(state: Arc<SharedTrainState>, tick_interval: Duration) -> JoinHandle<()> {
    tokio::spawn(run(state, tick_interval))
}

/// Tick forever. Each iteration advances the machine, updates telemetry,
/// then relays whatever the tick committed.
pub async fn run(state: Arc<SharedTrainState>, tick_interval: Duration) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let now_ms = state.now_ms();
        let (report, snapshot) = state.with_train(|train, telemetry| {
            let report = train.advance(now_ms);
            let snapshot = train.state();
            telemetry.on_tick(snapshot.power, snapshot.current_speed, report.elapsed_ms);
            (report, snapshot)
        });

        relay_tick_effects(&state, &report).await;

        if report.speed_changed {
            tracing::debug!(
                speed = snapshot.current_speed,
                target = snapshot.target_speed,
                "ramp step"
            );
        }
    }
}

/// Publish and log what a tick committed. Runs without the state lock.
async fn relay_tick_effects(state: &Arc<SharedTrainState>, report: &TickReport) {
    if let Some(direction) = report.direction_applied {
        state.activity().record(
            "direction",
            format!("direction changed to {}", direction.wire_name()),
            None,
            ActivityLevel::Info,
        );
        if let Err(error) = state
            .broker()
            .publish(Topic::Status, state.status_payload(), None, false)
            .await
        {
            tracing::warn!(%error, "status publish failed after direction change");
        }
    }

    if report.emergency_completed {
        state.activity().record(
            "emergency",
            "emergency cooldown expired, train powered off",
            None,
            ActivityLevel::Critical,
        );
        if let Err(error) = state
            .broker()
            .publish(Topic::Status, state.status_payload(), None, false)
            .await
        {
            tracing::warn!(%error, "status publish failed after emergency shutdown");
        }
    }

    if report.speed_changed {
        let stats = serde_json::to_string(&state.telemetry()).unwrap_or_default();
        if let Err(error) = state.broker().publish(Topic::Stats, stats, None, false).await {
            tracing::debug!(%error, "stats publish failed");
        }
    }
}

//! Derived telemetry: operation time, distance, max and average speed.
//!
//! The aggregator never owns train state; it observes ticks and accepted
//! speed commands and maintains the derived statistics the dashboard polls.
//!
//! Distance accrues only while the train is powered, integrating
//! `speed * elapsed / 3600` per tick. Max speed is a monotonic watermark,
//! reset only when the process restarts. Average speed uses the recurrence
//! `avg = (avg + new_speed) / 2`, applied once per accepted speed command:
//! not a time-weighted mean, but kept for behavioral compatibility with the
//! wire protocol's consumers.

use serde::Serialize;

/// Point-in-time view of the derived statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Seconds since power-on; frozen at its last value when powered off.
    pub operation_time: u64,
    /// Accumulated distance in km.
    pub distance: f64,
    /// Highest speed seen since startup, in km/h.
    pub max_speed: u16,
    /// Blended average speed in km/h.
    pub avg_speed: f64,
}

/// Accumulates telemetry from state transitions over time.
#[derive(Clone, Debug, Default)]
pub struct TelemetryAggregator {
    operation_time_secs: f64,
    distance_km: f64,
    max_speed_kmh: u16,
    avg_speed_kmh: f64,
}

impl TelemetryAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the passage of time.
    ///
    /// Operation time and distance only accrue while `powered` is true;
    /// `speed_kmh` is the current (not target) speed over the elapsed span.
    pub fn on_tick(&mut self, powered: bool, speed_kmh: u16, elapsed_ms: u64) {
        if !powered {
            return;
        }
        let elapsed_s = elapsed_ms as f64 / 1000.0;
        self.operation_time_secs += elapsed_s;
        self.distance_km += speed_kmh as f64 * (elapsed_s / 3600.0);
    }

    /// Record an accepted (validated and applied) speed command.
    pub fn on_speed_accepted(&mut self, speed_kmh: u16) {
        if speed_kmh > self.max_speed_kmh {
            self.max_speed_kmh = speed_kmh;
        }
        self.avg_speed_kmh = (self.avg_speed_kmh + speed_kmh as f64) / 2.0;
    }

    /// Operation time measures the current run: it freezes while powered
    /// off and restarts from zero on the next power-on. Distance, max and
    /// average survive until process restart.
    pub fn on_power_on(&mut self) {
        self.operation_time_secs = 0.0;
    }

    /// Current snapshot of the derived statistics.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            operation_time: self.operation_time_secs as u64,
            distance: self.distance_km,
            max_speed: self.max_speed_kmh,
            avg_speed: self.avg_speed_kmh,
        }
    }
}

/// Round to two decimal places for API responses.
pub fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

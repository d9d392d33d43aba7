//! The authoritative train state machine.
//!
//! One [`TrainMachine`] instance owns the full control state of a single
//! train: power, direction, current vs. target speed, acceleration profile,
//! and the emergency lockout. All transitions are all-or-nothing: a rejected
//! command returns a [`TransitionError`] and mutates nothing.
//!
//! Time is passed in as `now_ms` rather than read from a clock, so tests can
//! drive a synthetic timeline:
//!
//! ```rust
//! use trem_dash::train::{AccelMode, TrainMachine};
//!
//! let mut train = TrainMachine::new();
//! train.set_power(true, 0).unwrap();
//! train.set_accel_mode(AccelMode::Normal).unwrap();
//! train.set_target_speed(20).unwrap();
//!
//! // Default ramp interval is 500ms, normal mode steps 5 km/h per tick.
//! train.advance(500);
//! assert_eq!(train.state().current_speed, 5);
//! train.advance(1000);
//! assert_eq!(train.state().current_speed, 10);
//! ```
//!
//! # Direction changes under motion
//!
//! Reversing a moving train is never immediate. The machine drives the
//! target speed to zero and arms a pending direction; [`TrainMachine::advance`]
//! applies the new direction once the current speed has dropped to 1 km/h or
//! below. A repeated direction request replaces the pending one, and an
//! emergency stop cancels it outright.
//!
//! # Emergency stop
//!
//! [`TrainMachine::trigger_emergency`] zeroes both speeds immediately and
//! locks out every manual control. After the configured cooldown (2 s by
//! default) the train powers itself off and the lockout clears. This is a
//! full shutdown, not a resumable pause.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TrainConfig;

/// Highest commandable speed in km/h.
pub const MAX_SPEED_KMH: u16 = 150;

/// Direction of travel. Wire names follow the broker protocol
/// (`frente` = forward, `re` = reverse).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Forward travel.
    #[serde(rename = "frente")]
    Forward,
    /// Reverse travel.
    #[serde(rename = "re")]
    Reverse,
}

impl Direction {
    /// The wire name used on broker topics and in API payloads.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Forward => "frente",
            Self::Reverse => "re",
        }
    }

    /// Parse a wire name.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "frente" => Some(Self::Forward),
            "re" => Some(Self::Reverse),
            _ => None,
        }
    }
}

/// Acceleration profile, controlling how much the speed moves per ramp tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccelMode {
    /// 2 km/h per tick.
    Slow,
    /// 5 km/h per tick.
    Normal,
    /// 10 km/h per tick.
    Fast,
}

impl AccelMode {
    /// Speed delta applied per ramp tick, in km/h.
    pub fn delta(self) -> u16 {
        match self {
            Self::Slow => 2,
            Self::Normal => 5,
            Self::Fast => 10,
        }
    }

    /// Parse a wire name (`slow` / `normal` / `fast`).
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "slow" => Some(Self::Slow),
            "normal" => Some(Self::Normal),
            "fast" => Some(Self::Fast),
            _ => None,
        }
    }

    /// The wire name used on broker topics and in API payloads.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Normal => "normal",
            Self::Fast => "fast",
        }
    }
}

/// Why a transition was rejected. Each variant maps to a precise operator
/// message; rejections never partially mutate state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// `set_power(true)` while already powered on.
    #[error("train is already powered on")]
    AlreadyPoweredOn,
    /// A speed or direction command while powered off.
    #[error("train is powered off")]
    PowerOff,
    /// Any manual control while the emergency sequence is running.
    #[error("emergency stop active, controls are locked out")]
    EmergencyLockout,
    /// Target speed outside `[0, 150]`. The validator normally catches this
    /// first; the machine guards its own invariant regardless.
    #[error("speed {0} is outside 0..={MAX_SPEED_KMH}")]
    SpeedOutOfRange(u16),
}

/// Outcome of a direction request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectionOutcome {
    /// The train was stationary; the direction changed immediately.
    Applied,
    /// The train is moving; target speed was driven to zero and the change
    /// will apply once current speed reaches 1 km/h or below.
    Deferred,
    /// Requested direction matches the current one; nothing to do.
    Unchanged,
}

/// Read-only snapshot of the machine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TrainState {
    /// Whether the train is powered on.
    pub power: bool,
    /// Current direction of travel.
    pub direction: Direction,
    /// Current speed in km/h.
    pub current_speed: u16,
    /// Target speed in km/h; the ramp tick moves current toward this.
    pub target_speed: u16,
    /// Active acceleration profile.
    pub accel_mode: AccelMode,
    /// Whether the emergency lockout is active.
    pub emergency_active: bool,
    /// Direction waiting to be applied once the train has slowed.
    pub pending_direction: Option<Direction>,
    /// Timestamp (ms on the shared time base) when power was turned on.
    pub started_at_ms: Option<u64>,
}

/// What a call to [`TrainMachine::advance`] actually did. The caller uses
/// this to publish and log committed effects after releasing the state lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Milliseconds since the previous `advance` call.
    pub elapsed_ms: u64,
    /// A ramp step moved the current speed.
    pub speed_changed: bool,
    /// A pending direction change was applied this tick.
    pub direction_applied: Option<Direction>,
    /// The emergency cooldown expired and the train shut down.
    pub emergency_completed: bool,
}

/// The train state machine. See the module docs for transition semantics.
#[derive(Debug)]
pub struct TrainMachine {
    power: bool,
    direction: Direction,
    current_speed: u16,
    target_speed: u16,
    accel_mode: AccelMode,
    pending_direction: Option<Direction>,
    emergency_deadline_ms: Option<u64>,
    started_at_ms: Option<u64>,
    last_ramp_ms: u64,
    last_advance_ms: u64,
    config: TrainConfig,
}

impl Default for TrainMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainMachine {
    /// Create a machine with default timings (500ms ramp, 2s cooldown).
    pub fn new() -> Self {
        Self::with_config(TrainConfig::default())
    }

    /// Create a machine with custom timings.
    pub fn with_config(config: TrainConfig) -> Self {
        Self {
            power: false,
            direction: Direction::Forward,
            current_speed: 0,
            target_speed: 0,
            accel_mode: AccelMode::Slow,
            pending_direction: None,
            emergency_deadline_ms: None,
            started_at_ms: None,
            last_ramp_ms: 0,
            last_advance_ms: 0,
            config,
        }
    }

    /// Snapshot the current state.
    pub fn state(&self) -> TrainState {
        TrainState {
            power: self.power,
            direction: self.direction,
            current_speed: self.current_speed,
            target_speed: self.target_speed,
            accel_mode: self.accel_mode,
            emergency_active: self.emergency_deadline_ms.is_some(),
            pending_direction: self.pending_direction,
            started_at_ms: self.started_at_ms,
        }
    }

    /// Whether the emergency lockout is currently active.
    pub fn emergency_active(&self) -> bool {
        self.emergency_deadline_ms.is_some()
    }

    /// Turn power on or off.
    ///
    /// Powering on is only legal from the off state and records the start
    /// timestamp. Powering off is idempotent and always zeroes both speeds,
    /// clears the start timestamp, and drops any pending direction change.
    pub fn set_power(&mut self, on: bool, now_ms: u64) -> Result<(), TransitionError> {
        if self.emergency_active() {
            return Err(TransitionError::EmergencyLockout);
        }
        if on {
            if self.power {
                return Err(TransitionError::AlreadyPoweredOn);
            }
            self.power = true;
            self.started_at_ms = Some(now_ms);
        } else {
            self.power = false;
            self.current_speed = 0;
            self.target_speed = 0;
            self.pending_direction = None;
            self.started_at_ms = None;
        }
        Ok(())
    }

    /// Set the target speed. Current speed only moves via ramp ticks.
    pub fn set_target_speed(&mut self, speed: u16) -> Result<(), TransitionError> {
        if self.emergency_active() {
            return Err(TransitionError::EmergencyLockout);
        }
        if !self.power {
            return Err(TransitionError::PowerOff);
        }
        if speed > MAX_SPEED_KMH {
            return Err(TransitionError::SpeedOutOfRange(speed));
        }
        self.target_speed = speed;
        Ok(())
    }

    /// Set the acceleration profile. Takes effect on the next ramp tick.
    pub fn set_accel_mode(&mut self, mode: AccelMode) -> Result<(), TransitionError> {
        if self.emergency_active() {
            return Err(TransitionError::EmergencyLockout);
        }
        self.accel_mode = mode;
        Ok(())
    }

    /// Request a direction change.
    ///
    /// Stationary trains reverse immediately. A moving train instead has its
    /// target speed driven to zero and the direction armed as pending;
    /// [`advance`](Self::advance) applies it once current speed is <= 1 km/h.
    /// A second request while one is pending replaces the pending direction.
    pub fn set_direction(&mut self, dir: Direction) -> Result<DirectionOutcome, TransitionError> {
        if self.emergency_active() {
            return Err(TransitionError::EmergencyLockout);
        }
        if !self.power {
            return Err(TransitionError::PowerOff);
        }
        if dir == self.direction && self.pending_direction.is_none() {
            return Ok(DirectionOutcome::Unchanged);
        }
        if self.current_speed == 0 {
            self.direction = dir;
            self.pending_direction = None;
            Ok(DirectionOutcome::Applied)
        } else {
            self.target_speed = 0;
            self.pending_direction = Some(dir);
            Ok(DirectionOutcome::Deferred)
        }
    }

    /// Trigger the emergency stop. Legal from any state and never fails.
    ///
    /// Both speeds drop to zero immediately, any pending direction change is
    /// cancelled, and every manual control is locked out until the cooldown
    /// expires, at which point [`advance`](Self::advance) performs the full
    /// shutdown.
    pub fn trigger_emergency(&mut self, now_ms: u64) {
        self.current_speed = 0;
        self.target_speed = 0;
        self.pending_direction = None;
        self.emergency_deadline_ms = Some(now_ms + self.config.emergency_cooldown_ms);
    }

    /// Advance the machine to `now_ms`.
    ///
    /// Handles, in order: emergency cooldown expiry (forced shutdown),
    /// pending direction application, and the speed ramp (which only steps
    /// when a full ramp interval has elapsed since the last step).
    pub fn advance(&mut self, now_ms: u64) -> TickReport {
        let mut report = TickReport {
            elapsed_ms: now_ms.saturating_sub(self.last_advance_ms),
            ..TickReport::default()
        };
        self.last_advance_ms = now_ms;

        if let Some(deadline) = self.emergency_deadline_ms {
            if now_ms >= deadline {
                self.emergency_deadline_ms = None;
                self.power = false;
                self.current_speed = 0;
                self.target_speed = 0;
                self.started_at_ms = None;
                report.emergency_completed = true;
            }
            // Nothing else moves while the lockout holds.
            return report;
        }

        if let Some(dir) = self.pending_direction {
            if self.current_speed <= 1 {
                self.direction = dir;
                self.pending_direction = None;
                report.direction_applied = Some(dir);
            }
        }

        if self.power
            && self.current_speed != self.target_speed
            && now_ms.saturating_sub(self.last_ramp_ms) >= self.config.ramp_interval_ms
        {
            self.last_ramp_ms = now_ms;
            let delta = self.accel_mode.delta();
            self.current_speed = if self.current_speed < self.target_speed {
                (self.current_speed + delta).min(self.target_speed)
            } else {
                self.current_speed.saturating_sub(delta).max(self.target_speed)
            };
            report.speed_changed = true;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn powered() -> TrainMachine {
        let mut train = TrainMachine::new();
        train.set_power(true, 0).unwrap();
        train
    }

    #[test]
    fn starts_off_and_stationary() {
        let train = TrainMachine::new();
        let state = train.state();
        assert!(!state.power);
        assert_eq!(state.current_speed, 0);
        assert_eq!(state.target_speed, 0);
        assert_eq!(state.direction, Direction::Forward);
        assert!(state.started_at_ms.is_none());
    }

    #[test]
    fn power_on_records_start_time() {
        let mut train = TrainMachine::new();
        train.set_power(true, 1234).unwrap();
        assert_eq!(train.state().started_at_ms, Some(1234));
    }

    #[test]
    fn power_on_twice_rejected_without_mutation() {
        let mut train = powered();
        let before = train.state();
        assert_eq!(
            train.set_power(true, 99),
            Err(TransitionError::AlreadyPoweredOn)
        );
        assert_eq!(train.state(), before);
    }

    #[test]
    fn power_off_is_idempotent() {
        let mut train = powered();
        train.set_target_speed(50).unwrap();
        train.advance(500);

        train.set_power(false, 1000).unwrap();
        let after_first = train.state();
        assert!(!after_first.power);
        assert_eq!(after_first.current_speed, 0);
        assert_eq!(after_first.target_speed, 0);
        assert!(after_first.started_at_ms.is_none());

        train.set_power(false, 2000).unwrap();
        assert_eq!(train.state(), after_first);
    }

    #[test]
    fn speed_requires_power() {
        let mut train = TrainMachine::new();
        assert_eq!(train.set_target_speed(30), Err(TransitionError::PowerOff));
        assert_eq!(train.state().target_speed, 0);
    }

    #[test]
    fn speed_out_of_range_rejected() {
        let mut train = powered();
        assert_eq!(
            train.set_target_speed(151),
            Err(TransitionError::SpeedOutOfRange(151))
        );
        assert_eq!(train.state().target_speed, 0);
    }

    #[test]
    fn ramp_normal_mode_reaches_target() {
        let mut train = powered();
        train.set_accel_mode(AccelMode::Normal).unwrap();
        train.set_target_speed(100).unwrap();

        let report = train.advance(500);
        assert!(report.speed_changed);
        assert_eq!(train.state().current_speed, 5);

        for tick in 2..=20 {
            train.advance(tick * 500);
        }
        assert_eq!(train.state().current_speed, 100);

        // Further ticks are no-ops once at target
        let report = train.advance(11_000);
        assert!(!report.speed_changed);
        assert_eq!(train.state().current_speed, 100);
    }

    #[test]
    fn ramp_never_overshoots() {
        let mut train = powered();
        train.set_accel_mode(AccelMode::Fast).unwrap();
        train.set_target_speed(7).unwrap();
        train.advance(500);
        // Fast delta is 10 but target is 7
        assert_eq!(train.state().current_speed, 7);

        train.set_target_speed(3).unwrap();
        train.advance(1000);
        assert_eq!(train.state().current_speed, 3);
    }

    #[test]
    fn ramp_respects_interval() {
        let mut train = powered();
        train.set_target_speed(100).unwrap();
        train.advance(100);
        train.advance(200);
        train.advance(499);
        // Not a full ramp interval yet
        assert_eq!(train.state().current_speed, 0);
        train.advance(500);
        assert_eq!(train.state().current_speed, 2); // slow mode default
    }

    #[test]
    fn ramp_decelerates_toward_lower_target() {
        let mut train = powered();
        train.set_accel_mode(AccelMode::Fast).unwrap();
        train.set_target_speed(40).unwrap();
        for tick in 1..=4 {
            train.advance(tick * 500);
        }
        assert_eq!(train.state().current_speed, 40);

        train.set_target_speed(15).unwrap();
        train.advance(2500);
        assert_eq!(train.state().current_speed, 30);
        train.advance(3000);
        assert_eq!(train.state().current_speed, 20);
        train.advance(3500);
        assert_eq!(train.state().current_speed, 15);
    }

    #[test]
    fn direction_change_while_stationary_is_immediate() {
        let mut train = powered();
        let outcome = train.set_direction(Direction::Reverse).unwrap();
        assert_eq!(outcome, DirectionOutcome::Applied);
        assert_eq!(train.state().direction, Direction::Reverse);
        assert!(train.state().pending_direction.is_none());
    }

    #[test]
    fn direction_change_to_same_direction_is_noop() {
        let mut train = powered();
        let outcome = train.set_direction(Direction::Forward).unwrap();
        assert_eq!(outcome, DirectionOutcome::Unchanged);
    }

    #[test]
    fn direction_change_under_motion_defers_until_slow() {
        let mut train = powered();
        train.set_accel_mode(AccelMode::Fast).unwrap();
        train.set_target_speed(80).unwrap();
        for tick in 1..=8 {
            train.advance(tick * 500);
        }
        assert_eq!(train.state().current_speed, 80);

        let outcome = train.set_direction(Direction::Reverse).unwrap();
        assert_eq!(outcome, DirectionOutcome::Deferred);
        assert_eq!(train.state().target_speed, 0);
        assert_eq!(train.state().pending_direction, Some(Direction::Reverse));
        // Direction unchanged while still moving
        assert_eq!(train.state().direction, Direction::Forward);

        let mut direction_applied_at = None;
        for tick in 9..=20 {
            let report = train.advance(tick * 500);
            let state = train.state();
            if state.direction == Direction::Reverse {
                direction_applied_at = Some(state.current_speed);
                assert_eq!(report.direction_applied, Some(Direction::Reverse));
                break;
            }
            // Invariant: direction never flips above 1 km/h
            assert!(state.current_speed > 1 || state.pending_direction.is_some());
        }
        let speed_at_flip = direction_applied_at.expect("direction change never applied");
        assert!(speed_at_flip <= 1);
    }

    #[test]
    fn repeated_direction_request_replaces_pending() {
        let mut train = powered();
        train.set_target_speed(10).unwrap();
        for tick in 1..=5 {
            train.advance(tick * 500);
        }
        assert_eq!(train.state().current_speed, 10);

        train.set_direction(Direction::Reverse).unwrap();
        assert_eq!(train.state().pending_direction, Some(Direction::Reverse));

        // Operator changes their mind back to forward before the train stops
        let outcome = train.set_direction(Direction::Forward).unwrap();
        assert_eq!(outcome, DirectionOutcome::Deferred);
        assert_eq!(train.state().pending_direction, Some(Direction::Forward));
    }

    #[test]
    fn emergency_zeroes_speeds_immediately() {
        let mut train = powered();
        train.set_accel_mode(AccelMode::Fast).unwrap();
        train.set_target_speed(120).unwrap();
        for tick in 1..=12 {
            train.advance(tick * 500);
        }
        assert_eq!(train.state().current_speed, 120);

        train.trigger_emergency(6001);
        let state = train.state();
        assert_eq!(state.current_speed, 0);
        assert_eq!(state.target_speed, 0);
        assert!(state.emergency_active);
        assert!(state.power); // still on until the cooldown expires
    }

    #[test]
    fn emergency_locks_out_all_controls() {
        let mut train = powered();
        train.trigger_emergency(100);

        assert_eq!(
            train.set_target_speed(10),
            Err(TransitionError::EmergencyLockout)
        );
        assert_eq!(
            train.set_direction(Direction::Reverse),
            Err(TransitionError::EmergencyLockout)
        );
        assert_eq!(
            train.set_power(false, 200),
            Err(TransitionError::EmergencyLockout)
        );
        assert_eq!(
            train.set_accel_mode(AccelMode::Fast),
            Err(TransitionError::EmergencyLockout)
        );
    }

    #[test]
    fn emergency_cooldown_shuts_down() {
        let mut train = powered();
        train.trigger_emergency(1000);

        // Before the 2s cooldown: still locked out, still powered
        let report = train.advance(2500);
        assert!(!report.emergency_completed);
        assert!(train.state().power);
        assert!(train.state().emergency_active);

        // At the deadline: full shutdown
        let report = train.advance(3000);
        assert!(report.emergency_completed);
        let state = train.state();
        assert!(!state.power);
        assert!(!state.emergency_active);
        assert_eq!(state.current_speed, 0);
        assert!(state.started_at_ms.is_none());
    }

    #[test]
    fn emergency_cancels_pending_direction() {
        let mut train = powered();
        train.set_target_speed(20).unwrap();
        for tick in 1..=10 {
            train.advance(tick * 500);
        }
        train.set_direction(Direction::Reverse).unwrap();
        assert!(train.state().pending_direction.is_some());

        train.trigger_emergency(6000);
        assert!(train.state().pending_direction.is_none());

        // After the shutdown, direction never flipped
        train.advance(8000);
        assert_eq!(train.state().direction, Direction::Forward);
    }

    #[test]
    fn controls_work_again_after_emergency_shutdown() {
        let mut train = powered();
        train.trigger_emergency(0);
        train.advance(2000);

        train.set_power(true, 3000).unwrap();
        train.set_target_speed(30).unwrap();
        assert_eq!(train.state().target_speed, 30);
    }

    #[test]
    fn accel_mode_wire_roundtrip() {
        for mode in [AccelMode::Slow, AccelMode::Normal, AccelMode::Fast] {
            assert_eq!(AccelMode::from_wire(mode.wire_name()), Some(mode));
        }
        assert_eq!(AccelMode::from_wire("ludicrous"), None);
    }

    #[test]
    fn direction_wire_roundtrip() {
        assert_eq!(Direction::from_wire("frente"), Some(Direction::Forward));
        assert_eq!(Direction::from_wire("re"), Some(Direction::Reverse));
        assert_eq!(Direction::from_wire("reverso"), None);
    }
}

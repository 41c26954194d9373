//! Phase timer: how far a deposit is through its current state-machine phase.
//!
//! A phase starts at `updated_at` and, if the state can time out, ends at
//! `current_state_times_out_at`. [`phase_timing`] is a pure function of the
//! deposit and "now". [`PhaseTicker`] re-evaluates it on a fixed-delay tick for
//! a displayed deposit and publishes the result on a `watch` channel until the
//! returned [`PhaseWatch`] is stopped or dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use tbtc_common::config::AppConfig;
use tbtc_common::error::PhaseTimerError;
use tbtc_common::types::Deposit;

/// Default refresh interval for a displayed phase timer.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(800);

/// Timing within a phase that has a deadline. All fields are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseTiming {
    pub elapsed_seconds: f64,
    /// Clamped at zero once the deadline has passed.
    pub remaining_seconds: f64,
    pub total_seconds: f64,
    /// Fraction of the phase elapsed, always within `[0, 1]`.
    pub percentage: f64,
}

impl PhaseTiming {
    pub fn is_expired(&self) -> bool {
        self.percentage >= 1.0
    }
}

/// Result of evaluating a phase at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseProgress {
    Timing(PhaseTiming),
    /// The current state never times out.
    NoExpiry,
    /// Zero-length phase; there is no meaningful percentage.
    Unavailable,
}

impl PhaseProgress {
    pub fn timing(&self) -> Option<&PhaseTiming> {
        match self {
            PhaseProgress::Timing(t) => Some(t),
            _ => None,
        }
    }
}

/// Evaluate the deposit's current phase at `now`.
pub fn phase_timing(deposit: &Deposit, now: DateTime<Utc>) -> Result<PhaseProgress, PhaseTimerError> {
    phase_timing_between(deposit.updated_at, deposit.current_state_times_out_at, now)
}

/// Evaluate a phase from `started_at` to an optional `times_out_at` at `now`.
///
/// A deadline before the start is broken upstream data and is reported as
/// [`PhaseTimerError::InvalidDuration`].
pub fn phase_timing_between(
    started_at: DateTime<Utc>,
    times_out_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<PhaseProgress, PhaseTimerError> {
    let Some(times_out_at) = times_out_at else {
        return Ok(PhaseProgress::NoExpiry);
    };

    let total_seconds = seconds_between(started_at, times_out_at);
    if total_seconds < 0.0 {
        return Err(PhaseTimerError::InvalidDuration(format!(
            "phase times out at {} before it started at {}",
            times_out_at, started_at
        )));
    }
    if total_seconds == 0.0 {
        return Ok(PhaseProgress::Unavailable);
    }

    let seconds_remaining = seconds_between(now, times_out_at);
    let percentage = (1.0 - seconds_remaining / total_seconds).clamp(0.0, 1.0);

    Ok(PhaseProgress::Timing(PhaseTiming {
        elapsed_seconds: percentage * total_seconds,
        remaining_seconds: seconds_remaining.clamp(0.0, total_seconds),
        total_seconds,
        percentage,
    }))
}

/// A deposit whose phase deadline has passed can be notified of the timeout.
pub fn is_notifiable(deposit: &Deposit, now: DateTime<Utc>) -> bool {
    deposit
        .current_state_times_out_at
        .is_some_and(|deadline| deadline < now)
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Wall-clock source for ticking timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Spawns self-refreshing phase timers.
#[derive(Clone)]
pub struct PhaseTicker {
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl PhaseTicker {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a custom tick interval. A zero interval is rejected.
    pub fn with_interval(mut self, interval: Duration) -> Result<Self, PhaseTimerError> {
        if interval.is_zero() {
            return Err(PhaseTimerError::InvalidDuration(
                "tick interval must be greater than zero".to_string(),
            ));
        }
        self.interval = interval;
        Ok(self)
    }

    /// Interval in milliseconds, as configured through `PHASE_TICK_INTERVAL_MS`.
    pub fn with_interval_ms(self, interval_ms: u64) -> Result<Self, PhaseTimerError> {
        self.with_interval(Duration::from_millis(interval_ms))
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, PhaseTimerError> {
        Self::new().with_interval_ms(config.phase_tick_interval_ms)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking for `deposit`. Must be called from within a Tokio runtime.
    ///
    /// The first value is computed immediately; subsequent values follow every
    /// interval. The task stops when the watch is stopped or dropped, when
    /// every receiver is gone, or when the phase turns out to be invalid.
    pub fn watch(&self, deposit: Deposit) -> Result<PhaseWatch, PhaseTimerError> {
        let initial = phase_timing(&deposit, self.clock.now())?;
        let (tx, rx) = watch::channel(initial);

        let clock = Arc::clone(&self.clock);
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately and the initial value is already published.
            ticks.tick().await;

            loop {
                ticks.tick().await;

                let progress = match phase_timing(&deposit, clock.now()) {
                    Ok(progress) => progress,
                    Err(e) => {
                        tracing::warn!(deposit_id = %deposit.id, error = %e, "Phase timer stopped");
                        break;
                    }
                };

                if tx.send(progress).is_err() {
                    tracing::debug!(deposit_id = %deposit.id, "No phase timer observers left");
                    break;
                }

                // Nothing left to refresh once the phase has no deadline or has fully elapsed.
                if !matches!(progress, PhaseProgress::Timing(t) if !t.is_expired()) {
                    break;
                }
            }
        });

        Ok(PhaseWatch { receiver: rx, task })
    }
}

impl Default for PhaseTicker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running phase timer. Dropping it cancels the timer.
pub struct PhaseWatch {
    receiver: watch::Receiver<PhaseProgress>,
    task: JoinHandle<()>,
}

impl PhaseWatch {
    /// Most recently published progress.
    pub fn current(&self) -> PhaseProgress {
        *self.receiver.borrow()
    }

    /// Wait for the next published value. Returns `None` once the timer has stopped.
    pub async fn changed(&mut self) -> Option<PhaseProgress> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }

    /// An extra receiver, e.g. for a second view of the same timer.
    pub fn subscribe(&self) -> watch::Receiver<PhaseProgress> {
        self.receiver.clone()
    }

    /// Cancel the recurring refresh.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PhaseWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn timing(progress: PhaseProgress) -> PhaseTiming {
        *progress.timing().expect("expected a timed phase")
    }

    #[test]
    fn test_halfway() {
        let p = timing(phase_timing_between(t(0), Some(t(3600)), t(1800)).unwrap());
        assert_eq!(p.percentage, 0.5);
        assert_eq!(p.total_seconds, 3600.0);
        assert_eq!(p.remaining_seconds, 1800.0);
        assert_eq!(p.elapsed_seconds, 1800.0);
    }

    #[test]
    fn test_start_is_zero() {
        let p = timing(phase_timing_between(t(0), Some(t(3600)), t(0)).unwrap());
        assert_eq!(p.percentage, 0.0);
        assert!(!p.is_expired());
    }

    #[test]
    fn test_deadline_and_after_clamp_to_one() {
        for now in [3600, 3601, 100_000] {
            let p = timing(phase_timing_between(t(0), Some(t(3600)), t(now)).unwrap());
            assert_eq!(p.percentage, 1.0);
            assert_eq!(p.remaining_seconds, 0.0);
            assert!(p.is_expired());
        }
    }

    #[test]
    fn test_before_start_clamps_to_zero() {
        let p = timing(phase_timing_between(t(0), Some(t(3600)), t(-500)).unwrap());
        assert_eq!(p.percentage, 0.0);
        assert_eq!(p.remaining_seconds, 3600.0);
    }

    #[test]
    fn test_percentage_bounded_everywhere() {
        for now in (-7200..=7200).step_by(97) {
            let p = timing(phase_timing_between(t(0), Some(t(3600)), t(now)).unwrap());
            assert!((0.0..=1.0).contains(&p.percentage), "now={now} -> {}", p.percentage);
        }
    }

    #[test]
    fn test_no_expiry() {
        assert_eq!(phase_timing_between(t(0), None, t(10)).unwrap(), PhaseProgress::NoExpiry);
    }

    #[test]
    fn test_zero_length_phase_is_unavailable() {
        assert_eq!(
            phase_timing_between(t(0), Some(t(0)), t(10)).unwrap(),
            PhaseProgress::Unavailable
        );
    }

    #[test]
    fn test_negative_phase_is_invalid() {
        let result = phase_timing_between(t(100), Some(t(0)), t(50));
        assert!(matches!(result, Err(PhaseTimerError::InvalidDuration(_))));
    }

    #[test]
    fn test_repeatable_for_same_now() {
        let a = phase_timing_between(t(0), Some(t(900)), t(321)).unwrap();
        let b = phase_timing_between(t(0), Some(t(900)), t(321)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            PhaseTicker::new().with_interval(Duration::ZERO),
            Err(PhaseTimerError::InvalidDuration(_))
        ));
        assert_eq!(PhaseTicker::new().interval(), Duration::from_millis(800));
        assert_eq!(
            PhaseTicker::new().with_interval_ms(250).unwrap().interval(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_interval_from_config() {
        let config = AppConfig {
            phase_tick_interval_ms: 1200,
            ..AppConfig::default()
        };
        assert_eq!(PhaseTicker::from_config(&config).unwrap().interval(), Duration::from_millis(1200));
        assert_eq!(
            PhaseTicker::from_config(&AppConfig::default()).unwrap().interval(),
            DEFAULT_TICK_INTERVAL
        );
    }

    #[test]
    fn test_progress_serializes_with_kind_tag() {
        let json = serde_json::to_value(PhaseProgress::NoExpiry).unwrap();
        assert_eq!(json["kind"], "no_expiry");
        let progress = phase_timing_between(t(0), Some(t(100)), t(25)).unwrap();
        let json = serde_json::to_value(progress).unwrap();
        assert_eq!(json["kind"], "timing");
        assert_eq!(json["percentage"], 0.25);
    }
}

//! Rotation timer and guard state
//!
//! Epoch rotation is time-driven: an hourly tick advances an elapsed-hour
//! counter, and crossing the configured rotation interval advances the
//! key sequence. The guard state machine prevents rapid oscillation: once
//! a forward rotation has happened while the timer runs, the next +1
//! advance is rejected until the guard time has elapsed.
//!
//! All temporal semantics are expressed in elapsed-hour counts, not
//! wall-clock deadlines: a late tick is still counted once it occurs,
//! never "caught up".

use std::time::Duration;

/// Minimum hours between consecutive forward rotations.
pub const DEFAULT_KEY_SWITCH_GUARD_TIME: u32 = 624;

/// Interval between rotation timer ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Guard window state for forward rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No rotation has happened since the timer started; a +1 advance is
    /// allowed.
    Unguarded,
    /// A rotation happened while the timer was running; further +1
    /// advances are rejected until the guard time elapses.
    Guarded,
}

/// Hourly rotation timer with drift-free re-arming.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RotationTimer<I> {
    fire_at: Option<I>,
    hours_since_rotation: u32,
    guard: GuardState,
    guard_time_hours: u32,
}

impl<I> RotationTimer<I>
where
    I: Copy + std::ops::Add<Duration, Output = I>,
{
    pub(crate) fn new() -> Self {
        Self {
            fire_at: None,
            hours_since_rotation: 0,
            guard: GuardState::Unguarded,
            guard_time_hours: DEFAULT_KEY_SWITCH_GUARD_TIME,
        }
    }

    /// Arms the timer and zeroes the elapsed-hours counter.
    pub(crate) fn start(&mut self, now: I) {
        self.hours_since_rotation = 0;
        self.fire_at = Some(now + TICK_INTERVAL);
    }

    pub(crate) fn stop(&mut self) {
        self.fire_at = None;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.fire_at.is_some()
    }

    pub(crate) fn fire_at(&self) -> Option<I> {
        self.fire_at
    }

    /// Counts one elapsed hour and re-arms relative to the previous fire
    /// time, so tick-handling latency never accumulates as drift.
    pub(crate) fn advance_hour(&mut self) {
        self.hours_since_rotation = self.hours_since_rotation.saturating_add(1);
        if let Some(at) = self.fire_at {
            self.fire_at = Some(at + TICK_INTERVAL);
        }
    }

    pub(crate) fn elapsed_hours(&self) -> u32 {
        self.hours_since_rotation
    }

    pub(crate) fn guard_state(&self) -> GuardState {
        self.guard
    }

    pub(crate) fn set_guarded(&mut self) {
        self.guard = GuardState::Guarded;
    }

    pub(crate) fn clear_guard(&mut self) {
        self.guard = GuardState::Unguarded;
    }

    pub(crate) fn guard_time_hours(&self) -> u32 {
        self.guard_time_hours
    }

    pub(crate) fn set_guard_time_hours(&mut self, hours: u32) {
        self.guard_time_hours = hours;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unguarded_and_stopped() {
        let timer: RotationTimer<std::time::Instant> = RotationTimer::new();
        assert!(!timer.is_running());
        assert_eq!(timer.guard_state(), GuardState::Unguarded);
        assert_eq!(timer.guard_time_hours(), DEFAULT_KEY_SWITCH_GUARD_TIME);
    }

    #[test]
    fn start_resets_elapsed_hours() {
        let mut timer: RotationTimer<Duration> = RotationTimer::new();
        timer.start(Duration::ZERO);
        timer.advance_hour();
        timer.advance_hour();
        assert_eq!(timer.elapsed_hours(), 2);

        timer.start(Duration::ZERO);
        assert_eq!(timer.elapsed_hours(), 0);
    }

    #[test]
    fn rearm_is_relative_to_previous_fire_time() {
        let mut timer: RotationTimer<Duration> = RotationTimer::new();
        timer.start(Duration::ZERO);
        assert_eq!(timer.fire_at(), Some(TICK_INTERVAL));

        // Even if the tick is handled late, the next deadline is one
        // interval after the previous deadline.
        timer.advance_hour();
        assert_eq!(timer.fire_at(), Some(TICK_INTERVAL * 2));
    }

    #[test]
    fn stop_disarms() {
        let mut timer: RotationTimer<Duration> = RotationTimer::new();
        timer.start(Duration::ZERO);
        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.fire_at(), None);
    }
}

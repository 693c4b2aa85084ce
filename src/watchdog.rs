//! Idle detection for an active session.
//!
//! The watchdog owns two timers in the shared [`TimerQueue`]: a one-shot idle
//! timeout and a 50ms warning poll. Activity resets both. When the timeout
//! fires the penalty trigger is handed out once and the watchdog goes quiet
//! until the next reset.

use crate::clock::Millis;
use crate::timers::{TimerHandle, TimerKind, TimerQueue, TimerTag};

pub const WARNING_POLL_MS: Millis = 50;

/// Opacity range a host maps warning intensity onto.
pub const MIN_WARNING_OPACITY: f64 = 0.05;
pub const MAX_WARNING_OPACITY: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Warning {
    /// outside the warning window
    Clear,
    /// inside the window; carries intensity in (0, 1]
    Approaching(f64),
    /// idle time is up, the timeout owns what happens next
    Expired,
}

impl Warning {
    pub fn intensity(&self) -> f64 {
        match self {
            Warning::Clear => 0.0,
            Warning::Approaching(intensity) => *intensity,
            Warning::Expired => 1.0,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Warning::Clear)
    }
}

/// Cubic ease-out over the final `threshold_ms` before the timeout.
/// Zero while `remaining_ms` is above the threshold.
pub fn warning_intensity(remaining_ms: i64, threshold_ms: Millis) -> f64 {
    if threshold_ms == 0 || remaining_ms > threshold_ms as i64 {
        return 0.0;
    }
    if remaining_ms <= 0 {
        return 1.0;
    }
    let progress = 1.0 - remaining_ms as f64 / threshold_ms as f64;
    1.0 - (1.0 - progress).powi(3)
}

pub fn warning_opacity(intensity: f64) -> f64 {
    MIN_WARNING_OPACITY + (MAX_WARNING_OPACITY - MIN_WARNING_OPACITY) * intensity.clamp(0.0, 1.0)
}

#[derive(Debug)]
pub struct IdleWatchdog {
    idle_timeout_ms: Millis,
    warning_threshold_ms: Millis,
    generation: u64,
    last_activity_ms: Millis,
    timeout: Option<TimerHandle>,
    poll: Option<TimerHandle>,
    expired: bool,
    warning: Warning,
}

impl IdleWatchdog {
    pub fn new(idle_timeout_ms: Millis, warning_threshold_ms: Millis, generation: u64) -> Self {
        Self {
            idle_timeout_ms,
            warning_threshold_ms,
            generation,
            last_activity_ms: 0,
            timeout: None,
            poll: None,
            expired: false,
            warning: Warning::Clear,
        }
    }

    pub fn last_activity_ms(&self) -> Millis {
        self.last_activity_ms
    }

    pub fn warning(&self) -> Warning {
        self.warning
    }

    pub fn is_armed(&self) -> bool {
        self.timeout.is_some()
    }

    /// Time left before the penalty; negative once overdue.
    pub fn remaining_ms(&self, now: Millis) -> i64 {
        let elapsed = now.saturating_sub(self.last_activity_ms);
        self.idle_timeout_ms as i64 - elapsed as i64
    }

    /// Records activity at `now` and reschedules both timers.
    pub fn reset(&mut self, now: Millis, timers: &mut TimerQueue) {
        self.last_activity_ms = self.last_activity_ms.max(now);
        self.expired = false;
        self.warning = Warning::Clear;

        if let Some(handle) = self.timeout.take() {
            timers.cancel(handle);
        }
        self.timeout = Some(timers.schedule_once(
            self.last_activity_ms,
            self.idle_timeout_ms,
            TimerTag::new(self.generation, TimerKind::IdleTimeout),
        ));

        if self.poll.is_none() && self.warning_threshold_ms > 0 {
            self.poll = Some(timers.schedule_repeating(
                now,
                WARNING_POLL_MS,
                TimerTag::new(self.generation, TimerKind::WarningPoll),
            ));
        }
    }

    /// Periodic warning computation. Stops its own poll once time is up.
    pub fn poll(&mut self, now: Millis, timers: &mut TimerQueue) -> Warning {
        let remaining = self.remaining_ms(now);
        self.warning = if remaining <= 0 {
            self.stop_poll(timers);
            Warning::Expired
        } else if remaining < self.warning_threshold_ms as i64 {
            Warning::Approaching(warning_intensity(remaining, self.warning_threshold_ms))
        } else {
            Warning::Clear
        };
        self.warning
    }

    pub fn owns_timeout(&self, handle: TimerHandle) -> bool {
        self.timeout == Some(handle)
    }

    /// Called when the idle timeout fired. Returns true the first time only.
    pub fn expire(&mut self, timers: &mut TimerQueue) -> bool {
        if self.expired {
            return false;
        }
        self.expired = true;
        self.timeout = None;
        self.warning = Warning::Expired;
        self.stop_poll(timers);
        true
    }

    /// Cancels both timers synchronously.
    pub fn disarm(&mut self, timers: &mut TimerQueue) {
        if let Some(handle) = self.timeout.take() {
            timers.cancel(handle);
        }
        self.stop_poll(timers);
        self.warning = Warning::Clear;
    }

    fn stop_poll(&mut self, timers: &mut TimerQueue) {
        if let Some(handle) = self.poll.take() {
            timers.cancel(handle);
        }
    }
}

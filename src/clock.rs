use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Milliseconds on a monotonic timeline. Only differences are meaningful.
pub type Millis = u64;

/// Source of the current time for sessions and timers.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Monotonic wall clock, measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock. Clones share the same timeline, so a test can keep one
/// handle while the session machine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: Millis) {
        // never run backwards
        self.now.set(self.now.get().max(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// What the host loop reacts to.
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Paste(String),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Waits up to `timeout` for the next event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread.
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let event = match event::read() {
                // release/repeat events would double every keystroke on some terminals
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                Ok(CtEvent::Paste(text)) => AppEvent::Paste(text),
                Ok(CtEvent::Resize(_, _)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "terminal event stream closed");
                    break;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Fixed-rate tick deadlines. Input never pushes a deadline back, so a
/// held key cannot starve the session timers.
#[derive(Debug)]
pub struct TickSchedule {
    interval: Duration,
    next: Cell<Instant>,
}

impl TickSchedule {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            interval,
            next: Cell::new(start + interval),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Zero once the next tick is due.
    fn until_due(&self, now: Instant) -> Duration {
        self.next.get().saturating_duration_since(now)
    }

    /// Consumes the due tick. Ticks missed entirely collapse into this one.
    fn take(&self, now: Instant) {
        let mut next = self.next.get() + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next.set(next);
    }
}

/// Channel-fed source for driving the host without a terminal.
pub struct ChannelEventSource {
    rx: Receiver<AppEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Interleaves terminal input with ticks on a fixed schedule.
pub struct EventPump<E: EventSource> {
    source: E,
    schedule: TickSchedule,
}

impl<E: EventSource> EventPump<E> {
    pub fn new(source: E, tick_interval: Duration) -> Self {
        Self {
            source,
            schedule: TickSchedule::new(tick_interval),
        }
    }

    /// Blocks until the next input event or the next due tick.
    pub fn next_event(&self) -> AppEvent {
        let wait = self.schedule.until_due(Instant::now());
        if !wait.is_zero() {
            match self.source.recv_timeout(wait) {
                Ok(ev) => return ev,
                Err(RecvTimeoutError::Timeout) => {}
                // nothing will arrive any more; keep ticking at the same rate
                Err(RecvTimeoutError::Disconnected) => std::thread::sleep(wait),
            }
        }
        self.schedule.take(Instant::now());
        AppEvent::Tick
    }
}

//! Writing session state machine.
//!
//! ```text
//! Idle -> Active -> (Completed | Penalized | aborted) -> Idle
//! ```
//!
//! Like a wall-clock timer engine, nothing here runs by itself: the host
//! calls [`SessionMachine::tick`] periodically and forwards edits and
//! document switches. Timers belong to a session generation; anything that
//! fires for an older generation is dropped.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::{Clock, Millis, SystemClock};
use crate::document::{DocumentAccessor, DocumentId};
use crate::error::SessionError;
use crate::notify::{Notifier, Severity};
use crate::penalty::{apply_penalty, PenaltyMode};
use crate::recorder::{SessionRecord, SessionRecorder};
use crate::stats::format_clock;
use crate::timers::{TimerHandle, TimerKind, TimerQueue, TimerTag};
use crate::watchdog::{IdleWatchdog, Warning};
use crate::words::word_count;

pub const GOAL_CHECK_INTERVAL_MS: Millis = 1000;
pub const MAX_DURATION_MS: Millis = 24 * 60 * 60 * 1000;
pub const MAX_WORD_GOAL: u64 = 100_000;

/// How a session is won. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Duration { duration_ms: Millis },
    WordCount { words: u64 },
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Duration { duration_ms } if duration_ms % 60_000 == 0 => {
                write!(f, "{} min", duration_ms / 60_000)
            }
            Goal::Duration { duration_ms } => write!(f, "{}s", duration_ms / 1000),
            Goal::WordCount { words } => write!(f, "{words} words"),
        }
    }
}

/// Immutable per-session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub goal: Goal,
    pub idle_timeout_ms: Millis,
    pub warning_threshold_ms: Millis,
    pub penalty: PenaltyMode,
}

impl SessionConfig {
    pub fn new(goal: Goal) -> Self {
        Self {
            goal,
            idle_timeout_ms: 5_000,
            warning_threshold_ms: 3_000,
            penalty: PenaltyMode::All,
        }
    }

    pub fn with_idle_timeout(mut self, ms: Millis) -> Self {
        self.idle_timeout_ms = ms;
        self
    }

    pub fn with_warning_threshold(mut self, ms: Millis) -> Self {
        self.warning_threshold_ms = ms;
        self
    }

    pub fn with_penalty(mut self, penalty: PenaltyMode) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        match self.goal {
            Goal::Duration { duration_ms: 0 } => {
                return Err(SessionError::invalid("duration", "must be greater than zero"))
            }
            Goal::Duration { duration_ms } if duration_ms > MAX_DURATION_MS => {
                return Err(SessionError::invalid("duration", "must be at most 24 hours"))
            }
            Goal::WordCount { words: 0 } => {
                return Err(SessionError::invalid("word_goal", "must be greater than zero"))
            }
            Goal::WordCount { words } if words > MAX_WORD_GOAL => {
                return Err(SessionError::invalid(
                    "word_goal",
                    format!("must be at most {MAX_WORD_GOAL}"),
                ))
            }
            _ => {}
        }
        if self.idle_timeout_ms == 0 {
            return Err(SessionError::invalid(
                "idle_timeout",
                "must be greater than zero",
            ));
        }
        if self.warning_threshold_ms > self.idle_timeout_ms {
            return Err(SessionError::invalid(
                "warning_threshold",
                "must not exceed the idle timeout",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Active,
    Completed,
    Penalized,
}

/// Live state of the running session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub started_at_ms: Millis,
    pub initial_word_count: usize,
    pub initial_snapshot: String,
    pub target: DocumentId,
    pub last_activity_ms: Millis,
    /// Word count of the target the last time it could be read.
    pub last_word_count: usize,
}

impl SessionState {
    pub fn words_written(&self) -> u64 {
        self.last_word_count.saturating_sub(self.initial_word_count) as u64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    /// focus moved to another document
    Switched(DocumentId),
    /// the target could not be read when a timer fired
    Unreachable,
    /// the writer gave up
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started { target: DocumentId, goal: Goal },
    Warning(Warning),
    Completed(SessionRecord),
    Penalized { record: SessionRecord, mode: PenaltyMode },
    Aborted { record: SessionRecord, reason: AbortReason },
}

impl SessionEvent {
    /// Machine status right after this event.
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionEvent::Started { .. } | SessionEvent::Warning(_) => SessionStatus::Active,
            SessionEvent::Completed(_) => SessionStatus::Completed,
            SessionEvent::Penalized { .. } => SessionStatus::Penalized,
            SessionEvent::Aborted { .. } => SessionStatus::Idle,
        }
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            SessionEvent::Completed(record)
            | SessionEvent::Penalized { record, .. }
            | SessionEvent::Aborted { record, .. } => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub goal: Goal,
    pub elapsed_ms: Millis,
    pub words_written: u64,
    /// 0.0 ..= 1.0 toward the goal
    pub fraction: f64,
    pub idle_remaining_ms: i64,
}

/// Pre-session content of a penalised document, kept for practice mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    pub document: DocumentId,
    pub snapshot: String,
}

#[derive(Debug)]
struct ActiveSession {
    config: SessionConfig,
    state: SessionState,
    watchdog: IdleWatchdog,
    goal_check: TimerHandle,
}

pub struct SessionMachine<C: Clock = SystemClock> {
    clock: C,
    timers: TimerQueue,
    recorder: SessionRecorder,
    notifier: Box<dyn Notifier>,
    generation: u64,
    active: Option<ActiveSession>,
    recovery: Option<Recovery>,
}

impl<C: Clock> SessionMachine<C> {
    pub fn new(clock: C, recorder: SessionRecorder, notifier: Box<dyn Notifier>) -> Self {
        Self {
            clock,
            timers: TimerQueue::new(),
            recorder,
            notifier,
            generation: 0,
            active: None,
            recovery: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        if self.active.is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.active.as_ref().map(|a| &a.state)
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.active.as_ref().map(|a| &a.config)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn warning(&self) -> Warning {
        self.active
            .as_ref()
            .map(|a| a.watchdog.warning())
            .unwrap_or(Warning::Clear)
    }

    pub fn progress(&self) -> Option<Progress> {
        let active = self.active.as_ref()?;
        let now = self.clock.now_ms();
        let elapsed_ms = now.saturating_sub(active.state.started_at_ms);
        let words_written = active.state.words_written();
        let fraction = match active.config.goal {
            Goal::Duration { duration_ms } => elapsed_ms as f64 / duration_ms as f64,
            Goal::WordCount { words } => words_written as f64 / words as f64,
        };
        Some(Progress {
            goal: active.config.goal,
            elapsed_ms,
            words_written,
            fraction: fraction.clamp(0.0, 1.0),
            idle_remaining_ms: active.watchdog.remaining_ms(now),
        })
    }

    pub fn history(&self) -> &[SessionRecord] {
        self.recorder.history()
    }

    pub fn recorder_mut(&mut self) -> &mut SessionRecorder {
        &mut self.recorder
    }

    pub fn recovery(&self) -> Option<&Recovery> {
        self.recovery.as_ref()
    }

    pub fn take_recovery(&mut self) -> Option<Recovery> {
        self.recovery.take()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Starts a session on the foreground document. Rejections leave the
    /// machine untouched and are reported to the notifier.
    pub fn start(
        &mut self,
        config: SessionConfig,
        docs: &dyn DocumentAccessor,
    ) -> Result<SessionEvent, SessionError> {
        let started = self.try_start(config, docs);
        if let Err(ref e) = started {
            tracing::warn!(error = %e, "session not started");
            self.notifier.notify(&e.to_string(), Severity::Warning);
        }
        started
    }

    fn try_start(
        &mut self,
        config: SessionConfig,
        docs: &dyn DocumentAccessor,
    ) -> Result<SessionEvent, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        config.validate()?;
        let (target, content) = docs
            .active_document()
            .ok_or(SessionError::NoActiveDocument)?;

        let now = self.clock.now_ms();
        self.generation += 1;
        self.recovery = None;

        let goal_check = self.timers.schedule_repeating(
            now,
            GOAL_CHECK_INTERVAL_MS,
            TimerTag::new(self.generation, TimerKind::GoalCheck),
        );
        let mut watchdog = IdleWatchdog::new(
            config.idle_timeout_ms,
            config.warning_threshold_ms,
            self.generation,
        );
        watchdog.reset(now, &mut self.timers);

        let initial_word_count = word_count(&content);
        tracing::info!(
            generation = self.generation,
            target = %target,
            goal = %config.goal,
            penalty = %config.penalty,
            initial_words = initial_word_count,
            "session started"
        );
        self.notifier.notify(
            &format!("Session started: {}. Keep writing!", config.goal),
            Severity::Info,
        );

        let goal = config.goal;
        self.active = Some(ActiveSession {
            config,
            state: SessionState {
                status: SessionStatus::Active,
                started_at_ms: now,
                initial_word_count,
                initial_snapshot: content,
                target: target.clone(),
                last_activity_ms: now,
                last_word_count: initial_word_count,
            },
            watchdog,
            goal_check,
        });

        Ok(SessionEvent::Started { target, goal })
    }

    /// Edit activity on the target. Returns false when no session is active.
    pub fn on_activity(&mut self, docs: &dyn DocumentAccessor) -> bool {
        let now = self.clock.now_ms();
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        active.watchdog.reset(now, &mut self.timers);
        active.state.last_activity_ms = active.watchdog.last_activity_ms();
        if let Some(text) = docs.text(&active.state.target) {
            active.state.last_word_count = word_count(&text);
        }
        true
    }

    /// Focus moved to `new_id`. Leaving the target aborts without touching it.
    pub fn on_document_switch(&mut self, new_id: &DocumentId) -> Option<SessionEvent> {
        let active = self.active.as_ref()?;
        if &active.state.target == new_id {
            return None;
        }
        let now = self.clock.now_ms();
        Some(self.abort(now, AbortReason::Switched(new_id.clone())))
    }

    /// Gives up on the running session; recorded as not completed.
    pub fn stop(&mut self) -> Option<SessionEvent> {
        self.active.as_ref()?;
        let now = self.clock.now_ms();
        Some(self.abort(now, AbortReason::Stopped))
    }

    /// Runs every timer that came due and returns what happened.
    pub fn tick(&mut self, docs: &mut dyn DocumentAccessor) -> Vec<SessionEvent> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();

        for fired in self.timers.due(now) {
            if fired.tag.generation != self.generation || self.active.is_none() {
                tracing::trace!(?fired, current = self.generation, "dropping stale timer");
                continue;
            }
            match fired.tag.kind {
                TimerKind::GoalCheck => {
                    if let Some(event) = self.check_goal(now, docs) {
                        events.push(event);
                    }
                }
                TimerKind::IdleTimeout => {
                    let Some(active) = self.active.as_mut() else {
                        continue;
                    };
                    if active.watchdog.owns_timeout(fired.handle)
                        && active.watchdog.expire(&mut self.timers)
                    {
                        events.push(self.penalize(now, docs));
                    }
                }
                TimerKind::WarningPoll => {
                    let Some(active) = self.active.as_mut() else {
                        continue;
                    };
                    let before = active.watchdog.warning();
                    let warning = active.watchdog.poll(now, &mut self.timers);
                    if warning != before {
                        events.push(SessionEvent::Warning(warning));
                    }
                }
            }
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn check_goal(&mut self, now: Millis, docs: &dyn DocumentAccessor) -> Option<SessionEvent> {
        let active = self.active.as_mut()?;
        let text = match docs.active_document() {
            Some((id, text)) if id == active.state.target => text,
            _ => return Some(self.abort(now, AbortReason::Unreachable)),
        };

        let words = word_count(&text);
        active.state.last_word_count = words;
        let reached = match active.config.goal {
            Goal::WordCount { words: goal } => active.state.words_written() >= goal,
            Goal::Duration { duration_ms } => {
                now.saturating_sub(active.state.started_at_ms) >= duration_ms
            }
        };
        if !reached {
            return None;
        }

        let record = self.finish(now, SessionStatus::Completed, words);
        self.notifier.notify(
            &format!(
                "Session complete! {} words in {}.",
                record.words_written,
                format_clock(record.duration_seconds)
            ),
            Severity::Success,
        );
        Some(SessionEvent::Completed(record))
    }

    fn penalize(&mut self, now: Millis, docs: &mut dyn DocumentAccessor) -> SessionEvent {
        let Some(active) = self.active.as_ref() else {
            return self.abort(now, AbortReason::Unreachable);
        };
        let mode = active.config.penalty;
        let target = active.state.target.clone();
        let snapshot = active.state.initial_snapshot.clone();

        let text = match docs.active_document() {
            Some((id, text)) if id == target => text,
            _ => return self.abort(now, AbortReason::Unreachable),
        };

        let words = word_count(&text);
        let reduced = apply_penalty(&text, mode);
        if let Err(e) = docs.set_text(&target, &reduced) {
            tracing::error!(error = %e, target = %target, "penalty could not be applied");
            self.notifier
                .notify(&format!("Penalty not applied: {e}"), Severity::Error);
        }

        let record = self.finish(now, SessionStatus::Penalized, words);
        self.recovery = Some(Recovery {
            document: target,
            snapshot,
        });
        self.notifier.notify(
            &format!("You stopped writing! Penalty applied: {mode}."),
            Severity::Warning,
        );
        SessionEvent::Penalized { record, mode }
    }

    fn abort(&mut self, now: Millis, reason: AbortReason) -> SessionEvent {
        let (words, target) = match self.active.as_ref() {
            Some(active) => (active.state.last_word_count, active.state.target.clone()),
            None => (0, DocumentId::new("")),
        };
        let record = self.finish(now, SessionStatus::Idle, words);

        let message = match &reason {
            AbortReason::Switched(to) => {
                format!("Session ended: switched from '{target}' to '{to}'.")
            }
            AbortReason::Unreachable => {
                let err = SessionError::DocumentUnreachable(target);
                tracing::warn!(error = %err, "session finalised without penalty");
                format!("Session ended: {err}.")
            }
            AbortReason::Stopped => "Session stopped.".to_string(),
        };
        self.notifier.notify(&message, Severity::Info);
        SessionEvent::Aborted { record, reason }
    }

    /// Tears down timers, records the outcome and returns to Idle.
    fn finish(&mut self, now: Millis, status: SessionStatus, final_words: usize) -> SessionRecord {
        let Some(mut active) = self.active.take() else {
            return SessionRecord::new(0, 0, false);
        };
        active.watchdog.disarm(&mut self.timers);
        self.timers.cancel(active.goal_check);
        self.timers.cancel_generation(self.generation);

        active.state.status = status;
        active.state.last_word_count = final_words;
        let words_written = active.state.words_written();
        let duration_seconds = now.saturating_sub(active.state.started_at_ms) / 1000;
        let completed = status == SessionStatus::Completed;

        let recorded = self
            .recorder
            .record(words_written, duration_seconds, completed);
        if let Err(e) = recorded.persisted {
            self.notifier
                .notify(&format!("Session history not saved: {e}"), Severity::Error);
        }

        tracing::info!(
            generation = self.generation,
            status = %status,
            words_written,
            duration_seconds,
            "session finished"
        );
        recorded.record
    }
}

impl<C: Clock> fmt::Debug for SessionMachine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMachine")
            .field("generation", &self.generation)
            .field("active", &self.active)
            .field("timers", &self.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::document::Workspace;
    use crate::history::MemoryHistoryStore;
    use crate::notify::Inbox;
    use assert_matches::assert_matches;

    struct Harness {
        clock: ManualClock,
        docs: Workspace,
        inbox: Inbox,
        machine: SessionMachine<ManualClock>,
    }

    fn harness(initial: &str) -> Harness {
        let clock = ManualClock::new();
        let mut docs = Workspace::new();
        docs.open("draft", initial);
        docs.open("notes", "");
        let inbox = Inbox::new(32);
        let recorder = SessionRecorder::new(Box::new(MemoryHistoryStore::new()));
        let machine = SessionMachine::new(clock.clone(), recorder, Box::new(inbox.clone()));
        Harness {
            clock,
            docs,
            inbox,
            machine,
        }
    }

    impl Harness {
        fn type_text(&mut self, text: &str) {
            self.docs.insert_str(text);
            self.machine.on_activity(&self.docs);
        }

        fn advance(&mut self, ms: Millis) -> Vec<SessionEvent> {
            let mut events = Vec::new();
            let mut left = ms;
            while left > 0 {
                let step = left.min(50);
                self.clock.advance(step);
                left -= step;
                events.extend(self.machine.tick(&mut self.docs));
            }
            events
        }
    }

    fn words(n: u64) -> SessionConfig {
        SessionConfig::new(Goal::WordCount { words: n })
    }

    #[test]
    fn test_start_captures_initial_state() {
        let mut h = harness("two words");
        let event = h.machine.start(words(10), &h.docs).unwrap();
        assert_matches!(event, SessionEvent::Started { ref target, .. } if target.as_str() == "draft");

        let state = h.machine.state().unwrap();
        assert_eq!(state.status, SessionStatus::Active);
        assert_eq!(state.initial_word_count, 2);
        assert_eq!(state.initial_snapshot, "two words");
        assert_eq!(h.machine.pending_timers(), 3);
    }

    #[test]
    fn test_start_while_active_is_rejected() {
        let mut h = harness("");
        h.machine.start(words(10), &h.docs).unwrap();
        let generation = h.machine.generation();
        let before = h.machine.state().cloned();

        let err = h.machine.start(words(99), &h.docs).unwrap_err();
        assert_eq!(err, SessionError::AlreadyActive);
        assert_eq!(h.machine.generation(), generation);
        assert_eq!(h.machine.state().cloned(), before);
        assert_eq!(h.machine.config().unwrap().goal, Goal::WordCount { words: 10 });
        assert!(h.inbox.latest().unwrap().message.contains("already active"));
    }

    #[test]
    fn test_invalid_config_never_leaves_idle() {
        let mut h = harness("");
        for config in [
            words(0),
            SessionConfig::new(Goal::Duration { duration_ms: 0 }),
            words(5).with_idle_timeout(0),
            words(5).with_idle_timeout(1000).with_warning_threshold(2000),
            SessionConfig::new(Goal::Duration {
                duration_ms: MAX_DURATION_MS + 1,
            }),
        ] {
            assert_matches!(
                h.machine.start(config, &h.docs),
                Err(SessionError::InvalidConfig { .. })
            );
            assert_eq!(h.machine.status(), SessionStatus::Idle);
        }
        assert_eq!(h.machine.pending_timers(), 0);
    }

    #[test]
    fn test_no_active_document() {
        let mut h = harness("");
        let ids: Vec<DocumentId> = h.docs.buffers().iter().map(|b| b.id.clone()).collect();
        for id in &ids {
            h.docs.close(id);
        }
        assert_eq!(
            h.machine.start(words(5), &h.docs),
            Err(SessionError::NoActiveDocument)
        );
        assert_eq!(h.machine.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_word_goal_completes_once_never_early() {
        let mut h = harness("already here");
        h.machine.start(words(3), &h.docs).unwrap();

        h.type_text(" one two");
        assert!(h.advance(2000).is_empty());
        assert!(h.machine.is_active());

        h.type_text(" three");
        let events = h.advance(1000);
        let completed: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Completed(_)))
            .collect();
        assert_eq!(completed.len(), 1);
        let record = completed[0].record().unwrap();
        assert_eq!(record.words_written, 3);
        assert!(record.completed);

        assert_eq!(h.machine.status(), SessionStatus::Idle);
        assert_eq!(h.machine.pending_timers(), 0);
        assert!(h.advance(10_000).is_empty());
        assert_eq!(h.machine.history().len(), 1);
    }

    #[test]
    fn test_duration_goal_not_before_elapsed() {
        let mut h = harness("");
        let config = SessionConfig::new(Goal::Duration { duration_ms: 4000 })
            .with_idle_timeout(10_000)
            .with_warning_threshold(0);
        h.machine.start(config, &h.docs).unwrap();

        assert!(h.advance(3950).is_empty());
        let events = h.advance(50);
        assert_matches!(events.as_slice(), [SessionEvent::Completed(r)] if r.duration_seconds == 4);
    }

    #[test]
    fn test_idle_penalty_applies_mode_and_keeps_snapshot() {
        let mut h = harness("Before.");
        let config = words(100)
            .with_idle_timeout(2000)
            .with_warning_threshold(1000)
            .with_penalty(PenaltyMode::Sentence);
        h.machine.start(config, &h.docs).unwrap();
        h.type_text(" More words now.");

        let events = h.advance(2500);
        let penalized: Vec<_> = events
            .iter()
            .filter(|e| e.status() == SessionStatus::Penalized)
            .collect();
        assert_eq!(penalized.len(), 1);
        assert_matches!(penalized[0], SessionEvent::Penalized { record, mode: PenaltyMode::Sentence } => {
            assert!(!record.completed);
            assert_eq!(record.words_written, 3);
        });
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Warning(Warning::Approaching(_)))));

        assert_eq!(h.docs.active_text(), "Before.");
        assert_eq!(
            h.machine.recovery(),
            Some(&Recovery {
                document: DocumentId::new("draft"),
                snapshot: "Before.".into()
            })
        );
    }

    #[test]
    fn test_document_switch_aborts_without_mutation() {
        let mut h = harness("");
        h.machine.start(words(50), &h.docs).unwrap();
        h.type_text("some words here");

        let notes = h.docs.focus_next().unwrap();
        let event = h.machine.on_document_switch(&notes).unwrap();
        assert_matches!(event, SessionEvent::Aborted { ref record, reason: AbortReason::Switched(_) } => {
            assert!(!record.completed);
            assert_eq!(record.words_written, 3);
        });
        assert_eq!(h.machine.status(), SessionStatus::Idle);
        assert_eq!(h.docs.text(&DocumentId::new("draft")).unwrap(), "some words here");
        assert_eq!(h.machine.pending_timers(), 0);
    }

    #[test]
    fn test_switch_to_same_document_is_ignored() {
        let mut h = harness("");
        h.machine.start(words(50), &h.docs).unwrap();
        assert!(h
            .machine
            .on_document_switch(&DocumentId::new("draft"))
            .is_none());
        assert!(h.machine.is_active());
    }

    #[test]
    fn test_goal_check_with_target_in_background_aborts() {
        let mut h = harness("");
        h.machine.start(words(50), &h.docs).unwrap();
        h.type_text("a b");
        // host forgot to report the switch
        h.docs.focus_next();

        let events = h.advance(1000);
        assert_matches!(events.as_slice(), [SessionEvent::Aborted { reason: AbortReason::Unreachable, record }] => {
            assert_eq!(record.words_written, 2);
        });
        assert_eq!(h.docs.text(&DocumentId::new("draft")).unwrap(), "a b");
    }

    #[test]
    fn test_idle_timeout_with_target_in_background_aborts() {
        let mut h = harness("keep this text");
        h.machine
            .start(words(50).with_idle_timeout(500).with_warning_threshold(0), &h.docs)
            .unwrap();
        h.docs.focus_next();

        let events = h.advance(600);
        assert_matches!(events.as_slice(), [SessionEvent::Aborted { reason: AbortReason::Unreachable, record }] => {
            assert!(!record.completed);
        });
        assert_eq!(h.machine.status(), SessionStatus::Idle);
        assert!(h.machine.recovery().is_none());
        assert_eq!(
            h.docs.text(&DocumentId::new("draft")).unwrap(),
            "keep this text"
        );
    }

    #[test]
    fn test_penalty_with_read_only_target_still_ends() {
        let mut h = harness("");
        h.machine
            .start(words(50).with_idle_timeout(500).with_warning_threshold(0), &h.docs)
            .unwrap();
        h.type_text("keep me");
        h.docs.set_read_only(&DocumentId::new("draft"), true);

        let events = h.advance(600);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status(), SessionStatus::Penalized);
        assert_eq!(h.docs.active_text(), "keep me");
        assert!(h
            .inbox
            .all()
            .iter()
            .any(|n| n.severity == Severity::Error && n.message.contains("read-only")));
    }

    #[test]
    fn test_stale_timers_do_not_touch_new_session() {
        let mut h = harness("");
        h.machine
            .start(
                words(50)
                    .with_idle_timeout(1000)
                    .with_warning_threshold(0),
                &h.docs,
            )
            .unwrap();
        h.machine.stop().unwrap();

        h.machine
            .start(words(50).with_idle_timeout(5000), &h.docs)
            .unwrap();
        assert_eq!(h.machine.generation(), 2);
        assert!(h.advance(1500).is_empty());
        assert!(h.machine.is_active());
    }

    #[test]
    fn test_persistence_failure_is_reported_not_fatal() {
        let clock = ManualClock::new();
        let mut docs = Workspace::new();
        docs.open("draft", "");
        let store = MemoryHistoryStore::new();
        store.fail_saves(true);
        let inbox = Inbox::new(8);
        let mut machine = SessionMachine::new(
            clock.clone(),
            SessionRecorder::new(Box::new(store)),
            Box::new(inbox.clone()),
        );

        machine.start(words(1), &docs).unwrap();
        docs.insert_str("done");
        machine.on_activity(&docs);
        clock.advance(1000);
        let events = machine.tick(&mut docs);

        assert_matches!(events.as_slice(), [SessionEvent::Completed(_)]);
        assert_eq!(machine.history().len(), 1);
        assert!(inbox
            .all()
            .iter()
            .any(|n| n.severity == Severity::Error && n.message.contains("not saved")));
    }

    #[test]
    fn test_progress_uses_same_word_count() {
        let mut h = harness("x");
        h.machine.start(words(4), &h.docs).unwrap();
        h.type_text("  a   b  ");
        let progress = h.machine.progress().unwrap();
        assert_eq!(progress.words_written, 2);
        assert!((progress.fraction - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_goal_display() {
        assert_eq!(Goal::Duration { duration_ms: 300_000 }.to_string(), "5 min");
        assert_eq!(Goal::Duration { duration_ms: 4_000 }.to_string(), "4s");
        assert_eq!(Goal::WordCount { words: 500 }.to_string(), "500 words");
    }
}

//! Deterministic timer queue.
//!
//! Nothing here runs on its own: the host calls [`TimerQueue::due`] from its
//! tick and dispatches whatever fired. Every timer carries a [`TimerTag`]
//! naming the session generation it belongs to, so a consumer can drop
//! firings that outlived their session.

use crate::clock::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    GoalCheck,
    IdleTimeout,
    WarningPoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTag {
    pub generation: u64,
    pub kind: TimerKind,
}

impl TimerTag {
    pub fn new(generation: u64, kind: TimerKind) -> Self {
        Self { generation, kind }
    }
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub handle: TimerHandle,
    pub tag: TimerTag,
    pub due_ms: Millis,
}

#[derive(Debug, Clone)]
struct Entry {
    handle: TimerHandle,
    tag: TimerTag,
    due_ms: Millis,
    interval_ms: Option<Millis>,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: Vec<Entry>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(&mut self, now: Millis, delay_ms: Millis, tag: TimerTag) -> TimerHandle {
        self.push(now.saturating_add(delay_ms), None, tag)
    }

    /// First firing is one interval from `now`. Zero intervals are bumped to 1ms.
    pub fn schedule_repeating(
        &mut self,
        now: Millis,
        interval_ms: Millis,
        tag: TimerTag,
    ) -> TimerHandle {
        let interval = interval_ms.max(1);
        self.push(now.saturating_add(interval), Some(interval), tag)
    }

    /// Returns false when the handle was unknown (already fired or cancelled).
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub fn cancel_generation(&mut self, generation: u64) {
        self.entries.retain(|e| e.tag.generation != generation);
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.entries.iter().map(|e| e.due_ms).min()
    }

    /// Pops everything due at `now`, ordered by due time then scheduling
    /// order. One-shot timers are removed; repeating timers fire once per
    /// call (missed intervals are coalesced) and re-arm on their cadence.
    pub fn due(&mut self, now: Millis) -> Vec<Fired> {
        let mut fired = Vec::new();

        self.entries.retain_mut(|entry| {
            if entry.due_ms > now {
                return true;
            }
            fired.push(Fired {
                handle: entry.handle,
                tag: entry.tag,
                due_ms: entry.due_ms,
            });
            match entry.interval_ms {
                Some(interval) => {
                    let missed = (now - entry.due_ms) / interval + 1;
                    entry.due_ms += missed * interval;
                    true
                }
                None => false,
            }
        });

        fired.sort_by_key(|f| (f.due_ms, f.handle));
        fired
    }

    fn push(&mut self, due_ms: Millis, interval_ms: Option<Millis>, tag: TimerTag) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            handle,
            tag,
            due_ms,
            interval_ms,
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(kind: TimerKind) -> TimerTag {
        TimerTag::new(1, kind)
    }

    #[test]
    fn once_fires_exactly_once() {
        let mut q = TimerQueue::new();
        let h = q.schedule_once(0, 100, tag(TimerKind::IdleTimeout));

        assert!(q.due(99).is_empty());
        let fired = q.due(100);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].handle, h);
        assert!(q.due(1000).is_empty());
        assert!(!q.is_pending(h));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut q = TimerQueue::new();
        let h = q.schedule_once(0, 10, tag(TimerKind::IdleTimeout));
        assert!(q.cancel(h));
        assert!(!q.cancel(h));
        assert!(q.due(100).is_empty());
    }

    #[test]
    fn repeating_coalesces_missed_intervals() {
        let mut q = TimerQueue::new();
        let h = q.schedule_repeating(0, 50, tag(TimerKind::WarningPoll));

        assert_eq!(q.due(49).len(), 0);
        assert_eq!(q.due(50).len(), 1);
        // a long stall yields one firing, then the cadence resumes
        assert_eq!(q.due(420).len(), 1);
        assert_eq!(q.next_due(), Some(450));
        assert!(q.is_pending(h));
    }

    #[test]
    fn fired_in_due_then_schedule_order() {
        let mut q = TimerQueue::new();
        let late = q.schedule_once(0, 300, tag(TimerKind::IdleTimeout));
        let goal = q.schedule_repeating(0, 100, tag(TimerKind::GoalCheck));
        let early = q.schedule_once(0, 100, tag(TimerKind::WarningPoll));

        let order: Vec<TimerHandle> = q.due(300).into_iter().map(|f| f.handle).collect();
        assert_eq!(order, vec![goal, early, late]);
    }

    #[test]
    fn cancel_generation_removes_only_that_session() {
        let mut q = TimerQueue::new();
        q.schedule_once(0, 10, TimerTag::new(1, TimerKind::IdleTimeout));
        q.schedule_repeating(0, 10, TimerTag::new(1, TimerKind::GoalCheck));
        let keep = q.schedule_once(0, 10, TimerTag::new(2, TimerKind::IdleTimeout));

        q.cancel_generation(1);
        assert_eq!(q.len(), 1);
        assert!(q.is_pending(keep));
    }
}

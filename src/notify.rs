use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Fire-and-forget sink for user-facing messages.
pub trait Notifier {
    fn notify(&mut self, message: &str, severity: Severity);
}

/// Sends notices to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => tracing::info!(%severity, "{message}"),
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

/// Keeps the most recent notices for display. Clones share one inbox.
#[derive(Debug, Clone)]
pub struct Inbox {
    notices: Rc<RefCell<VecDeque<Notice>>>,
    capacity: usize,
}

impl Inbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            notices: Rc::new(RefCell::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn latest(&self) -> Option<Notice> {
        self.notices.borrow().back().cloned()
    }

    pub fn all(&self) -> Vec<Notice> {
        self.notices.borrow().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.notices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.borrow().is_empty()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Notifier for Inbox {
    fn notify(&mut self, message: &str, severity: Severity) {
        LogNotifier.notify(message, severity);
        let mut notices = self.notices.borrow_mut();
        if notices.len() == self.capacity {
            notices.pop_front();
        }
        notices.push_back(Notice {
            message: message.to_string(),
            severity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_keeps_latest_within_capacity() {
        let inbox = Inbox::new(2);
        let mut sink = inbox.clone();
        sink.notify("one", Severity::Info);
        sink.notify("two", Severity::Warning);
        sink.notify("three", Severity::Error);

        assert_eq!(inbox.len(), 2);
        assert_eq!(
            inbox.latest(),
            Some(Notice {
                message: "three".into(),
                severity: Severity::Error
            })
        );
        assert_eq!(inbox.all()[0].message, "two");
    }

    #[test]
    fn severity_display() {
        assert_eq!(Severity::Success.to_string(), "success");
    }
}

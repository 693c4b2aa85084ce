use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::document::{DocumentAccessor, DocumentId, Workspace};
use crate::error::SessionError;
use crate::notify::{Inbox, Notifier, Severity};
use crate::recorder::SessionRecorder;
use crate::session::{SessionEvent, SessionMachine};
use crate::stats::HistorySummary;

pub const DRAFT: &str = "draft";
pub const NOTES: &str = "notes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Writing,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Terminal host: two buffers, one session machine, the notices it produced.
#[derive(Debug)]
pub struct App<C: Clock = SystemClock> {
    pub settings: Settings,
    pub workspace: Workspace,
    pub machine: SessionMachine<C>,
    pub inbox: Inbox,
    pub screen: Screen,
    pub history_scroll: usize,
    summary: Rc<RefCell<HistorySummary>>,
    draft: DocumentId,
    file: Option<PathBuf>,
}

impl<C: Clock> App<C> {
    pub fn new(settings: Settings, clock: C, mut recorder: SessionRecorder) -> Self {
        let summary = Rc::new(RefCell::new(HistorySummary::from_records(
            recorder.history(),
        )));
        let observed = summary.clone();
        recorder.subscribe(Box::new(move |history| {
            *observed.borrow_mut() = HistorySummary::from_records(history);
        }));

        let inbox = Inbox::default();
        let machine = SessionMachine::new(clock, recorder, Box::new(inbox.clone()));

        let mut workspace = Workspace::new();
        let draft = workspace.open(DRAFT, "");
        workspace.open(NOTES, "");

        Self {
            settings,
            workspace,
            machine,
            inbox,
            screen: Screen::Writing,
            history_scroll: 0,
            summary,
            draft,
            file: None,
        }
    }

    /// Loads `path` into the draft buffer; Ctrl+S writes it back.
    /// A missing file starts empty and is created on save.
    pub fn open_file(&mut self, path: &Path) -> io::Result<()> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        // the draft buffer is never read-only
        let _ = self.workspace.set_text(&self.draft, &text);
        self.file = Some(path.to_path_buf());
        Ok(())
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn summary(&self) -> HistorySummary {
        self.summary.borrow().clone()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Control {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return self.quit(),
            KeyCode::Char('c') if ctrl => return self.quit(),
            KeyCode::Char('h') if ctrl => self.toggle_history(),
            KeyCode::F(2) => self.toggle_history(),
            _ if self.screen == Screen::History => self.handle_history_key(key),
            KeyCode::Char('g') if ctrl => {
                let _ = self.start_session();
            }
            KeyCode::Char('x') if ctrl => {
                self.stop_session();
            }
            KeyCode::Char('r') if ctrl => {
                self.recover();
            }
            KeyCode::Char('s') if ctrl => {
                self.save_file();
            }
            KeyCode::Tab => {
                self.switch_buffer();
            }
            KeyCode::Char(_) if ctrl => {}
            KeyCode::Char(c) => self.edit(|ws| ws.insert_char(c)),
            KeyCode::Enter => self.edit(|ws| ws.insert_char('\n')),
            KeyCode::Backspace => self.edit(Workspace::backspace),
            _ => {}
        }
        Control::Continue
    }

    pub fn handle_paste(&mut self, text: &str) {
        if self.screen == Screen::Writing {
            self.edit(|ws| ws.insert_str(text));
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.history_scroll = self.history_scroll.saturating_sub(1),
            KeyCode::Down => {
                let max = self.machine.history().len().saturating_sub(1);
                self.history_scroll = (self.history_scroll + 1).min(max);
            }
            KeyCode::Home => self.history_scroll = 0,
            _ => {}
        }
    }

    fn edit(&mut self, f: impl FnOnce(&mut Workspace) -> bool) {
        if f(&mut self.workspace) {
            self.machine.on_activity(&self.workspace);
        }
    }

    fn quit(&mut self) -> Control {
        self.stop_session();
        Control::Quit
    }

    fn toggle_history(&mut self) {
        self.screen = match self.screen {
            Screen::Writing => Screen::History,
            Screen::History => {
                self.history_scroll = 0;
                Screen::Writing
            }
        };
    }

    /// Runs due timers; called on every host tick.
    pub fn on_tick(&mut self) -> Vec<SessionEvent> {
        self.machine.tick(&mut self.workspace)
    }

    pub fn start_session(&mut self) -> Result<SessionEvent, SessionError> {
        let config = self.settings.session_config();
        self.machine.start(config, &self.workspace)
    }

    pub fn stop_session(&mut self) -> Option<SessionEvent> {
        self.machine.stop()
    }

    /// Moves focus to the next buffer. Leaving the target ends the session.
    pub fn switch_buffer(&mut self) -> Option<SessionEvent> {
        let focused = self.workspace.focus_next()?;
        self.machine.on_document_switch(&focused)
    }

    /// Puts back the content a penalty removed. Practice mode only.
    pub fn recover(&mut self) -> bool {
        if !self.settings.practice_mode {
            self.inbox.notify(
                "Recovery is only available in practice mode.",
                Severity::Info,
            );
            return false;
        }
        if self.machine.is_active() {
            return false;
        }
        let Some(recovery) = self.machine.take_recovery() else {
            self.inbox.notify("Nothing to recover.", Severity::Info);
            return false;
        };
        match self
            .workspace
            .set_text(&recovery.document, &recovery.snapshot)
        {
            Ok(()) => {
                tracing::info!(document = %recovery.document, "pre-session content restored");
                self.inbox.notify(
                    &format!("Restored '{}' to its pre-session content.", recovery.document),
                    Severity::Success,
                );
                true
            }
            Err(e) => {
                self.inbox
                    .notify(&format!("Recovery failed: {e}"), Severity::Error);
                false
            }
        }
    }

    /// Writes the draft buffer back to the file it was loaded from.
    pub fn save_file(&mut self) -> bool {
        let Some(path) = self.file.clone() else {
            self.inbox.notify(
                "No file to save to. Start with --file <path>.",
                Severity::Warning,
            );
            return false;
        };
        let text = self.workspace.text(&self.draft).unwrap_or_default();
        match fs::write(&path, text) {
            Ok(()) => {
                self.inbox
                    .notify(&format!("Saved {}", path.display()), Severity::Success);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "save failed");
                self.inbox.notify(
                    &format!("Could not save {}: {e}", path.display()),
                    Severity::Error,
                );
                false
            }
        }
    }
}

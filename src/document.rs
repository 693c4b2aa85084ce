use std::fmt;

use crate::error::DocumentError;

/// Opaque handle naming a document in the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the session core needs from the editor host.
///
/// Change notifications flow the other way: the host calls
/// `SessionMachine::on_activity` and `SessionMachine::on_document_switch`.
pub trait DocumentAccessor {
    /// The foreground document and its content, if any.
    fn active_document(&self) -> Option<(DocumentId, String)>;
    fn text(&self, id: &DocumentId) -> Option<String>;
    fn set_text(&mut self, id: &DocumentId, text: &str) -> Result<(), DocumentError>;
}

#[derive(Debug, Clone)]
pub struct Buffer {
    pub id: DocumentId,
    pub text: String,
    pub read_only: bool,
}

/// In-memory set of named buffers with one in the foreground.
///
/// Writing is append-only at the end of the active buffer, which is all a
/// keep-typing session needs.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    buffers: Vec<Buffer>,
    active: Option<usize>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a buffer (or replaces the content of an existing one) and
    /// focuses it if nothing is focused yet.
    pub fn open(&mut self, name: &str, text: impl Into<String>) -> DocumentId {
        let id = DocumentId::new(name);
        let text = text.into();
        match self.position(&id) {
            Some(idx) => self.buffers[idx].text = text,
            None => {
                self.buffers.push(Buffer {
                    id: id.clone(),
                    text,
                    read_only: false,
                });
                if self.active.is_none() {
                    self.active = Some(self.buffers.len() - 1);
                }
            }
        }
        id
    }

    pub fn close(&mut self, id: &DocumentId) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        self.buffers.remove(idx);
        self.active = match self.active {
            _ if self.buffers.is_empty() => None,
            Some(active) if active == idx => Some(idx.min(self.buffers.len() - 1)),
            Some(active) if active > idx => Some(active - 1),
            other => other,
        };
        true
    }

    pub fn set_read_only(&mut self, id: &DocumentId, read_only: bool) {
        if let Some(idx) = self.position(id) {
            self.buffers[idx].read_only = read_only;
        }
    }

    pub fn focus(&mut self, id: &DocumentId) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.active = Some(idx);
                true
            }
            None => false,
        }
    }

    /// Cycles the foreground to the next buffer and returns its id.
    pub fn focus_next(&mut self) -> Option<DocumentId> {
        let next = match self.active {
            Some(idx) => (idx + 1) % self.buffers.len(),
            None if !self.buffers.is_empty() => 0,
            None => return None,
        };
        self.active = Some(next);
        Some(self.buffers[next].id.clone())
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn active_id(&self) -> Option<&DocumentId> {
        self.active_buffer().map(|b| &b.id)
    }

    pub fn active_text(&self) -> &str {
        self.active_buffer().map(|b| b.text.as_str()).unwrap_or("")
    }

    pub fn insert_char(&mut self, c: char) -> bool {
        self.edit(|text| text.push(c))
    }

    pub fn insert_str(&mut self, s: &str) -> bool {
        self.edit(|text| text.push_str(s))
    }

    pub fn backspace(&mut self) -> bool {
        self.edit(|text| {
            text.pop();
        })
    }

    fn edit(&mut self, f: impl FnOnce(&mut String)) -> bool {
        match self.active.and_then(|idx| self.buffers.get_mut(idx)) {
            Some(buffer) if !buffer.read_only => {
                f(&mut buffer.text);
                true
            }
            _ => false,
        }
    }

    fn active_buffer(&self) -> Option<&Buffer> {
        self.active.and_then(|idx| self.buffers.get(idx))
    }

    fn position(&self, id: &DocumentId) -> Option<usize> {
        self.buffers.iter().position(|b| &b.id == id)
    }
}

impl DocumentAccessor for Workspace {
    fn active_document(&self) -> Option<(DocumentId, String)> {
        self.active_buffer().map(|b| (b.id.clone(), b.text.clone()))
    }

    fn text(&self, id: &DocumentId) -> Option<String> {
        self.position(id).map(|idx| self.buffers[idx].text.clone())
    }

    fn set_text(&mut self, id: &DocumentId, text: &str) -> Result<(), DocumentError> {
        let idx = self
            .position(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
        let buffer = &mut self.buffers[idx];
        if buffer.read_only {
            return Err(DocumentError::ReadOnly(id.clone()));
        }
        buffer.text = text.to_string();
        Ok(())
    }
}

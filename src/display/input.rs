use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Result of processing a key event.
#[derive(Debug, PartialEq, Eq)]
pub enum EditAction {
    /// Still editing.
    None,
    /// User pressed Enter.
    Submit(String),
    /// User pressed Escape or Ctrl-C.
    Cancel,
}

/// Single-line editor used by the folder picker. Rendering is the caller's
/// job; this only tracks the buffer.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            buffer: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn set_text(&mut self, text: &str) {
        self.buffer.clear();
        self.buffer.push_str(text);
    }

    /// Process a terminal key event. Returns the action to take.
    pub fn handle_key(&mut self, event: &KeyEvent) -> EditAction {
        match event.code {
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                EditAction::Cancel
            }
            KeyCode::Char('u') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.buffer.clear();
                EditAction::None
            }
            KeyCode::Char('w') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.delete_word();
                EditAction::None
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                EditAction::None
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                EditAction::None
            }
            KeyCode::Enter => EditAction::Submit(self.buffer.trim().to_string()),
            KeyCode::Esc => EditAction::Cancel,
            _ => EditAction::None,
        }
    }

    /// Delete back to the previous path separator (or whitespace).
    fn delete_word(&mut self) {
        while self.buffer.ends_with(['/', ' ']) {
            self.buffer.pop();
        }
        while !self.buffer.is_empty() && !self.buffer.ends_with(['/', ' ']) {
            self.buffer.pop();
        }
    }
}

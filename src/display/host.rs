//! The host terminal as the session's terminal widget.
//!
//! Session output is passed straight through: the user's terminal emulator
//! interprets the escape sequences. The bottom rows are kept out of the
//! session's scroll region for the action bar.

use std::io::{self, Write};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::style::Print;
use crossterm::{cursor, queue, terminal};
use unicode_width::UnicodeWidthChar;

use super::theme;
use crate::backend::TerminalSize;
use crate::bridge::{InputChannel, TerminalWidget};

/// Rows kept below the session for the action bar.
const RESERVED_ROWS: u16 = 1;

pub struct HostTerminal<W: Write = io::Stdout> {
    out: W,
    input: Option<InputChannel>,
    /// Host size override, `(cols, rows)`. `None` queries the real terminal.
    fixed_size: Option<(u16, u16)>,
}

impl<W: Write> HostTerminal<W> {
    pub fn with_writer(writer: W) -> Self {
        Self {
            out: writer,
            input: None,
            fixed_size: None,
        }
    }

    /// Pin the host size to `(cols, rows)` instead of querying it.
    #[must_use]
    pub fn with_size(mut self, host_size: (u16, u16)) -> Self {
        self.fixed_size = Some(host_size);
        self
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn host_size(&self) -> (u16, u16) {
        self.fixed_size.unwrap_or_else(super::term_size)
    }

    /// Forward a key press to the session.
    pub fn handle_key(&self, key: &KeyEvent) {
        let Some(input) = &self.input else {
            return;
        };
        if let Some(bytes) = key_to_input(key) {
            input.send(&bytes);
        }
    }

    /// Forward pasted text to the session.
    pub fn handle_paste(&self, text: &str) {
        if let Some(input) = &self.input {
            input.send(text);
        }
    }

    /// Draw `line` in the reserved bottom row without disturbing the
    /// session's cursor.
    pub fn draw_status_line(&mut self, line: &str) {
        let (cols, rows) = self.host_size();
        let line = truncate_to_width(line, usize::from(cols));
        let padding = usize::from(cols).saturating_sub(display_width(&line));
        queue!(
            self.out,
            cursor::SavePosition,
            cursor::MoveTo(0, rows.saturating_sub(1)),
            terminal::Clear(terminal::ClearType::CurrentLine),
            Print(theme::status_bar().apply(format!("{line}{}", " ".repeat(padding)))),
            cursor::RestorePosition,
        )
        .ok();
        self.out.flush().ok();
    }
}

impl<W: Write> TerminalWidget for HostTerminal<W> {
    fn on_data(&mut self, input: InputChannel) {
        self.input = Some(input);
    }

    fn clear(&mut self) {
        queue!(
            self.out,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )
        .ok();
        self.out.flush().ok();
    }

    fn write(&mut self, data: &str) {
        queue!(self.out, Print(data)).ok();
        self.out.flush().ok();
    }

    fn propose_dimensions(&mut self) -> Option<TerminalSize> {
        let (cols, rows) = self.host_size();
        let session_rows = rows.saturating_sub(RESERVED_ROWS).max(1);
        // Confine the session to the rows above the action bar. Setting the
        // scroll region homes the cursor, so save and restore around it.
        queue!(
            self.out,
            cursor::SavePosition,
            Print(format!("\x1b[1;{session_rows}r")),
            cursor::RestorePosition,
        )
        .ok();
        self.out.flush().ok();
        Some(TerminalSize {
            rows: session_rows,
            cols,
        })
    }

    fn focus(&mut self) {
        queue!(self.out, cursor::Show).ok();
        self.out.flush().ok();
    }

    fn dispose(&mut self) {
        self.input = None;
        queue!(
            self.out,
            Print("\x1b[r"),
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0),
            cursor::Show,
        )
        .ok();
        self.out.flush().ok();
    }
}

/// Encode a key press as the bytes an xterm-compatible terminal would send.
pub fn key_to_input(key: &KeyEvent) -> Option<String> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let modifier = xterm_modifier(shift, alt, ctrl);

    let seq = match key.code {
        KeyCode::Char(c) => {
            let base = ctrl
                .then(|| control_char(c))
                .flatten()
                .map_or_else(|| c.to_string(), String::from);
            if alt { format!("\x1b{base}") } else { base }
        }
        // Meta-Enter is the newline-without-submit that line editors expect.
        KeyCode::Enter if shift || alt => "\x1b\r".to_string(),
        KeyCode::Enter => "\r".to_string(),
        KeyCode::Backspace if alt => "\x1b\x7f".to_string(),
        KeyCode::Backspace if ctrl => "\x08".to_string(),
        KeyCode::Backspace => "\x7f".to_string(),
        KeyCode::Tab => "\t".to_string(),
        KeyCode::BackTab => "\x1b[Z".to_string(),
        KeyCode::Esc => "\x1b".to_string(),
        KeyCode::Up => csi_letter('A', modifier),
        KeyCode::Down => csi_letter('B', modifier),
        KeyCode::Right => csi_letter('C', modifier),
        KeyCode::Left => csi_letter('D', modifier),
        KeyCode::Home => csi_letter('H', modifier),
        KeyCode::End => csi_letter('F', modifier),
        KeyCode::PageUp => csi_tilde(5, modifier),
        KeyCode::PageDown => csi_tilde(6, modifier),
        KeyCode::Delete => csi_tilde(3, modifier),
        KeyCode::Insert => csi_tilde(2, modifier),
        KeyCode::F(n @ 1..=4) => {
            let letter = char::from(b'P' + n - 1);
            match modifier {
                Some(m) => format!("\x1b[1;{m}{letter}"),
                None => format!("\x1bO{letter}"),
            }
        }
        KeyCode::F(n) => {
            let code = match n {
                5 => 15,
                6 => 17,
                7 => 18,
                8 => 19,
                9 => 20,
                10 => 21,
                11 => 23,
                12 => 24,
                _ => return None,
            };
            csi_tilde(code, modifier)
        }
        _ => return None,
    };
    Some(seq)
}

/// The xterm modifier parameter, `None` when no modifier is held.
fn xterm_modifier(shift: bool, alt: bool, ctrl: bool) -> Option<u8> {
    let m = 1 + u8::from(shift) + 2 * u8::from(alt) + 4 * u8::from(ctrl);
    (m > 1).then_some(m)
}

fn csi_letter(letter: char, modifier: Option<u8>) -> String {
    match modifier {
        Some(m) => format!("\x1b[1;{m}{letter}"),
        None => format!("\x1b[{letter}"),
    }
}

fn csi_tilde(code: u8, modifier: Option<u8>) -> String {
    match modifier {
        Some(m) => format!("\x1b[{code};{m}~"),
        None => format!("\x1b[{code}~"),
    }
}

/// The C0 control character for Ctrl+`c`, including the digit aliases
/// legacy terminals use (Ctrl+2 is NUL, Ctrl+3 is ESC, and so on).
fn control_char(c: char) -> Option<char> {
    let byte = match c.to_ascii_lowercase() {
        letter @ 'a'..='z' => u8::try_from(letter).ok()? - b'a' + 1,
        ' ' | '@' | '2' => 0x00,
        '[' | '3' => 0x1b,
        '\\' | '4' => 0x1c,
        ']' | '5' => 0x1d,
        '^' | '6' => 0x1e,
        '_' | '-' | '/' | '7' => 0x1f,
        '?' | '8' => 0x7f,
        _ => return None,
    };
    Some(char::from(byte))
}

fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Cut `s` to at most `max` columns, marking the cut with `…`.
pub(crate) fn truncate_to_width(s: &str, max: usize) -> String {
    if display_width(s) <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        out.push(c);
        width += w;
    }
    if max > 0 {
        out.push('…');
    }
    out
}

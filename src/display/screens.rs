//! Full-screen views shown before and around the session: setup steps, the
//! folder picker, and the action bar line.

use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;

use crossterm::style::Print;
use crossterm::{cursor, queue, terminal};

use super::theme;
use crate::config::Config;
use crate::quick_response::folder_label;
use crate::readiness::{DependencyStatus, SetupStep};

/// Install log lines kept (and shown).
pub const INSTALL_LOG_TAIL: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Normal,
    Dim,
    Hint,
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub style: LineStyle,
    pub text: String,
}

impl Line {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(LineStyle::Normal, "")
    }
}

/// Progress of a tool install started from the setup screen.
#[derive(Debug, Default)]
pub struct InstallView {
    pub running: bool,
    pub log: VecDeque<String>,
    pub error: Option<String>,
}

impl InstallView {
    /// Append an output line, dropping the oldest beyond the visible tail.
    pub fn push_line(&mut self, line: String) {
        while self.log.len() >= INSTALL_LOG_TAIL {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }
}

pub struct SetupContext<'a> {
    pub step: SetupStep,
    pub status: Option<&'a DependencyStatus>,
    pub check_error: Option<&'a str>,
    pub install: &'a InstallView,
    pub config: &'a Config,
}

pub fn setup_lines(ctx: &SetupContext<'_>) -> Vec<Line> {
    let mut lines = Vec::new();
    match ctx.step {
        SetupStep::Checking => {
            lines.push(Line::new(LineStyle::Title, "Checking dependencies…"));
            return lines;
        }
        SetupStep::NeedRuntime => {
            lines.push(Line::new(LineStyle::Title, "Node.js is required"));
            lines.push(Line::new(
                LineStyle::Normal,
                "Claude Code runs on Node.js. Install it, then recheck.",
            ));
            lines.push(Line::blank());
            lines.push(Line::new(
                LineStyle::Hint,
                format!("[o] open {}", ctx.config.runtime_download_url),
            ));
            lines.push(Line::new(LineStyle::Dim, "    or run: brew install node"));
        }
        SetupStep::NeedTool => {
            lines.push(Line::new(LineStyle::Title, "Claude Code is not installed"));
            if let Some(version) = ctx.status.and_then(|s| s.runtime_version.as_deref()) {
                lines.push(Line::new(LineStyle::Ok, format!("Node.js {version} found")));
            }
            lines.push(Line::blank());
            if ctx.install.running {
                lines.push(Line::new(LineStyle::Normal, "Installing…"));
                if ctx.install.log.is_empty() {
                    lines.push(Line::new(LineStyle::Dim, "Waiting for output…"));
                }
                let skip = ctx.install.log.len().saturating_sub(INSTALL_LOG_TAIL);
                for entry in ctx.install.log.iter().skip(skip) {
                    lines.push(Line::new(LineStyle::Dim, entry.clone()));
                }
            } else {
                lines.push(Line::new(
                    LineStyle::Hint,
                    format!("[i] install with: {}", ctx.config.install_command.join(" ")),
                ));
            }
            if let Some(error) = &ctx.install.error {
                lines.push(Line::new(LineStyle::Error, error.clone()));
            }
        }
        SetupStep::NeedAuth => {
            lines.push(Line::new(LineStyle::Title, "Sign in to Claude Code"));
            lines.push(Line::new(
                LineStyle::Normal,
                format!(
                    "Run `{}` in a terminal and complete the login, then recheck.",
                    ctx.config.tool_command
                ),
            ));
        }
        SetupStep::Ready => {
            lines.push(Line::new(LineStyle::Ok, "All set."));
            return lines;
        }
    }
    if let Some(error) = ctx.check_error {
        lines.push(Line::new(LineStyle::Error, error));
    }
    lines.push(Line::blank());
    lines.push(Line::new(LineStyle::Hint, "[r] recheck  [q] quit"));
    lines
}

pub fn folder_picker_lines(input: &str, error: Option<&str>) -> Vec<Line> {
    let mut lines = vec![
        Line::new(LineStyle::Title, "Choose a project folder"),
        Line::new(LineStyle::Normal, "Claude Code will start in this folder."),
        Line::blank(),
        Line::new(LineStyle::Normal, format!("> {input}")),
    ];
    if let Some(error) = error {
        lines.push(Line::new(LineStyle::Error, error));
    }
    lines.push(Line::blank());
    lines.push(Line::new(LineStyle::Hint, "[Enter] open  [Esc] quit"));
    lines
}

/// The bottom line shown during a session.
pub fn action_bar_line(folder: &Path, show_full_path: bool) -> String {
    let label = if show_full_path {
        folder.display().to_string()
    } else {
        folder_label(folder)
    };
    format!(" {label}  │  Alt+Y accept · Alt+N reject · Ctrl+] change folder · Alt+I path")
}

/// Clear the screen and draw `lines` from the top. With `cursor_at`, the
/// cursor is left visible at `(col, row)`; otherwise it is hidden.
pub fn draw<W: Write>(out: &mut W, lines: &[Line], cursor_at: Option<(u16, u16)>) {
    queue!(
        out,
        terminal::Clear(terminal::ClearType::All),
        cursor::MoveTo(0, 0)
    )
    .ok();
    for line in lines {
        let styled = match line.style {
            LineStyle::Title => theme::title().apply(line.text.as_str()),
            LineStyle::Normal => crossterm::style::ContentStyle::default().apply(line.text.as_str()),
            LineStyle::Dim => theme::dim().apply(line.text.as_str()),
            LineStyle::Hint => theme::key_hint().apply(line.text.as_str()),
            LineStyle::Ok => theme::ok().apply(line.text.as_str()),
            LineStyle::Error => theme::error().apply(line.text.as_str()),
        };
        queue!(out, Print(styled), Print("\r\n")).ok();
    }
    match cursor_at {
        Some((col, row)) => queue!(out, cursor::MoveTo(col, row), cursor::Show).ok(),
        None => queue!(out, cursor::Hide).ok(),
    };
    out.flush().ok();
}

pub mod host;
pub mod input;
pub mod screens;
pub mod theme;

/// Query the host terminal as `(cols, rows)`, defaulting to 80x24.
pub(crate) fn term_size() -> (u16, u16) {
    crossterm::terminal::size()
        .ok()
        .filter(|&(cols, rows)| cols > 0 && rows > 0)
        .unwrap_or((80, 24))
}

//! Terminal display styles.
//!
//! All styles use only named ANSI colors so that colors adapt to the user's
//! terminal theme. Avoid `Color::Rgb`, `Color::AnsiValue`, and bright
//! variants. Use `Attribute::Dim` / `Attribute::Bold` for emphasis.

use crossterm::style::{Attribute, Attributes, Color, ContentStyle};

pub fn dim() -> ContentStyle {
    ContentStyle {
        attributes: Attribute::Dim.into(),
        ..Default::default()
    }
}

pub fn title() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Cyan),
        attributes: Attribute::Bold.into(),
        ..Default::default()
    }
}

pub fn error() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Red),
        ..Default::default()
    }
}

pub fn ok() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Green),
        attributes: Attribute::Bold.into(),
        ..Default::default()
    }
}

pub fn key_hint() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Yellow),
        ..Default::default()
    }
}

pub fn status_bar() -> ContentStyle {
    ContentStyle {
        attributes: Attributes::from(Attribute::Reverse) | Attribute::Bold,
        ..Default::default()
    }
}

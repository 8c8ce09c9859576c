use super::InputChannel;
use crate::backend::TerminalSize;

/// The text-grid renderer the bridge drives.
///
/// The bridge treats it as an opaque sink of text and a source of user
/// input and dimensions; escape sequences are the widget's business.
pub trait TerminalWidget {
    /// Register where user input goes. Every chunk the user types must be
    /// sent through `input` verbatim.
    fn on_data(&mut self, input: InputChannel);

    fn clear(&mut self);

    fn write(&mut self, data: &str);

    /// Show an error line inside the terminal area.
    fn write_error(&mut self, message: &str) {
        self.write(&format!("\r\n\x1b[31mError: {message}\x1b[0m\r\n"));
    }

    /// Fit to the available space and report the resulting grid size.
    fn propose_dimensions(&mut self) -> Option<TerminalSize>;

    fn focus(&mut self);

    fn dispose(&mut self);
}

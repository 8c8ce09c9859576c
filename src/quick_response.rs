//! Canned yes/no answers and the current-folder label shown in the action bar.

use std::path::Path;

use crate::bridge::InputChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedResponse {
    Accept,
    Reject,
}

impl CannedResponse {
    pub fn payload(self) -> &'static str {
        match self {
            CannedResponse::Accept => "y\n",
            CannedResponse::Reject => "n\n",
        }
    }
}

/// Sends canned responses through the same channel typed keys use.
#[derive(Debug, Clone)]
pub struct QuickResponse {
    input: InputChannel,
}

impl QuickResponse {
    pub fn new(input: InputChannel) -> Self {
        Self { input }
    }

    pub fn send_canned(&self, response: CannedResponse) {
        tracing::debug!(?response, "quick response");
        self.input.send(response.payload());
    }
}

/// Leaf name of `folder`, or the whole path when it has none (e.g. `/`).
pub fn folder_label(folder: &Path) -> String {
    folder
        .file_name()
        .map_or_else(|| folder.display().to_string(), |name| name.to_string_lossy().into_owned())
}

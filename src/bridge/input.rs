use std::fmt;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::BackendResult;

type SendFn = dyn Fn(&str) -> BackendResult<()> + Send + Sync;

/// The one path from the UI into the session's input stream.
///
/// Typed keystrokes and canned responses share clones of the same channel,
/// so both end up in `Backend::send_input`, in the order they were issued.
#[derive(Clone)]
pub struct InputChannel {
    send: Arc<SendFn>,
}

impl fmt::Debug for InputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputChannel").finish_non_exhaustive()
    }
}

impl InputChannel {
    pub fn new<B: Backend>(backend: B) -> Self {
        Self {
            send: Arc::new(move |data: &str| backend.send_input(data)),
        }
    }

    /// Forward `data` verbatim. Failures are logged and dropped; the
    /// session may still be healthy.
    pub fn send(&self, data: &str) {
        if let Err(e) = (self.send)(data) {
            tracing::warn!(error = %e, "failed to send input");
        }
    }
}

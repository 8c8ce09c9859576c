//! File logging. The terminal belongs to the session, so log lines never go
//! to stdout or stderr once the shell is running.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MYCLOD_LOG";
const DEFAULT_FILTER: &str = "info";

/// `<data-local-dir>/myclod/myclod.log`.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("myclod").join("myclod.log"))
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

/// Install the global subscriber writing to `path` (or the default log
/// file). Logging stays off if the file can't be opened.
pub fn init(path: Option<PathBuf>) {
    let Some(path) = path.or_else(default_log_path) else {
        eprintln!("myclod: no log directory available, logging disabled");
        return;
    };
    let file = match open_log_file(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("myclod: {e:#}, logging disabled");
            return;
        }
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("myclod: a logger is already installed");
        return;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), log = %path.display(), "logging started");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn open_log_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("myclod.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}

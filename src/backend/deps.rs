//! Dependency detection and assistant installation.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::events::{BackendEvent, EventBus};
use crate::config::Config;
use crate::error::{BackendError, BackendResult};
use crate::readiness::DependencyStatus;

/// Files whose presence marks the user as signed in.
const CREDENTIAL_FILES: &[&str] = &["config.json", "credentials.json"];

/// Run `<program> --version`, returning the trimmed version on success.
pub async fn probe_version(program: &str) -> Option<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()
        .filter(|o| o.status.success())?;
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(version)
}

/// Signed in means a config or credentials file exists in `auth_dir`.
pub fn is_authenticated(auth_dir: Option<&Path>) -> bool {
    auth_dir.is_some_and(|dir| CREDENTIAL_FILES.iter().any(|f| dir.join(f).exists()))
}

pub async fn check_dependencies(config: &Config) -> DependencyStatus {
    tracing::info!("checking dependencies");
    let (runtime_version, tool_version) = tokio::join!(
        probe_version(&config.runtime_command),
        probe_version(&config.tool_command),
    );
    let auth_dir = config.auth_dir();
    let authenticated = is_authenticated(auth_dir.as_deref());
    let status = DependencyStatus {
        runtime_version,
        tool_version,
        authenticated,
    };
    tracing::info!(
        runtime = ?status.runtime_version,
        tool = ?status.tool_version,
        authenticated,
        "dependencies checked"
    );
    status
}

/// Run the configured install command, publishing each output line.
pub async fn install_tool(config: &Config, events: &EventBus) -> BackendResult<()> {
    let Some((program, args)) = config.install_command.split_first() else {
        return Err(BackendError::Install("install command is empty".to_string()));
    };
    tracing::info!(%program, ?args, "installing assistant");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackendError::Install(format!("failed to run {program}: {e}")))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    tokio::join!(
        forward_lines(stdout, events),
        forward_lines(stderr, events)
    );

    let status = child.wait().await?;
    if status.success() {
        tracing::info!("assistant installed");
        Ok(())
    } else {
        let message = format!("{program} exited with code {:?}", status.code());
        tracing::error!(%message, "install failed");
        Err(BackendError::Install(message))
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: Option<R>, events: &EventBus) {
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        events.emit(BackendEvent::InstallProgress(line));
    }
}

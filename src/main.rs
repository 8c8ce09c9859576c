mod cli;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::{cursor, execute, terminal};
use myclod::backend::PtyBackend;
use myclod::config::{self, Config};
use myclod::readiness::ReadinessController;
use myclod::shell::{Shell, ShellOptions};
use myclod::{event, logging};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    install_panic_hook();
    let cli = Cli::parse();
    let config = config::load_or_default(cli.config.as_deref())?;
    logging::init(cli.log_file);

    match cli.command {
        Some(Command::Check { json }) => check(config, json).await,
        None => run_shell(config, cli.folder).await,
    }
}

/// Install a panic hook that restores terminal state before printing the panic.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore_terminal();
        default_hook(info);
    }));
}

async fn check(config: Config, json: bool) -> Result<()> {
    let backend = PtyBackend::new(config);
    let mut readiness = ReadinessController::new();
    readiness.refresh(&backend).await;
    let step = readiness.step();
    let status = readiness.status().cloned().unwrap_or_default();

    let mut out = io::stdout().lock();
    if json {
        let report = serde_json::json!({
            "step": step,
            "status": status,
            "error": readiness.last_error(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }
    writeln!(
        out,
        "runtime:       {}",
        status.runtime_version.as_deref().unwrap_or("not found")
    )?;
    writeln!(
        out,
        "tool:          {}",
        status.tool_version.as_deref().unwrap_or("not found")
    )?;
    writeln!(
        out,
        "authenticated: {}",
        if status.authenticated { "yes" } else { "no" }
    )?;
    if let Some(error) = readiness.last_error() {
        writeln!(out, "error:         {error}")?;
    }
    writeln!(out, "step:          {}", step.name())?;
    Ok(())
}

async fn run_shell(config: Config, folder: Option<PathBuf>) -> Result<()> {
    let initial_folder = match folder {
        Some(folder) => {
            if !folder.is_dir() {
                bail!("{} is not a directory", folder.display());
            }
            Some(
                std::fs::canonicalize(&folder)
                    .with_context(|| format!("failed to resolve {}", folder.display()))?,
            )
        }
        None => None,
    };
    let options = ShellOptions {
        initial_folder,
        launch_dir: std::env::current_dir().ok(),
        host_size: None,
    };

    let backend = PtyBackend::new(config.clone());
    let (tx, rx) = event::channel();
    let _guard = TerminalGuard::enter()?;
    let reader = event::spawn_terminal_reader(tx.clone());

    let mut shell = Shell::new(backend, config, options, (tx, rx));
    shell.run().await;
    reader.abort();
    Ok(())
}

/// Raw mode and the alternate screen for as long as the shell runs.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw mode")?;
        execute!(
            io::stdout(),
            terminal::EnterAlternateScreen,
            crossterm::event::EnableBracketedPaste
        )
        .context("failed to set up the terminal")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    let mut out = io::stdout();
    // Reset the scroll region the session view sets up.
    out.write_all(b"\x1b[r").ok();
    execute!(
        out,
        crossterm::event::DisableBracketedPaste,
        cursor::Show,
        terminal::LeaveAlternateScreen
    )
    .ok();
    terminal::disable_raw_mode().ok();
}

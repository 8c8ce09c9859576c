use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "myclod",
    about = "Checks Claude Code's dependencies and runs it in a terminal session for a chosen folder",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Folder to open once setup is complete (skips the folder picker).
    #[arg(value_name = "FOLDER")]
    pub folder: Option<PathBuf>,

    /// Config file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs here instead of the default log file.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check dependencies and print the current setup step.
    Check {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_folder_and_globals() {
        let cli = Cli::parse_from(["myclod", "--log-file", "/tmp/x.log", "/work"]);
        assert_eq!(cli.folder, Some(PathBuf::from("/work")));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/x.log")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_check_with_json() {
        let cli = Cli::parse_from(["myclod", "check", "--json", "--config", "c.toml"]);
        assert!(matches!(cli.command, Some(Command::Check { json: true })));
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }
}

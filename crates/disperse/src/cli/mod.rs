//! CLI definition and command handling

pub mod commands;
pub mod output;
mod runner;

use clap::{ArgAction, Parser, Subcommand};

use commands::{
    CompletionsCommand, DiscoverCommand, InfoCommand, InitCommand, ReleaseCommand,
    ValidateCommand, VerifyCommand,
};

/// disperse - release Python and Rust projects without manual steps
#[derive(Debug, Parser)]
#[command(name = "disperse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    /// Plan and gate only; change nothing
    #[arg(long = "dry-run", visible_alias = "try", global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Release one or more projects
    Release(ReleaseCommand),

    /// Find owned projects and release every one that is due
    Discover(DiscoverCommand),

    /// Check the release configuration without touching anything
    Validate(ValidateCommand),

    /// Show current version, pending version and unreleased commits
    Info(InfoCommand),

    /// Run the verify command
    Verify(VerifyCommand),

    /// Write a starter disperse.toml
    Init(InitCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub fn execute(self) -> anyhow::Result<u8> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Release(ref cmd) => cmd.execute(&self),
            Commands::Discover(ref cmd) => cmd.execute(&self),
            Commands::Validate(ref cmd) => cmd.execute(&self),
            Commands::Info(ref cmd) => cmd.execute(&self),
            Commands::Verify(ref cmd) => cmd.execute(&self),
            Commands::Init(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_try_is_dry_run() {
        let cli = Cli::parse_from(["disperse", "discover", "--try"]);
        assert!(cli.dry_run);
        assert!(matches!(cli.command, Commands::Discover(_)));

        let cli = Cli::parse_from(["disperse", "--dry-run", "release", "."]);
        assert!(cli.dry_run);
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["disperse", "-vv", "info"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Text);
    }
}

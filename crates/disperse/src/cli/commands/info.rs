//! Info command

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::cli::runner::{project_info, Services, WorkTree};
use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

/// Show current version, pending version and unreleased commits
#[derive(Debug, Args)]
pub struct InfoCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

impl InfoCommand {
    /// Execute the info command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        info!(path = %self.path.display(), "executing info command");
        let services = Services::load()?;
        let tree = WorkTree::local(&self.path)?;
        let project = services.load_project(&tree)?;
        let info = project_info(&project, tree.repo())?;

        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
            OutputFormat::Text => {
                if !cli.quiet {
                    output::project_info(&info);
                }
            }
        }

        Ok(if info.problems.is_empty() {
            exit_codes::SUCCESS
        } else {
            exit_codes::ERROR
        })
    }
}

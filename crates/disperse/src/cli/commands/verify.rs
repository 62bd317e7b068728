//! Verify command

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use disperse_core::workflow::verify::run_command;

use crate::cli::runner::{Services, WorkTree};
use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

/// Run the verify command of a project
#[derive(Debug, Args)]
pub struct VerifyCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

impl VerifyCommand {
    /// Execute the verify command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        info!(path = %self.path.display(), "executing verify command");
        let services = Services::load()?;
        let tree = WorkTree::local(&self.path)?;
        let project = services.load_project(&tree)?;

        let Some(command) = project.verify_command() else {
            output::warning(&format!("No verify command for {}", project.name));
            return Ok(exit_codes::SUCCESS);
        };
        if !cli.quiet && cli.format == OutputFormat::Text {
            output::info(&format!("Running {}", style(&command).cyan()));
        }

        let runtime = tokio::runtime::Runtime::new()?;
        let result = runtime.block_on(run_command(&command, &project.root));

        if cli.format == OutputFormat::Json {
            let output = serde_json::json!({
                "project": project.name,
                "command": command,
                "passed": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        match result {
            Ok(()) => {
                if !cli.quiet && cli.format == OutputFormat::Text {
                    output::success("Verification passed");
                }
                Ok(exit_codes::SUCCESS)
            }
            Err(e) => {
                if cli.format == OutputFormat::Text {
                    output::error(&e.to_string());
                }
                Ok(exit_codes::ERROR)
            }
        }
    }
}

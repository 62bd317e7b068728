//! `disperse completions`: shell completion scripts

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, CommandFactory};
use clap_complete::{generate, generate_to, Shell};
use tracing::{debug, info};

use crate::cli::{output, Cli};
use crate::exit_codes;

const BIN_NAME: &str = "disperse";

/// Print or install shell completions
#[derive(Debug, Args)]
pub struct CompletionsCommand {
    /// Shell to complete for; defaults to the one named by `$SHELL`
    #[arg(value_enum)]
    pub shell: Option<Shell>,

    /// Directory to write the script into, under the shell's conventional
    /// file name (`disperse.bash`, `_disperse`, `disperse.fish`, ...)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

impl CompletionsCommand {
    fn shell(&self) -> anyhow::Result<Shell> {
        match self.shell {
            Some(shell) => Ok(shell),
            None => Shell::from_env()
                .context("unable to tell the shell from $SHELL; name one explicitly"),
        }
    }

    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        let shell = self.shell()?;
        info!(%shell, "generating completions");
        match &self.output {
            Some(dir) => {
                let path = install(shell, dir)?;
                if !cli.quiet {
                    output::success(&format!("Completions written to {}", path.display()));
                }
            }
            None => generate(shell, &mut Cli::command(), BIN_NAME, &mut io::stdout()),
        }
        Ok(exit_codes::SUCCESS)
    }
}

/// Write the script for `shell` into `dir`, returning its path
fn install(shell: Shell, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("unable to create {}", dir.display()))?;
    let path = generate_to(shell, &mut Cli::command(), BIN_NAME, dir)
        .with_context(|| format!("unable to write completions into {}", dir.display()))?;
    debug!(path = %path.display(), "completion script written");
    Ok(path)
}

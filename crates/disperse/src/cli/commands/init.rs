//! Init command

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use dialoguer::Confirm;
use tracing::{debug, info};

use disperse_adapters::AdapterRegistry;
use disperse_core::config::{default_config_toml, load_config, DEFAULT_CONFIG_FILE};
use disperse_core::TagTemplate;
use disperse_git::GitRepo;

use crate::cli::Cli;
use crate::exit_codes;

/// Write a starter disperse.toml
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Use defaults without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Tag templates tried against existing tags, most common first
const TAG_CANDIDATES: [&str; 3] = ["v$VERSION", "$VERSION", "$NAME-$VERSION"];

/// Name, tag template and news file guessed from the tree
fn guess_settings(root: &Path) -> (String, String, Option<String>) {
    let adapters = AdapterRegistry::new();
    let name = adapters
        .detect(root)
        .and_then(|adapter| adapter.read_project_name(root).ok())
        .or_else(|| root.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string());

    let tags = GitRepo::discover(root)
        .and_then(|repo| repo.list_tags())
        .unwrap_or_default();
    let tag_name = TAG_CANDIDATES
        .iter()
        .map(|candidate| candidate.replace("$NAME", &name))
        .find(|candidate| {
            TagTemplate::new(candidate)
                .map(|t| tags.iter().any(|tag| t.matches(&tag.name)))
                .unwrap_or(false)
        })
        .unwrap_or_else(|| TAG_CANDIDATES[0].to_string());
    debug!(tags = tags.len(), tag_name = %tag_name, "guessed tag template");

    let news_file = ["NEWS", "NEWS.md"]
        .into_iter()
        .find(|candidate| root.join(candidate).is_file())
        .map(str::to_string);

    (name, tag_name, news_file)
}

impl InitCommand {
    /// Execute the init command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        info!(path = %self.path.display(), force = self.force, yes = self.yes, "executing init command");
        let root = std::fs::canonicalize(&self.path)?;
        let config_path = root.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() && !self.force {
            if self.yes {
                anyhow::bail!(
                    "Configuration file already exists at {}. Use --force to overwrite.",
                    config_path.display()
                );
            }

            let overwrite = Confirm::new()
                .with_prompt(format!(
                    "Configuration file already exists at {}. Overwrite?",
                    config_path.display()
                ))
                .default(false)
                .interact()?;

            if !overwrite {
                println!("{}", style("Aborted.").yellow());
                return Ok(exit_codes::CANCELLED);
            }
        }

        let (name, tag_name, news_file) = guess_settings(&root);
        let content = default_config_toml(&name, &tag_name, news_file.as_deref());
        std::fs::write(&config_path, &content)?;
        // never leave behind a file the loader would reject
        load_config(&config_path)?;

        if !cli.quiet {
            println!(
                "{} Created configuration at {}",
                style("✓").green().bold(),
                style(config_path.display()).cyan()
            );
            println!(
                "  Run {} to check it",
                style("disperse validate").cyan()
            );
        }
        Ok(exit_codes::SUCCESS)
    }
}

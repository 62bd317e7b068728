//! Validate command

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use tracing::info;

use disperse_adapters::AdapterRegistry;
use disperse_core::config::{find_config, load_config};
use disperse_core::news_file::NewsFile;
use disperse_core::update_version::reverse_version;
use disperse_core::Project;

use crate::cli::{Cli, OutputFormat};
use crate::exit_codes;

/// Check the release configuration without touching anything
#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Strict mode - treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Default)]
struct Validation {
    config_path: Option<PathBuf>,
    /// The configuration itself could not be loaded
    config_error: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Validation {
    fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Load and sanity-check the configuration for the project at `dir`
fn validate(dir: &Path) -> Validation {
    let mut result = Validation::default();

    let Some(config_path) = find_config(dir) else {
        result.config_error = true;
        result
            .errors
            .push(format!("No disperse configuration found in {}", dir.display()));
        return result;
    };
    result.config_path = Some(config_path.clone());

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            result.config_error = true;
            result.errors.push(format!("Configuration: {e}"));
            return result;
        }
    };

    let root = config_path.parent().unwrap_or(dir);
    let adapters = AdapterRegistry::new();
    let project = match Project::from_config(root, config, adapters.all()) {
        Ok(project) => project,
        Err(e) => {
            result.errors.push(format!("Manifest: {e}"));
            return result;
        }
    };

    match (&project.manifest.adapter, &project.manifest.not_located) {
        (None, _) => result
            .warnings
            .push("No Cargo.toml or pyproject.toml found; only tags carry the version".into()),
        (Some(adapter), Some(reason)) => result.warnings.push(format!(
            "{} manifest does not store the version literally: {reason}",
            adapter.name()
        )),
        _ => {}
    }

    if let Some(news) = &project.config.news_file {
        let path = project.path(news);
        if !path.exists() {
            result
                .errors
                .push(format!("News file {} does not exist", news.display()));
        } else if let Err(e) = NewsFile::new(path).validate() {
            result.errors.push(format!("News file: {e}"));
        }
    }

    for rule in &project.config.update_version {
        let path = project.path(&rule.path);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                result
                    .errors
                    .push(format!("update-version file {}: {e}", rule.path.display()));
                continue;
            }
        };
        // explicit patterns are only checked when applied
        if rule.match_pattern.is_some() {
            continue;
        }
        match reverse_version(&rule.new_line, &content) {
            None => result.warnings.push(format!(
                "update-version rule for {} matches no line",
                rule.path.display()
            )),
            Some((found, _)) => {
                if let Some(manifest) = &project.manifest.version {
                    if &found != manifest {
                        result.warnings.push(format!(
                            "{} has version {found}, manifest has {manifest}",
                            rule.path.display()
                        ));
                    }
                }
            }
        }
    }

    if !project.config.update_manpage.is_empty() && project.manpages().is_empty() {
        result
            .warnings
            .push("update-manpage patterns match no files".to_string());
    }

    if project.verify_command().is_none() {
        result
            .warnings
            .push("No verify command configured or detected".to_string());
    }

    result
}

impl ValidateCommand {
    /// Execute the validate command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        info!(path = %self.path.display(), strict = self.strict, "executing validate command");
        let dir = std::fs::canonicalize(&self.path)?;
        let mut validation = validate(&dir);

        if self.strict {
            let mut warnings = std::mem::take(&mut validation.warnings);
            validation.errors.append(&mut warnings);
        }
        let passed = validation.passed();

        match cli.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "valid": passed,
                    "config_path": validation.config_path,
                    "errors": validation.errors,
                    "warnings": validation.warnings,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    print_text(&validation);
                }
            }
        }

        Ok(if validation.config_error {
            exit_codes::CONFIG_ERROR
        } else if passed {
            exit_codes::SUCCESS
        } else {
            exit_codes::ERROR
        })
    }
}

fn print_text(validation: &Validation) {
    println!("{}", style("Validation Results").bold());
    println!();

    if let Some(path) = &validation.config_path {
        println!("Config: {}", style(path.display()).cyan());
        println!();
    }

    if !validation.errors.is_empty() {
        println!("{}", style("Errors:").red().bold());
        for error in &validation.errors {
            println!("  {} {}", style("✗").red(), error);
        }
        println!();
    }

    if !validation.warnings.is_empty() {
        println!("{}", style("Warnings:").yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", style("!").yellow(), warning);
        }
        println!();
    }

    if validation.passed() {
        if validation.warnings.is_empty() {
            println!("{}", style("✓ All checks passed").green().bold());
        } else {
            println!(
                "{} with {} warning(s)",
                style("✓ Validation passed").green().bold(),
                validation.warnings.len()
            );
        }
    } else {
        println!(
            "{} with {} error(s)",
            style("✗ Validation failed").red().bold(),
            validation.errors.len()
        );
    }
}

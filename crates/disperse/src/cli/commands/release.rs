//! Release command

use clap::{Args, ValueEnum};
use console::{style, Term};
use dialoguer::Confirm;
use tracing::{info, warn};

use disperse_core::{BumpLevel, ReleaseOptions, ReleaseReport, Version};

use crate::cli::runner::{Services, WorkTree};
use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

/// Release one or more projects
#[derive(Debug, Args)]
pub struct ReleaseCommand {
    /// Project directories or repository URLs (default: current directory)
    #[arg(value_name = "PATH-OR-URL")]
    pub targets: Vec<String>,

    /// Release exactly this version
    #[arg(long, conflicts_with = "bump")]
    pub new_version: Option<String>,

    /// Component to increase
    #[arg(long, value_enum)]
    pub bump: Option<Bump>,

    /// Do not wait for or check CI
    #[arg(long)]
    pub ignore_ci: bool,

    /// Only warn when the verify command fails
    #[arg(long)]
    pub ignore_verify_command: bool,

    /// Release even if the last commit is recent
    #[arg(long)]
    pub force: bool,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Bump {
    Major,
    Minor,
    Patch,
}

impl From<Bump> for BumpLevel {
    fn from(bump: Bump) -> Self {
        match bump {
            Bump::Major => BumpLevel::Major,
            Bump::Minor => BumpLevel::Minor,
            Bump::Patch => BumpLevel::Patch,
        }
    }
}

impl ReleaseCommand {
    fn options(&self, cli: &Cli) -> anyhow::Result<ReleaseOptions> {
        let new_version = self
            .new_version
            .as_deref()
            .map(str::parse::<Version>)
            .transpose()?;
        Ok(ReleaseOptions {
            dry_run: cli.dry_run,
            new_version,
            bump: self.bump.map(BumpLevel::from),
            ignore_ci: self.ignore_ci,
            ignore_verify_command: self.ignore_verify_command,
            force: self.force,
            now: None,
        })
    }

    fn interactive(&self, cli: &Cli) -> bool {
        !cli.dry_run && !self.yes && cli.format == OutputFormat::Text && Term::stdout().is_term()
    }

    /// Execute the release command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        info!(
            targets = ?self.targets,
            new_version = ?self.new_version,
            bump = ?self.bump,
            dry_run = cli.dry_run,
            ignore_ci = self.ignore_ci,
            force = self.force,
            "executing release command"
        );
        let options = self.options(cli)?;
        let services = Services::load()?;
        let targets = if self.targets.is_empty() {
            vec![".".to_string()]
        } else {
            self.targets.clone()
        };

        let runtime = tokio::runtime::Runtime::new()?;
        let mut code = exit_codes::SUCCESS;
        let mut reports = Vec::new();
        for target in &targets {
            match runtime.block_on(self.release_one(cli, &services, target, options.clone())) {
                Ok(Some(report)) => {
                    code = code.max(exit_codes::for_state(&report.state));
                    if cli.format == OutputFormat::Text && !cli.quiet {
                        output::report(&report);
                    }
                    reports.push(report);
                }
                Ok(None) => {
                    if !cli.quiet {
                        println!("{}", style("Cancelled.").yellow());
                    }
                    code = code.max(exit_codes::CANCELLED);
                }
                Err(e) => {
                    warn!(target = %target, error = %e, "release failed to start");
                    output::error(&format!("{target}: {e:#}"));
                    code = code.max(exit_codes::for_error(&e));
                }
            }
        }

        if cli.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Ok(code)
    }

    /// `None` when the operator declined the plan
    async fn release_one(
        &self,
        cli: &Cli,
        services: &Services,
        target: &str,
        options: ReleaseOptions,
    ) -> anyhow::Result<Option<ReleaseReport>> {
        let tree = WorkTree::open(target).await?;
        let project = services.load_project(&tree)?;

        if self.interactive(cli) {
            let preview = services
                .release(
                    &project,
                    tree.repo(),
                    ReleaseOptions {
                        dry_run: true,
                        ..options.clone()
                    },
                )
                .await?;
            let Some(plan) = &preview.plan else {
                // planning failed; nothing was touched
                return Ok(Some(preview));
            };
            output::plan(plan);
            for check in preview.gate.iter().filter(|g| g.is_failure()) {
                output::warning(&format!("{}: {}", check.check, check.reason));
            }
            let proceed = Confirm::new()
                .with_prompt(format!("Release {} {}?", plan.project, plan.next))
                .default(false)
                .interact()?;
            if !proceed {
                return Ok(None);
            }
        }

        Ok(Some(services.release(&project, tree.repo(), options).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("disperse").chain(args.iter().copied()))
    }

    #[test]
    fn test_options_from_flags() {
        let cli = parse(&["release", "--bump", "minor", "--ignore-ci", "--try", "-y"]);
        let crate::cli::Commands::Release(cmd) = &cli.command else {
            panic!("expected release");
        };
        let options = cmd.options(&cli).unwrap();
        assert!(options.dry_run);
        assert!(options.ignore_ci);
        assert_eq!(options.bump, Some(BumpLevel::Minor));
        assert!(!cmd.interactive(&cli));
    }

    #[test]
    fn test_explicit_version_must_parse() {
        let cli = parse(&["release", "--new-version", "not-a-version"]);
        let crate::cli::Commands::Release(cmd) = &cli.command else {
            panic!("expected release");
        };
        assert!(cmd.options(&cli).is_err());

        let cli = parse(&["release", "--new-version", "2.0.0", "a", "b"]);
        let crate::cli::Commands::Release(cmd) = &cli.command else {
            panic!("expected release");
        };
        assert_eq!(
            cmd.options(&cli).unwrap().new_version,
            Some("2.0.0".parse().unwrap())
        );
        assert_eq!(cmd.targets, vec!["a", "b"]);
    }

    #[test]
    fn test_bump_and_version_conflict() {
        let result = Cli::try_parse_from([
            "disperse",
            "release",
            "--bump",
            "major",
            "--new-version",
            "2.0.0",
        ]);
        assert!(result.is_err());
    }
}

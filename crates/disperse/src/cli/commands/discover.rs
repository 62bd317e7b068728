//! Discover command

use std::sync::Arc;

use clap::Args;
use futures::StreamExt;
use tracing::{info, warn};

use disperse_core::config::UserConfig;
use disperse_core::discovery::SourceFailure;
use disperse_core::traits::{ProjectRef, ProjectSource};
use disperse_core::{list_owned_projects, run_fleet, ReleaseOptions, StaticSource};
use disperse_stores::{CratesIoSource, PypiSource};

use crate::cli::runner::{project_info, FleetRunner, ProjectInfo, Services, WorkTree};
use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

/// Find owned projects and release every one that is due
#[derive(Debug, Args)]
pub struct DiscoverCommand {
    /// Print version information for each project instead of releasing
    #[arg(long, conflicts_with = "urls")]
    pub info: bool,

    /// Only print the repository of each discovered project
    #[arg(long)]
    pub urls: bool,

    /// PyPI user whose packages to include (repeatable)
    #[arg(long = "pypi-user", value_name = "USER")]
    pub pypi_users: Vec<String>,

    /// crates.io user whose crates to include
    #[arg(long, value_name = "USER")]
    pub crates_io_user: Option<String>,

    /// Projects processed concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl DiscoverCommand {
    fn sources(&self, user: &UserConfig) -> anyhow::Result<Vec<Arc<dyn ProjectSource>>> {
        let mut sources: Vec<Arc<dyn ProjectSource>> = Vec::new();
        if !user.repositories.owned.is_empty() {
            sources.push(Arc::new(StaticSource::from_locations(
                "config",
                &user.repositories.owned,
            )));
        }

        let pypi_users = if self.pypi_users.is_empty() {
            user.pypi.username.iter().cloned().collect()
        } else {
            self.pypi_users.clone()
        };
        for name in pypi_users {
            sources.push(Arc::new(PypiSource::new(name, user.retry.clone())?));
        }

        let crates_io_user = self
            .crates_io_user
            .clone()
            .or_else(|| user.crates_io.username.clone());
        if let Some(name) = crates_io_user {
            sources.push(Arc::new(CratesIoSource::new(name, user.retry.clone())?));
        }
        Ok(sources)
    }

    /// Execute the discover command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<u8> {
        info!(
            info = self.info,
            urls = self.urls,
            dry_run = cli.dry_run,
            jobs = ?self.jobs,
            "executing discover command"
        );
        let services = Services::load()?;
        let sources = self.sources(&services.user)?;
        if sources.is_empty() {
            output::warning(
                "No project sources configured; pass --pypi-user or --crates-io-user, \
                 or list repositories in the user configuration",
            );
            return Ok(exit_codes::SUCCESS);
        }

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli, &services, &sources))
    }

    async fn execute_async(
        &self,
        cli: &Cli,
        services: &Services,
        sources: &[Arc<dyn ProjectSource>],
    ) -> anyhow::Result<u8> {
        if self.urls {
            return self.print_urls(cli, sources).await;
        }
        if self.info {
            return self.print_info(cli, services, sources).await;
        }

        let runner = FleetRunner {
            services,
            options: ReleaseOptions {
                dry_run: cli.dry_run,
                ..Default::default()
            },
        };
        let jobs = self.jobs.unwrap_or(services.user.discover.jobs);
        let fleet = run_fleet(list_owned_projects(sources), &runner, jobs).await;

        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&fleet)?),
            OutputFormat::Text => {
                if !cli.quiet {
                    output::fleet(&fleet);
                }
            }
        }

        if fleet.failures() > 0 || !fleet.source_failures.is_empty() {
            Ok(exit_codes::ERROR)
        } else {
            Ok(exit_codes::SUCCESS)
        }
    }

    async fn collect(
        sources: &[Arc<dyn ProjectSource>],
    ) -> (Vec<ProjectRef>, Vec<SourceFailure>) {
        let mut projects = Vec::new();
        let mut failures = Vec::new();
        let mut stream = std::pin::pin!(list_owned_projects(sources));
        while let Some(item) = stream.next().await {
            match item {
                Ok(project) => projects.push(project),
                Err(failure) => {
                    output::warning(&format!(
                        "could not list projects from {}: {}",
                        failure.source, failure.reason
                    ));
                    failures.push(failure);
                }
            }
        }
        (projects, failures)
    }

    async fn print_urls(&self, cli: &Cli, sources: &[Arc<dyn ProjectSource>]) -> anyhow::Result<u8> {
        let (projects, failures) = Self::collect(sources).await;
        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&projects)?),
            OutputFormat::Text => {
                for project in &projects {
                    match &project.location {
                        Some(location) => println!("{location}"),
                        None => warn!(project = %project.name, "no repository known"),
                    }
                }
            }
        }
        Ok(if failures.is_empty() {
            exit_codes::SUCCESS
        } else {
            exit_codes::ERROR
        })
    }

    async fn print_info(
        &self,
        cli: &Cli,
        services: &Services,
        sources: &[Arc<dyn ProjectSource>],
    ) -> anyhow::Result<u8> {
        let (projects, failures) = Self::collect(sources).await;
        let mut infos = Vec::with_capacity(projects.len());
        for project in &projects {
            let info = match inspect(services, project).await {
                Ok(info) => info,
                Err(e) => ProjectInfo {
                    name: project.name.clone(),
                    problems: vec![e.to_string()],
                    ..Default::default()
                },
            };
            if cli.format == OutputFormat::Text && !cli.quiet {
                output::project_info(&info);
                println!();
            }
            infos.push(info);
        }
        if cli.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
        Ok(if failures.is_empty() {
            exit_codes::SUCCESS
        } else {
            exit_codes::ERROR
        })
    }
}

async fn inspect(services: &Services, project: &ProjectRef) -> disperse_core::Result<ProjectInfo> {
    let location = project.location.as_deref().ok_or_else(|| {
        disperse_core::DisperseError::other(format!("no repository known for {}", project.name))
    })?;
    let tree = WorkTree::open(location).await?;
    let loaded = services.load_project(&tree)?;
    project_info(&loaded, tree.repo())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn command(args: &[&str]) -> DiscoverCommand {
        let cli = Cli::parse_from(
            ["disperse", "discover"]
                .into_iter()
                .chain(args.iter().copied()),
        );
        match cli.command {
            crate::cli::Commands::Discover(cmd) => cmd,
            _ => panic!("expected discover"),
        }
    }

    #[test]
    fn test_sources_from_user_config() {
        let mut user = UserConfig::default();
        user.repositories.owned = vec!["https://github.com/o/a".into()];
        user.pypi.username = Some("jelmer".into());
        user.crates_io.username = Some("jelmer".into());

        let names: Vec<String> = command(&[])
            .sources(&user)
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["config", "pypi", "crates.io"]);
    }

    #[test]
    fn test_flags_override_user_config() {
        let mut user = UserConfig::default();
        user.pypi.username = Some("someone".into());

        let sources = command(&["--pypi-user", "a", "--pypi-user", "b"])
            .sources(&user)
            .unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|s| s.name() == "pypi"));

        assert!(command(&[]).sources(&UserConfig::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_info_for_local_projects() {
        let temp = crate::cli::runner::tests::released_crate();
        let location = temp.path().to_string_lossy().into_owned();
        let services = Services::with_user_config(UserConfig::default());
        let sources: Vec<Arc<dyn ProjectSource>> = vec![Arc::new(StaticSource::from_locations(
            "config",
            &[location],
        ))];

        let (projects, failures) = DiscoverCommand::collect(&sources).await;
        assert!(failures.is_empty());
        let info = inspect(&services, &projects[0]).await.unwrap();
        assert_eq!(info.current_version.as_deref(), Some("0.1.0"));
    }
}

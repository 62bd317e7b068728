//! Release state machine
//!
//! One attempt walks `Discovering → Planning → Gating → Mutating →
//! Verifying → Publishing → Tagging → Announcing → Done`. Publishing first
//! waits for CI to pass on the pushed release commit. Stages run
//! strictly in order; each either advances, records a non-fatal warning
//! on the report, or ends the attempt with a terminal state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{NewsFileError, Result};
use crate::news_file::NewsFile;
use crate::project::Project;
use crate::retry::{retry, RetryStrategyConfig};
use crate::tag::TagTemplate;
use crate::traits::{CiProvider, MilestoneTracker, ReleaseHost, TagCreation, Vcs};
use crate::types::{GateCheck, ReleasePlan, ReleaseReport, Stage, TerminalState};
use crate::version::{BumpLevel, Version};

use super::ci::wait_for_green;
use super::dispatch::PublisherDispatch;
use super::gate::{self, GateContext};
use super::inference::{infer_current, propose_next, NextVersionRequest};
use super::mutate;
use super::verify::run_command;

/// Per-invocation switches
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Plan and gate only; never touch the tree, run commands or publish
    pub dry_run: bool,
    pub new_version: Option<Version>,
    pub bump: Option<BumpLevel>,
    pub ignore_ci: bool,
    /// Run the verify command but only warn when it fails
    pub ignore_verify_command: bool,
    /// Release even inside the staleness window
    pub force: bool,
    /// Clock override, defaults to the current time
    pub now: Option<DateTime<Utc>>,
}

/// External systems one attempt talks to
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub vcs: &'a dyn Vcs,
    pub publishers: &'a PublisherDispatch,
    pub ci: Option<&'a dyn CiProvider>,
    pub host: Option<&'a dyn ReleaseHost>,
    pub milestones: Option<&'a dyn MilestoneTracker>,
    pub retry: &'a RetryStrategyConfig,
}

/// Drives one release attempt for one project
pub struct Orchestrator<'a> {
    project: &'a Project,
    deps: Collaborators<'a>,
    options: ReleaseOptions,
}

struct Planned {
    plan: ReleasePlan,
    news_pending: Option<bool>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(project: &'a Project, deps: Collaborators<'a>, options: ReleaseOptions) -> Self {
        Self {
            project,
            deps,
            options,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.options.now.unwrap_or_else(Utc::now)
    }

    /// Run the attempt to a terminal state, bounded by `release-timeout`.
    ///
    /// On timeout the working tree is left as far as mutation got.
    pub async fn run(&self) -> ReleaseReport {
        let mut report = ReleaseReport::new(&self.project.name);
        let limit = self.project.config.release_timeout;
        let outcome =
            tokio::time::timeout(Duration::from_secs(limit), self.drive(&mut report)).await;
        report.state = match outcome {
            Ok(state) => state,
            Err(_) => {
                let stage = report.stages.last().copied().unwrap_or(Stage::Discovering);
                warn!(project = %self.project.name, %stage, timeout_secs = limit, "release timed out");
                TerminalState::failed(stage, format!("timed out after {limit}s"))
            }
        };
        match &report.state {
            TerminalState::Failed { stage, reason } => {
                warn!(project = %report.project, %stage, reason = %reason, "release failed")
            }
            state => info!(
                project = %report.project,
                state = %state,
                version = ?report.version().map(|v| v.to_string()),
                warnings = report.warnings.len(),
                "release finished"
            ),
        }
        report
    }

    fn enter(&self, report: &mut ReleaseReport, stage: Stage) {
        info!(project = %self.project.name, %stage, "entering stage");
        report.stages.push(stage);
    }

    async fn drive(&self, report: &mut ReleaseReport) -> TerminalState {
        let project = self.project;
        let config = &project.config;
        let vcs = self.deps.vcs;

        self.enter(report, Stage::Discovering);
        if !project.root.is_dir() {
            return TerminalState::failed(
                Stage::Discovering,
                format!("{} is not a directory", project.root.display()),
            );
        }

        self.enter(report, Stage::Planning);
        let Planned { plan, news_pending } = match self.plan() {
            Ok(planned) => planned,
            Err(e) => return TerminalState::failed(Stage::Planning, e.to_string()),
        };
        info!(
            project = %project.name,
            current = %plan.current,
            next = %plan.next,
            tag = %plan.tag,
            files = plan.files_to_mutate.len(),
            dry_run = plan.dry_run,
            "release planned"
        );
        report.plan = Some(plan.clone());

        self.enter(report, Stage::Gating);
        let ctx = GateContext {
            config,
            vcs,
            ci: self.deps.ci,
            current_tag: plan.current_tag.as_deref(),
            news_pending,
            now: self.now(),
            ignore_ci: self.options.ignore_ci,
            force: self.options.force,
            retry: self.deps.retry,
        };
        report.gate = gate::evaluate(&ctx).await;
        if self.options.dry_run {
            return TerminalState::Aborted;
        }
        let failures: Vec<_> = report.gate.iter().filter(|r| r.is_failure()).collect();
        if !failures.is_empty() {
            if failures
                .iter()
                .all(|r| r.check == GateCheck::UnreleasedChanges)
            {
                return TerminalState::NothingToRelease;
            }
            let reasons: Vec<String> = failures
                .iter()
                .map(|r| format!("{}: {}", r.check, r.reason))
                .collect();
            return TerminalState::failed(Stage::Gating, reasons.join("; "));
        }

        self.enter(report, Stage::Mutating);
        let notes = match mutate::apply(project, &plan.next, self.now().date_naive()) {
            Ok(mutation) => {
                report.warnings.extend(mutation.warnings);
                mutation.notes
            }
            Err(e) => return TerminalState::failed(Stage::Mutating, e.to_string()),
        };
        if let Some(command) = project.refresh_command() {
            if let Err(e) = run_command(&command, &project.root).await {
                return TerminalState::failed(Stage::Mutating, e.to_string());
            }
        }
        if let Err(e) = vcs.commit_all(&format!("Release {}.", plan.next)) {
            return TerminalState::failed(Stage::Mutating, e.to_string());
        }

        self.enter(report, Stage::Verifying);
        if let Some(command) = &config.pre_dist_command {
            if let Err(e) = run_command(command, &project.root).await {
                return TerminalState::failed(Stage::Verifying, e.to_string());
            }
        }
        if let Some(command) = project.verify_command() {
            if let Err(e) = run_command(&command, &project.root).await {
                if !self.options.ignore_verify_command {
                    return TerminalState::failed(Stage::Verifying, e.to_string());
                }
                report.warn(format!("ignored: {e}"));
            }
        }

        self.enter(report, Stage::Publishing);
        if let Err(reason) = self.await_release_ci().await {
            return TerminalState::failed(Stage::Publishing, reason);
        }
        let publishers = self.deps.publishers;
        let outcome = publishers
            .publish(plan.ecosystem, &project.root, config)
            .await;
        report.publish.push(outcome.clone());
        if outcome.is_failure() {
            if config.is_primary(outcome.registry()) {
                return TerminalState::failed(Stage::Publishing, outcome.to_string());
            }
            report.warn(outcome.to_string());
        }
        for outcome in publishers
            .upload_tarballs(plan.ecosystem, &project.root, config)
            .await
        {
            if outcome.is_failure() {
                report.warn(outcome.to_string());
            }
            report.publish.push(outcome);
        }

        self.enter(report, Stage::Tagging);
        match vcs.create_tag(&plan.tag, &format!("Release {}", plan.next)) {
            Ok(TagCreation::Created) => info!(tag = %plan.tag, "created tag"),
            Ok(TagCreation::AlreadyPresent) => info!(tag = %plan.tag, "tag already at HEAD"),
            Err(e) => return TerminalState::failed(Stage::Tagging, e.to_string()),
        }
        if let Err(e) = vcs.push(std::slice::from_ref(&plan.tag)) {
            return TerminalState::failed(Stage::Tagging, e.to_string());
        }

        self.enter(report, Stage::Announcing);
        self.announce(report, &plan, notes.as_deref()).await;
        self.start_next_cycle(report, &plan).await;

        report.stages.push(Stage::Done);
        TerminalState::Done
    }

    fn plan(&self) -> Result<Planned> {
        let project = self.project;
        let config = &project.config;
        let template = TagTemplate::new(&config.tag_name)?;
        let tags = self.deps.vcs.tags()?;
        let current = infer_current(&tags, &template, project.manifest.version.as_ref())?;

        let (pending, news_pending) = match &config.news_file {
            Some(path) => match NewsFile::new(project.path(path)).find_pending() {
                Ok(pending) => (pending, Some(true)),
                Err(NewsFileError::NoUnreleasedChanges(_)) => (None, Some(false)),
                Err(e) => return Err(e.into()),
            },
            None => (None, None),
        };

        // An explicit version or bump outranks the news file; mutation then
        // renames the pending entry.
        let request = NextVersionRequest {
            explicit: self.options.new_version.clone(),
            level: self.options.bump,
            pending,
        };
        let next = propose_next(&current.version, &request)?;

        let plan = ReleasePlan {
            project: project.name.clone(),
            ecosystem: project.ecosystem(),
            current: current.version,
            current_tag: current.tag,
            tag: template.expand(&next),
            next,
            files_to_mutate: mutate::files_to_mutate(project),
            dry_run: self.options.dry_run,
        };
        Ok(Planned { plan, news_pending })
    }

    /// Push the release commit and wait for CI to pass on it
    async fn await_release_ci(&self) -> std::result::Result<(), String> {
        let Some(ci) = self.deps.ci else {
            return Ok(());
        };
        let config = &self.project.config;
        if self.options.ignore_ci || config.is_check_disabled(GateCheck::Ci) {
            return Ok(());
        }
        let vcs = self.deps.vcs;
        vcs.push(&[]).map_err(|e| e.to_string())?;
        let revision = vcs.head_revision().map_err(|e| e.to_string())?;
        wait_for_green(ci, &revision, config, self.deps.retry)
            .await
            .map_err(|e| e.to_string())?;
        info!(provider = ci.name(), revision = %revision, "CI passed on release commit");
        Ok(())
    }

    async fn announce(&self, report: &mut ReleaseReport, plan: &ReleasePlan, notes: Option<&str>) {
        if let Some(host) = self.deps.host {
            let created = retry(self.deps.retry, "create release", || {
                host.create_release(&plan.tag, &plan.next, notes)
            })
            .await;
            match created {
                Ok(url) => info!(host = host.name(), url = %url, "created release entry"),
                Err(e) => report.warn(format!("{}: release entry not created: {e}", host.name())),
            }
        }
        if let Some(tracker) = self.deps.milestones {
            let released = retry(self.deps.retry, "release milestone", || {
                tracker.ensure_release(&plan.next, notes)
            })
            .await;
            match released {
                Ok(()) => info!(tracker = tracker.name(), version = %plan.next, "marked milestone released"),
                Err(e) => report.warn(format!("{}: milestone not released: {e}", tracker.name())),
            }
        }
    }

    /// Open the next development cycle: pending news entry and milestone
    async fn start_next_cycle(&self, report: &mut ReleaseReport, plan: &ReleasePlan) {
        let upcoming = match plan.next.increase(BumpLevel::Patch) {
            Ok(v) => v,
            Err(e) => {
                report.warn(format!("next development version unknown: {e}"));
                return;
            }
        };

        if let Some(news) = &self.project.config.news_file {
            let news_file = NewsFile::new(self.project.path(news));
            let opened = news_file
                .add_pending(&upcoming)
                .map_err(crate::DisperseError::from)
                .and_then(|()| self.deps.vcs.commit_all(&format!("Start on {upcoming}")))
                .and_then(|_| self.deps.vcs.push(&[]));
            if let Err(e) = opened {
                report.warn(format!("unable to start on {upcoming}: {e}"));
            }
        }

        if let Some(tracker) = self.deps.milestones {
            let created = retry(self.deps.retry, "create milestone", || {
                tracker.create_milestone(&upcoming)
            })
            .await;
            if let Err(e) = created {
                report.warn(format!("{}: milestone {upcoming} not created: {e}", tracker.name()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProjectConfig, UpdateVersionRule};
    use crate::project::tests::{adapters, MarkerAdapter};
    use crate::traits::CiStatus;
    use crate::types::{Ecosystem, GateStatus, PublishOutcome};
    use crate::workflow::testing::{commit, FakeCi, FakeHost, FakePublisher, FakeVcs};
    use std::sync::Arc;

    const NEWS: &str = "1.2.4\tUNRELEASED\n\n * Fix a crash.\n\n1.2.3\t2024-01-01\n\n * Initial.\n";

    struct Fixture {
        vcs: FakeVcs,
        publishers: PublisherDispatch,
        ci: FakeCi,
        host: FakeHost,
        retry: RetryStrategyConfig,
    }

    impl Fixture {
        fn new(ci: CiStatus) -> Self {
            let vcs = FakeVcs::new();
            vcs.write("cargo", "version = 1.2.3\n");
            vcs.write("NEWS", NEWS);
            vcs.write("version.txt", "VERSION = '1.2.3'\n");
            vcs.add_commit(commit("Fix a crash", &["src/lib.rs"], 10));
            Self {
                vcs,
                publishers: PublisherDispatch::new()
                    .with(Arc::new(FakePublisher::new(Ecosystem::Rust, false))),
                ci: FakeCi::new(ci),
                host: FakeHost::default(),
                retry: RetryStrategyConfig::immediate(2),
            }
        }

        fn config(&self) -> ProjectConfig {
            ProjectConfig {
                tag_name: "proj-$VERSION".to_string(),
                news_file: Some("NEWS".into()),
                update_version: vec![UpdateVersionRule {
                    path: "version.txt".into(),
                    match_pattern: None,
                    new_line: "VERSION = '$VERSION'".to_string(),
                }],
                verify_command: Some("true".to_string()),
                ..Default::default()
            }
        }

        fn project(&self, config: ProjectConfig) -> Project {
            Project::from_config(self.vcs.root(), config, &adapters()).unwrap()
        }

        async fn run(&self, project: &Project, options: ReleaseOptions) -> ReleaseReport {
            let deps = Collaborators {
                vcs: &self.vcs,
                publishers: &self.publishers,
                ci: Some(&self.ci),
                host: Some(&self.host),
                milestones: Some(&self.host),
                retry: &self.retry,
            };
            let options = ReleaseOptions {
                now: Some(self.vcs.now()),
                ..options
            };
            Orchestrator::new(project, deps, options).run().await
        }
    }

    #[tokio::test]
    async fn test_full_release() {
        let fx = Fixture::new(CiStatus::Passing);
        let project = fx.project(fx.config());
        let report = fx.run(&project, ReleaseOptions::default()).await;

        assert_eq!(report.state, TerminalState::Done, "{:?}", report);
        assert_eq!(report.version().unwrap().to_string(), "1.2.4");
        assert_eq!(fx.vcs.read("cargo"), "version = 1.2.4\n");
        assert_eq!(fx.vcs.read("version.txt"), "VERSION = '1.2.4'\n");
        assert!(fx.vcs.read("NEWS").starts_with("1.2.5\tUNRELEASED\n\n1.2.4\t2024-03-01\n"));
        assert_eq!(fx.vcs.tag_names(), vec!["proj-1.2.4"]);
        assert_eq!(fx.vcs.messages(), vec!["Release 1.2.4.", "Start on 1.2.5"]);
        assert!(fx.vcs.pushed().contains(&"proj-1.2.4".to_string()));
        assert_eq!(
            report.publish,
            vec![PublishOutcome::Succeeded {
                registry: "crates.io".into()
            }]
        );
        assert_eq!(
            *fx.host.releases.lock().unwrap(),
            vec!["proj-1.2.4".to_string(), "1.2.4".to_string()]
        );
        assert_eq!(*fx.host.milestones.lock().unwrap(), vec!["1.2.5".to_string()]);
        assert_eq!(report.stages.last(), Some(&Stage::Done));
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_pending_ci_fails_live_run() {
        let fx = Fixture::new(CiStatus::Pending("2 checks running".into()));
        let project = fx.project(fx.config());
        let report = fx.run(&project, ReleaseOptions::default()).await;

        match &report.state {
            TerminalState::Failed { stage, reason } => {
                assert_eq!(*stage, Stage::Gating);
                assert!(reason.contains("CI not passing"), "{reason}");
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(fx.vcs.read("cargo"), "version = 1.2.3\n");
        assert!(fx.vcs.tag_names().is_empty());
    }

    #[tokio::test]
    async fn test_pending_ci_dry_run_aborts_with_plan() {
        let fx = Fixture::new(CiStatus::Pending("2 checks running".into()));
        let project = fx.project(fx.config());
        let options = ReleaseOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = fx.run(&project, options).await;

        assert_eq!(report.state, TerminalState::Aborted);
        let plan = report.plan.as_ref().unwrap();
        assert!(plan.dry_run);
        assert_eq!(plan.tag, "proj-1.2.4");
        let ci = report.gate.iter().find(|r| r.check == GateCheck::Ci).unwrap();
        assert_eq!(ci.status, GateStatus::Fail);
        assert!(ci.reason.starts_with("CI not passing"));
        assert_eq!(fx.ci.calls(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_tree_and_tags_alone() {
        let fx = Fixture::new(CiStatus::Passing);
        let project = fx.project(fx.config());
        let options = ReleaseOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = fx.run(&project, options).await;

        assert_eq!(report.state, TerminalState::Aborted);
        assert_eq!(fx.vcs.read("cargo"), "version = 1.2.3\n");
        assert_eq!(fx.vcs.read("NEWS"), NEWS);
        assert_eq!(fx.vcs.read("version.txt"), "VERSION = '1.2.3'\n");
        assert!(fx.vcs.tag_names().is_empty());
        assert!(fx.vcs.messages().is_empty());
        assert!(report.publish.is_empty());
        assert!(!report.stages.contains(&Stage::Mutating));
    }

    #[tokio::test]
    async fn test_verify_failure_keeps_mutation() {
        let fx = Fixture::new(CiStatus::Passing);
        let config = ProjectConfig {
            verify_command: Some("exit 1".to_string()),
            ..fx.config()
        };
        let project = fx.project(config);
        let report = fx.run(&project, ReleaseOptions::default()).await;

        assert!(matches!(
            report.state,
            TerminalState::Failed {
                stage: Stage::Verifying,
                ..
            }
        ));
        assert!(report.publish.is_empty());
        assert_eq!(fx.vcs.read("cargo"), "version = 1.2.4\n");
        assert_eq!(fx.vcs.read("version.txt"), "VERSION = '1.2.4'\n");
        assert!(fx.vcs.tag_names().is_empty());
    }

    #[tokio::test]
    async fn test_ignored_verify_failure_is_warning() {
        let fx = Fixture::new(CiStatus::Passing);
        let config = ProjectConfig {
            verify_command: Some("exit 1".to_string()),
            ..fx.config()
        };
        let project = fx.project(config);
        let options = ReleaseOptions {
            ignore_verify_command: true,
            ..Default::default()
        };
        let report = fx.run(&project, options).await;
        assert_eq!(report.state, TerminalState::Done);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_tag_conflict_never_moves_tag() {
        let fx = Fixture::new(CiStatus::Passing);
        fx.vcs.race_tag("proj-1.2.4");
        let project = fx.project(fx.config());
        let report = fx.run(&project, ReleaseOptions::default()).await;

        match &report.state {
            TerminalState::Failed { stage, reason } => {
                assert_eq!(*stage, Stage::Tagging);
                assert!(reason.contains("proj-1.2.4"), "{reason}");
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(fx.vcs.tag_target("proj-1.2.4").as_deref(), Some("rev-elsewhere"));
        assert!(fx.host.releases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_release() {
        let fx = Fixture::new(CiStatus::Passing);
        fx.vcs.write("NEWS", "1.2.3\t2024-01-01\n\n * Initial.\n");
        fx.vcs.add_tag("proj-1.2.3", "rev-0");
        let project = fx.project(fx.config());
        let report = fx.run(&project, ReleaseOptions::default()).await;
        assert_eq!(report.state, TerminalState::NothingToRelease);
        assert!(!report.state.is_failure());
    }

    #[tokio::test]
    async fn test_version_mismatch_fails_planning() {
        let fx = Fixture::new(CiStatus::Passing);
        fx.vcs.add_tag("proj-1.2.4", "rev-0");
        let project = fx.project(fx.config());
        let report = fx.run(&project, ReleaseOptions::default()).await;
        assert!(matches!(
            report.state,
            TerminalState::Failed {
                stage: Stage::Planning,
                ..
            }
        ));
        assert!(report.plan.is_none());
    }

    #[tokio::test]
    async fn test_explicit_version_outranks_news() {
        let fx = Fixture::new(CiStatus::Passing);
        let project = fx.project(fx.config());
        let options = ReleaseOptions {
            new_version: Some("2.0.0".parse().unwrap()),
            ..Default::default()
        };
        let report = fx.run(&project, options).await;

        assert_eq!(report.state, TerminalState::Done, "{:?}", report);
        assert_eq!(report.version().unwrap().to_string(), "2.0.0");
        assert_eq!(fx.vcs.tag_names(), vec!["proj-2.0.0"]);
        assert_eq!(report.warnings, vec!["news entry 1.2.4 released as 2.0.0"]);
        assert!(fx
            .vcs
            .read("NEWS")
            .starts_with("2.0.1\tUNRELEASED\n\n2.0.0\t2024-03-01\n\n * Fix a crash.\n"));
    }

    #[tokio::test]
    async fn test_bump_outranks_pending_news_version() {
        let fx = Fixture::new(CiStatus::Passing);
        let project = fx.project(fx.config());
        let options = ReleaseOptions {
            bump: Some(BumpLevel::Minor),
            dry_run: true,
            ..Default::default()
        };
        let report = fx.run(&project, options).await;
        assert_eq!(report.plan.as_ref().unwrap().next.to_string(), "1.3.0");

        let options = ReleaseOptions {
            bump: Some(BumpLevel::Minor),
            ..Default::default()
        };
        let report = fx.run(&project, options).await;
        assert_eq!(report.state, TerminalState::Done, "{:?}", report);
        assert_eq!(fx.vcs.read("cargo"), "version = 1.3.0\n");
        assert_eq!(report.warnings, vec!["news entry 1.2.4 released as 1.3.0"]);
    }

    #[tokio::test]
    async fn test_publishing_waits_for_ci_on_release_commit() {
        let mut fx = Fixture::new(CiStatus::Passing);
        fx.ci = FakeCi::new(CiStatus::Passing).script(
            "rev-2",
            vec![CiStatus::Pending("build queued".into()), CiStatus::Passing],
        );
        let config = ProjectConfig {
            ci_poll_interval: 1,
            ..fx.config()
        };
        let project = fx.project(config);
        let report = fx.run(&project, ReleaseOptions::default()).await;

        assert_eq!(report.state, TerminalState::Done, "{:?}", report);
        assert_eq!(fx.ci.queried(), vec!["main", "rev-2", "rev-2"]);
        assert_eq!(fx.vcs.pushed()[0], "HEAD");
    }

    #[tokio::test]
    async fn test_failing_release_ci_blocks_publishing() {
        let mut fx = Fixture::new(CiStatus::Passing);
        fx.ci = FakeCi::new(CiStatus::Passing)
            .script("rev-2", vec![CiStatus::Failing("test failure".into())]);
        let project = fx.project(fx.config());
        let report = fx.run(&project, ReleaseOptions::default()).await;

        match &report.state {
            TerminalState::Failed { stage, reason } => {
                assert_eq!(*stage, Stage::Publishing);
                assert!(reason.contains("test failure"), "{reason}");
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert!(report.publish.is_empty());
        assert!(fx.vcs.tag_names().is_empty());
    }

    #[tokio::test]
    async fn test_ignore_ci_skips_every_ci_query() {
        let fx = Fixture::new(CiStatus::Failing("red".into()));
        let project = fx.project(fx.config());
        let options = ReleaseOptions {
            ignore_ci: true,
            ..Default::default()
        };
        let report = fx.run(&project, options).await;
        assert_eq!(report.state, TerminalState::Done, "{:?}", report);
        assert_eq!(fx.ci.calls(), 0);
    }

    #[tokio::test]
    async fn test_tarballs_copied_after_publish() {
        let mut fx = Fixture::new(CiStatus::Passing);
        fx.publishers = PublisherDispatch::new()
            .with(Arc::new(FakePublisher::new(Ecosystem::Rust, false)))
            .with_tarball_program("cp");
        let destination = tempfile::TempDir::new().unwrap();
        let missing = destination.path().join("missing").join("dir");
        let config = ProjectConfig {
            tarball_location: vec![
                destination.path().display().to_string(),
                missing.display().to_string(),
            ],
            ..fx.config()
        };
        let project = fx.project(config);
        let report = fx.run(&project, ReleaseOptions::default()).await;

        assert_eq!(report.state, TerminalState::Done, "{:?}", report);
        assert_eq!(report.publish.len(), 3);
        assert!(destination.path().join("proj.tar.gz").exists());
        assert!(report.publish[2].is_failure());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(fx.vcs.tag_names(), vec!["proj-1.2.4"]);
    }

    #[tokio::test]
    async fn test_manifest_refresh_runs_before_commit() {
        let fx = Fixture::new(CiStatus::Passing);
        let refreshing: Vec<Arc<dyn crate::traits::ManifestAdapter>> = vec![Arc::new(MarkerAdapter {
            marker: "cargo",
            ecosystem: Ecosystem::Rust,
            refresh: Some("echo refreshed > cargo.lock"),
        })];
        let project = Project::from_config(fx.vcs.root(), fx.config(), &refreshing).unwrap();
        let report = fx.run(&project, ReleaseOptions::default()).await;
        assert_eq!(report.state, TerminalState::Done, "{:?}", report);
        assert_eq!(fx.vcs.read("cargo.lock"), "refreshed\n");
    }

    #[tokio::test]
    async fn test_manifest_refresh_is_bounded_by_release_timeout() {
        let fx = Fixture::new(CiStatus::Passing);
        let refreshing: Vec<Arc<dyn crate::traits::ManifestAdapter>> = vec![Arc::new(MarkerAdapter {
            marker: "cargo",
            ecosystem: Ecosystem::Rust,
            refresh: Some("sleep 5"),
        })];
        let config = ProjectConfig {
            release_timeout: 1,
            ..fx.config()
        };
        let project = Project::from_config(fx.vcs.root(), config, &refreshing).unwrap();
        let report = fx.run(&project, ReleaseOptions::default()).await;
        match &report.state {
            TerminalState::Failed { stage, reason } => {
                assert_eq!(*stage, Stage::Mutating);
                assert!(reason.contains("timed out"), "{reason}");
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert!(fx.vcs.messages().is_empty());
    }

    #[tokio::test]
    async fn test_secondary_registry_failure_still_tags() {
        let mut fx = Fixture::new(CiStatus::Passing);
        fx.publishers =
            PublisherDispatch::new().with(Arc::new(FakePublisher::new(Ecosystem::Rust, true)));
        let project = fx.project(fx.config());
        let report = fx.run(&project, ReleaseOptions::default()).await;

        assert_eq!(report.state, TerminalState::Done);
        assert!(report.publish[0].is_failure());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(fx.vcs.tag_names(), vec!["proj-1.2.4"]);
    }

    #[tokio::test]
    async fn test_primary_registry_failure_blocks_tagging() {
        let mut fx = Fixture::new(CiStatus::Passing);
        fx.publishers =
            PublisherDispatch::new().with(Arc::new(FakePublisher::new(Ecosystem::Rust, true)));
        let config = ProjectConfig {
            primary_registry: Some("crates.io".to_string()),
            ..fx.config()
        };
        let project = fx.project(config);
        let report = fx.run(&project, ReleaseOptions::default()).await;

        assert!(matches!(
            report.state,
            TerminalState::Failed {
                stage: Stage::Publishing,
                ..
            }
        ));
        assert!(fx.vcs.tag_names().is_empty());
    }

    #[tokio::test]
    async fn test_announce_failure_is_warning() {
        let mut fx = Fixture::new(CiStatus::Passing);
        fx.host.fail = true;
        let project = fx.project(fx.config());
        let report = fx.run(&project, ReleaseOptions::default()).await;

        assert_eq!(report.state, TerminalState::Done);
        assert_eq!(report.warnings.len(), 2, "{:?}", report.warnings);
        assert_eq!(fx.vcs.tag_names(), vec!["proj-1.2.4"]);
    }

    #[tokio::test]
    async fn test_release_timeout() {
        let fx = Fixture::new(CiStatus::Passing);
        let config = ProjectConfig {
            verify_command: Some("sleep 5".to_string()),
            release_timeout: 1,
            ..fx.config()
        };
        let project = fx.project(config);
        let report = fx.run(&project, ReleaseOptions::default()).await;

        match &report.state {
            TerminalState::Failed { stage, reason } => {
                assert_eq!(*stage, Stage::Verifying);
                assert!(reason.contains("timed out"), "{reason}");
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(fx.vcs.read("cargo"), "version = 1.2.4\n");
    }
}

//! Pre-flight gate
//!
//! Every check is evaluated, even after one fails, so a single report
//! shows all blocking conditions.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::retry::{retry, RetryStrategyConfig};
use crate::traits::{CiProvider, CiStatus, CommitSummary, Vcs};
use crate::types::{GateCheck, GateResult};

/// Inputs to the gate for one release attempt
pub struct GateContext<'a> {
    pub config: &'a ProjectConfig,
    pub vcs: &'a dyn Vcs,
    pub ci: Option<&'a dyn CiProvider>,
    /// Tag of the release being compared against
    pub current_tag: Option<&'a str>,
    /// Whether the news file has an unreleased entry; `None` without a news file
    pub news_pending: Option<bool>,
    pub now: DateTime<Utc>,
    pub ignore_ci: bool,
    /// Release even inside the staleness window
    pub force: bool,
    pub retry: &'a RetryStrategyConfig,
}

/// Evaluate all checks in order
pub async fn evaluate(ctx: &GateContext<'_>) -> Vec<GateResult> {
    let mut results = Vec::with_capacity(GateCheck::ALL.len());
    for check in GateCheck::ALL {
        let result = if ctx.config.is_check_disabled(check) {
            GateResult::skip(check, "disabled in configuration")
        } else {
            match check {
                GateCheck::Ci => check_ci(ctx).await,
                GateCheck::Staleness => check_staleness(ctx),
                GateCheck::UnreleasedChanges => check_unreleased_changes(ctx),
                GateCheck::CleanTree => check_clean_tree(ctx),
            }
        };
        debug!(check = %check, status = ?result.status, reason = %result.reason, "gate check");
        results.push(result);
    }
    let failures = results.iter().filter(|r| r.is_failure()).count();
    info!(checks = results.len(), failures, "gate evaluated");
    results
}

async fn check_ci(ctx: &GateContext<'_>) -> GateResult {
    let check = GateCheck::Ci;
    if ctx.ignore_ci {
        return GateResult::skip(check, "ignored on request");
    }
    let Some(ci) = ctx.ci else {
        return GateResult::skip(check, "no CI provider configured");
    };
    let timeout = Duration::from_secs(ctx.config.ci_timeout);
    let query = async {
        let reference = match ctx.config.github.as_ref().and_then(|g| g.branch.clone()) {
            Some(branch) => branch,
            None => retry(ctx.retry, "default branch", || ci.default_branch()).await?,
        };
        let status = retry(ctx.retry, "ci status", || ci.status(&reference)).await?;
        Ok::<_, crate::error::RemoteError>((reference, status))
    };
    let (reference, status) = match tokio::time::timeout(timeout, query).await {
        Ok(Ok(answer)) => answer,
        Ok(Err(e)) => {
            warn!(provider = ci.name(), error = %e, "unable to check CI status");
            return GateResult::fail(check, format!("CI not passing: {e}"));
        }
        Err(_) => {
            return GateResult::fail(
                check,
                format!("CI not passing: no answer within {}s", ctx.config.ci_timeout),
            )
        }
    };
    match status {
        CiStatus::Passing => GateResult::pass(check, format!("{} green on {reference}", ci.name())),
        CiStatus::Failing(detail) => {
            GateResult::fail(check, format!("CI not passing: failed ({detail})"))
        }
        CiStatus::Pending(detail) => {
            GateResult::fail(check, format!("CI not passing: pending ({detail})"))
        }
        CiStatus::Unknown => GateResult::fail(check, "CI not passing: status unknown"),
    }
}

fn check_staleness(ctx: &GateContext<'_>) -> GateResult {
    let check = GateCheck::Staleness;
    let Some(days) = ctx.config.timeout_days else {
        return GateResult::skip(check, "no staleness window configured");
    };
    if ctx.force {
        return GateResult::skip(check, "forced");
    }
    match ctx.vcs.last_commit_time() {
        Ok(Some(time)) => {
            let age = ctx.now.signed_duration_since(time);
            let window = chrono::Duration::days(i64::from(days));
            if age < window {
                GateResult::fail(
                    check,
                    format!(
                        "last commit is {} days old, waiting for {days} days without commits",
                        age.num_days()
                    ),
                )
            } else {
                GateResult::pass(check, format!("last commit is {} days old", age.num_days()))
            }
        }
        Ok(None) => GateResult::pass(check, "no commits"),
        Err(e) => GateResult::fail(check, format!("unable to read commit history: {e}")),
    }
}

/// Commits that only bump release metadata do not count as changes
pub fn is_metadata_commit(commit: &CommitSummary, news_file: Option<&Path>) -> bool {
    let subject = commit.message.lines().next().unwrap_or_default();
    if subject.starts_with("Release ") || subject.starts_with("Start on ") {
        return true;
    }
    match news_file {
        Some(news) => !commit.paths.is_empty() && commit.paths.iter().all(|p| p == news),
        None => false,
    }
}

fn check_unreleased_changes(ctx: &GateContext<'_>) -> GateResult {
    let check = GateCheck::UnreleasedChanges;
    if ctx.news_pending == Some(false) {
        return GateResult::fail(check, "news file has no unreleased entry");
    }
    let Some(tag) = ctx.current_tag else {
        return GateResult::pass(check, "no previous release tag");
    };
    match ctx.vcs.commits_since(Some(tag)) {
        Ok(commits) => {
            let news = ctx.config.news_file.as_deref();
            let changes = commits
                .iter()
                .filter(|c| !is_metadata_commit(c, news))
                .count();
            if changes == 0 {
                GateResult::fail(check, format!("no unreleased changes since {tag}"))
            } else {
                GateResult::pass(check, format!("{changes} commits since {tag}"))
            }
        }
        Err(e) => GateResult::fail(check, format!("unable to read commits since {tag}: {e}")),
    }
}

fn check_clean_tree(ctx: &GateContext<'_>) -> GateResult {
    let check = GateCheck::CleanTree;
    match ctx.vcs.is_clean() {
        Ok(true) => GateResult::pass(check, "working tree is clean"),
        Ok(false) => GateResult::fail(check, "working tree has uncommitted changes"),
        Err(e) => GateResult::fail(check, format!("unable to read working tree status: {e}")),
    }
}

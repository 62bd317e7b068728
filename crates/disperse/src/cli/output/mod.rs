//! Output formatting utilities

use console::{style, Style};

use disperse_core::discovery::FleetOutcome;
use disperse_core::types::{GateStatus, PublishOutcome};
use disperse_core::{FleetReport, ReleasePlan, ReleaseReport, TerminalState};

use crate::cli::runner::ProjectInfo;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

/// Create a styled header
pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// Create a styled key-value line
pub fn key_value(key: &str, value: &str) -> String {
    format!("  {}: {}", style(key).dim(), value)
}

/// Style for version numbers
pub fn version_style() -> Style {
    Style::new().green().bold()
}

/// Style for tags
pub fn tag_style() -> Style {
    Style::new().yellow()
}

/// Style for paths
pub fn path_style() -> Style {
    Style::new().cyan()
}

/// Print what a release would do
pub fn plan(plan: &ReleasePlan) {
    println!("{}", header(&format!("Release plan for {}", plan.project)));
    if let Some(ecosystem) = plan.ecosystem {
        println!("{}", key_value("Ecosystem", ecosystem.as_str()));
    }
    println!(
        "{}",
        key_value(
            "Current",
            &format!(
                "{}{}",
                plan.current,
                plan.current_tag
                    .as_ref()
                    .map(|t| format!(" ({t})"))
                    .unwrap_or_default()
            )
        )
    );
    println!(
        "{}",
        key_value("Next", &version_style().apply_to(&plan.next).to_string())
    );
    println!(
        "{}",
        key_value("Tag", &tag_style().apply_to(&plan.tag).to_string())
    );
    if !plan.files_to_mutate.is_empty() {
        println!("  {}:", style("Files").dim());
        for file in &plan.files_to_mutate {
            println!("    {}", path_style().apply_to(file.display()));
        }
    }
}

/// Print a finished release attempt
pub fn report(report: &ReleaseReport) {
    if let Some(p) = &report.plan {
        plan(p);
    } else {
        println!("{}", header(&report.project));
    }

    if !report.gate.is_empty() {
        println!("  {}:", style("Checks").dim());
        for result in &report.gate {
            let mark = match result.status {
                GateStatus::Pass => style("✓").green(),
                GateStatus::Fail => style("✗").red(),
                GateStatus::Skip => style("-").dim(),
            };
            println!("    {} {}: {}", mark, result.check, result.reason);
        }
    }

    if !report.publish.is_empty() {
        println!("  {}:", style("Publish").dim());
        for outcome in &report.publish {
            let mark = match outcome {
                PublishOutcome::Succeeded { .. } => style("✓").green(),
                PublishOutcome::Failed { .. } => style("✗").red(),
                PublishOutcome::Skipped { .. } => style("-").dim(),
            };
            println!("    {} {}", mark, outcome);
        }
    }

    for w in &report.warnings {
        warning(w);
    }

    let summary = format!("{}: {}", report.project, report.state);
    match &report.state {
        TerminalState::Done => success(&summary),
        TerminalState::Failed { .. } => error(&summary),
        TerminalState::NothingToRelease | TerminalState::Aborted => info(&summary),
    }
}

/// Print version information for one project
pub fn project_info(info: &ProjectInfo) {
    let unknown = || style("unknown").dim().to_string();
    println!("{}", header(&info.name));
    if let Some(ecosystem) = &info.ecosystem {
        println!("{}", key_value("Ecosystem", ecosystem));
    }
    if !info.registries.is_empty() {
        println!("{}", key_value("Registries", &info.registries.join(", ")));
    }
    if let Some(repository) = &info.repository {
        println!("{}", key_value("Repository", repository));
    }
    println!(
        "{}",
        key_value(
            "Current version",
            &info
                .current_version
                .as_ref()
                .map(|v| version_style().apply_to(v).to_string())
                .unwrap_or_else(unknown)
        )
    );
    println!(
        "{}",
        key_value(
            "Last tag",
            &info
                .last_tag
                .as_ref()
                .map(|t| tag_style().apply_to(t).to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    );
    if let Some(manifest) = &info.manifest_version {
        println!("{}", key_value("Manifest version", manifest));
    }
    if let Some(pending) = &info.pending_version {
        println!("{}", key_value("Pending version", pending));
    }
    if let Some(count) = info.unreleased_commits {
        println!("{}", key_value("Unreleased commits", &count.to_string()));
    }
    for problem in &info.problems {
        warning(problem);
    }
}

/// Print the per-project results of a discover run
pub fn fleet(fleet: &FleetReport) {
    for entry in &fleet.entries {
        match &entry.outcome {
            FleetOutcome::Released { report: r } => report(r),
            FleetOutcome::Skipped { reason } => {
                println!("{} {}: {}", style("-").dim(), entry.project.name, reason)
            }
            FleetOutcome::Failed { reason } => error(&format!("{}: {}", entry.project.name, reason)),
        }
        println!();
    }
    for failure in &fleet.source_failures {
        warning(&format!(
            "could not list projects from {}: {}",
            failure.source, failure.reason
        ));
    }
    println!(
        "{} project(s), {} failed, {} skipped",
        fleet.entries.len(),
        fleet.failures(),
        fleet.skipped()
    );
}

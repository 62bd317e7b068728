//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::tag::TagTemplate;
use crate::update_version::contains_version_variable;

use super::types::{parse_github_url, ProjectConfig};

/// Registries the engine knows how to publish to
pub const KNOWN_REGISTRIES: [&str; 2] = ["pypi", "crates.io"];

/// Validate configuration
pub fn validate_config(config: &ProjectConfig) -> Result<()> {
    debug!("validating configuration");
    validate_tag_name(config)?;
    validate_update_rules(config)?;
    validate_timeouts(config)?;
    validate_platforms(config)?;
    validate_registries(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> crate::DisperseError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
    .into()
}

fn validate_tag_name(config: &ProjectConfig) -> Result<()> {
    TagTemplate::new(&config.tag_name)
        .map_err(|_| invalid("tag-name", "must contain $VERSION exactly once"))?;
    Ok(())
}

fn validate_update_rules(config: &ProjectConfig) -> Result<()> {
    for (i, rule) in config.update_version.iter().enumerate() {
        let field = format!("update-version[{i}]");
        if rule.path.as_os_str().is_empty() {
            return Err(invalid(&field, "path cannot be empty"));
        }
        if !contains_version_variable(&rule.new_line) {
            return Err(invalid(
                &field,
                format!("new-line '{}' does not reference a version variable", rule.new_line),
            ));
        }
        if let Some(pattern) = &rule.match_pattern {
            regex::Regex::new(pattern)
                .map_err(|e| invalid(&field, format!("invalid match pattern: {e}")))?;
        }
    }
    if config
        .update_manpage
        .iter()
        .any(|m| m.trim().is_empty())
    {
        return Err(invalid("update-manpage", "entries cannot be empty"));
    }
    Ok(())
}

fn validate_timeouts(config: &ProjectConfig) -> Result<()> {
    if config.ci_timeout == 0 {
        return Err(invalid("ci-timeout", "must be greater than zero"));
    }
    if config.ci_poll_interval == 0 {
        return Err(invalid("ci-poll-interval", "must be greater than zero"));
    }
    if config.release_timeout == 0 {
        return Err(invalid("release-timeout", "must be greater than zero"));
    }
    Ok(())
}

fn validate_platforms(config: &ProjectConfig) -> Result<()> {
    if let Some(github) = &config.github {
        if parse_github_url(&github.url).is_none() {
            return Err(invalid(
                "github.url",
                format!("'{}' is not a GitHub repository URL", github.url),
            ));
        }
        if github.branch.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("github.branch", "branch cannot be empty"));
        }
    }
    if let Some(launchpad) = &config.launchpad {
        if launchpad.project.trim().is_empty() {
            return Err(invalid("launchpad.project", "project cannot be empty"));
        }
    }
    Ok(())
}

fn validate_registries(config: &ProjectConfig) -> Result<()> {
    if let Some(primary) = &config.primary_registry {
        if !KNOWN_REGISTRIES.contains(&primary.as_str()) {
            return Err(invalid(
                "primary-registry",
                format!("must be one of: {}", KNOWN_REGISTRIES.join(", ")),
            ));
        }
        if config.skips_registry(primary) {
            return Err(invalid(
                "primary-registry",
                format!("{primary} is the primary registry but uploads to it are skipped"),
            ));
        }
    }
    if config.tarball_location.iter().any(|l| l.trim().is_empty()) {
        return Err(invalid("tarball-location", "entries cannot be empty"));
    }
    Ok(())
}

//! Version variables and line-based version rewriting
//!
//! Replacement templates may reference `$VERSION`, `$TUPLED_VERSION`,
//! `$STATUS_TUPLED_VERSION`, `$MAJOR_VERSION`, `$MINOR_VERSION` and
//! `$MICRO_VERSION`. When a rule has no explicit `match` pattern, the
//! pattern is derived from the template itself so the same rule can both
//! find and rewrite the line.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::MutationError;
use crate::version::{Status, Version};

/// Names of the supported version variables, without the `$`
pub const VERSION_VARIABLES: [&str; 6] = [
    "VERSION",
    "TUPLED_VERSION",
    "STATUS_TUPLED_VERSION",
    "MAJOR_VERSION",
    "MINOR_VERSION",
    "MICRO_VERSION",
];

static VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Z_]+)").expect("Invalid regex"));

static ESCAPED_VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\$([A-Z_]+)").expect("Invalid regex"));

fn is_variable(name: &str) -> bool {
    VERSION_VARIABLES.contains(&name)
}

/// Whether `text` references at least one version variable
pub fn contains_version_variable(text: &str) -> bool {
    VARIABLE_REGEX
        .captures_iter(text)
        .any(|c| is_variable(&c[1]))
}

fn expand_variable(name: &str, version: &Version, status: Status) -> Option<String> {
    Some(match name {
        "VERSION" => version.to_string(),
        "TUPLED_VERSION" => version.tupled(),
        "STATUS_TUPLED_VERSION" => version.status_tupled(status),
        "MAJOR_VERSION" => version.major().to_string(),
        "MINOR_VERSION" => version.minor().to_string(),
        "MICRO_VERSION" => version.micro().to_string(),
        _ => return None,
    })
}

/// Substitute every version variable in `text`. Unknown `$NAMES` are kept.
pub fn expand_version_vars(text: &str, version: &Version, status: Status) -> String {
    VARIABLE_REGEX
        .replace_all(text, |caps: &Captures| {
            expand_variable(&caps[1], version, status).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Build the pattern matching lines produced by `new_line`.
///
/// Literal text is escaped and each variable becomes a named capture group;
/// repeated variables only capture on their first occurrence.
pub fn version_line_re(new_line: &str) -> Result<Regex, MutationError> {
    let escaped = regex::escape(new_line.trim_end_matches(['\r', '\n']));
    let mut seen = Vec::new();
    let pattern = ESCAPED_VARIABLE_REGEX.replace_all(&escaped, |caps: &Captures| {
        let name = &caps[1];
        if !is_variable(name) {
            caps[0].to_string()
        } else if seen.iter().any(|s: &String| s == name) {
            "(?:.*)".to_string()
        } else {
            seen.push(name.to_string());
            format!("(?P<{}>.*)", name.to_lowercase())
        }
    });
    Regex::new(&pattern).map_err(|e| MutationError::InvalidPattern {
        pattern: pattern.into_owned(),
        reason: e.to_string(),
    })
}

/// Pattern used for a rule: the explicit one or the derived one
pub fn rule_pattern(match_pattern: Option<&str>, new_line: &str) -> Result<Regex, MutationError> {
    match match_pattern {
        Some(p) => Regex::new(p).map_err(|e| MutationError::InvalidPattern {
            pattern: p.to_string(),
            reason: e.to_string(),
        }),
        None => version_line_re(new_line),
    }
}

fn version_from_captures(caps: &Captures) -> Option<(Version, Option<Status>)> {
    if let Some(m) = caps.name("version") {
        return m.as_str().parse().ok().map(|v| (v, None));
    }
    if let Some(m) = caps
        .name("status_tupled_version")
        .or_else(|| caps.name("tupled_version"))
    {
        return Version::from_tupled(m.as_str()).ok();
    }
    let major = caps.name("major_version")?.as_str().parse().ok()?;
    let mut components = vec![major];
    for name in ["minor_version", "micro_version"] {
        match caps.name(name).map(|m| m.as_str().parse::<u64>()) {
            Some(Ok(n)) => components.push(n),
            Some(Err(_)) => return None,
            None => break,
        }
    }
    Some((Version::new(components), None))
}

/// Read the version back out of `content` using the pattern derived from `new_line`
pub fn reverse_version(new_line: &str, content: &str) -> Option<(Version, Option<Status>)> {
    let re = version_line_re(new_line).ok()?;
    content
        .lines()
        .filter_map(|line| re.captures(line))
        .find_map(|caps| version_from_captures(&caps))
}

/// Replace every line of `text` matching `pattern` with the expanded `new_line`.
///
/// Line endings are preserved. Returns the new text and the number of
/// replaced lines.
pub fn update_version_in_text(
    text: &str,
    pattern: &Regex,
    new_line: &str,
    version: &Version,
    status: Status,
) -> (String, usize) {
    let replacement = expand_version_vars(new_line.trim_end_matches(['\r', '\n']), version, status);
    let mut out = String::with_capacity(text.len());
    let mut matches = 0;
    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];
        if pattern.is_match(body) {
            out.push_str(&replacement);
            out.push_str(ending);
            matches += 1;
        } else {
            out.push_str(line);
        }
    }
    (out, matches)
}

/// Apply one rule to `path` in place, returning the number of replaced lines.
///
/// The file is left untouched when nothing matches.
pub fn update_version_in_file(
    path: &Path,
    match_pattern: Option<&str>,
    new_line: &str,
    version: &Version,
    status: Status,
) -> Result<usize, MutationError> {
    let pattern = rule_pattern(match_pattern, new_line)?;
    debug!(path = %path.display(), pattern = %pattern.as_str(), "expanding version line");
    let text = std::fs::read_to_string(path)?;
    let (updated, matches) = update_version_in_text(&text, &pattern, new_line, version, status);
    if matches > 0 {
        std::fs::write(path, updated).map_err(|e| MutationError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(matches)
}

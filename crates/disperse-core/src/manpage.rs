//! Manpage `.TH` stamping

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::error::MutationError;
use crate::version::Version;

static ISO_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^20[0-9]{2}-[0-1][0-9]-[0-3][0-9]$").expect("Invalid regex"));

static MONTH_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+ [0-9]{4}$").expect("Invalid regex"));

static SOURCE_VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^ ]+) [0-9a-z.]+$").expect("Invalid regex"));

/// Split a roff request into arguments, honouring double quotes
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

fn join_args(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("\"{a}\"")
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rewrite a `.TH` line with a new date and version, keeping the date style
fn stamp_th_line(line: &str, version: &Version, date: NaiveDate) -> String {
    let mut args = split_args(line);
    if let Some(current) = args.get(3) {
        if ISO_DATE_REGEX.is_match(current) {
            args[3] = date.format("%Y-%m-%d").to_string();
        } else if MONTH_DATE_REGEX.is_match(current) {
            args[3] = date.format("%B %Y").to_string();
        }
    }
    if let Some(source) = args.get(4) {
        if let Some(caps) = SOURCE_VERSION_REGEX.captures(source) {
            args[4] = format!("{} {}", &caps[1], version);
        }
    }
    join_args(&args)
}

/// Stamp `.TH` in the manpage text; `None` when there is no `.TH` line
pub fn update_version_in_manpage_text(
    text: &str,
    version: &Version,
    date: NaiveDate,
) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut found = false;
    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        if !found && body.starts_with(".TH ") {
            out.push_str(&stamp_th_line(body, version, date));
            out.push_str(&line[body.len()..]);
            found = true;
        } else {
            out.push_str(line);
        }
    }
    found.then_some(out)
}

/// Stamp the manpage at `path` in place
pub fn update_version_in_manpage(
    path: &Path,
    version: &Version,
    date: NaiveDate,
) -> Result<(), MutationError> {
    let text = std::fs::read_to_string(path)?;
    let updated = update_version_in_manpage_text(&text, version, date).ok_or_else(|| {
        MutationError::NoMatches {
            path: path.to_path_buf(),
        }
    })?;
    std::fs::write(path, updated).map_err(|e| MutationError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(path = %path.display(), version = %version, "stamped manpage");
    Ok(())
}

/// Check that a manpage has a `.TH` line carrying a version
pub fn validate_manpage(path: &Path) -> Result<(), MutationError> {
    let text = std::fs::read_to_string(path)?;
    let ok = text
        .lines()
        .filter(|l| l.starts_with(".TH "))
        .map(split_args)
        .any(|args| {
            args.get(4)
                .and_then(|a| a.split_once(' '))
                .is_some_and(|(_, v)| v.parse::<Version>().is_ok())
        });
    if ok {
        Ok(())
    } else {
        Err(MutationError::NoMatches {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_split_args() {
        assert_eq!(
            split_args(r#".TH BZR 1 "2019-12-31" "Bazaar 2.7.0" "Bazaar Reference Manual""#),
            vec![".TH", "BZR", "1", "2019-12-31", "Bazaar 2.7.0", "Bazaar Reference Manual"]
        );
    }

    #[test]
    fn test_stamp_iso_date() {
        let text = ".\\\" comment\n.TH BZR 1 \"2019-12-31\" \"Bazaar 2.7.0\" \"Bazaar Reference Manual\"\n.SH NAME\n";
        let out = update_version_in_manpage_text(text, &"2.8.0".parse().unwrap(), date()).unwrap();
        assert_eq!(
            out,
            ".\\\" comment\n.TH BZR 1 2024-03-01 \"Bazaar 2.8.0\" \"Bazaar Reference Manual\"\n.SH NAME\n"
        );
    }

    #[test]
    fn test_stamp_month_date() {
        let text = ".TH DISPERSE 1 \"January 2020\" \"disperse 0.1.0\" \"User Commands\"\n";
        let out = update_version_in_manpage_text(text, &"0.2.0".parse().unwrap(), date()).unwrap();
        assert_eq!(
            out,
            ".TH DISPERSE 1 \"March 2024\" \"disperse 0.2.0\" \"User Commands\"\n"
        );
    }

    #[test]
    fn test_no_th_line() {
        assert!(update_version_in_manpage_text(".SH NAME\n", &"1.0".parse().unwrap(), date())
            .is_none());
    }

    #[test]
    fn test_update_and_validate_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tool.1");
        std::fs::write(&path, ".TH TOOL 1 \"2020-01-01\" \"tool 1.0.0\" \"Manual\"\n").unwrap();
        validate_manpage(&path).unwrap();
        update_version_in_manpage(&path, &"1.0.1".parse().unwrap(), date()).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("\"tool 1.0.1\""));

        let bad = temp.path().join("bad.1");
        std::fs::write(&bad, ".SH NAME\n").unwrap();
        assert!(validate_manpage(&bad).is_err());
    }
}

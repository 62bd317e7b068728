//! News file handling
//!
//! A news file lists releases newest first. Each entry starts with a line
//! `<version><whitespace><date>`, where the date is `UNRELEASED` (or
//! `NEXT ...`) while changes are pending. Indented lines below it are the
//! change notes.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use crate::error::NewsFileError;
use crate::version::Version;

static NUMERIC_VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9.]+$").expect("Invalid regex"));

/// Whether the date field marks an unreleased entry
pub fn check_date(date: &str) -> bool {
    date == "UNRELEASED" || date.starts_with("NEXT ")
}

/// `Ok(true)` for placeholders, `Ok(false)` for concrete versions
pub fn check_version(version: &str) -> Result<bool, NewsFileError> {
    if matches!(version, "UNRELEASED" | "NEXT" | "%(version)s") {
        return Ok(true);
    }
    if !NUMERIC_VERSION_REGEX.is_match(version) {
        return Err(NewsFileError::OddVersion(version.to_string()));
    }
    Ok(false)
}

fn is_header(line: &str) -> bool {
    line.starts_with("Changelog for ")
        || line.ends_with(" release notes")
        || line.trim().is_empty()
        || line.chars().all(|c| c == '=' || c == '-')
}

/// Index of the first entry line, skipping any title block
fn first_entry(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|l| !is_header(l))
}

struct Entry<'a> {
    version: &'a str,
    separator: &'a str,
    date: &'a str,
}

fn parse_entry(line: &str) -> Entry<'_> {
    let version_end = line.find(char::is_whitespace).unwrap_or(line.len());
    let rest = &line[version_end..];
    let date = rest.trim_start();
    Entry {
        version: &line[..version_end],
        separator: &rest[..rest.len() - date.len()],
        date: date.trim_end(),
    }
}

/// A news file inside a working tree
#[derive(Debug, Clone)]
pub struct NewsFile {
    path: PathBuf,
}

impl NewsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<String, NewsFileError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }

    /// Version of the pending entry; `None` when it uses a placeholder
    pub fn find_pending(&self) -> Result<Option<Version>, NewsFileError> {
        let content = self.read()?;
        let lines: Vec<&str> = content.lines().collect();
        let idx = first_entry(&lines).ok_or_else(|| NewsFileError::Empty(self.path.clone()))?;
        let entry = parse_entry(lines[idx]);
        if !check_date(entry.date) {
            return Err(NewsFileError::NoUnreleasedChanges(self.path.clone()));
        }
        if check_version(entry.version)? {
            return Ok(None);
        }
        entry
            .version
            .parse()
            .map(Some)
            .map_err(|_| NewsFileError::OddVersion(entry.version.to_string()))
    }

    /// Stamp the pending entry with `date` and return its change notes
    pub fn mark_released(
        &self,
        expected: &Version,
        date: NaiveDate,
    ) -> Result<String, NewsFileError> {
        let content = self.read()?;
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let trimmed: Vec<&str> = lines.iter().map(|l| l.trim_end_matches(['\r', '\n'])).collect();
        let idx = first_entry(&trimmed).ok_or_else(|| NewsFileError::Empty(self.path.clone()))?;
        let entry = parse_entry(trimmed[idx]);
        if !check_date(entry.date) {
            return Err(NewsFileError::NoUnreleasedChanges(self.path.clone()));
        }
        if !check_version(entry.version)? && entry.version != expected.to_string() {
            return Err(NewsFileError::VersionMismatch {
                expected: expected.to_string(),
                found: entry.version.to_string(),
            });
        }

        let notes: Vec<&str> = trimmed[idx + 1..]
            .iter()
            .take_while(|l| l.is_empty() || l.starts_with(char::is_whitespace))
            .map(|l| l.trim())
            .collect();
        let notes = notes.join("\n").trim().to_string();

        let separator = if entry.separator.is_empty() {
            "\t"
        } else {
            entry.separator
        };
        let ending = &lines[idx][trimmed[idx].len()..];
        let stamped = format!(
            "{}{}{}{}",
            expected,
            separator,
            date.format("%Y-%m-%d"),
            ending
        );

        let mut out = String::with_capacity(content.len());
        for (i, line) in lines.iter().enumerate() {
            if i == idx {
                out.push_str(&stamped);
            } else {
                out.push_str(line);
            }
        }
        std::fs::write(&self.path, out)?;
        info!(path = %self.path.display(), version = %expected, "marked news entry as released");
        Ok(notes)
    }

    /// Rename the pending entry to `version`, returning the version it had.
    ///
    /// Placeholder entries and entries already named `version` are left alone.
    pub fn retitle_pending(&self, version: &Version) -> Result<Option<Version>, NewsFileError> {
        let Some(previous) = self.find_pending()? else {
            return Ok(None);
        };
        if previous == *version {
            return Ok(None);
        }
        let content = self.read()?;
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let trimmed: Vec<&str> = lines.iter().map(|l| l.trim_end_matches(['\r', '\n'])).collect();
        let idx = first_entry(&trimmed).ok_or_else(|| NewsFileError::Empty(self.path.clone()))?;
        let old = parse_entry(trimmed[idx]).version;

        let mut out = String::with_capacity(content.len() + 8);
        for (i, line) in lines.iter().enumerate() {
            if i == idx {
                out.push_str(&version.to_string());
                out.push_str(&line[old.len()..]);
            } else {
                out.push_str(line);
            }
        }
        std::fs::write(&self.path, out)?;
        info!(path = %self.path.display(), from = %previous, to = %version, "renamed pending news entry");
        Ok(Some(previous))
    }

    /// Insert a pending entry for `next` above the latest release
    pub fn add_pending(&self, next: &Version) -> Result<(), NewsFileError> {
        let content = self.read()?;
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let trimmed: Vec<&str> = lines.iter().map(|l| l.trim_end_matches(['\r', '\n'])).collect();
        let idx = first_entry(&trimmed).unwrap_or(lines.len());

        let mut out = String::with_capacity(content.len() + 32);
        for line in &lines[..idx] {
            out.push_str(line);
        }
        out.push_str(&format!("{next}\tUNRELEASED\n\n"));
        for line in &lines[idx..] {
            out.push_str(line);
        }
        std::fs::write(&self.path, out)?;
        debug!(path = %self.path.display(), version = %next, "added pending news entry");
        Ok(())
    }

    /// Check the file can be understood; a released top entry is fine
    pub fn validate(&self) -> Result<(), NewsFileError> {
        match self.find_pending() {
            Ok(_) | Err(NewsFileError::NoUnreleasedChanges(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn news(content: &str) -> (TempDir, NewsFile) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("NEWS");
        std::fs::write(&path, content).unwrap();
        (temp, NewsFile::new(path))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_check_version() {
        assert!(check_version("UNRELEASED").unwrap());
        assert!(check_version("NEXT").unwrap());
        assert!(!check_version("1.2.3").unwrap());
        assert!(matches!(
            check_version("banana"),
            Err(NewsFileError::OddVersion(_))
        ));
    }

    #[test]
    fn test_check_date() {
        assert!(check_date("UNRELEASED"));
        assert!(check_date("NEXT release"));
        assert!(!check_date("2024-01-01"));
    }

    #[test]
    fn test_find_pending() {
        let (_t, nf) = news("0.2.0\tUNRELEASED\n\n * Fix bug.\n\n0.1.0\t2023-01-01\n");
        assert_eq!(nf.find_pending().unwrap(), Some("0.2.0".parse().unwrap()));
    }

    #[test]
    fn test_find_pending_placeholder() {
        let (_t, nf) = news("NEXT\tUNRELEASED\n\n * Fix bug.\n");
        assert_eq!(nf.find_pending().unwrap(), None);
    }

    #[test]
    fn test_find_pending_released() {
        let (_t, nf) = news("0.1.0\t2023-01-01\n\n * Initial.\n");
        assert!(matches!(
            nf.find_pending(),
            Err(NewsFileError::NoUnreleasedChanges(_))
        ));
        assert!(nf.validate().is_ok());
    }

    #[test]
    fn test_find_pending_skips_header() {
        let (_t, nf) = news("Changelog for foo\n=================\n\n1.0.1 UNRELEASED\n");
        assert_eq!(nf.find_pending().unwrap(), Some("1.0.1".parse().unwrap()));
    }

    #[test]
    fn test_mark_released() {
        let (_t, nf) =
            news("0.2.0\tUNRELEASED\n\n * Fix bug.\n\n * Add feature.\n\n0.1.0\t2023-01-01\n");
        let notes = nf.mark_released(&"0.2.0".parse().unwrap(), date()).unwrap();
        assert_eq!(notes, "* Fix bug.\n\n* Add feature.");
        assert_eq!(
            std::fs::read_to_string(nf.path()).unwrap(),
            "0.2.0\t2024-03-01\n\n * Fix bug.\n\n * Add feature.\n\n0.1.0\t2023-01-01\n"
        );
    }

    #[test]
    fn test_mark_released_placeholder_takes_version() {
        let (_t, nf) = news("UNRELEASED  UNRELEASED\n * Thing.\n");
        nf.mark_released(&"3.0.0".parse().unwrap(), date()).unwrap();
        assert_eq!(
            std::fs::read_to_string(nf.path()).unwrap(),
            "3.0.0  2024-03-01\n * Thing.\n"
        );
    }

    #[test]
    fn test_mark_released_version_mismatch() {
        let (_t, nf) = news("0.2.0\tUNRELEASED\n");
        assert!(matches!(
            nf.mark_released(&"0.3.0".parse().unwrap(), date()),
            Err(NewsFileError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_retitle_pending() {
        let (_t, nf) = news("0.2.0\tUNRELEASED\n\n * Fix bug.\n\n0.1.0\t2023-01-01\n");
        let previous = nf.retitle_pending(&"0.3.0".parse().unwrap()).unwrap();
        assert_eq!(previous, Some("0.2.0".parse().unwrap()));
        assert_eq!(
            std::fs::read_to_string(nf.path()).unwrap(),
            "0.3.0\tUNRELEASED\n\n * Fix bug.\n\n0.1.0\t2023-01-01\n"
        );
        assert_eq!(nf.retitle_pending(&"0.3.0".parse().unwrap()).unwrap(), None);

        let (_t, nf) = news("NEXT\tUNRELEASED\n");
        assert_eq!(nf.retitle_pending(&"0.3.0".parse().unwrap()).unwrap(), None);
        assert_eq!(std::fs::read_to_string(nf.path()).unwrap(), "NEXT\tUNRELEASED\n");
    }

    #[test]
    fn test_add_pending() {
        let (_t, nf) = news("0.2.0\t2024-03-01\n\n * Fix bug.\n");
        nf.add_pending(&"0.2.1".parse().unwrap()).unwrap();
        assert_eq!(
            std::fs::read_to_string(nf.path()).unwrap(),
            "0.2.1\tUNRELEASED\n\n0.2.0\t2024-03-01\n\n * Fix bug.\n"
        );
        assert_eq!(nf.find_pending().unwrap(), Some("0.2.1".parse().unwrap()));
    }
}

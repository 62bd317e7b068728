//! Tag template engine
//!
//! Tag templates are literal strings with a single `$VERSION` placeholder,
//! for example `v$VERSION` or `project-$VERSION`.

use regex::Regex;

use crate::error::TagError;
use crate::version::Version;

/// Placeholder substituted by the version
pub const VERSION_PLACEHOLDER: &str = "$VERSION";

/// A validated tag template
#[derive(Debug, Clone)]
pub struct TagTemplate {
    template: String,
    pattern: Regex,
}

impl TagTemplate {
    /// Validate `template` and build its matching pattern
    pub fn new(template: &str) -> Result<Self, TagError> {
        let mut parts = template.split(VERSION_PLACEHOLDER);
        let (prefix, suffix) = match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(suffix), None) => (prefix, suffix),
            _ => return Err(TagError::InvalidTemplate(template.to_string())),
        };
        let pattern = format!("^{}(.+){}$", regex::escape(prefix), regex::escape(suffix));
        let pattern =
            Regex::new(&pattern).map_err(|_| TagError::InvalidTemplate(template.to_string()))?;
        Ok(Self {
            template: template.to_string(),
            pattern,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute the version into the template
    pub fn expand(&self, version: &Version) -> String {
        self.template
            .replacen(VERSION_PLACEHOLDER, &version.to_string(), 1)
    }

    /// Recover the version from a tag produced by [`TagTemplate::expand`]
    pub fn unexpand(&self, tag: &str) -> Result<Version, TagError> {
        let no_match = || TagError::NoMatch {
            template: self.template.clone(),
            tag: tag.to_string(),
        };
        let caps = self.pattern.captures(tag).ok_or_else(no_match)?;
        caps[1].parse().map_err(|_| no_match())
    }

    /// Whether `tag` was produced by this template
    pub fn matches(&self, tag: &str) -> bool {
        self.unexpand(tag).is_ok()
    }
}

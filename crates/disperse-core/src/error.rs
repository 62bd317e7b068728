//! Error types for disperse

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using DisperseError
pub type Result<T> = std::result::Result<T, DisperseError>;

/// Main error type for disperse operations
#[derive(Debug, Error)]
pub enum DisperseError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Git-related errors
    #[error(transparent)]
    Git(#[from] GitError),

    /// Version-related errors
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Tag template errors
    #[error(transparent)]
    Tag(#[from] TagError),

    /// Version inference errors
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// News file errors
    #[error(transparent)]
    NewsFile(#[from] NewsFileError),

    /// File mutation errors
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Verification command errors
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Adapter-related errors
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Remote service errors
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// CI did not settle on the release commit
    #[error(transparent)]
    CiWait(#[from] CiWaitError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Git-related errors
#[derive(Debug, Error)]
pub enum GitError {
    /// Repository not found
    #[error("Git repository not found at {0}")]
    RepositoryNotFound(PathBuf),

    /// Failed to open repository
    #[error("Failed to open repository: {0}")]
    OpenFailed(String),

    /// No commits found
    #[error("No commits found in repository")]
    NoCommits,

    /// Tag exists and points somewhere else
    #[error("Tag {name} already exists at {existing}, refusing to move it to {requested}")]
    TagConflict {
        name: String,
        existing: String,
        requested: String,
    },

    /// Failed to create tag
    #[error("Failed to create tag {name}: {reason}")]
    TagCreationFailed { name: String, reason: String },

    /// Failed to commit
    #[error("Failed to commit: {0}")]
    CommitFailed(String),

    /// Failed to push
    #[error("Failed to push to remote: {0}")]
    PushFailed(String),

    /// Failed to clone
    #[error("Failed to clone {url}: {reason}")]
    CloneFailed { url: String, reason: String },

    /// Remote not found
    #[error("Remote not found: {0}")]
    RemoteNotFound(String),

    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),
}

/// Version-related errors
#[derive(Debug, Error)]
pub enum VersionError {
    /// Failed to parse version
    #[error("Failed to parse version '{0}': {1}")]
    ParseFailed(String, String),

    /// A component would overflow
    #[error("Version {0} cannot be increased further")]
    Overflow(String),

    /// Invalid bump level
    #[error("Invalid bump level: {0}")]
    InvalidBumpLevel(String),
}

/// Tag template errors
#[derive(Debug, Error)]
pub enum TagError {
    /// Template does not contain exactly one placeholder
    #[error("Tag template '{0}' must contain $VERSION exactly once")]
    InvalidTemplate(String),

    /// Tag does not match the template
    #[error("Tag '{tag}' does not match template '{template}'")]
    NoMatch { template: String, tag: String },
}

/// Version inference errors
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Neither tags nor manifest declare a version
    #[error("No current version found: no tags match '{template}' and no manifest version")]
    NoVersion { template: String },

    /// Tag history and manifest disagree
    #[error("Tag {tag} says {tag_version} but manifest says {manifest_version}")]
    Mismatch {
        tag: String,
        tag_version: String,
        manifest_version: String,
    },

    /// Requested next version is not newer
    #[error("Next version {next} is not newer than current version {current}")]
    NotNewer { current: String, next: String },
}

/// News file errors
#[derive(Debug, Error)]
pub enum NewsFileError {
    /// Top entry is already released
    #[error("No unreleased changes in {0}")]
    NoUnreleasedChanges(PathBuf),

    /// Version in news file could not be understood
    #[error("Unexpected version '{0}' in news file")]
    OddVersion(String),

    /// Version in news file differs from the one being released
    #[error("News file version {found} does not match expected version {expected}")]
    VersionMismatch { expected: String, found: String },

    /// News file has no entries
    #[error("News file {0} is empty")]
    Empty(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File mutation errors
#[derive(Debug, Error)]
pub enum MutationError {
    /// None of the rules for a file matched
    #[error("No rule for {path} matched any line")]
    NoMatches { path: PathBuf },

    /// Match pattern is not a valid regex
    #[error("Invalid match pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unknown variable in a replacement template
    #[error("Unknown version variable in '{0}'")]
    UnknownVariable(String),

    /// Writing the file failed
    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Verification command errors
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Command exited unsuccessfully
    #[error("Command `{command}` failed with {status}")]
    CommandFailed { command: String, status: String },

    /// Command could not be started
    #[error("Could not run `{command}`: {reason}")]
    SpawnFailed { command: String, reason: String },
}

/// Adapter-related errors
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Package manifest not found
    #[error("Package manifest not found at {0}")]
    ManifestNotFound(PathBuf),

    /// Manifest exists but the version is not stored literally
    #[error("Version not located in {path}: {reason}")]
    VersionNotLocated { path: PathBuf, reason: String },

    /// Failed to parse manifest
    #[error("Failed to parse manifest: {0}")]
    ManifestParseError(String),

    /// Failed to update manifest
    #[error("Failed to update manifest: {0}")]
    ManifestUpdateError(String),

    /// Authentication failed
    #[error("Authentication failed for registry {registry}: {reason}")]
    AuthenticationFailed { registry: String, reason: String },

    /// Command execution failed
    #[error("Command failed: {command} - {reason}")]
    CommandFailed { command: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from remote services: CI, registries, hosting platforms.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure or server error worth retrying
    #[error("{service}: transient failure: {message}")]
    Transient { service: String, message: String },

    /// Rate limited by the service
    #[error("{service}: rate limited")]
    RateLimited {
        service: String,
        retry_after: Option<u64>,
    },

    /// Request did not complete in time
    #[error("{service}: timed out")]
    Timeout { service: String },

    /// Authentication, not-found, validation and friends
    #[error("{service}: {message}")]
    Permanent { service: String, message: String },
}

impl RemoteError {
    /// Whether the retry policy may re-run the operation
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RemoteError::Permanent { .. })
    }

    pub fn service(&self) -> &str {
        match self {
            RemoteError::Transient { service, .. }
            | RemoteError::RateLimited { service, .. }
            | RemoteError::Timeout { service }
            | RemoteError::Permanent { service, .. } => service,
        }
    }

    pub fn permanent(service: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Permanent {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Transient {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// Waiting for CI on the release commit
#[derive(Debug, Error)]
pub enum CiWaitError {
    #[error("CI failed on {reference}: {detail}")]
    Failed { reference: String, detail: String },

    #[error("CI did not pass on {reference} within {seconds}s")]
    TimedOut { reference: String, seconds: u64 },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl DisperseError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error is a remote failure the retry policy may re-run
    pub fn is_retryable(&self) -> bool {
        match self {
            DisperseError::Remote(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_classification() {
        assert!(RemoteError::transient("github", "502").is_retryable());
        assert!(RemoteError::Timeout {
            service: "pypi".into()
        }
        .is_retryable());
        assert!(RemoteError::RateLimited {
            service: "crates.io".into(),
            retry_after: Some(3)
        }
        .is_retryable());
        assert!(!RemoteError::permanent("github", "401 Unauthorized").is_retryable());
    }

    #[test]
    fn test_wrapped_remote_error_is_retryable() {
        let err: DisperseError = RemoteError::transient("launchpad", "reset").into();
        assert!(err.is_retryable());
        let err: DisperseError = ConfigError::MissingField("name".into()).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_tag_conflict_message() {
        let err = GitError::TagConflict {
            name: "v1.0.0".into(),
            existing: "abc".into(),
            requested: "def".into(),
        };
        assert!(err.to_string().contains("refusing to move"));
    }
}

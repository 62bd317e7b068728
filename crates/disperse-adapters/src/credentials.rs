//! Registry credentials for uploads

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, instrument};

use disperse_core::error::AdapterError;

type Result<T> = std::result::Result<T, AdapterError>;

/// Looks up upload credentials in the environment, then in the
/// registry's own configuration file
pub struct CredentialProvider {
    env_prefix: String,
    home: Option<PathBuf>,
    cargo_home: Option<PathBuf>,
    cache: HashMap<String, Credential>,
}

impl CredentialProvider {
    pub fn new() -> Self {
        Self {
            env_prefix: "DISPERSE".to_string(),
            home: dirs::home_dir(),
            cargo_home: env::var("CARGO_HOME").ok().map(PathBuf::from),
            cache: HashMap::new(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read configuration files below `home` instead of the user's home
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        self.cargo_home = Some(home.join(".cargo"));
        self.home = Some(home);
        self
    }

    #[instrument(skip(self))]
    pub fn get(&mut self, registry: &str) -> Result<Option<Credential>> {
        if let Some(cred) = self.cache.get(registry) {
            debug!(registry, source = "cache", "credentials found");
            return Ok(Some(cred.clone()));
        }

        let found = match self.from_env(registry) {
            Some(cred) => {
                debug!(registry, source = "environment", "credentials found");
                Some(cred)
            }
            None => {
                let cred = self.from_registry_config(registry)?;
                if cred.is_some() {
                    debug!(registry, source = "config_file", "credentials found");
                }
                cred
            }
        };
        match found {
            Some(cred) => {
                self.cache.insert(registry.to_string(), cred.clone());
                Ok(Some(cred))
            }
            None => {
                debug!(registry, "no credentials found");
                Ok(None)
            }
        }
    }

    fn from_env(&self, registry: &str) -> Option<Credential> {
        let key = registry.to_uppercase().replace(['.', '-', '/'], "_");

        if let Ok(token) = env::var(format!("{}_{}_TOKEN", self.env_prefix, key)) {
            return Some(Credential::Token(token));
        }

        match registry {
            "crates.io" => {
                if let Ok(token) = env::var("CARGO_REGISTRY_TOKEN") {
                    return Some(Credential::Token(token));
                }
            }
            "pypi" => {
                if let Ok(password) = env::var("TWINE_PASSWORD") {
                    let username =
                        env::var("TWINE_USERNAME").unwrap_or_else(|_| "__token__".to_string());
                    return Some(Credential::UsernamePassword { username, password });
                }
            }
            _ => {}
        }

        let username = env::var(format!("{}_{}_USERNAME", self.env_prefix, key));
        let password = env::var(format!("{}_{}_PASSWORD", self.env_prefix, key));
        match (username, password) {
            (Ok(username), Ok(password)) => Some(Credential::UsernamePassword { username, password }),
            _ => None,
        }
    }

    fn from_registry_config(&self, registry: &str) -> Result<Option<Credential>> {
        match registry {
            "crates.io" => self.from_cargo_credentials(),
            "pypi" => self.from_pypirc(),
            _ => Ok(None),
        }
    }

    fn from_cargo_credentials(&self) -> Result<Option<Credential>> {
        let Some(cargo_home) = self
            .cargo_home
            .clone()
            .or_else(|| self.home.as_ref().map(|h| h.join(".cargo")))
        else {
            return Ok(None);
        };

        for name in ["credentials.toml", "credentials"] {
            let path = cargo_home.join(name);
            if path.exists() {
                return parse_cargo_credentials(&path);
            }
        }
        Ok(None)
    }

    fn from_pypirc(&self) -> Result<Option<Credential>> {
        let Some(home) = &self.home else {
            return Ok(None);
        };
        let path = home.join(".pypirc");
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| AdapterError::AuthenticationFailed {
            registry: "pypi".to_string(),
            reason: format!("Failed to read .pypirc: {e}"),
        })?;
        Ok(parse_pypirc(&content))
    }
}

impl Default for CredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_cargo_credentials(path: &Path) -> Result<Option<Credential>> {
    #[derive(Deserialize)]
    struct CargoCredentials {
        registry: Option<RegistryCredentials>,
    }

    #[derive(Deserialize)]
    struct RegistryCredentials {
        token: Option<String>,
    }

    let content = std::fs::read_to_string(path).map_err(|e| AdapterError::AuthenticationFailed {
        registry: "crates.io".to_string(),
        reason: format!("Failed to read credentials: {e}"),
    })?;
    let creds: CargoCredentials =
        toml::from_str(&content).map_err(|e| AdapterError::AuthenticationFailed {
            registry: "crates.io".to_string(),
            reason: format!("Failed to parse credentials: {e}"),
        })?;
    Ok(creds
        .registry
        .and_then(|r| r.token)
        .map(Credential::Token))
}

/// `username`/`password` from the `[pypi]` section
fn parse_pypirc(content: &str) -> Option<Credential> {
    let mut in_section = false;
    let mut username = None;
    let mut password = None;

    for line in content.lines().map(str::trim) {
        if line.starts_with('[') && line.ends_with(']') {
            in_section = line == "[pypi]";
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "username" => username = Some(value.trim().to_string()),
                "password" => password = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    match (username, password) {
        (Some(username), Some(password)) => Some(Credential::UsernamePassword { username, password }),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Token(String),
    UsernamePassword { username: String, password: String },
}

impl Credential {
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token(t) => Some(t),
            _ => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UsernamePassword { username, .. } => Some(username),
            _ => None,
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            Self::UsernamePassword { password, .. } => Some(password),
            _ => None,
        }
    }

    /// Environment for `twine upload`; a bare token uses the `__token__` user
    pub fn twine_env(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Token(token) => vec![
                ("TWINE_USERNAME", "__token__".to_string()),
                ("TWINE_PASSWORD", token.clone()),
            ],
            Self::UsernamePassword { username, password } => vec![
                ("TWINE_USERNAME", username.clone()),
                ("TWINE_PASSWORD", password.clone()),
            ],
        }
    }
}

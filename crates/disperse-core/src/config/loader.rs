//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

use super::defaults::{config_file_names, DEFAULT_CONFIG_FILE, USER_CONFIG_DIR};
use super::types::{ProjectConfig, UserConfig};
use super::validation::validate_config;

/// Load project configuration from a file
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    info!(path = %path.display(), "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ProjectConfig = toml::from_str(&content).map_err(ConfigError::TomlError)?;

    validate_config(&config)?;
    debug!(path = %path.display(), "config loaded and validated");
    Ok(config)
}

/// Find configuration file in directory or parent directories.
///
/// The first match wins. Parents are walked until the filesystem root.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in config_file_names() {
            let config_path = current.join(name);
            if config_path.exists() {
                info!(path = %config_path.display(), "found config file");
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no config file found");
    None
}

/// Load configuration from directory (searching parent directories)
pub fn load_config_from_dir(dir: &Path) -> Result<(ProjectConfig, PathBuf)> {
    let config_path = find_config(dir).ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))?;

    let config = load_config(&config_path)?;
    Ok((config, config_path))
}

/// Load configuration or use defaults
pub fn load_config_or_default(dir: &Path) -> Result<(ProjectConfig, Option<PathBuf>)> {
    match load_config_from_dir(dir) {
        Ok((config, path)) => Ok((config, Some(path))),
        Err(crate::DisperseError::Config(ConfigError::NotFound(_))) => {
            warn!(dir = %dir.display(), "no config found, using defaults");
            Ok((ProjectConfig::default(), None))
        }
        Err(e) => Err(e),
    }
}

/// Location of the operator configuration file
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(USER_CONFIG_DIR).join(DEFAULT_CONFIG_FILE))
}

/// Load operator configuration from `path`, or defaults when it does not exist
pub fn load_user_config(path: Option<&Path>) -> Result<UserConfig> {
    let Some(path) = path else {
        debug!("no config directory on this platform");
        return Ok(UserConfig::default());
    };
    if !path.exists() {
        debug!(path = %path.display(), "no user config, using defaults");
        return Ok(UserConfig::default());
    }
    info!(path = %path.display(), "loading user config");
    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: UserConfig = toml::from_str(&content).map_err(ConfigError::TomlError)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("disperse.toml");
        std::fs::write(&config_path, "tag-name = \"v$VERSION\"").unwrap();

        let found = find_config(temp.path());
        assert_eq!(found.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_hidden() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(".disperse.toml");
        std::fs::write(&config_path, "").unwrap();

        assert_eq!(find_config(temp.path()).unwrap(), config_path);
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("disperse.toml");
        std::fs::write(&config_path, "").unwrap();
        let nested = temp.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested).unwrap(), config_path);
    }

    #[test]
    fn test_load_config_rejects_invalid_template() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("disperse.toml");
        std::fs::write(&config_path, "tag-name = \"release\"").unwrap();

        assert!(load_config(&config_path).is_err());
    }

    #[test]
    fn test_load_config_or_default_without_file() {
        let temp = TempDir::new().unwrap();
        let (config, path) = load_config_or_default(temp.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(config.tag_name, "v$VERSION");
    }

    #[test]
    fn test_load_user_config_missing_file() {
        let temp = TempDir::new().unwrap();
        let config = load_user_config(Some(&temp.path().join("nope.toml"))).unwrap();
        assert!(config.pypi.username.is_none());
        assert_eq!(config.discover.jobs, 4);
    }
}

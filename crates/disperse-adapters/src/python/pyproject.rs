//! pyproject.toml handling

use std::path::{Path, PathBuf};

use toml_edit::{DocumentMut, Item, Value};

use disperse_core::error::AdapterError;

type Result<T> = std::result::Result<T, AdapterError>;

/// Table holding the version string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionTable {
    /// PEP 621 `[project]`
    Project,
    /// `[tool.poetry]`
    Poetry,
}

impl VersionTable {
    fn keys(self) -> &'static [&'static str] {
        match self {
            Self::Project => &["project"],
            Self::Poetry => &["tool", "poetry"],
        }
    }
}

pub struct PyProject {
    path: PathBuf,
    doc: DocumentMut,
}

impl PyProject {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| AdapterError::ManifestNotFound(path.to_path_buf()))?;
        let doc = content
            .parse()
            .map_err(|e: toml_edit::TomlError| AdapterError::ManifestParseError(e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    fn lookup(&self, keys: &[&str]) -> Option<&Item> {
        let mut item = self.doc.as_item();
        for key in keys {
            item = item.get(key)?;
        }
        Some(item)
    }

    fn str_at(&self, keys: &[&str]) -> Option<&str> {
        self.lookup(keys).and_then(Item::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.str_at(&["project", "name"])
            .or_else(|| self.str_at(&["tool", "poetry", "name"]))
    }

    /// Whether `version` is listed in `project.dynamic`
    pub fn has_dynamic_version(&self) -> bool {
        self.lookup(&["project", "dynamic"])
            .and_then(Item::as_array)
            .is_some_and(|a| a.iter().any(|v| v.as_str() == Some("version")))
    }

    pub fn locate_version(&self) -> Result<(VersionTable, &str)> {
        let not_located = |reason: &str| AdapterError::VersionNotLocated {
            path: self.path.clone(),
            reason: reason.to_string(),
        };
        if self.has_dynamic_version() {
            return Err(not_located("version is dynamic"));
        }
        if let Some(v) = self.str_at(&["project", "version"]) {
            return Ok((VersionTable::Project, v));
        }
        if let Some(v) = self.str_at(&["tool", "poetry", "version"]) {
            return Ok((VersionTable::Poetry, v));
        }
        Err(not_located("no project.version field"))
    }

    /// First of the conventional repository entries in `project.urls`
    pub fn repository(&self) -> Option<&str> {
        for key in ["Repository", "Source", "Source Code", "Homepage"] {
            if let Some(url) = self.str_at(&["project", "urls", key]) {
                return Some(url);
            }
        }
        self.str_at(&["tool", "poetry", "repository"])
            .or_else(|| self.str_at(&["tool", "poetry", "homepage"]))
    }

    pub fn set_version(&mut self, table: VersionTable, version: &str) -> Result<()> {
        let mut item = self.doc.as_item_mut();
        for key in table.keys() {
            item = item
                .get_mut(key)
                .ok_or_else(|| AdapterError::ManifestUpdateError(format!("no [{key}] table")))?;
        }
        let existing = item
            .get_mut("version")
            .and_then(Item::as_value_mut)
            .ok_or_else(|| AdapterError::ManifestUpdateError("no version field".into()))?;
        let decor = existing.decor().clone();
        *existing = Value::from(version);
        *existing.decor_mut() = decor;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        std::fs::write(&self.path, self.doc.to_string())
            .map_err(|e| AdapterError::ManifestUpdateError(e.to_string()))
    }
}

//! Cargo.toml handling

use std::path::{Path, PathBuf};

use toml_edit::{value, DocumentMut, Item};

use disperse_core::error::AdapterError;

type Result<T> = std::result::Result<T, AdapterError>;

/// Where a manifest keeps its version string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionField {
    /// `[package] version = "…"`
    Package,
    /// `[workspace.package] version = "…"`, inherited by `version.workspace = true`
    WorkspacePackage,
}

impl VersionField {
    fn table(self) -> &'static [&'static str] {
        match self {
            Self::Package => &["package"],
            Self::WorkspacePackage => &["workspace", "package"],
        }
    }
}

/// A parsed Cargo.toml that keeps its formatting for writing back
pub struct CargoToml {
    path: PathBuf,
    doc: DocumentMut,
}

impl CargoToml {
    /// Load Cargo.toml from path
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

    fn package_str(&self, key: &str) -> Option<&str> {
        self.lookup(&["package", key]).and_then(Item::as_str)
    }

    pub fn has_package(&self) -> bool {
        self.lookup(&["package"]).is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.package_str("name")
    }

    pub fn repository(&self) -> Option<&str> {
        self.package_str("repository")
            .or_else(|| self.package_str("homepage"))
    }

    /// `publish = false` or an empty registry list
    pub fn publish_disabled(&self) -> bool {
        match self.lookup(&["package", "publish"]) {
            Some(item) if item.as_bool() == Some(false) => true,
            Some(item) => item.as_array().is_some_and(|a| a.is_empty()),
            None => false,
        }
    }

    /// Locate the literal version string, following workspace inheritance
    /// within this file.
    pub fn locate_version(&self) -> Result<(VersionField, &str)> {
        let not_located = |reason: &str| AdapterError::VersionNotLocated {
            path: self.path.clone(),
            reason: reason.to_string(),
        };
        let workspace_version = self
            .lookup(&["workspace", "package", "version"])
            .and_then(Item::as_str);

        match self.lookup(&["package", "version"]) {
            Some(item) => {
                if let Some(v) = item.as_str() {
                    return Ok((VersionField::Package, v));
                }
                let inherited = item
                    .get("workspace")
                    .and_then(Item::as_bool)
                    .unwrap_or(false);
                match (inherited, workspace_version) {
                    (true, Some(v)) => Ok((VersionField::WorkspacePackage, v)),
                    (true, None) => Err(not_located("version inherited from a parent workspace")),
                    (false, _) => Err(not_located("package.version is not a string")),
                }
            }
            None if self.has_package() => Err(not_located("package has no version field")),
            None => workspace_version
                .map(|v| (VersionField::WorkspacePackage, v))
                .ok_or_else(|| not_located("no [package] or [workspace.package] version")),
        }
    }

    /// Replace the version string in place, keeping all other formatting
    pub fn set_version(&mut self, field: VersionField, version: &str) -> Result<()> {
        let mut item = self.doc.as_item_mut();
        for key in field.table() {
            item = item
                .get_mut(key)
                .ok_or_else(|| AdapterError::ManifestUpdateError(format!("no [{key}] table")))?;
        }
        let table = item
            .as_table_like_mut()
            .ok_or_else(|| AdapterError::ManifestUpdateError("version table is not a table".into()))?;
        match table.get_mut("version").and_then(Item::as_value_mut) {
            Some(existing) => {
                let decor = existing.decor().clone();
                *existing = toml_edit::Value::from(version);
                *existing.decor_mut() = decor;
            }
            None => {
                table.insert("version", value(version));
            }
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        std::fs::write(&self.path, self.doc.to_string())
            .map_err(|e| AdapterError::ManifestUpdateError(e.to_string()))
    }
}

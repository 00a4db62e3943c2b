//! Store configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StoreError;

/// Store configuration.
///
/// Deserializable so a host can load it from its own configuration source;
/// missing keys fall back to the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base folder holding database and collection files
    pub data_dir: PathBuf,
    /// Create the base folder when it does not exist
    pub create_data_dir: bool,
    /// SQLite journal mode applied on open (None = engine default)
    pub sqlite_journal_mode: Option<String>,
    /// fsync flat files after every write
    pub flat_file_sync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            create_data_dir: true,
            sqlite_journal_mode: Some("WAL".to_string()),
            flat_file_sync: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration rooted at `data_dir` with default settings.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Checks that the base folder is usable, creating it if allowed.
    ///
    /// # Returns
    /// `Result<(), StoreError>`; every failure is `InvalidBasePath`.
    pub fn prepare(&self) -> Result<(), StoreError> {
        let invalid = |reason: &str| StoreError::InvalidBasePath {
            path: self.data_dir.display().to_string(),
            reason: reason.to_string(),
        };

        if self.data_dir.as_os_str().is_empty() {
            return Err(invalid("path is empty"));
        }

        if self.data_dir.exists() {
            if !self.data_dir.is_dir() {
                return Err(invalid("not a directory"));
            }
            return Ok(());
        }

        if !self.create_data_dir {
            return Err(invalid("directory does not exist"));
        }

        fs::create_dir_all(&self.data_dir).map_err(|e| invalid(&e.to_string()))
    }

    /// Returns `<data_dir>/<name><extension>`.
    ///
    /// # Arguments
    /// * `name` - Database or record type name
    /// * `extension` - Backend file extension including the dot
    pub fn file_path(&self, name: &str, extension: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.data_dir.join(format!("{}{}", name, extension)))
    }
}

/// Rejects names that cannot be used as a single file name component.
fn validate_name(name: &str) -> Result<(), StoreError> {
    let single_component = Path::new(name)
        .file_name()
        .is_some_and(|component| component == name);
    if name.is_empty() || !single_component || name.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

//! CSV cache for the symbol directory (`code,name`).
//!
//! Codes are read as strings so leading zeros survive the round trip.

use std::fs;
use std::path::{Path, PathBuf};

use crate::market_data::directory::SymbolDirectoryEntry;
use crate::persist::types::{PersistError, PersistResult};

pub struct DirectoryCache {
    path: PathBuf,
}

impl DirectoryCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> PersistResult<Vec<SymbolDirectoryEntry>> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| PersistError::csv(&self.path, e))?;
        let entries = reader
            .deserialize::<SymbolDirectoryEntry>()
            .map(|row| row.map_err(|e| PersistError::csv(&self.path, e)))
            .collect::<PersistResult<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn write(&self, entries: &[SymbolDirectoryEntry]) -> PersistResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
        }

        let mut writer = csv::Writer::from_path(&self.path).map_err(|e| PersistError::csv(&self.path, e))?;
        for entry in entries {
            writer.serialize(entry).map_err(|e| PersistError::csv(&self.path, e))?;
        }
        writer.flush().map_err(|e| PersistError::io(&self.path, e))
    }
}

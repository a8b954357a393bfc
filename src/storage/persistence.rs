//! JSON file persistence for document stores

use crate::core::{Collection, DbError, Result};
use crate::storage::engine::PersistenceBackend;
use log::debug;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// ============================================================================
// Path handling
// ============================================================================

/// Expand a leading `~` to the current user's home directory.
///
/// Paths without a leading `~`, or when no home directory is known, are
/// returned unchanged. `~user` forms are not supported.
pub fn expand_home<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn home_dir() -> Option<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(var)
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

// ============================================================================
// JSON File Backend
// ============================================================================

/// Stores the whole collection as a single JSON object in one file.
///
/// Every save rewrites the file completely: the new content is written to a
/// temp file in the same directory, flushed and synced, then renamed over the
/// old file. Readers never observe a half-written file.
pub struct JsonFileBackend {
    path: PathBuf,
    pretty: bool,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P, pretty: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pretty,
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> DbError {
        DbError::CorruptStore {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn create_empty(&self) -> Result<()> {
        fs::create_dir_all(self.parent_dir())
            .map_err(|e| DbError::IoError(format!("Failed to create store directory: {}", e)))?;
        File::create(&self.path)
            .map_err(|e| DbError::IoError(format!("Failed to create store file: {}", e)))?;
        Ok(())
    }

    fn encode(&self, docs: &Collection) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let encoded = if self.pretty {
            let formatter = PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
            docs.serialize(&mut serializer)
        } else {
            serde_json::to_writer(&mut bytes, docs)
        };
        encoded.map_err(|e| DbError::IoError(format!("Failed to serialize store: {}", e)))?;
        Ok(bytes)
    }
}

impl PersistenceBackend for JsonFileBackend {
    fn load(&self) -> Result<Collection> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Store file {} not found, creating it", self.path.display());
                self.create_empty()?;
                return Ok(Collection::new());
            }
            Err(e) => {
                return Err(DbError::IoError(format!("Failed to read store file: {}", e)));
            }
        };

        if data.is_empty() {
            return Ok(Collection::new());
        }

        let value: serde_json::Value =
            serde_json::from_slice(&data).map_err(|e| self.corrupt(e.to_string()))?;
        Collection::from_json(value).map_err(|reason| self.corrupt(reason))
    }

    fn save(&self, docs: &Collection) -> Result<()> {
        let bytes = self.encode(docs)?;

        let dir = self.parent_dir();
        fs::create_dir_all(dir)
            .map_err(|e| DbError::IoError(format!("Failed to create store directory: {}", e)))?;
        let temp_file = NamedTempFile::new_in(dir)
            .map_err(|e| DbError::IoError(format!("Failed to create temp file: {}", e)))?;

        let mut writer = BufWriter::new(temp_file);
        writer.write_all(&bytes).map_err(|e| DbError::IoError(format!("Failed to write store: {}", e)))?;
        let temp_file = writer
            .into_inner()
            .map_err(|e| DbError::IoError(format!("Failed to flush store: {}", e.error())))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| DbError::IoError(format!("Failed to sync store: {}", e)))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| DbError::IoError(format!("Failed to rename store: {}", e.error)))?;

        debug!("Wrote {} documents ({} bytes) to {}", docs.len(), bytes.len(), self.path.display());
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

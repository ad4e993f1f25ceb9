//! Raw JSON persistence with file locking.
//!
//! Stores only move opaque JSON in and out. Turning that JSON into valid
//! exercises and day records is the job of the normalizers in
//! [`crate::catalog`] and [`crate::ledger`].

use crate::{Error, Result};
use fs2::FileExt;
use serde_json::Value;
use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::NamedTempFile;

/// Persistence provider for one keyed document
pub trait Store {
    /// Load the stored document; `None` when absent or unreadable.
    fn load(&self) -> Option<Value>;

    /// Replace the stored document.
    fn save(&mut self, raw: &Value) -> Result<()>;
}

/// JSON file store with shared/exclusive locking and atomic replace
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for JsonFileStore {
    /// Corrupt or unreadable files are logged and treated as absent.
    fn load(&self) -> Option<Value> {
        if !self.path.exists() {
            tracing::info!("No store file at {:?}", self.path);
            return None;
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open store file {:?}: {}", self.path, e);
                return None;
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock store file {:?}: {}", self.path, e);
            return None;
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read = reader.read_to_string(&mut contents);
        let _ = file.unlock();
        if let Err(e) = read {
            tracing::warn!("Failed to read store file {:?}: {}", self.path, e);
            return None;
        }

        match serde_json::from_str::<Value>(&contents) {
            Ok(value) => {
                tracing::debug!("Loaded store file {:?}", self.path);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Failed to parse store file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Writes to a temp file in the same directory, syncs, then renames
    /// over the original.
    fn save(&mut self, raw: &Value) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Other(format!("store path {:?} has no parent", self.path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(raw)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved store file {:?}", self.path);
        Ok(())
    }
}

/// In-memory store; clones share the same document.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    value: Rc<RefCell<Option<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            value: Rc::new(RefCell::new(Some(value))),
        }
    }

    /// Current document, as last saved.
    pub fn value(&self) -> Option<Value> {
        self.value.borrow().clone()
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Option<Value> {
        self.value()
    }

    fn save(&mut self, raw: &Value) -> Result<()> {
        *self.value.borrow_mut() = Some(raw.clone());
        Ok(())
    }
}

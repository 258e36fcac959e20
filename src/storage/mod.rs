use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

use crate::config::{app_config_path, config_env_dirs, ConfigPathError, APP_DIR};

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("failed to read preference store: {path}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write preference store: {path}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to parse preference store: {path}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Local persistent key-value storage for string preferences.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&mut self, key: &str) -> StorageResult<()>;
}

/// Flat JSON object of string values stored on disk.
///
/// Without a resolvable path every operation fails with
/// [`StorageError::MissingHomeDirectory`].
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: Option<PathBuf>,
}

impl JsonFileStore {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn with_default_path() -> Self {
        let (xdg_config_home, home) = config_env_dirs();
        Self::with_default_path_from(xdg_config_home.as_deref(), home.as_deref())
    }

    pub(crate) fn with_default_path_from(
        xdg_config_home: Option<&Path>,
        home: Option<&Path>,
    ) -> Self {
        match app_config_path(APP_DIR, PREFERENCES_FILE, xdg_config_home, home) {
            Ok(path) => Self::with_path(path),
            Err(ConfigPathError::MissingHomeDirectory) => {
                tracing::warn!("no config directory available; color mode will not persist");
                Self { path: None }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn require_path(&self) -> StorageResult<&Path> {
        self.path
            .as_deref()
            .ok_or(StorageError::MissingHomeDirectory)
    }

    fn load_entries(&self) -> StorageResult<BTreeMap<String, String>> {
        let path = self.require_path()?;
        let serialized = match fs::read_to_string(path) {
            Ok(serialized) => serialized,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if serialized.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&serialized).map_err(|source| StorageError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn store_entries(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let path = self.require_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let serialized =
            serde_json::to_string_pretty(entries).map_err(|source| StorageError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, serialized).map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Entries that fail to parse are replaced rather than preserved. The
    /// flag is set when the file was corrupt and must be rewritten.
    fn load_entries_for_update(&self) -> StorageResult<(BTreeMap<String, String>, bool)> {
        match self.load_entries() {
            Ok(entries) => Ok((entries, false)),
            Err(StorageError::Parse { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    err = %source,
                    "discarding unparseable preference store"
                );
                Ok((BTreeMap::new(), true))
            }
            Err(err) => Err(err),
        }
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.load_entries()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let (mut entries, healed) = self.load_entries_for_update()?;
        if !healed && entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        entries.insert(key.to_string(), value.to_string());
        self.store_entries(&entries)
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        if !self.require_path()?.exists() {
            return Ok(());
        }
        let (mut entries, healed) = self.load_entries_for_update()?;
        if entries.remove(key).is_none() && !healed {
            return Ok(());
        }
        self.store_entries(&entries)
    }
}

/// In-memory store. Clones share the same entries, so a store handed to a
/// dropped controller can be reused to simulate a reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        store
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.borrow().clone()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

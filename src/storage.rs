use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};

pub const STORE_FILE: &str = "config.json";

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The store file exists but does not hold a JSON object.
    Corrupt(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::Json(err) => write!(f, "json error: {err}"),
            StorageError::Corrupt(msg) => write!(f, "corrupt store: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Json(value)
    }
}

/// Key-value persistence port. Values are plain JSON; writes replace the whole value
/// under a key.
pub trait Store: Send + 'static {
    fn get(&self, key: &str, default: Value) -> Result<Value, StorageError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// All keys live in a single JSON object file that is rewritten on every `set`.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(root: &Path, filename: &str) -> Self {
        Self::new(root.join(filename))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn read_entries(&self) -> Result<Map<String, Value>, StorageError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        if buf.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&buf)? {
            Value::Object(entries) => Ok(entries),
            other => Err(StorageError::Corrupt(format!(
                "expected an object at the top level, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Keeps an unreadable store file next to the live one before it gets rewritten.
    fn set_aside(&self, error: &StorageError) -> Result<(), StorageError> {
        let mut name = self.path.clone().into_os_string();
        name.push(".corrupt");
        let backup = PathBuf::from(name);
        fs::copy(&self.path, &backup)?;
        log::warn!(
            "store file unreadable, starting over path={} backup={}: {error}",
            self.path.display(),
            backup.display()
        );
        Ok(())
    }

    fn write_atomic(&self, entries: &Map<String, Value>) -> Result<(), StorageError> {
        self.ensure_dirs()?;
        let temp_path = self.path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(entries)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, &self.path)?;
        Ok(())
    }
}

impl Store for FileStore {
    fn get(&self, key: &str, default: Value) -> Result<Value, StorageError> {
        let mut entries = self.read_entries()?;
        Ok(entries.remove(key).unwrap_or(default))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(error @ (StorageError::Json(_) | StorageError::Corrupt(_))) => {
                self.set_aside(&error)?;
                Map::new()
            }
            Err(error) => return Err(error),
        };
        entries.insert(key.to_string(), value);
        self.write_atomic(&entries)?;
        log::debug!("store write key={key} path={}", self.path.display());
        Ok(())
    }
}

/// In-memory store. Clones share the same entries, so a test can keep one handle
/// while the bridge owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: Value) -> Self {
        let store = Self::new();
        store.lock().insert(key.to_string(), value);
        store
    }

    pub fn entry(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str, default: Value) -> Result<Value, StorageError> {
        Ok(self.lock().get(key).cloned().unwrap_or(default))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Local settings blob - a small JSON key-value document on disk
//!
//! Read once at startup, written through on every change. Losing the file is
//! harmless: every value in it can be recomputed.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// JSON object file holding client-local settings
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl SettingsStore {
    /// Open the store at `path`; a missing file yields an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err(SettingsError::NotAnObject { path }),
                Err(source) => return Err(SettingsError::Parse { path, source }),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(io_err(&path, source)),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "settings loaded");

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode a value; absent or undecodable values yield `None`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let values = self.values.read();
        let value = values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring undecodable setting");
                None
            }
        }
    }

    /// Store a value and write the file
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        let value = serde_json::to_value(value)?;
        self.values.write().insert(key.to_string(), value);
        self.save()
    }

    /// Remove a value; returns whether it existed
    pub fn remove(&self, key: &str) -> Result<bool, SettingsError> {
        let existed = self.values.write().remove(key).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }

    /// Write the current document to disk (temp file + rename)
    pub fn save(&self) -> Result<(), SettingsError> {
        let bytes = {
            let values = self.values.read();
            serde_json::to_vec_pretty(&*values)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_err(parent, source))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|source| io_err(&tmp, source))?;
        fs::rename(&tmp, &self.path).map_err(|source| io_err(&self.path, source))?;
        Ok(())
    }
}

fn io_err(path: &Path, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Settings store errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("settings file {path} must contain a JSON object")]
    NotAnObject { path: PathBuf },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

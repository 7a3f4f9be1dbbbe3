use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bridge::DEFAULT_DATA_KEY;
use crate::storage::{StorageError, STORE_FILE};

pub const SETTINGS_FILE: &str = "settings.json";
const SETTINGS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// File inside the app data dir that backs the key-value store.
    #[serde(default = "default_store_file")]
    pub store_file: String,
    /// Key the group collection is stored under.
    #[serde(default = "default_data_key")]
    pub data_key: String,
    /// How long the "all tasks done" banner stays up.
    #[serde(default = "default_congratulations_ms")]
    pub congratulations_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
            data_key: default_data_key(),
            congratulations_ms: default_congratulations_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SettingsFile {
    pub schema_version: u32,
    #[serde(default)]
    pub settings: Settings,
}

fn default_store_file() -> String {
    STORE_FILE.to_string()
}

fn default_data_key() -> String {
    DEFAULT_DATA_KEY.to_string()
}

fn default_congratulations_ms() -> u64 {
    5_000
}

/// Reads `settings.json` from `root`. A missing file is written out with the defaults so
/// it can be edited by hand; an unreadable one is logged and left alone.
pub fn load_settings(root: &Path) -> Settings {
    match read_settings(root) {
        Ok(Some(file)) => file.settings,
        Ok(None) => {
            let settings = Settings::default();
            if let Err(error) = save_settings(root, &settings) {
                log::warn!("failed to write default settings: {error}");
            }
            settings
        }
        Err(error) => {
            log::warn!("settings unreadable, using defaults: {error}");
            Settings::default()
        }
    }
}

fn read_settings(root: &Path) -> Result<Option<SettingsFile>, StorageError> {
    let text = match fs::read_to_string(root.join(SETTINGS_FILE)) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_str(&text)?))
}

pub fn save_settings(root: &Path, settings: &Settings) -> Result<(), StorageError> {
    fs::create_dir_all(root)?;
    let file = SettingsFile {
        schema_version: SETTINGS_SCHEMA_VERSION,
        settings: settings.clone(),
    };
    fs::write(root.join(SETTINGS_FILE), serde_json::to_vec_pretty(&file)?)?;
    Ok(())
}

//! Configuration loading and data folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(folder) = config.get("data_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/webmatch/config.toml first, then /etc/webmatch/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("webmatch").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/webmatch/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("webmatch").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("webmatch"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\webmatch"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("webmatch"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/webmatch"))
    } else if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("webmatch"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/webmatch"))
    } else {
        PathBuf::from("./webmatch_data")
    }
}

/// Prepares the resolved data folder for use: creates it if missing and
/// derives the well-known paths inside it.
#[derive(Debug, Clone)]
pub struct DataFolderInitializer {
    folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(folder: PathBuf) -> Self {
        Self { folder }
    }

    /// Create the data folder (and parents) if it does not exist yet
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.folder.exists() {
            std::fs::create_dir_all(&self.folder)?;
            tracing::info!("Created data folder: {}", self.folder.display());
        }
        Ok(())
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of the SQLite database inside the data folder
    pub fn database_path(&self) -> PathBuf {
        self.folder.join("webmatch.db")
    }

    /// Path of the service TOML config inside the data folder
    pub fn config_path(&self) -> PathBuf {
        self.folder.join("webmatch.toml")
    }
}

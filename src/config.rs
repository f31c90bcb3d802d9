//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Copy/move/delete batches
    pub transfer: TransferConfig,
    /// Remote (SFTP) sessions
    pub remote: RemoteConfig,
    /// Mounted archives
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Show hidden files (starting with .)
    pub show_hidden: bool,
    /// Largest file `open` will read into memory
    pub max_open_bytes: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            show_hidden: true,
            max_open_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Concurrent copy jobs (0 = number of CPUs)
    pub workers: usize,
    /// Buffer size for streamed copies, in bytes
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            chunk_size: crate::fs::utils::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TransferConfig {
    /// Worker count with the CPU-count default applied
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Timeout for every SFTP round trip, in milliseconds (0 = none)
    pub timeout_ms: u32,
    /// TCP connect timeout, in milliseconds
    pub connect_timeout_ms: u64,
    /// Private key tried when no password is given and the agent fails
    pub identity_file: Option<PathBuf>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            connect_timeout_ms: 10_000,
            identity_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Keep decompressed entry contents after the first read
    pub cache_entries: bool,
    /// Entries larger than this are never cached
    pub cache_max_entry_bytes: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            cache_entries: false,
            cache_max_entry_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Get the config directory path for the current platform
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("twinpane"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        // Check XDG_CONFIG_HOME first, then fall back to ~/.config
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
            .map(|p| p.join("twinpane"))
    }
}

/// Get the config file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Default config file contents, written on first run
pub fn default_config() -> String {
    r##"# twinpane configuration

[general]
# Show hidden files (starting with .)
show_hidden = true
# Largest file the `open` command reads into memory (bytes)
max_open_bytes = 1048576

[transfer]
# Concurrent copy jobs (0 = number of CPUs)
workers = 0
# Buffer size for streamed copies (bytes)
chunk_size = 65536

[remote]
# Timeout for each SFTP round trip (milliseconds, 0 = none)
timeout_ms = 15000
connect_timeout_ms = 10000
# Key tried when no password is given and the SSH agent has none
# identity_file = "/home/user/.ssh/id_ed25519"

[archive]
# Cache decompressed archive entries after the first read
cache_entries = false
cache_max_entry_bytes = 8388608
"##
    .to_string()
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Self {
        let Some(config_path) = config_file() else {
            log::warn!("could not determine config directory, using defaults");
            return Config::default();
        };

        if let Some(config_dir) = config_path.parent()
            && !config_dir.exists()
            && let Err(e) = fs::create_dir_all(config_dir)
        {
            log::warn!("could not create config directory: {}", e);
            return Config::default();
        }

        if !config_path.exists()
            && let Err(e) = fs::write(&config_path, default_config())
        {
            log::warn!("could not create config file: {}", e);
            return Config::default();
        }

        match Self::from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}; using default configuration", e);
                Config::default()
            }
        }
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> AppResult<Self> {
        toml_edit::de::from_str(content)
            .map_err(|e| AppError::Config(format!("could not parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_parses_to_defaults() {
        let parsed = Config::parse(&default_config()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.general.max_open_bytes, defaults.general.max_open_bytes);
        assert_eq!(parsed.transfer.chunk_size, defaults.transfer.chunk_size);
        assert_eq!(parsed.remote.timeout_ms, defaults.remote.timeout_ms);
        assert_eq!(parsed.archive.cache_entries, defaults.archive.cache_entries);
        assert!(parsed.remote.identity_file.is_none());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let parsed = Config::parse("[transfer]\nworkers = 3\n").unwrap();
        assert_eq!(parsed.transfer.workers, 3);
        assert_eq!(parsed.transfer.effective_workers(), 3);
        assert_eq!(parsed.transfer.chunk_size, crate::fs::utils::DEFAULT_CHUNK_SIZE);
        assert!(parsed.general.show_hidden);
    }

    #[test]
    fn test_zero_workers_means_cpu_count() {
        let cfg = TransferConfig { workers: 0, chunk_size: 1 };
        assert!(cfg.effective_workers() >= 1);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let err = Config::parse("[transfer]\nworkers = \"many\"\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[archive]\ncache_entries = true\n").unwrap();
        let cfg = Config::from_file(&path).unwrap();
        assert!(cfg.archive.cache_entries);
    }
}

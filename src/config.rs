//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\songbook\config.toml
//! - macOS: ~/Library/Application Support/songbook/config.toml
//! - Linux: ~/.config/songbook/config.toml
//!
//! The file is human-readable and editable. It is read once at startup;
//! shuffle and party settings are written back when the app quits.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::PartySource;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library settings
    pub library: LibraryConfig,

    /// Playback mode settings
    pub player: PlayerConfig,

    /// Main window geometry, kept for front ends that have one
    pub window: WindowConfig,

    /// Browsing view settings
    pub view: ViewConfig,
}

/// Library settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Folders scanned for music
    pub music_paths: Vec<PathBuf>,

    /// Scan the library when the app starts
    pub startup_scan: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            music_paths: dirs::audio_dir().into_iter().collect(),
            startup_scan: true,
        }
    }
}

/// Playback mode settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub shuffle: bool,

    pub party: bool,

    /// What party mode picks from: `"popular"` and/or genre ids
    pub party_ids: Vec<PartySource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            maximized: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Browse by artist only, without the genre column
    pub hide_genres: bool,
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("songbook"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the standard location.
///
/// Returns default config if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!(target: "config", "Could not determine config directory, using defaults");
            Config::default()
        }
    }
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!(target: "config", path = %path.display(), "No config file found, using defaults");
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!(target: "config", path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                tracing::error!(target: "config", path = %path.display(), error = %e, "Failed to parse config file");
                tracing::warn!(target: "config", "Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!(target: "config", path = %path.display(), error = %e, "Failed to read config file");
            Config::default()
        }
    }
}

/// Save configuration to the standard location.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)
}

/// Save configuration to a specific file.
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!(target: "config", path = %path.display(), "Saved config");
    Ok(())
}

/// Save configuration without blocking the event loop.
pub async fn save_async(config: Config, path: PathBuf) -> Result<(), ConfigError> {
    tokio::task::spawn_blocking(move || save_to(&config, &path))
        .await
        .map_err(|e| ConfigError::TaskJoin(e.to_string()))?
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[library]"));
        assert!(toml.contains("[player]"));
        assert!(toml.contains("[window]"));
        assert!(toml.contains("[view]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.library.music_paths = vec![PathBuf::from("/music")];
        config.player.shuffle = true;
        config.player.party_ids = vec![PartySource::Popular, PartySource::Genre(4)];
        config.window.maximized = true;

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[player]
party = true
party_ids = ["popular", 2]
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert!(config.player.party);
        assert_eq!(
            config.player.party_ids,
            vec![PartySource::Popular, PartySource::Genre(2)]
        );

        // Other fields use defaults
        assert!(!config.player.shuffle);
        assert!(config.library.startup_scan);
        assert_eq!(config.window.width, 800);
        assert!(!config.view.hide_genres);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.library.startup_scan = false;
        config.view.hide_genres = true;
        save_to(&config, &path).unwrap();

        assert!(!path.with_extension("toml.tmp").exists());
        assert_eq!(load_from(&path), config);
    }

    #[test]
    fn test_broken_or_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.toml");
        assert_eq!(load_from(&missing), Config::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[player\nshuffle = ").unwrap();
        assert_eq!(load_from(&broken), Config::default());
    }
}

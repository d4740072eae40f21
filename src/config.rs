//! Loader Configuration
//!
//! Handles parsing and management of drt.toml configuration files and the
//! `DRT_LIB_DIR` / `DRT_LIB_NAME` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`LoaderConfig::find_and_load`].
pub const CONFIG_FILE_NAME: &str = "drt.toml";

/// Environment variable naming the directory that holds the native library.
pub const ENV_LIB_DIR: &str = "DRT_LIB_DIR";

/// Environment variable overriding the library stem.
pub const ENV_LIB_NAME: &str = "DRT_LIB_NAME";

/// Library stem used when nothing else is configured.
pub const DEFAULT_LIBRARY_NAME: &str = "divvun_runtime";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching drt.toml.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Native library location
    #[serde(default)]
    pub library: LibraryConfig,
}

/// The `[library]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Directory containing the library file. When absent the platform
    /// loader's own search path is used.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Library stem, without `lib` prefix or platform extension
    #[serde(default = "default_library_name")]
    pub name: String,
}

fn default_library_name() -> String {
    DEFAULT_LIBRARY_NAME.to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dir: None,
            name: default_library_name(),
        }
    }
}

impl LoaderConfig {
    /// Configuration pointing at an explicit library directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library: LibraryConfig {
                dir: Some(dir.into()),
                ..LibraryConfig::default()
            },
        }
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Nearest drt.toml at or above `start_dir` (defaults if none), with
    /// environment overrides applied on top.
    pub fn discover(start_dir: &Path) -> ConfigResult<Self> {
        Ok(Self::find_and_load(start_dir)?.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Defaults overridden by `DRT_LIB_DIR` and `DRT_LIB_NAME`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply environment-style overrides from `lookup`. Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_LIB_DIR).filter(|v| !v.is_empty()) {
            self.library.dir = Some(PathBuf::from(dir));
        }
        if let Some(name) = lookup(ENV_LIB_NAME).filter(|v| !v.is_empty()) {
            self.library.name = name;
        }
        self
    }

    /// Platform-specific file name of the configured library.
    pub fn file_name(&self) -> String {
        library_filename(&self.library.name)
    }

    /// Path handed to the platform loader.
    pub fn library_path(&self) -> PathBuf {
        match &self.library.dir {
            Some(dir) => dir.join(self.file_name()),
            None => PathBuf::from(self.file_name()),
        }
    }
}

/// Construct the platform-specific library filename
pub fn library_filename(name: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        if name.ends_with(".dll") {
            name.to_string()
        } else {
            format!("{}.dll", name)
        }
    }

    #[cfg(target_os = "macos")]
    {
        if name.starts_with("lib") && name.ends_with(".dylib") {
            name.to_string()
        } else {
            format!("lib{}.dylib", name)
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if name.starts_with("lib") && name.ends_with(".so") {
            name.to_string()
        } else {
            format!("lib{}.so", name)
        }
    }
}

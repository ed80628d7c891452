//! User configuration management
//!
//! This module handles reading and writing UnityPM configuration files.
//! Configuration is stored in TOML format at `~/.unitypm/config.toml`.
//!
//! # Examples
//!
//! ```no_run
//! use unitypm::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load()?;
//! println!("Known repositories: {}", config.repositories.len());
//!
//! config.catalog.show_prerelease = true;
//! config.save()?;
//! # Ok(())
//! # }
//! ```

use crate::catalog::{CatalogSettings, CURATED_REPOSITORY, OFFICIAL_REPOSITORY};
use crate::compatibility::{CompatibilityRules, UnityPinRule};
use crate::version::UnityVersion;
use crate::{Error, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User configuration file (`~/.unitypm/config.toml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Catalog visibility settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Repository listings, in preference order
    #[serde(default = "default_repositories")]
    pub repositories: Vec<RepositoryConfig>,

    /// Local package directories, each containing a `package.json`
    #[serde(default)]
    pub user_packages: Vec<PathBuf>,

    /// Where package payloads are unpacked (`<cache>/<name>/<version>/`)
    #[serde(default = "default_package_cache_dir")]
    pub package_cache_dir: PathBuf,

    #[serde(default)]
    pub compatibility: CompatibilityConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub show_prerelease: bool,

    #[serde(default)]
    pub hide_local_user_packages: bool,

    /// Repository ids whose packages are not offered
    #[serde(default)]
    pub hidden_repositories: IndexSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    pub name: String,
    /// Cached repository listing, relative paths are resolved against the config directory
    pub path: PathBuf,
}

/// Extra Unity pin rules appended to the built-in exceptions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    #[serde(default)]
    pub rules: Vec<UnityPinRule>,
}

fn default_repositories() -> Vec<RepositoryConfig> {
    vec![
        RepositoryConfig {
            id: OFFICIAL_REPOSITORY.to_string(),
            name: "Official".to_string(),
            path: PathBuf::from("repos/vrc-official.json"),
        },
        RepositoryConfig {
            id: CURATED_REPOSITORY.to_string(),
            name: "Curated".to_string(),
            path: PathBuf::from("repos/vrc-curated.json"),
        },
    ]
}

fn default_package_cache_dir() -> PathBuf {
    Config::config_dir()
        .map(|dir| dir.join("packages"))
        .unwrap_or_else(|_| PathBuf::from("packages"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            repositories: default_repositories(),
            user_packages: Vec::new(),
            package_cache_dir: default_package_cache_dir(),
            compatibility: CompatibilityConfig::default(),
        }
    }
}

impl Config {
    /// Configuration directory
    ///
    /// Uses UNITYPM_CONFIG_DIR if set, otherwise ~/.unitypm
    pub fn config_dir() -> Result<PathBuf> {
        // Check for custom config directory (useful for testing)
        if let Ok(config_dir) = std::env::var("UNITYPM_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not find home directory".to_string()))?;
        Ok(home.join(".unitypm"))
    }

    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default path, or defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Absolute location of a repository listing
    pub fn repository_path(&self, repository: &RepositoryConfig) -> PathBuf {
        if repository.path.is_absolute() {
            return repository.path.clone();
        }
        match Self::config_dir() {
            Ok(dir) => dir.join(&repository.path),
            Err(_) => repository.path.clone(),
        }
    }

    /// Catalog settings for a project targeting `unity`
    pub fn catalog_settings(&self, unity: Option<UnityVersion>) -> CatalogSettings {
        CatalogSettings {
            hidden_repositories: self.catalog.hidden_repositories.clone(),
            hide_local_user_packages: self.catalog.hide_local_user_packages,
            show_prerelease: self.catalog.show_prerelease,
            repository_order: self.repositories.iter().map(|r| r.id.clone()).collect(),
            unity,
            compatibility: CompatibilityRules::with_extra(self.compatibility.rules.iter().cloned()),
        }
    }
}

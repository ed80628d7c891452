//! Installed-package record for a project
//!
//! This module handles `unitypm.lock`, the TOML file recording which packages
//! are installed in a project, at which version, and whether the user asked
//! for them or they were pulled in as dependencies.
//!
//! The lockfile is only ever written by the applier, after package files are
//! in place. Writes go through a temporary file that is renamed over the old
//! one.
//!
//! # Examples
//!
//! ```no_run
//! use unitypm::Lockfile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let lockfile = Lockfile::load_from("MyProject/unitypm.lock")?.unwrap_or_default();
//! for (name, locked) in &lockfile.packages {
//!     println!("{} {}", name, locked.version);
//! }
//! # Ok(())
//! # }
//! ```

use crate::io::InstalledState;
use crate::package::InstalledPackage;
use crate::version::{DependencyRange, UnityVersion, Version};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

/// The lockfile filename
pub const LOCKFILE_NAME: &str = "unitypm.lock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(rename = "metadata")]
    pub metadata: LockfileMetadata,

    /// Map of package name to locked package info
    #[serde(rename = "package", default)]
    pub packages: BTreeMap<String, LockedPackage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockfileMetadata {
    /// Version of UnityPM that wrote this lockfile
    pub unitypm_version: String,

    /// RFC 3339 timestamp of the last write
    pub generated_at: String,

    /// Editor version of the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unity: Option<UnityVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub version: Version,

    #[serde(default)]
    pub requested: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub yanked: bool,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub legacy_packages: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub aliases: BTreeSet<String>,

    /// Dependency ranges (name -> range)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, DependencyRange>,
}

impl LockedPackage {
    fn from_installed(installed: &InstalledPackage) -> Self {
        Self {
            version: installed.version.clone(),
            requested: installed.requested,
            dependencies: installed.dependencies.clone(),
            legacy_packages: installed.legacy_packages.clone(),
            aliases: installed.aliases.clone(),
            yanked: installed.is_yanked,
        }
    }

    fn to_installed(&self, name: &str) -> InstalledPackage {
        InstalledPackage {
            name: name.to_string(),
            version: self.version.clone(),
            requested: self.requested,
            dependencies: self.dependencies.clone(),
            legacy_packages: self.legacy_packages.clone(),
            aliases: self.aliases.clone(),
            is_yanked: self.yanked,
        }
    }
}

impl Lockfile {
    pub fn new() -> Self {
        Self {
            metadata: LockfileMetadata {
                unitypm_version: env!("CARGO_PKG_VERSION").to_string(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                unity: None,
            },
            packages: BTreeMap::new(),
        }
    }

    /// Lockfile describing `state`
    pub fn from_state(state: &InstalledState) -> Self {
        let mut lockfile = Self::new();
        lockfile.metadata.unity = state.unity;
        lockfile.packages = state
            .packages
            .values()
            .map(|p| (p.name.clone(), LockedPackage::from_installed(p)))
            .collect();
        lockfile
    }

    pub fn to_state(&self) -> InstalledState {
        InstalledState {
            unity: self.metadata.unity,
            packages: self
                .packages
                .iter()
                .map(|(name, locked)| (name.clone(), locked.to_installed(name)))
                .collect(),
        }
    }

    /// Load a lockfile, `None` when the file does not exist
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)?;
        let lockfile: Lockfile = toml::from_str(&contents)
            .map_err(|e| Error::InvalidLockfile(format!("{}: {}", path.display(), e)))?;

        Ok(Some(lockfile))
    }

    /// Write the lockfile through a temporary file in the same directory
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let toml_string = toml::to_string_pretty(self)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(toml_string.as_bytes())?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}

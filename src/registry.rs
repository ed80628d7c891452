//! Package listings from cached repository files
//!
//! [`FileRegistry`] reads VPM repository listings that were already fetched
//! to disk, plus local user package directories, and flattens them into
//! [`SourcedPackage`]s for the catalog. Fetching is someone else's job.
//!
//! # Examples
//!
//! ```no_run
//! use unitypm::{Catalog, CatalogSettings, FileRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = FileRegistry::new();
//! registry.add_repository("com.example.repo", "Example", "repos/example.json");
//! registry.add_user_package("/home/me/MyPackage");
//!
//! let listings = registry.load()?;
//! let catalog = Catalog::build(&listings.packages, &CatalogSettings::default());
//! println!("{} packages", catalog.len());
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::package::{PackageInfo, PackageSource, SourcedPackage};
use crate::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of a package manifest inside a package directory
pub const PACKAGE_MANIFEST: &str = "package.json";

/// On-disk VPM repository listing
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub packages: BTreeMap<String, RepositoryPackage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPackage {
    /// Raw manifests by version, parsed one by one so a bad entry only skips itself
    #[serde(default)]
    pub versions: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
struct RepositorySource {
    id: String,
    name: String,
    path: PathBuf,
}

/// Everything a registry produced
#[derive(Debug, Clone, Default)]
pub struct Listings {
    pub packages: Vec<SourcedPackage>,
    /// Repository ids in declared order
    pub repository_order: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    repositories: Vec<RepositorySource>,
    user_packages: Vec<PathBuf>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry over the repositories and user packages in `config`
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for repository in &config.repositories {
            registry.add_repository(
                repository.id.clone(),
                repository.name.clone(),
                config.repository_path(repository),
            );
        }
        for dir in &config.user_packages {
            registry.add_user_package(dir.clone());
        }
        registry
    }

    pub fn add_repository(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) {
        self.repositories.push(RepositorySource {
            id: id.into(),
            name: name.into(),
            path: path.into(),
        });
    }

    pub fn add_user_package(&mut self, dir: impl Into<PathBuf>) {
        self.user_packages.push(dir.into());
    }

    /// Read every configured source
    ///
    /// Missing files are skipped with a warning. A listing that is present
    /// but not valid JSON is an error.
    pub fn load(&self) -> Result<Listings> {
        let mut listings = Listings::default();

        for repository in &self.repositories {
            listings.repository_order.push(repository.id.clone());

            if !repository.path.exists() {
                warn!(
                    "repository {} has no cached listing at {}",
                    repository.id,
                    repository.path.display()
                );
                continue;
            }

            let packages = load_repository(repository)?;
            debug!("{}: {} package versions", repository.id, packages.len());
            listings.packages.extend(packages);
        }

        for dir in &self.user_packages {
            match load_user_package(dir)? {
                Some(package) if !package.has_valid_name() => warn!(
                    "skipping user package {}: invalid package name {:?}",
                    dir.display(),
                    package.name
                ),
                Some(package) => listings
                    .packages
                    .push(SourcedPackage::new(package, PackageSource::local(dir))),
                None => warn!("no {} in user package {}", PACKAGE_MANIFEST, dir.display()),
            }
        }

        Ok(listings)
    }
}

fn load_repository(repository: &RepositorySource) -> Result<Vec<SourcedPackage>> {
    let content = fs::read_to_string(&repository.path)?;
    let file: RepositoryFile = serde_json::from_str(&content)?;

    if let Some(id) = file.id.as_deref().filter(|id| *id != repository.id) {
        debug!("listing {} declares id {}", repository.id, id);
    }

    let source = PackageSource::remote(
        repository.id.clone(),
        file.name.clone().unwrap_or_else(|| repository.name.clone()),
    );

    let mut packages = Vec::new();
    for (name, package) in file.packages {
        for (version, manifest) in package.versions {
            match serde_json::from_value::<PackageInfo>(manifest) {
                Ok(info) if !info.has_valid_name() => {
                    warn!("skipping {:?} in {}: invalid package name", info.name, repository.id)
                }
                Ok(info) => packages.push(SourcedPackage::new(info, source.clone())),
                Err(e) => warn!("skipping {}@{} in {}: {}", name, version, repository.id, e),
            }
        }
    }

    Ok(packages)
}

/// Manifest of a local package directory, `None` without a `package.json`
pub fn load_user_package(dir: &Path) -> Result<Option<PackageInfo>> {
    let manifest = dir.join(PACKAGE_MANIFEST);
    if !manifest.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(manifest)?;
    Ok(Some(serde_json::from_str(&content)?))
}

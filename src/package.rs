//! Package metadata, package sources and installed-package records
//!
//! [`PackageInfo`] mirrors the fields of a VPM `package.json` that matter for
//! resolution. Repository listings and local user packages deserialize
//! straight into it.

use crate::version::{DependencyRange, UnityVersion, Version};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

/// Whether `name` can be used as a single directory name under `Packages/`
///
/// Rejects empty names, separators and anything that is not one normal path
/// component (`..`, `.`, absolute or prefixed paths).
pub fn is_valid_package_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

/// One version of a package as published by a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub version: Version,

    /// Minimum compatible Unity editor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unity: Option<UnityVersion>,

    #[serde(default)]
    pub vpm_dependencies: BTreeMap<String, DependencyRange>,

    /// Packages this version supersedes
    #[serde(default)]
    pub legacy_packages: BTreeSet<String>,

    /// Project-relative folders to delete on install (path -> GUID)
    #[serde(default)]
    pub legacy_folders: BTreeMap<PathBuf, Option<String>>,

    /// Project-relative files to delete on install (path -> GUID)
    #[serde(default)]
    pub legacy_files: BTreeMap<PathBuf, Option<String>>,

    #[serde(default)]
    pub aliases: BTreeSet<String>,

    #[serde(default, alias = "yanked")]
    pub is_yanked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
}

impl PackageInfo {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            version,
            unity: None,
            vpm_dependencies: BTreeMap::new(),
            legacy_packages: BTreeSet::new(),
            legacy_folders: BTreeMap::new(),
            legacy_files: BTreeMap::new(),
            aliases: BTreeSet::new(),
            is_yanked: false,
            changelog_url: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_unity(mut self, unity: UnityVersion) -> Self {
        self.unity = Some(unity);
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>, range: DependencyRange) -> Self {
        self.vpm_dependencies.insert(name.into(), range);
        self
    }

    pub fn with_legacy_package(mut self, name: impl Into<String>) -> Self {
        self.legacy_packages.insert(name.into());
        self
    }

    pub fn with_legacy_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_folders.insert(path.into(), None);
        self
    }

    pub fn with_legacy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_files.insert(path.into(), None);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn yanked(mut self) -> Self {
        self.is_yanked = true;
        self
    }

    /// Name shown to users, falling back to the package id
    pub fn display_name_or_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn has_valid_name(&self) -> bool {
        is_valid_package_name(&self.name)
    }
}

/// Where a package listing came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackageSource {
    /// A package directory registered by the user
    LocalUser { path: PathBuf },
    /// A repository listing
    Remote {
        repository_id: String,
        repository_display_name: String,
    },
}

impl PackageSource {
    pub fn remote(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        PackageSource::Remote {
            repository_id: id.into(),
            repository_display_name: display_name.into(),
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        PackageSource::LocalUser { path: path.into() }
    }

    /// Label used when listing the sources of a package
    pub fn label(&self) -> &str {
        match self {
            PackageSource::LocalUser { .. } => "User",
            PackageSource::Remote {
                repository_display_name,
                ..
            } => repository_display_name,
        }
    }

    pub fn is_local_user(&self) -> bool {
        matches!(self, PackageSource::LocalUser { .. })
    }

    pub fn repository_id(&self) -> Option<&str> {
        match self {
            PackageSource::LocalUser { .. } => None,
            PackageSource::Remote { repository_id, .. } => Some(repository_id),
        }
    }
}

/// A package listing tagged with its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedPackage {
    pub package: PackageInfo,
    pub source: PackageSource,
}

impl SourcedPackage {
    pub fn new(package: PackageInfo, source: PackageSource) -> Self {
        Self { package, source }
    }
}

/// A package currently installed in a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: Version,

    /// Explicitly requested by the user, as opposed to pulled in as a dependency
    #[serde(default)]
    pub requested: bool,

    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyRange>,

    #[serde(default)]
    pub legacy_packages: BTreeSet<String>,

    #[serde(default)]
    pub aliases: BTreeSet<String>,

    #[serde(default)]
    pub is_yanked: bool,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            requested: false,
            dependencies: BTreeMap::new(),
            legacy_packages: BTreeSet::new(),
            aliases: BTreeSet::new(),
            is_yanked: false,
        }
    }

    /// Record for a package about to be installed
    pub fn from_info(info: &PackageInfo, requested: bool) -> Self {
        Self {
            name: info.name.clone(),
            version: info.version.clone(),
            requested,
            dependencies: info.vpm_dependencies.clone(),
            legacy_packages: info.legacy_packages.clone(),
            aliases: info.aliases.clone(),
            is_yanked: info.is_yanked,
        }
    }

    pub fn requested(mut self) -> Self {
        self.requested = true;
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>, range: DependencyRange) -> Self {
        self.dependencies.insert(name.into(), range);
        self
    }

    pub fn with_legacy_package(mut self, name: impl Into<String>) -> Self {
        self.legacy_packages.insert(name.into());
        self
    }
}

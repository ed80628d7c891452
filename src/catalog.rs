//! Package catalog aggregation
//!
//! The catalog folds flat repository listings into one entry per package
//! name, split into versions usable with the project's Unity editor and
//! versions that are not. A catalog is an immutable snapshot: to pick up new
//! listings or settings, build a new one.
//!
//! # Examples
//!
//! ```
//! use unitypm::{Catalog, CatalogSettings, PackageInfo, PackageSource, SourcedPackage, Version};
//!
//! let listings = vec![SourcedPackage::new(
//!     PackageInfo::new("com.example.tool", Version::new(1, 0, 0)),
//!     PackageSource::remote("com.example.repo", "Example"),
//! )];
//!
//! let catalog = Catalog::build(&listings, &CatalogSettings::default());
//! let latest = catalog.latest_compatible("com.example.tool").unwrap();
//! assert_eq!(latest.version, Version::new(1, 0, 0));
//! ```

use crate::compatibility::CompatibilityRules;
use crate::package::{InstalledPackage, PackageInfo, PackageSource, SourcedPackage};
use crate::project::ProjectState;
use crate::resolver::{AVATARS_SDK, WORLDS_SDK};
use crate::version::{DependencyRange, UnityVersion, Version};
use indexmap::IndexSet;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Repository id of the official VRChat repository
pub const OFFICIAL_REPOSITORY: &str = "com.vrchat.repos.official";

/// Repository id of the curated VRChat repository
pub const CURATED_REPOSITORY: &str = "com.vrchat.repos.curated";

/// Visibility and compatibility context for a catalog build
#[derive(Debug, Clone, Default)]
pub struct CatalogSettings {
    pub hidden_repositories: IndexSet<String>,
    pub hide_local_user_packages: bool,
    pub show_prerelease: bool,
    /// User-defined repository ids in declared order
    pub repository_order: Vec<String>,
    /// Project editor version, `None` outside of a project
    pub unity: Option<UnityVersion>,
    pub compatibility: CompatibilityRules,
}

/// One version of a package and every source offering it
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogVersion {
    pub package: PackageInfo,
    pub sources: Vec<PackageSource>,
}

/// All known versions of one package
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub aliases: BTreeSet<String>,
    /// Version the display metadata was taken from
    pub info_version: Version,
    pub sources: BTreeSet<String>,
    unity_compatible: BTreeMap<Version, CatalogVersion>,
    unity_incompatible: BTreeMap<Version, CatalogVersion>,
}

impl CatalogEntry {
    fn new(package: &PackageInfo) -> Self {
        Self {
            name: package.name.clone(),
            display_name: package.display_name_or_name().to_string(),
            description: package.description.clone().unwrap_or_default(),
            aliases: package.aliases.clone(),
            info_version: package.version.clone(),
            sources: BTreeSet::new(),
            unity_compatible: BTreeMap::new(),
            unity_incompatible: BTreeMap::new(),
        }
    }

    /// Compatible versions, newest first
    pub fn compatible_versions(&self) -> impl Iterator<Item = &CatalogVersion> {
        self.unity_compatible.values().rev()
    }

    /// Incompatible versions, newest first
    pub fn incompatible_versions(&self) -> impl Iterator<Item = &CatalogVersion> {
        self.unity_incompatible.values().rev()
    }

    pub fn latest_compatible(&self) -> Option<&PackageInfo> {
        self.compatible_versions().next().map(|v| &v.package)
    }

    pub fn latest_incompatible(&self) -> Option<&PackageInfo> {
        self.incompatible_versions().next().map(|v| &v.package)
    }

    /// True when a newer version exists that the project's editor cannot use
    pub fn has_incompatible_newer(&self) -> bool {
        match (self.latest_compatible(), self.latest_incompatible()) {
            (Some(compatible), Some(incompatible)) => incompatible.version > compatible.version,
            _ => false,
        }
    }

    pub fn get(&self, version: &Version) -> Option<&CatalogVersion> {
        self.unity_compatible
            .get(version)
            .or_else(|| self.unity_incompatible.get(version))
    }

    pub fn is_compatible_version(&self, version: &Version) -> bool {
        self.unity_compatible.contains_key(version)
    }

    fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.display_name.to_lowercase().contains(query)
            || self.aliases.iter().any(|a| a.to_lowercase().contains(query))
    }
}

/// Immutable snapshot of every visible package version
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
    yanked: BTreeMap<String, BTreeMap<Version, SourcedPackage>>,
    /// Names with at least one non-yanked listing, hidden sources included
    known: BTreeSet<String>,
    unity: Option<UnityVersion>,
    compatibility: CompatibilityRules,
    show_prerelease: bool,
}

impl Catalog {
    /// Build a catalog from flat listings
    pub fn build(listings: &[SourcedPackage], settings: &CatalogSettings) -> Self {
        let mut yanked: BTreeMap<String, BTreeMap<Version, SourcedPackage>> = BTreeMap::new();
        let mut known = BTreeSet::new();
        let mut per_repository: BTreeMap<&str, Vec<&SourcedPackage>> = BTreeMap::new();
        let mut user_packages = Vec::new();

        for listing in listings {
            let package = &listing.package;
            if !settings.show_prerelease && package.version.is_prerelease() {
                continue;
            }

            if package.is_yanked {
                yanked
                    .entry(package.name.clone())
                    .or_default()
                    .entry(package.version.clone())
                    .or_insert_with(|| listing.clone());
                continue;
            }

            known.insert(package.name.clone());

            match &listing.source {
                PackageSource::LocalUser { .. } => {
                    if !settings.hide_local_user_packages {
                        user_packages.push(listing);
                    }
                }
                PackageSource::Remote { repository_id, .. } => {
                    if !settings.hidden_repositories.contains(repository_id) {
                        per_repository
                            .entry(repository_id.as_str())
                            .or_default()
                            .push(listing);
                    }
                }
            }
        }

        let mut catalog = Catalog {
            entries: BTreeMap::new(),
            yanked,
            known,
            unity: settings.unity,
            compatibility: settings.compatibility.clone(),
            show_prerelease: settings.show_prerelease,
        };

        let mut visit = |group: Vec<&SourcedPackage>, catalog: &mut Catalog| {
            let mut group = group;
            group.sort_by(|a, b| {
                a.package
                    .name
                    .cmp(&b.package.name)
                    .then(b.package.version.cmp(&a.package.version))
            });
            for listing in group {
                catalog.merge(listing);
            }
        };

        // predefined repositories, then local user packages
        for id in [OFFICIAL_REPOSITORY, CURATED_REPOSITORY] {
            if let Some(group) = per_repository.remove(id) {
                visit(group, &mut catalog);
            }
        }
        visit(user_packages, &mut catalog);

        for id in &settings.repository_order {
            if let Some(group) = per_repository.remove(id.as_str()) {
                visit(group, &mut catalog);
            }
        }

        // repositories nobody declared, in id order
        for (id, group) in std::mem::take(&mut per_repository) {
            debug!("visiting undeclared repository {}", id);
            visit(group, &mut catalog);
        }

        catalog
    }

    fn merge(&mut self, listing: &SourcedPackage) {
        let package = &listing.package;
        let compatible = self.compatibility.is_compatible(package, self.unity);

        let entry = self
            .entries
            .entry(package.name.clone())
            .or_insert_with(|| CatalogEntry::new(package));

        // display metadata always comes from the highest version as a whole
        if package.version > entry.info_version {
            entry.info_version = package.version.clone();
            entry.display_name = package.display_name_or_name().to_string();
            entry.description = package.description.clone().unwrap_or_default();
            entry.aliases = package.aliases.clone();
        }

        entry.sources.insert(listing.source.label().to_string());

        // a version is placed once: the first (most preferred) listing decides
        let slot = if let Some(existing) = entry.unity_compatible.get_mut(&package.version) {
            existing
        } else if let Some(existing) = entry.unity_incompatible.get_mut(&package.version) {
            existing
        } else {
            let map = if compatible {
                &mut entry.unity_compatible
            } else {
                &mut entry.unity_incompatible
            };
            map.entry(package.version.clone()).or_insert(CatalogVersion {
                package: package.clone(),
                sources: Vec::new(),
            })
        };

        if !slot.sources.contains(&listing.source) {
            slot.sources.push(listing.source.clone());
        }
    }

    pub fn unity(&self) -> Option<UnityVersion> {
        self.unity
    }

    pub fn compatibility(&self) -> &CompatibilityRules {
        &self.compatibility
    }

    /// Whether prerelease versions are listed and may satisfy ranges
    pub fn allows_prerelease(&self) -> bool {
        self.show_prerelease
    }

    /// `range.matches`, honouring the prerelease setting of this catalog
    pub fn satisfies(&self, range: &DependencyRange, version: &Version) -> bool {
        range.matches_pre(version, self.show_prerelease)
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    /// Entries in name order
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest_compatible(&self, name: &str) -> Option<&PackageInfo> {
        self.get(name).and_then(CatalogEntry::latest_compatible)
    }

    /// Exact lookup, yanked versions included
    pub fn find(&self, name: &str, version: &Version) -> Option<&PackageInfo> {
        self.get(name)
            .and_then(|entry| entry.get(version))
            .map(|v| &v.package)
            .or_else(|| self.yanked_listing(name, version).map(|y| &y.package))
    }

    /// Most preferred source offering `name` at `version`, yanked versions included
    pub fn source_of(&self, name: &str, version: &Version) -> Option<&PackageSource> {
        self.get(name)
            .and_then(|entry| entry.get(version))
            .and_then(|v| v.sources.first())
            .or_else(|| self.yanked_listing(name, version).map(|y| &y.source))
    }

    fn yanked_listing(&self, name: &str, version: &Version) -> Option<&SourcedPackage> {
        self.yanked.get(name).and_then(|y| y.get(version))
    }

    pub fn is_yanked(&self, name: &str, version: &Version) -> bool {
        self.yanked
            .get(name)
            .is_some_and(|versions| versions.contains_key(version))
    }

    /// Whether any non-yanked listing exists, even from a hidden source
    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Whether `package` is usable with this catalog's Unity target
    pub fn is_compatible(&self, package: &PackageInfo) -> bool {
        self.compatibility.is_compatible(package, self.unity)
    }

    /// Newest version satisfying `range`, preferring compatible versions
    pub fn best_match(&self, name: &str, range: &DependencyRange) -> Option<&PackageInfo> {
        let entry = self.get(name)?;
        entry
            .compatible_versions()
            .chain(entry.incompatible_versions())
            .map(|v| &v.package)
            .find(|p| self.satisfies(range, &p.version))
    }

    /// Case-insensitive search over names, display names and aliases
    pub fn search(&self, query: &str) -> Vec<&CatalogEntry> {
        let query = query.to_lowercase();
        self.entries().filter(|e| e.matches(&query)).collect()
    }

    /// Up to five package names close to `query`, for "did you mean" hints
    pub fn similar_names(&self, query: &str) -> Vec<String> {
        let query = query.to_lowercase();
        let mut similar: Vec<String> = self
            .entries
            .keys()
            .filter(|name| {
                let name = name.to_lowercase();
                name.contains(&query) || query.contains(&name) || levenshtein_distance(&query, &name) <= 3
            })
            .cloned()
            .collect();
        similar.truncate(5);
        similar
    }

    /// Presentation rows for a project
    ///
    /// Installed packages come first. When exactly one SDK root is installed,
    /// the other root and everything depending on it are hidden, as are
    /// packages that an installed package marks as legacy.
    pub fn rows(&self, project: &ProjectState) -> Vec<PackageRow> {
        let mut rows: BTreeMap<String, PackageRow> = self
            .entries()
            .map(|entry| (entry.name.clone(), PackageRow::from_entry(entry)))
            .collect();

        for installed in project.installed.values() {
            let row = rows
                .entry(installed.name.clone())
                .or_insert_with(|| PackageRow::from_installed(installed));

            row.aliases.extend(installed.aliases.iter().cloned());
            row.installed = Some(InstalledRow {
                version: installed.version.clone(),
                yanked: installed.is_yanked || self.is_yanked(&installed.name, &installed.version),
            });
            row.has_source = self.is_known(&installed.name);

            if let LatestStatus::Contains {
                package,
                has_incompatible_newer,
            } = &row.latest
            {
                if installed.version < package.version {
                    row.latest = LatestStatus::Upgradable {
                        package: package.clone(),
                        has_incompatible_newer: *has_incompatible_newer,
                    };
                }
            }
        }

        let avatars = project.installed.contains_key(AVATARS_SDK);
        let worlds = project.installed.contains_key(WORLDS_SDK);
        if avatars != worlds {
            let other = if avatars { WORLDS_SDK } else { AVATARS_SDK };
            hide_with_dependants(&mut rows, other);
        }

        for installed in project.installed.values() {
            for legacy in &installed.legacy_packages {
                rows.remove(legacy);
            }
        }

        let mut rows: Vec<PackageRow> = rows.into_values().collect();
        rows.sort_by_key(|row| row.installed.is_none());
        rows
    }
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let len2 = s2.chars().count();
    let mut previous: Vec<usize> = (0..=len2).collect();

    for (i, c1) in s1.chars().enumerate() {
        let mut current = vec![i + 1; len2 + 1];
        for (j, c2) in s2.chars().enumerate() {
            let cost = usize::from(c1 != c2);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }

    previous[len2]
}

fn hide_with_dependants(rows: &mut BTreeMap<String, PackageRow>, root: &str) {
    let mut dependants: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for row in rows.values() {
        if let Some(package) = row.latest.package() {
            for dependency in package.vpm_dependencies.keys() {
                dependants
                    .entry(dependency.as_str())
                    .or_default()
                    .insert(row.name.clone());
            }
        }
    }

    let mut worklist = vec![root.to_string()];
    let mut hidden = BTreeSet::new();
    while let Some(name) = worklist.pop() {
        if !hidden.insert(name.clone()) {
            continue;
        }
        if let Some(names) = dependants.get(name.as_str()) {
            worklist.extend(names.iter().cloned());
        }
    }

    debug!("hiding packages for the other SDK: {:?}", hidden);
    for name in hidden {
        rows.remove(&name);
    }
}

/// Latest-version status of a row
#[derive(Debug, Clone, PartialEq)]
pub enum LatestStatus {
    None,
    Contains {
        package: PackageInfo,
        has_incompatible_newer: bool,
    },
    Upgradable {
        package: PackageInfo,
        has_incompatible_newer: bool,
    },
}

impl LatestStatus {
    pub fn package(&self) -> Option<&PackageInfo> {
        match self {
            LatestStatus::None => None,
            LatestStatus::Contains { package, .. } | LatestStatus::Upgradable { package, .. } => {
                Some(package)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstalledRow {
    pub version: Version,
    pub yanked: bool,
}

/// One package as presented for a project
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRow {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub aliases: BTreeSet<String>,
    pub sources: BTreeSet<String>,
    /// True when some listing exists, even if all of its sources are hidden
    pub has_source: bool,
    pub installed: Option<InstalledRow>,
    pub latest: LatestStatus,
}

impl PackageRow {
    fn from_entry(entry: &CatalogEntry) -> Self {
        let latest = match entry.latest_compatible() {
            Some(package) => LatestStatus::Contains {
                package: package.clone(),
                has_incompatible_newer: entry.has_incompatible_newer(),
            },
            None => LatestStatus::None,
        };

        Self {
            name: entry.name.clone(),
            display_name: entry.display_name.clone(),
            description: entry.description.clone(),
            aliases: entry.aliases.clone(),
            sources: entry.sources.clone(),
            has_source: true,
            installed: None,
            latest,
        }
    }

    fn from_installed(installed: &InstalledPackage) -> Self {
        Self {
            name: installed.name.clone(),
            display_name: installed.name.clone(),
            description: String::new(),
            aliases: BTreeSet::new(),
            sources: BTreeSet::new(),
            has_source: false,
            installed: None,
            latest: LatestStatus::None,
        }
    }
}

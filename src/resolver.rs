//! Dependency resolution
//!
//! Resolution runs a fixed-point closure over the working set: pinned
//! requests plus every installed package that is not being removed. Each
//! dependency resolves to the newest Unity-compatible catalog version; there
//! is no backtracking. Irregularities are collected as conflicts for the
//! caller to judge, and only a dependency missing from every visible source
//! is fatal.
//!
//! After the closure settles, three passes run:
//!
//! 1. Legacy packages named by packages being installed leave the working set.
//! 2. When one VRChat SDK root is newly installed while the other is present,
//!    the other root and its reverse dependants are pruned.
//! 3. Installed packages that only a removed or replaced package depended on
//!    are swept as unused.

use crate::catalog::Catalog;
use crate::changes::ConflictInfo;
use crate::error::{Error, Result};
use crate::package::{InstalledPackage, PackageInfo};
use crate::version::{DependencyRange, Version};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Avatars SDK root package
pub const AVATARS_SDK: &str = "com.vrchat.avatars";

/// Worlds SDK root package
pub const WORLDS_SDK: &str = "com.vrchat.worlds";

/// A package the caller wants installed at an exact version
#[derive(Debug, Clone)]
pub struct Pin {
    pub package: PackageInfo,
    pub requested: bool,
}

impl Pin {
    pub fn new(package: PackageInfo, requested: bool) -> Self {
        Self { package, requested }
    }
}

/// Input to one resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub pins: Vec<Pin>,
    pub removing: BTreeSet<String>,
}

/// A package in the resolved target set
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: Version,
    pub requested: bool,
    pub dependencies: BTreeMap<String, DependencyRange>,
    pub legacy_packages: BTreeSet<String>,
    /// Catalog metadata when this package has to be installed
    pub install: Option<PackageInfo>,
    pinned: bool,
}

impl ResolvedPackage {
    fn install(package: PackageInfo, requested: bool, pinned: bool) -> Self {
        Self {
            name: package.name.clone(),
            version: package.version.clone(),
            requested,
            dependencies: package.vpm_dependencies.clone(),
            legacy_packages: package.legacy_packages.clone(),
            install: Some(package),
            pinned,
        }
    }

    fn installed(installed: &InstalledPackage) -> Self {
        Self {
            name: installed.name.clone(),
            version: installed.version.clone(),
            requested: installed.requested,
            dependencies: installed.dependencies.clone(),
            legacy_packages: installed.legacy_packages.clone(),
            install: None,
            pinned: false,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

/// Outcome of a resolution
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Every package that should be installed afterwards
    pub packages: BTreeMap<String, ResolvedPackage>,
    pub conflicts: BTreeMap<String, ConflictInfo>,
    /// Installed packages superseded by a package being installed
    pub legacy: BTreeSet<String>,
    /// Packages dropped for the mutually exclusive SDK root
    pub pruned: BTreeSet<String>,
    /// Installed packages nothing retained depends on anymore
    pub unused: BTreeSet<String>,
}

type Working = BTreeMap<String, ResolvedPackage>;
type Conflicts = BTreeMap<String, ConflictInfo>;

fn add_conflict(conflicts: &mut Conflicts, package: &str, with: &str) {
    conflicts
        .entry(package.to_string())
        .or_default()
        .conflicting_packages
        .insert(with.to_string());
}

/// Resolves requests against a catalog snapshot and an installed set
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    installed: &'a BTreeMap<String, InstalledPackage>,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, installed: &'a BTreeMap<String, InstalledPackage>) -> Self {
        Self { catalog, installed }
    }

    pub fn resolve(&self, request: &ResolveRequest) -> Result<Resolution> {
        let mut legacy = BTreeSet::new();
        let mut pruned = BTreeSet::new();

        // legacy and pruned only grow, so this settles
        let (mut working, mut conflicts) = loop {
            let (working, mut conflicts) = self.closure(request, &legacy, &pruned)?;

            let mut changed = false;
            for name in self.legacy_of_installs(&working) {
                changed |= legacy.insert(name);
            }

            if !changed {
                match self.exclusive_roots(&working) {
                    Exclusion::None => {}
                    Exclusion::Prune(names) => {
                        for name in names {
                            changed |= pruned.insert(name);
                        }
                    }
                    Exclusion::Conflict { package, with } => {
                        for other in with {
                            add_conflict(&mut conflicts, &package, &other);
                        }
                    }
                }
            }

            if !changed {
                break (working, conflicts);
            }
        };

        let unused = self.sweep(&mut working, request, &legacy, &pruned);

        for package in working.values() {
            if let Some(info) = &package.install {
                if !self.catalog.is_compatible(info) {
                    debug!("{} {} is not compatible with the project", info.name, info.version);
                    conflicts.entry(package.name.clone()).or_default().has_unity_conflict = true;
                }
            }
        }

        Ok(Resolution {
            packages: working,
            conflicts,
            legacy,
            pruned,
            unused,
        })
    }

    fn closure(
        &self,
        request: &ResolveRequest,
        legacy: &BTreeSet<String>,
        pruned: &BTreeSet<String>,
    ) -> Result<(Working, Conflicts)> {
        let mut working = Working::new();
        let mut conflicts = Conflicts::new();

        for pin in &request.pins {
            working.insert(
                pin.package.name.clone(),
                ResolvedPackage::install(pin.package.clone(), pin.requested, true),
            );
        }

        for installed in self.installed.values() {
            let name = &installed.name;
            if request.removing.contains(name)
                || legacy.contains(name)
                || pruned.contains(name)
                || working.contains_key(name)
            {
                continue;
            }
            working.insert(name.clone(), ResolvedPackage::installed(installed));
        }

        let mut queue: VecDeque<String> = working.keys().cloned().collect();
        while let Some(name) = queue.pop_front() {
            let Some(dependencies) = working.get(&name).map(|p| p.dependencies.clone()) else {
                continue;
            };

            for (dependency, range) in &dependencies {
                if request.removing.contains(dependency) {
                    add_conflict(&mut conflicts, dependency, &name);
                    continue;
                }
                if legacy.contains(dependency) || pruned.contains(dependency) {
                    debug!("{} depends on dropped package {}", name, dependency);
                    continue;
                }

                if let Some(existing) = working.get(dependency) {
                    if self.catalog.satisfies(range, &existing.version) {
                        continue;
                    }

                    if existing.install.is_none() {
                        let upgrade = self
                            .compatible_match(dependency, range)
                            .filter(|candidate| candidate.version > existing.version)
                            .cloned();
                        if let Some(candidate) = upgrade {
                            debug!(
                                "upgrading {} {} -> {} for {}",
                                dependency, existing.version, candidate.version, name
                            );
                            let requested = existing.requested;
                            working.insert(
                                dependency.clone(),
                                ResolvedPackage::install(candidate, requested, false),
                            );
                            queue.push_back(dependency.clone());
                            // dependants already checked against the old version
                            queue.extend(
                                working
                                    .values()
                                    .filter(|p| p.dependencies.contains_key(dependency))
                                    .map(|p| p.name.clone()),
                            );
                            continue;
                        }
                    }

                    add_conflict(&mut conflicts, dependency, &name);
                    continue;
                }

                let (candidate, satisfied) = self.select(dependency, range, &name)?;
                if !satisfied {
                    add_conflict(&mut conflicts, dependency, &name);
                }
                debug!("adding {} {} for {}", dependency, candidate.version, name);
                working.insert(
                    dependency.clone(),
                    ResolvedPackage::install(candidate, false, false),
                );
                queue.push_back(dependency.clone());
            }
        }

        Ok((working, conflicts))
    }

    fn compatible_match(&self, name: &str, range: &DependencyRange) -> Option<&'a PackageInfo> {
        self.catalog
            .get(name)?
            .compatible_versions()
            .map(|v| &v.package)
            .find(|p| self.catalog.satisfies(range, &p.version))
    }

    /// Newest version for a new dependency and whether it satisfies `range`
    fn select(
        &self,
        name: &str,
        range: &DependencyRange,
        required_by: &str,
    ) -> Result<(PackageInfo, bool)> {
        let not_found = || Error::DependencyNotFound {
            dependency: name.to_string(),
            required_by: required_by.to_string(),
        };

        if let Some(found) = self.catalog.best_match(name, range) {
            return Ok((found.clone(), true));
        }

        let entry = self.catalog.get(name).ok_or_else(not_found)?;
        entry
            .latest_compatible()
            .or_else(|| entry.latest_incompatible())
            .map(|p| (p.clone(), false))
            .ok_or_else(not_found)
    }

    fn legacy_of_installs(&self, working: &Working) -> BTreeSet<String> {
        working
            .values()
            .filter(|p| p.install.is_some())
            .flat_map(|p| p.legacy_packages.iter())
            .filter(|legacy| working.get(*legacy).is_some_and(|l| !l.pinned))
            .cloned()
            .collect()
    }

    fn exclusive_roots(&self, working: &Working) -> Exclusion {
        if !(working.contains_key(AVATARS_SDK) && working.contains_key(WORLDS_SDK)) {
            return Exclusion::None;
        }

        let avatars_new = !self.installed.contains_key(AVATARS_SDK);
        let worlds_new = !self.installed.contains_key(WORLDS_SDK);
        let (kept, other) = match (avatars_new, worlds_new) {
            (true, false) => (AVATARS_SDK, WORLDS_SDK),
            (false, true) => (WORLDS_SDK, AVATARS_SDK),
            (true, true) => {
                return Exclusion::Conflict {
                    package: WORLDS_SDK.to_string(),
                    with: BTreeSet::from([AVATARS_SDK.to_string()]),
                }
            }
            // both were already installed, leave them alone
            (false, false) => return Exclusion::None,
        };

        let dropped = DependantsGraph::build(working).reverse_closure(other);
        let blockers: BTreeSet<String> = dropped
            .iter()
            .filter(|name| working.get(*name).is_some_and(|p| p.pinned))
            .cloned()
            .collect();

        if !blockers.is_empty() {
            let mut with = blockers;
            with.insert(kept.to_string());
            return Exclusion::Conflict {
                package: other.to_string(),
                with,
            };
        }

        debug!("{} replaces {}, pruning {:?}", kept, other, dropped);
        Exclusion::Prune(dropped)
    }

    /// Mark-and-sweep over installed dependency edges
    fn sweep(
        &self,
        working: &mut Working,
        request: &ResolveRequest,
        legacy: &BTreeSet<String>,
        pruned: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let replaced = working
            .values()
            .filter(|p| p.install.is_some() && self.installed.contains_key(&p.name))
            .map(|p| p.name.clone());
        let roots: BTreeSet<String> = request
            .removing
            .iter()
            .chain(legacy)
            .chain(pruned)
            .cloned()
            .chain(replaced)
            .collect();

        let mut removable = BTreeSet::new();
        let mut stack: Vec<&str> = roots.iter().map(String::as_str).collect();
        while let Some(name) = stack.pop() {
            let Some(installed) = self.installed.get(name) else {
                continue;
            };
            for dependency in installed.dependencies.keys() {
                if self.installed.contains_key(dependency) && removable.insert(dependency.clone()) {
                    stack.push(dependency);
                }
            }
        }

        let mut using = BTreeSet::new();
        let mut stack: Vec<&str> = working
            .values()
            .filter(|p| p.requested || p.install.is_some())
            .map(|p| p.name.as_str())
            .collect();
        while let Some(name) = stack.pop() {
            if !using.insert(name.to_string()) {
                continue;
            }
            if let Some(package) = working.get(name) {
                stack.extend(
                    package
                        .dependencies
                        .keys()
                        .filter(|d| working.contains_key(*d))
                        .map(String::as_str),
                );
            }
        }

        let unused: BTreeSet<String> = removable
            .into_iter()
            .filter(|name| !using.contains(name))
            .filter(|name| working.get(name).is_some_and(|p| p.install.is_none()))
            .collect();

        for name in &unused {
            debug!("{} is no longer used", name);
            working.remove(name);
        }
        unused
    }
}

enum Exclusion {
    None,
    Prune(BTreeSet<String>),
    Conflict {
        package: String,
        with: BTreeSet<String>,
    },
}

/// Arena of working-set packages with reverse dependency edges
struct DependantsGraph<'w> {
    names: Vec<&'w str>,
    index: BTreeMap<&'w str, usize>,
    dependants: Vec<Vec<usize>>,
}

impl<'w> DependantsGraph<'w> {
    fn build(working: &'w Working) -> Self {
        let names: Vec<&str> = working.keys().map(String::as_str).collect();
        let index: BTreeMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let mut dependants = vec![Vec::new(); names.len()];

        for (id, package) in working.values().enumerate() {
            for dependency in package.dependencies.keys() {
                if let Some(&target) = index.get(dependency.as_str()) {
                    dependants[target].push(id);
                }
            }
        }

        Self {
            names,
            index,
            dependants,
        }
    }

    /// `root` and everything that transitively depends on it
    fn reverse_closure(&self, root: &str) -> BTreeSet<String> {
        let Some(&start) = self.index.get(root) else {
            return BTreeSet::new();
        };

        let mut seen = vec![false; self.names.len()];
        let mut worklist = vec![start];
        while let Some(id) = worklist.pop() {
            if std::mem::replace(&mut seen[id], true) {
                continue;
            }
            worklist.extend(self.dependants[id].iter().copied().filter(|d| !seen[*d]));
        }

        seen.iter()
            .enumerate()
            .filter(|(_, seen)| **seen)
            .map(|(id, _)| self.names[id].to_string())
            .collect()
    }
}

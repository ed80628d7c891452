//! Pending project changes
//!
//! A [`PendingProjectChanges`] is the planner's output: what to install, what
//! to remove and why, legacy assets to clean up and the conflicts found on the
//! way. It is consumed once by the applier or simply dropped.

use crate::package::{PackageInfo, PackageSource};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Identifies one computed plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PlanToken(pub u64);

/// Identifies one snapshot of a project's installed state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StateToken(pub u64);

impl StateToken {
    pub fn next(self) -> Self {
        StateToken(self.0 + 1)
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a package is being removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RemoveReason {
    /// The caller asked for it
    Requested,
    /// A retained package supersedes it
    Legacy,
    /// Nothing depends on it anymore
    Unused,
}

impl fmt::Display for RemoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RemoveReason::Requested => "requested",
            RemoveReason::Legacy => "legacy",
            RemoveReason::Unused => "unused",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PackageChange {
    InstallNew {
        package: Box<PackageInfo>,
        /// Most preferred source offering this version
        source: PackageSource,
        /// Value of the installed record's `requested` flag afterwards
        requested: bool,
    },
    Remove(RemoveReason),
}

impl PackageChange {
    pub fn as_install(&self) -> Option<&PackageInfo> {
        match self {
            PackageChange::InstallNew { package, .. } => Some(package),
            PackageChange::Remove(_) => None,
        }
    }

    pub fn as_remove(&self) -> Option<RemoveReason> {
        match self {
            PackageChange::InstallNew { .. } => None,
            PackageChange::Remove(reason) => Some(*reason),
        }
    }

    fn kind_order(&self) -> u8 {
        match self {
            PackageChange::InstallNew { .. } => 0,
            PackageChange::Remove(_) => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictInfo {
    pub conflicting_packages: BTreeSet<String>,
    pub has_unity_conflict: bool,
}

/// A computed, not yet applied set of changes
#[derive(Debug, Clone, Serialize)]
pub struct PendingProjectChanges {
    pub version_token: PlanToken,
    /// State the plan was computed against
    pub state_token: StateToken,
    pub package_changes: Vec<(String, PackageChange)>,
    pub legacy_files: BTreeSet<PathBuf>,
    pub legacy_folders: BTreeSet<PathBuf>,
    pub conflicts: Vec<(String, ConflictInfo)>,
}

impl PendingProjectChanges {
    /// Assemble a plan; changes are ordered installs first, then by name
    pub fn new(
        version_token: PlanToken,
        state_token: StateToken,
        changes: BTreeMap<String, PackageChange>,
        conflicts: BTreeMap<String, ConflictInfo>,
    ) -> Self {
        let mut package_changes: Vec<(String, PackageChange)> = changes.into_iter().collect();
        package_changes.sort_by(|(a_name, a), (b_name, b)| {
            a.kind_order()
                .cmp(&b.kind_order())
                .then_with(|| a_name.cmp(b_name))
        });

        let mut legacy_files = BTreeSet::new();
        let mut legacy_folders = BTreeSet::new();
        for (_, change) in &package_changes {
            if let Some(package) = change.as_install() {
                legacy_files.extend(package.legacy_files.keys().cloned());
                legacy_folders.extend(package.legacy_folders.keys().cloned());
            }
        }

        Self {
            version_token,
            state_token,
            package_changes,
            legacy_files,
            legacy_folders,
            conflicts: conflicts.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.package_changes.is_empty()
            && self.legacy_files.is_empty()
            && self.legacy_folders.is_empty()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn installs(&self) -> impl Iterator<Item = (&str, &PackageInfo)> {
        self.package_changes
            .iter()
            .filter_map(|(name, change)| change.as_install().map(|p| (name.as_str(), p)))
    }

    /// Installs together with the source each payload is taken from
    pub fn installs_with_source(
        &self,
    ) -> impl Iterator<Item = (&str, &PackageInfo, &PackageSource)> {
        self.package_changes
            .iter()
            .filter_map(|(name, change)| match change {
                PackageChange::InstallNew {
                    package, source, ..
                } => Some((name.as_str(), &**package, source)),
                PackageChange::Remove(_) => None,
            })
    }

    pub fn removals(&self) -> impl Iterator<Item = (&str, RemoveReason)> {
        self.package_changes
            .iter()
            .filter_map(|(name, change)| change.as_remove().map(|r| (name.as_str(), r)))
    }

    pub fn change_for(&self, name: &str) -> Option<&PackageChange> {
        self.package_changes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, change)| change)
    }

    /// One line per conflict, for error messages
    pub fn describe_conflicts(&self) -> String {
        self.conflicts
            .iter()
            .map(|(name, conflict)| {
                let mut parts = Vec::new();
                if !conflict.conflicting_packages.is_empty() {
                    let with: Vec<&str> = conflict
                        .conflicting_packages
                        .iter()
                        .map(String::as_str)
                        .collect();
                    parts.push(format!("conflicts with {}", with.join(", ")));
                }
                if conflict.has_unity_conflict {
                    parts.push("incompatible with the project's Unity version".to_string());
                }
                format!("{}: {}", name, parts.join("; "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

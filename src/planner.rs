//! Change planning
//!
//! The planner turns a [`PlanRequest`] into resolver pins, runs the resolver
//! and diffs its target set against the installed state. Requests naming
//! unknown packages or versions fail before resolution starts; everything
//! else, conflicts included, ends up in the returned plan.

use crate::catalog::Catalog;
use crate::changes::{PackageChange, PendingProjectChanges, PlanToken, RemoveReason};
use crate::error::{Error, Result};
use crate::package::PackageInfo;
use crate::project::ProjectState;
use crate::resolver::{Pin, ResolveRequest, Resolver};
use crate::version::Version;
use std::collections::BTreeMap;
use tracing::debug;

/// Operations a caller can plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanRequest {
    /// Install one package, at the latest compatible version when `version` is `None`
    Install {
        name: String,
        version: Option<Version>,
    },
    InstallSelected(Vec<String>),
    UpgradeAll,
    UpgradeSelected(Vec<String>),
    Remove(Vec<String>),
    /// Recompute against the installed set, adding missing dependencies
    Resolve,
    /// Reinstall every installed package at its installed version
    Reinstall,
}

impl PlanRequest {
    pub fn install(name: impl Into<String>) -> Self {
        PlanRequest::Install {
            name: name.into(),
            version: None,
        }
    }

    pub fn install_version(name: impl Into<String>, version: Version) -> Self {
        PlanRequest::Install {
            name: name.into(),
            version: Some(version),
        }
    }
}

/// Plans changes for one project state against one catalog
pub struct Planner<'a> {
    catalog: &'a Catalog,
    state: &'a ProjectState,
}

impl<'a> Planner<'a> {
    pub fn new(catalog: &'a Catalog, state: &'a ProjectState) -> Self {
        Self { catalog, state }
    }

    pub fn plan(&self, request: &PlanRequest, token: PlanToken) -> Result<PendingProjectChanges> {
        let resolve_request = self.resolve_request(request)?;
        let reinstall = matches!(request, PlanRequest::Reinstall);

        let resolution = Resolver::new(self.catalog, &self.state.installed).resolve(&resolve_request)?;

        let mut changes = BTreeMap::new();
        for (name, package) in &resolution.packages {
            let Some(info) = &package.install else {
                continue;
            };

            let needed = match self.state.installed.get(name) {
                None => true,
                Some(installed) => {
                    reinstall
                        || installed.version != info.version
                        || (package.requested && !installed.requested)
                }
            };

            if needed {
                let source = self
                    .catalog
                    .source_of(name, &info.version)
                    .cloned()
                    .ok_or_else(|| Error::VersionNotFound {
                        name: name.clone(),
                        version: info.version.to_string(),
                    })?;
                changes.insert(
                    name.clone(),
                    PackageChange::InstallNew {
                        package: Box::new(info.clone()),
                        source,
                        requested: package.requested,
                    },
                );
            }
        }

        for name in self.state.installed.keys() {
            if resolution.packages.contains_key(name) {
                continue;
            }

            let reason = if resolve_request.removing.contains(name) {
                RemoveReason::Requested
            } else if resolution
                .packages
                .values()
                .any(|p| p.legacy_packages.contains(name))
            {
                RemoveReason::Legacy
            } else {
                RemoveReason::Unused
            };
            changes.insert(name.clone(), PackageChange::Remove(reason));
        }

        debug!(
            "planned {} changes with {} conflicts",
            changes.len(),
            resolution.conflicts.len()
        );

        Ok(PendingProjectChanges::new(
            token,
            self.state.token,
            changes,
            resolution.conflicts,
        ))
    }

    fn resolve_request(&self, request: &PlanRequest) -> Result<ResolveRequest> {
        let mut resolve = ResolveRequest::default();

        match request {
            PlanRequest::Install { name, version } => {
                let package = self.select(name, version.as_ref())?;
                resolve.pins.push(Pin::new(package.clone(), true));
            }
            PlanRequest::InstallSelected(names) => {
                if names.is_empty() {
                    return Err(Error::InvalidRequest("no packages selected".to_string()));
                }
                for name in names {
                    let package = self.select(name, None)?;
                    resolve.pins.push(Pin::new(package.clone(), true));
                }
            }
            PlanRequest::UpgradeAll => {
                for installed in self.state.installed.values() {
                    if let Some(latest) = self.catalog.latest_compatible(&installed.name) {
                        if latest.version > installed.version {
                            resolve.pins.push(Pin::new(latest.clone(), installed.requested));
                        }
                    }
                }
            }
            PlanRequest::UpgradeSelected(names) => {
                for name in names {
                    let installed = self
                        .state
                        .installed
                        .get(name)
                        .ok_or_else(|| Error::NotInstalled(name.clone()))?;
                    let entry = self
                        .catalog
                        .get(name)
                        .ok_or_else(|| Error::PackageNotFound(name.clone()))?;
                    match entry.latest_compatible() {
                        Some(latest) if latest.version > installed.version => {
                            resolve.pins.push(Pin::new(latest.clone(), installed.requested));
                        }
                        _ => debug!("{} is already up to date", name),
                    }
                }
            }
            PlanRequest::Remove(names) => {
                if names.is_empty() {
                    return Err(Error::InvalidRequest("no packages to remove".to_string()));
                }
                for name in names {
                    if !self.state.installed.contains_key(name) {
                        return Err(Error::NotInstalled(name.clone()));
                    }
                    resolve.removing.insert(name.clone());
                }
            }
            PlanRequest::Resolve => {}
            PlanRequest::Reinstall => {
                for installed in self.state.installed.values() {
                    let package = self
                        .catalog
                        .find(&installed.name, &installed.version)
                        .ok_or_else(|| Error::VersionNotFound {
                            name: installed.name.clone(),
                            version: installed.version.to_string(),
                        })?;
                    resolve.pins.push(Pin::new(package.clone(), installed.requested));
                }
            }
        }

        Ok(resolve)
    }

    /// Catalog version for an explicit install
    fn select(&self, name: &str, version: Option<&Version>) -> Result<&'a PackageInfo> {
        if let Some(version) = version {
            return self.catalog.find(name, version).ok_or_else(|| {
                if self.catalog.get(name).is_some() {
                    Error::VersionNotFound {
                        name: name.to_string(),
                        version: version.to_string(),
                    }
                } else {
                    Error::PackageNotFound(name.to_string())
                }
            });
        }

        // nothing compatible still installs, and shows up as a Unity conflict
        let entry = self
            .catalog
            .get(name)
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))?;
        entry
            .latest_compatible()
            .or_else(|| entry.latest_incompatible())
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }
}

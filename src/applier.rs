//! Applying pending changes
//!
//! Application is staged: every package the plan touches is stashed (whether
//! or not the record knows about it), new payloads are installed, and only then is the installed-package record
//! written. A failure at any of those steps undoes the earlier ones, so the
//! record never names a package whose files did not land. Legacy asset
//! cleanup runs after the commit and is best-effort.

use crate::changes::{PackageChange, PendingProjectChanges, StateToken};
use crate::error::{Error, Result};
use crate::io::{InstalledState, ProjectIo};
use crate::package::InstalledPackage;
use crate::project::ProjectState;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Apply even when the plan reports conflicts
    pub allow_conflicts: bool,
}

impl ApplyOptions {
    pub fn force() -> Self {
        Self {
            allow_conflicts: true,
        }
    }
}

/// Apply `plan` to the project behind `io`
///
/// Returns the installed state that was written. The caller owns the state
/// token and must advance it after a successful apply.
pub fn apply_changes<IO: ProjectIo>(
    io: &mut IO,
    state: &ProjectState,
    plan: &PendingProjectChanges,
    expected: StateToken,
    options: ApplyOptions,
) -> Result<InstalledState> {
    if expected != state.token || plan.state_token != state.token {
        let plan_state = if expected != state.token {
            expected
        } else {
            plan.state_token
        };
        return Err(Error::StalePlan {
            plan_state: plan_state.0,
            live_state: state.token.0,
        });
    }

    if plan.has_conflicts() && !options.allow_conflicts {
        return Err(Error::ConflictDetected(plan.describe_conflicts()));
    }

    let mut next = InstalledState {
        unity: state.unity,
        packages: state.installed.clone(),
    };
    let mut touched = Vec::new();
    for (name, change) in &plan.package_changes {
        match change {
            PackageChange::InstallNew {
                package, requested, ..
            } => {
                next.packages.insert(
                    name.clone(),
                    InstalledPackage::from_info(package, *requested),
                );
            }
            PackageChange::Remove(_) => {
                next.packages.remove(name);
            }
        }
        // an untracked directory under the same name is stashed too
        touched.push(name.as_str());
    }

    let mut stashed = Vec::new();
    for name in &touched {
        if let Err(source) = io.stash_package(name) {
            rollback(io, &[], &stashed);
            return Err(Error::PartialApplyFailure {
                stage: "moving existing packages aside",
                source,
            });
        }
        stashed.push(*name);
    }

    let mut installed = Vec::new();
    for (name, package, origin) in plan.installs_with_source() {
        installed.push(name);
        if let Err(source) = io.install_package(package, origin) {
            rollback(io, &installed, &stashed);
            return Err(Error::PartialApplyFailure {
                stage: "installing packages",
                source,
            });
        }
        info!("installed {} {}", name, package.version);
    }

    if let Err(source) = io.write_installed(&next) {
        rollback(io, &installed, &stashed);
        return Err(Error::PartialApplyFailure {
            stage: "writing the installed-package record",
            source,
        });
    }

    for (name, reason) in plan.removals() {
        info!("removed {} ({})", name, reason);
    }

    if let Err(e) = io.discard_stash() {
        warn!("failed to clean up replaced packages: {}", e);
    }

    for path in &plan.legacy_files {
        if let Err(e) = io.remove_legacy_file(path) {
            warn!("failed to remove legacy file {}: {}", path.display(), e);
        }
    }
    for path in &plan.legacy_folders {
        if let Err(e) = io.remove_legacy_folder(path) {
            warn!("failed to remove legacy folder {}: {}", path.display(), e);
        }
    }

    Ok(next)
}

fn rollback<IO: ProjectIo>(io: &mut IO, installed: &[&str], stashed: &[&str]) {
    for name in installed.iter().rev() {
        if let Err(e) = io.uninstall_package(name) {
            warn!("rollback: failed to uninstall {}: {}", name, e);
        }
    }
    for name in stashed.iter().rev() {
        if let Err(e) = io.restore_package(name) {
            warn!("rollback: failed to restore {}: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ConflictInfo, PlanToken, RemoveReason};
    use crate::package::{PackageInfo, PackageSource};
    use crate::version::Version;
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::Path;

    /// Records calls and fails on demand
    #[derive(Default)]
    struct RecordingIo {
        calls: Vec<String>,
        fail_install: Option<String>,
        fail_write: bool,
        written: Option<InstalledState>,
    }

    impl ProjectIo for RecordingIo {
        fn load_installed(&self) -> Result<InstalledState> {
            Ok(InstalledState::default())
        }

        fn stash_package(&mut self, name: &str) -> std::io::Result<()> {
            self.calls.push(format!("stash {}", name));
            Ok(())
        }

        fn restore_package(&mut self, name: &str) -> std::io::Result<()> {
            self.calls.push(format!("restore {}", name));
            Ok(())
        }

        fn discard_stash(&mut self) -> std::io::Result<()> {
            self.calls.push("discard".to_string());
            Ok(())
        }

        fn install_package(
            &mut self,
            package: &PackageInfo,
            _source: &PackageSource,
        ) -> std::io::Result<()> {
            if self.fail_install.as_deref() == Some(package.name.as_str()) {
                return Err(std::io::Error::other("disk full"));
            }
            self.calls.push(format!("install {}", package.name));
            Ok(())
        }

        fn uninstall_package(&mut self, name: &str) -> std::io::Result<()> {
            self.calls.push(format!("uninstall {}", name));
            Ok(())
        }

        fn write_installed(&mut self, state: &InstalledState) -> std::io::Result<()> {
            if self.fail_write {
                return Err(std::io::Error::other("read-only"));
            }
            self.calls.push("write".to_string());
            self.written = Some(state.clone());
            Ok(())
        }

        fn remove_legacy_file(&mut self, path: &Path) -> std::io::Result<()> {
            self.calls.push(format!("legacy-file {}", path.display()));
            Ok(())
        }

        fn remove_legacy_folder(&mut self, path: &Path) -> std::io::Result<()> {
            self.calls.push(format!("legacy-folder {}", path.display()));
            Ok(())
        }
    }

    fn state() -> ProjectState {
        let mut installed = BTreeMap::new();
        installed.insert(
            "old".to_string(),
            InstalledPackage::new("old", Version::new(1, 0, 0)),
        );
        installed.insert(
            "upgraded".to_string(),
            InstalledPackage::new("upgraded", Version::new(1, 0, 0)).requested(),
        );
        ProjectState::new(None, installed)
    }

    fn plan(state_token: StateToken) -> PendingProjectChanges {
        let mut changes = BTreeMap::new();
        changes.insert(
            "upgraded".to_string(),
            PackageChange::InstallNew {
                package: Box::new(
                    PackageInfo::new("upgraded", Version::new(2, 0, 0))
                        .with_legacy_folder("Assets/Upgraded"),
                ),
                source: PackageSource::remote("com.example.repo", "Example"),
                requested: true,
            },
        );
        changes.insert(
            "fresh".to_string(),
            PackageChange::InstallNew {
                package: Box::new(PackageInfo::new("fresh", Version::new(1, 0, 0))),
                source: PackageSource::remote("com.example.repo", "Example"),
                requested: false,
            },
        );
        changes.insert("old".to_string(), PackageChange::Remove(RemoveReason::Unused));
        PendingProjectChanges::new(PlanToken(1), state_token, changes, BTreeMap::new())
    }

    // ============================================================================
    // Apply tests
    // ============================================================================

    #[test]
    fn test_apply_order() {
        let state = state();
        let mut io = RecordingIo::default();
        let written = apply_changes(&mut io, &state, &plan(state.token), state.token, ApplyOptions::default()).unwrap();

        assert_eq!(
            io.calls,
            vec![
                "stash fresh",
                "stash upgraded",
                "stash old",
                "install fresh",
                "install upgraded",
                "write",
                "discard",
                "legacy-folder Assets/Upgraded",
            ]
        );
        assert_eq!(written.packages.len(), 2);
        assert_eq!(written.packages["upgraded"].version, Version::new(2, 0, 0));
        assert!(!written.packages.contains_key("old"));
    }

    #[test]
    fn test_stale_plan_makes_no_calls() {
        let state = state();
        let mut io = RecordingIo::default();
        let err = apply_changes(
            &mut io,
            &state,
            &plan(state.token),
            state.token.next(),
            ApplyOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::StalePlan { .. }));
        assert!(io.calls.is_empty());
    }

    #[test]
    fn test_conflicts_block_unless_forced() {
        let state = state();
        let mut conflicts = BTreeMap::new();
        conflicts.insert(
            "fresh".to_string(),
            ConflictInfo {
                conflicting_packages: BTreeSet::new(),
                has_unity_conflict: true,
            },
        );
        let plan = PendingProjectChanges::new(PlanToken(1), state.token, BTreeMap::new(), conflicts);

        let mut io = RecordingIo::default();
        let err = apply_changes(&mut io, &state, &plan, state.token, ApplyOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ConflictDetected(_)));
        assert!(io.calls.is_empty());

        apply_changes(&mut io, &state, &plan, state.token, ApplyOptions::force()).unwrap();
        assert!(io.calls.contains(&"write".to_string()));
    }

    #[test]
    fn test_install_failure_rolls_back() {
        let state = state();
        let mut io = RecordingIo {
            fail_install: Some("upgraded".to_string()),
            ..Default::default()
        };
        let err = apply_changes(&mut io, &state, &plan(state.token), state.token, ApplyOptions::default()).unwrap_err();

        assert!(matches!(err, Error::PartialApplyFailure { stage: "installing packages", .. }));
        assert!(io.written.is_none());
        assert_eq!(
            io.calls,
            vec![
                "stash fresh",
                "stash upgraded",
                "stash old",
                "install fresh",
                "uninstall upgraded",
                "uninstall fresh",
                "restore old",
                "restore upgraded",
                "restore fresh",
            ]
        );
    }

    #[test]
    fn test_record_failure_rolls_back() {
        let state = state();
        let mut io = RecordingIo {
            fail_write: true,
            ..Default::default()
        };
        let err = apply_changes(&mut io, &state, &plan(state.token), state.token, ApplyOptions::default()).unwrap_err();

        assert!(matches!(err, Error::PartialApplyFailure { .. }));
        assert!(io.calls.contains(&"restore old".to_string()));
        assert!(!io.calls.contains(&"discard".to_string()));
    }
}

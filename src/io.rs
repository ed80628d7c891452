//! Project storage seam
//!
//! Every side effect the applier performs goes through [`ProjectIo`], so the
//! ordering and rollback contract can be exercised without touching disk.
//! [`crate::installer::FsProjectIo`] is the filesystem implementation.

use crate::error::Result;
use crate::package::{InstalledPackage, PackageInfo, PackageSource};
use crate::version::UnityVersion;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Installed state as persisted by a project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstalledState {
    pub unity: Option<UnityVersion>,
    pub packages: BTreeMap<String, InstalledPackage>,
}

/// Storage operations for one project
///
/// Stashing moves whatever sits at a package's location out of the way so it
/// can be restored if a later step fails; stashing a package with nothing on
/// disk is a no-op. `uninstall_package` only ever undoes an `install_package`
/// from the same apply.
pub trait ProjectIo {
    fn load_installed(&self) -> Result<InstalledState>;

    fn stash_package(&mut self, name: &str) -> io::Result<()>;

    fn restore_package(&mut self, name: &str) -> io::Result<()>;

    /// Drop everything stashed during this apply
    fn discard_stash(&mut self) -> io::Result<()>;

    /// Place `package` into the project, taking its files from `source`
    fn install_package(&mut self, package: &PackageInfo, source: &PackageSource) -> io::Result<()>;

    fn uninstall_package(&mut self, name: &str) -> io::Result<()>;

    fn write_installed(&mut self, state: &InstalledState) -> io::Result<()>;

    /// Remove a project-relative legacy file, missing files are not an error
    fn remove_legacy_file(&mut self, path: &Path) -> io::Result<()>;

    /// Remove a project-relative legacy folder, missing folders are not an error
    fn remove_legacy_folder(&mut self, path: &Path) -> io::Result<()>;
}

//! Filesystem project storage
//!
//! [`FsProjectIo`] lays packages out as `<project>/Packages/<name>/` and keeps
//! the installed-package record in `<project>/unitypm.lock`. Packages that
//! are replaced or removed are first moved into a staging directory under
//! `<project>/Temp` so they can be put back if the apply fails.
//!
//! Package payloads come from a [`PackageInstaller`]. [`DirectoryInstaller`]
//! copies repository packages already unpacked into a local cache, and local
//! user packages straight from their own directory.
//!
//! Package names end up as directory names, so every path built from one is
//! checked to stay a single component under `Packages/`.
//!
//! # Examples
//!
//! ```no_run
//! use unitypm::{FsProjectIo, Project};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let io = FsProjectIo::new("MyProject", "/home/me/.unitypm/packages");
//! let project = Project::open(io)?;
//! println!("{} packages installed", project.state()?.installed.len());
//! # Ok(())
//! # }
//! ```

use crate::io::{InstalledState, ProjectIo};
use crate::lockfile::{Lockfile, LOCKFILE_NAME};
use crate::package::{is_valid_package_name, PackageInfo, PackageSource};
use crate::version::UnityVersion;
use crate::{Error, Result};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

/// Places a package's files into a directory
pub trait PackageInstaller {
    fn install(&self, package: &PackageInfo, source: &PackageSource, dest: &Path) -> io::Result<()>;
}

/// Copies repository packages from `<cache>/<name>/<version>/` and local
/// user packages from their registered directory
#[derive(Debug, Clone)]
pub struct DirectoryInstaller {
    cache_dir: PathBuf,
}

impl DirectoryInstaller {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Directory the files of `package` are copied from
    pub fn package_dir(&self, package: &PackageInfo, source: &PackageSource) -> io::Result<PathBuf> {
        match source {
            PackageSource::LocalUser { path } => Ok(path.clone()),
            PackageSource::Remote { .. } => Ok(self
                .cache_dir
                .join(checked_name(&package.name)?)
                .join(package.version.to_string())),
        }
    }
}

impl PackageInstaller for DirectoryInstaller {
    fn install(&self, package: &PackageInfo, source: &PackageSource, dest: &Path) -> io::Result<()> {
        let from = self.package_dir(package, source)?;
        if !from.is_dir() {
            let location = match source {
                PackageSource::LocalUser { .. } => "user package directory",
                PackageSource::Remote { .. } => "package cache",
            };
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "{} {} is not in the {} ({})",
                    package.name,
                    package.version,
                    location,
                    from.display()
                ),
            ));
        }

        copy_dir(&from, dest)
    }
}

fn checked_name(name: &str) -> io::Result<&str> {
    if is_valid_package_name(name) {
        Ok(name)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{:?} is not a valid package name", name),
        ))
    }
}

fn copy_dir(source: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Unity editor version from `ProjectSettings/ProjectVersion.txt`
pub fn read_project_unity(project_root: &Path) -> Option<UnityVersion> {
    let path = project_root
        .join("ProjectSettings")
        .join("ProjectVersion.txt");
    let content = fs::read_to_string(path).ok()?;

    content
        .lines()
        .find_map(|line| line.strip_prefix("m_EditorVersion:"))
        .and_then(|version| UnityVersion::parse(version.trim()).ok())
}

/// [`ProjectIo`] over a Unity project directory
pub struct FsProjectIo<I = DirectoryInstaller> {
    root: PathBuf,
    installer: I,
    stash: Option<TempDir>,
}

impl FsProjectIo<DirectoryInstaller> {
    pub fn new(root: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_installer(root, DirectoryInstaller::new(cache_dir))
    }
}

impl<I: PackageInstaller> FsProjectIo<I> {
    pub fn with_installer(root: impl Into<PathBuf>, installer: I) -> Self {
        Self {
            root: root.into(),
            installer,
            stash: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("Packages")
    }

    /// `Packages/<name>`, refusing names that are not a single directory
    pub fn package_path(&self, name: &str) -> io::Result<PathBuf> {
        Ok(self.packages_dir().join(checked_name(name)?))
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join(LOCKFILE_NAME)
    }

    fn stash_dir(&mut self) -> io::Result<&Path> {
        if self.stash.is_none() {
            let temp_root = self.root.join("Temp");
            fs::create_dir_all(&temp_root)?;
            let dir = tempfile::Builder::new()
                .prefix("unitypm-stash-")
                .tempdir_in(temp_root)?;
            self.stash = Some(dir);
        }

        match &self.stash {
            Some(dir) => Ok(dir.path()),
            None => Err(io::Error::other("staging directory unavailable")),
        }
    }

    /// Project-relative path, refusing anything that leaves the project
    fn project_path(&self, relative: &Path) -> io::Result<PathBuf> {
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is outside the project", relative.display()),
            ));
        }
        Ok(self.root.join(relative))
    }
}

fn meta_path(path: &Path) -> PathBuf {
    let mut meta = OsString::from(path.as_os_str());
    meta.push(".meta");
    PathBuf::from(meta)
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn into_io(error: Error) -> io::Error {
    match error {
        Error::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

impl<I: PackageInstaller> ProjectIo for FsProjectIo<I> {
    fn load_installed(&self) -> Result<InstalledState> {
        let mut state = Lockfile::load_from(self.lockfile_path())?
            .map(|lockfile| lockfile.to_state())
            .unwrap_or_default();

        if let Some(unity) = read_project_unity(&self.root) {
            state.unity = Some(unity);
        }
        Ok(state)
    }

    fn stash_package(&mut self, name: &str) -> io::Result<()> {
        let installed = self.package_path(name)?;
        if !installed.exists() {
            debug!("{} has no files to stash", name);
            return Ok(());
        }

        let target = self.stash_dir()?.join(name);
        fs::rename(&installed, &target)
    }

    fn restore_package(&mut self, name: &str) -> io::Result<()> {
        let installed = self.package_path(name)?;
        let Some(stash) = &self.stash else {
            return Ok(());
        };
        let stashed = stash.path().join(name);
        if !stashed.exists() {
            return Ok(());
        }

        if installed.exists() {
            fs::remove_dir_all(&installed)?;
        }
        fs::rename(&stashed, &installed)
    }

    fn discard_stash(&mut self) -> io::Result<()> {
        match self.stash.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }

    fn install_package(&mut self, package: &PackageInfo, source: &PackageSource) -> io::Result<()> {
        let dest = self.package_path(&package.name)?;
        self.installer.install(package, source, &dest)
    }

    fn uninstall_package(&mut self, name: &str) -> io::Result<()> {
        ignore_missing(fs::remove_dir_all(self.package_path(name)?))
    }

    fn write_installed(&mut self, state: &InstalledState) -> io::Result<()> {
        Lockfile::from_state(state)
            .save_to(self.lockfile_path())
            .map_err(into_io)
    }

    fn remove_legacy_file(&mut self, path: &Path) -> io::Result<()> {
        let full = self.project_path(path)?;
        ignore_missing(fs::remove_file(&full))?;
        ignore_missing(fs::remove_file(meta_path(&full)))
    }

    fn remove_legacy_folder(&mut self, path: &Path) -> io::Result<()> {
        let full = self.project_path(path)?;
        ignore_missing(fs::remove_dir_all(&full))?;
        ignore_missing(fs::remove_file(meta_path(&full)))
    }
}

//! Test utilities and helpers for UnityPM integration tests.
//!
//! This module provides builders for catalogs and project states, an
//! in-memory [`ProjectIo`], and an on-disk test environment for CLI tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use unitypm::{
    Catalog, CatalogSettings, DependencyRange, InstalledPackage, InstalledState, PackageInfo,
    PackageSource, ProjectIo, ProjectState, SourcedPackage, UnityVersion, Version,
};

/// Parse a version, panicking on bad test input
pub fn v(version: &str) -> Version {
    Version::parse(version).expect("invalid test version")
}

/// Package with `any` dependencies on each of `deps`
pub fn pkg(name: &str, version: &str, deps: &[&str]) -> PackageInfo {
    deps.iter().fold(PackageInfo::new(name, v(version)), |info, dep| {
        info.with_dependency(*dep, DependencyRange::any())
    })
}

/// Builds a catalog from listings
pub struct CatalogBuilder {
    listings: Vec<SourcedPackage>,
    settings: CatalogSettings,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            listings: Vec::new(),
            settings: CatalogSettings::default(),
        }
    }

    /// Add a package from the default test repository
    pub fn package(self, info: PackageInfo) -> Self {
        self.from_repo("com.example.test", info)
    }

    pub fn from_repo(mut self, repository_id: &str, info: PackageInfo) -> Self {
        let source = PackageSource::remote(repository_id, format!("{} listing", repository_id));
        self.listings.push(SourcedPackage::new(info, source));
        self
    }

    /// Add a local user package registered at a placeholder directory
    pub fn user(self, info: PackageInfo) -> Self {
        let path = PathBuf::from("/user-packages").join(&info.name);
        self.user_at(info, path)
    }

    pub fn user_at(mut self, info: PackageInfo, path: impl Into<PathBuf>) -> Self {
        self.listings
            .push(SourcedPackage::new(info, PackageSource::local(path)));
        self
    }

    pub fn unity(mut self, unity: UnityVersion) -> Self {
        self.settings.unity = Some(unity);
        self
    }

    /// List prerelease versions and let them satisfy ranges
    pub fn prerelease(mut self) -> Self {
        self.settings.show_prerelease = true;
        self
    }

    pub fn settings(mut self, settings: CatalogSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn listings(&self) -> &[SourcedPackage] {
        &self.listings
    }

    pub fn build(&self) -> Catalog {
        Catalog::build(&self.listings, &self.settings)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds an installed project state
pub struct StateBuilder {
    unity: Option<UnityVersion>,
    installed: BTreeMap<String, InstalledPackage>,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self {
            unity: None,
            installed: BTreeMap::new(),
        }
    }

    pub fn unity(mut self, unity: UnityVersion) -> Self {
        self.unity = Some(unity);
        self
    }

    /// Installed package the user asked for
    pub fn requested(self, info: &PackageInfo) -> Self {
        self.package(InstalledPackage::from_info(info, true))
    }

    /// Installed package pulled in as a dependency
    pub fn dependency(self, info: &PackageInfo) -> Self {
        self.package(InstalledPackage::from_info(info, false))
    }

    pub fn package(mut self, package: InstalledPackage) -> Self {
        self.installed.insert(package.name.clone(), package);
        self
    }

    pub fn build(&self) -> ProjectState {
        ProjectState::new(self.unity, self.installed.clone())
    }

    pub fn installed_state(&self) -> InstalledState {
        InstalledState {
            unity: self.unity,
            packages: self.installed.clone(),
        }
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory project storage that records every mutation
#[derive(Debug, Default)]
pub struct MemoryIo {
    pub record: InstalledState,
    /// Package directories currently present
    pub packages: BTreeSet<String>,
    pub stashed: BTreeSet<String>,
    pub calls: Vec<String>,
    /// Installing this package fails
    pub fail_install: Option<String>,
}

impl MemoryIo {
    pub fn new(record: InstalledState) -> Self {
        let packages = record.packages.keys().cloned().collect();
        Self {
            record,
            packages,
            ..Default::default()
        }
    }

    /// Number of calls that changed something
    pub fn mutations(&self) -> usize {
        self.calls.len()
    }
}

impl ProjectIo for MemoryIo {
    fn load_installed(&self) -> unitypm::Result<InstalledState> {
        Ok(self.record.clone())
    }

    fn stash_package(&mut self, name: &str) -> std::io::Result<()> {
        self.calls.push(format!("stash {}", name));
        if self.packages.remove(name) {
            self.stashed.insert(name.to_string());
        }
        Ok(())
    }

    fn restore_package(&mut self, name: &str) -> std::io::Result<()> {
        self.calls.push(format!("restore {}", name));
        if self.stashed.remove(name) {
            self.packages.insert(name.to_string());
        }
        Ok(())
    }

    fn discard_stash(&mut self) -> std::io::Result<()> {
        self.calls.push("discard".to_string());
        self.stashed.clear();
        Ok(())
    }

    fn install_package(
        &mut self,
        package: &PackageInfo,
        _source: &PackageSource,
    ) -> std::io::Result<()> {
        if self.fail_install.as_deref() == Some(package.name.as_str()) {
            return Err(std::io::Error::other("simulated install failure"));
        }
        self.calls.push(format!("install {}", package.name));
        self.packages.insert(package.name.clone());
        Ok(())
    }

    fn uninstall_package(&mut self, name: &str) -> std::io::Result<()> {
        self.calls.push(format!("uninstall {}", name));
        self.packages.remove(name);
        Ok(())
    }

    fn write_installed(&mut self, state: &InstalledState) -> std::io::Result<()> {
        self.calls.push("write".to_string());
        self.record = state.clone();
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

/// Isolated on-disk environment: project, config directory and package cache
pub struct TestProject {
    pub temp_dir: TempDir,
    pub project_path: PathBuf,
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        let project_path = root.join("project");
        let config_dir = root.join(".unitypm");
        let cache_dir = root.join("cache");

        for dir in [&project_path, &config_dir, &cache_dir] {
            fs::create_dir_all(dir).expect("Failed to create test directory");
        }

        Self {
            temp_dir,
            project_path,
            config_dir,
            cache_dir,
        }
    }

    /// Project with `ProjectSettings/ProjectVersion.txt` for `editor`
    pub fn with_unity(editor: &str) -> Self {
        let project = Self::new();
        let settings = project.project_path.join("ProjectSettings");
        fs::create_dir_all(&settings).expect("Failed to create ProjectSettings");
        fs::write(
            settings.join("ProjectVersion.txt"),
            format!("m_EditorVersion: {}\n", editor),
        )
        .expect("Failed to write ProjectVersion.txt");
        project
    }

    /// Write a repository listing and point the config at it
    pub fn write_repository(&self, id: &str, name: &str, packages: &[PackageInfo]) {
        let mut listing: BTreeMap<&str, BTreeMap<String, BTreeMap<String, &PackageInfo>>> =
            BTreeMap::new();
        for info in packages {
            listing
                .entry(info.name.as_str())
                .or_default()
                .entry("versions".to_string())
                .or_default()
                .insert(info.version.to_string(), info);
        }

        let json = serde_json::json!({ "id": id, "name": name, "packages": listing });
        fs::write(
            self.config_dir.join(format!("{}.json", id)),
            serde_json::to_string_pretty(&json).expect("Failed to serialize listing"),
        )
        .expect("Failed to write listing");

        let config = format!(
            r#"package_cache_dir = "{}"

[[repositories]]
id = "{}"
name = "{}"
path = "{}.json"
"#,
            self.cache_dir.display(),
            id,
            name,
            id
        );
        fs::write(self.config_dir.join("config.toml"), config).expect("Failed to write config");
    }

    /// Put a package payload into the cache
    pub fn cache_package(&self, info: &PackageInfo) {
        let dir = self
            .cache_dir
            .join(&info.name)
            .join(info.version.to_string());
        fs::create_dir_all(&dir).expect("Failed to create cache directory");
        fs::write(
            dir.join("package.json"),
            serde_json::to_string_pretty(info).expect("Failed to serialize manifest"),
        )
        .expect("Failed to write manifest");
    }

    pub fn path(&self) -> &Path {
        &self.project_path
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.project_path.join("Packages").join(name).exists()
    }

    pub fn has_lockfile(&self) -> bool {
        self.project_path.join("unitypm.lock").exists()
    }

    pub fn read_lockfile(&self) -> String {
        fs::read_to_string(self.project_path.join("unitypm.lock"))
            .expect("Failed to read lockfile")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

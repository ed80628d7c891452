//! UnityPM - package resolution and change planning for VPM packages
//!
//! UnityPM manages the VPM packages installed in a Unity project. It folds
//! repository listings into a catalog, resolves dependencies against the
//! project's Unity editor, and computes the installs and removals a request
//! needs before anything on disk is touched:
//!
//! - Catalog aggregation across official, curated, user and local packages
//! - Unity compatibility checks, including historical SDK exceptions
//! - Dependency closure with version and Unity conflict reporting
//! - Avatars/Worlds SDK exclusivity and legacy package cleanup
//! - Staged, all-or-nothing application with stale-plan detection
//!
//! # Examples
//!
//! ```no_run
//! use unitypm::{ApplyOptions, Catalog, Config, FileRegistry, FsProjectIo, PlanRequest, Project};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let project = Project::open(FsProjectIo::new(".", &config.package_cache_dir))?;
//!
//! let listings = FileRegistry::from_config(&config).load()?;
//! let catalog = Catalog::build(&listings.packages, &config.catalog_settings(project.unity()?));
//!
//! let plan = project.plan(&catalog, &PlanRequest::install("com.vrchat.avatars"))?;
//! for (name, change) in &plan.package_changes {
//!     println!("{}: {:?}", name, change);
//! }
//! project.apply(&plan, plan.state_token, ApplyOptions::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`version`] - Package and Unity versions, dependency ranges
//! - [`package`] - Package metadata, sources and installed records
//! - [`compatibility`] - Unity compatibility rules
//! - [`catalog`] - Catalog snapshots and presentation rows
//! - [`resolver`] - Dependency closure, exclusivity pruning, unused sweep
//! - [`planner`] - Requests to [`PendingProjectChanges`]
//! - [`applier`] - Staged application with rollback
//! - [`project`] - Single-writer project handle
//! - [`io`], [`installer`], [`lockfile`] - Project storage
//! - [`registry`] - Cached repository listings
//! - [`config`] - User configuration
//! - [`error`] - Error types and result handling

pub mod applier;
pub mod catalog;
pub mod changes;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod installer;
pub mod io;
pub mod lockfile;
pub mod package;
pub mod planner;
pub mod project;
pub mod registry;
pub mod resolver;
pub mod version;

pub use applier::{apply_changes, ApplyOptions};
pub use catalog::{
    Catalog, CatalogEntry, CatalogSettings, CatalogVersion, InstalledRow, LatestStatus, PackageRow,
    CURATED_REPOSITORY, OFFICIAL_REPOSITORY,
};
pub use changes::{
    ConflictInfo, PackageChange, PendingProjectChanges, PlanToken, RemoveReason, StateToken,
};
pub use compatibility::{is_unity_compatible, CompatibilityRules, UnityPinRule};
pub use config::Config;
pub use error::{Error, Result};
pub use installer::{read_project_unity, DirectoryInstaller, FsProjectIo, PackageInstaller};
pub use io::{InstalledState, ProjectIo};
pub use lockfile::{LockedPackage, Lockfile, LOCKFILE_NAME};
pub use package::{is_valid_package_name, InstalledPackage, PackageInfo, PackageSource, SourcedPackage};
pub use planner::{PlanRequest, Planner};
pub use project::{Project, ProjectState};
pub use registry::{FileRegistry, Listings};
pub use resolver::{
    Pin, Resolution, ResolveRequest, ResolvedPackage, Resolver, AVATARS_SDK, WORLDS_SDK,
};
pub use version::{compare_prerelease, DependencyRange, UnityVersion, Version};

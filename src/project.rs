//! Project handle
//!
//! A [`Project`] serializes planning and applying for one project behind a
//! single lock. Plans record the state token they were computed against and
//! applying checks and advances that token while holding the same lock, so a
//! plan computed before another apply is always rejected as stale.
//!
//! # Examples
//!
//! ```no_run
//! use unitypm::{ApplyOptions, Catalog, CatalogSettings, FsProjectIo, PlanRequest, Project};
//!
//! # fn main() -> unitypm::Result<()> {
//! let io = FsProjectIo::new("MyProject", "packages-cache");
//! let project = Project::open(io)?;
//! let catalog = Catalog::build(&[], &CatalogSettings::default());
//!
//! let plan = project.plan(&catalog, &PlanRequest::Resolve)?;
//! project.apply(&plan, plan.state_token, ApplyOptions::default())?;
//! # Ok(())
//! # }
//! ```

use crate::applier::{apply_changes, ApplyOptions};
use crate::catalog::Catalog;
use crate::changes::{PendingProjectChanges, PlanToken, StateToken};
use crate::error::{Error, Result};
use crate::io::ProjectIo;
use crate::package::InstalledPackage;
use crate::planner::{PlanRequest, Planner};
use crate::version::UnityVersion;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Snapshot of a project's installed packages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectState {
    pub unity: Option<UnityVersion>,
    pub installed: BTreeMap<String, InstalledPackage>,
    pub token: StateToken,
}

impl ProjectState {
    pub fn new(unity: Option<UnityVersion>, installed: BTreeMap<String, InstalledPackage>) -> Self {
        Self {
            unity,
            installed,
            token: StateToken::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.installed.get(name)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.contains_key(name)
    }
}

struct Inner<IO> {
    state: ProjectState,
    io: IO,
}

/// Single-writer handle over one project
pub struct Project<IO: ProjectIo> {
    inner: Mutex<Inner<IO>>,
    next_plan: AtomicU64,
}

impl<IO: ProjectIo> Project<IO> {
    /// Load the installed state through `io`
    pub fn open(io: IO) -> Result<Self> {
        let loaded = io.load_installed()?;
        let state = ProjectState::new(loaded.unity, loaded.packages);
        Ok(Self {
            inner: Mutex::new(Inner { state, io }),
            next_plan: AtomicU64::new(1),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<IO>>> {
        self.inner
            .lock()
            .map_err(|_| Error::Other("project lock poisoned by a failed operation".to_string()))
    }

    /// Current installed state
    pub fn state(&self) -> Result<ProjectState> {
        Ok(self.lock()?.state.clone())
    }

    pub fn unity(&self) -> Result<Option<UnityVersion>> {
        Ok(self.lock()?.state.unity)
    }

    /// Compute changes for `request` against the current state
    pub fn plan(&self, catalog: &Catalog, request: &PlanRequest) -> Result<PendingProjectChanges> {
        let inner = self.lock()?;
        let token = PlanToken(self.next_plan.fetch_add(1, Ordering::Relaxed));
        Planner::new(catalog, &inner.state).plan(request, token)
    }

    /// Apply a plan computed by [`Project::plan`]
    ///
    /// `expected` is the state token the caller planned against, normally
    /// `plan.state_token`.
    pub fn apply(
        &self,
        plan: &PendingProjectChanges,
        expected: StateToken,
        options: ApplyOptions,
    ) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        let written = apply_changes(&mut inner.io, &inner.state, plan, expected, options)?;
        inner.state.installed = written.packages;
        inner.state.token = inner.state.token.next();
        info!("project state advanced to {}", inner.state.token);
        Ok(())
    }

    /// Give back the IO collaborator
    pub fn into_io(self) -> Result<IO> {
        self.inner
            .into_inner()
            .map(|inner| inner.io)
            .map_err(|_| Error::Other("project lock poisoned by a failed operation".to_string()))
    }
}

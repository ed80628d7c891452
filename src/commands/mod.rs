pub mod install;
pub mod list;
pub mod reinstall;
pub mod remove;
pub mod resolve;
pub mod search;
pub mod upgrade;

use anyhow::{bail, Context as _, Result};
use std::path::PathBuf;
use unitypm::{
    ApplyOptions, Catalog, Config, Error, FileRegistry, FsProjectIo, PackageChange,
    PendingProjectChanges, PlanRequest, Project, UnityVersion,
};

/// Settings shared by every command
pub struct Context {
    pub config: Config,
    pub project_dir: PathBuf,
    pub unity_override: Option<UnityVersion>,
}

impl Context {
    pub fn new(project: Option<PathBuf>, unity: Option<String>) -> Result<Self> {
        let project_dir = match project {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        if !project_dir.is_dir() {
            bail!("Project directory not found: {}", project_dir.display());
        }

        let unity_override = unity
            .map(|u| UnityVersion::parse(&u))
            .transpose()
            .context("Invalid --unity value, expected e.g. 2022.3")?;

        Ok(Self {
            config: Config::load()?,
            project_dir,
            unity_override,
        })
    }

    pub fn open_project(&self) -> Result<Project<FsProjectIo>> {
        let io = FsProjectIo::new(&self.project_dir, &self.config.package_cache_dir);
        Ok(Project::open(io)?)
    }

    /// Catalog for the project's editor, or the `--unity` override
    pub fn catalog(&self, project_unity: Option<UnityVersion>) -> Result<Catalog> {
        let unity = self.unity_override.or(project_unity);
        let listings = FileRegistry::from_config(&self.config).load()?;
        Ok(Catalog::build(
            &listings.packages,
            &self.config.catalog_settings(unity),
        ))
    }
}

/// Plan `request`, print the plan and apply it unless `dry_run`
pub fn execute(ctx: &Context, request: PlanRequest, dry_run: bool, force: bool) -> Result<()> {
    let project = ctx.open_project()?;
    let catalog = ctx.catalog(project.unity()?)?;

    let plan = match project.plan(&catalog, &request) {
        Ok(plan) => plan,
        Err(Error::PackageNotFound(name)) => {
            let similar = catalog.similar_names(&name);
            if !similar.is_empty() {
                println!("Did you mean one of these?");
                for candidate in &similar {
                    println!("  {}", candidate);
                }
                println!();
            }
            return Err(Error::PackageNotFound(name).into());
        }
        Err(e) => return Err(e.into()),
    };

    if plan.is_empty() && !plan.has_conflicts() {
        println!("Nothing to do, the project is up to date.");
        return Ok(());
    }

    print_plan(&plan);

    if dry_run {
        println!("[DRY RUN] No changes applied.");
        return Ok(());
    }

    let options = ApplyOptions {
        allow_conflicts: force,
    };
    project.apply(&plan, plan.state_token, options)?;

    let installs = plan.installs().count();
    let removals = plan.removals().count();
    println!(
        "✓ Applied {} install{} and {} removal{}",
        installs,
        if installs == 1 { "" } else { "s" },
        removals,
        if removals == 1 { "" } else { "s" }
    );
    Ok(())
}

pub fn print_plan(plan: &PendingProjectChanges) {
    if !plan.package_changes.is_empty() {
        println!("Changes:");
        for (name, change) in &plan.package_changes {
            match change {
                PackageChange::InstallNew { package, .. } => {
                    println!("  + {} {}", name, package.version);
                }
                PackageChange::Remove(reason) => {
                    println!("  - {} ({})", name, reason);
                }
            }
        }
        println!();
    }

    if !plan.legacy_files.is_empty() || !plan.legacy_folders.is_empty() {
        println!("Legacy assets to delete:");
        for path in plan.legacy_folders.iter().chain(&plan.legacy_files) {
            println!("  {}", path.display());
        }
        println!();
    }

    if plan.has_conflicts() {
        println!("⚠ Conflicts:");
        for line in plan.describe_conflicts().lines() {
            println!("  {}", line);
        }
        println!();
    }
}

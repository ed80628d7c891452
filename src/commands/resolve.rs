use super::{execute, Context};
use anyhow::Result;
use unitypm::PlanRequest;

/// Install whatever the installed packages are missing
pub fn run(ctx: &Context, dry_run: bool, force: bool) -> Result<()> {
    execute(ctx, PlanRequest::Resolve, dry_run, force)
}

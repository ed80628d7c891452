use super::{execute, Context};
use anyhow::Result;
use unitypm::PlanRequest;

pub fn run(ctx: &Context, packages: Vec<String>, dry_run: bool, force: bool) -> Result<()> {
    execute(ctx, PlanRequest::Remove(packages), dry_run, force)
}

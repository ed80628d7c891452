use super::{execute, Context};
use anyhow::Result;
use unitypm::PlanRequest;

pub fn run(ctx: &Context, packages: Vec<String>, dry_run: bool, force: bool) -> Result<()> {
    let request = if packages.is_empty() {
        PlanRequest::UpgradeAll
    } else {
        PlanRequest::UpgradeSelected(packages)
    };
    execute(ctx, request, dry_run, force)
}

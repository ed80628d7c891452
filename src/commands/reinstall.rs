use super::{execute, Context};
use anyhow::Result;
use unitypm::PlanRequest;

pub fn run(ctx: &Context, dry_run: bool, force: bool) -> Result<()> {
    println!("Reinstalling every package at its installed version...");
    println!();
    execute(ctx, PlanRequest::Reinstall, dry_run, force)
}

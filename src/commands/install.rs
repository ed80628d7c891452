use super::{execute, Context};
use anyhow::{bail, Result};
use unitypm::{PlanRequest, Version};

/// Split `name@version` into its parts
fn parse_spec(spec: &str) -> Result<(String, Option<Version>)> {
    match spec.split_once('@') {
        Some((name, version)) => Ok((name.to_string(), Some(Version::parse(version)?))),
        None => Ok((spec.to_string(), None)),
    }
}

fn request_for(specs: &[String]) -> Result<PlanRequest> {
    let mut parsed = specs
        .iter()
        .map(|s| parse_spec(s))
        .collect::<Result<Vec<_>>>()?;

    match parsed.len() {
        0 => bail!("No packages given"),
        1 => {
            let (name, version) = parsed.remove(0);
            Ok(PlanRequest::Install { name, version })
        }
        _ => {
            if parsed.iter().any(|(_, version)| version.is_some()) {
                bail!("Exact versions can only be requested one package at a time");
            }
            Ok(PlanRequest::InstallSelected(
                parsed.into_iter().map(|(name, _)| name).collect(),
            ))
        }
    }
}

pub fn run(ctx: &Context, packages: Vec<String>, dry_run: bool, force: bool) -> Result<()> {
    let request = request_for(&packages)?;
    execute(ctx, request, dry_run, force)
}

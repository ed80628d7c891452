use super::Context;
use anyhow::Result;
use unitypm::LatestStatus;

/// Show installed packages first, then everything else the catalog offers
pub fn run(ctx: &Context, installed_only: bool) -> Result<()> {
    let project = ctx.open_project()?;
    let state = project.state()?;
    let catalog = ctx.catalog(project.unity()?)?;

    if let Some(unity) = ctx.unity_override.or(state.unity) {
        println!("Unity: {}", unity);
        println!();
    }

    let rows = catalog.rows(&state);
    let rows: Vec<_> = rows
        .iter()
        .filter(|row| !installed_only || row.installed.is_some())
        .collect();

    if rows.is_empty() {
        println!("No packages installed.");
        println!();
        println!("Install packages with: unitypm install <package>");
        return Ok(());
    }

    for row in &rows {
        let installed = match &row.installed {
            Some(installed) if installed.yanked => format!("{} (yanked)", installed.version),
            Some(installed) => installed.version.to_string(),
            None => "-".to_string(),
        };

        let latest = match &row.latest {
            LatestStatus::None => String::new(),
            LatestStatus::Contains {
                package,
                has_incompatible_newer,
            } => format!(
                "latest {}{}",
                package.version,
                if *has_incompatible_newer { " (newer for other Unity)" } else { "" }
            ),
            LatestStatus::Upgradable {
                package,
                has_incompatible_newer,
            } => format!(
                "upgrade to {}{}",
                package.version,
                if *has_incompatible_newer { " (newer for other Unity)" } else { "" }
            ),
        };

        let sources: Vec<&str> = row.sources.iter().map(String::as_str).collect();
        let sources = if row.has_source {
            sources.join(", ")
        } else {
            "no source".to_string()
        };

        println!(
            "  {:<40} {:<16} {:<32} [{}]",
            row.name, installed, latest, sources
        );
    }
    println!();

    let installed = rows.iter().filter(|row| row.installed.is_some()).count();
    println!(
        "Total: {} package{} installed",
        installed,
        if installed == 1 { "" } else { "s" }
    );

    Ok(())
}

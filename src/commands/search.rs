use super::Context;
use anyhow::Result;

pub fn run(ctx: &Context, query: String) -> Result<()> {
    println!("Searching for: {}", query);
    println!();

    let project = ctx.open_project()?;
    let catalog = ctx.catalog(project.unity()?)?;
    let results = catalog.search(&query);

    if results.is_empty() {
        println!("No packages found matching '{}'", query);
        println!();
        println!("Try a different search term, or check that your repositories are not hidden.");
        return Ok(());
    }

    println!(
        "Found {} package{}:",
        results.len(),
        if results.len() == 1 { "" } else { "s" }
    );
    for entry in &results {
        let latest = entry
            .latest_compatible()
            .map(|p| p.version.to_string())
            .unwrap_or_else(|| "no compatible version".to_string());

        if entry.description.is_empty() {
            println!("  {} ({})", entry.name, latest);
        } else {
            println!("  {} ({}) - {}", entry.name, latest, entry.description);
        }
    }
    println!();

    Ok(())
}

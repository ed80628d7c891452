use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// UnityPM - package manager for VPM packages in Unity projects
#[derive(Parser)]
#[command(name = "unitypm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Override the project's Unity version (e.g., --unity 2022.3)
    #[arg(short, long, global = true)]
    unity: Option<String>,

    /// Show resolver and apply details on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List packages for the project
    List {
        /// Only show installed packages
        #[arg(long)]
        installed: bool,
    },

    /// Search packages by name, display name or alias
    Search {
        /// Search query
        query: String,
    },

    /// Install packages
    Install {
        /// Package names (e.g., com.vrchat.avatars@3.5.0)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Apply even if conflicts are detected
        #[arg(short, long)]
        force: bool,

        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Upgrade packages to their latest compatible versions
    Upgrade {
        /// Packages to upgrade (all installed packages when omitted)
        packages: Vec<String>,

        /// Apply even if conflicts are detected
        #[arg(short, long)]
        force: bool,

        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove packages
    Remove {
        /// Package names
        #[arg(required = true)]
        packages: Vec<String>,

        /// Apply even if conflicts are detected
        #[arg(short, long)]
        force: bool,

        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Install missing dependencies of the installed packages
    Resolve {
        /// Apply even if conflicts are detected
        #[arg(short, long)]
        force: bool,

        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Reinstall every installed package at its installed version
    Reinstall {
        /// Apply even if conflicts are detected
        #[arg(short, long)]
        force: bool,

        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "unitypm=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("UNITYPM_LOG").unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "unitypm", &mut std::io::stdout());
            Ok(())
        }
        command => commands::Context::new(cli.project, cli.unity).and_then(|ctx| match command {
            Commands::List { installed } => commands::list::run(&ctx, installed),
            Commands::Search { query } => commands::search::run(&ctx, query),
            Commands::Install {
                packages,
                force,
                dry_run,
            } => commands::install::run(&ctx, packages, dry_run, force),
            Commands::Upgrade {
                packages,
                force,
                dry_run,
            } => commands::upgrade::run(&ctx, packages, dry_run, force),
            Commands::Remove {
                packages,
                force,
                dry_run,
            } => commands::remove::run(&ctx, packages, dry_run, force),
            Commands::Resolve { force, dry_run } => commands::resolve::run(&ctx, dry_run, force),
            Commands::Reinstall { force, dry_run } => {
                commands::reinstall::run(&ctx, dry_run, force)
            }
            Commands::Completions { .. } => Ok(()),
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

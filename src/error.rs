use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Version parsing error: {0}")]
    SemVer(#[from] semver::Error),

    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    #[error("Package not found: {0}\n\n\
             Hint: The package is not present in any visible repository.\n\
             Check the package name spelling, or make sure the repository that\n\
             provides it is not hidden in your configuration.")]
    PackageNotFound(String),

    #[error("Version {version} of '{name}' not found in the catalog")]
    VersionNotFound { name: String, version: String },

    #[error("Package '{0}' is not installed in this project")]
    NotInstalled(String),

    #[error("Package '{dependency}' (required by '{required_by}') not found\n\n\
             Hint: A dependency could not be located in any visible repository.\n\
             Add the repository providing it, or unhide it in your configuration.")]
    DependencyNotFound {
        dependency: String,
        required_by: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflicts detected: {0}\n\n\
             Hint: The computed changes contain version or Unity compatibility conflicts.\n\
             Review them, then re-run with --force to apply anyway.")]
    ConflictDetected(String),

    #[error("The project changed since these changes were computed \
             (plan state {plan_state}, project state {live_state})\n\n\
             Hint: Re-run the command to compute a fresh set of changes.")]
    StalePlan { plan_state: u64, live_state: u64 },

    #[error("Applying changes failed while {stage}: {source}\n\n\
             The project was rolled back to its previous state.")]
    PartialApplyFailure {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid lockfile: {0}")]
    InvalidLockfile(String),

    #[error("{0}")]
    Other(String),
}

//! Integration tests for repository listings, configuration and the catalog
//! built from them.
//!
//! Every test writes its listings and `config.toml` into a temporary
//! directory with absolute paths, so nothing depends on `UNITYPM_CONFIG_DIR`.

mod test_utils;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use test_utils::{pkg, v};
use unitypm::{
    Catalog, Config, FileRegistry, PackageInfo, PackageSource, UnityVersion, CURATED_REPOSITORY,
    OFFICIAL_REPOSITORY,
};

fn write_listing(dir: &Path, file: &str, id: &str, name: &str, packages: &[PackageInfo]) -> PathBuf {
    let mut listing = serde_json::Map::new();
    for info in packages {
        let entry = listing
            .entry(info.name.clone())
            .or_insert_with(|| serde_json::json!({ "versions": {} }));
        entry["versions"][info.version.to_string()] = serde_json::to_value(info).unwrap();
    }

    let path = dir.join(file);
    let json = serde_json::json!({ "id": id, "name": name, "packages": listing });
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    path
}

fn write_user_package(dir: &Path, info: &PackageInfo) -> PathBuf {
    let path = dir.join(&info.name);
    fs::create_dir_all(&path).unwrap();
    fs::write(
        path.join("package.json"),
        serde_json::to_string_pretty(info).unwrap(),
    )
    .unwrap();
    path
}

fn load_catalog(config: &Config, unity: Option<UnityVersion>) -> Catalog {
    let listings = FileRegistry::from_config(config).load().unwrap();
    Catalog::build(&listings.packages, &config.catalog_settings(unity))
}

// ============================================================================
// Configuration
// ============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            format!(
                r#"
user_packages = ["{dir}/MyPackage"]
package_cache_dir = "{dir}/cache"

[catalog]
show_prerelease = true
hidden_repositories = ["com.example.hidden"]

[[repositories]]
id = "com.example.repo"
name = "Example"
path = "{dir}/example.json"

[[compatibility.rules]]
packages = ["com.example.legacy"]
from = [1, 0, 0]
through = [1, 9, 99]
unity_major = 2019
"#,
                dir = temp.path().display()
            ),
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.catalog.show_prerelease);
        assert!(config.catalog.hidden_repositories.contains("com.example.hidden"));
        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.user_packages.len(), 1);
        assert_eq!(config.compatibility.rules.len(), 1);

        let saved = temp.path().join("saved.toml");
        config.save_to(&saved).unwrap();
        assert_eq!(Config::load_from(&saved).unwrap(), config);
    }

    #[test]
    fn test_catalog_settings_follow_config() {
        let mut config = Config::default();
        config.catalog.hide_local_user_packages = true;

        let settings = config.catalog_settings(Some(UnityVersion::new(2022, 3)));
        assert!(settings.hide_local_user_packages);
        assert_eq!(
            settings.repository_order,
            vec![OFFICIAL_REPOSITORY.to_string(), CURATED_REPOSITORY.to_string()]
        );
        assert_eq!(settings.unity, Some(UnityVersion::new(2022, 3)));
    }

    #[test]
    fn test_extra_compatibility_rule_applies() {
        let temp = TempDir::new().unwrap();
        let legacy = pkg("com.example.legacy", "1.2.0", &[]).with_unity(UnityVersion::new(2019, 4));

        let mut config = Config::default();
        config.repositories.clear();
        config.repositories.push(unitypm::config::RepositoryConfig {
            id: "com.example.repo".to_string(),
            name: "Example".to_string(),
            path: write_listing(temp.path(), "example.json", "com.example.repo", "Example", &[legacy]),
        });

        let u2022 = Some(UnityVersion::new(2022, 3));
        assert!(load_catalog(&config, u2022)
            .get("com.example.legacy")
            .unwrap()
            .is_compatible_version(&v("1.2.0")));

        config
            .compatibility
            .rules
            .push(unitypm::UnityPinRule {
                packages: vec!["com.example.legacy".to_string()],
                from: (1, 0, 0),
                through: (1, 9, u64::MAX),
                unity_major: 2019,
            });
        assert!(!load_catalog(&config, u2022)
            .get("com.example.legacy")
            .unwrap()
            .is_compatible_version(&v("1.2.0")));
    }
}

// ============================================================================
// Listings
// ============================================================================

mod listings {
    use super::*;

    #[test]
    fn test_missing_listing_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut registry = FileRegistry::new();
        registry.add_repository("com.example.gone", "Gone", temp.path().join("gone.json"));
        let path = write_listing(
            temp.path(),
            "here.json",
            "com.example.here",
            "Here",
            &[pkg("com.example.tool", "1.0.0", &[])],
        );
        registry.add_repository("com.example.here", "Here", path);

        let listings = registry.load().unwrap();
        assert_eq!(listings.packages.len(), 1);
        assert_eq!(
            listings.repository_order,
            vec!["com.example.gone".to_string(), "com.example.here".to_string()]
        );
    }

    #[test]
    fn test_malformed_listing_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let mut registry = FileRegistry::new();
        registry.add_repository("com.example.broken", "Broken", path);
        assert!(registry.load().is_err());
    }

    #[test]
    fn test_bad_version_entry_only_skips_itself() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("listing.json");
        fs::write(
            &path,
            r#"{
                "id": "com.example.repo",
                "name": "Example",
                "packages": {
                    "com.example.tool": {
                        "versions": {
                            "1.0.0": { "name": "com.example.tool", "version": "1.0.0" },
                            "oops": { "name": "com.example.tool", "version": "not-a-version" }
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        let mut registry = FileRegistry::new();
        registry.add_repository("com.example.repo", "Example", path);
        let listings = registry.load().unwrap();
        assert_eq!(listings.packages.len(), 1);
        assert_eq!(listings.packages[0].package.version, v("1.0.0"));
    }

    #[test]
    fn test_user_package_directory() {
        let temp = TempDir::new().unwrap();
        let dir = write_user_package(temp.path(), &pkg("com.example.mine", "0.1.0", &[]));

        let mut registry = FileRegistry::new();
        registry.add_user_package(dir.clone());
        registry.add_user_package(temp.path().join("no-manifest"));

        let listings = registry.load().unwrap();
        assert_eq!(listings.packages.len(), 1);
        assert_eq!(listings.packages[0].source, PackageSource::local(dir));
    }
}

// ============================================================================
// Catalog from configured sources
// ============================================================================

mod catalog {
    use super::*;

    /// Same tool version from official, a user directory and a third-party repo
    fn setup(temp: &TempDir) -> Config {
        let shared = pkg("com.example.tool", "1.0.0", &[]);
        let official = write_listing(
            temp.path(),
            "official.json",
            OFFICIAL_REPOSITORY,
            "Official",
            &[shared.clone(), pkg("com.vrchat.base", "3.5.0", &[])],
        );
        let third = write_listing(
            temp.path(),
            "third.json",
            "com.example.third",
            "Third Party",
            &[
                shared.clone(),
                pkg("com.example.tool", "1.1.0-beta.1", &[]),
                pkg("com.example.tool", "0.9.0", &[]).yanked(),
            ],
        );
        let user = write_user_package(temp.path(), &shared);

        let mut config = Config::default();
        config.repositories = vec![
            unitypm::config::RepositoryConfig {
                id: "com.example.third".to_string(),
                name: "Third Party".to_string(),
                path: third,
            },
            unitypm::config::RepositoryConfig {
                id: OFFICIAL_REPOSITORY.to_string(),
                name: "Official".to_string(),
                path: official,
            },
        ];
        config.user_packages = vec![user];
        config
    }

    #[test]
    fn test_sources_follow_preference_order() {
        let temp = TempDir::new().unwrap();
        let catalog = load_catalog(&setup(&temp), None);

        let version = catalog
            .get("com.example.tool")
            .unwrap()
            .get(&v("1.0.0"))
            .unwrap();
        let sources: Vec<Option<&str>> =
            version.sources.iter().map(|s| s.repository_id()).collect();
        assert_eq!(
            sources,
            vec![Some(OFFICIAL_REPOSITORY), None, Some("com.example.third")]
        );
    }

    #[test]
    fn test_prerelease_hidden_by_default() {
        let temp = TempDir::new().unwrap();
        let mut config = setup(&temp);

        let catalog = load_catalog(&config, None);
        assert_eq!(
            catalog.latest_compatible("com.example.tool").unwrap().version,
            v("1.0.0")
        );

        config.catalog.show_prerelease = true;
        let catalog = load_catalog(&config, None);
        assert_eq!(
            catalog.latest_compatible("com.example.tool").unwrap().version,
            v("1.1.0-beta.1")
        );
    }

    #[test]
    fn test_yanked_versions_are_findable_but_not_offered() {
        let temp = TempDir::new().unwrap();
        let catalog = load_catalog(&setup(&temp), None);

        let entry = catalog.get("com.example.tool").unwrap();
        assert!(entry.get(&v("0.9.0")).is_none());
        assert!(catalog.is_yanked("com.example.tool", &v("0.9.0")));
        assert!(catalog.find("com.example.tool", &v("0.9.0")).is_some());
    }

    #[test]
    fn test_hidden_repository_and_user_packages() {
        let temp = TempDir::new().unwrap();
        let mut config = setup(&temp);
        config
            .catalog
            .hidden_repositories
            .insert(OFFICIAL_REPOSITORY.to_string());
        config.catalog.hide_local_user_packages = true;

        let catalog = load_catalog(&config, None);
        assert!(catalog.get("com.vrchat.base").is_none());
        assert!(catalog.is_known("com.vrchat.base"));

        let version = catalog
            .get("com.example.tool")
            .unwrap()
            .get(&v("1.0.0"))
            .unwrap();
        assert_eq!(version.sources.len(), 1);
        assert_eq!(version.sources[0].repository_id(), Some("com.example.third"));
    }

    #[test]
    fn test_search_and_suggestions() {
        let temp = TempDir::new().unwrap();
        let catalog = load_catalog(&setup(&temp), None);

        let results = catalog.search("TOOL");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "com.example.tool");

        assert!(catalog
            .similar_names("com.example.toll")
            .contains(&"com.example.tool".to_string()));
    }
}

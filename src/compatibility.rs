//! Unity editor compatibility rules
//!
//! A package is usable with an editor when its declared minimum editor is
//! not newer than the project's, except for a small table of historical SDK
//! releases which only ever worked on one specific Unity major.

use crate::package::PackageInfo;
use crate::version::{UnityVersion, Version};
use serde::{Deserialize, Serialize};

/// Pins a range of package versions to a single Unity major
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnityPinRule {
    pub packages: Vec<String>,
    /// Inclusive `(major, minor, patch)` lower bound
    pub from: (u64, u64, u64),
    /// Inclusive `(major, minor, patch)` upper bound
    pub through: (u64, u64, u64),
    pub unity_major: u16,
}

impl UnityPinRule {
    pub fn applies_to(&self, name: &str, version: &Version) -> bool {
        let numeric = (version.major(), version.minor(), version.patch());
        self.packages.iter().any(|p| p == name) && self.from <= numeric && numeric <= self.through
    }
}

/// VRChat SDK packages released before Unity 2022 support
const LEGACY_SDK_PACKAGES: &[&str] = &["com.vrchat.avatars", "com.vrchat.worlds", "com.vrchat.base"];

const LEGACY_RESOLVER_PACKAGES: &[&str] = &["com.vrchat.core.vpm-resolver"];

fn builtin_rules() -> Vec<UnityPinRule> {
    let rule = |packages: &[&str], from, through| UnityPinRule {
        packages: packages.iter().map(|p| p.to_string()).collect(),
        from,
        through,
        unity_major: 2019,
    };

    vec![
        rule(LEGACY_SDK_PACKAGES, (3, 0, 0), (3, 4, u64::MAX)),
        rule(LEGACY_RESOLVER_PACKAGES, (0, 1, 0), (0, 1, 26)),
    ]
}

/// The compatibility decision table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityRules {
    rules: Vec<UnityPinRule>,
}

impl Default for CompatibilityRules {
    fn default() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }
}

impl CompatibilityRules {
    /// Built-in table followed by `extra`
    pub fn with_extra(extra: impl IntoIterator<Item = UnityPinRule>) -> Self {
        let mut rules = builtin_rules();
        rules.extend(extra);
        Self { rules }
    }

    pub fn rules(&self) -> &[UnityPinRule] {
        &self.rules
    }

    pub fn is_compatible(&self, package: &PackageInfo, target: Option<UnityVersion>) -> bool {
        let Some(target) = target else {
            return true;
        };
        let Some(minimum) = package.unity else {
            return true;
        };

        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.applies_to(&package.name, &package.version))
        {
            return target.major() == rule.unity_major;
        }

        minimum <= target
    }
}

/// Check a package against the built-in rules
pub fn is_unity_compatible(package: &PackageInfo, target: Option<UnityVersion>) -> bool {
    CompatibilityRules::default().is_compatible(package, target)
}

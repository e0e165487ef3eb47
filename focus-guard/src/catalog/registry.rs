//! Built-in catalogs keyed by FOCUS version, loaded lazily and cached.

use super::RuleCatalog;
use crate::prelude::*;
use once_cell::sync::{Lazy, OnceCell};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// The closed set of supported FOCUS versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FocusVersion {
    V1_0,
    V1_1,
    V1_2,
}

impl FocusVersion {
    /// Every supported version, oldest first.
    pub const ALL: [FocusVersion; 3] = [FocusVersion::V1_0, FocusVersion::V1_1, FocusVersion::V1_2];

    /// Version used when the caller does not pick one.
    pub const DEFAULT: FocusVersion = FocusVersion::V1_2;

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusVersion::V1_0 => "1.0",
            FocusVersion::V1_1 => "1.1",
            FocusVersion::V1_2 => "1.2",
        }
    }

    fn slot(&self) -> usize {
        match self {
            FocusVersion::V1_0 => 0,
            FocusVersion::V1_1 => 1,
            FocusVersion::V1_2 => 2,
        }
    }

    /// The JSON document of the catalog shipped for this version.
    pub fn builtin_document(&self) -> &'static str {
        match self {
            FocusVersion::V1_0 => include_str!("../../catalogs/focus-1.0.json"),
            FocusVersion::V1_1 => include_str!("../../catalogs/focus-1.1.json"),
            FocusVersion::V1_2 => include_str!("../../catalogs/focus-1.2.json"),
        }
    }
}

impl Default for FocusVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for FocusVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FocusVersion {
    type Err = FocusError;

    fn from_str(s: &str) -> Result<Self> {
        FocusVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| FocusError::UnsupportedVersion {
                version: s.to_string(),
                supported: FocusVersion::ALL
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect(),
            })
    }
}

/// Supported versions and the default, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedVersions {
    pub versions: Vec<String>,
    pub default: String,
}

pub fn supported_versions() -> SupportedVersions {
    SupportedVersions {
        versions: FocusVersion::ALL
            .iter()
            .map(|v| v.as_str().to_string())
            .collect(),
        default: FocusVersion::DEFAULT.as_str().to_string(),
    }
}

static GLOBAL_REGISTRY: Lazy<CatalogRegistry> = Lazy::new(CatalogRegistry::new);

/// Loads each built-in catalog at most once and shares it read-only.
#[derive(Debug, Default)]
pub struct CatalogRegistry {
    slots: [OnceCell<Arc<RuleCatalog>>; 3],
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static CatalogRegistry {
        &GLOBAL_REGISTRY
    }

    /// Returns the catalog for `version`, loading it on first use.
    pub fn get(&self, version: FocusVersion) -> Result<Arc<RuleCatalog>> {
        self.slots[version.slot()]
            .get_or_try_init(|| {
                debug!(version = %version, "Loading built-in catalog");
                RuleCatalog::from_json_str(version.builtin_document())
                    .map(Arc::new)
                    .with_context(|| format!("Loading built-in FOCUS {version} catalog"))
            })
            .cloned()
    }

    /// Resolves a version selector string; unknown versions are rejected.
    pub fn resolve(&self, version: &str) -> Result<Arc<RuleCatalog>> {
        self.get(version.parse()?)
    }

    /// Catalog for [`FocusVersion::DEFAULT`].
    pub fn default_catalog(&self) -> Result<Arc<RuleCatalog>> {
        self.get(FocusVersion::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!("1.0".parse::<FocusVersion>().unwrap(), FocusVersion::V1_0);
        assert_eq!(" 1.2 ".parse::<FocusVersion>().unwrap(), FocusVersion::V1_2);
        assert_eq!(FocusVersion::default(), FocusVersion::V1_2);
    }

    #[test]
    fn test_unknown_version_is_fatal() {
        let err = "2.0".parse::<FocusVersion>().unwrap_err();
        match err {
            FocusError::UnsupportedVersion { version, supported } => {
                assert_eq!(version, "2.0");
                assert_eq!(supported, vec!["1.0", "1.1", "1.2"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(CatalogRegistry::new().resolve("1.3").is_err());
    }

    #[test]
    fn test_supported_versions() {
        let supported = supported_versions();
        assert_eq!(supported.versions, vec!["1.0", "1.1", "1.2"]);
        assert_eq!(supported.default, "1.2");
    }

    #[test]
    fn test_builtin_catalogs_load() {
        let registry = CatalogRegistry::new();
        for version in FocusVersion::ALL {
            let catalog = registry.get(version).unwrap();
            assert_eq!(catalog.version(), version.as_str());
            assert!(!catalog.is_empty());
        }
    }

    #[test]
    fn test_catalogs_are_cached() {
        let registry = CatalogRegistry::new();
        let a = registry.get(FocusVersion::V1_1).unwrap();
        let b = registry.resolve("1.1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_versions_grow() {
        let registry = CatalogRegistry::global();
        let v10 = registry.get(FocusVersion::V1_0).unwrap();
        let v12 = registry.get(FocusVersion::V1_2).unwrap();
        assert!(v12.len() > v10.len());
        assert!(v12.columns().len() > v10.columns().len());
    }
}

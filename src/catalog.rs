//! Package catalog: the set of package names a request may name.

use std::collections::BTreeMap;

use crate::config::{Config, PackageMeta};
use crate::error::Result;

/// Source of the package list.
///
/// The parser asks once, at construction, and shares the result read-only.
pub trait PackageCatalog {
    fn package_list(&self) -> Result<BTreeMap<String, PackageMeta>>;
}

/// Catalog backed by the `[packages]` section of the configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredCatalog {
    packages: BTreeMap<String, PackageMeta>,
}

impl ConfiguredCatalog {
    pub fn new(packages: BTreeMap<String, PackageMeta>) -> Self {
        Self { packages }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.packages.clone())
    }
}

impl PackageCatalog for ConfiguredCatalog {
    fn package_list(&self) -> Result<BTreeMap<String, PackageMeta>> {
        Ok(self.packages.clone())
    }
}

//! Validation of the requested reply locale against the supported set.

use std::collections::BTreeSet;

use crate::config::LocaleConfig;
use crate::error::{GettorError, Result};

/// Outcome of resolving a requested locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Locale to reply in. Always supported.
    pub locale: String,
    /// The requested locale, when it was not supported.
    pub unsupported: Option<String>,
}

/// Maps any requested locale to a supported one.
#[derive(Debug, Clone)]
pub struct LocaleResolver {
    default: String,
    supported: BTreeSet<String>,
}

impl LocaleResolver {
    /// Build from configuration. The default must itself be supported.
    pub fn new(config: &LocaleConfig) -> Result<Self> {
        let supported: BTreeSet<String> = config.supported.keys().cloned().collect();
        if !supported.contains(&config.default) {
            return Err(GettorError::UnknownDefaultLocale(config.default.clone()));
        }
        Ok(Self {
            default: config.default.clone(),
            supported,
        })
    }

    pub fn default_locale(&self) -> &str {
        &self.default
    }

    /// Exact, case-sensitive membership.
    pub fn is_supported(&self, locale: &str) -> bool {
        self.supported.contains(locale)
    }

    pub fn resolve(&self, requested: &str) -> Resolution {
        if self.is_supported(requested) {
            Resolution {
                locale: requested.to_string(),
                unsupported: None,
            }
        } else {
            Resolution {
                locale: self.default.clone(),
                unsupported: Some(requested.to_string()),
            }
        }
    }
}

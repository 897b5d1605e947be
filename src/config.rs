//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$GETTOR_CONFIG` (environment variable)
//! 2. `~/.config/gettor/config.toml` (Linux/macOS)
//!    `%APPDATA%\gettor\config.toml` (Windows)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GettorError, Result};

/// Top-level configuration.
///
/// Missing sections take their defaults, so a file without `[packages]`
/// keeps the classic bundle catalog. An explicitly empty `[packages]` table
/// is kept empty and refused when the parser is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Reply locales.
    pub locales: LocaleConfig,
    /// Package catalog, keyed by package name.
    pub packages: BTreeMap<String, PackageMeta>,
    /// Authenticated `Command:` settings.
    pub command: CommandConfig,
    /// Signature verification.
    pub signature: SignatureConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Supported reply locales.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Locale used when none (or an unsupported one) is requested.
    pub default: String,
    /// Locale code → display name.
    pub supported: BTreeMap<String, String>,
}

/// Metadata for one distributable package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageMeta {
    /// File name pattern of the package in the distribution directory.
    pub file: String,
    /// Short human-readable description.
    pub description: String,
}

/// Password settings for `Command:` lines.
///
/// With neither field set, every command is unauthorized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Hex SHA-256 of the command password.
    pub password_hash: Option<String>,
    /// File containing the hex SHA-256 of the command password.
    pub password_file: Option<PathBuf>,
}

/// Which signature checker to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureMode {
    /// Every message is unverified.
    #[default]
    None,
    /// Trust `dkim=pass` in an `Authentication-Results` header from our MTA.
    AuthenticationResults,
}

/// Signature verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    pub mode: SignatureMode,
    /// authserv-id of the MTA whose `Authentication-Results` are trusted.
    pub trusted_authserv_id: Option<String>,
    /// Upper bound for a single verification, in milliseconds.
    pub timeout_ms: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        let supported = [
            ("en", "English"),
            ("fa", "Farsi"),
            ("de", "Deutsch"),
            ("ar", "Arabic"),
            ("es", "Spanish"),
            ("fr", "French"),
            ("it", "Italian"),
            ("nl", "Dutch"),
            ("pl", "Polish"),
            ("ru", "Russian"),
            ("zh-CN", "Chinese"),
        ]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect();

        Self {
            default: "en".to_string(),
            supported,
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            mode: SignatureMode::None,
            trusted_authserv_id: None,
            timeout_ms: 5000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            locales: LocaleConfig::default(),
            packages: default_packages(),
            command: CommandConfig::default(),
            signature: SignatureConfig::default(),
        }
    }
}

/// The bundles gettor has traditionally shipped.
pub fn default_packages() -> BTreeMap<String, PackageMeta> {
    [
        ("windows-bundle", "vidalia-bundle-.*.exe$", "Tor, Vidalia and Polipo for Windows"),
        ("panther-bundle", "vidalia-bundle-.*-panther.dmg$", "Bundle for Mac OS X 10.3"),
        ("tiger-bundle", "vidalia-bundle-.*-tiger.dmg$", "Bundle for Mac OS X 10.4 and later"),
        ("source-bundle", "tor-.*.tar.gz$", "Tor source code"),
        ("tor-browser-bundle", "tor-browser-.*_en-US.exe$", "Portable Tor Browser for Windows"),
        ("tor-im-browser-bundle", "tor-im-browser-.*_en-US.exe$", "Tor Browser with instant messaging"),
    ]
    .into_iter()
    .map(|(name, file, description)| {
        (
            name.to_string(),
            PackageMeta {
                file: file.to_string(),
                description: description.to_string(),
            },
        )
    })
    .collect()
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// A missing file yields the built-in defaults; a present but unreadable or
/// invalid file is an error, since the catalog and password come from it.
pub fn load_config() -> Result<Config> {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(Config::default()),
    }
}

/// Load configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| GettorError::io(path, e))?;
    let cfg = toml::from_str::<Config>(&contents).map_err(|e| GettorError::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), packages = cfg.packages.len(), "Loaded config");
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("GETTOR_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("gettor").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gettor")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.locales.default, "en");
        assert_eq!(cfg.locales.supported.len(), 11);
        assert!(cfg.locales.supported.contains_key("zh-CN"));
        assert!(cfg.packages.contains_key("windows-bundle"));
        assert_eq!(cfg.signature.mode, SignatureMode::None);
        assert_eq!(cfg.signature.timeout_ms, 5000);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_file_without_packages_keeps_default_catalog() {
        let cfg: Config =
            toml::from_str("[command]\npassword_hash = \"abc\"\n").expect("parse command-only");
        assert_eq!(cfg.command.password_hash.as_deref(), Some("abc"));
        assert_eq!(cfg.packages, default_packages());
    }

    #[test]
    fn test_explicit_empty_packages_stay_empty() {
        let cfg: Config = toml::from_str("[packages]\n").expect("parse empty packages");
        assert!(cfg.packages.is_empty());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[locales]
default = "de"

[packages.source-bundle]
file = "tor-.*.tar.gz$"

[signature]
mode = "authentication-results"
trusted_authserv_id = "mx.example.org"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.locales.default, "de");
        assert_eq!(cfg.locales.supported.len(), 11);
        assert_eq!(cfg.packages.len(), 1);
        assert_eq!(cfg.packages["source-bundle"].description, "");
        assert_eq!(cfg.signature.mode, SignatureMode::AuthenticationResults);
        assert_eq!(cfg.signature.timeout_ms, 5000);
        assert!(cfg.command.password_hash.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[command]\npassword_hash = \"abc\"\n[packages.windows-bundle]\nfile = \"x\"\n",
        )
        .unwrap();
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.command.password_hash.as_deref(), Some("abc"));
        assert!(cfg.packages.contains_key("windows-bundle"));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[locales\ndefault = ").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, GettorError::ConfigParse { .. }));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config_from(Path::new("/nonexistent/gettor.toml")).unwrap_err();
        assert!(matches!(err, GettorError::Io { .. }));
    }
}

//! Password verification for authenticated `Command:` lines.
//!
//! The configuration stores only the hex SHA-256 of the password, either
//! inline or in a separate file.

use sha2::{Digest, Sha256};

use crate::config::CommandConfig;
use crate::error::{GettorError, Result};

/// Decides whether a command token is the configured password.
pub trait PasswordVerifier {
    fn verify_password(&self, config: &CommandConfig, token: &str) -> bool;
}

/// Compares the SHA-256 of the token with the configured hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256PasswordVerifier;

impl PasswordVerifier for Sha256PasswordVerifier {
    fn verify_password(&self, config: &CommandConfig, token: &str) -> bool {
        let expected = match stored_hash(config) {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                tracing::debug!("No command password configured");
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load command password hash");
                return false;
            }
        };
        constant_time_eq(hash_password(token).as_bytes(), expected.as_bytes())
    }
}

/// Hex SHA-256 digest of a password, as stored in `[command]`.
pub fn hash_password(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Load the configured hash, normalized to lowercase hex.
///
/// An inline `password_hash` takes precedence over `password_file`.
pub fn stored_hash(config: &CommandConfig) -> Result<Option<String>> {
    let raw = if let Some(ref hash) = config.password_hash {
        hash.clone()
    } else if let Some(ref path) = config.password_file {
        std::fs::read_to_string(path).map_err(|e| GettorError::io(path, e))?
    } else {
        return Ok(None);
    };

    let hash = raw.trim().to_ascii_lowercase();
    if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(GettorError::InvalidPasswordHash(format!(
            "expected 64 hex characters, got {}",
            hash.len()
        )));
    }
    Ok(Some(hash))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("secret")
    const SECRET_HASH: &str = "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b";

    fn config_with_hash(hash: &str) -> CommandConfig {
        CommandConfig {
            password_hash: Some(hash.to_string()),
            password_file: None,
        }
    }

    #[test]
    fn test_hash_password() {
        assert_eq!(hash_password("secret"), SECRET_HASH);
    }

    #[test]
    fn test_verify_correct_password() {
        let cfg = config_with_hash(SECRET_HASH);
        assert!(Sha256PasswordVerifier.verify_password(&cfg, "secret"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let cfg = config_with_hash(SECRET_HASH);
        assert!(!Sha256PasswordVerifier.verify_password(&cfg, "Secret"));
        assert!(!Sha256PasswordVerifier.verify_password(&cfg, ""));
    }

    #[test]
    fn test_uppercase_hash_accepted() {
        let cfg = config_with_hash(&SECRET_HASH.to_uppercase());
        assert!(Sha256PasswordVerifier.verify_password(&cfg, "secret"));
    }

    #[test]
    fn test_unconfigured_rejects_everything() {
        let cfg = CommandConfig::default();
        assert!(!Sha256PasswordVerifier.verify_password(&cfg, "secret"));
    }

    #[test]
    fn test_malformed_hash_rejects() {
        let cfg = config_with_hash("not-a-hash");
        assert!(matches!(
            stored_hash(&cfg),
            Err(GettorError::InvalidPasswordHash(_))
        ));
        assert!(!Sha256PasswordVerifier.verify_password(&cfg, "secret"));
    }

    #[test]
    fn test_password_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmdpass");
        std::fs::write(&path, format!("{SECRET_HASH}\n")).unwrap();
        let cfg = CommandConfig {
            password_hash: None,
            password_file: Some(path),
        };
        assert!(Sha256PasswordVerifier.verify_password(&cfg, "secret"));
    }
}

//! Message signature checking.
//!
//! Verification is informational: every failure, including a verifier that
//! panics or runs past its deadline, means "not verified".

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{SignatureConfig, SignatureMode};
use crate::error::SignatureError;
use crate::parser::header::{self, Headers};

/// Reports whether a signature over the raw message validates.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, raw: &[u8]) -> Result<bool, SignatureError>;
}

/// Treats every message as unsigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsigned;

impl SignatureVerifier for Unsigned {
    fn verify(&self, _raw: &[u8]) -> Result<bool, SignatureError> {
        Ok(false)
    }
}

/// Trusts the DKIM verdict our own MTA recorded in `Authentication-Results`.
///
/// Only headers whose authserv-id equals the trusted id count; anything a
/// sender wrote with another id is ignored.
#[derive(Debug, Clone)]
pub struct AuthenticationResultsVerifier {
    authserv_id: String,
}

impl AuthenticationResultsVerifier {
    pub fn new(authserv_id: impl Into<String>) -> Self {
        Self {
            authserv_id: authserv_id.into(),
        }
    }
}

impl SignatureVerifier for AuthenticationResultsVerifier {
    fn verify(&self, raw: &[u8]) -> Result<bool, SignatureError> {
        let (header_end, _) = header::split_header_block(raw)
            .ok_or_else(|| SignatureError::Malformed("no end of headers".to_string()))?;
        let headers = Headers::parse(&header::decode_text(&raw[..header_end]));

        let passed = headers
            .get_all("authentication-results")
            .filter_map(|value| value.split_once(';'))
            .filter(|(id, _)| {
                // authserv-id may be followed by a version number
                id.split_whitespace()
                    .next()
                    .is_some_and(|id| id.eq_ignore_ascii_case(&self.authserv_id))
            })
            .any(|(_, results)| dkim_passed(results));
        Ok(passed)
    }
}

fn dkim_passed(results: &str) -> bool {
    results.split(';').any(|resinfo| {
        resinfo
            .split_whitespace()
            .next()
            .and_then(|method| method.split_once('='))
            .is_some_and(|(method, result)| {
                method.eq_ignore_ascii_case("dkim") && result.eq_ignore_ascii_case("pass")
            })
    })
}

/// Runs another verifier on a worker thread with a deadline.
///
/// Meant for verifiers that can block, such as ones doing DNS key lookups.
/// A worker that misses the deadline is detached, not killed: it keeps
/// running until the inner verifier returns and its result is dropped, so a
/// verifier that hangs forever costs one thread per message.
pub struct BoundedVerifier {
    inner: Arc<dyn SignatureVerifier>,
    timeout: Duration,
}

impl BoundedVerifier {
    pub fn new(inner: Arc<dyn SignatureVerifier>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl SignatureVerifier for BoundedVerifier {
    fn verify(&self, raw: &[u8]) -> Result<bool, SignatureError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let raw = raw.to_vec();

        std::thread::Builder::new()
            .name("gettor-verify".to_string())
            .spawn(move || {
                // The receiver is gone once the deadline passed.
                let _ = tx.send(inner.verify(&raw));
            })
            .map_err(|e| SignatureError::Lookup(format!("cannot spawn verifier: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SignatureError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(SignatureError::Lookup(
                "verifier exited without a result".to_string(),
            )),
        }
    }
}

/// Build the verifier selected by `[signature]`.
///
/// Both built-in verifiers only read headers already in memory, so neither
/// is put behind a deadline; see [`bounded`] for verifiers that can block.
pub fn from_config(config: &SignatureConfig) -> Arc<dyn SignatureVerifier> {
    match (config.mode, &config.trusted_authserv_id) {
        (SignatureMode::None, _) => Arc::new(Unsigned),
        (SignatureMode::AuthenticationResults, Some(id)) if !id.trim().is_empty() => {
            Arc::new(AuthenticationResultsVerifier::new(id.trim()))
        }
        (SignatureMode::AuthenticationResults, _) => {
            tracing::warn!(
                "Signature mode 'authentication-results' needs trusted_authserv_id; \
                 treating all messages as unsigned"
            );
            Arc::new(Unsigned)
        }
    }
}

/// Wrap a blocking verifier in the `[signature]` deadline.
pub fn bounded(
    config: &SignatureConfig,
    verifier: Arc<dyn SignatureVerifier>,
) -> Arc<dyn SignatureVerifier> {
    Arc::new(BoundedVerifier::new(
        verifier,
        Duration::from_millis(config.timeout_ms),
    ))
}

/// Call a verifier, turning a panic into an error.
pub fn guarded_verify(verifier: &dyn SignatureVerifier, raw: &[u8]) -> Result<bool, SignatureError> {
    catch_unwind(AssertUnwindSafe(|| verifier.verify(raw)))
        .unwrap_or_else(|_| Err(SignatureError::Lookup("verifier panicked".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow(Duration);

    impl SignatureVerifier for Slow {
        fn verify(&self, _raw: &[u8]) -> Result<bool, SignatureError> {
            std::thread::sleep(self.0);
            Ok(true)
        }
    }

    struct Panicking;

    impl SignatureVerifier for Panicking {
        fn verify(&self, _raw: &[u8]) -> Result<bool, SignatureError> {
            panic!("broken verifier")
        }
    }

    const SIGNED: &[u8] = b"Authentication-Results: mx.example.org;\n\
        \tdkim=pass header.d=example.com; spf=pass\n\
        From: user@example.com\n\
        \n\
        body\n";

    #[test]
    fn test_unsigned() {
        assert_eq!(Unsigned.verify(SIGNED), Ok(false));
    }

    #[test]
    fn test_trusted_dkim_pass() {
        let v = AuthenticationResultsVerifier::new("mx.example.org");
        assert_eq!(v.verify(SIGNED), Ok(true));
    }

    #[test]
    fn test_untrusted_authserv_id_ignored() {
        let v = AuthenticationResultsVerifier::new("mx.other.net");
        assert_eq!(v.verify(SIGNED), Ok(false));
    }

    #[test]
    fn test_dkim_fail() {
        let raw = b"Authentication-Results: mx.example.org 1; dkim=fail; spf=pass\n\nbody\n";
        let v = AuthenticationResultsVerifier::new("mx.example.org");
        assert_eq!(v.verify(raw), Ok(false));
    }

    #[test]
    fn test_headers_without_end_are_malformed() {
        let v = AuthenticationResultsVerifier::new("mx.example.org");
        assert!(matches!(
            v.verify(b"garbage without blank line"),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn test_bounded_passes_result_through() {
        let v = BoundedVerifier::new(
            Arc::new(AuthenticationResultsVerifier::new("mx.example.org")),
            Duration::from_secs(5),
        );
        assert_eq!(v.verify(SIGNED), Ok(true));
    }

    #[test]
    fn test_bounded_times_out() {
        let v = BoundedVerifier::new(
            Arc::new(Slow(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        assert_eq!(
            v.verify(SIGNED),
            Err(SignatureError::Timeout(Duration::from_millis(20)))
        );
    }

    #[test]
    fn test_bounded_reports_panicking_inner() {
        let v = BoundedVerifier::new(Arc::new(Panicking), Duration::from_secs(5));
        assert!(matches!(v.verify(SIGNED), Err(SignatureError::Lookup(_))));
    }

    #[test]
    fn test_guarded_verify_catches_panic() {
        assert!(matches!(
            guarded_verify(&Panicking, SIGNED),
            Err(SignatureError::Lookup(_))
        ));
    }

    #[test]
    fn test_bounded_uses_configured_timeout() {
        let cfg = SignatureConfig {
            timeout_ms: 20,
            ..SignatureConfig::default()
        };
        let v = bounded(&cfg, Arc::new(Slow(Duration::from_millis(500))));
        assert_eq!(
            v.verify(SIGNED),
            Err(SignatureError::Timeout(Duration::from_millis(20)))
        );
    }

    #[test]
    fn test_from_config_without_id_is_unsigned() {
        let cfg = SignatureConfig {
            mode: SignatureMode::AuthenticationResults,
            trusted_authserv_id: None,
            timeout_ms: 100,
        };
        assert_eq!(from_config(&cfg).verify(SIGNED), Ok(false));
    }

    #[test]
    fn test_from_config_authentication_results() {
        let cfg = SignatureConfig {
            mode: SignatureMode::AuthenticationResults,
            trusted_authserv_id: Some("mx.example.org".to_string()),
            timeout_ms: 5000,
        };
        assert_eq!(from_config(&cfg).verify(SIGNED), Ok(true));
    }
}

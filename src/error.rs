//! Centralized error types for gettor.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::request::PartialRequest;

/// All errors produced by the gettor library.
#[derive(Error, Debug)]
pub enum GettorError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file exists but could not be parsed.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// The package catalog returned no packages.
    #[error("Package catalog is empty")]
    EmptyCatalog,

    /// The configured default locale is not in the supported set.
    #[error("Default locale '{0}' is not a supported locale")]
    UnknownDefaultLocale(String),

    /// The stored command password hash is not a hex SHA-256 digest.
    #[error("Invalid command password hash: {0}")]
    InvalidPasswordHash(String),
}

/// Convenience alias for `Result<T, GettorError>`.
pub type Result<T> = std::result::Result<T, GettorError>;

impl GettorError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a message was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// No usable `From:` header, so there is nobody to reply to.
    #[error("message has no From address")]
    MissingFrom,

    /// The `To:` address carries a `+` tag that cannot be split out.
    #[error("malformed plus-addressed recipient '{to}'")]
    MalformedPlusAddress { to: String },

    /// A `Command:` line without exactly three tokens.
    #[error("wrong command syntax: expected 3 tokens, found {token_count}")]
    MalformedCommand { token_count: usize },

    /// A `Command:` line whose password did not verify.
    #[error("unauthorized attempt to command from: {from}")]
    UnauthorizedCommand { from: String },
}

/// A fatal parse failure plus whatever had been extracted before it.
#[derive(Error, Debug, Clone)]
#[error("{reason}")]
pub struct Rejection {
    pub reason: RejectReason,
    pub partial: PartialRequest,
}

impl Rejection {
    pub fn new(reason: RejectReason, partial: PartialRequest) -> Self {
        Self { reason, partial }
    }

    /// Sender address, if it was extracted before the rejection.
    ///
    /// `None` means no reply is possible.
    pub fn reply_to(&self) -> Option<&str> {
        self.partial.reply_to.as_deref()
    }
}

/// Failure inside a signature verifier. Never leaves the parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The message could not be inspected.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Verification did not finish in time.
    #[error("signature verification timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Key lookup or any other backend failure.
    #[error("signature lookup failed: {0}")]
    Lookup(String),
}

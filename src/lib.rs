//! `gettor`: parser for email requests to a software package mirror.
//!
//! A request mail names a package, optionally a reply language (through a
//! `+tag` on the recipient address or a `lang:` line) and split delivery, and
//! may carry a password-authenticated `Command:` that forwards a package to
//! another address. [`RequestParser`] turns one raw message into a validated
//! [`ParsedRequest`] or a [`Rejection`].

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod observe;
pub mod parser;
pub mod signature;

pub use error::{GettorError, RejectReason, Rejection, Result};
pub use model::request::{ParsedRequest, PartialRequest};
pub use parser::RequestParser;

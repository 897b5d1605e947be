//! Core data model types: email addresses and the parsed request record.

pub mod address;
pub mod request;

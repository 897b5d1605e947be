//! Request parsing: message ingestion, header decoding, recipient tags,
//! body scanning and locale resolution.

pub mod body;
pub mod header;
pub mod locale;
pub mod message;
pub mod recipient;
pub mod request;

pub use message::RawMessage;
pub use request::RequestParser;

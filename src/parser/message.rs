//! Ingestion of a raw request message into headers and body lines.

use mail_parser::{MessageParser, PartType};

use crate::parser::header::{self, Headers};

/// One fully buffered incoming message.
///
/// Produced once by [`RawMessage::ingest`] and never modified.
#[derive(Debug, Clone)]
pub struct RawMessage {
    raw: Vec<u8>,
    headers: Headers,
    body: Vec<String>,
}

impl RawMessage {
    /// Split a raw message into its header mapping and body lines.
    ///
    /// Headers end at the first blank line; without one, the whole input is
    /// headers and the body is empty. A `multipart/*` body, or one with a
    /// base64 or quoted-printable transfer encoding, is decoded into the lines
    /// of its text parts. Any other body is taken verbatim.
    pub fn ingest(raw: impl Into<Vec<u8>>) -> Self {
        let raw = raw.into();
        let (header_end, body_start) =
            header::split_header_block(&raw).unwrap_or((raw.len(), raw.len()));

        let headers = Headers::parse(&header::decode_text(&raw[..header_end]));
        let body = if needs_mime_decoding(&headers) {
            mime_body_lines(&raw).unwrap_or_else(|| plain_body_lines(&raw[body_start..]))
        } else {
            plain_body_lines(&raw[body_start..])
        };

        Self { raw, headers, body }
    }

    /// The message exactly as received.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of a header, with encoded-words resolved.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).map(header::decode_encoded_words)
    }

    /// Body lines in message order, without line terminators.
    pub fn body_lines(&self) -> impl Iterator<Item = &str> {
        self.body.iter().map(String::as_str)
    }
}

fn needs_mime_decoding(headers: &Headers) -> bool {
    let multipart = headers
        .get("content-type")
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/"));
    let encoded = headers.get("content-transfer-encoding").is_some_and(|cte| {
        matches!(
            cte.trim().to_ascii_lowercase().as_str(),
            "base64" | "quoted-printable"
        )
    });
    multipart || encoded
}

fn plain_body_lines(body: &[u8]) -> Vec<String> {
    header::decode_text(body)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Lines of every text and HTML part, in part order.
///
/// Returns `None` when `mail-parser` cannot make sense of the message.
fn mime_body_lines(raw: &[u8]) -> Option<Vec<String>> {
    let message = MessageParser::default().parse(raw)?;
    let lines = message
        .parts
        .iter()
        .filter_map(|part| match &part.body {
            PartType::Text(text) | PartType::Html(text) => Some(text),
            _ => None,
        })
        .flat_map(|text| text.lines().map(str::to_string).collect::<Vec<_>>())
        .collect();
    Some(lines)
}

//! Plus-addressed recipients: `gettor+fa@example.org` asks for Farsi.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::RejectReason;
use crate::model::address::EmailAddress;

// ASCII word characters only: `gettor+é@...` is not a tagged request.
static PLUS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+(?-u:\w)+").expect("valid plus-tag regex"));

/// Locale tag carried by the recipient address, if any.
///
/// A `+word` anywhere in the address marks a tagged request. The tag is the
/// second `+`-separated piece of the local part; an address where that piece
/// does not exist (the `+` sits in the domain) is rejected.
pub fn locale_tag(recipient: &EmailAddress) -> Result<Option<String>, RejectReason> {
    if !PLUS_TAG.is_match(&recipient.address) {
        return Ok(None);
    }

    match recipient.local_part().split('+').nth(1) {
        Some(tag) => Ok(Some(tag.to_string())),
        None => Err(RejectReason::MalformedPlusAddress {
            to: recipient.address.clone(),
        }),
    }
}

//! The parsed request record handed to the reply dispatcher.

/// A fully parsed and validated package request.
///
/// Built once per incoming message and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParsedRequest {
    /// Bare address taken from the `From:` header. Never empty.
    pub reply_to: String,

    /// Locale for the reply. Always a member of the supported-locale set.
    pub reply_locale: String,

    /// First catalog package named in the body, in body order.
    pub requested_package: Option<String>,

    /// `true` if any unquoted body line contains `split`.
    pub split_delivery: bool,

    /// Result of signature verification. Failures of any kind are `false`.
    pub signature_verified: bool,

    /// Forwarding target of an authorized `Command:` line.
    pub command_target_address: Option<String>,

    /// `true` if the locale came from a `+tag` in the `To:` address.
    pub explicit_locale_requested: bool,

    /// Locale that was requested but is not supported, if the resolver fell back.
    pub unsupported_locale: Option<String>,
}

/// Snapshot of what had been extracted when a parse was rejected.
///
/// Lets the caller send an error reply when `reply_to` was already known.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PartialRequest {
    pub reply_to: Option<String>,
    pub to_address: Option<String>,
    pub reply_locale: Option<String>,
    pub requested_package: Option<String>,
    pub split_delivery: bool,
    pub signature_verified: bool,
    pub explicit_locale_requested: bool,
}

impl ParsedRequest {
    /// `true` if this request forwards a package to a third party.
    pub fn is_command(&self) -> bool {
        self.command_target_address.is_some()
    }

    /// Address the package should be delivered to.
    ///
    /// An authorized command redirects delivery; otherwise the sender gets it.
    pub fn delivery_address(&self) -> &str {
        self.command_target_address
            .as_deref()
            .unwrap_or(&self.reply_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ParsedRequest {
        ParsedRequest {
            reply_to: "user@example.com".to_string(),
            reply_locale: "en".to_string(),
            requested_package: Some("windows-bundle".to_string()),
            split_delivery: false,
            signature_verified: true,
            command_target_address: None,
            explicit_locale_requested: false,
            unsupported_locale: None,
        }
    }

    #[test]
    fn test_delivery_address_defaults_to_sender() {
        let req = request();
        assert!(!req.is_command());
        assert_eq!(req.delivery_address(), "user@example.com");
    }

    #[test]
    fn test_delivery_address_follows_command() {
        let mut req = request();
        req.command_target_address = Some("friend@example.org".to_string());
        assert!(req.is_command());
        assert_eq!(req.delivery_address(), "friend@example.org");
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(request()).expect("serialize");
        assert_eq!(json["reply_to"], "user@example.com");
        assert_eq!(json["requested_package"], "windows-bundle");
        assert!(json["command_target_address"].is_null());
    }
}

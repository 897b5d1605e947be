//! Turns one incoming message into a validated [`ParsedRequest`].

use std::sync::Arc;

use crate::auth::{PasswordVerifier, Sha256PasswordVerifier};
use crate::catalog::{ConfiguredCatalog, PackageCatalog};
use crate::config::{CommandConfig, Config, SignatureConfig};
use crate::error::{GettorError, RejectReason, Rejection, Result};
use crate::model::address::EmailAddress;
use crate::model::request::{ParsedRequest, PartialRequest};
use crate::observe::{LocaleSource, RequestEvent, RequestObserver, TracingObserver};
use crate::parser::body::{BodyFindings, BodyScanner, CommandLine};
use crate::parser::locale::LocaleResolver;
use crate::parser::message::RawMessage;
use crate::parser::recipient;
use crate::signature::{self, SignatureVerifier};

/// Parser for gettor request mail.
///
/// Holds only read-only state, so one instance can parse any number of
/// messages, from any number of threads.
pub struct RequestParser {
    packages: Vec<String>,
    locales: LocaleResolver,
    command: CommandConfig,
    signature: SignatureConfig,
    passwords: Arc<dyn PasswordVerifier + Send + Sync>,
    signatures: Arc<dyn SignatureVerifier>,
    observer: Arc<dyn RequestObserver>,
}

impl std::fmt::Debug for RequestParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestParser")
            .field("packages", &self.packages)
            .field("locales", &self.locales)
            .field(
                "commands_enabled",
                &(self.command.password_hash.is_some() || self.command.password_file.is_some()),
            )
            .finish_non_exhaustive()
    }
}

impl RequestParser {
    /// Build a parser from configuration and a package catalog.
    ///
    /// Uses SHA-256 password checking, the signature verifier selected in
    /// `[signature]` and `tracing` for events; each can be replaced with the
    /// `with_*` methods.
    ///
    /// # Errors
    /// [`GettorError::EmptyCatalog`] if the catalog has no packages, and
    /// [`GettorError::UnknownDefaultLocale`] if the default locale is not
    /// supported.
    pub fn new(config: &Config, catalog: &dyn PackageCatalog) -> Result<Self> {
        let packages: Vec<String> = catalog.package_list()?.into_keys().collect();
        if packages.is_empty() {
            return Err(GettorError::EmptyCatalog);
        }

        Ok(Self {
            packages,
            locales: LocaleResolver::new(&config.locales)?,
            command: config.command.clone(),
            signature: config.signature.clone(),
            passwords: Arc::new(Sha256PasswordVerifier),
            signatures: signature::from_config(&config.signature),
            observer: Arc::new(TracingObserver),
        })
    }

    /// Build a parser whose catalog is the `[packages]` section.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config, &ConfiguredCatalog::from_config(config))
    }

    pub fn with_password_verifier(
        mut self,
        verifier: impl PasswordVerifier + Send + Sync + 'static,
    ) -> Self {
        self.passwords = Arc::new(verifier);
        self
    }

    pub fn with_signature_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.signatures = verifier;
        self
    }

    /// Use a verifier that may block, such as one fetching DKIM keys,
    /// bounded by `[signature] timeout_ms`.
    pub fn with_blocking_signature_verifier(
        mut self,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        self.signatures = signature::bounded(&self.signature, verifier);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Package names, in the order lines are matched against them.
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Ingest and parse raw message bytes.
    pub fn parse(&self, raw: &[u8]) -> std::result::Result<ParsedRequest, Rejection> {
        self.parse_message(&RawMessage::ingest(raw))
    }

    /// Parse an already ingested message.
    ///
    /// # Errors
    /// A [`Rejection`] when the message has no sender, a malformed
    /// plus-address, or a malformed or unauthorized command. Its `partial`
    /// snapshot keeps the sender address once it was known.
    pub fn parse_message(
        &self,
        message: &RawMessage,
    ) -> std::result::Result<ParsedRequest, Rejection> {
        let mut partial = PartialRequest {
            signature_verified: self.check_signature(message),
            ..PartialRequest::default()
        };

        let reply_to = match message
            .header("from")
            .and_then(|from| EmailAddress::parse_list(&from).into_iter().next())
        {
            Some(from) => from.address,
            None => return Err(self.reject(RejectReason::MissingFrom, partial)),
        };
        self.observer.observe(&RequestEvent::ReplyAddress {
            from: reply_to.clone(),
        });
        partial.reply_to = Some(reply_to.clone());

        let mut plus_locale = None;
        let recipient = message
            .header("to")
            .and_then(|to| EmailAddress::parse_list(&to).into_iter().next());
        if let Some(recipient) = recipient {
            self.observer.observe(&RequestEvent::Recipient {
                to: recipient.address.clone(),
            });
            partial.to_address = Some(recipient.address.clone());
            match recipient::locale_tag(&recipient) {
                Ok(Some(tag)) => {
                    self.observer.observe(&RequestEvent::LocaleRequested {
                        locale: tag.clone(),
                        source: LocaleSource::PlusAddress,
                    });
                    plus_locale = Some(tag);
                }
                Ok(None) => self.observer.observe(&RequestEvent::NoPlusAddress),
                Err(reason) => return Err(self.reject(reason, partial)),
            }
        }
        partial.explicit_locale_requested = plus_locale.is_some();
        partial.reply_locale = plus_locale.clone();

        let mut findings = BodyFindings::default();
        let scanner = BodyScanner::new(
            &self.packages,
            plus_locale.is_none(),
            &reply_to,
            self.observer.as_ref(),
        );
        let scanned = scanner.scan(
            message.body_lines(),
            |command| self.authorize(command, &reply_to),
            &mut findings,
        );
        if let Err(reason) = scanned {
            partial.requested_package = findings.package;
            partial.split_delivery = findings.split_delivery;
            if findings.locale.is_some() {
                partial.reply_locale = findings.locale;
            }
            return Err(self.reject(reason, partial));
        }

        if findings.package.is_none() {
            self.observer.observe(&RequestEvent::NoPackageRequested);
        }

        let explicit_locale_requested = plus_locale.is_some();
        let requested_locale = plus_locale
            .or(findings.locale)
            .unwrap_or_else(|| self.locales.default_locale().to_string());
        let resolution = self.locales.resolve(&requested_locale);
        if let Some(ref requested) = resolution.unsupported {
            self.observer.observe(&RequestEvent::UnsupportedLocale {
                requested: requested.clone(),
                fallback: resolution.locale.clone(),
            });
        }

        Ok(ParsedRequest {
            reply_to,
            reply_locale: resolution.locale,
            requested_package: findings.package,
            split_delivery: findings.split_delivery,
            signature_verified: partial.signature_verified,
            command_target_address: findings.command_target,
            explicit_locale_requested,
            unsupported_locale: resolution.unsupported,
        })
    }

    fn check_signature(&self, message: &RawMessage) -> bool {
        match signature::guarded_verify(self.signatures.as_ref(), message.raw()) {
            Ok(true) => true,
            Ok(false) => {
                self.observer.observe(&RequestEvent::SignatureUnverified {
                    reason: "no valid signature".to_string(),
                });
                false
            }
            Err(e) => {
                self.observer.observe(&RequestEvent::SignatureUnverified {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    fn authorize(
        &self,
        command: &CommandLine<'_>,
        sender: &str,
    ) -> std::result::Result<(), RejectReason> {
        if self
            .passwords
            .verify_password(&self.command, command.auth_token)
        {
            Ok(())
        } else {
            Err(RejectReason::UnauthorizedCommand {
                from: sender.to_string(),
            })
        }
    }

    fn reject(&self, reason: RejectReason, partial: PartialRequest) -> Rejection {
        self.observer.observe(&RequestEvent::Rejected {
            reason: reason.to_string(),
            reply_to: partial.reply_to.clone(),
        });
        Rejection::new(reason, partial)
    }
}

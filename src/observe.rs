//! Informational events emitted while a request is parsed.
//!
//! The parser never logs directly: it hands every event to the
//! [`RequestObserver`] it was built with. [`TracingObserver`] forwards them
//! to `tracing`.

use tracing::{debug, info, warn};

/// Where a requested locale came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocaleSource {
    PlusAddress,
    LangDirective,
}

/// Something worth recording about one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// The `To:` address the request was sent to.
    Recipient { to: String },
    /// The `To:` address carried no `+tag`.
    NoPlusAddress,
    /// The sender address that will receive the reply.
    ReplyAddress { from: String },
    LocaleRequested { locale: String, source: LocaleSource },
    PackageRequested { package: String },
    NoPackageRequested,
    SplitDelivery,
    CommandReceived { from: String },
    /// The requested locale is not supported and the default is used.
    UnsupportedLocale { requested: String, fallback: String },
    /// Signature verification failed or errored.
    SignatureUnverified { reason: String },
    /// The message was rejected as a request.
    Rejected {
        reason: String,
        reply_to: Option<String>,
    },
}

/// Receiver for [`RequestEvent`]s. Purely observational.
pub trait RequestObserver: Send + Sync {
    fn observe(&self, event: &RequestEvent);
}

/// Emits each event as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RequestObserver for TracingObserver {
    fn observe(&self, event: &RequestEvent) {
        match event {
            RequestEvent::Recipient { to } => info!(to = %to, "User made request"),
            RequestEvent::NoPlusAddress => debug!("Not a plus address"),
            RequestEvent::ReplyAddress { from } => info!(from = %from, "Reply address"),
            RequestEvent::LocaleRequested { locale, source } => {
                info!(locale = %locale, source = ?source, "User requested locale")
            }
            RequestEvent::PackageRequested { package } => {
                info!(package = %package, "User requested package")
            }
            RequestEvent::NoPackageRequested => info!("User didn't select any packages"),
            RequestEvent::SplitDelivery => info!("User requested a split delivery"),
            RequestEvent::CommandReceived { from } => info!(from = %from, "Command received"),
            RequestEvent::UnsupportedLocale {
                requested,
                fallback,
            } => info!(
                requested = %requested,
                fallback = %fallback,
                "Requested locale not supported, falling back"
            ),
            RequestEvent::SignatureUnverified { reason } => {
                debug!(reason = %reason, "Signature not verified")
            }
            RequestEvent::Rejected { reason, reply_to } => warn!(
                reason = %reason,
                reply_to = reply_to.as_deref().unwrap_or("<unknown>"),
                "Request rejected"
            ),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl RequestObserver for NullObserver {
    fn observe(&self, _event: &RequestEvent) {}
}

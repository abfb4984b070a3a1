//! Typed errors for verification and discovery.
//!
//! [`VerifyError`] classifies everything that can go wrong while talking to a
//! candidate server, and [`VerifyError::disposition`] tells the retry
//! controller what to do about it:
//! - Throttling replies - back off exponentially
//! - I/O, TLS and parse faults - retry after a short flat delay
//! - Everything else - stop immediately

use mailroute_smtp::{ClientError, Response};
use thiserror::Error;

/// How the retry controller should react to a [`VerifyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retry after an exponentially growing delay.
    Backoff,
    /// Retry after a flat delay.
    Retry,
    /// Do not retry.
    Terminal,
}

/// A failed verification attempt against one endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// The server lacks a required capability (STARTTLS on 587, or AUTH).
    #[error("Capability unsupported: {0}")]
    CapabilityUnsupported(String),

    /// The server refused the credential.
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// The server is throttling this client.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The server rejected a command for any other reason.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connecting or waiting for a reply took too long.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The endpoint host did not resolve to an address.
    #[error("Unresolvable host: {0}")]
    Unresolvable(String),

    /// An I/O, TLS or parse fault that may not recur.
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl VerifyError {
    #[must_use]
    pub const fn disposition(&self) -> Disposition {
        match self {
            Self::RateLimited(_) => Disposition::Backoff,
            Self::Transient(_) => Disposition::Retry,
            Self::CapabilityUnsupported(_)
            | Self::AuthenticationRejected(_)
            | Self::Protocol(_)
            | Self::Timeout(_)
            | Self::Unresolvable(_) => Disposition::Terminal,
        }
    }

    /// Returns `true` if another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self.disposition(), Disposition::Terminal)
    }

    /// Classifies a rejected reply received during `stage`.
    ///
    /// A 421, or any reply complaining of "too many" connections or messages,
    /// is throttling. Anything else is a protocol rejection.
    #[must_use]
    pub fn rejected(stage: &str, response: &Response) -> Self {
        let detail = format!("{stage}: {} {}", response.code, response.message());
        let throttled =
            response.code == 421 || response.message().to_ascii_lowercase().contains("too many");

        if throttled {
            Self::RateLimited(detail)
        } else {
            Self::Protocol(detail)
        }
    }

    /// Classifies a reply to AUTH that did not succeed.
    #[must_use]
    pub fn auth_failed(response: &Response) -> Self {
        if response.is_permanent_error() {
            Self::AuthenticationRejected(format!("{} {}", response.code, response.message()))
        } else {
            Self::rejected("AUTH", response)
        }
    }
}

impl From<ClientError> for VerifyError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Self::Timeout(e.to_string())
            }
            other => Self::Transient(other.to_string()),
        }
    }
}

/// Reasons the endpoint search for a domain stops before any candidate is tried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The domain publishes no sender policy (SPF) record.
    #[error("No sender policy record published for {0}")]
    PolicyMissing(String),

    /// The account address has no usable domain part.
    #[error("Invalid account address: {0}")]
    InvalidAddress(String),

    /// MX resolution produced no hosts.
    #[error("No mail exchangers found for {0}")]
    NoMailExchangers(String),
}

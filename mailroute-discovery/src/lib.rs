//! Submission endpoint discovery and account verification.
//!
//! Given a mail domain, [`Discovery`] checks that the domain publishes a
//! sender policy, resolves its MX hosts and derives, for each of them, the
//! host and port that accept authenticated submission. An account can then be
//! verified against those endpoints with bounded, backed-off retries.
//!
//! ```no_run
//! use mailroute_discovery::{Credential, Discovery, DiscoveryConfig};
//! use mailroute_smtp::TestMessage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let discovery = Discovery::from_config(DiscoveryConfig::default())?;
//! let credential = Credential::new("user@example.com", "secret");
//! let message = TestMessage::verification(credential.address(), credential.address());
//!
//! let verification = discovery
//!     .verify_account(discovery.checker(), &credential, &message)
//!     .await;
//! println!("{verification}");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
mod credential;
pub mod derive;
mod discovery;
pub mod dns;
mod endpoint;
mod error;
pub mod gate;
pub mod providers;
pub mod retry;
pub mod session;

#[cfg(test)]
mod test_support;

pub use cache::ResolutionCache;
pub use config::DiscoveryConfig;
pub use credential::Credential;
pub use discovery::{Discovery, FailureReason, Verification};
pub use dns::{DnsConfig, DnsError, HickoryLookup, Lookup, NameResolver};
pub use endpoint::{Endpoint, Port, normalize_host};
pub use error::{DiscoveryError, Disposition, VerifyError};
pub use gate::{GateConfig, GateReport};
pub use providers::ProviderTable;
pub use retry::{RetryController, RetryPolicy, RetryState, TerminalFailure};
pub use session::{CapabilityCheck, SessionConfig, SmtpSession, Verifier};

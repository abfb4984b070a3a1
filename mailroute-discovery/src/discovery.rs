//! The discovery service: gate, MX resolution, derivation and verification.

use std::{fmt, sync::Arc, time::Duration};

use mailroute_common::tracing;
use mailroute_smtp::TestMessage;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::{
    cache::ResolutionCache,
    config::DiscoveryConfig,
    credential::Credential,
    derive::Deriver,
    dns::{DnsError, HickoryLookup, Lookup, NameResolver},
    endpoint::{Endpoint, normalize_host},
    error::DiscoveryError,
    gate::{self, GateConfig},
    providers::ProviderTable,
    retry::{RetryController, TerminalFailure},
    session::{CapabilityCheck, SmtpSession, Verifier},
};

/// Why an account could not be verified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureReason {
    #[error("Invalid account address: {0}")]
    InvalidAddress(String),

    #[error("No sender policy record published for {0}")]
    PolicyMissing(String),

    #[error("No mail exchangers found for {0}")]
    NoMailExchangers(String),

    #[error("No submission endpoint could be derived for {0}")]
    NoCandidate(String),

    /// Every candidate failed; `endpoint` is the last one tried.
    #[error("Verification against {endpoint} failed: {failure}")]
    Unverified {
        endpoint: Endpoint,
        failure: TerminalFailure,
    },
}

impl From<DiscoveryError> for FailureReason {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::PolicyMissing(domain) => Self::PolicyMissing(domain),
            DiscoveryError::InvalidAddress(address) => Self::InvalidAddress(address),
            DiscoveryError::NoMailExchangers(domain) => Self::NoMailExchangers(domain),
        }
    }
}

/// The terminal outcome of verifying one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified { endpoint: Endpoint, attempts: u32 },
    Failed(FailureReason),
}

impl Verification {
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified { endpoint, attempts } => {
                write!(f, "verified via {endpoint} after {attempts} attempt(s)")
            }
            Self::Failed(reason) => write!(f, "not verified: {reason}"),
        }
    }
}

/// Finds and verifies submission endpoints.
///
/// Constructed once and shared behind an `Arc`; every method takes `&self`.
pub struct Discovery<L, C> {
    resolver: NameResolver<L>,
    providers: ProviderTable,
    checker: C,
    gate: GateConfig,
    retry: RetryController,
    sweep_interval: Duration,
}

impl Discovery<HickoryLookup, SmtpSession> {
    /// Builds the service over the system resolver and a real SMTP session.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn from_config(config: DiscoveryConfig) -> Result<Self, DnsError> {
        let lookup = HickoryLookup::new(&config.dns)?;
        let session = SmtpSession::new(config.session.clone());
        Ok(Self::new(lookup, session, config))
    }
}

impl<L, C> Discovery<L, C>
where
    L: Lookup,
    C: CapabilityCheck,
{
    #[must_use]
    pub fn new(lookup: L, checker: C, config: DiscoveryConfig) -> Self {
        let cache = Arc::new(ResolutionCache::new(config.dns.cache_ttl()));

        Self {
            resolver: NameResolver::new(lookup, cache),
            providers: config.providers,
            checker,
            gate: config.gate,
            retry: RetryController::new(config.retry),
            sweep_interval: config.dns.sweep_interval(),
        }
    }

    #[must_use]
    pub const fn resolver(&self) -> &NameResolver<L> {
        &self.resolver
    }

    #[must_use]
    pub const fn checker(&self) -> &C {
        &self.checker
    }

    /// Starts the periodic sweep of expired cache entries.
    pub fn spawn_cache_sweeper(&self) -> JoinHandle<()> {
        self.resolver.cache().spawn_sweeper(self.sweep_interval)
    }

    /// Gates `domain`, resolves its MX hosts and derives one endpoint per host.
    ///
    /// Endpoints keep MX preference order and duplicates are dropped. An
    /// empty list means no MX host led anywhere.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::PolicyMissing`] if the gate fails and
    /// [`DiscoveryError::NoMailExchangers`] if MX resolution yields nothing.
    pub async fn candidates(&self, domain: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
        let domain = normalize_host(domain);
        let report = gate::check(&self.resolver, &self.gate, &domain).await?;

        let hosts = self
            .resolver
            .mail_exchangers(&domain)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%domain, error = %e, "MX resolution failed");
                Vec::new().into()
            });
        if hosts.is_empty() {
            return Err(DiscoveryError::NoMailExchangers(domain));
        }

        let deriver = Deriver::new(&self.resolver, &self.providers, &self.checker);
        let mut endpoints: Vec<Endpoint> = Vec::new();
        for host in hosts.iter() {
            if let Some(endpoint) = deriver.derive(host).await
                && !endpoints.contains(&endpoint)
            {
                endpoints.push(endpoint);
            }
        }

        tracing::info!(
            %domain,
            mx_hosts = hosts.len(),
            candidates = endpoints.len(),
            has_dkim = report.has_dkim,
            "Endpoint search finished"
        );
        Ok(endpoints)
    }

    /// Verifies `credential` against the candidates for its domain, in order,
    /// stopping at the first one that accepts it.
    pub async fn verify_account<V>(
        &self,
        verifier: &V,
        credential: &Credential,
        message: &TestMessage,
    ) -> Verification
    where
        V: Verifier + ?Sized,
    {
        let verification = self.verify_inner(verifier, credential, message).await;

        match &verification {
            Verification::Verified { endpoint, attempts } => {
                tracing::info!(address = %credential.address(), %endpoint, attempts, "Account verified");
            }
            Verification::Failed(reason) => {
                tracing::warn!(address = %credential.address(), %reason, "Account not verified");
            }
        }

        verification
    }

    async fn verify_inner<V>(
        &self,
        verifier: &V,
        credential: &Credential,
        message: &TestMessage,
    ) -> Verification
    where
        V: Verifier + ?Sized,
    {
        let Some(domain) = credential.domain() else {
            return Verification::Failed(FailureReason::InvalidAddress(
                credential.address().to_string(),
            ));
        };

        let endpoints = match self.candidates(domain).await {
            Ok(endpoints) => endpoints,
            Err(e) => return Verification::Failed(e.into()),
        };

        let mut last_failure = None;
        for endpoint in endpoints {
            match self
                .retry
                .run(verifier, &endpoint, credential, message)
                .await
            {
                Ok(attempts) => return Verification::Verified { endpoint, attempts },
                Err(failure) => last_failure = Some((endpoint, failure)),
            }
        }

        match last_failure {
            Some((endpoint, failure)) => {
                Verification::Failed(FailureReason::Unverified { endpoint, failure })
            }
            None => Verification::Failed(FailureReason::NoCandidate(normalize_host(domain))),
        }
    }
}

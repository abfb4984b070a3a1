//! DNS resolution for endpoint discovery.
//!
//! [`Lookup`] is the raw query seam: MX, A/AAAA existence, CNAME, SRV and TXT.
//! [`HickoryLookup`] implements it over `hickory-resolver`. [`NameResolver`]
//! puts the shared [`ResolutionCache`] in front of any `Lookup` and decides
//! which faults are folded into "not found".
//!
//! # Caching Strategy
//!
//! - **Fixed TTL**: answers live for `cache_ttl_secs` (1 hour by default) from the time they were written
//! - **Definitive answers only**: found records, empty answers and NXDOMAIN are cached; timeouts and transport faults are not
//! - **MX faults surface**: `mail_exchangers` returns its error so the caller can log it; every other kind collapses faults to "not found"

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use hickory_resolver::{
    ResolveError, TokioResolver,
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::rr::{RData, RecordType},
};
use mailroute_common::tracing;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{cache::ResolutionCache, endpoint::normalize_host};

/// Errors that can occur during DNS resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsError {
    /// The name exists but has no records of the requested type.
    #[error("No {kind} records found for {name}")]
    NoRecords { name: String, kind: &'static str },

    /// Domain does not exist (NXDOMAIN).
    #[error("Domain does not exist: {0}")]
    DomainNotFound(String),

    /// DNS query timed out.
    #[error("DNS query timed out for {0}")]
    Timeout(String),

    /// DNS query failed due to network or resolver issues.
    #[error("DNS lookup failed for {name}: {reason}")]
    LookupFailed { name: String, reason: String },
}

impl DnsError {
    /// Returns `true` if the answer is authoritative enough to cache as a negative.
    #[must_use]
    pub const fn is_definitive(&self) -> bool {
        matches!(self, Self::NoRecords { .. } | Self::DomainNotFound(_))
    }

    /// Returns `true` if a later query might succeed.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::LookupFailed { .. })
    }

    fn from_resolve(name: &str, kind: &'static str, err: &ResolveError) -> Self {
        if err.is_nx_domain() {
            Self::DomainNotFound(name.to_string())
        } else if err.is_no_records_found() {
            Self::NoRecords {
                name: name.to_string(),
                kind,
            }
        } else {
            Self::LookupFailed {
                name: name.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Configuration for DNS resolution and its cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// DNS query timeout in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long an answer stays cached, in seconds (default: 3600)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Interval between sweeps of expired cache entries, in seconds (default: 300)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    5
}

const fn default_cache_ttl_secs() -> u64 {
    3600 // 1 hour
}

const fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl DnsConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Raw record queries. Host names in answers are normalised
/// (lower-case, no trailing dot).
#[async_trait]
pub trait Lookup: Send + Sync {
    /// MX exchange hosts, most preferred first.
    async fn mx(&self, domain: &str) -> Result<Vec<String>, DnsError>;

    /// Whether the host has an A or AAAA record.
    async fn has_address(&self, host: &str) -> Result<bool, DnsError>;

    /// The CNAME target of `host`, if it has one.
    async fn cname(&self, host: &str) -> Result<Option<String>, DnsError>;

    /// SRV targets in answer order.
    async fn srv(&self, name: &str) -> Result<Vec<String>, DnsError>;

    /// TXT strings, one per record with its character-strings concatenated.
    async fn txt(&self, name: &str) -> Result<Vec<String>, DnsError>;
}

/// [`Lookup`] backed by the system resolver configuration.
#[derive(Debug)]
pub struct HickoryLookup {
    resolver: TokioResolver,
    timeout: Duration,
}

impl HickoryLookup {
    /// Creates a lookup using the system resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new(config: &DnsConfig) -> Result<Self, DnsError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout();

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .map_err(|e| DnsError::LookupFailed {
                name: "system configuration".to_string(),
                reason: e.to_string(),
            })?
            .with_options(opts)
            .build();

        Ok(Self {
            resolver,
            timeout: config.timeout(),
        })
    }

    /// Creates a lookup with an explicit resolver configuration.
    #[must_use]
    pub fn with_resolver_config(
        resolver_config: ResolverConfig,
        opts: ResolverOpts,
        config: &DnsConfig,
    ) -> Self {
        let resolver =
            TokioResolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self {
            resolver,
            timeout: config.timeout(),
        }
    }

    async fn bounded<T, F>(&self, name: &str, query: F) -> Result<T, DnsError>
    where
        F: Future<Output = Result<T, DnsError>> + Send,
    {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| DnsError::Timeout(name.to_string()))?
    }
}

#[async_trait]
impl Lookup for HickoryLookup {
    async fn mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        self.bounded(domain, async {
            let lookup = self
                .resolver
                .mx_lookup(domain)
                .await
                .map_err(|e| DnsError::from_resolve(domain, "MX", &e))?;

            let mut records: Vec<(u16, String)> = lookup
                .iter()
                .map(|mx| (mx.preference(), normalize_host(&mx.exchange().to_utf8())))
                // A null MX (RFC 7505) has an empty exchange.
                .filter(|(_, host)| !host.is_empty())
                .collect();
            records.sort_by_key(|(preference, _)| *preference);

            let mut hosts: Vec<String> = Vec::with_capacity(records.len());
            for (_, host) in records {
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
            Ok(hosts)
        })
        .await
    }

    async fn has_address(&self, host: &str) -> Result<bool, DnsError> {
        let v4 = self
            .bounded(host, async {
                self.resolver
                    .ipv4_lookup(host)
                    .await
                    .map(|lookup| lookup.iter().next().is_some())
                    .map_err(|e| DnsError::from_resolve(host, "A", &e))
            })
            .await;

        let v4_fault = match v4 {
            Ok(true) => return Ok(true),
            Ok(false) => None,
            Err(e) if e.is_definitive() => None,
            Err(e) => Some(e),
        };

        let v6 = self
            .bounded(host, async {
                self.resolver
                    .ipv6_lookup(host)
                    .await
                    .map(|lookup| lookup.iter().next().is_some())
                    .map_err(|e| DnsError::from_resolve(host, "AAAA", &e))
            })
            .await;

        match v6 {
            Ok(true) => Ok(true),
            Ok(false) => v4_fault.map_or(Ok(false), Err),
            Err(e) if e.is_definitive() => v4_fault.map_or(Ok(false), Err),
            Err(e) => Err(e),
        }
    }

    async fn cname(&self, host: &str) -> Result<Option<String>, DnsError> {
        self.bounded(host, async {
            match self.resolver.lookup(host, RecordType::CNAME).await {
                Ok(lookup) => Ok(lookup.iter().find_map(|rdata| match rdata {
                    RData::CNAME(cname) => Some(normalize_host(&cname.0.to_utf8())),
                    _ => None,
                })),
                Err(e) if e.is_no_records_found() => Ok(None),
                Err(e) => Err(DnsError::from_resolve(host, "CNAME", &e)),
            }
        })
        .await
    }

    async fn srv(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.bounded(name, async {
            let lookup = self
                .resolver
                .srv_lookup(name)
                .await
                .map_err(|e| DnsError::from_resolve(name, "SRV", &e))?;

            Ok(lookup
                .iter()
                .map(|srv| normalize_host(&srv.target().to_utf8()))
                // A target of "." means the service is decidedly not available.
                .filter(|target| !target.is_empty())
                .collect())
        })
        .await
    }

    async fn txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.bounded(name, async {
            let lookup = self
                .resolver
                .txt_lookup(name)
                .await
                .map_err(|e| DnsError::from_resolve(name, "TXT", &e))?;

            Ok(lookup
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|chunk| String::from_utf8_lossy(chunk))
                        .collect::<String>()
                })
                .collect())
        })
        .await
    }
}

/// Cache-first resolution over a [`Lookup`].
#[derive(Debug)]
pub struct NameResolver<L> {
    lookup: L,
    cache: Arc<ResolutionCache>,
}

impl<L: Lookup> NameResolver<L> {
    #[must_use]
    pub const fn new(lookup: L, cache: Arc<ResolutionCache>) -> Self {
        Self { lookup, cache }
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    #[must_use]
    pub const fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Resolves MX hosts for `domain`, most preferred first.
    ///
    /// Faults are returned, not folded, so the caller can record why the list
    /// is empty.
    pub async fn mail_exchangers(&self, domain: &str) -> Result<Arc<[String]>, DnsError> {
        let domain = normalize_host(domain);
        if let Some(hosts) = self.cache.mail_exchangers().get(&domain) {
            tracing::debug!(%domain, count = hosts.len(), "MX cache hit");
            return Ok(hosts);
        }

        let hosts: Arc<[String]> = self.lookup.mx(&domain).await?.into();
        tracing::debug!(%domain, count = hosts.len(), "Resolved MX records");
        self.cache
            .mail_exchangers()
            .put(domain, Arc::clone(&hosts));
        Ok(hosts)
    }

    /// Returns `true` if `host` has an A or AAAA record.
    pub async fn exists(&self, host: &str) -> bool {
        let host = normalize_host(host);
        if let Some(exists) = self.cache.addresses().get(&host) {
            return exists;
        }

        match self.lookup.has_address(&host).await {
            Ok(exists) => {
                self.cache.addresses().put(host, exists);
                exists
            }
            Err(e) => {
                tracing::debug!(%host, error = %e, "Address lookup failed, treating as absent");
                false
            }
        }
    }

    /// Returns the CNAME target of `host`, if any.
    pub async fn canonical_name(&self, host: &str) -> Option<String> {
        let host = normalize_host(host);
        if let Some(target) = self.cache.canonical_names().get(&host) {
            return Some(target);
        }

        match self.lookup.cname(&host).await {
            Ok(Some(target)) => {
                self.cache.canonical_names().put(host, target.clone());
                Some(target)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(%host, error = %e, "CNAME lookup failed, treating as absent");
                None
            }
        }
    }

    /// Resolves SRV targets for `_submission._tcp.<domain>`.
    pub async fn submission_targets(&self, domain: &str) -> Vec<String> {
        let name = format!("_submission._tcp.{}", normalize_host(domain));
        if let Some(targets) = self.cache.service_targets().get(&name) {
            return targets.to_vec();
        }

        match self.lookup.srv(&name).await {
            Ok(targets) => {
                self.cache
                    .service_targets()
                    .put(name, targets.clone().into());
                targets
            }
            Err(e) => {
                tracing::debug!(%name, error = %e, "SRV lookup failed, treating as absent");
                Vec::new()
            }
        }
    }

    /// Returns `true` if any TXT record at `name` contains `marker`.
    pub async fn has_txt_marker(&self, name: &str, marker: &str) -> bool {
        let name = normalize_host(name);
        let key = format!("{name}|{marker}");
        if let Some(present) = self.cache.policy_records().get(&key) {
            return present;
        }

        match self.lookup.txt(&name).await {
            Ok(records) => {
                let present = records.iter().any(|record| record.contains(marker));
                self.cache.policy_records().put(key, present);
                present
            }
            Err(e) if e.is_definitive() => {
                self.cache.policy_records().put(key, false);
                false
            }
            Err(e) => {
                tracing::debug!(%name, error = %e, "TXT lookup failed, treating as absent");
                false
            }
        }
    }
}

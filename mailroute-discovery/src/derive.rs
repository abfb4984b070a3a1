//! Derives a submission endpoint from an inbound MX host.
//!
//! Steps run in order and stop at the first endpoint found:
//! 1. Static mapping from the provider table
//! 2. The same mapping applied to the host's CNAME target
//! 3. Rewriting inbound-style labels (`mx1`, `smtp-in`, ...) to `smtp`
//! 4. Common submission host names under the MX host's domain
//! 5. `_submission._tcp` SRV targets for that domain
//!
//! Steps 3 to 5 only accept a host that resolves and passes a capability
//! check on 587, 465 or 25.

use std::{collections::HashSet, sync::LazyLock};

use mailroute_common::tracing;
use regex::Regex;

use crate::{
    dns::{Lookup, NameResolver},
    endpoint::{Endpoint, Port, normalize_host},
    providers::ProviderTable,
    session::CapabilityCheck,
};

/// Inbound-style labels rewritten to `smtp`, in rule order.
const REWRITE_TOKENS: [&str; 18] = [
    "smtp-in",
    "mail-in",
    "mx",
    "inbound",
    "relay",
    "mail",
    "in",
    "gateway",
    "mailserver",
    "smtpout",
    "secure",
    "edge",
    "mx-out",
    "smtp-relay",
    "mailgw",
    "mail-relay",
    "smtp-gw",
    "out",
];

/// Prefixes tried in front of the MX host's domain.
const SUFFIX_GUESSES: [&str; 9] = [
    "smtp",
    "mail",
    "smtp-out",
    "smtp-relay",
    "mailgw",
    "smtpout",
    "secure-smtp",
    "mail-relay",
    "smtp-gw",
];

// A token only matches between label or hyphen boundaries, optionally
// followed by digits (`mx`, `mx1`, `mx02`).
static REWRITE_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    REWRITE_TOKENS
        .iter()
        .filter_map(|token| {
            Regex::new(&format!(r"(^|[.-]){}\d*([.-]|$)", regex::escape(token))).ok()
        })
        .collect()
});

/// Applies each rewrite rule to the first matching token of `host`.
///
/// Rules that leave the host unchanged are skipped and duplicates dropped,
/// so the result holds distinct hosts in rule order.
#[must_use]
pub fn rewritten_hosts(host: &str) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();

    for rule in REWRITE_RULES.iter() {
        let rewritten = rule.replacen(host, 1, "${1}smtp${2}");
        if rewritten != host && !hosts.iter().any(|h| *h == rewritten) {
            hosts.push(rewritten.into_owned());
        }
    }

    hosts
}

/// The domain an MX host lives under: everything after its first label.
#[must_use]
pub fn parent_domain(host: &str) -> Option<&str> {
    host.split_once('.')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// Endpoint derivation over a shared resolver, provider table and capability check.
pub struct Deriver<'a, L, C: ?Sized> {
    resolver: &'a NameResolver<L>,
    providers: &'a ProviderTable,
    checker: &'a C,
}

impl<'a, L, C> Deriver<'a, L, C>
where
    L: Lookup,
    C: CapabilityCheck + ?Sized,
{
    #[must_use]
    pub const fn new(
        resolver: &'a NameResolver<L>,
        providers: &'a ProviderTable,
        checker: &'a C,
    ) -> Self {
        Self {
            resolver,
            providers,
            checker,
        }
    }

    /// Derives the submission endpoint for one MX host.
    ///
    /// Returns `None` when every step is exhausted. Resolution faults count
    /// as "not found" and never escape.
    pub async fn derive(&self, mx_host: &str) -> Option<Endpoint> {
        let host = normalize_host(mx_host);
        let mut tried = HashSet::new();

        if let Some(endpoint) = self.mapped(&host).await {
            tracing::info!(mx = %host, %endpoint, step = "static", "Derived submission endpoint");
            return Some(endpoint);
        }

        if let Some(target) = self.resolver.canonical_name(&host).await
            && let Some(endpoint) = self.mapped(&target).await
        {
            tracing::info!(mx = %host, cname = %target, %endpoint, step = "cname", "Derived submission endpoint");
            return Some(endpoint);
        }

        for candidate in rewritten_hosts(&host) {
            if let Some(endpoint) = self.try_host(&candidate, &mut tried).await {
                tracing::info!(mx = %host, %endpoint, step = "rewrite", "Derived submission endpoint");
                return Some(endpoint);
            }
        }

        let Some(domain) = parent_domain(&host) else {
            tracing::debug!(mx = %host, "MX host has no parent domain");
            return None;
        };

        for prefix in SUFFIX_GUESSES {
            let candidate = format!("{prefix}.{domain}");
            if let Some(endpoint) = self.try_host(&candidate, &mut tried).await {
                tracing::info!(mx = %host, %endpoint, step = "suffix", "Derived submission endpoint");
                return Some(endpoint);
            }
        }

        for target in self.resolver.submission_targets(domain).await {
            if let Some(endpoint) = self.try_host(&target, &mut tried).await {
                tracing::info!(mx = %host, %endpoint, step = "srv", "Derived submission endpoint");
                return Some(endpoint);
            }
        }

        tracing::info!(mx = %host, "No submission endpoint derived");
        None
    }

    /// Looks `key` up in the provider table, keeping the mapping only if its host resolves.
    async fn mapped(&self, key: &str) -> Option<Endpoint> {
        let endpoint = self.providers.get(key)?;
        if self.resolver.exists(&endpoint.host).await {
            Some(endpoint.clone())
        } else {
            tracing::debug!(mx = %key, %endpoint, "Mapped host does not resolve, skipping");
            None
        }
    }

    /// Checks `host` on each port in order. A host seen earlier in this
    /// derivation is not checked again.
    async fn try_host(&self, host: &str, tried: &mut HashSet<String>) -> Option<Endpoint> {
        let host = normalize_host(host);
        if !tried.insert(host.clone()) {
            return None;
        }

        if !self.resolver.exists(&host).await {
            tracing::debug!(%host, "Candidate host does not resolve");
            return None;
        }

        for port in Port::SEARCH_ORDER {
            let endpoint = Endpoint::new(host.as_str(), port);
            if self.checker.is_capable(&endpoint).await {
                return Some(endpoint);
            }
        }

        None
    }
}

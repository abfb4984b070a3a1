//! Domain verification gate, run before any MX lookup.
//!
//! A domain must publish a sender policy (SPF) record before its endpoints are
//! searched. A missing signing key (DKIM) record is only reported.

use mailroute_common::tracing;
use serde::{Deserialize, Serialize};

use crate::{
    dns::{Lookup, NameResolver},
    endpoint::normalize_host,
    error::DiscoveryError,
};

const SPF_MARKER: &str = "v=spf1";
const DKIM_MARKER: &str = "v=DKIM1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Selector whose `<selector>._domainkey.<domain>` record is checked (default: "dkim")
    #[serde(default = "default_dkim_selector")]
    pub dkim_selector: String,
}

fn default_dkim_selector() -> String {
    "dkim".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            dkim_selector: default_dkim_selector(),
        }
    }
}

/// What the gate found for a domain that passed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateReport {
    pub has_spf: bool,
    pub has_dkim: bool,
}

/// Checks the sender policy and signing key records of `domain`.
///
/// # Errors
///
/// Returns [`DiscoveryError::PolicyMissing`] if no TXT record contains `v=spf1`.
pub async fn check<L: Lookup>(
    resolver: &NameResolver<L>,
    config: &GateConfig,
    domain: &str,
) -> Result<GateReport, DiscoveryError> {
    let domain = normalize_host(domain);

    if !resolver.has_txt_marker(&domain, SPF_MARKER).await {
        tracing::warn!(%domain, "No SPF record published, stopping");
        return Err(DiscoveryError::PolicyMissing(domain));
    }

    let key_name = format!("{}._domainkey.{domain}", config.dkim_selector);
    let has_dkim = resolver.has_txt_marker(&key_name, DKIM_MARKER).await;
    if !has_dkim {
        tracing::warn!(%domain, selector = %config.dkim_selector, "No DKIM record published");
    }

    Ok(GateReport {
        has_spf: true,
        has_dkim,
    })
}

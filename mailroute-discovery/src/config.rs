//! Configuration for the discovery service.
//!
//! Every section has defaults, so an empty `()` is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::{
    dns::DnsConfig, gate::GateConfig, providers::ProviderTable, retry::RetryPolicy,
    session::SessionConfig,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// DNS resolver and cache settings
    #[serde(default)]
    pub dns: DnsConfig,

    /// SMTP session timeouts, TLS policy and routes
    #[serde(default)]
    pub session: SessionConfig,

    /// Verification retry policy
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Domain gate settings
    #[serde(default)]
    pub gate: GateConfig,

    /// Known MX host to submission endpoint mappings
    #[serde(default)]
    pub providers: ProviderTable,
}

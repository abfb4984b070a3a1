//! Known provider mappings from inbound MX host to submission endpoint.
//!
//! Loaded from the `providers` section of the configuration:
//! ```ron
//! providers: {
//!     "mx1.mail.ovh.net": (host: "ssl0.ovh.net", port: 465),
//!     "mx.gmx.net": (host: "smtp.gmx.com", port: 587),
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, normalize_host};

/// Static MX host to submission endpoint table.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ProviderTable {
    providers: HashMap<String, Endpoint>,
}

impl ProviderTable {
    /// Create a new empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Get the submission endpoint mapped to an MX host
    ///
    /// Keys are compared after normalisation, so `MX.GMX.NET.` finds `mx.gmx.net`.
    #[must_use]
    pub fn get(&self, mx_host: &str) -> Option<&Endpoint> {
        self.providers.get(mx_host).or_else(|| {
            let normalized = normalize_host(mx_host);
            self.providers
                .iter()
                .find(|(key, _)| normalize_host(key) == normalized)
                .map(|(_, endpoint)| endpoint)
        })
    }

    /// Add or update the mapping for an MX host
    pub fn insert(&mut self, mx_host: &str, endpoint: Endpoint) {
        self.providers.insert(normalize_host(mx_host), endpoint);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

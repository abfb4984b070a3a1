//! In-memory DNS and SMTP stand-ins shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    dns::{DnsError, Lookup},
    endpoint::Endpoint,
    session::CapabilityCheck,
};

/// Answers queries from fixed tables. Unknown names are NXDOMAIN for MX and
/// "no records" for everything else.
#[derive(Debug, Default)]
pub struct StaticLookup {
    mx: HashMap<String, Vec<String>>,
    hosts: HashSet<String>,
    cnames: HashMap<String, String>,
    srv: HashMap<String, Vec<String>>,
    txt: HashMap<String, Vec<String>>,
    mx_calls: AtomicUsize,
}

impl StaticLookup {
    #[must_use]
    pub fn with_mx(mut self, domain: &str, hosts: &[&str]) -> Self {
        self.mx.insert(
            domain.to_string(),
            hosts.iter().map(ToString::to_string).collect(),
        );
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.hosts.insert(host.to_string());
        self
    }

    #[must_use]
    pub fn with_cname(mut self, host: &str, target: &str) -> Self {
        self.cnames.insert(host.to_string(), target.to_string());
        self
    }

    #[must_use]
    pub fn with_srv(mut self, name: &str, targets: &[&str]) -> Self {
        self.srv.insert(
            name.to_string(),
            targets.iter().map(ToString::to_string).collect(),
        );
        self
    }

    #[must_use]
    pub fn with_txt(mut self, name: &str, record: &str) -> Self {
        self.txt
            .entry(name.to_string())
            .or_default()
            .push(record.to_string());
        self
    }

    pub fn mx_calls(&self) -> usize {
        self.mx_calls.load(Ordering::SeqCst)
    }
}

fn no_records(name: &str, kind: &'static str) -> DnsError {
    DnsError::NoRecords {
        name: name.to_string(),
        kind,
    }
}

#[async_trait]
impl Lookup for StaticLookup {
    async fn mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        self.mx_calls.fetch_add(1, Ordering::SeqCst);
        self.mx
            .get(domain)
            .cloned()
            .ok_or_else(|| DnsError::DomainNotFound(domain.to_string()))
    }

    async fn has_address(&self, host: &str) -> Result<bool, DnsError> {
        Ok(self.hosts.contains(host))
    }

    async fn cname(&self, host: &str) -> Result<Option<String>, DnsError> {
        Ok(self.cnames.get(host).cloned())
    }

    async fn srv(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.srv
            .get(name)
            .cloned()
            .ok_or_else(|| no_records(name, "SRV"))
    }

    async fn txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.txt
            .get(name)
            .cloned()
            .ok_or_else(|| no_records(name, "TXT"))
    }
}

/// Reports a fixed set of `host:port` endpoints as capable and records every check.
#[derive(Debug, Default)]
pub struct StaticCapability {
    capable: HashSet<String>,
    checked: Mutex<Vec<String>>,
}

impl StaticCapability {
    #[must_use]
    pub fn with_capable(mut self, address: &str) -> Self {
        self.capable.insert(address.to_string());
        self
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked
            .lock()
            .map(|checked| checked.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CapabilityCheck for StaticCapability {
    async fn is_capable(&self, endpoint: &Endpoint) -> bool {
        let address = endpoint.address();
        if let Ok(mut checked) = self.checked.lock() {
            checked.push(address.clone());
        }
        self.capable.contains(&address)
    }
}

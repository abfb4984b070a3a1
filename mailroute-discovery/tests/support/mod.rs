#![allow(dead_code)]

pub mod mock_server;

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use mailroute_discovery::{DnsError, Lookup};

/// DNS answers for a single test domain.
#[derive(Debug, Default)]
pub struct StubLookup {
    mx: HashMap<String, Vec<String>>,
    hosts: HashSet<String>,
    txt: HashMap<String, Vec<String>>,
    mx_calls: AtomicUsize,
}

impl StubLookup {
    /// `example.test` with an SPF record, one MX host and `smtp.example.test`.
    #[must_use]
    pub fn example_domain() -> Self {
        Self::default()
            .with_txt("example.test", "v=spf1 mx -all")
            .with_mx("example.test", &["mx1.example.test"])
            .with_host("smtp.example.test")
    }

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

#[async_trait]
impl Lookup for StubLookup {
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

    async fn cname(&self, _host: &str) -> Result<Option<String>, DnsError> {
        Ok(None)
    }

    async fn srv(&self, name: &str) -> Result<Vec<String>, DnsError> {
        Err(DnsError::NoRecords {
            name: name.to_string(),
            kind: "SRV",
        })
    }

    async fn txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.txt.get(name).cloned().ok_or_else(|| DnsError::NoRecords {
            name: name.to_string(),
            kind: "TXT",
        })
    }
}

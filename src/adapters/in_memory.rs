//! In-Memory Probe Adapter
//!
//! Scripted `ProbeClient` for tests: every host is described by a
//! [`HostFixture`], and connection / attribute calls are counted so tests can
//! assert how far a scrape got.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::Credentials;
use crate::domain::{MetricKey, ProbeClient, ProbeSession, RawValue};
use crate::error::{Error, Result};

/// Scripted behaviour of one host.
#[derive(Debug, Clone, Default)]
pub struct HostFixture {
    short_name: String,
    reachable: bool,
    attributes: HashMap<MetricKey, RawValue>,
    replication: String,
    fail_on: Option<MetricKey>,
    fail_replication: bool,
}

impl HostFixture {
    /// A reachable host with no attributes.
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            reachable: true,
            ..Default::default()
        }
    }

    /// A host that refuses connections.
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, key: MetricKey, value: impl Into<RawValue>) -> Self {
        self.attributes.insert(key, value.into());
        self
    }

    pub fn replication(mut self, text: impl Into<String>) -> Self {
        self.replication = text.into();
        self
    }

    /// Make the probe error when `key` is fetched.
    pub fn fail_on(mut self, key: MetricKey) -> Self {
        self.fail_on = Some(key);
        self
    }

    /// Make the probe error when replication pairs are fetched.
    pub fn fail_replication(mut self) -> Self {
        self.fail_replication = true;
        self
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    connects: HashMap<String, usize>,
    attributes: HashMap<String, usize>,
}

/// In-memory probe client.
///
/// Clones share fixtures and counters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProbe {
    hosts: Arc<RwLock<HashMap<String, HostFixture>>>,
    counters: Arc<RwLock<CallCounters>>,
}

impl InMemoryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, host: impl Into<String>, fixture: HostFixture) -> Self {
        self.set_host(host, fixture);
        self
    }

    /// Replace the fixture of `host`; later connections see the new one.
    pub fn set_host(&self, host: impl Into<String>, fixture: HostFixture) {
        self.hosts.write().insert(host.into(), fixture);
    }

    /// Number of connection attempts made to `host`.
    pub fn connections(&self, host: &str) -> usize {
        self.counters.read().connects.get(host).copied().unwrap_or(0)
    }

    /// Number of attribute fetches made against `host`.
    pub fn attribute_calls(&self, host: &str) -> usize {
        self.counters
            .read()
            .attributes
            .get(host)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProbeClient for InMemoryProbe {
    async fn connect(
        &self,
        host: &str,
        _credentials: &Credentials,
    ) -> Result<Box<dyn ProbeSession>> {
        *self
            .counters
            .write()
            .connects
            .entry(host.to_string())
            .or_default() += 1;

        let fixture = self.hosts.read().get(host).cloned();
        match fixture {
            Some(fixture) if fixture.reachable => Ok(Box::new(InMemorySession {
                host: host.to_string(),
                fixture,
                counters: self.counters.clone(),
            })),
            _ => Err(Error::HostUnreachable {
                host: host.to_string(),
                reason: "connection refused".into(),
            }),
        }
    }
}

struct InMemorySession {
    host: String,
    fixture: HostFixture,
    counters: Arc<RwLock<CallCounters>>,
}

#[async_trait]
impl ProbeSession for InMemorySession {
    fn short_name(&self) -> &str {
        &self.fixture.short_name
    }

    async fn attribute(&self, key: MetricKey) -> Result<Option<RawValue>> {
        *self
            .counters
            .write()
            .attributes
            .entry(self.host.clone())
            .or_default() += 1;

        if self.fixture.fail_on == Some(key) {
            return Err(Error::Probe {
                host: self.host.clone(),
                reason: format!("injected failure on {}", key),
            });
        }
        Ok(self.fixture.attributes.get(&key).cloned())
    }

    async fn replication_pairs(&self) -> Result<String> {
        if self.fixture.fail_replication {
            return Err(Error::Probe {
                host: self.host.clone(),
                reason: "injected replication failure".into(),
            });
        }
        Ok(self.fixture.replication.clone())
    }
}

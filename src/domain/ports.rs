//! Domain Ports (Port/Adapter Pattern)
//!
//! The collector depends only on these abstractions. The LDAP adapter talks
//! to real FreeIPA servers, the in-memory adapter backs tests.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Collector                     │
//! │   HostScraper ──▶ ProbeClient ──▶ ProbeSession│
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │        LdapProbe │ InMemoryProbe              │
//! └──────────────────────────────────────────────┘
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Stable key of a status metric (`users`, `hbac`, `bind`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey(pub &'static str);

impl MetricKey {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Short hostname used to label samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostName(pub String);

impl HostName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Raw attribute value as reported by a directory server.
///
/// Directory attributes are not uniformly typed: counts come back as numbers
/// or as numeric strings, switches as `ON`/`OFF` text or booleans.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Number(n as f64)
    }
}

impl From<usize> for RawValue {
    fn from(n: usize) -> Self {
        RawValue::Number(n as f64)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Flag(b)
    }
}

// =============================================================================
// Probe Ports
// =============================================================================

/// Port for connecting to a single directory-service host.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    /// Connect and authenticate against `host`.
    ///
    /// Fails with `Error::HostUnreachable` when no live session can be
    /// established.
    async fn connect(&self, host: &str, credentials: &Credentials)
        -> Result<Box<dyn ProbeSession>>;
}

/// A live connection to one host.
#[async_trait]
pub trait ProbeSession: Send + Sync {
    /// Display name of the host, e.g. `ipa1` for `ipa1.example.com`.
    fn short_name(&self) -> &str;

    /// Fetch the attribute backing `key`. `None` means the server has no value.
    async fn attribute(&self, key: MetricKey) -> Result<Option<RawValue>>;

    /// Newline-separated `"<target> <status>"` replication pairs (possibly empty).
    async fn replication_pairs(&self) -> Result<String>;

    /// Release the connection. Errors are ignored by callers.
    async fn close(&self) {}
}

//! Exporter configuration
//!
//! The values here are assembled by `main` from command-line flags and
//! environment variables and are immutable for the lifetime of the process.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default cache time-to-live
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default per-host LDAP network timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default bind DN
pub const DEFAULT_BIND_DN: &str = "cn=Directory Manager";

/// Default exporter port
pub const DEFAULT_PORT: u16 = 9189;

// =============================================================================
// Credentials
// =============================================================================

/// Domain and bind credentials shared by every scraped host.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// DNS domain of the IPA realm, e.g. `example.com`
    pub domain: String,

    /// Bind DN
    pub bind_dn: String,

    /// Bind password
    pub bind_password: String,
}

impl Credentials {
    pub fn new(
        domain: impl Into<String>,
        bind_dn: impl Into<String>,
        bind_password: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            bind_dn: bind_dn.into(),
            bind_password: bind_password.into(),
        }
    }

    /// LDAP base DN derived from the domain (`example.com` -> `dc=example,dc=com`).
    pub fn base_dn(&self) -> String {
        format!("dc={}", self.domain.replace('.', ",dc="))
    }

    /// Strips `.<domain>` from a host name.
    pub fn short_hostname(&self, host: &str) -> String {
        host.replace(&format!(".{}", self.domain), "")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Exporter Configuration
// =============================================================================

/// Configuration for the exporter
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Hosts to scrape, in scrape order
    pub hosts: Vec<String>,

    /// Credentials applied to every host
    pub credentials: Credentials,

    /// Maximum age of a served snapshot
    pub cache_ttl: Duration,

    /// Connect and per-operation timeout for the probe
    pub probe_timeout: Duration,

    /// How many hosts are scraped at once (1 = serial)
    pub scrape_concurrency: usize,

    /// HTTP listen address
    pub listen_addr: SocketAddr,
}

impl ExporterConfig {
    /// Create a configuration with default tunables.
    pub fn new(hosts: Vec<String>, credentials: Credentials) -> Self {
        Self {
            hosts,
            credentials,
            cache_ttl: DEFAULT_CACHE_TTL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            scrape_concurrency: 1,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }

    /// Check the configuration before anything is started.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(Error::Config("no FreeIPA hosts configured".into()));
        }
        if self.credentials.domain.trim().is_empty() {
            return Err(Error::Config("domain must not be empty".into()));
        }
        if self.credentials.bind_password.is_empty() {
            return Err(Error::Config("bind password must not be empty".into()));
        }
        if self.scrape_concurrency == 0 {
            return Err(Error::Config("scrape concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// Parse a comma-separated host list, trimming entries and dropping blanks.
pub fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

//! FreeIPA Exporter
//!
//! Periodically probes one or more FreeIPA servers and republishes their
//! health indicators (object counts, anonymous bind state, AD trust,
//! replication agreement status) as Prometheus gauges.
//!
//! # Architecture
//!
//! ```text
//! GET /metrics → SnapshotCache (TTL, single-flight)
//!                     │ stale
//!                     ▼
//!               HostAggregator → HostScraper × hosts → ProbeClient (LDAP)
//! ```
//!
//! Scrapes are lazy: nothing runs in the background, a snapshot is rebuilt
//! only when a request finds the cached one older than the TTL.
//!
//! # Modules
//!
//! - [`adapters`] - LDAP and in-memory probe clients
//! - [`collector`] - Normalization, host scraping, aggregation and caching
//! - [`config`] - Exporter configuration
//! - [`domain`] - Probe ports and metric definitions
//! - [`error`] - Error types
//! - [`server`] - HTTP exposition endpoint

pub mod adapters;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;

// Re-export commonly used types
pub use collector::{HostAggregator, HostScraper, Snapshot, SnapshotCache};
pub use config::{Credentials, ExporterConfig};
pub use error::{Error, Result};

use std::sync::Arc;

/// Wire a cache around the scraper for `config`, probing through `probe`.
pub fn build_cache(
    config: &ExporterConfig,
    probe: Arc<dyn domain::ProbeClient>,
) -> SnapshotCache<HostAggregator> {
    let scraper = HostScraper::new(probe, config.credentials.clone(), domain::CHECKS);
    let aggregator = HostAggregator::new(config.hosts.clone(), scraper)
        .with_concurrency(config.scrape_concurrency);
    SnapshotCache::new(aggregator, config.cache_ttl)
}

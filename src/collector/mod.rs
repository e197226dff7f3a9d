//! Collector
//!
//! Turns the configured FreeIPA hosts into a cached, consistent metrics
//! snapshot.
//!
//! ```text
//! /metrics ──▶ SnapshotCache::get ──(stale)──▶ HostAggregator::aggregate
//!                                                   │
//!                                   HostScraper::scrape × hosts
//!                                                   │
//!                                        normalize + replication pairs
//! ```

mod aggregator;
mod cache;
mod normalizer;
mod replication;
mod scraper;
mod snapshot;

pub use aggregator::{Aggregate, HostAggregator};
pub use cache::SnapshotCache;
pub use normalizer::normalize;
pub use replication::{
    parse_replication_pairs, ReplicationEdge, ReplicationStatus, HEALTHY_STATUS_CODES,
};
pub use scraper::{HostReport, HostScraper, ScrapeOutcome};
pub use snapshot::{LivenessSample, Snapshot, SnapshotBuilder, StatusFamily, CONTENT_TYPE};

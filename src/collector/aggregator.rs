//! Aggregator
//!
//! Runs one scrape pass over the configured hosts and merges the host
//! reports into a [`Snapshot`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{info, instrument};

use super::scraper::{HostReport, HostScraper};
use super::snapshot::{Snapshot, SnapshotBuilder};
use crate::error::Result;

/// Produces a fresh snapshot on demand.
#[async_trait]
pub trait Aggregate: Send + Sync {
    async fn aggregate(&self) -> Result<Snapshot>;
}

/// Aggregates by scraping every configured host.
#[derive(Debug)]
pub struct HostAggregator {
    hosts: Arc<[String]>,
    scraper: HostScraper,
    concurrency: usize,
}

impl HostAggregator {
    /// Scrape `hosts` one at a time, in order.
    pub fn new(hosts: Vec<String>, scraper: HostScraper) -> Self {
        Self {
            hosts: hosts.into(),
            scraper,
            concurrency: 1,
        }
    }

    /// Scrape up to `concurrency` hosts at once. Reports are still merged in
    /// configured host order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

#[async_trait]
impl Aggregate for HostAggregator {
    #[instrument(skip(self), fields(hosts = self.hosts.len()))]
    async fn aggregate(&self) -> Result<Snapshot> {
        let scraper = &self.scraper;
        let reports: Vec<HostReport> = stream::iter(self.hosts.iter().cloned())
            .map(|host| async move { scraper.scrape(&host).await })
            .buffered(self.concurrency)
            .collect()
            .await;

        let up = reports.iter().filter(|r| r.is_up()).count();
        let mut builder = SnapshotBuilder::new(self.scraper.checks());
        for report in reports {
            builder.add_report(report);
        }
        let snapshot = builder.build()?;

        info!(
            "Aggregation pass finished: {}/{} hosts up",
            up,
            self.hosts.len()
        );
        Ok(snapshot)
    }
}

//! Host Scraper
//!
//! Probes a single host and turns whatever it reports into a [`HostReport`].
//! Every failure is confined to the report of the host it happened on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use super::normalizer::normalize;
use super::replication::{parse_replication_pairs, ReplicationEdge};
use crate::config::Credentials;
use crate::domain::{HostName, MetricDefinition, MetricKey, ProbeClient, ProbeSession};
use crate::error::{Error, Result};

// =============================================================================
// Host Report
// =============================================================================

/// How a host scrape ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// Every check and the replication pairs were collected.
    Complete,

    /// Connected, but a check failed midway. Samples collected before the
    /// failure are kept.
    Partial { failed_key: Option<MetricKey>, error: String },

    /// No session could be established.
    Unreachable { reason: String },
}

impl ScrapeOutcome {
    /// The `up` gauge: true only for a complete scrape.
    pub fn is_up(&self) -> bool {
        matches!(self, ScrapeOutcome::Complete)
    }
}

/// Result of scraping one host.
#[derive(Debug, Clone)]
pub struct HostReport {
    /// Short hostname used as the sample label
    pub host: HostName,

    pub outcome: ScrapeOutcome,

    /// Zero when the host was unreachable
    pub duration: Duration,

    /// Normalized samples in check order; skipped checks are absent
    pub samples: Vec<(MetricKey, i64)>,

    pub edges: Vec<ReplicationEdge>,
}

impl HostReport {
    fn unreachable(host: HostName, reason: String) -> Self {
        Self {
            host,
            outcome: ScrapeOutcome::Unreachable { reason },
            duration: Duration::ZERO,
            samples: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.outcome.is_up()
    }

    /// Value recorded for `key`, if any.
    pub fn sample(&self, key: MetricKey) -> Option<i64> {
        self.samples
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

// =============================================================================
// Host Scraper
// =============================================================================

/// Scrapes individual hosts through a [`ProbeClient`].
pub struct HostScraper {
    probe: Arc<dyn ProbeClient>,
    credentials: Credentials,
    checks: &'static [MetricDefinition],
}

impl HostScraper {
    pub fn new(
        probe: Arc<dyn ProbeClient>,
        credentials: Credentials,
        checks: &'static [MetricDefinition],
    ) -> Self {
        Self {
            probe,
            credentials,
            checks,
        }
    }

    pub fn checks(&self) -> &'static [MetricDefinition] {
        self.checks
    }

    /// Scrape one host. Never fails; problems are reported in the outcome.
    #[instrument(skip(self))]
    pub async fn scrape(&self, host: &str) -> HostReport {
        info!("Scraping FreeIPA host: {}", host);
        let started = Instant::now();

        let session = match self.probe.connect(host, &self.credentials).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not connect to {}: {}", host, e);
                let short = HostName::new(self.credentials.short_hostname(host));
                return HostReport::unreachable(short, e.to_string());
            }
        };

        let host_name = HostName::new(session.short_name());
        let mut samples = Vec::with_capacity(self.checks.len());
        let mut edges = Vec::new();

        let outcome = match self
            .collect(session.as_ref(), &host_name, &mut samples, &mut edges)
            .await
        {
            Ok(()) => ScrapeOutcome::Complete,
            Err((failed_key, e)) => {
                warn!("Failed to scrape metrics from {}: {}", host, e);
                ScrapeOutcome::Partial {
                    failed_key,
                    error: e.to_string(),
                }
            }
        };
        session.close().await;

        let duration = started.elapsed();
        debug!(
            host = %host_name,
            samples = samples.len(),
            edges = edges.len(),
            duration_ms = duration.as_millis() as u64,
            "Host scrape finished"
        );

        HostReport {
            host: host_name,
            outcome,
            duration,
            samples,
            edges,
        }
    }

    /// Collect checks and replication pairs into `samples` / `edges`.
    ///
    /// Stops at the first failure, leaving what was already collected in
    /// place. The failing check (if any) is returned with the error.
    async fn collect(
        &self,
        session: &dyn ProbeSession,
        host: &HostName,
        samples: &mut Vec<(MetricKey, i64)>,
        edges: &mut Vec<ReplicationEdge>,
    ) -> std::result::Result<(), (Option<MetricKey>, Error)> {
        for check in self.checks {
            let value = fetch_normalized(session, check.key)
                .await
                .map_err(|e| (Some(check.key), e))?;
            if let Some(value) = value {
                samples.push((check.key, value));
            }
        }

        let pairs = session.replication_pairs().await.map_err(|e| (None, e))?;
        edges.extend(parse_replication_pairs(host, &pairs));
        Ok(())
    }
}

async fn fetch_normalized(session: &dyn ProbeSession, key: MetricKey) -> Result<Option<i64>> {
    let raw = session.attribute(key).await?;
    normalize(raw.as_ref())
}

impl std::fmt::Debug for HostScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostScraper")
            .field("credentials", &self.credentials)
            .field("checks", &self.checks.len())
            .finish()
    }
}

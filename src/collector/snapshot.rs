//! Snapshot
//!
//! The immutable result of one aggregation pass. A snapshot is built in full
//! by [`SnapshotBuilder`] and rendered to the Prometheus text format once, at
//! build time; readers only ever see finished snapshots.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use super::replication::ReplicationEdge;
use super::scraper::HostReport;
use crate::domain::checks::{
    REPLICATION_STATUS, REPLICATION_STATUS_HELP, SCRAPE_DURATION, SCRAPE_DURATION_HELP, UP,
    UP_HELP,
};
use crate::domain::{HostName, MetricDefinition, MetricKey, NAMESPACE};
use crate::error::{Error, Result};

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// All samples of one status check.
#[derive(Debug, Clone)]
pub struct StatusFamily {
    pub definition: MetricDefinition,
    pub samples: Vec<(HostName, i64)>,
}

/// Per-host `up` and scrape duration.
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessSample {
    pub host: HostName,
    pub up: bool,
    pub duration: Duration,
}

/// One complete, immutable set of samples.
#[derive(Debug, Clone)]
pub struct Snapshot {
    families: Vec<StatusFamily>,
    replication: Vec<ReplicationEdge>,
    liveness: Vec<LivenessSample>,
    produced_at: DateTime<Utc>,
    exposition: Bytes,
}

impl Snapshot {
    /// When the aggregation pass that produced this snapshot finished.
    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    /// One family per status check, in definition order.
    pub fn families(&self) -> &[StatusFamily] {
        &self.families
    }

    pub fn family(&self, key: MetricKey) -> Option<&StatusFamily> {
        self.families.iter().find(|f| f.definition.key == key)
    }

    /// Value of `key` for `host`, if that host reported one.
    pub fn sample(&self, key: MetricKey, host: &str) -> Option<i64> {
        self.family(key)?
            .samples
            .iter()
            .find(|(h, _)| h.as_str() == host)
            .map(|(_, v)| *v)
    }

    pub fn replication(&self) -> &[ReplicationEdge] {
        &self.replication
    }

    /// Gauge value of the `source -> target` agreement.
    pub fn replication_status(&self, source: &str, target: &str) -> Option<i64> {
        self.replication
            .iter()
            .find(|e| e.source.as_str() == source && e.target.as_str() == target)
            .map(|e| e.status.value())
    }

    pub fn liveness(&self) -> &[LivenessSample] {
        &self.liveness
    }

    pub fn is_up(&self, host: &str) -> Option<bool> {
        self.liveness_of(host).map(|l| l.up)
    }

    pub fn scrape_duration(&self, host: &str) -> Option<Duration> {
        self.liveness_of(host).map(|l| l.duration)
    }

    fn liveness_of(&self, host: &str) -> Option<&LivenessSample> {
        self.liveness.iter().find(|l| l.host.as_str() == host)
    }

    /// The snapshot rendered in the Prometheus text format.
    pub fn exposition(&self) -> &Bytes {
        &self.exposition
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Merges host reports into a [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotBuilder {
    families: Vec<StatusFamily>,
    replication: Vec<ReplicationEdge>,
    liveness: Vec<LivenessSample>,
}

impl SnapshotBuilder {
    /// Start a pass with an empty family for every check.
    pub fn new(checks: &[MetricDefinition]) -> Self {
        Self {
            families: checks
                .iter()
                .map(|definition| StatusFamily {
                    definition: *definition,
                    samples: Vec::new(),
                })
                .collect(),
            replication: Vec::new(),
            liveness: Vec::new(),
        }
    }

    /// Append one host's samples, edges and liveness.
    ///
    /// A host whose short name was already reported keeps its first samples
    /// in the exposition; the later report is still kept on the snapshot.
    pub fn add_report(&mut self, report: HostReport) -> &mut Self {
        if self.liveness.iter().any(|l| l.host == report.host) {
            warn!(
                host = %report.host,
                "Duplicate short hostname in one pass, exposing first report only"
            );
        }
        for (key, value) in report.samples {
            if let Some(family) = self.families.iter_mut().find(|f| f.definition.key == key) {
                family.samples.push((report.host.clone(), value));
            }
        }
        self.replication.extend(report.edges);
        self.liveness.push(LivenessSample {
            up: report.outcome.is_up(),
            host: report.host,
            duration: report.duration,
        });
        self
    }

    /// Stamp and render the snapshot.
    pub fn build(self) -> Result<Snapshot> {
        let exposition = render(&self.families, &self.replication, &self.liveness)
            .map_err(|e| Error::Aggregation(format!("failed to render snapshot: {}", e)))?;

        Ok(Snapshot {
            families: self.families,
            replication: self.replication,
            liveness: self.liveness,
            produced_at: Utc::now(),
            exposition,
        })
    }
}

/// Render into a private registry so nothing leaks into the global one.
///
/// `Registry::gather` drops families without samples, so a check no host
/// reported has no HELP/TYPE lines here. It still has its [`StatusFamily`]
/// on the snapshot.
fn render(
    families: &[StatusFamily],
    replication: &[ReplicationEdge],
    liveness: &[LivenessSample],
) -> Result<Bytes> {
    let registry = Registry::new();

    for family in families {
        let gauge = gauge_vec(family.definition.key.as_str(), family.definition.help, &["host"])?;
        let mut seen = HashSet::new();
        for (host, value) in &family.samples {
            if seen.insert(host.as_str()) {
                gauge.with_label_values(&[host.as_str()]).set(*value as f64);
            }
        }
        registry.register(Box::new(gauge))?;
    }

    let replication_gauge = gauge_vec(
        REPLICATION_STATUS,
        REPLICATION_STATUS_HELP,
        &["source", "target"],
    )?;
    for edge in replication {
        replication_gauge
            .with_label_values(&[edge.source.as_str(), edge.target.as_str()])
            .set(edge.status.value() as f64);
    }
    registry.register(Box::new(replication_gauge))?;

    let up = gauge_vec(UP, UP_HELP, &["host"])?;
    let duration = gauge_vec(SCRAPE_DURATION, SCRAPE_DURATION_HELP, &["host"])?;
    let mut seen = HashSet::new();
    for sample in liveness {
        let host = sample.host.as_str();
        if !seen.insert(host) {
            continue;
        }
        up.with_label_values(&[host])
            .set(if sample.up { 1.0 } else { 0.0 });
        duration
            .with_label_values(&[host])
            .set(sample.duration.as_secs_f64());
    }
    registry.register(Box::new(up))?;
    registry.register(Box::new(duration))?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(Bytes::from(buffer))
}

fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    Ok(GaugeVec::new(
        Opts::new(name, help).namespace(NAMESPACE),
        labels,
    )?)
}

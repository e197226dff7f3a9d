//! Snapshot Cache
//!
//! Serves the latest [`Snapshot`] to concurrent scrape requests and refreshes
//! it lazily once it is older than the TTL.
//!
//! # Locking
//!
//! - Fresh reads take a short `parking_lot` read lock, clone the `Arc` and
//!   return. They never wait on each other.
//! - A stale read takes the async refresh mutex, re-checks staleness and only
//!   then starts a pass. Readers queued behind it find the new snapshot on the
//!   re-check, so at most one aggregation pass runs at a time.
//! - The pass runs on its own task, which owns the refresh lock and stores
//!   the result. A reader that goes away mid-pass does not cancel it.
//! - The snapshot is swapped in whole after the pass; nobody observes a
//!   partially built one.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn, Instrument};

use super::aggregator::Aggregate;
use super::snapshot::Snapshot;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Arc<Snapshot>,
    refreshed_at: Instant,
}

/// State shared with in-flight refresh tasks.
struct Shared<A> {
    aggregator: A,
    current: RwLock<Option<CacheEntry>>,
}

impl<A: Aggregate> Shared<A> {
    async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let snapshot = Arc::new(self.aggregator.aggregate().await?);
        *self.current.write() = Some(CacheEntry {
            snapshot: snapshot.clone(),
            refreshed_at: Instant::now(),
        });
        Ok(snapshot)
    }
}

/// TTL cache with single-flight refresh.
pub struct SnapshotCache<A> {
    shared: Arc<Shared<A>>,
    ttl: Duration,
    refresh: Arc<Mutex<()>>,
}

impl<A: Aggregate + 'static> SnapshotCache<A> {
    pub fn new(aggregator: A, ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                aggregator,
                current: RwLock::new(None),
            }),
            ttl,
            refresh: Arc::new(Mutex::new(())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn aggregator(&self) -> &A {
        &self.shared.aggregator
    }

    /// The held snapshot, fresh or not, without refreshing.
    pub fn peek(&self) -> Option<Arc<Snapshot>> {
        self.shared
            .current
            .read()
            .as_ref()
            .map(|e| e.snapshot.clone())
    }

    /// Return the current snapshot, aggregating a new one first if it is
    /// missing or older than the TTL.
    ///
    /// When aggregation fails the previous snapshot is served again; the
    /// error only surfaces when there is nothing to fall back to.
    #[instrument(skip(self))]
    pub async fn get(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.fresh() {
            debug!("Snapshot cache hit");
            return Ok(snapshot);
        }

        let guard = self.refresh.clone().lock_owned().await;

        // Another reader may have refreshed while we waited.
        if let Some(snapshot) = self.fresh() {
            debug!("Snapshot refreshed by a concurrent request");
            return Ok(snapshot);
        }

        debug!("Snapshot stale or missing, aggregating");
        let shared = self.shared.clone();
        let pass = tokio::spawn(
            async move {
                let _guard = guard;
                shared.refresh().await
            }
            .in_current_span(),
        );

        let result = match pass.await {
            Ok(result) => result,
            Err(e) => Err(Error::Aggregation(format!("aggregation task failed: {}", e))),
        };

        match result {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match self.peek() {
                Some(stale) => {
                    warn!("Aggregation failed, serving stale snapshot: {}", e);
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    fn fresh(&self) -> Option<Arc<Snapshot>> {
        self.shared
            .current
            .read()
            .as_ref()
            .filter(|e| e.refreshed_at.elapsed() < self.ttl)
            .map(|e| e.snapshot.clone())
    }
}

impl<A> std::fmt::Debug for SnapshotCache<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("ttl", &self.ttl)
            .field("populated", &self.shared.current.read().is_some())
            .finish()
    }
}

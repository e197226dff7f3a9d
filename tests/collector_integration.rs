//! Collector Integration Tests
//!
//! Drives the full collector (cache → aggregator → scraper → normalizer)
//! against scripted in-memory hosts.

use std::sync::Arc;
use std::time::Duration;

use ipa_exporter::adapters::{HostFixture, InMemoryProbe};
use ipa_exporter::domain::checks::{ANONYMOUS_BIND, HBAC_RULES, MS_ADTRUST, USERS};
use ipa_exporter::domain::CHECKS;
use ipa_exporter::{build_cache, Credentials, ExporterConfig, HostAggregator, SnapshotCache};

fn config(hosts: &[&str]) -> ExporterConfig {
    ExporterConfig::new(
        hosts.iter().map(|h| h.to_string()).collect(),
        Credentials::new("example.com", "cn=Directory Manager", "secret"),
    )
}

fn exposition(cache_snapshot: &ipa_exporter::Snapshot) -> String {
    String::from_utf8(cache_snapshot.exposition().to_vec()).unwrap()
}

// =============================================================================
// End-to-end scenario
// =============================================================================

mod end_to_end {
    use super::*;

    fn two_hosts() -> (InMemoryProbe, SnapshotCache<HostAggregator>) {
        let probe = InMemoryProbe::new()
            .with_host(
                "ipa1.example.com",
                HostFixture::new("ipa1")
                    .attribute(USERS, 42i64)
                    .attribute(ANONYMOUS_BIND, "ON")
                    .replication("ipa2 0"),
            )
            .with_host("ipa2.example.com", HostFixture::unreachable());

        let cache = build_cache(
            &config(&["ipa1.example.com", "ipa2.example.com"]),
            Arc::new(probe.clone()),
        );
        (probe, cache)
    }

    #[tokio::test]
    async fn test_snapshot_contents() {
        let (_, cache) = two_hosts();
        let snapshot = cache.get().await.unwrap();

        assert_eq!(snapshot.sample(USERS, "ipa1"), Some(42));
        assert_eq!(snapshot.sample(ANONYMOUS_BIND, "ipa1"), Some(1));
        assert_eq!(snapshot.is_up("ipa1"), Some(true));
        assert_eq!(snapshot.is_up("ipa2"), Some(false));
        assert_eq!(snapshot.replication_status("ipa1", "ipa2"), Some(0));
        assert_eq!(snapshot.sample(USERS, "ipa2"), None);
        assert_eq!(snapshot.scrape_duration("ipa2"), Some(Duration::ZERO));

        // every check has a family even when no host reported it
        assert_eq!(snapshot.families().len(), CHECKS.len());
        assert!(snapshot.family(HBAC_RULES).unwrap().samples.is_empty());
    }

    #[tokio::test]
    async fn test_exposition_lines() {
        let (_, cache) = two_hosts();
        let text = exposition(&cache.get().await.unwrap());

        assert!(text.contains("ipa_users{host=\"ipa1\"} 42"));
        assert!(text.contains("ipa_bind{host=\"ipa1\"} 1"));
        assert!(text.contains("ipa_up{host=\"ipa1\"} 1"));
        assert!(text.contains("ipa_up{host=\"ipa2\"} 0"));
        assert!(text.contains("ipa_replication_status{source=\"ipa1\",target=\"ipa2\"} 0"));
        assert!(text.contains("ipa_scrape_duration_seconds{host=\"ipa2\"} 0"));
        assert!(!text.contains("ipa_users{host=\"ipa2\"}"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_not_queried() {
        let (probe, cache) = two_hosts();
        cache.get().await.unwrap();

        assert_eq!(probe.connections("ipa2.example.com"), 1);
        assert_eq!(probe.attribute_calls("ipa2.example.com"), 0);
        assert_eq!(probe.attribute_calls("ipa1.example.com"), CHECKS.len());
    }
}

// =============================================================================
// Failure isolation
// =============================================================================

mod isolation {
    use super::*;

    #[tokio::test]
    async fn test_partial_failure_does_not_affect_other_hosts() {
        let probe = InMemoryProbe::new()
            .with_host(
                "ipa1.example.com",
                HostFixture::new("ipa1")
                    .attribute(USERS, 10i64)
                    .attribute(ANONYMOUS_BIND, "ROOTDSE")
                    .attribute(MS_ADTRUST, true),
            )
            .with_host(
                "ipa2.example.com",
                HostFixture::new("ipa2")
                    .attribute(USERS, 11i64)
                    .attribute(ANONYMOUS_BIND, "off")
                    .attribute(MS_ADTRUST, false)
                    .replication("ipa1 18\nipa3 1"),
            );

        let cache = build_cache(
            &config(&["ipa1.example.com", "ipa2.example.com"]),
            Arc::new(probe),
        );
        let snapshot = cache.get().await.unwrap();

        // ipa1 kept what it had before the bad value, but is down
        assert_eq!(snapshot.is_up("ipa1"), Some(false));
        assert_eq!(snapshot.sample(USERS, "ipa1"), Some(10));
        assert_eq!(snapshot.sample(ANONYMOUS_BIND, "ipa1"), None);
        assert_eq!(snapshot.sample(MS_ADTRUST, "ipa1"), None);

        assert_eq!(snapshot.is_up("ipa2"), Some(true));
        assert_eq!(snapshot.sample(USERS, "ipa2"), Some(11));
        assert_eq!(snapshot.sample(ANONYMOUS_BIND, "ipa2"), Some(0));
        assert_eq!(snapshot.sample(MS_ADTRUST, "ipa2"), Some(0));
        assert_eq!(snapshot.replication_status("ipa2", "ipa1"), Some(0));
        assert_eq!(snapshot.replication_status("ipa2", "ipa3"), Some(1));
    }

    #[tokio::test]
    async fn test_all_hosts_down_still_yields_snapshot() {
        let probe = InMemoryProbe::new();
        let cache = build_cache(
            &config(&["ipa1.example.com", "ipa2.example.com"]),
            Arc::new(probe),
        );

        let snapshot = cache.get().await.unwrap();
        assert_eq!(snapshot.is_up("ipa1"), Some(false));
        assert_eq!(snapshot.is_up("ipa2"), Some(false));
        assert!(snapshot.families().iter().all(|f| f.samples.is_empty()));
    }
}

// =============================================================================
// Cache behaviour
// =============================================================================

mod caching {
    use super::*;

    fn probe() -> InMemoryProbe {
        InMemoryProbe::new().with_host(
            "ipa1.example.com",
            HostFixture::new("ipa1").attribute(USERS, 1i64),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_window() {
        let probe = probe();
        let cache = build_cache(&config(&["ipa1.example.com"]), Arc::new(probe.clone()));

        let first = cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = cache.get().await.unwrap();
        assert_eq!(first.produced_at(), second.produced_at());
        assert_eq!(probe.connections("ipa1.example.com"), 1);

        // values changed on the server only show up after the TTL
        probe.set_host(
            "ipa1.example.com",
            HostFixture::new("ipa1").attribute(USERS, 2i64),
        );
        assert_eq!(cache.get().await.unwrap().sample(USERS, "ipa1"), Some(1));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get().await.unwrap().sample(USERS, "ipa1"), Some(2));
        assert_eq!(probe.connections("ipa1.example.com"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_readers_share_one_pass() {
        let probe = probe();
        let cache = Arc::new(build_cache(
            &config(&["ipa1.example.com"]),
            Arc::new(probe.clone()),
        ));

        let readers: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get().await.unwrap() })
            })
            .collect();
        let mut snapshots = Vec::new();
        for reader in readers {
            snapshots.push(reader.await.unwrap());
        }

        assert_eq!(probe.connections("ipa1.example.com"), 1);
        assert!(snapshots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_scraping_keeps_host_order() {
        let probe = InMemoryProbe::new()
            .with_host("a.example.com", HostFixture::new("a"))
            .with_host("b.example.com", HostFixture::new("b"))
            .with_host("c.example.com", HostFixture::new("c"));
        let mut cfg = config(&["c.example.com", "a.example.com", "b.example.com"]);
        cfg.scrape_concurrency = 3;

        let cache = build_cache(&cfg, Arc::new(probe));
        let snapshot = cache.get().await.unwrap();
        let order: Vec<_> = snapshot
            .liveness()
            .iter()
            .map(|l| l.host.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}

//! Replication pair parsing
//!
//! A host reports its replication agreements as newline-separated
//! `"<target> <status>"` lines. Each well-formed line becomes one edge of the
//! cross-host replication graph.

use crate::domain::HostName;

/// Status codes that count as a healthy agreement.
///
/// 18 is "Replication update in progress" on 389-DS.
pub const HEALTHY_STATUS_CODES: &[&str] = &["0", "18"];

/// Binarized replication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationStatus {
    Healthy,
    Error,
}

impl ReplicationStatus {
    pub fn from_code(code: &str) -> Self {
        if HEALTHY_STATUS_CODES.contains(&code) {
            ReplicationStatus::Healthy
        } else {
            ReplicationStatus::Error
        }
    }

    /// Gauge value: 0 = healthy, 1 = error.
    pub fn value(self) -> i64 {
        match self {
            ReplicationStatus::Healthy => 0,
            ReplicationStatus::Error => 1,
        }
    }
}

/// One directed replication agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationEdge {
    pub source: HostName,
    pub target: HostName,
    pub status: ReplicationStatus,
}

/// Parse replication pairs reported by `source`.
///
/// Lines that do not split into exactly two whitespace-separated tokens are
/// ignored.
pub fn parse_replication_pairs(source: &HostName, text: &str) -> Vec<ReplicationEdge> {
    text.lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(target), Some(code), None) => Some(ReplicationEdge {
                    source: source.clone(),
                    target: HostName::from(target),
                    status: ReplicationStatus::from_code(code),
                }),
                _ => None,
            }
        })
        .collect()
}

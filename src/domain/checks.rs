//! Fixed metric definitions
//!
//! The set of status checks is defined once and never mutated. Every check is
//! exported as a gauge family `ipa_<key>` labeled by host.

use super::ports::MetricKey;

/// Namespace prefixed to every exported family.
pub const NAMESPACE: &str = "ipa";

/// A status check: its key and the help text of the exported family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    pub key: MetricKey,
    pub help: &'static str,
}

impl MetricDefinition {
    pub const fn new(key: &'static str, help: &'static str) -> Self {
        Self {
            key: MetricKey(key),
            help,
        }
    }
}

pub const USERS: MetricKey = MetricKey("users");
pub const STAGE_USERS: MetricKey = MetricKey("susers");
pub const PRESERVED_USERS: MetricKey = MetricKey("pusers");
pub const HOSTS: MetricKey = MetricKey("hosts");
pub const SERVICES: MetricKey = MetricKey("services");
pub const USER_GROUPS: MetricKey = MetricKey("ugroups");
pub const HOST_GROUPS: MetricKey = MetricKey("hgroups");
pub const NETGROUPS: MetricKey = MetricKey("ngroups");
pub const HBAC_RULES: MetricKey = MetricKey("hbac");
pub const SUDO_RULES: MetricKey = MetricKey("sudo");
pub const DNS_ZONES: MetricKey = MetricKey("zones");
pub const CERTIFICATES: MetricKey = MetricKey("certs");
pub const LDAP_CONFLICTS: MetricKey = MetricKey("conflicts");
pub const GHOST_REPLICAS: MetricKey = MetricKey("ghosts");
pub const ANONYMOUS_BIND: MetricKey = MetricKey("bind");
pub const MS_ADTRUST: MetricKey = MetricKey("msdcs");

/// Status checks in export order.
pub const CHECKS: &[MetricDefinition] = &[
    MetricDefinition::new("users", "Active Users"),
    MetricDefinition::new("susers", "Stage Users"),
    MetricDefinition::new("pusers", "Preserved Users"),
    MetricDefinition::new("hosts", "Hosts"),
    MetricDefinition::new("services", "Services"),
    MetricDefinition::new("ugroups", "User Groups"),
    MetricDefinition::new("hgroups", "Host Groups"),
    MetricDefinition::new("ngroups", "Netgroups"),
    MetricDefinition::new("hbac", "HBAC Rules"),
    MetricDefinition::new("sudo", "SUDO Rules"),
    MetricDefinition::new("zones", "DNS Zones"),
    MetricDefinition::new("certs", "Certificates"),
    MetricDefinition::new("conflicts", "LDAP Conflicts"),
    MetricDefinition::new("ghosts", "Ghost Replicas"),
    MetricDefinition::new("bind", "Anonymous BIND (1=ON, 0=OFF)"),
    MetricDefinition::new("msdcs", "Microsoft ADTrust (1=True, 0=False)"),
];

pub const REPLICATION_STATUS: &str = "replication_status";
pub const REPLICATION_STATUS_HELP: &str = "Replication status (0=OK, 1=Error)";

pub const UP: &str = "up";
pub const UP_HELP: &str = "Was the last scrape of this FreeIPA instance successful";

pub const SCRAPE_DURATION: &str = "scrape_duration_seconds";
pub const SCRAPE_DURATION_HELP: &str = "Time taken to scrape metrics from FreeIPA";

//! Domain layer: probe ports and the fixed metric definitions.

pub mod checks;
pub mod ports;

pub use checks::{MetricDefinition, CHECKS, NAMESPACE};
pub use ports::{HostName, MetricKey, ProbeClient, ProbeSession, RawValue};

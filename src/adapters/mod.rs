//! Infrastructure Adapters
//!
//! Implementations of the probe ports in [`crate::domain::ports`].
//!
//! - [`LdapProbe`] queries FreeIPA's directory server over LDAPS.
//! - [`InMemoryProbe`] serves scripted [`HostFixture`]s, for tests.

mod in_memory;
mod ldap;

pub use in_memory::{HostFixture, InMemoryProbe};
pub use ldap::LdapProbe;

//! LDAP Probe Adapter
//!
//! Implements the `ProbeClient` port against the 389 Directory Server that
//! backs every FreeIPA replica. Each status check maps to one LDAP search.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchResult};
use tracing::{debug, instrument, warn};

use crate::config::Credentials;
use crate::domain::{MetricKey, ProbeClient, ProbeSession, RawValue};
use crate::error::{Error, Result};

/// LDAP result code for a missing search base.
const NO_SUCH_OBJECT: u32 = 32;

/// Request no attributes, only entries.
const NO_ATTRS: &[&str] = &["1.1"];

/// LDAP-based probe client.
#[derive(Debug, Clone)]
pub struct LdapProbe {
    timeout: Duration,
}

impl LdapProbe {
    /// Create a probe whose connect and per-search timeout is `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn unreachable(host: &str, reason: impl ToString) -> Error {
        Error::HostUnreachable {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ProbeClient for LdapProbe {
    #[instrument(skip(self, credentials))]
    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn ProbeSession>> {
        let url = format!("ldaps://{}", host);
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_no_tls_verify(true);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| Self::unreachable(host, e))?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });

        ldap.with_timeout(self.timeout)
            .simple_bind(&credentials.bind_dn, &credentials.bind_password)
            .await
            .and_then(|r| r.success())
            .map_err(|e| Self::unreachable(host, e))?;
        debug!("LDAP connection established to {}", url);

        let mut session = LdapSession {
            host: host.to_string(),
            short_name: credentials.short_hostname(host),
            fqdn: host.to_string(),
            base_dn: credentials.base_dn(),
            domain: credentials.domain.clone(),
            ldap,
            timeout: self.timeout,
        };

        if let Some(fqdn) = session.config_value("nsslapd-localhost").await? {
            session.short_name = credentials.short_hostname(&fqdn);
            session.fqdn = fqdn;
        }
        debug!(fqdn = %session.fqdn, short = %session.short_name, "Resolved server name");

        let context = session.config_value("nsslapd-defaultnamingcontext").await?;
        if context.as_deref() != Some(session.base_dn.as_str()) {
            session.close().await;
            return Err(Self::unreachable(
                host,
                format!(
                    "context mismatch: {} vs {}",
                    session.base_dn,
                    context.unwrap_or_default()
                ),
            ));
        }

        Ok(Box::new(session))
    }
}

// =============================================================================
// Session
// =============================================================================

struct LdapSession {
    host: String,
    short_name: String,
    fqdn: String,
    base_dn: String,
    domain: String,
    ldap: Ldap,
    timeout: Duration,
}

impl LdapSession {
    /// Run a search; `Ok(None)` when the base does not exist.
    async fn search(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Option<Vec<SearchEntry>>> {
        debug!(base, filter, ?attrs, "LDAP search");
        let mut ldap = self.ldap.clone();
        let SearchResult(entries, result) = ldap
            .with_timeout(self.timeout)
            .search(base, scope, filter, attrs.to_vec())
            .await
            .map_err(|e| self.probe_error(e))?;

        match result.rc {
            0 => Ok(Some(entries.into_iter().map(SearchEntry::construct).collect())),
            NO_SUCH_OBJECT => Ok(None),
            rc => Err(self.probe_error(format!(
                "search of {} failed with rc={}: {}",
                base, rc, result.text
            ))),
        }
    }

    /// Number of entries matched; `None` when the base does not exist.
    async fn count(&self, base: &str, scope: Scope, filter: &str) -> Result<Option<usize>> {
        Ok(self.search(base, scope, filter, NO_ATTRS).await?.map(|e| e.len()))
    }

    /// First value of `attr` on the entry at `base`.
    async fn base_value(&self, base: &str, attr: &str) -> Result<Option<String>> {
        let entries = self
            .search(base, Scope::Base, "(objectClass=*)", &[attr])
            .await?;
        Ok(entries
            .and_then(|e| e.into_iter().next())
            .and_then(|entry| first_value(&entry, attr)))
    }

    async fn config_value(&self, attr: &str) -> Result<Option<String>> {
        self.base_value("cn=config", attr).await
    }

    /// Count that falls back to zero when the container is missing.
    async fn count_or_zero(&self, base: &str, scope: Scope, filter: &str) -> Result<RawValue> {
        Ok(RawValue::from(self.count(base, scope, filter).await?.unwrap_or(0)))
    }

    /// Count that treats a missing container as a probe failure.
    async fn count_required(&self, base: &str, scope: Scope, filter: &str) -> Result<RawValue> {
        self.count(base, scope, filter)
            .await?
            .map(RawValue::from)
            .ok_or_else(|| self.probe_error(format!("{} not found", base)))
    }

    async fn subordinates(&self, base: &str) -> Result<Option<String>> {
        self.base_value(base, "numSubordinates").await
    }

    async fn user_count(&self, container: &str) -> Result<RawValue> {
        let base = format!("{},{}", container, self.base_dn);
        Ok(match self.subordinates(&base).await? {
            Some(n) => RawValue::Text(n),
            None => RawValue::from(0usize),
        })
    }

    async fn ghost_replicas(&self) -> Result<RawValue> {
        let attr = "nscpentrywsi";
        let entries = self
            .search(
                &self.base_dn,
                Scope::Subtree,
                "(&(objectclass=nstombstone)(nsUniqueId=ffffffff-ffffffff-ffffffff-ffffffff))",
                &[attr],
            )
            .await?
            .unwrap_or_default();

        let ghosts = entries
            .first()
            .map(|entry| {
                values(entry, attr)
                    .iter()
                    .filter(|v| v.contains("replica ") && !v.contains("ldap"))
                    .count()
            })
            .unwrap_or(0);
        Ok(RawValue::from(ghosts))
    }

    async fn anonymous_bind(&self) -> Result<RawValue> {
        let state = self
            .config_value("nsslapd-allow-anonymous-access")
            .await?
            .ok_or_else(|| self.probe_error("nsslapd-allow-anonymous-access not set"))?;
        Ok(RawValue::Text(anonymous_bind_state(&state)))
    }

    /// Whether the AD trust Kerberos SRV record lists this server.
    async fn ms_adtrust(&self) -> Result<RawValue> {
        let base = format!(
            "idnsname=_kerberos._tcp.Default-First-Site-Name._sites.dc._msdcs,idnsname={}.,cn=dns,{}",
            self.domain, self.base_dn
        );
        let attr = "sRVRecord";
        let listed = self
            .search(&base, Scope::Base, "(objectClass=*)", &[attr])
            .await?
            .unwrap_or_default()
            .iter()
            .any(|entry| values(entry, attr).iter().any(|v| v.contains(&self.fqdn)));
        Ok(RawValue::Flag(listed))
    }

    fn probe_error(&self, reason: impl ToString) -> Error {
        Error::Probe {
            host: self.host.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ProbeSession for LdapSession {
    fn short_name(&self) -> &str {
        &self.short_name
    }

    async fn attribute(&self, key: MetricKey) -> Result<Option<RawValue>> {
        let base = &self.base_dn;
        let value = match key.as_str() {
            "users" => self.user_count("cn=users,cn=accounts").await?,
            "susers" => {
                self.user_count("cn=staged users,cn=accounts,cn=provisioning")
                    .await?
            }
            "pusers" => {
                self.user_count("cn=deleted users,cn=accounts,cn=provisioning")
                    .await?
            }
            "hosts" => {
                self.count_or_zero(
                    &format!("cn=computers,cn=accounts,{}", base),
                    Scope::Subtree,
                    "(fqdn=*)",
                )
                .await?
            }
            "services" => {
                self.count_or_zero(
                    &format!("cn=services,cn=accounts,{}", base),
                    Scope::Subtree,
                    "(krbprincipalname=*)",
                )
                .await?
            }
            "ugroups" => {
                self.count_or_zero(
                    &format!("cn=groups,cn=accounts,{}", base),
                    Scope::Subtree,
                    "(objectClass=ipausergroup)",
                )
                .await?
            }
            "hgroups" => {
                let container = format!("cn=hostgroups,cn=accounts,{}", base);
                let n = self
                    .subordinates(&container)
                    .await?
                    .ok_or_else(|| self.probe_error(format!("{} not found", container)))?;
                RawValue::Text(n)
            }
            "ngroups" => {
                self.count_or_zero(
                    &format!("cn=ng,cn=alt,{}", base),
                    Scope::OneLevel,
                    "(ipaUniqueID=*)",
                )
                .await?
            }
            "hbac" => {
                self.count_required(&format!("cn=hbac,{}", base), Scope::OneLevel, "(ipaUniqueID=*)")
                    .await?
            }
            "sudo" => {
                self.count_required(
                    &format!("cn=sudorules,cn=sudo,{}", base),
                    Scope::OneLevel,
                    "(ipaUniqueID=*)",
                )
                .await?
            }
            "zones" => {
                self.count_or_zero(
                    &format!("cn=dns,{}", base),
                    Scope::OneLevel,
                    "(|(objectClass=idnszone)(objectClass=idnsforwardzone))",
                )
                .await?
            }
            "certs" => {
                self.count_or_zero(
                    "ou=certificateRepository,ou=ca,o=ipaca",
                    Scope::OneLevel,
                    "(certStatus=*)",
                )
                .await?
            }
            "conflicts" => {
                self.count_or_zero(
                    base,
                    Scope::Subtree,
                    "(|(nsds5ReplConflict=*)(&(objectclass=ldapsubentry)(nsds5ReplConflict=*)))",
                )
                .await?
            }
            "ghosts" => self.ghost_replicas().await?,
            "bind" => self.anonymous_bind().await?,
            "msdcs" => self.ms_adtrust().await?,
            _ => return Ok(None),
        };
        debug!(key = %key, ?value, "Fetched attribute");
        Ok(Some(value))
    }

    async fn replication_pairs(&self) -> Result<String> {
        let suffix = self.base_dn.replace('=', "\\3D").replace(',', "\\2C");
        let base = format!("cn=replica,cn={},cn=mapping tree,cn=config", suffix);
        let host_attr = "nsDS5ReplicaHost";
        let status_attr = "nsds5replicaLastUpdateStatus";

        let entries = self
            .search(
                &base,
                Scope::OneLevel,
                "(objectClass=*)",
                &[host_attr, status_attr],
            )
            .await?
            .unwrap_or_default();

        let domain_suffix = format!(".{}", self.domain);
        let lines: Vec<String> = entries
            .iter()
            .filter_map(|entry| {
                let target = first_value(entry, host_attr)?;
                let status = first_value(entry, status_attr)?;
                Some(format!(
                    "{} {}",
                    target.replace(&domain_suffix, ""),
                    agreement_status_code(&status)
                ))
            })
            .collect();
        Ok(lines.join("\n"))
    }

    async fn close(&self) {
        let mut ldap = self.ldap.clone();
        if let Err(e) = ldap.unbind().await {
            debug!("LDAP unbind from {} failed: {}", self.host, e);
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Values of `attr`, matching the attribute name case-insensitively.
fn values<'a>(entry: &'a SearchEntry, attr: &str) -> &'a [String] {
    entry
        .attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attr))
        .map(|(_, v)| v.as_slice())
        .unwrap_or(&[])
}

fn first_value(entry: &SearchEntry, attr: &str) -> Option<String> {
    values(entry, attr).first().cloned()
}

/// `on`/`off`/`rootdse` uppercased, anything else `ERROR`.
fn anonymous_bind_state(raw: &str) -> String {
    match raw {
        "on" | "off" | "rootdse" => raw.to_uppercase(),
        _ => "ERROR".to_string(),
    }
}

/// Extract the numeric code from `nsds5replicaLastUpdateStatus`.
///
/// `"Error (0) Replica acquired successfully: ..."` -> `"0"`,
/// `"0 Replica acquired successfully"` -> `"0"`.
fn agreement_status_code(status: &str) -> String {
    let stripped = status.replace("Error ", "");
    let first = stripped.split(' ').next().unwrap_or_default();
    first.trim_matches(|c| c == '(' || c == ')').to_string()
}

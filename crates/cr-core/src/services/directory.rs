use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry, SearchResult};

use crate::error::{Result, RotationError};
use crate::models::{DirectoryAck, DirectoryLayout, OwnershipRecord, RotationConfig};

const DEFAULT_LDAPS_PORT: u16 = 1636;
const RC_NO_SUCH_OBJECT: u32 = 32;

/// Access to the singleton ownership record. Implementations never create
/// or delete the entry.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    async fn read(&self, identifier: &str) -> Result<OwnershipRecord>;

    /// Replace the owner address. A non-zero [`DirectoryAck`] is the server
    /// refusing the change and is returned, not raised.
    async fn update_owner(&self, identifier: &str, new_address: &str) -> Result<DirectoryAck>;

    /// Replace the tracked cache-refresh configuration value.
    async fn update_config(&self, identifier: &str, value: &str) -> Result<DirectoryAck>;
}

pub struct LdapOwnershipStore {
    url: String,
    bind_dn: String,
    bind_password: String,
    layout: DirectoryLayout,
    call_timeout: Duration,
    skip_tls_verify: bool,
}

impl LdapOwnershipStore {
    pub fn new(config: &RotationConfig) -> Self {
        Self {
            url: normalize_ldap_url(&config.ldap_url),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_password.clone(),
            layout: config.directory.clone(),
            call_timeout: config.call_timeout(),
            skip_tls_verify: config.ldap_skip_tls_verify,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a bound connection, run `op`, then unbind.
    async fn with_session<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Ldap) -> Fut + Send,
        Fut: Future<Output = Result<(Ldap, T)>> + Send,
        T: Send,
    {
        let session = async {
            let settings = LdapConnSettings::new()
                .set_conn_timeout(self.call_timeout)
                .set_no_tls_verify(self.skip_tls_verify);
            let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.url)
                .await
                .map_err(unavailable("connect"))?;
            tokio::spawn(async move {
                if let Err(e) = conn.drive().await {
                    tracing::warn!(error = %e, "ldap connection error");
                }
            });

            ldap.simple_bind(&self.bind_dn, &self.bind_password)
                .await
                .and_then(|r| r.success())
                .map_err(unavailable("bind"))?;

            let (mut ldap, value) = op(ldap).await?;
            if let Err(e) = ldap.unbind().await {
                tracing::debug!(error = %e, "ldap unbind failed");
            }
            Ok(value)
        };

        tokio::time::timeout(self.call_timeout, session)
            .await
            .map_err(|_| {
                RotationError::DirectoryUnavailable(format!(
                    "{} did not answer within {:?}",
                    self.url, self.call_timeout
                ))
            })?
    }

    async fn replace(&self, identifier: &str, attribute: &str, value: &str) -> Result<DirectoryAck> {
        let dn = self.layout.entry_dn(identifier);
        let attribute = attribute.to_string();
        let value = value.to_string();
        self.with_session(|mut ldap| async move {
            let mods = vec![Mod::Replace(attribute.as_str(), HashSet::from([value.as_str()]))];
            let result = ldap.modify(&dn, mods).await.map_err(unavailable("modify"))?;
            let ack = DirectoryAck {
                code: result.rc,
                message: result.text,
            };
            Ok((ldap, ack))
        })
        .await
    }
}

#[async_trait]
impl OwnershipStore for LdapOwnershipStore {
    async fn read(&self, identifier: &str) -> Result<OwnershipRecord> {
        let dn = self.layout.entry_dn(identifier);
        let filter = self.layout.search_filter();
        let layout = &self.layout;
        let mut attributes = vec![
            layout.owner_attribute.as_str(),
            layout.enabled_attribute.as_str(),
        ];
        if let Some(config_attribute) = layout.config_attribute.as_deref() {
            attributes.push(config_attribute);
        }

        let entry = self
            .with_session(|mut ldap| async move {
                let SearchResult(entries, result) = ldap
                    .search(&dn, Scope::Base, &filter, attributes)
                    .await
                    .map_err(unavailable("search"))?;
                let entry = entries.into_iter().next().map(SearchEntry::construct);
                let entry = search_outcome(dn, result.rc, result.text, entry)?;
                Ok((ldap, entry))
            })
            .await?;

        Ok(record_from_entry(&entry, layout))
    }

    async fn update_owner(&self, identifier: &str, new_address: &str) -> Result<DirectoryAck> {
        self.replace(identifier, &self.layout.owner_attribute, new_address)
            .await
    }

    async fn update_config(&self, identifier: &str, value: &str) -> Result<DirectoryAck> {
        let attribute = self.layout.config_attribute.as_deref().ok_or_else(|| {
            RotationError::InvalidConfig("no config attribute is tracked".into())
        })?;
        self.replace(identifier, attribute, value).await
    }
}

fn unavailable(operation: &'static str) -> impl Fn(LdapError) -> RotationError {
    move |e| RotationError::DirectoryUnavailable(format!("ldap {operation} failed: {e}"))
}

/// Map a base-scope search answer onto the record it should hold.
fn search_outcome(
    dn: String,
    rc: u32,
    text: String,
    entry: Option<SearchEntry>,
) -> Result<SearchEntry> {
    match rc {
        0 => entry.ok_or(RotationError::RecordNotFound(dn)),
        RC_NO_SUCH_OBJECT => Err(RotationError::RecordNotFound(dn)),
        code => Err(RotationError::DirectoryRejected {
            code,
            message: text,
        }),
    }
}

fn first_value<'a>(entry: &'a SearchEntry, attribute: &str) -> Option<&'a str> {
    entry
        .attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

fn record_from_entry(entry: &SearchEntry, layout: &DirectoryLayout) -> OwnershipRecord {
    OwnershipRecord::from_attributes(
        first_value(entry, &layout.owner_attribute),
        first_value(entry, &layout.enabled_attribute),
        layout
            .config_attribute
            .as_deref()
            .and_then(|attribute| first_value(entry, attribute)),
    )
}

/// Accept `host`, `host:port`, `[v6]`, `[v6]:port`, a bare IPv6 literal or a
/// full `ldap(s)://` URL; bare forms are assumed to be LDAPS on port 1636.
pub fn normalize_ldap_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.starts_with("ldaps://") || raw.starts_with("ldap://") {
        return raw.to_string();
    }
    if let Some(rest) = raw.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((_, port)) if port.strip_prefix(':').is_some_and(is_port) => {
                format!("ldaps://{raw}")
            }
            _ => format!("ldaps://{raw}:{DEFAULT_LDAPS_PORT}"),
        };
    }
    match raw.split_once(':') {
        // Any further ':' makes this an unbracketed IPv6 literal
        Some((_, rest)) if rest.contains(':') => format!("ldaps://[{raw}]:{DEFAULT_LDAPS_PORT}"),
        Some((_, port)) if is_port(port) => format!("ldaps://{raw}"),
        _ => format!("ldaps://{raw}:{DEFAULT_LDAPS_PORT}"),
    }
}

fn is_port(value: &str) -> bool {
    value.parse::<u16>().is_ok()
}

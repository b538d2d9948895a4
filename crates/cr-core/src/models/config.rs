use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60 * 60;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LDAP_URL: &str = "localhost:1636";
pub const DEFAULT_LABEL_SELECTOR: &str = "APP_NAME=oxtrust";
pub const DEFAULT_SNAPSHOT_DIR: &str = "/var/ox/identity/cr-snapshots";

#[derive(Debug, Clone, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_ldap_url")]
    pub ldap_url: String,
    #[serde(default)]
    pub bind_dn: String,
    #[serde(default)]
    pub bind_password: String,
    /// Accept the directory's certificate without verification. Stock
    /// deployments serve a self-signed certificate on 1636.
    #[serde(default)]
    pub ldap_skip_tls_verify: bool,
    #[serde(default)]
    pub appliance_inum: String,
    #[serde(default = "default_label_selector")]
    pub label_selector: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    /// `user:group` for the snapshot directory. Unset skips the chown step.
    #[serde(default)]
    pub snapshot_owner: Option<String>,
    #[serde(default)]
    pub directory: DirectoryLayout,
}

impl RotationConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            ldap_url: DEFAULT_LDAP_URL.to_string(),
            bind_dn: String::new(),
            bind_password: String::new(),
            ldap_skip_tls_verify: false,
            appliance_inum: String::new(),
            label_selector: DEFAULT_LABEL_SELECTOR.to_string(),
            snapshot_dir: DEFAULT_SNAPSHOT_DIR.to_string(),
            snapshot_owner: None,
            directory: DirectoryLayout::default(),
        }
    }
}

/// Where the ownership record lives in the directory tree and which
/// attributes hold its fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DirectoryLayout {
    pub base_suffix: String,
    pub object_class: String,
    pub owner_attribute: String,
    pub enabled_attribute: String,
    pub config_attribute: Option<String>,
}

impl DirectoryLayout {
    pub fn entry_dn(&self, inum: &str) -> String {
        format!("inum={inum},{}", self.base_suffix)
    }

    pub fn search_filter(&self) -> String {
        format!("(objectclass={})", self.object_class)
    }
}

impl Default for DirectoryLayout {
    fn default() -> Self {
        Self {
            base_suffix: "ou=appliances,o=gluu".into(),
            object_class: "gluuAppliance".into(),
            owner_attribute: "oxTrustCacheRefreshServerIpAddress".into(),
            enabled_attribute: "gluuVdsCacheRefreshEnabled".into(),
            config_attribute: None,
        }
    }
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_call_timeout() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

fn default_ldap_url() -> String {
    DEFAULT_LDAP_URL.to_string()
}

fn default_label_selector() -> String {
    DEFAULT_LABEL_SELECTOR.to_string()
}

fn default_snapshot_dir() -> String {
    DEFAULT_SNAPSHOT_DIR.to_string()
}

use std::path::Path;

use crate::error::{Result, RotationError};
use crate::models::config::DEFAULT_CHECK_INTERVAL_SECS;
use crate::models::RotationConfig;

pub const CONFIG_PATH_ENV: &str = "GLUU_CR_ROTATE_CONFIG";

/// Load the rotation config from an optional YAML file, then apply
/// environment overrides from the process environment.
pub fn load(config_path: Option<&Path>) -> Result<RotationConfig> {
    load_with_env(config_path, |key| std::env::var(key).ok())
}

pub fn load_with_env<F>(config_path: Option<&Path>, env: F) -> Result<RotationConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match config_path {
        Some(path) => {
            if !path.exists() {
                return Err(RotationError::ConfigNotFound(path.to_path_buf()));
            }
            let contents = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)
                .map_err(|e| RotationError::InvalidConfig(e.to_string()))?
        }
        None => RotationConfig::default(),
    };

    apply_env(&mut config, &env)?;
    validate(&config)?;
    Ok(config)
}

fn apply_env<F>(config: &mut RotationConfig, env: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = env("GLUU_CR_ROTATION_CHECK") {
        config.check_interval_secs = match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                tracing::warn!(
                    value = %raw,
                    "invalid GLUU_CR_ROTATION_CHECK; falling back to {DEFAULT_CHECK_INTERVAL_SECS}s"
                );
                DEFAULT_CHECK_INTERVAL_SECS
            }
        };
    }
    if let Some(url) = env("GLUU_LDAP_URL") {
        config.ldap_url = url;
    }
    if let Some(flag) = env("GLUU_LDAP_SKIP_TLS_VERIFY") {
        config.ldap_skip_tls_verify = matches!(
            flag.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        );
    }
    if let Some(dn) = env("GLUU_LDAP_BIND_DN") {
        config.bind_dn = dn;
    }
    if let Some(inum) = env("GLUU_APPLIANCE_INUM") {
        config.appliance_inum = inum;
    }
    if let Some(selector) = env("GLUU_CR_LABEL_SELECTOR") {
        config.label_selector = selector;
    }
    if let Some(password) = env("GLUU_LDAP_PASSWORD") {
        config.bind_password = password;
    } else if let Some(file) = env("GLUU_LDAP_PASSWORD_FILE") {
        let password = std::fs::read_to_string(&file).map_err(|e| {
            RotationError::InvalidConfig(format!("failed to read password file {file}: {e}"))
        })?;
        config.bind_password = password.trim_end_matches(['\r', '\n']).to_string();
    }
    Ok(())
}

fn validate(config: &RotationConfig) -> Result<()> {
    let required = [
        ("bind_dn", &config.bind_dn),
        ("bind_password", &config.bind_password),
        ("appliance_inum", &config.appliance_inum),
        ("ldap_url", &config.ldap_url),
        ("label_selector", &config.label_selector),
        ("snapshot_dir", &config.snapshot_dir),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(RotationError::InvalidConfig(format!(
                "{field} field is required"
            )));
        }
    }
    if config.check_interval_secs == 0 {
        return Err(RotationError::InvalidConfig(
            "check_interval_secs must be greater than zero".into(),
        ));
    }
    if config.call_timeout_secs == 0 {
        return Err(RotationError::InvalidConfig(
            "call_timeout_secs must be greater than zero".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GLUU_LDAP_BIND_DN", "cn=directory manager"),
            ("GLUU_LDAP_PASSWORD", "secret"),
            ("GLUU_APPLIANCE_INUM", "@!1234.0001"),
        ]
    }

    #[test]
    fn parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = r#"
check_interval_secs: 120
call_timeout_secs: 5
ldap_url: ldaps://ldap.gluu.svc:1636
bind_dn: cn=directory manager
bind_password: hunter2
appliance_inum: "@!1234.0001"
label_selector: APP_NAME=oxtrust,tier=web
snapshot_owner: jetty:jetty
directory:
  config_attribute: oxTrustCacheRefreshConfiguration
"#;
        let path = dir.path().join("cr-rotate.yaml");
        fs::write(&path, yaml).unwrap();
        let config = load_with_env(Some(&path), env_from(&[])).unwrap();
        assert_eq!(config.check_interval_secs, 120);
        assert_eq!(config.call_timeout_secs, 5);
        assert_eq!(config.ldap_url, "ldaps://ldap.gluu.svc:1636");
        assert_eq!(config.snapshot_owner.as_deref(), Some("jetty:jetty"));
        assert_eq!(
            config.directory.config_attribute.as_deref(),
            Some("oxTrustCacheRefreshConfiguration")
        );
        // Unspecified layout fields keep their defaults
        assert_eq!(config.directory.owner_attribute, "oxTrustCacheRefreshServerIpAddress");
    }

    #[test]
    fn env_only_config_uses_defaults() {
        let config = load_with_env(None, env_from(&required_env())).unwrap();
        assert_eq!(config.check_interval_secs, 3600);
        assert_eq!(config.ldap_url, "localhost:1636");
        assert_eq!(config.label_selector, "APP_NAME=oxtrust");
        assert_eq!(config.snapshot_dir, "/var/ox/identity/cr-snapshots");
        assert!(config.snapshot_owner.is_none());
        assert!(!config.ldap_skip_tls_verify);
    }

    #[test]
    fn skip_tls_verify_from_env() {
        let mut env = required_env();
        env.push(("GLUU_LDAP_SKIP_TLS_VERIFY", "True"));
        let config = load_with_env(None, env_from(&env)).unwrap();
        assert!(config.ldap_skip_tls_verify);
    }

    #[test]
    fn invalid_interval_falls_back_to_one_hour() {
        let mut env = required_env();
        env.push(("GLUU_CR_ROTATION_CHECK", "soon"));
        let config = load_with_env(None, env_from(&env)).unwrap();
        assert_eq!(config.check_interval_secs, 3600);

        let mut env = required_env();
        env.push(("GLUU_CR_ROTATION_CHECK", "90"));
        let config = load_with_env(None, env_from(&env)).unwrap();
        assert_eq!(config.check_interval_secs, 90);
    }

    #[test]
    fn password_file_is_read_and_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("ldap-password");
        fs::write(&secret, "s3cret\n").unwrap();
        let secret_path = secret.to_string_lossy().to_string();
        let env = env_from(&[
            ("GLUU_LDAP_BIND_DN", "cn=directory manager"),
            ("GLUU_APPLIANCE_INUM", "@!1234.0001"),
            ("GLUU_LDAP_PASSWORD_FILE", secret_path.as_str()),
        ]);
        let config = load_with_env(None, env).unwrap();
        assert_eq!(config.bind_password, "s3cret");
    }

    #[test]
    fn missing_required_field_is_invalid() {
        let result = load_with_env(None, env_from(&[("GLUU_LDAP_PASSWORD", "x")]));
        assert!(matches!(result, Err(RotationError::InvalidConfig(_))));
    }

    #[test]
    fn missing_config_file_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(matches!(
            load_with_env(Some(&path), env_from(&required_env())),
            Err(RotationError::ConfigNotFound(_))
        ));
    }
}

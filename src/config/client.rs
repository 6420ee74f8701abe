//! [`ClientConfig`]: the probe's merged configuration.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::defaults;

use super::ini;
use super::{coerce_bool, coerce_u64, ConfigError};

/// CLI-derived overrides for the probe, applied after defaults and the
/// (optional) config file.
#[derive(Debug, Default, Clone)]
pub struct ClientOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub timeout_unknown: Option<bool>,
    pub ssl_verify_server: Option<bool>,
    pub ssl_ca_file: Option<PathBuf>,
    pub ssl_cert_file: Option<PathBuf>,
    pub ssl_key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub timeout_unknown: bool,
    pub ssl_verify_server: bool,
    pub ssl_ca_file: Option<PathBuf>,
    pub ssl_cert_file: Option<PathBuf>,
    pub ssl_key_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: String::new(),
            port: defaults::CLIENT_PORT,
            timeout_secs: defaults::CLIENT_TIMEOUT_SECS,
            timeout_unknown: false,
            ssl_verify_server: defaults::CLIENT_SSL_VERIFY_SERVER,
            ssl_ca_file: None,
            ssl_cert_file: None,
            ssl_key_file: None,
        }
    }
}

impl ClientConfig {
    /// Load an optional config file (if `path` is `Some` and exists),
    /// merge built-in defaults, the file, then `overrides`.
    pub fn load(path: Option<&Path>, overrides: &ClientOverrides) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(path) = path {
            if path.exists() {
                let doc = ini::load(path)?;
                let file_name = path.display().to_string();
                let v = &doc.values;

                if let Some(raw) = v.get("host") {
                    cfg.host = raw.clone();
                }
                if let Some(raw) = v.get("port") {
                    let port: u32 = raw.parse().map_err(|_| ConfigError::InvalidPort {
                        file: file_name.clone(),
                        key: "port".to_string(),
                        value: raw.clone(),
                    })?;
                    cfg.port = port as u16;
                }
                if let Some(raw) = v.get("timeout") {
                    cfg.timeout_secs = coerce_u64(&file_name, "timeout", raw)?;
                }
                if let Some(raw) = v.get("timeout_unknown") {
                    cfg.timeout_unknown = coerce_bool(&file_name, "timeout_unknown", raw)?;
                }
                if let Some(raw) = v.get("ssl_verify_server") {
                    cfg.ssl_verify_server = coerce_bool(&file_name, "ssl_verify_server", raw)?;
                }
                if let Some(raw) = v.get("ssl_ca_file") {
                    cfg.ssl_ca_file = Some(PathBuf::from(raw));
                }
                if let Some(raw) = v.get("ssl_cert_file") {
                    cfg.ssl_cert_file = Some(PathBuf::from(raw));
                }
                if let Some(raw) = v.get("ssl_key_file") {
                    cfg.ssl_key_file = Some(PathBuf::from(raw));
                }
            }
        }

        if let Some(v) = &overrides.host {
            cfg.host = v.clone();
        }
        if let Some(v) = overrides.port {
            cfg.port = v;
        }
        if let Some(v) = overrides.timeout_secs {
            cfg.timeout_secs = v;
        }
        if let Some(v) = overrides.timeout_unknown {
            cfg.timeout_unknown = v;
        }
        if let Some(v) = overrides.ssl_verify_server {
            cfg.ssl_verify_server = v;
        }
        if let Some(v) = &overrides.ssl_ca_file {
            cfg.ssl_ca_file = Some(v.clone());
        }
        if let Some(v) = &overrides.ssl_cert_file {
            cfg.ssl_cert_file = Some(v.clone());
        }
        if let Some(v) = &overrides.ssl_key_file {
            cfg.ssl_key_file = Some(v.clone());
        }

        if cfg.host.is_empty() {
            return Err(ConfigError::Semantic("host is required (-H or config file)".into()));
        }
        if cfg.ssl_cert_file.is_some() != cfg.ssl_key_file.is_some() {
            return Err(ConfigError::IncompleteTlsMaterial);
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_required() {
        let err = ClientConfig::load(None, &ClientOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Semantic(_)));
    }

    #[test]
    fn cli_host_satisfies_requirement() {
        let overrides = ClientOverrides {
            host: Some("example.com".into()),
            ..Default::default()
        };
        let cfg = ClientConfig::load(None, &overrides).unwrap();
        assert_eq!(cfg.host, "example.com");
        assert_eq!(cfg.port, 59546);
    }
}

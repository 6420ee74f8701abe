//! Configuration loading: the INI-with-includes dialect, merged with
//! built-in defaults and command-line overrides into typed
//! [`ServerConfig`]/[`ClientConfig`] values.

mod client;
mod ini;
mod server;

pub use client::{ClientConfig, ClientOverrides};
pub use server::{ServerConfig, ServerOverrides};

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong loading or coercing a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: refusing to re-read already-included file")]
    IncludeCycle(PathBuf),
    #[error("{file}: key '{key}': invalid boolean value '{value}'")]
    InvalidBool {
        file: String,
        key: String,
        value: String,
    },
    #[error("{file}: key '{key}': invalid integer value '{value}'")]
    InvalidInt {
        file: String,
        key: String,
        value: String,
    },
    #[error("{file}: key '{key}': invalid port value '{value}'")]
    InvalidPort {
        file: String,
        key: String,
        value: String,
    },
    #[error("unknown syslog facility '{0}'")]
    UnknownFacility(String),
    #[error("ssl_verify_client is set but ssl_ca_file is missing")]
    MissingCaFile,
    #[error("ssl_cert_file and ssl_key_file must both be set")]
    IncompleteTlsMaterial,
    #[error("{0}")]
    Semantic(String),
}

/// Coerce an INI string value into a bool per §4.1: `1,yes,true,on` → true;
/// `0,no,false,off` → false; anything else is an error.
fn coerce_bool(file: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            file: file.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn coerce_u64(file: &str, key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidInt {
        file: file.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn coerce_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        Vec::new()
    } else {
        value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

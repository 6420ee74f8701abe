//! [`ServerConfig`]: the agent's merged, validated view of its configuration.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::command::CommandTemplate;
use crate::defaults;

use super::ini::{self, IniDocument};
use super::{coerce_bool, coerce_list, coerce_u64, ConfigError};

/// CLI-derived overrides, applied last (after defaults, then file values).
/// Every field mirrors a `ServerConfig` field; `None` means "not given on
/// the command line, leave whatever the file/defaults produced".
#[derive(Debug, Default, Clone)]
pub struct ServerOverrides {
    pub server_address: Option<String>,
    pub server_port: Option<u16>,
    pub pid_file: Option<PathBuf>,
    pub nrpe_user: Option<String>,
    pub nrpe_group: Option<String>,
    pub debug: Option<bool>,
}

/// Process-wide agent configuration, rebuilt from scratch on every reload.
///
/// A subset of fields is **immutable after startup** (see
/// [`ServerConfig::immutable_eq`]); changing them in a reloaded file is
/// logged as a warning and otherwise ignored for the running process.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub allow_bash_command_substitution: bool,
    pub command_prefix: String,
    pub command_timeout_secs: u64,
    pub connection_timeout_secs: u64,
    pub debug: bool,
    pub dont_blame_nrpe: bool,
    pub log_facility: String,
    pub nrpe_user: String,
    pub nrpe_group: String,
    pub pid_file: PathBuf,
    pub server_address: String,
    pub server_port: u16,
    pub ssl_verify_client: bool,
    pub ssl_ca_file: Option<PathBuf>,
    pub ssl_cert_file: Option<PathBuf>,
    pub ssl_key_file: Option<PathBuf>,
    pub allowed_hosts: Vec<String>,
    #[serde(skip)]
    pub commands: HashMap<String, CommandTemplate>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            allow_bash_command_substitution: false,
            command_prefix: String::new(),
            command_timeout_secs: defaults::COMMAND_TIMEOUT_SECS,
            connection_timeout_secs: defaults::CONNECTION_TIMEOUT_SECS,
            debug: false,
            dont_blame_nrpe: false,
            log_facility: defaults::LOG_FACILITY.to_string(),
            nrpe_user: defaults::NRPE_USER.to_string(),
            nrpe_group: defaults::NRPE_GROUP.to_string(),
            pid_file: PathBuf::from(defaults::PID_FILE),
            server_address: defaults::SERVER_ADDRESS.to_string(),
            server_port: defaults::SERVER_PORT,
            ssl_verify_client: false,
            ssl_ca_file: None,
            ssl_cert_file: None,
            ssl_key_file: None,
            allowed_hosts: Vec::new(),
            commands: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Load, merge and validate: defaults → file (with includes) → CLI
    /// overrides.
    pub fn load(path: &Path, overrides: &ServerOverrides) -> Result<Self, ConfigError> {
        let doc = ini::load(path)?;
        let file_name = path.display().to_string();
        let mut cfg = Self::default();
        cfg.apply_file(&doc, &file_name)?;
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_file(&mut self, doc: &IniDocument, file_name: &str) -> Result<(), ConfigError> {
        let v = &doc.values;
        macro_rules! bool_field {
            ($key:literal, $field:ident) => {
                if let Some(raw) = v.get($key) {
                    self.$field = coerce_bool(file_name, $key, raw)?;
                }
            };
        }
        macro_rules! str_field {
            ($key:literal, $field:ident) => {
                if let Some(raw) = v.get($key) {
                    self.$field = raw.clone();
                }
            };
        }

        bool_field!("allow_bash_command_substitution", allow_bash_command_substitution);
        str_field!("command_prefix", command_prefix);
        if let Some(raw) = v.get("command_timeout") {
            self.command_timeout_secs = coerce_u64(file_name, "command_timeout", raw)?;
        }
        if let Some(raw) = v.get("connection_timeout") {
            self.connection_timeout_secs = coerce_u64(file_name, "connection_timeout", raw)?;
        }
        bool_field!("debug", debug);
        bool_field!("dont_blame_nrpe", dont_blame_nrpe);
        str_field!("log_facility", log_facility);
        str_field!("nrpe_user", nrpe_user);
        str_field!("nrpe_group", nrpe_group);
        if let Some(raw) = v.get("pid_file") {
            self.pid_file = PathBuf::from(raw);
        }
        str_field!("server_address", server_address);
        if let Some(raw) = v.get("server_port") {
            let port: u32 = raw.parse().map_err(|_| ConfigError::InvalidPort {
                file: file_name.to_string(),
                key: "server_port".to_string(),
                value: raw.clone(),
            })?;
            if port == 0 || port > 65535 {
                return Err(ConfigError::InvalidPort {
                    file: file_name.to_string(),
                    key: "server_port".to_string(),
                    value: raw.clone(),
                });
            }
            self.server_port = port as u16;
        }
        bool_field!("ssl_verify_client", ssl_verify_client);
        if let Some(raw) = v.get("ssl_ca_file") {
            self.ssl_ca_file = Some(PathBuf::from(raw));
        }
        if let Some(raw) = v.get("ssl_cert_file") {
            self.ssl_cert_file = Some(PathBuf::from(raw));
        }
        if let Some(raw) = v.get("ssl_key_file") {
            self.ssl_key_file = Some(PathBuf::from(raw));
        }
        if let Some(raw) = v.get("allowed_hosts") {
            self.allowed_hosts = coerce_list(raw);
        }

        for (name, cmdline) in &doc.commands {
            if let Some(template) = CommandTemplate::parse(cmdline) {
                self.commands.insert(name.clone(), template);
            }
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ServerOverrides) {
        if let Some(v) = &overrides.server_address {
            self.server_address = v.clone();
        }
        if let Some(v) = overrides.server_port {
            self.server_port = v;
        }
        if let Some(v) = &overrides.pid_file {
            self.pid_file = v.clone();
        }
        if let Some(v) = &overrides.nrpe_user {
            self.nrpe_user = v.clone();
        }
        if let Some(v) = &overrides.nrpe_group {
            self.nrpe_group = v.clone();
        }
        if let Some(v) = overrides.debug {
            self.debug = v;
        }
    }

    /// Semantic validation beyond what per-field coercion already catches.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_port == 0 {
            return Err(ConfigError::Semantic("server_port must be nonzero".into()));
        }
        if self.ssl_verify_client && self.ssl_ca_file.is_none() {
            return Err(ConfigError::MissingCaFile);
        }
        if self.ssl_cert_file.is_some() != self.ssl_key_file.is_some() {
            return Err(ConfigError::IncompleteTlsMaterial);
        }
        if !known_facility(&self.log_facility) {
            return Err(ConfigError::UnknownFacility(self.log_facility.clone()));
        }
        Ok(())
    }

    /// True if the peer address is permitted by `allowed_hosts` (an empty
    /// list allows everyone).
    pub fn host_allowed(&self, peer: IpAddr) -> bool {
        crate::acl::host_allowed(&self.allowed_hosts, peer)
    }

    /// Compare only the fields that are immutable after startup (§3). Used
    /// to detect and warn about no-op SIGHUP changes.
    pub fn immutable_eq(&self, other: &ServerConfig) -> bool {
        self.nrpe_user == other.nrpe_user
            && self.nrpe_group == other.nrpe_group
            && self.pid_file == other.pid_file
            && self.server_address == other.server_address
            && self.server_port == other.server_port
            && self.ssl_ca_file == other.ssl_ca_file
            && self.ssl_cert_file == other.ssl_cert_file
            && self.ssl_key_file == other.ssl_key_file
            && self.ssl_verify_client == other.ssl_verify_client
    }

    /// Names of immutable fields that differ between `self` (the running
    /// config) and `new` (a freshly loaded one), for the SIGHUP warning.
    pub fn changed_immutable_fields(&self, new: &ServerConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.nrpe_user != new.nrpe_user {
            changed.push("nrpe_user");
        }
        if self.nrpe_group != new.nrpe_group {
            changed.push("nrpe_group");
        }
        if self.pid_file != new.pid_file {
            changed.push("pid_file");
        }
        if self.server_address != new.server_address {
            changed.push("server_address");
        }
        if self.server_port != new.server_port {
            changed.push("server_port");
        }
        if self.ssl_ca_file != new.ssl_ca_file {
            changed.push("ssl_ca_file");
        }
        if self.ssl_cert_file != new.ssl_cert_file {
            changed.push("ssl_cert_file");
        }
        if self.ssl_key_file != new.ssl_key_file {
            changed.push("ssl_key_file");
        }
        if self.ssl_verify_client != new.ssl_verify_client {
            changed.push("ssl_verify_client");
        }
        changed
    }

    /// Build a fresh config for reload, carrying forward the immutable
    /// fields from `self` regardless of what the new file said, since
    /// those require a restart to take effect.
    pub fn reload_with_immutables_pinned(&self, mut new: ServerConfig) -> ServerConfig {
        new.nrpe_user = self.nrpe_user.clone();
        new.nrpe_group = self.nrpe_group.clone();
        new.pid_file = self.pid_file.clone();
        new.server_address = self.server_address.clone();
        new.server_port = self.server_port;
        new.ssl_ca_file = self.ssl_ca_file.clone();
        new.ssl_cert_file = self.ssl_cert_file.clone();
        new.ssl_key_file = self.ssl_key_file.clone();
        new.ssl_verify_client = self.ssl_verify_client;
        new
    }
}

fn known_facility(name: &str) -> bool {
    crate::syslog_bridge::facility_from_name(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_cfg(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("nrpe-ng.cfg");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server_port, 59546);
        assert_eq!(cfg.server_address, "::");
        assert_eq!(cfg.command_timeout_secs, 60);
        assert_eq!(cfg.connection_timeout_secs, 300);
        assert!(!cfg.dont_blame_nrpe);
        assert_eq!(cfg.nrpe_user, "nagios");
        assert_eq!(cfg.nrpe_group, "nagios");
        assert_eq!(cfg.pid_file, PathBuf::from("/run/nagios/nrpe-ng.pid"));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let dir = tempdir().unwrap();
        let path = write_cfg(dir.path(), "server_port = 70000\n");
        let err = ServerConfig::load(&path, &ServerOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));

        let path2 = dir.path().join("zero.cfg");
        std::fs::write(&path2, "server_port = 0\n").unwrap();
        let err2 = ServerConfig::load(&path2, &ServerOverrides::default()).unwrap_err();
        assert!(matches!(err2, ConfigError::InvalidPort { .. }));
    }

    #[test]
    fn parses_command_directives() {
        let dir = tempdir().unwrap();
        let path = write_cfg(dir.path(), "command[ok] = /bin/echo hello\n");
        let cfg = ServerConfig::load(&path, &ServerOverrides::default()).unwrap();
        assert!(cfg.commands.contains_key("ok"));
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let dir = tempdir().unwrap();
        let path = write_cfg(dir.path(), "server_port = 1234\n");
        let overrides = ServerOverrides {
            server_port: Some(4242),
            ..Default::default()
        };
        let cfg = ServerConfig::load(&path, &overrides).unwrap();
        assert_eq!(cfg.server_port, 4242);
    }

    #[test]
    fn verify_client_without_ca_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write_cfg(dir.path(), "ssl_verify_client = true\n");
        let err = ServerConfig::load(&path, &ServerOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCaFile));
    }

    #[test]
    fn immutable_fields_detected_on_reload() {
        let a = ServerConfig::default();
        let mut b = ServerConfig::default();
        b.server_port = 1234;
        assert!(!a.immutable_eq(&b));
        assert_eq!(a.changed_immutable_fields(&b), vec!["server_port"]);

        let pinned = a.reload_with_immutables_pinned(b);
        assert_eq!(pinned.server_port, a.server_port);
    }
}

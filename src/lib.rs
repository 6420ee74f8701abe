//! nrpe-ng - a modern replacement for the Nagios Remote Plugin Executor.
//!
//! This crate is shared by two binaries: the `nrpe-ng` agent (a long-running
//! HTTPS daemon that executes pre-configured commands on request) and
//! `check_nrpe_ng`, the probe invoked once per check by the monitoring
//! system. See each module for its piece of the system.

pub mod acl;
pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod daemon;
pub mod defaults;
pub mod server;
pub mod supervisor;
pub mod syslog_bridge;
pub mod tls;

pub use config::{ClientConfig, ConfigError, ServerConfig};

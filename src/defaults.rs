//! Built-in default values for the server and client configuration.
//!
//! These mirror the historical nrpe-ng defaults so that an unconfigured
//! install behaves the same way operators have come to expect.

pub const SERVER_PORT: u16 = 59546;
pub const SERVER_ADDRESS: &str = "::";
pub const COMMAND_TIMEOUT_SECS: u64 = 60;
pub const CONNECTION_TIMEOUT_SECS: u64 = 300;
pub const NRPE_USER: &str = "nagios";
pub const NRPE_GROUP: &str = "nagios";
pub const PID_FILE: &str = "/run/nagios/nrpe-ng.pid";
pub const LOG_FACILITY: &str = "daemon";

/// `PATH` handed to every spawned command; deliberately minimal and fixed
/// rather than inherited from the agent's own environment.
pub const EXEC_PATH: &str = "/usr/local/sbin:/usr/local/bin:/sbin:/bin:/usr/sbin:/usr/bin";

pub const SERVER_CONFIG_PATH: &str = "/etc/nagios/nrpe-ng.cfg";
pub const CLIENT_CONFIG_PATH: &str = "/etc/nagios/check_nrpe_ng.cfg";

pub const CLIENT_PORT: u16 = SERVER_PORT;
pub const CLIENT_TIMEOUT_SECS: u64 = 10;
pub const CLIENT_SSL_VERIFY_SERVER: bool = true;

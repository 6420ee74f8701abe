//! Command-line argument definitions for both binaries (§6.3), extended
//! per SPEC_FULL.md §6.3 with `--check-config`/`--show-config` ergonomics
//! matching the teacher's `cli.rs`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Output format for `--show-config`.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

/// `nrpe-ng`, the long-running agent daemon.
#[derive(Parser, Debug)]
#[command(
    name = "nrpe-ng",
    about = "A modern HTTPS replacement for the Nagios Remote Plugin Executor",
    version
)]
pub struct AgentArgs {
    /// Use the given configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: PathBuf,

    /// Run as a standalone daemon (default)
    #[arg(short = 'd', long, conflicts_with = "foreground")]
    pub daemon: bool,

    /// Do not fork into the background
    #[arg(short = 'f', long = "foreground")]
    pub foreground: bool,

    /// Print verbose debugging information
    #[arg(long)]
    pub debug: bool,

    /// Validate the configuration and exit (0 valid, 1 invalid)
    #[arg(long)]
    pub check_config: bool,

    /// Print the effective merged configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,
}

impl AgentArgs {
    /// §4.6 startup: daemonize unless `-f` was given, mirroring the
    /// original's `-d` (default true) / `-f` (store_false) pair.
    pub fn should_daemonize(&self) -> bool {
        !self.foreground
    }
}

/// `check_nrpe_ng`, the probe invoked once per check by the monitoring
/// system.
#[derive(Parser, Debug)]
#[command(
    name = "check_nrpe_ng",
    about = "Probe client for nrpe-ng, the next-generation Nagios Remote Plugin Executor",
    version
)]
pub struct ProbeArgs {
    /// The address of the host running nrpe-ng
    #[arg(short = 'H', long = "host", required = true)]
    pub host: String,

    /// The port on which the daemon is listening
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Connection timeout in seconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Socket timeouts return UNKNOWN instead of CRITICAL
    #[arg(short = 'u')]
    pub timeout_unknown: bool,

    /// The command to run on the remote host
    #[arg(short = 'c', long = "command")]
    pub command: Option<String>,

    /// Arguments passed to the command, repeatable and space-flattened
    #[arg(short = 'a', long = "arg", num_args = 1.., action = clap::ArgAction::Append)]
    pub args: Vec<String>,

    /// Use the given client configuration file
    #[arg(short = 'C', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Print verbose debugging information
    #[arg(long)]
    pub debug: bool,

    /// Validate the configuration and exit (0 valid, 1 invalid)
    #[arg(long)]
    pub check_config: bool,
}

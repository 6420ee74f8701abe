//! `check_nrpe_ng`: the probe invoked once per check by the monitoring
//! system (§4.7).
//!
//! Grounded in the original `nrpe_ng/client.py` `main()`: resolve a config
//! file (falling back to the well-known path when `-C` is omitted),
//! flatten `-a` arguments, issue one request, and exit with the Nagios
//! convention the monitoring system expects.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use nrpe_ng::cli::ProbeArgs;
use nrpe_ng::client::{self, NAGIOS_UNKNOWN};
use nrpe_ng::config::{ClientConfig, ClientOverrides};
use nrpe_ng::defaults;

#[tokio::main]
async fn main() -> ExitCode {
    let args = ProbeArgs::parse();

    let config_path = resolve_config_path(&args);
    let overrides = ClientOverrides {
        host: Some(args.host.clone()),
        port: args.port,
        timeout_secs: args.timeout,
        timeout_unknown: if args.timeout_unknown { Some(true) } else { None },
        ..Default::default()
    };

    let config = match ClientConfig::load(config_path.as_deref(), &overrides) {
        Ok(c) => c,
        Err(e) => {
            println!("UNKNOWN: {e}");
            return ExitCode::from(NAGIOS_UNKNOWN as u8);
        }
    };

    if args.check_config {
        println!("configuration is valid");
        return ExitCode::SUCCESS;
    }

    let flattened = client::flatten_args(&args.args);
    let result = client::run(&config, args.command.as_deref(), &flattened).await;

    print!("{}", result.output);
    ExitCode::from(result.exit_code as u8)
}

/// §4.7: use `-C` if given; otherwise fall back to the well-known client
/// config path, but only if it actually exists (an unconfigured probe is
/// still usable purely from `-H`/`-p`).
fn resolve_config_path(args: &ProbeArgs) -> Option<std::path::PathBuf> {
    if let Some(path) = &args.config_file {
        return Some(path.clone());
    }
    let default_path = Path::new(defaults::CLIENT_CONFIG_PATH);
    if default_path.exists() {
        Some(default_path.to_path_buf())
    } else {
        None
    }
}

//! `nrpe-ng`: the agent daemon entry point (§4.6).
//!
//! Grounded in the teacher's `main.rs` (synchronous setup followed by
//! `Runtime::new().block_on`), reordered per the daemon lifecycle note in
//! the expanded spec: everything up to and including the fork-detach and
//! privilege drop runs in a plain, non-async `fn main()`, since forking
//! after a tokio runtime has started is unsafe. Only the serve loop and
//! signal handling run inside the runtime.
//!
//! The listening socket is bound while still root, *before* the fork and
//! privilege drop (§4.6: "bind listener (requires privilege for low
//! ports)"), mirroring `nrpe_ng/http/server.py`'s pre-fork `bind_sockets()`
//! / post-fork `add_sockets()` split — a low `server_port` would otherwise
//! be unbindable once running as `nrpe_user`/`nrpe_group`. The
//! `std::net::TcpListener` is simply carried across `nix::unistd::daemon()`
//! and `privilege::drop_to()` (a `fork()` duplicates all open descriptors,
//! and neither step touches anything but fds 0-2), then handed to
//! `axum_server::from_tcp_rustls` once inside the tokio runtime.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::process::ExitCode;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;

use nrpe_ng::cli::{AgentArgs, ConfigFormat};
use nrpe_ng::config::{ServerConfig, ServerOverrides};
use nrpe_ng::daemon::{privilege, PidFile, SignalSet};
use nrpe_ng::server::{build_router, AppState, SharedState};
use nrpe_ng::syslog_bridge::{facility_from_name, SyslogLayer};
use nrpe_ng::tls::build_server_config;

fn main() -> ExitCode {
    let args = AgentArgs::parse();

    let overrides = ServerOverrides {
        debug: if args.debug { Some(true) } else { None },
        ..Default::default()
    };

    let config = match ServerConfig::load(&args.config_file, &overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {e}", args.config_file.display());
            return ExitCode::FAILURE;
        }
    };

    if args.check_config {
        println!("configuration is valid");
        return ExitCode::SUCCESS;
    }
    if args.show_config {
        return match print_config(&config, args.config_format) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("failed to render configuration: {e}");
                ExitCode::FAILURE
            }
        };
    }

    install_logging(&config, args.should_daemonize());

    let identity = match privilege::resolve(&config.nrpe_user, &config.nrpe_group) {
        Ok(id) => id,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let rustls_config = match build_server_config(&config) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let bind_addr = match bind_address(&config) {
        Ok(a) => a,
        Err(e) => {
            error!("failed to resolve {}:{}: {e}", config.server_address, config.server_port);
            return ExitCode::FAILURE;
        }
    };
    // Bind while still root so a privileged `server_port` (<1024) is
    // reachable; this listener is carried across the fork and privilege
    // drop below rather than rebuilt afterward.
    let listener = match StdTcpListener::bind(bind_addr) {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {bind_addr}: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.should_daemonize() {
        if let Err(e) = nix::unistd::daemon(false, false) {
            error!("failed to daemonize: {e}");
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = privilege::drop_to(&identity) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let mut pid_file = match PidFile::create(&config.pid_file) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = pid_file.write() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    info!(address = %config.server_address, port = config.server_port, "starting nrpe-ng");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let exit = runtime.block_on(serve(config, rustls_config, listener, args));

    if let Err(e) = pid_file.close() {
        warn!("{e}");
    }

    exit
}

async fn serve(
    config: ServerConfig,
    rustls_config: rustls::ServerConfig,
    listener: StdTcpListener,
    args: AgentArgs,
) -> ExitCode {
    let state: SharedState = Arc::new(AppState::new(config));
    let app = build_router(state.clone());
    let tls = RustlsConfig::from_config(Arc::new(rustls_config));

    let mut signals = match SignalSet::install() {
        Ok(s) => s,
        Err(e) => {
            error!("failed to install signal handlers: {e}");
            return ExitCode::FAILURE;
        }
    };

    let server = axum_server::from_tcp_rustls(listener, tls)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());
    tokio::pin!(server);

    loop {
        tokio::select! {
            result = &mut server => {
                if let Err(e) = result {
                    error!("server error: {e}");
                    return ExitCode::FAILURE;
                }
                return ExitCode::SUCCESS;
            }
            _ = signals.hangup.recv() => {
                reload(&state, &args).await;
            }
            _ = signals.terminate.recv() => {
                info!("received SIGTERM, shutting down");
                return ExitCode::SUCCESS;
            }
            _ = signals.interrupt.recv() => {
                info!("received SIGINT, shutting down");
                return ExitCode::SUCCESS;
            }
        }
    }
}

/// SIGHUP: reload the config file, pinning the immutable subset to the
/// values the running process already started with (§3, §4.6).
async fn reload(state: &SharedState, args: &AgentArgs) {
    let overrides = ServerOverrides {
        debug: if args.debug { Some(true) } else { None },
        ..Default::default()
    };
    match ServerConfig::load(&args.config_file, &overrides) {
        Ok(new_config) => {
            state.reload(new_config).await;
            info!("configuration reloaded");
        }
        Err(e) => {
            warn!("failed to reload configuration, keeping previous: {e}");
        }
    }
}

fn bind_address(config: &ServerConfig) -> Result<SocketAddr, std::net::AddrParseError> {
    let host = if config.server_address.contains(':') && !config.server_address.starts_with('[') {
        format!("[{}]", config.server_address)
    } else {
        config.server_address.clone()
    };
    format!("{host}:{}", config.server_port).parse()
}

fn print_config(config: &ServerConfig, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
    };
    print!("{rendered}");
    Ok(())
}

/// Builds the process-wide `tracing` subscriber once, from the resolved
/// config, per §4.8: syslog when daemonized and not debugging, a console
/// sink on stderr otherwise.
fn install_logging(config: &ServerConfig, will_daemonize: bool) {
    if !config.debug && will_daemonize {
        let facility = facility_from_name(&config.log_facility).unwrap_or(syslog::Facility::LOG_DAEMON);
        match SyslogLayer::new("nrpe-ng", facility) {
            Ok(layer) => {
                let subscriber = tracing_subscriber::registry().with(layer);
                let _ = tracing::subscriber::set_global_default(subscriber);
                return;
            }
            Err(e) => {
                eprintln!("failed to connect to syslog, falling back to stderr: {e}");
            }
        }
    }

    let level = if config.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

//! Request handling: routing, authorization, POST-argument policy,
//! dispatch to the supervisor, and response mapping (§4.5).
//!
//! Grounded in the teacher's axum handler idiom
//! (`#[instrument(skip(state))]`, `State<SharedState>` extraction, see
//! `handlers/health.rs`) and the original `nrpe_ng/http/handler.py` for
//! the routing/authorization/response semantics.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{instrument, warn};

use crate::server::state::SharedState;
use crate::supervisor::{self, Status};

const SERVER_HEADER: &str = concat!("nrpe-ng/", env!("CARGO_PKG_VERSION"));

/// `HEAD /v1/check/{cmd}`: a readiness probe for a named command that
/// checks registration without running anything. The `allowed_hosts` check
/// applies here too (§4.5): the original dispatched it unconditionally for
/// every method, HEAD included.
#[instrument(skip(state))]
pub async fn check_head_handler(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(cmd): Path<String>,
) -> Response {
    let config = state.config_snapshot().await;
    if !config.host_allowed(peer.ip()) {
        warn!(peer = %peer.ip(), "access denied: not in allowed_hosts");
        return bare_response(StatusCode::FORBIDDEN);
    }
    if config.commands.contains_key(&cmd) {
        bare_response(StatusCode::OK)
    } else {
        bare_response(StatusCode::NOT_FOUND)
    }
}

/// `GET /v1/check/{cmd}`: execute the named command with no arguments.
#[instrument(skip(state))]
pub async fn check_handler(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(cmd): Path<String>,
) -> Response {
    run_check(state, peer, cmd, HashMap::new()).await
}

/// `POST /v1/check/{cmd}`: execute the named command with form-encoded
/// arguments, gated on `dont_blame_nrpe` (§4.5 "POST policy").
#[instrument(skip(state, body))]
pub async fn check_post_handler(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(cmd): Path<String>,
    body: Bytes,
) -> Response {
    let config = state.config_snapshot().await;
    if !config.dont_blame_nrpe {
        warn!("rejecting request: command arguments disabled");
        return reason_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Command arguments are disabled",
        );
    }
    drop(config);

    let args = parse_form_first_wins(&body);
    run_check(state, peer, cmd, args).await
}

/// `GET /v1/version`: a plain-text version string, usable by the probe
/// for discovery when invoked without `-c`.
#[instrument]
pub async fn version_handler() -> Response {
    let body = format!("{SERVER_HEADER}\n");
    let mut resp = (StatusCode::OK, body).into_response();
    let headers = resp.headers_mut();
    headers.insert("Server", HeaderValue::from_static(SERVER_HEADER));
    headers.insert("Content-Type", HeaderValue::from_static("text/plain"));
    resp
}

async fn run_check(
    state: SharedState,
    peer: SocketAddr,
    cmd: String,
    args: HashMap<String, String>,
) -> Response {
    let config = state.config_snapshot().await;

    if !config.host_allowed(peer.ip()) {
        warn!(peer = %peer.ip(), "access denied: not in allowed_hosts");
        return reason_response(
            StatusCode::FORBIDDEN,
            &format!("Not in allowed_hosts: {}", peer.ip()),
        );
    }

    let Some(template) = config.commands.get(&cmd) else {
        warn!(command = %cmd, "unknown command");
        return reason_response(StatusCode::NOT_FOUND, &format!("Unknown command: {cmd}"));
    };

    let prefix = shlex::split(&config.command_prefix).unwrap_or_default();
    let timeout = Duration::from_secs(config.command_timeout_secs);

    match supervisor::execute(template, &prefix, &args, timeout).await {
        Ok(outcome) => match outcome.status {
            Status::Ok => ok_response(outcome.exit_code, outcome.output),
            Status::Timeout => {
                reason_response(StatusCode::GATEWAY_TIMEOUT, "Command execution timed out")
            }
        },
        Err(e) => {
            warn!(error = %e, command = %cmd, "command failed to spawn");
            reason_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unexpected error executing command",
            )
        }
    }
}

/// §4.5 "Response mapping", the `ok` row: the captured stdout, carrying
/// the subprocess exit code in `X-NRPE-Result`.
fn ok_response(exit_code: i32, body: Vec<u8>) -> Response {
    let mut resp = (StatusCode::OK, body).into_response();
    let headers = resp.headers_mut();
    headers.insert("Server", HeaderValue::from_static(SERVER_HEADER));
    headers.insert("Content-Type", HeaderValue::from_static("text/plain"));
    headers.insert("Connection", HeaderValue::from_static("close"));
    headers.insert(
        "X-NRPE-Result",
        HeaderValue::from_str(&exit_code.to_string()).expect("decimal exit code is valid ASCII"),
    );
    resp
}

/// §4.5 "Response mapping", the 4xx/5xx rows: a reason phrase body, no
/// `X-NRPE-Result` header.
fn reason_response(status: StatusCode, reason: &str) -> Response {
    let mut resp = (status, format!("{reason}\n")).into_response();
    let headers = resp.headers_mut();
    headers.insert("Server", HeaderValue::from_static(SERVER_HEADER));
    headers.insert("Content-Type", HeaderValue::from_static("text/plain"));
    headers.insert("Connection", HeaderValue::from_static("close"));
    resp
}

fn bare_response(status: StatusCode) -> Response {
    let mut resp = (status, ()).into_response();
    let headers = resp.headers_mut();
    headers.insert("Server", HeaderValue::from_static(SERVER_HEADER));
    headers.insert("Connection", HeaderValue::from_static("close"));
    resp
}

/// Parse `application/x-www-form-urlencoded` with first-value-wins on
/// repeated keys (§9 Open Question, resolved deterministically).
fn parse_form_first_wins(body: &[u8]) -> HashMap<String, String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).unwrap_or_default();
    let mut out = HashMap::new();
    for (key, value) in pairs {
        out.entry(key).or_insert(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_wins_on_duplicate_keys() {
        let args = parse_form_first_wins(b"K=first&K=second&W=only");
        assert_eq!(args.get("K").unwrap(), "first");
        assert_eq!(args.get("W").unwrap(), "only");
    }

    #[test]
    fn empty_body_yields_empty_map() {
        assert!(parse_form_first_wins(b"").is_empty());
    }
}

//! The probe: builds one HTTPS request and maps the outcome to a Nagios
//! exit code (§4.7).
//!
//! Grounded in the original `nrpe_ng/client.py` (`Client.make_request`,
//! `Client.run`); implemented with `reqwest` (rustls backend) rather than
//! a hand-rolled HTTP client, matching the corpus's preference for an
//! ecosystem HTTP client at the client edge.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Certificate, Identity as TlsIdentity, StatusCode};
use thiserror::Error;

use crate::config::ClientConfig;

pub const NAGIOS_OK: i32 = 0;
pub const NAGIOS_WARNING: i32 = 1;
pub const NAGIOS_CRITICAL: i32 = 2;
pub const NAGIOS_UNKNOWN: i32 = 3;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build HTTPS client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("{path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The outcome of a single probe run: a Nagios-convention exit code and
/// the text to print to stdout.
pub struct ProbeResult {
    pub exit_code: i32,
    pub output: String,
}

/// Flatten repeated `-a` values into an args map per §4.7: an argument of
/// the form `K=V` contributes `K -> V`; a bare argument contributes
/// `ARG<n>` starting at 1 and incrementing per bare argument.
pub fn flatten_args(raw: &[String]) -> HashMap<String, String> {
    let mut args = HashMap::new();
    let mut argn = 1u32;
    for item in raw {
        match item.split_once('=') {
            Some((k, v)) => {
                args.insert(k.to_string(), v.to_string());
            }
            None => {
                args.insert(format!("ARG{argn}"), item.clone());
                argn += 1;
            }
        }
    }
    args
}

/// Run one probe request against `cfg`, returning the Nagios-convention
/// exit code and output text (§4.7 "Result mapping").
pub async fn run(
    cfg: &ClientConfig,
    command: Option<&str>,
    args: &HashMap<String, String>,
) -> ProbeResult {
    let client = match build_client(cfg) {
        Ok(c) => c,
        Err(e) => {
            return ProbeResult {
                exit_code: NAGIOS_UNKNOWN,
                output: format!("{}: {e}\n", cfg.host),
            }
        }
    };

    let url = match command {
        Some(cmd) => format!(
            "https://{host}:{port}/v1/check/{cmd}",
            host = cfg.host,
            port = cfg.port,
            cmd = url_encode(cmd)
        ),
        None => format!("https://{host}:{port}/v1/version", host = cfg.host, port = cfg.port),
    };

    let user_agent = format!("check_nrpe_ng/{}", env!("CARGO_PKG_VERSION"));

    let request = if !args.is_empty() {
        client.post(&url).form(args)
    } else {
        client.get(&url)
    }
    .header("User-Agent", user_agent)
    .timeout(Duration::from_secs(cfg.timeout_secs));

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() => {
            return ProbeResult {
                exit_code: if cfg.timeout_unknown {
                    NAGIOS_UNKNOWN
                } else {
                    NAGIOS_CRITICAL
                },
                output: format!("{}: Request timed out\n", cfg.host),
            }
        }
        Err(e) => {
            return ProbeResult {
                exit_code: NAGIOS_UNKNOWN,
                output: format!("{}: {e}\n", cfg.host),
            }
        }
    };

    map_response(response).await
}

/// §4.7 "Result mapping": 200 carries its exit code in `X-NRPE-Result`
/// (defaulting to UNKNOWN if absent or non-numeric); anything else is
/// UNKNOWN, with the response body (the agent's descriptive reason
/// phrase, §7) as output, falling back to the HTTP canonical reason only
/// if the body came back empty.
async fn map_response(response: reqwest::Response) -> ProbeResult {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        let output = if body.trim().is_empty() {
            let reason = status.canonical_reason().unwrap_or("unknown error").to_string();
            format!("{reason}\n")
        } else {
            body
        };
        return ProbeResult {
            exit_code: NAGIOS_UNKNOWN,
            output,
        };
    }

    let exit_code = response
        .headers()
        .get("X-NRPE-Result")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(NAGIOS_UNKNOWN);
    let body = response.text().await.unwrap_or_default();

    ProbeResult {
        exit_code,
        output: body,
    }
}

fn build_client(cfg: &ClientConfig) -> Result<reqwest::Client, ProbeError> {
    let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());

    if !cfg.ssl_verify_server {
        builder = builder.danger_accept_invalid_certs(true);
    } else if let Some(ca_path) = &cfg.ssl_ca_file {
        let pem = std::fs::read(ca_path).map_err(|e| ProbeError::Io {
            path: ca_path.clone(),
            source: e,
        })?;
        let cert = Certificate::from_pem(&pem).map_err(ProbeError::ClientBuild)?;
        builder = builder.add_root_certificate(cert).tls_built_in_root_certs(false);
    }

    if let (Some(cert_path), Some(key_path)) = (&cfg.ssl_cert_file, &cfg.ssl_key_file) {
        let mut pem = std::fs::read(cert_path).map_err(|e| ProbeError::Io {
            path: cert_path.clone(),
            source: e,
        })?;
        let mut key_pem = std::fs::read(key_path).map_err(|e| ProbeError::Io {
            path: key_path.clone(),
            source: e,
        })?;
        pem.append(&mut key_pem);
        let identity = TlsIdentity::from_pem(&pem).map_err(ProbeError::ClientBuild)?;
        builder = builder.identity(identity);
    }

    builder.build().map_err(ProbeError::ClientBuild)
}

/// Percent-encode `s` for use as a URI path segment, matching
/// `urllib.parse.quote_plus` on the command name (§4.7).
fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_key_value_and_bare_args() {
        let raw = vec!["K=V".to_string(), "W".to_string()];
        let args = flatten_args(&raw);
        assert_eq!(args.get("K").unwrap(), "V");
        assert_eq!(args.get("ARG1").unwrap(), "W");
    }

    #[test]
    fn bare_args_increment_independently_of_position() {
        let raw = vec!["first".to_string(), "K=V".to_string(), "second".to_string()];
        let args = flatten_args(&raw);
        assert_eq!(args.get("ARG1").unwrap(), "first");
        assert_eq!(args.get("K").unwrap(), "V");
        assert_eq!(args.get("ARG2").unwrap(), "second");
    }

    #[test]
    fn url_encode_preserves_unreserved_characters() {
        assert_eq!(url_encode("check_disk-1.0"), "check_disk-1.0");
        assert_eq!(url_encode("a b"), "a%20b");
    }
}

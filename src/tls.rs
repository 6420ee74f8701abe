//! TLS context construction for the agent's HTTPS listener (§4.4),
//! including optional mutual TLS.
//!
//! `axum_server`'s `RustlsConfig::from_pem_file` convenience constructor
//! (used by the teacher) has no knob for client-certificate verification,
//! so here a `rustls::ServerConfig` is built directly and handed to
//! `RustlsConfig::from_config`. The cert/key loading and client verifier
//! setup is grounded in the pattern used by the retrieved gRPC client
//! example for building its own rustls configs, adapted to the server
//! side.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use thiserror::Error;

use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("{path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: no certificates found in file")]
    NoCertificates(std::path::PathBuf),
    #[error("{0}: no private key found in file")]
    NoPrivateKey(std::path::PathBuf),
    #[error("ssl_cert_file and ssl_key_file must be set")]
    MissingMaterial,
    #[error("ssl_verify_client is set but ssl_ca_file is missing")]
    MissingCaFile,
    #[error("rustls configuration error: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("client verifier build error: {0}")]
    ClientVerifier(String),
}

/// Build the server-side `rustls::ServerConfig` from the agent's resolved
/// `ServerConfig`. Errors here are always fatal at startup (§7); at reload
/// they are surfaced and the running TLS context is retained, since TLS
/// material is immutable after startup (§3).
pub fn build_server_config(cfg: &ServerConfig) -> Result<rustls::ServerConfig, TlsError> {
    let cert_path = cfg.ssl_cert_file.as_deref().ok_or(TlsError::MissingMaterial)?;
    let key_path = cfg.ssl_key_file.as_deref().ok_or(TlsError::MissingMaterial)?;

    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let builder = rustls::ServerConfig::builder();

    let config = if cfg.ssl_verify_client {
        let ca_path = cfg.ssl_ca_file.as_deref().ok_or(TlsError::MissingCaFile)?;
        let mut roots = RootCertStore::empty();
        for ca_cert in load_certs(ca_path)? {
            roots
                .add(ca_cert)
                .map_err(|e| TlsError::ClientVerifier(e.to_string()))?;
        }
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| TlsError::ClientVerifier(e.to_string()))?;
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?
    } else {
        builder.with_no_client_auth().with_single_cert(certs, key)?
    };

    Ok(config)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|e| TlsError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|e| TlsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path).map_err(|e| TlsError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TlsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

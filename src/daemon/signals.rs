//! SIGHUP/SIGTERM/SIGINT wiring for the agent's serve loop (§4.6).
//!
//! Grounded in the teacher's `tokio::select!` shutdown block in
//! `main.rs` (`signal::unix::signal(SignalKind::terminate())`), extended
//! with a SIGHUP branch since the teacher only distinguishes SIGINT from
//! SIGTERM and has no reload concept.

use tokio::signal::unix::{signal, Signal, SignalKind};

/// The three signal streams the agent serve loop selects over.
pub struct SignalSet {
    pub hangup: Signal,
    pub terminate: Signal,
    pub interrupt: Signal,
}

impl SignalSet {
    /// Install handlers for `SIGHUP`, `SIGTERM` and `SIGINT`. Must run
    /// inside a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        Ok(SignalSet {
            hangup: signal(SignalKind::hangup())?,
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }
}

//! Daemon lifecycle: privilege drop, PID-file handling, and signal
//! wiring (§4.6).

pub mod pidfile;
pub mod privilege;
pub mod signals;

pub use pidfile::{PidFile, PidFileError};
pub use privilege::{Identity, PrivilegeError};
pub use signals::SignalSet;

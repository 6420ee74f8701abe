//! Maps internal `tracing` severities to syslog priorities/facilities, and
//! installs the process-wide subscriber.
//!
//! Grounded in the original `nrpe_ng/syslog.py` (`PRIORITY_NAMES`,
//! `FACILITY_NAMES`, `PRIORITY_MAP`) and, for the crate choice, the
//! `syslog::init`-based daemons in the retrieved example pack.

use std::sync::Mutex;

use syslog::{Facility, Formatter3164};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Syslog facility names accepted in `log_facility` (§4.8).
pub fn facility_from_name(name: &str) -> Option<Facility> {
    Some(match name {
        "kern" => Facility::LOG_KERN,
        "user" => Facility::LOG_USER,
        "mail" => Facility::LOG_MAIL,
        "daemon" => Facility::LOG_DAEMON,
        "auth" => Facility::LOG_AUTH,
        "syslog" => Facility::LOG_SYSLOG,
        "lpr" => Facility::LOG_LPR,
        "news" => Facility::LOG_NEWS,
        "uucp" => Facility::LOG_UUCP,
        "cron" => Facility::LOG_CRON,
        "local0" => Facility::LOG_LOCAL0,
        "local1" => Facility::LOG_LOCAL1,
        "local2" => Facility::LOG_LOCAL2,
        "local3" => Facility::LOG_LOCAL3,
        "local4" => Facility::LOG_LOCAL4,
        "local5" => Facility::LOG_LOCAL5,
        "local6" => Facility::LOG_LOCAL6,
        "local7" => Facility::LOG_LOCAL7,
        _ => return None,
    })
}

/// Syslog priority, independent of the `syslog` crate's own types so the
/// dispatch in [`SyslogLayer::on_event`] stays a plain match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Priority {
    Debug,
    Info,
    Warning,
    Err,
    Crit,
}

/// Maps a `tracing::Level` to a syslog priority, ascending-order lookup
/// mirroring `mapPriority()` in the original: `DEBUG→LOG_DEBUG`,
/// `INFO→LOG_INFO`, `WARNING→LOG_WARNING`, `ERROR→LOG_ERR`; there is no
/// CRITICAL level in `tracing`, so nothing maps to `LOG_CRIT` today, but
/// the arm is kept for parity with the original table.
fn level_to_priority(level: &Level) -> Priority {
    match *level {
        Level::TRACE | Level::DEBUG => Priority::Debug,
        Level::INFO => Priority::Info,
        Level::WARN => Priority::Warning,
        Level::ERROR => Priority::Err,
    }
}

/// A `tracing_subscriber::Layer` that forwards every event to syslog.
/// Installed only when the agent has daemonized; foreground/debug runs
/// use the ordinary `fmt` layer on stderr instead.
pub struct SyslogLayer {
    logger: Mutex<syslog::Logger<syslog::LoggerBackend, Formatter3164>>,
}

impl SyslogLayer {
    pub fn new(ident: &str, facility: Facility) -> Result<Self, syslog::Error> {
        let formatter = Formatter3164 {
            facility,
            hostname: None,
            process: ident.to_string(),
            pid: std::process::id() as i32,
        };
        let logger = syslog::unix(formatter)?;
        Ok(SyslogLayer {
            logger: Mutex::new(logger),
        })
    }
}

impl<S> Layer<S> for SyslogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let priority = level_to_priority(event.metadata().level());
        let message = visitor.message;

        let mut logger = match self.logger.lock() {
            Ok(l) => l,
            Err(_) => return,
        };
        let _ = match priority {
            Priority::Debug => logger.debug(message),
            Priority::Info => logger.info(message),
            Priority::Warning => logger.warning(message),
            Priority::Err => logger.err(message),
            Priority::Crit => logger.crit(message),
        };
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_facilities_resolve() {
        assert!(facility_from_name("daemon").is_some());
        assert!(facility_from_name("local7").is_some());
        assert!(facility_from_name("bogus").is_none());
    }

    #[test]
    fn level_mapping_matches_spec() {
        assert_eq!(level_to_priority(&Level::DEBUG), Priority::Debug);
        assert_eq!(level_to_priority(&Level::INFO), Priority::Info);
        assert_eq!(level_to_priority(&Level::WARN), Priority::Warning);
        assert_eq!(level_to_priority(&Level::ERROR), Priority::Err);
    }
}

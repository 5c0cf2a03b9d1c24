//! Per-request outcome logging.
//!
//! Each driver operation emits exactly one record when it completes. The
//! severity follows the error classification: maskable and retry errors are
//! informational, caller mistakes are warnings, and engine failures (including
//! anything unclassified) are errors.

use std::fmt::{self, Debug};

use tracing::{Level, error, info, warn};

use crate::error::{DriverError, ErrorKind};

/// Tag for errors outside the classified kinds.
pub const UNKNOWN_TAG: &str = "UNKNOWN";

/// Severity for an error of the given kind. `None` is unclassified.
pub fn severity(kind: Option<ErrorKind>) -> Level {
    match kind {
        Some(ErrorKind::Maskable | ErrorKind::Retry) => Level::INFO,
        Some(
            ErrorKind::BadRequest
            | ErrorKind::NotFound
            | ErrorKind::Forbidden
            | ErrorKind::NoService
            | ErrorKind::NotImplemented,
        ) => Level::WARN,
        Some(ErrorKind::Timeout | ErrorKind::Internal) | None => Level::ERROR,
    }
}

/// A rendered log record for one completed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub level: Level,
    /// `None` on success.
    pub tag: Option<&'static str>,
    pub message: String,
}

struct Args<'a>(Option<&'a dyn Debug>);

impl fmt::Display for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(args) => write!(f, "{:?}", args),
            None => Ok(()),
        }
    }
}

/// Build the record for an operation outcome without emitting it.
pub fn request_record(
    op: &str,
    args: Option<&dyn Debug>,
    result: Option<&dyn Debug>,
    err: Option<&DriverError>,
) -> RequestRecord {
    let args = Args(args);
    match err {
        None => RequestRecord {
            level: Level::INFO,
            tag: None,
            message: match result {
                Some(res) => format!("{}({}): {:?}", op, args, res),
                None => format!("{}({})", op, args),
            },
        },
        Some(e) => {
            let kind = e.kind();
            let tag = kind.map(ErrorKind::tag).unwrap_or(UNKNOWN_TAG);
            RequestRecord {
                level: severity(kind),
                tag: Some(tag),
                message: format!("[{}] {}({}): {}", tag, op, args, e),
            }
        }
    }
}

/// Log the outcome of an operation.
pub fn log_request(
    op: &str,
    args: Option<&dyn Debug>,
    result: Option<&dyn Debug>,
    err: Option<&DriverError>,
) {
    let record = request_record(op, args, result, err);
    let message = &record.message;
    match err {
        None => info!(op, "{}", message),
        Some(e) if record.level == Level::INFO => info!(op, error = %e, "{}", message),
        Some(e) if record.level == Level::WARN => warn!(op, error = %e, "{}", message),
        Some(e) => error!(op, error = %e, "{}", message),
    }
}

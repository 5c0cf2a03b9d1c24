//! Driver error types.
//!
//! Every error leaving the driver belongs to exactly one [`ErrorKind`], or to
//! the [`DriverError::Unknown`] arm when nothing more specific applies.

use std::fmt;

use thiserror::Error;

/// Errors returned by driver operations and bridge engines.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Caller should treat the outcome as a non-failure.
    #[error("{0}")]
    Maskable(String),

    /// Transient condition, the caller may retry.
    #[error("{0}")]
    Retry(String),

    /// Malformed input rejected before reaching the engine.
    #[error("{0}")]
    BadRequest(String),

    /// Referenced network or endpoint does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Operation is not allowed in the current state.
    #[error("{0}")]
    Forbidden(String),

    /// A required dependency is unavailable.
    #[error("{0}")]
    NoService(String),

    /// Operation is intentionally unsupported.
    #[error("{0}")]
    NotImplemented(String),

    /// Operation exceeded its time budget.
    #[error("{0}")]
    Timeout(String),

    /// Unexpected engine failure.
    #[error("{0}")]
    Internal(String),

    /// Anything that does not fit one of the kinds above.
    #[error(transparent)]
    Unknown(Box<dyn std::error::Error + Send + Sync>),
}

/// Closed classification of driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Maskable,
    Retry,
    BadRequest,
    NotFound,
    Forbidden,
    NoService,
    NotImplemented,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// All classified kinds.
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::Maskable,
        ErrorKind::Retry,
        ErrorKind::BadRequest,
        ErrorKind::NotFound,
        ErrorKind::Forbidden,
        ErrorKind::NoService,
        ErrorKind::NotImplemented,
        ErrorKind::Timeout,
        ErrorKind::Internal,
    ];

    /// Tag used in log lines.
    pub fn tag(self) -> &'static str {
        match self {
            ErrorKind::Maskable => "MaskableError",
            ErrorKind::Retry => "RetryError",
            ErrorKind::BadRequest => "BadRequestError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::NoService => "NoServiceError",
            ErrorKind::NotImplemented => "NotImplementedError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl DriverError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        DriverError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DriverError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        DriverError::Forbidden(msg.into())
    }

    pub fn no_service(msg: impl Into<String>) -> Self {
        DriverError::NoService(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        DriverError::NotImplemented(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        DriverError::Internal(msg.into())
    }

    /// Wrap an arbitrary error without classifying it.
    pub fn unknown<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DriverError::Unknown(Box::new(err))
    }

    /// Classify this error. `None` means unclassified.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DriverError::Maskable(_) => Some(ErrorKind::Maskable),
            DriverError::Retry(_) => Some(ErrorKind::Retry),
            DriverError::BadRequest(_) => Some(ErrorKind::BadRequest),
            DriverError::NotFound(_) => Some(ErrorKind::NotFound),
            DriverError::Forbidden(_) => Some(ErrorKind::Forbidden),
            DriverError::NoService(_) => Some(ErrorKind::NoService),
            DriverError::NotImplemented(_) => Some(ErrorKind::NotImplemented),
            DriverError::Timeout(_) => Some(ErrorKind::Timeout),
            DriverError::Internal(_) => Some(ErrorKind::Internal),
            DriverError::Unknown(_) => None,
        }
    }

    /// Build an error of the given kind.
    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match kind {
            ErrorKind::Maskable => DriverError::Maskable(msg),
            ErrorKind::Retry => DriverError::Retry(msg),
            ErrorKind::BadRequest => DriverError::BadRequest(msg),
            ErrorKind::NotFound => DriverError::NotFound(msg),
            ErrorKind::Forbidden => DriverError::Forbidden(msg),
            ErrorKind::NoService => DriverError::NoService(msg),
            ErrorKind::NotImplemented => DriverError::NotImplemented(msg),
            ErrorKind::Timeout => DriverError::Timeout(msg),
            ErrorKind::Internal => DriverError::Internal(msg),
        }
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

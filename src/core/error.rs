use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{field} {position} is out of range 0..={max}")]
    OutOfRange {
        field: &'static str,
        position: i64,
        max: i64,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, SheetError>;

impl SheetError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// `max` is the largest accepted value, so an empty collection rejecting
    /// every existing-record reference reports `0..=-1`.
    pub fn out_of_range(field: &'static str, position: i64, max: i64) -> Self {
        Self::OutOfRange {
            field,
            position,
            max,
        }
    }

    /// Short machine-readable name, used as the `code` of HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::OutOfRange { .. } => "out_of_range",
            Self::NotFound(_) => "not_found",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<std::io::Error> for SheetError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SheetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("snapshot encoding failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for SheetError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(format!("background task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_the_bound() {
        let err = SheetError::out_of_range("targetIndex", 7, 4);
        assert_eq!(err.to_string(), "targetIndex 7 is out of range 0..=4");
        assert_eq!(err.code(), "out_of_range");
    }

    #[test]
    fn io_errors_become_storage_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = SheetError::from(io);
        assert!(matches!(err, SheetError::Storage(ref msg) if msg.contains("disk gone")));
    }
}

//! Error taxonomy for graph operations.

use thiserror::Error;

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors returned by the connection and network services.
///
/// Every error is terminal for the call that produced it. Nothing is retried
/// internally; the caller decides how to present or log it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A referenced account or connection request does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is not allowed for these arguments (self-connection).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A connection request already exists for the pair.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backing storage could not be reached or returned corrupt data.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl GraphError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::NotFound(_) => "not_found",
            GraphError::InvalidOperation(_) => "invalid_operation",
            GraphError::Conflict(_) => "conflict",
            GraphError::Unavailable(_) => "unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(GraphError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(GraphError::InvalidOperation("x".into()).kind(), "invalid_operation");
        assert_eq!(GraphError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(GraphError::Unavailable("x".into()).kind(), "unavailable");
    }

    #[test]
    fn display_carries_detail() {
        let err = GraphError::NotFound("account abc".into());
        assert_eq!(err.to_string(), "Not found: account abc");
    }
}

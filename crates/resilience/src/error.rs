// crates/resilience/src/error.rs
//! Error types for resilience operations

use thiserror::Error;

/// Message reported when every attempt failed without a usable error message
pub const RETRIES_EXHAUSTED_MESSAGE: &str = "Operation failed after all retries";

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Why a wrapped operation did not produce a value
///
/// Every failure path of the executor and the circuit breaker registry ends up
/// as one of these variants inside a [`RetryResult`](crate::RetryResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResilienceError {
    /// A single invocation failed (circuit breaker path)
    #[error("{message}")]
    OperationFailed { message: String },

    /// All retry attempts exhausted; displays the last captured message
    #[error("{last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Circuit breaker is open; the operation was not invoked
    ///
    /// `last_error` carries the failure that most recently tripped or kept the
    /// breaker open. It is deliberately left out of the display message.
    #[error("Circuit breaker is open for {service}")]
    CircuitOpen {
        service: String,
        last_error: Option<String>,
    },

    /// The caller's cancellation token fired
    #[error("Operation cancelled after {attempts} attempt(s)")]
    Cancelled {
        attempts: u32,
        last_error: Option<String>,
    },
}

impl ResilienceError {
    /// Returns true if the error came from an open circuit breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// Returns true if the error came from cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled { .. })
    }

    /// The most recent failure reported by the operation itself, if any
    pub fn last_error(&self) -> Option<&str> {
        match self {
            ResilienceError::OperationFailed { message } => Some(message),
            ResilienceError::RetriesExhausted { last_error, .. } => Some(last_error),
            ResilienceError::CircuitOpen { last_error, .. }
            | ResilienceError::Cancelled { last_error, .. } => last_error.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_displays_last_error() {
        let err = ResilienceError::RetriesExhausted {
            attempts: 3,
            last_error: "connection failed".to_string(),
        };
        assert_eq!(err.to_string(), "connection failed");
        assert_eq!(err.last_error(), Some("connection failed"));
    }

    #[test]
    fn test_circuit_open_hides_underlying_reason() {
        let err = ResilienceError::CircuitOpen {
            service: "storage".to_string(),
            last_error: Some("503 from bucket".to_string()),
        };
        assert_eq!(err.to_string(), "Circuit breaker is open for storage");
        assert!(err.is_circuit_open());
        assert_eq!(err.last_error(), Some("503 from bucket"));
    }

    #[test]
    fn test_cancelled_error() {
        let err = ResilienceError::Cancelled {
            attempts: 2,
            last_error: None,
        };
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("2 attempt"));
        assert_eq!(err.last_error(), None);
    }
}

//! Error types for hasta.
//!
//! All fallible operations return [`Result`], whose error is the [`HastaError`]
//! enum. Cursor movement on scorers and iterators is infallible; errors are
//! raised while building queries, weights and scorers, while rewriting, and
//! while collecting.
//!
//! # Examples
//!
//! ```
//! use hasta::error::{HastaError, Result};
//!
//! fn check_hits(n: usize) -> Result<usize> {
//!     if n == 0 {
//!         return Err(HastaError::invalid_argument("n must be > 0"));
//!     }
//!     Ok(n)
//! }
//!
//! assert!(check_hits(0).is_err());
//! ```

use std::io;

use thiserror::Error;

use crate::index::DocId;

/// The main error type for hasta operations.
#[derive(Error, Debug)]
pub enum HastaError {
    /// A boolean query would exceed the configured maximum clause count.
    #[error("Too many clauses: maxClauseCount is set to {max_clause_count}")]
    TooManyClauses {
        /// The limit in force when the clause was rejected.
        max_clause_count: usize,
    },

    /// Collection was abandoned because the time budget was used up.
    #[error("Time exceeded: elapsed {elapsed_ms}ms, allowed {allowed_ms}ms, last doc {last_doc}")]
    TimeExceeded {
        /// Allowed time in milliseconds.
        allowed_ms: i64,
        /// Time spent before giving up, in milliseconds.
        elapsed_ms: i64,
        /// Last document (top level id) collected before the timeout, or -1.
        last_doc: DocId,
    },

    /// The resource has been closed.
    #[error("Already closed: {0}")]
    AlreadyClosed(String),

    /// A runtime state that the API contract does not allow.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// An argument that can never be valid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Query-related errors (construction, rewrite, weight creation).
    #[error("Query error: {0}")]
    Query(String),

    /// Index-access errors raised by readers, terms and postings.
    #[error("Index error: {0}")]
    Index(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with [`HastaError`].
pub type Result<T> = std::result::Result<T, HastaError>;

impl HastaError {
    /// Create a too-many-clauses error.
    pub fn too_many_clauses(max_clause_count: usize) -> Self {
        HastaError::TooManyClauses { max_clause_count }
    }

    /// Create a time-exceeded error.
    pub fn time_exceeded(allowed_ms: i64, elapsed_ms: i64, last_doc: DocId) -> Self {
        HastaError::TimeExceeded {
            allowed_ms,
            elapsed_ms,
            last_doc,
        }
    }

    /// Create an already-closed error.
    pub fn already_closed<S: Into<String>>(msg: S) -> Self {
        HastaError::AlreadyClosed(msg.into())
    }

    /// Create an illegal-state error.
    pub fn illegal_state<S: Into<String>>(msg: S) -> Self {
        HastaError::IllegalState(msg.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        HastaError::InvalidArgument(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        HastaError::Query(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        HastaError::Index(msg.into())
    }

    /// Create a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        HastaError::Other(msg.into())
    }

    /// Whether this error is a timeout carrying partial progress.
    pub fn is_time_exceeded(&self) -> bool {
        matches!(self, HastaError::TimeExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = HastaError::index("Test index error");
        assert_eq!(error.to_string(), "Index error: Test index error");

        let error = HastaError::query("Test query error");
        assert_eq!(error.to_string(), "Query error: Test query error");

        let error = HastaError::already_closed("this ReferenceManager is closed");
        assert_eq!(
            error.to_string(),
            "Already closed: this ReferenceManager is closed"
        );
    }

    #[test]
    fn test_too_many_clauses() {
        let error = HastaError::too_many_clauses(1024);
        assert!(matches!(
            error,
            HastaError::TooManyClauses {
                max_clause_count: 1024
            }
        ));
        assert_eq!(
            error.to_string(),
            "Too many clauses: maxClauseCount is set to 1024"
        );
    }

    #[test]
    fn test_time_exceeded_carries_progress() {
        let error = HastaError::time_exceeded(10, 15, 42);
        assert!(error.is_time_exceeded());
        match error {
            HastaError::TimeExceeded {
                allowed_ms,
                elapsed_ms,
                last_doc,
            } => {
                assert_eq!(allowed_ms, 10);
                assert_eq!(elapsed_ms, 15);
                assert_eq!(last_doc, 42);
            }
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = HastaError::from(io_error);

        match error {
            HastaError::Io(_) => {} // Expected
            _ => panic!("Expected IO error"),
        }
    }
}

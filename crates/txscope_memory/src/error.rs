//! Error types for the in-memory database.

use crate::types::{TransactionId, TransactionState};
use thiserror::Error;

/// Result type for in-memory database operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors raised by the in-memory connection layer.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The statement could not be parsed.
    #[error("invalid statement {statement:?}: {message}")]
    InvalidStatement {
        /// The offending statement text.
        statement: String,
        /// Description of the problem.
        message: String,
    },

    /// The transaction has already been resolved.
    #[error("transaction {id} already {state}")]
    TransactionClosed {
        /// The transaction.
        id: TransactionId,
        /// Its terminal state.
        state: TransactionState,
    },

    /// A write was attempted in a read-only transaction.
    #[error("transaction {id} is read-only")]
    ReadOnly {
        /// The transaction.
        id: TransactionId,
    },

    /// A key read by a serializable transaction changed before it committed.
    #[error("serialization conflict on key {key:?} in transaction {id}")]
    Conflict {
        /// The transaction.
        id: TransactionId,
        /// The key that changed.
        key: String,
    },

    /// A fault injected for testing.
    #[error("injected {operation} failure")]
    InjectedFault {
        /// Operation that was made to fail.
        operation: &'static str,
    },
}

impl MemoryError {
    /// Creates an invalid statement error.
    pub fn invalid_statement(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStatement {
            statement: statement.into(),
            message: message.into(),
        }
    }
}

//! Error types for transaction coordination.

use std::fmt;
use thiserror::Error;

/// Error reported by a connection layer (driver, pool, or transaction).
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for coordination operations.
pub type TxResult<T> = Result<T, TxError>;

/// What triggered a rollback.
#[derive(Debug)]
pub enum RollbackCause {
    /// The unit of work reported an error.
    Outcome {
        /// Rendered message of the unit-of-work error.
        message: String,
    },
    /// The unit of work succeeded but the commit failed.
    CommitFailed(DriverError),
}

impl fmt::Display for RollbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outcome { message } => write!(f, "unit of work failed: {message}"),
            Self::CommitFailed(err) => write!(f, "commit failed: {err}"),
        }
    }
}

/// Errors that can occur while creating or resolving a transaction.
#[derive(Debug, Error)]
pub enum TxError {
    /// No scope was supplied to start a transaction in.
    #[error("scope is missing")]
    ScopeMissing,

    /// The scope chain already carries a transactional handle.
    #[error("transactor already exists in scope")]
    TransactorAlreadyExists,

    /// The connection layer refused to begin a transaction.
    #[error("creating transaction failed: {source}")]
    TransactionBeginFailed {
        /// Underlying connection error.
        #[source]
        source: DriverError,
    },

    /// The commit failed; the rollback that followed succeeded.
    ///
    /// Only reported by [`crate::within_transaction`]. The persisted state
    /// matches the state before the unit of work.
    #[error("commit failed: {source}")]
    CommitFailed {
        /// Underlying commit error.
        #[source]
        source: DriverError,
    },

    /// The rollback failed. Persisted state is unknown.
    #[error("rollback failed: {source} ({cause})")]
    RollbackFailed {
        /// Underlying rollback error.
        #[source]
        source: DriverError,
        /// What the rollback was attempting to undo.
        cause: RollbackCause,
    },
}

impl TxError {
    /// Wraps a connection error raised while beginning a transaction.
    pub fn begin_failed(source: impl Into<DriverError>) -> Self {
        Self::TransactionBeginFailed {
            source: source.into(),
        }
    }

    /// Wraps a rollback error together with its trigger.
    pub fn rollback_failed(source: impl Into<DriverError>, cause: RollbackCause) -> Self {
        Self::RollbackFailed {
            source: source.into(),
            cause,
        }
    }

    /// Returns true if the error leaves the persisted state unknown.
    #[must_use]
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

//! Capability traits required from the connection layer.
//!
//! A raw connection or pool implements [`Connection`]: it can run statements
//! and begin transactions. An active transaction implements [`Transaction`]:
//! it can run statements and be resolved. Both travel through a
//! [`Scope`](crate::Scope) as reference-counted trait objects, so every
//! holder of a handle shares the same underlying connection.
//!
//! Resolution methods take `&self`. Implementations track their own terminal
//! state and must reject statements and second resolutions once a handle has
//! been committed or rolled back.

use crate::error::DriverError;
use crate::options::TxOptions;
use std::sync::Arc;

/// Result of running one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows written by the statement.
    pub rows_affected: u64,

    /// Rows returned by the statement, if any.
    pub rows: Vec<Vec<String>>,
}

impl ExecResult {
    /// Creates a result for a statement that returned no rows.
    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            rows: Vec::new(),
        }
    }

    /// Creates a result for a statement that returned rows.
    #[must_use]
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows_affected: 0,
            rows,
        }
    }
}

/// Anything that can run a statement.
pub trait Executor: Send + Sync {
    /// Runs `statement` and returns its result.
    ///
    /// # Errors
    ///
    /// Returns the connection layer's error if the statement fails or the
    /// handle has already been resolved.
    fn execute(&self, statement: &str) -> Result<ExecResult, DriverError>;
}

/// The resolution capability of a transactional handle.
pub trait Transactor: Send + Sync {
    /// Makes the transaction's writes durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails or the handle is terminal.
    fn commit(&self) -> Result<(), DriverError>;

    /// Discards the transaction's writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails or the handle is terminal.
    fn rollback(&self) -> Result<(), DriverError>;
}

/// A transactional handle: runs statements and can be resolved.
pub trait Transaction: Executor + Transactor {}

impl<T: Executor + Transactor + ?Sized> Transaction for T {}

/// Something that can begin a transaction.
pub trait Beginner: Send + Sync {
    /// Concrete transaction type produced by [`Beginner::begin`].
    type Tx: Transaction + 'static;

    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// Returns the connection layer's error if no transaction can be started.
    fn begin(&self, options: &TxOptions) -> Result<Self::Tx, DriverError>;
}

/// A raw connection or pool: runs statements and begins transactions.
pub trait Connection: Executor + Beginner {}

impl<T: Executor + Beginner + ?Sized> Connection for T {}

/// Shared handle to an executor stored in a scope.
pub type SharedExecutor = Arc<dyn Executor>;

/// Shared handle to a transaction stored in a scope.
pub type SharedTransaction = Arc<dyn Transaction>;

/// Returns true if both handles point at the same underlying object.
///
/// Compares data pointers only, so an executor and a transaction handle
/// created from the same transaction compare equal.
#[must_use]
pub fn same_handle<A, B>(a: &Arc<A>, b: &Arc<B>) -> bool
where
    A: ?Sized,
    B: ?Sized,
{
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

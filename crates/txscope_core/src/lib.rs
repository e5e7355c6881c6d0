//! # txscope core
//!
//! Request-scoped transaction coordination.
//!
//! Independent layers of an application share one database transaction, or
//! a plain connection when no transaction is active, without threading a
//! handle through every function signature. The handle travels in an
//! immutable [`Scope`] that callers pass down explicitly.
//!
//! This crate provides:
//! - [`Scope`]: append-only key/value carrier for one unit of work
//! - Capability traits the connection layer implements ([`Executor`],
//!   [`Transactor`], [`Beginner`])
//! - The transaction coordinator ([`create_transaction`],
//!   [`resolve_transaction`], [`within_transaction`])
//! - Handle lookup for query code ([`resolve_executor`],
//!   [`resolve_transactor`])
//!
//! ## Ownership
//!
//! The caller of [`create_transaction`] owns the returned handle and resolves
//! it exactly once. Everything else borrows it through the scope.
//!
//! ## Example
//!
//! ```rust,ignore
//! use txscope_core::{create_transaction, resolve_executor, resolve_transaction, Scope};
//!
//! let (scope, tx) = create_transaction(Some(&Scope::root()), pool.as_ref())?;
//! let outcome = transfer(&scope, &pool);
//! match &outcome {
//!     Ok(()) => resolve_transaction(tx.as_ref(), None)?,
//!     Err(err) => resolve_transaction(tx.as_ref(), Some(err))?,
//! };
//! outcome?;
//!
//! fn transfer(scope: &Scope, pool: &Arc<Pool>) -> Result<(), AppError> {
//!     let (_, db) = resolve_executor(scope, pool.clone());
//!     db.execute("SET alice 90")?;
//!     db.execute("SET bob 110")?;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod coordinator;
mod error;
mod handle;
mod options;
mod resolver;
mod scope;

pub use coordinator::{
    create_transaction, create_transaction_with, resolve_transaction, within_transaction,
    Resolution,
};
pub use error::{DriverError, RollbackCause, TxError, TxResult};
pub use handle::{
    same_handle, Beginner, Connection, ExecResult, Executor, SharedExecutor, SharedTransaction,
    Transaction, Transactor,
};
pub use options::{IsolationLevel, TxOptions};
pub use resolver::{resolve_executor, resolve_transactor};
pub use scope::{Scope, ScopeKey, EXECUTOR_SLOT, TRANSACTOR_SLOT};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

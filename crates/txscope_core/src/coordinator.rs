//! Transaction lifecycle: begin once, attach to the scope, resolve once.
//!
//! The caller that creates a transaction owns it. Code further down the call
//! chain borrows it through [`resolve_executor`](crate::resolve_executor) and
//! must never resolve it.

use crate::error::{DriverError, RollbackCause, TxError, TxResult};
use crate::handle::{Beginner, SharedExecutor, SharedTransaction, Transactor};
use crate::options::TxOptions;
use crate::resolver::resolve_transactor;
use crate::scope::{Scope, EXECUTOR_SLOT, TRANSACTOR_SLOT};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// How a transaction was resolved.
///
/// Both variants mean the resolution step itself succeeded. A rolled-back
/// transaction still leaves the unit of work failed from the caller's point
/// of view if it reported an error.
#[derive(Debug)]
pub enum Resolution {
    /// The transaction was committed.
    Committed,
    /// The transaction was rolled back.
    RolledBack {
        /// The commit error that forced the rollback, if the unit of work
        /// itself succeeded.
        commit_error: Option<DriverError>,
    },
}

impl Resolution {
    /// Returns true if the transaction was committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

/// Begins a transaction with default options and attaches it to `scope`.
///
/// See [`create_transaction_with`].
///
/// # Errors
///
/// Same as [`create_transaction_with`].
pub fn create_transaction<B>(
    scope: Option<&Scope>,
    beginner: &B,
) -> TxResult<(Scope, SharedTransaction)>
where
    B: Beginner + ?Sized,
{
    create_transaction_with(scope, beginner, &TxOptions::default())
}

/// Begins a transaction and attaches it to `scope`.
///
/// The returned scope carries the new transaction in both the executor slot
/// and the transactor slot. The returned handle is owned by the caller, which
/// must pass it to [`resolve_transaction`] exactly once.
///
/// # Errors
///
/// - [`TxError::ScopeMissing`] if `scope` is `None`
/// - [`TxError::TransactorAlreadyExists`] if anything is already stored under
///   [`TRANSACTOR_SLOT`] in the scope chain
/// - [`TxError::TransactionBeginFailed`] if the connection layer fails
pub fn create_transaction_with<B>(
    scope: Option<&Scope>,
    beginner: &B,
    options: &TxOptions,
) -> TxResult<(Scope, SharedTransaction)>
where
    B: Beginner + ?Sized,
{
    let scope = scope.ok_or(TxError::ScopeMissing)?;

    if scope.contains(&TRANSACTOR_SLOT) {
        return Err(TxError::TransactorAlreadyExists);
    }

    let tx = beginner
        .begin(options)
        .map_err(|source| TxError::TransactionBeginFailed { source })?;
    let tx = Arc::new(tx);
    debug!(
        isolation = %options.isolation,
        read_only = options.read_only,
        "transaction begun"
    );

    let executor: SharedExecutor = tx.clone();
    let transaction: SharedTransaction = tx;
    let scope = scope
        .extend(EXECUTOR_SLOT, executor)
        .extend(TRANSACTOR_SLOT, transaction.clone());

    Ok((scope, transaction))
}

/// Commits or rolls back `transaction` according to the unit of work's
/// outcome.
///
/// With no outcome error the transaction is committed; if the commit fails it
/// is rolled back. With an outcome error it is rolled back. A successful
/// rollback is not an error of the resolution step: callers must still
/// propagate their own outcome error.
///
/// The handle is terminal afterwards. Resolving it a second time is an error
/// of the connection layer.
///
/// # Errors
///
/// Returns [`TxError::RollbackFailed`] if a rollback was needed and failed.
/// It takes priority over the outcome or commit error, which is kept as the
/// [`RollbackCause`].
pub fn resolve_transaction<T>(
    transaction: &T,
    outcome: Option<&dyn fmt::Display>,
) -> TxResult<Resolution>
where
    T: Transactor + ?Sized,
{
    let cause = match outcome {
        None => match transaction.commit() {
            Ok(()) => {
                debug!("transaction committed");
                return Ok(Resolution::Committed);
            }
            Err(err) => RollbackCause::CommitFailed(err),
        },
        Some(err) => RollbackCause::Outcome {
            message: err.to_string(),
        },
    };

    match transaction.rollback() {
        Ok(()) => {
            debug!(%cause, "transaction rolled back");
            let commit_error = match cause {
                RollbackCause::CommitFailed(err) => Some(err),
                RollbackCause::Outcome { .. } => None,
            };
            Ok(Resolution::RolledBack { commit_error })
        }
        Err(source) => Err(TxError::rollback_failed(source, cause)),
    }
}

/// Runs `body` as one unit of work inside a transaction.
///
/// If `scope` already carries a transaction, `body` joins it and the outer
/// owner stays responsible for resolving it. Otherwise a new transaction is
/// begun, `body` runs with a scope carrying it, and the transaction is
/// resolved exactly once according to the body's result.
///
/// # Errors
///
/// - any error from [`create_transaction_with`]
/// - [`TxError::RollbackFailed`] if the rollback failed, regardless of the
///   body's result
/// - the body's own error, after a successful rollback
/// - [`TxError::CommitFailed`] if the body succeeded, the commit failed and
///   the rollback succeeded
pub fn within_transaction<B, F, T, E>(
    scope: &Scope,
    beginner: &B,
    options: &TxOptions,
    body: F,
) -> Result<T, E>
where
    B: Beginner + ?Sized,
    F: FnOnce(&Scope) -> Result<T, E>,
    E: From<TxError> + fmt::Display,
{
    if resolve_transactor(scope).is_some() {
        debug!("joining transaction already in scope");
        return body(scope);
    }

    let (tx_scope, transaction) = create_transaction_with(Some(scope), beginner, options)?;
    let result = body(&tx_scope);

    let resolution = match &result {
        Ok(_) => resolve_transaction(transaction.as_ref(), None),
        Err(err) => resolve_transaction(transaction.as_ref(), Some(err)),
    };

    match resolution? {
        Resolution::RolledBack {
            commit_error: Some(source),
        } => Err(TxError::CommitFailed { source }.into()),
        _ => result,
    }
}

//! Handle lookup for statement-issuing code.
//!
//! Query code never holds a connection directly. It asks the scope for the
//! handle it should execute through and gets the shared transaction when one
//! is active, or the fallback it supplied otherwise.

use crate::handle::{SharedExecutor, SharedTransaction};
use crate::scope::{Scope, EXECUTOR_SLOT, TRANSACTOR_SLOT};
use tracing::trace;

/// Returns the executor carried by `scope`, adopting `fallback` if there is
/// none.
///
/// When the scope already has an executor, the scope is returned unchanged
/// and `fallback` is dropped. Otherwise the returned scope carries `fallback`
/// in the executor slot, so every caller further down the chain resolves to
/// the same handle instead of supplying its own.
#[must_use]
pub fn resolve_executor(scope: &Scope, fallback: SharedExecutor) -> (Scope, SharedExecutor) {
    if let Some(executor) = scope.lookup::<SharedExecutor>(&EXECUTOR_SLOT) {
        return (scope.clone(), executor);
    }

    trace!("no executor in scope, adopting fallback");
    (scope.extend(EXECUTOR_SLOT, fallback.clone()), fallback)
}

/// Returns the transactional handle carried by `scope`, if any.
///
/// `None` is the common case for nested calls: only the outermost caller of
/// a unit of work manages the transaction.
#[must_use]
pub fn resolve_transactor(scope: &Scope) -> Option<SharedTransaction> {
    scope.lookup::<SharedTransaction>(&TRANSACTOR_SLOT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use crate::handle::{same_handle, ExecResult, Executor};
    use proptest::prelude::*;
    use std::sync::Arc;

    struct Labelled(&'static str);

    impl Executor for Labelled {
        fn execute(&self, _statement: &str) -> Result<ExecResult, DriverError> {
            Ok(ExecResult::with_rows(vec![vec![self.0.to_string()]]))
        }
    }

    fn label(executor: &SharedExecutor) -> String {
        executor.execute("whoami").unwrap().rows[0][0].clone()
    }

    #[test]
    fn empty_scope_adopts_fallback() {
        let pool: SharedExecutor = Arc::new(Labelled("pool"));
        let (scope, executor) = resolve_executor(&Scope::root(), pool.clone());

        assert!(same_handle(&executor, &pool));
        assert!(scope.contains(&EXECUTOR_SLOT));
    }

    #[test]
    fn first_fallback_wins() {
        let first: SharedExecutor = Arc::new(Labelled("first"));
        let second: SharedExecutor = Arc::new(Labelled("second"));

        let (scope, _) = resolve_executor(&Scope::root(), first.clone());
        let (nested, executor) = resolve_executor(&scope, second);

        assert!(same_handle(&executor, &first));
        assert_eq!(label(&executor), "first");
        assert_eq!(nested.depth(), scope.depth());
    }

    #[test]
    fn fallback_is_not_visible_to_ancestors() {
        let root = Scope::root();
        let (_, _) = resolve_executor(&root, Arc::new(Labelled("pool")));
        assert!(!root.contains(&EXECUTOR_SLOT));
    }

    #[test]
    fn transactor_absent_without_transaction() {
        let pool: SharedExecutor = Arc::new(Labelled("pool"));
        let (scope, _) = resolve_executor(&Scope::root(), pool);

        assert!(resolve_transactor(&Scope::root()).is_none());
        assert!(resolve_transactor(&scope).is_none());
    }

    proptest! {
        #[test]
        fn every_caller_sees_the_first_fallback(count in 1usize..12) {
            let fallbacks: Vec<SharedExecutor> = (0..count)
                .map(|_| Arc::new(Labelled("candidate")) as SharedExecutor)
                .collect();

            let mut scope = Scope::root();
            let mut seen = Vec::new();
            for fallback in &fallbacks {
                let (next, executor) = resolve_executor(&scope, fallback.clone());
                scope = next;
                seen.push(executor);
            }

            for executor in &seen {
                prop_assert!(same_handle(executor, &fallbacks[0]));
            }
            prop_assert_eq!(scope.depth(), 1);
        }
    }
}

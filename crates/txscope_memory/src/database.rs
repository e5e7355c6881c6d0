//! In-memory database.

use crate::config::MemoryConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::statement::Statement;
use crate::store::{MemoryStats, PendingWrite, Store};
use crate::transaction::MemoryTransaction;
use crate::types::SequenceNumber;
use std::sync::Arc;
use txscope_core::{Beginner, DriverError, ExecResult, Executor, TxOptions};

/// An in-memory key/value database.
///
/// Implements both capabilities of a raw connection: statements run outside
/// a transaction are committed immediately, and [`Beginner::begin`] starts a
/// [`MemoryTransaction`]. Clones share the same data.
///
/// Faults can be armed to make the next begin, commit, or rollback fail,
/// which lets callers exercise every resolution path.
///
/// # Example
///
/// ```rust
/// use txscope_core::{Executor, Transactor, Beginner, TxOptions};
/// use txscope_memory::MemoryDatabase;
///
/// let db = MemoryDatabase::new();
/// let tx = db.begin(&TxOptions::default()).unwrap();
/// tx.execute("SET greeting hello").unwrap();
/// assert_eq!(db.get("greeting"), None);
///
/// tx.commit().unwrap();
/// assert_eq!(db.get("greeting").as_deref(), Some("hello"));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    store: Arc<Store>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Creates a database from a configuration.
    #[must_use]
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            store: Arc::new(Store::new(&config.seed, config.max_key_len)),
        }
    }

    /// Runs a statement outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidStatement`] if the statement is invalid.
    pub fn run(&self, text: &str) -> MemoryResult<ExecResult> {
        let statement = Statement::parse(text, self.store.max_key_len)?;
        let result = match statement {
            Statement::Set { key, value } => {
                self.store.apply_one(&key, &PendingWrite::Put(value));
                ExecResult::affected(1)
            }
            Statement::Delete { key } => {
                let existed = self.store.apply_one(&key, &PendingWrite::Delete);
                ExecResult::affected(u64::from(existed))
            }
            Statement::Get { key } => {
                let value = self.get(&key);
                ExecResult::with_rows(value.map(|v| vec![v]).into_iter().collect())
            }
            Statement::Scan { prefix } => ExecResult::with_rows(
                self.store
                    .read()
                    .entries
                    .iter()
                    .filter(|(k, _)| k.starts_with(&prefix))
                    .map(|(k, v)| vec![k.clone(), v.clone()])
                    .collect(),
            ),
        };
        Ok(result)
    }

    /// Returns the committed value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.read().entries.get(key).cloned()
    }

    /// Returns every committed entry in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        self.store
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns the sequence of the latest committed write.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.store.read().seq
    }

    /// Returns transaction counters.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        self.store.stats()
    }

    /// Makes the next [`Beginner::begin`] fail.
    pub fn fail_next_begin(&self) {
        self.store.faults.arm_begin();
    }

    /// Makes the next transaction commit fail.
    pub fn fail_next_commit(&self) {
        self.store.faults.arm_commit();
    }

    /// Makes the next transaction rollback fail.
    pub fn fail_next_rollback(&self) {
        self.store.faults.arm_rollback();
    }
}

impl Executor for MemoryDatabase {
    fn execute(&self, statement: &str) -> Result<ExecResult, DriverError> {
        Ok(self.run(statement)?)
    }
}

impl Beginner for MemoryDatabase {
    type Tx = MemoryTransaction;

    fn begin(&self, options: &TxOptions) -> Result<MemoryTransaction, DriverError> {
        if self.store.faults.take_begin() {
            return Err(Box::new(MemoryError::InjectedFault { operation: "begin" }));
        }
        Ok(MemoryTransaction::begin(self.store.clone(), *options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use txscope_core::Transactor;

    #[test]
    fn autocommit_writes_are_visible() {
        let db = MemoryDatabase::new();
        db.run("SET a 1").unwrap();
        assert_eq!(db.get("a").as_deref(), Some("1"));
        assert_eq!(db.committed_seq(), SequenceNumber::new(1));

        let deleted = db.run("DEL a").unwrap();
        assert_eq!(deleted.rows_affected, 1);
        assert_eq!(db.run("DEL a").unwrap().rows_affected, 0);
    }

    #[test]
    fn seeded_entries_are_committed() {
        let db = MemoryDatabase::with_config(MemoryConfig::new().seed("b", "2").seed("a", "1"));
        assert_eq!(
            db.entries(),
            vec![("a".into(), "1".into()), ("b".into(), "2".into())]
        );
        assert_eq!(db.committed_seq(), SequenceNumber::default());
    }

    #[test]
    fn scan_outside_transaction() {
        let db = MemoryDatabase::with_config(
            MemoryConfig::new().seed("k:1", "x").seed("k:2", "y").seed("z", "w"),
        );
        let rows = db.run("SCAN k:").unwrap().rows;
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn injected_begin_failure() {
        let db = MemoryDatabase::new();
        db.fail_next_begin();

        let err = db.begin(&TxOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "injected begin failure");
        assert!(db.begin(&TxOptions::default()).is_ok());
    }

    #[test]
    fn clones_share_data() {
        let db = MemoryDatabase::new();
        let other = db.clone();
        other.run("SET shared yes").unwrap();
        assert_eq!(db.get("shared").as_deref(), Some("yes"));
    }

    #[test]
    fn stats_track_resolution() {
        let db = MemoryDatabase::new();
        let committed = db.begin(&TxOptions::default()).unwrap();
        let rolled_back = db.begin(&TxOptions::default()).unwrap();
        let _open = db.begin(&TxOptions::default()).unwrap();

        committed.commit().unwrap();
        rolled_back.rollback().unwrap();

        let stats = db.stats();
        assert_eq!(stats.begun, 3);
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.rolled_back, 1);
        assert_eq!(stats.active(), 1);
    }

    fn write_statement() -> impl Strategy<Value = String> {
        let key = prop::sample::select(vec!["a", "b", "c", "d"]);
        prop_oneof![
            (key.clone(), 0_u32..100).prop_map(|(k, v)| format!("SET {k} {v}")),
            key.prop_map(|k| format!("DEL {k}")),
        ]
    }

    proptest! {
        #[test]
        fn rolled_back_writes_leave_store_unchanged(
            statements in prop::collection::vec(write_statement(), 0..32)
        ) {
            let db = MemoryDatabase::with_config(
                MemoryConfig::new().seed("a", "1").seed("c", "3"),
            );
            let before = db.entries();
            let seq = db.committed_seq();

            let tx = db.begin(&TxOptions::default()).unwrap();
            for statement in &statements {
                tx.run(statement).unwrap();
            }
            tx.try_rollback().unwrap();

            prop_assert_eq!(db.entries(), before);
            prop_assert_eq!(db.committed_seq(), seq);
        }
    }
}

//! In-memory transactions.

use crate::error::{MemoryError, MemoryResult};
use crate::statement::Statement;
use crate::store::{PendingWrite, Store};
use crate::types::{SequenceNumber, TransactionId, TransactionState};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use txscope_core::{DriverError, ExecResult, Executor, IsolationLevel, Transactor, TxOptions};

#[derive(Debug)]
struct TxInner {
    state: TransactionState,
    /// Pending writes, applied atomically at commit.
    writes: BTreeMap<String, PendingWrite>,
    /// Keys read from committed state, for conflict detection.
    reads: HashSet<String>,
    /// Committed entries as of begin, for snapshot isolation levels.
    snapshot: Option<BTreeMap<String, String>>,
}

impl TxInner {
    fn ensure_active(&self, id: TransactionId) -> MemoryResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            state => Err(MemoryError::TransactionClosed { id, state }),
        }
    }
}

/// A transaction against a [`MemoryDatabase`](crate::MemoryDatabase).
///
/// Writes are buffered until commit and are invisible to everyone else
/// until then. Reads see the transaction's own writes first, then:
/// - `ReadCommitted`: the latest committed data
/// - `RepeatableRead`: committed data as of begin
/// - `Serializable`: as `RepeatableRead`, and commit fails if any key the
///   transaction read was written by someone else after it began
///
/// Once committed or rolled back the transaction rejects every statement
/// and every further resolution. Dropping an active transaction rolls it
/// back.
#[derive(Debug)]
pub struct MemoryTransaction {
    id: TransactionId,
    options: TxOptions,
    snapshot_seq: SequenceNumber,
    store: Arc<Store>,
    inner: Mutex<TxInner>,
}

impl MemoryTransaction {
    pub(crate) fn begin(store: Arc<Store>, options: TxOptions) -> Self {
        let id = store.next_txid();
        let (snapshot, snapshot_seq) = {
            let committed = store.read();
            let snapshot = match options.isolation {
                IsolationLevel::ReadCommitted => None,
                IsolationLevel::RepeatableRead | IsolationLevel::Serializable => {
                    Some(committed.entries.clone())
                }
            };
            (snapshot, committed.seq)
        };
        store.record_begin();
        debug!(%id, isolation = %options.isolation, %snapshot_seq, "memory transaction begun");

        Self {
            id,
            options,
            snapshot_seq,
            store,
            inner: Mutex::new(TxInner {
                state: TransactionState::Active,
                writes: BTreeMap::new(),
                reads: HashSet::new(),
                snapshot,
            }),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the options the transaction was begun with.
    #[must_use]
    pub fn options(&self) -> TxOptions {
        self.options
    }

    /// Returns the committed sequence observed at begin.
    #[must_use]
    pub fn snapshot_seq(&self) -> SequenceNumber {
        self.snapshot_seq
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Returns the number of buffered writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes.len()
    }

    /// Runs a statement inside the transaction.
    ///
    /// # Errors
    ///
    /// Fails if the statement is invalid, the transaction is no longer
    /// active, or a write is attempted in a read-only transaction.
    pub fn run(&self, text: &str) -> MemoryResult<ExecResult> {
        let statement = Statement::parse(text, self.store.max_key_len)?;
        let mut inner = self.inner.lock();
        inner.ensure_active(self.id)?;

        if statement.is_write() && self.options.read_only {
            return Err(MemoryError::ReadOnly { id: self.id });
        }

        let result = match statement {
            Statement::Set { key, value } => {
                inner.writes.insert(key, PendingWrite::Put(value));
                ExecResult::affected(1)
            }
            Statement::Delete { key } => {
                let existed = self.visible(&mut inner, &key).is_some();
                inner.writes.insert(key, PendingWrite::Delete);
                ExecResult::affected(u64::from(existed))
            }
            Statement::Get { key } => {
                let rows = self.visible(&mut inner, &key).map(|value| vec![value]);
                ExecResult::with_rows(rows.into_iter().collect())
            }
            Statement::Scan { prefix } => ExecResult::with_rows(self.scan(&mut inner, &prefix)),
        };
        Ok(result)
    }

    /// Commits the transaction, returning the sequence its writes landed at.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is no longer active, on a serialization
    /// conflict, or on an injected fault. The transaction stays active after
    /// a failed commit so it can be rolled back.
    pub fn try_commit(&self) -> MemoryResult<SequenceNumber> {
        let mut inner = self.inner.lock();
        inner.ensure_active(self.id)?;

        if self.store.faults.take_commit() {
            return Err(MemoryError::InjectedFault {
                operation: "commit",
            });
        }

        let validate = (self.options.isolation == IsolationLevel::Serializable)
            .then_some((&inner.reads, self.snapshot_seq));
        let sequence = self
            .store
            .commit(&inner.writes, validate)
            .map_err(|key| MemoryError::Conflict { id: self.id, key })?;

        inner.writes.clear();
        inner.state = TransactionState::Committed;
        self.store.record_commit();
        debug!(id = %self.id, %sequence, "memory transaction committed");
        Ok(sequence)
    }

    /// Discards the transaction's writes.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is no longer active or on an injected fault.
    pub fn try_rollback(&self) -> MemoryResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_active(self.id)?;

        if self.store.faults.take_rollback() {
            return Err(MemoryError::InjectedFault {
                operation: "rollback",
            });
        }

        inner.writes.clear();
        inner.state = TransactionState::RolledBack;
        self.store.record_rollback();
        debug!(id = %self.id, "memory transaction rolled back");
        Ok(())
    }

    fn visible(&self, inner: &mut TxInner, key: &str) -> Option<String> {
        if let Some(write) = inner.writes.get(key) {
            return write.value().cloned();
        }

        inner.reads.insert(key.to_string());
        match &inner.snapshot {
            Some(snapshot) => snapshot.get(key).cloned(),
            None => self.store.read().entries.get(key).cloned(),
        }
    }

    fn scan(&self, inner: &mut TxInner, prefix: &str) -> Vec<Vec<String>> {
        let mut view: BTreeMap<String, String> = match &inner.snapshot {
            Some(snapshot) => with_prefix(snapshot, prefix),
            None => with_prefix(&self.store.read().entries, prefix),
        };
        inner.reads.extend(view.keys().cloned());

        for (key, write) in inner.writes.iter().filter(|(k, _)| k.starts_with(prefix)) {
            match write {
                PendingWrite::Put(value) => {
                    view.insert(key.clone(), value.clone());
                }
                PendingWrite::Delete => {
                    view.remove(key);
                }
            }
        }

        view.into_iter().map(|(k, v)| vec![k, v]).collect()
    }
}

fn with_prefix(entries: &BTreeMap<String, String>, prefix: &str) -> BTreeMap<String, String> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl Executor for MemoryTransaction {
    fn execute(&self, statement: &str) -> Result<ExecResult, DriverError> {
        Ok(self.run(statement)?)
    }
}

impl Transactor for MemoryTransaction {
    fn commit(&self) -> Result<(), DriverError> {
        self.try_commit()?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), DriverError> {
        Ok(self.try_rollback()?)
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state == TransactionState::Active {
            inner.writes.clear();
            inner.state = TransactionState::RolledBack;
            self.store.record_rollback();
            warn!(id = %self.id, "memory transaction dropped unresolved, rolled back");
        }
    }
}

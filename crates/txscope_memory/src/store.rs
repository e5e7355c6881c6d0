//! Committed state shared by a database and its transactions.

use crate::types::{SequenceNumber, TransactionId};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A buffered write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingWrite {
    Put(String),
    Delete,
}

impl PendingWrite {
    pub(crate) fn value(&self) -> Option<&String> {
        match self {
            Self::Put(value) => Some(value),
            Self::Delete => None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Committed {
    pub(crate) entries: BTreeMap<String, String>,
    /// Sequence of the last write to each key, deletes included.
    modified: HashMap<String, SequenceNumber>,
    pub(crate) seq: SequenceNumber,
}

impl Committed {
    fn write(&mut self, key: &str, write: &PendingWrite, seq: SequenceNumber) -> bool {
        self.modified.insert(key.to_string(), seq);
        match write {
            PendingWrite::Put(value) => self
                .entries
                .insert(key.to_string(), value.clone())
                .is_some(),
            PendingWrite::Delete => self.entries.remove(key).is_some(),
        }
    }
}

/// One-shot failure switches.
#[derive(Debug, Default)]
pub(crate) struct Faults {
    begin: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
}

impl Faults {
    pub(crate) fn arm_begin(&self) {
        self.begin.store(true, Ordering::SeqCst);
    }

    pub(crate) fn arm_commit(&self) {
        self.commit.store(true, Ordering::SeqCst);
    }

    pub(crate) fn arm_rollback(&self) {
        self.rollback.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_begin(&self) -> bool {
        self.begin.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn take_commit(&self) -> bool {
        self.commit.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn take_rollback(&self) -> bool {
        self.rollback.swap(false, Ordering::SeqCst)
    }
}

/// Transaction counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    /// Transactions begun.
    pub begun: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions rolled back, including those dropped unresolved.
    pub rolled_back: u64,
}

impl MemoryStats {
    /// Returns the number of transactions not yet resolved.
    #[must_use]
    pub fn active(&self) -> u64 {
        self.begun
            .saturating_sub(self.committed)
            .saturating_sub(self.rolled_back)
    }
}

#[derive(Debug, Default)]
struct Counters {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

#[derive(Debug)]
pub(crate) struct Store {
    committed: RwLock<Committed>,
    next_txid: AtomicU64,
    counters: Counters,
    pub(crate) faults: Faults,
    pub(crate) max_key_len: usize,
}

impl Store {
    pub(crate) fn new(seed: &[(String, String)], max_key_len: usize) -> Self {
        let entries = seed.iter().cloned().collect();
        Self {
            committed: RwLock::new(Committed {
                entries,
                ..Committed::default()
            }),
            next_txid: AtomicU64::new(1),
            counters: Counters::default(),
            faults: Faults::default(),
            max_key_len,
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Committed> {
        self.committed.read()
    }

    pub(crate) fn next_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    /// Applies a single write outside any transaction.
    ///
    /// Returns true if the key held a value before the write.
    pub(crate) fn apply_one(&self, key: &str, write: &PendingWrite) -> bool {
        let mut committed = self.committed.write();
        let seq = committed.seq.next();
        committed.seq = seq;
        committed.write(key, write, seq)
    }

    /// Applies a transaction's writes atomically.
    ///
    /// When `validate` is given, fails with the first key in the read set
    /// that was written after the given sequence. Nothing is applied in that
    /// case.
    pub(crate) fn commit(
        &self,
        writes: &BTreeMap<String, PendingWrite>,
        validate: Option<(&HashSet<String>, SequenceNumber)>,
    ) -> Result<SequenceNumber, String> {
        let mut committed = self.committed.write();

        if let Some((reads, since)) = validate {
            let changed = reads
                .iter()
                .find(|key| committed.modified.get(*key).is_some_and(|seq| *seq > since));
            if let Some(key) = changed {
                return Err(key.clone());
            }
        }

        if writes.is_empty() {
            return Ok(committed.seq);
        }

        let seq = committed.seq.next();
        committed.seq = seq;
        for (key, write) in writes {
            committed.write(key, write, seq);
        }
        Ok(seq)
    }

    pub(crate) fn record_begin(&self) {
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_commit(&self) {
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_rollback(&self) {
        self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn stats(&self) -> MemoryStats {
        // Resolution counters first so a concurrent begin can only inflate `begun`.
        let rolled_back = self.counters.rolled_back.load(Ordering::SeqCst);
        let committed = self.counters.committed.load(Ordering::SeqCst);
        let begun = self.counters.begun.load(Ordering::SeqCst);
        MemoryStats {
            begun,
            committed,
            rolled_back,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writes(items: &[(&str, PendingWrite)]) -> BTreeMap<String, PendingWrite> {
        items
            .iter()
            .map(|(k, w)| ((*k).to_string(), w.clone()))
            .collect()
    }

    #[test]
    fn commit_advances_sequence_once() {
        let store = Store::new(&[], 64);
        let seq = store
            .commit(
                &writes(&[
                    ("a", PendingWrite::Put("1".into())),
                    ("b", PendingWrite::Put("2".into())),
                ]),
                None,
            )
            .unwrap();

        assert_eq!(seq, SequenceNumber::new(1));
        assert_eq!(store.read().entries.len(), 2);
    }

    #[test]
    fn empty_commit_keeps_sequence() {
        let store = Store::new(&[], 64);
        let seq = store.commit(&BTreeMap::new(), None).unwrap();
        assert_eq!(seq, SequenceNumber::default());
    }

    #[test]
    fn validation_rejects_changed_read() {
        let store = Store::new(&[("a".into(), "1".into())], 64);
        let since = store.read().seq;
        store.apply_one("a", &PendingWrite::Delete);

        let reads: HashSet<String> = ["a".to_string()].into_iter().collect();
        let result = store.commit(
            &writes(&[("b", PendingWrite::Put("2".into()))]),
            Some((&reads, since)),
        );

        assert_eq!(result, Err("a".to_string()));
        assert!(!store.read().entries.contains_key("b"));
    }

    #[test]
    fn active_never_underflows() {
        let stats = MemoryStats {
            begun: 1,
            committed: 1,
            rolled_back: 1,
        };
        assert_eq!(stats.active(), 0);
    }

    #[test]
    fn stats_count_open_transactions() {
        let store = Store::new(&[], 64);
        store.record_begin();
        store.record_begin();
        store.record_commit();
        assert_eq!(store.stats().active(), 1);
    }

    #[test]
    fn faults_fire_once() {
        let faults = Faults::default();
        assert!(!faults.take_commit());
        faults.arm_commit();
        assert!(faults.take_commit());
        assert!(!faults.take_commit());
    }
}

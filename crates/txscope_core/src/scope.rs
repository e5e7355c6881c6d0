//! Immutable, append-only key/value carrier for a unit of work.
//!
//! A [`Scope`] is a persistent linked chain. Extending a scope never mutates
//! it; it produces a new scope whose innermost node holds the new entry and
//! whose parent is the original. Lookups walk from the innermost node outward,
//! so a key set closer to the caller shadows the same key further out.
//!
//! Cloning a scope is a reference-count bump. Two branches extended from a
//! common ancestor share the ancestor's nodes and never observe each other's
//! entries.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Key under which a value is stored in a [`Scope`].
///
/// Keys compare by name. Library code should define keys as constants to
/// avoid accidental collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    name: &'static str,
}

impl ScopeKey {
    /// Creates a key with the given name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Returns the key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-key:{}", self.name)
    }
}

/// Slot holding the handle statements should be executed through.
pub const EXECUTOR_SLOT: ScopeKey = ScopeKey::new("executor");

/// Slot holding the transactional handle owned by the outermost caller.
pub const TRANSACTOR_SLOT: ScopeKey = ScopeKey::new("transactor");

struct Node {
    key: ScopeKey,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

// Unlink iteratively so dropping a long chain does not recurse once per entry.
impl Drop for Node {
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// The ambient state of one unit of work.
///
/// # Example
///
/// ```rust
/// use txscope_core::{Scope, ScopeKey};
///
/// const TENANT: ScopeKey = ScopeKey::new("tenant");
///
/// let root = Scope::root();
/// let scope = root.extend(TENANT, String::from("acme"));
///
/// assert_eq!(scope.lookup::<String>(&TENANT), Some(String::from("acme")));
/// assert_eq!(root.lookup::<String>(&TENANT), None);
/// ```
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Node>>,
}

impl Scope {
    /// Returns an empty scope with no keys.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new scope resolving `key` to `value` and deferring every
    /// other key to `self`.
    #[must_use]
    pub fn extend<T>(&self, key: ScopeKey, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Node {
                key,
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Looks up `key`, innermost entry first.
    ///
    /// Returns `None` when the key is absent, or when the innermost entry for
    /// the key holds a value of a type other than `T`.
    #[must_use]
    pub fn lookup<T>(&self, key: &ScopeKey) -> Option<T>
    where
        T: Any + Clone,
    {
        self.find(key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Returns true if any entry in the chain is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &ScopeKey) -> bool {
        self.find(key).is_some()
    }

    /// Returns the number of entries in the chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.nodes().count()
    }

    /// Returns true if the scope has no entries.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.head.is_none()
    }

    fn find(&self, key: &ScopeKey) -> Option<&(dyn Any + Send + Sync + 'static)> {
        self.nodes()
            .find(|node| node.key == *key)
            .map(|node| node.value.as_ref())
    }

    fn nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::successors(self.head.as_deref(), |node| node.parent.as_deref())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.nodes().map(|node| node.key.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NAME: ScopeKey = ScopeKey::new("name");
    const COUNT: ScopeKey = ScopeKey::new("count");

    #[test]
    fn root_has_no_entries() {
        let scope = Scope::root();
        assert!(scope.is_root());
        assert_eq!(scope.depth(), 0);
        assert!(!scope.contains(&EXECUTOR_SLOT));
        assert_eq!(scope.lookup::<u32>(&COUNT), None);
    }

    #[test]
    fn extend_does_not_mutate_parent() {
        let parent = Scope::root().extend(COUNT, 1_u32);
        let child = parent.extend(NAME, "child");

        assert_eq!(child.lookup::<&str>(&NAME), Some("child"));
        assert_eq!(child.lookup::<u32>(&COUNT), Some(1));
        assert!(!parent.contains(&NAME));
        assert_eq!(parent.depth(), 1);
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn inner_entry_shadows_outer() {
        let scope = Scope::root().extend(COUNT, 1_u32).extend(COUNT, 2_u32);
        assert_eq!(scope.lookup::<u32>(&COUNT), Some(2));
    }

    #[test]
    fn lookup_with_wrong_type_is_absent() {
        let scope = Scope::root().extend(COUNT, 7_u32);
        assert!(scope.contains(&COUNT));
        assert_eq!(scope.lookup::<u64>(&COUNT), None);
    }

    #[test]
    fn sibling_branches_are_independent() {
        let base = Scope::root().extend(COUNT, 0_u32);
        let left = base.extend(NAME, "left");
        let right = base.extend(NAME, "right");

        assert_eq!(left.lookup::<&str>(&NAME), Some("left"));
        assert_eq!(right.lookup::<&str>(&NAME), Some("right"));
        assert!(!base.contains(&NAME));
    }

    #[test]
    fn scope_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Scope>();

        let scope = Scope::root().extend(COUNT, 5_u32);
        let handles: Vec<_> = (0..4_u32)
            .map(|i| {
                let scope = scope.clone();
                std::thread::spawn(move || {
                    let branch = scope.extend(NAME, i);
                    (branch.lookup::<u32>(&COUNT), branch.lookup::<u32>(&NAME))
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let (count, name) = handle.join().unwrap();
            assert_eq!(count, Some(5));
            assert_eq!(name, Some(i as u32));
        }
        assert!(!scope.contains(&NAME));
    }

    #[test]
    fn dropping_long_chain_does_not_overflow() {
        let mut scope = Scope::root();
        for i in 0..100_000_u64 {
            scope = scope.extend(COUNT, i);
        }
        assert_eq!(scope.depth(), 100_000);
        drop(scope);
    }

    #[test]
    fn dropping_branch_keeps_shared_ancestors() {
        let mut base = Scope::root();
        for i in 0..1_000_u64 {
            base = base.extend(COUNT, i);
        }
        let branch = base.extend(NAME, String::from("leaf"));
        drop(branch);

        assert_eq!(base.depth(), 1_000);
        assert_eq!(base.lookup::<u64>(&COUNT), Some(999));
    }

    #[test]
    fn debug_lists_keys_innermost_first() {
        let scope = Scope::root().extend(COUNT, 1_u32).extend(NAME, "x");
        assert_eq!(format!("{scope:?}"), r#"["name", "count"]"#);
    }

    fn key_strategy() -> impl Strategy<Value = ScopeKey> {
        prop::sample::select(vec![
            ScopeKey::new("a"),
            ScopeKey::new("b"),
            ScopeKey::new("c"),
            ScopeKey::new("d"),
        ])
    }

    proptest! {
        #[test]
        fn lookup_after_extend_finds_value(
            entries in prop::collection::vec((key_strategy(), any::<i64>()), 0..16),
            key in key_strategy(),
            value in any::<i64>(),
        ) {
            let scope = entries
                .iter()
                .fold(Scope::root(), |scope, (k, v)| scope.extend(*k, *v));
            let extended = scope.extend(key, value);
            prop_assert_eq!(extended.lookup::<i64>(&key), Some(value));
        }

        #[test]
        fn unset_key_is_not_found(
            entries in prop::collection::vec((key_strategy(), any::<i64>()), 0..16),
        ) {
            let scope = entries
                .iter()
                .filter(|(k, _)| k.name() != "d")
                .fold(Scope::root(), |scope, (k, v)| scope.extend(*k, *v));
            prop_assert!(!scope.contains(&ScopeKey::new("d")));
            prop_assert_eq!(scope.lookup::<i64>(&ScopeKey::new("d")), None);
        }

        #[test]
        fn extend_preserves_other_keys(
            entries in prop::collection::vec((key_strategy(), any::<i64>()), 0..16),
            value in any::<i64>(),
        ) {
            let scope = entries
                .iter()
                .fold(Scope::root(), |scope, (k, v)| scope.extend(*k, *v));
            let extended = scope.extend(ScopeKey::new("a"), value);
            for name in ["b", "c", "d"] {
                let key = ScopeKey::new(name);
                prop_assert_eq!(extended.lookup::<i64>(&key), scope.lookup::<i64>(&key));
            }
        }
    }
}

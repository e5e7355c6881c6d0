//! Transaction options.

use std::fmt;

/// Isolation level requested when beginning a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    /// Reads observe the latest committed data.
    #[default]
    ReadCommitted,
    /// Reads observe a snapshot taken when the transaction began.
    RepeatableRead,
    /// Transactions behave as if executed one at a time.
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadCommitted => "read committed",
            Self::RepeatableRead => "repeatable read",
            Self::Serializable => "serializable",
        };
        f.write_str(name)
    }
}

/// Options passed to the connection layer when beginning a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    /// Requested isolation level.
    pub isolation: IsolationLevel,

    /// Whether the transaction may only read.
    pub read_only: bool,
}

impl TxOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the isolation level.
    #[must_use]
    pub const fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    /// Sets whether the transaction is read-only.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = TxOptions::default();
        assert_eq!(options.isolation, IsolationLevel::ReadCommitted);
        assert!(!options.read_only);
    }

    #[test]
    fn builder_pattern() {
        let options = TxOptions::new()
            .isolation(IsolationLevel::Serializable)
            .read_only(true);

        assert_eq!(options.isolation, IsolationLevel::Serializable);
        assert!(options.read_only);
    }
}

//! In-memory database configuration.

/// Configuration for an in-memory database.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Entries present when the database is created.
    pub seed: Vec<(String, String)>,

    /// Maximum key length in bytes.
    pub max_key_len: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            seed: Vec::new(),
            max_key_len: 256,
        }
    }
}

impl MemoryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry present at creation.
    #[must_use]
    pub fn seed(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.seed.push((key.into(), value.into()));
        self
    }

    /// Sets the maximum key length.
    #[must_use]
    pub const fn max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }
}

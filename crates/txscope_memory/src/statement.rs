//! Statement language understood by the in-memory database.
//!
//! ```text
//! SET <key> <value...>   write a key
//! GET <key>              read a key
//! DEL <key>              delete a key
//! SCAN [prefix]          list keys, optionally filtered by prefix
//! ```
//!
//! Verbs are case-insensitive. A `SET` value is the rest of the line with
//! runs of whitespace collapsed to one space.

use crate::error::{MemoryError, MemoryResult};

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Writes `value` under `key`.
    Set {
        /// Target key.
        key: String,
        /// Value to store.
        value: String,
    },
    /// Reads `key`.
    Get {
        /// Key to read.
        key: String,
    },
    /// Deletes `key`.
    Delete {
        /// Key to delete.
        key: String,
    },
    /// Lists keys starting with `prefix`.
    Scan {
        /// Key prefix; empty matches every key.
        prefix: String,
    },
}

impl Statement {
    /// Parses a statement, rejecting keys longer than `max_key_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidStatement`] for unknown verbs, missing
    /// operands, extra operands, or oversized keys.
    pub fn parse(text: &str, max_key_len: usize) -> MemoryResult<Self> {
        let mut tokens = text.split_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| MemoryError::invalid_statement(text, "empty statement"))?;

        let statement = match verb.to_ascii_uppercase().as_str() {
            "SET" => {
                let key = operand(text, &mut tokens)?;
                let value = tokens.by_ref().collect::<Vec<_>>().join(" ");
                if value.is_empty() {
                    return Err(MemoryError::invalid_statement(text, "missing value"));
                }
                Self::Set { key, value }
            }
            "GET" => Self::Get {
                key: operand(text, &mut tokens)?,
            },
            "DEL" => Self::Delete {
                key: operand(text, &mut tokens)?,
            },
            "SCAN" => Self::Scan {
                prefix: tokens.next().unwrap_or_default().to_string(),
            },
            other => {
                return Err(MemoryError::invalid_statement(
                    text,
                    format!("unknown verb {other}"),
                ))
            }
        };

        if !matches!(statement, Self::Set { .. }) && tokens.next().is_some() {
            return Err(MemoryError::invalid_statement(text, "unexpected operand"));
        }
        if let Some(key) = statement.key() {
            if key.len() > max_key_len {
                return Err(MemoryError::invalid_statement(
                    text,
                    format!("key exceeds {max_key_len} bytes"),
                ));
            }
        }

        Ok(statement)
    }

    /// Returns the key a single-key statement targets.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Set { key, .. } | Self::Get { key } | Self::Delete { key } => Some(key),
            Self::Scan { .. } => None,
        }
    }

    /// Returns true if the statement modifies data.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Set { .. } | Self::Delete { .. })
    }
}

fn operand<'a>(text: &str, tokens: &mut impl Iterator<Item = &'a str>) -> MemoryResult<String> {
    tokens
        .next()
        .map(str::to_string)
        .ok_or_else(|| MemoryError::invalid_statement(text, "missing key"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> MemoryResult<Statement> {
        Statement::parse(text, 16)
    }

    #[test]
    fn parses_each_verb() {
        assert_eq!(
            parse("SET a 1").unwrap(),
            Statement::Set {
                key: "a".into(),
                value: "1".into()
            }
        );
        assert_eq!(parse("get a").unwrap(), Statement::Get { key: "a".into() });
        assert_eq!(parse("Del a").unwrap(), Statement::Delete { key: "a".into() });
        assert_eq!(
            parse("SCAN user:").unwrap(),
            Statement::Scan {
                prefix: "user:".into()
            }
        );
        assert_eq!(
            parse("SCAN").unwrap(),
            Statement::Scan {
                prefix: String::new()
            }
        );
    }

    #[test]
    fn set_value_keeps_inner_words() {
        let statement = parse("SET greeting  hello   world").unwrap();
        assert_eq!(
            statement,
            Statement::Set {
                key: "greeting".into(),
                value: "hello world".into()
            }
        );
    }

    #[test]
    fn only_set_takes_trailing_words() {
        assert_eq!(
            parse("SET a 1 2").unwrap(),
            Statement::Set {
                key: "a".into(),
                value: "1 2".into()
            }
        );
        assert!(parse("DEL a 1").is_err());
    }

    #[test]
    fn rejects_malformed_statements() {
        for text in ["", "   ", "SET", "SET a", "GET", "GET a b", "DROP a", "SCAN a b"] {
            assert!(
                matches!(parse(text), Err(MemoryError::InvalidStatement { .. })),
                "expected {text:?} to be rejected"
            );
        }
    }

    #[test]
    fn rejects_oversized_key() {
        let text = format!("GET {}", "k".repeat(17));
        assert!(parse(&text).is_err());
        assert!(parse(&format!("GET {}", "k".repeat(16))).is_ok());
    }

    #[test]
    fn classifies_writes() {
        assert!(parse("SET a 1").unwrap().is_write());
        assert!(parse("DEL a").unwrap().is_write());
        assert!(!parse("GET a").unwrap().is_write());
        assert!(!parse("SCAN").unwrap().is_write());
    }
}

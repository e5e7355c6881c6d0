//! # txscope memory
//!
//! In-memory connection layer for txscope.
//!
//! [`MemoryDatabase`] is a small key/value database that implements the
//! connection capabilities `txscope_core` expects from a driver. It backs
//! tests and demos of scoped transactions without a database server.
//!
//! ## Statements
//!
//! See [`Statement`] for the statement language.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use txscope_core::{create_transaction, resolve_executor, resolve_transaction, Executor, Scope};
//! use txscope_memory::MemoryDatabase;
//!
//! let db = Arc::new(MemoryDatabase::new());
//! let (scope, tx) = create_transaction(Some(&Scope::root()), db.as_ref()).unwrap();
//!
//! let (_, executor) = resolve_executor(&scope, db.clone());
//! executor.execute("SET a 1").unwrap();
//!
//! resolve_transaction(tx.as_ref(), None).unwrap();
//! assert_eq!(db.get("a").as_deref(), Some("1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod statement;
mod store;
mod transaction;
mod types;

pub use config::MemoryConfig;
pub use database::MemoryDatabase;
pub use error::{MemoryError, MemoryResult};
pub use statement::Statement;
pub use store::MemoryStats;
pub use transaction::MemoryTransaction;
pub use types::{SequenceNumber, TransactionId, TransactionState};

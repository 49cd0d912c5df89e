//! Carton — a transactional object store with named buckets.
//!
//! Carton persists application objects as JSON inside an embedded,
//! single-file [redb](https://docs.rs/redb) database. Objects live in named
//! *buckets*, are keyed by monotonically increasing 64-bit [`Id`]s, and are
//! read and written inside ACID transactions. Carton itself is a thin
//! facade: durability, B+tree indexing, and locking all belong to the
//! engine.
//!
//! # Quick Start
//!
//! ```ignore
//! use carton::{Id, Store};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Widget {
//!     id: Id,
//!     name: String,
//! }
//!
//! let store = Store::open("widgets.carton")?;
//!
//! // Write transaction: commits on Ok, rolls back on Err.
//! let widget = store.update(|tx| {
//!     tx.init_bucket("widgets")?;
//!     tx.create("widgets", |id| Widget { id, name: "anvil".into() })
//! })?;
//!
//! // Read transaction over a consistent snapshot.
//! let found: Option<Widget> = store.view(|tx| tx.fetch("widgets", widget.id))?;
//! assert_eq!(found.as_ref(), Some(&widget));
//!
//! store.close()?;
//! ```
//!
//! # Transactions
//!
//! [`Store::update`] runs a closure inside a read-write transaction; there
//! is at most one writer at a time and concurrent updates block until the
//! previous one finishes. [`Store::view`] runs a closure inside a read-only
//! snapshot; views run concurrently with each other and with a writer.
//! Callers that need to manage transaction lifetime themselves can use
//! [`Store::begin_read`] / [`Store::begin_write`] and commit explicitly.
//!
//! # Modules
//!
//! - [`config`] - Store configuration and builder
//! - [`error`] - Error types
//! - [`keys`] - Identifier type and key encoding
//! - [`store`] - The store handle
//! - [`transaction`] - Transaction handle and bucket operations

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod keys;
pub mod store;
pub mod transaction;

pub use config::{Config, StoreBuilder};
pub use error::{Error, Result};
pub use keys::Id;
pub use store::Store;
pub use transaction::StoreTransaction;

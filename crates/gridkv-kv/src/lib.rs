//! Ordered, transactional key-value boundary for gridkv.
//!
//! The chunk engine never talks to a concrete database. It consumes the
//! capability set defined here: atomic, conflict-detecting, auto-retrying
//! transactions and ascending range scans over raw byte keys.
//!
//! # Backends
//!
//! All backends implement the [`KvStore`] trait:
//!
//! - [`MemoryKvStore`] -- optimistic, copy-on-write `BTreeMap` store for tests and embedding
//! - [`RedbKvStore`] -- persistent store backed by a single redb table
//! - [`Backend`] -- runtime choice between the two
//!
//! # Transaction Rules
//!
//! 1. A transaction body either commits all of its writes or none of them.
//! 2. Bodies may be executed more than once; they must not perform
//!    irreversible side effects.
//! 3. Scans return pairs in ascending raw-byte key order.
//! 4. Reads observe the transaction's own uncommitted writes.

pub mod backend;
pub mod error;
pub mod memory;
pub mod range;
pub mod redb_store;
pub mod traits;

pub use backend::Backend;
pub use error::{KvError, KvResult};
pub use memory::MemoryKvStore;
pub use range::KeyRange;
pub use redb_store::RedbKvStore;
pub use traits::{KeyValue, KvStore, KvTransaction};

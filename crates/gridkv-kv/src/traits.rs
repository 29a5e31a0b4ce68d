use crate::error::{KvError, KvResult};
use crate::range::KeyRange;

/// A key and its value, as returned by range scans.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Operations available inside a transaction body.
///
/// Writes are buffered until the enclosing [`KvStore::transact`] call
/// commits. Reads see the transaction's own writes layered over a single
/// consistent snapshot.
pub trait KvTransaction {
    /// Read a key. Returns `Ok(None)` if it does not exist.
    fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    /// Write a key, replacing any prior value.
    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn clear(&mut self, key: &[u8]) -> KvResult<()>;

    /// Remove every key in `range` atomically.
    fn clear_range(&mut self, range: &KeyRange) -> KvResult<()>;

    /// All pairs in `range`, ascending by raw key bytes.
    fn scan_range(&mut self, range: &KeyRange) -> KvResult<Vec<KeyValue>>;
}

/// Ordered, transactional key-value store.
///
/// All implementations must satisfy these invariants:
/// - The effects of a body become durable atomically, and only if the body
///   returns `Ok` and the commit succeeds.
/// - A body that returns `Err` leaves no trace in the store.
/// - On a detected write conflict the body is re-executed against a fresh
///   snapshot, up to an implementation-defined limit.
pub trait KvStore: Send + Sync {
    /// Run `body` inside a transaction and commit it.
    ///
    /// `body` may run more than once. Its error type only needs to absorb
    /// [`KvError`], so callers can thread their own error enums through.
    fn transact<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<KvError>;

    /// Read a single key in its own transaction.
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.transact(|tx| tx.get(key))
    }

    /// Scan a range in its own transaction.
    fn scan(&self, range: &KeyRange) -> KvResult<Vec<KeyValue>> {
        self.transact(|tx| tx.scan_range(range))
    }
}

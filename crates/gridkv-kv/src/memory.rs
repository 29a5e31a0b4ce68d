use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::range::KeyRange;
use crate::traits::{KeyValue, KvStore, KvTransaction};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// Default number of times a conflicting body is re-run.
pub const DEFAULT_MAX_RETRIES: u32 = 16;

/// Number of committed write footprints kept for conflict detection.
const HISTORY_LIMIT: usize = 1024;

/// Write footprint of one committed transaction.
struct CommitRecord {
    version: u64,
    footprint: Vec<KeyRange>,
}

struct Inner {
    data: Arc<Map>,
    version: u64,
    history: VecDeque<CommitRecord>,
}

/// In-memory, optimistic, ordered key-value store.
///
/// Intended for tests and embedding. Every transaction reads from an
/// immutable snapshot (an `Arc` of the map at begin time) and buffers its
/// writes. At commit the transaction's read footprint is checked against the
/// writes of every transaction committed since its snapshot; any overlap is
/// a conflict and the body is re-run on a fresh snapshot. A snapshot older
/// than the retained history is treated as conflicting.
pub struct MemoryKvStore {
    inner: RwLock<Inner>,
    max_retries: u32,
}

impl MemoryKvStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }

    /// Create a store that gives up after `max_retries` conflicting re-runs.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            inner: RwLock::new(Inner {
                data: Arc::new(Map::new()),
                version: 0,
                history: VecDeque::new(),
            }),
            max_retries,
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").data.len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of transactions that committed at least one write.
    pub fn version(&self) -> u64 {
        self.inner.read().expect("lock poisoned").version
    }

    fn begin(&self) -> MemoryTransaction {
        let inner = self.inner.read().expect("lock poisoned");
        MemoryTransaction {
            snapshot: Arc::clone(&inner.data),
            read_version: inner.version,
            writes: BTreeMap::new(),
            cleared: Vec::new(),
            reads: Vec::new(),
        }
    }

    fn commit(&self, tx: MemoryTransaction) -> KvResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");

        if !tx.reads.is_empty() && tx.read_version < inner.version {
            let covered = inner
                .history
                .front()
                .is_some_and(|oldest| oldest.version <= tx.read_version + 1);
            if !covered {
                return Err(KvError::Conflict);
            }
            let conflicting = inner
                .history
                .iter()
                .filter(|record| record.version > tx.read_version)
                .flat_map(|record| record.footprint.iter())
                .any(|written| tx.reads.iter().any(|read| read.intersects(written)));
            if conflicting {
                return Err(KvError::Conflict);
            }
        }

        if tx.writes.is_empty() && tx.cleared.is_empty() {
            return Ok(());
        }

        let mut footprint = tx.cleared.clone();
        footprint.extend(tx.writes.keys().map(|key| KeyRange::single(key)));

        let data = Arc::make_mut(&mut inner.data);
        for range in &tx.cleared {
            let doomed: Vec<Vec<u8>> = data
                .range::<[u8], _>(bounds(range))
                .map(|(key, _)| key.clone())
                .collect();
            for key in doomed {
                data.remove(&key);
            }
        }
        for (key, value) in tx.writes {
            match value {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }

        inner.version += 1;
        let version = inner.version;
        inner.history.push_back(CommitRecord { version, footprint });
        while inner.history.len() > HISTORY_LIMIT {
            inner.history.pop_front();
        }
        Ok(())
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryKvStore {
    fn transact<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<KvError>,
    {
        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            let mut tx = self.begin();
            let value = body(&mut tx)?;
            match self.commit(tx) {
                Ok(()) => return Ok(value),
                Err(KvError::Conflict) => {
                    debug!(attempt, "memory transaction conflict; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(KvError::RetryLimitExceeded { attempts }.into())
    }
}

impl std::fmt::Debug for MemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("lock poisoned");
        f.debug_struct("MemoryKvStore")
            .field("key_count", &inner.data.len())
            .field("version", &inner.version)
            .finish()
    }
}

/// Buffered transaction over a snapshot.
///
/// `writes` holds per-key overrides (`None` = cleared). `cleared` holds
/// range clears; any write recorded after a range clear lives in `writes`
/// and shadows it.
struct MemoryTransaction {
    snapshot: Arc<Map>,
    read_version: u64,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    cleared: Vec<KeyRange>,
    reads: Vec<KeyRange>,
}

impl MemoryTransaction {
    fn is_cleared(&self, key: &[u8]) -> bool {
        self.cleared.iter().any(|range| range.contains(key))
    }
}

impl KvTransaction for MemoryTransaction {
    fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.reads.push(KeyRange::single(key));
        if let Some(value) = self.writes.get(key) {
            return Ok(value.clone());
        }
        if self.is_cleared(key) {
            return Ok(None);
        }
        Ok(self.snapshot.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn clear(&mut self, key: &[u8]) -> KvResult<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn clear_range(&mut self, range: &KeyRange) -> KvResult<()> {
        if range.is_empty() {
            return Ok(());
        }
        let shadowed: Vec<Vec<u8>> = self
            .writes
            .range::<[u8], _>(bounds(range))
            .map(|(key, _)| key.clone())
            .collect();
        for key in shadowed {
            self.writes.remove(&key);
        }
        self.cleared.push(range.clone());
        Ok(())
    }

    fn scan_range(&mut self, range: &KeyRange) -> KvResult<Vec<KeyValue>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        self.reads.push(range.clone());
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .snapshot
            .range::<[u8], _>(bounds(range))
            .filter(|(key, _)| !self.is_cleared(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in self.writes.range::<[u8], _>(bounds(range)) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

fn bounds(range: &KeyRange) -> (Bound<&[u8]>, Bound<&[u8]>) {
    (
        Bound::Included(range.start.as_slice()),
        Bound::Excluded(range.end.as_slice()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn put(store: &MemoryKvStore, key: &[u8], value: &[u8]) {
        store
            .transact(|tx| tx.set(key, value))
            .expect("write should commit");
    }

    // -----------------------------------------------------------------------
    // Basic reads and writes
    // -----------------------------------------------------------------------

    #[test]
    fn committed_writes_are_visible() {
        let store = MemoryKvStore::new();
        put(&store, b"a", b"1");
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failed_body_leaves_no_trace() {
        let store = MemoryKvStore::new();
        let result: Result<(), KvError> = store.transact(|tx| {
            tx.set(b"a", b"1")?;
            Err(KvError::Backend("boom".into()))
        });
        assert!(result.is_err());
        assert!(store.is_empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn reads_see_own_writes() {
        let store = MemoryKvStore::new();
        put(&store, b"a", b"old");
        store
            .transact(|tx| {
                tx.set(b"a", b"new")?;
                assert_eq!(tx.get(b"a")?, Some(b"new".to_vec()));
                tx.clear(b"a")?;
                assert_eq!(tx.get(b"a")?, None);
                Ok::<_, KvError>(())
            })
            .unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Range scans and range clears
    // -----------------------------------------------------------------------

    #[test]
    fn scan_is_ascending_and_bounded() {
        let store = MemoryKvStore::new();
        for key in [&b"p:2"[..], b"p:0", b"q:0", b"p:1", b"o:9"] {
            put(&store, key, key);
        }
        let range = KeyRange::prefix(b"p:").unwrap();
        let keys: Vec<Vec<u8>> = store.scan(&range).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"p:0".to_vec(), b"p:1".to_vec(), b"p:2".to_vec()]);
    }

    #[test]
    fn scan_merges_uncommitted_writes() {
        let store = MemoryKvStore::new();
        put(&store, b"p:1", b"x");
        put(&store, b"p:3", b"x");
        let range = KeyRange::prefix(b"p:").unwrap();
        let keys: Vec<Vec<u8>> = store
            .transact(|tx| {
                tx.set(b"p:2", b"y")?;
                tx.clear(b"p:3")?;
                tx.scan_range(&range)
            })
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"p:1".to_vec(), b"p:2".to_vec()]);
    }

    #[test]
    fn clear_range_removes_only_the_range() {
        let store = MemoryKvStore::new();
        for key in [&b"p:0"[..], b"p:1", b"q:0"] {
            put(&store, key, b"v");
        }
        let range = KeyRange::prefix(b"p:").unwrap();
        store.transact(|tx| tx.clear_range(&range)).unwrap();
        assert!(store.scan(&range).unwrap().is_empty());
        assert_eq!(store.get(b"q:0").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn write_after_clear_range_survives() {
        let store = MemoryKvStore::new();
        put(&store, b"p:0", b"old");
        let range = KeyRange::prefix(b"p:").unwrap();
        store
            .transact(|tx| {
                tx.set(b"p:1", b"doomed")?;
                tx.clear_range(&range)?;
                tx.set(b"p:2", b"kept")
            })
            .unwrap();
        let pairs = store.scan(&range).unwrap();
        assert_eq!(pairs, vec![(b"p:2".to_vec(), b"kept".to_vec())]);
    }

    // -----------------------------------------------------------------------
    // Optimistic concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn conflicting_body_is_retried() {
        let store = MemoryKvStore::new();
        put(&store, b"counter", b"0");
        let runs = Cell::new(0);

        store
            .transact(|tx| {
                runs.set(runs.get() + 1);
                let current = tx.get(b"counter")?.unwrap_or_default();
                if runs.get() == 1 {
                    // A competing writer commits after our snapshot was taken.
                    put(&store, b"counter", b"7");
                }
                let mut next = current.clone();
                next.push(b'+');
                tx.set(b"counter", &next)
            })
            .unwrap();

        assert_eq!(runs.get(), 2);
        assert_eq!(store.get(b"counter").unwrap(), Some(b"7+".to_vec()));
    }

    #[test]
    fn disjoint_writers_do_not_conflict() {
        let store = MemoryKvStore::new();
        let runs = Cell::new(0);
        store
            .transact(|tx| {
                runs.set(runs.get() + 1);
                tx.get(b"mine")?;
                if runs.get() == 1 {
                    put(&store, b"theirs", b"x");
                }
                tx.set(b"mine", b"y")
            })
            .unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn scan_conflicts_with_writes_into_range() {
        let store = MemoryKvStore::new();
        let range = KeyRange::prefix(b"p:").unwrap();
        let runs = Cell::new(0);
        let seen = store
            .transact(|tx| {
                runs.set(runs.get() + 1);
                let pairs = tx.scan_range(&range)?;
                if runs.get() == 1 {
                    put(&store, b"p:5", b"late");
                }
                tx.set(b"summary", &[pairs.len() as u8])?;
                Ok::<_, KvError>(pairs.len())
            })
            .unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(seen, 1);
    }

    #[test]
    fn retry_limit_is_enforced() {
        let store = MemoryKvStore::with_max_retries(2);
        let runs = Cell::new(0u8);
        let result: Result<(), KvError> = store.transact(|tx| {
            runs.set(runs.get() + 1);
            tx.get(b"hot")?;
            put(&store, b"hot", &[runs.get()]);
            tx.set(b"hot", b"mine")
        });
        assert!(matches!(
            result,
            Err(KvError::RetryLimitExceeded { attempts: 3 })
        ));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn read_only_transactions_do_not_bump_version() {
        let store = MemoryKvStore::new();
        put(&store, b"a", b"1");
        let before = store.version();
        store.get(b"a").unwrap();
        assert_eq!(store.version(), before);
    }

    #[test]
    fn concurrent_writers_on_distinct_keys() {
        use std::thread;

        let store = Arc::new(MemoryKvStore::new());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..16u8 {
                        store
                            .transact(|tx| tx.set(&[i, j], &[j]))
                            .expect("write should commit");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.len(), 8 * 16);
    }

    #[test]
    fn debug_format() {
        let store = MemoryKvStore::new();
        put(&store, b"x", b"y");
        let debug = format!("{store:?}");
        assert!(debug.contains("MemoryKvStore"));
        assert!(debug.contains("key_count"));
    }
}

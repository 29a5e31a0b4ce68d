use std::fs;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, warn};

use crate::error::{KvError, KvResult};
use crate::range::KeyRange;
use crate::traits::{KeyValue, KvStore, KvTransaction};

/// Single table holding every key of the store.
const KV_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("gridkv");

/// Persistent key-value store backed by redb.
///
/// Every body runs inside one redb write transaction, committed when the
/// body returns `Ok` and aborted otherwise. redb serializes write
/// transactions, so bodies never observe a conflict and are never re-run.
pub struct RedbKvStore {
    db: Database,
    path: PathBuf,
}

impl RedbKvStore {
    /// Create or open a database file at `path`.
    pub fn open(path: &Path) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(backend)?;

        let txn = db.begin_write().map_err(backend)?;
        {
            txn.open_table(KV_TABLE).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;

        debug!(path = %path.display(), "opened redb store");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for RedbKvStore {
    fn transact<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<KvError>,
    {
        let txn = self.db.begin_write().map_err(backend)?;
        let outcome = {
            let table = txn.open_table(KV_TABLE).map_err(backend)?;
            let mut tx = RedbTransaction { table };
            body(&mut tx)
        };
        match outcome {
            Ok(value) => {
                txn.commit().map_err(backend)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = txn.abort() {
                    warn!(error = %abort, "failed to abort redb transaction");
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore")
            .field("path", &self.path)
            .finish()
    }
}

struct RedbTransaction<'txn> {
    table: redb::Table<'txn, &'static [u8], &'static [u8]>,
}

impl RedbTransaction<'_> {
    fn keys_in(&self, range: &KeyRange) -> KvResult<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        for entry in self
            .table
            .range(range.start.as_slice()..range.end.as_slice())
            .map_err(backend)?
        {
            let (key, _) = entry.map_err(backend)?;
            keys.push(key.value().to_vec());
        }
        Ok(keys)
    }
}

impl KvTransaction for RedbTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        let value = self.table.get(key).map_err(backend)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.table.insert(key, value).map_err(backend)?;
        Ok(())
    }

    fn clear(&mut self, key: &[u8]) -> KvResult<()> {
        self.table.remove(key).map_err(backend)?;
        Ok(())
    }

    fn clear_range(&mut self, range: &KeyRange) -> KvResult<()> {
        if range.is_empty() {
            return Ok(());
        }
        for key in self.keys_in(range)? {
            self.table.remove(key.as_slice()).map_err(backend)?;
        }
        Ok(())
    }

    fn scan_range(&mut self, range: &KeyRange) -> KvResult<Vec<KeyValue>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let mut pairs = Vec::new();
        for entry in self
            .table
            .range(range.start.as_slice()..range.end.as_slice())
            .map_err(backend)?
        {
            let (key, value) = entry.map_err(backend)?;
            pairs.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(pairs)
    }
}

fn backend(e: impl std::fmt::Display) -> KvError {
    KvError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_read_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.redb");
        {
            let store = RedbKvStore::open(&path).unwrap();
            store
                .transact(|tx| {
                    tx.set(b"k:1", b"one")?;
                    tx.set(b"k:0", b"zero")
                })
                .unwrap();
        }
        let store = RedbKvStore::open(&path).unwrap();
        assert_eq!(store.get(b"k:1").unwrap(), Some(b"one".to_vec()));
        let pairs = store.scan(&KeyRange::prefix(b"k:").unwrap()).unwrap();
        assert_eq!(
            pairs,
            vec![
                (b"k:0".to_vec(), b"zero".to_vec()),
                (b"k:1".to_vec(), b"one".to_vec()),
            ]
        );
    }

    #[test]
    fn failed_body_is_aborted() {
        let dir = tempdir().unwrap();
        let store = RedbKvStore::open(&dir.path().join("store.redb")).unwrap();
        let result: Result<(), KvError> = store.transact(|tx| {
            tx.set(b"a", b"1")?;
            Err(KvError::Backend("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn clear_range_and_clear() {
        let dir = tempdir().unwrap();
        let store = RedbKvStore::open(&dir.path().join("store.redb")).unwrap();
        store
            .transact(|tx| {
                tx.set(b"p:0", b"x")?;
                tx.set(b"p:1", b"x")?;
                tx.set(b"q:0", b"x")
            })
            .unwrap();
        let range = KeyRange::prefix(b"p:").unwrap();
        store
            .transact(|tx| {
                tx.clear_range(&range)?;
                tx.clear(b"absent")
            })
            .unwrap();
        assert!(store.scan(&range).unwrap().is_empty());
        assert_eq!(store.get(b"q:0").unwrap(), Some(b"x".to_vec()));
    }
}

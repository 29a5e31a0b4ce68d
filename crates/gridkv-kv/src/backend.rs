use crate::error::KvError;
use crate::memory::MemoryKvStore;
use crate::redb_store::RedbKvStore;
use crate::traits::{KvStore, KvTransaction};

/// Runtime choice of key-value backend.
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryKvStore),
    Redb(RedbKvStore),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Redb(_) => "redb",
        }
    }
}

impl KvStore for Backend {
    fn transact<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<KvError>,
    {
        match self {
            Backend::Memory(store) => store.transact(body),
            Backend::Redb(store) => store.transact(body),
        }
    }
}

impl From<MemoryKvStore> for Backend {
    fn from(store: MemoryKvStore) -> Self {
        Backend::Memory(store)
    }
}

impl From<RedbKvStore> for Backend {
    fn from(store: RedbKvStore) -> Self {
        Backend::Redb(store)
    }
}

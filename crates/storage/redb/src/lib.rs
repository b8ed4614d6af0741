//! redb-based state store backend.
//!
//! [`RedbStateStore`] keeps every entry in a single table keyed by string,
//! so prefix iteration is an ordered range scan.

use std::path::Path;

use metrics::Counter;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;
use vertex_storage::{IterFn, StateStore, StoreError, StoreResult};

/// Key: entry key, value: encoded bytes.
const STATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");

fn backend(err: impl Into<redb::Error>) -> StoreError {
    StoreError::backend(err.into())
}

/// redb-based state store.
///
/// Thread-safe for concurrent reads and writes.
pub struct RedbStateStore {
    db: Database,
    reads: Counter,
    writes: Counter,
}

impl std::fmt::Debug for RedbStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStateStore").finish_non_exhaustive()
    }
}

impl RedbStateStore {
    /// Open or create a state store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(backend)?;

        // Ensure the table exists so readers never see it missing
        let write_txn = db.begin_write().map_err(backend)?;
        {
            let _ = write_txn.open_table(STATE_TABLE).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;

        debug!(path = %path.display(), "opened redb state store");
        Ok(Self {
            db,
            reads: metrics::counter!("storage.redb.reads_total"),
            writes: metrics::counter!("storage.redb.writes_total"),
        })
    }
}

impl StateStore for RedbStateStore {
    fn get_bytes(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.reads.increment(1);
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(STATE_TABLE).map_err(backend)?;
        match table.get(key).map_err(backend)? {
            Some(value) => Ok(value.value().to_vec()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn put_bytes(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.writes.increment(1);
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(STATE_TABLE).map_err(backend)?;
            table.insert(key, value).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.writes.increment(1);
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(STATE_TABLE).map_err(backend)?;
            table.remove(key).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)
    }

    fn iterate(&self, prefix: &str, visit: &mut IterFn<'_>) -> StoreResult<()> {
        self.reads.increment(1);
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(STATE_TABLE).map_err(backend)?;

        for entry in table.range(prefix..).map_err(backend)? {
            let (key, value) = entry.map_err(backend)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            if visit(key, value.value())? {
                break;
            }
        }

        Ok(())
    }
}

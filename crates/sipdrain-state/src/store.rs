//! StateStore — redb-backed drain-record persistence.
//!
//! Every write runs in its own redb write transaction. redb serializes
//! write transactions, so the read-check-write inside
//! [`StateStore::conditional_put`] is atomic and linearizable per key.
//! The secondary index is maintained in the same transaction as the
//! record it points at.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe drain-record store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DRAIN_RECORDS).map_err(map_err!(Table))?;
        txn.open_table(SERVICE_STATE_INDEX).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get the record for a task.
    pub fn get(&self, task_arn: &str) -> StateResult<Option<TaskDrainRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DRAIN_RECORDS).map_err(map_err!(Table))?;
        match table.get(task_arn).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: TaskDrainRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Apply `update` only if the current record satisfies `expect`.
    ///
    /// A missing record is created from `update`. Returns the record as
    /// written, or [`StateError::ConditionFailed`] with the state observed
    /// inside the transaction.
    pub fn conditional_put(
        &self,
        task_arn: &str,
        expect: Expect,
        update: &RecordUpdate,
    ) -> StateResult<TaskDrainRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let previous = read_in_txn(&txn, task_arn)?;

        if !expect.admits(previous.as_ref()) {
            let found = previous.as_ref().map(|r| r.state);
            txn.abort().map_err(map_err!(Transaction))?;
            debug!(task = %task_arn, ?expect, ?found, "conditional put rejected");
            return Err(StateError::ConditionFailed {
                key: task_arn.to_string(),
                found,
            });
        }

        let next = write_in_txn(&txn, task_arn, previous.as_ref(), update)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(task = %task_arn, state = %next.state, "conditional put committed");
        Ok(next)
    }

    /// Apply `update` regardless of the current state (upsert).
    pub fn update(&self, task_arn: &str, update: &RecordUpdate) -> StateResult<TaskDrainRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let previous = read_in_txn(&txn, task_arn)?;
        let next = write_in_txn(&txn, task_arn, previous.as_ref(), update)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(task = %task_arn, state = %next.state, "record updated");
        Ok(next)
    }

    /// Range query over the `(service_arn, state, started_at)` index.
    ///
    /// Results are ordered by state partition, then start time.
    pub fn query_service(
        &self,
        service_arn: &str,
        query: &IndexQuery,
    ) -> StateResult<Vec<TaskDrainRecord>> {
        let states: Vec<DrainState> = match query.state {
            Some(s) => vec![s],
            None => DrainState::ALL.to_vec(),
        };
        let since = query.started_since.unwrap_or(0);

        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let index = txn.open_table(SERVICE_STATE_INDEX).map_err(map_err!(Table))?;
        let records = txn.open_table(DRAIN_RECORDS).map_err(map_err!(Table))?;

        let mut results = Vec::new();
        for state in states {
            let (lo, hi) = index_bounds(service_arn, state, since);
            for entry in index
                .range(lo.as_str()..hi.as_str())
                .map_err(map_err!(Read))?
            {
                let (_, task) = entry.map_err(map_err!(Read))?;
                if let Some(guard) = records.get(task.value()).map_err(map_err!(Read))? {
                    let record: TaskDrainRecord =
                        serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                    results.push(record);
                }
            }
        }
        Ok(results)
    }

    /// Count index entries matching `query` for a service.
    pub fn count_service(&self, service_arn: &str, query: &IndexQuery) -> StateResult<usize> {
        Ok(self.query_service(service_arn, query)?.len())
    }

    /// List every record in a given state, across services.
    pub fn list_in_state(&self, state: DrainState) -> StateResult<Vec<TaskDrainRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DRAIN_RECORDS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: TaskDrainRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if record.state == state {
                results.push(record);
            }
        }
        Ok(results)
    }
}

fn read_in_txn(txn: &WriteTransaction, task_arn: &str) -> StateResult<Option<TaskDrainRecord>> {
    let table = txn.open_table(DRAIN_RECORDS).map_err(map_err!(Table))?;
    let record = match table.get(task_arn).map_err(map_err!(Read))? {
        Some(guard) => Some(
            serde_json::from_slice::<TaskDrainRecord>(guard.value())
                .map_err(map_err!(Deserialize))?,
        ),
        None => None,
    };
    Ok(record)
}

fn write_in_txn(
    txn: &WriteTransaction,
    task_arn: &str,
    previous: Option<&TaskDrainRecord>,
    update: &RecordUpdate,
) -> StateResult<TaskDrainRecord> {
    let mut next = previous
        .cloned()
        .unwrap_or_else(|| TaskDrainRecord::new(task_arn));
    update.apply_to(&mut next);

    let value = serde_json::to_vec(&next).map_err(map_err!(Serialize))?;
    {
        let mut table = txn.open_table(DRAIN_RECORDS).map_err(map_err!(Table))?;
        table
            .insert(task_arn, value.as_slice())
            .map_err(map_err!(Write))?;
    }
    {
        let mut index = txn.open_table(SERVICE_STATE_INDEX).map_err(map_err!(Table))?;
        if let Some(old_key) = previous.and_then(TaskDrainRecord::index_key) {
            index.remove(old_key.as_str()).map_err(map_err!(Write))?;
        }
        if let Some(new_key) = next.index_key() {
            index
                .insert(new_key.as_str(), task_arn)
                .map_err(map_err!(Write))?;
        }
    }
    Ok(next)
}

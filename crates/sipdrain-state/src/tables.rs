//! redb table definitions for the drain-record store.
//!
//! Records are JSON-serialized into `&[u8]` values keyed by task ARN.
//! The secondary index stores `{service_arn}|{STATE}|{started_at:020}|{task_arn}`
//! keys so per-service, per-state range scans come back ordered by start time.

use redb::TableDefinition;

/// Drain records keyed by `{task_arn}`.
pub const DRAIN_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("drain_records");

/// Secondary index keyed by `{service_arn}|{state}|{started_at}|{task_arn}`; value is the task ARN.
pub const SERVICE_STATE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("service_state_index");

pub(crate) const INDEX_SEPARATOR: char = '|';

/// Sorts after every zero-padded timestamp digit.
pub(crate) const INDEX_UPPER_SENTINEL: char = '~';

//! Pending entity syncs, one row per `(entity_type, entity_index)`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::{EntityKey, EntityType, SyncQueueItem};
use crate::store::{Result, StoreError, from_millis, to_millis};

/// Insert a fresh item or refresh an existing one.
///
/// An existing row keeps its retry count, is made due at `now`, and only ever raises its
/// `min_last_sync`.
pub fn upsert(conn: &Connection, key: EntityKey, min_last_sync: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
	conn.execute(
		"INSERT INTO sync_queue (entity_type, entity_index, sync_at, retry_count, min_last_sync)
		 VALUES (?1, ?2, ?3, 0, ?4)
		 ON CONFLICT(entity_type, entity_index) DO UPDATE SET
		  sync_at = excluded.sync_at,
		  min_last_sync = MAX(sync_queue.min_last_sync, excluded.min_last_sync)",
		rusqlite::params![
			key.entity_type.as_str(),
			key.index as i64,
			to_millis(now),
			to_millis(min_last_sync),
		],
	)?;
	Ok(())
}

/// The item with the earliest `sync_at`, due or not.
pub fn peek_earliest(conn: &Connection) -> Result<Option<SyncQueueItem>> {
	conn.query_row(
		"SELECT id, entity_type, entity_index, sync_at, retry_count, min_last_sync
		 FROM sync_queue ORDER BY sync_at ASC, id ASC LIMIT 1",
		[],
		|row| Ok(read_row(row)),
	)
	.optional()?
	.transpose()
}

pub fn get(conn: &Connection, key: EntityKey) -> Result<Option<SyncQueueItem>> {
	conn.query_row(
		"SELECT id, entity_type, entity_index, sync_at, retry_count, min_last_sync
		 FROM sync_queue WHERE entity_type = ?1 AND entity_index = ?2",
		rusqlite::params![key.entity_type.as_str(), key.index as i64],
		|row| Ok(read_row(row)),
	)
	.optional()?
	.transpose()
}

fn read_row(row: &Row<'_>) -> Result<SyncQueueItem> {
	let entity_type: String = row.get(1)?;
	Ok(SyncQueueItem {
		id: row.get(0)?,
		entity_type: entity_type.parse::<EntityType>().map_err(StoreError::Serialization)?,
		entity_index: row.get::<_, i64>(2)? as u64,
		sync_at: from_millis(row.get(3)?)?,
		retry_count: row.get(4)?,
		min_last_sync: from_millis(row.get(5)?)?,
	})
}

/// Delete the row for `key` if `last_sync` satisfies its freshness requirement.
///
/// Returns the number of rows removed.
pub fn delete_if_satisfied(conn: &Connection, key: EntityKey, last_sync: DateTime<Utc>) -> Result<usize> {
	Ok(conn.execute(
		"DELETE FROM sync_queue
		 WHERE entity_type = ?1 AND entity_index = ?2 AND min_last_sync <= ?3",
		rusqlite::params![key.entity_type.as_str(), key.index as i64, to_millis(last_sync)],
	)?)
}

pub fn reschedule(conn: &Connection, id: i64, retry_count: u32, sync_at: DateTime<Utc>) -> Result<()> {
	conn.execute(
		"UPDATE sync_queue SET retry_count = ?1, sync_at = ?2 WHERE id = ?3",
		rusqlite::params![retry_count, to_millis(sync_at), id],
	)?;
	Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
	conn.execute("DELETE FROM sync_queue WHERE id = ?1", [id])?;
	Ok(())
}

pub fn count(conn: &Connection) -> Result<u64> {
	let n: i64 = conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
	Ok(n as u64)
}

//! Pending webhook deliveries.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::model::NotificationQueueItem;
use crate::store::{Result, from_millis, to_millis};

pub fn insert(conn: &Connection, order_activity_id: i64, tx_time: DateTime<Utc>, payload: &str) -> Result<i64> {
	conn.execute(
		"INSERT INTO notification_queue (order_activity_id, tx_time, payload) VALUES (?1, ?2, ?3)",
		rusqlite::params![order_activity_id, to_millis(tx_time), payload],
	)?;
	Ok(conn.last_insert_rowid())
}

/// Oldest items by transaction time.
pub fn list_oldest(conn: &Connection, limit: usize) -> Result<Vec<NotificationQueueItem>> {
	let mut stmt = conn.prepare(
		"SELECT id, order_activity_id, tx_time, payload FROM notification_queue
		 ORDER BY tx_time ASC, id ASC LIMIT ?1",
	)?;
	let rows = stmt
		.query_map([limit as i64], |row| {
			Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?, row.get::<_, String>(3)?))
		})?
		.collect::<std::result::Result<Vec<_>, _>>()?;

	rows.into_iter()
		.map(|(id, order_activity_id, tx_time, payload)| -> Result<NotificationQueueItem> {
			Ok(NotificationQueueItem {
				id,
				order_activity_id,
				tx_time: from_millis(tx_time)?,
				payload,
			})
		})
		.collect()
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
	conn.execute("DELETE FROM notification_queue WHERE id = ?1", [id])?;
	Ok(())
}

pub fn count(conn: &Connection) -> Result<u64> {
	let n: i64 = conn.query_row("SELECT COUNT(*) FROM notification_queue", [], |row| row.get(0))?;
	Ok(n as u64)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{OrderActivity, OrderOp, SenderRole};
	use crate::store::queries::activities;

	fn seed_activity(conn: &Connection, tx_lt: u64) -> i64 {
		activities::insert(
			conn,
			&OrderActivity {
				id: None,
				order_index: 1,
				tx_lt,
				tx_hash: "h".to_string(),
				timestamp: DateTime::UNIX_EPOCH,
				op_code: OrderOp::Unknown,
				sender_address: None,
				sender_role: SenderRole::Unknown,
				amount: None,
			},
		)
		.unwrap()
		.unwrap()
	}

	#[test]
	fn test_oldest_first_and_delete() {
		let conn = crate::store::open_memory().unwrap();
		let a = seed_activity(&conn, 1);
		let b = seed_activity(&conn, 2);
		insert(&conn, a, DateTime::from_timestamp(200, 0).unwrap(), "{}").unwrap();
		let first = insert(&conn, b, DateTime::from_timestamp(100, 0).unwrap(), "{}").unwrap();

		let items = list_oldest(&conn, 10).unwrap();
		assert_eq!(items.len(), 2);
		assert_eq!(items[0].id, first);
		assert_eq!(items[0].order_activity_id, b);
		assert_eq!(list_oldest(&conn, 1).unwrap().len(), 1);

		delete(&conn, first).unwrap();
		assert_eq!(count(&conn).unwrap(), 1);
	}

	#[test]
	fn test_one_notification_per_activity() {
		let conn = crate::store::open_memory().unwrap();
		let a = seed_activity(&conn, 1);
		insert(&conn, a, DateTime::UNIX_EPOCH, "{}").unwrap();
		assert!(insert(&conn, a, DateTime::UNIX_EPOCH, "{}").is_err());
	}
}

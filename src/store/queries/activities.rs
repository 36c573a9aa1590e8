//! Decoded order operations, unique per `(order_index, tx_lt)`.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::{OrderActivity, OrderOp, SenderRole};
use crate::store::{Result, StoreError, from_millis, to_millis};

/// Insert an activity unless one already exists for its `(order_index, tx_lt)`.
///
/// Returns the new row id on first insertion, `None` for a duplicate.
pub fn insert(conn: &Connection, activity: &OrderActivity) -> Result<Option<i64>> {
	let changed = conn.execute(
		"INSERT OR IGNORE INTO order_activities
		 (order_index, tx_lt, tx_hash, timestamp, op_code, sender_address, sender_role, amount)
		 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
		rusqlite::params![
			activity.order_index as i64,
			activity.tx_lt as i64,
			activity.tx_hash,
			to_millis(activity.timestamp),
			activity.op_code.as_str(),
			activity.sender_address,
			activity.sender_role.as_str(),
			activity.amount.map(|a| a.to_string()),
		],
	)?;
	Ok((changed > 0).then(|| conn.last_insert_rowid()))
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<OrderActivity>> {
	conn.query_row(
		"SELECT id, order_index, tx_lt, tx_hash, timestamp, op_code, sender_address, sender_role, amount
		 FROM order_activities WHERE id = ?1",
		[id],
		|row| Ok(read_row(row)),
	)
	.optional()?
	.transpose()
}

#[cfg(test)]
pub fn list_for_order(conn: &Connection, order_index: u64) -> Result<Vec<OrderActivity>> {
	let mut stmt = conn.prepare(
		"SELECT id, order_index, tx_lt, tx_hash, timestamp, op_code, sender_address, sender_role, amount
		 FROM order_activities WHERE order_index = ?1 ORDER BY tx_lt ASC",
	)?;
	let rows = stmt
		.query_map([order_index as i64], |row| Ok(read_row(row)))?
		.collect::<std::result::Result<Vec<_>, _>>()?;
	rows.into_iter().collect()
}

fn read_row(row: &Row<'_>) -> Result<OrderActivity> {
	let op_code: String = row.get(5)?;
	let sender_role: String = row.get(7)?;
	let amount = row
		.get::<_, Option<String>>(8)?
		.map(|a| {
			a.parse::<u128>()
				.map_err(|e| StoreError::Serialization(format!("amount '{a}': {e}")))
		})
		.transpose()?;

	Ok(OrderActivity {
		id: Some(row.get(0)?),
		order_index: row.get::<_, i64>(1)? as u64,
		tx_lt: row.get::<_, i64>(2)? as u64,
		tx_hash: row.get(3)?,
		timestamp: from_millis(row.get(4)?)?,
		op_code: OrderOp::parse(&op_code),
		sender_address: row.get(6)?,
		sender_role: parse_role(&sender_role),
		amount,
	})
}

fn parse_role(s: &str) -> SenderRole {
	[
		SenderRole::Customer,
		SenderRole::Freelancer,
		SenderRole::Admin,
		SenderRole::Master,
	]
	.into_iter()
	.find(|role| role.as_str() == s)
	.unwrap_or(SenderRole::Unknown)
}

//! Checkpoint settings. Rows are overwritten, never deleted.

use rusqlite::{Connection, OptionalExtension};

use crate::store::{Result, StoreError};

pub const MASTER_ADDRESS: &str = "master_address";
pub const MASTER_CONTENT_HASH: &str = "master_content_hash";
pub const MASTER_LAST_TX_LT: &str = "master_last_tx_lt";
pub const NEXT_ADMIN_INDEX: &str = "next_admin_index";
pub const NEXT_USER_INDEX: &str = "next_user_index";
pub const NEXT_ORDER_INDEX: &str = "next_order_index";
pub const LAST_PROCESSED_SEQNO: &str = "last_processed_seqno";
pub const NOTIFICATIONS_IGNORE_BEFORE: &str = "notifications_ignore_before";

pub fn get(conn: &Connection, key: &str) -> Result<String> {
	get_opt(conn, key)?.ok_or_else(|| StoreError::NotFound(format!("setting '{key}'")))
}

pub fn get_opt(conn: &Connection, key: &str) -> Result<Option<String>> {
	Ok(conn
		.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
		.optional()?)
}

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
	conn.execute(
		"INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
		rusqlite::params![key, value],
	)?;
	Ok(())
}

/// Get a setting as u64, defaulting to `default` if not found.
pub fn get_u64(conn: &Connection, key: &str, default: u64) -> Result<u64> {
	match get_opt(conn, key)? {
		Some(v) => v
			.parse()
			.map_err(|e: std::num::ParseIntError| StoreError::Serialization(format!("setting '{key}': {e}"))),
		None => Ok(default),
	}
}

pub fn set_u64(conn: &Connection, key: &str, value: u64) -> Result<()> {
	set(conn, key, &value.to_string())
}

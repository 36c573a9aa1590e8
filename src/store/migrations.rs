//! Forward-only migrations keyed on `PRAGMA user_version`.

use rusqlite::Connection;

use super::queries::settings;
use super::{Result, SCHEMA_VERSION, StoreError, schema};

pub fn run(conn: &Connection) -> Result<()> {
	let current_version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

	if current_version == 0 {
		tracing::info!("Initializing database schema v{SCHEMA_VERSION}");
		conn.execute_batch(schema::SCHEMA_V1)?;
		insert_default_settings(conn)?;
		conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
	} else if current_version < SCHEMA_VERSION {
		for version in (current_version + 1)..=SCHEMA_VERSION {
			tracing::info!("Running migration to v{version}");
			run_migration(conn, version)?;
			conn.pragma_update(None, "user_version", version)?;
		}
	} else if current_version > SCHEMA_VERSION {
		return Err(StoreError::Migration(format!(
			"Database version {current_version} is newer than supported {SCHEMA_VERSION}"
		)));
	}

	Ok(())
}

/// Cursors start at zero; identity settings stay unset until first use.
fn insert_default_settings(conn: &Connection) -> Result<()> {
	let defaults = [
		settings::NEXT_ADMIN_INDEX,
		settings::NEXT_USER_INDEX,
		settings::NEXT_ORDER_INDEX,
		settings::MASTER_LAST_TX_LT,
		settings::LAST_PROCESSED_SEQNO,
	];

	let mut stmt = conn.prepare("INSERT OR IGNORE INTO settings (key, value) VALUES (?1, '0')")?;
	for key in defaults {
		stmt.execute([key])?;
	}
	Ok(())
}

fn run_migration(_conn: &Connection, version: u32) -> Result<()> {
	Err(StoreError::Migration(format!(
		"Unknown migration version: {version}"
	)))
}

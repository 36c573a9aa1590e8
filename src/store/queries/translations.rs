//! Translation cache keyed by `(content_hash, language)`.

use rusqlite::{Connection, OptionalExtension};

use crate::store::Result;

pub fn get(conn: &Connection, content_hash: &str, language: &str) -> Result<Option<String>> {
	Ok(conn
		.query_row(
			"SELECT text FROM translations WHERE content_hash = ?1 AND language = ?2",
			[content_hash, language],
			|row| row.get(0),
		)
		.optional()?)
}

pub fn exists(conn: &Connection, content_hash: &str, language: &str) -> Result<bool> {
	Ok(get(conn, content_hash, language)?.is_some())
}

pub fn put(conn: &Connection, content_hash: &str, language: &str, text: &str) -> Result<()> {
	conn.execute(
		"INSERT OR REPLACE INTO translations (content_hash, language, text) VALUES (?1, ?2, ?3)",
		[content_hash, language, text],
	)?;
	Ok(())
}

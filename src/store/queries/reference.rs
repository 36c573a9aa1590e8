//! Category and language reference tables, replaced wholesale from master storage.

use rusqlite::Connection;

use crate::model::{Category, Language};
use crate::store::Result;

pub fn replace_categories(conn: &Connection, categories: &[Category]) -> Result<()> {
	conn.execute("DELETE FROM categories", [])?;
	let mut stmt = conn.prepare("INSERT OR REPLACE INTO categories (id, name) VALUES (?1, ?2)")?;
	for category in categories {
		stmt.execute(rusqlite::params![category.id, category.name])?;
	}
	Ok(())
}

pub fn replace_languages(conn: &Connection, languages: &[Language]) -> Result<()> {
	conn.execute("DELETE FROM languages", [])?;
	let mut stmt = conn.prepare("INSERT OR REPLACE INTO languages (id, code) VALUES (?1, ?2)")?;
	for language in languages {
		stmt.execute(rusqlite::params![language.id, language.code])?;
	}
	Ok(())
}

#[cfg(test)]
pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
	let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id")?;
	let rows = stmt
		.query_map([], |row| {
			Ok(Category {
				id: row.get(0)?,
				name: row.get(1)?,
			})
		})?
		.collect::<std::result::Result<Vec<_>, _>>()?;
	Ok(rows)
}

pub fn list_languages(conn: &Connection) -> Result<Vec<Language>> {
	let mut stmt = conn.prepare("SELECT id, code FROM languages ORDER BY id")?;
	let rows = stmt
		.query_map([], |row| {
			Ok(Language {
				id: row.get(0)?,
				code: row.get(1)?,
			})
		})?
		.collect::<std::result::Result<Vec<_>, _>>()?;
	Ok(rows)
}

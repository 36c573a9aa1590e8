//! Admin, user and order rows.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::content::ItemContent;
use crate::model::{Entity, EntityKey, EntityType};
use crate::store::{Result, StoreError, from_millis, to_millis};

/// Insert or overwrite the row keyed by `(entity_type, index)`.
pub fn upsert<C: ItemContent>(conn: &Connection, entity: &Entity<C>) -> Result<()> {
	let content = entity.content.as_ref().map(serde_json::to_string).transpose()?;
	let text_hashes = serde_json::to_string(&entity.text_hashes)?;
	let (status, freelancer) = match &entity.content {
		Some(c) => (c.status(), c.freelancer()),
		None => (None, None),
	};

	conn.execute(
		"INSERT INTO entities
		 (entity_type, idx, address, owner, last_tx_lt, last_tx_hash, last_sync, created_at,
		  content, text_hashes, needs_translation, status, freelancer)
		 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
		 ON CONFLICT(entity_type, idx) DO UPDATE SET
		  address = excluded.address,
		  owner = excluded.owner,
		  last_tx_lt = excluded.last_tx_lt,
		  last_tx_hash = excluded.last_tx_hash,
		  last_sync = excluded.last_sync,
		  created_at = excluded.created_at,
		  content = excluded.content,
		  text_hashes = excluded.text_hashes,
		  needs_translation = excluded.needs_translation,
		  status = excluded.status,
		  freelancer = excluded.freelancer",
		rusqlite::params![
			C::ENTITY_TYPE.as_str(),
			entity.index as i64,
			entity.address,
			entity.owner,
			entity.last_tx_lt as i64,
			entity.last_tx_hash,
			to_millis(entity.last_sync),
			entity.created_at.map(to_millis),
			content,
			text_hashes,
			entity.needs_translation,
			status,
			freelancer,
		],
	)?;
	Ok(())
}

/// Insert a placeholder row unless one already exists for the key.
///
/// Returns whether a row was inserted.
pub fn insert_placeholder<C: ItemContent>(conn: &Connection, index: u64, address: &str) -> Result<bool> {
	let changed = conn.execute(
		"INSERT OR IGNORE INTO entities (entity_type, idx, address) VALUES (?1, ?2, ?3)",
		rusqlite::params![C::ENTITY_TYPE.as_str(), index as i64, address],
	)?;
	Ok(changed > 0)
}

pub fn get<C: ItemContent>(conn: &Connection, index: u64) -> Result<Option<Entity<C>>> {
	conn.query_row(
		"SELECT idx, address, owner, last_tx_lt, last_tx_hash, last_sync, created_at,
		        content, text_hashes, needs_translation
		 FROM entities WHERE entity_type = ?1 AND idx = ?2",
		rusqlite::params![C::ENTITY_TYPE.as_str(), index as i64],
		|row| Ok(read_row(row)),
	)
	.optional()?
	.transpose()
}

fn read_row<C: ItemContent>(row: &Row<'_>) -> Result<Entity<C>> {
	let content: Option<String> = row.get(7)?;
	let text_hashes: String = row.get(8)?;
	Ok(Entity {
		index: row.get::<_, i64>(0)? as u64,
		address: row.get(1)?,
		owner: row.get(2)?,
		last_tx_lt: row.get::<_, i64>(3)? as u64,
		last_tx_hash: row.get(4)?,
		last_sync: from_millis(row.get(5)?)?,
		created_at: row.get::<_, Option<i64>>(6)?.map(from_millis).transpose()?,
		content: content.as_deref().map(serde_json::from_str).transpose()?,
		text_hashes: serde_json::from_str(&text_hashes)?,
		needs_translation: row.get(9)?,
	})
}

/// Resolve a raw address to the item stored under it, if any.
pub fn find_by_address(conn: &Connection, address: &str) -> Result<Option<EntityKey>> {
	conn.query_row(
		"SELECT entity_type, idx FROM entities WHERE address = ?1 AND entity_type != 'master'",
		[address],
		|row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
	)
	.optional()?
	.map(|(entity_type, idx)| parse_key(&entity_type, idx))
	.transpose()
}

fn parse_key(entity_type: &str, idx: i64) -> Result<EntityKey> {
	let entity_type = entity_type.parse::<EntityType>().map_err(StoreError::Serialization)?;
	Ok(EntityKey::new(entity_type, idx as u64))
}

/// Flag every synced entity of the given type for re-translation. Returns the rows touched.
pub fn flag_needs_translation(conn: &Connection, entity_type: EntityType) -> Result<usize> {
	Ok(conn.execute(
		"UPDATE entities SET needs_translation = 1
		 WHERE entity_type = ?1 AND content IS NOT NULL AND text_hashes != '[]'",
		[entity_type.as_str()],
	)?)
}

/// Flagged entities, never-attempted ones first, then by oldest failed attempt.
pub fn list_needing_translation(conn: &Connection, limit: usize) -> Result<Vec<EntityKey>> {
	let mut stmt = conn.prepare(
		"SELECT entity_type, idx FROM entities
		 WHERE needs_translation = 1
		 ORDER BY COALESCE(translation_attempted_at, 0), entity_type, idx
		 LIMIT ?1",
	)?;
	let rows = stmt
		.query_map([limit as i64], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
		.collect::<std::result::Result<Vec<_>, _>>()?;

	rows.into_iter()
		.map(|(entity_type, idx)| parse_key(&entity_type, idx))
		.collect()
}

/// Clear the flag if the stored text is still the one that was translated.
///
/// Returns `false` when `text_hashes` changed in the meantime; the flag then stays set.
pub fn clear_needs_translation(conn: &Connection, key: EntityKey, text_hashes: &[String]) -> Result<bool> {
	let changed = conn.execute(
		"UPDATE entities SET needs_translation = 0, translation_attempted_at = NULL
		 WHERE entity_type = ?1 AND idx = ?2 AND text_hashes = ?3",
		rusqlite::params![
			key.entity_type.as_str(),
			key.index as i64,
			serde_json::to_string(text_hashes)?,
		],
	)?;
	Ok(changed > 0)
}

/// Record a failed translation attempt, moving the entity behind untried ones.
pub fn mark_translation_attempt(conn: &Connection, key: EntityKey, at: DateTime<Utc>) -> Result<()> {
	conn.execute(
		"UPDATE entities SET translation_attempted_at = ?3 WHERE entity_type = ?1 AND idx = ?2",
		rusqlite::params![key.entity_type.as_str(), key.index as i64, to_millis(at)],
	)?;
	Ok(())
}

pub fn count(conn: &Connection, entity_type: EntityType) -> Result<u64> {
	let n: i64 = conn.query_row(
		"SELECT COUNT(*) FROM entities WHERE entity_type = ?1",
		[entity_type.as_str()],
		|row| row.get(0),
	)?;
	Ok(n as u64)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::content::{OrderContent, OrderStatus, UserContent};
	use crate::model::{Order, User};

	fn test_db() -> Connection {
		crate::store::open_memory().expect("open test db")
	}

	#[test]
	fn test_placeholder_then_upsert() {
		let conn = test_db();
		assert!(insert_placeholder::<OrderContent>(&conn, 5, "0:05").unwrap());
		assert!(!insert_placeholder::<OrderContent>(&conn, 5, "0:05").unwrap());

		let placeholder = get::<OrderContent>(&conn, 5).unwrap().unwrap();
		assert_eq!(placeholder, Order::placeholder(5, "0:05".to_string()));

		let mut order = placeholder;
		order.apply_content(OrderContent {
			name: Some("Logo".to_string()),
			status: OrderStatus::Assigned,
			freelancer: Some("0:ff".to_string()),
			..OrderContent::default()
		});
		order.last_tx_lt = 1000;
		order.last_tx_hash = Some("abc".to_string());
		order.last_sync = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
		order.created_at = Some(DateTime::from_timestamp(1_600_000_000, 0).unwrap());
		upsert(&conn, &order).unwrap();

		assert_eq!(get::<OrderContent>(&conn, 5).unwrap().unwrap(), order);
		let (status, freelancer): (String, String) = conn
			.query_row(
				"SELECT status, freelancer FROM entities WHERE entity_type = 'order' AND idx = 5",
				[],
				|row| Ok((row.get(0)?, row.get(1)?)),
			)
			.unwrap();
		assert_eq!(status, "assigned");
		assert_eq!(freelancer, "0:ff");
	}

	#[test]
	fn test_types_do_not_collide() {
		let conn = test_db();
		insert_placeholder::<OrderContent>(&conn, 1, "0:01").unwrap();
		insert_placeholder::<UserContent>(&conn, 1, "0:02").unwrap();
		assert_eq!(get::<UserContent>(&conn, 1).unwrap().unwrap().address, "0:02");
		assert!(get::<UserContent>(&conn, 2).unwrap().is_none());
		assert_eq!(count(&conn, EntityType::Order).unwrap(), 1);
	}

	#[test]
	fn test_find_by_address() {
		let conn = test_db();
		insert_placeholder::<UserContent>(&conn, 3, "0:33").unwrap();
		assert_eq!(
			find_by_address(&conn, "0:33").unwrap(),
			Some(EntityKey::new(EntityType::User, 3))
		);
		assert_eq!(find_by_address(&conn, "0:44").unwrap(), None);
	}

	#[test]
	fn test_translation_flags() {
		let conn = test_db();
		let mut user = User::placeholder(1, "0:01".to_string());
		user.apply_content(UserContent {
			about: Some("hi".to_string()),
			..UserContent::default()
		});
		user.needs_translation = false;
		upsert(&conn, &user).unwrap();
		insert_placeholder::<UserContent>(&conn, 2, "0:02").unwrap();

		assert!(list_needing_translation(&conn, 10).unwrap().is_empty());
		assert_eq!(flag_needs_translation(&conn, EntityType::User).unwrap(), 1);
		let pending = list_needing_translation(&conn, 10).unwrap();
		assert_eq!(pending, vec![EntityKey::new(EntityType::User, 1)]);

		assert!(!clear_needs_translation(&conn, pending[0], &[]).unwrap());
		assert!(clear_needs_translation(&conn, pending[0], &user.text_hashes).unwrap());
		assert!(list_needing_translation(&conn, 10).unwrap().is_empty());
	}

	#[test]
	fn test_failed_attempts_go_to_the_back() {
		let conn = test_db();
		for index in 0..3 {
			let mut user = User::placeholder(index, format!("0:{index:02}"));
			user.apply_content(UserContent {
				about: Some(format!("text {index}")),
				..UserContent::default()
			});
			upsert(&conn, &user).unwrap();
		}
		let key = |index| EntityKey::new(EntityType::User, index);
		mark_translation_attempt(&conn, key(0), DateTime::from_timestamp(200, 0).unwrap()).unwrap();
		mark_translation_attempt(&conn, key(1), DateTime::from_timestamp(100, 0).unwrap()).unwrap();
		assert_eq!(list_needing_translation(&conn, 10).unwrap(), vec![key(2), key(1), key(0)]);

		// A successful clear forgets the attempt.
		let hashes = get::<UserContent>(&conn, 1).unwrap().unwrap().text_hashes;
		assert!(clear_needs_translation(&conn, key(1), &hashes).unwrap());
		flag_needs_translation(&conn, EntityType::User).unwrap();
		assert_eq!(list_needing_translation(&conn, 10).unwrap(), vec![key(1), key(2), key(0)]);
	}
}

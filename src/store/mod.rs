//! Durable state in a single SQLite database.
//!
//! - WAL mode, foreign keys enforced
//! - Timestamps stored as Unix milliseconds
//! - Schema version in `PRAGMA user_version`
//!
//! Query functions are free functions in [`queries`] taking a `&Connection`; [`Store`] is the
//! shared handle the recurring tasks pass around.

pub mod migrations;
pub mod queries;
pub mod schema;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("SQLite error: {0}")]
	Sqlite(#[from] rusqlite::Error),

	#[error("migration failed: {0}")]
	Migration(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("serialization error: {0}")]
	Serialization(String),

	#[error("store lock poisoned")]
	Poisoned,
}

impl From<serde_json::Error> for StoreError {
	fn from(e: serde_json::Error) -> Self {
		StoreError::Serialization(e.to_string())
	}
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Open or create the database at the given path and run pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
	let conn = Connection::open(path)?;
	configure(&conn)?;
	migrations::run(&conn)?;
	Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
	let conn = Connection::open_in_memory()?;
	configure(&conn)?;
	migrations::run(&conn)?;
	Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
	conn.execute_batch(
		"PRAGMA journal_mode = WAL;
		 PRAGMA foreign_keys = ON;
		 PRAGMA busy_timeout = 5000;
		 PRAGMA synchronous = NORMAL;",
	)?;
	Ok(())
}

pub(crate) fn to_millis(t: DateTime<Utc>) -> i64 {
	t.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
	DateTime::from_timestamp_millis(ms)
		.ok_or_else(|| StoreError::Serialization(format!("timestamp {} out of range", ms)))
}

/// Cloneable handle to the shared connection.
///
/// Every call holds the lock for one short synchronous closure; no lock is held across an
/// await point.
#[derive(Clone)]
pub struct Store {
	conn: Arc<Mutex<Connection>>,
}

impl Store {
	pub fn new(conn: Connection) -> Self {
		Self {
			conn: Arc::new(Mutex::new(conn)),
		}
	}

	pub fn open(path: &Path) -> Result<Self> {
		open(path).map(Self::new)
	}

	pub fn open_memory() -> Result<Self> {
		open_memory().map(Self::new)
	}

	/// Run `f` against the connection.
	pub fn with<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
		let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
		f(&conn)
	}

	/// Run `f` inside a transaction, committing only if it succeeds.
	pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
		let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
		let tx = conn.transaction()?;
		let value = f(&tx)?;
		tx.commit()?;
		Ok(value)
	}
}

use crate::content::{AdminContent, ItemContent, OrderContent, UserContent, text_hash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
	Admin,
	User,
	Order,
	Master,
}

impl EntityType {
	/// Item types discovered through the master contract.
	pub const ITEMS: [EntityType; 3] = [EntityType::Admin, EntityType::User, EntityType::Order];

	pub fn as_str(&self) -> &'static str {
		match self {
			EntityType::Admin => "admin",
			EntityType::User => "user",
			EntityType::Order => "order",
			EntityType::Master => "master",
		}
	}
}

impl fmt::Display for EntityType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EntityType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"admin" => Ok(EntityType::Admin),
			"user" => Ok(EntityType::User),
			"order" => Ok(EntityType::Order),
			"master" => Ok(EntityType::Master),
			other => Err(format!("unknown entity type '{}'", other)),
		}
	}
}

/// Natural identity of a synced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
	pub entity_type: EntityType,
	pub index: u64,
}

impl EntityKey {
	pub fn new(entity_type: EntityType, index: u64) -> Self {
		Self { entity_type, index }
	}

	/// The singleton key of the master contract.
	pub fn master() -> Self {
		Self::new(EntityType::Master, 0)
	}
}

impl fmt::Display for EntityKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.entity_type, self.index)
	}
}

/// Common surface of everything materialized from an item contract.
pub trait BlockchainEntity {
	fn entity_type(&self) -> EntityType;
	fn index(&self) -> u64;
	fn address(&self) -> &str;
	fn last_tx_lt(&self) -> u64;
	fn last_tx_hash(&self) -> Option<&str>;
	fn last_sync(&self) -> DateTime<Utc>;

	fn key(&self) -> EntityKey {
		EntityKey::new(self.entity_type(), self.index())
	}
}

/// Stored item contract. `content` is `None` for placeholders that have not been synced yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity<C> {
	pub index: u64,
	pub address: String,
	pub owner: Option<String>,
	pub last_tx_lt: u64,
	pub last_tx_hash: Option<String>,
	pub last_sync: DateTime<Utc>,
	/// Creation time, backfilled from the order's deploy transaction.
	pub created_at: Option<DateTime<Utc>>,
	pub content: Option<C>,
	/// Content hashes of the translatable text in `content`.
	pub text_hashes: Vec<String>,
	pub needs_translation: bool,
}

pub type Admin = Entity<AdminContent>;
pub type User = Entity<UserContent>;
pub type Order = Entity<OrderContent>;

impl<C: ItemContent> Entity<C> {
	/// A row for an item whose address is known but whose state has not been fetched.
	pub fn placeholder(index: u64, address: String) -> Self {
		Self {
			index,
			address,
			owner: None,
			last_tx_lt: 0,
			last_tx_hash: None,
			last_sync: DateTime::UNIX_EPOCH,
			created_at: None,
			content: None,
			text_hashes: Vec::new(),
			needs_translation: false,
		}
	}

	/// Replace the content, flagging the entity for translation when its text changed.
	///
	/// Returns whether the translatable text changed.
	pub fn apply_content(&mut self, content: C) -> bool {
		let changed = self
			.content
			.as_ref()
			.map(|old| old.translatable_texts() != content.translatable_texts())
			.unwrap_or(true);
		if changed {
			self.text_hashes = content
				.translatable_texts()
				.into_iter()
				.filter(|text| !text.is_empty())
				.map(text_hash)
				.collect();
			self.needs_translation = !self.text_hashes.is_empty();
		}
		self.content = Some(content);
		changed
	}
}

impl<C: ItemContent> BlockchainEntity for Entity<C> {
	fn entity_type(&self) -> EntityType {
		C::ENTITY_TYPE
	}

	fn index(&self) -> u64 {
		self.index
	}

	fn address(&self) -> &str {
		&self.address
	}

	fn last_tx_lt(&self) -> u64 {
		self.last_tx_lt
	}

	fn last_tx_hash(&self) -> Option<&str> {
		self.last_tx_hash.as_deref()
	}

	fn last_sync(&self) -> DateTime<Utc> {
		self.last_sync
	}
}

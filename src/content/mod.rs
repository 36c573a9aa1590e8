//! Typed content extraction from contract storage.
//!
//! Item contracts keep their user-facing properties in an on-chain metadata dictionary: a
//! `0x00` layout byte followed by a `HashmapE 256` whose keys are `sha256(property name)` and
//! whose values are referenced cells. The extractors in this module look up a fixed set of
//! property names and decode each value according to its known scalar type.
//!
//! An absent property yields `None`; a present but empty string yields `Some("")`. A value that
//! is present but malformed is an error, never a silent default.

mod admin;
mod item;
mod master;
mod order;
mod user;

pub use admin::AdminContent;
pub use item::{ItemContent, NftItemData, parse_item_data};
pub use master::{MasterData, parse_master_data};
pub use order::{OrderContent, OrderStatus};
pub use user::UserContent;

use crate::cell::{
	Cell, CellError, CellSlice, DictKey, Dictionary, load_snake_bytes, parse_dict_opt,
	resolve_value,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Layout byte of on-chain metadata.
const ONCHAIN_CONTENT_PREFIX: u64 = 0x00;
/// Layout byte that starts a snake-encoded string value.
const SNAKE_PREFIX: u8 = 0x00;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
	#[error("cell error: {0}")]
	Cell(#[from] CellError),

	#[error("property '{field}' is malformed: {source}")]
	Field {
		field: &'static str,
		#[source]
		source: CellError,
	},

	#[error("property '{field}' holds invalid UTF-8")]
	Utf8 { field: &'static str },

	#[error("property '{field}' holds an out-of-range timestamp {value}")]
	Timestamp { field: &'static str, value: u64 },

	#[error("unknown order status {0}")]
	Status(u8),

	#[error("unsupported content layout 0x{0:02x}")]
	UnsupportedLayout(u64),

	#[error("item is not initialized")]
	Uninitialized,
}

/// Dictionary key of a property: the sha256 of its ASCII name.
pub fn property_key(name: &str) -> DictKey {
	DictKey::from_hash(&Sha256::digest(name.as_bytes()).into())
}

/// `0x`-prefixed lower-case hex of a 32-byte hash.
pub fn format_hash(hash: &[u8; 32]) -> String {
	format!("0x{}", hex::encode(hash))
}

/// Content hash of a piece of text, used as the translation cache key.
pub fn text_hash(text: &str) -> String {
	format_hash(&Sha256::digest(text.as_bytes()).into())
}

/// Decoded metadata dictionary with typed property accessors.
#[derive(Debug, Clone, Default)]
pub struct ContentDict {
	entries: Dictionary,
}

impl ContentDict {
	/// Decode an on-chain metadata cell.
	pub fn from_content_cell(cell: Arc<Cell>) -> Result<Self, ContentError> {
		let mut slice = CellSlice::new(cell);
		if slice.remaining_bits() == 0 {
			return Ok(Self::default());
		}
		let layout = slice.load_uint(8)?;
		if layout != ONCHAIN_CONTENT_PREFIX {
			return Err(ContentError::UnsupportedLayout(layout));
		}
		Ok(Self {
			entries: parse_dict_opt(&mut slice, 256)?,
		})
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn value(&self, field: &'static str) -> Result<Option<CellSlice>, ContentError> {
		self.entries
			.get(&property_key(field))
			.map(|value| resolve_value(value).map_err(|source| ContentError::Field { field, source }))
			.transpose()
	}

	pub fn get_bool(&self, field: &'static str) -> Result<Option<bool>, ContentError> {
		self.value(field)?
			.map(|mut v| v.load_bit().map_err(|source| ContentError::Field { field, source }))
			.transpose()
	}

	pub fn get_string(&self, field: &'static str) -> Result<Option<String>, ContentError> {
		self.value(field)?
			.map(|v| decode_string(field, v))
			.transpose()
	}

	pub fn get_coins(&self, field: &'static str) -> Result<Option<u128>, ContentError> {
		self.value(field)?
			.map(|mut v| v.load_coins().map_err(|source| ContentError::Field { field, source }))
			.transpose()
	}

	pub fn get_timestamp(&self, field: &'static str) -> Result<Option<DateTime<Utc>>, ContentError> {
		self.value(field)?
			.map(|mut v| {
				let secs = v
					.load_uint(32)
					.map_err(|source| ContentError::Field { field, source })?;
				DateTime::from_timestamp(secs as i64, 0)
					.ok_or(ContentError::Timestamp { field, value: secs })
			})
			.transpose()
	}

	/// A 256-bit hash value rendered as `0x`-prefixed lower-case hex.
	pub fn get_hash(&self, field: &'static str) -> Result<Option<String>, ContentError> {
		self.value(field)?
			.map(|mut v| {
				v.load_u256()
					.map(|hash| format_hash(&hash))
					.map_err(|source| ContentError::Field { field, source })
			})
			.transpose()
	}

	/// A nested `HashmapE 256` of hash → string, as used for reference tables.
	pub fn get_string_map(
		&self,
		field: &'static str,
	) -> Result<Option<Vec<(String, String)>>, ContentError> {
		let Some(mut value) = self.value(field)? else {
			return Ok(None);
		};
		let nested = if value.remaining_bits() == 0 && value.remaining_refs() == 0 {
			Dictionary::new()
		} else {
			parse_dict_opt(&mut value, 256).map_err(|source| ContentError::Field { field, source })?
		};

		let mut out = Vec::with_capacity(nested.len());
		for (key, entry) in nested {
			let hash = key.to_hash().ok_or_else(|| ContentError::Field {
				field,
				source: CellError::MalformedDictionary(format!("{}-bit key", key.len())),
			})?;
			let entry = resolve_value(&entry).map_err(|source| ContentError::Field { field, source })?;
			out.push((format_hash(&hash), decode_string(field, entry)?));
		}
		Ok(Some(out))
	}
}

fn decode_string(field: &'static str, value: CellSlice) -> Result<String, ContentError> {
	let mut bytes = load_snake_bytes(value).map_err(|source| ContentError::Field { field, source })?;
	if bytes.first() == Some(&SNAKE_PREFIX) {
		bytes.remove(0);
	}
	String::from_utf8(bytes).map_err(|_| ContentError::Utf8 { field })
}

#[cfg(test)]
pub(crate) mod fixtures {
	//! Builders for content cells used across the crate's tests.

	use super::*;
	use crate::cell::builder::{CellBuilder, LabelStyle, encode_dict_opt, snake_cell};

	pub(crate) use super::master::fixtures::master_cell;

	/// A property value as it would be stored on chain.
	pub enum Value {
		Bool(bool),
		Text(&'static str),
		Coins(u128),
		Timestamp(u32),
		Hash([u8; 32]),
		Map(Vec<([u8; 32], &'static str)>),
	}

	fn text_cell(text: &str) -> Arc<Cell> {
		let mut bytes = vec![SNAKE_PREFIX];
		bytes.extend_from_slice(text.as_bytes());
		snake_cell(&bytes, 100)
	}

	fn value_cell(value: &Value) -> Arc<Cell> {
		match value {
			Value::Bool(b) => CellBuilder::new().store_bit(*b).build(),
			Value::Text(t) => text_cell(t),
			Value::Coins(c) => CellBuilder::new().store_coins(*c).build(),
			Value::Timestamp(t) => CellBuilder::new().store_uint(u128::from(*t), 32).build(),
			Value::Hash(h) => CellBuilder::new().store_bytes(h).build(),
			Value::Map(entries) => {
				let entries: Vec<_> = entries
					.iter()
					.map(|(hash, text)| {
						(
							DictKey::from_hash(hash).bits().to_vec(),
							CellBuilder::new().store_ref(text_cell(text)),
						)
					})
					.collect();
				encode_dict_opt(&entries, 256, LabelStyle::Long).build()
			}
		}
	}

	/// Build an on-chain metadata cell holding the given properties.
	pub fn content_cell(properties: &[(&str, Value)]) -> Arc<Cell> {
		let entries: Vec<_> = properties
			.iter()
			.map(|(name, value)| {
				(
					property_key(name).bits().to_vec(),
					CellBuilder::new().store_ref(value_cell(value)),
				)
			})
			.collect();
		CellBuilder::new()
			.store_uint(0, 8)
			.append(encode_dict_opt(&entries, 256, LabelStyle::Short))
			.build()
	}
}

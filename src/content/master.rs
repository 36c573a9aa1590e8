use super::{ContentDict, ContentError};
use crate::cell::{Cell, CellSlice};
use crate::model::{Category, EntityType, Language};
use std::sync::Arc;

/// Decoded storage of the master (collection) contract.
///
/// Layout: `next_admin_index:uint64 next_user_index:uint64 next_order_index:uint64 ^content`,
/// where the content dictionary carries the `categories` and `languages` reference tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterData {
	pub next_admin_index: u64,
	pub next_user_index: u64,
	pub next_order_index: u64,
	pub categories: Vec<Category>,
	pub languages: Vec<Language>,
}

impl MasterData {
	/// First index not yet assigned by the contract for the given item type.
	pub fn next_index(&self, entity_type: EntityType) -> Option<u64> {
		match entity_type {
			EntityType::Admin => Some(self.next_admin_index),
			EntityType::User => Some(self.next_user_index),
			EntityType::Order => Some(self.next_order_index),
			EntityType::Master => None,
		}
	}
}

pub fn parse_master_data(data: Arc<Cell>) -> Result<MasterData, ContentError> {
	let mut slice = CellSlice::new(data);
	let next_admin_index = slice.load_uint(64)?;
	let next_user_index = slice.load_uint(64)?;
	let next_order_index = slice.load_uint(64)?;
	let content = ContentDict::from_content_cell(slice.load_ref()?)?;

	let categories = content
		.get_string_map("categories")?
		.unwrap_or_default()
		.into_iter()
		.map(|(id, name)| Category { id, name })
		.collect();
	let languages = content
		.get_string_map("languages")?
		.unwrap_or_default()
		.into_iter()
		.map(|(id, code)| Language { id, code })
		.collect();

	Ok(MasterData {
		next_admin_index,
		next_user_index,
		next_order_index,
		categories,
		languages,
	})
}

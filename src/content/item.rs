use super::{ContentDict, ContentError};
use crate::cell::{Address, Cell, CellSlice};
use crate::model::EntityType;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

/// Storage shared by every item contract under the master collection:
/// `init:int1 index:uint64 collection:MsgAddress owner:MsgAddress ^content`, followed by
/// type-specific fields left in `tail`.
#[derive(Debug, Clone)]
pub struct NftItemData {
	pub index: u64,
	pub collection: Option<Address>,
	pub owner: Option<Address>,
	pub content: ContentDict,
	pub tail: CellSlice,
}

pub fn parse_item_data(data: Arc<Cell>) -> Result<NftItemData, ContentError> {
	let mut slice = CellSlice::new(data);
	if !slice.load_bit()? {
		return Err(ContentError::Uninitialized);
	}
	let index = slice.load_uint(64)?;
	let collection = slice.load_address()?;
	let owner = slice.load_address()?;
	let content = ContentDict::from_content_cell(slice.load_ref()?)?;

	Ok(NftItemData {
		index,
		collection,
		owner,
		content,
		tail: slice,
	})
}

/// Typed content of one kind of item contract.
///
/// Implementations decode themselves from the metadata dictionary (plus any storage fields after
/// the content reference) and name the text fields that need translating.
pub trait ItemContent:
	Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static
{
	const ENTITY_TYPE: EntityType;

	fn decode(item: &mut NftItemData) -> Result<Self, ContentError>;

	/// User-visible text that is translated, in a stable order.
	fn translatable_texts(&self) -> Vec<&str>;

	/// Lifecycle status, stored in its own column for filtering.
	fn status(&self) -> Option<&'static str> {
		None
	}

	/// Assigned freelancer in raw form, stored in its own column for filtering.
	fn freelancer(&self) -> Option<&str> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cell::builder::CellBuilder;
	use crate::content::fixtures::{Value, content_cell};

	#[test]
	fn test_parse_item_data() {
		let collection = Address {
			workchain: 0,
			hash: [1; 32],
		};
		let owner = Address {
			workchain: 0,
			hash: [2; 32],
		};
		let data = CellBuilder::new()
			.store_bit(true)
			.store_uint(17, 64)
			.store_address(Some(&collection))
			.store_address(Some(&owner))
			.store_ref(content_cell(&[("nickname", Value::Text("bob"))]))
			.store_uint(3, 8)
			.build();

		let item = parse_item_data(data).unwrap();
		assert_eq!(item.index, 17);
		assert_eq!(item.collection, Some(collection));
		assert_eq!(item.owner, Some(owner));
		assert_eq!(item.content.len(), 1);
		assert_eq!(item.tail.remaining_bits(), 8);
	}

	#[test]
	fn test_uninitialized_item() {
		let data = CellBuilder::new().store_bit(false).store_uint(1, 64).build();
		assert!(matches!(parse_item_data(data), Err(ContentError::Uninitialized)));
	}
}

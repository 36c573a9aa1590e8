use super::{ContentError, ItemContent, NftItemData};
use crate::model::EntityType;
use serde::{Deserialize, Serialize};

/// Profile of a marketplace administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminContent {
	/// Category the admin moderates, as a `0x` hash.
	pub category: Option<String>,
	pub can_approve_user: bool,
	pub can_revoke_user: bool,
	pub nickname: Option<String>,
	pub about: Option<String>,
	pub website: Option<String>,
	pub telegram: Option<String>,
	pub timezone: Option<String>,
}

impl ItemContent for AdminContent {
	const ENTITY_TYPE: EntityType = EntityType::Admin;

	fn decode(item: &mut NftItemData) -> Result<Self, ContentError> {
		let dict = &item.content;
		Ok(Self {
			category: dict.get_hash("category")?,
			can_approve_user: dict.get_bool("can_approve_user")?.unwrap_or_default(),
			can_revoke_user: dict.get_bool("can_revoke_user")?.unwrap_or_default(),
			nickname: dict.get_string("nickname")?,
			about: dict.get_string("about")?,
			website: dict.get_string("website")?,
			telegram: dict.get_string("telegram")?,
			timezone: dict.get_string("timezone")?,
		})
	}

	fn translatable_texts(&self) -> Vec<&str> {
		self.about.as_deref().into_iter().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cell::builder::CellBuilder;
	use crate::content::fixtures::{Value, content_cell};
	use crate::content::parse_item_data;

	fn admin_item(properties: &[(&str, Value)]) -> NftItemData {
		let data = CellBuilder::new()
			.store_bit(true)
			.store_uint(0, 64)
			.store_address(None)
			.store_address(None)
			.store_ref(content_cell(properties))
			.build();
		parse_item_data(data).unwrap()
	}

	#[test]
	fn test_category_only() {
		let mut item = admin_item(&[("category", Value::Hash([0xaa; 32]))]);
		let content = AdminContent::decode(&mut item).unwrap();
		assert_eq!(
			content,
			AdminContent {
				category: Some(format!("0x{}", "aa".repeat(32))),
				..AdminContent::default()
			}
		);
		assert!(!content.can_approve_user);
		assert!(content.nickname.is_none());
		assert!(content.translatable_texts().is_empty());
	}

	#[test]
	fn test_full_profile() {
		let mut item = admin_item(&[
			("can_approve_user", Value::Bool(true)),
			("can_revoke_user", Value::Bool(false)),
			("nickname", Value::Text("moderator")),
			("about", Value::Text("I review design orders")),
			("timezone", Value::Text("UTC+3")),
		]);
		let content = AdminContent::decode(&mut item).unwrap();
		assert!(content.can_approve_user);
		assert!(!content.can_revoke_user);
		assert_eq!(content.nickname.as_deref(), Some("moderator"));
		assert_eq!(content.timezone.as_deref(), Some("UTC+3"));
		assert_eq!(content.translatable_texts(), vec!["I review design orders"]);
	}
}

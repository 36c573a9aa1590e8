use super::{ContentError, ItemContent, NftItemData};
use crate::model::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer or freelancer profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContent {
	pub is_user: bool,
	pub is_freelancer: bool,
	pub nickname: Option<String>,
	pub telegram: Option<String>,
	pub about: Option<String>,
	pub website: Option<String>,
	pub portfolio: Option<String>,
	pub resume: Option<String>,
	pub specialization: Option<String>,
	/// Preferred language, as a `0x` hash of its code.
	pub language: Option<String>,
	pub revoked_at: Option<DateTime<Utc>>,
}

impl ItemContent for UserContent {
	const ENTITY_TYPE: EntityType = EntityType::User;

	fn decode(item: &mut NftItemData) -> Result<Self, ContentError> {
		let dict = &item.content;
		Ok(Self {
			is_user: dict.get_bool("is_user")?.unwrap_or_default(),
			is_freelancer: dict.get_bool("is_freelancer")?.unwrap_or_default(),
			nickname: dict.get_string("nickname")?,
			telegram: dict.get_string("telegram")?,
			about: dict.get_string("about")?,
			website: dict.get_string("website")?,
			portfolio: dict.get_string("portfolio")?,
			resume: dict.get_string("resume")?,
			specialization: dict.get_string("specialization")?,
			language: dict.get_hash("language")?,
			revoked_at: dict.get_timestamp("revoked_at")?,
		})
	}

	fn translatable_texts(&self) -> Vec<&str> {
		[self.about.as_deref(), self.specialization.as_deref()]
			.into_iter()
			.flatten()
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cell::builder::CellBuilder;
	use crate::content::fixtures::{Value, content_cell};
	use crate::content::parse_item_data;

	#[test]
	fn test_decode_freelancer() {
		let data = CellBuilder::new()
			.store_bit(true)
			.store_uint(4, 64)
			.store_address(None)
			.store_address(None)
			.store_ref(content_cell(&[
				("is_freelancer", Value::Bool(true)),
				("nickname", Value::Text("anna")),
				("about", Value::Text("")),
				("specialization", Value::Text("Rust backend")),
				("language", Value::Hash([0x0f; 32])),
				("revoked_at", Value::Timestamp(1_650_000_000)),
			]))
			.build();
		let mut item = parse_item_data(data).unwrap();
		let content = UserContent::decode(&mut item).unwrap();

		assert!(content.is_freelancer);
		assert!(!content.is_user);
		assert_eq!(content.about.as_deref(), Some(""));
		assert!(content.website.is_none());
		assert_eq!(content.language, Some(format!("0x{}", "0f".repeat(32))));
		assert_eq!(content.revoked_at.map(|t| t.timestamp()), Some(1_650_000_000));
		assert_eq!(content.translatable_texts(), vec!["", "Rust backend"]);
	}
}

use super::{ContentError, ItemContent, NftItemData};
use crate::model::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle stage stored in the order contract, after the content reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	#[default]
	Active,
	Assigned,
	InProgress,
	Fulfilled,
	Refunded,
	Completed,
	PreArbitration,
	OnArbitration,
	ArbitrationSolved,
}

impl OrderStatus {
	pub fn from_code(code: u8) -> Option<Self> {
		Some(match code {
			0 => Self::Active,
			1 => Self::Assigned,
			2 => Self::InProgress,
			3 => Self::Fulfilled,
			4 => Self::Refunded,
			5 => Self::Completed,
			6 => Self::PreArbitration,
			7 => Self::OnArbitration,
			8 => Self::ArbitrationSolved,
			_ => return None,
		})
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Active => "active",
			Self::Assigned => "assigned",
			Self::InProgress => "in_progress",
			Self::Fulfilled => "fulfilled",
			Self::Refunded => "refunded",
			Self::Completed => "completed",
			Self::PreArbitration => "pre_arbitration",
			Self::OnArbitration => "on_arbitration",
			Self::ArbitrationSolved => "arbitration_solved",
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderContent {
	pub category: Option<String>,
	pub language: Option<String>,
	pub name: Option<String>,
	pub description: Option<String>,
	pub technical_task: Option<String>,
	/// Price in nanotons.
	pub price: Option<u128>,
	pub deadline: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub status: OrderStatus,
	pub freelancer: Option<String>,
}

impl ItemContent for OrderContent {
	const ENTITY_TYPE: EntityType = EntityType::Order;

	fn decode(item: &mut NftItemData) -> Result<Self, ContentError> {
		let status_code = item.tail.load_uint(8)? as u8;
		let status = OrderStatus::from_code(status_code).ok_or(ContentError::Status(status_code))?;
		let freelancer = item.tail.load_address()?.map(|a| a.to_raw());

		let dict = &item.content;
		Ok(Self {
			category: dict.get_hash("category")?,
			language: dict.get_hash("language")?,
			name: dict.get_string("name")?,
			description: dict.get_string("description")?,
			technical_task: dict.get_string("technical_task")?,
			price: dict.get_coins("price")?,
			deadline: dict.get_timestamp("deadline")?,
			completed_at: dict.get_timestamp("completed_at")?,
			status,
			freelancer,
		})
	}

	fn translatable_texts(&self) -> Vec<&str> {
		[
			self.name.as_deref(),
			self.description.as_deref(),
			self.technical_task.as_deref(),
		]
		.into_iter()
		.flatten()
		.collect()
	}

	fn status(&self) -> Option<&'static str> {
		Some(self.status.as_str())
	}

	fn freelancer(&self) -> Option<&str> {
		self.freelancer.as_deref()
	}
}

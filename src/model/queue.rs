use super::{EntityKey, EntityType};
use chrono::{DateTime, Utc};

/// Pending sync of one entity. At most one row exists per `(entity_type, entity_index)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncQueueItem {
	pub id: i64,
	pub entity_type: EntityType,
	pub entity_index: u64,
	pub sync_at: DateTime<Utc>,
	pub retry_count: u32,
	/// The item is satisfied only by a sync whose chain time is at least this.
	pub min_last_sync: DateTime<Utc>,
}

impl SyncQueueItem {
	pub fn key(&self) -> EntityKey {
		EntityKey::new(self.entity_type, self.entity_index)
	}
}

/// Pending webhook delivery of one order activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQueueItem {
	pub id: i64,
	pub order_activity_id: i64,
	pub tx_time: DateTime<Utc>,
	pub payload: String,
}

//! Materialized records and queue items.
//!
//! `Entity<C>` is the stored form of an item contract; `C` is its typed content. Admins, users
//! and orders share the `BlockchainEntity` surface, and the engine dispatches on `EntityType`
//! explicitly rather than through trait objects.

mod activity;
mod entity;
mod queue;

pub use activity::{OpCodes, OrderActivity, OrderOp, SenderRole};
pub use entity::{Admin, BlockchainEntity, Entity, EntityKey, EntityType, Order, User};
pub use queue::{NotificationQueueItem, SyncQueueItem};

use serde::{Deserialize, Serialize};

/// Marketplace category, keyed by the hash of its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
	pub id: String,
	pub name: String,
}

/// Supported content language, keyed by the hash of its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
	pub id: String,
	pub code: String,
}

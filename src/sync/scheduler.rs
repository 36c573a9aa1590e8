//! Persistent sync queue operations.
//!
//! Producers (`schedule`, `schedule_master`) and the engine-side transitions (`complete`, `retry`,
//! `drop_item`) all go through here so the queue invariants live in one place: one row per
//! entity, `min_last_sync` never decreases, and a row is only deleted once a sync has satisfied it.

use crate::model::{EntityKey, SyncQueueItem};
use crate::store::queries::sync_queue;
use crate::store::{Store, StoreError};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// Delay before the next attempt of an item, by its retry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
	steps: Vec<Duration>,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			steps: [5, 15, 30, 60, 5 * 60, 15 * 60, 60 * 60]
				.into_iter()
				.map(Duration::from_secs)
				.collect(),
		}
	}
}

impl RetryPolicy {
	/// Build a policy from a step table. Empty or decreasing tables are rejected.
	pub fn new(steps: Vec<Duration>) -> Result<Self, String> {
		if steps.is_empty() {
			return Err("retry step table is empty".to_string());
		}
		if steps.windows(2).any(|w| w[1] < w[0]) {
			return Err("retry step table must be non-decreasing".to_string());
		}
		Ok(Self { steps })
	}

	/// Delay for an item that has already been retried `retry_count` times. Saturates at the
	/// last step.
	pub fn delay(&self, retry_count: u32) -> Duration {
		let last = self.steps.len() - 1;
		self.steps[(retry_count as usize).min(last)]
	}

	pub fn steps(&self) -> &[Duration] {
		&self.steps
	}
}

#[derive(Clone)]
pub struct Scheduler {
	store: Store,
	policy: RetryPolicy,
}

impl Scheduler {
	pub fn new(store: Store, policy: RetryPolicy) -> Self {
		Self { store, policy }
	}

	/// Queue a sync of `key` that is only satisfied by chain state at least as new as
	/// `min_last_sync`. Use `DateTime::UNIX_EPOCH` when any state will do.
	pub fn schedule(&self, key: EntityKey, min_last_sync: DateTime<Utc>) -> Result<(), StoreError> {
		debug!(entity = %key, min_last_sync = %min_last_sync, "Scheduling sync");
		self.store
			.with(|conn| sync_queue::upsert(conn, key, min_last_sync, Utc::now()))
	}

	/// Queue a full resync of the master contract.
	pub fn schedule_master(&self) -> Result<(), StoreError> {
		self.schedule(EntityKey::master(), DateTime::UNIX_EPOCH)
	}

	/// The item with the earliest `sync_at`, whether or not it is due yet.
	pub fn next_item(&self) -> Result<Option<SyncQueueItem>, StoreError> {
		self.store.with(sync_queue::peek_earliest)
	}

	/// Record a successful sync that observed chain state as of `last_sync`.
	///
	/// Deletes the item if `last_sync` satisfies its freshness requirement and returns whether it
	/// did. A `schedule` that raised `min_last_sync` after the item was popped keeps it queued.
	pub fn complete(&self, item: &SyncQueueItem, last_sync: DateTime<Utc>) -> Result<bool, StoreError> {
		let removed = self
			.store
			.with(|conn| sync_queue::delete_if_satisfied(conn, item.key(), last_sync))?;
		Ok(removed > 0)
	}

	/// Push the item back by the policy delay for its current retry count and bump the count.
	///
	/// Returns the new due time.
	pub fn retry(&self, item: &SyncQueueItem) -> Result<DateTime<Utc>, StoreError> {
		let delay = self.policy.delay(item.retry_count);
		let sync_at = chrono::Duration::from_std(delay)
			.ok()
			.and_then(|d| Utc::now().checked_add_signed(d))
			.unwrap_or(DateTime::<Utc>::MAX_UTC);
		self.store
			.with(|conn| sync_queue::reschedule(conn, item.id, item.retry_count.saturating_add(1), sync_at))?;
		Ok(sync_at)
	}

	/// Remove the item unconditionally.
	pub fn drop_item(&self, item: &SyncQueueItem) -> Result<(), StoreError> {
		self.store.with(|conn| sync_queue::delete(conn, item.id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::EntityType;

	fn scheduler() -> Scheduler {
		Scheduler::new(Store::open_memory().unwrap(), RetryPolicy::default())
	}

	fn ts(secs: i64) -> DateTime<Utc> {
		DateTime::from_timestamp(secs, 0).unwrap()
	}

	#[test]
	fn test_retry_policy_is_monotonic_and_saturates() {
		let policy = RetryPolicy::default();
		let delays: Vec<_> = (0..20).map(|n| policy.delay(n)).collect();
		assert!(delays.windows(2).all(|w| w[0] <= w[1]));
		assert_eq!(policy.delay(0), Duration::from_secs(5));
		assert_eq!(policy.delay(6), Duration::from_secs(3600));
		assert_eq!(policy.delay(u32::MAX), Duration::from_secs(3600));
	}

	#[test]
	fn test_retry_policy_validation() {
		assert!(RetryPolicy::new(vec![]).is_err());
		assert!(RetryPolicy::new(vec![Duration::from_secs(2), Duration::from_secs(1)]).is_err());
		let policy = RetryPolicy::new(vec![Duration::from_secs(1)]).unwrap();
		assert_eq!(policy.delay(9), Duration::from_secs(1));
	}

	#[test]
	fn test_schedule_is_idempotent_and_min_last_sync_only_grows() {
		let scheduler = scheduler();
		let key = EntityKey::new(EntityType::Order, 9);
		for min in [ts(300), ts(100), ts(300), ts(200)] {
			scheduler.schedule(key, min).unwrap();
		}
		let count = scheduler.store.with(sync_queue::count).unwrap();
		assert_eq!(count, 1);
		let item = scheduler.next_item().unwrap().unwrap();
		assert_eq!(item.min_last_sync, ts(300));
		assert_eq!(item.retry_count, 0);
	}

	#[test]
	fn test_schedule_keeps_retry_count_and_makes_due_now() {
		let scheduler = scheduler();
		let key = EntityKey::new(EntityType::User, 2);
		scheduler.schedule(key, DateTime::UNIX_EPOCH).unwrap();
		let item = scheduler.next_item().unwrap().unwrap();
		let due = scheduler.retry(&item).unwrap();
		assert!(due > Utc::now());

		let before = Utc::now();
		scheduler.schedule(key, DateTime::UNIX_EPOCH).unwrap();
		let item = scheduler.next_item().unwrap().unwrap();
		assert_eq!(item.retry_count, 1);
		assert!(item.sync_at <= Utc::now() && item.sync_at >= before - chrono::Duration::seconds(1));
	}

	#[test]
	fn test_retry_pushes_back_by_policy() {
		let scheduler = scheduler();
		scheduler.schedule_master().unwrap();
		let mut previous = Utc::now();
		for expected in [5, 15, 30] {
			let item = scheduler.next_item().unwrap().unwrap();
			let before = Utc::now();
			let due = scheduler.retry(&item).unwrap();
			assert!(due >= before + chrono::Duration::seconds(expected));
			assert!(due >= previous);
			previous = due;
		}
		assert_eq!(scheduler.next_item().unwrap().unwrap().retry_count, 3);
	}

	#[test]
	fn test_complete_deletes_only_when_fresh_enough() {
		let scheduler = scheduler();
		let key = EntityKey::new(EntityType::Admin, 1);
		scheduler.schedule(key, ts(1000)).unwrap();
		let item = scheduler.next_item().unwrap().unwrap();

		assert!(!scheduler.complete(&item, ts(999)).unwrap());
		assert!(scheduler.next_item().unwrap().is_some());
		assert!(scheduler.complete(&item, ts(1000)).unwrap());
		assert!(scheduler.next_item().unwrap().is_none());
	}

	#[test]
	fn test_raised_requirement_survives_complete() {
		let scheduler = scheduler();
		let key = EntityKey::new(EntityType::Order, 4);
		scheduler.schedule(key, ts(100)).unwrap();
		let popped = scheduler.next_item().unwrap().unwrap();
		// A newer change lands while the popped item is being synced.
		scheduler.schedule(key, ts(500)).unwrap();
		assert!(!scheduler.complete(&popped, ts(200)).unwrap());
		assert_eq!(scheduler.next_item().unwrap().unwrap().min_last_sync, ts(500));
	}

	#[test]
	fn test_drop_item() {
		let scheduler = scheduler();
		scheduler.schedule(EntityKey::new(EntityType::User, 1), ts(10_000)).unwrap();
		let item = scheduler.next_item().unwrap().unwrap();
		scheduler.drop_item(&item).unwrap();
		assert!(scheduler.next_item().unwrap().is_none());
	}
}

//! Per-run counters for the sync engine.
//!
//! `RunProgress` records the outcome of each dispatched queue item and logs a one-line summary
//! at the end of a run, so an idle engine stays quiet and a busy one reports throughput.

use crate::model::EntityType;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunProgress {
	started: Instant,
	/// Items deleted from the queue after a fresh-enough sync, by entity type.
	synced: BTreeMap<EntityType, usize>,
	/// Items synced but rescheduled because their freshness requirement was not met.
	stale: usize,
	/// Items rescheduled after an error.
	failed: usize,
	/// Items dropped because their entity no longer exists.
	dropped: usize,
	/// Newly ingested order activities.
	activities: usize,
}

impl Default for RunProgress {
	fn default() -> Self {
		Self::new()
	}
}

impl RunProgress {
	pub fn new() -> Self {
		Self {
			started: Instant::now(),
			synced: BTreeMap::new(),
			stale: 0,
			failed: 0,
			dropped: 0,
			activities: 0,
		}
	}

	pub fn record_synced(&mut self, entity_type: EntityType) {
		*self.synced.entry(entity_type).or_default() += 1;
	}

	pub fn record_stale(&mut self) {
		self.stale += 1;
	}

	pub fn record_failed(&mut self) {
		self.failed += 1;
	}

	pub fn record_dropped(&mut self) {
		self.dropped += 1;
	}

	pub fn record_activities(&mut self, count: usize) {
		self.activities += count;
	}

	pub fn synced(&self) -> usize {
		self.synced.values().sum()
	}

	pub fn processed(&self) -> usize {
		self.synced() + self.stale + self.failed + self.dropped
	}

	/// Log a summary if anything was processed.
	pub fn log_summary(&self) {
		if self.processed() == 0 {
			return;
		}
		let by_type = self
			.synced
			.iter()
			.map(|(t, n)| format!("{}={}", t, n))
			.collect::<Vec<_>>()
			.join(" ");
		info!(
			synced = self.synced(),
			stale = self.stale,
			failed = self.failed,
			dropped = self.dropped,
			activities = self.activities,
			elapsed_ms = self.started.elapsed().as_millis() as u64,
			"Sync run finished [{}]",
			by_type
		);
	}
}

//! Master contract change detection.
//!
//! Runs on a short interval. A new masterchain block triggers a look at the master account: a
//! changed data hash queues a full master resync, and new master transactions queue every known
//! item they touched, each with the transaction time as its freshness requirement. The processed
//! seqno is written last, so an interrupted check is repeated in full.

use super::SyncError;
use super::activity::normalize_address;
use super::master::state_hash;
use super::scheduler::Scheduler;
use super::task::{RecurringTask, RunOutcome, TaskKind};
use crate::chain::{ChainClient, TxId};
use crate::model::EntityKey;
use crate::store::Store;
use crate::store::queries::{entities, settings};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct MasterChangeDetector {
	chain: Arc<dyn ChainClient>,
	store: Store,
	scheduler: Scheduler,
	master_address: String,
	interval: Duration,
}

impl MasterChangeDetector {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		store: Store,
		scheduler: Scheduler,
		master_address: String,
		interval: Duration,
	) -> Self {
		Self {
			chain,
			store,
			scheduler,
			master_address,
			interval,
		}
	}

	/// Look for master changes since the last processed block. Returns the number of queue
	/// entries written.
	pub async fn check(&self) -> Result<usize, SyncError> {
		let seqno = self.chain.masterchain_seqno().await?;
		let processed = self
			.store
			.with(|conn| settings::get_u64(conn, settings::LAST_PROCESSED_SEQNO, 0))?;
		if seqno == processed {
			return Ok(0);
		}

		let state = self.chain.account_state(&self.master_address).await?;
		if !state.has_data() {
			return Err(SyncError::NotFound(format!(
				"master contract {} has no data",
				self.master_address
			)));
		}

		let mut scheduled = 0;
		let hash = state_hash(&state.data);
		let stored_hash = self
			.store
			.with(|conn| settings::get_opt(conn, settings::MASTER_CONTENT_HASH))?;
		if stored_hash.as_deref() != Some(hash.as_str()) {
			debug!(seqno, hash = %hash, "Master data changed");
			self.scheduler.schedule_master()?;
			scheduled += 1;
		}

		if let Some(latest) = &state.last_transaction {
			scheduled += self.cascade_transactions(latest).await?;
		}

		self.store
			.with(|conn| settings::set_u64(conn, settings::LAST_PROCESSED_SEQNO, seqno))?;
		if scheduled > 0 {
			info!(seqno, scheduled, "Master change detected");
		}
		Ok(scheduled)
	}

	/// Queue every known item touched by master transactions after the stored lt.
	async fn cascade_transactions(&self, latest: &TxId) -> Result<usize, SyncError> {
		let stored_lt = self
			.store
			.with(|conn| settings::get_u64(conn, settings::MASTER_LAST_TX_LT, 0))?;
		if latest.lt == stored_lt {
			return Ok(0);
		}

		// Without a checkpoint there is no history to replay: the first resync registers
		// every item anyway.
		let transactions = if stored_lt == 0 {
			Vec::new()
		} else {
			self.chain
				.transactions(&self.master_address, stored_lt, latest)
				.await?
		};

		let mut touched: BTreeMap<EntityKey, DateTime<Utc>> = BTreeMap::new();
		self.store.with(|conn| {
			for tx in &transactions {
				for address in tx.counterparties() {
					let address = normalize_address(address);
					if let Some(key) = entities::find_by_address(conn, &address)? {
						let at = touched.entry(key).or_insert(tx.utime);
						*at = (*at).max(tx.utime);
					}
				}
			}
			Ok(())
		})?;

		for (key, min_last_sync) in &touched {
			debug!(entity = %key, min_last_sync = %min_last_sync, "Queued by master transaction");
			self.scheduler.schedule(*key, *min_last_sync)?;
		}
		self.store
			.with(|conn| settings::set_u64(conn, settings::MASTER_LAST_TX_LT, latest.lt))?;
		debug!(
			from_lt = stored_lt,
			to_lt = latest.lt,
			transactions = transactions.len(),
			touched = touched.len(),
			"Processed master transactions"
		);
		Ok(touched.len())
	}
}

#[async_trait]
impl RecurringTask for MasterChangeDetector {
	fn kind(&self) -> TaskKind {
		TaskKind::MasterDetector
	}

	async fn run(&self) -> Result<RunOutcome, SyncError> {
		let scheduled = self.check().await?;
		let wake = if scheduled > 0 {
			vec![TaskKind::SyncEngine]
		} else {
			Vec::new()
		};
		Ok(RunOutcome {
			next_interval: self.interval,
			wake,
		})
	}
}

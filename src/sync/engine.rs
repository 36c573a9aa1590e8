//! Sync engine: drains the sync queue and reconciles entities with chain state.
//!
//! Each run pops due items in `sync_at` order and dispatches on the entity type. A successful
//! sync completes the item only if the observed chain time satisfies its `min_last_sync`;
//! anything else goes back into the queue through the retry policy, except entities that do
//! not exist, which are dropped.

use super::activity::decode_activity;
use super::events::CacheReload;
use super::master::MasterSync;
use super::progress::RunProgress;
use super::scheduler::Scheduler;
use super::task::{RecurringTask, RunOutcome, TaskKind};
use super::SyncError;
use crate::chain::{AccountState, ChainClient};
use crate::content::{AdminContent, ItemContent, OrderContent, UserContent, parse_item_data};
use crate::model::{BlockchainEntity, Entity, EntityType, OpCodes, Order, OrderActivity, OrderOp, SyncQueueItem};
use crate::store::Store;
use crate::store::queries::{activities, entities, notifications};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Maximum items dispatched per run.
	pub batch_size: usize,
	/// Interval when the queue is empty or nothing is due soon.
	pub default_interval: Duration,
	/// Interval when a run stopped at `batch_size` with due items left.
	pub busy_interval: Duration,
	/// Op codes of order message bodies.
	pub op_codes: OpCodes,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			batch_size: 20,
			default_interval: Duration::from_secs(10),
			busy_interval: Duration::from_millis(200),
			op_codes: OpCodes::default(),
		}
	}
}

pub struct SyncEngine {
	chain: Arc<dyn ChainClient>,
	store: Store,
	scheduler: Scheduler,
	master: MasterSync,
	cache_reload: CacheReload,
	config: EngineConfig,
}

impl SyncEngine {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		store: Store,
		scheduler: Scheduler,
		master: MasterSync,
		cache_reload: CacheReload,
		config: EngineConfig,
	) -> Self {
		Self {
			chain,
			store,
			scheduler,
			master,
			cache_reload,
			config,
		}
	}

	/// Sync one queue item and move it to its next queue state.
	async fn process(&self, item: SyncQueueItem, progress: &mut RunProgress) -> Result<(), SyncError> {
		let key = item.key();
		let result = match item.entity_type {
			EntityType::Master => self.master.resync().await,
			EntityType::Admin => self.sync_item::<AdminContent>(item.entity_index).await,
			EntityType::User => self.sync_item::<UserContent>(item.entity_index).await,
			EntityType::Order => self.sync_order(item.entity_index, progress).await,
		};

		match result {
			Ok(last_sync) => {
				if self.scheduler.complete(&item, last_sync)? {
					debug!(entity = %key, last_sync = %last_sync, "Synced");
					progress.record_synced(item.entity_type);
				} else {
					let due = self.scheduler.retry(&item)?;
					debug!(
						entity = %key,
						last_sync = %last_sync,
						min_last_sync = %item.min_last_sync,
						retry_count = item.retry_count,
						due = %due,
						"Chain state older than required, retrying"
					);
					progress.record_stale();
				}
			}
			Err(SyncError::NotFound(what)) => {
				warn!(entity = %key, retry_count = item.retry_count, "Dropping sync: {}", what);
				self.scheduler.drop_item(&item)?;
				progress.record_dropped();
			}
			Err(e) => {
				let due = self.scheduler.retry(&item)?;
				warn!(
					entity = %key,
					retry_count = item.retry_count,
					due = %due,
					"Sync failed: {}",
					e
				);
				progress.record_failed();
			}
		}
		Ok(())
	}

	/// Load the stored row and the current account state of an item.
	async fn fetch<C: ItemContent>(&self, index: u64) -> Result<(Entity<C>, AccountState), SyncError> {
		let entity = self
			.store
			.with(|conn| entities::get::<C>(conn, index))?
			.ok_or_else(|| SyncError::NotFound(format!("no stored {} #{}", C::ENTITY_TYPE, index)))?;
		let state = self.chain.account_state(entity.address()).await?;
		if !state.has_data() {
			return Err(SyncError::NotFound(format!(
				"{} at {} has no contract data",
				entity.key(),
				entity.address()
			)));
		}
		Ok((entity, state))
	}

	/// Decode `state` into `entity` and persist it. Returns the chain time of the state.
	fn apply<C: ItemContent>(&self, mut entity: Entity<C>, state: &AccountState) -> Result<DateTime<Utc>, SyncError> {
		let mut item = parse_item_data(state.data_cell()?)?;
		if item.index != entity.index() {
			warn!(
				entity = %entity.key(),
				contract_index = item.index,
				"Contract reports a different index"
			);
		}
		debug!(
			entity = %entity.key(),
			previous_lt = entity.last_tx_lt(),
			previous_hash = entity.last_tx_hash().unwrap_or("-"),
			previous_sync = %entity.last_sync(),
			"Applying account state"
		);
		let content = C::decode(&mut item)?;
		if entity.apply_content(content) {
			debug!(entity = %entity.key(), "Translatable text changed");
		}

		entity.owner = item.owner.map(|a| a.to_raw());
		entity.last_sync = state.sync_utime;
		if let Some(tx) = &state.last_transaction {
			entity.last_tx_lt = tx.lt;
			entity.last_tx_hash = Some(tx.hash.clone());
		}
		self.store.with(|conn| entities::upsert(conn, &entity))?;
		Ok(state.sync_utime)
	}

	async fn sync_item<C: ItemContent>(&self, index: u64) -> Result<DateTime<Utc>, SyncError> {
		let (entity, state) = self.fetch::<C>(index).await?;
		self.apply(entity, &state)
	}

	async fn sync_order(&self, index: u64, progress: &mut RunProgress) -> Result<DateTime<Utc>, SyncError> {
		let (mut order, state) = self.fetch::<OrderContent>(index).await?;
		let ingested = self.ingest_activities(&mut order, &state).await?;
		progress.record_activities(ingested);
		self.apply(order, &state)
	}

	/// Record every order transaction after the stored one. Returns the number of new activities.
	async fn ingest_activities(&self, order: &mut Order, state: &AccountState) -> Result<usize, SyncError> {
		let Some(latest) = &state.last_transaction else {
			return Ok(0);
		};
		if latest.lt <= order.last_tx_lt {
			return Ok(0);
		}

		let transactions = self
			.chain
			.transactions(&order.address, order.last_tx_lt, latest)
			.await?;
		let mut inserted = 0;
		for tx in &transactions {
			let Some(activity) = decode_activity(order.index, tx, &self.config.op_codes) else {
				continue;
			};
			if activity.op_code == OrderOp::OrderDeploy && order.created_at.is_none() {
				order.created_at = Some(activity.timestamp);
			}
			if self.record_activity(&activity)? {
				inserted += 1;
			}
		}
		if inserted > 0 {
			info!(
				entity = %order.key(),
				from_lt = order.last_tx_lt,
				to_lt = latest.lt,
				inserted,
				"Ingested order activity"
			);
		}
		Ok(inserted)
	}

	/// Insert an activity and, on first insertion only, its notification.
	fn record_activity(&self, activity: &OrderActivity) -> Result<bool, SyncError> {
		let inserted = self.store.transaction(|conn| {
			let Some(id) = activities::insert(conn, activity)? else {
				return Ok(false);
			};
			let stored = OrderActivity {
				id: Some(id),
				..activity.clone()
			};
			notifications::insert(conn, id, activity.timestamp, &serde_json::to_string(&stored)?)?;
			Ok(true)
		})?;
		Ok(inserted)
	}
}

#[async_trait]
impl RecurringTask for SyncEngine {
	fn kind(&self) -> TaskKind {
		TaskKind::SyncEngine
	}

	async fn run(&self) -> Result<RunOutcome, SyncError> {
		let mut progress = RunProgress::new();
		let mut next_interval = self.config.busy_interval;

		for _ in 0..self.config.batch_size {
			let Some(item) = self.scheduler.next_item()? else {
				next_interval = self.config.default_interval;
				break;
			};
			let now = Utc::now();
			if item.sync_at > now {
				let until_due = (item.sync_at - now).to_std().unwrap_or_default();
				next_interval = until_due.min(self.config.default_interval);
				break;
			}
			self.process(item, &mut progress).await?;
		}

		progress.log_summary();
		let wake = if progress.synced() > 0 {
			self.cache_reload.bump();
			vec![TaskKind::Translation, TaskKind::Notification]
		} else {
			Vec::new()
		};
		Ok(RunOutcome { next_interval, wake })
	}
}

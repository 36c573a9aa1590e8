//! Chain-to-store synchronization.
//!
//! - `scheduler`: the persistent sync queue and its retry policy.
//! - `engine`: drains the queue, reconciling one entity per item.
//! - `master`: full resync of the master contract (reference tables, new items).
//! - `detector`: watches the master contract and cascades work into the queue.
//! - `activity`: decodes order transactions into activity records.
//! - `task`: recurring-task runner shared by every loop.
//! - `events`: signals for downstream readers.
//! - `progress`: per-run counters and summary logging.

pub mod activity;
pub mod detector;
pub mod engine;
pub mod events;
pub mod master;
pub mod progress;
pub mod scheduler;
pub mod task;

pub use detector::MasterChangeDetector;
pub use engine::{EngineConfig, SyncEngine};
pub use events::CacheReload;
pub use master::MasterSync;
pub use scheduler::{RetryPolicy, Scheduler};
pub use task::{RecurringTask, RunOutcome, RunnerConfig, TaskKind, Wakers, run_task};

use crate::cell::CellError;
use crate::chain::ChainError;
use crate::content::ContentError;
use crate::notify::DeliveryError;
use crate::store::StoreError;
use crate::translate::TranslateError;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Chain error: {0}")]
	ChainError(#[from] ChainError),

	#[error("Store error: {0}")]
	StoreError(#[from] StoreError),

	#[error("Content error: {0}")]
	ContentError(#[from] ContentError),

	#[error("Cell error: {0}")]
	CellError(#[from] CellError),

	#[error("Delivery error: {0}")]
	DeliveryError(#[from] DeliveryError),

	#[error("Translation error: {0}")]
	TranslateError(#[from] TranslateError),

	#[error("Serialization error: {0}")]
	SerializationError(#[from] serde_json::Error),

	#[error("Not found: {0}")]
	NotFound(String),
}

impl SyncError {
	/// Transient chain failures lengthen the polling interval instead of counting as faults.
	pub fn is_transient(&self) -> bool {
		matches!(self, SyncError::ChainError(e) if e.is_transient())
	}
}

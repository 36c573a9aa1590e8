//! Webhook delivery of order activity.
//!
//! Every newly ingested order activity leaves one row in the notification queue. The delivery loop
//! pops rows oldest first, re-attaches the activity and the current state of its order, and POSTs
//! the result to the configured webhook. A row is deleted only after a 2xx response, so delivery is
//! at-least-once; receivers deduplicate on the activity id. Rows older than the
//! `notifications_ignore_before` cutoff are discarded without a request.

use crate::content::OrderContent;
use crate::model::{NotificationQueueItem, Order, OrderActivity};
use crate::store::queries::{activities, entities, notifications, settings};
use crate::store::{Store, StoreError, from_millis, to_millis};
use crate::sync::{RecurringTask, RunOutcome, SyncError, TaskKind};
use crate::utils::format_coins;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Webhook responded with status {0}")]
	Status(u16),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
	async fn deliver(&self, payload: &Value) -> Result<(), DeliveryError>;
}

/// Posts payloads as JSON to a fixed URL.
pub struct WebhookClient {
	http_client: Client,
	url: String,
}

impl WebhookClient {
	pub fn new(url: String, timeout: Duration) -> Result<Self, DeliveryError> {
		let http_client = Client::builder().timeout(timeout).build()?;
		Ok(Self { http_client, url })
	}
}

#[async_trait]
impl NotificationSink for WebhookClient {
	async fn deliver(&self, payload: &Value) -> Result<(), DeliveryError> {
		let response = self.http_client.post(&self.url).json(payload).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(DeliveryError::Status(status.as_u16()));
		}
		Ok(())
	}
}

/// Body of one webhook request.
#[derive(Serialize)]
struct Delivery<'a> {
	activity: &'a OrderActivity,
	/// `activity.amount` as a decimal TON string.
	amount_ton: Option<String>,
	order: Option<&'a Order>,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
	pub batch_size: usize,
	pub default_interval: Duration,
	pub busy_interval: Duration,
}

impl Default for NotificationConfig {
	fn default() -> Self {
		Self {
			batch_size: 50,
			default_interval: Duration::from_secs(30),
			busy_interval: Duration::from_millis(500),
		}
	}
}

/// Read the delivery cutoff, initialising it to `configured` (or now) when unset.
pub fn init_ignore_before(store: &Store, configured: Option<DateTime<Utc>>) -> Result<DateTime<Utc>, StoreError> {
	store.with(|conn| {
		if let Some(stored) = read_cutoff(conn)? {
			return Ok(stored);
		}
		let cutoff = configured.unwrap_or_else(Utc::now);
		settings::set(conn, settings::NOTIFICATIONS_IGNORE_BEFORE, &to_millis(cutoff).to_string())?;
		info!(cutoff = %cutoff, "Initialised notification cutoff");
		Ok(cutoff)
	})
}

fn read_cutoff(conn: &rusqlite::Connection) -> Result<Option<DateTime<Utc>>, StoreError> {
	settings::get_opt(conn, settings::NOTIFICATIONS_IGNORE_BEFORE)?
		.map(|value| {
			let millis = value.parse::<i64>().map_err(|e| {
				StoreError::Serialization(format!("setting '{}': {}", settings::NOTIFICATIONS_IGNORE_BEFORE, e))
			})?;
			from_millis(millis)
		})
		.transpose()
}

pub struct NotificationLoop {
	store: Store,
	sink: Arc<dyn NotificationSink>,
	config: NotificationConfig,
}

impl NotificationLoop {
	pub fn new(store: Store, sink: Arc<dyn NotificationSink>, config: NotificationConfig) -> Self {
		Self { store, sink, config }
	}

	/// Assemble the webhook body for a queued row. `None` if the activity can no longer be found.
	fn payload(&self, item: &NotificationQueueItem) -> Result<Option<Value>, SyncError> {
		let Some((activity, order)) = self.store.with(|conn| {
			let activity = match activities::get(conn, item.order_activity_id)? {
				Some(activity) => activity,
				None => match serde_json::from_str::<OrderActivity>(&item.payload) {
					Ok(activity) => activity,
					Err(_) => return Ok(None),
				},
			};
			let order = entities::get::<OrderContent>(conn, activity.order_index)?;
			Ok(Some((activity, order)))
		})?
		else {
			return Ok(None);
		};

		let delivery = Delivery {
			activity: &activity,
			amount_ton: activity.amount.map(format_coins),
			order: order.as_ref(),
		};
		Ok(Some(serde_json::to_value(&delivery)?))
	}
}

#[async_trait]
impl RecurringTask for NotificationLoop {
	fn kind(&self) -> TaskKind {
		TaskKind::Notification
	}

	async fn run(&self) -> Result<RunOutcome, SyncError> {
		let cutoff = self.store.with(read_cutoff)?;
		let items = self
			.store
			.with(|conn| notifications::list_oldest(conn, self.config.batch_size))?;
		let capped = items.len() >= self.config.batch_size;

		let mut delivered = 0;
		let mut skipped = 0;
		for item in &items {
			if cutoff.is_some_and(|cutoff| item.tx_time < cutoff) {
				debug!(id = item.id, activity = item.order_activity_id, tx_time = %item.tx_time, "Skipping stale notification");
				self.store.with(|conn| notifications::delete(conn, item.id))?;
				skipped += 1;
				continue;
			}

			let Some(payload) = self.payload(item)? else {
				warn!(id = item.id, activity = item.order_activity_id, "Dropping notification without activity");
				self.store.with(|conn| notifications::delete(conn, item.id))?;
				skipped += 1;
				continue;
			};

			if let Err(e) = self.sink.deliver(&payload).await {
				warn!(
					id = item.id,
					activity = item.order_activity_id,
					delivered,
					"Webhook delivery failed, will retry: {}",
					e
				);
				return Ok(RunOutcome::after(self.config.default_interval));
			}
			self.store.with(|conn| notifications::delete(conn, item.id))?;
			delivered += 1;
		}

		if delivered + skipped > 0 {
			info!(delivered, skipped, "Notifications processed");
		}
		let more_pending = capped && self.store.with(notifications::count)? > 0;
		Ok(RunOutcome::after(if more_pending {
			self.config.busy_interval
		} else {
			self.config.default_interval
		}))
	}
}

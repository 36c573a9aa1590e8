mod cell;
mod chain;
mod config;
mod content;
mod model;
mod notify;
mod store;
mod sync;
mod translate;
mod utils;

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::chain::{ChainClient, ChainError, TonCenterClient};
use crate::config::{CONFIG_ENV, Config, ConfigError};
use crate::notify::{DeliveryError, NotificationLoop, WebhookClient, init_ignore_before};
use crate::store::queries::settings;
use crate::store::{Store, StoreError};
use crate::sync::{
	CacheReload, MasterChangeDetector, MasterSync, RecurringTask, Scheduler, SyncEngine, Wakers, run_task,
};
use crate::translate::{HttpTranslator, TranslateError, TranslationLoop};

#[derive(Debug, thiserror::Error)]
enum StartupError {
	#[error("{0}")]
	Config(#[from] ConfigError),

	#[error("Store error: {0}")]
	Store(#[from] StoreError),

	#[error("Chain client error: {0}")]
	Chain(#[from] ChainError),

	#[error("Webhook client error: {0}")]
	Delivery(#[from] DeliveryError),

	#[error("Translator error: {0}")]
	Translate(#[from] TranslateError),

	#[error("Store belongs to master {stored}, but {configured} is configured")]
	MasterMismatch { stored: String, configured: String },
}

#[tokio::main]
async fn main() {
	let path = Config::path_from(std::env::args(), std::env::var(CONFIG_ENV).ok());
	let config = Config::load(path.as_deref());
	let filter = config
		.as_ref()
		.map(|c| c.logging.filter.clone())
		.unwrap_or_else(|_| "info".to_string());

	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let config = match config {
		Ok(config) => config,
		Err(e) => {
			error!("Failed to load config: {}", e);
			std::process::exit(1);
		}
	};

	if let Err(e) = run(config).await {
		error!("Failed to start marketplace sync: {}", e);
		std::process::exit(1);
	}
}

async fn run(config: Config) -> Result<(), StartupError> {
	info!("Starting marketplace sync service");

	let store = Store::open(&config.store.path)?;
	let master_address = config.master_address()?;
	ensure_master_address(&store, &master_address)?;
	let cutoff = init_ignore_before(&store, config.notifications.ignore_before)?;
	info!(store = %config.store.path.display(), master = %master_address, notifications_after = %cutoff, "Opened store");

	let chain: Arc<dyn ChainClient> = Arc::new(TonCenterClient::new(
		config.chain.endpoint.clone(),
		config.chain.api_key.clone(),
		config.chain_timeout(),
	)?);
	let scheduler = Scheduler::new(store.clone(), config.retry_policy()?);
	let cache_reload = CacheReload::new();

	let master = MasterSync::new(chain.clone(), store.clone(), scheduler.clone(), master_address.clone());
	let mut tasks: Vec<Arc<dyn RecurringTask>> = vec![
		Arc::new(SyncEngine::new(
			chain.clone(),
			store.clone(),
			scheduler.clone(),
			master,
			cache_reload,
			config.engine()?,
		)),
		Arc::new(MasterChangeDetector::new(
			chain.clone(),
			store.clone(),
			scheduler,
			master_address,
			config.detector_interval(),
		)),
	];

	match &config.notifications.webhook_url {
		Some(url) => {
			let sink = WebhookClient::new(
				url.clone(),
				std::time::Duration::from_secs(config.notifications.timeout_secs),
			)?;
			tasks.push(Arc::new(NotificationLoop::new(store.clone(), Arc::new(sink), config.notification())));
		}
		None => warn!("No webhook configured, notifications will queue up undelivered"),
	}

	match &config.translation.endpoint {
		Some(endpoint) => {
			let translator = HttpTranslator::new(
				endpoint.clone(),
				std::time::Duration::from_secs(config.translation.timeout_secs),
				std::time::Duration::from_secs(config.translation.max_elapsed_secs),
			)?;
			tasks.push(Arc::new(TranslationLoop::new(
				store.clone(),
				Arc::new(translator),
				config.translation(),
			)));
		}
		None => info!("No translator configured, translation disabled"),
	}

	let wakers = Wakers::new();
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let handles: Vec<_> = tasks
		.into_iter()
		.map(|task| {
			tokio::spawn(run_task(
				task,
				wakers.clone(),
				chain.clone(),
				config.runner(),
				shutdown_rx.clone(),
			))
		})
		.collect();
	info!(tasks = handles.len(), "Sync tasks running");

	if let Err(e) = tokio::signal::ctrl_c().await {
		error!("Failed to listen for shutdown signal: {}", e);
	}
	info!("Shutting down");
	let _ = shutdown_tx.send(true);

	for result in futures::future::join_all(handles).await {
		if let Err(e) = result {
			error!("Task ended abnormally: {}", e);
		}
	}
	info!("Marketplace sync stopped");
	Ok(())
}

/// Bind the store to one master contract. A store synced from another master is rejected.
fn ensure_master_address(store: &Store, configured: &str) -> Result<(), StartupError> {
	let stored = store.with(|conn| settings::get_opt(conn, settings::MASTER_ADDRESS))?;
	match stored {
		Some(stored) if stored != configured => Err(StartupError::MasterMismatch {
			stored,
			configured: configured.to_string(),
		}),
		Some(_) => Ok(()),
		None => {
			store.with(|conn| settings::set(conn, settings::MASTER_ADDRESS, configured))?;
			Ok(())
		}
	}
}

//! Recurring-task runner shared by every sync loop.
//!
//! A loop implements [`RecurringTask`]; each run returns a [`RunOutcome`] naming how long to sleep
//! and which other loops to wake. [`run_task`] drives one loop: it never starts a run while one is
//! in flight, sleeps between runs unless woken through [`Wakers`], backs off on errors, and stops
//! when the shutdown channel flips.

use super::SyncError;
use crate::chain::ChainClient;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
	SyncEngine,
	MasterDetector,
	Notification,
	Translation,
}

impl TaskKind {
	pub const ALL: [TaskKind; 4] = [
		TaskKind::SyncEngine,
		TaskKind::MasterDetector,
		TaskKind::Notification,
		TaskKind::Translation,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			TaskKind::SyncEngine => "sync_engine",
			TaskKind::MasterDetector => "master_detector",
			TaskKind::Notification => "notification",
			TaskKind::Translation => "translation",
		}
	}
}

impl fmt::Display for TaskKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
	pub next_interval: Duration,
	pub wake: Vec<TaskKind>,
}

impl RunOutcome {
	pub fn after(next_interval: Duration) -> Self {
		Self {
			next_interval,
			wake: Vec::new(),
		}
	}
}

#[async_trait]
pub trait RecurringTask: Send + Sync {
	fn kind(&self) -> TaskKind;

	async fn run(&self) -> Result<RunOutcome, SyncError>;
}

/// One wake-up handle per task kind.
#[derive(Clone)]
pub struct Wakers {
	notifiers: Arc<HashMap<TaskKind, Arc<Notify>>>,
}

impl Default for Wakers {
	fn default() -> Self {
		Self::new()
	}
}

impl Wakers {
	pub fn new() -> Self {
		let notifiers = TaskKind::ALL
			.into_iter()
			.map(|kind| (kind, Arc::new(Notify::new())))
			.collect();
		Self {
			notifiers: Arc::new(notifiers),
		}
	}

	pub fn notifier(&self, kind: TaskKind) -> Arc<Notify> {
		self.notifiers
			.get(&kind)
			.cloned()
			.unwrap_or_else(|| Arc::new(Notify::new()))
	}

	/// Cut the current sleep of `kind` short. A wake sent while the task is running is kept and
	/// ends its next sleep immediately.
	pub fn wake(&self, kind: TaskKind) {
		if let Some(notify) = self.notifiers.get(&kind) {
			notify.notify_one();
		}
	}
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
	/// First sleep after a failed run.
	pub initial_backoff: Duration,
	/// Longest sleep after repeated failures.
	pub max_backoff: Duration,
	/// Consecutive failures after which transient errors are logged as errors.
	pub failure_threshold: u32,
	/// Rebuild the chain client every this many consecutive transient failures. Zero disables.
	pub recycle_after: u32,
}

impl Default for RunnerConfig {
	fn default() -> Self {
		Self {
			initial_backoff: Duration::from_secs(1),
			max_backoff: Duration::from_secs(60),
			failure_threshold: 10,
			recycle_after: 5,
		}
	}
}

impl RunnerConfig {
	fn backoff(&self) -> ExponentialBackoff {
		ExponentialBackoff {
			current_interval: self.initial_backoff,
			initial_interval: self.initial_backoff,
			max_interval: self.max_backoff,
			max_elapsed_time: None,
			..ExponentialBackoff::default()
		}
	}
}

/// Drive `task` until `shutdown` becomes true or its sender is dropped.
pub async fn run_task(
	task: Arc<dyn RecurringTask>,
	wakers: Wakers,
	chain: Arc<dyn ChainClient>,
	config: RunnerConfig,
	mut shutdown: watch::Receiver<bool>,
) {
	let kind = task.kind();
	let notify = wakers.notifier(kind);
	let mut backoff = config.backoff();
	let mut failures: u32 = 0;
	info!(task = %kind, "Task started");

	loop {
		if *shutdown.borrow() {
			break;
		}

		let result = tokio::select! {
			result = task.run() => result,
			_ = shutdown.changed() => break,
		};

		let interval = match result {
			Ok(outcome) => {
				if failures > 0 {
					info!(task = %kind, failures, "Task recovered");
				}
				failures = 0;
				backoff.reset();
				for other in &outcome.wake {
					wakers.wake(*other);
				}
				outcome.next_interval
			}
			Err(e) => {
				failures = failures.saturating_add(1);
				let interval = backoff.next_backoff().unwrap_or(config.max_backoff);
				if !e.is_transient() {
					error!(task = %kind, failures, retry_in = ?interval, "Task run failed: {}", e);
				} else {
					if failures >= config.failure_threshold {
						error!(task = %kind, failures, retry_in = ?interval, "Chain unavailable: {}", e);
					} else {
						warn!(task = %kind, failures, retry_in = ?interval, "Transient chain error: {}", e);
					}
					if config.recycle_after > 0 && failures % config.recycle_after == 0 {
						warn!(task = %kind, failures, "Recycling chain client");
						chain.recycle();
					}
				}
				interval
			}
		};

		tokio::select! {
			_ = tokio::time::sleep(interval) => {}
			_ = notify.notified() => {
				debug!(task = %kind, "Woken early");
			}
			_ = shutdown.changed() => break,
		}
	}

	info!(task = %kind, "Task stopped");
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::ChainError;
	use crate::chain::fake::FakeChain;
	use std::collections::VecDeque;
	use std::sync::Mutex;
	use tokio::sync::mpsc;
	use tokio::time::timeout;

	struct ScriptedTask {
		kind: TaskKind,
		script: Mutex<VecDeque<Result<RunOutcome, SyncError>>>,
		fallback: RunOutcome,
		runs: mpsc::UnboundedSender<TaskKind>,
	}

	impl ScriptedTask {
		fn new(
			kind: TaskKind,
			script: Vec<Result<RunOutcome, SyncError>>,
			fallback: RunOutcome,
		) -> (Arc<Self>, mpsc::UnboundedReceiver<TaskKind>) {
			let (runs, rx) = mpsc::unbounded_channel();
			let task = Arc::new(Self {
				kind,
				script: Mutex::new(script.into()),
				fallback,
				runs,
			});
			(task, rx)
		}
	}

	#[async_trait]
	impl RecurringTask for ScriptedTask {
		fn kind(&self) -> TaskKind {
			self.kind
		}

		async fn run(&self) -> Result<RunOutcome, SyncError> {
			let _ = self.runs.send(self.kind);
			let next = self.script.lock().unwrap().pop_front();
			next.unwrap_or_else(|| Ok(self.fallback.clone()))
		}
	}

	fn fast_config() -> RunnerConfig {
		RunnerConfig {
			initial_backoff: Duration::from_millis(1),
			max_backoff: Duration::from_millis(5),
			failure_threshold: 3,
			recycle_after: 2,
		}
	}

	const LONG: Duration = Duration::from_secs(3600);
	const WAIT: Duration = Duration::from_secs(2);

	#[tokio::test]
	async fn test_wake_cuts_sleep_short() {
		let wakers = Wakers::new();
		let chain: Arc<dyn ChainClient> = Arc::new(FakeChain::new());
		let (shutdown_tx, shutdown) = watch::channel(false);

		let (target, mut target_runs) =
			ScriptedTask::new(TaskKind::Notification, vec![], RunOutcome::after(LONG));
		let target_handle = tokio::spawn(run_task(
			target,
			wakers.clone(),
			chain.clone(),
			fast_config(),
			shutdown.clone(),
		));
		timeout(WAIT, target_runs.recv()).await.unwrap().unwrap();

		let (waker, mut waker_runs) = ScriptedTask::new(
			TaskKind::SyncEngine,
			vec![Ok(RunOutcome {
				next_interval: LONG,
				wake: vec![TaskKind::Notification],
			})],
			RunOutcome::after(LONG),
		);
		let waker_handle = tokio::spawn(run_task(waker, wakers.clone(), chain, fast_config(), shutdown));
		timeout(WAIT, waker_runs.recv()).await.unwrap().unwrap();

		// The target sleeps for an hour but runs again right away.
		timeout(WAIT, target_runs.recv()).await.unwrap().unwrap();

		shutdown_tx.send(true).unwrap();
		timeout(WAIT, target_handle).await.unwrap().unwrap();
		timeout(WAIT, waker_handle).await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_shutdown_stops_sleeping_task() {
		let (task, mut runs) = ScriptedTask::new(TaskKind::Translation, vec![], RunOutcome::after(LONG));
		let (shutdown_tx, shutdown) = watch::channel(false);
		let handle = tokio::spawn(run_task(
			task,
			Wakers::new(),
			Arc::new(FakeChain::new()),
			fast_config(),
			shutdown,
		));
		timeout(WAIT, runs.recv()).await.unwrap().unwrap();
		shutdown_tx.send(true).unwrap();
		timeout(WAIT, handle).await.unwrap().unwrap();
		assert!(runs.try_recv().is_err());
	}

	#[tokio::test]
	async fn test_transient_failures_back_off_and_recycle() {
		let chain = FakeChain::new();
		let script = (0..4)
			.map(|_| Err(SyncError::ChainError(ChainError::Status(503))))
			.collect();
		let (task, mut runs) = ScriptedTask::new(TaskKind::MasterDetector, script, RunOutcome::after(LONG));
		let (shutdown_tx, shutdown) = watch::channel(false);
		let handle = tokio::spawn(run_task(
			task,
			Wakers::new(),
			Arc::new(chain.clone()),
			fast_config(),
			shutdown,
		));

		// Four failing runs, then the first success.
		for _ in 0..5 {
			timeout(WAIT, runs.recv()).await.unwrap().unwrap();
		}
		assert_eq!(chain.recycled(), 2);

		shutdown_tx.send(true).unwrap();
		timeout(WAIT, handle).await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_non_transient_failure_does_not_recycle() {
		let chain = FakeChain::new();
		let script = (0..2)
			.map(|_| Err(SyncError::NotFound("gone".to_string())))
			.collect();
		let (task, mut runs) = ScriptedTask::new(TaskKind::SyncEngine, script, RunOutcome::after(LONG));
		let (shutdown_tx, shutdown) = watch::channel(false);
		let handle = tokio::spawn(run_task(
			task,
			Wakers::new(),
			Arc::new(chain.clone()),
			fast_config(),
			shutdown,
		));
		for _ in 0..3 {
			timeout(WAIT, runs.recv()).await.unwrap().unwrap();
		}
		assert_eq!(chain.recycled(), 0);

		drop(shutdown_tx);
		timeout(WAIT, handle).await.unwrap().unwrap();
	}

	#[test]
	fn test_backoff_is_capped() {
		let config = fast_config();
		let mut backoff = config.backoff();
		for _ in 0..20 {
			let next = backoff.next_backoff().unwrap();
			// Randomization may add up to half the interval on top of the cap.
			assert!(next <= config.max_backoff * 3 / 2);
		}
	}
}

//! Signals emitted by the sync loops for downstream readers.
//!
//! Readers that cache store contents (a query API, a search index) subscribe to
//! [`CacheReload`] and reload when the generation counter moves. Bursts of changes coalesce:
//! a slow reader sees only the latest generation.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone)]
pub struct CacheReload {
	tx: Arc<watch::Sender<u64>>,
}

impl Default for CacheReload {
	fn default() -> Self {
		Self::new()
	}
}

impl CacheReload {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(0);
		Self { tx: Arc::new(tx) }
	}

	pub fn subscribe(&self) -> watch::Receiver<u64> {
		self.tx.subscribe()
	}

	/// Advance the generation, notifying every subscriber.
	pub fn bump(&self) {
		self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
		debug!(generation = *self.tx.borrow(), "Cache reload signalled");
	}

	pub fn generation(&self) -> u64 {
		*self.tx.borrow()
	}
}

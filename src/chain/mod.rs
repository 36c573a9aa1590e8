//! Chain RPC access.
//!
//! The sync loops talk to the chain only through [`ChainClient`], implemented over a TON Center
//! v2 HTTP API by [`TonCenterClient`].

/// HTTP client for the TON Center API
mod client;
/// Response shapes and decoded chain types
mod types;

pub use client::TonCenterClient;
pub use types::{AccountState, AccountStatus, ChainError, Message, Transaction, TxId};

use crate::model::EntityType;
use async_trait::async_trait;

#[async_trait]
pub trait ChainClient: Send + Sync {
	/// Sequence number of the latest masterchain block.
	async fn masterchain_seqno(&self) -> Result<u64, ChainError>;

	async fn account_state(&self, address: &str) -> Result<AccountState, ChainError>;

	/// Transactions of `address` with `after_lt < lt <= to.lt`, oldest first.
	async fn transactions(&self, address: &str, after_lt: u64, to: &TxId) -> Result<Vec<Transaction>, ChainError>;

	/// Raw address of the `entity_type` item at `index`, resolved through the master's getter for
	/// that type. Admins, users and orders are numbered independently.
	async fn item_address(&self, master: &str, entity_type: EntityType, index: u64) -> Result<String, ChainError>;

	/// Drop and rebuild any long-lived connection state.
	fn recycle(&self) {}
}

//! Full resync of the master contract.
//!
//! Replaces the category and language tables from master storage, flags translatable entities
//! when the language set changes, and discovers items the contract has minted since the last
//! resync: each new index gets its address resolved, a placeholder row, and a queued sync.

use super::SyncError;
use super::scheduler::Scheduler;
use crate::chain::ChainClient;
use crate::content::{AdminContent, MasterData, OrderContent, UserContent, format_hash, parse_master_data};
use crate::model::{EntityKey, EntityType};
use crate::store::Store;
use crate::store::queries::{entities, reference, settings};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Hash identifying one version of the master contract's data.
pub fn state_hash(data_boc: &[u8]) -> String {
	format_hash(&Sha256::digest(data_boc).into())
}

/// Settings key holding the next undiscovered index of an item type.
pub fn next_index_key(entity_type: EntityType) -> Option<&'static str> {
	match entity_type {
		EntityType::Admin => Some(settings::NEXT_ADMIN_INDEX),
		EntityType::User => Some(settings::NEXT_USER_INDEX),
		EntityType::Order => Some(settings::NEXT_ORDER_INDEX),
		EntityType::Master => None,
	}
}

#[derive(Clone)]
pub struct MasterSync {
	chain: Arc<dyn ChainClient>,
	store: Store,
	scheduler: Scheduler,
	master_address: String,
}

impl MasterSync {
	pub fn new(chain: Arc<dyn ChainClient>, store: Store, scheduler: Scheduler, master_address: String) -> Self {
		Self {
			chain,
			store,
			scheduler,
			master_address,
		}
	}

	/// Resync the master contract. Returns the chain time of the state that was applied.
	pub async fn resync(&self) -> Result<DateTime<Utc>, SyncError> {
		let state = self.chain.account_state(&self.master_address).await?;
		if !state.has_data() {
			return Err(SyncError::NotFound(format!(
				"master contract {} has no data",
				self.master_address
			)));
		}
		let master = parse_master_data(state.data_cell()?)?;

		self.replace_reference_tables(&master)?;
		for entity_type in EntityType::ITEMS {
			if let Some(contract_next) = master.next_index(entity_type) {
				self.discover(entity_type, contract_next).await?;
			}
		}

		let hash = state_hash(&state.data);
		self.store
			.with(|conn| settings::set(conn, settings::MASTER_CONTENT_HASH, &hash))?;
		info!(
			admins = master.next_admin_index,
			users = master.next_user_index,
			orders = master.next_order_index,
			categories = master.categories.len(),
			languages = master.languages.len(),
			"Master resync complete"
		);
		Ok(state.sync_utime)
	}

	fn replace_reference_tables(&self, master: &MasterData) -> Result<(), SyncError> {
		let flagged = self.store.transaction(|conn| {
			let before: BTreeSet<String> = reference::list_languages(conn)?
				.into_iter()
				.map(|l| l.code)
				.collect();
			reference::replace_categories(conn, &master.categories)?;
			reference::replace_languages(conn, &master.languages)?;
			let after: BTreeSet<String> = master.languages.iter().map(|l| l.code.clone()).collect();

			if before == after {
				return Ok(0);
			}
			Ok(entities::flag_needs_translation(conn, EntityType::User)?
				+ entities::flag_needs_translation(conn, EntityType::Order)?)
		})?;
		if flagged > 0 {
			info!(flagged, "Language set changed, flagged entities for translation");
		}
		Ok(())
	}

	/// Register every index in `[next stored index, contract_next)` for `entity_type`.
	async fn discover(&self, entity_type: EntityType, contract_next: u64) -> Result<(), SyncError> {
		let Some(cursor_key) = next_index_key(entity_type) else {
			return Ok(());
		};
		let mut next = self.store.with(|conn| settings::get_u64(conn, cursor_key, 0))?;
		if next < contract_next {
			info!(entity_type = %entity_type, from = next, to = contract_next, "Discovering new items");
		}

		while next < contract_next {
			let address = self
				.chain
				.item_address(&self.master_address, entity_type, next)
				.await?;
			let index = next;
			self.store.with(|conn| {
				let inserted = match entity_type {
					EntityType::Admin => entities::insert_placeholder::<AdminContent>(conn, index, &address)?,
					EntityType::User => entities::insert_placeholder::<UserContent>(conn, index, &address)?,
					EntityType::Order => entities::insert_placeholder::<OrderContent>(conn, index, &address)?,
					EntityType::Master => false,
				};
				debug!(entity_type = %entity_type, index, address = %address, inserted, "Registered item");
				Ok(())
			})?;
			self.scheduler
				.schedule(EntityKey::new(entity_type, index), DateTime::UNIX_EPOCH)?;
			next += 1;
			self.store
				.with(|conn| settings::set_u64(conn, cursor_key, next))?;
		}
		Ok(())
	}
}

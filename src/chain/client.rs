//!
//! HTTP client for a TON Center v2 compatible API.
//!
//! Wraps the handful of endpoints the sync loops need: masterchain head, account state,
//! transaction history paging and the master's per-type item address getters.

use super::ChainClient;
use super::types::*;
use crate::cell::{CellSlice, parse_boc_base64};
use crate::model::EntityType;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// Transactions requested per `getTransactions` page.
const PAGE_SIZE: usize = 50;

pub struct TonCenterClient {
	/// Rebuilt by `recycle`; cloned out for each request.
	http_client: Mutex<Client>,
	/// Base URL, e.g. `https://toncenter.com/api/v2`.
	endpoint: String,
	api_key: Option<String>,
	timeout: Duration,
}

impl TonCenterClient {
	/// Create a new client.
	///
	/// # Arguments
	/// * `endpoint` - Base URL of the v2 API, without a trailing slash.
	/// * `api_key` - Optional key sent as `X-API-Key`.
	/// * `timeout` - Per-request timeout.
	pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Result<Self, ChainError> {
		Ok(Self {
			http_client: Mutex::new(build_http_client(timeout)?),
			endpoint: endpoint.trim_end_matches('/').to_string(),
			api_key,
			timeout,
		})
	}

	fn http(&self) -> Result<Client, ChainError> {
		self.http_client
			.lock()
			.map(|c| c.clone())
			.map_err(|_| ChainError::InvalidResponse("HTTP client lock poisoned".to_string()))
	}

	async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> Result<T, ChainError> {
		let mut request = self
			.http()?
			.get(format!("{}/{}", self.endpoint, method))
			.query(query);
		if let Some(key) = &self.api_key {
			request = request.header("X-API-Key", key);
		}
		unwrap_response(method, request.send().await?).await
	}

	async fn post<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T, ChainError> {
		let mut request = self
			.http()?
			.post(format!("{}/{}", self.endpoint, method))
			.header("Content-Type", "application/json")
			.json(&body);
		if let Some(key) = &self.api_key {
			request = request.header("X-API-Key", key);
		}
		unwrap_response(method, request.send().await?).await
	}

	async fn transactions_page(
		&self,
		address: &str,
		from: &TxId,
		to_lt: u64,
	) -> Result<Vec<Transaction>, ChainError> {
		let raw: Vec<RawTransaction> = self
			.get(
				"getTransactions",
				&[
					("address", address.to_string()),
					("limit", PAGE_SIZE.to_string()),
					("lt", from.lt.to_string()),
					("hash", from.hash.clone()),
					("to_lt", to_lt.to_string()),
					("archival", "true".to_string()),
				],
			)
			.await?;
		raw.into_iter().map(Transaction::try_from).collect()
	}
}

/// Master getter mapping an item index of `entity_type` to the item's address.
fn address_getter(entity_type: EntityType) -> Result<&'static str, ChainError> {
	match entity_type {
		EntityType::Admin => Ok("get_admin_address_by_index"),
		EntityType::User => Ok("get_user_address_by_index"),
		EntityType::Order => Ok("get_order_address_by_index"),
		EntityType::Master => Err(ChainError::InvalidResponse(
			"the master contract is not an indexed item".to_string(),
		)),
	}
}

fn build_http_client(timeout: Duration) -> Result<Client, ChainError> {
	Ok(Client::builder().timeout(timeout).build()?)
}

/// Check the HTTP status and the API envelope, returning `result`.
async fn unwrap_response<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T, ChainError> {
	let status = response.status();
	let body = response.text().await?;
	debug!(method, status = status.as_u16(), "RPC response");

	// Error envelopes come with non-2xx statuses; prefer their message when present.
	let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
		Ok(envelope) => envelope,
		Err(_) if !status.is_success() => return Err(ChainError::Status(status.as_u16())),
		Err(e) => return Err(ChainError::JsonError(e)),
	};
	if !envelope.ok {
		return Err(ChainError::RpcError {
			code: envelope.code.or(Some(status.as_u16())),
			message: envelope.error.unwrap_or_else(|| "unknown error".to_string()),
		});
	}
	envelope.result.ok_or(ChainError::NoData)
}

#[async_trait]
impl ChainClient for TonCenterClient {
	async fn masterchain_seqno(&self) -> Result<u64, ChainError> {
		let info: MasterchainInfo = self.get("getMasterchainInfo", &[]).await?;
		Ok(info.last.seqno)
	}

	async fn account_state(&self, address: &str) -> Result<AccountState, ChainError> {
		let raw: RawAddressInformation = self
			.get("getAddressInformation", &[("address", address.to_string())])
			.await?;
		raw.try_into()
	}

	async fn transactions(&self, address: &str, after_lt: u64, to: &TxId) -> Result<Vec<Transaction>, ChainError> {
		let mut collected: Vec<Transaction> = Vec::new();
		let mut cursor = to.clone();

		// Pages run newest to oldest and include the cursor transaction itself.
		loop {
			let page = self.transactions_page(address, &cursor, after_lt).await?;
			let fetched = page.len();
			let mut reached_end = fetched < PAGE_SIZE;
			for tx in page {
				if tx.id.lt <= after_lt {
					reached_end = true;
					break;
				}
				if collected.last().is_some_and(|last| last.id.lt <= tx.id.lt) {
					continue;
				}
				collected.push(tx);
			}
			match collected.last() {
				Some(last) if !reached_end && last.id != cursor => cursor = last.id.clone(),
				_ => break,
			}
		}

		collected.reverse();
		debug!(address, after_lt, count = collected.len(), "Fetched transactions");
		Ok(collected)
	}

	async fn item_address(&self, master: &str, entity_type: EntityType, index: u64) -> Result<String, ChainError> {
		let method = address_getter(entity_type)?;
		let result: RunGetMethodResult = self
			.post(
				"runGetMethod",
				json!({
					"address": master,
					"method": method,
					"stack": [["num", index.to_string()]],
				}),
			)
			.await?;
		if result.exit_code != 0 {
			return Err(ChainError::RpcError {
				code: None,
				message: format!("{} exited with {}", method, result.exit_code),
			});
		}
		let bytes = result
			.stack
			.first()
			.and_then(|(_, entry)| entry.get("bytes"))
			.and_then(|b| b.as_str())
			.ok_or(ChainError::NoData)?;
		let mut slice = CellSlice::new(parse_boc_base64(bytes)?);
		let address = slice
			.load_address()?
			.ok_or_else(|| ChainError::InvalidResponse("getter returned addr_none".to_string()))?;
		Ok(address.to_raw())
	}

	fn recycle(&self) {
		match (build_http_client(self.timeout), self.http_client.lock()) {
			(Ok(client), Ok(mut slot)) => {
				*slot = client;
				info!("Recycled RPC HTTP client");
			}
			(Err(e), _) => tracing::warn!("Failed to rebuild RPC HTTP client: {}", e),
			(_, Err(_)) => tracing::warn!("RPC HTTP client lock poisoned"),
		}
	}
}

//! Types for the TON Center v2 HTTP API and their decoded forms.

use crate::cell::{Cell, CellError, parse_boc};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Envelope of every API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
	pub ok: bool,
	pub result: Option<T>,
	pub error: Option<String>,
	pub code: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct MasterchainInfo {
	pub last: BlockIdExt,
}

#[derive(Debug, Deserialize)]
pub struct BlockIdExt {
	pub workchain: i32,
	pub seqno: u64,
}

/// `lt` is a decimal string, `hash` is base64.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTxId {
	pub lt: String,
	pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct RawAddressInformation {
	#[serde(default)]
	pub balance: serde_json::Value,
	#[serde(default)]
	pub data: String,
	pub last_transaction_id: Option<RawTxId>,
	pub sync_utime: i64,
	pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct RawTransaction {
	pub utime: i64,
	pub transaction_id: RawTxId,
	pub in_msg: Option<RawMessage>,
	#[serde(default)]
	pub out_msgs: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
pub struct RawMessage {
	#[serde(default)]
	pub source: String,
	#[serde(default)]
	pub destination: String,
	#[serde(default)]
	pub value: String,
	pub msg_data: Option<RawMessageData>,
}

#[derive(Debug, Deserialize)]
pub struct RawMessageData {
	#[serde(rename = "@type")]
	pub kind: String,
	pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunGetMethodResult {
	pub exit_code: i32,
	pub stack: Vec<(String, serde_json::Value)>,
}

/// Transaction identity: logical time plus hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId {
	pub lt: u64,
	pub hash: String,
}

impl TryFrom<RawTxId> for TxId {
	type Error = ChainError;

	fn try_from(raw: RawTxId) -> Result<Self, Self::Error> {
		let lt = raw
			.lt
			.parse()
			.map_err(|_| ChainError::InvalidResponse(format!("bad lt '{}'", raw.lt)))?;
		Ok(TxId { lt, hash: raw.hash })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
	Active,
	Uninitialized,
	Frozen,
}

/// Snapshot of an account as seen by the node that served the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
	pub status: AccountStatus,
	/// Raw BOC of the persistent data, empty when the account has none.
	pub data: Vec<u8>,
	/// `None` for accounts that never had a transaction.
	pub last_transaction: Option<TxId>,
	/// Chain time the snapshot reflects.
	pub sync_utime: DateTime<Utc>,
}

impl AccountState {
	/// Whether the account holds contract data that can be decoded.
	pub fn has_data(&self) -> bool {
		self.status == AccountStatus::Active && !self.data.is_empty()
	}

	pub fn data_cell(&self) -> Result<Arc<Cell>, CellError> {
		parse_boc(&self.data)
	}
}

impl TryFrom<RawAddressInformation> for AccountState {
	type Error = ChainError;

	fn try_from(raw: RawAddressInformation) -> Result<Self, Self::Error> {
		let status = match raw.state.as_str() {
			"active" => AccountStatus::Active,
			"frozen" => AccountStatus::Frozen,
			_ => AccountStatus::Uninitialized,
		};
		let data = if raw.data.is_empty() {
			Vec::new()
		} else {
			decode_base64(&raw.data)?
		};
		// An account without history reports lt "0".
		let last_transaction = raw
			.last_transaction_id
			.map(TxId::try_from)
			.transpose()?
			.filter(|id| id.lt != 0);
		let sync_utime = DateTime::from_timestamp(raw.sync_utime, 0)
			.ok_or_else(|| ChainError::InvalidResponse(format!("bad sync_utime {}", raw.sync_utime)))?;

		Ok(AccountState {
			status,
			data,
			last_transaction,
			sync_utime,
		})
	}
}

/// A message attached to a transaction. Addresses are as reported by the API (user-friendly).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
	pub source: Option<String>,
	pub destination: Option<String>,
	/// Attached value in nanotons.
	pub value: u128,
	/// Raw BOC of the body.
	pub body: Option<Vec<u8>>,
}

impl Message {
	pub fn body_cell(&self) -> Result<Option<Arc<Cell>>, CellError> {
		self.body.as_deref().map(parse_boc).transpose()
	}
}

impl TryFrom<RawMessage> for Message {
	type Error = ChainError;

	fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
		let value = if raw.value.is_empty() {
			0
		} else {
			raw.value
				.parse()
				.map_err(|_| ChainError::InvalidResponse(format!("bad message value '{}'", raw.value)))?
		};
		let body = match raw.msg_data {
			Some(RawMessageData {
				kind,
				body: Some(body),
			}) if kind == "msg.dataRaw" && !body.is_empty() => Some(decode_base64(&body)?),
			_ => None,
		};
		Ok(Message {
			source: Some(raw.source).filter(|s| !s.is_empty()),
			destination: Some(raw.destination).filter(|s| !s.is_empty()),
			value,
			body,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
	pub id: TxId,
	pub utime: DateTime<Utc>,
	pub in_msg: Option<Message>,
	pub out_msgs: Vec<Message>,
}

impl Transaction {
	/// Every source and destination address touched by the transaction's messages.
	pub fn counterparties(&self) -> impl Iterator<Item = &str> {
		self.in_msg
			.iter()
			.chain(self.out_msgs.iter())
			.flat_map(|m| [m.source.as_deref(), m.destination.as_deref()])
			.flatten()
	}
}

impl TryFrom<RawTransaction> for Transaction {
	type Error = ChainError;

	fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
		Ok(Transaction {
			id: raw.transaction_id.try_into()?,
			utime: DateTime::from_timestamp(raw.utime, 0)
				.ok_or_else(|| ChainError::InvalidResponse(format!("bad utime {}", raw.utime)))?,
			in_msg: raw.in_msg.map(Message::try_from).transpose()?,
			out_msgs: raw
				.out_msgs
				.into_iter()
				.map(Message::try_from)
				.collect::<Result<_, _>>()?,
		})
	}
}

fn decode_base64(s: &str) -> Result<Vec<u8>, ChainError> {
	STANDARD
		.decode(s)
		.map_err(|e| ChainError::InvalidResponse(format!("bad base64: {}", e)))
}

/// Error types for chain RPC operations
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
	#[error("RPC error {code:?}: {message}")]
	RpcError { code: Option<u16>, message: String },

	#[error("HTTP status {0}")]
	Status(u16),

	#[error("No data returned")]
	NoData,

	#[error("Invalid response: {0}")]
	InvalidResponse(String),

	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Cell error: {0}")]
	Cell(#[from] CellError),
}

impl ChainError {
	/// Whether retrying the same request later may succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			ChainError::Status(code) => *code == 429 || *code >= 500,
			ChainError::RpcError { code: Some(code), .. } => *code == 429 || *code >= 500,
			ChainError::RpcError { code: None, .. } => false,
			ChainError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
			ChainError::NoData => true,
			ChainError::InvalidResponse(_) | ChainError::JsonError(_) | ChainError::Cell(_) => false,
		}
	}
}

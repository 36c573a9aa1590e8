use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Who is expected to send a given order operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
	Customer,
	Freelancer,
	Admin,
	Master,
	Unknown,
}

impl SenderRole {
	pub fn as_str(&self) -> &'static str {
		match self {
			SenderRole::Customer => "customer",
			SenderRole::Freelancer => "freelancer",
			SenderRole::Admin => "admin",
			SenderRole::Master => "master",
			SenderRole::Unknown => "unknown",
		}
	}
}

/// Operation carried by the inbound message of an order transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOp {
	OrderDeploy,
	AddResponse,
	AssignUser,
	AcceptOrder,
	RejectOrder,
	CompleteOrder,
	CustomerFeedback,
	RefundNoConsensus,
	ArbitrationRequest,
	ArbitrationDecision,
	ArbitrationComplete,
	/// Inbound message without a recognised op, including empty-body transfers.
	Unknown,
}

impl OrderOp {
	/// Every recognised operation.
	pub const KNOWN: [OrderOp; 11] = [
		OrderOp::OrderDeploy,
		OrderOp::AddResponse,
		OrderOp::AssignUser,
		OrderOp::AcceptOrder,
		OrderOp::RejectOrder,
		OrderOp::CompleteOrder,
		OrderOp::CustomerFeedback,
		OrderOp::RefundNoConsensus,
		OrderOp::ArbitrationRequest,
		OrderOp::ArbitrationDecision,
		OrderOp::ArbitrationComplete,
	];

	pub fn sender_role(&self) -> SenderRole {
		match self {
			OrderOp::OrderDeploy => SenderRole::Master,
			OrderOp::AddResponse | OrderOp::AcceptOrder | OrderOp::RejectOrder | OrderOp::CompleteOrder => {
				SenderRole::Freelancer
			}
			OrderOp::AssignUser
			| OrderOp::CustomerFeedback
			| OrderOp::RefundNoConsensus
			| OrderOp::ArbitrationRequest => SenderRole::Customer,
			OrderOp::ArbitrationDecision | OrderOp::ArbitrationComplete => SenderRole::Admin,
			OrderOp::Unknown => SenderRole::Unknown,
		}
	}

	/// Operations whose body continues with `query_id:uint64 amount:Coins`.
	pub fn carries_amount(&self) -> bool {
		matches!(
			self,
			OrderOp::OrderDeploy | OrderOp::AssignUser | OrderOp::ArbitrationDecision
		)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderOp::OrderDeploy => "order_deploy",
			OrderOp::AddResponse => "add_response",
			OrderOp::AssignUser => "assign_user",
			OrderOp::AcceptOrder => "accept_order",
			OrderOp::RejectOrder => "reject_order",
			OrderOp::CompleteOrder => "complete_order",
			OrderOp::CustomerFeedback => "customer_feedback",
			OrderOp::RefundNoConsensus => "refund_no_consensus",
			OrderOp::ArbitrationRequest => "arbitration_request",
			OrderOp::ArbitrationDecision => "arbitration_decision",
			OrderOp::ArbitrationComplete => "arbitration_complete",
			OrderOp::Unknown => "unknown",
		}
	}

	pub fn parse(s: &str) -> Self {
		Self::KNOWN
			.iter()
			.copied()
			.find(|op| op.as_str() == s)
			.unwrap_or(OrderOp::Unknown)
	}
}

/// Mapping between the 32-bit `op` prefix of order message bodies and [`OrderOp`].
///
/// The defaults are the codes of the order contract this service was written against; they are
/// not derived from anything on chain. A deployment of another contract revision sets its own
/// codes under `[chain.order_ops]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpCodes {
	codes: Vec<(u32, OrderOp)>,
}

impl Default for OpCodes {
	fn default() -> Self {
		Self {
			codes: vec![
				(0x1d0b9a4f, OrderOp::OrderDeploy),
				(0x2c7d4e10, OrderOp::AddResponse),
				(0x3a1e5b22, OrderOp::AssignUser),
				(0x48b7c3d1, OrderOp::AcceptOrder),
				(0x4f0c2a9e, OrderOp::RejectOrder),
				(0x5e6d8f31, OrderOp::CompleteOrder),
				(0x6b2f1c07, OrderOp::CustomerFeedback),
				(0x72a94e5c, OrderOp::RefundNoConsensus),
				(0x7f3e0d18, OrderOp::ArbitrationRequest),
				(0x8c5a2b46, OrderOp::ArbitrationDecision),
				(0x93d17e0a, OrderOp::ArbitrationComplete),
			],
		}
	}
}

impl OpCodes {
	/// Default codes with `overrides` (operation name → code) applied. Codes must stay distinct.
	pub fn with_overrides(overrides: &BTreeMap<String, u32>) -> Result<Self, String> {
		let mut codes = Self::default().codes;
		for (name, code) in overrides {
			let op = OrderOp::parse(name);
			let Some(entry) = codes.iter_mut().find(|(_, known)| *known == op) else {
				return Err(format!("unknown operation '{}'", name));
			};
			entry.0 = *code;
		}
		let distinct: BTreeSet<u32> = codes.iter().map(|(code, _)| *code).collect();
		if distinct.len() != codes.len() {
			return Err("op codes must be distinct".to_string());
		}
		Ok(Self { codes })
	}

	pub fn op(&self, code: u32) -> OrderOp {
		self.codes
			.iter()
			.find(|(c, _)| *c == code)
			.map(|(_, op)| *op)
			.unwrap_or(OrderOp::Unknown)
	}

	#[cfg(test)]
	pub fn code(&self, op: OrderOp) -> Option<u32> {
		self.codes.iter().find(|(_, o)| *o == op).map(|(c, _)| *c)
	}
}

impl fmt::Display for OrderOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One decoded operation against an order contract, keyed by `(order_index, tx_lt)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderActivity {
	/// Row id, assigned on first insertion.
	pub id: Option<i64>,
	pub order_index: u64,
	pub tx_lt: u64,
	pub tx_hash: String,
	pub timestamp: DateTime<Utc>,
	pub op_code: OrderOp,
	pub sender_address: Option<String>,
	pub sender_role: SenderRole,
	/// Amount in nanotons, for operations that carry one.
	pub amount: Option<u128>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_op_codes_are_distinct_and_reversible() {
		let codes = OpCodes::default();
		for op in OrderOp::KNOWN {
			let code = codes.code(op).unwrap();
			assert_eq!(codes.op(code), op);
			assert_eq!(OrderOp::parse(op.as_str()), op);
		}
		assert_eq!(codes.op(0), OrderOp::Unknown);
		assert_eq!(codes.code(OrderOp::Unknown), None);
	}

	#[test]
	fn test_op_code_overrides() {
		let codes = OpCodes::with_overrides(&BTreeMap::from([("complete_order".to_string(), 0x0000_0042)])).unwrap();
		assert_eq!(codes.op(0x42), OrderOp::CompleteOrder);
		assert_eq!(codes.op(0x5e6d8f31), OrderOp::Unknown);
		assert_eq!(codes.code(OrderOp::AssignUser), OpCodes::default().code(OrderOp::AssignUser));

		assert!(OpCodes::with_overrides(&BTreeMap::from([("refund".to_string(), 1)])).is_err());
		assert!(OpCodes::with_overrides(&BTreeMap::from([("unknown".to_string(), 1)])).is_err());
		let clash = OpCodes::default().code(OrderOp::AssignUser).unwrap();
		assert!(OpCodes::with_overrides(&BTreeMap::from([("accept_order".to_string(), clash)])).is_err());
	}

	#[test]
	fn test_sender_role_follows_op() {
		assert_eq!(OrderOp::OrderDeploy.sender_role(), SenderRole::Master);
		assert_eq!(OrderOp::AddResponse.sender_role(), SenderRole::Freelancer);
		assert_eq!(OrderOp::AssignUser.sender_role(), SenderRole::Customer);
		assert_eq!(OrderOp::ArbitrationDecision.sender_role(), SenderRole::Admin);
		assert_eq!(OrderOp::Unknown.sender_role(), SenderRole::Unknown);
	}
}

//! Decoding of order transactions into [`OrderActivity`] records.
//!
//! The inbound message body of an order transaction starts with `op:uint32`; operations that move
//! value continue with `query_id:uint64 amount:Coins`. Bodies are sender-controlled, so a body that
//! does not decode is recorded as an `Unknown` operation rather than failing the order's sync.

use crate::cell::{Address, CellSlice};
use crate::chain::Transaction;
use crate::model::{OpCodes, OrderActivity, OrderOp};
use tracing::debug;

/// Decode the activity carried by `tx`, if it has an inbound internal message.
pub fn decode_activity(order_index: u64, tx: &Transaction, codes: &OpCodes) -> Option<OrderActivity> {
	let in_msg = tx.in_msg.as_ref()?;
	// External inbound messages carry no sender and are not order operations.
	let source = in_msg.source.as_deref()?;

	let (op_code, amount) = match in_msg.body_cell() {
		Ok(Some(body)) => decode_body(CellSlice::new(body), codes),
		Ok(None) => (OrderOp::Unknown, None),
		Err(e) => {
			debug!(order_index, lt = tx.id.lt, "Undecodable message body: {}", e);
			(OrderOp::Unknown, None)
		}
	};

	Some(OrderActivity {
		id: None,
		order_index,
		tx_lt: tx.id.lt,
		tx_hash: tx.id.hash.clone(),
		timestamp: tx.utime,
		op_code,
		sender_address: Some(normalize_address(source)),
		sender_role: op_code.sender_role(),
		amount,
	})
}

fn decode_body(mut body: CellSlice, codes: &OpCodes) -> (OrderOp, Option<u128>) {
	let Ok(code) = body.load_uint(32) else {
		return (OrderOp::Unknown, None);
	};
	let op = codes.op(code as u32);
	let amount = if op.carries_amount() {
		body.load_uint(64).and_then(|_| body.load_coins()).ok()
	} else {
		None
	};
	(op, amount)
}

/// Raw form of an address, or the input unchanged if it does not parse.
pub fn normalize_address(address: &str) -> String {
	Address::parse(address)
		.map(|a| a.to_raw())
		.unwrap_or_else(|_| address.to_string())
}

//! Cell decoding for contract storage.
//!
//! Contract state arrives from the RPC as a serialized bag of cells. This module turns those
//! bytes into a cell tree, exposes a read cursor over a cell's bits and references, and decodes
//! the edge-labelled binary trie ("hashmap") used to store property maps inside a cell.
//!
//! Everything here is pure: no I/O, no global state.

/// Raw and user-friendly account address handling
mod address;
/// Bag-of-cells deserialization
mod boc;
/// Cell and read cursor types
mod cell;
/// Dictionary (hashmap) and snake-string decoding
mod dict;

#[cfg(test)]
pub mod builder;

pub use address::Address;
pub use boc::{parse_boc, parse_boc_base64};
pub use cell::{Cell, CellSlice, MAX_CELL_BITS, MAX_CELL_REFS};
pub use dict::{DictKey, Dictionary, load_snake_bytes, parse_dict, parse_dict_opt, resolve_value};

/// Errors raised while decoding cells, dictionaries and addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
	#[error("cell underflow: needed {needed} bits, {remaining} remaining")]
	NotEnoughBits { needed: usize, remaining: usize },

	#[error("cell underflow: no reference left")]
	NotEnoughRefs,

	#[error("cell overflow: {0}")]
	Overflow(String),

	#[error("malformed dictionary: {0}")]
	MalformedDictionary(String),

	#[error("invalid BOC: {0}")]
	InvalidBoc(String),

	#[error("invalid address: {0}")]
	InvalidAddress(String),

	#[error("invalid string: {0}")]
	InvalidString(String),

	#[error("unsupported encoding: {0}")]
	Unsupported(String),
}

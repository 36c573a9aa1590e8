//! Dictionary (`Hashmap n X`) decoding.
//!
//! A dictionary is a binary trie over fixed-length keys. Every node starts with an edge label
//! holding a run of key bits in one of three encodings:
//!
//! - `hml_short$0`: unary length, then the bits
//! - `hml_long$10`: length in `ceil(log2(m + 1))` bits, then the bits
//! - `hml_same$11`: one repeated bit, then the length
//!
//! A node whose label uses up the remaining key bits is a leaf and the rest of its cell is the
//! value. Any other node is a fork: reference 0 continues with key bit 0, reference 1 with key
//! bit 1.

use super::{CellError, CellSlice};
use std::collections::BTreeMap;

/// A fixed-length dictionary key, stored as individual bits in big-endian order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DictKey {
	bits: Vec<bool>,
}

impl DictKey {
	pub fn from_bits(bits: Vec<bool>) -> Self {
		Self { bits }
	}

	pub fn len(&self) -> usize {
		self.bits.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bits.is_empty()
	}

	pub fn bits(&self) -> &[bool] {
		&self.bits
	}

	/// Interpret the key as an unsigned integer. Keys wider than 64 bits return `None`.
	#[cfg(test)]
	pub fn to_u64(&self) -> Option<u64> {
		if self.bits.len() > 64 {
			return None;
		}
		Some(self.bits.iter().fold(0u64, |acc, bit| (acc << 1) | u64::from(*bit)))
	}

	/// Interpret a 256-bit key as a hash.
	pub fn to_hash(&self) -> Option<[u8; 32]> {
		if self.bits.len() != 256 {
			return None;
		}
		let mut out = [0u8; 32];
		for (i, bit) in self.bits.iter().enumerate() {
			if *bit {
				out[i / 8] |= 1 << (7 - i % 8);
			}
		}
		Some(out)
	}

	pub fn from_hash(hash: &[u8; 32]) -> Self {
		let bits = hash
			.iter()
			.flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
			.collect();
		Self { bits }
	}
}

/// Decoded dictionary: every key is exactly the requested bit length.
pub type Dictionary = BTreeMap<DictKey, CellSlice>;

/// Decode a `Hashmap n X` whose root node starts at `root`.
pub fn parse_dict(root: CellSlice, key_bits: usize) -> Result<Dictionary, CellError> {
	let mut out = Dictionary::new();
	let mut prefix = Vec::with_capacity(key_bits);
	parse_node(root, key_bits, key_bits, 0, &mut prefix, &mut out)?;
	Ok(out)
}

/// Decode a `HashmapE n X`: a presence bit, then the root as a reference.
pub fn parse_dict_opt(slice: &mut CellSlice, key_bits: usize) -> Result<Dictionary, CellError> {
	match slice.load_maybe_ref()? {
		Some(root) => parse_dict(CellSlice::new(root), key_bits),
		None => Ok(Dictionary::new()),
	}
}

fn parse_node(
	mut slice: CellSlice,
	budget: usize,
	key_bits: usize,
	depth: usize,
	prefix: &mut Vec<bool>,
	out: &mut Dictionary,
) -> Result<(), CellError> {
	if depth > key_bits {
		return Err(CellError::MalformedDictionary(format!(
			"trie depth {} exceeds key length {}",
			depth, key_bits
		)));
	}

	let label = read_label(&mut slice, budget).map_err(|e| match e {
		CellError::MalformedDictionary(_) => e,
		other => CellError::MalformedDictionary(format!("unreadable edge label: {}", other)),
	})?;
	let remaining = budget - label.len();
	let prefix_len = prefix.len();
	prefix.extend_from_slice(&label);

	if remaining == 0 {
		out.insert(DictKey::from_bits(prefix.clone()), slice);
	} else {
		if slice.remaining_refs() < 2 {
			return Err(CellError::MalformedDictionary(format!(
				"fork at key prefix of {} bits has {} child references",
				prefix.len(),
				slice.remaining_refs()
			)));
		}
		let left = slice.load_ref()?;
		let right = slice.load_ref()?;
		for (bit, child) in [(false, left), (true, right)] {
			prefix.push(bit);
			parse_node(
				CellSlice::new(child),
				remaining - 1,
				key_bits,
				depth + 1,
				prefix,
				out,
			)?;
			prefix.pop();
		}
	}

	prefix.truncate(prefix_len);
	Ok(())
}

fn read_label(slice: &mut CellSlice, budget: usize) -> Result<Vec<bool>, CellError> {
	let too_long = |len: usize| {
		CellError::MalformedDictionary(format!(
			"label of {} bits exceeds the remaining {} key bits",
			len, budget
		))
	};

	if !slice.load_bit()? {
		let mut len = 0usize;
		while slice.load_bit()? {
			len += 1;
			if len > budget {
				return Err(too_long(len));
			}
		}
		return slice.load_bits(len);
	}

	let len_bits = (usize::BITS - budget.leading_zeros()) as usize;
	if !slice.load_bit()? {
		let len = slice.load_uint(len_bits)? as usize;
		if len > budget {
			return Err(too_long(len));
		}
		slice.load_bits(len)
	} else {
		let bit = slice.load_bit()?;
		let len = slice.load_uint(len_bits)? as usize;
		if len > budget {
			return Err(too_long(len));
		}
		Ok(vec![bit; len])
	}
}

/// Resolve a dictionary value that may be stored inline or behind a reference.
///
/// A value slice with no data bits left but a pending reference is treated as `^Cell`.
pub fn resolve_value(value: &CellSlice) -> Result<CellSlice, CellError> {
	if value.remaining_bits() == 0 && value.remaining_refs() > 0 {
		let mut value = value.clone();
		Ok(CellSlice::new(value.load_ref()?))
	} else {
		Ok(value.clone())
	}
}

/// Read a snake-encoded byte string: the bytes in this cell, then those in the first
/// reference, and so on until a cell has no reference left.
pub fn load_snake_bytes(slice: CellSlice) -> Result<Vec<u8>, CellError> {
	let mut out = Vec::new();
	let mut current = slice;
	loop {
		let bits = current.remaining_bits();
		if bits % 8 != 0 {
			return Err(CellError::InvalidString(format!(
				"snake segment holds {} bits, not a whole number of bytes",
				bits
			)));
		}
		out.extend(current.load_bytes(bits / 8)?);
		if current.remaining_refs() == 0 {
			return Ok(out);
		}
		current = CellSlice::new(current.load_ref()?);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cell::builder::{CellBuilder, LabelStyle, encode_dict, key_bits, snake_cell};
	use std::collections::BTreeMap;

	fn sample_keys(key_len: usize) -> Vec<u64> {
		let space = 1u64 << key_len;
		(0..space).filter(|k| (k * 7 + 3) % 5 != 0 || *k == 0).collect()
	}

	#[test]
	fn test_round_trip_all_label_forms_and_depths() {
		for style in [LabelStyle::Short, LabelStyle::Long, LabelStyle::Same] {
			for key_len in 0..=8usize {
				let keys = sample_keys(key_len);
				let entries: Vec<(Vec<bool>, CellBuilder)> = keys
					.iter()
					.map(|k| {
						(
							key_bits(*k, key_len),
							CellBuilder::new().store_uint(u128::from(*k) * 3 + 1, 16),
						)
					})
					.collect();
				let root = encode_dict(&entries, key_len, style);
				let dict = parse_dict(CellSlice::new(root), key_len).unwrap();

				let decoded: BTreeMap<u64, u64> = dict
					.into_iter()
					.map(|(key, mut value)| {
						assert_eq!(key.len(), key_len);
						(key.to_u64().unwrap(), value.load_uint(16).unwrap())
					})
					.collect();
				let expected: BTreeMap<u64, u64> =
					keys.iter().map(|k| (*k, *k * 3 + 1)).collect();
				assert_eq!(decoded, expected, "style {:?}, key length {}", style, key_len);
			}
		}
	}

	#[test]
	fn test_sparse_wide_keys() {
		let keys = [0u64, 1, 0x8000_0000_0000_0000, u64::MAX];
		let entries: Vec<(Vec<bool>, CellBuilder)> = keys
			.iter()
			.map(|k| (key_bits(*k, 64), CellBuilder::new().store_bit(*k % 2 == 1)))
			.collect();
		let dict = parse_dict(
			CellSlice::new(encode_dict(&entries, 64, LabelStyle::Same)),
			64,
		)
		.unwrap();
		assert_eq!(dict.len(), 4);
		for (key, mut value) in dict {
			let k = key.to_u64().unwrap();
			assert!(keys.contains(&k));
			assert_eq!(value.load_bit().unwrap(), k % 2 == 1);
		}
	}

	#[test]
	fn test_label_longer_than_budget_is_rejected() {
		// hml_long claiming 5 bits with a budget of 4.
		let root = CellBuilder::new()
			.store_bit(true)
			.store_bit(false)
			.store_uint(5, 3)
			.store_uint(0, 5)
			.build();
		assert!(matches!(
			parse_dict(CellSlice::new(root), 4),
			Err(CellError::MalformedDictionary(_))
		));
	}

	#[test]
	fn test_fork_without_children_is_rejected() {
		// Empty hml_short label on an 8-bit budget, then no references.
		let root = CellBuilder::new().store_bit(false).store_bit(false).build();
		assert!(matches!(
			parse_dict(CellSlice::new(root), 8),
			Err(CellError::MalformedDictionary(_))
		));

		let child = CellBuilder::new()
			.store_bit(false)
			.store_bit(true)
			.store_bit(false)
			.store_bit(true)
			.build();
		let half = CellBuilder::new().store_bit(false).store_bit(false).store_ref(child).build();
		assert!(matches!(
			parse_dict(CellSlice::new(half), 2),
			Err(CellError::MalformedDictionary(_))
		));
	}

	#[test]
	fn test_truncated_label_is_rejected() {
		let root = CellBuilder::new().store_bit(true).build();
		assert!(matches!(
			parse_dict(CellSlice::new(root), 16),
			Err(CellError::MalformedDictionary(_))
		));
	}

	#[test]
	fn test_optional_dictionary() {
		let mut empty = CellSlice::new(CellBuilder::new().store_bit(false).build());
		assert!(parse_dict_opt(&mut empty, 256).unwrap().is_empty());

		let hash = [0xabu8; 32];
		let entries = vec![(
			DictKey::from_hash(&hash).bits().to_vec(),
			CellBuilder::new().store_uint(9, 8),
		)];
		let root = encode_dict(&entries, 256, LabelStyle::Long);
		let mut slice = CellSlice::new(CellBuilder::new().store_maybe_ref(Some(root)).build());
		let dict = parse_dict_opt(&mut slice, 256).unwrap();
		let (key, _) = dict.iter().next().unwrap();
		assert_eq!(key.to_hash(), Some(hash));
	}

	#[test]
	fn test_snake_concatenation() {
		for segments in [1usize, 2, 5] {
			let payload: Vec<u8> = (0..=255u8).cycle().take(segments * 120).collect();
			let cell = snake_cell(&payload, 120);
			let mut depth = 1;
			let mut cursor = cell.clone();
			while let Some(next) = cursor.refs().first().cloned() {
				depth += 1;
				cursor = next;
			}
			assert_eq!(depth, segments);
			assert_eq!(load_snake_bytes(CellSlice::new(cell)).unwrap(), payload);
		}
	}

	#[test]
	fn test_snake_rejects_partial_bytes() {
		let cell = CellBuilder::new().store_uint(1, 4).build();
		assert!(matches!(
			load_snake_bytes(CellSlice::new(cell)),
			Err(CellError::InvalidString(_))
		));
	}

	#[test]
	fn test_resolve_value_follows_reference() {
		let inner = CellBuilder::new().store_uint(77, 8).build();
		let by_ref = CellSlice::new(CellBuilder::new().store_ref(inner).build());
		assert_eq!(resolve_value(&by_ref).unwrap().load_uint(8).unwrap(), 77);

		let inline = CellSlice::new(CellBuilder::new().store_uint(5, 8).build());
		assert_eq!(resolve_value(&inline).unwrap().load_uint(8).unwrap(), 5);
	}
}

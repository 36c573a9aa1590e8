//! Test fixtures: a cell builder, a dictionary encoder and a BOC serializer.

use super::{Address, Cell};
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct CellBuilder {
	bits: Vec<bool>,
	refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn store_bit(mut self, bit: bool) -> Self {
		self.bits.push(bit);
		self
	}

	pub fn store_bits(mut self, bits: &[bool]) -> Self {
		self.bits.extend_from_slice(bits);
		self
	}

	pub fn store_uint(mut self, value: u128, bits: usize) -> Self {
		for i in (0..bits).rev() {
			self.bits.push((value >> i) & 1 == 1);
		}
		self
	}

	pub fn store_bytes(mut self, bytes: &[u8]) -> Self {
		for byte in bytes {
			self = self.store_uint(u128::from(*byte), 8);
		}
		self
	}

	pub fn store_coins(self, amount: u128) -> Self {
		let len = (128 - amount.leading_zeros() as usize).div_ceil(8);
		self.store_uint(len as u128, 4).store_uint(amount, len * 8)
	}

	pub fn store_address(self, address: Option<&Address>) -> Self {
		match address {
			None => self.store_uint(0, 2),
			Some(address) => self
				.store_uint(0b10, 2)
				.store_bit(false)
				.store_uint(u128::from(address.workchain as u8), 8)
				.store_bytes(&address.hash),
		}
	}

	pub fn store_ref(mut self, cell: Arc<Cell>) -> Self {
		self.refs.push(cell);
		self
	}

	pub fn store_maybe_ref(self, cell: Option<Arc<Cell>>) -> Self {
		match cell {
			Some(cell) => self.store_bit(true).store_ref(cell),
			None => self.store_bit(false),
		}
	}

	/// Append the bits and references of another builder.
	pub fn append(mut self, other: CellBuilder) -> Self {
		self.bits.extend(other.bits);
		self.refs.extend(other.refs);
		self
	}

	pub fn build(self) -> Arc<Cell> {
		let mut data = vec![0u8; self.bits.len().div_ceil(8)];
		for (i, bit) in self.bits.iter().enumerate() {
			if *bit {
				data[i / 8] |= 1 << (7 - i % 8);
			}
		}
		Arc::new(Cell::new(data, self.bits.len(), self.refs).expect("cell within limits"))
	}
}

/// Split `bytes` into a snake chain with at most `chunk` bytes per cell.
pub fn snake_cell(bytes: &[u8], chunk: usize) -> Arc<Cell> {
	let chunks: Vec<&[u8]> = if bytes.is_empty() {
		vec![&[]]
	} else {
		bytes.chunks(chunk).collect()
	};
	let mut tail: Option<Arc<Cell>> = None;
	for part in chunks.into_iter().rev() {
		let mut builder = CellBuilder::new().store_bytes(part);
		if let Some(next) = tail.take() {
			builder = builder.store_ref(next);
		}
		tail = Some(builder.build());
	}
	tail.expect("at least one chunk")
}

/// Which edge-label encoding the encoder should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
	Short,
	Long,
	/// `hml_same` where the label is uniform, `hml_long` otherwise.
	Same,
}

/// Encode a dictionary of `key_bits`-bit keys. Each value builder is appended at its leaf.
pub fn encode_dict(
	entries: &[(Vec<bool>, CellBuilder)],
	key_bits: usize,
	style: LabelStyle,
) -> Arc<Cell> {
	assert!(!entries.is_empty(), "Hashmap needs at least one entry");
	let refs: Vec<(&[bool], &CellBuilder)> = entries
		.iter()
		.map(|(key, value)| {
			assert_eq!(key.len(), key_bits);
			(key.as_slice(), value)
		})
		.collect();
	encode_node(&refs, key_bits, style).build()
}

/// Encode a `HashmapE` (maybe-ref root) into a builder.
pub fn encode_dict_opt(
	entries: &[(Vec<bool>, CellBuilder)],
	key_bits: usize,
	style: LabelStyle,
) -> CellBuilder {
	if entries.is_empty() {
		CellBuilder::new().store_bit(false)
	} else {
		CellBuilder::new().store_maybe_ref(Some(encode_dict(entries, key_bits, style)))
	}
}

fn encode_node(entries: &[(&[bool], &CellBuilder)], budget: usize, style: LabelStyle) -> CellBuilder {
	let first = entries[0].0;
	let common = entries.iter().fold(first.len(), |len, (key, _)| {
		first
			.iter()
			.zip(key.iter())
			.take(len)
			.take_while(|(a, b)| a == b)
			.count()
	});
	let label = &first[..common];
	let builder = write_label(CellBuilder::new(), label, budget, style);

	if common == budget {
		assert_eq!(entries.len(), 1, "duplicate key");
		return builder.append(entries[0].1.clone());
	}

	let (left, right): (Vec<_>, Vec<_>) = entries
		.iter()
		.map(|(key, value)| (&key[common..], *value))
		.partition(|(rest, _)| !rest[0]);
	let left: Vec<_> = left.into_iter().map(|(rest, v)| (&rest[1..], v)).collect();
	let right: Vec<_> = right.into_iter().map(|(rest, v)| (&rest[1..], v)).collect();
	let child_budget = budget - common - 1;

	builder
		.store_ref(encode_node(&left, child_budget, style).build())
		.store_ref(encode_node(&right, child_budget, style).build())
}

fn write_label(builder: CellBuilder, label: &[bool], budget: usize, style: LabelStyle) -> CellBuilder {
	let len_bits = (usize::BITS - budget.leading_zeros()) as usize;
	let uniform = label.windows(2).all(|w| w[0] == w[1]) && !label.is_empty();
	match style {
		LabelStyle::Short => {
			let mut builder = builder.store_bit(false);
			for _ in 0..label.len() {
				builder = builder.store_bit(true);
			}
			builder.store_bit(false).store_bits(label)
		}
		LabelStyle::Same if uniform => builder
			.store_bit(true)
			.store_bit(true)
			.store_bit(label[0])
			.store_uint(label.len() as u128, len_bits),
		LabelStyle::Long | LabelStyle::Same => builder
			.store_bit(true)
			.store_bit(false)
			.store_uint(label.len() as u128, len_bits)
			.store_bits(label),
	}
}

/// Serialize a cell tree into a BOC without index or checksum.
pub fn to_boc(root: &Arc<Cell>) -> Vec<u8> {
	let mut order: Vec<Arc<Cell>> = Vec::new();
	collect_pre_order(root, &mut order);

	let mut cell_bytes: Vec<Vec<u8>> = Vec::with_capacity(order.len());
	let ref_size = byte_width(order.len() as u64);
	// Pre-order numbering: a child's index is computed as it is visited.
	let mut next_index = 1usize;
	let mut child_indices: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
	assign_child_indices(root, 0, &mut next_index, &mut child_indices);

	for (i, cell) in order.iter().enumerate() {
		let full_bytes = cell.bit_len() / 8;
		let partial = cell.bit_len() % 8 != 0;
		let d1 = cell.refs().len() as u8;
		let d2 = (full_bytes * 2 + usize::from(partial)) as u8;
		let mut bytes = vec![d1, d2];
		let mut data = cell.data()[..cell.bit_len().div_ceil(8)].to_vec();
		if partial {
			let bit = cell.bit_len() % 8;
			let last = data.len() - 1;
			data[last] &= 0xffu8 << (8 - bit);
			data[last] |= 1 << (7 - bit);
		}
		bytes.extend(data);
		for child in &child_indices[i] {
			bytes.extend(&(*child as u64).to_be_bytes()[8 - ref_size..]);
		}
		cell_bytes.push(bytes);
	}

	let total: usize = cell_bytes.iter().map(Vec::len).sum();
	let off_bytes = byte_width(total as u64);

	let mut out = vec![0xb5, 0xee, 0x9c, 0x72, ref_size as u8, off_bytes as u8];
	for value in [order.len() as u64, 1, 0] {
		out.extend(&value.to_be_bytes()[8 - ref_size..]);
	}
	out.extend(&(total as u64).to_be_bytes()[8 - off_bytes..]);
	out.extend(&0u64.to_be_bytes()[8 - ref_size..]);
	for bytes in cell_bytes {
		out.extend(bytes);
	}
	out
}

fn collect_pre_order(cell: &Arc<Cell>, order: &mut Vec<Arc<Cell>>) {
	order.push(cell.clone());
	for child in cell.refs() {
		collect_pre_order(child, order);
	}
}

fn assign_child_indices(
	cell: &Arc<Cell>,
	index: usize,
	next_index: &mut usize,
	child_indices: &mut Vec<Vec<usize>>,
) {
	for child in cell.refs() {
		let child_index = *next_index;
		*next_index += 1;
		child_indices[index].push(child_index);
		assign_child_indices(child, child_index, next_index, child_indices);
	}
}

fn byte_width(value: u64) -> usize {
	((64 - value.leading_zeros() as usize).div_ceil(8)).max(1)
}

/// Big-endian bits of `value`, `bits` wide.
pub fn key_bits(value: u64, bits: usize) -> Vec<bool> {
	(0..bits).rev().map(|i| (value >> i) & 1 == 1).collect()
}

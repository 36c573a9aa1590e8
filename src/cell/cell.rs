use super::{Address, CellError};
use std::sync::Arc;

/// Maximum number of data bits a single cell can hold.
pub const MAX_CELL_BITS: usize = 1023;
/// Maximum number of child references a single cell can hold.
pub const MAX_CELL_REFS: usize = 4;

/// A bounded bit string plus up to four references to child cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
	data: Vec<u8>,
	bit_len: usize,
	refs: Vec<Arc<Cell>>,
}

impl Cell {
	/// Create a cell from packed big-endian bits and its child references.
	pub fn new(data: Vec<u8>, bit_len: usize, refs: Vec<Arc<Cell>>) -> Result<Self, CellError> {
		if bit_len > MAX_CELL_BITS {
			return Err(CellError::Overflow(format!(
				"{} bits exceeds the {} bit limit",
				bit_len, MAX_CELL_BITS
			)));
		}
		if refs.len() > MAX_CELL_REFS {
			return Err(CellError::Overflow(format!(
				"{} references exceeds the {} reference limit",
				refs.len(),
				MAX_CELL_REFS
			)));
		}
		if data.len() * 8 < bit_len {
			return Err(CellError::Overflow(format!(
				"{} data bytes cannot hold {} bits",
				data.len(),
				bit_len
			)));
		}

		Ok(Self {
			data,
			bit_len,
			refs,
		})
	}

	pub fn bit_len(&self) -> usize {
		self.bit_len
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	pub fn refs(&self) -> &[Arc<Cell>] {
		&self.refs
	}

	fn bit(&self, index: usize) -> bool {
		(self.data[index / 8] >> (7 - index % 8)) & 1 == 1
	}
}

/// Read cursor over a cell.
///
/// A slice owns a reference-counted handle to its cell and tracks how many bits and references
/// have been consumed, so it can be cloned cheaply and stored as a dictionary value.
#[derive(Debug, Clone)]
pub struct CellSlice {
	cell: Arc<Cell>,
	bit_pos: usize,
	ref_pos: usize,
}

impl CellSlice {
	pub fn new(cell: Arc<Cell>) -> Self {
		Self {
			cell,
			bit_pos: 0,
			ref_pos: 0,
		}
	}

	pub fn remaining_bits(&self) -> usize {
		self.cell.bit_len - self.bit_pos
	}

	pub fn remaining_refs(&self) -> usize {
		self.cell.refs.len() - self.ref_pos
	}

	pub fn is_empty(&self) -> bool {
		self.remaining_bits() == 0 && self.remaining_refs() == 0
	}

	fn ensure_bits(&self, needed: usize) -> Result<(), CellError> {
		let remaining = self.remaining_bits();
		if remaining < needed {
			return Err(CellError::NotEnoughBits { needed, remaining });
		}
		Ok(())
	}

	pub fn load_bit(&mut self) -> Result<bool, CellError> {
		self.ensure_bits(1)?;
		let bit = self.cell.bit(self.bit_pos);
		self.bit_pos += 1;
		Ok(bit)
	}

	/// Load an unsigned big-endian integer of up to 64 bits.
	pub fn load_uint(&mut self, bits: usize) -> Result<u64, CellError> {
		if bits > 64 {
			return Err(CellError::Unsupported(format!("{}-bit integer", bits)));
		}
		Ok(self.load_u128(bits)? as u64)
	}

	/// Load an unsigned big-endian integer of up to 128 bits.
	pub fn load_u128(&mut self, bits: usize) -> Result<u128, CellError> {
		if bits > 128 {
			return Err(CellError::Unsupported(format!("{}-bit integer", bits)));
		}
		self.ensure_bits(bits)?;
		let mut value = 0u128;
		for _ in 0..bits {
			value = (value << 1) | u128::from(self.cell.bit(self.bit_pos));
			self.bit_pos += 1;
		}
		Ok(value)
	}

	pub fn load_bits(&mut self, bits: usize) -> Result<Vec<bool>, CellError> {
		self.ensure_bits(bits)?;
		let out = (self.bit_pos..self.bit_pos + bits)
			.map(|i| self.cell.bit(i))
			.collect();
		self.bit_pos += bits;
		Ok(out)
	}

	pub fn load_bytes(&mut self, count: usize) -> Result<Vec<u8>, CellError> {
		self.ensure_bits(count * 8)?;
		let mut out = Vec::with_capacity(count);
		for _ in 0..count {
			out.push(self.load_uint(8)? as u8);
		}
		Ok(out)
	}

	pub fn load_u256(&mut self) -> Result<[u8; 32], CellError> {
		let bytes = self.load_bytes(32)?;
		let mut out = [0u8; 32];
		out.copy_from_slice(&bytes);
		Ok(out)
	}

	pub fn load_ref(&mut self) -> Result<Arc<Cell>, CellError> {
		let cell = self
			.cell
			.refs
			.get(self.ref_pos)
			.cloned()
			.ok_or(CellError::NotEnoughRefs)?;
		self.ref_pos += 1;
		Ok(cell)
	}

	/// `Maybe ^Cell`: a presence bit followed by an optional reference.
	pub fn load_maybe_ref(&mut self) -> Result<Option<Arc<Cell>>, CellError> {
		if self.load_bit()? {
			Ok(Some(self.load_ref()?))
		} else {
			Ok(None)
		}
	}

	/// `VarUInteger 16`: a 4-bit byte length followed by that many big-endian bytes.
	pub fn load_coins(&mut self) -> Result<u128, CellError> {
		let len = self.load_uint(4)? as usize;
		self.load_u128(len * 8)
	}

	/// `MsgAddress`, accepting `addr_none` and `addr_std` without anycast.
	pub fn load_address(&mut self) -> Result<Option<Address>, CellError> {
		match self.load_uint(2)? {
			0b00 => Ok(None),
			0b10 => {
				if self.load_bit()? {
					return Err(CellError::Unsupported("anycast address".to_string()));
				}
				let workchain = self.load_uint(8)? as u8 as i8;
				let hash = self.load_u256()?;
				Ok(Some(Address { workchain, hash }))
			}
			0b01 => Err(CellError::Unsupported("external address".to_string())),
			_ => Err(CellError::Unsupported("variable-length address".to_string())),
		}
	}
}

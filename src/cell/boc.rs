//! Bag-of-cells deserialization.
//!
//! Only the generic `b5ee9c72` layout is accepted. The optional offset index and CRC32C trailer
//! are skipped rather than verified; the RPC transport already guards payload integrity.

use super::{Cell, CellError, MAX_CELL_REFS};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::sync::Arc;

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

struct RawCell {
	data: Vec<u8>,
	bit_len: usize,
	refs: Vec<usize>,
}

struct Reader<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	fn take(&mut self, count: usize) -> Result<&'a [u8], CellError> {
		let end = self
			.pos
			.checked_add(count)
			.filter(|end| *end <= self.bytes.len())
			.ok_or_else(|| {
				CellError::InvalidBoc(format!(
					"unexpected end of data at offset {} (wanted {} bytes)",
					self.pos, count
				))
			})?;
		let out = &self.bytes[self.pos..end];
		self.pos = end;
		Ok(out)
	}

	fn byte(&mut self) -> Result<u8, CellError> {
		Ok(self.take(1)?[0])
	}

	fn uint(&mut self, width: usize) -> Result<usize, CellError> {
		Ok(self
			.take(width)?
			.iter()
			.fold(0usize, |acc, b| (acc << 8) | usize::from(*b)))
	}
}

/// Decode a base64-encoded BOC and return its first root cell.
pub fn parse_boc_base64(encoded: &str) -> Result<Arc<Cell>, CellError> {
	let bytes = STANDARD
		.decode(encoded.trim())
		.map_err(|e| CellError::InvalidBoc(format!("invalid base64: {}", e)))?;
	parse_boc(&bytes)
}

/// Decode a serialized BOC and return its first root cell.
pub fn parse_boc(bytes: &[u8]) -> Result<Arc<Cell>, CellError> {
	let mut reader = Reader { bytes, pos: 0 };

	if reader.take(4)? != BOC_MAGIC {
		return Err(CellError::InvalidBoc("unknown magic".to_string()));
	}

	let flags = reader.byte()?;
	let has_index = flags & 0x80 != 0;
	let ref_size = usize::from(flags & 0x07);
	if !(1..=4).contains(&ref_size) {
		return Err(CellError::InvalidBoc(format!("invalid reference size {}", ref_size)));
	}
	let offset_size = usize::from(reader.byte()?);
	if !(1..=8).contains(&offset_size) {
		return Err(CellError::InvalidBoc(format!("invalid offset size {}", offset_size)));
	}

	let cell_count = reader.uint(ref_size)?;
	let root_count = reader.uint(ref_size)?;
	let _absent = reader.uint(ref_size)?;
	let total_size = reader.uint(offset_size)?;

	if root_count == 0 || root_count > cell_count {
		return Err(CellError::InvalidBoc(format!(
			"{} roots for {} cells",
			root_count, cell_count
		)));
	}

	let mut roots = Vec::with_capacity(root_count);
	for _ in 0..root_count {
		roots.push(reader.uint(ref_size)?);
	}
	if has_index {
		reader.take(cell_count * offset_size)?;
	}

	let data_start = reader.pos;
	let mut raw_cells = Vec::with_capacity(cell_count);
	for index in 0..cell_count {
		raw_cells.push(read_raw_cell(&mut reader, index, cell_count, ref_size)?);
	}
	if reader.pos - data_start != total_size {
		return Err(CellError::InvalidBoc(format!(
			"cell data is {} bytes, header declares {}",
			reader.pos - data_start,
			total_size
		)));
	}

	// References only point forward, so children are always built before their parents.
	let mut built: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
	for index in (0..cell_count).rev() {
		let raw = &raw_cells[index];
		let refs = raw
			.refs
			.iter()
			.map(|r| {
				built[*r]
					.clone()
					.ok_or_else(|| CellError::InvalidBoc(format!("dangling reference {}", r)))
			})
			.collect::<Result<Vec<_>, _>>()?;
		built[index] = Some(Arc::new(Cell::new(raw.data.clone(), raw.bit_len, refs)?));
	}

	built[roots[0]]
		.clone()
		.ok_or_else(|| CellError::InvalidBoc(format!("root index {} out of range", roots[0])))
}

fn read_raw_cell(
	reader: &mut Reader<'_>,
	index: usize,
	cell_count: usize,
	ref_size: usize,
) -> Result<RawCell, CellError> {
	let d1 = reader.byte()?;
	let d2 = reader.byte()?;

	let ref_count = usize::from(d1 & 0x07);
	let exotic = d1 & 0x08 != 0;
	let with_hashes = d1 & 0x10 != 0;
	let level_mask = d1 >> 5;

	if ref_count > MAX_CELL_REFS {
		return Err(CellError::InvalidBoc(format!(
			"cell {} declares {} references",
			index, ref_count
		)));
	}
	if exotic {
		return Err(CellError::Unsupported(format!("exotic cell {}", index)));
	}
	if with_hashes {
		let hash_count = level_mask.count_ones() as usize + 1;
		reader.take(hash_count * (32 + 2))?;
	}

	let data_len = usize::from(d2).div_ceil(2);
	let mut data = reader.take(data_len)?.to_vec();
	let bit_len = if d2 % 2 == 0 {
		data_len * 8
	} else {
		// The last byte carries a completion tag: a single 1 bit after the payload.
		let last = data
			.last_mut()
			.ok_or_else(|| CellError::InvalidBoc(format!("cell {} has no data", index)))?;
		if *last == 0 {
			return Err(CellError::InvalidBoc(format!(
				"cell {} is missing its completion tag",
				index
			)));
		}
		let padding = last.trailing_zeros() as usize + 1;
		*last &= !(1u8 << (padding - 1));
		data_len * 8 - padding
	};

	let mut refs = Vec::with_capacity(ref_count);
	for _ in 0..ref_count {
		let target = reader.uint(ref_size)?;
		if target <= index || target >= cell_count {
			return Err(CellError::InvalidBoc(format!(
				"cell {} references cell {}",
				index, target
			)));
		}
		refs.push(target);
	}

	Ok(RawCell {
		data,
		bit_len,
		refs,
	})
}

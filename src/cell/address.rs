use super::CellError;
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE},
};
use std::fmt;
use std::str::FromStr;

/// A standard account address: workchain plus 256-bit account id.
///
/// Addresses are compared and stored in raw form (`wc:hex`). User-friendly base64 forms are
/// accepted on input, since that is what the RPC reports for message sources and destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
	pub workchain: i8,
	pub hash: [u8; 32],
}

impl Address {
	pub fn parse(input: &str) -> Result<Self, CellError> {
		let input = input.trim();
		if let Some((workchain, hash)) = input.split_once(':') {
			return Self::parse_raw(workchain, hash);
		}
		Self::parse_friendly(input)
	}

	fn parse_raw(workchain: &str, hash: &str) -> Result<Self, CellError> {
		let workchain = workchain
			.parse::<i8>()
			.map_err(|e| CellError::InvalidAddress(format!("bad workchain {}: {}", workchain, e)))?;
		let bytes = hex::decode(hash)
			.map_err(|e| CellError::InvalidAddress(format!("bad account id: {}", e)))?;
		let hash: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
			CellError::InvalidAddress(format!("account id is {} bytes, expected 32", b.len()))
		})?;
		Ok(Self { workchain, hash })
	}

	fn parse_friendly(input: &str) -> Result<Self, CellError> {
		if input.len() != 48 {
			return Err(CellError::InvalidAddress(format!(
				"expected 48 characters, got {}",
				input.len()
			)));
		}
		let bytes = if input.contains(['-', '_']) {
			URL_SAFE.decode(input)
		} else {
			STANDARD.decode(input)
		}
		.map_err(|e| CellError::InvalidAddress(format!("invalid base64: {}", e)))?;

		if bytes.len() != 36 {
			return Err(CellError::InvalidAddress(format!(
				"decoded to {} bytes, expected 36",
				bytes.len()
			)));
		}
		let tag = bytes[0] & 0x7f;
		if tag != 0x11 && tag != 0x51 {
			return Err(CellError::InvalidAddress(format!("unknown tag 0x{:02x}", bytes[0])));
		}
		let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
		let actual = crc16(&bytes[..34]);
		if expected != actual {
			return Err(CellError::InvalidAddress(format!(
				"checksum mismatch: 0x{:04x} != 0x{:04x}",
				expected, actual
			)));
		}

		let mut hash = [0u8; 32];
		hash.copy_from_slice(&bytes[2..34]);
		Ok(Self {
			workchain: bytes[1] as i8,
			hash,
		})
	}

	/// Raw `wc:hex` form, the canonical representation in the store.
	pub fn to_raw(&self) -> String {
		format!("{}:{}", self.workchain, hex::encode(self.hash))
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_raw())
	}
}

impl FromStr for Address {
	type Err = CellError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

/// CRC-16/XMODEM, as used by user-friendly addresses.
fn crc16(data: &[u8]) -> u16 {
	let mut crc = 0u16;
	for byte in data {
		crc ^= u16::from(*byte) << 8;
		for _ in 0..8 {
			crc = if crc & 0x8000 != 0 {
				(crc << 1) ^ 0x1021
			} else {
				crc << 1
			};
		}
	}
	crc
}

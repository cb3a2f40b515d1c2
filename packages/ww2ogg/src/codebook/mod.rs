//! Packed codebook library loading and codebook transcoding.
//!
//! Wwise strips Vorbis codebooks down to a compact representation, either inline in the
//! setup packet or as an index into an external "packed codebook" library shipped with
//! the game. This module can load that library and re-expand ("rebuild") a stripped
//! codebook into a standard Vorbis codebook, or verify and pass through ("copy") a
//! codebook that is already in standard form.

use std::{
	fs,
	io::{Read, Write},
	path::Path
};

use log::trace;
use vorbis_bitpack::{bitpacked_integer_width, BitpackReader};

use crate::{bitreader::read_dyn, error::Ww2OggError, math, ogg::OggPageWriter};

/// The 24-bit ASCII `"BCV"` magic identifying a standard Vorbis codebook, little-endian.
const CODEBOOK_SYNC: u32 = 0x5643_42;

/// A loaded packed codebook library: a sequence of codebook byte blobs indexed `0..N`,
/// located via a trailing offset table.
pub struct CodebookLibrary {
	data: Vec<u8>,
	offsets: Vec<u32>
}

impl CodebookLibrary {
	/// Loads a packed codebook library from a file at `path`.
	pub fn open(path: &Path) -> Result<Self, Ww2OggError> {
		let data = fs::read(path)?;
		Self::from_bytes(data)
	}

	/// Parses a packed codebook library already read into memory.
	pub fn from_bytes(data: Vec<u8>) -> Result<Self, Ww2OggError> {
		if data.len() < 4 {
			return Err(Ww2OggError::parse("codebook library file is too small to contain an offset table"));
		}

		let offset_index_start = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap()) as usize;
		if offset_index_start > data.len() {
			return Err(Ww2OggError::parse("codebook library offset table start is out of range"));
		}

		let table = &data[offset_index_start..];
		if table.len() % 4 != 0 {
			return Err(Ww2OggError::parse("codebook library offset table is not a whole number of entries"));
		}

		let offsets: Vec<u32> = table
			.chunks_exact(4)
			.map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
			.collect();

		trace!(
			"loaded codebook library: {} usable codebooks, {} bytes of data",
			offsets.len().saturating_sub(1),
			offset_index_start
		);

		Ok(Self { data, offsets })
	}

	/// The number of usable codebooks in this library.
	pub fn len(&self) -> usize {
		self.offsets.len().saturating_sub(1)
	}

	/// Whether this library contains no usable codebooks.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns the packed byte blob for codebook `id`, or `None` if `id` is out of
	/// range.
	pub fn get(&self, id: u32) -> Option<&[u8]> {
		let id = id as usize;
		if id + 1 >= self.offsets.len() {
			return None;
		}
		let start = self.offsets[id] as usize;
		let end = self.offsets[id + 1] as usize;
		self.data.get(start..end)
	}
}

/// Reads and re-emits a codebook already in standard Vorbis form, verifying its sync
/// pattern and lookup type along the way.
///
/// Used both when a setup packet's codebooks are already standard (`--full-setup`) and
/// when copying a pre-existing header triad's setup packet.
pub fn copy_codebook<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	let sync = reader.read_unsigned_integer(bitpacked_integer_width!(24))?;
	if sync != CODEBOOK_SYNC {
		return Err(Ww2OggError::parse("invalid codebook identifier"));
	}
	let dimensions = reader.read_unsigned_integer(bitpacked_integer_width!(16))?;
	let entries = reader.read_unsigned_integer(bitpacked_integer_width!(24))?;

	writer.put_uint(u64::from(CODEBOOK_SYNC), 24);
	writer.put_uint(u64::from(dimensions), 16);
	writer.put_uint(u64::from(entries), 24);

	copy_codeword_lengths(reader, writer, entries)?;
	transcode_lookup_table(reader, writer, entries, dimensions, 4)?;
	Ok(())
}

fn copy_codeword_lengths<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	writer: &mut OggPageWriter<W>,
	entries: u32
) -> Result<(), Ww2OggError> {
	let ordered = reader.read_flag()?;
	writer.put_bit(ordered);

	if ordered {
		let initial_length = reader.read_unsigned_integer(bitpacked_integer_width!(5))?;
		writer.put_uint(u64::from(initial_length), 5);

		let mut current_entry = 0u32;
		while current_entry < entries {
			let width = math::ilog(entries - current_entry);
			let number = read_dyn(reader, width)?;
			writer.put_uint(u64::from(number), width);
			current_entry += number;
		}
		if current_entry > entries {
			return Err(Ww2OggError::parse("codebook codeword run length overran entry count"));
		}
	} else {
		let sparse = reader.read_flag()?;
		writer.put_bit(sparse);

		for _ in 0..entries {
			let present = if sparse {
				let present = reader.read_flag()?;
				writer.put_bit(present);
				present
			} else {
				true
			};
			if present {
				let length = reader.read_unsigned_integer(bitpacked_integer_width!(5))?;
				writer.put_uint(u64::from(length), 5);
			}
		}
	}
	Ok(())
}

/// Handles the lookup table tail shared by both the copy and rebuild paths: a lookup
/// type field (whose input width differs between the two) followed, for lookup type 1,
/// by the vector quantization value table.
fn transcode_lookup_table<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	writer: &mut OggPageWriter<W>,
	entries: u32,
	dimensions: u32,
	lookup_type_read_width: u32
) -> Result<(), Ww2OggError> {
	let lookup_type = read_dyn(reader, lookup_type_read_width)?;
	writer.put_uint(u64::from(lookup_type), 4);

	match lookup_type {
		0 => Ok(()),
		1 => {
			let min = reader.read_unsigned_integer(bitpacked_integer_width!(32))?;
			let max = reader.read_unsigned_integer(bitpacked_integer_width!(32))?;
			let value_length = reader.read_unsigned_integer(bitpacked_integer_width!(4))?;
			let sequence_flag = reader.read_flag()?;

			writer.put_uint(u64::from(min), 32);
			writer.put_uint(u64::from(max), 32);
			writer.put_uint(u64::from(value_length), 4);
			writer.put_bit(sequence_flag);

			let quantvals = math::book_maptype1_quantvals(entries, dimensions);
			trace!("codebook lookup type 1: {quantvals} quantization values");
			for _ in 0..quantvals {
				let value = read_dyn(reader, value_length + 1)?;
				writer.put_uint(u64::from(value), value_length + 1);
			}
			Ok(())
		}
		2 => Err(Ww2OggError::parse("unsupported codebook lookup type 2")),
		_ => Err(Ww2OggError::parse("invalid codebook lookup type"))
	}
}

/// Re-expands a Wwise-stripped codebook into a standard Vorbis codebook.
///
/// `cb_size` is the number of bytes the packed representation is expected to occupy;
/// pass `0` to disable the resulting length check (used for inline codebooks, which
/// have no independently known size).
pub fn rebuild_codebook<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	cb_size: u32,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	let bits_before = reader.bits_read();

	let dimensions = read_dyn(reader, 4)?;
	let entries = read_dyn(reader, 14)?;

	writer.put_uint(u64::from(CODEBOOK_SYNC), 24);
	writer.put_uint(u64::from(dimensions), 16);
	writer.put_uint(u64::from(entries), 24);

	let ordered = reader.read_flag()?;
	writer.put_bit(ordered);

	if ordered {
		let initial_length = read_dyn(reader, 5)?;
		writer.put_uint(u64::from(initial_length), 5);

		let mut current_entry = 0u32;
		while current_entry < entries {
			let width = math::ilog(entries - current_entry);
			let number = read_dyn(reader, width)?;
			writer.put_uint(u64::from(number), width);
			current_entry += number;
		}
		if current_entry > entries {
			return Err(Ww2OggError::parse("codebook codeword run length overran entry count"));
		}
	} else {
		let codeword_length_length = read_dyn(reader, 3)?;
		let sparse = reader.read_flag()?;
		if codeword_length_length == 0 || codeword_length_length > 5 {
			return Err(Ww2OggError::parse("nonsense codebook codeword length width"));
		}
		writer.put_bit(sparse);

		for _ in 0..entries {
			let present = if sparse {
				let present = reader.read_flag()?;
				writer.put_bit(present);
				present
			} else {
				true
			};
			if present {
				let length = read_dyn(reader, codeword_length_length)?;
				writer.put_uint(u64::from(length), 5);
			}
		}
	}

	let lookup_type = read_dyn(reader, 1)?;
	writer.put_uint(u64::from(lookup_type), 4);
	match lookup_type {
		0 => {}
		1 => {
			let min = read_dyn(reader, 32)?;
			let max = read_dyn(reader, 32)?;
			let value_length = read_dyn(reader, 4)?;
			let sequence_flag = reader.read_flag()?;

			writer.put_uint(u64::from(min), 32);
			writer.put_uint(u64::from(max), 32);
			writer.put_uint(u64::from(value_length), 4);
			writer.put_bit(sequence_flag);

			let quantvals = math::book_maptype1_quantvals(entries, dimensions);
			for _ in 0..quantvals {
				let value = read_dyn(reader, value_length + 1)?;
				writer.put_uint(u64::from(value), value_length + 1);
			}
		}
		2 => return Err(Ww2OggError::parse("unsupported codebook lookup type 2")),
		_ => return Err(Ww2OggError::parse("invalid codebook lookup type"))
	}

	if cb_size != 0 {
		let consumed_bits = reader.bits_read() - bits_before;
		let actual = consumed_bits / 8 + 1;
		if actual != u64::from(cb_size) {
			return Err(Ww2OggError::SizeMismatch {
				expected: cb_size,
				actual: actual as u32
			});
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	fn library_bytes(blobs: &[&[u8]]) -> Vec<u8> {
		let mut data = Vec::new();
		let mut offsets = Vec::new();
		for blob in blobs {
			offsets.push(data.len() as u32);
			data.extend_from_slice(blob);
		}
		let table_start = data.len() as u32;
		offsets.push(table_start);
		for offset in &offsets {
			data.extend_from_slice(&offset.to_le_bytes());
		}
		// The offset table's last entry is table_start itself, which doubles as the
		// trailing pointer read from the file's final 4 bytes — no separate field.
		data
	}

	#[test]
	fn loads_library_and_looks_up_blobs() {
		let data = library_bytes(&[&[1, 2, 3], &[4, 5]]);
		let library = CodebookLibrary::from_bytes(data).unwrap();
		assert_eq!(library.len(), 2);
		assert_eq!(library.get(0), Some(&[1, 2, 3][..]));
		assert_eq!(library.get(1), Some(&[4, 5][..]));
		assert_eq!(library.get(2), None);
	}

	#[test]
	fn rejects_truncated_library() {
		assert!(CodebookLibrary::from_bytes(vec![0, 1]).is_err());
	}

	#[test]
	fn copy_roundtrips_a_minimal_codebook() {
		// sync(24) dims(16)=1 entries(24)=2 ordered(1)=0 sparse(1)=0
		// lengths: 5 bits each -> 1, 1; lookup_type(4)=0
		let mut bits: Vec<bool> = Vec::new();
		let push_uint = |bits: &mut Vec<bool>, value: u32, width: u32| {
			for i in 0..width {
				bits.push((value >> i) & 1 != 0);
			}
		};
		push_uint(&mut bits, CODEBOOK_SYNC, 24);
		push_uint(&mut bits, 1, 16);
		push_uint(&mut bits, 2, 24);
		bits.push(false); // ordered
		bits.push(false); // sparse
		push_uint(&mut bits, 1, 5);
		push_uint(&mut bits, 1, 5);
		push_uint(&mut bits, 0, 4); // lookup type

		let mut bytes = vec![0u8; bits.len().div_ceil(8)];
		for (i, bit) in bits.iter().enumerate() {
			if *bit {
				bytes[i / 8] |= 1 << (i % 8);
			}
		}

		let mut reader = BitpackReader::new(Cursor::new(bytes));
		let mut writer = OggPageWriter::new(Cursor::new(Vec::new()));
		copy_codebook(&mut reader, &mut writer).unwrap();
		writer.flush_page(false, true).unwrap();
	}

	#[test]
	fn copy_rejects_bad_sync() {
		let mut reader = BitpackReader::new(Cursor::new(vec![0u8; 8]));
		let mut writer = OggPageWriter::new(Cursor::new(Vec::new()));
		assert!(copy_codebook(&mut reader, &mut writer).is_err());
	}
}

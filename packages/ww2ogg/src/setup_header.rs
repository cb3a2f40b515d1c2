//! Reconstructs the three standard Vorbis header packets (identification, comment,
//! setup) from a Wwise RIFF container's compacted representation.
//!
//! The identification and comment packets are always synthesized from fields already
//! available on [`WwRiff`]. The setup packet is the hard part: depending on how
//! aggressively Wwise stripped it, it is either copied verbatim from an existing
//! header triad, copied with its codebooks re-verified, or fully re-expanded from a
//! compacted schema (see [`write_header`] and [`write_header_with_triad`]).

use std::io::{Cursor, Read, Write};

use log::{debug, trace};
use vorbis_bitpack::BitpackReader;

use crate::{
	bitreader::read_dyn, codebook, codebook::CodebookLibrary, error::Ww2OggError, math,
	ogg::OggPageWriter, riff::WwRiff, WW2OGG_VERSION_TAG
};

const VORBIS_PACKET_MAGIC: &[u8; 6] = b"vorbis";
const IDENTIFICATION_PACKET_TYPE: u64 = 1;
const COMMENT_PACKET_TYPE: u64 = 3;
const SETUP_PACKET_TYPE: u64 = 5;

/// The special (invalid) codebook id that hints the caller forgot `--full-setup`: its
/// value, read as a 10-bit field, coincides with the low 10 bits of the standard
/// Vorbis codebook sync pattern when the setup packet was never actually stripped.
const FULL_SETUP_HINT_CODEBOOK_ID: u32 = 0x342;
/// The 14 bits immediately following [`FULL_SETUP_HINT_CODEBOOK_ID`] that, together
/// with it, spell out the rest of the `"BCV"` sync pattern.
const FULL_SETUP_HINT_TAIL: u32 = 0x1590;

/// Writes the identification and comment packets, plus a full or stripped setup
/// packet, returning the mode block-flag table and the bit width of a mode number.
///
/// Not used when [`WwRiff`] already has a header triad; see
/// [`write_header_with_triad`] for that case instead.
pub(crate) fn write_header<W: Write>(
	riff: &WwRiff,
	writer: &mut OggPageWriter<W>
) -> Result<(Vec<bool>, u32), Ww2OggError> {
	write_identification_packet(riff, writer)?;
	write_comment_packet(riff, writer)?;

	let header_size = if riff.no_granule { 2 } else { 6 };
	let packet_offset = riff.data_offset as usize + riff.setup_packet_offset as usize;
	let size = riff.read_u16(packet_offset)? as usize;
	if !riff.no_granule {
		let granule = riff.read_u32(packet_offset + 2)?;
		if granule != 0 {
			return Err(Ww2OggError::parse("setup packet granule != 0"));
		}
	}
	let payload_offset = packet_offset + header_size;
	let setup_bytes = riff
		.data()
		.get(payload_offset..payload_offset + size)
		.ok_or_else(|| Ww2OggError::parse("setup packet runs past the end of the data chunk"))?;

	writer.put_uint(SETUP_PACKET_TYPE, 8);
	for &byte in VORBIS_PACKET_MAGIC {
		writer.put_uint(u64::from(byte), 8);
	}

	let mut reader = BitpackReader::new(Cursor::new(setup_bytes));
	let mode_blockflag = if riff.options.full_setup {
		write_full_setup_codebooks_and_tail(&mut reader, size, writer)?;
		Vec::new()
	} else {
		let mode_blockflag = write_stripped_setup_tail(riff, &mut reader, writer)?;
		writer.put_bit(true); // framing bit
		mode_blockflag
	};
	let mode_bits = mode_bits_for(mode_blockflag.len());

	let bits_read = reader.bits_read();
	if (bits_read + 7) / 8 != size as u64 {
		return Err(Ww2OggError::parse("didn't read exactly the setup packet"));
	}
	if payload_offset + size != riff.data_offset as usize + riff.first_audio_packet_offset as usize {
		return Err(Ww2OggError::parse("first audio packet doesn't follow setup packet"));
	}

	writer.flush_page(false, false)?;

	Ok((mode_blockflag, mode_bits))
}

/// Copies a pre-existing header triad (identification, comment, setup packets) from
/// `data` verbatim, re-verifying (but not re-expanding) each inline codebook in the
/// setup packet along the way.
pub(crate) fn write_header_with_triad<W: Write>(
	riff: &WwRiff,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	let mut offset = riff.data_offset as usize + riff.setup_packet_offset as usize;

	let (identification, next) = read_packet8(riff, offset)?;
	copy_packet_bytes(identification, writer);
	writer.flush_page(false, false)?;
	offset = next;

	let (comment, next) = read_packet8(riff, offset)?;
	copy_packet_bytes(comment, writer);
	writer.flush_page(false, false)?;
	offset = next;

	let (setup, _) = read_packet8(riff, offset)?;
	write_triad_setup_packet(setup, writer)?;
	writer.flush_page(false, false)?;

	Ok(())
}

fn write_identification_packet<W: Write>(
	riff: &WwRiff,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	writer.put_uint(IDENTIFICATION_PACKET_TYPE, 8);
	for &byte in VORBIS_PACKET_MAGIC {
		writer.put_uint(u64::from(byte), 8);
	}
	writer.put_uint(0, 32); // Vorbis version, always 0
	writer.put_uint(u64::from(riff.channels), 8);
	writer.put_uint(u64::from(riff.sample_rate), 32);
	writer.put_uint(0, 32); // bitrate_max, unknown
	writer.put_uint(u64::from(riff.avg_bytes_per_second) * 8, 32); // bitrate_nominal
	writer.put_uint(0, 32); // bitrate_min, unknown
	writer.put_uint(u64::from(riff.blocksize_0_pow), 4);
	writer.put_uint(u64::from(riff.blocksize_1_pow), 4);
	writer.put_bit(true); // framing bit
	writer.flush_page(false, false)?;
	trace!("wrote identification packet");
	Ok(())
}

fn write_comment_packet<W: Write>(
	riff: &WwRiff,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	writer.put_uint(COMMENT_PACKET_TYPE, 8);
	for &byte in VORBIS_PACKET_MAGIC {
		writer.put_uint(u64::from(byte), 8);
	}

	write_length_prefixed_string(writer, &format!("converted from Audiokinetic Wwise by {WW2OGG_VERSION_TAG}"));

	match riff.loop_points() {
		Some(loop_points) => {
			writer.put_uint(2, 32);
			write_length_prefixed_string(writer, &format!("LoopStart={}", loop_points.start));
			write_length_prefixed_string(writer, &format!("LoopEnd={}", loop_points.end));
		}
		None => writer.put_uint(0, 32)
	}

	writer.put_bit(true); // framing bit
	writer.flush_page(false, false)?;
	trace!("wrote comment packet");
	Ok(())
}

fn write_length_prefixed_string<W: Write>(writer: &mut OggPageWriter<W>, value: &str) {
	writer.put_uint(value.len() as u64, 32);
	for byte in value.bytes() {
		writer.put_uint(u64::from(byte), 8);
	}
}

/// Reads the 8-byte `Packet_8` header (`size: u32`, `granule: u32`, the latter
/// ignored) at `offset` and returns its payload slice along with the offset of the
/// packet that follows it.
fn read_packet8(riff: &WwRiff, offset: usize) -> Result<(&[u8], usize), Ww2OggError> {
	let size = riff.read_u32(offset)? as usize;
	let payload_start = offset + 8;
	let payload = riff
		.data()
		.get(payload_start..payload_start + size)
		.ok_or_else(|| Ww2OggError::parse("header triad packet runs past the end of the data chunk"))?;
	Ok((payload, payload_start + size))
}

fn copy_packet_bytes<W: Write>(payload: &[u8], writer: &mut OggPageWriter<W>) {
	for &byte in payload {
		writer.put_uint(u64::from(byte), 8);
	}
}

/// Copies the already-standard setup packet from a header triad, re-verifying (but
/// not re-expanding) each codebook, and passing the rest of the packet through
/// bit-for-bit.
fn write_triad_setup_packet<W: Write>(payload: &[u8], writer: &mut OggPageWriter<W>) -> Result<(), Ww2OggError> {
	let header = payload
		.get(..7)
		.ok_or_else(|| Ww2OggError::parse("truncated header triad setup packet"))?;
	for &byte in header {
		writer.put_uint(u64::from(byte), 8);
	}

	let mut reader = BitpackReader::new(Cursor::new(&payload[7..]));
	let codebook_count_less1 = read_dyn(&mut reader, 8)?;
	writer.put_uint(u64::from(codebook_count_less1), 8);

	for _ in 0..=codebook_count_less1 {
		codebook::copy_codebook(&mut reader, writer)?;
	}

	copy_remaining_bits(&mut reader, (payload.len() - 7) as u64 * 8, writer)
}

/// Copies the codebooks and remaining bits of an already-standard (`--full-setup`)
/// stripped-of-header setup packet.
fn write_full_setup_codebooks_and_tail<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	setup_size: usize,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	let codebook_count_less1 = read_dyn(reader, 8)?;
	writer.put_uint(u64::from(codebook_count_less1), 8);

	for _ in 0..=codebook_count_less1 {
		codebook::copy_codebook(reader, writer)?;
	}

	writer.put_uint(0, 6); // time_count_less1, always 0; write-only, Wwise strips this list
	writer.put_uint(0, 16); // the single dummy time domain value, always 0

	copy_remaining_bits(reader, setup_size as u64 * 8, writer)
}

fn copy_remaining_bits<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	total_bits_from_reader_start: u64,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	let consumed = reader.bits_read();
	let remaining = total_bits_from_reader_start
		.checked_sub(consumed)
		.ok_or_else(|| Ww2OggError::parse("setup packet's codebooks overran the packet's declared size"))?;
	for _ in 0..remaining {
		crate::bitreader::copy_bit(reader, writer)?;
	}
	Ok(())
}

/// Re-expands a fully stripped setup packet: codebooks (either from an external
/// library or inline) followed by floors, residues, mappings and modes.
fn write_stripped_setup_tail<R: Read, W: Write>(
	riff: &WwRiff,
	reader: &mut BitpackReader<R>,
	writer: &mut OggPageWriter<W>
) -> Result<Vec<bool>, Ww2OggError> {
	let library = if riff.options.uses_inline_codebooks() {
		None
	} else {
		Some(CodebookLibrary::open(&riff.options.codebooks_path)?)
	};

	let codebook_count_less1 = read_dyn(reader, 8)?;
	writer.put_uint(u64::from(codebook_count_less1), 8);
	let codebook_count = codebook_count_less1 + 1;

	for codebook_index in 0..codebook_count {
		match &library {
			None => codebook::rebuild_codebook(reader, 0, writer)?,
			Some(library) => {
				let codebook_id = read_dyn(reader, 10)?;
				match library.get(codebook_id) {
					Some(packed) => {
						let mut sub_reader = BitpackReader::new(Cursor::new(packed));
						codebook::rebuild_codebook(&mut sub_reader, packed.len() as u32, writer)?;
					}
					None => {
						if codebook_id == FULL_SETUP_HINT_CODEBOOK_ID {
							let hint = read_dyn(reader, 14)?;
							if hint == FULL_SETUP_HINT_TAIL {
								return Err(Ww2OggError::parse(format!(
									"invalid codebook id {codebook_id}: this setup packet looks like it \
									 already contains standard Vorbis codebooks; try --full-setup"
								)));
							}
						}
						return Err(Ww2OggError::InvalidCodebookId(codebook_id));
					}
				}
			}
		}
		trace!("rebuilt codebook {codebook_index} of {codebook_count}");
	}

	writer.put_uint(0, 6); // time_count_less1, always 0
	writer.put_uint(0, 16); // the single dummy time domain value, always 0

	let floor_count = write_floors(reader, codebook_count, writer)?;
	let residue_count = write_residues(reader, codebook_count, writer)?;
	let mapping_count = write_mappings(reader, riff.channels, floor_count, residue_count, writer)?;
	let mode_blockflag = write_modes(reader, mapping_count, writer)?;

	debug!(
		"re-expanded stripped setup packet: {codebook_count} codebook(s), {floor_count} floor(s), \
		 {residue_count} residue(s), {} mode(s)",
		mode_blockflag.len()
	);

	Ok(mode_blockflag)
}

fn write_floors<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	codebook_count: u32,
	writer: &mut OggPageWriter<W>
) -> Result<u32, Ww2OggError> {
	let floor_count_less1 = read_dyn(reader, 6)?;
	writer.put_uint(u64::from(floor_count_less1), 6);
	let floor_count = floor_count_less1 + 1;

	for _ in 0..floor_count {
		writer.put_uint(1, 16); // floor_type, only type 1 is supported by Wwise content

		let partitions = read_dyn(reader, 5)?;
		writer.put_uint(u64::from(partitions), 5);

		let mut partition_class = Vec::with_capacity(partitions as usize);
		let mut max_class = 0u32;
		for _ in 0..partitions {
			let class = read_dyn(reader, 4)?;
			writer.put_uint(u64::from(class), 4);
			max_class = max_class.max(class);
			partition_class.push(class);
		}

		let mut class_dimensions = vec![0u32; max_class as usize + 1];
		for (class, dimensions) in class_dimensions.iter_mut().enumerate() {
			let dims_less1 = read_dyn(reader, 3)?;
			writer.put_uint(u64::from(dims_less1), 3);
			*dimensions = dims_less1 + 1;

			let subclasses = read_dyn(reader, 2)?;
			writer.put_uint(u64::from(subclasses), 2);

			if subclasses > 0 {
				let masterbook = read_dyn(reader, 8)?;
				writer.put_uint(u64::from(masterbook), 8);
				if masterbook >= codebook_count {
					return Err(Ww2OggError::parse(format!(
						"floor class {class} masterbook index {masterbook} is out of range"
					)));
				}
			}

			for _ in 0..(1u32 << subclasses) {
				let subclass_book_plus1 = read_dyn(reader, 8)?;
				writer.put_uint(u64::from(subclass_book_plus1), 8);
				if subclass_book_plus1 > 0 && subclass_book_plus1 - 1 >= codebook_count {
					return Err(Ww2OggError::parse(format!(
						"floor class {class} subclass book index {} is out of range",
						subclass_book_plus1 - 1
					)));
				}
			}
		}

		let multiplier_less1 = read_dyn(reader, 2)?;
		writer.put_uint(u64::from(multiplier_less1), 2);
		let rangebits = read_dyn(reader, 4)?;
		writer.put_uint(u64::from(rangebits), 4);

		for class in &partition_class {
			for _ in 0..class_dimensions[*class as usize] {
				let x = read_dyn(reader, rangebits)?;
				writer.put_uint(u64::from(x), rangebits);
			}
		}
	}

	Ok(floor_count)
}

fn write_residues<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	codebook_count: u32,
	writer: &mut OggPageWriter<W>
) -> Result<u32, Ww2OggError> {
	let residue_count_less1 = read_dyn(reader, 6)?;
	writer.put_uint(u64::from(residue_count_less1), 6);
	let residue_count = residue_count_less1 + 1;

	for _ in 0..residue_count {
		let residue_type = read_dyn(reader, 2)?;
		if residue_type > 2 {
			return Err(Ww2OggError::parse(format!("invalid residue type {residue_type}")));
		}
		writer.put_uint(u64::from(residue_type), 16);

		let begin = read_dyn(reader, 24)?;
		let end = read_dyn(reader, 24)?;
		let partition_size_less1 = read_dyn(reader, 24)?;
		writer.put_uint(u64::from(begin), 24);
		writer.put_uint(u64::from(end), 24);
		writer.put_uint(u64::from(partition_size_less1), 24);

		let classifications_less1 = read_dyn(reader, 6)?;
		writer.put_uint(u64::from(classifications_less1), 6);
		let classifications = classifications_less1 + 1;

		let classbook = read_dyn(reader, 8)?;
		writer.put_uint(u64::from(classbook), 8);
		if classbook >= codebook_count {
			return Err(Ww2OggError::parse(format!("residue classbook index {classbook} is out of range")));
		}

		let mut cascades = Vec::with_capacity(classifications as usize);
		for _ in 0..classifications {
			let low_bits = read_dyn(reader, 3)?;
			writer.put_uint(u64::from(low_bits), 3);

			let has_high_bits = reader.read_flag()?;
			writer.put_bit(has_high_bits);

			let high_bits = if has_high_bits {
				let high_bits = read_dyn(reader, 5)?;
				writer.put_uint(u64::from(high_bits), 5);
				high_bits
			} else {
				0
			};

			cascades.push(high_bits * 8 + low_bits);
		}

		for cascade in cascades {
			for bit in 0..8 {
				if cascade & (1 << bit) != 0 {
					let book = read_dyn(reader, 8)?;
					writer.put_uint(u64::from(book), 8);
					if book >= codebook_count {
						return Err(Ww2OggError::parse(format!("residue book index {book} is out of range")));
					}
				}
			}
		}
	}

	Ok(residue_count)
}

fn write_mappings<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	channels: u16,
	floor_count: u32,
	residue_count: u32,
	writer: &mut OggPageWriter<W>
) -> Result<u32, Ww2OggError> {
	let mapping_count_less1 = read_dyn(reader, 6)?;
	writer.put_uint(u64::from(mapping_count_less1), 6);
	let mapping_count = mapping_count_less1 + 1;

	for _ in 0..mapping_count {
		writer.put_uint(0, 16); // mapping type, always 0

		let submaps_flag = reader.read_flag()?;
		writer.put_bit(submaps_flag);
		let submaps = if submaps_flag {
			let submaps_less1 = read_dyn(reader, 4)?;
			writer.put_uint(u64::from(submaps_less1), 4);
			submaps_less1 + 1
		} else {
			1
		};

		let square_polar_flag = reader.read_flag()?;
		writer.put_bit(square_polar_flag);
		if square_polar_flag {
			let coupling_steps_less1 = read_dyn(reader, 8)?;
			writer.put_uint(u64::from(coupling_steps_less1), 8);

			let angle_width = math::ilog(u32::from(channels) - 1);
			for _ in 0..=coupling_steps_less1 {
				let magnitude = read_dyn(reader, angle_width)?;
				let angle = read_dyn(reader, angle_width)?;
				writer.put_uint(u64::from(magnitude), angle_width);
				writer.put_uint(u64::from(angle), angle_width);

				if magnitude == angle || magnitude >= u32::from(channels) || angle >= u32::from(channels) {
					return Err(Ww2OggError::parse("mapping channel coupling indices are out of range"));
				}
			}
		}

		let reserved = read_dyn(reader, 2)?;
		if reserved != 0 {
			return Err(Ww2OggError::parse("non-zero reserved bits in mapping"));
		}
		writer.put_uint(0, 2);

		if submaps > 1 {
			for _ in 0..channels {
				let mux = read_dyn(reader, 4)?;
				writer.put_uint(u64::from(mux), 4);
				if mux >= submaps {
					return Err(Ww2OggError::parse("mapping channel multiplex index is out of range"));
				}
			}
		}

		for _ in 0..submaps {
			let time_config = read_dyn(reader, 8)?;
			writer.put_uint(u64::from(time_config), 8);

			let floor = read_dyn(reader, 8)?;
			writer.put_uint(u64::from(floor), 8);
			if floor >= floor_count {
				return Err(Ww2OggError::parse(format!("mapping floor index {floor} is out of range")));
			}

			let residue = read_dyn(reader, 8)?;
			writer.put_uint(u64::from(residue), 8);
			if residue >= residue_count {
				return Err(Ww2OggError::parse(format!("mapping residue index {residue} is out of range")));
			}
		}
	}

	Ok(mapping_count)
}

fn write_modes<R: Read, W: Write>(
	reader: &mut BitpackReader<R>,
	mapping_count: u32,
	writer: &mut OggPageWriter<W>
) -> Result<Vec<bool>, Ww2OggError> {
	let mode_count_less1 = read_dyn(reader, 6)?;
	writer.put_uint(u64::from(mode_count_less1), 6);
	let mode_count = mode_count_less1 + 1;

	let mut mode_blockflag = Vec::with_capacity(mode_count as usize);
	for _ in 0..mode_count {
		let block_flag = reader.read_flag()?;
		writer.put_bit(block_flag);
		mode_blockflag.push(block_flag);

		writer.put_uint(0, 16); // windowtype, always 0
		writer.put_uint(0, 16); // transformtype, always 0

		let mapping = read_dyn(reader, 8)?;
		writer.put_uint(u64::from(mapping), 8);
		if mapping >= mapping_count {
			return Err(Ww2OggError::parse(format!("mode mapping index {mapping} is out of range")));
		}
	}

	Ok(mode_blockflag)
}

fn mode_bits_for(mode_count: usize) -> u32 {
	if mode_count == 0 {
		0
	} else {
		math::ilog(mode_count as u32 - 1)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mode_bits_for_single_mode_is_zero() {
		assert_eq!(mode_bits_for(1), 0);
	}

	#[test]
	fn mode_bits_for_two_modes_is_one() {
		assert_eq!(mode_bits_for(2), 1);
	}

	#[test]
	fn mode_bits_for_no_modes_is_zero() {
		assert_eq!(mode_bits_for(0), 0);
	}
}

//! Rewrites the audio packet region of a Wwise RIFF container into Ogg Vorbis pages.
//!
//! Each input packet is preceded by a small header (8, 6 or 2 bytes, depending on
//! [`WwRiff`]'s detected packet framing) giving its size and, usually, its granule
//! position. In "mod packets" mode Wwise also repurposes part of the first payload
//! byte, which has to be expanded back into the packet-type bit, mode number and
//! window-type bits a standard Vorbis decoder expects.

use std::io::Write;

use crate::{error::Ww2OggError, ogg, ogg::OggPageWriter, riff::WwRiff};

struct PacketHeader {
	size: u32,
	granule: u32,
	payload_offset: usize,
	next_offset: usize
}

fn read_packet_header(riff: &WwRiff, offset: usize) -> Result<PacketHeader, Ww2OggError> {
	if riff.old_packet_headers {
		let size = riff.read_u32(offset)?;
		let granule = riff.read_u32(offset + 4)?;
		Ok(PacketHeader { size, granule, payload_offset: offset + 8, next_offset: offset + 8 + size as usize })
	} else if riff.no_granule {
		let size = u32::from(riff.read_u16(offset)?);
		Ok(PacketHeader { size, granule: 0, payload_offset: offset + 2, next_offset: offset + 2 + size as usize })
	} else {
		let size = u32::from(riff.read_u16(offset)?);
		let granule = riff.read_u32(offset + 2)?;
		Ok(PacketHeader { size, granule, payload_offset: offset + 6, next_offset: offset + 6 + size as usize })
	}
}

/// Rewrites every audio packet in `riff`'s `data` chunk into Ogg pages.
///
/// `mode_blockflag` and `mode_bits` come from the setup header reconstruction; they
/// are empty/zero whenever the setup packet's modes were never parsed (a full setup
/// or header triad), which is only valid when `riff` does not use mod-packets framing.
pub(crate) fn write_audio_packets<W: Write>(
	riff: &WwRiff,
	mode_blockflag: &[bool],
	mode_bits: u32,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	if riff.mod_packets && mode_blockflag.is_empty() {
		return Err(Ww2OggError::parse("didn't load mode_blockflag"));
	}

	let data_end = riff.data_offset as usize + riff.data_size as usize;
	let mut offset = riff.data_offset as usize + riff.first_audio_packet_offset as usize;
	let mut prev_blockflag = false;

	while offset < data_end {
		let header_size = packet_header_size(riff);
		if offset + header_size > data_end {
			return Err(Ww2OggError::parse("page header truncated"));
		}

		let header = read_packet_header(riff, offset)?;
		let payload = riff
			.data()
			.get(header.payload_offset..header.payload_offset + header.size as usize)
			.ok_or_else(|| Ww2OggError::parse("file truncated"))?;

		writer.set_granule(if header.granule == ogg::NO_GRANULE { 1 } else { header.granule });

		if riff.mod_packets {
			write_mod_packets_payload(riff, payload, header.next_offset, data_end, mode_blockflag, mode_bits, &mut prev_blockflag, writer)?;
		} else {
			for &byte in payload {
				writer.put_uint(u64::from(byte), 8);
			}
		}

		offset = header.next_offset;
		writer.flush_page(false, offset == data_end)?;
	}

	if offset > data_end {
		return Err(Ww2OggError::parse("page truncated"));
	}

	Ok(())
}

fn packet_header_size(riff: &WwRiff) -> usize {
	if riff.old_packet_headers {
		8
	} else if riff.no_granule {
		2
	} else {
		6
	}
}

/// Reconstructs the first byte of a mod-packets audio packet (packet-type bit, mode
/// number, and — for long windows — the previous/next window-type bits), then copies
/// the rest of the packet through unchanged.
#[allow(clippy::too_many_arguments)]
fn write_mod_packets_payload<W: Write>(
	riff: &WwRiff,
	payload: &[u8],
	next_offset: usize,
	data_end: usize,
	mode_blockflag: &[bool],
	mode_bits: u32,
	prev_blockflag: &mut bool,
	writer: &mut OggPageWriter<W>
) -> Result<(), Ww2OggError> {
	let first_byte = *payload.first().ok_or_else(|| Ww2OggError::parse("file truncated"))?;

	let mode_number = (u32::from(first_byte) & mask(mode_bits)) as usize;
	if mode_number >= mode_blockflag.len() {
		return Err(Ww2OggError::parse("mode number out of range in audio packet"));
	}

	writer.put_bit(false); // packet type: audio
	writer.put_uint(u64::from(first_byte) & u64::from(mask(mode_bits)), mode_bits);

	let this_blockflag = mode_blockflag[mode_number];
	if this_blockflag {
		let next_blockflag = peek_next_blockflag(riff, next_offset, data_end, mode_blockflag, mode_bits)?;
		writer.put_bit(*prev_blockflag);
		writer.put_bit(next_blockflag);
	}
	*prev_blockflag = this_blockflag;

	let remainder_bits = 8 - mode_bits;
	writer.put_uint(u64::from(first_byte) >> mode_bits, remainder_bits);

	for &byte in &payload[1..] {
		writer.put_uint(u64::from(byte), 8);
	}

	Ok(())
}

fn mask(bits: u32) -> u32 {
	if bits >= 32 {
		u32::MAX
	} else {
		(1u32 << bits) - 1
	}
}

fn peek_next_blockflag(
	riff: &WwRiff,
	next_offset: usize,
	data_end: usize,
	mode_blockflag: &[bool],
	mode_bits: u32
) -> Result<bool, Ww2OggError> {
	let header_size = packet_header_size(riff);
	if next_offset + header_size > data_end {
		return Ok(false);
	}

	let header = read_packet_header(riff, next_offset)?;
	if header.size == 0 {
		return Ok(false);
	}

	let next_first_byte = *riff
		.data()
		.get(header.payload_offset)
		.ok_or_else(|| Ww2OggError::parse("file truncated"))?;
	let next_mode_number = (u32::from(next_first_byte) & mask(mode_bits)) as usize;

	Ok(mode_blockflag.get(next_mode_number).copied().unwrap_or(false))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mask_of_zero_bits_is_zero() {
		assert_eq!(mask(0), 0);
	}

	#[test]
	fn mask_of_one_bit_is_one() {
		assert_eq!(mask(1), 1);
	}

	#[test]
	fn mask_of_eight_bits_is_full_byte() {
		assert_eq!(mask(8), 0xFF);
	}
}

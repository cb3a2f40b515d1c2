//! A minimal Ogg page writer.
//!
//! This converter only ever produces Ogg pages; it never has to parse an existing Ogg
//! stream, so the framing and CRC logic here is hand-rolled against the container rules
//! rather than delegated to a general-purpose Ogg library.

mod crc;

use std::io::Write;

use log::{debug, trace};

use crate::error::Ww2OggError;

/// The sentinel granule position value meaning "no granule recorded"; written as
/// `0xFFFFFFFF_FFFFFFFF` rather than zero-extended.
pub const NO_GRANULE: u32 = 0xFFFF_FFFF;

const MAX_PAGE_SEGMENTS: usize = 255;
const MAX_SEGMENT_LEN: usize = 255;
const MAX_PAYLOAD_LEN: usize = MAX_PAGE_SEGMENTS * MAX_SEGMENT_LEN;

/// Accumulates bits into Ogg page payloads and flushes them, framed and CRC-protected,
/// to an underlying byte sink.
///
/// Every page written by a given writer shares stream serial number `1`. Page sequence
/// numbers start at `0` and increase by one on every flushed page.
pub struct OggPageWriter<W: Write> {
	sink: W,
	payload: Vec<u8>,
	current_byte: u8,
	bits_in_current_byte: u32,
	granule_position: u32,
	sequence: u32,
	first: bool,
	continued: bool
}

impl<W: Write> OggPageWriter<W> {
	/// Creates a writer that will emit pages to `sink`, starting from sequence number 0.
	pub fn new(sink: W) -> Self {
		Self {
			sink,
			payload: Vec::with_capacity(MAX_PAYLOAD_LEN),
			current_byte: 0,
			bits_in_current_byte: 0,
			granule_position: 0,
			sequence: 0,
			first: true,
			continued: false
		}
	}

	/// Appends a single bit to the payload's bit accumulator, least-significant-bit
	/// first.
	pub fn put_bit(&mut self, bit: bool) {
		if bit {
			self.current_byte |= 1 << self.bits_in_current_byte;
		}
		self.bits_in_current_byte += 1;
		if self.bits_in_current_byte == 8 {
			self.payload.push(self.current_byte);
			self.current_byte = 0;
			self.bits_in_current_byte = 0;
		}
	}

	/// Appends the low `bits` bits of `value`, least-significant-bit first.
	pub fn put_uint(&mut self, value: u64, bits: u32) {
		for i in 0..bits {
			self.put_bit((value >> i) & 1 != 0);
		}
	}

	/// Pads the in-progress byte with zero bits and pushes it to the payload, if any
	/// bits have been accumulated.
	pub fn flush_bits(&mut self) {
		if self.bits_in_current_byte > 0 {
			self.payload.push(self.current_byte);
			self.current_byte = 0;
			self.bits_in_current_byte = 0;
		}
	}

	/// Sets the granule position to be recorded in the next flushed page.
	///
	/// [`NO_GRANULE`] is encoded specially, as the full 64-bit all-ones marker, rather
	/// than zero-extended like any other value.
	pub fn set_granule(&mut self, granule: u32) {
		self.granule_position = granule;
	}

	/// Flushes the accumulated payload as a single Ogg page, if non-empty.
	///
	/// `next_continued` marks whether the *following* page should have its continued
	/// flag set (used when a packet spans more than one page); `last` marks this page as
	/// the final page of the logical stream.
	///
	/// # Errors
	///
	/// Returns an error if the accumulated payload exceeds [`MAX_PAYLOAD_LEN`] (255
	/// lacing segments of 255 bytes each), the most an Ogg page can carry.
	pub fn flush_page(&mut self, next_continued: bool, last: bool) -> Result<(), Ww2OggError> {
		self.flush_bits();
		if self.payload.is_empty() {
			return Ok(());
		}
		if self.payload.len() > MAX_PAYLOAD_LEN {
			return Err(Ww2OggError::parse("ran out of space in an Ogg packet"));
		}

		let segments = lacing_values(self.payload.len());
		debug!(
			"flushing Ogg page {} ({} byte payload, {} segments, last={last})",
			self.sequence,
			self.payload.len(),
			segments.len()
		);

		let mut page = Vec::with_capacity(27 + segments.len() + self.payload.len());
		page.extend_from_slice(b"OggS");
		page.push(0); // stream structure version
		let header_type =
			(self.continued as u8) | ((self.first as u8) << 1) | ((last as u8) << 2);
		page.push(header_type);
		page.extend_from_slice(&granule_bytes(self.granule_position));
		page.extend_from_slice(&1u32.to_le_bytes()); // stream serial number
		page.extend_from_slice(&self.sequence.to_le_bytes());
		page.extend_from_slice(&[0u8; 4]); // CRC placeholder, filled in below
		page.push(segments.len() as u8);
		page.extend_from_slice(&segments);
		page.extend_from_slice(&self.payload);

		let checksum = crc::checksum(&page);
		page[22..26].copy_from_slice(&checksum.to_le_bytes());
		trace!("page {} CRC = {checksum:#010x}", self.sequence);

		self.sink.write_all(&page)?;

		self.sequence += 1;
		self.first = false;
		self.continued = next_continued;
		self.payload.clear();
		Ok(())
	}

	/// Flushes any pending, not-yet-emitted page as the final page of the stream.
	///
	/// Normal use flushes the true final page explicitly via [`flush_page`] with
	/// `last = true`; this exists as a safety net so a fallible flush is never silently
	/// dropped in a destructor.
	pub fn finish(&mut self) -> Result<(), Ww2OggError> {
		if !self.payload.is_empty() || self.bits_in_current_byte > 0 {
			self.flush_page(false, true)?;
		}
		Ok(())
	}

	/// Consumes the writer, returning the underlying sink.
	pub fn into_inner(self) -> W {
		self.sink
	}
}

fn granule_bytes(granule: u32) -> [u8; 8] {
	if granule == NO_GRANULE {
		[0xFF; 8]
	} else {
		let mut bytes = [0u8; 8];
		bytes[..4].copy_from_slice(&granule.to_le_bytes());
		bytes
	}
}

/// Computes Ogg lacing values for a payload of `payload_len` bytes (at most
/// [`MAX_PAYLOAD_LEN`]): `255` for every full segment but the last, and the remaining
/// byte count (possibly `0`, if the payload is an exact multiple of 255) for the last.
///
/// Callers must ensure `payload_len <= MAX_PAYLOAD_LEN` themselves; [`flush_page`] does
/// so before calling this, turning an oversized packet into a [`Ww2OggError`] instead of
/// letting the subtraction below wrap.
fn lacing_values(payload_len: usize) -> Vec<u8> {
	debug_assert!(payload_len <= MAX_PAYLOAD_LEN, "page payload exceeds 255 * 255 bytes");
	let segments = payload_len.div_ceil(MAX_SEGMENT_LEN).min(MAX_PAGE_SEGMENTS);
	let mut lacing = vec![255u8; segments.saturating_sub(1)];
	lacing.push((payload_len - lacing.len() * MAX_SEGMENT_LEN) as u8);
	lacing
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	#[test]
	fn lacing_of_small_payload_is_single_segment() {
		assert_eq!(lacing_values(10), vec![10]);
	}

	#[test]
	fn lacing_of_exact_255_has_trailing_zero() {
		assert_eq!(lacing_values(255), vec![255, 0]);
	}

	#[test]
	fn lacing_of_max_payload_has_no_trailing_zero() {
		let segments = lacing_values(MAX_PAYLOAD_LEN);
		assert_eq!(segments.len(), 255);
		assert!(segments.iter().all(|&s| s == 255));
	}

	#[test]
	fn granule_sentinel_is_all_ones() {
		assert_eq!(granule_bytes(NO_GRANULE), [0xFF; 8]);
	}

	#[test]
	fn granule_value_is_zero_extended() {
		let mut expected = [0u8; 8];
		expected[..4].copy_from_slice(&42u32.to_le_bytes());
		assert_eq!(granule_bytes(42), expected);
	}

	#[test]
	fn flushes_a_single_page_with_expected_framing() {
		let mut writer = OggPageWriter::new(Cursor::new(Vec::new()));
		writer.put_uint(0x42, 8);
		writer.set_granule(7);
		writer.flush_page(false, false).unwrap();

		let page = writer.into_inner().into_inner();
		assert_eq!(&page[0..4], b"OggS");
		assert_eq!(page[5], 0b010); // first page, not continued, not last
		assert_eq!(&page[6..14], &[7, 0, 0, 0, 0, 0, 0, 0]);
		assert_eq!(&page[14..18], &1u32.to_le_bytes());
		assert_eq!(&page[18..22], &0u32.to_le_bytes());
		assert_eq!(page[26], 1); // one lacing segment
		assert_eq!(page[27], 1); // payload is one byte long
		assert_eq!(page[28], 0x42);
	}

	#[test]
	fn sequence_numbers_increase_without_gaps() {
		let mut writer = OggPageWriter::new(Cursor::new(Vec::new()));
		for i in 0..3u8 {
			writer.put_uint(u64::from(i), 8);
			writer.flush_page(false, i == 2).unwrap();
		}
		assert_eq!(writer.sequence, 3);
	}

	#[test]
	fn finish_is_a_no_op_when_nothing_pending() {
		let mut writer = OggPageWriter::new(Cursor::new(Vec::new()));
		writer.finish().unwrap();
		assert!(writer.into_inner().into_inner().is_empty());
	}

	#[test]
	fn flush_page_rejects_a_payload_over_the_lacing_limit() {
		let mut writer = OggPageWriter::new(Cursor::new(Vec::new()));
		for _ in 0..=MAX_PAYLOAD_LEN {
			writer.put_uint(0, 8);
		}
		assert!(writer.flush_page(false, true).is_err());
	}
}

//! Small helpers shared by every bit-level reader in this crate: the codebook
//! transcoder, the setup header reconstructor, and the audio packet rewriter all read
//! dynamically-sized fields and occasionally need to pass bits straight through to an
//! [`OggPageWriter`](crate::ogg::OggPageWriter) unchanged.

use std::io::{self, Read};

use vorbis_bitpack::{BitpackReader, BitpackedIntegerWidth};

use crate::ogg::OggPageWriter;

/// Reads an unsigned integer of a width only known at runtime.
///
/// Every field width in this crate is at most 32 bits, so this never panics on the
/// [`BitpackedIntegerWidth::new`] bounds check in practice; a width outside that range
/// would indicate a logic error in the caller, not malformed input.
pub(crate) fn read_dyn<R: Read>(reader: &mut BitpackReader<R>, bits: u32) -> io::Result<u32> {
	reader.read_unsigned_integer(
		BitpackedIntegerWidth::new(bits as u8).expect("bitpacked field width must fit in 32 bits")
	)
}

/// Reads a single bit from `reader` and immediately writes it to `writer`, unchanged.
pub(crate) fn copy_bit<R: Read, W: std::io::Write>(
	reader: &mut BitpackReader<R>,
	writer: &mut OggPageWriter<W>
) -> io::Result<()> {
	let bit = reader.read_flag()?;
	writer.put_bit(bit);
	Ok(())
}

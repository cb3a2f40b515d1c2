//! The error type returned by every fallible operation in this crate.

use std::io;

use thiserror::Error;

/// An error produced while parsing a Wwise RIFF/RIFX container, rebuilding its Vorbis
/// setup header, or writing the resulting Ogg Vorbis stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Ww2OggError {
	/// The RIFF container is missing a required `fmt ` or `data` chunk.
	#[error("missing required RIFF chunk: {0}")]
	MissingChunk(&'static str),

	/// A structural violation was found while parsing the container or a bitstream
	/// structure derived from it (bad magic, invalid field value, truncated chunk, and
	/// so on).
	#[error("{0}")]
	Parse(String),

	/// A codebook rebuild did not consume the number of bytes its source length
	/// promised.
	#[error("codebook size mismatch: expected {expected} bytes, read {actual}")]
	SizeMismatch {
		/// The number of bytes the packed codebook's `cb_size` field promised.
		expected: u32,
		/// The number of bytes actually consumed while rebuilding the codebook.
		actual: u32
	},

	/// A codebook id read from a stripped setup packet does not exist in the codebook
	/// library.
	#[error("invalid codebook id {0} referenced (codebook library has no such entry)")]
	InvalidCodebookId(u32),

	/// An I/O error occurred while reading the input, reading a codebook library, or
	/// writing the output stream.
	#[error("I/O error: {0}")]
	Io(#[from] io::Error)
}

impl Ww2OggError {
	pub(crate) fn parse(message: impl Into<String>) -> Self {
		Self::Parse(message.into())
	}
}

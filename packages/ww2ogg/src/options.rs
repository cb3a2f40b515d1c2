//! Conversion settings accepted by [`WwRiff::parse`](crate::WwRiff::parse).

use std::path::PathBuf;

/// Overrides the automatically detected audio packet framing.
///
/// Wwise decides whether audio packets carry the compact "mod packets" window-flag
/// encoding from a heuristic over an undocumented `vorb` field (see
/// [`WwRiff`](crate::WwRiff)'s chunk parsing). The heuristic is occasionally wrong, so
/// callers may force either interpretation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ForcePacketFormat {
	/// Use the format detected from the container.
	#[default]
	Detect,
	/// Always treat audio packets as using the mod-packets encoding.
	ForceModPackets,
	/// Always treat audio packets as using standard Vorbis packet framing.
	ForceNoModPackets
}

/// Settings controlling how a [`WwRiff`](crate::WwRiff) is parsed and converted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct WwRiffOptions {
	/// Do not consult an external codebook library; the setup packet's codebooks are
	/// assumed to already be inline standard Vorbis codebooks (or, together with
	/// [`full_setup`](Self::full_setup), a complete inline setup).
	pub inline_codebooks: bool,
	/// The setup packet is already a complete, standard Vorbis setup header; implies
	/// [`inline_codebooks`](Self::inline_codebooks).
	pub full_setup: bool,
	/// Overrides the detected audio packet framing.
	pub force_packet_format: ForcePacketFormat,
	/// Path to the packed codebook library file, consulted unless
	/// [`inline_codebooks`](Self::inline_codebooks) is set.
	pub codebooks_path: PathBuf
}

impl Default for WwRiffOptions {
	fn default() -> Self {
		Self {
			inline_codebooks: false,
			full_setup: false,
			force_packet_format: ForcePacketFormat::default(),
			codebooks_path: PathBuf::from("packed_codebooks.bin")
		}
	}
}

impl WwRiffOptions {
	/// Returns whether codebooks should be read inline rather than from an external
	/// library, taking [`full_setup`](Self::full_setup) into account.
	pub(crate) fn uses_inline_codebooks(&self) -> bool {
		self.inline_codebooks || self.full_setup
	}
}

//! Parses a Wwise RIFF/RIFX container and exposes the data needed to rebuild a
//! standard Ogg Vorbis stream from it.

use std::{
	fmt,
	io::{Read, Seek, SeekFrom, Write}
};

use log::{debug, info, trace};

use crate::{
	audio_packet,
	endian::Endianness,
	error::Ww2OggError,
	options::{ForcePacketFormat, WwRiffOptions},
	setup_header
};

/// The `fmt` chunk sizes this parser accepts.
const FMT_SIZE_FULL_VORB: u32 = 0x42;

/// Known `subtype` channel-layout codes, kept only for diagnostics: an unrecognized
/// value is not an error.
const KNOWN_SUBTYPES: [u32; 6] = [4, 3, 0x33, 0x37, 0x3b, 0x3f];

const FMT_FIXED_GUID: [u8; 16] = [
	0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9b, 0x71
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VorbVariant {
	/// `vorb_size` absent (faked from a 0x42-byte `fmt`) or `0x2A`.
	Compact,
	/// `vorb_size` `0x28` or `0x2C`: a full header triad is already present.
	Triad,
	/// `vorb_size` `0x32` or `0x34`.
	Standard
}

/// A loop point pair, in samples, already adjusted for the post-parse fix-up described
/// in the `smpl` chunk's handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPoints {
	/// The first looped sample.
	pub start: u32,
	/// The sample one past the last looped sample.
	pub end: u32
}

/// A parsed Wwise RIFF/RIFX "Vorbis" container.
///
/// Constructed with [`WwRiff::parse`]; converted to a standard Ogg Vorbis I stream with
/// [`WwRiff::write_ogg`].
pub struct WwRiff {
	data: Vec<u8>,
	endianness: Endianness,

	pub(crate) data_offset: u32,
	pub(crate) data_size: u32,

	pub(crate) channels: u16,
	pub(crate) sample_rate: u32,
	pub(crate) avg_bytes_per_second: u32,

	loop_points: Option<LoopPoints>,

	pub(crate) sample_count: u32,
	pub(crate) setup_packet_offset: u32,
	pub(crate) first_audio_packet_offset: u32,
	pub(crate) blocksize_0_pow: u8,
	pub(crate) blocksize_1_pow: u8,

	pub(crate) options: WwRiffOptions,
	pub(crate) header_triad_present: bool,
	pub(crate) old_packet_headers: bool,
	pub(crate) no_granule: bool,
	pub(crate) mod_packets: bool
}

impl WwRiff {
	/// Parses a Wwise RIFF/RIFX container from `reader`, applying `options`.
	pub fn parse<R: Read + Seek>(mut reader: R, options: WwRiffOptions) -> Result<Self, Ww2OggError> {
		reader.seek(SeekFrom::Start(0))?;
		let mut data = Vec::new();
		reader.read_to_end(&mut data)?;
		Self::from_bytes(data, options)
	}

	/// Parses a Wwise RIFF/RIFX container already fully read into memory.
	pub fn from_bytes(data: Vec<u8>, options: WwRiffOptions) -> Result<Self, Ww2OggError> {
		let file_size = data.len();

		let magic = data.get(0..4).ok_or_else(|| Ww2OggError::parse("file too small for RIFF header"))?;
		let endianness = if magic == b"RIFX" {
			Endianness::Big
		} else if magic == b"RIFF" {
			Endianness::Little
		} else {
			return Err(Ww2OggError::parse("missing RIFF magic"));
		};

		let riff = RiffReader { data: &data, endianness };

		let riff_size = riff.read_u32(4)? as usize + 8;
		if riff_size > file_size {
			return Err(Ww2OggError::parse("RIFF truncated"));
		}
		if riff.read_bytes(8, 4)? != b"WAVE" {
			return Err(Ww2OggError::parse("missing WAVE"));
		}

		let mut fmt: Option<(u32, u32)> = None;
		let mut cue: Option<(u32, u32)> = None;
		let mut list: Option<(u32, u32)> = None;
		let mut smpl: Option<(u32, u32)> = None;
		let mut vorb: Option<(u32, u32)> = None;
		let mut data_chunk: Option<(u32, u32)> = None;

		let mut chunk_offset = 12usize;
		while chunk_offset < riff_size {
			if chunk_offset + 8 > riff_size {
				return Err(Ww2OggError::parse("chunk header truncated"));
			}
			let chunk_type = riff.read_bytes(chunk_offset, 4)?;
			let chunk_size = riff.read_u32(chunk_offset + 4)?;
			let payload_offset = (chunk_offset + 8) as u32;

			match chunk_type {
				b"fmt " => fmt = Some((payload_offset, chunk_size)),
				b"cue " => cue = Some((payload_offset, chunk_size)),
				b"LIST" => list = Some((payload_offset, chunk_size)),
				b"smpl" => smpl = Some((payload_offset, chunk_size)),
				b"vorb" => vorb = Some((payload_offset, chunk_size)),
				b"data" => data_chunk = Some((payload_offset, chunk_size)),
				other => trace!("skipping unrecognized RIFF chunk {:?}", String::from_utf8_lossy(other))
			}

			chunk_offset = chunk_offset + 8 + chunk_size as usize;
		}
		if chunk_offset > riff_size {
			return Err(Ww2OggError::parse("chunk truncated"));
		}
		let _ = list; // validated structurally only; contents are not interpreted

		let (fmt_offset, fmt_size) = fmt.ok_or_else(|| Ww2OggError::MissingChunk("fmt "))?;
		let (data_offset, data_size) = data_chunk.ok_or_else(|| Ww2OggError::MissingChunk("data"))?;

		if vorb.is_none() && fmt_size != FMT_SIZE_FULL_VORB {
			return Err(Ww2OggError::parse("expected 0x42 fmt if vorb missing"));
		}
		if vorb.is_some() && !matches!(fmt_size, 0x12 | 0x18 | 0x28) {
			return Err(Ww2OggError::parse("bad fmt size"));
		}
		let vorb_offset = vorb.map(|(offset, _)| offset).unwrap_or(fmt_offset + 0x18);

		if riff.read_u16(fmt_offset as usize)? != 0xFFFF {
			return Err(Ww2OggError::parse("bad codec id"));
		}
		let channels = riff.read_u16(fmt_offset as usize + 2)?;
		let sample_rate = riff.read_u32(fmt_offset as usize + 4)?;
		let avg_bytes_per_second = riff.read_u32(fmt_offset as usize + 8)?;
		if riff.read_u16(fmt_offset as usize + 12)? != 0 {
			return Err(Ww2OggError::parse("bad block align"));
		}
		if riff.read_u16(fmt_offset as usize + 14)? != 0 {
			return Err(Ww2OggError::parse("expected 0 bits per sample"));
		}
		let ext_len = u32::from(riff.read_u16(fmt_offset as usize + 16)?);
		if ext_len != fmt_size - 0x12 {
			return Err(Ww2OggError::parse("bad extra fmt length"));
		}

		let mut subtype = 0u32;
		if ext_len >= 2 {
			let _ext_unk = riff.read_u16(fmt_offset as usize + 0x12)?;
			if ext_len >= 6 {
				subtype = riff.read_u32(fmt_offset as usize + 0x14)?;
			}
		}

		if fmt_size == 0x28 && riff.read_bytes(fmt_offset as usize + 0x18, 16)? != FMT_FIXED_GUID {
			return Err(Ww2OggError::parse("expected signature in extra fmt"));
		}

		if let Some((cue_offset, _)) = cue {
			let _cue_count = riff.read_u32(cue_offset as usize)?;
		}

		let mut loop_points = None;
		if let Some((smpl_offset, _)) = smpl {
			let loop_count = riff.read_u32(smpl_offset as usize + 0x1C)?;
			if loop_count != 1 {
				return Err(Ww2OggError::parse("expected one loop"));
			}
			let loop_start = riff.read_u32(smpl_offset as usize + 0x2C)?;
			let loop_end_raw = riff.read_u32(smpl_offset as usize + 0x30)?;
			loop_points = Some((loop_start, loop_end_raw));
		}

		let vorb_size_raw = vorb.map(|(_, size)| size);
		let variant = match vorb_size_raw {
			None | Some(0x2A) => VorbVariant::Compact,
			Some(0x28) | Some(0x2C) => VorbVariant::Triad,
			Some(0x32) | Some(0x34) => VorbVariant::Standard,
			Some(_) => return Err(Ww2OggError::parse("bad vorb size"))
		};

		let sample_count = riff.read_u32(vorb_offset as usize)?;

		let mut no_granule = false;
		let mut mod_packets = false;
		let fields_offset = match variant {
			VorbVariant::Compact => {
				no_granule = true;
				let mod_signal = riff.read_u32(vorb_offset as usize + 0x04)?;
				mod_packets = !matches!(mod_signal, 0x4A | 0x4B | 0x69 | 0x70);
				vorb_offset as usize + 0x10
			}
			VorbVariant::Triad | VorbVariant::Standard => vorb_offset as usize + 0x18
		};

		match options.force_packet_format {
			ForcePacketFormat::Detect => {}
			ForcePacketFormat::ForceModPackets => mod_packets = true,
			ForcePacketFormat::ForceNoModPackets => mod_packets = false
		}

		let setup_packet_offset = riff.read_u32(fields_offset)?;
		let first_audio_packet_offset = riff.read_u32(fields_offset + 4)?;

		let (header_triad_present, old_packet_headers, blocksize_0_pow, blocksize_1_pow) = match variant {
			VorbVariant::Triad => (true, true, 0u8, 0u8),
			VorbVariant::Compact | VorbVariant::Standard => {
				let blocksizes_offset = match variant {
					VorbVariant::Compact => vorb_offset as usize + 0x24,
					_ => vorb_offset as usize + 0x2C
				};
				let _uid = riff.read_u32(blocksizes_offset)?;
				let blocksize_0_pow = riff.read_bytes(blocksizes_offset + 4, 1)?[0];
				let blocksize_1_pow = riff.read_bytes(blocksizes_offset + 5, 1)?[0];
				(false, false, blocksize_0_pow, blocksize_1_pow)
			}
		};

		let loop_points = match loop_points {
			Some((start, raw_end)) => {
				let end = if raw_end == 0 { sample_count } else { raw_end + 1 };
				if start >= sample_count || end > sample_count || start > end {
					return Err(Ww2OggError::parse("loops out of range"));
				}
				Some(LoopPoints { start, end })
			}
			None => None
		};

		if !KNOWN_SUBTYPES.contains(&subtype) && subtype != 0 {
			debug!("unrecognized fmt subtype {subtype:#x}; channel layout is undetermined but not rejected");
		}

		info!(
			"parsed Wwise RIFF: {} channel(s), {sample_rate} Hz, {sample_count} samples, \
			 {} setup, {} packet headers, {} codebooks",
			channels,
			if header_triad_present {
				"triad"
			} else if options.uses_inline_codebooks() {
				"inline"
			} else {
				"stripped"
			},
			if old_packet_headers {
				"8-byte"
			} else if no_granule {
				"2-byte"
			} else {
				"6-byte"
			},
			if options.uses_inline_codebooks() { "inline" } else { "external" }
		);

		Ok(Self {
			data,
			endianness,
			data_offset,
			data_size,
			channels,
			sample_rate,
			avg_bytes_per_second,
			loop_points,
			sample_count,
			setup_packet_offset,
			first_audio_packet_offset,
			blocksize_0_pow,
			blocksize_1_pow,
			options,
			header_triad_present,
			old_packet_headers,
			no_granule,
			mod_packets
		})
	}

	/// The container's channel count.
	pub fn channels(&self) -> u16 {
		self.channels
	}

	/// The container's sample rate, in Hz.
	pub fn sample_rate(&self) -> u32 {
		self.sample_rate
	}

	/// The total number of audio samples in the stream.
	pub fn sample_count(&self) -> u32 {
		self.sample_count
	}

	/// This stream's loop points, if it declares exactly one loop.
	pub fn loop_points(&self) -> Option<LoopPoints> {
		self.loop_points
	}

	pub(crate) fn data(&self) -> &[u8] {
		&self.data
	}

	pub(crate) fn read_u16(&self, offset: usize) -> Result<u16, Ww2OggError> {
		RiffReader { data: &self.data, endianness: self.endianness }.read_u16(offset)
	}

	pub(crate) fn read_u32(&self, offset: usize) -> Result<u32, Ww2OggError> {
		RiffReader { data: &self.data, endianness: self.endianness }.read_u32(offset)
	}

	pub(crate) fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8], Ww2OggError> {
		RiffReader { data: &self.data, endianness: self.endianness }.read_bytes(offset, len)
	}

	/// A human-readable summary of this container, without performing the conversion.
	pub fn describe(&self) -> WwRiffSummary<'_> {
		WwRiffSummary(self)
	}

	/// Converts this container to a standard Ogg Vorbis I stream, writing it to `sink`.
	pub fn write_ogg<W: Write>(&self, sink: W) -> Result<(), Ww2OggError> {
		let mut writer = crate::ogg::OggPageWriter::new(sink);

		let (mode_blockflag, mode_bits) = if self.header_triad_present {
			setup_header::write_header_with_triad(self, &mut writer)?;
			(Vec::new(), 0)
		} else {
			setup_header::write_header(self, &mut writer)?
		};

		audio_packet::write_audio_packets(self, &mode_blockflag, mode_bits, &mut writer)?;
		writer.finish()?;
		Ok(())
	}
}

/// A small byte-buffer reader used only during [`WwRiff::parse`].
struct RiffReader<'a> {
	data: &'a [u8],
	endianness: Endianness
}

impl RiffReader<'_> {
	fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8], Ww2OggError> {
		self.data
			.get(offset..offset + len)
			.ok_or_else(|| Ww2OggError::parse("unexpected end of file while reading a chunk field"))
	}

	fn read_u16(&self, offset: usize) -> Result<u16, Ww2OggError> {
		let bytes: [u8; 2] = self.read_bytes(offset, 2)?.try_into().unwrap();
		Ok(self.endianness.u16_from_slice(&bytes))
	}

	fn read_u32(&self, offset: usize) -> Result<u32, Ww2OggError> {
		let bytes: [u8; 4] = self.read_bytes(offset, 4)?.try_into().unwrap();
		Ok(self.endianness.u32_from_slice(&bytes))
	}
}

/// A human-readable summary of a parsed [`WwRiff`], mirroring the collaborator's
/// historical `print_info` output.
pub struct WwRiffSummary<'a>(&'a WwRiff);

impl fmt::Display for WwRiffSummary<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let riff = self.0;
		writeln!(
			f,
			"{} WAVE {} channel{} {} Hz {} bps",
			if riff.endianness == Endianness::Little { "RIFF" } else { "RIFX" },
			riff.channels,
			if riff.channels == 1 { "" } else { "s" },
			riff.sample_rate,
			riff.avg_bytes_per_second * 8
		)?;
		writeln!(f, "{} samples", riff.sample_count)?;
		if let Some(loop_points) = riff.loop_points {
			writeln!(f, "loop from {} to {}", loop_points.start, loop_points.end)?;
		}
		if riff.old_packet_headers {
			writeln!(f, "- 8 byte (old) packet headers")?;
		} else if riff.no_granule {
			writeln!(f, "- 2 byte packet headers, no granule")?;
		} else {
			writeln!(f, "- 6 byte packet headers")?;
		}
		if riff.header_triad_present {
			writeln!(f, "- Vorbis header triad present")?;
		}
		if riff.options.full_setup || riff.header_triad_present {
			writeln!(f, "- full setup header")?;
		} else {
			writeln!(f, "- stripped setup header")?;
		}
		if riff.options.uses_inline_codebooks() || riff.header_triad_present {
			writeln!(f, "- inline codebooks")?;
		} else {
			writeln!(f, "- external codebooks ({})", riff.options.codebooks_path.display())?;
		}
		if riff.mod_packets {
			writeln!(f, "- modified Vorbis packets")?;
		} else {
			writeln!(f, "- standard Vorbis packets")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	fn minimal_fmt42_riff(channels: u16, sample_rate: u32, sample_count: u32, mod_packets_signal: u32) -> Vec<u8> {
		let mut fmt = vec![0u8; 0x42];
		fmt[0..2].copy_from_slice(&0xFFFFu16.to_le_bytes());
		fmt[2..4].copy_from_slice(&channels.to_le_bytes());
		fmt[4..8].copy_from_slice(&sample_rate.to_le_bytes());
		fmt[8..12].copy_from_slice(&2000u32.to_le_bytes()); // avg bytes/sec
		fmt[16..18].copy_from_slice(&0x30u16.to_le_bytes()); // ext len = fmt_size - 0x12
		// vorb fields embedded at fmt_offset + 0x18
		fmt[0x18..0x1c].copy_from_slice(&sample_count.to_le_bytes());
		fmt[0x1c..0x20].copy_from_slice(&mod_packets_signal.to_le_bytes());
		fmt[0x28..0x2c].copy_from_slice(&0u32.to_le_bytes()); // setup_packet_offset
		fmt[0x2c..0x30].copy_from_slice(&16u32.to_le_bytes()); // first_audio_packet_offset
		fmt[0x34..0x38].copy_from_slice(&0u32.to_le_bytes()); // uid
		fmt[0x38] = 8; // blocksize_0_pow
		fmt[0x39] = 11; // blocksize_1_pow

		let data_payload = vec![0u8; 16];

		let mut riff = Vec::new();
		riff.extend_from_slice(b"RIFF");
		riff.extend_from_slice(&0u32.to_le_bytes()); // patched below
		riff.extend_from_slice(b"WAVE");
		riff.extend_from_slice(b"fmt ");
		riff.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
		riff.extend_from_slice(&fmt);
		riff.extend_from_slice(b"data");
		riff.extend_from_slice(&(data_payload.len() as u32).to_le_bytes());
		riff.extend_from_slice(&data_payload);

		let riff_size = (riff.len() - 8) as u32;
		riff[4..8].copy_from_slice(&riff_size.to_le_bytes());
		riff
	}

	#[test]
	fn parses_minimal_compact_vorb_container() {
		let bytes = minimal_fmt42_riff(2, 44100, 88200, 0xD9);
		let riff = WwRiff::from_bytes(bytes, WwRiffOptions::default()).unwrap();
		assert_eq!(riff.channels(), 2);
		assert_eq!(riff.sample_rate(), 44100);
		assert_eq!(riff.sample_count(), 88200);
		assert!(riff.mod_packets);
		assert!(riff.no_granule);
		assert_eq!(riff.blocksize_0_pow, 8);
		assert_eq!(riff.blocksize_1_pow, 11);
	}

	#[test]
	fn mod_packets_heuristic_detects_unset_signal() {
		let bytes = minimal_fmt42_riff(1, 22050, 100, 0x4A);
		let riff = WwRiff::from_bytes(bytes, WwRiffOptions::default()).unwrap();
		assert!(!riff.mod_packets);
	}

	#[test]
	fn force_packet_format_overrides_heuristic() {
		let bytes = minimal_fmt42_riff(1, 22050, 100, 0x4A);
		let options = WwRiffOptions { force_packet_format: ForcePacketFormat::ForceModPackets, ..Default::default() };
		let riff = WwRiff::from_bytes(bytes, options).unwrap();
		assert!(riff.mod_packets);
	}

	#[test]
	fn rejects_missing_riff_magic() {
		let err = WwRiff::from_bytes(vec![0; 16], WwRiffOptions::default());
		assert!(err.is_err());
	}

	#[test]
	fn rejects_truncated_riff_size() {
		let mut bytes = minimal_fmt42_riff(1, 8000, 10, 0x70);
		bytes[4..8].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
		assert!(WwRiff::from_bytes(bytes, WwRiffOptions::default()).is_err());
	}

	#[test]
	fn parses_via_seekable_reader() {
		let bytes = minimal_fmt42_riff(2, 48000, 1000, 0x70);
		let riff = WwRiff::parse(Cursor::new(bytes), WwRiffOptions::default()).unwrap();
		assert_eq!(riff.sample_rate(), 48000);
	}
}

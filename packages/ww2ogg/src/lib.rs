//! ww2ogg is a Rust library that converts Audiokinetic Wwise's proprietary RIFF/RIFX
//! "Vorbis" container format back into a standard Ogg Vorbis I bitstream, as defined
//! in the [Vorbis I specification].
//!
//! Wwise strips a number of redundant fields from the Vorbis codec's standard
//! framing before embedding audio in a game's sound bank, to save space: packet
//! headers are shrunk, the three mandatory Vorbis header packets are reduced to a
//! single compacted setup packet, and codebooks within that setup packet are
//! themselves re-encoded into a more compact schema, optionally referencing entries
//! in an external "packed codebook" library shared across many sound banks. None of
//! this is decodable by a standard Vorbis decoder. This library reverses every one
//! of those transformations, producing a file indistinguishable (except for being
//! slightly larger, since the stripped redundancy has to be restored) from what a
//! standard Vorbis encoder would have produced.
//!
//! # Conversion pipeline
//!
//! [`WwRiff::parse`] reads a RIFF or RIFX container and validates its chunk layout,
//! extracting the information needed to perform the conversion: sample rate, channel
//! count, loop points, block sizes, and the packet framing variant in use. No
//! conversion work happens at this point, so a parsed [`WwRiff`] can be inspected
//! (see [`WwRiff::describe`]) without committing to writing anything.
//!
//! [`WwRiff::write_ogg`] performs the actual conversion, writing a standard Ogg
//! Vorbis I stream to the given sink. Depending on how aggressively the input's
//! setup header was stripped, this either copies an existing header triad through
//! (with codebook re-verification), copies a complete but still-compacted setup
//! packet through, or fully re-expands a stripped setup packet's floors, residues,
//! mappings and modes from scratch. [`WwRiffOptions`] controls which of these paths
//! is taken, and whether codebooks are read inline or from an external
//! [`CodebookLibrary`].
//!
//! # Logging
//!
//! This crate uses the [`log`](https://crates.io/crates/log) crate for logging status
//! and diagnostic messages to any interested consumers. Executables can customize the
//! verbosity of this logging, and even compile it out, [as explained in the `log`
//! crate documentation](https://docs.rs/log/0.4.16/log).
//!
//! # Examples
//!
//! ```ignore
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::fs::File;
//! use ww2ogg::{WwRiff, WwRiffOptions};
//!
//! let input = File::open("voice_0001.wem")?;
//! let riff = WwRiff::parse(input, WwRiffOptions::default())?;
//! println!("{}", riff.describe());
//!
//! let mut output = File::create("voice_0001.ogg")?;
//! riff.write_ogg(&mut output)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Acknowledgements
//!
//! The conversion algorithm implemented by this crate follows the reverse-engineering
//! work originally published by hcs64 in the `ww2ogg` C++ tool, later maintained by
//! the Wwise modding community.
//!
//! [Vorbis I specification]: https://xiph.org/vorbis/doc/Vorbis_I_spec.pdf

#![forbid(unsafe_code)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]
#![deny(non_ascii_idents)]
#![deny(clippy::print_stdout)]
#![deny(clippy::unimplemented)]
#![warn(explicit_outlives_requirements)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(unused_import_braces)]
#![warn(unused_qualifications)]
#![warn(variant_size_differences)]
#![warn(clippy::empty_enum)]
#![warn(clippy::enum_glob_use)]
#![warn(clippy::float_cmp_const)]
#![warn(clippy::invalid_upcast_comparisons)]
#![warn(clippy::multiple_inherent_impl)]
#![warn(clippy::use_self)]
#![warn(clippy::used_underscore_binding)]
#![warn(clippy::redundant_feature_names)]

#[doc(inline)]
pub use codebook::CodebookLibrary;
#[doc(inline)]
pub use error::Ww2OggError;
#[doc(inline)]
pub use options::{ForcePacketFormat, WwRiffOptions};
#[doc(inline)]
pub use riff::{LoopPoints, WwRiff, WwRiffSummary};

/// A text tag that precisely identifies this ww2ogg build.
pub static WW2OGG_VERSION_TAG: &str =
	concat!("ww2ogg ", env!("WW2OGG_VERSION"), env!("WW2OGG_BUILD_DATE_VERSION_SUFFIX"));

mod audio_packet;
mod bitreader;
mod codebook;
mod endian;
mod error;
mod math;
mod ogg;
mod options;
mod riff;
mod setup_header;

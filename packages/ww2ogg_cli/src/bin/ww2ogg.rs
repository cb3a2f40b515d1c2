use std::borrow::Cow;
use std::env;
use std::fs::File;
use std::io::{stdout, BufReader, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::process::exit;

use getopts::{Matches, Options, ParsingStyle};
use log::info;
use stderrlog::ColorChoice;
use ww2ogg::{ForcePacketFormat, WwRiff, WwRiffOptions, WW2OGG_VERSION_TAG};

fn main() {
	exit(match run() {
		Ok(_) => 0,
		Err(err) => {
			eprintln!("{err}");
			1
		}
	})
}

fn run() -> Result<(), Cow<'static, str>> {
	let mut options = Options::new();

	options
		.optflag("h", "help", "Prints information about the accepted command line arguments and exits.")
		.optopt("o", "", "Sets the output file name. Defaults to the input file name with an .ogg extension, \
			or a _conv.ogg suffix if that would collide with the input file. Pass - to write to standard output.", "OUTPUT")
		.optflag("", "inline-codebooks", "Do not consult an external packed codebook library; assumes the \
			setup packet's codebooks are already inline standard Vorbis codebooks.")
		.optflag("", "full-setup", "Assumes the setup packet already contains a complete, standard Vorbis \
			setup header. Implies --inline-codebooks.")
		.optflag("", "mod-packets", "Forces audio packets to be treated as using the mod-packets window-flag \
			encoding, overriding the format's own heuristic.")
		.optflag("", "no-mod-packets", "Forces audio packets to be treated as using standard Vorbis packet \
			framing, overriding the format's own heuristic.")
		.optopt("", "pcb", "Sets the path to the packed codebook library file. Defaults to packed_codebooks.bin \
			in the current directory.", "PATH")
		.optflag("", "quiet", "Suppresses status and diagnostic output. Implied when writing to standard output.")
		.parsing_style(ParsingStyle::StopAtFirstFree);

	let matches = options
		.parse(env::args().skip(1))
		.map_err(|err| format!("{err}\nRun {} -h to see command line argument help", env!("CARGO_BIN_NAME")))?;

	if matches.opt_present("h") {
		print_usage(&options);
		return Ok(());
	}

	if matches.opt_present("mod-packets") && matches.opt_present("no-mod-packets") {
		return Err("--mod-packets and --no-mod-packets cannot both be specified".into());
	}

	if matches.free.len() != 1 {
		return Err(format!(
			"Expected exactly one input file argument. Run {} -h to see command line argument help",
			env!("CARGO_BIN_NAME")
		)
		.into());
	}

	let input_file_name = &matches.free[0];
	let output_file_name = output_file_name(&matches, input_file_name);
	let quiet_mode = matches.opt_present("quiet") || output_file_name == "-";

	init_logging(&matches, quiet_mode);

	convert(&matches, input_file_name, &output_file_name, quiet_mode)
}

fn convert(matches: &Matches, input_file_name: &str, output_file_name: &str, quiet_mode: bool) -> Result<(), Cow<'static, str>> {
	let options = riff_options(matches);

	let input = BufReader::new(File::open(input_file_name).map_err(|err| format!("Could not open input file: {err}"))?);

	let riff = WwRiff::parse(input, options).map_err(|err| format!("Could not parse input file: {err}"))?;

	if !quiet_mode {
		print!("{}", riff.describe());
	}

	let (mut output_stdout, mut output_file);
	let output: &mut dyn Write = if output_file_name == "-" {
		if stdout().is_terminal() {
			return Err("Refusing to write binary Ogg Vorbis data to a terminal; redirect standard output \
				to a file instead"
				.into());
		}
		output_stdout = stdout().lock();
		&mut output_stdout
	} else {
		output_file = BufWriter::new(
			File::create(output_file_name).map_err(|err| format!("Could not create output file: {err}"))?
		);
		&mut output_file
	};

	info!("Converting {input_file_name} to {output_file_name}...");

	riff.write_ogg(output).map_err(|err| format!("Error while converting the input file: {err}"))?;

	info!("Conversion completed. Have a nice day!");

	Ok(())
}

fn riff_options(matches: &Matches) -> WwRiffOptions {
	let full_setup = matches.opt_present("full-setup");

	let force_packet_format = if matches.opt_present("mod-packets") {
		ForcePacketFormat::ForceModPackets
	} else if matches.opt_present("no-mod-packets") {
		ForcePacketFormat::ForceNoModPackets
	} else {
		ForcePacketFormat::Detect
	};

	let codebooks_path = matches
		.opt_str("pcb")
		.map(PathBuf::from)
		.unwrap_or_else(|| WwRiffOptions::default().codebooks_path);

	WwRiffOptions {
		inline_codebooks: matches.opt_present("inline-codebooks") || full_setup,
		full_setup,
		force_packet_format,
		codebooks_path
	}
}

fn output_file_name(matches: &Matches, input_file_name: &str) -> String {
	if let Some(explicit) = matches.opt_str("o") {
		return explicit;
	}

	let stem = match input_file_name.rfind('.') {
		Some(dot) => &input_file_name[..dot],
		None => input_file_name
	};
	let mut candidate = format!("{stem}.ogg");
	if candidate == input_file_name {
		candidate.push_str("_conv.ogg");
	}
	candidate
}

fn init_logging(option_matches: &Matches, quiet_mode: bool) {
	stderrlog::new()
		.module(env!("CARGO_PKG_NAME"))
		.module("ww2ogg")
		.verbosity(if option_matches.opt_present("quiet") { 0 } else { 2 })
		.show_level(false)
		.quiet(quiet_mode)
		.color(ColorChoice::Never)
		.init()
		.unwrap();
}

fn print_usage(options: &Options) {
	println!("{WW2OGG_VERSION_TAG}");
	println!("{}", env!("CARGO_PKG_DESCRIPTION"));
	println!();
	println!("Usage:");
	print!("    {} [OPTION]... <input file>", env!("CARGO_BIN_NAME"));
	println!("{}", options.usage(""));
}

use std::io;

use ww2ogg::{WwRiff, WwRiffOptions};

fn main() {
	afl::fuzz!(|data: &[u8]| {
		// Each fuzz run has to be pretty fast. Just check that no crashes happen
		if let Ok(riff) = WwRiff::parse(io::Cursor::new(data), WwRiffOptions::default()) {
			riff.write_ogg(io::sink()).ok();
		}
	})
}

//! Print the contents of a capture file, one sample per line

use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use spi_slurper::decode::{decode_bytes, read_capture, Format};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct DecodeArgs {
    /// Capture file written by spi_slurper
    #[clap(value_parser = clap::value_parser!(PathBuf))]
    filename: PathBuf,
    /// One of uint16, int16, hex
    format: String,
}

fn run(args: &DecodeArgs) -> anyhow::Result<()> {
    // Reject the format before touching the file so nothing partial is printed
    let format: Format = args.format.parse()?;
    let bytes = read_capture(&args.filename)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for (i, value) in decode_bytes(&bytes, format)? {
        writeln!(out, "{}: {}{}", i, format.prefix(), value)?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = DecodeArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

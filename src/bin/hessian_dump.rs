//! `hessian-dump` — decode and pretty-print raw Hessian 2.0 bytes.
//!
//! A thin consumer of the public library surface: it owns no
//! wire-format knowledge of its own and exists to exercise `hessian2`
//! the way a caller would.

use std::fs;
use std::io::{self, Read};

use clap::Parser;
use hessian2::{CodecConfig, Decoder, Result};

/// Decode and pretty-print every top-level value in a Hessian byte stream.
#[derive(Parser, Debug)]
#[command(name = "hessian-dump", version, about)]
struct Args {
    /// Path to a TOML codec configuration file. Defaults are used if omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<String>,

    /// Path to a file of raw Hessian bytes, or `-` for stdin.
    input: String,
}

fn read_input(path: &str) -> io::Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(path)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = CodecConfig::load_or_default(args.config.as_deref());
    let bytes = read_input(&args.input)?;

    let mut decoder = Decoder::with_config(bytes, config);
    let mut index = 0usize;
    while let Some(value) = decoder.decode()? {
        println!("[{index}] {value:#?}");
        index += 1;
    }

    if index == 0 {
        eprintln!("no values decoded (empty input)");
    }

    Ok(())
}

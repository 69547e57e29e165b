//! pixdec CLI - PNG inspection and decoding tool
//!
//! Decodes one PNG file, prints a summary and any diagnostics, and can
//! write the reconstructed pixels or the raw decompressed image data.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use pixdec::decode::PngDecoder;
use pixdec::{DecodeOptions, DiagnosticsLevel, Image};

/// Decode a PNG file and report what is inside it.
#[derive(Parser, Debug)]
#[command(name = "pixdec")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PNG file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Write reconstructed pixel rows to this file
    #[arg(short, long, value_name = "OUTPUT")]
    out: Option<PathBuf>,

    /// Write the decompressed (still filtered) image data stream to this file
    #[arg(long, value_name = "PATH")]
    raw_out: Option<PathBuf>,

    /// Replace palette indices with palette colors in --out
    #[arg(long)]
    expand_palette: bool,

    /// Keep going when the image data checksum does not match
    #[arg(long)]
    lenient: bool,

    /// Print nothing but errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Also print notes such as text metadata
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn options(&self) -> DecodeOptions {
        let diagnostics = if self.quiet {
            DiagnosticsLevel::Silent
        } else if self.verbose {
            DiagnosticsLevel::Info
        } else {
            DiagnosticsLevel::Warnings
        };
        let base = if self.lenient {
            DecodeOptions::lenient()
        } else {
            DecodeOptions::strict()
        };
        DecodeOptions {
            diagnostics,
            ..base
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let options = args.options();

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let decoder = PngDecoder::new(BufReader::new(file), &options);

    let start = Instant::now();
    let image = match &args.raw_out {
        Some(path) => {
            let raw = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut raw = BufWriter::new(raw);
            let image = decoder.decode_with_sink(&mut raw);
            raw.flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            image
        }
        None => decoder.decode(),
    }
    .with_context(|| format!("Failed to decode {}", args.input.display()))?;
    let elapsed = start.elapsed();

    if !args.quiet {
        print_summary(&args, &image);
        for diagnostic in image.diagnostics() {
            println!("  {diagnostic}");
        }
        if args.verbose {
            println!("  decoded in {:.2?}", elapsed);
        }
    }

    if let Some(path) = &args.out {
        let pixels = if args.expand_palette {
            image.expand_palette()?
        } else {
            image.pixels().to_vec()
        };
        fs::write(path, &pixels)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !args.quiet {
            println!("  wrote {} bytes to {}", pixels.len(), path.display());
        }
    }

    Ok(())
}

fn print_summary(args: &Args, image: &Image) {
    let mut line = format!(
        "{}: {}x{} {}-bit {}",
        args.input.display(),
        image.width(),
        image.height(),
        image.bit_depth(),
        image.color_type()
    );
    if let Some(palette) = image.palette() {
        line.push_str(&format!(", {} palette entries", palette.len()));
    }
    if image.transparency().is_some() {
        line.push_str(", tRNS");
    }
    if !image.text().is_empty() {
        line.push_str(&format!(", {} text entries", image.text().len()));
    }
    println!("{line}");
}

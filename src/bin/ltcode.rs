//! ltcode CLI tool.
//!
//! `encode` turns files into droplet wire lines, one per line. `decode` reads
//! such lines back, in any order and with gaps, and writes the files out.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use ltcode::ecc::{DropletLimits, Encoder, EncoderParameters, DEFAULT_CHUNK_SIZE, DEFAULT_EXTRA};
use ltcode::transfer::{
    build_payload, manifest_payload, maybe_compress, Delivery, FileHeader, ReceivedFile,
    Receiver, ReceiverConfig,
};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ltcode")]
#[command(author, version, about = "LT fountain code file transfer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log decode progress (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode files into droplet lines
    Encode {
        /// Files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Bytes per chunk
        #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Extra droplets per file, as a fraction of its chunk count
        #[arg(short, long, default_value_t = DEFAULT_EXTRA)]
        extra: f64,

        /// Start seed of the droplet stream
        #[arg(long)]
        seed: Option<u64>,

        /// Send bodies uncompressed
        #[arg(long)]
        no_compress: bool,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode droplet lines back into files
    Decode {
        /// Input file (stdin if omitted)
        input: Option<PathBuf>,

        /// Directory for received files
        #[arg(short, long, default_value = "decoded")]
        output_dir: PathBuf,

        /// Reject droplets whose payload is not exactly this long
        #[arg(short, long)]
        chunk_size: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Encode {
            files,
            chunk_size,
            extra,
            seed,
            no_compress,
            output,
        } => {
            let params = EncoderParameters { chunk_size, seed };
            let out: Box<dyn Write> = match output {
                Some(path) => Box::new(
                    File::create(&path)
                        .with_context(|| format!("cannot create {}", path.display()))?,
                ),
                None => Box::new(io::stdout().lock()),
            };
            encode_files(&files, &params, extra, !no_compress, BufWriter::new(out))
        }

        Commands::Decode {
            input,
            output_dir,
            chunk_size,
        } => {
            let reader: Box<dyn BufRead> = match input {
                Some(path) => Box::new(BufReader::new(
                    File::open(&path).with_context(|| format!("cannot open {}", path.display()))?,
                )),
                None => Box::new(io::stdin().lock()),
            };
            let config = ReceiverConfig {
                limits: DropletLimits {
                    chunk_size,
                    ..DropletLimits::default()
                },
            };
            decode_lines(reader, config, &output_dir)
        }
    }
}

fn encode_files(
    files: &[PathBuf],
    params: &EncoderParameters,
    extra: f64,
    compress: bool,
    mut out: impl Write,
) -> Result<()> {
    if files.len() > 1 {
        write_stream(&manifest_payload(files.len()), params, extra, &mut out)?;
    }

    for (i, path) in files.iter().enumerate() {
        let body = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let header = if files.len() > 1 {
            FileHeader::batch(name, i + 1, files.len())
        } else {
            FileHeader::single(name)
        };
        let body = if compress {
            maybe_compress(&body)
        } else {
            body.as_slice().into()
        };

        let payload = build_payload(&header, &body);
        let count = write_stream(&payload, params, extra, &mut out)?;
        info!(
            "{}: {} payload bytes in {} droplets",
            path.display(),
            payload.len(),
            count
        );
    }

    out.flush()?;
    Ok(())
}

/// Write the droplet budget of one payload, returning the droplet count
fn write_stream(
    payload: &[u8],
    params: &EncoderParameters,
    extra: f64,
    out: &mut impl Write,
) -> Result<usize> {
    let encoder = Encoder::new(payload, params.clone())?;
    let count = encoder.droplet_budget(extra);
    for droplet in encoder.take(count) {
        writeln!(out, "{droplet}")?;
    }
    Ok(count)
}

fn decode_lines(reader: impl BufRead, config: ReceiverConfig, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create {}", output_dir.display()))?;

    let mut receiver = Receiver::new(config);
    let mut written = 0usize;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match receiver.feed(line) {
            Ok(Some(Delivery::File(file))) => {
                let path = write_file(output_dir, &file)?;
                info!("wrote {}", path.display());
                written += 1;
            }
            Ok(Some(Delivery::Manifest(count))) => info!("expecting {count} files"),
            Ok(None) => {}
            Err(e) => warn!("dropping droplet: {e}"),
        }

        if receiver.is_all_done() {
            break;
        }
    }

    if written == 0 {
        let progress = receiver.progress();
        bail!(
            "no file completed ({}/{} chunks from {} droplets)",
            progress.done,
            progress.total,
            progress.received
        );
    }
    Ok(())
}

/// Write a received file without overwriting an existing one
fn write_file(dir: &Path, file: &ReceivedFile) -> Result<PathBuf> {
    let mut path = dir.join(&file.name);
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}.{}", file.name, n));
        n += 1;
    }
    fs::write(&path, &file.body).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

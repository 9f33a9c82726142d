//! `lzma` command line tool.
//!
//! ```bash
//! lzma e input.txt input.txt.lzma -d 20 --fb 64 --mf bt2
//! lzma d input.txt.lzma input.txt
//! lzma b -d 22 -i 5
//! ```
//!
//! The single dash spellings `-fb -lc -lp -pb -mf -eos` are accepted too.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, ensure, Context};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use lzmacodec::{
    compress, decompress, Coder, LzmaDecoder, LzmaEncoder, LzmaOptions, MatchFinderKind,
    SetDecoderProperties, WriteCoderProperties,
};

const LEGACY_FLAGS: [&str; 6] = ["-fb", "-lc", "-lp", "-pb", "-mf", "-eos"];

const BENCHMARK_SIZE: usize = 1 << 22;

#[derive(Parser, Debug)]
#[command(name = "lzma")]
#[command(version)]
#[command(about = "LZMA encoder and decoder", long_about = None)]
struct Args {
    /// Log debug events, overriding RUST_LOG
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a file into the .lzma format
    #[command(visible_alias = "e")]
    Encode(EncodeArgs),

    /// Decompress a .lzma file
    #[command(visible_alias = "d")]
    Decode { input: PathBuf, output: PathBuf },

    /// Compress and decompress generated data, printing the speed of both
    #[command(visible_alias = "b")]
    Benchmark {
        /// Dictionary size as a power of two
        #[arg(short = 'd', default_value_t = 23, value_parser = clap::value_parser!(u32).range(0..=29))]
        dict_bits: u32,

        /// Number of passes
        #[arg(short = 'i', default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
        iterations: u32,
    },
}

#[derive(clap::Args, Debug)]
struct EncodeArgs {
    input: PathBuf,
    output: PathBuf,

    /// Dictionary size as a power of two
    #[arg(short = 'd', default_value_t = 23, value_parser = clap::value_parser!(u32).range(0..=29))]
    dict_bits: u32,

    /// Number of fast bytes
    #[arg(long = "fb", default_value_t = 128, value_parser = clap::value_parser!(u32).range(5..=273))]
    fast_bytes: u32,

    /// Literal context bits
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(0..=8))]
    lc: u32,

    /// Literal position bits
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=4))]
    lp: u32,

    /// Position state bits
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(0..=4))]
    pb: u32,

    /// Match finder, bt2 or bt4
    #[arg(long = "mf", default_value_t = MatchFinderKind::BT4)]
    match_finder: MatchFinderKind,

    /// Write an end marker and leave the size in the header unknown
    #[arg(long)]
    eos: bool,

    /// 0 for the fast parser, 1 or 2 for the normal one
    #[arg(short = 'a', default_value_t = 2, value_parser = clap::value_parser!(u32).range(0..=2))]
    algorithm: u32,
}

impl EncodeArgs {
    fn options(&self) -> LzmaOptions {
        LzmaOptions::default()
            .with_dict_bits(self.dict_bits)
            .with_fast_bytes(self.fast_bytes)
            .with_lc(self.lc)
            .with_lp(self.lp)
            .with_pb(self.pb)
            .with_match_finder(self.match_finder)
            .with_end_marker(self.eos)
            .with_algorithm(self.algorithm)
    }
}

/// Turn `-fb 64` and `-fb64` into `--fb 64` and `--fb=64`.
fn rewrite_legacy_flags(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };

            for flag in LEGACY_FLAGS {
                if let Some(value) = text.strip_prefix(flag) {
                    return if value.is_empty() {
                        format!("-{}", flag).into()
                    } else {
                        format!("-{}={}", flag, value).into()
                    };
                }
            }

            arg
        })
        .collect()
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_input(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn create_output(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn log_progress(read: u64, written: u64) {
    debug!(read, written, "progress");
}

fn encode(args: &EncodeArgs) -> anyhow::Result<()> {
    let input = open_input(&args.input)?;
    let size = input.metadata()?.len();
    let mut output = create_output(&args.output)?;

    let mut encoder = LzmaEncoder::new(args.options())?;
    encoder.write_coder_properties(&mut output)?;
    output.write_i64::<LittleEndian>(if args.eos { -1 } else { size as i64 })?;

    encoder
        .code(
            BufReader::new(input),
            &mut output,
            Some(size),
            None,
            Some(&mut log_progress),
        )
        .with_context(|| format!("failed to compress {}", args.input.display()))?;
    output.flush()?;

    info!(input = size, "compressed {}", args.input.display());
    Ok(())
}

fn decode(input_path: &Path, output_path: &Path) -> anyhow::Result<()> {
    let mut input = BufReader::new(open_input(input_path)?);

    let mut properties = [0u8; 5];
    if let Err(err) = input.read_exact(&mut properties) {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            bail!("input .lzma is too short");
        }
        return Err(err.into());
    }

    let mut decoder = LzmaDecoder::new();
    decoder.set_decoder_properties(&properties)?;

    let size = input
        .read_i64::<LittleEndian>()
        .context("input .lzma is too short")?;
    let output_size = u64::try_from(size).ok();

    let mut output = create_output(output_path)?;
    decoder
        .code(&mut input, &mut output, None, output_size, Some(&mut log_progress))
        .with_context(|| format!("failed to decompress {}", input_path.display()))?;
    output.flush()?;

    info!(declared = size, "decompressed {}", input_path.display());
    Ok(())
}

/// Random bytes from a small alphabet, mixed with copies of earlier runs.
fn benchmark_data(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(len + 64);

    while data.len() < len {
        if data.len() > 1024 && rng.gen_bool(0.6) {
            let distance = rng.gen_range(1..=data.len().min(1 << 16));
            for _ in 0..rng.gen_range(4..64) {
                data.push(data[data.len() - distance]);
            }
        } else {
            for _ in 0..rng.gen_range(1..16) {
                data.push(rng.gen_range(b'a'..=b'z'));
            }
        }
    }

    data.truncate(len);
    data
}

fn megabytes_per_second(bytes: usize, iterations: u32, elapsed: Duration) -> f64 {
    (bytes as f64 * iterations as f64) / elapsed.as_secs_f64().max(1e-9) / 1e6
}

fn benchmark(dict_bits: u32, iterations: u32) -> anyhow::Result<()> {
    let data = benchmark_data(BENCHMARK_SIZE, 0x1A2B_3C4D);
    let options = LzmaOptions::default().with_dict_bits(dict_bits);
    options.validate()?;

    let mut encode_time = Duration::ZERO;
    let mut decode_time = Duration::ZERO;
    let mut compressed_len = 0;

    for iteration in 0..iterations {
        let start = Instant::now();
        let compressed = compress(&data, &options)?;
        encode_time += start.elapsed();

        let start = Instant::now();
        let decompressed = decompress(&compressed)?;
        decode_time += start.elapsed();

        ensure!(
            decompressed == data,
            "round trip mismatch in iteration {}",
            iteration
        );
        compressed_len = compressed.len();
        debug!(iteration, compressed = compressed_len, "benchmark pass");
    }

    println!(
        "{} bytes -> {} bytes ({:.2}%)",
        data.len(),
        compressed_len,
        compressed_len as f64 * 100.0 / data.len() as f64
    );
    println!(
        "compress:   {:8.2} MB/s",
        megabytes_per_second(data.len(), iterations, encode_time)
    );
    println!(
        "decompress: {:8.2} MB/s",
        megabytes_per_second(data.len(), iterations, decode_time)
    );

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse_from(rewrite_legacy_flags(std::env::args_os()));
    init_logging(args.verbose);

    match &args.command {
        Command::Encode(encode_args) => encode(encode_args),
        Command::Decode { input, output } => decode(input, output),
        Command::Benchmark {
            dict_bits,
            iterations,
        } => benchmark(*dict_bits, *iterations),
    }
}

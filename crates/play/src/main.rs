//! hs-play - decode an HEVC elementary stream through a decoder session
//!
//! Feeds a raw Annex-B `.hevc`/`.265` file to libde265 block by block,
//! optionally paced to wall-clock time so the late-frame policy kicks in,
//! and optionally writes every displayed picture as packed I420.
//!
//! # Usage
//!
//! ```bash
//! # Decode as fast as possible, one access unit per block
//! hs-play clip.hevc
//!
//! # Arbitrary 4 KiB chunks, raw frames to disk
//! hs-play --chunk-size 4096 --output clip.yuv clip.hevc
//!
//! # Paced 29.97 fps playback with length-prefixed blocks
//! hs-play --realtime --fps 30000/1001 --packetized clip.hevc
//! ```

mod clock;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hs_common::{
    Block, InputFormat, Picture, Rational, Resolution, SessionConfig, DEFAULT_LENGTH_SIZE,
};
use hs_decoder::{De265Library, DecoderSession, SessionStats};
use hs_demux::{
    annexb_to_length_prefixed, classify_extradata, split_access_units, ExtradataKind, Framing,
};

use clock::PlaybackClock;

/// Decode an HEVC elementary stream file.
#[derive(Parser, Debug)]
#[command(name = "hs-play", about = "Decode an HEVC elementary stream through a paced decoder session")]
struct Cli {
    /// Annex-B HEVC elementary stream.
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Block size in bytes; 0 sends one access unit per block.
    #[arg(long, default_value_t = 0)]
    chunk_size: usize,

    /// Codec extradata (hvcC record or Annex-B parameter sets).
    #[arg(long)]
    extradata: Option<PathBuf>,

    /// Re-frame access units with 4-byte length prefixes before decoding.
    #[arg(long, default_value_t = false)]
    packetized: bool,

    /// Frame rate used to stamp access units, as `num` or `num/den`.
    #[arg(long, default_value = "25", value_parser = parse_rate)]
    fps: Rational,

    /// Pace input to wall-clock time and give every frame a deadline.
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Display latency added to each frame's deadline, in milliseconds.
    #[arg(long, default_value_t = 100)]
    latency_ms: u64,

    /// Declared width of the stream (0 = take it from the first picture).
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// Declared height of the stream (0 = take it from the first picture).
    #[arg(long, default_value_t = 0)]
    height: u32,

    /// Write displayed pictures here as packed I420.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Session config (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed decoder worker thread count (0 = single-threaded).
    #[arg(long)]
    threads: Option<u32>,

    /// Path to the libde265 shared library.
    #[arg(long)]
    library: Option<PathBuf>,

    /// More logging (-v debug, -vv trace). `RUST_LOG` wins if set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_rate(s: &str) -> Result<Rational, String> {
    let (num, den) = match s.split_once('/') {
        Some((num, den)) => (num.trim(), den.trim()),
        None => (s.trim(), "1"),
    };
    let num: u32 = num.parse().map_err(|e| format!("bad numerator '{num}': {e}"))?;
    let den: u32 = den.parse().map_err(|e| format!("bad denominator '{den}': {e}"))?;
    if num == 0 || den == 0 {
        return Err(format!("frame rate must be positive, got {s}"));
    }
    Ok(Rational { num, den })
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => SessionConfig::default(),
    };
    if let Some(threads) = cli.threads {
        config.workers.fixed = Some(threads);
    }
    Ok(config)
}

fn load_library(path: Option<&Path>) -> anyhow::Result<Arc<De265Library>> {
    let lib = match path {
        Some(path) => De265Library::load_from(path)
            .with_context(|| format!("Failed to load libde265 from {}", path.display()))?,
        None => De265Library::load().context("Failed to load libde265")?,
    };
    Ok(Arc::new(lib))
}

/// Refuse length-prefixed blocks when the extradata switches the session to Annex-B.
fn check_framing(packetized: bool, extradata: &[u8]) -> anyhow::Result<()> {
    let declared = Framing {
        packetized,
        length_size: DEFAULT_LENGTH_SIZE,
    };
    let probe = classify_extradata(extradata, declared);
    if packetized && probe.kind == ExtradataKind::AnnexB {
        bail!("--packetized cannot be used with Annex-B extradata");
    }
    Ok(())
}

/// Cut the stream into blocks the way a demuxer upstream would hand them over.
fn make_blocks(cli: &Cli, stream: &[u8]) -> anyhow::Result<Vec<Block>> {
    if cli.chunk_size > 0 {
        if cli.packetized {
            bail!("--packetized needs access-unit blocks (--chunk-size 0)");
        }
        let blocks = stream
            .chunks(cli.chunk_size)
            .map(Block::new)
            .collect();
        return Ok(blocks);
    }

    let mut blocks = Vec::new();
    for (index, au) in split_access_units(stream).into_iter().enumerate() {
        let data = if cli.packetized {
            annexb_to_length_prefixed(au, DEFAULT_LENGTH_SIZE)
                .context("Failed to re-frame access unit")?
        } else {
            au.to_vec()
        };
        blocks.push(Block::new(data).with_pts(cli.fps.frame_time(index as u64)));
    }
    Ok(blocks)
}

struct Sink {
    out: Option<BufWriter<File>>,
    scratch: Vec<u8>,
    written: u64,
}

impl Sink {
    fn open(path: Option<&Path>) -> anyhow::Result<Self> {
        let out = match path {
            Some(path) => Some(BufWriter::new(
                File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            )),
            None => None,
        };
        Ok(Self {
            out,
            scratch: Vec::new(),
            written: 0,
        })
    }

    fn present(&mut self, clock: &PlaybackClock, picture: &Picture) -> anyhow::Result<()> {
        clock.wait_until(picture.pts);
        if let Some(out) = self.out.as_mut() {
            self.scratch.clear();
            picture.write_packed(&mut self.scratch);
            out.write_all(&self.scratch).context("Failed to write picture")?;
        }
        self.written += 1;
        Ok(())
    }

    fn finish(self) -> anyhow::Result<u64> {
        if let Some(mut out) = self.out {
            out.flush().context("Failed to flush output")?;
        }
        Ok(self.written)
    }
}

fn log_stats(stats: &SessionStats, written: u64) {
    tracing::info!(
        blocks = stats.blocks_received,
        pictures = stats.pictures_emitted,
        written,
        skipped = stats.images_skipped,
        overload_drops = stats.overload_drops,
        framing_errors = stats.framing_errors,
        engine_errors = stats.engine_errors,
        flagged_drops = stats.flagged_drops,
        unsupported = stats.unsupported_images,
        renegotiations = stats.renegotiations,
        "Playback finished"
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let stream = std::fs::read(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let mut input = InputFormat::hevc(Resolution::new(cli.width, cli.height))
        .with_packetized(cli.packetized);
    if let Some(path) = &cli.extradata {
        let extradata = std::fs::read(path)
            .with_context(|| format!("Failed to read extradata {}", path.display()))?;
        input = input.with_extradata(extradata);
    }
    check_framing(input.packetized, &input.extradata)?;

    let blocks = make_blocks(&cli, &stream)?;
    tracing::info!(
        input = %cli.input.display(),
        bytes = stream.len(),
        blocks = blocks.len(),
        fps = %cli.fps,
        realtime = cli.realtime,
        "hs-play starting"
    );

    let library = load_library(cli.library.as_deref())?;
    let clock = PlaybackClock::new(cli.realtime, Duration::from_millis(cli.latency_ms));
    let mut session = DecoderSession::with_library(library, clock, &input, config)
        .context("Failed to open decoder session")?;
    let mut sink = Sink::open(cli.output.as_deref())?;

    for block in blocks {
        if let Some(picture) = session.decode(Some(block)) {
            sink.present(session.host(), &picture)?;
        }
    }
    for picture in session.drain().context("Failed to drain decoder")? {
        sink.present(session.host(), &picture)?;
    }

    if let Some(format) = session.output_format() {
        tracing::info!(
            resolution = %format.resolution,
            visible = %format.visible,
            paced = session.host().is_paced(),
            "Output format"
        );
    }
    let written = sink.finish()?;
    let stats = session.close();
    log_stats(&stats, written);
    Ok(())
}

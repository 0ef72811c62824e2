// Chord Bridge CLI entry point.
//
// Trains both chains from a corpus file and prints one generated progression,
// phrases separated by ` | `.
//
// Usage:
//   cargo run -p chord_bridge -- corpus.txt [--phrases N] [--length L]
//     [--start CHORD] [--seed N] [--mode MODE] [--config PATH] [--no-wrap] [-v]
//
// Modes: marginal, sequential, bisection
//
// Flags override values from `--config`. Without a seed from either source, a
// seed is taken from the clock and logged so the run can be repeated.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use chord_bridge::corpus::{format_progression, parse_corpus};
use chord_bridge::{BridgeConfig, InteriorMode, ProgressionModel};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "generate")]
#[command(about = "Generate chord progressions from a Markov-bridge model")]
struct Cli {
    /// Corpus file: one piece per line, phrases separated by `|`
    corpus: PathBuf,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of phrases to generate
    #[arg(short, long)]
    phrases: Option<usize>,

    /// Chords per phrase, endpoints included
    #[arg(short, long)]
    length: Option<usize>,

    /// First chord of the progression
    #[arg(short, long)]
    start: Option<String>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Interior sampling: marginal, sequential or bisection
    #[arg(short, long)]
    mode: Option<InteriorMode>,

    /// Do not count wrap-around steps when training
    #[arg(long)]
    no_wrap: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            BridgeConfig::from_json(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => BridgeConfig::default(),
    };
    if cli.no_wrap {
        config.training.wrap_phrases = false;
        config.training.wrap_pieces = false;
    }
    let generation = &mut config.generation;
    if let Some(n) = cli.phrases {
        generation.phrase_count = n;
    }
    if let Some(n) = cli.length {
        generation.phrase_length = n;
    }
    if let Some(mode) = cli.mode {
        generation.mode = mode;
    }
    if cli.start.is_some() {
        generation.start = cli.start.clone();
    }
    let seed = cli.seed.or(generation.seed).unwrap_or_else(clock_seed);

    let text = std::fs::read_to_string(&cli.corpus)
        .with_context(|| format!("reading corpus {}", cli.corpus.display()))?;
    let pieces = parse_corpus(&text);
    if pieces.is_empty() {
        bail!("corpus {} contains no chords", cli.corpus.display());
    }

    let model = ProgressionModel::train(&pieces, &config.training).context("training models")?;
    info!(
        pieces = pieces.len(),
        chords = model.vocabulary().len(),
        "trained models"
    );

    let request = config.generation.request();
    info!(
        seed,
        phrases = request.phrase_count,
        length = request.phrase_length,
        mode = %request.mode,
        "generating"
    );
    let chords = model
        .generate(&request, seed)
        .with_context(|| format!("generating with seed {seed}"))?;

    println!("{}", format_progression(&chords, request.phrase_length));
    Ok(())
}

//! fpcalc - compute acoustic fingerprints of raw PCM16 audio.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use giztoy_fingerprint::{Algorithm, Calculator, PcmSource, Printer, PrinterConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Compute the acoustic fingerprint of raw PCM16 little-endian audio.
///
/// The input must already be decoded; pipe it from a decoder, e.g.
///   ffmpeg -i song.mp3 -f s16le -ac 2 -ar 44100 - | fpcalc -r 44100 -c 2 -
#[derive(Parser)]
#[command(name = "fpcalc")]
#[command(version)]
struct Cli {
    /// Input file with raw PCM16 audio, or "-" for stdin
    input: PathBuf,

    /// Sample rate of the input in Hz
    #[arg(short = 'r', long, default_value_t = 44100)]
    rate: u32,

    /// Number of interleaved channels in the input
    #[arg(short = 'c', long, default_value_t = 2)]
    channels: u32,

    /// Config file (YAML or JSON); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fingerprint algorithm (test1..test4, default)
    #[arg(short = 'a', long)]
    algorithm: Option<Algorithm>,

    /// Maximum seconds of audio to analyze (at least 120 are analyzed)
    #[arg(short = 'l', long)]
    length: Option<u32>,

    /// Leading-silence threshold (0-32767)
    #[arg(long)]
    silence_threshold: Option<i32>,

    /// Output the raw fingerprint instead of the compact one
    #[arg(long)]
    raw: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Output {
    duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<Vec<i32>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("giztoy_fingerprint=debug,fpcalc=debug"))
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }

    let config = load_config(&cli)?;
    tracing::debug!(?config, engine = giztoy_fingerprint::version(), "configuration loaded");

    let reader: Box<dyn Read> = if cli.input.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&cli.input)
            .with_context(|| format!("failed to open {}", cli.input.display()))?;
        Box::new(BufReader::new(file))
    };
    let mut source = PcmSource::new(reader, cli.rate, cli.channels);

    let mut printer = Printer::from_config(&config).context("invalid fingerprint options")?;
    let mut output = Output {
        duration: 0.0,
        fingerprint: None,
        raw: None,
    };
    if cli.raw {
        output.raw = Some(
            printer
                .raw_fingerprint(&mut source, config.max_duration_seconds)
                .context("failed to compute raw fingerprint")?,
        );
    } else {
        output.fingerprint = Some(
            printer
                .fingerprint(&mut source, config.max_duration_seconds)
                .context("failed to compute fingerprint")?,
        );
    }
    output.duration = printer
        .last_stats()
        .duration(cli.rate, cli.channels)
        .as_secs_f64();
    printer.close();

    print_output(&output, cli.json)
}

fn load_config(cli: &Cli) -> Result<PrinterConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => PrinterConfig::default(),
    };
    if let Some(algorithm) = cli.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(length) = cli.length {
        config.max_duration_seconds = length;
    }
    if let Some(threshold) = cli.silence_threshold {
        config.silence_threshold = Some(threshold);
    }
    Ok(config)
}

fn print_output(output: &Output, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(output)?);
        return Ok(());
    }
    println!("DURATION={:.0}", output.duration);
    if let Some(fp) = &output.fingerprint {
        println!("FINGERPRINT={fp}");
    }
    if let Some(raw) = &output.raw {
        let items: Vec<String> = raw.iter().map(|v| v.to_string()).collect();
        println!("FINGERPRINT={}", items.join(","));
    }
    Ok(())
}

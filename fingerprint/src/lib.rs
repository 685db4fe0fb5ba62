//! Streaming acoustic fingerprinting of raw PCM audio.
//!
//! # Architecture
//!
//! Audio flows through three layers:
//!
//! 1. [`FingerprintSource`]: pull-style producer of interleaved PCM16 bytes
//!    plus the stream's sample rate and channel count
//! 2. [`Feeder`]: pulls 10 second chunks from the source and feeds them to a
//!    context, stopping at a duration cap (never below 120 seconds)
//! 3. [`Context`]: owns one [`FingerprintEngine`] and its explicit
//!    `Uninitialized -> Started -> Finished` state machine
//!
//! After the feeder finishes, the context yields either a compact string
//! fingerprint or the raw sequence of 32-bit sub-fingerprints, one per
//! [`Context::item_duration`] of audio.
//!
//! # Example
//!
//! ```no_run
//! use giztoy_fingerprint::{compute_fingerprint, Algorithm, Context, PcmSource};
//!
//! let file = std::fs::File::open("song.raw")?;
//! let mut source = PcmSource::new(file, 44100, 2);
//!
//! let mut ctx = Context::new(Algorithm::DEFAULT);
//! compute_fingerprint(&mut source, &mut ctx, 120)?;
//! println!("{}", ctx.fingerprint()?);
//! ctx.release();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Engines
//!
//! The default engine, [`ChromaprintEngine`], produces AcoustID-compatible
//! fingerprints. Engines whose transform shares process-wide state declare
//! [`FingerprintEngine::SHARED_TRANSFORM`]; contexts then hold a global lock
//! from `start` until `finish`, so only one such computation runs at a time.

mod algorithm;
mod chromaprint;
mod config;
mod context;
mod engine;
mod error;
mod feeder;
mod printer;
mod silence;
mod source;

#[cfg(test)]
mod testing;

pub use algorithm::Algorithm;
pub use chromaprint::{ChromaprintEngine, MAX_SILENCE_THRESHOLD, OPTION_SILENCE_THRESHOLD};
pub use config::PrinterConfig;
pub use context::{Context, MAX_CHANNELS, MAX_SAMPLE_RATE, State, StreamParams};
pub use engine::FingerprintEngine;
pub use error::{FingerprintError, Result};
pub use feeder::{
    CHUNK_SECONDS, FeedStats, Feeder, FeederConfig, MAX_CHUNK_SECONDS, MIN_DURATION_SECONDS,
    compute_fingerprint,
};
pub use printer::{Calculator, Printer};
pub use source::{FingerprintSource, PcmSource};

/// Returns the version of this fingerprint engine: the crate version, with
/// the transform backend as build metadata (`0.1.0+rusty-chromaprint`).
pub fn version() -> &'static str {
    concat!(env!("CARGO_PKG_VERSION"), "+rusty-chromaprint")
}

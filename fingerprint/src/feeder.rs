//! Bounded, chunked feeding of a source into a context.
//!
//! The feeder pulls fixed-duration chunks from a [`FingerprintSource`] and
//! feeds them to a [`Context`], so memory stays at one chunk regardless of
//! the stream length and work stops once the duration cap is reached.
//!
//! Duration accounting is nominal: every successful read counts as a full
//! chunk, even a short final one. The cap is therefore approximate to
//! within one chunk.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::context::Context;
use crate::engine::FingerprintEngine;
use crate::error::{FingerprintError, Result};
use crate::source::FingerprintSource;

/// Nominal duration of one chunk, in seconds.
pub const CHUNK_SECONDS: u32 = 10;

/// Smallest duration cap honored, in seconds. Shorter requests are raised
/// to this value; fingerprints of very short excerpts match poorly.
pub const MIN_DURATION_SECONDS: u32 = 120;

/// Longest chunk a feeder will buffer, in seconds.
pub const MAX_CHUNK_SECONDS: u32 = 60;

/// Upper bound on the chunk buffer, in bytes.
const MAX_CHUNK_BYTES: u64 = 256 << 20;

/// Configuration for [`Feeder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    /// Nominal chunk duration in seconds (default: 10, at most 60).
    pub chunk_seconds: u32,
    /// Floor applied to the requested duration cap (default: 120).
    pub min_duration_seconds: u32,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: CHUNK_SECONDS,
            min_duration_seconds: MIN_DURATION_SECONDS,
        }
    }
}

/// What a feeder run consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Number of chunks fed to the context.
    pub chunks: usize,
    /// Number of bytes fed to the context.
    pub bytes: u64,
    /// Nominal seconds counted against the cap.
    pub nominal_seconds: u32,
}

impl FeedStats {
    /// Returns the actual duration of audio fed for the given layout.
    pub fn duration(&self, sample_rate: u32, channels: u32) -> Duration {
        let bytes_per_second = 2 * u64::from(sample_rate) * u64::from(channels);
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.bytes as f64 / bytes_per_second as f64)
    }
}

/// Drives a [`Context`] from start to finish over a [`FingerprintSource`].
#[derive(Debug, Clone, Default)]
pub struct Feeder {
    config: FeederConfig,
}

impl Feeder {
    /// Creates a feeder with the given configuration.
    ///
    /// The chunk duration is clamped to `1..=MAX_CHUNK_SECONDS`.
    pub fn new(config: FeederConfig) -> Self {
        Self {
            config: FeederConfig {
                chunk_seconds: config.chunk_seconds.clamp(1, MAX_CHUNK_SECONDS),
                ..config
            },
        }
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> FeederConfig {
        self.config
    }

    /// Returns the chunk size in bytes for a PCM16 stream layout.
    ///
    /// Layouts whose chunk would exceed 256 MiB are rejected with
    /// [`FingerprintError::Start`].
    pub fn chunk_bytes(&self, sample_rate: u32, channels: u32) -> Result<usize> {
        let bytes = [u64::from(self.config.chunk_seconds), u64::from(sample_rate), u64::from(channels)]
            .into_iter()
            .try_fold(2u64, |acc, n| acc.checked_mul(n))
            .filter(|&bytes| bytes <= MAX_CHUNK_BYTES)
            .and_then(|bytes| usize::try_from(bytes).ok());
        bytes.ok_or_else(|| {
            FingerprintError::Start(format!(
                "{}s chunk of {sample_rate} Hz x {channels} channels exceeds {MAX_CHUNK_BYTES} bytes",
                self.config.chunk_seconds
            ))
        })
    }

    /// Starts `ctx` with the source's layout, feeds it up to
    /// `max_duration_seconds` of audio, and finishes it.
    ///
    /// Any error aborts the run; the context is left uninitialized and
    /// `finish` is not called.
    pub fn run<S, E>(
        &self,
        source: &mut S,
        ctx: &mut Context<E>,
        max_duration_seconds: u32,
    ) -> Result<FeedStats>
    where
        S: FingerprintSource + ?Sized,
        E: FingerprintEngine,
    {
        let max_seconds = max_duration_seconds.max(self.config.min_duration_seconds);
        let (sample_rate, channels) = (source.sample_rate(), source.channels());

        let chunk_bytes = self.chunk_bytes(sample_rate, channels)?;
        ctx.start(sample_rate, channels)?;

        let mut buf = vec![0u8; chunk_bytes];
        let mut stats = FeedStats::default();

        while stats.nominal_seconds < max_seconds {
            let n = match read_chunk(source, &mut buf) {
                Ok(n) => n,
                Err(e) => {
                    ctx.abort();
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }
            if let Err(e) = ctx.feed(&buf[..n]) {
                ctx.abort();
                return Err(e);
            }

            stats.chunks += 1;
            stats.bytes += n as u64;
            stats.nominal_seconds = stats.nominal_seconds.saturating_add(self.config.chunk_seconds);
            trace!(chunk = stats.chunks, bytes = n, seconds = stats.nominal_seconds, "chunk fed");
        }

        ctx.finish()?;
        debug!(
            chunks = stats.chunks,
            bytes = stats.bytes,
            max_seconds,
            "fingerprint feed complete"
        );
        Ok(stats)
    }
}

fn read_chunk<S: FingerprintSource + ?Sized>(source: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Runs a default-configured [`Feeder`]: 10 second chunks, at least 120
/// seconds analyzed when the source is that long.
pub fn compute_fingerprint<S, E>(
    source: &mut S,
    ctx: &mut Context<E>,
    max_duration_seconds: u32,
) -> Result<FeedStats>
where
    S: FingerprintSource + ?Sized,
    E: FingerprintEngine,
{
    Feeder::default().run(source, ctx, max_duration_seconds)
}

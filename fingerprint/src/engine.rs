use std::time::Duration;

use crate::error::Result;

/// The transform behind a [`Context`](crate::Context).
///
/// An engine turns interleaved PCM16 samples into a sequence of 32-bit
/// sub-fingerprints and knows how to compress that sequence into a compact
/// string. The context owns exactly one engine and drives it through
/// `start -> feed* -> finish`; it guarantees that `feed` only ever receives
/// whole interleaved frames.
///
/// # Thread Safety
///
/// Engines are driven from a single thread. An engine whose transform uses
/// a process-wide resource (for example a global FFT plan cache) must set
/// [`FingerprintEngine::SHARED_TRANSFORM`]; the context then serializes
/// every start..finish sequence in the process.
pub trait FingerprintEngine {
    /// True if the transform relies on state shared by all engines of the
    /// process.
    const SHARED_TRANSFORM: bool = false;

    /// Applies a named tunable.
    fn set_option(&mut self, name: &str, value: i32) -> Result<()>;

    /// Prepares for a new stream, discarding all previous analysis state.
    fn start(&mut self, sample_rate: u32, channels: u32) -> Result<()>;

    /// Consumes whole interleaved frames.
    fn feed(&mut self, samples: &[i16]) -> Result<()>;

    /// Flushes any buffered window and finalizes the fingerprint.
    fn finish(&mut self) -> Result<()>;

    /// Returns the sub-fingerprints computed so far.
    fn raw_fingerprint(&self) -> &[u32];

    /// Encodes the current fingerprint as a compact printable string.
    fn compact_fingerprint(&self) -> Result<String>;

    /// Returns the audio duration covered by one sub-fingerprint.
    fn item_duration(&self) -> Duration;

    /// Returns the sample rate the transform analyzes at internally.
    fn analysis_sample_rate(&self) -> u32;
}

//! Chromaprint-compatible engine backed by `rusty-chromaprint`.
//!
//! Compact fingerprints use the same compression and URL-safe base64
//! alphabet as `fpcalc`, so they can be submitted to AcoustID as is.

use std::time::Duration;

use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use rusty_chromaprint::{Configuration, FingerprintCompressor, Fingerprinter};

use crate::algorithm::Algorithm;
use crate::engine::FingerprintEngine;
use crate::error::{FingerprintError, Result};
use crate::silence::SilenceRemover;

/// Name of the option controlling leading-silence removal.
pub const OPTION_SILENCE_THRESHOLD: &str = "silence_threshold";

/// Largest accepted silence threshold (full scale of a PCM16 sample).
pub const MAX_SILENCE_THRESHOLD: i32 = 32767;

/// Rate all input is resampled to before analysis.
const ANALYSIS_SAMPLE_RATE: u32 = 11025;

/// [`FingerprintEngine`] implemented with the pure-Rust Chromaprint port.
///
/// Each engine plans its own FFT, so engines never share transform state
/// and can run on separate threads concurrently.
pub struct ChromaprintEngine {
    config: Configuration,
    printer: Fingerprinter,
    silence: SilenceRemover,
    channels: usize,
}

impl ChromaprintEngine {
    /// Creates an engine for the given algorithm.
    pub fn new(algorithm: Algorithm) -> Self {
        let config = algorithm.configuration();
        let printer = Fingerprinter::new(&config);
        Self {
            config,
            printer,
            silence: SilenceRemover::new(0),
            channels: 1,
        }
    }
}

impl FingerprintEngine for ChromaprintEngine {
    fn set_option(&mut self, name: &str, value: i32) -> Result<()> {
        if name != OPTION_SILENCE_THRESHOLD {
            return Err(FingerprintError::Configuration {
                name: name.to_string(),
                value,
                reason: "unknown option".into(),
            });
        }
        if !(0..=MAX_SILENCE_THRESHOLD).contains(&value) {
            return Err(FingerprintError::Configuration {
                name: name.to_string(),
                value,
                reason: format!("must be in 0..={MAX_SILENCE_THRESHOLD}"),
            });
        }
        self.silence.set_threshold(value as u32);
        Ok(())
    }

    fn start(&mut self, sample_rate: u32, channels: u32) -> Result<()> {
        // A fresh fingerprinter guarantees nothing leaks from a previous run.
        let mut printer = Fingerprinter::new(&self.config);
        printer
            .start(sample_rate, channels)
            .map_err(|e| FingerprintError::Start(format!("{e:?}")))?;
        self.printer = printer;
        self.silence.reset(sample_rate);
        self.channels = channels as usize;
        Ok(())
    }

    fn feed(&mut self, samples: &[i16]) -> Result<()> {
        let samples = self.silence.process(samples, self.channels);
        if !samples.is_empty() {
            self.printer.consume(samples);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.printer.finish();
        Ok(())
    }

    fn raw_fingerprint(&self) -> &[u32] {
        self.printer.fingerprint()
    }

    fn compact_fingerprint(&self) -> Result<String> {
        let raw = self.printer.fingerprint();
        if raw.is_empty() {
            return Err(FingerprintError::Extraction("no fingerprint items".into()));
        }
        let compressed = FingerprintCompressor::from(&self.config).compress(raw);
        Ok(BASE64_URL_SAFE_NO_PAD.encode(compressed))
    }

    fn item_duration(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.config.item_duration_in_seconds()))
    }

    fn analysis_sample_rate(&self) -> u32 {
        ANALYSIS_SAMPLE_RATE
    }
}

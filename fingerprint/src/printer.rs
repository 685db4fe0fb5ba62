//! One-call fingerprinting of a source.

use tracing::debug;

use crate::algorithm::Algorithm;
use crate::chromaprint::{ChromaprintEngine, OPTION_SILENCE_THRESHOLD};
use crate::config::PrinterConfig;
use crate::context::Context;
use crate::engine::FingerprintEngine;
use crate::error::Result;
use crate::feeder::{FeedStats, Feeder};
use crate::source::FingerprintSource;

/// Computes fingerprints of whole sources.
pub trait Calculator {
    /// Returns the compact fingerprint of up to `max_duration_seconds` of
    /// `source` (never less than the feeder's floor).
    fn fingerprint(
        &mut self,
        source: &mut dyn FingerprintSource,
        max_duration_seconds: u32,
    ) -> Result<String>;

    /// Returns the raw fingerprint of up to `max_duration_seconds` of
    /// `source` (never less than the feeder's floor).
    fn raw_fingerprint(
        &mut self,
        source: &mut dyn FingerprintSource,
        max_duration_seconds: u32,
    ) -> Result<Vec<i32>>;
}

/// A [`Calculator`] that reuses one [`Context`] for every source.
///
/// Each call restarts the context, so results never depend on earlier
/// sources.
pub struct Printer<E: FingerprintEngine = ChromaprintEngine> {
    context: Context<E>,
    feeder: Feeder,
    last: FeedStats,
}

impl Printer<ChromaprintEngine> {
    /// Creates a printer for the given algorithm with default feeding.
    pub fn new(algorithm: Algorithm) -> Self {
        Self::with_context(Context::new(algorithm), Feeder::default())
    }

    /// Creates a printer from configuration, applying its options.
    pub fn from_config(config: &PrinterConfig) -> Result<Self> {
        let mut context = Context::new(config.algorithm);
        if let Some(threshold) = config.silence_threshold {
            context.set_option(OPTION_SILENCE_THRESHOLD, threshold)?;
        }
        Ok(Self::with_context(context, Feeder::new(config.feeder)))
    }
}

impl<E: FingerprintEngine> Printer<E> {
    /// Creates a printer around an existing context.
    pub fn with_context(context: Context<E>, feeder: Feeder) -> Self {
        Self {
            context,
            feeder,
            last: FeedStats::default(),
        }
    }

    /// Returns the underlying context, e.g. to query item durations.
    pub fn context(&self) -> &Context<E> {
        &self.context
    }

    /// Returns what the most recent successful run consumed.
    pub fn last_stats(&self) -> FeedStats {
        self.last
    }

    /// Releases the printer and its context.
    pub fn close(self) {
        debug!("fingerprint printer closed");
        self.context.release();
    }

    fn prepare(&mut self, source: &mut dyn FingerprintSource, max_duration_seconds: u32) -> Result<()> {
        self.last = self.feeder.run(source, &mut self.context, max_duration_seconds)?;
        Ok(())
    }
}

impl<E: FingerprintEngine> Calculator for Printer<E> {
    fn fingerprint(
        &mut self,
        source: &mut dyn FingerprintSource,
        max_duration_seconds: u32,
    ) -> Result<String> {
        self.prepare(source, max_duration_seconds)?;
        self.context.fingerprint()
    }

    fn raw_fingerprint(
        &mut self,
        source: &mut dyn FingerprintSource,
        max_duration_seconds: u32,
    ) -> Result<Vec<i32>> {
        self.prepare(source, max_duration_seconds)?;
        self.context.raw_fingerprint()
    }
}

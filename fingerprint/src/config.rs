use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::feeder::{FeederConfig, MIN_DURATION_SECONDS};

/// Configuration for a [`Printer`](crate::Printer).
///
/// All fields have defaults, so an empty document deserializes to
/// `PrinterConfig::default()`:
///
/// ```yaml
/// algorithm: test2
/// max_duration_seconds: 120
/// silence_threshold: 50
/// feeder:
///   chunk_seconds: 10
///   min_duration_seconds: 120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Fingerprint algorithm (default: test2).
    pub algorithm: Algorithm,
    /// Seconds of audio to analyze at most (default: 120).
    pub max_duration_seconds: u32,
    /// Leading-silence threshold in 0..=32767; unset disables trimming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_threshold: Option<i32>,
    /// Chunking and duration floor of the streaming feeder.
    pub feeder: FeederConfig,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::DEFAULT,
            max_duration_seconds: MIN_DURATION_SECONDS,
            silence_threshold: None,
            feeder: FeederConfig::default(),
        }
    }
}

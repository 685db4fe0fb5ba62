//! Test helpers shared by the unit tests.

use std::time::Duration;

use crate::engine::FingerprintEngine;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Start(u32, u32),
    Feed(Vec<i16>),
    Finish,
}

/// Engine that records every call and produces one item per feed.
#[derive(Default)]
pub(crate) struct RecordingEngine {
    events: Vec<Event>,
    items: Vec<u32>,
}

impl RecordingEngine {
    pub fn events(&self) -> Vec<Event> {
        self.events.clone()
    }
}

impl FingerprintEngine for RecordingEngine {
    fn set_option(&mut self, _name: &str, _value: i32) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, sample_rate: u32, channels: u32) -> Result<()> {
        self.items.clear();
        self.events.push(Event::Start(sample_rate, channels));
        Ok(())
    }

    fn feed(&mut self, samples: &[i16]) -> Result<()> {
        self.items.push(samples.len() as u32);
        self.events.push(Event::Feed(samples.to_vec()));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.events.push(Event::Finish);
        Ok(())
    }

    fn raw_fingerprint(&self) -> &[u32] {
        &self.items
    }

    fn compact_fingerprint(&self) -> Result<String> {
        Ok(self.items.iter().map(|v| format!("{v:x}")).collect::<Vec<_>>().join("."))
    }

    fn item_duration(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn analysis_sample_rate(&self) -> u32 {
        8000
    }
}

/// Interleaved sine wave, identical on every channel.
pub(crate) fn sine(freq: f64, secs: f64, sample_rate: u32, channels: u32) -> Vec<i16> {
    let n = (secs * sample_rate as f64) as usize;
    let mut out = Vec::with_capacity(n * channels as usize);
    for i in 0..n {
        let t = i as f64 / sample_rate as f64;
        let s = (12_000.0 * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16;
        for _ in 0..channels {
            out.push(s);
        }
    }
    out
}

/// Encodes samples as PCM16 little-endian bytes.
pub(crate) fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

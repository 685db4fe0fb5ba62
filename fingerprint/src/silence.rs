//! Leading-silence removal.
//!
//! Loudness is the magnitude of the mono downmix, averaged over a window
//! of about 5 ms (55 frames at the 11025 Hz analysis rate, scaled to the
//! input rate), so opposite-phase channels cancel out.

/// Window length in frames at the analysis rate.
const WINDOW: usize = 55;

/// Rate [`WINDOW`] is expressed at.
const WINDOW_RATE: usize = 11025;

/// Drops audio from the start of a stream until its moving average
/// amplitude rises above a threshold. Once audio has been let through,
/// everything after it passes untouched.
pub(crate) struct SilenceRemover {
    threshold: u32,
    window: Vec<u32>,
    pos: usize,
    filled: usize,
    sum: u64,
    started: bool,
}

impl SilenceRemover {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            window: vec![0; WINDOW],
            pos: 0,
            filled: 0,
            sum: 0,
            started: false,
        }
    }

    /// Changes the threshold without touching the detection state, so a
    /// stream that already passed its leading silence keeps passing.
    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold;
    }

    /// Clears the window and sizes it for `sample_rate`; the next stream
    /// starts silent again.
    pub fn reset(&mut self, sample_rate: u32) {
        let len = (WINDOW * sample_rate as usize + WINDOW_RATE / 2) / WINDOW_RATE;
        self.window = vec![0; len.max(1)];
        self.pos = 0;
        self.filled = 0;
        self.sum = 0;
        self.started = false;
    }

    /// Returns the part of `samples` that should be analyzed.
    ///
    /// `samples` must hold whole interleaved frames of `channels` samples.
    pub fn process<'a>(&mut self, samples: &'a [i16], channels: usize) -> &'a [i16] {
        if self.started || self.threshold == 0 {
            self.started = true;
            return samples;
        }

        for (i, frame) in samples.chunks_exact(channels).enumerate() {
            let mix = frame.iter().map(|&s| i64::from(s)).sum::<i64>() / channels as i64;
            let level = mix.unsigned_abs() as u32;
            self.push(level);
            if self.average() > self.threshold {
                self.started = true;
                return &samples[i * channels..];
            }
        }
        &[]
    }

    fn push(&mut self, level: u32) {
        self.sum -= u64::from(self.window[self.pos]);
        self.window[self.pos] = level;
        self.sum += u64::from(level);
        self.pos = (self.pos + 1) % self.window.len();
        if self.filled < self.window.len() {
            self.filled += 1;
        }
    }

    fn average(&self) -> u32 {
        if self.filled == 0 {
            return 0;
        }
        (self.sum / self.filled as u64) as u32
    }
}

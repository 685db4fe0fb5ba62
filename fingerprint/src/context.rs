//! Stateful fingerprint computation.
//!
//! A [`Context`] owns one engine and walks it through
//! `start -> feed* -> finish`. The state machine is explicit:
//!
//! ```text
//! Uninitialized --start--> Started --feed--> Started --finish--> Finished
//!                             ^                                      |
//!                             +----------------start-----------------+
//! ```
//!
//! Fingerprints can only be extracted in `Finished`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, const_mutex};
use tracing::{debug, trace, warn};

use crate::algorithm::Algorithm;
use crate::chromaprint::ChromaprintEngine;
use crate::engine::FingerprintEngine;
use crate::error::{FingerprintError, Result};

/// Serializes start..finish sequences of engines that share a process-wide
/// transform resource.
static TRANSFORM_LOCK: Mutex<()> = const_mutex(());

/// Highest sample rate accepted by [`Context::start`], in Hz.
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Highest interleaved channel count accepted by [`Context::start`].
pub const MAX_CHANNELS: u32 = 32;

/// Lifecycle state of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No stream has been started, or the last one was aborted.
    Uninitialized,
    /// Accepting audio.
    Started,
    /// Finalized; fingerprints are available.
    Finished,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// PCM layout of the stream being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u32,
}

impl StreamParams {
    /// Bytes in one interleaved PCM16 frame.
    pub fn frame_bytes(&self) -> usize {
        2 * self.channels as usize
    }
}

/// One in-progress fingerprint computation.
///
/// The context exclusively owns its engine. It is released either with
/// [`Context::release`] or by dropping it; both consume the context, so a
/// released context cannot be used again.
///
/// # Example
///
/// ```no_run
/// use giztoy_fingerprint::{Algorithm, Context};
///
/// let mut ctx = Context::new(Algorithm::DEFAULT);
/// ctx.start(44100, 2)?;
/// ctx.feed(&[0u8; 176_400])?;
/// ctx.finish()?;
/// let raw = ctx.raw_fingerprint()?;
/// ctx.release();
/// # Ok::<(), giztoy_fingerprint::FingerprintError>(())
/// ```
pub struct Context<E: FingerprintEngine = ChromaprintEngine> {
    algorithm: Algorithm,
    engine: E,
    options: BTreeMap<String, i32>,
    state: State,
    params: Option<StreamParams>,
    /// Trailing bytes that did not complete a frame in the last feed.
    pending: Vec<u8>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl Context<ChromaprintEngine> {
    /// Creates a context backed by the Chromaprint engine.
    pub fn new(algorithm: Algorithm) -> Self {
        Self::with_engine(algorithm, ChromaprintEngine::new(algorithm))
    }
}

impl<E: FingerprintEngine> Context<E> {
    /// Creates a context around a caller-supplied engine.
    pub fn with_engine(algorithm: Algorithm, engine: E) -> Self {
        Self {
            algorithm,
            engine,
            options: BTreeMap::new(),
            state: State::Uninitialized,
            params: None,
            pending: Vec::new(),
            guard: None,
        }
    }

    /// Returns the algorithm selected at creation.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the stream parameters of the current or last run.
    pub fn stream_params(&self) -> Option<StreamParams> {
        self.params
    }

    /// Returns the options accepted so far.
    pub fn options(&self) -> &BTreeMap<String, i32> {
        &self.options
    }

    /// Sets an engine option such as `silence_threshold`.
    ///
    /// Options persist across restarts.
    pub fn set_option(&mut self, name: &str, value: i32) -> Result<()> {
        self.engine.set_option(name, value)?;
        self.options.insert(name.to_string(), value);
        debug!(option = name, value, "fingerprint option set");
        Ok(())
    }

    /// Starts, or restarts, the analysis of a stream.
    ///
    /// Everything accumulated by a previous run is discarded.
    pub fn start(&mut self, sample_rate: u32, channels: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(FingerprintError::Start("sample rate must be positive".into()));
        }
        if channels == 0 {
            return Err(FingerprintError::Start("channel count must be positive".into()));
        }
        if sample_rate > MAX_SAMPLE_RATE {
            return Err(FingerprintError::Start(format!(
                "sample rate {sample_rate} exceeds {MAX_SAMPLE_RATE}"
            )));
        }
        if channels > MAX_CHANNELS {
            return Err(FingerprintError::Start(format!(
                "channel count {channels} exceeds {MAX_CHANNELS}"
            )));
        }

        let restart = self.state != State::Uninitialized;
        if E::SHARED_TRANSFORM && self.guard.is_none() {
            self.guard = Some(TRANSFORM_LOCK.lock());
        }

        self.pending.clear();
        if let Err(e) = self.engine.start(sample_rate, channels) {
            self.reset();
            return Err(e);
        }

        self.params = Some(StreamParams {
            sample_rate,
            channels,
        });
        self.state = State::Started;
        debug!(
            algorithm = %self.algorithm,
            sample_rate,
            channels,
            restart,
            "fingerprint stream started"
        );
        Ok(())
    }

    /// Appends interleaved PCM16 little-endian bytes to the analysis.
    ///
    /// Bytes that do not complete a frame are kept and prefixed to the next
    /// feed, so splitting a stream differently never changes the result.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        let params = match (self.state, self.params) {
            (State::Started, Some(params)) => params,
            (state, _) => {
                return Err(FingerprintError::Feed(format!("context is {state}, not started")));
            }
        };
        if data.is_empty() {
            return Err(FingerprintError::Feed("empty chunk".into()));
        }

        let frame_bytes = params.frame_bytes();
        let samples = if self.pending.is_empty() {
            let whole = data.len() - data.len() % frame_bytes;
            self.pending.extend_from_slice(&data[whole..]);
            decode_samples(&data[..whole])
        } else {
            self.pending.extend_from_slice(data);
            let whole = self.pending.len() - self.pending.len() % frame_bytes;
            let samples = decode_samples(&self.pending[..whole]);
            self.pending.drain(..whole);
            samples
        };

        trace!(bytes = data.len(), samples = samples.len(), pending = self.pending.len(), "feed");
        if samples.is_empty() {
            return Ok(());
        }
        self.engine.feed(&samples)
    }

    /// Flushes buffered audio and finalizes the fingerprint.
    ///
    /// Ends the start..finish sequence: on success or failure the
    /// process-wide transform lock, if held, is released.
    pub fn finish(&mut self) -> Result<()> {
        if self.state != State::Started {
            return Err(FingerprintError::Finish(format!(
                "context is {}, not started",
                self.state
            )));
        }
        if !self.pending.is_empty() {
            warn!(bytes = self.pending.len(), "dropping incomplete trailing frame");
            self.pending.clear();
        }

        let result = self.engine.finish();
        self.guard = None;
        match result {
            Ok(()) => {
                self.state = State::Finished;
                debug!(items = self.engine.raw_fingerprint().len(), "fingerprint stream finished");
                Ok(())
            }
            Err(e) => {
                self.state = State::Uninitialized;
                Err(e)
            }
        }
    }

    /// Abandons the current run without finalizing it.
    ///
    /// The context returns to `Uninitialized` and must be started again.
    pub fn abort(&mut self) {
        if self.state == State::Started {
            debug!("fingerprint stream aborted");
        }
        self.reset();
    }

    /// Returns the compact fingerprint of the finished stream.
    pub fn fingerprint(&self) -> Result<String> {
        self.ensure_finished()?;
        self.engine.compact_fingerprint()
    }

    /// Returns one signed 32-bit sub-fingerprint per item of audio.
    ///
    /// A finished stream that was too short to produce any item yields an
    /// empty vector.
    pub fn raw_fingerprint(&self) -> Result<Vec<i32>> {
        self.ensure_finished()?;
        Ok(self
            .engine
            .raw_fingerprint()
            .iter()
            .map(|&v| v as i32)
            .collect())
    }

    /// Returns the duration of audio covered by one raw fingerprint item.
    pub fn item_duration(&self) -> Duration {
        self.engine.item_duration()
    }

    /// Returns the number of input samples (per channel) covered by one raw
    /// fingerprint item, at the sample rate passed to [`Context::start`].
    ///
    /// Before any stream is started the engine's analysis rate is used.
    pub fn item_duration_samples(&self) -> usize {
        let rate = self
            .params
            .map(|p| p.sample_rate)
            .unwrap_or_else(|| self.engine.analysis_sample_rate());
        (self.item_duration().as_secs_f64() * f64::from(rate)).round() as usize
    }

    /// Releases the context and its engine.
    pub fn release(self) {
        debug!(algorithm = %self.algorithm, state = %self.state, "fingerprint context released");
    }

    /// Returns a reference to the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn ensure_finished(&self) -> Result<()> {
        if self.state != State::Finished {
            return Err(FingerprintError::Extraction(format!(
                "context is {}, not finished",
                self.state
            )));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.state = State::Uninitialized;
        self.guard = None;
    }
}

fn decode_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, RecordingEngine, pcm_bytes, sine};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn new_context_is_uninitialized() {
        let ctx = Context::new(Algorithm::Test3);
        assert_eq!(ctx.state(), State::Uninitialized);
        assert_eq!(ctx.algorithm(), Algorithm::Test3);
        assert!(ctx.stream_params().is_none());
    }

    #[test]
    fn feed_before_start_fails() {
        let mut ctx = Context::new(Algorithm::DEFAULT);
        let err = ctx.feed(&[0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, FingerprintError::Feed(_)));
    }

    #[test]
    fn feed_after_finish_fails() {
        let mut ctx = Context::with_engine(Algorithm::DEFAULT, RecordingEngine::default());
        ctx.start(8000, 1).unwrap();
        ctx.finish().unwrap();
        assert!(matches!(ctx.feed(&[1, 0]), Err(FingerprintError::Feed(_))));
    }

    #[test]
    fn empty_chunk_fails() {
        let mut ctx = Context::with_engine(Algorithm::DEFAULT, RecordingEngine::default());
        ctx.start(8000, 1).unwrap();
        assert!(matches!(ctx.feed(&[]), Err(FingerprintError::Feed(_))));
    }

    #[test]
    fn start_rejects_zero_params() {
        let mut ctx = Context::new(Algorithm::DEFAULT);
        assert!(matches!(ctx.start(0, 1), Err(FingerprintError::Start(_))));
        assert!(matches!(ctx.start(44100, 0), Err(FingerprintError::Start(_))));
        assert_eq!(ctx.state(), State::Uninitialized);
    }

    #[test]
    fn start_rejects_oversized_params() {
        let mut ctx = Context::with_engine(Algorithm::DEFAULT, RecordingEngine::default());
        assert!(matches!(
            ctx.start(MAX_SAMPLE_RATE + 1, 1),
            Err(FingerprintError::Start(_))
        ));
        assert!(matches!(
            ctx.start(44100, MAX_CHANNELS + 1),
            Err(FingerprintError::Start(_))
        ));
        assert!(matches!(ctx.start(u32::MAX, u32::MAX), Err(FingerprintError::Start(_))));
        assert_eq!(ctx.state(), State::Uninitialized);

        assert!(ctx.engine().events().is_empty());

        ctx.start(MAX_SAMPLE_RATE, MAX_CHANNELS).unwrap();
        assert_eq!(ctx.state(), State::Started);
    }

    #[test]
    fn finish_before_start_fails() {
        let mut ctx = Context::new(Algorithm::DEFAULT);
        assert!(matches!(ctx.finish(), Err(FingerprintError::Finish(_))));
    }

    #[test]
    fn extraction_before_finish_fails() {
        let mut ctx = Context::new(Algorithm::DEFAULT);
        assert!(matches!(ctx.raw_fingerprint(), Err(FingerprintError::Extraction(_))));
        assert!(matches!(ctx.fingerprint(), Err(FingerprintError::Extraction(_))));

        ctx.start(44100, 1).unwrap();
        assert!(matches!(ctx.raw_fingerprint(), Err(FingerprintError::Extraction(_))));
    }

    #[test]
    fn start_then_finish_without_audio() {
        for (rate, channels) in [(8000, 1), (11025, 1), (44100, 2), (48000, 6)] {
            let mut ctx = Context::new(Algorithm::DEFAULT);
            ctx.start(rate, channels).unwrap();
            ctx.finish().unwrap();
            assert_eq!(ctx.state(), State::Finished);
            assert_eq!(ctx.raw_fingerprint().unwrap(), Vec::<i32>::new());
            assert!(matches!(ctx.fingerprint(), Err(FingerprintError::Extraction(_))));
        }
    }

    #[test]
    fn partial_frames_are_reassembled() {
        let mut ctx = Context::with_engine(Algorithm::DEFAULT, RecordingEngine::default());
        ctx.start(8000, 2).unwrap();

        // Frames are 4 bytes; split 3 frames as 1 + 6 + 5.
        let bytes = pcm_bytes(&[1, -1, 2, -2, 3, -3]);
        ctx.feed(&bytes[..1]).unwrap();
        ctx.feed(&bytes[1..7]).unwrap();
        ctx.feed(&bytes[7..]).unwrap();
        ctx.finish().unwrap();

        let fed: Vec<i16> = ctx
            .engine()
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Feed(s) => Some(s),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(fed, vec![1, -1, 2, -2, 3, -3]);
        for event in ctx.engine().events() {
            if let Event::Feed(s) = event {
                assert_eq!(s.len() % 2, 0, "engine must only see whole frames");
            }
        }
    }

    #[test]
    fn dangling_bytes_dropped_at_finish() {
        let mut ctx = Context::with_engine(Algorithm::DEFAULT, RecordingEngine::default());
        ctx.start(8000, 1).unwrap();
        ctx.feed(&[5, 0, 7]).unwrap();
        ctx.finish().unwrap();
        assert_eq!(
            ctx.engine().events(),
            vec![Event::Start(8000, 1), Event::Feed(vec![5]), Event::Finish]
        );
    }

    #[test]
    fn restart_discards_pending_bytes() {
        let mut ctx = Context::with_engine(Algorithm::DEFAULT, RecordingEngine::default());
        ctx.start(8000, 1).unwrap();
        ctx.feed(&[9]).unwrap();
        ctx.start(8000, 1).unwrap();
        ctx.feed(&[1, 0]).unwrap();
        let events = ctx.engine().events();
        assert_eq!(events.last(), Some(&Event::Feed(vec![1])));
    }

    #[test]
    fn chunking_does_not_change_output() {
        let audio = pcm_bytes(&sine(440.0, 6.0, 22050, 2));

        let mut whole = Context::new(Algorithm::DEFAULT);
        whole.start(22050, 2).unwrap();
        whole.feed(&audio).unwrap();
        whole.finish().unwrap();

        let mut split = Context::new(Algorithm::DEFAULT);
        split.start(22050, 2).unwrap();
        for chunk in audio.chunks(1001) {
            split.feed(chunk).unwrap();
        }
        split.finish().unwrap();

        let raw = whole.raw_fingerprint().unwrap();
        assert!(!raw.is_empty());
        assert_eq!(raw, split.raw_fingerprint().unwrap());
        assert_eq!(whole.fingerprint().unwrap(), split.fingerprint().unwrap());
    }

    #[test]
    fn restart_forgets_previous_run() {
        let first = pcm_bytes(&sine(220.0, 5.0, 11025, 1));
        let second = pcm_bytes(&sine(880.0, 5.0, 11025, 1));

        let mut fresh = Context::new(Algorithm::DEFAULT);
        fresh.start(11025, 1).unwrap();
        fresh.feed(&second).unwrap();
        fresh.finish().unwrap();

        let mut reused = Context::new(Algorithm::DEFAULT);
        reused.start(11025, 1).unwrap();
        reused.feed(&first).unwrap();
        reused.finish().unwrap();
        reused.start(11025, 1).unwrap();
        reused.feed(&second).unwrap();
        reused.finish().unwrap();

        assert_eq!(fresh.raw_fingerprint().unwrap(), reused.raw_fingerprint().unwrap());
        assert_eq!(fresh.fingerprint().unwrap(), reused.fingerprint().unwrap());
    }

    #[test]
    fn item_duration_follows_start_rate() {
        let mut ctx = Context::new(Algorithm::DEFAULT);
        assert_eq!(ctx.item_duration_samples(), 1365);
        ctx.start(44100, 1).unwrap();
        assert_eq!(ctx.item_duration_samples(), 5460);
        assert_eq!(ctx.item_duration().as_millis(), 123);
    }

    #[test]
    fn options_are_recorded() {
        let mut ctx = Context::new(Algorithm::DEFAULT);
        ctx.set_option("silence_threshold", 50).unwrap();
        assert!(matches!(
            ctx.set_option("bogus", 1),
            Err(FingerprintError::Configuration { .. })
        ));
        assert_eq!(ctx.options().get("silence_threshold"), Some(&50));
        assert_eq!(ctx.options().len(), 1);
    }

    #[test]
    fn silence_threshold_trims_leading_silence() {
        let mut tone = vec![0i16; 11025 * 2];
        tone.extend(sine(440.0, 5.0, 11025, 1));
        let padded = pcm_bytes(&tone);
        let bare = pcm_bytes(&sine(440.0, 5.0, 11025, 1));

        let run = |bytes: &[u8], threshold: Option<i32>| {
            let mut ctx = Context::new(Algorithm::DEFAULT);
            if let Some(t) = threshold {
                ctx.set_option("silence_threshold", t).unwrap();
            }
            ctx.start(11025, 1).unwrap();
            ctx.feed(bytes).unwrap();
            ctx.finish().unwrap();
            ctx.raw_fingerprint().unwrap()
        };

        let trimmed = run(&padded, Some(100));
        let untrimmed = run(&padded, None);
        assert!(trimmed.len() < untrimmed.len());
        assert_eq!(trimmed.len(), run(&bare, None).len());
    }

    #[test]
    fn abort_returns_to_uninitialized() {
        let mut ctx = Context::with_engine(Algorithm::DEFAULT, RecordingEngine::default());
        ctx.start(8000, 1).unwrap();
        ctx.feed(&[1]).unwrap();
        ctx.abort();
        assert_eq!(ctx.state(), State::Uninitialized);
        assert!(matches!(ctx.feed(&[1, 0]), Err(FingerprintError::Feed(_))));
    }

    struct OverlapEngine {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl FingerprintEngine for OverlapEngine {
        const SHARED_TRANSFORM: bool = true;

        fn set_option(&mut self, _name: &str, _value: i32) -> Result<()> {
            Ok(())
        }

        fn start(&mut self, _sample_rate: u32, _channels: u32) -> Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            Ok(())
        }

        fn feed(&mut self, _samples: &[i16]) -> Result<()> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        fn raw_fingerprint(&self) -> &[u32] {
            &[]
        }

        fn compact_fingerprint(&self) -> Result<String> {
            Ok(String::new())
        }

        fn item_duration(&self) -> Duration {
            Duration::from_millis(100)
        }

        fn analysis_sample_rate(&self) -> u32 {
            8000
        }
    }

    #[test]
    fn shared_transform_runs_are_exclusive() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let active = active.clone();
                let peak = peak.clone();
                std::thread::spawn(move || {
                    let mut ctx = Context::with_engine(
                        Algorithm::DEFAULT,
                        OverlapEngine { active, peak },
                    );
                    for _ in 0..5 {
                        ctx.start(8000, 1).unwrap();
                        for _ in 0..3 {
                            ctx.feed(&[0, 0]).unwrap();
                        }
                        ctx.finish().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_started_context_releases_lock() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        {
            let mut ctx = Context::with_engine(
                Algorithm::DEFAULT,
                OverlapEngine { active: active.clone(), peak: peak.clone() },
            );
            ctx.start(8000, 1).unwrap();
        }
        // Would deadlock if the dropped context still held the lock.
        let mut ctx = Context::with_engine(Algorithm::DEFAULT, OverlapEngine { active, peak });
        ctx.start(8000, 1).unwrap();
        ctx.finish().unwrap();
        ctx.release();
    }
}

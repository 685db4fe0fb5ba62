//! Audio sources for the streaming feeder.

use std::io::{self, Read};

/// Pull-style producer of raw PCM16 audio.
///
/// Successive reads return successive bytes of one interleaved PCM16
/// little-endian stream. The sample rate and channel count are fixed for
/// the lifetime of a fingerprinting run.
pub trait FingerprintSource {
    /// Reads up to `buf.len()` bytes. Returns `Ok(0)` at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels.
    fn channels(&self) -> u32;
}

impl<S: FingerprintSource + ?Sized> FingerprintSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channels(&self) -> u32 {
        (**self).channels()
    }
}

/// Adapts any [`io::Read`] of raw PCM16 into a [`FingerprintSource`].
///
/// Each read keeps pulling from the inner reader until the buffer is full
/// or the reader is exhausted, so pipes and sockets that return short
/// reads still deliver whole chunks.
pub struct PcmSource<R: Read> {
    inner: R,
    sample_rate: u32,
    channels: u32,
    pending_err: Option<io::Error>,
}

impl<R: Read> PcmSource<R> {
    /// Creates a source reading interleaved PCM16 from `inner`.
    pub fn new(inner: R, sample_rate: u32, channels: u32) -> Self {
        Self {
            inner,
            sample_rate,
            channels,
            pending_err: None,
        }
    }
}

impl<R: Read> FingerprintSource for PcmSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(e) = self.pending_err.take() {
            return Err(e);
        }
        let mut total = 0;
        while total < buf.len() {
            match self.inner.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Hand over what was read; the error is returned by the next call.
                    if total > 0 {
                        self.pending_err = Some(e);
                        break;
                    }
                    return Err(e);
                }
            }
        }
        Ok(total)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u32 {
        self.channels
    }
}

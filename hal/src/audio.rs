//! # Audio HAL
//!
//! This module defines the host PCM sink abstraction.
//!
//! A sink is opened in one of two modes:
//! - **Queued**: the caller appends PCM with [`AudioBackend::queue_audio`] and
//!   the host drains it at the device rate
//! - **Stream**: the host requests PCM one period at a time; the platform layer
//!   answers with [`AudioBackend::fill_stream`]
//!
//! Exactly one sink exists per device handle.

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// PCM sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    U8,
    #[default]
    S16,
    S24,
    S32,
}

impl SampleFormat {
    /// Bytes per single-channel sample
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 => 4,
        }
    }
}

/// Sink parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    pub channels: u16,
    pub sample_rate: u32,
    /// Samples per channel in one host period
    pub frame_samples: u32,
    pub format: SampleFormat,
}

impl AudioSpec {
    /// Creates a 16-bit spec
    pub fn new(channels: u16, sample_rate: u32, frame_samples: u32) -> Self {
        Self {
            channels,
            sample_rate,
            frame_samples,
            format: SampleFormat::S16,
        }
    }

    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    /// Bytes in one interleaved sample frame (all channels)
    pub const fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    /// Bytes in one host period
    pub const fn period_bytes(&self) -> usize {
        self.frame_samples as usize * self.bytes_per_frame()
    }

    /// Duration of one host period in milliseconds, rounded down
    pub fn period_ms(&self) -> u32 {
        if self.sample_rate == 0 {
            return 0;
        }
        ((self.frame_samples as u64 * 1000) / self.sample_rate as u64) as u32
    }
}

/// Host sink handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SinkId(pub u32);

/// Host audio subsystem
pub trait AudioBackend {
    /// Opens a queued sink, paused
    ///
    /// With `exact` set the host must not convert; it fails with
    /// [`HostError::FormatUnavailable`] instead. Returns the spec obtained.
    fn open_sink(&mut self, spec: &AudioSpec, exact: bool) -> Result<(SinkId, AudioSpec), HostError>;

    /// Opens a stream sink, paused
    ///
    /// The host may change `frame_samples`; the obtained spec is returned.
    fn open_stream(&mut self, spec: &AudioSpec, exact: bool)
        -> Result<(SinkId, AudioSpec), HostError>;

    /// Appends PCM to a queued sink
    fn queue_audio(&mut self, sink: SinkId, pcm: &[u8]) -> Result<(), HostError>;

    /// Bytes queued on a sink and not yet played
    fn queued_bytes(&self, sink: SinkId) -> Result<usize, HostError>;

    /// Supplies one period of PCM to a stream sink
    fn fill_stream(&mut self, sink: SinkId, pcm: &[u8]) -> Result<(), HostError>;

    fn set_paused(&mut self, sink: SinkId, paused: bool) -> Result<(), HostError>;

    fn close_sink(&mut self, sink: SinkId) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_sizes() {
        assert_eq!(SampleFormat::U8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::S24.bytes_per_sample(), 3);
        assert_eq!(SampleFormat::S32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::default(), SampleFormat::S16);
    }

    #[test]
    fn test_spec_sizes() {
        let spec = AudioSpec::new(2, 48_000, 1024);
        assert_eq!(spec.bytes_per_frame(), 4);
        assert_eq!(spec.period_bytes(), 4096);
        assert_eq!(spec.period_ms(), 21);

        let mono = AudioSpec::new(1, 8_000, 80).with_format(SampleFormat::U8);
        assert_eq!(mono.period_bytes(), 80);
        assert_eq!(mono.period_ms(), 10);
    }

    #[test]
    fn test_zero_rate_period() {
        let spec = AudioSpec::new(1, 0, 64);
        assert_eq!(spec.period_ms(), 0);
    }
}

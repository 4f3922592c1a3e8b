//! Decoded sound data
//!
//! A `Sound` is the immutable result of decoding: its format descriptor and
//! the multi-channel frame sequence. Playback state lives elsewhere
//! (`playback::Playback`) so one `Sound` can be shared between playbacks.

use std::time::Duration;

use super::decoder::{DecodeError, DecodeResult};
use super::formats::SoundFormat;

/// Ordered sequence of frames, stored interleaved.
///
/// For stereo the samples are `[L, R, L, R, ...]`. Every frame holds exactly
/// `channels` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTimeline {
    channels: u16,
    samples: Vec<f32>,
}

impl SampleTimeline {
    /// Create an empty timeline
    pub fn new(channels: u16) -> Self {
        Self {
            channels,
            samples: Vec::new(),
        }
    }

    /// Create an empty timeline with room for `frames` frames
    pub fn with_capacity(channels: u16, frames: usize) -> Self {
        Self {
            channels,
            samples: Vec::with_capacity(frames * channels as usize),
        }
    }

    /// Wrap already-interleaved samples.
    ///
    /// Fails when `channels` is zero or the sample count is not a whole
    /// number of frames.
    pub fn from_interleaved(channels: u16, samples: Vec<f32>) -> DecodeResult<Self> {
        if channels == 0 {
            return Err(DecodeError::InvalidFormat("channel count is zero".to_string()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(DecodeError::InvalidFormat(format!(
                "{} samples is not a whole number of {}-channel frames",
                samples.len(),
                channels
            )));
        }
        Ok(Self { channels, samples })
    }

    /// Append one frame; `frame.len()` must equal the channel count
    pub(crate) fn push_frame(&mut self, frame: &[f32]) {
        debug_assert_eq!(frame.len(), self.channels as usize);
        self.samples.extend_from_slice(frame);
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame at `index`, or `None` past the end
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let width = self.channels as usize;
        let start = index.checked_mul(width)?;
        self.samples.get(start..start + width)
    }

    /// Iterate frames in order
    pub fn frames(&self) -> std::slice::ChunksExact<'_, f32> {
        self.samples.chunks_exact(self.channels.max(1) as usize)
    }

    /// Raw interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// A fully decoded sound, ready for playback
#[derive(Debug, Clone)]
pub struct Sound {
    format: SoundFormat,
    timeline: SampleTimeline,
}

impl Sound {
    pub(crate) fn new(format: SoundFormat, timeline: SampleTimeline) -> Self {
        Self { format, timeline }
    }

    /// Build a sound from interleaved samples, taking rate and channel
    /// count from `format`.
    pub fn from_interleaved(format: SoundFormat, samples: Vec<f32>) -> DecodeResult<Self> {
        let timeline = SampleTimeline::from_interleaved(format.channels, samples)?;
        Ok(Self { format, timeline })
    }

    /// Format descriptor parsed from the file
    pub fn format(&self) -> &SoundFormat {
        &self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.timeline.channels()
    }

    pub fn frame_count(&self) -> usize {
        self.timeline.len()
    }

    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        self.timeline.frame(index)
    }

    pub fn frames(&self) -> std::slice::ChunksExact<'_, f32> {
        self.timeline.frames()
    }

    pub fn timeline(&self) -> &SampleTimeline {
        &self.timeline
    }

    /// Playing time at the native sample rate
    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.format.sample_rate as f64)
    }
}

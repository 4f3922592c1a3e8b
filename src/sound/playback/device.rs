//! Output device seam
//!
//! The playback engine never talks to an audio API directly. It asks an
//! `AudioDevice` for a stream and hands it a fill callback; the device then
//! pulls frames at its own cadence from its own thread.

use thiserror::Error;

/// Errors reported by an output device or one of its streams
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no output device available")]
    NoDevice,

    #[error("failed to open output stream: {0}")]
    Open(String),

    #[error("failed to start output stream: {0}")]
    Start(String),

    #[error("failed to stop output stream: {0}")]
    Stop(String),

    #[error("failed to close output stream: {0}")]
    Close(String),

    #[error("unsupported stream configuration: {0}")]
    UnsupportedConfig(String),
}

/// Layout requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Returned by a fill callback after each invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// Keep invoking the callback
    Continue,
    /// Stop the stream once this invocation has been consumed
    Complete,
}

/// Fill callback handed to `AudioDevice::open_stream`.
///
/// Receives an interleaved buffer of `frames * channels` samples to fill
/// completely. The device never invokes one callback concurrently with
/// itself.
pub type FillCallback = Box<dyn FnMut(&mut [f32]) -> FillStatus + Send + 'static>;

/// An opened output stream
pub trait OutputStream: Send {
    /// Begin (or resume) pulling frames through the fill callback
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Stop pulling frames; the stream can be started again
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Release the stream.
    ///
    /// On return the fill callback is no longer running and will not be
    /// invoked again.
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// A source of output streams
pub trait AudioDevice: Send {
    /// Device name for diagnostics
    fn name(&self) -> String;

    /// Open a stream with the given layout, driven by `callback`.
    ///
    /// The stream is created stopped.
    fn open_stream(
        &self,
        config: StreamConfig,
        callback: FillCallback,
    ) -> Result<Box<dyn OutputStream>, DeviceError>;
}

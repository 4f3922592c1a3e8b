//! Caller-driven output device
//!
//! `ManualDevice` never touches audio hardware. Each opened stream is pumped
//! by the caller through a `ManualStreamHandle`, which invokes the fill
//! callback on the calling thread. Used for offline rendering and tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::device::{
    AudioDevice, DeviceError, FillCallback, FillStatus, OutputStream, StreamConfig,
};

struct StreamSlot {
    config: StreamConfig,
    fail_start: Option<String>,
    /// Taken on close; locked for every invocation
    callback: Mutex<Option<FillCallback>>,
    running: AtomicBool,
    closed: AtomicBool,
    invocations: AtomicUsize,
}

#[derive(Default)]
struct DeviceInner {
    streams: Vec<Arc<StreamSlot>>,
    fail_open: Option<String>,
    fail_start: Option<String>,
}

/// Output device pumped by the caller
#[derive(Clone, Default)]
pub struct ManualDevice {
    inner: Arc<Mutex<DeviceInner>>,
}

impl ManualDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose `open_stream` always fails with `DeviceError::Open`
    pub fn failing(reason: impl Into<String>) -> Self {
        let device = Self::new();
        device.inner.lock().fail_open = Some(reason.into());
        device
    }

    /// A device whose streams open but fail every `start` with
    /// `DeviceError::Start`
    pub fn failing_start(reason: impl Into<String>) -> Self {
        let device = Self::new();
        device.inner.lock().fail_start = Some(reason.into());
        device
    }

    /// Handles to every stream opened so far, oldest first
    pub fn streams(&self) -> Vec<ManualStreamHandle> {
        self.inner
            .lock()
            .streams
            .iter()
            .map(|slot| ManualStreamHandle {
                slot: Arc::clone(slot),
            })
            .collect()
    }

    /// The most recently opened stream
    pub fn last_stream(&self) -> Option<ManualStreamHandle> {
        self.inner
            .lock()
            .streams
            .last()
            .map(|slot| ManualStreamHandle {
                slot: Arc::clone(slot),
            })
    }

    /// Pump every running stream once. Returns how many were invoked.
    pub fn pump_all(&self, frames: usize) -> usize {
        self.streams()
            .iter()
            .filter_map(|stream| stream.request(frames))
            .count()
    }
}

impl AudioDevice for ManualDevice {
    fn name(&self) -> String {
        "manual".to_string()
    }

    fn open_stream(
        &self,
        config: StreamConfig,
        callback: FillCallback,
    ) -> Result<Box<dyn OutputStream>, DeviceError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.fail_open {
            return Err(DeviceError::Open(reason.clone()));
        }
        if config.channels == 0 || config.sample_rate == 0 {
            return Err(DeviceError::UnsupportedConfig(format!(
                "{} channels at {} Hz",
                config.channels, config.sample_rate
            )));
        }
        let slot = Arc::new(StreamSlot {
            config,
            fail_start: inner.fail_start.clone(),
            callback: Mutex::new(Some(callback)),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            invocations: AtomicUsize::new(0),
        });
        inner.streams.push(Arc::clone(&slot));
        Ok(Box::new(ManualStream { slot }))
    }
}

struct ManualStream {
    slot: Arc<StreamSlot>,
}

impl OutputStream for ManualStream {
    fn start(&mut self) -> Result<(), DeviceError> {
        if self.slot.closed.load(Ordering::Acquire) {
            return Err(DeviceError::Start("stream is closed".to_string()));
        }
        if let Some(reason) = &self.slot.fail_start {
            return Err(DeviceError::Start(reason.clone()));
        }
        self.slot.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.slot.running.store(false, Ordering::Release);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.slot.running.store(false, Ordering::Release);
        self.slot.closed.store(true, Ordering::Release);
        // Waits for an in-flight request to return
        self.slot.callback.lock().take();
        Ok(())
    }
}

/// Caller-side handle to one stream opened on a `ManualDevice`
#[derive(Clone)]
pub struct ManualStreamHandle {
    slot: Arc<StreamSlot>,
}

impl ManualStreamHandle {
    pub fn config(&self) -> StreamConfig {
        self.slot.config
    }

    pub fn is_running(&self) -> bool {
        self.slot.running.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.slot.closed.load(Ordering::Acquire)
    }

    /// Number of callback invocations so far
    pub fn invocations(&self) -> usize {
        self.slot.invocations.load(Ordering::Acquire)
    }

    /// Invoke the fill callback for `frames` frames.
    ///
    /// Returns the interleaved output, or `None` when the stream is stopped
    /// or closed. A callback answering `Complete` stops the stream.
    pub fn request(&self, frames: usize) -> Option<Vec<f32>> {
        if !self.is_running() {
            return None;
        }
        let mut callback = self.slot.callback.lock();
        let callback = callback.as_mut()?;

        let mut buffer = vec![0.0f32; frames * self.slot.config.channels as usize];
        let status = callback(&mut buffer);
        self.slot.invocations.fetch_add(1, Ordering::AcqRel);
        if status == FillStatus::Complete {
            self.slot.running.store(false, Ordering::Release);
        }
        Some(buffer)
    }

    /// Pump until the stream stops, concatenating the output
    pub fn drain(&self, frames_per_request: usize) -> Vec<f32> {
        let mut output = Vec::new();
        while let Some(buffer) = self.request(frames_per_request.max(1)) {
            output.extend_from_slice(&buffer);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEREO: StreamConfig = StreamConfig {
        channels: 2,
        sample_rate: 44100,
    };

    fn counting_callback(limit: usize) -> FillCallback {
        let mut calls = 0;
        Box::new(move |buf: &mut [f32]| {
            calls += 1;
            buf.fill(calls as f32);
            if calls >= limit {
                FillStatus::Complete
            } else {
                FillStatus::Continue
            }
        })
    }

    #[test]
    fn test_stream_starts_stopped() {
        let device = ManualDevice::new();
        let _stream = device.open_stream(STEREO, counting_callback(3)).unwrap();
        let handle = device.last_stream().unwrap();
        assert!(!handle.is_running());
        assert_eq!(handle.request(4), None);
        assert_eq!(handle.invocations(), 0);
    }

    #[test]
    fn test_complete_stops_stream() {
        let device = ManualDevice::new();
        let mut stream = device.open_stream(STEREO, counting_callback(2)).unwrap();
        stream.start().unwrap();
        let handle = device.last_stream().unwrap();

        assert_eq!(handle.request(1), Some(vec![1.0, 1.0]));
        assert_eq!(handle.request(1), Some(vec![2.0, 2.0]));
        assert!(!handle.is_running());
        assert_eq!(handle.request(1), None);
        assert_eq!(handle.invocations(), 2);
    }

    #[test]
    fn test_drain() {
        let device = ManualDevice::new();
        let mut stream = device.open_stream(STEREO, counting_callback(3)).unwrap();
        stream.start().unwrap();
        let output = device.last_stream().unwrap().drain(2);
        assert_eq!(output, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_close_releases_callback() {
        let device = ManualDevice::new();
        let mut stream = device.open_stream(STEREO, counting_callback(9)).unwrap();
        stream.start().unwrap();
        stream.close().unwrap();
        let handle = device.last_stream().unwrap();
        assert!(handle.is_closed());
        assert_eq!(handle.request(1), None);
        assert!(stream.start().is_err());
    }

    #[test]
    fn test_failing_device() {
        let device = ManualDevice::failing("unplugged");
        let err = device
            .open_stream(STEREO, counting_callback(1))
            .err()
            .unwrap();
        assert!(matches!(err, DeviceError::Open(reason) if reason == "unplugged"));
        assert!(device.streams().is_empty());
    }

    #[test]
    fn test_failing_start() {
        let device = ManualDevice::failing_start("no clock");
        let mut stream = device.open_stream(STEREO, counting_callback(1)).unwrap();
        let err = stream.start().unwrap_err();
        assert!(matches!(err, DeviceError::Start(reason) if reason == "no clock"));
        assert!(!device.last_stream().unwrap().is_running());
    }

    #[test]
    fn test_rejects_zero_rate() {
        let device = ManualDevice::new();
        let config = StreamConfig {
            channels: 2,
            sample_rate: 0,
        };
        assert!(matches!(
            device.open_stream(config, counting_callback(1)),
            Err(DeviceError::UnsupportedConfig(_))
        ));
    }

    #[test]
    fn test_pump_all() {
        let device = ManualDevice::new();
        let mut a = device.open_stream(STEREO, counting_callback(5)).unwrap();
        let _b = device.open_stream(STEREO, counting_callback(5)).unwrap();
        a.start().unwrap();
        assert_eq!(device.pump_all(1), 1);
        assert_eq!(device.streams().len(), 2);
    }
}

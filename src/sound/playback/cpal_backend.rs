//! cpal output backend
//!
//! `cpal::Stream` is not `Send` on every host, so each opened stream lives on
//! its own thread and is driven through a command channel. The fill callback
//! runs on cpal's audio thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel::{self, Receiver, Sender};

use super::device::{
    AudioDevice, DeviceError, FillCallback, FillStatus, OutputStream, StreamConfig,
};

/// Commands sent to a stream thread
enum StreamCommand {
    Start(Sender<Result<(), DeviceError>>),
    Stop(Sender<Result<(), DeviceError>>),
    /// Sent by the fill callback on `Complete`, tagged with its run
    Finished(u64),
    Close,
}

/// Counts stream starts.
///
/// A `Finished` tagged with an earlier run arrived after a restart and must
/// not pause the stream.
#[derive(Debug, Default)]
struct RunGeneration(AtomicU64);

impl RunGeneration {
    fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Begin a new run and return its number
    fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_current(&self, run: u64) -> bool {
        self.current() == run
    }
}

/// Names of the output devices on the default host
pub fn list_output_devices() -> Result<Vec<String>, DeviceError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::Open(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Output through the platform audio API
#[derive(Debug, Clone, Default)]
pub struct CpalDevice {
    device_name: Option<String>,
}

impl CpalDevice {
    /// Use the host's default output device
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the output device called `name`; `None` means the default
    pub fn with_device(name: Option<String>) -> Self {
        Self { device_name: name }
    }

    fn resolve(&self) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host.default_output_device().ok_or(DeviceError::NoDevice),
            Some(name) => host
                .output_devices()
                .map_err(|e| DeviceError::Open(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or(DeviceError::NoDevice),
        }
    }
}

impl AudioDevice for CpalDevice {
    fn name(&self) -> String {
        match &self.device_name {
            Some(name) => name.clone(),
            None => "default output".to_string(),
        }
    }

    fn open_stream(
        &self,
        config: StreamConfig,
        callback: FillCallback,
    ) -> Result<Box<dyn OutputStream>, DeviceError> {
        let device = self.clone();
        let (cmd_tx, cmd_rx) = channel::unbounded();
        let (ready_tx, ready_rx) = channel::bounded(1);
        let link = CallbackLink {
            commands: cmd_tx.clone(),
            runs: Arc::new(RunGeneration::default()),
        };

        let thread = thread::Builder::new()
            .name("wavplay-stream".to_string())
            .spawn(move || stream_thread(device, config, callback, link, cmd_rx, ready_tx))
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                commands: cmd_tx,
                thread: Some(thread),
            })),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(DeviceError::Open("stream thread exited".to_string()))
            }
        }
    }
}

/// What the audio callback needs to ask its stream thread to stop
struct CallbackLink {
    commands: Sender<StreamCommand>,
    runs: Arc<RunGeneration>,
}

fn stream_thread(
    device: CpalDevice,
    config: StreamConfig,
    callback: FillCallback,
    link: CallbackLink,
    commands: Receiver<StreamCommand>,
    ready: Sender<Result<(), DeviceError>>,
) {
    let runs = Arc::clone(&link.runs);
    let stream = match build(&device, config, callback, link) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Start(reply) => {
                let run = runs.begin();
                log::debug!("starting run {} on {}", run, device.name());
                let result = stream.play().map_err(|e| DeviceError::Start(e.to_string()));
                let _ = reply.send(result);
            }
            StreamCommand::Stop(reply) => {
                let result = stream.pause().map_err(|e| DeviceError::Stop(e.to_string()));
                let _ = reply.send(result);
            }
            StreamCommand::Finished(run) if !runs.is_current(run) => {
                log::debug!("ignoring finish from stale run {}", run);
            }
            StreamCommand::Finished(_) => {
                if let Err(err) = stream.pause() {
                    log::warn!("{}", DeviceError::Stop(err.to_string()));
                }
            }
            StreamCommand::Close => break,
        }
    }

    drop(stream);
    log::debug!("stream thread for {} exiting", device.name());
}

fn build(
    device: &CpalDevice,
    config: StreamConfig,
    callback: FillCallback,
    link: CallbackLink,
) -> Result<cpal::Stream, DeviceError> {
    let output = device.resolve()?;
    let supported = output
        .default_output_config()
        .map_err(|e| DeviceError::Open(e.to_string()))?;

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&output, &stream_config, callback, link),
        cpal::SampleFormat::I16 => build_stream::<i16>(&output, &stream_config, callback, link),
        cpal::SampleFormat::U16 => build_stream::<u16>(&output, &stream_config, callback, link),
        format => Err(DeviceError::UnsupportedConfig(format!(
            "sample format {}",
            format
        ))),
    }
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: FillCallback,
    link: CallbackLink,
) -> Result<cpal::Stream, DeviceError> {
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Read before filling so a restart mid-invocation is seen as stale
                let run = link.runs.current();
                scratch.clear();
                scratch.resize(data.len(), 0.0);
                let status = callback(&mut scratch);
                for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(sample);
                }
                if status == FillStatus::Complete {
                    let _ = link.commands.send(StreamCommand::Finished(run));
                }
            },
            |err| log::error!("output stream error: {}", err),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::StreamConfigNotSupported => {
                DeviceError::UnsupportedConfig(format!(
                    "{} channels at {} Hz",
                    config.channels, config.sample_rate.0
                ))
            }
            cpal::BuildStreamError::DeviceNotAvailable => DeviceError::NoDevice,
            other => DeviceError::Open(other.to_string()),
        })
}

/// Control handle for a stream living on its own thread
struct CpalStream {
    commands: Sender<StreamCommand>,
    thread: Option<JoinHandle<()>>,
}

impl CpalStream {
    fn request(
        &self,
        command: impl FnOnce(Sender<Result<(), DeviceError>>) -> StreamCommand,
        failed: fn(String) -> DeviceError,
    ) -> Result<(), DeviceError> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.commands
            .send(command(reply_tx))
            .map_err(|_| failed("stream thread exited".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| failed("stream thread exited".to_string()))?
    }
}

impl OutputStream for CpalStream {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.request(StreamCommand::Start, DeviceError::Start)
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.request(StreamCommand::Stop, DeviceError::Stop)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let _ = self.commands.send(StreamCommand::Close);
        thread
            .join()
            .map_err(|_| DeviceError::Close("stream thread panicked".to_string()))
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("{}", err);
        }
    }
}

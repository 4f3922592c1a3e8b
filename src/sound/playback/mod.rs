//! Playback of decoded sounds
//!
//! - `device` defines the output seam (`AudioDevice`, `OutputStream`)
//! - `engine` holds the per-sound state machine and fill callback
//! - `context` owns the active playbacks for bulk control
//! - `cpal_backend` and `manual` are the two device implementations

pub mod context;
pub mod cpal_backend;
pub mod device;
pub mod engine;
pub mod manual;
pub mod types;

pub use context::AudioContext;
pub use cpal_backend::{list_output_devices, CpalDevice};
pub use device::{AudioDevice, DeviceError, FillCallback, FillStatus, OutputStream, StreamConfig};
pub use engine::{Completion, Playback, OUTPUT_CHANNELS};
pub use manual::{ManualDevice, ManualStreamHandle};
pub use types::{PlaybackError, PlaybackId, PlaybackResult, PlaybackState};

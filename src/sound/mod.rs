//! Sound decoding and playback
//!
//! # Architecture
//!
//! - `wav` parses the RIFF/WAVE container into a format descriptor and raw
//!   data chunks
//! - `codec` turns one channel's bytes into a normalized `f32`
//! - `frames` assembles data chunks into a `SampleTimeline`
//! - `registry` maps file extensions to decoder entry points
//! - `playback` drives decoded sounds through an output device

pub mod codec;
pub mod decoder;
pub mod formats;
pub mod frames;
pub mod playback;
pub mod registry;
pub mod timeline;
pub mod wav;

pub use codec::Codec;
pub use decoder::{
    DecodeError, DecodeFn, DecodeOptions, DecodeResult, FmtExtension, ReadSeek, SampleScaling,
};
pub use formats::{FormatTag, SoundFormat};
pub use registry::{FormatRegistry, SoundFormatEntry};
pub use timeline::{SampleTimeline, Sound};

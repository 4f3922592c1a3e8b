// wavplay library
// RIFF/WAVE decoding and playback

pub mod cli;
pub mod config;
pub mod logging;
pub mod sound;

pub use cli::Cli;
pub use config::Options;
pub use logging::LogLevel;
pub use sound::playback::{AudioContext, Playback, PlaybackError};
pub use sound::{DecodeError, DecodeOptions, FormatRegistry, Sound};

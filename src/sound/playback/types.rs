//! Playback state, identifiers and errors

use std::fmt;
use std::io;

use thiserror::Error;

use super::device::DeviceError;
use crate::sound::decoder::DecodeError;

/// Lifecycle of one playback
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Decoded, not yet started
    Ready = 0,
    /// Stream running, frames advancing
    Playing = 1,
    /// Stream running, writing silence
    Paused = 2,
    /// Every frame has been delivered
    Finished = 3,
    /// Stream released; terminal
    Closed = 4,
}

impl PlaybackState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => PlaybackState::Ready,
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            3 => PlaybackState::Finished,
            _ => PlaybackState::Closed,
        }
    }

    /// Whether the device stream is pulling frames in this state
    pub fn is_streaming(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Finished => "finished",
            PlaybackState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Handle to a playback owned by an `AudioContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(pub(crate) u32);

impl PlaybackId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors from playback control
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("cannot {op} while {state}")]
    InvalidState {
        op: &'static str,
        state: PlaybackState,
    },

    #[error("playback has no open stream")]
    NotOpen,

    #[error("no decoder registered for extension {0:?}")]
    UnknownExtension(String),

    #[error("unknown playback {0}")]
    UnknownPlayback(PlaybackId),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;

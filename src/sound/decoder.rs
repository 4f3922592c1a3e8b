//! Sound decoder error types and decode options
//!
//! Defines the error taxonomy shared by the container parser, the sample
//! codecs and the frame assembler, plus the knobs that select between the
//! legacy and corrected decoding behaviours.

use std::fmt;
use std::io::{self, Read, Seek};

use thiserror::Error;

use super::timeline::Sound;

/// Error type for decoder operations
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A required four-byte tag did not match its literal
    #[error("bad magic: expected {expected:?}, found {}", FourCc(*.found))]
    BadMagic {
        expected: &'static str,
        found: [u8; 4],
    },
    /// Format code has no codec
    #[error("unsupported sample format code {0} (compressed WAVE is not supported)")]
    UnsupportedFormat(u16),
    /// Bit width is not valid for the selected codec
    #[error("unsupported bit width {bits} for {codec} samples")]
    UnsupportedBitWidth { codec: &'static str, bits: u16 },
    /// A chunk other than `data`/`afsp` appeared in the chunk loop
    #[error("unexpected chunk {}", FourCc(*.0))]
    UnexpectedChunk([u8; 4]),
    /// The stream ended inside a structurally required field
    #[error("truncated stream while reading {0}")]
    TruncatedStream(&'static str),
    /// The fmt chunk describes an impossible layout
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// I/O error other than end of stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for decoder operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Displays a chunk tag as text when printable, bytes otherwise.
pub(crate) struct FourCc(pub [u8; 4]);

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "\"{}\"", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Integer sample normalization rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleScaling {
    /// 8-bit: `v / 255 - 0.5`, 16-bit: `v / 32767`
    #[default]
    Legacy,
    /// 8-bit: `(v - 128) / 128`, 16-bit: `v / 32768`
    Symmetric,
}

/// How bytes after the 16 mandatory fmt fields are skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FmtExtension {
    /// Skip whatever the fmt chunk size declares beyond 16 bytes
    #[default]
    ChunkSize,
    /// Always skip 2 bytes, whatever the chunk declares
    Legacy,
}

/// Options applied to a single decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub sample_scaling: SampleScaling,
    pub fmt_extension: FmtExtension,
}

/// Byte source a decoder can read from and seek in
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Decoder entry point stored in the format registry
pub type DecodeFn = fn(&mut dyn ReadSeek, &DecodeOptions) -> DecodeResult<Sound>;

/// Maps an `UnexpectedEof` to `TruncatedStream`, keeping other I/O errors.
pub(crate) fn truncated(what: &'static str) -> impl FnOnce(io::Error) -> DecodeError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::TruncatedStream(what)
        } else {
            DecodeError::Io(e)
        }
    }
}

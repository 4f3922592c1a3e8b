//! Sample codecs
//!
//! Each codec turns one channel's raw little-endian bytes into a normalized
//! `f32`. The codec is chosen once, while the `fmt ` chunk is parsed, and is
//! carried alongside the format descriptor.

use super::decoder::{DecodeError, DecodeResult, SampleScaling};
use super::formats::FormatTag;

/// Closed set of supported sample encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Unsigned 8-bit PCM
    Pcm8(SampleScaling),
    /// Signed 16-bit little-endian PCM
    Pcm16(SampleScaling),
    /// IEEE 754 single precision
    Float32,
    /// IEEE 754 double precision, narrowed to single
    Float64,
    /// G.711 A-law, one byte per sample
    ALaw,
    /// G.711 µ-law, one byte per sample
    MuLaw,
}

impl Codec {
    /// Select the codec for a format tag and declared bit width.
    pub fn select(
        tag: FormatTag,
        bits_per_sample: u16,
        scaling: SampleScaling,
    ) -> DecodeResult<Self> {
        let codec = match (tag, bits_per_sample) {
            (FormatTag::Pcm, 8) => Codec::Pcm8(scaling),
            (FormatTag::Pcm, 16) => Codec::Pcm16(scaling),
            (FormatTag::IeeeFloat, 32) => Codec::Float32,
            (FormatTag::IeeeFloat, 64) => Codec::Float64,
            (FormatTag::ALaw, 8) => Codec::ALaw,
            (FormatTag::MuLaw, 8) => Codec::MuLaw,
            (FormatTag::Unsupported(code), _) => return Err(DecodeError::UnsupportedFormat(code)),
            (tag, bits) => {
                return Err(DecodeError::UnsupportedBitWidth {
                    codec: tag_name(tag),
                    bits,
                })
            }
        };
        Ok(codec)
    }

    /// Bytes consumed per sample
    pub fn width(self) -> usize {
        match self {
            Codec::Pcm8(_) | Codec::ALaw | Codec::MuLaw => 1,
            Codec::Pcm16(_) => 2,
            Codec::Float32 => 4,
            Codec::Float64 => 8,
        }
    }

    /// Human-readable codec name
    pub fn name(self) -> &'static str {
        match self {
            Codec::Pcm8(_) => "PCM 8-bit",
            Codec::Pcm16(_) => "PCM 16-bit",
            Codec::Float32 => "IEEE float 32-bit",
            Codec::Float64 => "IEEE float 64-bit",
            Codec::ALaw => "A-law",
            Codec::MuLaw => "mu-law",
        }
    }

    /// Decode one sample from the front of `bytes`.
    ///
    /// Fails with `TruncatedStream` when fewer than `width()` bytes are given.
    pub fn decode(self, bytes: &[u8]) -> DecodeResult<f32> {
        if bytes.len() < self.width() {
            return Err(DecodeError::TruncatedStream("sample"));
        }
        let sample = match self {
            Codec::Pcm8(SampleScaling::Legacy) => (bytes[0] as f32 / 255.0) - 0.5,
            Codec::Pcm8(SampleScaling::Symmetric) => (bytes[0] as f32 - 128.0) / 128.0,
            Codec::Pcm16(scaling) => {
                let value = i16::from_le_bytes([bytes[0], bytes[1]]) as f32;
                match scaling {
                    SampleScaling::Legacy => value / 32767.0,
                    SampleScaling::Symmetric => value / 32768.0,
                }
            }
            Codec::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Codec::Float64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw) as f32
            }
            Codec::ALaw => ALAW_TABLE[bytes[0] as usize] as f32 / 32768.0,
            Codec::MuLaw => MULAW_TABLE[bytes[0] as usize] as f32 / 32768.0,
        };
        Ok(sample)
    }
}

fn tag_name(tag: FormatTag) -> &'static str {
    match tag {
        FormatTag::Pcm => "PCM",
        FormatTag::IeeeFloat => "IEEE float",
        FormatTag::ALaw => "A-law",
        FormatTag::MuLaw => "mu-law",
        FormatTag::Unsupported(_) => "unsupported",
    }
}

// G.711 expansion tables, byte -> 16-bit linear

const fn alaw_to_linear(byte: u8) -> i16 {
    let a = byte ^ 0x55;
    let exponent = ((a >> 4) & 0x07) as i32;
    let mantissa = (a & 0x0F) as i32;
    let mut value = (mantissa << 4) + 8;
    if exponent != 0 {
        value = (value + 0x100) << (exponent - 1);
    }
    // A-law stores positive samples with the sign bit set
    if a & 0x80 != 0 {
        value as i16
    } else {
        -value as i16
    }
}

const fn mulaw_to_linear(byte: u8) -> i16 {
    let u = !byte;
    let exponent = ((u >> 4) & 0x07) as i32;
    let mantissa = (u & 0x0F) as i32;
    let value = (((mantissa << 3) + 0x84) << exponent) - 0x84;
    if u & 0x80 != 0 {
        -value as i16
    } else {
        value as i16
    }
}

const fn build_alaw_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = alaw_to_linear(i as u8);
        i += 1;
    }
    table
}

const fn build_mulaw_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = mulaw_to_linear(i as u8);
        i += 1;
    }
    table
}

static ALAW_TABLE: [i16; 256] = build_alaw_table();
static MULAW_TABLE: [i16; 256] = build_mulaw_table();

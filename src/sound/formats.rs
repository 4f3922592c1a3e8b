//! WAVE format descriptor
//!
//! Matches the layout of the mandatory `fmt ` sub-chunk.

use super::codec::Codec;
use super::decoder::{DecodeError, DecodeResult};

/// WAVE format code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    /// Integer PCM (code 1)
    Pcm,
    /// IEEE 754 float (code 3)
    IeeeFloat,
    /// G.711 A-law (code 6)
    ALaw,
    /// G.711 µ-law (code 7)
    MuLaw,
    /// Any other code
    Unsupported(u16),
}

impl FormatTag {
    /// Map a raw format code to a tag
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => FormatTag::Pcm,
            3 => FormatTag::IeeeFloat,
            6 => FormatTag::ALaw,
            7 => FormatTag::MuLaw,
            other => FormatTag::Unsupported(other),
        }
    }

    /// Raw format code as stored in the file
    pub fn code(self) -> u16 {
        match self {
            FormatTag::Pcm => 1,
            FormatTag::IeeeFloat => 3,
            FormatTag::ALaw => 6,
            FormatTag::MuLaw => 7,
            FormatTag::Unsupported(code) => code,
        }
    }

    /// Non-PCM formats must carry a `fact` chunk after `fmt `
    pub fn requires_fact(self) -> bool {
        self != FormatTag::Pcm
    }
}

/// Parsed contents of the `fmt ` sub-chunk, immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundFormat {
    pub tag: FormatTag,
    pub channels: u16,
    pub sample_rate: u32,
    /// Informational only, never validated
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Sample codec chosen from `tag` and `bits_per_sample`
    pub codec: Codec,
}

impl SoundFormat {
    /// Bytes of one channel's sample
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Bytes of one frame actually decoded (may be less than `block_align`)
    pub fn frame_bytes(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Reject layouts the frame assembler cannot step through.
    pub fn validate(&self) -> DecodeResult<()> {
        if self.channels == 0 {
            return Err(DecodeError::InvalidFormat(
                "channel count is zero".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(DecodeError::InvalidFormat("sample rate is zero".to_string()));
        }
        if (self.block_align as usize) < self.frame_bytes() {
            return Err(DecodeError::InvalidFormat(format!(
                "block alignment {} is smaller than one frame ({} channels x {} bits)",
                self.block_align, self.channels, self.bits_per_sample
            )));
        }
        Ok(())
    }
}

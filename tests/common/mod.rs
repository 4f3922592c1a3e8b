//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Format codes used when building test streams
pub const PCM: u16 = 1;
pub const IEEE_FLOAT: u16 = 3;
pub const ALAW: u16 = 6;
pub const MULAW: u16 = 7;

/// Builds RIFF/WAVE byte streams chunk by chunk
#[derive(Debug, Clone)]
pub struct WavBuilder {
    format_code: u16,
    channels: u16,
    sample_rate: u32,
    bits: u16,
    fmt_extra: Vec<u8>,
    with_fact: bool,
    body: Vec<u8>,
}

impl WavBuilder {
    pub fn new(format_code: u16, channels: u16, sample_rate: u32, bits: u16) -> Self {
        let non_pcm = format_code != PCM;
        Self {
            format_code,
            channels,
            sample_rate,
            bits,
            // non-PCM fmt chunks carry a cbSize field
            fmt_extra: if non_pcm { vec![0, 0] } else { Vec::new() },
            with_fact: non_pcm,
            body: Vec::new(),
        }
    }

    pub fn pcm16(channels: u16, sample_rate: u32) -> Self {
        Self::new(PCM, channels, sample_rate, 16)
    }

    pub fn pcm8(channels: u16, sample_rate: u32) -> Self {
        Self::new(PCM, channels, sample_rate, 8)
    }

    pub fn float32(channels: u16, sample_rate: u32) -> Self {
        Self::new(IEEE_FLOAT, channels, sample_rate, 32)
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits / 8
    }

    /// Append a raw chunk, padding odd payloads
    pub fn chunk(mut self, id: &[u8; 4], payload: &[u8]) -> Self {
        self.body.extend_from_slice(id);
        self.body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.body.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            self.body.push(0);
        }
        self
    }

    pub fn data(self, payload: &[u8]) -> Self {
        self.chunk(b"data", payload)
    }

    pub fn pcm16_samples(self, samples: &[i16]) -> Self {
        let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.data(&payload)
    }

    pub fn float32_samples(self, samples: &[f32]) -> Self {
        let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.data(&payload)
    }

    pub fn build(&self) -> Vec<u8> {
        let block_align = self.block_align();
        let mut fmt = Vec::new();
        fmt.extend_from_slice(&self.format_code.to_le_bytes());
        fmt.extend_from_slice(&self.channels.to_le_bytes());
        fmt.extend_from_slice(&self.sample_rate.to_le_bytes());
        fmt.extend_from_slice(&(self.sample_rate * block_align as u32).to_le_bytes());
        fmt.extend_from_slice(&block_align.to_le_bytes());
        fmt.extend_from_slice(&self.bits.to_le_bytes());
        fmt.extend_from_slice(&self.fmt_extra);

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
        out.extend_from_slice(&fmt);
        if self.with_fact {
            out.extend_from_slice(b"fact");
            out.extend_from_slice(&4u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        out.extend_from_slice(&self.body);

        let riff_size = (out.len() - 8) as u32;
        out[4..8].copy_from_slice(&riff_size.to_le_bytes());
        out
    }

    /// Write the stream to `dir/name`
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).expect("write test wav");
        path
    }
}

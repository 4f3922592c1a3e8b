//! WAV decoder implementation
//!
//! Walks the RIFF WAVE chunk sequence, selects a sample codec from the
//! `fmt ` chunk and collects every `data` chunk payload in file order.
//! Supports:
//! - 8-bit and 16-bit PCM
//! - 32-bit and 64-bit IEEE float
//! - 8-bit A-law and µ-law
//! - Any channel count and sample rate
//!
//! The parser fails fast: the first structural violation aborts the decode.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use super::codec::Codec;
use super::decoder::{
    truncated, DecodeError, DecodeOptions, DecodeResult, FmtExtension, FourCc, ReadSeek,
};
use super::formats::{FormatTag, SoundFormat};
use super::frames::assemble;
use super::timeline::Sound;

// Chunk tags, compared as raw bytes
const RIFF_ID: &[u8; 4] = b"RIFF";
const WAVE_ID: &[u8; 4] = b"WAVE";
const FMT_ID: &[u8; 4] = b"fmt ";
const FACT_ID: &[u8; 4] = b"fact";
const DATA_ID: &[u8; 4] = b"data";
/// Trailing copyright/metadata chunk; everything after it is ignored
const AFSP_ID: &[u8; 4] = b"afsp";

/// Size of the mandatory part of the fmt chunk
const FMT_BASE_SIZE: u32 = 16;
/// Bytes skipped after the fmt fields in `FmtExtension::Legacy` mode
const LEGACY_FMT_SKIP: u64 = 2;

/// Registry name for this decoder
pub const NAME: &str = "Wave";
/// File extensions handled by this decoder
pub const EXTENSIONS: &[&str] = &["wav", "wave"];

/// A chunk identifier plus its payload, pad byte excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub id: [u8; 4],
    pub payload: Vec<u8>,
}

impl RawChunk {
    pub fn new(id: [u8; 4], payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Display for RawChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} chunk ({} bytes)", FourCc(self.id), self.payload.len())
    }
}

/// Everything the parser extracts from a WAVE stream
#[derive(Debug, Clone)]
pub struct WavContainer {
    /// RIFF size field, stored but never checked against the stream
    pub riff_size: u32,
    pub format: SoundFormat,
    pub data: Vec<RawChunk>,
}

impl WavContainer {
    /// Total payload bytes across all data chunks
    pub fn data_len(&self) -> usize {
        self.data.iter().map(RawChunk::len).sum()
    }
}

fn read_tag<R: Read + ?Sized>(reader: &mut R, what: &'static str) -> DecodeResult<[u8; 4]> {
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag).map_err(truncated(what))?;
    Ok(tag)
}

/// Read a chunk tag where a clean end of stream is allowed.
///
/// Returns `None` when no bytes remain; a partial tag is still truncation.
fn read_tag_or_eof<R: Read + ?Sized>(reader: &mut R) -> DecodeResult<Option<[u8; 4]>> {
    let mut tag = [0u8; 4];
    let mut filled = 0;
    while filled < tag.len() {
        match reader.read(&mut tag[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::Io(e)),
        }
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(tag)),
        _ => Err(DecodeError::TruncatedStream("chunk id")),
    }
}

fn expect_tag<R: Read + ?Sized>(
    reader: &mut R,
    expected: &'static [u8; 4],
    what: &'static str,
) -> DecodeResult<()> {
    let found = read_tag(reader, what)?;
    if &found != expected {
        return Err(DecodeError::BadMagic {
            // tags are ASCII literals
            expected: std::str::from_utf8(expected).unwrap_or("????"),
            found,
        });
    }
    Ok(())
}

fn read_le_u16<R: Read + ?Sized>(reader: &mut R, what: &'static str) -> DecodeResult<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).map_err(truncated(what))?;
    Ok(u16::from_le_bytes(buf))
}

fn read_le_u32<R: Read + ?Sized>(reader: &mut R, what: &'static str) -> DecodeResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(truncated(what))?;
    Ok(u32::from_le_bytes(buf))
}

/// Seek past an optional byte; running off the end is left to the next read
fn skip_pad<R: Seek + ?Sized>(reader: &mut R) -> DecodeResult<()> {
    reader.seek(SeekFrom::Current(1))?;
    Ok(())
}

/// Discard `bytes` that must be present in the stream
fn skip_exact<R: Read + ?Sized>(
    reader: &mut R,
    bytes: u64,
    what: &'static str,
) -> DecodeResult<()> {
    if bytes == 0 {
        return Ok(());
    }
    let skipped = io::copy(&mut Read::take(&mut *reader, bytes), &mut io::sink())?;
    if skipped < bytes {
        return Err(DecodeError::TruncatedStream(what));
    }
    Ok(())
}

/// Parse the `fmt ` sub-chunk and select its codec
fn parse_format_chunk<R: Read + ?Sized>(
    reader: &mut R,
    options: &DecodeOptions,
) -> DecodeResult<SoundFormat> {
    expect_tag(reader, FMT_ID, "fmt chunk id")?;
    let size = read_le_u32(reader, "fmt chunk size")?;
    log::debug!("fmt chunk size: {}", size);

    let code = read_le_u16(reader, "format code")?;
    let tag = FormatTag::from_code(code);
    if let FormatTag::Unsupported(code) = tag {
        return Err(DecodeError::UnsupportedFormat(code));
    }

    let channels = read_le_u16(reader, "channel count")?;
    let sample_rate = read_le_u32(reader, "sample rate")?;
    let byte_rate = read_le_u32(reader, "byte rate")?;
    let block_align = read_le_u16(reader, "block alignment")?;
    let bits_per_sample = read_le_u16(reader, "bits per sample")?;

    log::debug!(
        "format {:?}: {} channels, {} Hz, byte rate {}, block align {}, {} bits",
        tag,
        channels,
        sample_rate,
        byte_rate,
        block_align,
        bits_per_sample
    );

    let codec = Codec::select(tag, bits_per_sample, options.sample_scaling)?;

    match options.fmt_extension {
        FmtExtension::ChunkSize => {
            if size < FMT_BASE_SIZE {
                return Err(DecodeError::InvalidFormat(format!(
                    "fmt chunk declares {} bytes, need at least {}",
                    size, FMT_BASE_SIZE
                )));
            }
            let extra = (size - FMT_BASE_SIZE) as u64 + (size & 1) as u64;
            if extra > 0 {
                log::debug!("skipping {} bytes of fmt extension", extra);
            }
            skip_exact(reader, extra, "fmt extension")?;
        }
        FmtExtension::Legacy => skip_exact(reader, LEGACY_FMT_SKIP, "fmt extension")?,
    }

    let format = SoundFormat {
        tag,
        channels,
        sample_rate,
        byte_rate,
        block_align,
        bits_per_sample,
        codec,
    };
    format.validate()?;
    Ok(format)
}

/// Skip the `fact` chunk non-PCM formats must carry
fn skip_fact_chunk<R: Read + ?Sized>(reader: &mut R) -> DecodeResult<()> {
    expect_tag(reader, FACT_ID, "fact chunk id")?;
    let size = read_le_u32(reader, "fact chunk size")?;
    log::debug!("fact chunk size: {}", size);
    skip_exact(reader, size as u64 + (size & 1) as u64, "fact chunk payload")
}

/// Read one `data` payload after its tag, consuming the pad byte if any
fn read_data_chunk<R: Read + Seek + ?Sized>(reader: &mut R) -> DecodeResult<RawChunk> {
    let size = read_le_u32(reader, "data chunk size")?;
    log::debug!("data chunk size: {}", size);

    let mut payload = Vec::new();
    Read::take(&mut *reader, size as u64).read_to_end(&mut payload)?;
    if payload.len() < size as usize {
        return Err(DecodeError::TruncatedStream("data chunk payload"));
    }

    if size % 2 != 0 {
        log::debug!("odd chunk size, skipping pad byte");
        skip_pad(reader)?;
    }
    Ok(RawChunk::new(*DATA_ID, payload))
}

/// Parse a RIFF WAVE stream into its format and data chunks.
pub fn parse_container<R: Read + Seek + ?Sized>(
    reader: &mut R,
    options: &DecodeOptions,
) -> DecodeResult<WavContainer> {
    expect_tag(reader, RIFF_ID, "RIFF id")?;
    let riff_size = read_le_u32(reader, "RIFF size")?;
    expect_tag(reader, WAVE_ID, "WAVE id")?;
    log::debug!("RIFF WAVE chunk size: {}", riff_size);

    let format = parse_format_chunk(reader, options)?;
    if format.tag.requires_fact() {
        skip_fact_chunk(reader)?;
    }

    let mut data = Vec::new();
    while let Some(id) = read_tag_or_eof(reader)? {
        match &id {
            AFSP_ID => {
                log::debug!("afsp chunk reached, ignoring the rest of the stream");
                break;
            }
            DATA_ID => data.push(read_data_chunk(reader)?),
            _ => return Err(DecodeError::UnexpectedChunk(id)),
        }
    }

    Ok(WavContainer {
        riff_size,
        format,
        data,
    })
}

/// Decode a whole WAVE stream into a `Sound`.
///
/// This is the entry point registered for the `wav` extension.
pub fn decode(reader: &mut dyn ReadSeek, options: &DecodeOptions) -> DecodeResult<Sound> {
    let container = parse_container(reader, options)?;
    let timeline = assemble(&container.format, &container.data)?;
    Ok(Sound::new(container.format, timeline))
}

/// Decode a WAVE file held in memory
pub fn decode_bytes(bytes: &[u8], options: &DecodeOptions) -> DecodeResult<Sound> {
    decode(&mut Cursor::new(bytes), options)
}

/// Decode a WAVE file from disk
pub fn decode_file(path: &Path, options: &DecodeOptions) -> DecodeResult<Sound> {
    let mut reader = BufReader::new(File::open(path)?);
    decode(&mut reader, options)
}

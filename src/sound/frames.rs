//! Frame assembly
//!
//! Slices each data chunk payload into `block_align`-sized blocks and
//! decodes every channel of every block into one frame of the timeline.

use super::decoder::DecodeResult;
use super::formats::SoundFormat;
use super::timeline::SampleTimeline;
use super::wav::RawChunk;

/// Decode all data chunks, in order, into one timeline.
///
/// A trailing partial block in a payload is ignored. The first codec error
/// aborts the whole assembly.
pub fn assemble(format: &SoundFormat, chunks: &[RawChunk]) -> DecodeResult<SampleTimeline> {
    format.validate()?;
    let block = format.block_align as usize;
    let width = format.bytes_per_sample();
    let channels = format.channels as usize;

    let total_frames: usize = chunks.iter().map(|c| c.payload.len() / block).sum();
    let mut timeline = SampleTimeline::with_capacity(format.channels, total_frames);
    let mut frame = vec![0.0f32; channels];

    for chunk in chunks {
        let blocks = chunk.payload.chunks_exact(block);
        if !blocks.remainder().is_empty() {
            log::debug!(
                "{}: ignoring {} trailing bytes (partial block)",
                chunk,
                blocks.remainder().len()
            );
        }
        for data in blocks {
            for (ch, slot) in frame.iter_mut().enumerate() {
                let offset = ch * width;
                *slot = format.codec.decode(&data[offset..offset + width])?;
            }
            timeline.push_frame(&frame);
        }
    }

    log::debug!(
        "assembled {} frames from {} data chunk(s)",
        timeline.len(),
        chunks.len()
    );
    Ok(timeline)
}

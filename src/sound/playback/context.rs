//! Audio context
//!
//! Owns everything process-scoped: the decoder registry, the output device,
//! decode options and the table of active playbacks. Only the control thread
//! touches the table; device threads only ever see their own playback.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use super::device::AudioDevice;
use super::engine::{Completion, Playback};
use super::types::{PlaybackError, PlaybackId, PlaybackResult, PlaybackState};
use crate::sound::decoder::DecodeOptions;
use crate::sound::registry::FormatRegistry;
use crate::sound::timeline::Sound;

pub struct AudioContext {
    registry: FormatRegistry,
    device: Box<dyn AudioDevice>,
    options: DecodeOptions,
    playbacks: HashMap<PlaybackId, Playback>,
    next_id: u32,
}

impl AudioContext {
    /// Create a context with the built-in decoders registered.
    pub fn new(device: Box<dyn AudioDevice>, options: DecodeOptions) -> Self {
        Self::with_registry(device, FormatRegistry::with_defaults(), options)
    }

    pub fn with_registry(
        device: Box<dyn AudioDevice>,
        registry: FormatRegistry,
        options: DecodeOptions,
    ) -> Self {
        Self {
            registry,
            device,
            options,
            playbacks: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FormatRegistry {
        &mut self.registry
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn device(&self) -> &dyn AudioDevice {
        self.device.as_ref()
    }

    /// Decode a file with the decoder registered for its extension.
    pub fn decode_file(&self, path: &Path) -> PlaybackResult<Sound> {
        let entry = self.registry.lookup_path(path).ok_or_else(|| {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            PlaybackError::UnknownExtension(ext)
        })?;

        log::debug!("decoding {} as {}", path.display(), entry.name);
        let mut reader = BufReader::new(File::open(path)?);
        let sound = (entry.decoder)(&mut reader, &self.options)?;
        Ok(sound)
    }

    /// Decode `path` and start playing it.
    pub fn play_file(&mut self, path: &Path) -> PlaybackResult<PlaybackId> {
        let sound = self.decode_file(path)?;
        log::info!(
            "{}: {} Hz, {} channel(s), {} frames",
            path.display(),
            sound.sample_rate(),
            sound.channels(),
            sound.frame_count()
        );
        self.play(sound)
    }

    /// Open a stream for `sound` and start it.
    pub fn play(&mut self, sound: impl Into<Arc<Sound>>) -> PlaybackResult<PlaybackId> {
        let mut playback = Playback::new(sound);
        playback.open(self.device.as_ref())?;
        playback.play()?;

        let id = PlaybackId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.playbacks.insert(id, playback);
        Ok(id)
    }

    pub fn pause(&mut self, id: PlaybackId) -> PlaybackResult<()> {
        self.get_mut(id)?.pause()
    }

    pub fn resume(&mut self, id: PlaybackId) -> PlaybackResult<()> {
        self.get_mut(id)?.play()
    }

    /// Close one playback and forget it
    pub fn stop(&mut self, id: PlaybackId) -> PlaybackResult<()> {
        let mut playback = self
            .playbacks
            .remove(&id)
            .ok_or(PlaybackError::UnknownPlayback(id))?;
        playback.close();
        Ok(())
    }

    pub fn state(&self, id: PlaybackId) -> Option<PlaybackState> {
        self.playbacks.get(&id).map(Playback::state)
    }

    pub fn playback(&self, id: PlaybackId) -> Option<&Playback> {
        self.playbacks.get(&id)
    }

    /// Whether any playback is currently advancing
    pub fn is_playing(&self) -> bool {
        self.playbacks
            .values()
            .any(|p| p.state() == PlaybackState::Playing)
    }

    pub fn completion(&self, id: PlaybackId) -> PlaybackResult<Completion> {
        self.playbacks
            .get(&id)
            .map(Playback::completion)
            .ok_or(PlaybackError::UnknownPlayback(id))
    }

    /// Number of playbacks still held, finished ones included
    pub fn active_count(&self) -> usize {
        self.playbacks.len()
    }

    /// Close and drop every finished playback. Returns how many were reaped.
    pub fn reap_finished(&mut self) -> usize {
        let finished: Vec<PlaybackId> = self
            .playbacks
            .iter()
            .filter(|(_, p)| p.is_finished())
            .map(|(id, _)| *id)
            .collect();
        for id in &finished {
            if let Some(mut playback) = self.playbacks.remove(id) {
                playback.close();
            }
        }
        if !finished.is_empty() {
            log::debug!("reaped {} finished playback(s)", finished.len());
        }
        finished.len()
    }

    /// Close every playback, whatever its state.
    pub fn terminate_all(&mut self) {
        if self.playbacks.is_empty() {
            return;
        }
        log::info!("terminating {} playback(s)", self.playbacks.len());
        for (_, mut playback) in self.playbacks.drain() {
            playback.close();
        }
    }

    fn get_mut(&mut self, id: PlaybackId) -> PlaybackResult<&mut Playback> {
        self.playbacks
            .get_mut(&id)
            .ok_or(PlaybackError::UnknownPlayback(id))
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

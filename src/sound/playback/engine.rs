//! Playback engine
//!
//! One `Playback` drives one `Sound` through one device stream. The control
//! thread calls `play`/`pause`/`rewind`/`close`; the device thread calls the
//! fill callback. Both sides share position, the paused flag and the state
//! through atomics. The callback runs under a gate mutex so `close` can wait
//! out an in-flight invocation before the stream is released.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use super::device::{AudioDevice, FillCallback, FillStatus, OutputStream, StreamConfig};
use super::types::{PlaybackError, PlaybackResult, PlaybackState};
use crate::sound::timeline::Sound;

/// Output layout is always stereo, whatever the source carries
pub const OUTPUT_CHANNELS: usize = 2;

/// State shared between the control thread and the fill callback
struct Shared {
    position: AtomicUsize,
    paused: AtomicBool,
    state: AtomicU8,
    finished: AtomicBool,
    /// Held for the whole of every callback invocation
    gate: Mutex<()>,
    /// Dropped on finish or close to wake completion waiters
    done: Mutex<Option<Sender<()>>>,
}

impl Shared {
    fn new(done: Sender<()>) -> Self {
        Self {
            position: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            state: AtomicU8::new(PlaybackState::Ready as u8),
            finished: AtomicBool::new(false),
            gate: Mutex::new(()),
            done: Mutex::new(Some(done)),
        }
    }

    fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: PlaybackState, to: PlaybackState) -> Result<(), PlaybackState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(PlaybackState::from_u8)
    }

    /// Playing -> Paused. Raises the flag first and drops it again if a
    /// finish wins the transition.
    fn pause(&self) -> Result<(), PlaybackState> {
        self.paused.store(true, Ordering::Release);
        self.transition(PlaybackState::Playing, PlaybackState::Paused)
            .inspect_err(|_| self.paused.store(false, Ordering::Release))
    }

    fn signal_done(&self) {
        self.done.lock().take();
    }

    /// Playing -> Finished. Only the callback calls this.
    fn finish(&self) -> bool {
        if self
            .transition(PlaybackState::Playing, PlaybackState::Finished)
            .is_err()
        {
            return false;
        }
        self.finished.store(true, Ordering::Release);
        self.signal_done();
        true
    }
}

/// Serve one callback invocation.
///
/// Writes exactly `out.len() / 2` stereo frames. While paused every frame is
/// silence and the position holds. Mono sources are duplicated to both
/// outputs; sources with more than two channels contribute only the first
/// two.
fn fill(sound: &Sound, shared: &Shared, out: &mut [f32]) -> FillStatus {
    let _gate = shared.gate.lock();

    match shared.state() {
        PlaybackState::Playing | PlaybackState::Paused => {}
        PlaybackState::Ready => {
            out.fill(0.0);
            return FillStatus::Continue;
        }
        PlaybackState::Finished | PlaybackState::Closed => {
            out.fill(0.0);
            return FillStatus::Complete;
        }
    }

    let total = sound.frame_count();
    let mut position = shared.position.load(Ordering::Acquire);

    let mut frames = out.chunks_exact_mut(OUTPUT_CHANNELS);
    for slot in &mut frames {
        if shared.paused.load(Ordering::Acquire) {
            slot.fill(0.0);
            continue;
        }
        match sound.frame(position) {
            Some(frame) => {
                write_stereo(frame, slot);
                position += 1;
            }
            None => slot.fill(0.0),
        }
    }
    frames.into_remainder().fill(0.0);

    shared.position.store(position, Ordering::Release);

    // A pause that lands on the last frame defers finishing to the resume
    if position >= total && shared.finish() {
        FillStatus::Complete
    } else {
        FillStatus::Continue
    }
}

fn write_stereo(frame: &[f32], out: &mut [f32]) {
    match frame {
        [mono] => {
            out[0] = *mono;
            out[1] = *mono;
        }
        [left, right, ..] => {
            out[0] = *left;
            out[1] = *right;
        }
        [] => out.fill(0.0),
    }
}

/// One-shot completion notice for a playback.
///
/// Resolves when the playback finishes or is closed.
#[derive(Clone)]
pub struct Completion {
    rx: Receiver<()>,
    shared: Arc<Shared>,
}

impl Completion {
    /// Block until the playback finishes or is closed.
    ///
    /// Returns `true` if it played to the end.
    pub fn wait(&self) -> bool {
        // Nothing is ever sent; the sender being dropped is the signal
        let _ = self.rx.recv();
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Like `wait`, giving up after `timeout`. Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<bool> {
        match self.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => None,
            _ => Some(self.shared.finished.load(Ordering::Acquire)),
        }
    }

    /// Whether the playback has already finished or been closed
    pub fn is_done(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Plays one decoded sound through one device stream
pub struct Playback {
    sound: Arc<Sound>,
    shared: Arc<Shared>,
    stream: Option<Box<dyn OutputStream>>,
    completion: Receiver<()>,
}

impl Playback {
    /// Create a playback in the `Ready` state; no stream is opened yet.
    pub fn new(sound: impl Into<Arc<Sound>>) -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            sound: sound.into(),
            shared: Arc::new(Shared::new(tx)),
            stream: None,
            completion: rx,
        }
    }

    pub fn sound(&self) -> &Arc<Sound> {
        &self.sound
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Index of the next frame to be delivered
    pub fn position(&self) -> usize {
        self.shared.position.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.state() == PlaybackState::Finished
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Completion notice for the current run
    pub fn completion(&self) -> Completion {
        Completion {
            rx: self.completion.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Open a stereo stream at the sound's sample rate.
    pub fn open(&mut self, device: &dyn AudioDevice) -> PlaybackResult<()> {
        let state = self.state();
        if state != PlaybackState::Ready || self.stream.is_some() {
            return Err(PlaybackError::InvalidState { op: "open", state });
        }

        let config = StreamConfig {
            channels: OUTPUT_CHANNELS as u16,
            sample_rate: self.sound.sample_rate(),
        };
        let sound = Arc::clone(&self.sound);
        let shared = Arc::clone(&self.shared);
        let callback: FillCallback =
            Box::new(move |out: &mut [f32]| fill(&sound, &shared, out));

        let stream = device.open_stream(config, callback)?;
        log::info!(
            "opened {} Hz stereo stream on {} for {} frames",
            config.sample_rate,
            device.name(),
            self.sound.frame_count()
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Start or resume playback. Valid from `Ready` (with an open stream)
    /// and `Paused`; a no-op while already `Playing`.
    pub fn play(&mut self) -> PlaybackResult<()> {
        match self.state() {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                // State first, so a callback that reaches the end can finish
                self.shared
                    .transition(PlaybackState::Paused, PlaybackState::Playing)
                    .map_err(|state| PlaybackError::InvalidState { op: "play", state })?;
                self.shared.paused.store(false, Ordering::Release);
                Ok(())
            }
            PlaybackState::Ready => {
                let stream = self.stream.as_mut().ok_or(PlaybackError::NotOpen)?;
                self.shared.paused.store(false, Ordering::Release);
                self.shared
                    .transition(PlaybackState::Ready, PlaybackState::Playing)
                    .map_err(|state| PlaybackError::InvalidState { op: "play", state })?;
                if let Err(err) = stream.start() {
                    self.shared.set_state(PlaybackState::Ready);
                    return Err(err.into());
                }
                Ok(())
            }
            state => Err(PlaybackError::InvalidState { op: "play", state }),
        }
    }

    /// Silence output without advancing. Valid from `Playing`; a no-op
    /// while already `Paused`.
    pub fn pause(&mut self) -> PlaybackResult<()> {
        match self.state() {
            PlaybackState::Paused => Ok(()),
            PlaybackState::Playing => self
                .shared
                .pause()
                .map_err(|state| PlaybackError::InvalidState { op: "pause", state }),
            state => Err(PlaybackError::InvalidState { op: "pause", state }),
        }
    }

    /// Reset the position to the first frame.
    ///
    /// Valid from `Ready`, `Paused` and `Finished`. A finished playback
    /// returns to `Ready` and gets a fresh completion notice.
    pub fn rewind(&mut self) -> PlaybackResult<()> {
        let _gate = self.shared.gate.lock();
        match self.state() {
            PlaybackState::Ready | PlaybackState::Paused => {
                self.shared.position.store(0, Ordering::Release);
                Ok(())
            }
            PlaybackState::Finished => {
                let (tx, rx) = channel::bounded(0);
                *self.shared.done.lock() = Some(tx);
                self.completion = rx;
                self.shared.finished.store(false, Ordering::Release);
                self.shared.position.store(0, Ordering::Release);
                self.shared.set_state(PlaybackState::Ready);
                Ok(())
            }
            state => Err(PlaybackError::InvalidState { op: "rewind", state }),
        }
    }

    /// Stop and release the stream. Idempotent.
    ///
    /// Waits for any in-flight callback before the stream is released.
    pub fn close(&mut self) {
        if self.state() == PlaybackState::Closed {
            return;
        }
        {
            let _gate = self.shared.gate.lock();
            self.shared.set_state(PlaybackState::Closed);
        }
        self.shared.signal_done();

        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.stop() {
                log::warn!("stopping stream on close: {}", err);
            }
            if let Err(err) = stream.close() {
                log::warn!("closing stream: {}", err);
            }
            log::info!("closed stream at frame {}", self.position());
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Playback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playback")
            .field("state", &self.state())
            .field("position", &self.position())
            .field("frames", &self.sound.frame_count())
            .field("open", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::codec::Codec;
    use crate::sound::formats::{FormatTag, SoundFormat};
    use crate::sound::playback::device::DeviceError;
    use crate::sound::playback::manual::ManualDevice;

    fn sound(channels: u16, samples: Vec<f32>) -> Sound {
        let format = SoundFormat {
            tag: FormatTag::IeeeFloat,
            channels,
            sample_rate: 8000,
            byte_rate: 8000 * channels as u32 * 4,
            block_align: channels * 4,
            bits_per_sample: 32,
            codec: Codec::Float32,
        };
        Sound::from_interleaved(format, samples).unwrap()
    }

    fn stereo_ramp(frames: usize) -> Sound {
        let samples = (0..frames * 2).map(|i| i as f32 / 100.0).collect();
        sound(2, samples)
    }

    #[test]
    fn test_fill_finishes_on_last_frame() {
        let sound = stereo_ramp(4);
        let (tx, _rx) = channel::bounded(0);
        let shared = Shared::new(tx);
        shared.set_state(PlaybackState::Playing);

        let mut out = [0.0f32; 4];
        assert_eq!(fill(&sound, &shared, &mut out), FillStatus::Continue);
        assert_eq!(out, [0.0, 0.01, 0.02, 0.03]);
        assert_eq!(shared.state(), PlaybackState::Playing);

        assert_eq!(fill(&sound, &shared, &mut out), FillStatus::Complete);
        assert_eq!(out, [0.04, 0.05, 0.06, 0.07]);
        assert_eq!(shared.state(), PlaybackState::Finished);
        assert_eq!(shared.position.load(Ordering::Acquire), 4);
    }

    #[test]
    fn test_fill_pads_past_end_with_silence() {
        let sound = stereo_ramp(1);
        let (tx, _rx) = channel::bounded(0);
        let shared = Shared::new(tx);
        shared.set_state(PlaybackState::Playing);

        let mut out = [9.0f32; 6];
        assert_eq!(fill(&sound, &shared, &mut out), FillStatus::Complete);
        assert_eq!(out, [0.0, 0.01, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fill_paused_writes_silence() {
        let sound = stereo_ramp(4);
        let (tx, _rx) = channel::bounded(0);
        let shared = Shared::new(tx);
        shared.set_state(PlaybackState::Paused);
        shared.paused.store(true, Ordering::Release);

        let mut out = [1.0f32; 4];
        assert_eq!(fill(&sound, &shared, &mut out), FillStatus::Continue);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(shared.position.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_pause_losing_to_finish_clears_flag() {
        let (tx, _rx) = channel::bounded(0);
        let shared = Shared::new(tx);
        shared.set_state(PlaybackState::Finished);
        assert_eq!(shared.pause(), Err(PlaybackState::Finished));
        assert!(!shared.paused.load(Ordering::Acquire));

        shared.set_state(PlaybackState::Playing);
        assert_eq!(shared.pause(), Ok(()));
        assert!(shared.paused.load(Ordering::Acquire));
        assert_eq!(shared.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_mono_is_duplicated() {
        let mut out = [0.0f32; 2];
        write_stereo(&[0.5], &mut out);
        assert_eq!(out, [0.5, 0.5]);
    }

    #[test]
    fn test_extra_channels_are_dropped() {
        let mut out = [0.0f32; 2];
        write_stereo(&[0.1, 0.2, 0.3, 0.4], &mut out);
        assert_eq!(out, [0.1, 0.2]);
    }

    #[test]
    fn test_empty_sound_finishes_immediately() {
        let device = ManualDevice::new();
        let mut playback = Playback::new(sound(2, Vec::new()));
        playback.open(&device).unwrap();
        playback.play().unwrap();

        let stream = device.last_stream().unwrap();
        assert_eq!(stream.request(8), Some(vec![0.0; 16]));
        assert!(playback.is_finished());
        assert!(!stream.is_running());
    }

    #[test]
    fn test_play_requires_open_stream() {
        let mut playback = Playback::new(stereo_ramp(2));
        assert!(matches!(playback.play(), Err(PlaybackError::NotOpen)));
        assert_eq!(playback.state(), PlaybackState::Ready);
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let device = ManualDevice::new();
        let mut playback = Playback::new(stereo_ramp(2));
        playback.open(&device).unwrap();
        assert!(matches!(
            playback.open(&device),
            Err(PlaybackError::InvalidState { op: "open", .. })
        ));
    }

    #[test]
    fn test_stream_config_is_stereo_at_native_rate() {
        let device = ManualDevice::new();
        let mut playback = Playback::new(sound(1, vec![0.0; 4]));
        playback.open(&device).unwrap();
        let config = device.last_stream().unwrap().config();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, 8000);
    }

    #[test]
    fn test_pause_and_resume() {
        let device = ManualDevice::new();
        let mut playback = Playback::new(stereo_ramp(4));
        playback.open(&device).unwrap();
        playback.play().unwrap();
        let stream = device.last_stream().unwrap();

        stream.request(1).unwrap();
        playback.pause().unwrap();
        assert_eq!(playback.state(), PlaybackState::Paused);
        assert_eq!(stream.request(2), Some(vec![0.0; 4]));
        assert_eq!(playback.position(), 1);

        playback.play().unwrap();
        assert_eq!(stream.request(1), Some(vec![0.02, 0.03]));
        assert_eq!(playback.position(), 2);
    }

    #[test]
    fn test_pause_on_last_frame_finishes_after_resume() {
        let device = ManualDevice::new();
        let mut playback = Playback::new(stereo_ramp(2));
        playback.open(&device).unwrap();
        playback.play().unwrap();
        let stream = device.last_stream().unwrap();
        let completion = playback.completion();

        stream.request(1).unwrap();
        playback.pause().unwrap();
        // The last frame went out just before the pause took effect
        playback.shared.position.store(2, Ordering::Release);

        assert_eq!(stream.request(2), Some(vec![0.0; 4]));
        assert_eq!(playback.state(), PlaybackState::Paused);
        assert!(stream.is_running());
        assert!(!completion.is_done());

        playback.play().unwrap();
        assert_eq!(stream.request(1), Some(vec![0.0, 0.0]));
        assert_eq!(playback.state(), PlaybackState::Finished);
        assert!(!stream.is_running());
        assert!(completion.wait());
    }

    #[test]
    fn test_start_failure_returns_to_ready() {
        let device = ManualDevice::failing_start("device busy");
        let mut playback = Playback::new(stereo_ramp(2));
        playback.open(&device).unwrap();

        let err = playback.play().unwrap_err();
        assert!(matches!(err, PlaybackError::Device(DeviceError::Start(_))));
        assert_eq!(playback.state(), PlaybackState::Ready);
        assert!(!playback.completion().is_done());
        assert!(!device.last_stream().unwrap().is_running());
        assert!(matches!(playback.play(), Err(PlaybackError::Device(_))));
    }

    #[test]
    fn test_invalid_transitions() {
        let device = ManualDevice::new();
        let mut playback = Playback::new(stereo_ramp(1));
        assert!(matches!(
            playback.pause(),
            Err(PlaybackError::InvalidState { op: "pause", state: PlaybackState::Ready })
        ));
        playback.open(&device).unwrap();
        playback.play().unwrap();
        assert!(matches!(
            playback.rewind(),
            Err(PlaybackError::InvalidState { op: "rewind", .. })
        ));
        device.last_stream().unwrap().request(1);
        assert!(playback.is_finished());
        assert!(matches!(playback.play(), Err(PlaybackError::InvalidState { .. })));
        assert!(matches!(playback.pause(), Err(PlaybackError::InvalidState { .. })));
    }

    #[test]
    fn test_rewind_replays() {
        let device = ManualDevice::new();
        let mut playback = Playback::new(stereo_ramp(2));
        playback.open(&device).unwrap();
        playback.play().unwrap();
        let stream = device.last_stream().unwrap();

        let first = playback.completion();
        stream.request(2).unwrap();
        assert!(first.wait());

        playback.rewind().unwrap();
        assert_eq!(playback.state(), PlaybackState::Ready);
        assert_eq!(playback.position(), 0);
        assert!(!playback.completion().is_done());

        playback.play().unwrap();
        assert_eq!(stream.request(2), Some(vec![0.0, 0.01, 0.02, 0.03]));
        assert!(playback.completion().wait());
    }

    #[test]
    fn test_close_is_idempotent() {
        let device = ManualDevice::new();
        let mut playback = Playback::new(stereo_ramp(2));
        playback.open(&device).unwrap();
        playback.play().unwrap();
        let stream = device.last_stream().unwrap();

        playback.close();
        assert_eq!(playback.state(), PlaybackState::Closed);
        assert!(stream.is_closed());
        assert_eq!(stream.request(1), None);
        playback.close();
        assert_eq!(playback.state(), PlaybackState::Closed);
        assert!(matches!(playback.play(), Err(PlaybackError::InvalidState { .. })));
    }

    #[test]
    fn test_close_wakes_completion_without_finishing() {
        let mut playback = Playback::new(stereo_ramp(2));
        let completion = playback.completion();
        assert!(!completion.is_done());
        assert_eq!(completion.wait_timeout(Duration::from_millis(1)), None);
        playback.close();
        assert!(completion.is_done());
        assert!(!completion.wait());
    }

    #[test]
    fn test_drop_closes_stream() {
        let device = ManualDevice::new();
        {
            let mut playback = Playback::new(stereo_ramp(2));
            playback.open(&device).unwrap();
        }
        assert!(device.last_stream().unwrap().is_closed());
    }
}

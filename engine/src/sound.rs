// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! The mixing-bus audio engine. Sounds are split in two parts: the source
//! (the sample data, either fully decoded PCM or a compressed blob with a
//! one-frame decode buffer) and a voice, a currently playing instance of a
//! source with its own volume, pan, pitch and position.
//!
//! Voices are generational like entities: [`Sound::voice`] reserves a slot
//! and hands out an id which stays valid until [`Sound::dispose`]. Disposed
//! voices keep playing to their end (unless looping) and their slot becomes
//! reusable. When all slots are reserved or playing, acquiring prefers
//! cutting off a disposed, free-playing voice over failing.
//!
//! The mixer itself runs on the platform's audio thread. All state lives
//! behind one mutex, which both the main-thread control functions and the
//! per-callback [`SoundMixer::mix`] take; the critical sections are short
//! (field writes on the control side), so the callback doesn't starve. The
//! lock also guarantees that a voice reset (`id = 0`) is visible to the
//! mixer before the slot is handed out again.

use std::sync::Arc;

use parking_lot::Mutex;
use platform::{FrameDecoder, Platform, SoundBytes, SoundDesc, AUDIO_CHANNELS};

/// A handle to a playing (or reserved) voice. Invalid handles and handles to
/// since-recycled voices are silently ignored by all the control functions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    id: u16,
    index: u16,
}

impl Voice {
    /// A handle that refers to no voice.
    pub const INVALID: Voice = Voice { id: 0, index: 0 };

    /// Whether this handle referred to a voice when it was created. The
    /// voice may still have been recycled since.
    pub fn is_valid(self) -> bool {
        self.id != 0
    }
}

/// A handle to a loaded sound source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceId(u32);

/// An opaque snapshot of the source table, for the per-scene sound
/// lifecycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceMark {
    index: usize,
}

struct Source {
    channels: u32,
    len: u32,
    samplerate: u32,
    data: SourceData,
}

enum SourceData {
    Pcm(Box<[i16]>),
    Compressed {
        decoder: Box<dyn FrameDecoder>,
        /// One decoded frame of interleaved PCM. Shared by all voices
        /// playing this source; fine as long as they advance through the
        /// frames at similar rates.
        pcm_buffer: Box<[i16]>,
        /// The sample index of the first sample in `pcm_buffer`.
        pcm_buffer_start: u32,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct VoiceSlot {
    source: u32,
    id: u16,
    is_playing: bool,
    is_halted: bool,
    is_looping: bool,
    pan: f32,
    volume: f32,
    pitch: f32,
    sample_pos: f32,
}

struct MixerState {
    global_volume: f32,
    inv_out_samplerate: f32,
    max_sources: usize,
    max_uncompressed_samples: u32,
    sources: Vec<Source>,
    source_paths: Vec<String>,
    voices: Vec<VoiceSlot>,
    unique_id: u16,
}

/// The main-thread handle to the audio engine. Owned by the engine; see the
/// module docs.
pub struct Sound {
    state: Arc<Mutex<MixerState>>,
}

/// The audio-thread side: fills the platform's sample buffers from the
/// currently playing voices.
pub struct SoundMixer {
    state: Arc<Mutex<MixerState>>,
}

impl Sound {
    /// Creates the audio engine for the given output sample rate.
    pub fn new(
        samplerate: u32,
        max_sources: usize,
        max_voices: usize,
        max_uncompressed_samples: u32,
    ) -> Sound {
        assert!(samplerate > 0, "invalid output samplerate");
        Sound {
            state: Arc::new(Mutex::new(MixerState {
                global_volume: 1.0,
                inv_out_samplerate: 1.0 / samplerate as f32,
                max_sources,
                max_uncompressed_samples,
                sources: Vec::with_capacity(max_sources),
                source_paths: Vec::with_capacity(max_sources),
                voices: vec![VoiceSlot::default(); max_voices],
                unique_id: 0,
            })),
        }
    }

    /// The handle for the platform's audio callback.
    pub fn mixer(&self) -> SoundMixer {
        SoundMixer {
            state: self.state.clone(),
        }
    }

    /// Load a sound source from an asset. Calling this multiple times with
    /// the same path returns the same, cached source. Sources short enough
    /// (by the configured sample threshold) are decompressed completely;
    /// longer ones keep their decoder and are decoded frame by frame while
    /// mixing.
    pub fn source(&self, platform: &dyn Platform, path: &str) -> SourceId {
        let mut state = self.state.lock();
        if let Some(index) = state.source_paths.iter().position(|p| p == path) {
            return SourceId(index as u32);
        }
        assert!(
            state.sources.len() < state.max_sources,
            "max sound sources ({}) reached",
            state.max_sources
        );

        let (desc, bytes) = platform
            .load_sound(path)
            .unwrap_or_else(|| panic!("failed to load sound {path}"));
        log::debug!(
            "loaded sound {path} ({} samples, {} channels)",
            desc.samples,
            desc.channels
        );

        state.add_source(&desc, bytes, path)
    }

    /// Create a source directly from interleaved PCM samples, e.g. for
    /// generated audio.
    pub fn pcm_source(&self, channels: u32, samplerate: u32, samples: Box<[i16]>) -> SourceId {
        let desc = SoundDesc {
            channels,
            samplerate,
            samples: samples.len() as u32 / channels,
        };
        let mut state = self.state.lock();
        assert!(
            state.sources.len() < state.max_sources,
            "max sound sources ({}) reached",
            state.max_sources
        );
        state.add_source(&desc, SoundBytes::Pcm(samples), "")
    }

    /// Create a source from a frame decoder, subject to the same full-decode
    /// threshold as [`Sound::source`].
    pub fn compressed_source(&self, desc: SoundDesc, decoder: Box<dyn FrameDecoder>) -> SourceId {
        let mut state = self.state.lock();
        assert!(
            state.sources.len() < state.max_sources,
            "max sound sources ({}) reached",
            state.max_sources
        );
        state.add_source(&desc, SoundBytes::Compressed(decoder), "")
    }

    /// The duration of a source in seconds.
    pub fn source_duration(&self, source: SourceId) -> f32 {
        let state = self.state.lock();
        let source = &state.sources[source.0 as usize];
        source.len as f32 / source.samplerate as f32
    }

    /// The current source table position; sources loaded after this are
    /// dropped by [`Sound::reset`].
    pub fn mark(&self) -> SourceMark {
        SourceMark {
            index: self.state.lock().sources.len(),
        }
    }

    /// Drop all sources loaded after `mark` and silence the voices playing
    /// them.
    pub fn reset(&self, mark: SourceMark) {
        let mut state = self.state.lock();
        for voice in &mut state.voices {
            if voice.source as usize >= mark.index {
                voice.id = 0;
                voice.is_playing = false;
                voice.is_halted = false;
                voice.is_looping = false;
                voice.source = 0;
            }
        }
        state.sources.truncate(mark.index);
        state.source_paths.truncate(mark.index);
    }

    /// Put all playing voices in a halt state, e.g. for a pause screen.
    pub fn halt(&self) {
        let mut state = self.state.lock();
        for voice in &mut state.voices {
            if voice.is_playing {
                voice.is_playing = false;
                voice.is_halted = true;
            }
        }
    }

    /// Resume all halted voices.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        for voice in &mut state.voices {
            if voice.is_halted {
                voice.is_playing = true;
                voice.is_halted = false;
            }
        }
    }

    /// The global volume applied to all voices.
    pub fn global_volume(&self) -> f32 {
        self.state.lock().global_volume
    }

    /// Set the global volume, clamped to 0..1.
    pub fn set_global_volume(&self, volume: f32) {
        self.state.lock().global_volume = volume.clamp(0.0, 1.0);
    }

    /// Obtain a free voice for the given source. The voice is reserved (it
    /// can't be recycled) until [`Sound::dispose`], and starts out paused.
    /// Returns an invalid handle when no slot is free.
    pub fn voice(&self, source: SourceId) -> Voice {
        let mut state = self.state.lock();
        assert!((source.0 as usize) < state.sources.len(), "invalid sound source");

        // Prefer a slot that's neither reserved nor playing.
        let mut slot = (state.voices.iter())
            .position(|v| !v.is_playing && !v.is_halted && v.id == 0);

        // Fall back to any unreserved slot; this cuts off a free-playing
        // voice.
        if slot.is_none() {
            slot = state.voices.iter().position(|v| v.id == 0);
        }

        let Some(index) = slot else {
            return Voice::INVALID;
        };

        state.unique_id = state.unique_id.wrapping_add(1);
        if state.unique_id == 0 {
            state.unique_id = 1;
        }
        let id = state.unique_id;

        state.voices[index] = VoiceSlot {
            source: source.0,
            id,
            is_playing: false,
            is_halted: false,
            is_looping: false,
            pan: 0.0,
            volume: 1.0,
            pitch: 1.0,
            sample_pos: 0.0,
        };

        Voice {
            id,
            index: index as u16,
        }
    }

    /// Play a source. The voice used is disposed right away, so it recycles
    /// automatically after playing through.
    pub fn play(&self, source: SourceId) {
        let voice = self.voice(source);
        self.unpause(voice);
        self.dispose(voice);
    }

    /// [`Sound::play`] with the given volume, pan and pitch.
    pub fn play_ex(&self, source: SourceId, volume: f32, pan: f32, pitch: f32) {
        let voice = self.voice(source);
        self.set_volume(voice, volume);
        self.set_pan(voice, pan);
        self.set_pitch(voice, pitch);
        self.unpause(voice);
        self.dispose(voice);
    }

    /// Unpause a paused voice.
    pub fn unpause(&self, voice: Voice) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slot(voice) {
            slot.is_playing = true;
            slot.is_halted = false;
        }
    }

    /// Pause a voice.
    pub fn pause(&self, voice: Voice) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slot(voice) {
            slot.is_playing = false;
            slot.is_halted = false;
        }
    }

    /// Pause a voice and rewind it to the start.
    pub fn stop(&self, voice: Voice) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slot(voice) {
            slot.sample_pos = 0.0;
            slot.is_playing = false;
            slot.is_halted = false;
        }
    }

    /// Give up the reservation on a voice. The handle is stale afterwards,
    /// but the voice still plays to its end if it's unpaused and not
    /// looping.
    pub fn dispose(&self, voice: Voice) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slot(voice) {
            slot.is_looping = false;
            slot.id = 0;
        }
    }

    /// Whether this voice loops.
    pub fn looping(&self, voice: Voice) -> bool {
        let mut state = self.state.lock();
        state.slot(voice).map(|s| s.is_looping).unwrap_or(false)
    }

    /// Set whether this voice loops.
    pub fn set_looping(&self, voice: Voice, looping: bool) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slot(voice) {
            slot.is_looping = looping;
        }
    }

    /// The duration in seconds of the voice's source (pitch not accounted
    /// for).
    pub fn duration(&self, voice: Voice) -> f32 {
        let mut state = self.state.lock();
        let Some(slot) = state.slot(voice) else {
            return 0.0;
        };
        let source = slot.source as usize;
        let source = &state.sources[source];
        source.len as f32 / source.samplerate as f32
    }

    /// The current position of this voice in seconds (pitch not accounted
    /// for).
    pub fn time(&self, voice: Voice) -> f32 {
        let mut state = self.state.lock();
        let Some(slot) = state.slot(voice) else {
            return 0.0;
        };
        let (sample_pos, source) = (slot.sample_pos, slot.source as usize);
        sample_pos / state.sources[source].samplerate as f32
    }

    /// Set the current position of this voice in seconds.
    pub fn set_time(&self, voice: Voice, time: f32) {
        let mut state = self.state.lock();
        let Some(slot) = state.slot(voice) else {
            return;
        };
        let source_index = slot.source as usize;
        let source = &state.sources[source_index];
        let sample_pos = (time * source.samplerate as f32).clamp(0.0, source.len as f32);
        state.slot(voice).unwrap().sample_pos = sample_pos;
    }

    /// The voice's volume.
    pub fn volume(&self, voice: Voice) -> f32 {
        let mut state = self.state.lock();
        state.slot(voice).map(|s| s.volume).unwrap_or(0.0)
    }

    /// Set the voice's volume, clamped to 0..16.
    pub fn set_volume(&self, voice: Voice, volume: f32) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slot(voice) {
            slot.volume = volume.clamp(0.0, 16.0);
        }
    }

    /// The voice's pan: -1 = left, 0 = center, 1 = right.
    pub fn pan(&self, voice: Voice) -> f32 {
        let mut state = self.state.lock();
        state.slot(voice).map(|s| s.pan).unwrap_or(0.0)
    }

    /// Set the voice's pan, clamped to -1..1.
    pub fn set_pan(&self, voice: Voice, pan: f32) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slot(voice) {
            slot.pan = pan.clamp(-1.0, 1.0);
        }
    }

    /// The voice's pitch (playback speed). Default 1; negative plays
    /// backwards.
    pub fn pitch(&self, voice: Voice) -> f32 {
        let mut state = self.state.lock();
        state.slot(voice).map(|s| s.pitch).unwrap_or(0.0)
    }

    /// Set the voice's pitch.
    pub fn set_pitch(&self, voice: Voice, pitch: f32) {
        let mut state = self.state.lock();
        if let Some(slot) = state.slot(voice) {
            slot.pitch = pitch;
        }
    }
}

impl MixerState {
    fn slot(&mut self, voice: Voice) -> Option<&mut VoiceSlot> {
        if voice.id == 0 {
            return None;
        }
        let slot = self.voices.get_mut(voice.index as usize)?;
        (slot.id == voice.id).then_some(slot)
    }

    fn add_source(&mut self, desc: &SoundDesc, bytes: SoundBytes, path: &str) -> SourceId {
        assert!(
            desc.channels == 1 || desc.channels == 2,
            "sound {path} has {} channels",
            desc.channels
        );
        assert!(desc.samplerate > 0, "sound {path} has no samplerate");

        let total_samples = desc.samples * desc.channels;
        let data = match bytes {
            SoundBytes::Pcm(samples) => {
                assert_eq!(
                    samples.len(),
                    total_samples as usize,
                    "sound {path} sample count mismatch"
                );
                SourceData::Pcm(samples)
            }
            SoundBytes::Compressed(mut decoder) => {
                if total_samples <= self.max_uncompressed_samples {
                    // Short enough to decompress completely at load time.
                    SourceData::Pcm(decode_all(&mut *decoder, desc, path))
                } else {
                    // Decoded on demand while mixing; materialize the first
                    // frame right away.
                    let frame_len = decoder.frame_len() as usize;
                    let mut pcm_buffer =
                        vec![0i16; frame_len * desc.channels as usize].into_boxed_slice();
                    let decoded = decoder.decode_frame(0, &mut pcm_buffer);
                    assert!(decoded > 0, "audio decode error for {path}");
                    SourceData::Compressed {
                        decoder,
                        pcm_buffer,
                        pcm_buffer_start: 0,
                    }
                }
            }
        };

        self.sources.push(Source {
            channels: desc.channels,
            len: desc.samples,
            samplerate: desc.samplerate,
            data,
        });
        self.source_paths.push(path.to_string());
        SourceId(self.sources.len() as u32 - 1)
    }

    fn mix(&mut self, dest: &mut [f32]) {
        debug_assert_eq!(0, dest.len() % AUDIO_CHANNELS);
        dest.fill(0.0);

        // Samples are stored as i16 and every sample gets multiplied by the
        // global volume anyway, so fold the i16-to-float normalization into
        // the same factor.
        let volume_normalize = self.global_volume / 32768.0;
        let inv_out_samplerate = self.inv_out_samplerate;

        let MixerState {
            sources, voices, ..
        } = self;

        for voice in voices.iter_mut() {
            if !voice.is_playing || voice.volume <= 0.0 {
                continue;
            }
            let source = &mut sources[voice.source as usize];
            if source.len == 0 {
                continue;
            }

            let vol_left = volume_normalize * voice.volume * (1.0 - voice.pan).clamp(0.0, 1.0);
            let vol_right = volume_normalize * voice.volume * (1.0 + voice.pan).clamp(0.0, 1.0);

            // Step the source cursor at the ratio of the sample rates.
            // Nearest-neighbor resampling, which is crunchy but cheap.
            let pitch = voice.pitch * source.samplerate as f32 * inv_out_samplerate;
            let c = if source.channels == 2 { 1u32 } else { 0u32 };
            let source_len = source.len;

            let mut di = 0;
            while di + 1 < dest.len() {
                let mut source_index = (voice.sample_pos as u32).min(source_len - 1);

                let samples: &[i16] = match &mut source.data {
                    SourceData::Pcm(samples) => samples,
                    SourceData::Compressed {
                        decoder,
                        pcm_buffer,
                        pcm_buffer_start,
                    } => {
                        // A different frame may have to be decoded for this
                        // index, overwriting the source's frame buffer. This
                        // causes redundant decodes when voices play the same
                        // source at very different positions.
                        let frame_len = decoder.frame_len();
                        if source_index < *pcm_buffer_start
                            || source_index >= *pcm_buffer_start + frame_len
                        {
                            let frame_index = source_index / frame_len;
                            decoder.decode_frame(frame_index, pcm_buffer);
                            *pcm_buffer_start = frame_index * frame_len;
                        }
                        source_index -= *pcm_buffer_start;
                        pcm_buffer
                    }
                };

                let base = (source_index << c) as usize;
                dest[di] += samples[base] as f32 * vol_left;
                dest[di + 1] += samples[base + c as usize] as f32 * vol_right;

                voice.sample_pos += pitch;
                if voice.sample_pos >= source_len as f32 || voice.sample_pos < 0.0 {
                    if voice.is_looping {
                        // Wrap by modulo; the extra term handles negative
                        // pitch.
                        let pos = voice.sample_pos;
                        voice.sample_pos = pos % source_len as f32
                            + if pos < 0.0 { source_len as f32 } else { 0.0 };
                    } else {
                        voice.is_playing = false;
                        break;
                    }
                }
                di += 2;
            }
        }
    }
}

impl SoundMixer {
    /// Fill `dest` (interleaved stereo, so two values per frame) with the
    /// mix of all playing voices. Values are normalized to -1..1 but not
    /// clamped; the caller clips.
    pub fn mix(&self, dest: &mut [f32]) {
        self.state.lock().mix(dest);
    }
}

fn decode_all(decoder: &mut dyn FrameDecoder, desc: &SoundDesc, path: &str) -> Box<[i16]> {
    let channels = desc.channels as usize;
    let frame_len = decoder.frame_len() as usize;
    let samples = desc.samples as usize;

    let mut pcm = vec![0i16; samples * channels];
    let mut frame = vec![0i16; frame_len * channels];
    let mut sample_index = 0usize;
    let mut frame_index = 0u32;
    while sample_index < samples {
        let decoded = decoder.decode_frame(frame_index, &mut frame) as usize;
        assert!(decoded > 0, "audio decode error for {path}");
        let take = decoded.min(samples - sample_index);
        pcm[sample_index * channels..(sample_index + take) * channels]
            .copy_from_slice(&frame[..take * channels]);
        sample_index += take;
        frame_index += 1;
    }
    pcm.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::{Sound, Voice};
    use platform::{FrameDecoder, SoundDesc};

    fn sound_48k() -> Sound {
        Sound::new(48000, 128, 32, 64 * 1024)
    }

    /// A "compressed" source that decodes a deterministic ramp, with a tiny
    /// frame so the frame-window logic gets exercised.
    struct RampDecoder {
        samples: u32,
        frame_len: u32,
        decodes: std::sync::Arc<std::sync::atomic::AtomicU32>,
    }

    impl FrameDecoder for RampDecoder {
        fn frame_len(&self) -> u32 {
            self.frame_len
        }

        fn decode_frame(&mut self, frame_index: u32, out: &mut [i16]) -> u32 {
            self.decodes
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let start = frame_index * self.frame_len;
            if start >= self.samples {
                return 0;
            }
            let len = self.frame_len.min(self.samples - start);
            for i in 0..len {
                out[i as usize] = (start + i) as i16;
            }
            len
        }
    }

    #[test]
    fn pcm_mixes_at_unity() {
        let sound = sound_48k();
        let source = sound.pcm_source(1, 48000, vec![16384i16; 8].into_boxed_slice());

        let voice = sound.voice(source);
        sound.unpause(voice);

        let mixer = sound.mixer();
        let mut dest = [0.0f32; 8];
        mixer.mix(&mut dest);

        // Mono source, centered pan: both channels get the sample at half
        // scale of i16 max.
        for frame in dest.chunks(2) {
            assert!((frame[0] - 0.5).abs() < 1e-3);
            assert!((frame[1] - 0.5).abs() < 1e-3);
        }
        // 4 stereo frames consumed 4 source samples.
        assert!((sound.time(voice) * 48000.0 - 4.0).abs() < 1e-3);
    }

    #[test]
    fn pan_splits_the_channels() {
        let sound = sound_48k();
        let source = sound.pcm_source(1, 48000, vec![16384i16; 64].into_boxed_slice());
        let voice = sound.voice(source);
        sound.set_pan(voice, 1.0);
        sound.unpause(voice);

        let mut dest = [0.0f32; 16];
        sound.mixer().mix(&mut dest);
        for frame in dest.chunks(2) {
            assert_eq!(0.0, frame[0]);
            assert!(frame[1] > 0.0);
        }
    }

    #[test]
    fn finished_voice_stops_playing() {
        let sound = sound_48k();
        let source = sound.pcm_source(1, 48000, vec![100i16; 4].into_boxed_slice());
        let voice = sound.voice(source);
        sound.unpause(voice);

        let mut dest = [0.0f32; 64];
        sound.mixer().mix(&mut dest);

        // 4 samples of audio, the rest of the buffer stays silent.
        assert!(dest[..8].iter().all(|&s| s != 0.0));
        assert!(dest[8..].iter().all(|&s| s == 0.0));

        // Mixing again produces nothing; the voice stopped.
        let mut dest2 = [1.0f32; 16];
        sound.mixer().mix(&mut dest2);
        assert!(dest2.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn looping_wraps_the_cursor_to_zero() {
        let sound = sound_48k();
        let len = 25u32;
        let source = sound.pcm_source(1, 48000, vec![1000i16; len as usize].into_boxed_slice());
        let voice = sound.voice(source);
        sound.set_looping(voice, true);
        sound.unpause(voice);

        let mut dest = vec![0.0f32; len as usize * 2];
        sound.mixer().mix(&mut dest);

        // After exactly source-length samples at pitch 1, the cursor is back
        // at a multiple of the source length.
        assert_eq!(0.0, sound.time(voice));
        assert!(dest.iter().all(|&s| s != 0.0));
    }

    #[test]
    fn negative_pitch_plays_and_wraps() {
        let sound = sound_48k();
        let source = sound.pcm_source(1, 48000, vec![1000i16; 32].into_boxed_slice());
        let voice = sound.voice(source);
        sound.set_looping(voice, true);
        sound.set_pitch(voice, -1.0);
        sound.set_time(voice, 16.0 / 48000.0);
        sound.unpause(voice);

        let mut dest = [0.0f32; 64];
        sound.mixer().mix(&mut dest);
        // Still playing and in range after running off the front.
        let time_samples = sound.time(voice) * 48000.0;
        assert!((0.0..32.0).contains(&time_samples));
    }

    #[test]
    fn compressed_source_decodes_frames_on_demand() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let decodes = Arc::new(AtomicU32::new(0));
        let sound = Sound::new(48000, 128, 32, 16);
        let desc = SoundDesc {
            channels: 1,
            samplerate: 48000,
            samples: 64,
        };
        // 64 * 1 samples > the threshold of 16, so this stays compressed.
        let source = sound.compressed_source(
            desc,
            Box::new(RampDecoder {
                samples: 64,
                frame_len: 16,
                decodes: decodes.clone(),
            }),
        );
        let voice = sound.voice(source);
        sound.unpause(voice);

        let mut dest = vec![0.0f32; 128];
        sound.mixer().mix(&mut dest);

        // The ramp comes out in order: sample k has value k.
        let volume = 1.0 / 32768.0;
        for (k, frame) in dest.chunks(2).enumerate() {
            assert!((frame[0] - k as f32 * volume).abs() < 1e-6, "sample {k}");
        }
        // One eager decode at load (which covers the first frame window),
        // then one decode per remaining 16-sample frame window.
        assert_eq!(1 + 3, decodes.load(Ordering::Relaxed));
    }

    #[test]
    fn short_compressed_sources_are_decoded_at_load() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let decodes = Arc::new(AtomicU32::new(0));
        let sound = sound_48k();
        let desc = SoundDesc {
            channels: 1,
            samplerate: 48000,
            samples: 64,
        };
        sound.compressed_source(
            desc,
            Box::new(RampDecoder {
                samples: 64,
                frame_len: 16,
                decodes: decodes.clone(),
            }),
        );
        // 64 samples fit under the 64Ki threshold: everything was decoded up
        // front.
        assert_eq!(4, decodes.load(Ordering::Relaxed));
    }

    #[test]
    fn reserved_voices_are_not_recycled() {
        let sound = sound_48k();
        let source = sound.pcm_source(1, 48000, vec![0i16; 1].into_boxed_slice());

        // Fill all 32 slots with reserved voices, unpaused, at pitch 0 so
        // they never advance.
        let mut voices = Vec::new();
        for _ in 0..32 {
            let voice = sound.voice(source);
            assert!(voice.is_valid());
            sound.set_pitch(voice, 0.0);
            sound.unpause(voice);
            voices.push(voice);
        }

        // No free slot: play() comes back without clobbering anything.
        sound.play(source);
        for voice in &voices {
            assert_eq!(1.0, sound.volume(*voice), "reserved voice was clobbered");
        }

        // Dispose one; its slot becomes eligible and the next acquire gets a
        // fresh id there.
        sound.dispose(voices[7]);
        let recycled = sound.voice(source);
        assert!(recycled.is_valid());
        assert_eq!(7, recycled.index);
        assert!(recycled.id > voices[31].id);
        // The stale handle no longer controls the slot.
        assert_eq!(0.0, sound.volume(voices[7]));
    }

    #[test]
    fn disposed_voice_recycles_after_playthrough() {
        let sound = Sound::new(48000, 128, 1, 64 * 1024);
        let source = sound.pcm_source(1, 48000, vec![100i16; 4].into_boxed_slice());

        let first = sound.voice(source);
        sound.unpause(first);
        sound.dispose(first);

        // While it plays, the only slot is taken but unreserved, so a new
        // acquire cuts it off.
        let mut dest = [0.0f32; 4];
        sound.mixer().mix(&mut dest);

        let second = sound.voice(source);
        assert!(second.is_valid());
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn invalid_handles_are_noops() {
        let sound = sound_48k();
        let source = sound.pcm_source(1, 48000, vec![0i16; 8].into_boxed_slice());
        let live = sound.voice(source);

        sound.set_volume(Voice::INVALID, 3.0);
        sound.unpause(Voice::INVALID);
        assert_eq!(0.0, sound.volume(Voice::INVALID));
        assert_eq!(0.0, sound.duration(Voice::INVALID));
        // The real voice is untouched.
        assert_eq!(1.0, sound.volume(live));
    }

    #[test]
    fn reset_silences_scene_sources() {
        let sound = sound_48k();
        let keep = sound.pcm_source(1, 48000, vec![10i16; 8].into_boxed_slice());
        let mark = sound.mark();
        let scene_source = sound.pcm_source(1, 48000, vec![10i16; 8].into_boxed_slice());

        let keep_voice = sound.voice(keep);
        let scene_voice = sound.voice(scene_source);
        sound.unpause(keep_voice);
        sound.unpause(scene_voice);

        sound.reset(mark);

        // The scene voice is gone, the persistent one survives.
        assert_eq!(0.0, sound.volume(scene_voice));
        assert_eq!(1.0, sound.volume(keep_voice));
    }

    #[test]
    fn halt_and_resume_round_trip() {
        let sound = sound_48k();
        let source = sound.pcm_source(1, 48000, vec![500i16; 1000].into_boxed_slice());
        let voice = sound.voice(source);
        sound.unpause(voice);

        sound.halt();
        let mut dest = [1.0f32; 8];
        sound.mixer().mix(&mut dest);
        assert!(dest.iter().all(|&s| s == 0.0));

        sound.resume();
        sound.mixer().mix(&mut dest);
        assert!(dest.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn global_volume_scales_everything() {
        let sound = sound_48k();
        let source = sound.pcm_source(1, 48000, vec![16384i16; 64].into_boxed_slice());
        let voice = sound.voice(source);
        sound.unpause(voice);

        sound.set_global_volume(0.5);
        let mut dest = [0.0f32; 8];
        sound.mixer().mix(&mut dest);
        assert!((dest[0] - 0.25).abs() < 1e-3);

        // Clamped to 0..1.
        sound.set_global_volume(4.0);
        assert_eq!(1.0, sound.global_volume());
    }
}

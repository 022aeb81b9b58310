// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

/// Description of an audio asset's PCM layout, as reported by the decoder.
#[derive(Debug, Clone, Copy)]
pub struct SoundDesc {
    /// Amount of interleaved channels, 1 or 2.
    pub channels: u32,
    /// Samples per second per channel.
    pub samplerate: u32,
    /// Total length of the sound in samples per channel.
    pub samples: u32,
}

/// The payload of a loaded audio asset: either PCM right away, or a decoder
/// that can materialize any frame of the sound on demand.
pub enum SoundBytes {
    /// Fully decoded interleaved 16-bit PCM,
    /// `samples * channels` values long.
    Pcm(Box<[i16]>),
    /// A compressed sound, decodable one fixed-size frame at a time.
    Compressed(Box<dyn FrameDecoder>),
}

/// Frame-wise decoder for a compressed audio asset. Implemented by the
/// platform/loader layer (e.g. on top of a QOA decoder); the engine only sees
/// frames of interleaved PCM.
pub trait FrameDecoder: Send {
    /// The fixed length of a frame, in samples per channel. Every frame
    /// except the last decodes to exactly this many samples.
    fn frame_len(&self) -> u32;

    /// Decode the frame with the given index into `out`, which holds at least
    /// `frame_len() * channels` values. Returns the amount of samples per
    /// channel actually decoded, 0 past the end of the sound or on a decode
    /// error.
    fn decode_frame(&mut self, frame_index: u32, out: &mut [i16]) -> u32;
}

// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! This crate revolves around the [`Platform`] trait, which can be implemented
//! to provide a "platform implementation" for the game engine: a window, a
//! renderer backend, an audio output, an input event source, and a way to read
//! asset bytes. The engine itself never talks to the operating system
//! directly.
//!
//! This is split off of the main engine crate so that the engine and the
//! platform implementation can be compiled independently, which appears to
//! speed up compilation time.

#![warn(missing_docs)]

mod input;
mod render;
mod sound;

pub use input::*;
pub use render::*;
pub use sound::*;

/// The amount of channels in the audio stream mixed by the engine: always
/// interleaved stereo.
pub const AUDIO_CHANNELS: usize = 2;

/// The callback the engine registers with [`Platform::set_audio_mix`]. Fills
/// the given buffer with interleaved stereo samples in the -1..1 range (not
/// clamped, the platform is expected to clip). Called from whichever thread
/// the platform runs audio on.
pub type AudioMixFn = Box<dyn FnMut(&mut [f32]) + Send>;

/// A trait for using platform-dependent features from the engine without
/// depending on any platform implementation directly.
///
/// All the functions take `&self` so that implementations can use internal
/// mutability while the platform object stays as widely shareable as possible
/// (a "platform" is about as global an object as you get). None of these
/// functions are hot enough for dynamic dispatch to matter, and keeping the
/// trait object safe avoids generics bleeding into the engine.
pub trait Platform {
    /// Get the current size of the screen or window, in physical pixels.
    fn screen_size(&self) -> (i32, i32);

    /// Called by the engine at the start of the draw pass, before any
    /// [`Platform::draw_quad`] calls for the frame.
    fn frame_prepare(&self);

    /// Called by the engine after all draw calls for the frame have been
    /// issued. The platform should present the frame here.
    fn frame_end(&self);

    /// Render one textured quad. The vertices are in screen space, in the
    /// order top-left, top-right, bottom-right, bottom-left.
    fn draw_quad(&self, quad: &QuadVerts, texture: Texture);

    /// Create a texture of the given size from tightly packed pixel data.
    /// `pixels` must be `width * height * format.bytes_per_pixel()` bytes.
    fn texture_create(&self, width: u32, height: u32, format: PixelFormat, pixels: &[u8])
        -> Texture;

    /// Replace the pixel data of a texture previously created with
    /// [`Platform::texture_create`]. The size must match the original.
    fn texture_replace_pixels(&self, texture: Texture, width: u32, height: u32, pixels: &[u8]);

    /// Get a mark of the current texture storage position. Textures created
    /// after taking a mark are destroyed by [`Platform::textures_reset`] with
    /// that mark. Used by the engine for the per-scene texture lifecycle.
    fn textures_mark(&self) -> TextureMark;

    /// Destroy all textures created after `mark` was taken.
    fn textures_reset(&self, mark: TextureMark);

    /// Read the whole asset at `path` into memory. Returns None if the asset
    /// does not exist or can't be read.
    fn load_asset(&self, path: &str) -> Option<Box<[u8]>>;

    /// Read and decode the image asset at `path` into tightly packed RGBA
    /// pixels. Returns the size and the pixel bytes, or None if the asset
    /// does not exist or can't be decoded.
    fn load_image(&self, path: &str) -> Option<(u32, u32, Box<[u8]>)>;

    /// Read and decode the audio asset at `path`. Returns None if the asset
    /// does not exist or can't be decoded. Whether the payload is PCM or
    /// frame-decodable compressed data is up to the loader; the engine
    /// handles both (and decompresses short compressed sounds completely at
    /// load time).
    fn load_sound(&self, path: &str) -> Option<(SoundDesc, SoundBytes)>;

    /// The current time in seconds since some fixed point in the past
    /// (usually program start).
    fn now(&self) -> f64;

    /// The sample rate of the audio output, in samples per second.
    fn samplerate(&self) -> u32;

    /// Register the audio mix callback. The platform calls it whenever it
    /// needs more audio, possibly from a dedicated audio thread.
    fn set_audio_mix(&self, mix: AudioMixFn);

    /// Request the process to exit, with `clean: false` if intending to
    /// signal failure. The engine calls this for fatal errors that are not
    /// plain panics.
    fn exit(&self, clean: bool);
}

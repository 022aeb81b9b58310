// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! A headless [`Platform`] implementation for the engine's own tests, with a
//! settable clock and in-memory asset registries.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use platform::{
    AudioMixFn, PixelFormat, Platform, QuadVerts, SoundBytes, SoundDesc, Texture, TextureMark,
};

#[derive(Default)]
pub struct TestPlatform {
    now: Cell<f64>,
    textures_created: Cell<u32>,
    textures_live: Cell<u32>,
    quads_drawn: Cell<u32>,
    frames_ended: Cell<u32>,
    assets: RefCell<HashMap<String, Vec<u8>>>,
    images: RefCell<HashMap<String, (u32, u32, Vec<u8>)>>,
    sounds: RefCell<HashMap<String, (SoundDesc, Vec<i16>)>>,
    audio_mix: RefCell<Option<AudioMixFn>>,
}

impl TestPlatform {
    pub fn new() -> TestPlatform {
        TestPlatform::default()
    }

    pub fn set_now(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn add_asset(&self, path: &str, bytes: &[u8]) {
        self.assets.borrow_mut().insert(path.to_string(), bytes.to_vec());
    }

    pub fn add_image(&self, path: &str, width: u32, height: u32) {
        let pixels = vec![0xFFu8; (width * height * 4) as usize];
        self.images
            .borrow_mut()
            .insert(path.to_string(), (width, height, pixels));
    }

    pub fn add_sound(&self, path: &str, desc: SoundDesc, samples: Vec<i16>) {
        self.sounds
            .borrow_mut()
            .insert(path.to_string(), (desc, samples));
    }

    pub fn quads_drawn(&self) -> u32 {
        self.quads_drawn.get()
    }

    pub fn frames_ended(&self) -> u32 {
        self.frames_ended.get()
    }

    pub fn textures_live(&self) -> u32 {
        self.textures_live.get()
    }

    /// Runs the registered audio callback, like the host audio thread would.
    pub fn pump_audio(&self, dest: &mut [f32]) {
        if let Some(mix) = self.audio_mix.borrow_mut().as_mut() {
            mix(dest);
        }
    }
}

impl Platform for TestPlatform {
    fn screen_size(&self) -> (i32, i32) {
        (640, 480)
    }

    fn frame_prepare(&self) {}

    fn frame_end(&self) {
        self.frames_ended.set(self.frames_ended.get() + 1);
    }

    fn draw_quad(&self, _quad: &QuadVerts, _texture: Texture) {
        self.quads_drawn.set(self.quads_drawn.get() + 1);
    }

    fn texture_create(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: &[u8],
    ) -> Texture {
        assert_eq!(
            (width * height) as usize * format.bytes_per_pixel(),
            pixels.len(),
            "texture pixel buffer size mismatch"
        );
        let id = self.textures_created.get();
        self.textures_created.set(id + 1);
        self.textures_live.set(self.textures_live.get() + 1);
        Texture::new(id)
    }

    fn texture_replace_pixels(&self, _texture: Texture, _width: u32, _height: u32, _pixels: &[u8]) {
    }

    fn textures_mark(&self) -> TextureMark {
        TextureMark::new(self.textures_live.get())
    }

    fn textures_reset(&self, mark: TextureMark) {
        self.textures_live.set(mark.inner());
    }

    fn load_asset(&self, path: &str) -> Option<Box<[u8]>> {
        self.assets
            .borrow()
            .get(path)
            .map(|bytes| bytes.clone().into_boxed_slice())
    }

    fn load_image(&self, path: &str) -> Option<(u32, u32, Box<[u8]>)> {
        self.images
            .borrow()
            .get(path)
            .map(|(w, h, pixels)| (*w, *h, pixels.clone().into_boxed_slice()))
    }

    fn load_sound(&self, path: &str) -> Option<(SoundDesc, SoundBytes)> {
        self.sounds.borrow().get(path).map(|(desc, samples)| {
            (*desc, SoundBytes::Pcm(samples.clone().into_boxed_slice()))
        })
    }

    fn now(&self) -> f64 {
        self.now.get()
    }

    fn samplerate(&self) -> u32 {
        48000
    }

    fn set_audio_mix(&self, mix: AudioMixFn) {
        *self.audio_mix.borrow_mut() = Some(mix);
    }

    fn exit(&self, clean: bool) {
        panic!("TestPlatform::exit({clean}) was called");
    }
}

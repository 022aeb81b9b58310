// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Images are textures with a known size, drawable in full, in parts, or as
//! tiles from a tileset. The pixels themselves live in the renderer; the
//! engine only keeps the handle.

use bytemuck::cast_slice;
use platform::{PixelFormat, Platform};

use crate::color::Rgba;
use crate::geom::{vec2, Vec2, Vec2i};
use crate::render::Render;

/// The maximum number of images loaded at one time.
pub const IMAGE_MAX_SOURCES: usize = 1024;

/// A drawable image: a texture handle plus its size.
#[derive(Debug, Clone, Copy)]
pub struct Image {
    size: Vec2i,
    texture: platform::Texture,
}

impl Image {
    /// Creates an image from `size.x * size.y` pixels.
    pub fn from_pixels(platform: &dyn Platform, size: Vec2i, pixels: &[Rgba]) -> Image {
        assert_eq!(
            (size.x * size.y) as usize,
            pixels.len(),
            "pixel count doesn't match image size"
        );
        let texture = platform.texture_create(
            size.x as u32,
            size.y as u32,
            PixelFormat::Rgba,
            cast_slice(pixels),
        );
        Image { size, texture }
    }

    pub fn size(&self) -> Vec2i {
        self.size
    }

    /// Draw the whole image at `pos`.
    pub fn draw(&self, render: &mut Render, platform: &dyn Platform, pos: Vec2) {
        let size = self.size.to_vec2();
        render.draw(
            platform,
            pos,
            size,
            self.texture,
            Vec2::ZERO,
            size,
            Rgba::WHITE,
        );
    }

    /// Draw the `src_pos`/`src_size` rect of the image to `dst_pos` with
    /// `dst_size` and a tint color.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_ex(
        &self,
        render: &mut Render,
        platform: &dyn Platform,
        src_pos: Vec2,
        src_size: Vec2,
        dst_pos: Vec2,
        dst_size: Vec2,
        color: Rgba,
    ) {
        render.draw(
            platform, dst_pos, dst_size, self.texture, src_pos, src_size, color,
        );
    }

    /// Draw a single tile from the image, as subdivided by `tile_size`.
    pub fn draw_tile(
        &self,
        render: &mut Render,
        platform: &dyn Platform,
        tile: u32,
        tile_size: Vec2i,
        dst_pos: Vec2,
    ) {
        self.draw_tile_ex(
            render,
            platform,
            tile,
            tile_size,
            dst_pos,
            false,
            false,
            Rgba::WHITE,
        );
    }

    /// Draw a single tile and specify x/y flipping and a tint color. Flips
    /// are expressed as negative uv extents for the renderer.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_tile_ex(
        &self,
        render: &mut Render,
        platform: &dyn Platform,
        tile: u32,
        tile_size: Vec2i,
        dst_pos: Vec2,
        flip_x: bool,
        flip_y: bool,
        color: Rgba,
    ) {
        let tiles_per_row = self.size.x / tile_size.x;
        let mut src_pos = vec2(
            ((tile as i32 % tiles_per_row) * tile_size.x) as f32,
            ((tile as i32 / tiles_per_row) * tile_size.y) as f32,
        );
        let mut src_size = tile_size.to_vec2();
        let dst_size = src_size;

        if flip_x {
            src_pos.x += tile_size.x as f32;
            src_size.x = -src_size.x;
        }
        if flip_y {
            src_pos.y += tile_size.y as f32;
            src_size.y = -src_size.y;
        }
        render.draw(
            platform, dst_pos, dst_size, self.texture, src_pos, src_size, color,
        );
    }
}

/// An opaque snapshot of the image cache, for the per-scene image lifecycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageMark {
    index: usize,
}

/// A path-keyed cache of loaded images. Loading the same path twice returns
/// the same image.
#[derive(Default)]
pub struct Images {
    entries: Vec<(String, Image)>,
}

impl Images {
    /// Loads an image asset, or returns the cached one for this path.
    /// Panics if the asset can't be loaded: a missing image is considered a
    /// content bug, not a runtime condition.
    pub fn load(&mut self, platform: &dyn Platform, path: &str) -> Image {
        if let Some((_, image)) = self.entries.iter().find(|(p, _)| p == path) {
            return *image;
        }
        assert!(
            self.entries.len() < IMAGE_MAX_SOURCES,
            "max images ({IMAGE_MAX_SOURCES}) reached"
        );

        let (width, height, pixels) = platform
            .load_image(path)
            .unwrap_or_else(|| panic!("failed to load image {path}"));
        log::debug!("loaded image {path} ({width}x{height})");

        let image = Image::from_pixels(
            platform,
            Vec2i::new(width as i32, height as i32),
            cast_slice(&pixels),
        );
        self.entries.push((path.to_string(), image));
        image
    }

    /// The current cache position; images loaded after this are dropped by
    /// [`Images::reset`].
    pub fn mark(&self) -> ImageMark {
        ImageMark {
            index: self.entries.len(),
        }
    }

    /// Forget all images loaded after `mark`. The textures themselves are
    /// destroyed by the platform's texture mark reset.
    pub fn reset(&mut self, mark: ImageMark) {
        self.entries.truncate(mark.index);
    }
}

#[cfg(test)]
mod tests {
    use super::{Image, Images};
    use crate::color::Rgba;
    use crate::geom::{vec2, vec2i};
    use crate::render::{Render, RenderOpts};
    use crate::test_platform::TestPlatform;

    fn render_320x240() -> Render {
        let opts = RenderOpts {
            render_size: vec2i(320, 240),
            ..RenderOpts::default()
        };
        Render::new(opts, vec2i(640, 480))
    }

    #[test]
    fn draws_emit_quads_and_offscreen_is_culled() {
        let platform = TestPlatform::new();
        let mut render = render_320x240();
        let image = Image::from_pixels(&platform, vec2i(16, 16), &[Rgba::WHITE; 256]);

        image.draw_tile(&mut render, &platform, 2, vec2i(8, 8), vec2(10.0, 10.0));
        assert_eq!(1, platform.quads_drawn());

        image.draw(&mut render, &platform, vec2(-500.0, 0.0));
        assert_eq!(1, platform.quads_drawn());
        assert_eq!(1, render.draw_calls());
    }

    #[test]
    fn cache_returns_the_same_image_and_resets_by_mark() {
        let platform = TestPlatform::new();
        platform.add_image("a.qoi", 8, 8);
        platform.add_image("b.qoi", 8, 8);

        let mut images = Images::default();
        let a1 = images.load(&platform, "a.qoi");
        let mark = images.mark();
        images.load(&platform, "b.qoi");
        assert_eq!(2, platform.textures_live());

        images.reset(mark);
        let a2 = images.load(&platform, "a.qoi");
        assert_eq!(a1.size(), a2.size());
        // "b.qoi" is gone from the cache; "a.qoi" survived it.
        assert_eq!(2, images.mark().index + 1);
    }

    #[test]
    #[should_panic]
    fn pixel_count_mismatch_is_fatal() {
        let platform = TestPlatform::new();
        Image::from_pixels(&platform, vec2i(4, 4), &[Rgba::WHITE; 3]);
    }
}

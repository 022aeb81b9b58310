// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! The drawing mid-layer: logical-to-physical coordinate scaling, the
//! transform stack, and the quad building that images, fonts, maps and
//! animations all go through. The actual rasterization lives behind
//! [`Platform::draw_quad`].

use arrayvec::ArrayVec;
use bitflags::bitflags;
use platform::{Platform, QuadVerts, Texture, Vertex};

use crate::color::Rgba;
use crate::geom::{vec2, vec2i, Mat3, Vec2, Vec2i};

/// The maximum depth of the transform stack, when using [`Render::push`].
pub const TRANSFORM_STACK_SIZE: usize = 16;

/// How the logical size is scaled up when the window is larger than the
/// render size. The desired aspect ratio is maintained (depending on the
/// [`ResizeMode`]).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    /// No scaling.
    None,
    /// Scale in integer steps for perfect pixel scaling.
    #[default]
    Discrete,
    /// Scale exactly to the window size.
    Exact,
}

bitflags! {
    /// How the logical size changes to adapt to the available window size.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResizeMode: u8 {
        /// Resize width; keep height fixed at the configured render height.
        const WIDTH = 1;
        /// Resize height; keep width fixed at the configured render width.
        const HEIGHT = 2;
    }
}

/// Configuration for the [`Render`] mid-layer.
#[derive(Debug, Clone, Copy)]
pub struct RenderOpts {
    /// The desired "logical size" of the screen. This may be different from
    /// the real pixel size, e.g. a window of 640x480 can have a render size
    /// of 320x240.
    pub render_size: Vec2i,
    pub scale_mode: ScaleMode,
    pub resize_mode: ResizeMode,
}

impl Default for RenderOpts {
    fn default() -> Self {
        RenderOpts {
            render_size: vec2i(1280, 720),
            scale_mode: ScaleMode::Discrete,
            resize_mode: ResizeMode::WIDTH | ResizeMode::HEIGHT,
        }
    }
}

/// Issues scaled, transformed quads to the platform's renderer and keeps the
/// logical/physical coordinate mapping.
pub struct Render {
    opts: RenderOpts,
    screen_size: Vec2i,
    logical_size: Vec2i,
    screen_scale: f32,
    inv_screen_scale: f32,
    draw_calls: u32,
    transform_stack: ArrayVec<Mat3, TRANSFORM_STACK_SIZE>,
}

impl Render {
    pub fn new(opts: RenderOpts, available_size: Vec2i) -> Render {
        let mut render = Render {
            opts,
            screen_size: vec2i(0, 0),
            logical_size: vec2i(0, 0),
            screen_scale: 1.0,
            inv_screen_scale: 1.0,
            draw_calls: 0,
            transform_stack: ArrayVec::new(),
        };
        render.transform_stack.push(Mat3::IDENTITY);
        render.resize(available_size);
        render
    }

    /// Returns the number of draw calls since the last time this was called.
    pub fn draw_calls(&mut self) -> u32 {
        core::mem::take(&mut self.draw_calls)
    }

    /// Recompute the logical size according to the available window size and
    /// the scale and resize modes.
    pub fn resize(&mut self, available_size: Vec2i) {
        let opts = self.opts;

        self.screen_scale = match opts.scale_mode {
            ScaleMode::None => 1.0,
            _ => {
                let scale = f32::min(
                    available_size.x as f32 / opts.render_size.x as f32,
                    available_size.y as f32 / opts.render_size.y as f32,
                );
                if opts.scale_mode == ScaleMode::Discrete {
                    f32::max(scale.floor(), 0.5)
                } else {
                    scale
                }
            }
        };

        self.screen_size.x = if opts.resize_mode.contains(ResizeMode::WIDTH) {
            available_size.x.max(opts.render_size.x)
        } else {
            (opts.render_size.x as f32 * self.screen_scale) as i32
        };
        self.screen_size.y = if opts.resize_mode.contains(ResizeMode::HEIGHT) {
            available_size.y.max(opts.render_size.y)
        } else {
            (opts.render_size.y as f32 * self.screen_scale) as i32
        };

        self.logical_size.x = (self.screen_size.x as f32 / self.screen_scale).ceil() as i32;
        self.logical_size.y = (self.screen_size.y as f32 / self.screen_scale).ceil() as i32;
        self.inv_screen_scale = 1.0 / self.screen_scale;
    }

    /// The logical size of the screen.
    pub fn size(&self) -> Vec2i {
        self.logical_size
    }

    /// Push the transform stack.
    pub fn push(&mut self) {
        let top = *self.transform_stack.last().unwrap();
        if self.transform_stack.try_push(top).is_err() {
            panic!("max transform stack size ({TRANSFORM_STACK_SIZE}) reached");
        }
    }

    /// Pop the transform stack.
    pub fn pop(&mut self) {
        if self.transform_stack.len() <= 1 {
            panic!("cannot pop from empty transform stack");
        }
        self.transform_stack.pop();
    }

    /// Translate; can only be called if the stack was pushed at least once.
    pub fn translate(&mut self, translate: Vec2) {
        assert!(
            self.transform_stack.len() > 1,
            "cannot translate initial transform, push() first"
        );
        let translate = translate * self.screen_scale;
        self.transform_stack.last_mut().unwrap().translate(translate);
    }

    /// Scale; can only be called if the stack was pushed at least once.
    pub fn scale(&mut self, scale: Vec2) {
        assert!(
            self.transform_stack.len() > 1,
            "cannot scale initial transform, push() first"
        );
        self.transform_stack.last_mut().unwrap().scale(scale);
    }

    /// Rotate; can only be called if the stack was pushed at least once.
    pub fn rotate(&mut self, rotation: f32) {
        assert!(
            self.transform_stack.len() > 1,
            "cannot rotate initial transform, push() first"
        );
        self.transform_stack.last_mut().unwrap().rotate(rotation);
    }

    /// Returns a logical position, snapped to real screen pixels.
    pub fn snap_px(&self, pos: Vec2) -> Vec2 {
        let sp = pos * self.screen_scale;
        vec2(sp.x.round(), sp.y.round()) * self.inv_screen_scale
    }

    /// Draws a rect with the given logical position, size, texture, uv coords
    /// and color, transformed by the current transform stack. Quads entirely
    /// outside the logical screen are culled.
    pub fn draw(
        &mut self,
        platform: &dyn Platform,
        pos: Vec2,
        size: Vec2,
        texture: Texture,
        uv_offset: Vec2,
        uv_size: Vec2,
        color: Rgba,
    ) {
        if pos.x > self.logical_size.x as f32
            || pos.y > self.logical_size.y as f32
            || pos.x + size.x < 0.0
            || pos.y + size.y < 0.0
        {
            return;
        }

        let pos = pos * self.screen_scale;
        let size = size * self.screen_scale;
        self.draw_calls += 1;

        let vertex = |p: Vec2, u: f32, v: f32| Vertex {
            x: p.x,
            y: p.y,
            u,
            v,
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        let mut quad = QuadVerts {
            vertices: [
                vertex(pos, uv_offset.x, uv_offset.y),
                vertex(pos + vec2(size.x, 0.0), uv_offset.x + uv_size.x, uv_offset.y),
                vertex(
                    pos + size,
                    uv_offset.x + uv_size.x,
                    uv_offset.y + uv_size.y,
                ),
                vertex(pos + vec2(0.0, size.y), uv_offset.x, uv_offset.y + uv_size.y),
            ],
        };

        if self.transform_stack.len() > 1 {
            let m = self.transform_stack.last().unwrap();
            for vertex in &mut quad.vertices {
                let p = vec2(vertex.x, vertex.y).transform(m);
                vertex.x = p.x;
                vertex.y = p.y;
            }
        }

        platform.draw_quad(&quad, texture);
    }
}

#[cfg(test)]
mod tests {
    use super::{Render, RenderOpts, ScaleMode};
    use crate::geom::{vec2, vec2i};

    fn opts_320x240() -> RenderOpts {
        RenderOpts {
            render_size: vec2i(320, 240),
            ..RenderOpts::default()
        }
    }

    #[test]
    fn discrete_scale_rounds_down() {
        let render = Render::new(opts_320x240(), vec2i(800, 600));
        // 800/320 = 2.5, 600/240 = 2.5, discrete floors to 2.
        assert_eq!(vec2i(400, 300), render.size());
    }

    #[test]
    fn exact_scale_fills_the_window() {
        let opts = RenderOpts {
            scale_mode: ScaleMode::Exact,
            ..opts_320x240()
        };
        let render = Render::new(opts, vec2i(640, 480));
        assert_eq!(vec2i(320, 240), render.size());
    }

    #[test]
    fn snap_px_rounds_in_screen_space() {
        let render = Render::new(opts_320x240(), vec2i(640, 480));
        let snapped = render.snap_px(vec2(1.3, 1.6));
        assert_eq!(vec2(1.5, 1.5), snapped);
    }

    #[test]
    #[should_panic]
    fn translate_without_push_is_fatal() {
        let mut render = Render::new(opts_320x240(), vec2i(640, 480));
        render.translate(vec2(1.0, 1.0));
    }

    #[test]
    #[should_panic]
    fn pop_of_base_transform_is_fatal() {
        let mut render = Render::new(opts_320x240(), vec2i(640, 480));
        render.pop();
    }
}

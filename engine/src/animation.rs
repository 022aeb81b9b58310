// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Animations divide a sheet image into frames of `frame_size` and play a
//! sequence of frame numbers at a fixed time per frame.
//!
//! They are split in two parts: the shared definition ([`AnimDef`]: sheet,
//! frame size, sequence, timing) and an instance ([`Anim`]: the state that
//! decides which frame to draw right now). Any number of instances can share
//! one definition.

use std::rc::Rc;

use platform::Platform;

use crate::color::Rgba;
use crate::geom::{Vec2, Vec2i};
use crate::image::Image;
use crate::rand::Rng;
use crate::render::Render;

/// Sentinel in an animation sequence: the animation stops (and holds) instead
/// of looping. Only valid as the last element.
pub const ANIM_STOP: u16 = 0xffff;

/// The shared part of an animation. Create with [`AnimDef::new`] during scene
/// init.
pub struct AnimDef {
    sheet: Image,
    frame_size: Vec2i,
    looping: bool,
    /// The rotation pivot, relative to the frame's top-left corner.
    pub pivot: Vec2,
    frame_time: f64,
    inv_total_time: f64,
    sequence: Vec<u16>,
}

impl AnimDef {
    /// Creates a definition with the given sheet, frame size, time per frame
    /// and frame sequence. A trailing [`ANIM_STOP`] makes the animation play
    /// once and hold; anywhere else in the sequence it is fatal.
    pub fn new(sheet: Image, frame_size: Vec2i, frame_time: f64, sequence: &[u16]) -> Rc<AnimDef> {
        assert!(!sequence.is_empty(), "animation has empty sequence");

        let mut looping = true;
        let mut sequence = sequence.to_vec();
        if let Some(stop_at) = sequence.iter().position(|&frame| frame == ANIM_STOP) {
            assert!(
                stop_at != 0 && stop_at == sequence.len() - 1,
                "animation can only stop on last frame"
            );
            sequence.truncate(stop_at);
            looping = false;
        }

        Rc::new(AnimDef {
            sheet,
            frame_size,
            looping,
            pivot: Vec2::ZERO,
            frame_time,
            inv_total_time: 1.0 / (sequence.len() as f64 * frame_time),
            sequence,
        })
    }

    /// The time per frame this definition was created with.
    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }
}

/// A playing instance of an [`AnimDef`]. Embedded in entities and drawn by
/// the base entity draw.
#[derive(Clone)]
pub struct Anim {
    def: Rc<AnimDef>,
    start_time: f64,
    /// Added to every frame number in the sequence; for sheets that pack
    /// several directions or variants of the same animation.
    pub tile_offset: u16,
    pub flip_x: bool,
    pub flip_y: bool,
    pub rotation: f32,
    pub color: Rgba,
}

impl Anim {
    /// Creates an instance starting at the given engine time.
    pub fn new(def: &Rc<AnimDef>, time: f64) -> Anim {
        Anim {
            def: def.clone(),
            start_time: time,
            tile_offset: 0,
            flip_x: false,
            flip_y: false,
            rotation: 0.0,
            color: Rgba::WHITE,
        }
    }

    /// Rewind the animation to the first frame of the sequence.
    pub fn rewind(&mut self, time: f64) {
        self.start_time = time;
    }

    /// Go to the nth frame of the sequence.
    pub fn goto_frame(&mut self, frame: u32, time: f64) {
        self.start_time = time + frame as f64 * self.def.frame_time;
    }

    /// Go to a random frame of the sequence.
    pub fn goto_rand(&mut self, rng: &mut Rng, time: f64) {
        let frame = rng.int(0, self.def.sequence.len() as i32 - 1) as u32;
        self.goto_frame(frame, time);
    }

    /// The number of times this animation has played through.
    pub fn looped(&self, time: f64) -> u32 {
        ((time - self.start_time) * self.def.inv_total_time) as u32
    }

    /// Draw the current frame at `pos`.
    pub fn draw(&self, render: &mut Render, platform: &dyn Platform, pos: Vec2, time: f64) {
        let def = &self.def;
        let rs = render.size();
        if pos.x > rs.x as f32
            || pos.y > rs.y as f32
            || pos.x + (def.frame_size.x as f32) < 0.0
            || pos.y + (def.frame_size.y as f32) < 0.0
            || self.color.a == 0
        {
            return;
        }

        let diff = f64::max(0.0, time - self.start_time);
        let looped = diff * def.inv_total_time;

        let frame = if !def.looping && looped >= 1.0 {
            def.sequence.len() - 1
        } else {
            ((looped - looped.floor()) * def.sequence.len() as f64) as usize
        };
        let tile = (def.sequence[frame] + self.tile_offset) as u32;

        if self.rotation == 0.0 {
            def.sheet.draw_tile_ex(
                render,
                platform,
                tile,
                def.frame_size,
                pos,
                self.flip_x,
                self.flip_y,
                self.color,
            );
        } else {
            render.push();
            render.translate(pos + def.pivot);
            render.rotate(self.rotation);
            def.sheet.draw_tile_ex(
                render,
                platform,
                tile,
                def.frame_size,
                def.pivot * -1.0,
                self.flip_x,
                self.flip_y,
                self.color,
            );
            render.pop();
        }
    }
}

// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! A camera smoothly moves the engine's viewport towards a target position or
//! a followed entity, with a deadzone and look-ahead to keep the viewport
//! closer to the action. Using a camera is optional; the viewport can also be
//! manipulated directly.
//!
//! If a collision map is set, the camera keeps the screen within the bounds
//! of that map.

use crate::engine::Engine;
use crate::entity::{EntityKind, EntityRef};
use crate::geom::{vec2, Vec2};

/// See the module docs. Create with `Camera::default()` and adjust the
/// public fields.
pub struct Camera {
    /// A factor for how fast the camera is moving. Values between 0.5..10
    /// are usually sensible.
    pub speed: f32,

    /// A fixed offset of the screen center from the target.
    pub offset: Vec2,

    /// Whether to automatically move the bottom of the deadzone up to the
    /// target entity when the target is on the ground.
    pub snap_to_platform: bool,

    /// The minimum velocity (in pixels per second) for a camera movement. If
    /// this is set too low and the camera is close to the target, it moves a
    /// single pixel every few moments, which looks weird. 5 looks good.
    pub min_vel: f32,

    /// The size of the area around the target within which the camera does
    /// not move. The camera only moves when the target is about to leave the
    /// deadzone.
    pub deadzone: Vec2,

    /// The amount of pixels the camera should be ahead of the target.
    /// Whether "ahead" means left/right or above/below is determined by the
    /// edge of the deadzone that the target touched last.
    pub look_ahead: Vec2,

    deadzone_pos: Vec2,
    look_ahead_target: Vec2,
    follow: EntityRef,
    pos: Vec2,
    vel: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            speed: 1.0,
            offset: Vec2::ZERO,
            snap_to_platform: false,
            min_vel: 0.0,
            deadzone: Vec2::ZERO,
            look_ahead: Vec2::ZERO,
            deadzone_pos: Vec2::ZERO,
            look_ahead_target: Vec2::ZERO,
            follow: EntityRef::NONE,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
        }
    }
}

impl Camera {
    fn viewport_target<K: EntityKind>(&self, eng: &Engine<K>) -> Vec2 {
        let screen_size = eng.render.size().to_vec2();
        let screen_center = screen_size * 0.5;
        let mut target = self.pos - screen_center + self.offset;

        if let Some(map) = &eng.collision_map {
            let bounds = (map.size * map.tile_size as i32).to_vec2();
            target.x = target.x.clamp(0.0, bounds.x - screen_size.x);
            target.y = target.y.clamp(0.0, bounds.y - screen_size.y);
        }
        target
    }

    /// Advance the camera towards its target. Typically called once per
    /// frame from the scene's update.
    pub fn update<K: EntityKind>(&mut self, eng: &mut Engine<K>) {
        if let Some(follow) = eng.entity(self.follow) {
            let size = vec2(
                f32::min(follow.size.x, self.deadzone.x),
                f32::min(follow.size.y, self.deadzone.y),
            );

            if follow.pos.x < self.deadzone_pos.x {
                self.deadzone_pos.x = follow.pos.x;
                self.look_ahead_target.x = -self.look_ahead.x;
            } else if follow.pos.x + size.x > self.deadzone_pos.x + self.deadzone.x {
                self.deadzone_pos.x = follow.pos.x + size.x - self.deadzone.x;
                self.look_ahead_target.x = self.look_ahead.x;
            }

            if follow.pos.y < self.deadzone_pos.y {
                self.deadzone_pos.y = follow.pos.y;
                self.look_ahead_target.y = -self.look_ahead.y;
            } else if follow.pos.y + size.y > self.deadzone_pos.y + self.deadzone.y {
                self.deadzone_pos.y = follow.pos.y + size.y - self.deadzone.y;
                self.look_ahead_target.y = self.look_ahead.y;
            }

            if self.snap_to_platform && follow.on_ground {
                self.deadzone_pos.y = follow.pos.y + follow.size.y - self.deadzone.y;
            }

            let deadzone_target = self.deadzone_pos + self.deadzone * 0.5;
            self.pos = deadzone_target + self.look_ahead_target;
        }

        let diff = self.viewport_target(eng) - eng.viewport;
        self.vel = diff * self.speed;

        if self.vel.x.abs() + self.vel.y.abs() > self.min_vel {
            eng.viewport += self.vel * eng.tick;
        }
    }

    /// Jump the camera (and the viewport) to `pos` without movement.
    pub fn set<K: EntityKind>(&mut self, eng: &mut Engine<K>, pos: Vec2) {
        self.pos = pos;
        eng.viewport = self.viewport_target(eng);
    }

    /// Set the position the camera should move towards.
    pub fn move_to(&mut self, pos: Vec2) {
        self.pos = pos;
    }

    /// Follow an entity for as long as it's alive (or until following
    /// another target). With `snap`, jump straight to it.
    pub fn follow<K: EntityKind>(&mut self, eng: &mut Engine<K>, follow: EntityRef, snap: bool) {
        self.follow = follow;
        if snap {
            self.update(eng);
            eng.viewport = self.viewport_target(eng);
        }
    }

    /// Stop following.
    pub fn unfollow(&mut self) {
        self.follow = EntityRef::NONE;
    }
}

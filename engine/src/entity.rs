// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Every dynamic object in the game is an "entity", stored in a fixed pool
//! and addressed through generational [`EntityRef`]s. Each entity has a kind
//! from a game-defined closed enum, and each kind provides its behavior by
//! implementing [`EntityBehavior`]; unimplemented hooks fall back to the base
//! update/draw/damage routines in this module.
//!
//! The update pipeline per tick: dispatch `update` on every live entity
//! (integration, world tracing and sliding happen in the base update), sort
//! the live entities along the sweep axis, then sweep for overlapping pairs
//! and deliver `touch` and pair resolution according to the entities' groups
//! and collision modes.

use arrayvec::ArrayString;
use bitflags::bitflags;
use enum_map::{Enum, EnumArray};
use platform::Platform;

use crate::animation::Anim;
use crate::collections::{insertion_sort_by, FixedVec};
use crate::engine::Engine;
use crate::geom::{vec2, Vec2};
use crate::trace::{trace, Trace};

/// The maximum size any entity is expected to have; affects the accuracy of
/// the proximity queries.
pub const ENTITY_MAX_SIZE: f32 = 64.0;

/// The maximum length of an entity name from level data.
pub const ENTITY_NAME_MAX: usize = 31;

bitflags! {
    /// How and whether an entity is moved and collides. The single-bit
    /// constants can be combined directly if the composed modes below don't
    /// cover a case, e.g. `MOVE | COLLIDES_ACTIVE` for an entity that
    /// collides with other entities but not with the collision map.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Physics: u8 {
        const MOVE = 1 << 0;
        const COLLIDES_WORLD = 1 << 1;
        const COLLIDES_LITE = 1 << 4;
        const COLLIDES_PASSIVE = 1 << 5;
        const COLLIDES_ACTIVE = 1 << 6;
        const COLLIDES_FIXED = 1 << 7;
    }
}

impl Physics {
    /// Don't collide, don't move. Useful for items that just sit there.
    pub const NONE: Physics = Physics::empty();
    /// Move the entity according to its velocity, but don't collide.
    pub const MOVE_ONLY: Physics = Physics::MOVE;
    /// Move the entity and collide with the collision map.
    pub const WORLD: Physics = Physics::MOVE.union(Physics::COLLIDES_WORLD);
    /// Like WORLD, but also collide with other entities: in ACTIVE vs. LITE
    /// or FIXED vs. ANY collisions only the "weak" entity moves, in ACTIVE
    /// vs. ACTIVE and ACTIVE vs. PASSIVE both move. LITE and PASSIVE
    /// entities don't collide with each other at all.
    pub const LITE: Physics = Physics::WORLD.union(Physics::COLLIDES_LITE);
    pub const PASSIVE: Physics = Physics::WORLD.union(Physics::COLLIDES_PASSIVE);
    pub const ACTIVE: Physics = Physics::WORLD.union(Physics::COLLIDES_ACTIVE);
    pub const FIXED: Physics = Physics::WORLD.union(Physics::COLLIDES_FIXED);
}

bitflags! {
    /// Entities can be members of one or more groups. Together with an
    /// entity's `check_against` mask this decides which pairs get `touch`
    /// notifications: with `a.check_against` intersecting `b.group`,
    /// `touch(a, b)` is delivered when the two overlap.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Group: u8 {
        const PLAYER = 1 << 0;
        const NPC = 1 << 1;
        const ENEMY = 1 << 2;
        const ITEM = 1 << 3;
        const PROJECTILE = 1 << 4;
        const PICKUP = 1 << 5;
        const BREAKABLE = 1 << 6;
    }
}

/// The axis along which the broad phase sorts entities. Use x for mostly
/// horizontal (side view) games, y for vertical (top-down) ones.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SweepAxis {
    #[default]
    X,
    Y,
}

impl SweepAxis {
    #[inline]
    pub fn of(self, v: Vec2) -> f32 {
        match self {
            SweepAxis::X => v.x,
            SweepAxis::Y => v.y,
        }
    }
}

/// A safe handle to an entity. Refs can be resolved with
/// [`Engine::entity`]/[`Engine::entity_mut`] and resolve to None once the
/// referenced entity is dead, preventing the classic stale-slot errors of
/// direct indices.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EntityRef {
    pub(crate) id: u16,
    pub(crate) index: u16,
}

impl EntityRef {
    /// A ref that never resolves.
    pub const NONE: EntityRef = EntityRef { id: 0, index: 0 };
}

/// The game's closed set of entity kinds. Implemented on a fieldless enum
/// deriving [`enum_map::Enum`]; provides the name lookups used by level
/// loading and the per-kind behavior.
pub trait EntityKind:
    Enum + EnumArray<&'static dyn EntityBehavior<Self>> + Copy + PartialEq + 'static
{
    /// The game-defined extension payload embedded in every entity, opaque
    /// to the engine.
    type Ext: Default;
    /// The game-defined message type delivered through [`Engine::message`].
    type Message;

    /// The behavior hooks for this kind.
    fn behavior(self) -> &'static dyn EntityBehavior<Self>;

    /// The kind's name, as used by level data.
    fn name(self) -> &'static str;

    /// Look up a kind by its name. Returns None for unknown names.
    fn from_name(name: &str) -> Option<Self> {
        (0..Self::LENGTH)
            .map(Self::from_usize)
            .find(|kind| kind.name() == name)
    }
}

/// The per-kind behavior hooks. All of these are optional: the defaults are
/// no-ops, except `update`, `draw` and `damage` which fall through to the
/// base routines.
#[allow(unused_variables)]
pub trait EntityBehavior<K: EntityKind>: Sync {
    /// Called once at program start. Use this to load assets and animations
    /// for the kind.
    fn load(&self, eng: &mut Engine<K>, platform: &dyn Platform) {}

    /// Called when an entity of this kind is created through
    /// [`Engine::spawn`]. Use this to set the size, physics and animation of
    /// the entity.
    fn init(&self, eng: &mut Engine<K>, ent: EntityRef) {}

    /// Called once after a level load, when all entities have been spawned,
    /// with the entity's `settings` object from the level json.
    fn settings(&self, eng: &mut Engine<K>, ent: EntityRef, settings: &serde_json::Value) {}

    /// Called once per frame for each entity. The default moves the entity
    /// according to its physics.
    fn update(&self, eng: &mut Engine<K>, ent: EntityRef) {
        eng.entity_base_update(ent);
    }

    /// Called once per frame for each entity. The default draws the entity's
    /// animation.
    fn draw(&self, eng: &mut Engine<K>, platform: &dyn Platform, ent: EntityRef, viewport: Vec2) {
        eng.entity_base_draw(platform, ent, viewport);
    }

    /// Called when the entity is removed through [`Engine::kill`].
    fn kill(&self, eng: &mut Engine<K>, ent: EntityRef) {}

    /// Called when this entity touches another entity, according to its
    /// `check_against` mask.
    fn touch(&self, eng: &mut Engine<K>, ent: EntityRef, other: EntityRef) {}

    /// Called when the entity collides with the game world or another
    /// entity. Careful: `trace` is only set for collision map collisions; it
    /// is None for entity-on-entity collisions.
    fn collide(&self, eng: &mut Engine<K>, ent: EntityRef, normal: Vec2, trace: Option<&Trace>) {}

    /// Called through [`Engine::damage`]. The default deducts the damage
    /// from the entity's health and kills it when that reaches zero.
    fn damage(&self, eng: &mut Engine<K>, ent: EntityRef, other: EntityRef, damage: f32) {
        eng.entity_base_damage(ent, other, damage);
    }

    /// Called through [`Engine::trigger`].
    fn trigger(&self, eng: &mut Engine<K>, ent: EntityRef, other: EntityRef) {}

    /// Called through [`Engine::message`].
    fn message(&self, eng: &mut Engine<K>, ent: EntityRef, message: K::Message) {}
}

/// One entity in the pool. The fields mirror what the base physics works
/// with; the `ext` payload carries whatever the game needs beyond that.
pub struct Entity<K: EntityKind> {
    /// A unique id, stamped on spawn. 0 marks a never-used slot.
    pub(crate) id: u16,
    /// Whether the entity is in use. Dead entities are swapped out of the
    /// live prefix during the next update pass.
    pub is_alive: bool,
    /// True when standing on something, for `gravity > 0` games.
    pub on_ground: bool,
    /// Entities are drawn sorted by this, ascending.
    pub draw_order: i32,
    pub kind: K,
    pub physics: Physics,
    pub group: Group,
    pub check_against: Group,
    /// Top left position of the bounding box in the game world.
    pub pos: Vec2,
    /// The bounding box for physics.
    pub size: Vec2,
    pub vel: Vec2,
    pub accel: Vec2,
    /// Friction as a factor of tick * velocity.
    pub friction: Vec2,
    /// Offset from `pos` for drawing the animation.
    pub offset: Vec2,
    /// Name used for targets etc., usually set through level data.
    pub name: Option<ArrayString<ENTITY_NAME_MAX>>,
    /// When a damaged entity's health reaches 0, it is killed.
    pub health: f32,
    /// Gravity factor, multiplied with the engine's gravity. Default 1.
    pub gravity: f32,
    /// Mass factor for active collisions. Default 1.
    pub mass: f32,
    /// The "bounciness factor": 0 doesn't bounce, 1 bounces with the full
    /// impact velocity.
    pub restitution: f32,
    /// How steep a surface can be to still count as ground. Default
    /// cos(46°).
    pub max_ground_normal: f32,
    /// How steep a surface has to be for the entity to slide down. Default
    /// cos(0°), i.e. never slide.
    pub min_slide_normal: f32,
    /// The animation drawn by the base draw.
    pub anim: Option<Anim>,
    /// Game-defined extension payload.
    pub ext: K::Ext,
}

impl<K: EntityKind> Entity<K> {
    fn empty(kind: K) -> Entity<K> {
        Entity {
            id: 0,
            is_alive: false,
            on_ground: false,
            draw_order: 0,
            kind,
            physics: Physics::NONE,
            group: Group::empty(),
            check_against: Group::empty(),
            pos: Vec2::ZERO,
            size: Vec2::ZERO,
            vel: Vec2::ZERO,
            accel: Vec2::ZERO,
            friction: Vec2::ZERO,
            offset: Vec2::ZERO,
            name: None,
            health: 0.0,
            gravity: 0.0,
            mass: 0.0,
            restitution: 0.0,
            max_ground_normal: 0.0,
            min_slide_normal: 0.0,
            anim: None,
            ext: K::Ext::default(),
        }
    }

    fn respawn(&mut self, kind: K, id: u16, pos: Vec2) {
        *self = Entity {
            id,
            is_alive: true,
            kind,
            pos,
            size: vec2(8.0, 8.0),
            gravity: 1.0,
            mass: 1.0,
            max_ground_normal: 0.69, // cos(46°)
            min_slide_normal: 1.0,   // cos(0°)
            ..Entity::empty(kind)
        };
    }

    /// The center position of the entity, according to its pos and size.
    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }

    /// The distance in pixels between this and another entity's centers.
    pub fn dist(&self, other: &Entity<K>) -> f32 {
        self.center().dist(other.center())
    }

    /// The angle in radians of a line between this and another entity.
    pub fn angle_to(&self, other: &Entity<K>) -> f32 {
        self.center().angle_to(other.center())
    }

    /// Whether this entity's bounding box overlaps the other's.
    pub fn is_touching(&self, other: &Entity<K>) -> bool {
        !(self.pos.x >= other.pos.x + other.size.x
            || self.pos.x + self.size.x <= other.pos.x
            || self.pos.y >= other.pos.y + other.size.y
            || self.pos.y + self.size.y <= other.pos.y)
    }
}

/// The fixed entity pool: a storage array plus an order table of indices
/// whose prefix holds the live entities, sorted along the sweep axis.
pub(crate) struct Entities<K: EntityKind> {
    pub(crate) storage: Vec<Entity<K>>,
    pub(crate) order: Vec<u16>,
    pub(crate) len: usize,
    unique_id: u16,
    draw_scratch: Vec<u16>,
    pub(crate) sweep_axis: SweepAxis,
}

impl<K: EntityKind> Entities<K> {
    pub(crate) fn new(max_entities: usize, sweep_axis: SweepAxis) -> Entities<K> {
        assert!(max_entities <= u16::MAX as usize, "entity pool too large");
        let placeholder = K::from_usize(0);
        let mut entities = Entities {
            storage: (0..max_entities)
                .map(|_| Entity::empty(placeholder))
                .collect(),
            order: Vec::new(),
            len: 0,
            unique_id: 0,
            draw_scratch: Vec::with_capacity(max_entities),
            sweep_axis,
        };
        entities.reset();
        entities
    }

    pub(crate) fn reset(&mut self) {
        self.order.clear();
        self.order.extend(0..self.storage.len() as u16);
        self.len = 0;
        for entity in &mut self.storage {
            entity.is_alive = false;
        }
    }

    pub(crate) fn spawn_slot(&mut self, kind: K, pos: Vec2) -> Option<EntityRef> {
        if self.len >= self.storage.len() {
            return None;
        }
        let index = self.order[self.len];
        self.len += 1;

        // Id 0 is reserved for "never resolves", skip it on wrap-around.
        self.unique_id = self.unique_id.wrapping_add(1);
        if self.unique_id == 0 {
            self.unique_id = 1;
        }
        let id = self.unique_id;

        self.storage[index as usize].respawn(kind, id, pos);
        Some(EntityRef { id, index })
    }

    pub(crate) fn resolve(&self, ent: EntityRef) -> Option<usize> {
        if ent.id == 0 {
            return None;
        }
        let slot = self.storage.get(ent.index as usize)?;
        (slot.is_alive && slot.id == ent.id).then_some(ent.index as usize)
    }

    pub(crate) fn ref_at(&self, index: usize) -> EntityRef {
        EntityRef {
            id: self.storage[index].id,
            index: index as u16,
        }
    }
}

impl<K: EntityKind> Engine<K> {
    /// Spawn an entity of the given kind at the given position. Returns None
    /// if the pool is full.
    pub fn spawn(&mut self, kind: K, pos: Vec2) -> Option<EntityRef> {
        let ent = self.entities.spawn_slot(kind, pos)?;
        let behavior = self.vtab[kind];
        behavior.init(self, ent);
        Some(ent)
    }

    /// Resolve a ref. None if the referenced entity is no longer alive.
    pub fn entity(&self, ent: EntityRef) -> Option<&Entity<K>> {
        let index = self.entities.resolve(ent)?;
        Some(&self.entities.storage[index])
    }

    /// Resolve a ref mutably. None if the referenced entity is no longer
    /// alive.
    pub fn entity_mut(&mut self, ent: EntityRef) -> Option<&mut Entity<K>> {
        let index = self.entities.resolve(ent)?;
        Some(&mut self.entities.storage[index])
    }

    /// Get a ref for a live entity found by name. O(number of entities).
    pub fn entity_by_name(&self, name: &str) -> Option<EntityRef> {
        for i in 0..self.entities.len {
            let index = self.entities.order[i] as usize;
            let entity = &self.entities.storage[index];
            if entity.is_alive && entity.name.as_deref() == Some(name) {
                return Some(self.entities.ref_at(index));
            }
        }
        None
    }

    /// Get a list of all live entities of a certain kind. The list is
    /// allocated from the frame's bump memory and only valid until the end
    /// of the current frame.
    pub fn entities_by_type(&self, kind: K) -> FixedVec<'_, EntityRef> {
        let mut list = FixedVec::new(&self.hunk, self.entities.len);
        for i in 0..self.entities.len {
            let index = self.entities.order[i] as usize;
            let entity = &self.entities.storage[index];
            if entity.kind == kind && entity.is_alive {
                list.push(self.entities.ref_at(index)).unwrap();
            }
        }
        list
    }

    /// Get a list of entities within `radius` of the given entity,
    /// optionally filtered by kind. The list is allocated from the frame's
    /// bump memory and only valid until the end of the current frame.
    pub fn entities_by_proximity(
        &self,
        ent: EntityRef,
        radius: f32,
        kind: Option<K>,
    ) -> FixedVec<'_, EntityRef> {
        let pos = match self.entity(ent) {
            Some(entity) => entity.center(),
            None => return FixedVec::new(&self.hunk, 0),
        };
        self.entities_by_location(pos, radius, kind, ent)
    }

    /// Same as [`Engine::entities_by_proximity`], but with a center position
    /// instead of an entity.
    pub fn entities_by_location(
        &self,
        pos: Vec2,
        radius: f32,
        kind: Option<K>,
        exclude: EntityRef,
    ) -> FixedVec<'_, EntityRef> {
        let mut list = FixedVec::new(&self.hunk, self.entities.len);
        let axis = self.entities.sweep_axis;

        let start_pos = axis.of(pos) - radius;
        let end_pos = start_pos + radius * 2.0;
        let radius_squared = radius * radius;

        // Binary search to the last entity below ENTITY_MAX_SIZE of the
        // start point; entities are sorted along the sweep axis.
        let mut lower_bound: i32 = 0;
        let mut upper_bound: i32 = self.entities.len as i32 - 1;
        let search_pos = start_pos - ENTITY_MAX_SIZE;
        while lower_bound <= upper_bound {
            let current = (lower_bound + upper_bound) / 2;
            let current_pos =
                axis.of(self.entities.storage[self.entities.order[current as usize] as usize].pos);
            if current_pos < search_pos {
                lower_bound = current + 1;
            } else if current_pos > search_pos {
                upper_bound = current - 1;
            } else {
                break;
            }
        }

        for i in upper_bound.max(0) as usize..self.entities.len {
            let index = self.entities.order[i] as usize;
            let entity = &self.entities.storage[index];

            // Reached the end of the search range?
            if axis.of(entity.pos) > end_pos {
                break;
            }

            if axis.of(entity.pos) + axis.of(entity.size) >= start_pos
                && self.entities.ref_at(index) != exclude
                && kind.map_or(true, |kind| entity.kind == kind)
                && entity.is_alive
            {
                // Is the bounding box in the radius?
                let xd = entity.pos.x
                    + (if entity.pos.x < pos.x { entity.size.x } else { 0.0 })
                    - pos.x;
                let yd = entity.pos.y
                    + (if entity.pos.y < pos.y { entity.size.y } else { 0.0 })
                    - pos.y;
                if xd * xd + yd * yd <= radius_squared {
                    list.push(self.entities.ref_at(index)).unwrap();
                }
            }
        }

        list
    }

    /// Kill an entity: marks it dead and dispatches the kind's `kill` hook.
    /// The slot persists until the next update pass swap-removes it.
    pub fn kill(&mut self, ent: EntityRef) {
        let Some(index) = self.entities.resolve(ent) else {
            return;
        };
        self.entities.storage[index].is_alive = false;
        let kind = self.entities.storage[index].kind;
        let behavior = self.vtab[kind];
        behavior.kill(self, ent);
    }

    /// Deal damage to an entity, through the kind's `damage` hook.
    pub fn damage(&mut self, ent: EntityRef, from: EntityRef, damage: f32) {
        let Some(index) = self.entities.resolve(ent) else {
            return;
        };
        let kind = self.entities.storage[index].kind;
        let behavior = self.vtab[kind];
        behavior.damage(self, ent, from, damage);
    }

    /// Trigger an entity, through the kind's `trigger` hook.
    pub fn trigger(&mut self, ent: EntityRef, other: EntityRef) {
        let Some(index) = self.entities.resolve(ent) else {
            return;
        };
        let kind = self.entities.storage[index].kind;
        let behavior = self.vtab[kind];
        behavior.trigger(self, ent, other);
    }

    /// Send a game-defined message to an entity, through the kind's
    /// `message` hook.
    pub fn message(&mut self, ent: EntityRef, message: K::Message) {
        let Some(index) = self.entities.resolve(ent) else {
            return;
        };
        let kind = self.entities.storage[index].kind;
        let behavior = self.vtab[kind];
        behavior.message(self, ent, message);
    }

    /// The default `damage` behavior: deduct from health, kill at zero.
    pub fn entity_base_damage(&mut self, ent: EntityRef, _from: EntityRef, damage: f32) {
        let Some(index) = self.entities.resolve(ent) else {
            return;
        };
        let entity = &mut self.entities.storage[index];
        entity.health -= damage;
        if entity.health <= 0.0 && entity.is_alive {
            self.kill(ent);
        }
    }

    /// The default `draw` behavior: draw the entity's animation at its
    /// position, offset by the viewport.
    pub fn entity_base_draw(&mut self, platform: &dyn Platform, ent: EntityRef, viewport: Vec2) {
        let Some(index) = self.entities.resolve(ent) else {
            return;
        };
        let entity = &self.entities.storage[index];
        if let Some(anim) = entity.anim.clone() {
            let pos = entity.pos - viewport - entity.offset;
            anim.draw(&mut self.render, platform, pos, self.time);
        }
    }

    /// The default `update` behavior: semi-implicit velocity integration
    /// with gravity and friction, then movement with world collision.
    pub fn entity_base_update(&mut self, ent: EntityRef) {
        let Some(index) = self.entities.resolve(ent) else {
            return;
        };
        if !self.entities.storage[index].physics.contains(Physics::MOVE) {
            return;
        }

        let tick = self.tick;
        let gravity = self.gravity;
        let vstep = {
            let entity = &mut self.entities.storage[index];
            let v = entity.vel;

            entity.vel.y += gravity * entity.gravity * tick;
            let friction = vec2(
                f32::min(entity.friction.x * tick, 1.0),
                f32::min(entity.friction.y * tick, 1.0),
            );
            entity.vel = entity.vel + (entity.accel * tick - entity.vel.mul_comp(friction));

            let vstep = (v + entity.vel) * (tick * 0.5);
            entity.on_ground = false;
            vstep
        };
        self.move_entity_at(index, vstep);
    }

    /// Move an entity by the given displacement, tracing against the
    /// collision map (if the entity collides with the world) and sliding
    /// along surfaces. This is what the base update and the pair separation
    /// use; game code can call it for custom movement.
    pub fn move_entity(&mut self, ent: EntityRef, vstep: Vec2) {
        if let Some(index) = self.entities.resolve(ent) {
            self.move_entity_at(index, vstep);
        }
    }

    fn move_entity_at(&mut self, index: usize, vstep: Vec2) {
        let entity = &self.entities.storage[index];
        if entity.physics.contains(Physics::COLLIDES_WORLD) && self.collision_map.is_some() {
            let map = self.collision_map.as_ref().unwrap();
            let t = trace(map, entity.pos, vstep, entity.size);
            self.handle_trace_result(index, &t);

            // The trace was stopped short and there's still some velocity
            // left? Do a second trace along the surface to slide.
            if t.length < 1.0 {
                let rotated_normal = vec2(-t.normal.y, t.normal.x);
                let vel_along_normal = vstep.dot(rotated_normal);

                if vel_along_normal != 0.0 {
                    let remaining = 1.0 - t.length;
                    let vstep2 = rotated_normal * (vel_along_normal * remaining);
                    if let Some(map) = self.collision_map.as_ref() {
                        let entity = &self.entities.storage[index];
                        let t2 = trace(map, entity.pos, vstep2, entity.size);
                        self.handle_trace_result(index, &t2);
                    }
                }
            }
        } else {
            self.entities.storage[index].pos += vstep;
        }
    }

    fn handle_trace_result(&mut self, index: usize, t: &Trace) {
        self.entities.storage[index].pos = t.pos;

        if t.tile == 0 {
            return;
        }

        let ent = self.entities.ref_at(index);
        let kind = self.entities.storage[index].kind;
        let behavior = self.vtab[kind];
        behavior.collide(self, ent, t.normal, Some(t));

        // If this entity is bouncy, calculate the velocity against the
        // surface normal and see if we want to bounce back.
        let entity = &mut self.entities.storage[index];
        if entity.restitution > 0.0 {
            let vel_against_normal = entity.vel.dot(t.normal);
            if vel_against_normal.abs() * entity.restitution > self.opts.min_bounce_velocity {
                let vn = t.normal * (vel_against_normal * 2.0);
                entity.vel = (entity.vel - vn) * entity.restitution;
                return;
            }
        }

        // If this game has gravity, we may have to set the on_ground flag.
        if self.gravity != 0.0 && t.normal.y < -entity.max_ground_normal {
            entity.on_ground = true;

            // If we don't want to slide on slopes, we cheat a bit by fudging
            // the y velocity.
            if t.normal.y < -entity.min_slide_normal {
                entity.vel.y = entity.vel.x * t.normal.x;
            }
        }

        // Rotate the normal by 90° to get the slope tangent and project the
        // velocity onto it. This is the velocity we slide along the surface
        // with.
        let rotated_normal = vec2(-t.normal.y, t.normal.x);
        let vel_along_normal = entity.vel.dot(rotated_normal);
        entity.vel = rotated_normal * vel_along_normal;
    }

    /// The update pass, broad phase and pair resolution for all entities.
    /// Called once per frame from the scene's base update.
    pub fn entities_update(&mut self) {
        // Update all entities.
        let mut i = 0;
        while i < self.entities.len {
            let index = self.entities.order[i] as usize;
            let ent = self.entities.ref_at(index);
            let kind = self.entities.storage[index].kind;
            let behavior = self.vtab[kind];
            behavior.update(self, ent);

            if !self.entities.storage[index].is_alive {
                // This entity died during update: overwrite it with the last
                // live one and revisit this position.
                self.entities.len -= 1;
                self.entities.order.swap(i, self.entities.len);
            } else {
                i += 1;
            }
        }

        // Sort by the sweep axis position. Insertion sort, since the order
        // barely changes between frames.
        let axis = self.entities.sweep_axis;
        let (storage, order) = (&self.entities.storage, &mut self.entities.order);
        insertion_sort_by(&mut order[..self.entities.len], |&a, &b| {
            axis.of(storage[a as usize].pos) > axis.of(storage[b as usize].pos)
        });

        // Sweep for touches and pair collisions.
        self.perf.checks = 0;
        let mut i = 0;
        while i < self.entities.len {
            let index1 = self.entities.order[i] as usize;
            let e1 = &self.entities.storage[index1];

            if !(e1.check_against != Group::empty()
                || e1.group != Group::empty()
                || e1.physics.bits() > Physics::COLLIDES_LITE.bits())
            {
                i += 1;
                continue;
            }

            let max_pos = axis.of(e1.pos) + axis.of(e1.size);
            let mut j = i + 1;
            while j < self.entities.len {
                let index2 = self.entities.order[j] as usize;
                let e1 = &self.entities.storage[index1];
                let e2 = &self.entities.storage[index2];
                if axis.of(e2.pos) >= max_pos {
                    break;
                }
                self.perf.checks += 1;

                if e1.is_touching(e2) {
                    let ent1 = self.entities.ref_at(index1);
                    let ent2 = self.entities.ref_at(index2);

                    if !(e1.check_against & e2.group).is_empty() {
                        let kind = e1.kind;
                        let behavior = self.vtab[kind];
                        behavior.touch(self, ent1, ent2);
                    }
                    let e1 = &self.entities.storage[index1];
                    let e2 = &self.entities.storage[index2];
                    if !(e1.group & e2.check_against).is_empty() {
                        let kind = e2.kind;
                        let behavior = self.vtab[kind];
                        behavior.touch(self, ent2, ent1);
                    }

                    let e1 = &self.entities.storage[index1];
                    let e2 = &self.entities.storage[index2];
                    if e1.physics.bits() >= Physics::COLLIDES_LITE.bits()
                        && e2.physics.bits() >= Physics::COLLIDES_LITE.bits()
                        && (e1.physics.bits() as u32 + e2.physics.bits() as u32)
                            >= (Physics::COLLIDES_ACTIVE.bits() | Physics::COLLIDES_LITE.bits())
                                as u32
                        && e1.mass + e2.mass > 0.0
                    {
                        self.resolve_collision(index1, index2);
                    }
                }
                j += 1;
            }
            i += 1;
        }

        self.perf.entities = self.entities.len as u32;
    }

    /// The draw pass: entities sorted by draw order, back to front. The
    /// order copy comes from a persistent scratch list so the sweep-axis
    /// sort isn't perturbed.
    pub fn entities_draw(&mut self, platform: &dyn Platform, viewport: Vec2) {
        let mut draw_ents = core::mem::take(&mut self.entities.draw_scratch);
        draw_ents.clear();
        draw_ents.extend_from_slice(&self.entities.order[..self.entities.len]);

        let storage = &self.entities.storage;
        insertion_sort_by(&mut draw_ents, |&a, &b| {
            storage[a as usize].draw_order > storage[b as usize].draw_order
        });

        for &index in &draw_ents {
            let ent = self.entities.ref_at(index as usize);
            let kind = self.entities.storage[index as usize].kind;
            let behavior = self.vtab[kind];
            behavior.draw(self, platform, ent, viewport);
        }

        self.entities.draw_scratch = draw_ents;
    }

    fn resolve_collision(&mut self, a: usize, b: usize) {
        let (a_ent, b_ent) = (&self.entities.storage[a], &self.entities.storage[b]);

        let overlap_x = if a_ent.pos.x < b_ent.pos.x {
            a_ent.pos.x + a_ent.size.x - b_ent.pos.x
        } else {
            b_ent.pos.x + b_ent.size.x - a_ent.pos.x
        };
        let overlap_y = if a_ent.pos.y < b_ent.pos.y {
            a_ent.pos.y + a_ent.size.y - b_ent.pos.y
        } else {
            b_ent.pos.y + b_ent.size.y - a_ent.pos.y
        };

        let (a_move, b_move);
        if a_ent.physics.contains(Physics::COLLIDES_LITE)
            || b_ent.physics.contains(Physics::COLLIDES_FIXED)
        {
            a_move = 1.0;
            b_move = 0.0;
        } else if a_ent.physics.contains(Physics::COLLIDES_FIXED)
            || b_ent.physics.contains(Physics::COLLIDES_LITE)
        {
            a_move = 0.0;
            b_move = 1.0;
        } else {
            let total_mass = a_ent.mass + b_ent.mass;
            a_move = b_ent.mass / total_mass;
            b_move = a_ent.mass / total_mass;
        }

        let (ref_a, ref_b) = (self.entities.ref_at(a), self.entities.ref_at(b));
        let (kind_a, kind_b) = (a_ent.kind, b_ent.kind);

        if overlap_y > overlap_x {
            if self.entities.storage[a].pos.x < self.entities.storage[b].pos.x {
                self.separate_on_x_axis(a, b, a_move, b_move, overlap_x);
                let (behavior_a, behavior_b) = (self.vtab[kind_a], self.vtab[kind_b]);
                behavior_a.collide(self, ref_a, vec2(-1.0, 0.0), None);
                behavior_b.collide(self, ref_b, vec2(1.0, 0.0), None);
            } else {
                self.separate_on_x_axis(b, a, b_move, a_move, overlap_x);
                let (behavior_a, behavior_b) = (self.vtab[kind_a], self.vtab[kind_b]);
                behavior_a.collide(self, ref_a, vec2(1.0, 0.0), None);
                behavior_b.collide(self, ref_b, vec2(-1.0, 0.0), None);
            }
        } else if self.entities.storage[a].pos.y < self.entities.storage[b].pos.y {
            self.separate_on_y_axis(a, b, a_move, b_move, overlap_y);
            let (behavior_a, behavior_b) = (self.vtab[kind_a], self.vtab[kind_b]);
            behavior_a.collide(self, ref_a, vec2(0.0, -1.0), None);
            behavior_b.collide(self, ref_b, vec2(0.0, 1.0), None);
        } else {
            self.separate_on_y_axis(b, a, b_move, a_move, overlap_y);
            let (behavior_a, behavior_b) = (self.vtab[kind_a], self.vtab[kind_b]);
            behavior_a.collide(self, ref_a, vec2(0.0, 1.0), None);
            behavior_b.collide(self, ref_b, vec2(0.0, -1.0), None);
        }
    }

    fn separate_on_x_axis(
        &mut self,
        left: usize,
        right: usize,
        left_move: f32,
        right_move: f32,
        overlap: f32,
    ) {
        let impact_velocity =
            self.entities.storage[left].vel.x - self.entities.storage[right].vel.x;

        if left_move > 0.0 {
            let right_vel_x = self.entities.storage[right].vel.x;
            let e = &mut self.entities.storage[left];
            e.vel.x = right_vel_x * left_move + e.vel.x * right_move;

            let bounce = impact_velocity * e.restitution;
            if bounce > self.opts.min_bounce_velocity {
                e.vel.x -= bounce;
            }
            self.move_entity_at(left, vec2(-overlap * left_move, 0.0));
        }
        if right_move > 0.0 {
            let left_vel_x = self.entities.storage[left].vel.x;
            let e = &mut self.entities.storage[right];
            e.vel.x = left_vel_x * right_move + e.vel.x * left_move;

            let bounce = impact_velocity * e.restitution;
            if bounce > self.opts.min_bounce_velocity {
                e.vel.x += bounce;
            }
            self.move_entity_at(right, vec2(overlap * right_move, 0.0));
        }
    }

    fn separate_on_y_axis(
        &mut self,
        top: usize,
        bottom: usize,
        top_move: f32,
        bottom_move: f32,
        overlap: f32,
    ) {
        let (mut top_move, mut bottom_move) = (top_move, bottom_move);
        if self.entities.storage[bottom].on_ground && top_move > 0.0 {
            // The bottom entity is standing on something; push the top one
            // out entirely.
            top_move = 1.0;
            bottom_move = 0.0;
        }

        let impact_velocity =
            self.entities.storage[top].vel.y - self.entities.storage[bottom].vel.y;
        let top_vel_y = self.entities.storage[top].vel.y;

        if top_move > 0.0 {
            let bottom_vel = self.entities.storage[bottom].vel;
            let tick = self.tick;
            let e = &mut self.entities.storage[top];
            e.vel.y = e.vel.y * bottom_move + bottom_vel.y * top_move;

            let mut move_x = 0.0;
            let bounce = impact_velocity * e.restitution;
            if bounce > self.opts.min_bounce_velocity {
                e.vel.y -= bounce;
            } else {
                // Not bouncing: the top entity rides the bottom one, and
                // inherits its horizontal movement for this tick.
                e.on_ground = true;
                move_x = bottom_vel.x * tick;
            }
            self.move_entity_at(top, vec2(move_x, -overlap * top_move));
        }
        if bottom_move > 0.0 {
            let e = &mut self.entities.storage[bottom];
            e.vel.y = e.vel.y * top_move + top_vel_y * bottom_move;

            let bounce = impact_velocity * e.restitution;
            if bounce > self.opts.min_bounce_velocity {
                e.vel.y += bounce;
            }
            self.move_entity_at(bottom, vec2(0.0, overlap * bottom_move));
        }
    }
}

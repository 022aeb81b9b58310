// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! The engine is the wrapper around the whole game: for every frame it
//! updates the current scene (which updates all entities), draws everything,
//! and keeps the books on time, the hunk's frame scope, and the per-scene
//! lifecycle of textures, images, sounds, bump memory and entities.

use arrayvec::{ArrayString, ArrayVec};
use enum_map::EnumMap;
use platform::Platform;
use serde::Deserialize;

use crate::entity::{Entities, EntityBehavior, EntityKind, EntityRef, SweepAxis};
use crate::font::Font;
use crate::geom::{vec2, vec2i, Vec2};
use crate::hunk::{BumpMark, Hunk};
use crate::image::{Image, ImageMark, Images};
use crate::input::Input;
use crate::map::{Map, MapDef};
use crate::rand::Rng;
use crate::render::{Render, RenderOpts};
use crate::sound::{Sound, SourceId, SourceMark};

/// The maximum number of background maps.
pub const ENGINE_MAX_BACKGROUND_MAPS: usize = 4;

/// Engine-wide limits and tuning, used in [`Engine::new`].
#[derive(Debug, Clone, Copy)]
pub struct EngineOpts {
    /// The total size of the hunk, the single memory region backing the
    /// engine's own allocators.
    pub hunk_size: usize,
    /// The size of the entity pool. Spawns beyond this fail softly.
    pub max_entities: usize,
    /// The axis entities are sorted along for broad-phase collision checks.
    pub sweep_axis: SweepAxis,
    /// Velocities below this don't bounce, so bouncy entities come to rest
    /// instead of bouncing forever with ever smaller velocities.
    pub min_bounce_velocity: f32,
    /// The maximum step in seconds from one frame to the next. If a frame
    /// takes longer than this, the game slows down instead of taking
    /// imprecise large time steps.
    pub max_tick: f64,
    /// The initial global gravity multiplier. Only makes sense for side view
    /// games; set to 0 for top-down.
    pub gravity: f32,
    /// Sounds with up to this many samples (counting all channels) are fully
    /// decompressed at load time; longer ones are decoded while mixing.
    pub max_uncompressed_samples: u32,
    /// The maximum number of loaded sound sources.
    pub max_sources: usize,
    /// The maximum number of concurrently mixable voices.
    pub max_voices: usize,
    pub render: RenderOpts,
}

impl Default for EngineOpts {
    fn default() -> Self {
        EngineOpts {
            hunk_size: 32 * 1024 * 1024,
            max_entities: 1024,
            sweep_axis: SweepAxis::X,
            min_bounce_velocity: 10.0,
            max_tick: 0.1,
            gravity: 1.0,
            max_uncompressed_samples: 64 * 1024,
            max_sources: 128,
            max_voices: 32,
            render: RenderOpts::default(),
        }
    }
}

/// Counters and timings from the last frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct Perf {
    pub entities: u32,
    pub checks: u32,
    pub draw_calls: u32,
    pub update: f64,
    pub draw: f64,
    pub total: f64,
}

/// A scene of the game: a level, a menu, a game-over screen. The engine
/// always runs exactly one scene; switch with [`Engine::set_scene`].
#[allow(unused_variables)]
pub trait Scene<K: EntityKind> {
    /// Called once when the scene becomes current. Load resources and spawn
    /// the initial entities here.
    fn init(&mut self, eng: &mut Engine<K>, platform: &dyn Platform) {}

    /// Called once per frame. The default updates all entities; an
    /// implementation usually wants to call
    /// [`Engine::scene_base_update`] somewhere.
    fn update(&mut self, eng: &mut Engine<K>) {
        eng.scene_base_update();
    }

    /// Called once per frame after update. The default draws all background
    /// maps and entities; an implementation usually wants to call
    /// [`Engine::scene_base_draw`] somewhere.
    fn draw(&mut self, eng: &mut Engine<K>, platform: &dyn Platform) {
        eng.scene_base_draw(platform);
    }

    /// Called once before the next scene is set or the game ends.
    fn cleanup(&mut self, eng: &mut Engine<K>) {}
}

/// The root object owning all runtime state of the game. Generic over the
/// game's [`EntityKind`] enum.
pub struct Engine<K: EntityKind> {
    /// The real time in seconds since program start.
    pub time_real: f64,
    /// The game time in seconds since scene start.
    pub time: f64,
    /// A global multiplier for how fast game time advances. Default 1.
    pub time_scale: f64,
    /// The time difference in seconds from the last frame to the current,
    /// clamped to the configured max tick. Typically 0.01666 at 60hz.
    pub tick: f32,
    /// The frame number in the current scene.
    pub frame: u64,
    /// A global multiplier for the gravity of all entities.
    pub gravity: f32,
    /// The top left corner of the viewport: an offset applied when drawing
    /// background maps and entities.
    pub viewport: Vec2,
    /// The map used for entity vs. world collisions. Reset on scene switch.
    pub collision_map: Option<Map>,
    /// The maps drawn by the base scene draw. Reset on scene switch.
    pub background_maps: ArrayVec<Map, ENGINE_MAX_BACKGROUND_MAPS>,
    pub perf: Perf,
    pub opts: EngineOpts,

    pub hunk: Hunk,
    pub render: Render,
    pub images: Images,
    pub sound: Sound,
    pub input: Input,
    pub rng: Rng,

    pub(crate) entities: Entities<K>,
    pub(crate) vtab: EnumMap<K, &'static dyn EntityBehavior<K>>,

    scene: Option<Box<dyn Scene<K>>>,
    scene_next: Option<Box<dyn Scene<K>>>,
    is_running: bool,

    init_bump_mark: BumpMark,
    init_images_mark: ImageMark,
    init_sounds_mark: SourceMark,
    init_textures_mark: platform::TextureMark,
}

impl<K: EntityKind> Engine<K> {
    /// Boots the engine: sets up all subsystems, runs every entity kind's
    /// `load` hook, then `main_init` (which should load global assets and
    /// set the first scene), and finally records the program-lifetime marks
    /// that scene switches reset back to.
    pub fn new(
        platform: &dyn Platform,
        opts: EngineOpts,
        main_init: impl FnOnce(&mut Engine<K>, &dyn Platform),
    ) -> Engine<K> {
        let (screen_w, screen_h) = platform.screen_size();
        let render = Render::new(opts.render, vec2i(screen_w, screen_h));

        let sound = Sound::new(
            platform.samplerate(),
            opts.max_sources,
            opts.max_voices,
            opts.max_uncompressed_samples,
        );
        let mixer = sound.mixer();
        platform.set_audio_mix(Box::new(move |dest| mixer.mix(dest)));

        let mut eng = Engine {
            time_real: platform.now(),
            time: 0.0,
            time_scale: 1.0,
            tick: 0.0,
            frame: 0,
            gravity: opts.gravity,
            viewport: Vec2::ZERO,
            collision_map: None,
            background_maps: ArrayVec::new(),
            perf: Perf::default(),

            hunk: Hunk::new(opts.hunk_size),
            render,
            images: Images::default(),
            sound,
            input: Input::new(),
            rng: Rng::default(),

            entities: Entities::new(opts.max_entities, opts.sweep_axis),
            vtab: EnumMap::from_fn(|kind: K| kind.behavior()),

            scene: None,
            scene_next: None,
            is_running: false,

            init_bump_mark: BumpMark::default(),
            init_images_mark: ImageMark::default(),
            init_sounds_mark: SourceMark::default(),
            init_textures_mark: platform.textures_mark(),

            opts,
        };

        for i in 0..K::LENGTH {
            let kind = K::from_usize(i);
            let behavior = eng.vtab[kind];
            behavior.load(&mut eng, platform);
        }

        main_init(&mut eng, platform);

        eng.init_bump_mark = eng.hunk.bump_mark();
        eng.init_images_mark = eng.images.mark();
        eng.init_sounds_mark = eng.sound.mark();
        eng.init_textures_mark = platform.textures_mark();
        eng
    }

    /// Whether the game is running, as opposed to being in a loading phase
    /// (scene init or the initial main init). Asset loads are only allowed
    /// while not running.
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Called by the platform when the window size changes.
    pub fn resize(&mut self, available_size: crate::geom::Vec2i) {
        self.render.resize(available_size);
    }

    /// Make the given scene current. The actual swap happens at the
    /// beginning of the next frame, so it's fine to call this from the
    /// middle of a frame. The old scene's `cleanup` runs before the new
    /// scene's `init`.
    pub fn set_scene(&mut self, scene: Box<dyn Scene<K>>) {
        self.scene_next = Some(scene);
    }

    /// Load an image asset (or return the cached one). Fatal outside of the
    /// loading phases.
    pub fn image(&mut self, platform: &dyn Platform, path: &str) -> Image {
        assert!(!self.is_running, "cannot load image during gameplay");
        self.images.load(platform, path)
    }

    /// Load a sound source asset (or return the cached one). Fatal outside
    /// of the loading phases.
    pub fn sound_source(&self, platform: &dyn Platform, path: &str) -> SourceId {
        assert!(!self.is_running, "cannot load sound source during gameplay");
        self.sound.source(platform, path)
    }

    /// Load a font from its glyph image and metrics json. Fatal outside of
    /// the loading phases.
    pub fn font(&mut self, platform: &dyn Platform, image_path: &str, def_path: &str) -> Font {
        assert!(!self.is_running, "cannot load font during gameplay");
        Font::load(platform, &mut self.images, image_path, def_path)
    }

    /// Add a map to be drawn by the base scene draw; typically done through
    /// [`Engine::load_level`]. More than [`ENGINE_MAX_BACKGROUND_MAPS`] is
    /// fatal.
    pub fn add_background_map(&mut self, map: Map) {
        if self.background_maps.try_push(map).is_err() {
            panic!("max background maps ({ENGINE_MAX_BACKGROUND_MAPS}) reached");
        }
    }

    /// Set the map used for entity vs. world collision; typically done
    /// through [`Engine::load_level`].
    pub fn set_collision_map(&mut self, map: Map) {
        self.collision_map = Some(map);
    }

    /// Load a level: its background maps, its collision map (the map named
    /// "collision") and its entities. Should only be called from a scene's
    /// `init`. Malformed level data is fatal.
    pub fn load_level(&mut self, platform: &dyn Platform, json_path: &str) {
        let bytes = platform
            .load_asset(json_path)
            .unwrap_or_else(|| panic!("could not load level json at {json_path}"));
        let def: LevelDef = serde_json::from_slice(&bytes)
            .unwrap_or_else(|err| panic!("malformed level json {json_path}: {err}"));
        log::debug!(
            "loading level {json_path}: {} maps, {} entities",
            def.maps.len(),
            def.entities.len()
        );

        self.entities.reset();
        self.background_maps.clear();
        self.collision_map = None;

        for map_def in &def.maps {
            let tileset = (!map_def.tileset_name.is_empty())
                .then(|| self.images.load(platform, &map_def.tileset_name));
            let map = Map::from_def(map_def, tileset);
            if map_def.name == "collision" {
                self.set_collision_map(map);
            } else {
                self.add_background_map(map);
            }
        }

        // Spawn all entities first and apply their settings in a second
        // pass, so that name resolution in a settings hook can reference any
        // entity of the level.
        let mut entity_settings: Vec<(EntityRef, &serde_json::Value)> = Vec::new();
        for entity_def in &def.entities {
            let kind = K::from_name(&entity_def.kind)
                .unwrap_or_else(|| panic!("unknown entity type {}", entity_def.kind));
            let ent = self.spawn(kind, vec2(entity_def.x, entity_def.y));

            let (Some(ent), Some(settings)) = (ent, &entity_def.settings) else {
                continue;
            };
            if !settings.is_object() {
                continue;
            }

            if let Some(name) = settings.get("name").and_then(|name| name.as_str()) {
                let name = ArrayString::from(name)
                    .unwrap_or_else(|_| panic!("entity name too long: {name}"));
                if let Some(entity) = self.entity_mut(ent) {
                    entity.name = Some(name);
                }
            }
            entity_settings.push((ent, settings));
        }

        for (ent, settings) in entity_settings {
            let Some(entity) = self.entity(ent) else {
                continue;
            };
            let behavior = self.vtab[entity.kind];
            behavior.settings(self, ent, settings);
        }
    }

    /// Resolve a json array of entity names into refs. Names that don't
    /// resolve are skipped. The list is allocated from the frame's bump
    /// memory and only valid until the end of the current frame.
    pub fn entities_from_json_names(
        &self,
        targets: &serde_json::Value,
    ) -> crate::collections::FixedVec<'_, EntityRef> {
        let names = targets.as_array().map(|a| a.as_slice()).unwrap_or(&[]);
        let mut list = crate::collections::FixedVec::new(&self.hunk, names.len());
        for name in names {
            let Some(ent) = name.as_str().and_then(|name| self.entity_by_name(name)) else {
                continue;
            };
            list.push(ent).unwrap();
        }
        list
    }

    /// The default scene update: update all entities.
    pub fn scene_base_update(&mut self) {
        self.entities_update();
    }

    /// The default scene draw: background maps, entities, foreground maps.
    pub fn scene_base_draw(&mut self, platform: &dyn Platform) {
        let px_viewport = self.render.snap_px(self.viewport);

        for i in 0..self.background_maps.len() {
            if !self.background_maps[i].foreground {
                self.background_maps[i].draw(&mut self.render, platform, px_viewport, self.time);
            }
        }

        self.entities_draw(platform, px_viewport);

        for i in 0..self.background_maps.len() {
            if self.background_maps[i].foreground {
                self.background_maps[i].draw(&mut self.render, platform, px_viewport, self.time);
            }
        }
    }

    /// Run one frame: a pending scene switch, time accounting, the scene's
    /// update and draw inside the frame's bump scope, input edge clearing
    /// and the temp balance check.
    pub fn update(&mut self, platform: &dyn Platform) {
        let time_frame_start = platform.now();

        // Switch scenes?
        if self.scene_next.is_some() {
            log::debug!("switching scenes at frame {}", self.frame);
            self.is_running = false;
            if let Some(mut old_scene) = self.scene.take() {
                old_scene.cleanup(self);
            }

            platform.textures_reset(self.init_textures_mark);
            self.images.reset(self.init_images_mark);
            self.sound.reset(self.init_sounds_mark);
            // Safety: everything allocated past the init mark belonged to
            // the old scene or an earlier frame, and the old scene is gone.
            unsafe { self.hunk.bump_reset(self.init_bump_mark) };
            self.entities.reset();

            self.background_maps.clear();
            self.collision_map = None;
            self.time = 0.0;
            self.frame = 0;
            self.viewport = Vec2::ZERO;

            let mut scene = self.scene_next.take().unwrap();
            scene.init(self, platform);
            self.scene = Some(scene);
        }
        self.is_running = true;

        assert!(self.scene.is_some(), "no scene set");

        let time_real_now = platform.now();
        let real_delta = time_real_now - self.time_real;
        self.time_real = time_real_now;
        self.tick = f64::min(real_delta * self.time_scale, self.opts.max_tick) as f32;
        self.time += self.tick as f64;
        self.frame += 1;

        let frame_mark = self.hunk.bump_mark();
        {
            let mut scene = self.scene.take().unwrap();
            scene.update(self);
            self.perf.update = platform.now() - time_real_now;

            platform.frame_prepare();
            scene.draw(self, platform);
            platform.frame_end();
            self.perf.draw = (platform.now() - time_real_now) - self.perf.update;

            // A scene switch requested during update lands in scene_next;
            // the current scene stays in place until the next frame.
            self.scene = Some(scene);
        }
        // Safety: per-frame lists don't outlive the update/draw calls above.
        unsafe { self.hunk.bump_reset(frame_mark) };

        self.input.clear();
        self.hunk.temp_check();

        self.perf.draw_calls = self.render.draw_calls();
        self.perf.total = platform.now() - time_frame_start;
    }
}

#[derive(Debug, Deserialize)]
struct LevelDef {
    #[serde(default)]
    maps: Vec<MapDef>,
    #[serde(default)]
    entities: Vec<LevelEntityDef>,
}

#[derive(Debug, Deserialize)]
struct LevelEntityDef {
    #[serde(rename = "type")]
    kind: String,
    x: f32,
    y: f32,
    settings: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use enum_map::Enum;
    use serde_json::Value;

    use super::{Engine, EngineOpts, Scene};
    use crate::camera::Camera;
    use crate::entity::{EntityBehavior, EntityKind, EntityRef, Group, Physics, SweepAxis};
    use crate::geom::{vec2, vec2i, Vec2};
    use crate::map::Map;
    use crate::render::RenderOpts;
    use crate::test_platform::TestPlatform;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
    enum TestKind {
        Block,
        Sensor,
    }

    #[derive(Default)]
    struct TestExt {
        touches: u32,
        target_found: bool,
    }

    struct BlockBehavior;

    impl EntityBehavior<TestKind> for BlockBehavior {
        fn settings(&self, eng: &mut Engine<TestKind>, ent: EntityRef, settings: &Value) {
            if let Some(health) = settings.get("health").and_then(|v| v.as_f64()) {
                eng.entity_mut(ent).unwrap().health = health as f32;
            }
            if let Some(target) = settings.get("target").and_then(|v| v.as_str()) {
                let found = eng.entity_by_name(target).is_some();
                eng.entity_mut(ent).unwrap().ext.target_found = found;
            }
        }
    }

    struct SensorBehavior;

    impl EntityBehavior<TestKind> for SensorBehavior {
        fn touch(&self, eng: &mut Engine<TestKind>, ent: EntityRef, _other: EntityRef) {
            eng.entity_mut(ent).unwrap().ext.touches += 1;
        }
    }

    impl EntityKind for TestKind {
        type Ext = TestExt;
        type Message = ();

        fn behavior(self) -> &'static dyn EntityBehavior<TestKind> {
            match self {
                TestKind::Block => &BlockBehavior,
                TestKind::Sensor => &SensorBehavior,
            }
        }

        fn name(self) -> &'static str {
            match self {
                TestKind::Block => "block",
                TestKind::Sensor => "sensor",
            }
        }
    }

    fn test_opts() -> EngineOpts {
        EngineOpts {
            hunk_size: 1024 * 1024,
            max_entities: 64,
            render: RenderOpts {
                render_size: vec2i(320, 240),
                ..RenderOpts::default()
            },
            ..EngineOpts::default()
        }
    }

    fn new_engine(platform: &TestPlatform) -> Engine<TestKind> {
        Engine::new(platform, test_opts(), |_, _| {})
    }

    /// A 10x10 map of 8px tiles with the given tiles set.
    fn map_with_tiles(tiles: &[(i32, i32, u16)]) -> Map {
        let mut data = vec![0u16; 100];
        for &(x, y, tile) in tiles {
            data[(y * 10 + x) as usize] = tile;
        }
        Map::with_data(8, vec2i(10, 10), data)
    }

    fn run_ticks(eng: &mut Engine<TestKind>, ticks: u32) {
        eng.tick = 1.0 / 60.0;
        for _ in 0..ticks {
            eng.entities_update();
        }
    }

    #[test]
    fn straight_motion_without_forces() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.gravity = 0.0;

        let ent = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        {
            let e = eng.entity_mut(ent).unwrap();
            e.physics = Physics::MOVE_ONLY;
            e.vel = vec2(3.0, 4.0);
        }
        run_ticks(&mut eng, 1);

        let e = eng.entity(ent).unwrap();
        assert!((e.pos - vec2(3.0, 4.0) * eng.tick).len() < 1e-6);
        assert_eq!(vec2(3.0, 4.0), e.vel);
    }

    #[test]
    fn falling_block_comes_to_rest_on_the_tile() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.collision_map = Some(map_with_tiles(&[(0, 5, 1)]));
        eng.gravity = 240.0;

        let ent = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        eng.entity_mut(ent).unwrap().physics = Physics::WORLD;

        run_ticks(&mut eng, 60);

        let e = eng.entity(ent).unwrap();
        assert!(e.on_ground);
        assert!((e.pos.y - 32.0).abs() < 1e-3, "pos.y = {}", e.pos.y);
        assert_eq!(0.0, e.pos.x);
    }

    #[test]
    fn entity_slides_down_a_slope() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        // Tile 2 is the 45° NE slope.
        eng.collision_map = Some(map_with_tiles(&[(0, 5, 2)]));
        eng.gravity = 240.0;

        let ent = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        {
            let e = eng.entity_mut(ent).unwrap();
            e.physics = Physics::WORLD;
            e.restitution = 0.0;
            e.min_slide_normal = 0.999;
        }

        // Run until the entity lands on the slope.
        eng.tick = 1.0 / 60.0;
        let mut landed = false;
        for _ in 0..120 {
            eng.entities_update();
            if eng.entity(ent).unwrap().on_ground {
                landed = true;
                break;
            }
        }
        assert!(landed, "entity never landed on the slope");

        // Sliding down the NE slope means strictly decreasing x, and the
        // entity stays grounded while doing so.
        let mut last_x = eng.entity(ent).unwrap().pos.x;
        for _ in 0..3 {
            eng.entities_update();
            let e = eng.entity(ent).unwrap();
            assert!(e.on_ground);
            assert!(e.pos.x < last_x, "entity stopped sliding at x = {}", e.pos.x);
            last_x = e.pos.x;
        }
    }

    #[test]
    fn full_restitution_reverses_the_impact() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.collision_map = Some(map_with_tiles(&[
            (0, 5, 1),
            (1, 5, 1),
            (2, 5, 1),
        ]));
        eng.gravity = 0.0;

        let ent = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        {
            let e = eng.entity_mut(ent).unwrap();
            e.physics = Physics::WORLD;
            e.restitution = 1.0;
            e.vel = vec2(0.0, 100.0);
        }

        eng.tick = 1.0 / 60.0;
        for _ in 0..120 {
            eng.entities_update();
            if eng.entity(ent).unwrap().vel.y < 0.0 {
                break;
            }
        }

        let e = eng.entity(ent).unwrap();
        assert!((e.vel.y + 100.0).abs() < 1e-3, "vel.y = {}", e.vel.y);
        assert!(!e.on_ground);
    }

    #[test]
    fn equal_masses_separate_by_the_full_overlap() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.gravity = 0.0;

        let a = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        let b = eng.spawn(TestKind::Block, vec2(6.0, 0.0)).unwrap();
        for ent in [a, b] {
            eng.entity_mut(ent).unwrap().physics = Physics::ACTIVE;
        }

        run_ticks(&mut eng, 1);

        // 2px of x overlap, split evenly; y overlap was larger so x is the
        // separation axis.
        assert_eq!(-1.0, eng.entity(a).unwrap().pos.x);
        assert_eq!(7.0, eng.entity(b).unwrap().pos.x);
        assert_eq!(0.0, eng.entity(a).unwrap().pos.y);
    }

    #[test]
    fn lite_entity_moves_out_of_the_way_alone() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.gravity = 0.0;

        let lite = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        let active = eng.spawn(TestKind::Block, vec2(6.0, 0.0)).unwrap();
        eng.entity_mut(lite).unwrap().physics = Physics::LITE;
        eng.entity_mut(active).unwrap().physics = Physics::ACTIVE;

        run_ticks(&mut eng, 1);

        assert_eq!(-2.0, eng.entity(lite).unwrap().pos.x);
        assert_eq!(6.0, eng.entity(active).unwrap().pos.x);
    }

    #[test]
    fn riding_entity_inherits_the_platform_velocity() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.gravity = 0.0;

        // A "platform" moving right with a rider overlapping it from above.
        let rider = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        let carrier = eng.spawn(TestKind::Block, vec2(0.0, 6.0)).unwrap();
        {
            let e = eng.entity_mut(rider).unwrap();
            e.physics = Physics::ACTIVE;
        }
        {
            let e = eng.entity_mut(carrier).unwrap();
            e.physics = Physics::FIXED;
            e.vel = vec2(30.0, 0.0);
        }

        eng.tick = 1.0 / 60.0;
        eng.entities_update();

        // The y overlap (2px) is smaller than the x overlap (8px), so the
        // pair separates vertically; the rider ends up grounded and carried
        // along by the platform's horizontal velocity for this tick.
        let e = eng.entity(rider).unwrap();
        assert!(e.on_ground);
        assert!((e.pos.y + 2.0).abs() < 1e-4);
        // The carry-along is exactly one tick of the carrier's velocity. The
        // reverse never happens: the bottom entity doesn't inherit from the
        // top one.
        let carried_x = 30.0 * eng.tick;
        assert!((e.pos.x - carried_x).abs() < 1e-3);
    }

    #[test]
    fn touch_is_delivered_once_per_tick_and_direction() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.gravity = 0.0;

        let a = eng.spawn(TestKind::Sensor, vec2(0.0, 0.0)).unwrap();
        let b = eng.spawn(TestKind::Sensor, vec2(4.0, 0.0)).unwrap();
        {
            let e = eng.entity_mut(a).unwrap();
            e.group = Group::PLAYER;
            e.check_against = Group::ENEMY;
        }
        {
            let e = eng.entity_mut(b).unwrap();
            e.group = Group::ENEMY;
            e.check_against = Group::PLAYER;
        }

        run_ticks(&mut eng, 1);
        assert_eq!(1, eng.entity(a).unwrap().ext.touches);
        assert_eq!(1, eng.entity(b).unwrap().ext.touches);

        run_ticks(&mut eng, 1);
        assert_eq!(2, eng.entity(a).unwrap().ext.touches);
        assert_eq!(2, eng.entity(b).unwrap().ext.touches);
    }

    #[test]
    fn touch_respects_the_group_masks() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.gravity = 0.0;

        let a = eng.spawn(TestKind::Sensor, vec2(0.0, 0.0)).unwrap();
        let b = eng.spawn(TestKind::Sensor, vec2(4.0, 0.0)).unwrap();
        // a watches for enemies, but b is an item: no touch either way.
        eng.entity_mut(a).unwrap().check_against = Group::ENEMY;
        eng.entity_mut(b).unwrap().group = Group::ITEM;

        run_ticks(&mut eng, 1);
        assert_eq!(0, eng.entity(a).unwrap().ext.touches);
        assert_eq!(0, eng.entity(b).unwrap().ext.touches);
    }

    #[test]
    fn spawn_fails_softly_when_the_pool_is_full() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        for _ in 0..64 {
            assert!(eng.spawn(TestKind::Block, Vec2::ZERO).is_some());
        }
        assert!(eng.spawn(TestKind::Block, Vec2::ZERO).is_none());
    }

    #[test]
    fn dead_refs_resolve_to_none() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);

        let a = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        let b = eng.spawn(TestKind::Block, vec2(20.0, 0.0)).unwrap();
        let c = eng.spawn(TestKind::Block, vec2(40.0, 0.0)).unwrap();

        eng.kill(b);
        assert!(eng.entity(b).is_none());

        // The swap-remove during the next update doesn't disturb the others.
        run_ticks(&mut eng, 1);
        assert!(eng.entity(a).is_some());
        assert!(eng.entity(b).is_none());
        assert!(eng.entity(c).is_some());
        assert_eq!(2, eng.perf.entities);

        // A new spawn reuses the slot with a fresh id; the old ref still
        // resolves to None.
        let d = eng.spawn(TestKind::Block, vec2(60.0, 0.0)).unwrap();
        assert!(eng.entity(b).is_none());
        assert!(eng.entity(d).is_some());
        assert_eq!(EntityRef::NONE, EntityRef::default());
        assert!(eng.entity(EntityRef::NONE).is_none());
    }

    #[test]
    fn default_damage_kills_at_zero_health() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);

        let ent = eng.spawn(TestKind::Block, Vec2::ZERO).unwrap();
        eng.entity_mut(ent).unwrap().health = 10.0;

        eng.damage(ent, EntityRef::NONE, 4.0);
        assert_eq!(6.0, eng.entity(ent).unwrap().health);

        eng.damage(ent, EntityRef::NONE, 10.0);
        assert!(eng.entity(ent).is_none());
    }

    #[test]
    fn queries_by_type_name_and_location() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);

        let block = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
        let near = eng.spawn(TestKind::Sensor, vec2(20.0, 0.0)).unwrap();
        let far = eng.spawn(TestKind::Sensor, vec2(200.0, 0.0)).unwrap();
        eng.entity_mut(near).unwrap().name = Some(arrayvec::ArrayString::from("near").unwrap());

        // Sort the order table so the location query's binary search works.
        run_ticks(&mut eng, 1);

        assert_eq!(Some(near), eng.entity_by_name("near"));
        assert_eq!(None, eng.entity_by_name("nope"));

        let (sensors, blocks) = {
            let sensors = eng.entities_by_type(TestKind::Sensor);
            let blocks = eng.entities_by_type(TestKind::Block);
            (
                (sensors.contains(&near), sensors.contains(&far), sensors.len()),
                (blocks.contains(&block), blocks.len()),
            )
        };
        assert_eq!((true, true, 2), sensors);
        assert_eq!((true, 1), blocks);

        let found = {
            let list = eng.entities_by_location(vec2(0.0, 0.0), 50.0, None, block);
            (list.contains(&near), list.contains(&far), list.contains(&block))
        };
        assert_eq!((true, false, false), found);

        let nearby_sensors = {
            let list = eng.entities_by_proximity(block, 50.0, Some(TestKind::Sensor));
            (list.len(), list.contains(&near))
        };
        assert_eq!((1, true), nearby_sensors);
    }

    #[test]
    fn top_down_games_sweep_on_y() {
        let platform = TestPlatform::new();
        let mut eng: Engine<TestKind> = Engine::new(
            &platform,
            EngineOpts {
                sweep_axis: SweepAxis::Y,
                ..test_opts()
            },
            |_, _| {},
        );
        eng.gravity = 0.0;

        let a = eng.spawn(TestKind::Sensor, vec2(0.0, 0.0)).unwrap();
        let b = eng.spawn(TestKind::Sensor, vec2(0.0, 4.0)).unwrap();
        eng.entity_mut(a).unwrap().check_against = Group::ENEMY;
        eng.entity_mut(b).unwrap().group = Group::ENEMY;

        run_ticks(&mut eng, 1);
        assert_eq!(1, eng.entity(a).unwrap().ext.touches);
    }

    #[test]
    fn level_load_applies_settings_after_all_spawns() {
        let platform = TestPlatform::new();
        platform.add_image("tiles.qoi", 16, 16);
        platform.add_asset(
            "level.json",
            br#"{
                "maps": [
                    {
                        "name": "collision",
                        "width": 3, "height": 2, "tilesize": 8, "distance": 1,
                        "data": [[0, 0, 0], [1, 1, 1]]
                    },
                    {
                        "name": "bg",
                        "width": 3, "height": 2, "tilesize": 8, "distance": 2,
                        "repeat": true, "tilesetName": "tiles.qoi",
                        "data": [[1, 2, 3], [0, 0, 0]]
                    }
                ],
                "entities": [
                    {
                        "type": "block", "x": 4, "y": 2,
                        "settings": { "target": "door1", "health": 5 }
                    },
                    {
                        "type": "sensor", "x": 9, "y": 9,
                        "settings": { "name": "door1" }
                    }
                ]
            }"#,
        );

        let mut eng = new_engine(&platform);
        eng.load_level(&platform, "level.json");

        let map = eng.collision_map.as_ref().unwrap();
        assert_eq!(1, map.tile_at(vec2i(0, 1)));
        assert_eq!(1, eng.background_maps.len());
        assert_eq!(2.0, eng.background_maps[0].distance);
        assert!(eng.background_maps[0].repeat);
        assert!(eng.background_maps[0].tileset.is_some());

        let door = eng.entity_by_name("door1").unwrap();
        assert_eq!(vec2(9.0, 9.0), eng.entity(door).unwrap().pos);

        let block = {
            let list = eng.entities_by_type(TestKind::Block);
            list[0]
        };
        let block = eng.entity(block).unwrap();
        assert_eq!(5.0, block.health);
        // "door1" is defined *after* the block in the level data; the lookup
        // can only succeed because settings are applied in a second pass.
        assert!(block.ext.target_found);
    }

    #[test]
    #[should_panic]
    fn unknown_entity_type_in_level_is_fatal() {
        let platform = TestPlatform::new();
        platform.add_asset(
            "level.json",
            br#"{ "entities": [ { "type": "dragon", "x": 0, "y": 0 } ] }"#,
        );
        let mut eng = new_engine(&platform);
        eng.load_level(&platform, "level.json");
    }

    #[test]
    #[should_panic]
    fn malformed_level_json_is_fatal() {
        let platform = TestPlatform::new();
        platform.add_asset("level.json", br#"{ "maps": 42 }"#);
        let mut eng = new_engine(&platform);
        eng.load_level(&platform, "level.json");
    }

    struct PlayScene;

    impl Scene<TestKind> for PlayScene {
        fn init(&mut self, eng: &mut Engine<TestKind>, platform: &dyn platform::Platform) {
            eng.image(platform, "sprite.qoi");
            let ent = eng.spawn(TestKind::Block, vec2(0.0, 0.0)).unwrap();
            let e = eng.entity_mut(ent).unwrap();
            e.physics = Physics::MOVE_ONLY;
            e.vel = vec2(60.0, 0.0);
            e.gravity = 0.0;
        }
    }

    #[test]
    fn frames_advance_the_scene() {
        let platform = TestPlatform::new();
        platform.add_image("sprite.qoi", 8, 8);

        let mut eng: Engine<TestKind> = Engine::new(&platform, test_opts(), |eng, _| {
            eng.set_scene(Box::new(PlayScene));
        });
        eng.gravity = 0.0;

        for frame in 1..=10 {
            platform.set_now(frame as f64 / 60.0);
            eng.update(&platform);
        }

        assert_eq!(10, eng.frame);
        assert!((eng.time - 10.0 / 60.0).abs() < 1e-6);
        assert_eq!(10, platform.frames_ended());

        let ent = {
            let list = eng.entities_by_type(TestKind::Block);
            list[0]
        };
        let x = eng.entity(ent).unwrap().pos.x;
        assert!((x - 10.0).abs() < 0.01, "x = {x}");
    }

    #[test]
    fn large_frame_deltas_are_clamped_to_max_tick() {
        let platform = TestPlatform::new();
        platform.add_image("sprite.qoi", 8, 8);
        let mut eng: Engine<TestKind> = Engine::new(&platform, test_opts(), |eng, _| {
            eng.set_scene(Box::new(PlayScene));
        });

        platform.set_now(10.0);
        eng.update(&platform);
        assert_eq!(0.1, eng.tick);
        assert!((eng.time - 0.1).abs() < 1e-6);
    }

    #[test]
    fn scene_switch_resets_to_the_init_marks() {
        let platform = TestPlatform::new();
        platform.add_image("sprite.qoi", 8, 8);

        let mut eng: Engine<TestKind> = Engine::new(&platform, test_opts(), |eng, _| {
            eng.set_scene(Box::new(PlayScene));
        });

        platform.set_now(1.0 / 60.0);
        eng.update(&platform);
        assert_eq!(1, platform.textures_live());
        assert_eq!(1, eng.frame);

        // Switch scenes: the old scene's texture/image/sound/entity state is
        // rolled back to the pre-scene marks, then the new scene's init
        // reloads what it needs.
        eng.set_scene(Box::new(PlayScene));
        platform.set_now(2.0 / 60.0);
        eng.update(&platform);

        assert_eq!(1, platform.textures_live());
        assert_eq!(1, eng.frame);
        assert!(eng.time < 0.02);
        let count = eng.entities_by_type(TestKind::Block).len();
        assert_eq!(1, count);
    }

    #[test]
    fn sound_sources_are_cached_by_path() {
        let platform = TestPlatform::new();
        platform.add_sound(
            "jump.qoa",
            platform::SoundDesc {
                channels: 1,
                samplerate: 48000,
                samples: 4,
            },
            vec![1, 2, 3, 4],
        );
        let eng = new_engine(&platform);

        let a = eng.sound_source(&platform, "jump.qoa");
        let b = eng.sound_source(&platform, "jump.qoa");
        assert_eq!(a, b);
        assert!((eng.sound.source_duration(a) - 4.0 / 48000.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic]
    fn missing_sound_asset_is_fatal() {
        let platform = TestPlatform::new();
        let eng = new_engine(&platform);
        eng.sound_source(&platform, "nope.qoa");
    }

    #[test]
    fn engine_registers_the_audio_callback() {
        let platform = TestPlatform::new();
        let eng = new_engine(&platform);

        let source = eng.sound.pcm_source(1, 48000, vec![8000i16; 256].into_boxed_slice());
        eng.sound.play(source);

        let mut dest = [0.0f32; 32];
        platform.pump_audio(&mut dest);
        assert!(dest.iter().all(|&s| s != 0.0));
    }

    #[test]
    fn camera_moves_the_viewport_towards_the_target() {
        let platform = TestPlatform::new();
        let mut eng = new_engine(&platform);
        eng.gravity = 0.0;

        let ent = eng.spawn(TestKind::Block, vec2(500.0, 300.0)).unwrap();

        let mut camera = Camera::default();
        camera.speed = 4.0;
        camera.follow(&mut eng, ent, true);
        // Snapped: viewport centered on the entity (no collision map to
        // clamp to). Logical size is 320x240.
        assert!((eng.viewport.x - (500.0 - 160.0)).abs() < 1.0);
        assert!((eng.viewport.y - (300.0 - 120.0)).abs() < 1.0);

        // Move the entity; the viewport starts chasing it.
        eng.entity_mut(ent).unwrap().pos = vec2(600.0, 300.0);
        let before = eng.viewport;
        eng.tick = 1.0 / 60.0;
        camera.update(&mut eng);
        assert!(eng.viewport.x > before.x);
        assert!((eng.viewport.y - before.y).abs() < 1e-3);
    }
}

// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! A map is a dense grid of tile indices. It can be drawn (background maps,
//! possibly repeating, with a parallax distance) or used for collision
//! testing with [`trace`](crate::trace::trace) (the collision map).
//!
//! Note that the tile indices in the json `data` rows have a bias of +1 for
//! drawing: index 0 draws nothing, index 1 draws tile 0 of the tileset. The
//! collision map's indices are used as-is by the tracer (0 = empty, 1 = fully
//! solid, 2.. = sloped or one-way, see the slope table in the trace module).

use arrayvec::ArrayString;
use platform::Platform;
use serde::Deserialize;

use crate::geom::{vec2, vec2i, Vec2, Vec2i};
use crate::image::Image;
use crate::render::Render;

/// One map descriptor inside a level's `"maps"` array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDef {
    #[serde(default)]
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub tilesize: u16,
    #[serde(default)]
    pub distance: f32,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub foreground: bool,
    #[serde(default)]
    pub tileset_name: String,
    pub data: Vec<Vec<u16>>,
}

struct MapAnim {
    inv_frame_time: f64,
    sequence: Vec<u16>,
}

/// A tile map. See the module docs.
pub struct Map {
    /// The size of the map in tiles.
    pub size: Vec2i,
    /// The size of a tile of this map, in pixels.
    pub tile_size: u16,
    /// The name of the map. For collision maps this is usually "collision";
    /// background maps may have any name.
    pub name: ArrayString<15>,
    /// The "distance" of the map when drawing at a certain offset. Maps with
    /// a higher distance move slower (parallax). Default 1.
    pub distance: f32,
    /// Whether the map repeats indefinitely when drawing.
    pub repeat: bool,
    /// Whether to draw this map in front of all entities.
    pub foreground: bool,
    /// The tileset image to use when drawing. None for collision maps.
    pub tileset: Option<Image>,
    /// Animations for certain tiles when drawing, indexed by tile. Set up
    /// with [`Map::set_anim`].
    anims: Vec<Option<MapAnim>>,
    /// The tile indices, `size.x * size.y` values in row-major order.
    data: Vec<u16>,
    /// The highest tile index in the map.
    max_tile: u16,
}

impl Map {
    /// Creates a map from raw tile data; `data` must be `size.x * size.y`
    /// values long. Mostly useful for tests and generated maps; level maps
    /// come from [`Map::from_def`].
    pub fn with_data(tile_size: u16, size: Vec2i, data: Vec<u16>) -> Map {
        assert_eq!((size.x * size.y) as usize, data.len(), "map data length");
        let max_tile = data.iter().copied().max().unwrap_or(0);
        Map {
            size,
            tile_size,
            name: ArrayString::new(),
            distance: 1.0,
            repeat: false,
            foreground: false,
            tileset: None,
            anims: Vec::new(),
            data,
            max_tile,
        }
    }

    /// Creates a map from a level json map descriptor, loading the tileset
    /// image if one is named. Malformed descriptors (bad sizes, overlong
    /// names, zero distance) are fatal.
    pub fn from_def(def: &MapDef, tileset: Option<Image>) -> Map {
        assert!(def.distance != 0.0, "invalid distance for map {}", def.name);
        let name = ArrayString::from(&def.name)
            .unwrap_or_else(|_| panic!("map name exceeds 15 chars: {}", def.name));

        assert_eq!(
            def.data.len(),
            def.height as usize,
            "map data height mismatch for {}",
            def.name
        );
        let mut data = Vec::with_capacity((def.width * def.height) as usize);
        for row in &def.data {
            assert_eq!(
                row.len(),
                def.width as usize,
                "map data width mismatch for {}",
                def.name
            );
            data.extend_from_slice(row);
        }
        let max_tile = data.iter().copied().max().unwrap_or(0);

        Map {
            size: vec2i(def.width, def.height),
            tile_size: def.tilesize,
            name,
            distance: def.distance,
            repeat: def.repeat,
            foreground: def.foreground,
            tileset,
            anims: Vec::new(),
            data,
            max_tile,
        }
    }

    /// Set the frame time and animation sequence for a particular tile.
    pub fn set_anim(&mut self, tile: u16, frame_time: f64, sequence: &[u16]) {
        assert!(!sequence.is_empty(), "map animation has empty sequence");
        if tile > self.max_tile {
            return;
        }
        if self.anims.is_empty() {
            self.anims.resize_with(self.max_tile as usize + 1, || None);
        }
        self.anims[tile as usize] = Some(MapAnim {
            inv_frame_time: 1.0 / frame_time,
            sequence: sequence.to_vec(),
        });
    }

    /// Return the tile index at the tile position, 0 when out of bounds.
    pub fn tile_at(&self, tile_pos: Vec2i) -> u16 {
        if tile_pos.x < 0 || tile_pos.x >= self.size.x || tile_pos.y < 0 || tile_pos.y >= self.size.y
        {
            0
        } else {
            self.data[(tile_pos.y * self.size.x + tile_pos.x) as usize]
        }
    }

    /// Return the tile index at the pixel position, 0 when out of bounds.
    pub fn tile_at_px(&self, px_pos: Vec2) -> u16 {
        self.tile_at(px_pos.to_vec2i() / self.tile_size as i32)
    }

    fn draw_tile(
        &self,
        render: &mut Render,
        platform: &dyn Platform,
        tileset: &Image,
        mut tile: u16,
        pos: Vec2,
        time: f64,
    ) {
        if let Some(Some(anim)) = self.anims.get(tile as usize) {
            let frame = (time * anim.inv_frame_time) as usize % anim.sequence.len();
            tile = anim.sequence[frame];
        }
        let ts = self.tile_size as i32;
        tileset.draw_tile(render, platform, tile as u32, vec2i(ts, ts), pos);
    }

    /// Draw the map at the given offset, taking the parallax distance into
    /// account. `time` drives tile animations.
    pub fn draw(&self, render: &mut Render, platform: &dyn Platform, offset: Vec2, time: f64) {
        let tileset = self
            .tileset
            .as_ref()
            .expect("cannot draw map without tileset");

        let offset = offset / self.distance;
        let rs = render.size();
        let ts = self.tile_size as i32;
        let tsf = ts as f32;

        if self.repeat {
            let tile_offset = offset.to_vec2i() / ts;
            let px_offset = vec2(offset.x.rem_euclid(tsf), offset.y.rem_euclid(tsf));
            let px_min = vec2(-px_offset.x - tsf, -px_offset.y - tsf);
            let px_max = vec2(
                -px_offset.x + rs.x as f32 + tsf,
                -px_offset.y + rs.y as f32 + tsf,
            );

            let mut pos = px_min;
            let mut map_y = -1;
            while pos.y < px_max.y {
                let y = (map_y + tile_offset.y).rem_euclid(self.size.y);

                pos.x = px_min.x;
                let mut map_x = -1;
                while pos.x < px_max.x {
                    let x = (map_x + tile_offset.x).rem_euclid(self.size.x);

                    let tile = self.data[(y * self.size.x + x) as usize];
                    if tile > 0 {
                        self.draw_tile(render, platform, tileset, tile - 1, pos, time);
                    }
                    map_x += 1;
                    pos.x += tsf;
                }
                map_y += 1;
                pos.y += tsf;
            }
        } else {
            let tile_min = vec2i(
                (offset.x as i32 / ts).max(0),
                (offset.y as i32 / ts).max(0),
            );
            let tile_max = vec2i(
                (((offset.x as i32) + rs.x + ts) / ts).min(self.size.x),
                (((offset.y as i32) + rs.y + ts) / ts).min(self.size.y),
            );

            for y in tile_min.y..tile_max.y {
                for x in tile_min.x..tile_max.x {
                    let tile = self.data[(y * self.size.x + x) as usize];
                    if tile > 0 {
                        let pos = vec2((x * ts) as f32, (y * ts) as f32) - offset;
                        self.draw_tile(render, platform, tileset, tile - 1, pos, time);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Map, MapDef};
    use crate::geom::{vec2, vec2i};

    #[test]
    fn tile_lookup_out_of_bounds_is_empty() {
        let map = Map::with_data(8, vec2i(2, 2), vec![1, 2, 3, 4]);
        assert_eq!(1, map.tile_at(vec2i(0, 0)));
        assert_eq!(4, map.tile_at(vec2i(1, 1)));
        assert_eq!(0, map.tile_at(vec2i(-1, 0)));
        assert_eq!(0, map.tile_at(vec2i(2, 0)));
        assert_eq!(0, map.tile_at(vec2i(0, 5)));
    }

    #[test]
    fn tile_lookup_by_pixel() {
        let map = Map::with_data(8, vec2i(2, 2), vec![1, 2, 3, 4]);
        assert_eq!(1, map.tile_at_px(vec2(3.0, 7.9)));
        assert_eq!(4, map.tile_at_px(vec2(8.0, 8.0)));
        assert_eq!(0, map.tile_at_px(vec2(100.0, 0.0)));
    }

    #[test]
    fn from_def_flattens_rows() {
        let def: MapDef = serde_json::from_str(
            r#"{
                "name": "background",
                "width": 3,
                "height": 2,
                "tilesize": 8,
                "distance": 2.0,
                "repeat": true,
                "data": [[0, 1, 2], [3, 2, 1]]
            }"#,
        )
        .unwrap();
        let map = Map::from_def(&def, None);
        assert_eq!(vec2i(3, 2), map.size);
        assert_eq!(2.0, map.distance);
        assert!(map.repeat);
        assert_eq!(2, map.tile_at(vec2i(2, 0)));
        assert_eq!(3, map.tile_at(vec2i(0, 1)));
    }

    #[test]
    #[should_panic]
    fn mismatched_row_length_is_fatal() {
        let def: MapDef = serde_json::from_str(
            r#"{"width": 3, "height": 1, "tilesize": 8, "distance": 1.0, "data": [[0, 1]]}"#,
        )
        .unwrap();
        Map::from_def(&def, None);
    }

    #[test]
    #[should_panic]
    fn mismatched_row_count_is_fatal() {
        let def: MapDef = serde_json::from_str(
            r#"{"width": 1, "height": 2, "tilesize": 8, "distance": 1.0, "data": [[0]]}"#,
        )
        .unwrap();
        Map::from_def(&def, None);
    }
}

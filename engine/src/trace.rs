// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! The swept AABB tracer: given a tile map, a moving box and its displacement
//! for this step, find the earliest collision with a fully solid, sloped or
//! one-way tile. The tracer walks tiles (not pixels), checking only the tiles
//! whose edges the box's leading corner crosses on each tile-sized substep.

use crate::geom::{vec2, vec2i, Vec2, Vec2i};
use crate::map::Map;

/// The result of a [`trace`]. `tile == 0` means the full displacement was
/// possible without hitting anything.
#[derive(Debug, Clone, Copy)]
pub struct Trace {
    /// The tile index that was hit, 0 for no hit.
    pub tile: u16,
    /// The tile coordinate of the hit tile.
    pub tile_pos: Vec2i,
    /// The fraction (0..1) of the displacement that was possible before the
    /// hit.
    pub length: f32,
    /// The resulting position of the box's top-left corner.
    pub pos: Vec2,
    /// The unit normal of the surface that was hit.
    pub normal: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct SlopeDef {
    start: Vec2,
    dir: Vec2,
    normal: Vec2,
    solid: bool,
}

// Define all sloped tiles by their start and end coordinates in normalized
// (0..1) tile space. The direction of the slope and the slope's normal are
// computed from this at compile time. `const fn` float math can't call
// `sqrt()`, so the normal lengths use three iterations of Newton's method,
// which is reasonably accurate for the needed range of 0..2.

const fn sqrt_iter(n: f32, guess: f32) -> f32 {
    (guess + n / guess) * 0.5
}

const fn approx_sqrt(n: f32) -> f32 {
    sqrt_iter(n, sqrt_iter(n, sqrt_iter(n, n)))
}

const fn slope(sx: f32, sy: f32, ex: f32, ey: f32, solid: bool) -> Option<SlopeDef> {
    let dx = ex - sx;
    let dy = ey - sy;
    let len = approx_sqrt(dx * dx + dy * dy);
    Some(SlopeDef {
        start: vec2(sx, sy),
        dir: vec2(dx, dy),
        normal: vec2(dy / len, -dx / len),
        solid,
    })
}

// Corner points for all slope tiles are either at 0.0, 1.0, 1/2, 1/3 or 2/3.
const H: f32 = 1.0 / 2.0;
const N: f32 = 1.0 / 3.0;
const M: f32 = 2.0 / 3.0;
const SOLID: bool = true;
const ONE_WAY: bool = false;

/// Slope definitions for tile indices 2..=55, grouped by steepness (15°, 22°,
/// 45°, 67°, 75°) and orientation. Indices without a definition never
/// collide.
static SLOPES: [Option<SlopeDef>; 56] = {
    let mut t: [Option<SlopeDef>; 56] = [None; 56];

    // NE
    t[5] = slope(0.0, 1.0, 1.0, M, SOLID);
    t[6] = slope(0.0, M, 1.0, N, SOLID);
    t[7] = slope(0.0, N, 1.0, 0.0, SOLID);
    t[3] = slope(0.0, 1.0, 1.0, H, SOLID);
    t[4] = slope(0.0, H, 1.0, 0.0, SOLID);
    t[2] = slope(0.0, 1.0, 1.0, 0.0, SOLID);
    t[10] = slope(H, 1.0, 1.0, 0.0, SOLID);
    t[21] = slope(0.0, 1.0, H, 0.0, SOLID);
    t[32] = slope(M, 1.0, 1.0, 0.0, SOLID);
    t[43] = slope(N, 1.0, M, 0.0, SOLID);
    t[54] = slope(0.0, 1.0, N, 0.0, SOLID);

    // SE
    t[27] = slope(0.0, 0.0, 1.0, N, SOLID);
    t[28] = slope(0.0, N, 1.0, M, SOLID);
    t[29] = slope(0.0, M, 1.0, 1.0, SOLID);
    t[25] = slope(0.0, 0.0, 1.0, H, SOLID);
    t[26] = slope(0.0, H, 1.0, 1.0, SOLID);
    t[24] = slope(0.0, 0.0, 1.0, 1.0, SOLID);
    t[11] = slope(0.0, 0.0, H, 1.0, SOLID);
    t[22] = slope(H, 0.0, 1.0, 1.0, SOLID);
    t[33] = slope(0.0, 0.0, N, 1.0, SOLID);
    t[44] = slope(N, 0.0, M, 1.0, SOLID);
    t[55] = slope(M, 0.0, 1.0, 1.0, SOLID);

    // NW
    t[16] = slope(1.0, N, 0.0, 0.0, SOLID);
    t[17] = slope(1.0, M, 0.0, N, SOLID);
    t[18] = slope(1.0, 1.0, 0.0, M, SOLID);
    t[14] = slope(1.0, H, 0.0, 0.0, SOLID);
    t[15] = slope(1.0, 1.0, 0.0, H, SOLID);
    t[13] = slope(1.0, 1.0, 0.0, 0.0, SOLID);
    t[8] = slope(H, 1.0, 0.0, 0.0, SOLID);
    t[19] = slope(1.0, 1.0, H, 0.0, SOLID);
    t[30] = slope(N, 1.0, 0.0, 0.0, SOLID);
    t[41] = slope(M, 1.0, N, 0.0, SOLID);
    t[52] = slope(1.0, 1.0, M, 0.0, SOLID);

    // SW
    t[38] = slope(1.0, M, 0.0, 1.0, SOLID);
    t[39] = slope(1.0, N, 0.0, M, SOLID);
    t[40] = slope(1.0, 0.0, 0.0, N, SOLID);
    t[36] = slope(1.0, H, 0.0, 1.0, SOLID);
    t[37] = slope(1.0, 0.0, 0.0, H, SOLID);
    t[35] = slope(1.0, 0.0, 0.0, 1.0, SOLID);
    t[9] = slope(1.0, 0.0, H, 1.0, SOLID);
    t[20] = slope(H, 0.0, 0.0, 1.0, SOLID);
    t[31] = slope(1.0, 0.0, M, 1.0, SOLID);
    t[42] = slope(M, 0.0, N, 1.0, SOLID);
    t[53] = slope(N, 0.0, 0.0, 1.0, SOLID);

    // One-way lines: north, south, east, west.
    t[12] = slope(0.0, 0.0, 1.0, 0.0, ONE_WAY);
    t[23] = slope(1.0, 1.0, 0.0, 1.0, ONE_WAY);
    t[34] = slope(1.0, 0.0, 1.0, 1.0, ONE_WAY);
    t[45] = slope(0.0, 1.0, 0.0, 0.0, ONE_WAY);

    t
};

/// Trace the box of `size` from `from` along the displacement `vel`, against
/// the map's tiles.
pub fn trace(map: &Map, from: Vec2, vel: Vec2, size: Vec2) -> Trace {
    let to = from + vel;

    let mut res = Trace {
        tile: 0,
        tile_pos: vec2i(0, 0),
        pos: to,
        normal: Vec2::ZERO,
        length: 1.0,
    };

    // Quick check if the whole trace is out of bounds.
    let map_size_px = (map.size * map.tile_size as i32).to_vec2();
    if (from.x + size.x < 0.0 && to.x + size.x < 0.0)
        || (from.y + size.y < 0.0 && to.y + size.y < 0.0)
        || (from.x > map_size_px.x && to.x > map_size_px.x)
        || (from.y > map_size_px.y && to.y > map_size_px.y)
        || (vel.x == 0.0 && vel.y == 0.0)
    {
        return res;
    }

    let offset = vec2(
        if vel.x > 0.0 { 1.0 } else { 0.0 },
        if vel.y > 0.0 { 1.0 } else { 0.0 },
    );
    let corner = from + size.mul_comp(offset);
    let dir = offset * -2.0 + vec2(1.0, 1.0);

    let max_vel = f32::max(vel.x * -dir.x, vel.y * -dir.y);
    let steps = (max_vel / map.tile_size as f32).ceil() as i32;
    if steps == 0 {
        return res;
    }
    let step_size = vel / steps as f32;

    let mut last_tile_pos = vec2i(-16, -16);
    let mut extra_step_for_slope = false;
    for i in 0..=steps {
        let tile_pos = ((corner + step_size * i as f32) / map.tile_size as f32).to_vec2i();

        let mut corner_tile_checked = 0;
        if last_tile_pos.x != tile_pos.x {
            // Figure out the number of tiles in y direction we need to check.
            // This walks along the vertical edge of the object (height) from
            // the current tile_pos.
            let mut max_y = from.y + size.y * (1.0 - offset.y);
            if i > 0 {
                max_y += (vel.y / vel.x)
                    * ((tile_pos.x as f32 + 1.0 - offset.x) * map.tile_size as f32 - corner.x);
            }

            let num_tiles =
                (max_y / map.tile_size as f32 - tile_pos.y as f32 - offset.y).abs().ceil() as i32;
            for t in 0..num_tiles {
                check_tile(
                    map,
                    from,
                    vel,
                    size,
                    vec2i(tile_pos.x, tile_pos.y + dir.y as i32 * t),
                    &mut res,
                );
            }

            last_tile_pos.x = tile_pos.x;
            corner_tile_checked = 1;
        }

        if last_tile_pos.y != tile_pos.y {
            // Same as above, for the number of tiles in x direction along the
            // horizontal edge of the object (width).
            let mut max_x = from.x + size.x * (1.0 - offset.x);
            if i > 0 {
                max_x += (vel.x / vel.y)
                    * ((tile_pos.y as f32 + 1.0 - offset.y) * map.tile_size as f32 - corner.y);
            }

            let num_tiles =
                (max_x / map.tile_size as f32 - tile_pos.x as f32 - offset.x).abs().ceil() as i32;
            for t in corner_tile_checked..num_tiles {
                check_tile(
                    map,
                    from,
                    vel,
                    size,
                    vec2i(tile_pos.x + dir.x as i32 * t, tile_pos.y),
                    &mut res,
                );
            }

            last_tile_pos.y = tile_pos.y;
        }

        // If we collided with a sloped tile, we have to check one more step
        // forward because we may still collide with another tile at an
        // earlier length. For fully solid tiles we can return right away.
        if res.tile > 0 && (res.tile == 1 || extra_step_for_slope) {
            return res;
        }
        extra_step_for_slope = true;
    }

    res
}

#[inline]
fn check_tile(map: &Map, pos: Vec2, vel: Vec2, size: Vec2, tile_pos: Vec2i, res: &mut Trace) {
    match map.tile_at(tile_pos) {
        0 => {}
        1 => resolve_full_tile(map, pos, vel, size, tile_pos, res),
        tile => resolve_sloped_tile(map, pos, vel, size, tile_pos, tile, res),
    }
}

fn resolve_full_tile(map: &Map, pos: Vec2, vel: Vec2, size: Vec2, tile_pos: Vec2i, res: &mut Trace) {
    // The minimum resulting x or y position in case of a collision. Only the
    // x or y coordinate is correct, depending on whether we enter the tile
    // horizontally or vertically; the wrong one is recalculated below.
    let mut rp = (tile_pos * map.tile_size as i32).to_vec2()
        + vec2(
            if vel.x > 0.0 { -size.x } else { map.tile_size as f32 },
            if vel.y > 0.0 { -size.y } else { map.tile_size as f32 },
        );

    // If we don't move in y direction, or we do move in x and the tile
    // corner's cross product with the movement vector has the correct sign,
    // this is a horizontal collision, otherwise it's vertical.
    let sign = vel.cross(rp - pos) * vel.x * vel.y;

    let length;
    if sign < 0.0 || vel.y == 0.0 {
        // Horizontal collision (x direction, left or right edge).
        length = ((pos.x - rp.x) / vel.x).abs();
        if length > res.length {
            return;
        }
        rp.y = pos.y + length * vel.y;
        res.normal = vec2(if vel.x > 0.0 { -1.0 } else { 1.0 }, 0.0);
    } else {
        // Vertical collision (y direction, top or bottom edge).
        length = ((pos.y - rp.y) / vel.y).abs();
        if length > res.length {
            return;
        }
        rp.x = pos.x + length * vel.x;
        res.normal = vec2(0.0, if vel.y > 0.0 { -1.0 } else { 1.0 });
    }

    res.tile = 1;
    res.tile_pos = tile_pos;
    res.length = length;
    res.pos = rp;
}

fn resolve_sloped_tile(
    map: &Map,
    pos: Vec2,
    vel: Vec2,
    size: Vec2,
    tile_pos: Vec2i,
    tile: u16,
    res: &mut Trace,
) {
    assert!(
        (tile as usize) < SLOPES.len(),
        "tile index {tile} overflows the slope table"
    );
    let Some(slope) = &SLOPES[tile as usize] else {
        return;
    };

    // Transform the slope line's starting point (ss) and direction (sd) into
    // world space coordinates.
    let tile_pos_px = tile_pos.to_vec2() * map.tile_size as f32;
    let ss = slope.start * map.tile_size as f32;
    let sd = slope.dir * map.tile_size as f32;
    let local_pos = pos - tile_pos_px;

    // Do a line vs. line collision with the object's velocity and the slope
    // itself. This still has problems with precision: when moving very slowly
    // along the slope, we might slip behind it.
    let epsilon = 0.001;
    let determinant = vel.cross(sd);

    if determinant < -epsilon {
        let corner = (local_pos - ss)
            + vec2(
                if sd.y < 0.0 { size.x } else { 0.0 },
                if sd.x > 0.0 { size.y } else { 0.0 },
            );

        let point_at_slope = vel.cross(corner) / determinant;
        let point_at_vel = sd.cross(corner) / determinant;

        // Are we in front of the slope and moving into it?
        if point_at_vel > -epsilon
            && point_at_vel < 1.0 + epsilon
            && point_at_slope > -epsilon
            && point_at_slope < 1.0 + epsilon
        {
            // Is this an earlier point than one that we already collided
            // with?
            if point_at_vel <= res.length {
                res.tile = tile;
                res.tile_pos = tile_pos;
                res.length = point_at_vel;
                res.normal = slope.normal;
                res.pos = pos + vel * point_at_vel;
            }
            return;
        }
    }
    // Is this a one-way tile that we're approaching from the wrong side?
    if !slope.solid && (determinant > 0.0 || sd.x * sd.y != 0.0) {
        return;
    }

    // We did not collide with the slope itself, but we still have to check if
    // we collide with the slope's corners or the remaining sides of the tile.
    // Figure out the potential collision points for a horizontal or vertical
    // collision and the min and max coords that still collide with the tile.

    let mut rp = Vec2::ZERO;
    let mut min = Vec2::ZERO;
    let mut max = Vec2::ZERO;

    if sd.y >= 0.0 {
        // Left tile edge.
        min.x = -size.x - epsilon;

        // Left or right slope corner?
        max.x = (if vel.y > 0.0 { ss.x } else { ss.x + sd.x }) - epsilon;
        rp.x = if vel.x > 0.0 {
            min.x
        } else {
            f32::max(ss.x, ss.x + sd.x)
        };
    } else {
        // Left or right slope corner?
        min.x = (if vel.y > 0.0 { ss.x + sd.x } else { ss.x }) - size.x + epsilon;

        // Right tile edge.
        max.x = map.tile_size as f32 + epsilon;
        rp.x = if vel.x > 0.0 {
            f32::min(ss.x, ss.x + sd.x) - size.x
        } else {
            max.x
        };
    }

    if sd.x > 0.0 {
        // Top or bottom slope corner?
        min.y = (if vel.x > 0.0 { ss.y } else { ss.y + sd.y }) - size.y + epsilon;

        // Bottom tile edge.
        max.y = map.tile_size as f32 + epsilon;
        rp.y = if vel.y > 0.0 {
            f32::min(ss.y, ss.y + sd.y) - size.y
        } else {
            max.y
        };
    } else {
        // Top tile edge.
        min.y = -size.y - epsilon;

        // Top or bottom slope corner?
        max.y = (if vel.x > 0.0 { ss.y + sd.y } else { ss.y }) - epsilon;
        rp.y = if vel.y > 0.0 {
            min.y
        } else {
            f32::max(ss.y, ss.y + sd.y)
        };
    }

    // Figure out if this is a horizontal or vertical collision. This step is
    // similar to what we do with full tile collisions.
    let sign = vel.cross(rp - local_pos) * vel.x * vel.y;
    let length;
    if sign < 0.0 || vel.y == 0.0 {
        // Horizontal collision (x direction, left or right edge).
        length = ((local_pos.x - rp.x) / vel.x).abs();
        rp.y = local_pos.y + length * vel.y;

        if rp.y >= max.y
            || rp.y <= min.y
            || length > res.length
            || (!slope.solid && sd.y == 0.0)
        {
            return;
        }

        res.normal = vec2(if vel.x > 0.0 { -1.0 } else { 1.0 }, 0.0);
    } else {
        // Vertical collision (y direction, top or bottom edge).
        length = ((local_pos.y - rp.y) / vel.y).abs();
        rp.x = local_pos.x + length * vel.x;

        if rp.x >= max.x
            || rp.x <= min.x
            || length > res.length
            || (!slope.solid && sd.x == 0.0)
        {
            return;
        }

        res.normal = vec2(0.0, if vel.y > 0.0 { -1.0 } else { 1.0 });
    }

    res.tile = tile;
    res.tile_pos = tile_pos;
    res.length = length;
    res.pos = rp + tile_pos_px;
}

#[cfg(test)]
mod tests {
    use super::{trace, SLOPES};
    use crate::geom::{vec2, vec2i, Vec2};
    use crate::map::Map;

    /// A 10x10 map of 8px tiles with the given tiles set.
    fn map_with_tiles(tiles: &[(i32, i32, u16)]) -> Map {
        let mut data = vec![0u16; 100];
        for &(x, y, tile) in tiles {
            data[(y * 10 + x) as usize] = tile;
        }
        Map::with_data(8, vec2i(10, 10), data)
    }

    #[test]
    fn empty_map_is_a_free_pass() {
        let map = map_with_tiles(&[]);
        let from = vec2(1.0, 2.0);
        let vel = vec2(13.0, 17.0);
        let t = trace(&map, from, vel, vec2(4.0, 4.0));
        assert_eq!(0, t.tile);
        assert_eq!(1.0, t.length);
        assert!(t.pos.nearly_eq(from + vel));
    }

    #[test]
    fn zero_velocity_is_a_no_hit() {
        let map = map_with_tiles(&[(0, 0, 1)]);
        let t = trace(&map, vec2(1.0, 1.0), Vec2::ZERO, vec2(4.0, 4.0));
        assert_eq!(0, t.tile);
        assert_eq!(1.0, t.length);
    }

    #[test]
    fn horizontal_hit_stops_at_the_tile_edge() {
        // Full tile at x=5 (tile coords), approached from the left.
        let map = map_with_tiles(&[(5, 0, 1)]);
        let size = vec2(4.0, 4.0);
        let t = trace(&map, vec2(0.0, 0.0), vec2(100.0, 0.0), size);
        assert_eq!(1, t.tile);
        assert_eq!(vec2i(5, 0), t.tile_pos);
        assert_eq!(40.0 - size.x, t.pos.x);
        assert_eq!(vec2(-1.0, 0.0), t.normal);
        assert!(t.length >= 0.0 && t.length <= 1.0);
    }

    #[test]
    fn vertical_hit_reports_an_up_normal() {
        let map = map_with_tiles(&[(0, 5, 1)]);
        let t = trace(&map, vec2(0.0, 0.0), vec2(0.0, 100.0), vec2(8.0, 8.0));
        assert_eq!(1, t.tile);
        assert_eq!(40.0 - 8.0, t.pos.y);
        assert_eq!(vec2(0.0, -1.0), t.normal);
    }

    #[test]
    fn hit_position_matches_travelled_fraction() {
        let map = map_with_tiles(&[(5, 2, 1)]);
        let from = vec2(3.0, 17.0);
        let vel = vec2(60.0, 2.0);
        let t = trace(&map, from, vel, vec2(4.0, 4.0));
        assert_eq!(1, t.tile);
        let expected = from + vel * t.length;
        assert!((expected.x - t.pos.x).abs() < 1e-3);
        assert!((expected.y - t.pos.y).abs() < 1e-3);
    }

    #[test]
    fn negative_direction_hits_report_positive_normals() {
        let map = map_with_tiles(&[(0, 0, 1)]);
        let t = trace(&map, vec2(20.0, 0.0), vec2(-100.0, 0.0), vec2(4.0, 4.0));
        assert_eq!(1, t.tile);
        assert_eq!(8.0, t.pos.x);
        assert_eq!(vec2(1.0, 0.0), t.normal);
    }

    #[test]
    fn slope_45_reports_its_normal() {
        // Tile 2 is the 45° NE solid slope: surface from (0,1) to (1,0).
        let map = map_with_tiles(&[(2, 5, 2)]);
        let t = trace(&map, vec2(16.0, 30.0), vec2(0.0, 20.0), vec2(8.0, 8.0));
        assert_eq!(2, t.tile);
        // The surface runs from the tile's bottom-left to its top-right, so
        // the normal points up and to the left at 45 degrees.
        assert!(t.normal.x < -0.7 && t.normal.x > -0.72);
        assert!(t.normal.y < -0.7 && t.normal.y > -0.72);
        assert!(t.length < 1.0);
    }

    #[test]
    fn one_way_platform_only_collides_from_above() {
        // Tile 12 is the one-way "north" line at the tile's top edge.
        let map = map_with_tiles(&[(0, 5, 12)]);
        let size = vec2(8.0, 8.0);

        // Falling onto it from above: hit.
        let down = trace(&map, vec2(0.0, 20.0), vec2(0.0, 30.0), size);
        assert_eq!(12, down.tile);
        assert_eq!(vec2(0.0, -1.0), down.normal);
        assert_eq!(40.0 - size.y, down.pos.y);

        // Jumping up through it from below: no hit.
        let up = trace(&map, vec2(0.0, 60.0), vec2(0.0, -30.0), size);
        assert_eq!(0, up.tile);

        // Moving sideways through it: no hit.
        let side = trace(&map, vec2(-20.0, 38.0), vec2(60.0, 0.0), size);
        assert_eq!(0, side.tile);
    }

    #[test]
    fn earliest_hit_wins_across_multiple_tiles() {
        let map = map_with_tiles(&[(3, 0, 1), (6, 0, 1)]);
        let t = trace(&map, vec2(0.0, 0.0), vec2(70.0, 0.0), vec2(4.0, 4.0));
        assert_eq!(vec2i(3, 0), t.tile_pos);
        assert_eq!(24.0 - 4.0, t.pos.x);
    }

    #[test]
    fn out_of_map_motion_is_free() {
        let map = map_with_tiles(&[(0, 0, 1)]);
        // Entirely below the map, moving further down.
        let t = trace(&map, vec2(0.0, 200.0), vec2(0.0, 50.0), vec2(8.0, 8.0));
        assert_eq!(0, t.tile);
        assert_eq!(1.0, t.length);
    }

    #[test]
    fn slope_normals_are_unit_length() {
        for slope in SLOPES.iter().flatten() {
            let len = slope.normal.len();
            assert!((len - 1.0).abs() < 1e-3, "normal length {len}");
        }
    }

    #[test]
    #[should_panic]
    fn tile_beyond_the_slope_table_is_fatal() {
        let map = map_with_tiles(&[(1, 0, 200)]);
        trace(&map, vec2(0.0, 0.0), vec2(30.0, 0.0), vec2(4.0, 4.0));
    }
}

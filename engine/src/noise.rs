// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! 2D gradient noise over a permuted grid of random unit-square gradients.
//! The pattern repeats with a period of `1 << size_bits`.

use crate::geom::{vec2, Vec2};
use crate::rand::Rng;

/// A noise field. The gradient table is generated from the given [`Rng`], so
/// fields are reproducible from a seed.
pub struct Noise {
    size_bits: u8,
    gradients: Vec<Vec2>,
    permutations: Vec<u16>,
}

impl Noise {
    /// Creates a noise field with a period of `1 << size_bits`. More than 15
    /// bits is fatal.
    pub fn new(rng: &mut Rng, size_bits: u8) -> Noise {
        assert!(size_bits <= 15, "max noise size bits");
        let size = 1usize << size_bits;

        let gradients = (0..size)
            .map(|_| vec2(rng.float(-1.0, 1.0), rng.float(-1.0, 1.0)))
            .collect();
        let mut permutations: Vec<u16> = (0..size as u16).collect();
        rng.shuffle(&mut permutations);

        Noise {
            size_bits,
            gradients,
            permutations,
        }
    }

    /// Sample the noise field; returns roughly -1..1.
    pub fn gen(&self, pos: Vec2) -> f32 {
        let size = 1usize << self.size_bits;
        let mask = size - 1;

        let p = &self.permutations;
        let g = &self.gradients;

        // Compute which gradients to use.
        let qx0 = pos.x as usize & mask;
        let qx1 = (qx0 + 1) & mask;
        let tx0 = pos.x - (pos.x as i32) as f32;
        let tx1 = tx0 - 1.0;

        let qy0 = pos.y as usize & mask;
        let qy1 = (qy0 + 1) & mask;
        let ty0 = pos.y - (pos.y as i32) as f32;
        let ty1 = ty0 - 1.0;

        // Permute the indices to get pseudo-randomly chosen gradients.
        let q00 = p[(qy0 + p[qx0] as usize) & mask] as usize;
        let q01 = p[(qy0 + p[qx1] as usize) & mask] as usize;
        let q10 = p[(qy1 + p[qx0] as usize) & mask] as usize;
        let q11 = p[(qy1 + p[qx1] as usize) & mask] as usize;

        // The dot products between the corner offsets and the gradients.
        let v00 = g[q00].x * tx0 + g[q00].y * ty0;
        let v01 = g[q01].x * tx1 + g[q01].y * ty0;
        let v10 = g[q10].x * tx0 + g[q10].y * ty1;
        let v11 = g[q11].x * tx1 + g[q11].y * ty1;

        // Modulate with the smoothstep weight function.
        let wx = (3.0 - 2.0 * tx0) * tx0 * tx0;
        let v0 = v00 - wx * (v00 - v01);
        let v1 = v10 - wx * (v10 - v11);

        let wy = (3.0 - 2.0 * ty0) * ty0 * ty0;
        v0 - wy * (v0 - v1)
    }
}

#[cfg(test)]
mod tests {
    use super::Noise;
    use crate::geom::vec2;
    use crate::rand::Rng;

    #[test]
    fn same_seed_same_field() {
        let a = Noise::new(&mut Rng::with_seed(3), 4);
        let b = Noise::new(&mut Rng::with_seed(3), 4);
        for i in 0..64 {
            let pos = vec2(i as f32 * 0.37, i as f32 * 0.71);
            assert_eq!(a.gen(pos), b.gen(pos));
        }
    }

    #[test]
    fn values_stay_in_sane_range() {
        let noise = Noise::new(&mut Rng::with_seed(11), 5);
        for i in 0..1000 {
            let pos = vec2(i as f32 * 0.173, i as f32 * 0.129);
            let v = noise.gen(pos);
            assert!((-2.0..=2.0).contains(&v), "noise out of range: {v}");
        }
    }

    #[test]
    #[should_panic]
    fn too_many_size_bits_is_fatal() {
        Noise::new(&mut Rng::with_seed(0), 16);
    }
}

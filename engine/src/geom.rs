// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use bytemuck::{Pod, Zeroable};

/// The tolerance below which two [`Vec2`]s compare equal with
/// [`Vec2::nearly_eq`].
pub const VEC2_EQ_EPSILON: f32 = 0.0001;

/// A 2D vector of `f32`, used for positions, sizes and velocities alike.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

// Safety: repr(C), two f32 fields, no padding, no interior mutability; any
// bit pattern (including all zeroes) is a valid value.
unsafe impl Zeroable for Vec2 {}
unsafe impl Pod for Vec2 {}

/// Shorthand for [`Vec2::new`].
pub const fn vec2(x: f32, y: f32) -> Vec2 {
    Vec2 { x, y }
}

impl Vec2 {
    pub const ZERO: Vec2 = vec2(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Vec2 {
        Vec2 { x, y }
    }

    /// The unit vector pointing at the angle `a` (radians, 0 = +x).
    pub fn from_angle(a: f32) -> Vec2 {
        vec2(a.cos(), a.sin())
    }

    /// The angle of this vector in radians.
    pub fn to_angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// The angle in radians of a line from `self` to `other`.
    pub fn angle_to(self, other: Vec2) -> f32 {
        (other - self).to_angle()
    }

    pub fn abs(self) -> Vec2 {
        vec2(self.x.abs(), self.y.abs())
    }

    pub fn len(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dist(self, other: Vec2) -> f32 {
        (self - other).len()
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// The 2D cross product (the z component of the 3D cross product of the
    /// two vectors lifted onto the xy plane).
    pub fn cross(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Component-wise multiplication.
    pub fn mul_comp(self, other: Vec2) -> Vec2 {
        vec2(self.x * other.x, self.y * other.y)
    }

    /// Component-wise division.
    pub fn div_comp(self, other: Vec2) -> Vec2 {
        vec2(self.x / other.x, self.y / other.y)
    }

    /// Whether the vectors are equal within [`VEC2_EQ_EPSILON`].
    pub fn nearly_eq(self, other: Vec2) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() < VEC2_EQ_EPSILON
    }

    /// Transform by an affine transform matrix.
    pub fn transform(self, m: &Mat3) -> Vec2 {
        vec2(
            m.a * self.x + m.b * self.y + m.tx,
            m.c * self.x + m.d * self.y + m.ty,
        )
    }

    /// Truncate both components towards zero.
    pub fn to_vec2i(self) -> Vec2i {
        vec2i(self.x as i32, self.y as i32)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        vec2(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        *self = *self + rhs;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        vec2(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        vec2(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f32) -> Vec2 {
        vec2(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        vec2(-self.x, -self.y)
    }
}

/// A 2D vector of `i32`, used for tile coordinates and pixel sizes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Vec2i {
    pub x: i32,
    pub y: i32,
}

// Safety: as for Vec2, with i32 fields.
unsafe impl Zeroable for Vec2i {}
unsafe impl Pod for Vec2i {}

/// Shorthand for [`Vec2i::new`].
pub const fn vec2i(x: i32, y: i32) -> Vec2i {
    Vec2i { x, y }
}

impl Vec2i {
    pub const fn new(x: i32, y: i32) -> Vec2i {
        Vec2i { x, y }
    }

    pub fn abs(self) -> Vec2i {
        vec2i(self.x.abs(), self.y.abs())
    }

    pub fn to_vec2(self) -> Vec2 {
        vec2(self.x as f32, self.y as f32)
    }
}

impl Add for Vec2i {
    type Output = Vec2i;
    fn add(self, rhs: Vec2i) -> Vec2i {
        vec2i(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2i {
    type Output = Vec2i;
    fn sub(self, rhs: Vec2i) -> Vec2i {
        vec2i(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<i32> for Vec2i {
    type Output = Vec2i;
    fn mul(self, rhs: i32) -> Vec2i {
        vec2i(self.x * rhs, self.y * rhs)
    }
}

impl Div<i32> for Vec2i {
    type Output = Vec2i;
    fn div(self, rhs: i32) -> Vec2i {
        vec2i(self.x / rhs, self.y / rhs)
    }
}

/// A 2D affine transform: `[a c tx; b d ty]` applied as column-vector
/// multiplication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3 {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn translate(&mut self, t: Vec2) -> &mut Mat3 {
        self.tx += self.a * t.x + self.c * t.y;
        self.ty += self.b * t.x + self.d * t.y;
        self
    }

    pub fn scale(&mut self, r: Vec2) -> &mut Mat3 {
        self.a *= r.x;
        self.b *= r.x;
        self.c *= r.y;
        self.d *= r.y;
        self
    }

    pub fn rotate(&mut self, r: f32) -> &mut Mat3 {
        let (sin, cos) = r.sin_cos();
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        self.a = a * cos + c * sin;
        self.b = b * cos + d * sin;
        self.c = c * cos - a * sin;
        self.d = d * cos - b * sin;
        self
    }
}

/// A floating-point axis-aligned 2D rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// The top-left corner of the rectangle.
    pub pos: Vec2,
    /// The size of the rectangle.
    pub size: Vec2,
}

impl Rect {
    /// Creates a new [`Rect`] from a given top-left corner and dimensions.
    pub const fn new(pos: Vec2, size: Vec2) -> Rect {
        Rect { pos, size }
    }

    /// Whether the two rectangles overlap (touching edges don't count).
    pub fn overlaps(self, other: Rect) -> bool {
        !(self.pos.x >= other.pos.x + other.size.x
            || self.pos.x + self.size.x <= other.pos.x
            || self.pos.y >= other.pos.y + other.size.y
            || self.pos.y + self.size.y <= other.pos.y)
    }
}

/// Wrap an angle to the -π..π range.
pub fn wrap_angle(a: f32) -> f32 {
    let mut a = (a + core::f32::consts::PI).rem_euclid(core::f32::consts::PI * 2.0);
    if a < 0.0 {
        a += core::f32::consts::PI * 2.0;
    }
    a - core::f32::consts::PI
}

/// Linearly interpolate from `a` to `b` over normalized 0..1 `t`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Scales `v` from the input range to the output range. Useful for all kinds
/// of transitions, e.g. moving an image in from the right side of the screen
/// to the center over two seconds, starting at the third:
/// `x = scale(time, 3.0, 5.0, screen.x, screen.x / 2.0)`
pub fn scale(v: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    out_min + (out_max - out_min) * ((v - in_min) / (in_max - in_min))
}

/// Round `v` to the given precision, e.g. `round_to_precision(1.234, 10.0) ==
/// 1.2`.
pub fn round_to_precision(v: f32, p: f32) -> f32 {
    (v * p).round() / p
}

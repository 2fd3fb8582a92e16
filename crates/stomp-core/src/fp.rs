//! Deterministic fixed-point scalars, vectors, and boxes.
//!
//! All simulation math runs on Q48.16 fixed-point values so every peer
//! computes bit-identical results regardless of platform or FPU state.

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Simulation scalar: 48 integer bits, 16 fractional bits.
pub type Fp = fixed::types::I48F16;

/// Converts a plain integer to a simulation scalar.
pub fn fp(value: i64) -> Fp {
    Fp::from_num(value)
}

/// Exact fixed-point ratio, for constants like `fp_ratio(1, 2)`.
pub fn fp_ratio(numer: i64, denom: i64) -> Fp {
    Fp::from_num(numer) / Fp::from_num(denom)
}

/// 2D fixed-point vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct FpVec2 {
    pub x: Fp,
    pub y: Fp,
}

impl FpVec2 {
    pub const ZERO: FpVec2 = FpVec2 {
        x: Fp::ZERO,
        y: Fp::ZERO,
    };

    pub const fn new(x: Fp, y: Fp) -> Self {
        Self { x, y }
    }

    /// Integer-coordinate constructor, mostly for tests and stage data.
    pub fn from_ints(x: i64, y: i64) -> Self {
        Self::new(fp(x), fp(y))
    }

    pub fn dot(self, other: FpVec2) -> Fp {
        self.x * other.x + self.y * other.y
    }

    pub fn magnitude_sq(self) -> Fp {
        self.dot(self)
    }

    pub fn magnitude(self) -> Fp {
        fp_sqrt(self.magnitude_sq())
    }

    /// Unit direction, or zero for the zero vector. All integer math; every
    /// peer gets the same bits.
    pub fn normalized_or_zero(self) -> FpVec2 {
        let magnitude = self.magnitude();
        if magnitude == Fp::ZERO {
            return FpVec2::ZERO;
        }
        FpVec2::new(self.x / magnitude, self.y / magnitude)
    }
}

/// Square root of a non-negative fixed-point value via integer Newton
/// iteration on the raw bits. Negative inputs return zero.
pub fn fp_sqrt(value: Fp) -> Fp {
    let bits = value.to_bits();
    if bits <= 0 {
        return Fp::ZERO;
    }
    // sqrt(v) in Q48.16: isqrt(bits << 16), since bits = v * 2^16.
    #[allow(clippy::cast_sign_loss)]
    let scaled = (bits as u128) << 16;
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    Fp::from_bits(isqrt(scaled) as i64)
}

fn isqrt(n: u128) -> u128 {
    if n == 0 {
        return 0;
    }
    let shift = (128 - n.leading_zeros()).div_ceil(2);
    let mut x = 1u128 << shift;
    loop {
        let next = (x + n / x) / 2;
        if next >= x {
            return x;
        }
        x = next;
    }
}

impl Add for FpVec2 {
    type Output = FpVec2;

    fn add(self, rhs: FpVec2) -> FpVec2 {
        FpVec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for FpVec2 {
    fn add_assign(&mut self, rhs: FpVec2) {
        *self = *self + rhs;
    }
}

impl Sub for FpVec2 {
    type Output = FpVec2;

    fn sub(self, rhs: FpVec2) -> FpVec2 {
        FpVec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for FpVec2 {
    fn sub_assign(&mut self, rhs: FpVec2) {
        *self = *self - rhs;
    }
}

impl Neg for FpVec2 {
    type Output = FpVec2;

    fn neg(self) -> FpVec2 {
        FpVec2::new(-self.x, -self.y)
    }
}

impl Mul<Fp> for FpVec2 {
    type Output = FpVec2;

    fn mul(self, rhs: Fp) -> FpVec2 {
        FpVec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned box described by center and half extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: FpVec2,
    pub half_extents: FpVec2,
}

impl Aabb {
    pub const fn new(center: FpVec2, half_extents: FpVec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn min(&self) -> FpVec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> FpVec2 {
        self.center + self.half_extents
    }

    /// A box with a non-positive extent cannot produce contacts; the
    /// resolver treats it as "touching nothing" rather than an error.
    pub fn is_degenerate(&self) -> bool {
        self.half_extents.x <= Fp::ZERO || self.half_extents.y <= Fp::ZERO
    }

    /// Strict overlap test; touching edges do not count as overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let a_min = self.min();
        let a_max = self.max();
        let b_min = other.min();
        let b_max = other.max();

        a_min.x < b_max.x && a_max.x > b_min.x && a_min.y < b_max.y && a_max.y > b_min.y
    }

    /// Expands the box to cover its motion over one tick.
    pub fn expanded_by_motion(&self, motion: FpVec2) -> Aabb {
        let half_motion = FpVec2::new(motion.x / 2, motion.y / 2);
        let abs_half = FpVec2::new(half_motion.x.abs(), half_motion.y.abs());

        Aabb::new(self.center + half_motion, self.half_extents + abs_half)
    }
}

/// Remaps `x` to the representation closest to `reference` on a wrapping
/// level of the given width. Entities straddling the seam compare positions
/// through this before deciding which side a contact came from.
pub fn unwrap_x(reference: Fp, x: Fp, level_width: Fp) -> Fp {
    if level_width <= Fp::ZERO {
        return x;
    }

    let half = level_width / 2;
    let mut result = x;
    while result - reference > half {
        result -= level_width;
    }
    while reference - result > half {
        result += level_width;
    }
    result
}

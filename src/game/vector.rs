//! 2D vector math shared by the whole simulation

use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Plain 2D vector. Positions, directions and velocities all use it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction.
    ///
    /// Returns `None` for a zero-length (or non-finite) vector instead of
    /// producing NaN components.
    pub fn normalized(&self) -> Option<Self> {
        let mag = self.magnitude();
        if mag > 0.0 && mag.is_finite() {
            Some(Self::new(self.x / mag, self.y / mag))
        } else {
            None
        }
    }

    /// Like [`Vector2::normalized`], falling back to `(0, 0)`.
    pub fn normalized_or_zero(&self) -> Self {
        self.normalized().unwrap_or(Self::ZERO)
    }

    pub fn distance(&self, other: Self) -> f32 {
        (*self - other).magnitude()
    }

    /// True when either component is non-zero
    pub fn is_nonzero(&self) -> bool {
        self.x != 0.0 || self.y != 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Scale down to `max_len` if longer, otherwise return unchanged.
    pub fn clamp_length(&self, max_len: f32) -> Self {
        let mag = self.magnitude();
        if mag > max_len && mag > 0.0 {
            *self * (max_len / mag)
        } else {
            *self
        }
    }
}

impl Add for Vector2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_of_3_4_is_5() {
        assert_eq!(Vector2::new(3.0, 4.0).magnitude(), 5.0);
        assert_eq!(Vector2::ZERO.magnitude(), 0.0);
    }

    #[test]
    fn normalized_has_unit_length() {
        for v in [
            Vector2::new(3.0, 4.0),
            Vector2::new(-0.001, 0.0),
            Vector2::new(1200.0, -5.5),
            Vector2::new(0.0, 42.0),
        ] {
            let n = v.normalized().expect("non-zero vector");
            assert!((n.magnitude() - 1.0).abs() < 1e-5, "{v:?} -> {n:?}");
        }
    }

    #[test]
    fn normalizing_zero_is_guarded() {
        assert_eq!(Vector2::ZERO.normalized(), None);
        assert_eq!(Vector2::ZERO.normalized_or_zero(), Vector2::ZERO);
        assert_eq!(Vector2::new(f32::NAN, 1.0).normalized(), None);
    }

    #[test]
    fn clamp_length_only_shrinks() {
        let long = Vector2::new(30.0, 40.0).clamp_length(1.0);
        assert!((long.magnitude() - 1.0).abs() < 1e-6);

        let short = Vector2::new(0.3, 0.4);
        assert_eq!(short.clamp_length(1.0), short);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Vector2::new(300.0, 300.0);
        let b = Vector2::new(310.0, 300.0);
        assert_eq!(a.distance(b), 10.0);
        assert_eq!(b.distance(a), 10.0);
    }
}

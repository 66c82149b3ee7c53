use std::f32::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// World-space 2D vector.
///
/// Angles follow the world convention: `0` points along `+y` and angles grow
/// clockwise, so the unit vector for angle `a` is `(sin a, cos a)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_polar(magnitude: f32, angle: f32) -> Self {
        Self {
            x: magnitude * angle.sin(),
            y: magnitude * angle.cos(),
        }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance_to(self, other: Point) -> f32 {
        (other - self).length()
    }

    pub fn distance_squared_to(self, other: Point) -> f32 {
        (other - self).length_squared()
    }

    pub fn dot(self, other: Point) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Angle pointing from `self` towards `other`.
    pub fn angle_to(self, other: Point) -> f32 {
        normalize_angle((other.x - self.x).atan2(other.y - self.y))
    }

    pub fn angle(self) -> f32 {
        normalize_angle(self.x.atan2(self.y))
    }

    /// Unit vector, or `None` for a zero-length input.
    pub fn normalized(self) -> Option<Point> {
        let len_sq = self.length_squared();
        if len_sq <= f32::EPSILON {
            return None;
        }
        let inv_len = len_sq.sqrt().recip();
        Some(Point {
            x: self.x * inv_len,
            y: self.y * inv_len,
        })
    }

    /// Rotates clockwise by `angle` radians.
    pub fn rotated(self, angle: f32) -> Point {
        let (sin, cos) = angle.sin_cos();
        Point {
            x: self.x * cos + self.y * sin,
            y: self.y * cos - self.x * sin,
        }
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn midpoint(self, other: Point) -> Point {
        self.lerp(other, 0.5)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Wraps into `[0, 2π)`.
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in `[-π, π]`.
pub fn angle_difference(from: f32, to: f32) -> f32 {
    let mut diff = (to - from).rem_euclid(TAU);
    if diff > PI {
        diff -= TAU;
    }
    diff
}

/// Rotates `current` toward `target` by at most `max_step`, never overshooting.
pub fn turn_angle_toward(current: f32, target: f32, max_step: f32) -> f32 {
    let diff = angle_difference(current, target);
    if diff.abs() <= max_step {
        return normalize_angle(target);
    }
    normalize_angle(current + max_step.copysign(diff))
}

pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * t
}

/// Smallest non-negative root of `a t² + b t + c = 0`.
///
/// Degenerate inputs (no real roots, both coefficients zero, or only negative
/// roots) produce `None` instead of NaN.
pub fn smallest_positive_root(a: f32, b: f32, c: f32) -> Option<f32> {
    if a.abs() <= f32::EPSILON {
        if b.abs() <= f32::EPSILON {
            return None;
        }
        let t = -c / b;
        return (t >= 0.0 && t.is_finite()).then_some(t);
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || !discriminant.is_finite() {
        return None;
    }
    let sqrt_disc = discriminant.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    let (low, high) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
    if low >= 0.0 {
        Some(low)
    } else if high >= 0.0 {
        Some(high)
    } else {
        None
    }
}

use serde::{Deserialize, Serialize};

use crate::math::Point;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoxShape {
    Circular { radius: f32 },
    Rectangular { width: f32, height: f32 },
}

impl BoxShape {
    /// Radius of the smallest circle around the box centre that contains it.
    pub fn bounding_radius(self) -> f32 {
        match self {
            Self::Circular { radius } => radius,
            Self::Rectangular { width, height } => {
                (width * width + height * height).sqrt() * 0.5
            }
        }
    }
}

/// A shape placed in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedBox {
    pub shape: BoxShape,
    pub position: Point,
    pub rotation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

/// Result of a positive overlap test.
///
/// `push` moves the first box out of the second; `point` is an approximate
/// contact point in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    pub push: Point,
    pub point: Point,
}

impl PlacedBox {
    pub fn circle(position: Point, radius: f32) -> Self {
        Self {
            shape: BoxShape::Circular { radius },
            position,
            rotation: 0.0,
        }
    }

    pub fn rectangle(position: Point, width: f32, height: f32, rotation: f32) -> Self {
        Self {
            shape: BoxShape::Rectangular { width, height },
            position,
            rotation,
        }
    }

    pub fn aabb(&self) -> Aabb {
        let (half_x, half_y) = match self.shape {
            BoxShape::Circular { radius } => (radius, radius),
            BoxShape::Rectangular { width, height } => {
                let (sin, cos) = self.rotation.sin_cos();
                let hw = width * 0.5;
                let hh = height * 0.5;
                (
                    hw * cos.abs() + hh * sin.abs(),
                    hw * sin.abs() + hh * cos.abs(),
                )
            }
        };
        Aabb {
            min: Point::new(self.position.x - half_x, self.position.y - half_y),
            max: Point::new(self.position.x + half_x, self.position.y + half_y),
        }
    }

    pub fn collide(&self, other: &PlacedBox) -> Option<CollisionResult> {
        match (self.shape, other.shape) {
            (BoxShape::Circular { radius: ra }, BoxShape::Circular { radius: rb }) => {
                circles_collide(self.position, ra, other.position, rb)
            }
            (BoxShape::Circular { radius }, BoxShape::Rectangular { width, height }) => {
                circle_rectangle_collide(
                    self.position,
                    radius,
                    other.position,
                    width,
                    height,
                    other.rotation,
                )
            }
            (BoxShape::Rectangular { width, height }, BoxShape::Circular { radius }) => {
                circle_rectangle_collide(
                    other.position,
                    radius,
                    self.position,
                    width,
                    height,
                    self.rotation,
                )
                .map(|result| CollisionResult {
                    push: -result.push,
                    point: result.point,
                })
            }
            (
                BoxShape::Rectangular {
                    width: wa,
                    height: ha,
                },
                BoxShape::Rectangular {
                    width: wb,
                    height: hb,
                },
            ) => rectangles_collide(
                self.position,
                wa,
                ha,
                self.rotation,
                other.position,
                wb,
                hb,
                other.rotation,
            ),
        }
    }

    pub fn intersects_circle(&self, center: Point, radius: f32) -> bool {
        self.collide(&PlacedBox::circle(center, radius)).is_some()
    }
}

fn circles_collide(a: Point, ra: f32, b: Point, rb: f32) -> Option<CollisionResult> {
    let delta = a - b;
    let distance_sq = delta.length_squared();
    let reach = ra + rb;
    if distance_sq >= reach * reach {
        return None;
    }
    let distance = distance_sq.sqrt();
    let direction = delta.normalized().unwrap_or(Point::new(0.0, 1.0));
    let overlap = reach - distance;
    Some(CollisionResult {
        push: direction * overlap,
        point: b + direction * (rb - overlap * 0.5),
    })
}

fn circle_rectangle_collide(
    circle: Point,
    radius: f32,
    rect: Point,
    width: f32,
    height: f32,
    rotation: f32,
) -> Option<CollisionResult> {
    // Work in the rectangle's frame so the slab test is axis-aligned.
    let local = (circle - rect).rotated(-rotation);
    let hw = width * 0.5;
    let hh = height * 0.5;
    let closest = Point::new(local.x.clamp(-hw, hw), local.y.clamp(-hh, hh));
    let delta = local - closest;
    let distance_sq = delta.length_squared();
    if distance_sq >= radius * radius {
        return None;
    }

    let local_push = if distance_sq > f32::EPSILON {
        let distance = distance_sq.sqrt();
        delta * ((radius - distance) / distance)
    } else {
        // Centre inside the rectangle: leave through the nearest face.
        let exit_x = hw - local.x.abs();
        let exit_y = hh - local.y.abs();
        if exit_x < exit_y {
            Point::new((exit_x + radius).copysign(local.x), 0.0)
        } else {
            Point::new(0.0, (exit_y + radius).copysign(local.y))
        }
    };

    Some(CollisionResult {
        push: local_push.rotated(rotation),
        point: rect + closest.rotated(rotation),
    })
}

fn rectangle_axes(rotation: f32) -> [Point; 2] {
    [
        Point::new(1.0, 0.0).rotated(rotation),
        Point::new(0.0, 1.0).rotated(rotation),
    ]
}

fn project_rectangle(center: Point, hw: f32, hh: f32, rotation: f32, axis: Point) -> (f32, f32) {
    let [axis_x, axis_y] = rectangle_axes(rotation);
    let center_proj = center.dot(axis);
    let extent = hw * axis_x.dot(axis).abs() + hh * axis_y.dot(axis).abs();
    (center_proj - extent, center_proj + extent)
}

#[allow(clippy::too_many_arguments)]
fn rectangles_collide(
    a: Point,
    wa: f32,
    ha: f32,
    ra: f32,
    b: Point,
    wb: f32,
    hb: f32,
    rb: f32,
) -> Option<CollisionResult> {
    let mut best_overlap = f32::INFINITY;
    let mut best_axis = Point::ZERO;

    let axes = rectangle_axes(ra).into_iter().chain(rectangle_axes(rb));
    for axis in axes {
        let (a_min, a_max) = project_rectangle(a, wa * 0.5, ha * 0.5, ra, axis);
        let (b_min, b_max) = project_rectangle(b, wb * 0.5, hb * 0.5, rb, axis);
        let overlap = a_max.min(b_max) - a_min.max(b_min);
        if overlap <= 0.0 {
            return None;
        }
        if overlap < best_overlap {
            best_overlap = overlap;
            let center_delta = (a - b).dot(axis);
            best_axis = if center_delta < 0.0 { -axis } else { axis };
        }
    }

    Some(CollisionResult {
        push: best_axis * best_overlap,
        point: a.midpoint(b),
    })
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_4;

    use super::*;

    #[test]
    fn touching_circles_do_not_collide() {
        let a = PlacedBox::circle(Point::new(0.0, 0.0), 10.0);
        let b = PlacedBox::circle(Point::new(20.0, 0.0), 10.0);
        assert!(a.collide(&b).is_none());
    }

    #[test]
    fn overlapping_circles_push_apart_along_centre_line() {
        let a = PlacedBox::circle(Point::new(0.0, 0.0), 10.0);
        let b = PlacedBox::circle(Point::new(15.0, 0.0), 10.0);
        let result = a.collide(&b).expect("collision");
        assert!((result.push.x + 5.0).abs() < 1e-4);
        assert!(result.push.y.abs() < 1e-4);
    }

    #[test]
    fn coincident_circles_still_produce_a_finite_push() {
        let a = PlacedBox::circle(Point::new(3.0, 3.0), 4.0);
        let result = a.collide(&a).expect("collision");
        assert!(result.push.is_finite());
        assert!(result.push.length() > 0.0);
    }

    #[test]
    fn circle_hits_rotated_rectangle_corner_only_after_rotation() {
        let rect = PlacedBox::rectangle(Point::ZERO, 20.0, 20.0, FRAC_PI_4);
        let circle = PlacedBox::circle(Point::new(11.0, 11.0), 2.0);
        // The axis-aligned corner would be at (10, 10); rotated it moves inward.
        assert!(circle.collide(&rect).is_none());

        let unrotated = PlacedBox::rectangle(Point::ZERO, 20.0, 20.0, 0.0);
        assert!(circle.collide(&unrotated).is_some());
    }

    #[test]
    fn circle_inside_rectangle_exits_through_nearest_face() {
        let rect = PlacedBox::rectangle(Point::ZERO, 20.0, 20.0, 0.0);
        let circle = PlacedBox::circle(Point::new(8.0, 0.0), 1.0);
        let result = circle.collide(&rect).expect("collision");
        assert!(result.push.x > 0.0);
        assert!(result.push.y.abs() < 1e-4);
    }

    #[test]
    fn rectangle_rectangle_uses_minimum_axis() {
        let a = PlacedBox::rectangle(Point::new(0.0, 0.0), 10.0, 10.0, 0.0);
        let b = PlacedBox::rectangle(Point::new(8.0, 1.0), 10.0, 10.0, 0.0);
        let result = a.collide(&b).expect("collision");
        assert!((result.push.x + 2.0).abs() < 1e-4);

        let far = PlacedBox::rectangle(Point::new(30.0, 0.0), 10.0, 10.0, 0.3);
        assert!(a.collide(&far).is_none());
    }

    #[test]
    fn rectangle_circle_push_is_mirrored() {
        let rect = PlacedBox::rectangle(Point::ZERO, 10.0, 10.0, 0.0);
        let circle = PlacedBox::circle(Point::new(7.0, 0.0), 3.0);
        let from_rect = rect.collide(&circle).expect("collision");
        let from_circle = circle.collide(&rect).expect("collision");
        assert!((from_rect.push.x + from_circle.push.x).abs() < 1e-4);
    }

    #[test]
    fn aabb_of_rotated_square_grows() {
        let rect = PlacedBox::rectangle(Point::ZERO, 10.0, 10.0, FRAC_PI_4);
        let aabb = rect.aabb();
        assert!(aabb.max.x > 7.0 && aabb.max.x < 7.1);
    }
}

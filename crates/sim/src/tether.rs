use crate::hitbox::Hitbox;
use crate::math::{angle_difference, normalize_angle, Point};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularTether {
    /// Ideal direction from `a` to `b`, relative to `a`'s facing.
    pub ideal_angle: f32,
    pub spring_constant: f32,
    pub damping: f32,
    /// Dead zone either side of the ideal angle where no correction applies.
    pub padding: f32,
}

/// Spring-damper constraint between two root hitboxes of the same transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tether {
    pub hitbox_a: usize,
    pub hitbox_b: usize,
    pub ideal_distance: f32,
    pub spring_constant: f32,
    pub damping: f32,
    pub angular: Option<AngularTether>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TetherCorrection {
    pub acceleration_a: Point,
    pub acceleration_b: Point,
}

impl TetherCorrection {
    pub fn is_zero(&self) -> bool {
        self.acceleration_a == Point::ZERO && self.acceleration_b == Point::ZERO
    }
}

impl Tether {
    pub fn new(hitbox_a: usize, hitbox_b: usize, ideal_distance: f32, spring_constant: f32, damping: f32) -> Self {
        Self {
            hitbox_a,
            hitbox_b,
            ideal_distance,
            spring_constant,
            damping,
            angular: None,
        }
    }

    pub fn with_angular(mut self, angular: AngularTether) -> Self {
        self.angular = Some(angular);
        self
    }

    pub fn positional_error(&self, a: &Hitbox, b: &Hitbox) -> f32 {
        a.position.distance_to(b.position) - self.ideal_distance
    }

    /// Signed angular error outside the padding dead zone, in `[-π, π]`.
    pub fn angular_error(&self, a: &Hitbox, b: &Hitbox) -> f32 {
        let Some(angular) = self.angular else {
            return 0.0;
        };
        if a.position.distance_squared_to(b.position) <= f32::EPSILON {
            return 0.0;
        }
        let target = normalize_angle(a.angle + angular.ideal_angle);
        let measured = a.position.angle_to(b.position);
        let error = angle_difference(target, measured);
        if error.abs() <= angular.padding {
            0.0
        } else {
            error - angular.padding.copysign(error)
        }
    }

    pub fn corrective_accelerations(&self, a: &Hitbox, b: &Hitbox) -> TetherCorrection {
        let delta = b.position - a.position;
        let Some(direction) = delta.normalized() else {
            return TetherCorrection::default();
        };
        let distance = delta.length();
        let relative_velocity = b.velocity - a.velocity;

        let mut correction = TetherCorrection::default();

        let error = distance - self.ideal_distance;
        let closing_speed = relative_velocity.dot(direction);
        let force = self.spring_constant * error + self.damping * closing_speed;
        if force != 0.0 {
            correction.acceleration_a += direction * (force * inverse_mass(a.mass));
            correction.acceleration_b -= direction * (force * inverse_mass(b.mass));
        }

        if let Some(angular) = self.angular {
            let angle_error = self.angular_error(a, b);
            if angle_error != 0.0 {
                // Clockwise tangent at b around a.
                let tangent = Point::new(direction.y, -direction.x);
                let tangential_speed = relative_velocity.dot(tangent);
                let tangential_force =
                    -angular.spring_constant * angle_error * distance - angular.damping * tangential_speed;
                correction.acceleration_b += tangent * (tangential_force * inverse_mass(b.mass));
            }
        }

        correction
    }
}

/// Massless hitboxes ignore tether forces.
fn inverse_mass(mass: f32) -> f32 {
    if mass > 0.0 {
        1.0 / mass
    } else {
        0.0
    }
}

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Number of scalars of a [`Configuration`] when viewed as a point for axis-aligned splitting.
pub const CONFIGURATION_AXES: usize = 7;

/// A rigid-body pose: position plus unit quaternion orientation.
///
/// The quaternion is never renormalised; callers supply unit quaternions.
/// As a 7-D point the axes are ordered `x, y, z, w, qx, qy, qz`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Configuration {
    pub const IDENTITY: Self = Self {
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: DVec3) -> Self {
        Self::new(position, DQuat::IDENTITY)
    }

    pub fn from_rotation(rotation: DQuat) -> Self {
        Self::new(DVec3::ZERO, rotation)
    }

    /// Builds a configuration from its 7-D point form.
    pub fn from_coords(c: [f64; CONFIGURATION_AXES]) -> Self {
        Self::new(
            DVec3::new(c[0], c[1], c[2]),
            DQuat::from_xyzw(c[4], c[5], c[6], c[3]),
        )
    }

    /// Scalar on the given axis. Axes beyond 6 read as `qz`.
    pub fn coord(&self, axis: usize) -> f64 {
        match axis {
            0 => self.position.x,
            1 => self.position.y,
            2 => self.position.z,
            3 => self.rotation.w,
            4 => self.rotation.x,
            5 => self.rotation.y,
            _ => self.rotation.z,
        }
    }

    pub fn coords(&self) -> [f64; CONFIGURATION_AXES] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.rotation.w,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        ]
    }

    /// The same pose with the quaternion's other representative (`-q`).
    pub fn with_negated_rotation(&self) -> Self {
        Self::new(self.position, -self.rotation)
    }

    /// Euclidean distance between positions.
    pub fn positional_distance(&self, other: &Self) -> f64 {
        self.position.distance(other.position)
    }

    /// Angle of the relative rotation, in `[0, pi]`.
    pub fn rotational_distance(&self, other: &Self) -> f64 {
        rotation_angle(self.rotation, other.rotation)
    }

    pub fn pair_distance(&self, other: &Self) -> DistancePair {
        DistancePair::new(self.positional_distance(other), self.rotational_distance(other))
    }

    /// Combined distance with rotation weighted 1.
    pub fn distance(&self, other: &Self) -> f64 {
        self.scaled_distance(other, 1.0)
    }

    /// Combined distance `sqrt(p^2 + (s * r)^2)`.
    ///
    /// A rotation scale equal to the body's bounding radius turns the angle into
    /// the arc length travelled by the body's outermost point.
    pub fn scaled_distance(&self, other: &Self, rotation_scale: f64) -> f64 {
        let p = self.positional_distance(other);
        let r = self.rotational_distance(other) * rotation_scale;
        (p * p + r * r).sqrt()
    }

    /// Linear position / spherical rotation interpolation; `t = 0` yields `self`.
    pub fn interpolate(&self, other: &Self, t: f64) -> Self {
        Self::new(
            self.position.lerp(other.position, t),
            self.rotation.slerp(other.rotation, t),
        )
    }

    pub fn midpoint(&self, other: &Self) -> Self {
        self.interpolate(other, 0.5)
    }

    /// Applies a relative change: translation added, rotation post-multiplied.
    pub fn compose(&self, change: &Self) -> Self {
        Self::new(self.position + change.position, self.rotation * change.rotation)
    }

    /// `true` if both poses agree within `tolerance` in combined distance.
    pub fn is_near(&self, other: &Self, tolerance: f64) -> bool {
        self.distance(other) < tolerance
    }
}

/// Angle between two orientations, invariant under `q -> -q`.
///
/// Equals `2 acos(|a . b|)` for unit quaternions; the `atan2` form stays exact
/// for identical inputs where `acos` near 1 loses precision.
pub fn rotation_angle(a: DQuat, b: DQuat) -> f64 {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    2.0 * (a - b).length().atan2((a + b).length())
}

/// A positional / rotational distance pair, compared component-wise.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistancePair {
    pub positional: f64,
    pub rotational: f64,
}

impl DistancePair {
    pub fn new(positional: f64, rotational: f64) -> Self {
        Self {
            positional,
            rotational,
        }
    }

    /// `true` if both components are strictly below the limits.
    pub fn within(&self, limits: &DistancePair) -> bool {
        self.positional < limits.positional && self.rotational < limits.rotational
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_axis_layout() {
        let c = Configuration::new(
            DVec3::new(1.0, 2.0, 3.0),
            DQuat::from_xyzw(0.5, 0.5, 0.5, 0.5),
        );
        assert_eq!(c.coords(), [1.0, 2.0, 3.0, 0.5, 0.5, 0.5, 0.5]);
        assert_eq!(c.coord(3), c.rotation.w);
        assert_eq!(Configuration::from_coords(c.coords()), c);
    }

    #[test]
    fn test_rotational_distance_double_cover() {
        let a = Configuration::from_rotation(DQuat::from_rotation_z(0.3));
        let b = Configuration::from_rotation(DQuat::from_rotation_z(1.0));
        let d = a.rotational_distance(&b);
        assert!((d - 0.7).abs() < 1e-9, "got {}", d);
        assert!((a.rotational_distance(&b.with_negated_rotation()) - d).abs() < 1e-9);
        assert_eq!(a.rotational_distance(&a.with_negated_rotation()), 0.0);
    }

    #[test]
    fn test_rotational_distance_range() {
        let a = Configuration::IDENTITY;
        let b = Configuration::from_rotation(DQuat::from_rotation_x(PI));
        assert!((a.rotational_distance(&b) - PI).abs() < 1e-9);
    }

    #[test]
    fn test_interpolation_endpoints() {
        let a = Configuration::from_position(DVec3::ZERO);
        let b = Configuration::new(DVec3::new(2.0, 0.0, 0.0), DQuat::from_rotation_y(1.0));
        assert!(a.interpolate(&b, 0.0).is_near(&a, 1e-9));
        assert!(a.interpolate(&b, 1.0).is_near(&b, 1e-9));
        let mid = a.midpoint(&b);
        assert!((mid.position.x - 1.0).abs() < 1e-12);
        assert!((mid.rotational_distance(&a) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_distance() {
        let a = Configuration::IDENTITY;
        let b = Configuration::new(DVec3::new(3.0, 0.0, 0.0), DQuat::from_rotation_z(2.0));
        assert!((a.scaled_distance(&b, 2.0) - 5.0).abs() < 1e-9);
        assert!((a.scaled_distance(&b, 0.0) - 3.0).abs() < 1e-9);
    }
}

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Static obstacle geometry, expressed in the obstacle's local frame.
pub trait Shape: Send + Sync + std::fmt::Debug {
    /// Signed distance from a local point to the surface; negative inside.
    fn signed_distance(&self, point: DVec3) -> f64;

    /// Radius of a ball around the local origin enclosing the shape.
    fn bounding_radius(&self) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct SphereShape {
    pub radius: f64,
}

impl Shape for SphereShape {
    fn signed_distance(&self, point: DVec3) -> f64 {
        point.length() - self.radius
    }

    fn bounding_radius(&self) -> f64 {
        self.radius
    }
}

/// Axis-aligned box centred on the local origin.
#[derive(Debug, Clone, Copy)]
pub struct CuboidShape {
    pub half_extents: DVec3,
}

impl Shape for CuboidShape {
    fn signed_distance(&self, point: DVec3) -> f64 {
        let q = point.abs() - self.half_extents;
        let outside = q.max(DVec3::ZERO).length();
        let inside = q.max_element().min(0.0);
        outside + inside
    }

    fn bounding_radius(&self) -> f64 {
        self.half_extents.length()
    }
}

/// Capped cylinder along the local z axis, centred on the origin.
#[derive(Debug, Clone, Copy)]
pub struct CylinderShape {
    pub radius: f64,
    pub half_height: f64,
}

impl Shape for CylinderShape {
    fn signed_distance(&self, point: DVec3) -> f64 {
        let radial = (point.x * point.x + point.y * point.y).sqrt() - self.radius;
        let axial = point.z.abs() - self.half_height;
        let outside = (radial.max(0.0).powi(2) + axial.max(0.0).powi(2)).sqrt();
        outside + radial.max(axial).min(0.0)
    }

    fn bounding_radius(&self) -> f64 {
        (self.radius * self.radius + self.half_height * self.half_height).sqrt()
    }
}

/// One sphere of a movable body, in the body frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySphere {
    pub center: DVec3,
    pub radius: f64,
}

/// Geometry of a movable object as a union of spheres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub spheres: Vec<BodySphere>,
}

impl Body {
    pub fn sphere(radius: f64) -> Self {
        Self {
            spheres: vec![BodySphere {
                center: DVec3::ZERO,
                radius,
            }],
        }
    }

    pub fn with_sphere(mut self, center: DVec3, radius: f64) -> Self {
        self.spheres.push(BodySphere { center, radius });
        self
    }

    pub fn bounding_radius(&self) -> f64 {
        self.spheres
            .iter()
            .map(|s| s.center.length() + s.radius)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_distance() {
        let cuboid = CuboidShape {
            half_extents: DVec3::new(1.0, 2.0, 3.0),
        };
        assert!((cuboid.signed_distance(DVec3::new(2.0, 0.0, 0.0)) - 1.0).abs() < 1e-12);
        assert!((cuboid.signed_distance(DVec3::ZERO) + 1.0).abs() < 1e-12);
        assert!((cuboid.signed_distance(DVec3::new(2.0, 3.0, 0.0)) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_cylinder_distance() {
        let cylinder = CylinderShape {
            radius: 1.0,
            half_height: 1.0,
        };
        assert!((cylinder.signed_distance(DVec3::new(0.0, 0.0, 3.0)) - 2.0).abs() < 1e-12);
        assert!((cylinder.signed_distance(DVec3::new(0.5, 0.0, 0.0)) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_body_bounding_radius() {
        let body = Body::sphere(0.1).with_sphere(DVec3::new(0.3, 0.0, 0.0), 0.2);
        assert!((body.bounding_radius() - 0.5).abs() < 1e-12);
        assert_eq!(Body::default().bounding_radius(), 0.0);
    }
}

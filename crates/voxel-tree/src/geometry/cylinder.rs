//! Capped cylinders used as edge test volumes.

use nalgebra::{Point3, Vector3};

/// A cylinder with spherical caps around a line segment.
///
/// `direction` is unit length; the segment runs from
/// `center - ½·length·direction` to `center + ½·length·direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    pub center: Point3<f64>,
    pub direction: Vector3<f64>,
    pub length: f64,
    pub radius: f64,
}

impl Cylinder {
    /// Creates the cylinder of radius `radius` around the segment `a`–`b`.
    ///
    /// Returns `None` if the segment has zero length.
    pub fn from_segment(a: Point3<f64>, b: Point3<f64>, radius: f64) -> Option<Self> {
        let d = b - a;
        let length = d.norm();
        if length <= f64::EPSILON {
            return None;
        }
        Some(Self {
            center: nalgebra::center(&a, &b),
            direction: d / length,
            length,
            radius,
        })
    }

    /// Signed distance from `p` to the capped cylinder surface.
    ///
    /// Inside the mantle region this is the radial distance minus the
    /// radius; beyond either end it is the distance to the cap sphere.
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        let v = p - self.center;
        let along = self.direction.dot(&v);
        let half = 0.5 * self.length;
        if along.abs() <= half {
            return (v - self.direction * along).norm() - self.radius;
        }
        let cap = if along > 0.0 {
            self.center + self.direction * half
        } else {
            self.center - self.direction * half
        };
        (p - cap).norm() - self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn x_cylinder() -> Cylinder {
        Cylinder::from_segment(Point3::origin(), Point3::new(2.0, 0.0, 0.0), 0.5).unwrap()
    }

    #[test]
    fn mantle_distance() {
        let c = x_cylinder();
        assert_approx_eq!(c.signed_distance(&Point3::new(1.0, 1.0, 0.0)), 0.5);
        assert_approx_eq!(c.signed_distance(&Point3::new(1.0, 0.0, 0.0)), -0.5);
    }

    #[test]
    fn cap_distance() {
        let c = x_cylinder();
        assert_approx_eq!(c.signed_distance(&Point3::new(3.0, 0.0, 0.0)), 0.5);
        assert_approx_eq!(c.signed_distance(&Point3::new(-0.25, 0.0, 0.0)), -0.25);
    }

    #[test]
    fn degenerate_segment_rejected() {
        assert!(Cylinder::from_segment(Point3::origin(), Point3::origin(), 1.0).is_none());
    }
}

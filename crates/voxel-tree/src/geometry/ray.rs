//! Parametric rays.

use nalgebra::{Point3, Vector3};

/// A ray `origin + t · direction`.
///
/// The direction is stored as given; it is not normalized, so ray
/// parameters scale with its length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    origin: Point3<f64>,
    direction: Vector3<f64>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vector3<f64> {
        self.direction
    }

    /// Returns the point at parameter `t`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }
}

//! Oriented planes used for the voxelization band and edge tests.

use nalgebra::{Point3, Vector3};

/// Oriented plane `{ p : n · p = d }` with unit normal `n`.
///
/// Points on the normal side have positive [`signed_distance`](Self::signed_distance).
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    normal: Vector3<f64>,
    offset: f64,
}

impl Plane {
    /// Plane through `point` facing `normal`. The normal need not be unit
    /// length; `None` if it has no direction.
    pub fn through(point: Point3<f64>, normal: Vector3<f64>) -> Option<Self> {
        let n = normal.try_normalize(f64::EPSILON)?;
        Some(Self {
            offset: n.dot(&point.coords),
            normal: n,
        })
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// `d` in `n · p = d`.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    #[inline]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        point.coords.dot(&self.normal) - self.offset
    }

    /// `true` if `point` lies on the plane or on the side opposite the
    /// normal.
    #[inline]
    pub fn is_behind(&self, point: &Point3<f64>) -> bool {
        self.signed_distance(point) <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn normal_is_normalized() {
        let plane = Plane::through(Point3::new(0.0, 2.0, 0.0), Vector3::new(0.0, 3.0, 0.0)).unwrap();
        assert_approx_eq!(plane.normal().norm(), 1.0);
        assert_approx_eq!(plane.offset(), 2.0);
    }

    #[test]
    fn distance_sign_follows_the_normal() {
        let plane = Plane::through(Point3::new(1.0, 1.0, 0.5), Vector3::z()).unwrap();
        assert_approx_eq!(plane.signed_distance(&Point3::new(0.3, 0.1, 2.0)), 1.5);
        assert_approx_eq!(plane.signed_distance(&Point3::new(5.0, 5.0, -1.5)), -2.0);
        assert!(plane.is_behind(&Point3::new(9.0, -9.0, 0.5)));
        assert!(!plane.is_behind(&Point3::new(0.0, 0.0, 0.6)));
    }

    #[test]
    fn zero_normal_has_no_plane() {
        assert!(Plane::through(Point3::origin(), Vector3::zeros()).is_none());
    }
}

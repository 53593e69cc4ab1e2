//! Axis-aligned ranges and the ray slab test.

use bitflags::bitflags;
use nalgebra::{Point3, Vector3};

use super::{Axis, Ray};

bitflags! {
    /// Mask of the six faces of an axis-aligned box.
    ///
    /// `X0` is the face at the lower X bound, `X1` the face at the upper
    /// X bound, and so on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FaceMask: u8 {
        const X0 = 1;
        const X1 = 2;
        const Y0 = 4;
        const Y1 = 8;
        const Z0 = 16;
        const Z1 = 32;
        const ALL = 63;
    }
}

impl FaceMask {
    /// Returns the face at the lower (`upper == false`) or upper bound of `axis`.
    pub fn for_axis(axis: Axis, upper: bool) -> FaceMask {
        let bit = 1u8 << (2 * axis.index() + usize::from(upper));
        FaceMask::from_bits_truncate(bit)
    }
}

/// An axis-aligned box `[min, max]` in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range3 {
    min: Point3<f64>,
    max: Point3<f64>,
}

/// Result of intersecting a ray with a [`Range3`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeHit {
    /// Ray parameter where the ray enters the box.
    pub t_near: f64,
    /// Ray parameter where the ray leaves the box.
    pub t_far: f64,
    /// Faces through which the ray enters.
    pub near_faces: FaceMask,
    /// Faces through which the ray leaves.
    pub far_faces: FaceMask,
}

impl Range3 {
    /// Creates a range from two corners. The corners are sorted per axis.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Creates the cube `[origin, origin + size]`.
    pub fn cube(origin: Point3<f64>, size: f64) -> Self {
        Self::new(origin, origin + Vector3::repeat(size))
    }

    /// Returns the bounding range of a set of points, or `None` if there are none.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut range = Self {
            min: first,
            max: first,
        };
        for p in iter {
            range.extend_point(p);
        }
        Some(range)
    }

    #[inline]
    pub fn min(&self) -> Point3<f64> {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Point3<f64> {
        self.max
    }

    /// Returns the center of the range.
    #[inline]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Returns the extent of the range along each axis.
    #[inline]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Grows the range so that it contains `p`.
    pub fn extend_point(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Grows the range so that it contains `other`.
    pub fn extend_range(&mut self, other: &Range3) {
        self.extend_point(&other.min);
        self.extend_point(&other.max);
    }

    /// Returns a copy grown by `amount` on every side.
    pub fn expanded(&self, amount: f64) -> Self {
        let d = Vector3::repeat(amount);
        Self {
            min: self.min - d,
            max: self.max + d,
        }
    }

    /// Returns `true` if `p` lies inside the range, boundary included.
    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Returns `true` if `other` lies strictly inside this range.
    ///
    /// Touching boundaries do not count as contained: a range lying on the
    /// upper boundary of a voxel nominally belongs to the neighboring voxel.
    pub fn contains_range(&self, other: &Range3) -> bool {
        (0..3).all(|i| other.min[i] > self.min[i] && other.max[i] < self.max[i])
    }

    /// Returns `true` if the ranges share at least one point.
    pub fn intersects(&self, other: &Range3) -> bool {
        (0..3).all(|i| other.min[i] <= self.max[i] && other.max[i] >= self.min[i])
    }

    /// Intersects a ray with this range using the slab method.
    ///
    /// Returns `None` if the ray misses the box or the box lies entirely
    /// behind the ray origin. Ray components with magnitude below
    /// `tolerance` are treated as parallel to the corresponding slab.
    pub fn intersect_ray(&self, ray: &Ray, tolerance: f64) -> Option<RangeHit> {
        let mut t_near = f64::NEG_INFINITY;
        let mut t_far = f64::INFINITY;
        let mut near_faces = FaceMask::empty();
        let mut far_faces = FaceMask::empty();
        let origin = ray.origin();
        let direction = ray.direction();
        for axis in Axis::ALL {
            let i = axis.index();
            let (o, d) = (origin[i], direction[i]);
            if d.abs() < tolerance {
                if o < self.min[i] - tolerance || o > self.max[i] + tolerance {
                    return None;
                }
                continue;
            }
            let mut t0 = (self.min[i] - o) / d;
            let mut t1 = (self.max[i] - o) / d;
            let mut f0 = FaceMask::for_axis(axis, false);
            let mut f1 = FaceMask::for_axis(axis, true);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                std::mem::swap(&mut f0, &mut f1);
            }
            if (t0 - t_near).abs() <= tolerance {
                near_faces |= f0;
            } else if t0 > t_near {
                t_near = t0;
                near_faces = f0;
            }
            if (t1 - t_far).abs() <= tolerance {
                far_faces |= f1;
            } else if t1 < t_far {
                t_far = t1;
                far_faces = f1;
            }
        }
        if !t_near.is_finite() || !t_far.is_finite() {
            return None;
        }
        if t_near > t_far + tolerance || t_far < 0.0 {
            return None;
        }
        Some(RangeHit {
            t_near,
            t_far,
            near_faces,
            far_faces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn unit_cube() -> Range3 {
        Range3::cube(Point3::origin(), 1.0)
    }

    #[test]
    fn new_sorts_corners() {
        let r = Range3::new(Point3::new(1.0, 0.0, 2.0), Point3::new(0.0, 1.0, -1.0));
        assert_eq!(r.min(), Point3::new(0.0, 0.0, -1.0));
        assert_eq!(r.max(), Point3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn from_points_bounds_all() {
        let pts = [
            Point3::new(0.5, 0.2, 0.1),
            Point3::new(-1.0, 3.0, 0.0),
            Point3::new(0.0, 0.0, 4.0),
        ];
        let r = Range3::from_points(&pts).unwrap();
        assert_eq!(r.min(), Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(r.max(), Point3::new(0.5, 3.0, 4.0));
        assert!(Range3::from_points(&[]).is_none());
    }

    #[test]
    fn contains_range_is_strict() {
        let outer = unit_cube();
        let inner = Range3::new(Point3::new(0.1, 0.1, 0.1), Point3::new(0.9, 0.9, 0.9));
        let touching = Range3::new(Point3::new(0.0, 0.1, 0.1), Point3::new(0.5, 0.5, 0.5));
        assert!(outer.contains_range(&inner));
        assert!(!outer.contains_range(&touching));
        assert!(!outer.contains_range(&outer));
    }

    #[test]
    fn intersects_includes_touching() {
        let a = unit_cube();
        let b = Range3::new(Point3::new(1.0, 0.5, 0.5), Point3::new(2.0, 2.0, 2.0));
        let c = Range3::new(Point3::new(1.1, 0.5, 0.5), Point3::new(2.0, 2.0, 2.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn expanded_grows_every_side() {
        let r = unit_cube().expanded(0.5);
        assert_eq!(r.min(), Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(r.max(), Point3::new(1.5, 1.5, 1.5));
    }

    #[test]
    fn slab_test_along_x() {
        let ray = Ray::new(Point3::new(-1.0, 0.5, 0.5), Vector3::x());
        let hit = unit_cube().intersect_ray(&ray, 1e-9).unwrap();
        assert_approx_eq!(hit.t_near, 1.0);
        assert_approx_eq!(hit.t_far, 2.0);
        assert_eq!(hit.near_faces, FaceMask::X0);
        assert_eq!(hit.far_faces, FaceMask::X1);
    }

    #[test]
    fn slab_test_reversed_direction_swaps_faces() {
        let ray = Ray::new(Point3::new(3.0, 0.5, 0.5), -Vector3::x());
        let hit = unit_cube().intersect_ray(&ray, 1e-9).unwrap();
        assert_approx_eq!(hit.t_near, 2.0);
        assert_eq!(hit.near_faces, FaceMask::X1);
        assert_eq!(hit.far_faces, FaceMask::X0);
    }

    #[test]
    fn slab_test_miss_and_behind() {
        let miss = Ray::new(Point3::new(-1.0, 2.0, 0.5), Vector3::x());
        assert!(unit_cube().intersect_ray(&miss, 1e-9).is_none());
        let behind = Ray::new(Point3::new(2.0, 0.5, 0.5), Vector3::x());
        assert!(unit_cube().intersect_ray(&behind, 1e-9).is_none());
    }

    #[test]
    fn slab_test_through_edge_reports_both_faces() {
        let ray = Ray::new(Point3::new(-1.0, -1.0, 0.5), Vector3::new(1.0, 1.0, 0.0));
        let hit = unit_cube().intersect_ray(&ray, 1e-9).unwrap();
        assert_eq!(hit.near_faces, FaceMask::X0 | FaceMask::Y0);
        assert_eq!(hit.far_faces, FaceMask::X1 | FaceMask::Y1);
    }

    #[test]
    fn face_mask_for_axis() {
        assert_eq!(FaceMask::for_axis(Axis::X, false), FaceMask::X0);
        assert_eq!(FaceMask::for_axis(Axis::Y, true), FaceMask::Y1);
        assert_eq!(FaceMask::for_axis(Axis::Z, true), FaceMask::Z1);
    }
}

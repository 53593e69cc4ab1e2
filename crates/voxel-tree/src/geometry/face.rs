//! Triangular faces attached to voxel tree nodes.

use nalgebra::{Point3, Vector3};

use super::Range3;

/// Mesh triangle `(a, b, c)` with an optional RGBA color and shading normal.
///
/// Counter-clockwise winding seen from outside gives an outward geometric
/// normal `(b - a) × (c - a)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    vertices: [Point3<f64>; 3],
    color: Option<[f64; 4]>,
    normal: Option<Vector3<f64>>,
}

impl Face {
    /// Creates a new face from three points.
    pub fn new(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Self {
        Self {
            vertices: [a, b, c],
            color: None,
            normal: None,
        }
    }

    /// Sets the RGBA color of the face.
    pub fn with_color(mut self, color: [f64; 4]) -> Self {
        self.color = Some(color);
        self
    }

    /// Sets an explicit shading normal, overriding the geometric normal.
    pub fn with_normal(mut self, normal: Vector3<f64>) -> Self {
        self.normal = Some(normal);
        self
    }

    /// Returns a copy of the face with every vertex mapped through `f`.
    /// Color and explicit normal are kept.
    pub fn map_vertices(&self, f: impl Fn(&Point3<f64>) -> Point3<f64>) -> Self {
        Self {
            vertices: [f(&self.vertices[0]), f(&self.vertices[1]), f(&self.vertices[2])],
            ..self.clone()
        }
    }

    /// Returns the three vertices of the face.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f64>; 3] {
        &self.vertices
    }

    /// Returns the explicit face color, if any.
    #[inline]
    pub fn color(&self) -> Option<[f64; 4]> {
        self.color
    }

    /// Returns the explicit shading normal, if any.
    #[inline]
    pub fn explicit_normal(&self) -> Option<Vector3<f64>> {
        self.normal
    }

    /// Computes the (unnormalized) geometric normal of the face.
    pub fn normal(&self) -> Vector3<f64> {
        let [a, b, c] = &self.vertices;
        (b - a).cross(&(c - a))
    }

    /// Computes the unit geometric normal.
    ///
    /// Returns `None` if the face is degenerate (zero area).
    pub fn unit_normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal();
        let len = n.norm();
        if len > f64::EPSILON {
            Some(n / len)
        } else {
            None
        }
    }

    /// Returns the shading normal: the explicit normal if set, otherwise the
    /// unit geometric normal (zero for degenerate faces).
    pub fn shading_normal(&self) -> Vector3<f64> {
        self.normal
            .or_else(|| self.unit_normal())
            .unwrap_or_else(Vector3::zeros)
    }

    /// Computes the area of the face.
    pub fn area(&self) -> f64 {
        0.5 * self.normal().norm()
    }

    /// Computes the centroid of the face.
    pub fn centroid(&self) -> Point3<f64> {
        let [a, b, c] = &self.vertices;
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// Returns the axis-aligned bounds of the face.
    pub fn bounds(&self) -> Range3 {
        let [a, b, c] = &self.vertices;
        let mut r = Range3::new(*a, *b);
        r.extend_point(c);
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn make_face(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> Face {
        Face::new(
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
        )
    }

    #[test]
    fn normal_follows_winding() {
        let face = make_face([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let n = face.unit_normal().unwrap();
        assert_approx_eq!(n.z, 1.0);
        assert_approx_eq!(face.area(), 0.5);
    }

    #[test]
    fn degenerate_face_has_no_unit_normal() {
        let face = make_face([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]);
        assert!(face.unit_normal().is_none());
        assert_eq!(face.shading_normal(), Vector3::zeros());
    }

    #[test]
    fn explicit_normal_overrides_geometry() {
        let face = make_face([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])
            .with_normal(Vector3::x());
        assert_eq!(face.shading_normal(), Vector3::x());
    }

    #[test]
    fn bounds_and_centroid() {
        let face = make_face([0.0, 3.0, 0.0], [3.0, 0.0, 0.0], [0.0, 0.0, 3.0]);
        let b = face.bounds();
        assert_eq!(b.min(), Point3::origin());
        assert_eq!(b.max(), Point3::new(3.0, 3.0, 3.0));
        assert_eq!(face.centroid(), Point3::new(1.0, 1.0, 1.0));
    }
}

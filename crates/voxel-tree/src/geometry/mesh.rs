//! Meshes as plain face collections.

use nalgebra::Point3;

use super::{Face, Range3};
use crate::{Result, VoxelError};

/// A collection of triangular faces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    faces: Vec<Face>,
}

impl Mesh {
    pub fn new(faces: Vec<Face>) -> Self {
        Self { faces }
    }

    /// Builds the closed, outward-facing triangulated surface of the box
    /// `[min, max]` (12 faces).
    pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Self {
        let p = |x: bool, y: bool, z: bool| {
            Point3::new(
                if x { max.x } else { min.x },
                if y { max.y } else { min.y },
                if z { max.z } else { min.z },
            )
        };
        // Each quad is listed counter-clockwise as seen from outside.
        let quads = [
            [p(false, false, false), p(false, false, true), p(false, true, true), p(false, true, false)],
            [p(true, false, false), p(true, true, false), p(true, true, true), p(true, false, true)],
            [p(false, false, false), p(true, false, false), p(true, false, true), p(false, false, true)],
            [p(false, true, false), p(false, true, true), p(true, true, true), p(true, true, false)],
            [p(false, false, false), p(false, true, false), p(true, true, false), p(true, false, false)],
            [p(false, false, true), p(true, false, true), p(true, true, true), p(false, true, true)],
        ];
        let mut faces = Vec::with_capacity(12);
        for [a, b, c, d] in quads {
            faces.push(Face::new(a, b, c));
            faces.push(Face::new(a, c, d));
        }
        Self { faces }
    }

    /// Parses the vertex and face records of a Wavefront OBJ document.
    ///
    /// Only `v` and `f` records are read; polygons are fanned into
    /// triangles. Face indices may be negative (relative) and may carry
    /// `/vt/vn` suffixes, which are ignored.
    pub fn from_obj_str(source: &str) -> Result<Self> {
        let mut vertices: Vec<Point3<f64>> = Vec::new();
        let mut faces = Vec::new();
        for (line_index, line) in source.lines().enumerate() {
            let line_no = line_index + 1;
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("v") => {
                    let mut coords = [0.0; 3];
                    for c in &mut coords {
                        let token = parts.next().ok_or_else(|| obj_error(line_no, "missing vertex coordinate"))?;
                        *c = token
                            .parse()
                            .map_err(|_| obj_error(line_no, format!("invalid coordinate '{token}'")))?;
                    }
                    vertices.push(Point3::new(coords[0], coords[1], coords[2]));
                }
                Some("f") => {
                    let indices = parts
                        .map(|token| resolve_obj_index(token, vertices.len(), line_no))
                        .collect::<Result<Vec<_>>>()?;
                    if indices.len() < 3 {
                        return Err(obj_error(line_no, "face needs at least three vertices"));
                    }
                    for k in 1..indices.len() - 1 {
                        faces.push(Face::new(
                            vertices[indices[0]],
                            vertices[indices[k]],
                            vertices[indices[k + 1]],
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(Self { faces })
    }

    #[inline]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn push(&mut self, face: Face) {
        self.faces.push(face);
    }

    /// Returns the bounds of all vertices, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Range3> {
        Range3::from_points(self.faces.iter().flat_map(|f| f.vertices().iter()))
    }

    /// Uniformly scales and translates the mesh so that its bounds are
    /// centered in `target` and fill it along the longest axis.
    ///
    /// Returns `None` for an empty mesh or one without extent.
    pub fn fitted(&self, target: &Range3) -> Option<Mesh> {
        let bounds = self.bounds()?;
        let extent = bounds.size().max();
        if extent <= 0.0 {
            return None;
        }
        let factor = target.size().min() / extent;
        let (from, to) = (bounds.center(), target.center());
        let faces = self
            .faces
            .iter()
            .map(|f| f.map_vertices(|v| to + (v - from) * factor))
            .collect();
        Some(Mesh { faces })
    }
}

fn obj_error(line: usize, reason: impl Into<String>) -> VoxelError {
    VoxelError::MeshFormat {
        line,
        reason: reason.into(),
    }
}

fn resolve_obj_index(token: &str, num_vertices: usize, line: usize) -> Result<usize> {
    let head = token.split('/').next().unwrap_or(token);
    let raw: i64 = head
        .parse()
        .map_err(|_| obj_error(line, format!("invalid face index '{token}'")))?;
    let resolved = if raw < 0 {
        num_vertices as i64 + raw
    } else {
        raw - 1
    };
    if resolved < 0 || resolved as usize >= num_vertices {
        return Err(obj_error(line, format!("face index {raw} out of range")));
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn cuboid_is_closed_and_outward() {
        let mesh = Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.len(), 12);
        let total_area: f64 = mesh.faces().iter().map(Face::area).sum();
        assert_approx_eq!(total_area, 2.0 * (1.0 * 2.0 + 2.0 * 3.0 + 1.0 * 3.0));
        let center = Point3::new(0.5, 1.0, 1.5);
        for face in mesh.faces() {
            let n = face.unit_normal().unwrap();
            assert!(
                n.dot(&(face.centroid() - center)) > 0.0,
                "face normal should point away from the box center"
            );
        }
    }

    #[test]
    fn obj_quad_is_fanned() {
        let src = "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = Mesh::from_obj_str(src).unwrap();
        assert_eq!(mesh.len(), 2);
        assert_eq!(mesh.faces()[1].vertices()[2], Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn obj_relative_and_slashed_indices() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3/1/1 -2/2/2 -1/3/3\n";
        let mesh = Mesh::from_obj_str(src).unwrap();
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh.faces()[0].vertices()[1], Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn obj_bad_index_reports_line() {
        let src = "v 0 0 0\nf 1 2 3\n";
        match Mesh::from_obj_str(src) {
            Err(VoxelError::MeshFormat { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected mesh format error, got {other:?}"),
        }
    }

    #[test]
    fn fitted_mesh_is_centered_in_the_target() {
        let mesh = Mesh::cuboid(Point3::new(-2.0, -1.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let target = Range3::new(Point3::new(0.1, 0.1, 0.1), Point3::new(0.9, 0.9, 0.9));
        let fitted = mesh.fitted(&target).unwrap();
        let b = fitted.bounds().unwrap();
        assert_approx_eq!(b.min().x, 0.1);
        assert_approx_eq!(b.max().x, 0.9);
        assert_approx_eq!(b.center().y, 0.5);
        assert_approx_eq!(b.size().y, 0.4);
        assert!(Mesh::default().fitted(&target).is_none());
    }

    #[test]
    fn empty_mesh_has_no_bounds() {
        assert!(Mesh::default().bounds().is_none());
    }
}

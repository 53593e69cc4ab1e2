//! Minimal geometry kernel consumed by the voxel tree.
//!
//! The tree only needs a handful of primitives from a geometry library:
//! axis-aligned ranges with a slab test, planes, capped cylinders, rays,
//! triangular faces and meshes as face collections. All values are `f64`
//! so that voxel data round-trips bit-exactly through the codec.

mod cylinder;
mod face;
mod mesh;
mod plane;
mod range;
mod ray;

pub use cylinder::Cylinder;
pub use face::Face;
pub use mesh::Mesh;
pub use plane::Plane;
pub use range::{FaceMask, Range3, RangeHit};
pub use ray::Ray;

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All three axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Returns the component index of this axis (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Returns the axis for a component index.
    pub fn from_index(index: usize) -> Option<Axis> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }

    /// Returns the two remaining axes, in cyclic order.
    ///
    /// These span the plane orthogonal to `self`.
    #[inline]
    pub fn others(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::Z, Axis::X),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }

    /// Returns the unit vector along this axis.
    pub fn unit(self) -> nalgebra::Vector3<f64> {
        let mut v = nalgebra::Vector3::zeros();
        v[self.index()] = 1.0;
        v
    }
}

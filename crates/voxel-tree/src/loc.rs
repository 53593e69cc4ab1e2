//! Location codes, regions and node identifiers.
//!
//! A location code is a fixed-width unsigned integer per axis. Bit
//! `L - d - 1` (with `L` the number of tree levels) selects the child at
//! depth `d`, so the code of a point at maximum resolution also encodes the
//! path from the root to the leaf containing it.

use std::fmt;

use crate::context::Context;
use crate::geometry::Axis;

/// Per-axis location code. Only the low `max_num_levels` bits are significant.
pub type NodeLoc = u16;

/// A location code triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeLoc3 {
    pub x: NodeLoc,
    pub y: NodeLoc,
    pub z: NodeLoc,
}

impl NodeLoc3 {
    #[inline]
    pub const fn new(x: NodeLoc, y: NodeLoc, z: NodeLoc) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn splat(v: NodeLoc) -> Self {
        Self { x: v, y: v, z: v }
    }

    /// Returns the code along `axis`.
    #[inline]
    pub fn get(&self, axis: Axis) -> NodeLoc {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Sets the code along `axis`.
    #[inline]
    pub fn set(&mut self, axis: Axis, value: NodeLoc) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }

    /// Applies `f` to every axis.
    #[inline]
    pub fn map(self, mut f: impl FnMut(NodeLoc) -> NodeLoc) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z))
    }

    /// Masks every axis with `mask`.
    #[inline]
    pub fn masked(self, mask: NodeLoc) -> Self {
        self.map(|v| v & mask)
    }
}

impl fmt::Display for NodeLoc3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A closed min/max range in location code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region3 {
    pub l0: NodeLoc3,
    pub l1: NodeLoc3,
}

impl Region3 {
    pub fn new(l0: NodeLoc3, l1: NodeLoc3) -> Self {
        Self { l0, l1 }
    }

    /// Returns `true` if `loc` lies within the region, bounds included.
    pub fn contains(&self, loc: &NodeLoc3) -> bool {
        Axis::ALL.iter().all(|&a| {
            let v = loc.get(a);
            v >= self.l0.get(a) && v <= self.l1.get(a)
        })
    }

    /// Clamps `loc` into the region, per axis.
    pub fn clamp(&self, loc: &NodeLoc3) -> NodeLoc3 {
        let mut out = *loc;
        for a in Axis::ALL {
            out.set(a, loc.get(a).clamp(self.l0.get(a), self.l1.get(a)));
        }
        out
    }
}

/// A location interpreted at a given depth.
///
/// Identifies one voxel of the tree. The location is the minimum corner of
/// the voxel, i.e. all bits below the depth's position are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeId {
    pub depth: u8,
    pub loc: NodeLoc3,
}

impl NodeId {
    /// The root of every tree.
    pub const ROOT: NodeId = NodeId {
        depth: 0,
        loc: NodeLoc3::splat(0),
    };

    pub fn new(depth: u8, loc: NodeLoc3) -> Self {
        Self { depth, loc }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        usize::from(self.depth)
    }

    /// Returns the child voxel with the given order index.
    #[inline]
    pub fn child(&self, order_index: usize, context: &Context) -> Option<NodeId> {
        context.child_id(self, order_index)
    }

    /// Returns the parent voxel, or `None` for the root.
    #[inline]
    pub fn parent(&self, context: &Context) -> Option<NodeId> {
        context.parent_id(self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[depth {}] {}", self.depth, self.loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_contains_is_inclusive() {
        let r = Region3::new(NodeLoc3::new(2, 2, 2), NodeLoc3::new(5, 6, 7));
        assert!(r.contains(&NodeLoc3::new(2, 2, 2)));
        assert!(r.contains(&NodeLoc3::new(5, 6, 7)));
        assert!(!r.contains(&NodeLoc3::new(5, 6, 8)));
        assert!(!r.contains(&NodeLoc3::new(1, 3, 3)));
    }

    #[test]
    fn region_clamp() {
        let r = Region3::new(NodeLoc3::new(2, 2, 2), NodeLoc3::new(5, 6, 7));
        assert_eq!(r.clamp(&NodeLoc3::new(0, 4, 9)), NodeLoc3::new(2, 4, 7));
    }

    #[test]
    fn masked_and_axis_access() {
        let mut loc = NodeLoc3::new(0b1011, 0b0110, 0b1111);
        assert_eq!(loc.masked(0b1100), NodeLoc3::new(0b1000, 0b0100, 0b1100));
        loc.set(Axis::Y, 9);
        assert_eq!(loc.get(Axis::Y), 9);
    }

    #[test]
    fn node_ids_order_by_depth_first() {
        let shallow = NodeId::new(1, NodeLoc3::splat(100));
        let deep = NodeId::new(2, NodeLoc3::splat(0));
        assert!(shallow < deep);
    }
}

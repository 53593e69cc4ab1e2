//! Tree-wide configuration and location code arithmetic.
//!
//! A [`Context`] fixes the number of levels, the branching order, the world
//! space scale and the comparison tolerance of one voxel tree. It owns the
//! per-depth bit masks and voxel size tables derived from them, and every
//! mapping between world coordinates and location codes goes through it.

use log::debug;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Axis, Range3};
use crate::loc::{NodeId, NodeLoc, NodeLoc3, Region3};
use crate::{Result, VoxelError};

/// √3, the length of the unit cube diagonal.
pub const SQRT_3: f64 = 1.732_050_807_568_877_2;

const INV_SQRT_3: f64 = 0.577_350_269_189_625_8;

/// Unit vectors from a voxel center towards its eight corners.
///
/// Entry `4i + 2j + k` points towards `((-1+2k), (-1+2j), (-1+2i)) / √3`.
pub const VOXEL_DIAGONALS: [[f64; 3]; 8] = [
    [-INV_SQRT_3, -INV_SQRT_3, -INV_SQRT_3],
    [INV_SQRT_3, -INV_SQRT_3, -INV_SQRT_3],
    [-INV_SQRT_3, INV_SQRT_3, -INV_SQRT_3],
    [INV_SQRT_3, INV_SQRT_3, -INV_SQRT_3],
    [-INV_SQRT_3, -INV_SQRT_3, INV_SQRT_3],
    [INV_SQRT_3, -INV_SQRT_3, INV_SQRT_3],
    [-INV_SQRT_3, INV_SQRT_3, INV_SQRT_3],
    [INV_SQRT_3, INV_SQRT_3, INV_SQRT_3],
];

/// Outward unit normals of the six voxel faces.
///
/// Entry `2i` is `-e_i`, entry `2i + 1` is `+e_i`.
pub const VOXEL_NORMALS: [[f64; 3]; 6] = [
    [-1.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, -1.0],
    [0.0, 0.0, 1.0],
];

/// Returns the voxel corner diagonal pointing into the same octant as `v`.
pub fn matching_voxel_diagonal(v: &Vector3<f64>) -> Vector3<f64> {
    let bit = |c: f64| usize::from(c >= 0.0);
    let d = VOXEL_DIAGONALS[4 * bit(v.z) + 2 * bit(v.y) + bit(v.x)];
    Vector3::new(d[0], d[1], d[2])
}

/// Returns the voxel face normal with the largest positive cosine to `v`.
pub fn matching_voxel_normal(v: &Vector3<f64>) -> Vector3<f64> {
    let mut best = Vector3::x();
    let mut best_cos = f64::NEG_INFINITY;
    for n in VOXEL_NORMALS {
        let n = Vector3::new(n[0], n[1], n[2]);
        let c = n.dot(v);
        if c > best_cos {
            best_cos = c;
            best = n;
        }
    }
    best
}

/// Serializable parameters of a [`Context`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_num_levels: usize,
    pub order: usize,
    pub scale: f64,
    pub tolerance: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_num_levels: Context::DEFAULT_MAX_NUM_LEVELS,
            order: Context::DEFAULT_ORDER,
            scale: 1.0,
            tolerance: Context::DEFAULT_TOLERANCE,
        }
    }
}

/// Per-tree configuration with precomputed depth tables.
///
/// Only binary subdivision (`order == 2`) is supported: the location code
/// layout extracts one bit per axis per level.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    max_num_levels: usize,
    order: usize,
    scale: f64,
    tolerance: f64,
    depth_mask: [NodeLoc; Context::MAX_NUM_LEVELS],
    loc_mask: [NodeLoc; Context::MAX_NUM_LEVELS],
    voxel_size: [f64; Context::MAX_NUM_LEVELS],
    valid_bits: NodeLoc,
}

impl Default for Context {
    fn default() -> Self {
        Self::build(Self::DEFAULT_MAX_NUM_LEVELS, Self::DEFAULT_ORDER, 1.0, Self::DEFAULT_TOLERANCE)
    }
}

impl Context {
    /// Hard cap on the number of levels (the width of [`NodeLoc`]).
    pub const MAX_NUM_LEVELS: usize = 16;
    pub const DEFAULT_MAX_NUM_LEVELS: usize = 10;
    pub const DEFAULT_ORDER: usize = 2;
    pub const DEFAULT_TOLERANCE: f64 = 1e-6;
    /// Default margin, as a fraction of the scale, kept between fitted
    /// geometry and the root voxel boundary.
    pub const DEFAULT_BOX_INSET: f64 = 0.05;

    /// Creates a context.
    ///
    /// Fails with [`VoxelError::Configuration`] if `max_num_levels` is zero
    /// or exceeds [`Context::MAX_NUM_LEVELS`], if `order` is not 2, or if
    /// `scale` is not a positive finite number.
    pub fn new(max_num_levels: usize, order: usize, scale: f64, tolerance: f64) -> Result<Self> {
        if max_num_levels == 0 || max_num_levels > Self::MAX_NUM_LEVELS {
            return Err(VoxelError::Configuration(format!(
                "max_num_levels must be in 1..={} (got {max_num_levels})",
                Self::MAX_NUM_LEVELS
            )));
        }
        if order != 2 {
            return Err(VoxelError::Configuration(format!(
                "only order 2 is supported (got {order})"
            )));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(VoxelError::Configuration(format!(
                "scale must be positive and finite (got {scale})"
            )));
        }
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(VoxelError::Configuration(format!(
                "tolerance must be non-negative (got {tolerance})"
            )));
        }
        let context = Self::build(max_num_levels, order, scale, tolerance);
        debug!(
            "created context: {max_num_levels} levels, order {order}, scale {scale}, leaf size {}",
            context.min_leaf_size()
        );
        Ok(context)
    }

    /// Creates a context from its serializable parameters.
    pub fn from_config(config: &ContextConfig) -> Result<Self> {
        Self::new(config.max_num_levels, config.order, config.scale, config.tolerance)
    }

    /// Returns the serializable parameters of this context.
    pub fn config(&self) -> ContextConfig {
        ContextConfig {
            max_num_levels: self.max_num_levels,
            order: self.order,
            scale: self.scale,
            tolerance: self.tolerance,
        }
    }

    fn build(max_num_levels: usize, order: usize, scale: f64, tolerance: f64) -> Self {
        let mut depth_mask = [0; Self::MAX_NUM_LEVELS];
        let mut loc_mask = [0; Self::MAX_NUM_LEVELS];
        let mut voxel_size = [0.0; Self::MAX_NUM_LEVELS];
        let mut cumulative: NodeLoc = 0;
        let mut size = scale;
        for depth in 0..max_num_levels {
            depth_mask[depth] = 1 << (max_num_levels - depth - 1);
            cumulative |= depth_mask[depth];
            loc_mask[depth] = cumulative;
            voxel_size[depth] = size;
            size /= order as f64;
        }
        Self {
            max_num_levels,
            order,
            scale,
            tolerance,
            depth_mask,
            loc_mask,
            voxel_size,
            valid_bits: cumulative,
        }
    }

    #[inline]
    pub fn max_num_levels(&self) -> usize {
        self.max_num_levels
    }

    /// Returns the deepest valid depth, `max_num_levels - 1`.
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_num_levels - 1
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Bitmask of all significant location code bits.
    #[inline]
    pub fn valid_bits(&self) -> NodeLoc {
        self.valid_bits
    }

    /// Maximum number of children of one node (`order³`).
    #[inline]
    pub fn max_num_child_nodes(&self) -> usize {
        self.order * self.order * self.order
    }

    /// Number of leaf voxels along one axis of the root (`order^(L-1)`).
    #[inline]
    pub fn max_num_leaf_nodes_per_dimension(&self) -> usize {
        1 << (self.max_num_levels - 1)
    }

    /// Largest valid location code along one axis.
    #[inline]
    pub fn max_loc(&self) -> NodeLoc {
        self.depth_mask[0] - 1
    }

    /// Resolves an optional depth to a concrete one; `None` means the
    /// deepest level.
    #[inline]
    pub fn resolve_depth(&self, depth: Option<usize>) -> usize {
        match depth {
            Some(d) if d < self.max_num_levels => d,
            _ => self.max_depth(),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth >= self.max_num_levels {
            return Err(VoxelError::OutOfRange(format!(
                "depth {depth} exceeds tree depth {}",
                self.max_depth()
            )));
        }
        Ok(())
    }

    /// Returns the single bit selecting the child at `depth`
    /// (bit `L - depth - 1`). This is also the edge length, in location
    /// code units, of a voxel at `depth`.
    pub fn depth_mask(&self, depth: usize) -> Result<NodeLoc> {
        self.check_depth(depth)?;
        Ok(self.depth_mask[depth])
    }

    /// Returns the mask of all bits that are significant at `depth`.
    pub fn loc_mask(&self, depth: usize) -> Result<NodeLoc> {
        self.check_depth(depth)?;
        Ok(self.loc_mask[depth])
    }

    // Unchecked table access for depths already known to be valid.
    #[inline]
    pub(crate) fn level_mask(&self, depth: usize) -> NodeLoc {
        self.loc_mask[depth]
    }

    /// Returns the edge length of a voxel at `depth`.
    ///
    /// Depths beyond the deepest level are extrapolated by further
    /// division by the order.
    pub fn voxel_size(&self, depth: usize) -> f64 {
        if depth < self.max_num_levels {
            return self.voxel_size[depth];
        }
        let mut s = self.voxel_size[self.max_depth()];
        for _ in self.max_depth()..depth {
            s /= self.order as f64;
        }
        s
    }

    /// Edge length of a leaf voxel at the deepest level.
    #[inline]
    pub fn min_leaf_size(&self) -> f64 {
        self.voxel_size[self.max_depth()]
    }

    /// Maps a world coordinate to a location code.
    ///
    /// Coordinates outside `[0, scale)` saturate to the nearest valid code.
    pub fn create_loc(&self, x: f64) -> NodeLoc {
        let n = self.max_num_leaf_nodes_per_dimension() as f64;
        let v = (x / self.scale * n).floor();
        if v.is_nan() || v < 0.0 {
            0
        } else if v >= n {
            self.max_loc()
        } else {
            v as NodeLoc
        }
    }

    /// Maps a world coordinate to a location code, failing with
    /// [`VoxelError::OutOfRange`] outside `[0, scale)`.
    pub fn create_loc_checked(&self, x: f64) -> Result<NodeLoc> {
        let x0 = x / self.scale;
        if !(0.0..1.0).contains(&x0) {
            return Err(VoxelError::OutOfRange(format!(
                "coordinate {x} outside of tree bounds [0, {})",
                self.scale
            )));
        }
        Ok(self.create_loc(x))
    }

    /// Maps a world point to a location code triple, saturating per axis.
    pub fn create_loc3(&self, p: &Point3<f64>) -> NodeLoc3 {
        NodeLoc3::new(self.create_loc(p.x), self.create_loc(p.y), self.create_loc(p.z))
    }

    /// Maps a world point to a location code triple, failing with
    /// [`VoxelError::OutOfRange`] outside the root voxel.
    pub fn create_loc3_checked(&self, p: &Point3<f64>) -> Result<NodeLoc3> {
        Ok(NodeLoc3::new(
            self.create_loc_checked(p.x)?,
            self.create_loc_checked(p.y)?,
            self.create_loc_checked(p.z)?,
        ))
    }

    /// Returns `true` if `a` and `b` address the same voxel at `depth`.
    pub fn loc_equal(&self, a: &NodeLoc3, b: &NodeLoc3, depth: usize) -> bool {
        let mask = self.valid_bits & self.loc_mask[depth.min(self.max_depth())];
        a.masked(mask) == b.masked(mask)
    }

    /// Returns `true` if `loc` lies within the voxel `id`.
    #[inline]
    pub fn contains_loc(&self, id: &NodeId, loc: &NodeLoc3) -> bool {
        self.loc_equal(&id.loc, loc, id.depth())
    }

    /// Returns the order index (`x | y << 1 | z << 2`) of the child at
    /// `depth` on the path to `loc`.
    ///
    /// Depth 0 has no order index, since the root is nobody's child.
    pub fn child_order_index(&self, loc: &NodeLoc3, depth: usize) -> Option<usize> {
        if depth == 0 || depth >= self.max_num_levels {
            return None;
        }
        let bit = self.depth_mask[depth];
        let x = usize::from(loc.x & bit != 0);
        let y = usize::from(loc.y & bit != 0);
        let z = usize::from(loc.z & bit != 0);
        Some(x | (y << 1) | (z << 2))
    }

    /// Returns the identifier of the child of `id` with the given order index.
    ///
    /// Returns `None` if `id` is already at the deepest level or the index is
    /// not below `order³`.
    pub fn child_id(&self, id: &NodeId, order_index: usize) -> Option<NodeId> {
        let depth = id.depth();
        if depth + 1 >= self.max_num_levels || order_index >= self.max_num_child_nodes() {
            return None;
        }
        let bit = self.depth_mask[depth + 1];
        let base = id.loc.masked(self.loc_mask[depth]);
        let pick = |set: bool| if set { bit } else { 0 };
        let loc = NodeLoc3::new(
            base.x | pick(order_index & 1 != 0),
            base.y | pick(order_index & 2 != 0),
            base.z | pick(order_index & 4 != 0),
        );
        Some(NodeId::new(id.depth + 1, loc))
    }

    /// Returns the identifier of the parent voxel of `id`, or `None` for the root.
    pub fn parent_id(&self, id: &NodeId) -> Option<NodeId> {
        let depth = id.depth().checked_sub(1)?;
        Some(NodeId::new(depth as u8, id.loc.masked(self.loc_mask[depth])))
    }

    /// Returns the identifier of the voxel at `depth` containing `loc`.
    pub fn node_id(&self, loc: &NodeLoc3, depth: usize) -> Result<NodeId> {
        self.check_depth(depth)?;
        Ok(NodeId::new(depth as u8, loc.masked(self.loc_mask[depth])))
    }

    /// Returns the depth of the deepest voxel containing both `a` and `b`,
    /// clamped to `max_depth` (`None` means the deepest level).
    ///
    /// The highest bit in which the codes differ, on any axis, is the first
    /// level at which their paths split; the common ancestor sits one level
    /// above it. Identical codes share every level.
    pub fn common_ancestor_level(&self, a: &NodeLoc3, b: &NodeLoc3, max_depth: Option<usize>) -> usize {
        let max_depth = self.resolve_depth(max_depth);
        let diff = (a.x ^ b.x) | (a.y ^ b.y) | (a.z ^ b.z);
        let split = (0..self.max_num_levels).find(|&d| diff & self.depth_mask[d] != 0);
        let level = match split {
            Some(d) => d.saturating_sub(1),
            None => self.max_depth(),
        };
        level.min(max_depth)
    }

    /// Returns the depth of the deepest voxel containing the whole region.
    pub fn common_ancestor_level_region(&self, region: &Region3, max_depth: Option<usize>) -> usize {
        self.common_ancestor_level(&region.l0, &region.l1, max_depth)
    }

    /// Converts a location code to a world coordinate.
    #[inline]
    pub fn location(&self, loc: NodeLoc) -> f64 {
        self.min_leaf_size() * f64::from(loc)
    }

    /// Converts a location code triple to a world point.
    pub fn location3(&self, loc: &NodeLoc3) -> Point3<f64> {
        Point3::new(self.location(loc.x), self.location(loc.y), self.location(loc.z))
    }

    /// Returns the minimum corner of the voxel `id` in world space.
    pub fn voxel_location(&self, id: &NodeId) -> Point3<f64> {
        self.location3(&id.loc.masked(self.loc_mask[id.depth().min(self.max_depth())]))
    }

    /// Returns the world space box of the voxel `id`.
    pub fn voxel_range(&self, id: &NodeId) -> Range3 {
        Range3::cube(self.voxel_location(id), self.voxel_size(id.depth()))
    }

    /// Returns the location code region covered by the voxel `id`.
    ///
    /// The voxel spans `[loc, loc + depth_mask(depth))`; the upper boundary
    /// nominally belongs to the neighboring voxel and is included only when
    /// `include_max` is set.
    pub fn voxel_region(&self, id: &NodeId, include_max: bool) -> Result<Region3> {
        let depth = id.depth();
        self.check_depth(depth)?;
        let l0 = id.loc.masked(self.loc_mask[depth]);
        let extent = self.depth_mask[depth] - NodeLoc::from(!include_max);
        let l1 = l0.map(|v| v + extent);
        Ok(Region3::new(l0, l1))
    }

    /// Returns `true` if `loc + offset` is a valid location code.
    pub fn check_loc(&self, loc: NodeLoc, offset: i32) -> bool {
        let v = i64::from(loc) + i64::from(offset);
        v >= 0 && v <= i64::from(self.max_loc())
    }

    /// Returns `true` if every axis of `loc` is a valid location code.
    pub fn check_loc3(&self, loc: &NodeLoc3) -> bool {
        Axis::ALL.iter().all(|&a| self.check_loc(loc.get(a), 0))
    }

    /// Returns `true` if `p` lies inside the root voxel `[0, scale)³`.
    pub fn check_point(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= 0.0 && p[i] < self.scale)
    }

    /// Returns `true` if both corners of `region` are valid location codes.
    pub fn check_region(&self, region: &Region3) -> bool {
        self.check_loc3(&region.l0) && self.check_loc3(&region.l1)
    }

    /// Returns `true` if the voxel `id` strictly contains `range`.
    pub fn check_range(&self, range: &Range3, id: &NodeId) -> bool {
        self.voxel_range(id).contains_range(range)
    }

    /// Returns `true` if `depth` lies in `[min, max]`; unset bounds are open.
    pub fn check_depth_range(&self, depth: usize, min: Option<usize>, max: Option<usize>) -> bool {
        min.is_none_or(|m| depth >= m) && max.is_none_or(|m| depth <= m)
    }

    /// Returns the deepest voxel containing the whole world space `range`.
    ///
    /// Fails with [`VoxelError::OutOfRange`] if the range is not strictly
    /// inside the root voxel.
    pub fn containing_node(&self, range: &Range3) -> Result<NodeId> {
        if !self.check_range(range, &NodeId::ROOT) {
            return Err(VoxelError::OutOfRange(format!(
                "range [{:?}, {:?}] is not inside the root voxel",
                range.min(),
                range.max()
            )));
        }
        let l0 = self.create_loc3(&range.min());
        let l1 = self.create_loc3(&range.max());
        let depth = self.common_ancestor_level(&l0, &l1, None);
        self.node_id(&l0, depth)
    }
}

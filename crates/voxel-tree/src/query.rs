//! Ray queries against a voxel tree.
//!
//! [`intersect_ray`] walks the voxels stabbed by a ray in front-to-back
//! order and hands each one to a [`NodeProcessor`]. [`cast_ray_grid`] and
//! [`cast_ray_grid_axis`] cast regular grids of parallel rays, and
//! [`classify_iob`] uses them to classify the voxels of a voxelized surface
//! as inside, outside or boundary.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, trace};
use nalgebra::{Point3, Vector3};

use crate::geometry::{Axis, FaceMask, Ray};
use crate::processor::{IntersectionProcessor, IobEvalProcessor, NodeFilter, NodeProcessor};
use crate::tree::{LeafStatus, NodeDataType, NodeHandle, VoxelClass, VoxelTree};
use crate::{Result, VoxelError};

/// Offset of ray grid origins in front of the node face, in target voxels.
pub const DEFAULT_RAY_PLANE_OFFSET: f64 = 0.5;

/// Intersection of a ray with the voxel of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeIntersection {
    pub node: NodeHandle,
    pub depth: usize,
    pub t_near: f64,
    pub t_far: f64,
    /// Faces through which the ray enters the voxel.
    pub near_face: FaceMask,
    /// Faces through which the ray leaves the voxel.
    pub far_face: FaceMask,
}

/// Traversal options shared by the ray query functions.
#[derive(Debug, Clone, Copy)]
pub struct RayOptions<'a> {
    /// Nodes failing the filter are not handed to the processor. The
    /// filter's maximum depth also bounds the descent.
    pub filter: Option<&'a NodeFilter>,
    pub recursive: bool,
    /// Create missing children of data-less nodes before descending.
    pub fill: bool,
    /// Remove empty leaves of visited nodes afterwards.
    pub prune_empty: bool,
    /// Slab tolerance of the voxel tests. Defaults to the tree's tolerance.
    pub tolerance: Option<f64>,
}

impl Default for RayOptions<'_> {
    fn default() -> Self {
        Self {
            filter: None,
            recursive: true,
            fill: false,
            prune_empty: false,
            tolerance: None,
        }
    }
}

impl<'a> RayOptions<'a> {
    pub fn with_filter(mut self, filter: &'a NodeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_prune_empty(mut self, prune_empty: bool) -> Self {
        self.prune_empty = prune_empty;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    fn max_depth(&self) -> Option<usize> {
        self.filter.and_then(|f| f.max_depth)
    }
}

fn node_intersection(tree: &VoxelTree, h: NodeHandle, ray: &Ray, tolerance: f64) -> Option<NodeIntersection> {
    let node = tree.node(h)?;
    let range = tree.context().voxel_range(&node.id());
    let hit = range.intersect_ray(ray, tolerance)?;
    Some(NodeIntersection {
        node: h,
        depth: node.depth(),
        t_near: hit.t_near,
        t_far: hit.t_far,
        near_face: hit.near_faces,
        far_face: hit.far_faces,
    })
}

/// A node waiting to be handed to the processor, ordered front to back.
struct Pending {
    hit: NodeIntersection,
    seq: usize,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Reversed so that the max-heap pops the smallest `t_near` first;
    // shallower nodes and earlier insertions win ties.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .hit
            .t_near
            .total_cmp(&self.hit.t_near)
            .then(other.hit.depth.cmp(&self.hit.depth))
            .then(other.seq.cmp(&self.seq))
    }
}

/// Intersects `ray` with the subtree of `h`.
///
/// Every stabbed node passing the filter is handed to `processor` in
/// non-decreasing `t_near` order. A node always comes before its children;
/// among equal `t_near`, shallower nodes come first, then siblings by child
/// order index. A processor result containing
/// [`FINISHED`](crate::processor::ProcessingResult::FINISHED) ends the whole
/// query.
///
/// Returns the number of processor calls.
pub fn intersect_ray<P: NodeProcessor + ?Sized>(
    tree: &mut VoxelTree,
    h: NodeHandle,
    ray: &Ray,
    processor: &mut P,
    options: &RayOptions<'_>,
) -> Result<usize> {
    let max_depth = tree.context().resolve_depth(options.max_depth());
    let tolerance = options.tolerance.unwrap_or_else(|| tree.context().tolerance());
    let mut queue = BinaryHeap::new();
    let mut seq = 0;
    if let Some(hit) = node_intersection(tree, h, ray, tolerance) {
        queue.push(Pending { hit, seq });
    }
    let mut visited = Vec::new();
    let mut count = 0;
    while let Some(Pending { hit, .. }) = queue.pop() {
        if hit.depth > max_depth {
            continue;
        }
        let cur = hit.node;
        if options.filter.is_none_or(|f| f.accepts(tree, cur)) {
            trace!("ray hit node at depth {} t = [{}, {}]", hit.depth, hit.t_near, hit.t_far);
            let r = processor.process(tree, cur, Some(&hit))?;
            count += 1;
            if r.is_finished() {
                break;
            }
        }
        visited.push(cur);
        if !options.recursive || hit.depth >= max_depth {
            continue;
        }
        let Some(node) = tree.node(cur) else {
            continue;
        };
        if options.fill && node.data().is_none() {
            tree.create_children(cur)?;
        }
        let t: &VoxelTree = tree;
        let Some(node) = t.node(cur) else {
            continue;
        };
        for (_, c) in node.children() {
            if let Some(child_hit) = node_intersection(t, c, ray, tolerance) {
                seq += 1;
                queue.push(Pending { hit: child_hit, seq });
            }
        }
    }
    if options.prune_empty {
        for &v in visited.iter().rev() {
            tree.prune_empty(v, false);
        }
    }
    Ok(count)
}

/// A regular grid of parallel rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayGrid {
    /// Origin of the first ray.
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
    pub step_x: Vector3<f64>,
    pub step_y: Vector3<f64>,
    pub num_x: usize,
    pub num_y: usize,
}

impl RayGrid {
    /// Iterates over the rays of the grid, row by row.
    pub fn rays(&self) -> impl Iterator<Item = Ray> + '_ {
        (0..self.num_y).flat_map(move |j| {
            (0..self.num_x).map(move |i| {
                let origin = self.origin + self.step_x * i as f64 + self.step_y * j as f64;
                Ray::new(origin, self.direction)
            })
        })
    }
}

/// Casts every ray of `grid` into the subtree of `h`.
///
/// The processor's `begin` and `finish` bracket each ray. Returns the total
/// number of processor calls.
pub fn cast_ray_grid<P: NodeProcessor + ?Sized>(
    tree: &mut VoxelTree,
    h: NodeHandle,
    grid: &RayGrid,
    processor: &mut P,
    options: &RayOptions<'_>,
) -> Result<usize> {
    let mut count = 0;
    for ray in grid.rays() {
        processor.begin();
        count += intersect_ray(tree, h, &ray, processor, options)?;
        processor.finish(tree)?;
    }
    Ok(count)
}

/// Builds the axis-aligned ray grid through the voxel of `h` with one ray
/// per voxel column at `target_depth`.
///
/// Rays start `plane_offset` target voxels in front of the node's lower
/// face along `axis` and pass through the column centers.
pub fn axis_ray_grid(
    tree: &VoxelTree,
    h: NodeHandle,
    axis: Axis,
    target_depth: usize,
    plane_offset: f64,
) -> Result<RayGrid> {
    let ctx = tree.context();
    let node = tree.get(h)?;
    if target_depth < node.depth() || target_depth > ctx.max_depth() {
        return Err(VoxelError::OutOfRange(format!(
            "target depth {target_depth} not in [{}, {}]",
            node.depth(),
            ctx.max_depth()
        )));
    }
    let size = ctx.voxel_size(target_depth);
    let n = 1usize << (target_depth - node.depth());
    let direction = axis.unit();
    let (a1, a2) = axis.others();
    let step_x = a1.unit() * size;
    let step_y = a2.unit() * size;
    let origin = ctx.voxel_location(&node.id()) - direction * (plane_offset * size) + step_x * 0.5 + step_y * 0.5;
    Ok(RayGrid {
        origin,
        direction,
        step_x,
        step_y,
        num_x: n,
        num_y: n,
    })
}

/// Casts the axis-aligned ray grid of [`axis_ray_grid`] into the subtree
/// of `h`.
pub fn cast_ray_grid_axis<P: NodeProcessor + ?Sized>(
    tree: &mut VoxelTree,
    h: NodeHandle,
    axis: Axis,
    target_depth: usize,
    plane_offset: f64,
    processor: &mut P,
    options: &RayOptions<'_>,
) -> Result<usize> {
    let grid = axis_ray_grid(tree, h, axis, target_depth, plane_offset)?;
    cast_ray_grid(tree, h, &grid, processor, options)
}

/// Number of voxels per class after [`classify_iob`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IobCounts {
    pub inside: usize,
    pub outside: usize,
    pub boundary: usize,
}

/// Classifies the voxels at `target_depth` as inside, outside or boundary.
///
/// The tree is expected to hold the voxelized surface as `FILLED` voxels at
/// `target_depth` (see [`voxelize_mesh`](crate::voxelize::voxelize_mesh)).
/// Missing voxels at `target_depth` are created, ray grids along all three
/// axes collect inside/outside votes, and `evaluator` turns the votes into
/// classes.
pub fn classify_iob(tree: &mut VoxelTree, target_depth: usize, evaluator: &IobEvalProcessor) -> Result<IobCounts> {
    let root = tree.root();
    let created = tree.fill(root, false, true, Some(target_depth))?;
    debug!("classify: created {created} voxels at depth {target_depth}");
    let filter = NodeFilter::new().with_depth(target_depth);
    let options = RayOptions::default().with_filter(&filter);
    for axis in Axis::ALL {
        let mut votes = IntersectionProcessor::new(axis);
        let calls = cast_ray_grid_axis(
            tree,
            root,
            axis,
            target_depth,
            DEFAULT_RAY_PLANE_OFFSET,
            &mut votes,
            &options,
        )?;
        trace!("classify: {calls} intersections along {axis:?}");
    }

    let mut evaluator = *evaluator;
    let iob_filter = NodeFilter::new()
        .with_data_type(NodeDataType::VoxelIob)
        .with_leaf_status(LeafStatus::Leaf);
    tree.process(root, Some(&mut evaluator), Some(&iob_filter), None, true)?;

    let mut counts = IobCounts::default();
    let mut leaves = Vec::new();
    tree.find(root, Some(&iob_filter), true, &mut leaves);
    for h in leaves {
        let class = tree.voxel_class(h);
        if class.contains(VoxelClass::BOUNDARY) {
            counts.boundary += 1;
        } else if class.contains(VoxelClass::INSIDE) {
            counts.inside += 1;
        } else if class.contains(VoxelClass::OUTSIDE) {
            counts.outside += 1;
        }
    }
    debug!(
        "classify: {} inside, {} outside, {} boundary",
        counts.inside, counts.outside, counts.boundary
    );
    Ok(counts)
}

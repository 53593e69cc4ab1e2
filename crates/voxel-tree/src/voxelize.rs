//! Conservative triangle voxelization.
//!
//! Faces are first attached to the smallest node that contains their
//! expanded bounding box ([`voxelize_insert_face`]). [`voxelize_faces`] then
//! pushes every face down the hierarchy, handing it to each child whose
//! center passes [`voxelize_point_test`] at the child's depth, and finally
//! lets a processor write the payload of the nodes reached at the target
//! depth.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use voxel_tree::geometry::Mesh;
//! use voxel_tree::voxelize::{voxelize_mesh, Separability};
//! use voxel_tree::{Context, VoxelTree, VoxelizationTarget};
//!
//! let mut tree = VoxelTree::new(Arc::new(Context::new(7, 2, 1.0, 1e-6)?));
//! let cube = Mesh::cuboid([0.25; 3].into(), [0.75; 3].into());
//! let voxels = voxelize_mesh(&mut tree, &cube, Separability::TwentySix, None, VoxelizationTarget::Class)?;
//! ```

use log::{debug, trace};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::context::{matching_voxel_diagonal, matching_voxel_normal, Context, SQRT_3};
use crate::geometry::{Cylinder, Face, Mesh, Plane, Range3};
use crate::loc::NodeId;
use crate::processor::{NodeProcessor, VoxelizationProcessor, VoxelizationTarget};
use crate::tree::{NodeData, NodeHandle, VoxelTree, NUM_CHILD_SLOTS};
use crate::{Result, VoxelError};

/// Connectivity the voxelized surface is guaranteed to block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Separability {
    /// Thin surface: no 6-connected path crosses it.
    Six,
    /// Thick surface: no 26-connected path crosses it.
    #[default]
    TwentySix,
}

/// Test volumes of one triangle at one voxel size.
///
/// A point passes the test if it lies inside the band between
/// [`upper`](Self::upper) and [`lower`](Self::lower) and behind all three
/// edge planes, or inside one of the edge cylinders.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleVoxelizationData {
    face: Face,
    depth: usize,
    band_half_thickness: f64,
    edge_radius: f64,
    upper: Plane,
    lower: Plane,
    edge_planes: [Plane; 3],
    edge_cylinders: [Cylinder; 3],
    node: NodeId,
}

impl TriangleVoxelizationData {
    /// Computes the test volumes of `face` for voxels at `depth` (`None`
    /// meaning the deepest level).
    ///
    /// Fails with [`VoxelError::Voxelization`] for degenerate faces. If the
    /// face, grown by the edge radius, does not fit inside the root voxel,
    /// fails with [`VoxelError::OutOfRange`] when `check_bounds` is set and
    /// falls back to the root otherwise.
    pub fn new(
        face: &Face,
        sep: Separability,
        depth: Option<usize>,
        context: &Context,
        check_bounds: bool,
    ) -> Result<Self> {
        let [v0, v1, v2] = *face.vertices();
        let n = (v1 - v0).cross(&(v2 - v0));
        let norm = n.norm();
        if norm <= f64::EPSILON {
            return Err(VoxelError::Voxelization(format!(
                "degenerate face [{v0}, {v1}, {v2}]"
            )));
        }
        let n0 = n / norm;
        let depth = context.resolve_depth(depth);
        let s0 = context.voxel_size(depth);
        let (t, r_c) = match sep {
            Separability::Six => (0.5 * s0 * n0.dot(&matching_voxel_normal(&n0)), 0.5 * s0),
            Separability::TwentySix => (
                0.5 * s0 * SQRT_3 * n0.dot(&matching_voxel_diagonal(&n0)),
                0.5 * SQRT_3 * s0,
            ),
        };
        let plane = |p: Point3<f64>, n: Vector3<f64>| {
            Plane::through(p, n).ok_or_else(|| VoxelError::Voxelization(format!("no test plane through {p}")))
        };
        let upper = plane(v0 + n0 * t, n0)?;
        let lower = plane(v0 - n0 * t, -n0)?;

        let edges = [(v0, v1), (v1, v2), (v2, v0)];
        let mut cylinders = Vec::with_capacity(3);
        let mut planes = Vec::with_capacity(3);
        for (a, b) in edges {
            let cyl = Cylinder::from_segment(a, b, r_c).ok_or_else(|| {
                VoxelError::Voxelization(format!("zero length edge at {a}"))
            })?;
            planes.push(plane(a, cyl.direction.cross(&n0))?);
            cylinders.push(cyl);
        }
        let [c0, c1, c2]: [Cylinder; 3] = cylinders
            .try_into()
            .map_err(|_| VoxelError::Voxelization("edge cylinder count".into()))?;
        let [p0, p1, p2]: [Plane; 3] = planes
            .try_into()
            .map_err(|_| VoxelError::Voxelization("edge plane count".into()))?;

        let bounds = face.bounds().expanded(r_c);
        let node = if context.check_range(&bounds, &NodeId::ROOT) {
            context.containing_node(&bounds)?
        } else if check_bounds {
            return Err(VoxelError::OutOfRange(format!(
                "face bounds [{}, {}] exceed the tree",
                bounds.min(),
                bounds.max()
            )));
        } else {
            NodeId::ROOT
        };

        Ok(Self {
            face: face.clone(),
            depth,
            band_half_thickness: t,
            edge_radius: r_c,
            upper,
            lower,
            edge_planes: [p0, p1, p2],
            edge_cylinders: [c0, c1, c2],
            node,
        })
    }

    #[inline]
    pub fn face(&self) -> &Face {
        &self.face
    }

    /// Depth of the voxels the volumes are sized for.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Half thickness `t` of the band around the triangle plane.
    #[inline]
    pub fn band_half_thickness(&self) -> f64 {
        self.band_half_thickness
    }

    /// Radius `r_c` of the edge cylinders.
    #[inline]
    pub fn edge_radius(&self) -> f64 {
        self.edge_radius
    }

    #[inline]
    pub fn upper(&self) -> &Plane {
        &self.upper
    }

    #[inline]
    pub fn lower(&self) -> &Plane {
        &self.lower
    }

    #[inline]
    pub fn edge_planes(&self) -> &[Plane; 3] {
        &self.edge_planes
    }

    #[inline]
    pub fn edge_cylinders(&self) -> &[Cylinder; 3] {
        &self.edge_cylinders
    }

    /// Smallest voxel containing the face grown by the edge radius.
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Face bounds grown by the edge radius.
    pub fn bounds(&self) -> Range3 {
        self.face.bounds().expanded(self.edge_radius)
    }
}

/// Returns `true` if a voxel centered at `p` overlaps the triangle.
pub fn voxelize_point_test(data: &TriangleVoxelizationData, p: &Point3<f64>) -> bool {
    let in_band =
        data.upper.is_behind(p) && data.lower.is_behind(p) && data.edge_planes.iter().all(|e| e.is_behind(p));
    in_band || data.edge_cylinders.iter().any(|c| c.signed_distance(p) <= 0.0)
}

/// Attaches `face` to the node below `h` that contains it.
///
/// The containing voxel is computed at the deepest level. It is inserted
/// if missing, unless the path to it ends at a node already holding faces,
/// in which case the face joins that node. If the containing node has
/// children, the face is handed on to every child its bounds overlap.
///
/// Returns `false` if the face does not lie under `h`. Fails with
/// [`VoxelError::OutOfRange`], leaving the tree untouched, if the face grown
/// by its edge radius reaches outside the root voxel.
pub fn voxelize_insert_face(
    tree: &mut VoxelTree,
    h: NodeHandle,
    face: &Face,
    sep: Separability,
    fill: bool,
) -> Result<bool> {
    let data = TriangleVoxelizationData::new(face, sep, None, tree.context(), true)?;
    insert_prepared(tree, h, &data, fill)
}

fn insert_prepared(
    tree: &mut VoxelTree,
    h: NodeHandle,
    data: &TriangleVoxelizationData,
    fill: bool,
) -> Result<bool> {
    let target = data.node();
    let node_id = tree.get(h)?.id();
    if target.depth() < node_id.depth() || !tree.context().contains_loc(&node_id, &target.loc) {
        return Ok(false);
    }
    let start = tree
        .locate_child(h, &target.loc, Some(target.depth()))
        .ok_or_else(|| VoxelError::Structural(format!("cannot locate {target} below {node_id}")))?;
    let holds_faces = matches!(tree.data(start), Some(NodeData::FaceVec(_)));
    let at = if holds_faces || tree.get(start)?.depth() == target.depth() {
        start
    } else {
        tree.insert_child(start, &target.loc, Some(target.depth()), fill, false)?
            .ok_or_else(|| VoxelError::Structural(format!("cannot insert {target} below {node_id}")))?
    };
    attach_face(tree, at, data.face(), &data.bounds())?;
    trace!("attached face to {}", tree.get(at)?.id());
    Ok(true)
}

fn attach_face(tree: &mut VoxelTree, h: NodeHandle, face: &Face, bounds: &Range3) -> Result<()> {
    let (id, is_leaf) = {
        let node = tree.get(h)?;
        (node.id(), node.is_leaf())
    };
    if is_leaf {
        if let Some(NodeData::FaceVec(faces)) = tree.data_mut(h) {
            faces.push(face.clone());
            return Ok(());
        }
        return match tree.data(h).map(NodeData::data_type) {
            None => tree.set_data(h, NodeData::FaceVec(vec![face.clone()])),
            Some(other) => Err(VoxelError::Structural(format!(
                "cannot attach a face to node {id} holding {other:?} data"
            ))),
        };
    }
    for oi in 0..NUM_CHILD_SLOTS {
        let Some(child_id) = tree.context().child_id(&id, oi) else {
            continue;
        };
        if tree.context().voxel_range(&child_id).intersects(bounds) {
            let c = tree.child_or_create(h, oi)?;
            attach_face(tree, c, face, bounds)?;
        }
    }
    Ok(())
}

/// Voxelizes the faces attached in the subtree of `h` down to
/// `target_depth` (`None` meaning the deepest level).
///
/// Each face is handed to the children whose center passes the point test
/// at the child's depth; children are created as needed and the face lists
/// of intermediate nodes are cleared once distributed. Nodes reached at the
/// target depth collect their faces, lose any deeper structure and are
/// passed to `processor`. With `fill_target_depth`, every child slot at the
/// target depth under a visited node is created. With `prune_empty`,
/// leaves left without data are removed.
///
/// Returns the number of voxelized nodes.
pub fn voxelize_faces<P: NodeProcessor + ?Sized>(
    tree: &mut VoxelTree,
    h: NodeHandle,
    processor: &mut P,
    target_depth: Option<usize>,
    sep: Separability,
    fill_target_depth: bool,
    prune_empty: bool,
) -> Result<usize> {
    let target = tree.context().resolve_depth(target_depth);
    let n = voxelize_node(tree, h, processor, target, sep, fill_target_depth, prune_empty, Vec::new())?;
    debug!("voxelized {n} nodes at depth {target}");
    Ok(n)
}

#[allow(clippy::too_many_arguments)]
fn voxelize_node<P: NodeProcessor + ?Sized>(
    tree: &mut VoxelTree,
    h: NodeHandle,
    processor: &mut P,
    target: usize,
    sep: Separability,
    fill_target_depth: bool,
    prune_empty: bool,
    mut faces: Vec<Face>,
) -> Result<usize> {
    let node = tree.get(h)?;
    let id = node.id();
    let depth = node.depth();

    if depth >= target {
        let mut all = faces;
        all.extend(tree.collect_faces(h));
        if all.is_empty() {
            return Ok(0);
        }
        if !matches!(tree.data(h), None | Some(NodeData::FaceVec(_))) {
            // A voxelized node keeps its payload and is not processed again.
            trace!("node {id} keeps its payload, {} faces ignored", all.len());
            return Ok(0);
        }
        tree.clear(h)?;
        tree.set_data(h, NodeData::FaceVec(all))?;
        processor.process(tree, h, None)?;
        return Ok(1);
    }

    if matches!(tree.data(h), Some(NodeData::FaceVec(_))) {
        if let Some(NodeData::FaceVec(own)) = tree.take_data(h) {
            faces.extend(own);
        }
    }
    let fill0 = fill_target_depth && depth + 1 == target;
    let tests = faces
        .iter()
        .map(|f| TriangleVoxelizationData::new(f, sep, Some(depth + 1), tree.context(), false))
        .collect::<Result<Vec<_>>>()?;

    let mut count = 0;
    for oi in 0..NUM_CHILD_SLOTS {
        let Some(child_id) = tree.context().child_id(&id, oi) else {
            continue;
        };
        let center = tree.context().voxel_range(&child_id).center();
        let child_faces: Vec<Face> = tests
            .iter()
            .filter(|t| voxelize_point_test(t, &center))
            .map(|t| t.face().clone())
            .collect();
        let child = match tree.child(h, oi) {
            Some(c) => Some(c),
            None if !child_faces.is_empty() || fill0 => Some(tree.child_or_create(h, oi)?),
            None => None,
        };
        if let Some(c) = child {
            count += voxelize_node(tree, c, processor, target, sep, fill_target_depth, prune_empty, child_faces)?;
        }
    }
    if prune_empty {
        tree.prune_empty(h, false);
    }
    Ok(count)
}

/// Voxelizes a whole mesh into `tree`.
///
/// The test volumes of all faces are computed in parallel. A degenerate face
/// fails the whole call with a [`VoxelError::Voxelization`] naming its index,
/// before the tree is touched. Faces are then attached to the tree,
/// shallowest containing node first, and voxelized down to `target_depth`
/// with a [`VoxelizationProcessor`] writing `target` payloads. Empty leaves
/// are pruned.
///
/// Returns the number of voxelized nodes.
pub fn voxelize_mesh(
    tree: &mut VoxelTree,
    mesh: &Mesh,
    sep: Separability,
    target_depth: Option<usize>,
    target: VoxelizationTarget,
) -> Result<usize> {
    let context = tree.context().clone();
    let prepared: Vec<Result<TriangleVoxelizationData>> = mesh
        .faces()
        .par_iter()
        .map(|f| TriangleVoxelizationData::new(f, sep, None, &context, false))
        .collect();

    let mut data = Vec::with_capacity(prepared.len());
    for (i, r) in prepared.into_iter().enumerate() {
        match r {
            Ok(d) => data.push(d),
            Err(VoxelError::Voxelization(reason)) => {
                return Err(VoxelError::Voxelization(format!("face {i}: {reason}")))
            }
            Err(e) => return Err(e),
        }
    }
    // Shallow faces first, so that deeper faces stop at their face lists.
    data.sort_by_key(|d| d.node().depth());

    let root = tree.root();
    let mut inserted = 0;
    for d in &data {
        if insert_prepared(tree, root, d, false)? {
            inserted += 1;
        }
    }
    debug!("attached {inserted} of {} faces", mesh.len());

    let mut processor = VoxelizationProcessor::new(target);
    let n = voxelize_faces(tree, root, &mut processor, target_depth, sep, false, true)?;
    tree.log_summary("voxelized mesh");
    Ok(n)
}

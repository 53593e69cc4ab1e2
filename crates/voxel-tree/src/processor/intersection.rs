use log::trace;

use crate::geometry::Axis;
use crate::query::NodeIntersection;
use crate::tree::{NodeHandle, VoxelClass, VoxelTree};
use crate::Result;

use super::{NodeProcessor, ProcessingResult};

/// Collects the voxels stabbed by one ray and turns them into IOB votes.
///
/// The processor is meant to be driven by a ray grid at a single depth. On
/// [`finish`](NodeProcessor::finish), the recorded voxels are split into
/// runs of consecutive `FILLED` voxels:
///
/// - filled voxels are tagged `HIT | BOUNDARY` and record the run length as
///   their wall thickness along the ray axis;
/// - other voxels lying behind an odd number of runs with at least one more
///   run ahead get an inside vote, all others an outside vote.
#[derive(Debug, Clone)]
pub struct IntersectionProcessor {
    axis: Axis,
    hits: Vec<NodeIntersection>,
    num_rays: usize,
}

impl IntersectionProcessor {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            hits: Vec::new(),
            num_rays: 0,
        }
    }

    #[inline]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Number of rays evaluated so far.
    pub fn num_rays(&self) -> usize {
        self.num_rays
    }

    fn apply_votes(&self, tree: &mut VoxelTree) -> Result<()> {
        let filled: Vec<bool> = self
            .hits
            .iter()
            .map(|h| tree.voxel_class(h.node).contains(VoxelClass::FILLED))
            .collect();
        // Run index of each voxel: filled voxels belong to run `r`, other
        // voxels have seen `r` runs before them.
        let mut runs = Vec::with_capacity(filled.len());
        let mut num_runs = 0usize;
        for (i, &f) in filled.iter().enumerate() {
            if f && (i == 0 || !filled[i - 1]) {
                num_runs += 1;
            }
            runs.push(num_runs);
        }
        let axis = self.axis.index();
        let mut i = 0;
        while i < self.hits.len() {
            if filled[i] {
                let start = i;
                while i < filled.len() && filled[i] {
                    i += 1;
                }
                let thickness = u16::try_from(i - start).unwrap_or(u16::MAX);
                for hit in &self.hits[start..i] {
                    let iob = tree.iob_data_mut(hit.node)?;
                    iob.voxel_class.insert(VoxelClass::HIT | VoxelClass::BOUNDARY);
                    let wt = &mut iob.wall_thickness[axis];
                    if *wt == 0 || thickness < *wt {
                        *wt = thickness;
                    }
                }
                continue;
            }
            let before = runs[i];
            let after = num_runs - before;
            let iob = tree.iob_data_mut(self.hits[i].node)?;
            iob.num_ints0 = iob.num_ints0.saturating_add(u16::try_from(before).unwrap_or(u16::MAX));
            iob.num_ints1 = iob.num_ints1.saturating_add(u16::try_from(after).unwrap_or(u16::MAX));
            if before % 2 == 1 && after > 0 {
                iob.votes_inside = iob.votes_inside.saturating_add(1);
            } else {
                iob.votes_outside = iob.votes_outside.saturating_add(1);
            }
            i += 1;
        }
        trace!("ray {}: {} voxels, {num_runs} filled runs", self.num_rays, self.hits.len());
        Ok(())
    }
}

impl NodeProcessor for IntersectionProcessor {
    fn process(
        &mut self,
        _tree: &mut VoxelTree,
        _node: NodeHandle,
        hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        if let Some(hit) = hit {
            self.hits.push(*hit);
        }
        Ok(ProcessingResult::OK)
    }

    fn begin(&mut self) {
        self.hits.clear();
    }

    fn finish(&mut self, tree: &mut VoxelTree) -> Result<()> {
        self.apply_votes(tree)?;
        self.hits.clear();
        self.num_rays += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Ray;
    use crate::processor::NodeFilter;
    use crate::query::{intersect_ray, RayOptions};
    use crate::tree::{NodeData, IobData};
    use crate::{Context, NodeLoc3};
    use nalgebra::{Point3, Vector3};
    use std::sync::Arc;

    fn iob(tree: &VoxelTree, x: u16) -> IobData {
        let h = tree
            .locate_child(tree.root(), &NodeLoc3::new(x, 0, 0), None)
            .unwrap();
        match tree.data(h) {
            Some(NodeData::VoxelIob(d)) => *d,
            other => panic!("voxel {x} holds {other:?}"),
        }
    }

    /// A row of 8 voxels along x with the given ones filled.
    fn cast_row(filled: &[u16]) -> VoxelTree {
        let mut tree = VoxelTree::new(Arc::new(Context::new(4, 2, 1.0, 1e-6).unwrap()));
        let root = tree.root();
        tree.fill(root, false, true, None).unwrap();
        for &x in filled {
            let h = tree.locate_child(root, &NodeLoc3::new(x, 0, 0), None).unwrap();
            tree.set_voxel_class(h, VoxelClass::FILLED, true).unwrap();
        }
        let ray = Ray::new(Point3::new(-0.1, 0.0625, 0.0625), Vector3::new(1.0, 0.0, 0.0));
        let filter = NodeFilter::new().with_depth(3);
        let mut votes = IntersectionProcessor::new(Axis::X);
        votes.begin();
        intersect_ray(&mut tree, root, &ray, &mut votes, &RayOptions::default().with_filter(&filter)).unwrap();
        votes.finish(&mut tree).unwrap();
        assert_eq!(votes.num_rays(), 1);
        tree
    }

    #[test]
    fn voxels_between_walls_vote_inside() {
        let tree = cast_row(&[1, 2, 6]);
        assert_eq!(iob(&tree, 0).votes_outside, 1);
        for x in 3..6 {
            assert_eq!(iob(&tree, x).votes_inside, 1, "voxel {x} is enclosed");
        }
        assert_eq!(iob(&tree, 7).votes_outside, 1);
        assert_eq!(iob(&tree, 4).num_ints0, 1);
        assert_eq!(iob(&tree, 4).num_ints1, 1);
    }

    #[test]
    fn filled_voxels_record_run_length() {
        let tree = cast_row(&[1, 2, 6]);
        let wall = iob(&tree, 1);
        assert!(wall.voxel_class.contains(VoxelClass::FILLED | VoxelClass::HIT | VoxelClass::BOUNDARY));
        assert_eq!(wall.wall_thickness, [2, 0, 0]);
        assert_eq!(iob(&tree, 6).wall_thickness, [1, 0, 0]);
    }

    #[test]
    fn open_ray_votes_outside() {
        let tree = cast_row(&[3]);
        for x in [0, 1, 2, 4, 5, 6, 7] {
            assert_eq!(iob(&tree, x).votes_outside, 1, "voxel {x}");
            assert_eq!(iob(&tree, x).votes_inside, 0, "voxel {x}");
        }
    }
}

use log::trace;

use crate::query::NodeIntersection;
use crate::tree::{NodeData, NodeHandle, VoxelClass, VoxelTree};
use crate::Result;

use super::{NodeProcessor, ProcessingResult};

/// Classifies voxels as inside or outside from their ray votes.
///
/// Only nodes holding an IOB record are considered. A node is inside when
/// `votes_inside >= inside_min_votes` and the inside fraction of all votes
/// reaches `inside_vote_threshold`; otherwise it is outside. Nodes without
/// votes are left unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IobEvalProcessor {
    pub inside_vote_threshold: f64,
    pub inside_min_votes: u16,
    /// Never flip a node that is already classified the other way.
    pub keep_existing_classification: bool,
    pub class_inside: VoxelClass,
    pub class_outside: VoxelClass,
}

impl Default for IobEvalProcessor {
    fn default() -> Self {
        Self {
            inside_vote_threshold: Self::DEFAULT_INSIDE_VOTE_THRESHOLD,
            inside_min_votes: Self::DEFAULT_INSIDE_MIN_VOTES,
            keep_existing_classification: false,
            class_inside: VoxelClass::INSIDE,
            class_outside: VoxelClass::OUTSIDE,
        }
    }
}

impl IobEvalProcessor {
    pub const DEFAULT_INSIDE_VOTE_THRESHOLD: f64 = 0.9;
    pub const DEFAULT_INSIDE_MIN_VOTES: u16 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.inside_vote_threshold = threshold;
        self
    }

    pub fn with_min_votes(mut self, votes: u16) -> Self {
        self.inside_min_votes = votes;
        self
    }

    pub fn with_keep_existing(mut self, keep: bool) -> Self {
        self.keep_existing_classification = keep;
        self
    }

    /// Returns `true` if the votes classify a voxel as inside.
    pub fn is_inside(&self, votes_inside: u16, votes_outside: u16) -> bool {
        let total = u32::from(votes_inside) + u32::from(votes_outside);
        if total == 0 {
            return false;
        }
        let fraction = f64::from(votes_inside) / f64::from(total);
        votes_inside >= self.inside_min_votes && fraction >= self.inside_vote_threshold
    }
}

impl NodeProcessor for IobEvalProcessor {
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        _hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        let Some(NodeData::VoxelIob(iob)) = tree.data_mut(node) else {
            return Ok(ProcessingResult::OK);
        };
        if iob.votes_inside == 0 && iob.votes_outside == 0 {
            return Ok(ProcessingResult::OK);
        }
        let class = &mut iob.voxel_class;
        if self.is_inside(iob.votes_inside, iob.votes_outside) {
            if !(self.keep_existing_classification && class.intersects(self.class_outside)) {
                class.remove(self.class_outside | VoxelClass::EMPTY);
                class.insert(self.class_inside);
            }
        } else if !(self.keep_existing_classification && class.intersects(self.class_inside)) {
            class.remove(self.class_inside);
            class.insert(self.class_outside);
        }
        trace!(
            "votes {}/{} -> {:?}",
            iob.votes_inside, iob.votes_outside, iob.voxel_class
        );
        Ok(ProcessingResult::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::IobData;
    use crate::Context;
    use std::sync::Arc;

    fn classify(processor: &mut IobEvalProcessor, iob: IobData) -> VoxelClass {
        let mut tree = VoxelTree::new(Arc::new(Context::new(2, 2, 1.0, 1e-6).unwrap()));
        let root = tree.root();
        tree.set_data(root, NodeData::VoxelIob(iob)).unwrap();
        processor.process(&mut tree, root, None).unwrap();
        tree.voxel_class(root)
    }

    fn votes(inside: u16, outside: u16) -> IobData {
        IobData {
            votes_inside: inside,
            votes_outside: outside,
            ..IobData::default()
        }
    }

    #[test]
    fn nine_to_one_is_inside() {
        let class = classify(&mut IobEvalProcessor::new(), votes(9, 1));
        assert_eq!(class, VoxelClass::INSIDE);
    }

    #[test]
    fn eight_to_two_is_outside() {
        let class = classify(&mut IobEvalProcessor::new(), votes(8, 2));
        assert_eq!(class, VoxelClass::OUTSIDE);
    }

    #[test]
    fn no_votes_leaves_node_unchanged() {
        let iob = IobData::with_class(VoxelClass::FILLED | VoxelClass::BOUNDARY);
        let class = classify(&mut IobEvalProcessor::new(), iob);
        assert_eq!(class, VoxelClass::FILLED | VoxelClass::BOUNDARY);
    }

    #[test]
    fn min_votes_is_required() {
        let mut p = IobEvalProcessor::new().with_min_votes(3);
        assert_eq!(classify(&mut p, votes(2, 0)), VoxelClass::OUTSIDE);
        assert_eq!(classify(&mut p, votes(3, 0)), VoxelClass::INSIDE);
    }

    #[test]
    fn keep_existing_prevents_flipping() {
        let mut p = IobEvalProcessor::new().with_keep_existing(true);
        let mut iob = votes(10, 0);
        iob.voxel_class = VoxelClass::OUTSIDE;
        assert_eq!(classify(&mut p, iob), VoxelClass::OUTSIDE);
        let mut iob = votes(0, 10);
        iob.voxel_class = VoxelClass::INSIDE;
        assert_eq!(classify(&mut p, iob), VoxelClass::INSIDE);
        let mut flip = IobEvalProcessor::new();
        assert_eq!(classify(&mut flip, iob), VoxelClass::OUTSIDE);
    }

    #[test]
    fn inside_clears_empty_bit() {
        let mut iob = votes(5, 0);
        iob.voxel_class = VoxelClass::EMPTY;
        assert_eq!(classify(&mut IobEvalProcessor::new(), iob), VoxelClass::INSIDE);
    }
}

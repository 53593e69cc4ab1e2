use crate::geometry::Range3;
use crate::query::NodeIntersection;
use crate::tree::{LeafStatus, NodeDataType, NodeHandle, VoxelClass, VoxelTree};
use crate::Result;

use super::{NodeProcessor, ProcessingResult};

/// Node selection criteria.
///
/// Every criterion is optional; an empty filter passes every node. As a
/// processor it returns `OK | PASS` for accepted nodes and `OK | FINISHED`
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilter {
    pub min_depth: Option<usize>,
    pub max_depth: Option<usize>,
    /// Nodes pass if the center of their voxel lies inside this range.
    pub region: Option<Range3>,
    pub data_type: Option<NodeDataType>,
    pub leaf_status: LeafStatus,
    /// Nodes pass if any of these class bits is set.
    pub voxel_class: Option<VoxelClass>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_depth(mut self, depth: usize) -> Self {
        self.min_depth = Some(depth);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Accepts exactly the nodes at `depth`.
    pub fn with_depth(self, depth: usize) -> Self {
        self.with_min_depth(depth).with_max_depth(depth)
    }

    pub fn with_region(mut self, region: Range3) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_data_type(mut self, data_type: NodeDataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn with_leaf_status(mut self, leaf_status: LeafStatus) -> Self {
        self.leaf_status = leaf_status;
        self
    }

    pub fn with_voxel_class(mut self, voxel_class: VoxelClass) -> Self {
        self.voxel_class = Some(voxel_class);
        self
    }

    /// Returns `true` if `depth` lies within the depth bounds.
    #[inline]
    pub fn accepts_depth(&self, depth: usize) -> bool {
        self.min_depth.is_none_or(|m| depth >= m) && self.max_depth.is_none_or(|m| depth <= m)
    }

    /// Returns `true` if the node passes every criterion.
    ///
    /// Stale handles never pass.
    pub fn accepts(&self, tree: &VoxelTree, h: NodeHandle) -> bool {
        let Some(node) = tree.node(h) else {
            return false;
        };
        if !self.accepts_depth(node.depth()) {
            return false;
        }
        if let Some(region) = &self.region {
            let center = tree.context().voxel_range(&node.id()).center();
            if !region.contains_point(&center) {
                return false;
            }
        }
        if let Some(want) = self.data_type {
            let ok = match node.data_type() {
                Some(actual) => want.accepts(actual),
                None => want == NodeDataType::Unknown,
            };
            if !ok {
                return false;
            }
        }
        match self.leaf_status {
            LeafStatus::Any => {}
            status if status != node.leaf_status() => return false,
            _ => {}
        }
        self.voxel_class.is_none_or(|mask| node.voxel_class().matches(mask))
    }
}

impl NodeProcessor for NodeFilter {
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        _hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        if self.accepts(tree, node) {
            Ok(ProcessingResult::OK | ProcessingResult::PASS)
        } else {
            Ok(ProcessingResult::OK | ProcessingResult::FINISHED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeData;
    use crate::{Context, NodeLoc3};
    use nalgebra::Point3;
    use std::sync::Arc;

    fn make_tree() -> VoxelTree {
        VoxelTree::new(Arc::new(Context::new(3, 2, 1.0, 1e-6).unwrap()))
    }

    #[test]
    fn empty_filter_passes_everything() {
        let mut tree = make_tree();
        let root = tree.root();
        let mut filter = NodeFilter::new();
        let r = filter.process(&mut tree, root, None).unwrap();
        assert!(r.is_pass());
        assert!(!r.is_finished());
    }

    #[test]
    fn depth_and_leaf_criteria() {
        let mut tree = make_tree();
        let root = tree.root();
        let c = tree.child_or_create(root, 1).unwrap();
        let filter = NodeFilter::new().with_depth(1).with_leaf_status(LeafStatus::Leaf);
        assert!(filter.accepts(&tree, c));
        assert!(!filter.accepts(&tree, root));
        let inner = NodeFilter::new().with_leaf_status(LeafStatus::NonLeaf);
        assert!(inner.accepts(&tree, root));
        assert!(!inner.accepts(&tree, c));
    }

    #[test]
    fn region_matches_voxel_center() {
        let mut tree = make_tree();
        let root = tree.root();
        let low = tree.child_or_create(root, 0).unwrap();
        let high = tree.child_or_create(root, 7).unwrap();
        let filter = NodeFilter::new().with_region(Range3::new(Point3::origin(), Point3::new(0.3, 0.3, 0.3)));
        assert!(filter.accepts(&tree, low));
        assert!(!filter.accepts(&tree, high));
    }

    #[test]
    fn data_type_and_class_criteria() {
        let mut tree = make_tree();
        let root = tree.root();
        let a = tree.insert_child(root, &NodeLoc3::new(0, 0, 0), None, false, false).unwrap().unwrap();
        let b = tree.insert_child(root, &NodeLoc3::new(3, 3, 3), None, false, false).unwrap().unwrap();
        tree.set_data(a, NodeData::Density(1.0)).unwrap();
        tree.set_voxel_class(b, VoxelClass::FILLED | VoxelClass::BOUNDARY, true).unwrap();

        let dens = NodeFilter::new().with_data_type(NodeDataType::Density);
        assert!(dens.accepts(&tree, a));
        assert!(!dens.accepts(&tree, b));
        let any = NodeFilter::new().with_data_type(NodeDataType::AnyNotNull);
        assert!(any.accepts(&tree, a) && any.accepts(&tree, b));
        assert!(!any.accepts(&tree, root));

        let boundary = NodeFilter::new().with_voxel_class(VoxelClass::BOUNDARY | VoxelClass::INSIDE);
        assert!(boundary.accepts(&tree, b));
        assert!(!boundary.accepts(&tree, a));
    }
}

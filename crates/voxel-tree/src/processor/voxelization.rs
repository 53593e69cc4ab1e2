use crate::query::NodeIntersection;
use crate::tree::{IobData, NodeData, NodeHandle, VoxelClass, VoxelTree};
use crate::Result;

use super::{NodeProcessor, ProcessingResult};

/// Payload written to voxelized nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VoxelizationTarget {
    /// A voxel class with `FILLED` set and `EMPTY` cleared.
    #[default]
    Class,
    /// A density of [`NodeData::DENSITY_FILLED`].
    Density,
    /// The area-weighted average color and normal of the attached faces.
    ColorNormal,
    /// An IOB record classified `FILLED | BOUNDARY`.
    Iob,
}

/// Replaces the payload of voxelized nodes with the payload of `target`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoxelizationProcessor {
    pub target: VoxelizationTarget,
}

impl VoxelizationProcessor {
    pub fn new(target: VoxelizationTarget) -> Self {
        Self { target }
    }
}

fn filled(mut class: VoxelClass) -> VoxelClass {
    class.remove(VoxelClass::EMPTY);
    class.insert(VoxelClass::FILLED);
    class
}

impl NodeProcessor for VoxelizationProcessor {
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        _hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        let payload = match self.target {
            VoxelizationTarget::Class => match tree.data(node) {
                Some(NodeData::VoxelIob(d)) => {
                    let mut d = *d;
                    d.voxel_class = filled(d.voxel_class);
                    NodeData::VoxelIob(d)
                }
                Some(NodeData::VoxelClass(c)) => NodeData::VoxelClass(filled(*c)),
                _ => NodeData::VoxelClass(VoxelClass::FILLED),
            },
            VoxelizationTarget::Density => NodeData::Density(NodeData::DENSITY_FILLED),
            VoxelizationTarget::ColorNormal => {
                let (_, color, normal) = tree.face_color_normal(node, true);
                NodeData::ColorNormal { color, normal }
            }
            VoxelizationTarget::Iob => {
                let mut d = match tree.data(node) {
                    Some(NodeData::VoxelIob(d)) => *d,
                    _ => IobData::default(),
                };
                d.voxel_class = filled(d.voxel_class) | VoxelClass::BOUNDARY;
                NodeData::VoxelIob(d)
            }
        };
        tree.set_data(node, payload)?;
        Ok(ProcessingResult::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Face;
    use crate::Context;
    use nalgebra::Point3;
    use std::sync::Arc;

    fn make_tree_with_face() -> (VoxelTree, NodeHandle) {
        let mut tree = VoxelTree::new(Arc::new(Context::new(2, 2, 1.0, 1e-6).unwrap()));
        let root = tree.root();
        let face = Face::new(
            Point3::new(0.0, 0.0, 0.5),
            Point3::new(1.0, 0.0, 0.5),
            Point3::new(0.0, 1.0, 0.5),
        )
        .with_color([0.2, 0.4, 0.6, 1.0]);
        tree.set_data(root, NodeData::FaceVec(vec![face])).unwrap();
        (tree, root)
    }

    #[test]
    fn class_target_sets_filled() {
        let (mut tree, root) = make_tree_with_face();
        let mut p = VoxelizationProcessor::new(VoxelizationTarget::Class);
        p.process(&mut tree, root, None).unwrap();
        assert_eq!(tree.data(root), Some(&NodeData::VoxelClass(VoxelClass::FILLED)));
    }

    #[test]
    fn density_target() {
        let (mut tree, root) = make_tree_with_face();
        VoxelizationProcessor::new(VoxelizationTarget::Density)
            .process(&mut tree, root, None)
            .unwrap();
        assert_eq!(tree.data(root), Some(&NodeData::Density(1.0)));
    }

    #[test]
    fn color_normal_target_uses_faces() {
        let (mut tree, root) = make_tree_with_face();
        VoxelizationProcessor::new(VoxelizationTarget::ColorNormal)
            .process(&mut tree, root, None)
            .unwrap();
        match tree.data(root) {
            Some(NodeData::ColorNormal { color, normal }) => {
                assert_eq!(*color, [0.2, 0.4, 0.6, 1.0]);
                assert_eq!(*normal, [0.0, 0.0, 1.0]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn iob_target_marks_boundary() {
        let (mut tree, root) = make_tree_with_face();
        VoxelizationProcessor::new(VoxelizationTarget::Iob)
            .process(&mut tree, root, None)
            .unwrap();
        assert_eq!(tree.voxel_class(root), VoxelClass::FILLED | VoxelClass::BOUNDARY);
    }
}

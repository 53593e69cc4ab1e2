//! Voxel tree node entries and handles.

use crate::loc::{NodeId, NodeLoc3};

use super::data::{LeafStatus, NodeData, NodeDataType, VoxelClass};

/// Number of child slots of a node (`order³` for order 2).
pub const NUM_CHILD_SLOTS: usize = 8;

/// Generational handle of a node in a [`VoxelTree`](super::VoxelTree).
///
/// Handles are cheap to copy. A handle to a node that has since been
/// removed never resolves to another node, even if its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

/// A node of the voxel tree.
///
/// A node either holds a data payload or has children, never both. Child
/// slots are indexed by child order index (`x | y << 1 | z << 2`).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeHandle>,
    children: [Option<NodeHandle>; NUM_CHILD_SLOTS],
    data: Option<NodeData>,
}

impl Node {
    pub(crate) fn new(id: NodeId, parent: Option<NodeHandle>) -> Self {
        Self {
            id,
            parent,
            children: [None; NUM_CHILD_SLOTS],
            data: None,
        }
    }

    /// Returns the voxel this node covers.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.id.depth()
    }

    #[inline]
    pub fn loc(&self) -> NodeLoc3 {
        self.id.loc
    }

    /// Returns the parent node, or `None` for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns the child with the given order index, if present.
    #[inline]
    pub fn child(&self, order_index: usize) -> Option<NodeHandle> {
        self.children.get(order_index).copied().flatten()
    }

    /// Returns all child slots.
    #[inline]
    pub fn child_slots(&self) -> &[Option<NodeHandle>; NUM_CHILD_SLOTS] {
        &self.children
    }

    /// Iterates over the present children as `(order_index, handle)` pairs,
    /// in order index order.
    pub fn children(&self) -> impl Iterator<Item = (usize, NodeHandle)> + '_ {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|h| (i, h)))
    }

    /// Returns the number of present children.
    pub fn num_children(&self) -> usize {
        self.children.iter().filter(|c| c.is_some()).count()
    }

    /// Returns the child presence bitmask (bit `i` set if child `i` exists).
    pub fn child_mask(&self) -> u8 {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .fold(0, |m, (i, _)| m | (1 << i))
    }

    /// Returns `true` if the node has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    pub fn leaf_status(&self) -> LeafStatus {
        if self.is_leaf() {
            LeafStatus::Leaf
        } else {
            LeafStatus::NonLeaf
        }
    }

    #[inline]
    pub fn data(&self) -> Option<&NodeData> {
        self.data.as_ref()
    }

    /// Returns the type of the data payload, or `None` without data.
    pub fn data_type(&self) -> Option<NodeDataType> {
        self.data.as_ref().map(NodeData::data_type)
    }

    /// Returns `true` if the node has no payload or a `Null` payload.
    pub fn is_empty(&self) -> bool {
        matches!(self.data, None | Some(NodeData::Null))
    }

    /// Returns the voxel class of the payload; undefined without one.
    pub fn voxel_class(&self) -> VoxelClass {
        self.data
            .as_ref()
            .and_then(NodeData::voxel_class)
            .unwrap_or(VoxelClass::UNDEFINED)
    }

    pub(crate) fn set_child(&mut self, order_index: usize, child: Option<NodeHandle>) {
        self.children[order_index] = child;
    }

    pub(crate) fn take_children(&mut self) -> [Option<NodeHandle>; NUM_CHILD_SLOTS] {
        std::mem::replace(&mut self.children, [None; NUM_CHILD_SLOTS])
    }

    pub(crate) fn data_slot(&mut self) -> &mut Option<NodeData> {
        &mut self.data
    }
}

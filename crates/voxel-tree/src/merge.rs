//! Policy controlled merging of two voxel trees.
//!
//! A merge walks a source and a target node with the same [`NodeId`] in
//! lockstep. Source children and payloads either move into the target, or
//! the merge descends into matching child pairs, depending on the
//! [`MergePolicy`] for children and for data.
//!
//! Moved subtrees leave the source tree: their source slots are freed and
//! every handle into them becomes stale.
//!
//! [`NodeId`]: crate::NodeId

use log::{debug, trace};

use crate::processor::NodeFilter;
use crate::tree::{NodeHandle, VoxelTree, NUM_CHILD_SLOTS};
use crate::{Result, VoxelError};

/// Which side wins when both the source and the target hold something.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MergePolicy {
    /// Keep the target; source content only fills empty target slots.
    #[default]
    KeepTarget,
    /// Replace the target with source content.
    TakeOverSource,
}

/// Parameters of [`merge`].
///
/// - `source_filter` and `target_filter` decide whether a node pair is
///   merged at all;
/// - `source_merge_filter` decides whether a source child or payload may
///   move into the target.
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions<'a> {
    pub child_policy: MergePolicy,
    pub data_policy: MergePolicy,
    pub source_filter: Option<&'a NodeFilter>,
    pub target_filter: Option<&'a NodeFilter>,
    pub source_merge_filter: Option<&'a NodeFilter>,
    /// Descend into child pairs present on both sides.
    pub recursive: bool,
    /// Create the missing siblings of children moved into the target.
    pub fill: bool,
}

impl Default for MergeOptions<'_> {
    fn default() -> Self {
        Self {
            child_policy: MergePolicy::KeepTarget,
            data_policy: MergePolicy::KeepTarget,
            source_filter: None,
            target_filter: None,
            source_merge_filter: None,
            recursive: true,
            fill: false,
        }
    }
}

impl<'a> MergeOptions<'a> {
    /// Options using `policy` for both children and data.
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            child_policy: policy,
            data_policy: policy,
            ..Self::default()
        }
    }

    pub fn with_source_filter(mut self, filter: &'a NodeFilter) -> Self {
        self.source_filter = Some(filter);
        self
    }

    pub fn with_target_filter(mut self, filter: &'a NodeFilter) -> Self {
        self.target_filter = Some(filter);
        self
    }

    pub fn with_source_merge_filter(mut self, filter: &'a NodeFilter) -> Self {
        self.source_merge_filter = Some(filter);
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }
}

/// Merges the subtree of `source_node` into the subtree of `target_node`.
///
/// For every child slot, a source child moves into the target if the
/// target slot is free (or `child_policy` is
/// [`TakeOverSource`](MergePolicy::TakeOverSource)) and the child passes
/// the source merge filter. Otherwise, if both children exist and the
/// merge is recursive, the pair is merged in turn. Payloads follow the same
/// rule under `data_policy`.
///
/// A node never ends up with both data and children: a target payload is
/// dropped when children move in, and target children are dropped when a
/// payload moves in. Under [`KeepTarget`](MergePolicy::KeepTarget), a
/// target slot counts as free only if the target node holds neither.
///
/// Returns the number of moved children plus the number of moved payloads.
///
/// Fails with [`VoxelError::Configuration`] if the trees differ in depth or
/// order, and with [`VoxelError::Structural`] if the two nodes do not
/// describe the same voxel.
pub fn merge(
    target: &mut VoxelTree,
    target_node: NodeHandle,
    source: &mut VoxelTree,
    source_node: NodeHandle,
    options: &MergeOptions,
) -> Result<usize> {
    let (tc, sc) = (target.context(), source.context());
    if tc.max_num_levels() != sc.max_num_levels() || tc.order() != sc.order() {
        return Err(VoxelError::Configuration(format!(
            "cannot merge a tree with {} levels of order {} into one with {} levels of order {}",
            sc.max_num_levels(),
            sc.order(),
            tc.max_num_levels(),
            tc.order()
        )));
    }
    let target_id = target.get(target_node)?.id();
    let source_id = source.get(source_node)?.id();
    if target_id != source_id {
        return Err(VoxelError::Structural(format!(
            "cannot merge node {source_id} into node {target_id}"
        )));
    }
    let n = merge_node(target, target_node, source, source_node, options)?;
    debug!("merged {n} children and payloads into {target_id}");
    Ok(n)
}

fn passes(filter: Option<&NodeFilter>, tree: &VoxelTree, h: NodeHandle) -> bool {
    filter.is_none_or(|f| f.accepts(tree, h))
}

fn merge_node(
    target: &mut VoxelTree,
    th: NodeHandle,
    source: &mut VoxelTree,
    sh: NodeHandle,
    options: &MergeOptions,
) -> Result<usize> {
    if !passes(options.source_filter, source, sh) || !passes(options.target_filter, target, th) {
        return Ok(0);
    }
    let take_children = options.child_policy == MergePolicy::TakeOverSource;
    let take_data = options.data_policy == MergePolicy::TakeOverSource;
    let target_has_data = target.data(th).is_some();

    let mut count = 0;
    let mut moving = Vec::new();
    for oi in 0..NUM_CHILD_SLOTS {
        let Some(s_child) = source.child(sh, oi) else {
            continue;
        };
        let t_child = target.child(th, oi);
        let slot_free = t_child.is_none() && !target_has_data;
        if (slot_free || take_children) && passes(options.source_merge_filter, source, s_child) {
            moving.push(oi);
            continue;
        }
        if let Some(t_child) = t_child.filter(|_| options.recursive) {
            count += merge_node(target, t_child, source, s_child, options)?;
        }
    }
    if !moving.is_empty() {
        target.clear_data(th)?;
        for oi in moving {
            let subtree = source
                .detach_child(sh, oi)
                .ok_or_else(|| VoxelError::Structural(format!("source child {oi} vanished during merge")))?;
            target.attach_child(th, oi, subtree)?;
            trace!("moved child {oi} into {}", target.get(th)?.id());
            count += 1;
        }
        if options.fill {
            target.create_children(th)?;
        }
    }

    if source.data(sh).is_some() {
        let slot_free = target.node(th).is_some_and(|n| n.is_leaf() && n.data().is_none());
        if (slot_free || take_data) && passes(options.source_merge_filter, source, sh) {
            if let Some(data) = source.take_data(sh) {
                target.clear(th)?;
                target.set_data(th, data)?;
                trace!("moved payload into {}", target.get(th)?.id());
                count += 1;
            }
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc::NodeLoc3;
    use crate::tree::{NodeData, NodeDataType};
    use crate::Context;
    use std::sync::Arc;

    fn make_tree(levels: usize) -> VoxelTree {
        VoxelTree::new(Arc::new(Context::new(levels, 2, 1.0, 1e-6).unwrap()))
    }

    fn insert(tree: &mut VoxelTree, loc: [u16; 3], depth: usize, data: NodeData) -> NodeHandle {
        let root = tree.root();
        let h = tree
            .insert_child(root, &NodeLoc3::new(loc[0], loc[1], loc[2]), Some(depth), false, false)
            .unwrap()
            .unwrap();
        tree.set_data(h, data).unwrap();
        h
    }

    #[test]
    fn rejects_mismatched_trees() {
        let mut a = make_tree(4);
        let mut b = make_tree(5);
        let (ra, rb) = (a.root(), b.root());
        let r = merge(&mut a, ra, &mut b, rb, &MergeOptions::default());
        assert!(matches!(r, Err(VoxelError::Configuration(_))));

        let mut c = make_tree(4);
        let child = insert(&mut c, [0, 0, 0], 1, NodeData::Null);
        let r = merge(&mut a, ra, &mut c, child, &MergeOptions::default());
        assert!(matches!(r, Err(VoxelError::Structural(_))));
    }

    #[test]
    fn keep_target_fills_free_slots_only() {
        let mut target = make_tree(4);
        let mut source = make_tree(4);
        let kept = insert(&mut target, [0, 0, 0], 2, NodeData::Density(1.0));
        insert(&mut source, [0, 0, 0], 2, NodeData::Density(2.0));
        insert(&mut source, [7, 7, 7], 2, NodeData::Density(3.0));
        let (rt, rs) = (target.root(), source.root());

        let n = merge(&mut target, rt, &mut source, rs, &MergeOptions::new(MergePolicy::KeepTarget)).unwrap();
        assert_eq!(n, 1, "only the far branch moves");
        assert_eq!(target.data(kept), Some(&NodeData::Density(1.0)));
        let moved = target.locate_child(rt, &NodeLoc3::new(7, 7, 7), Some(2)).unwrap();
        assert_eq!(target.data(moved), Some(&NodeData::Density(3.0)));
        assert_eq!(target.parent(target.parent(moved).unwrap()), Some(rt));
        assert!(source.child(rs, 7).is_none(), "moved subtrees leave the source");
    }

    #[test]
    fn take_over_source_replaces_payloads() {
        let mut target = make_tree(4);
        let mut source = make_tree(4);
        let leaf = insert(&mut target, [0, 0, 0], 2, NodeData::Density(1.0));
        insert(&mut source, [0, 0, 0], 2, NodeData::Density(2.0));
        let (rt, rs) = (target.root(), source.root());
        let options = MergeOptions {
            data_policy: MergePolicy::TakeOverSource,
            ..MergeOptions::default()
        };
        let n = merge(&mut target, rt, &mut source, rs, &options).unwrap();
        assert_eq!(n, 1);
        assert_eq!(target.data(leaf), Some(&NodeData::Density(2.0)));
    }

    #[test]
    fn taken_over_children_replace_target_subtrees() {
        let mut target = make_tree(4);
        let mut source = make_tree(4);
        let old = insert(&mut target, [0, 0, 0], 3, NodeData::Density(1.0));
        let src = insert(&mut source, [0, 0, 0], 1, NodeData::Density(2.0));
        let (rt, rs) = (target.root(), source.root());
        let n = merge(&mut target, rt, &mut source, rs, &MergeOptions::new(MergePolicy::TakeOverSource)).unwrap();
        assert_eq!(n, 1);
        assert!(!target.contains(old), "replaced subtree is freed");
        assert!(!source.contains(src), "moved subtree leaves the source");
        let c = target.child(rt, 0).unwrap();
        assert_eq!(target.data(c), Some(&NodeData::Density(2.0)));
        assert_eq!(target.num_nodes(rt, true), 1);
    }

    #[test]
    fn source_merge_filter_limits_moves() {
        let mut target = make_tree(4);
        let mut source = make_tree(4);
        insert(&mut source, [0, 0, 0], 1, NodeData::Density(2.0));
        insert(&mut source, [7, 0, 0], 1, NodeData::Null);
        let (rt, rs) = (target.root(), source.root());
        let only_density = NodeFilter::new().with_data_type(NodeDataType::Density);
        let options = MergeOptions::default().with_source_merge_filter(&only_density);
        let n = merge(&mut target, rt, &mut source, rs, &options).unwrap();
        assert_eq!(n, 1);
        assert_eq!(target.num_nodes(rt, false), 1);
        assert_eq!(source.num_nodes(rs, false), 1);
    }

    #[test]
    fn fill_creates_missing_siblings() {
        let mut target = make_tree(4);
        let mut source = make_tree(4);
        insert(&mut source, [0, 0, 0], 1, NodeData::Density(2.0));
        let (rt, rs) = (target.root(), source.root());
        merge(&mut target, rt, &mut source, rs, &MergeOptions::default().with_fill(true)).unwrap();
        assert_eq!(target.num_nodes(rt, false), 8);
    }

    #[test]
    fn non_recursive_merge_stops_at_the_first_level() {
        let mut target = make_tree(4);
        let mut source = make_tree(4);
        insert(&mut target, [0, 0, 0], 3, NodeData::Density(1.0));
        insert(&mut source, [1, 1, 1], 3, NodeData::Density(2.0));
        let (rt, rs) = (target.root(), source.root());
        let n = merge(&mut target, rt, &mut source, rs, &MergeOptions::default().with_recursive(false)).unwrap();
        assert_eq!(n, 0);
        let n = merge(&mut target, rt, &mut source, rs, &MergeOptions::default()).unwrap();
        assert_eq!(n, 1, "the depth 3 leaf moves into a free slot");
    }

    #[test]
    fn target_filter_blocks_the_pair() {
        let mut target = make_tree(4);
        let mut source = make_tree(4);
        insert(&mut source, [0, 0, 0], 1, NodeData::Density(2.0));
        let (rt, rs) = (target.root(), source.root());
        let deep_only = NodeFilter::new().with_min_depth(1);
        let options = MergeOptions::default().with_target_filter(&deep_only);
        assert_eq!(merge(&mut target, rt, &mut source, rs, &options).unwrap(), 0);
        assert_eq!(target.num_nodes(rt, true), 0);
    }
}

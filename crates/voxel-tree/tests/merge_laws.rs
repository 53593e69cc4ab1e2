use std::sync::Arc;

use voxel_tree::{merge, Context, MergeOptions, MergePolicy, NodeData, NodeLoc3, VoxelClass, VoxelTree};

fn context() -> Arc<Context> {
    Arc::new(Context::new(4, 2, 1.0, 1e-6).unwrap())
}

fn sample_tree() -> VoxelTree {
    let mut tree = VoxelTree::new(context());
    let root = tree.root();
    let a = tree.insert_child(root, &NodeLoc3::new(1, 2, 3), None, false, false).unwrap().unwrap();
    tree.set_data(a, NodeData::Density(0.75)).unwrap();
    let b = tree.insert_child(root, &NodeLoc3::new(6, 6, 0), Some(2), true, false).unwrap().unwrap();
    tree.set_data(b, NodeData::VoxelClass(VoxelClass::FILLED)).unwrap();
    tree.insert_child(root, &NodeLoc3::new(7, 0, 7), Some(1), false, false).unwrap();
    tree
}

fn snapshot(tree: &VoxelTree) -> Vec<(String, u8, Option<NodeData>)> {
    tree.descendants(tree.root())
        .into_iter()
        .map(|h| {
            let node = tree.node(h).unwrap();
            (node.id().to_string(), node.child_mask(), node.data().cloned())
        })
        .collect()
}

#[test]
fn self_merge_under_keep_target_is_a_no_op() {
    let mut target = sample_tree();
    let mut source = target.clone();
    let before = snapshot(&target);
    let (th, sh) = (target.root(), source.root());
    let n = merge(&mut target, th, &mut source, sh, &MergeOptions::new(MergePolicy::KeepTarget)).unwrap();
    assert_eq!(n, 0);
    assert_eq!(snapshot(&target), before);
}

#[test]
fn merging_an_empty_tree_is_a_no_op() {
    let mut target = sample_tree();
    let mut source = VoxelTree::new(context());
    let before = snapshot(&target);
    let (th, sh) = (target.root(), source.root());
    let n = merge(&mut target, th, &mut source, sh, &MergeOptions::new(MergePolicy::KeepTarget)).unwrap();
    assert_eq!(n, 0);
    assert_eq!(snapshot(&target), before);
}

#[test]
fn take_over_into_an_empty_tree_reproduces_the_source() {
    let mut source = sample_tree();
    let expected = snapshot(&source);
    let mut target = VoxelTree::new(context());
    let (th, sh) = (target.root(), source.root());
    let n = merge(&mut target, th, &mut source, sh, &MergeOptions::new(MergePolicy::TakeOverSource)).unwrap();
    assert!(n > 0);
    assert_eq!(snapshot(&target), expected);
    assert_eq!(target.len(), expected.len());
    assert_eq!(source.len(), 1, "moved nodes must leave the source arena");
}

#[test]
fn stale_source_handles_do_not_resolve_after_a_move() {
    let mut source = sample_tree();
    let sh = source.root();
    let moved = source.child(sh, 0).unwrap();
    let mut target = VoxelTree::new(context());
    let th = target.root();
    merge(&mut target, th, &mut source, sh, &MergeOptions::new(MergePolicy::TakeOverSource)).unwrap();
    assert!(source.node(moved).is_none());
    assert!(target.child(th, 0).is_some());
}

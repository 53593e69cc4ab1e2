use std::sync::Arc;

use nalgebra::{Point3, Vector3};
use voxel_tree::codec::{deserialize_hierarchy, serialize_hierarchy};
use voxel_tree::geometry::{Mesh, Ray};
use voxel_tree::processor::{CollectingProcessor, IobEvalProcessor, VoxelizationTarget};
use voxel_tree::query::{classify_iob, intersect_ray, RayOptions};
use voxel_tree::{
    voxelize_mesh, Context, IobData, NodeData, NodeDataType, NodeFilter, Separability, VoxelClass, VoxelTree,
};

const LEVELS: usize = 5;
const DEPTH: usize = LEVELS - 1;

fn voxelized_cube() -> VoxelTree {
    let mut tree = VoxelTree::new(Arc::new(Context::new(LEVELS, 2, 1.0, 1e-6).unwrap()));
    let mesh = Mesh::cuboid(Point3::new(0.3, 0.3, 0.3), Point3::new(0.7, 0.7, 0.7));
    let n = voxelize_mesh(&mut tree, &mesh, Separability::TwentySix, Some(DEPTH), VoxelizationTarget::Class).unwrap();
    assert!(n > 0, "no voxel was filled");
    tree
}

fn class_at(tree: &VoxelTree, p: Point3<f64>) -> VoxelClass {
    let loc = tree.context().create_loc3(&p);
    let h = tree.locate_child(tree.root(), &loc, None).unwrap();
    assert_eq!(tree.node(h).unwrap().depth(), DEPTH);
    tree.voxel_class(h)
}

#[test]
fn voxelize_classify_and_store() {
    let mut tree = voxelized_cube();
    let counts = classify_iob(&mut tree, DEPTH, &IobEvalProcessor::default()).unwrap();
    let num_voxels = 1usize << (3 * DEPTH);
    assert_eq!(counts.inside + counts.outside + counts.boundary, num_voxels);
    assert!(counts.inside > 0 && counts.outside > 0 && counts.boundary > 0, "{counts:?}");

    assert!(class_at(&tree, Point3::new(0.5, 0.5, 0.5)).contains(VoxelClass::INSIDE));
    assert!(class_at(&tree, Point3::new(0.01, 0.01, 0.01)).contains(VoxelClass::OUTSIDE));
    let wall = class_at(&tree, Point3::new(0.29, 0.5, 0.5));
    assert!(wall.contains(VoxelClass::FILLED | VoxelClass::BOUNDARY | VoxelClass::HIT));

    let bytes = serialize_hierarchy(&tree).unwrap();
    let copy = deserialize_hierarchy(&bytes).unwrap();
    assert_eq!(copy.len(), tree.len());
    let filter = NodeFilter::new().with_data_type(NodeDataType::VoxelIob);
    let mut stored = Vec::new();
    copy.find(copy.root(), Some(&filter), true, &mut stored);
    assert_eq!(stored.len(), num_voxels);
    let inside = stored
        .iter()
        .filter(|&&h| {
            let class = copy.voxel_class(h);
            class.contains(VoxelClass::INSIDE) && !class.contains(VoxelClass::BOUNDARY)
        })
        .count();
    assert_eq!(inside, counts.inside);
}

#[test]
fn wall_thickness_is_recorded_on_boundary_voxels() {
    let mut tree = voxelized_cube();
    classify_iob(&mut tree, DEPTH, &IobEvalProcessor::default()).unwrap();
    let loc = tree.context().create_loc3(&Point3::new(0.29, 0.5, 0.5));
    let h = tree.locate_child(tree.root(), &loc, None).unwrap();
    match tree.data(h) {
        Some(NodeData::VoxelIob(iob)) => {
            let (thickness, _) = iob.min_wall_thickness().unwrap();
            assert!(thickness >= 1);
        }
        other => panic!("expected an IOB record, got {other:?}"),
    }
}

#[test]
fn ray_reports_voxels_front_to_back() {
    let mut tree = VoxelTree::new(Arc::new(Context::new(3, 2, 1.0, 1e-6).unwrap()));
    let root = tree.root();
    tree.fill(root, false, true, None).unwrap();
    let ray = Ray::new(Point3::new(-1.0, 0.5, 0.5), Vector3::new(1.0, 0.0, 0.0));
    let filter = NodeFilter::new().with_depth(2);
    let mut collect = CollectingProcessor::new();
    let n = intersect_ray(&mut tree, root, &ray, &mut collect, &RayOptions::default().with_filter(&filter)).unwrap();
    assert!(n >= 4);
    let xs: Vec<f64> = collect
        .hits()
        .iter()
        .map(|hit| tree.voxel_range(hit.node).unwrap().min().x)
        .collect();
    assert!(xs.windows(2).all(|w| w[0] <= w[1]), "x order {xs:?}");
    assert!(collect.hits().windows(2).all(|w| w[0].t_near <= w[1].t_near));
    assert_eq!(xs.first().copied(), Some(0.0));
    assert_eq!(xs.last().copied(), Some(0.75));
}

#[test]
fn vote_ratios_decide_inside_and_outside() {
    let mut tree = VoxelTree::new(Arc::new(Context::new(2, 2, 1.0, 1e-6).unwrap()));
    let root = tree.root();
    tree.create_children(root).unwrap();
    let (a, b) = (tree.child(root, 0).unwrap(), tree.child(root, 1).unwrap());
    let votes = |inside, outside| IobData {
        votes_inside: inside,
        votes_outside: outside,
        ..IobData::default()
    };
    tree.set_data(a, NodeData::VoxelIob(votes(9, 1))).unwrap();
    tree.set_data(b, NodeData::VoxelIob(votes(8, 2))).unwrap();
    let mut evaluator = IobEvalProcessor::default();
    tree.process(root, Some(&mut evaluator), None, None, true).unwrap();
    assert!(tree.voxel_class(a).contains(VoxelClass::INSIDE));
    assert!(tree.voxel_class(b).contains(VoxelClass::OUTSIDE));
    assert!(!tree.voxel_class(b).contains(VoxelClass::INSIDE));
}

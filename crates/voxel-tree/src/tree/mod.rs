//! Voxel tree hierarchy.
//!
//! A [`VoxelTree`] recursively subdivides the cube `[0, scale)³` into eight
//! children per node, down to `max_num_levels - 1` levels below the root.
//! Every node either carries a [`NodeData`] payload or has children, never
//! both.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use voxel_tree::{Context, NodeData, NodeFilter, NodeLoc3, VoxelTree};
//!
//! let mut tree = VoxelTree::new(Arc::new(Context::default()));
//! let root = tree.root();
//! let leaf = tree
//!     .insert_child(root, &NodeLoc3::new(1, 2, 3), None, false, false)?
//!     .unwrap();
//! tree.set_data(leaf, NodeData::Density(1.0))?;
//!
//! let mut found = Vec::new();
//! tree.find(root, Some(&NodeFilter::new().with_depth(9)), true, &mut found);
//! ```
//!
//! # Architecture
//!
//! - [`VoxelTree`]: arena owning all nodes, with the hierarchy operations
//! - [`Node`]: one voxel with its child slots and optional payload
//! - [`NodeHandle`]: generational index of a node in its tree
//! - [`NodeData`]: the tagged payload variants

mod data;
mod node;
mod traverse;
mod tree;

pub use data::{IobData, LeafStatus, NodeData, NodeDataType, VoxelClass};
pub use node::{Node, NodeHandle, NUM_CHILD_SLOTS};
pub use tree::VoxelTree;

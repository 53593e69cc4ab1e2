//! Hierarchical voxel trees.
//!
//! A [`VoxelTree`] partitions a cubic domain into octants down to a fixed
//! number of levels. Every node is addressed by a [`NodeId`], the pair of its
//! depth and the integer location of its lowest corner, relative to a shared
//! [`Context`] that fixes the level count, the world scale and the numeric
//! tolerance.
//!
//! On top of the tree the crate provides
//! - node processors and filters driving depth-first traversals
//!   ([`processor`]),
//! - conservative triangle voxelization ([`voxelize`]),
//! - ray and ray-grid queries with inside/outside classification
//!   ([`query`]),
//! - merging of two trees over the same context ([`merge`]),
//! - a little endian binary encoding ([`codec`]).

mod context;
mod error;
mod loc;

pub mod codec;
pub mod geometry;
pub mod merge;
pub mod processor;
pub mod query;
pub mod tree;
pub mod voxelize;

pub use context::{
    matching_voxel_diagonal, matching_voxel_normal, Context, ContextConfig, SQRT_3, VOXEL_DIAGONALS,
    VOXEL_NORMALS,
};
pub use error::{Result, VoxelError};
pub use loc::{NodeId, NodeLoc, NodeLoc3, Region3};
pub use merge::{merge, MergeOptions, MergePolicy};
pub use processor::{NodeFilter, NodeProcessor, ProcessingResult, VoxelizationTarget};
pub use tree::{IobData, LeafStatus, Node, NodeData, NodeDataType, NodeHandle, VoxelClass, VoxelTree};
pub use voxelize::{voxelize_mesh, Separability};

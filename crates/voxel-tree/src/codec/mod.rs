//! Binary encoding of voxel hierarchies.
//!
//! A stream consists of a header, one fixed-size record per node, one
//! record per payload and a trailing offset map. Records refer to each
//! other through synthetic pointers; the offset map translates every
//! pointer into the byte offset of its record, so decoding never relies on
//! the order in which records were written.
//!
//! All integers are little endian. Every record starts with the file
//! signature `0x5647` ("VG") followed by a 16-bit kind syllable.
//!
//! ```text
//! HEADER      sig, kind, version u16, offset_map_offset u64, node_stride u16,
//!             node_size u16, data_size u16, value_size u8, root_depth u8,
//!             root_pointer u64, max_levels u8, order u8, scale f64,
//!             tolerance f64
//! ROOT / NODE sig, kind, loc x y z u16, depth u8, valid_mask u8,
//!             leaf_mask u8, data_type u8, parent u64, child_block u64,
//!             data u64
//! DATA        sig, kind, type u8, payload
//! OFFSET_MAP  sig, kind, count u64, (pointer u64, offset u64)*
//! ```
//!
//! The children of a node occupy consecutive pointers: the `k`-th present
//! child lives at `child_block + k * node_stride`.
//!
//! # Example
//!
//! ```ignore
//! use voxel_tree::codec::{deserialize_hierarchy, serialize_hierarchy};
//!
//! let bytes = serialize_hierarchy(&tree)?;
//! let copy = deserialize_hierarchy(&bytes)?;
//! ```

mod reader;
mod writer;

pub use reader::{deserialize_hierarchy, read_hierarchy, read_hierarchy_with, DecodeOptions};
pub use writer::{serialize_hierarchy, serialize_node, write_hierarchy};

/// Leading syllable of every record.
pub const SIGNATURE: u16 = 0x5647;
/// Version written into the header. Readers reject any other version.
pub const FORMAT_VERSION: u16 = 1;

/// Kind syllables of the record types.
pub mod magic {
    pub const HEADER: u16 = 0x4845;
    pub const ROOT: u16 = 0x4e52;
    pub const NODE: u16 = 0x4e4f;
    pub const OFFSET_MAP: u16 = 0x4f4d;
    pub const DATA: u16 = 0x4e44;
}

/// Size in bytes of a root or node record.
pub const NODE_RECORD_SIZE: u16 = 4 + 3 * 2 + 4 + 3 * 8;
/// Size in bytes of a data record header.
pub const DATA_RECORD_HEADER_SIZE: u16 = 4 + 1;
/// Size in bytes of an encoded value.
pub const VALUE_SIZE: u8 = 8;

// Byte offset of the offset map field within the header.
const OFFSET_MAP_FIELD: u64 = 6;

// Synthetic pointer spaces. Zero is the null pointer.
const NODE_POINTER_BASE: u64 = 1 << 32;
const DATA_POINTER_BASE: u64 = 1 << 48;

// Face record flags.
const FACE_HAS_COLOR: u8 = 1;
const FACE_HAS_NORMAL: u8 = 2;

// Size of an encoded face without optional attributes.
const FACE_MIN_SIZE: u64 = 9 * 8 + 1;

/// Color index value meaning "unspecified".
const NO_COLOR_INDEX: i16 = -1;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Face, FaceMask};
    use crate::tree::{IobData, NodeData, VoxelClass, VoxelTree};
    use crate::{Context, NodeLoc3, VoxelError};
    use nalgebra::{Point3, Vector3};
    use std::io::Cursor;
    use std::sync::Arc;

    fn make_tree() -> VoxelTree {
        let mut tree = VoxelTree::new(Arc::new(Context::new(5, 2, 2.0, 1e-6).unwrap()));
        let root = tree.root();
        let a = tree.insert_child(root, &NodeLoc3::new(0, 0, 0), Some(2), false, false).unwrap().unwrap();
        tree.set_data(a, NodeData::Density(0.1 + 0.2)).unwrap();
        let b = tree.insert_child(root, &NodeLoc3::new(15, 3, 9), None, true, false).unwrap().unwrap();
        let mut iob = IobData::with_class(VoxelClass::INSIDE | VoxelClass::HIT);
        iob.num_ints0 = 3;
        iob.votes_outside = 7;
        iob.boundary_faces = FaceMask::X1 | FaceMask::Z0;
        iob.wall_thickness = [1, 0, 4];
        iob.color_index = Some(12);
        tree.set_data(b, NodeData::VoxelIob(iob)).unwrap();
        let face = Face::new(Point3::new(0.1, 0.2, 0.3), Point3::new(1.0, 0.2, 0.3), Point3::new(0.1, 1.5, 0.3))
            .with_color([0.5, 0.25, 1.0, 1.0])
            .with_normal(Vector3::new(0.0, 0.0, -1.0));
        let c = tree.insert_child(root, &NodeLoc3::new(8, 8, 8), Some(1), false, false).unwrap().unwrap();
        tree.set_data(c, NodeData::FaceVec(vec![face.clone(), Face::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0))]))
            .unwrap();
        tree
    }

    fn same_shape(a: &VoxelTree, b: &VoxelTree) {
        let na = a.descendants(a.root());
        let nb = b.descendants(b.root());
        assert_eq!(na.len(), nb.len(), "node count differs");
        for (ha, hb) in na.into_iter().zip(nb) {
            let (x, y) = (a.node(ha).unwrap(), b.node(hb).unwrap());
            assert_eq!(x.id(), y.id());
            assert_eq!(x.child_mask(), y.child_mask(), "child mask of {}", x.id());
            assert_eq!(x.data(), y.data(), "data of {}", x.id());
        }
    }

    #[test]
    fn round_trip_mixed_payloads() {
        let tree = make_tree();
        let bytes = serialize_hierarchy(&tree).unwrap();
        let copy = deserialize_hierarchy(&bytes).unwrap();
        same_shape(&tree, &copy);
        assert_eq!(copy.context().config(), tree.context().config());
    }

    #[test]
    fn header_layout() {
        let bytes = serialize_hierarchy(&make_tree()).unwrap();
        assert_eq!(&bytes[0..2], &SIGNATURE.to_le_bytes());
        assert_eq!(&bytes[2..4], &magic::HEADER.to_le_bytes());
        assert_eq!(&bytes[4..6], &FORMAT_VERSION.to_le_bytes());
        let map_offset = u64::from_le_bytes(bytes[6..14].try_into().unwrap()) as usize;
        assert_eq!(&bytes[map_offset + 2..map_offset + 4], &magic::OFFSET_MAP.to_le_bytes());
    }

    #[test]
    fn writer_form_appends_after_existing_bytes() {
        let tree = make_tree();
        let mut cursor = Cursor::new(vec![0xaa; 7]);
        cursor.set_position(7);
        write_hierarchy(&tree, tree.root(), &mut cursor).unwrap();
        cursor.set_position(7);
        let copy = read_hierarchy(&mut cursor).unwrap();
        same_shape(&tree, &copy);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = serialize_hierarchy(&make_tree()).unwrap();
        bytes[4] = 9;
        match deserialize_hierarchy(&bytes) {
            Err(VoxelError::Serialization { offset, reason }) => {
                assert_eq!(offset, 4);
                assert!(reason.contains("version"), "{reason}");
            }
            other => panic!("expected a version error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unexpected_data_record_size() {
        let mut bytes = serialize_hierarchy(&make_tree()).unwrap();
        assert_eq!(&bytes[18..20], &DATA_RECORD_HEADER_SIZE.to_le_bytes());
        bytes[18..20].copy_from_slice(&7u16.to_le_bytes());
        match deserialize_hierarchy(&bytes) {
            Err(VoxelError::Serialization { offset, reason }) => {
                assert_eq!(offset, 18);
                assert!(reason.contains("data record size"), "{reason}");
            }
            other => panic!("expected a data record size error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = serialize_hierarchy(&make_tree()).unwrap();
        bytes[0] ^= 0xff;
        assert!(matches!(
            deserialize_hierarchy(&bytes),
            Err(VoxelError::Serialization { offset: 0, .. })
        ));
    }

    #[test]
    fn every_truncation_fails() {
        let bytes = serialize_hierarchy(&make_tree()).unwrap();
        for len in 0..bytes.len() {
            let r = deserialize_hierarchy(&bytes[..len]);
            assert!(
                matches!(r, Err(VoxelError::Serialization { .. })),
                "truncation to {len} bytes was accepted"
            );
        }
    }

    #[test]
    fn skipping_data_keeps_structure() {
        let tree = make_tree();
        let bytes = serialize_hierarchy(&tree).unwrap();
        let options = DecodeOptions {
            with_data: false,
            max_depth: None,
        };
        let copy = read_hierarchy_with(&mut Cursor::new(bytes), &options).unwrap();
        assert_eq!(copy.len(), tree.len());
        assert!(copy.descendants(copy.root()).iter().all(|&h| copy.data(h).is_none()));
    }

    #[test]
    fn max_depth_limits_decoding() {
        let tree = make_tree();
        let bytes = serialize_hierarchy(&tree).unwrap();
        let options = DecodeOptions {
            with_data: true,
            max_depth: Some(1),
        };
        let copy = read_hierarchy_with(&mut Cursor::new(bytes), &options).unwrap();
        assert_eq!(copy.max_depth(copy.root()), 1);
    }

    #[test]
    fn subtree_round_trip() {
        let tree = make_tree();
        let root = tree.root();
        let sub = tree.child(root, 7).unwrap();
        let bytes = serialize_node(&tree, sub).unwrap();
        let copy = deserialize_hierarchy(&bytes).unwrap();
        let copy_root = copy.node(copy.root()).unwrap();
        assert_eq!(copy_root.id(), tree.node(sub).unwrap().id());
        assert_eq!(copy.data(copy.root()), tree.data(sub));
    }
}

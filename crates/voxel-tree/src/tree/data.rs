//! Data payloads attached to leaf nodes.

use bitflags::bitflags;

use crate::geometry::{Axis, Face, FaceMask};

bitflags! {
    /// Voxel classification bits.
    ///
    /// The empty set is the undefined class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VoxelClass: u8 {
        const EMPTY = 1;
        const FILLED = 2;
        const INSIDE = 4;
        const OUTSIDE = 8;
        const BOUNDARY = 16;
        const HIT = 32;
    }
}

impl VoxelClass {
    /// The undefined class (no bits set).
    pub const UNDEFINED: VoxelClass = VoxelClass::empty();

    /// Enables or disables the bits of `class`.
    #[inline]
    pub fn apply(&mut self, class: VoxelClass, enable: bool) {
        self.set(class, enable);
    }

    /// Returns `true` if any bit of `mask` is set.
    #[inline]
    pub fn matches(self, mask: VoxelClass) -> bool {
        self.intersects(mask)
    }
}

/// Leaf status criterion used by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LeafStatus {
    #[default]
    Any,
    Leaf,
    NonLeaf,
}

/// Type tag of a [`NodeData`] payload.
///
/// The discriminants are the tags used by the binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeDataType {
    /// Matches nothing in particular; used as a wildcard by filters.
    Unknown = 0,
    Null = 1,
    Density = 2,
    ColorRgba = 3,
    Distance8 = 4,
    ColorNormal = 5,
    FaceVec = 6,
    VoxelClass = 7,
    VoxelIob = 8,
    /// Matches any payload except `Null`.
    AnyNotNull = 100,
}

impl NodeDataType {
    /// Decodes a type tag of the binary format.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => NodeDataType::Unknown,
            1 => NodeDataType::Null,
            2 => NodeDataType::Density,
            3 => NodeDataType::ColorRgba,
            4 => NodeDataType::Distance8,
            5 => NodeDataType::ColorNormal,
            6 => NodeDataType::FaceVec,
            7 => NodeDataType::VoxelClass,
            8 => NodeDataType::VoxelIob,
            100 => NodeDataType::AnyNotNull,
            _ => return None,
        })
    }

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Number of `f64` values carried by payloads of this type, if the
    /// payload is a plain value array.
    pub fn num_values(self) -> Option<usize> {
        match self {
            NodeDataType::Null => Some(0),
            NodeDataType::Density => Some(1),
            NodeDataType::ColorRgba => Some(4),
            NodeDataType::Distance8 => Some(8),
            NodeDataType::ColorNormal => Some(7),
            _ => None,
        }
    }

    /// Returns `true` if a payload of type `actual` satisfies this criterion.
    pub fn accepts(self, actual: NodeDataType) -> bool {
        match self {
            NodeDataType::Unknown => true,
            NodeDataType::AnyNotNull => actual != NodeDataType::Null,
            t => t == actual,
        }
    }
}

/// Inside/outside/boundary classification record of a voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IobData {
    pub voxel_class: VoxelClass,
    /// Number of ray intersections recorded in forward direction.
    pub num_ints0: u16,
    /// Number of ray intersections recorded in backward direction.
    pub num_ints1: u16,
    pub votes_inside: u16,
    pub votes_outside: u16,
    pub boundary_faces: FaceMask,
    /// Wall thickness per axis, in leaf voxel units. Zero means unknown.
    pub wall_thickness: [u16; 3],
    pub color_index: Option<u16>,
}

impl IobData {
    pub fn with_class(voxel_class: VoxelClass) -> Self {
        Self {
            voxel_class,
            ..Self::default()
        }
    }

    #[inline]
    pub fn wall_thickness(&self, axis: Axis) -> u16 {
        self.wall_thickness[axis.index()]
    }

    /// Returns the smallest positive wall thickness and its axis.
    pub fn min_wall_thickness(&self) -> Option<(u16, Axis)> {
        Axis::ALL
            .iter()
            .map(|&a| (self.wall_thickness(a), a))
            .filter(|(t, _)| *t > 0)
            .min_by_key(|(t, _)| *t)
    }
}

/// The payload of a leaf node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Null,
    Density(f64),
    ColorRgba([f64; 4]),
    Distance8([f64; 8]),
    ColorNormal { color: [f64; 4], normal: [f64; 3] },
    FaceVec(Vec<Face>),
    VoxelClass(VoxelClass),
    VoxelIob(IobData),
}

impl NodeData {
    /// Density of an empty voxel.
    pub const DENSITY_EMPTY: f64 = 0.0;
    /// Density of a filled voxel.
    pub const DENSITY_FILLED: f64 = 1.0;

    /// Returns the type tag of this payload.
    pub fn data_type(&self) -> NodeDataType {
        match self {
            NodeData::Null => NodeDataType::Null,
            NodeData::Density(_) => NodeDataType::Density,
            NodeData::ColorRgba(_) => NodeDataType::ColorRgba,
            NodeData::Distance8(_) => NodeDataType::Distance8,
            NodeData::ColorNormal { .. } => NodeDataType::ColorNormal,
            NodeData::FaceVec(_) => NodeDataType::FaceVec,
            NodeData::VoxelClass(_) => NodeDataType::VoxelClass,
            NodeData::VoxelIob(_) => NodeDataType::VoxelIob,
        }
    }

    /// Creates the default payload of a type.
    ///
    /// Returns `None` for the wildcard types.
    pub fn default_for(data_type: NodeDataType) -> Option<Self> {
        Some(match data_type {
            NodeDataType::Null => NodeData::Null,
            NodeDataType::Density => NodeData::Density(Self::DENSITY_EMPTY),
            NodeDataType::ColorRgba => NodeData::ColorRgba([0.0; 4]),
            NodeDataType::Distance8 => NodeData::Distance8([0.0; 8]),
            NodeDataType::ColorNormal => NodeData::ColorNormal {
                color: [0.0; 4],
                normal: [0.0; 3],
            },
            NodeDataType::FaceVec => NodeData::FaceVec(Vec::new()),
            NodeDataType::VoxelClass => NodeData::VoxelClass(VoxelClass::UNDEFINED),
            NodeDataType::VoxelIob => NodeData::VoxelIob(IobData::default()),
            NodeDataType::Unknown | NodeDataType::AnyNotNull => return None,
        })
    }

    /// Returns the voxel class carried by class or IOB payloads.
    pub fn voxel_class(&self) -> Option<VoxelClass> {
        match self {
            NodeData::VoxelClass(c) => Some(*c),
            NodeData::VoxelIob(d) => Some(d.voxel_class),
            _ => None,
        }
    }

    /// Returns the plain value array of value payloads.
    pub fn values(&self) -> Option<Vec<f64>> {
        match self {
            NodeData::Null => Some(Vec::new()),
            NodeData::Density(v) => Some(vec![*v]),
            NodeData::ColorRgba(c) => Some(c.to_vec()),
            NodeData::Distance8(d) => Some(d.to_vec()),
            NodeData::ColorNormal { color, normal } => {
                let mut v = color.to_vec();
                v.extend_from_slice(normal);
                Some(v)
            }
            _ => None,
        }
    }

    /// Rebuilds a value payload from its type and value array.
    pub fn from_values(data_type: NodeDataType, values: &[f64]) -> Option<Self> {
        if data_type.num_values()? != values.len() {
            return None;
        }
        let arr4 = |v: &[f64]| [v[0], v[1], v[2], v[3]];
        Some(match data_type {
            NodeDataType::Null => NodeData::Null,
            NodeDataType::Density => NodeData::Density(values[0]),
            NodeDataType::ColorRgba => NodeData::ColorRgba(arr4(values)),
            NodeDataType::Distance8 => {
                let mut d = [0.0; 8];
                d.copy_from_slice(values);
                NodeData::Distance8(d)
            }
            NodeDataType::ColorNormal => NodeData::ColorNormal {
                color: arr4(values),
                normal: [values[4], values[5], values[6]],
            },
            _ => return None,
        })
    }
}

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use byteorder::LittleEndian as Endianness;
use byteorder::ReadBytesExt;
use log::{debug, trace};
use nalgebra::{Point3, Vector3};

use crate::context::Context;
use crate::geometry::{Face, FaceMask};
use crate::loc::{NodeId, NodeLoc3};
use crate::tree::{IobData, NodeData, NodeDataType, VoxelClass, VoxelTree};
use crate::{Result, VoxelError};

use super::{
    magic, DATA_RECORD_HEADER_SIZE, FACE_HAS_COLOR, FACE_HAS_NORMAL, FACE_MIN_SIZE, FORMAT_VERSION,
    NODE_RECORD_SIZE, NO_COLOR_INDEX, SIGNATURE, VALUE_SIZE,
};

/// What to decode from a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Decode payloads. Without it only the structure is rebuilt.
    pub with_data: bool,
    /// Skip nodes deeper than this depth.
    pub max_depth: Option<usize>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            with_data: true,
            max_depth: None,
        }
    }
}

/// Decodes a tree from a byte slice.
pub fn deserialize_hierarchy(bytes: &[u8]) -> Result<VoxelTree> {
    read_hierarchy(&mut Cursor::new(bytes))
}

/// Decodes a tree starting at the current position of `source`.
pub fn read_hierarchy<R: Read + Seek>(source: &mut R) -> Result<VoxelTree> {
    read_hierarchy_with(source, &DecodeOptions::default())
}

/// Decodes a tree starting at the current position of `source`, with
/// explicit options.
///
/// Every failure is reported as [`VoxelError::Serialization`] carrying the
/// byte offset, relative to the start position, of the offending field.
pub fn read_hierarchy_with<R: Read + Seek>(source: &mut R, options: &DecodeOptions) -> Result<VoxelTree> {
    let mut r = RecordReader::new(source)?;
    let header = r.header()?;
    let offsets = r.offset_map(header.map_offset)?;
    let context = header.context;

    let resolve = |pointer: u64, at: u64| -> Result<u64> {
        offsets
            .get(&pointer)
            .copied()
            .ok_or_else(|| VoxelError::serialization(at, format!("unresolved pointer {pointer:#x}")))
    };

    let root_offset = resolve(header.root_pointer, header.root_pointer_offset)?;
    let root = r.node(root_offset, magic::ROOT)?;
    if root.id.depth() != header.root_depth {
        return Err(VoxelError::serialization(
            root_offset,
            format!("root record has depth {}, header says {}", root.id.depth(), header.root_depth),
        ));
    }
    let root_id = context
        .node_id(&root.id.loc, root.id.depth())
        .map_err(|e| VoxelError::serialization(root_offset, e.to_string()))?;
    if root_id != root.id {
        return Err(VoxelError::serialization(root_offset, format!("root location {} is not aligned", root.id.loc)));
    }
    let mut tree = VoxelTree::with_root(Arc::new(context), root_id)?;

    let mut visited = HashSet::from([header.root_pointer]);
    let mut queue = VecDeque::from([(tree.root(), header.root_pointer, root)]);
    while let Some((h, pointer, record)) = queue.pop_front() {
        if record.data_pointer != 0 {
            if record.valid_mask != 0 {
                return Err(VoxelError::serialization(record.offset, "node holds both data and children"));
            }
            if options.with_data {
                let offset = resolve(record.data_pointer, record.offset + DATA_POINTER_FIELD)?;
                let data = r.data(offset)?;
                if data.data_type().tag() != record.data_type {
                    return Err(VoxelError::serialization(
                        offset,
                        format!("data of type {:?} for a node tagged {}", data.data_type(), record.data_type),
                    ));
                }
                tree.set_data(h, data)?;
            }
        } else if record.data_type != NodeDataType::Unknown.tag() {
            return Err(VoxelError::serialization(record.offset, "data type without a data record"));
        }

        if options.max_depth.is_some_and(|m| record.id.depth() >= m) {
            continue;
        }
        let mut k = 0u64;
        for oi in 0..8usize {
            if record.valid_mask & (1 << oi) == 0 {
                continue;
            }
            let child_pointer = record
                .child_block
                .checked_add(k * u64::from(header.node_stride))
                .ok_or_else(|| VoxelError::serialization(record.offset, "child pointer overflow"))?;
            k += 1;
            if !visited.insert(child_pointer) {
                return Err(VoxelError::serialization(
                    record.offset,
                    format!("pointer {child_pointer:#x} referenced twice"),
                ));
            }
            let offset = resolve(child_pointer, record.offset + CHILD_BLOCK_FIELD)?;
            let child = r.node(offset, magic::NODE)?;
            let expected = tree.context().child_id(&record.id, oi).ok_or_else(|| {
                VoxelError::serialization(record.offset, format!("node {} cannot have children", record.id))
            })?;
            if child.id != expected {
                return Err(VoxelError::serialization(
                    offset,
                    format!("found node {} where {expected} was expected", child.id),
                ));
            }
            if child.parent != 0 && child.parent != pointer {
                return Err(VoxelError::serialization(offset, "parent pointer does not match"));
            }
            let is_leaf = child.valid_mask == 0;
            if (record.leaf_mask & (1 << oi) != 0) != is_leaf {
                return Err(VoxelError::serialization(record.offset, format!("leaf mask disagrees for child {oi}")));
            }
            let c = tree.child_or_create(h, oi)?;
            trace!("decoded node {} at offset {offset}", child.id);
            queue.push_back((c, child_pointer, child));
        }
    }
    debug!("decoded {} nodes", tree.len());
    Ok(tree)
}

// Field offsets within a node record, used to locate pointer errors.
const CHILD_BLOCK_FIELD: u64 = 4 + 6 + 4 + 8;
const DATA_POINTER_FIELD: u64 = CHILD_BLOCK_FIELD + 8;

struct Header {
    map_offset: u64,
    node_stride: u16,
    root_depth: usize,
    root_pointer: u64,
    root_pointer_offset: u64,
    context: Context,
}

struct NodeRecord {
    offset: u64,
    id: NodeId,
    valid_mask: u8,
    leaf_mask: u8,
    data_type: u8,
    parent: u64,
    child_block: u64,
    data_pointer: u64,
}

/// Position tracking reader. Offsets are relative to the start position.
struct RecordReader<'a, R> {
    inner: &'a mut R,
    base: u64,
    len: u64,
    pos: u64,
}

impl<'a, R: Read + Seek> RecordReader<'a, R> {
    fn new(inner: &'a mut R) -> Result<Self> {
        let base = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(base))?;
        Ok(Self {
            inner,
            base,
            len: end.saturating_sub(base),
            pos: 0,
        })
    }

    fn fail(&self, reason: impl Into<String>) -> VoxelError {
        VoxelError::serialization(self.pos, reason)
    }

    fn read<T>(&mut self, size: u64, f: impl FnOnce(&mut R) -> io::Result<T>) -> Result<T> {
        if self.pos + size > self.len {
            return Err(self.fail(format!("truncated input, needed {size} bytes")));
        }
        let v = f(&mut *self.inner).map_err(|e| self.fail(e.to_string()))?;
        self.pos += size;
        Ok(v)
    }

    fn u8(&mut self) -> Result<u8> {
        self.read(1, |r| r.read_u8())
    }

    fn u16(&mut self) -> Result<u16> {
        self.read(2, |r| r.read_u16::<Endianness>())
    }

    fn i16(&mut self) -> Result<i16> {
        self.read(2, |r| r.read_i16::<Endianness>())
    }

    fn u32(&mut self) -> Result<u32> {
        self.read(4, |r| r.read_u32::<Endianness>())
    }

    fn u64(&mut self) -> Result<u64> {
        self.read(8, |r| r.read_u64::<Endianness>())
    }

    fn f64(&mut self) -> Result<f64> {
        self.read(8, |r| r.read_f64::<Endianness>())
    }

    fn f64s<const N: usize>(&mut self) -> Result<[f64; N]> {
        let mut out = [0.0; N];
        for v in &mut out {
            *v = self.f64()?;
        }
        Ok(out)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        if offset >= self.len {
            return Err(self.fail(format!("offset {offset} lies beyond the end of the input")));
        }
        self.inner
            .seek(SeekFrom::Start(self.base + offset))
            .map_err(|e| VoxelError::serialization(offset, e.to_string()))?;
        self.pos = offset;
        Ok(())
    }

    fn magic(&mut self, kind: u16) -> Result<()> {
        let at = self.pos;
        let signature = self.u16()?;
        if signature != SIGNATURE {
            return Err(VoxelError::serialization(at, format!("bad signature {signature:#06x}")));
        }
        let found = self.u16()?;
        if found != kind {
            return Err(VoxelError::serialization(
                at + 2,
                format!("expected record kind {kind:#06x}, found {found:#06x}"),
            ));
        }
        Ok(())
    }

    fn header(&mut self) -> Result<Header> {
        self.magic(magic::HEADER)?;
        let at = self.pos;
        let version = self.u16()?;
        if version != FORMAT_VERSION {
            return Err(VoxelError::serialization(at, format!("unsupported format version {version}")));
        }
        let map_offset = self.u64()?;
        let at = self.pos;
        let node_stride = self.u16()?;
        if node_stride < NODE_RECORD_SIZE {
            return Err(VoxelError::serialization(at, format!("node stride {node_stride} is too small")));
        }
        let at = self.pos;
        let node_size = self.u16()?;
        if node_size != NODE_RECORD_SIZE {
            return Err(VoxelError::serialization(at, format!("unexpected node record size {node_size}")));
        }
        let at = self.pos;
        let data_size = self.u16()?;
        if data_size != DATA_RECORD_HEADER_SIZE {
            return Err(VoxelError::serialization(at, format!("unexpected data record size {data_size}")));
        }
        let at = self.pos;
        let value_size = self.u8()?;
        if value_size != VALUE_SIZE {
            return Err(VoxelError::serialization(at, format!("unexpected value size {value_size}")));
        }
        let root_depth = usize::from(self.u8()?);
        let root_pointer_offset = self.pos;
        let root_pointer = self.u64()?;
        let at = self.pos;
        let max_levels = usize::from(self.u8()?);
        let order = usize::from(self.u8()?);
        let scale = self.f64()?;
        let tolerance = self.f64()?;
        let context = Context::new(max_levels, order, scale, tolerance)
            .map_err(|e| VoxelError::serialization(at, e.to_string()))?;
        if root_depth >= max_levels {
            return Err(VoxelError::serialization(
                root_pointer_offset - 1,
                format!("root depth {root_depth} exceeds {max_levels} levels"),
            ));
        }
        Ok(Header {
            map_offset,
            node_stride,
            root_depth,
            root_pointer,
            root_pointer_offset,
            context,
        })
    }

    fn offset_map(&mut self, offset: u64) -> Result<HashMap<u64, u64>> {
        self.seek(offset)?;
        self.magic(magic::OFFSET_MAP)?;
        let at = self.pos;
        let count = self.u64()?;
        if count.saturating_mul(16) > self.len - self.pos {
            return Err(VoxelError::serialization(at, format!("offset map claims {count} entries")));
        }
        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let at = self.pos;
            let pointer = self.u64()?;
            let target = self.u64()?;
            if pointer == 0 || map.insert(pointer, target).is_some() {
                return Err(VoxelError::serialization(at, format!("invalid offset map entry {pointer:#x}")));
            }
        }
        Ok(map)
    }

    fn node(&mut self, offset: u64, kind: u16) -> Result<NodeRecord> {
        self.seek(offset)?;
        self.magic(kind)?;
        let loc = NodeLoc3::new(self.u16()?, self.u16()?, self.u16()?);
        let depth = self.u8()?;
        let valid_mask = self.u8()?;
        let leaf_mask = self.u8()?;
        let data_type = self.u8()?;
        Ok(NodeRecord {
            offset,
            id: NodeId::new(depth, loc),
            valid_mask,
            leaf_mask,
            data_type,
            parent: self.u64()?,
            child_block: self.u64()?,
            data_pointer: self.u64()?,
        })
    }

    fn data(&mut self, offset: u64) -> Result<NodeData> {
        self.seek(offset)?;
        self.magic(magic::DATA)?;
        let at = self.pos;
        let tag = self.u8()?;
        let data_type = NodeDataType::from_tag(tag)
            .filter(|t| !matches!(t, NodeDataType::Unknown | NodeDataType::AnyNotNull))
            .ok_or_else(|| VoxelError::serialization(at, format!("unknown data type {tag}")))?;
        Ok(match data_type {
            NodeDataType::FaceVec => {
                let at = self.pos;
                let count = self.u32()?;
                if u64::from(count).saturating_mul(FACE_MIN_SIZE) > self.len - self.pos {
                    return Err(VoxelError::serialization(at, format!("face list claims {count} faces")));
                }
                let mut faces = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    faces.push(self.face()?);
                }
                NodeData::FaceVec(faces)
            }
            NodeDataType::VoxelClass => NodeData::VoxelClass(self.voxel_class()?),
            NodeDataType::VoxelIob => NodeData::VoxelIob(self.iob()?),
            t => {
                let n = t.num_values().unwrap_or(0);
                let mut values = Vec::with_capacity(n);
                for _ in 0..n {
                    values.push(self.f64()?);
                }
                NodeData::from_values(t, &values)
                    .ok_or_else(|| VoxelError::serialization(at, format!("cannot decode {t:?} values")))?
            }
        })
    }

    fn face(&mut self) -> Result<Face> {
        let [ax, ay, az, bx, by, bz, cx, cy, cz] = self.f64s::<9>()?;
        let mut face = Face::new(Point3::new(ax, ay, az), Point3::new(bx, by, bz), Point3::new(cx, cy, cz));
        let at = self.pos;
        let flags = self.u8()?;
        if flags & !(FACE_HAS_COLOR | FACE_HAS_NORMAL) != 0 {
            return Err(VoxelError::serialization(at, format!("unknown face flags {flags:#04x}")));
        }
        if flags & FACE_HAS_COLOR != 0 {
            face = face.with_color(self.f64s::<4>()?);
        }
        if flags & FACE_HAS_NORMAL != 0 {
            let [x, y, z] = self.f64s::<3>()?;
            face = face.with_normal(Vector3::new(x, y, z));
        }
        Ok(face)
    }

    fn voxel_class(&mut self) -> Result<VoxelClass> {
        let at = self.pos;
        let bits = self.u8()?;
        VoxelClass::from_bits(bits).ok_or_else(|| VoxelError::serialization(at, format!("invalid voxel class {bits:#04x}")))
    }

    fn iob(&mut self) -> Result<IobData> {
        let voxel_class = self.voxel_class()?;
        let num_ints0 = self.u16()?;
        let num_ints1 = self.u16()?;
        let votes_inside = self.u16()?;
        let votes_outside = self.u16()?;
        let at = self.pos;
        let faces = self.u8()?;
        let boundary_faces = FaceMask::from_bits(faces)
            .ok_or_else(|| VoxelError::serialization(at, format!("invalid face mask {faces:#04x}")))?;
        let wall_thickness = [self.u16()?, self.u16()?, self.u16()?];
        let at = self.pos;
        let color_index = match self.i16()? {
            NO_COLOR_INDEX => None,
            ci => Some(u16::try_from(ci).map_err(|_| VoxelError::serialization(at, format!("invalid color index {ci}")))?),
        };
        Ok(IobData {
            voxel_class,
            num_ints0,
            num_ints1,
            votes_inside,
            votes_outside,
            boundary_faces,
            wall_thickness,
            color_index,
        })
    }
}

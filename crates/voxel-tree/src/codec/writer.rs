use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::LittleEndian as Endianness;
use byteorder::WriteBytesExt;
use log::{debug, trace};

use crate::geometry::Face;
use crate::tree::{IobData, NodeData, NodeHandle, VoxelTree};
use crate::{Result, VoxelError};

use super::{
    magic, DATA_POINTER_BASE, DATA_RECORD_HEADER_SIZE, FACE_HAS_COLOR, FACE_HAS_NORMAL, FORMAT_VERSION,
    NODE_POINTER_BASE, NODE_RECORD_SIZE, NO_COLOR_INDEX, OFFSET_MAP_FIELD, SIGNATURE, VALUE_SIZE,
};

/// Encodes the whole tree.
pub fn serialize_hierarchy(tree: &VoxelTree) -> Result<Vec<u8>> {
    serialize_node(tree, tree.root())
}

/// Encodes the subtree of `h`. The decoded tree is rooted at the voxel of
/// `h`.
pub fn serialize_node(tree: &VoxelTree, h: NodeHandle) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    write_hierarchy(tree, h, &mut out)?;
    Ok(out.into_inner())
}

/// Writes the subtree of `h` at the current position of `out`.
///
/// Offsets in the stream are relative to that position. Returns the number
/// of bytes written; `out` is left positioned after the last byte.
pub fn write_hierarchy<W: Write + Seek>(tree: &VoxelTree, h: NodeHandle, out: &mut W) -> Result<u64> {
    let base = out.stream_position()?;
    let layout = Layout::new(tree, h)?;
    let mut w = RecordWriter {
        out,
        base,
        offsets: Vec::with_capacity(layout.order.len() * 2),
    };
    w.header(tree, h)?;
    for (i, &node) in layout.order.iter().enumerate() {
        w.node(tree, &layout, i, node)?;
    }
    let map_offset = w.position()?;
    w.offset_map()?;
    let end = w.out.stream_position()?;
    w.out.seek(SeekFrom::Start(base + OFFSET_MAP_FIELD))?;
    w.out.write_u64::<Endianness>(map_offset)?;
    w.out.seek(SeekFrom::Start(end))?;
    let written = end - base;
    debug!("encoded {} nodes in {written} bytes", layout.order.len());
    Ok(written)
}

/// Breadth-first node order and pointer assignment of one encoding session.
struct Layout {
    order: Vec<NodeHandle>,
    index: HashMap<NodeHandle, usize>,
    data_pointers: Vec<u64>,
}

impl Layout {
    fn new(tree: &VoxelTree, h: NodeHandle) -> Result<Self> {
        tree.get(h)?;
        let mut order = Vec::new();
        let mut queue = VecDeque::from([h]);
        while let Some(cur) = queue.pop_front() {
            order.push(cur);
            if let Some(node) = tree.node(cur) {
                queue.extend(node.children().map(|(_, c)| c));
            }
        }
        let index = order.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        let mut next_data = DATA_POINTER_BASE;
        let data_pointers = order
            .iter()
            .map(|&n| match tree.data(n) {
                Some(_) => {
                    next_data += 1;
                    next_data - 1
                }
                None => 0,
            })
            .collect();
        Ok(Self {
            order,
            index,
            data_pointers,
        })
    }

    fn pointer(&self, h: NodeHandle) -> u64 {
        self.index
            .get(&h)
            .map_or(0, |&i| NODE_POINTER_BASE + i as u64 * u64::from(NODE_RECORD_SIZE))
    }
}

struct RecordWriter<'a, W> {
    out: &'a mut W,
    base: u64,
    offsets: Vec<(u64, u64)>,
}

impl<W: Write + Seek> RecordWriter<'_, W> {
    fn position(&mut self) -> Result<u64> {
        Ok(self.out.stream_position()? - self.base)
    }

    fn magic(&mut self, kind: u16) -> Result<()> {
        self.out.write_u16::<Endianness>(SIGNATURE)?;
        self.out.write_u16::<Endianness>(kind)?;
        Ok(())
    }

    fn header(&mut self, tree: &VoxelTree, h: NodeHandle) -> Result<()> {
        let context = tree.context();
        let root_depth = tree.get(h)?.depth();
        self.magic(magic::HEADER)?;
        self.out.write_u16::<Endianness>(FORMAT_VERSION)?;
        // Backpatched once the offset map is written.
        self.out.write_u64::<Endianness>(0)?;
        self.out.write_u16::<Endianness>(NODE_RECORD_SIZE)?;
        self.out.write_u16::<Endianness>(NODE_RECORD_SIZE)?;
        self.out.write_u16::<Endianness>(DATA_RECORD_HEADER_SIZE)?;
        self.out.write_u8(VALUE_SIZE)?;
        self.out.write_u8(narrow(root_depth, "root depth")?)?;
        self.out.write_u64::<Endianness>(NODE_POINTER_BASE)?;
        self.out.write_u8(narrow(context.max_num_levels(), "level count")?)?;
        self.out.write_u8(narrow(context.order(), "order")?)?;
        self.out.write_f64::<Endianness>(context.scale())?;
        self.out.write_f64::<Endianness>(context.tolerance())?;
        Ok(())
    }

    fn node(&mut self, tree: &VoxelTree, layout: &Layout, i: usize, h: NodeHandle) -> Result<()> {
        let node = tree.get(h)?;
        let pointer = layout.pointer(h);
        let offset = self.position()?;
        self.offsets.push((pointer, offset));

        let mut leaf_mask = 0u8;
        for (oi, c) in node.children() {
            if tree.node(c).is_some_and(|n| n.is_leaf()) {
                leaf_mask |= 1 << oi;
            }
        }
        let child_block = node.children().next().map_or(0, |(_, c)| layout.pointer(c));
        let parent = if i == 0 { 0 } else { node.parent().map_or(0, |p| layout.pointer(p)) };
        let data_pointer = layout.data_pointers[i];

        self.magic(if i == 0 { magic::ROOT } else { magic::NODE })?;
        let loc = node.loc();
        self.out.write_u16::<Endianness>(loc.x)?;
        self.out.write_u16::<Endianness>(loc.y)?;
        self.out.write_u16::<Endianness>(loc.z)?;
        self.out.write_u8(narrow(node.depth(), "depth")?)?;
        self.out.write_u8(node.child_mask())?;
        self.out.write_u8(leaf_mask)?;
        self.out.write_u8(node.data_type().map_or(0, |t| t.tag()))?;
        self.out.write_u64::<Endianness>(parent)?;
        self.out.write_u64::<Endianness>(child_block)?;
        self.out.write_u64::<Endianness>(data_pointer)?;
        trace!("node {} at offset {offset}", node.id());

        if let Some(data) = node.data() {
            let offset = self.position()?;
            self.offsets.push((data_pointer, offset));
            self.data(data)?;
        }
        Ok(())
    }

    fn data(&mut self, data: &NodeData) -> Result<()> {
        self.magic(magic::DATA)?;
        self.out.write_u8(data.data_type().tag())?;
        match data {
            NodeData::FaceVec(faces) => {
                let count = u32::try_from(faces.len())
                    .map_err(|_| VoxelError::serialization(0, format!("{} faces exceed the format", faces.len())))?;
                self.out.write_u32::<Endianness>(count)?;
                for face in faces {
                    self.face(face)?;
                }
            }
            NodeData::VoxelClass(class) => self.out.write_u8(class.bits())?,
            NodeData::VoxelIob(iob) => self.iob(iob)?,
            other => {
                for v in other.values().unwrap_or_default() {
                    self.out.write_f64::<Endianness>(v)?;
                }
            }
        }
        Ok(())
    }

    fn face(&mut self, face: &Face) -> Result<()> {
        for v in face.vertices() {
            for c in v.coords.iter() {
                self.out.write_f64::<Endianness>(*c)?;
            }
        }
        let mut flags = 0;
        if face.color().is_some() {
            flags |= FACE_HAS_COLOR;
        }
        if face.explicit_normal().is_some() {
            flags |= FACE_HAS_NORMAL;
        }
        self.out.write_u8(flags)?;
        if let Some(color) = face.color() {
            for c in color {
                self.out.write_f64::<Endianness>(c)?;
            }
        }
        if let Some(n) = face.explicit_normal() {
            for c in n.iter() {
                self.out.write_f64::<Endianness>(*c)?;
            }
        }
        Ok(())
    }

    fn iob(&mut self, iob: &IobData) -> Result<()> {
        self.out.write_u8(iob.voxel_class.bits())?;
        self.out.write_u16::<Endianness>(iob.num_ints0)?;
        self.out.write_u16::<Endianness>(iob.num_ints1)?;
        self.out.write_u16::<Endianness>(iob.votes_inside)?;
        self.out.write_u16::<Endianness>(iob.votes_outside)?;
        self.out.write_u8(iob.boundary_faces.bits())?;
        for t in iob.wall_thickness {
            self.out.write_u16::<Endianness>(t)?;
        }
        let color_index = match iob.color_index {
            Some(ci) => i16::try_from(ci)
                .map_err(|_| VoxelError::serialization(0, format!("color index {ci} exceeds the format")))?,
            None => NO_COLOR_INDEX,
        };
        self.out.write_i16::<Endianness>(color_index)?;
        Ok(())
    }

    fn offset_map(&mut self) -> Result<()> {
        self.magic(magic::OFFSET_MAP)?;
        self.out.write_u64::<Endianness>(self.offsets.len() as u64)?;
        for &(pointer, offset) in &self.offsets {
            self.out.write_u64::<Endianness>(pointer)?;
            self.out.write_u64::<Endianness>(offset)?;
        }
        Ok(())
    }
}

fn narrow(v: usize, what: &str) -> Result<u8> {
    u8::try_from(v).map_err(|_| VoxelError::serialization(0, format!("{what} {v} exceeds the format")))
}

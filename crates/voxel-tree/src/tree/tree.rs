//! Voxel tree container and hierarchy operations.

use std::fmt::Write as _;
use std::sync::Arc;

use log::{debug, trace};

use crate::context::Context;
use crate::geometry::{Face, Range3};
use crate::loc::{NodeId, NodeLoc3, Region3};
use crate::{Result, VoxelError};

use super::data::{IobData, NodeData, VoxelClass};
use super::node::{Node, NodeHandle, NUM_CHILD_SLOTS};

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A subtree removed from one tree, ready to be attached to another.
#[derive(Debug, Clone)]
pub(crate) struct DetachedSubtree {
    pub(crate) id: NodeId,
    pub(crate) data: Option<NodeData>,
    pub(crate) children: Vec<(usize, DetachedSubtree)>,
}

/// A hierarchical voxel tree.
///
/// Nodes live in an arena owned by the tree and are addressed by
/// [`NodeHandle`]s. A node stays alive while it is reachable from the root;
/// removing a node frees its whole subtree and invalidates every handle into
/// it. The [`Context`] is shared, so several trees with the same
/// configuration can exchange subtrees (see [`merge`](crate::merge)).
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use voxel_tree::{Context, NodeData, NodeLoc3, VoxelTree};
///
/// let context = Arc::new(Context::new(7, 2, 4.0, 1e-6)?);
/// let mut tree = VoxelTree::new(context);
/// let root = tree.root();
/// let leaf = tree
///     .insert_child(root, &NodeLoc3::new(3, 9, 27), None, false, false)?
///     .unwrap();
/// tree.set_data(leaf, NodeData::Density(1.0))?;
/// ```
#[derive(Debug, Clone)]
pub struct VoxelTree {
    context: Arc<Context>,
    slots: Vec<Slot>,
    free_list: Vec<usize>,
    root: NodeHandle,
    len: usize,
}

fn stale(h: NodeHandle) -> VoxelError {
    VoxelError::Structural(format!("stale node handle {h:?}"))
}

impl VoxelTree {
    /// Creates a tree consisting of an empty root voxel.
    pub fn new(context: Arc<Context>) -> Self {
        let mut tree = Self {
            context,
            slots: Vec::new(),
            free_list: Vec::new(),
            root: NodeHandle::new(0, 0),
            len: 0,
        };
        tree.root = tree.alloc(NodeId::ROOT, None);
        tree
    }

    /// Creates a tree whose root is the voxel `root_id` instead of the
    /// whole space. Used for stand-alone subtrees.
    pub fn with_root(context: Arc<Context>, root_id: NodeId) -> Result<Self> {
        let root_id = context.node_id(&root_id.loc, root_id.depth())?;
        let mut tree = Self::new(context);
        if let Some(root) = tree.get_mut_opt(tree.root) {
            *root = Node::new(root_id, None);
        }
        Ok(tree)
    }

    #[inline]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Returns the root node handle.
    #[inline]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Returns the number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree has no live nodes; never the case, since
    /// the root lives as long as the tree.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if `h` refers to a live node of this tree.
    pub fn contains(&self, h: NodeHandle) -> bool {
        self.node(h).is_some()
    }

    /// Returns the node behind `h`, or `None` for a stale handle.
    pub fn node(&self, h: NodeHandle) -> Option<&Node> {
        let slot = self.slots.get(h.index())?;
        if slot.generation != h.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut_opt(&mut self, h: NodeHandle) -> Option<&mut Node> {
        let slot = self.slots.get_mut(h.index())?;
        if slot.generation != h.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    pub(crate) fn get(&self, h: NodeHandle) -> Result<&Node> {
        self.node(h).ok_or_else(|| stale(h))
    }

    fn get_mut(&mut self, h: NodeHandle) -> Result<&mut Node> {
        self.get_mut_opt(h).ok_or_else(|| stale(h))
    }

    fn alloc(&mut self, id: NodeId, parent: Option<NodeHandle>) -> NodeHandle {
        let node = Node::new(id, parent);
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            return NodeHandle::new(index as u32, slot.generation);
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeHandle::new((self.slots.len() - 1) as u32, 0)
    }

    /// Frees `h` and its whole subtree. The parent's slot is not touched.
    fn release(&mut self, h: NodeHandle) {
        let mut stack = vec![h];
        while let Some(cur) = stack.pop() {
            let Some(slot) = self.slots.get_mut(cur.index()) else {
                continue;
            };
            if slot.generation != cur.generation() {
                continue;
            }
            if let Some(node) = slot.node.take() {
                stack.extend(node.children().map(|(_, c)| c));
                self.free_list.push(cur.index());
                self.len -= 1;
            }
        }
    }

    // --- data ---

    /// Returns the payload of `h`, if any.
    pub fn data(&self, h: NodeHandle) -> Option<&NodeData> {
        self.node(h)?.data()
    }

    /// Returns the payload of `h` for modification, if any.
    pub fn data_mut(&mut self, h: NodeHandle) -> Option<&mut NodeData> {
        self.get_mut_opt(h)?.data_slot().as_mut()
    }

    /// Attaches a payload to `h`, replacing any previous payload.
    ///
    /// Fails with [`VoxelError::Structural`] if the node has children.
    pub fn set_data(&mut self, h: NodeHandle, data: NodeData) -> Result<()> {
        let node = self.get_mut(h)?;
        if !node.is_leaf() {
            return Err(VoxelError::Structural(format!(
                "cannot attach data to node {} with children",
                node.id()
            )));
        }
        *node.data_slot() = Some(data);
        Ok(())
    }

    /// Removes and returns the payload of `h`.
    pub fn take_data(&mut self, h: NodeHandle) -> Option<NodeData> {
        self.get_mut_opt(h)?.data_slot().take()
    }

    /// Removes the payload of `h`.
    pub fn clear_data(&mut self, h: NodeHandle) -> Result<()> {
        *self.get_mut(h)?.data_slot() = None;
        Ok(())
    }

    /// Returns the voxel class of `h`; undefined for stale handles or nodes
    /// without a class payload.
    pub fn voxel_class(&self, h: NodeHandle) -> VoxelClass {
        self.node(h).map_or(VoxelClass::UNDEFINED, Node::voxel_class)
    }

    /// Enables or disables voxel class bits of `h`.
    ///
    /// A node without payload receives a [`NodeData::VoxelClass`] payload;
    /// class and IOB payloads are updated in place. Any other payload is a
    /// [`VoxelError::Structural`] error.
    pub fn set_voxel_class(&mut self, h: NodeHandle, class: VoxelClass, enable: bool) -> Result<()> {
        let node = self.get_mut(h)?;
        let id = node.id();
        match node.data_slot() {
            Some(NodeData::VoxelClass(c)) => c.apply(class, enable),
            Some(NodeData::VoxelIob(d)) => d.voxel_class.apply(class, enable),
            Some(other) => {
                return Err(VoxelError::Structural(format!(
                    "payload {:?} of node {id} carries no voxel class",
                    other.data_type()
                )));
            }
            None => {
                let mut c = VoxelClass::UNDEFINED;
                c.apply(class, enable);
                self.set_data(h, NodeData::VoxelClass(c))?;
            }
        }
        Ok(())
    }

    /// Returns the IOB record of `h`, creating it if the node has no payload
    /// or only a voxel class payload.
    pub(crate) fn iob_data_mut(&mut self, h: NodeHandle) -> Result<&mut IobData> {
        let node = self.get_mut(h)?;
        let id = node.id();
        if !node.is_leaf() {
            return Err(VoxelError::Structural(format!(
                "cannot attach IOB data to node {id} with children"
            )));
        }
        let slot = node.data_slot();
        let upgraded = match slot {
            None | Some(NodeData::Null) => Some(IobData::default()),
            Some(NodeData::VoxelClass(c)) => Some(IobData::with_class(*c)),
            _ => None,
        };
        if let Some(d) = upgraded {
            *slot = Some(NodeData::VoxelIob(d));
        }
        match slot {
            Some(NodeData::VoxelIob(d)) => Ok(d),
            Some(other) => Err(VoxelError::Structural(format!(
                "payload {:?} of node {id} is not an IOB record",
                other.data_type()
            ))),
            None => Err(stale(h)),
        }
    }

    // --- hierarchy ---

    /// Returns the parent of `h`.
    pub fn parent(&self, h: NodeHandle) -> Option<NodeHandle> {
        self.node(h)?.parent()
    }

    /// Returns the child of `h` with the given order index.
    pub fn child(&self, h: NodeHandle, order_index: usize) -> Option<NodeHandle> {
        self.node(h)?.child(order_index)
    }

    /// Returns the world space box of `h`.
    pub fn voxel_range(&self, h: NodeHandle) -> Option<Range3> {
        Some(self.context.voxel_range(&self.node(h)?.id()))
    }

    /// Returns the child of `h` with the given order index, creating it if
    /// it does not exist yet.
    ///
    /// Fails with [`VoxelError::Structural`] if `h` holds data, and with
    /// [`VoxelError::OutOfRange`] if `h` is at the deepest level.
    pub fn child_or_create(&mut self, h: NodeHandle, order_index: usize) -> Result<NodeHandle> {
        let node = self.get(h)?;
        if let Some(c) = node.child(order_index) {
            return Ok(c);
        }
        let id = node.id();
        if node.data().is_some() {
            return Err(VoxelError::Structural(format!(
                "cannot create children of node {id} holding data"
            )));
        }
        let child_id = self.context.child_id(&id, order_index).ok_or_else(|| {
            VoxelError::OutOfRange(format!("node {id} has no child slot {order_index}"))
        })?;
        let c = self.alloc(child_id, Some(h));
        self.get_mut(h)?.set_child(order_index, Some(c));
        Ok(c)
    }

    /// Creates every missing child of `h` and returns how many were created.
    pub fn create_children(&mut self, h: NodeHandle) -> Result<usize> {
        let node = self.get(h)?;
        if node.depth() >= self.context.max_depth() {
            return Ok(0);
        }
        let missing: Vec<usize> = (0..NUM_CHILD_SLOTS).filter(|&i| node.child(i).is_none()).collect();
        for &i in &missing {
            self.child_or_create(h, i)?;
        }
        Ok(missing.len())
    }

    /// Removes the child of `h` with the given order index, with its subtree.
    ///
    /// Returns `false` if there was no such child.
    pub fn remove_child(&mut self, h: NodeHandle, order_index: usize) -> bool {
        let Some(node) = self.get_mut_opt(h) else {
            return false;
        };
        let Some(c) = node.child(order_index) else {
            return false;
        };
        node.set_child(order_index, None);
        self.release(c);
        true
    }

    /// Removes all children and the payload of `h`.
    pub fn clear(&mut self, h: NodeHandle) -> Result<()> {
        let node = self.get_mut(h)?;
        *node.data_slot() = None;
        let children = node.take_children();
        for c in children.into_iter().flatten() {
            self.release(c);
        }
        Ok(())
    }

    /// Inserts the voxel at `depth` containing `loc` below `h`.
    ///
    /// Intermediate nodes are created as needed. With `fill`, the complete
    /// sibling set is created at every level along the path; with
    /// `fill_target_depth`, only at the target depth. `depth = None` means
    /// the deepest level.
    ///
    /// Returns `Ok(None)` if `loc` does not lie under `h`. Fails with
    /// [`VoxelError::OutOfRange`] for invalid depths or codes and with
    /// [`VoxelError::Structural`] if a node on the path holds data; both
    /// checks run before the tree is modified.
    pub fn insert_child(
        &mut self,
        h: NodeHandle,
        loc: &NodeLoc3,
        depth: Option<usize>,
        fill: bool,
        fill_target_depth: bool,
    ) -> Result<Option<NodeHandle>> {
        let target = match depth {
            Some(d) if d > self.context.max_depth() => {
                return Err(VoxelError::OutOfRange(format!(
                    "depth {d} exceeds tree depth {}",
                    self.context.max_depth()
                )));
            }
            Some(d) => d,
            None => self.context.max_depth(),
        };
        if !self.context.check_loc3(loc) {
            return Err(VoxelError::OutOfRange(format!("invalid location code {loc}")));
        }
        self.get(h)?;
        let Some(start) = self.locate_child(h, loc, Some(target)) else {
            return Ok(None);
        };
        let start_node = self.get(start)?;
        if start_node.depth() < target && start_node.data().is_some() {
            return Err(VoxelError::Structural(format!(
                "cannot insert below node {} holding data",
                start_node.id()
            )));
        }
        let mut cur = start;
        let mut d = start_node.depth();
        while d < target {
            if fill || (fill_target_depth && d + 1 == target) {
                self.create_children(cur)?;
            }
            let oi = self
                .context
                .child_order_index(loc, d + 1)
                .ok_or_else(|| VoxelError::OutOfRange(format!("no child index at depth {}", d + 1)))?;
            cur = self.child_or_create(cur, oi)?;
            d += 1;
        }
        trace!("inserted node at depth {target} for {loc}");
        Ok(Some(cur))
    }

    /// Inserts the voxel `id` below the root and returns its handle.
    ///
    /// Fails with [`VoxelError::OutOfRange`] if `id` is not under the root.
    pub fn insert_node(&mut self, id: &NodeId, fill: bool) -> Result<NodeHandle> {
        self.insert_child(self.root, &id.loc, Some(id.depth()), fill, false)?
            .ok_or_else(|| VoxelError::OutOfRange(format!("node {id} is not under the tree root")))
    }

    /// Descends from `h` towards `loc` and returns the deepest existing node
    /// on the way, at depth `max_depth` at most.
    ///
    /// Returns `None` if `loc` is not under `h` or `h` is deeper than
    /// `max_depth`.
    pub fn locate_child(&self, h: NodeHandle, loc: &NodeLoc3, max_depth: Option<usize>) -> Option<NodeHandle> {
        let max_depth = self.context.resolve_depth(max_depth);
        let node = self.node(h)?;
        if node.depth() > max_depth || !self.context.contains_loc(&node.id(), loc) {
            return None;
        }
        let mut cur = h;
        loop {
            let n = self.node(cur)?;
            let d = n.depth();
            if d >= max_depth {
                return Some(cur);
            }
            let oi = self.context.child_order_index(loc, d + 1)?;
            match n.child(oi) {
                Some(c) => cur = c,
                None => return Some(cur),
            }
        }
    }

    /// Locates the deepest existing node containing `loc`, starting at `h`.
    ///
    /// If `loc` is not under `h`, walks up to the first ancestor containing
    /// it, then descends.
    pub fn locate_node(&self, h: NodeHandle, loc: &NodeLoc3, max_depth: Option<usize>) -> Option<NodeHandle> {
        let mut cur = h;
        while !self.context.contains_loc(&self.node(cur)?.id(), loc) {
            cur = self.parent(cur)?;
        }
        self.locate_child(cur, loc, max_depth)
    }

    /// Locates the deepest existing node containing the whole `region`.
    pub fn locate_region(&self, h: NodeHandle, region: &Region3, max_depth: Option<usize>) -> Option<NodeHandle> {
        let depth = self.context.common_ancestor_level_region(region, max_depth);
        self.locate_node(h, &region.l0, Some(depth))
    }

    /// Materializes missing children below `h` down to `max_depth`.
    ///
    /// Nodes holding data are skipped unless `clear_existing` is set, in
    /// which case their data is removed first. Returns the number of
    /// created nodes.
    pub fn fill(
        &mut self,
        h: NodeHandle,
        clear_existing: bool,
        recursive: bool,
        max_depth: Option<usize>,
    ) -> Result<usize> {
        let max_depth = self.context.resolve_depth(max_depth);
        let node = self.get(h)?;
        if node.depth() >= max_depth {
            return Ok(0);
        }
        if node.data().is_some() {
            if !clear_existing {
                return Ok(0);
            }
            self.clear_data(h)?;
        }
        let mut created = self.create_children(h)?;
        if recursive {
            let children: Vec<NodeHandle> = self.get(h)?.children().map(|(_, c)| c).collect();
            for c in children {
                created += self.fill(c, clear_existing, true, Some(max_depth))?;
            }
        }
        Ok(created)
    }

    /// Removes leaf children of `h` that hold no data (or `Null` data).
    ///
    /// With `recursive`, subtrees are pruned bottom-up first, so internal
    /// nodes whose children all get pruned are removed as well. Internal
    /// nodes with data below them are never removed. Returns the number of
    /// removed nodes.
    pub fn prune_empty(&mut self, h: NodeHandle, recursive: bool) -> usize {
        let Some(node) = self.node(h) else {
            return 0;
        };
        let children: Vec<(usize, NodeHandle)> = node.children().collect();
        let mut removed = 0;
        for (oi, c) in children {
            if recursive {
                removed += self.prune_empty(c, true);
            }
            let empty_leaf = self.node(c).is_some_and(|n| n.is_leaf() && n.is_empty());
            if empty_leaf && self.remove_child(h, oi) {
                removed += 1;
            }
        }
        removed
    }

    // --- subtree transfer ---

    /// Unlinks the child `order_index` of `h` and returns its subtree as an
    /// owned value. The arena slots of the subtree are freed.
    pub(crate) fn detach_child(&mut self, h: NodeHandle, order_index: usize) -> Option<DetachedSubtree> {
        let c = self.child(h, order_index)?;
        let detached = self.snapshot(c)?;
        self.remove_child(h, order_index);
        Some(detached)
    }

    fn snapshot(&mut self, h: NodeHandle) -> Option<DetachedSubtree> {
        let node = self.get_mut_opt(h)?;
        let id = node.id();
        let data = node.data_slot().take();
        let children: Vec<(usize, NodeHandle)> = node.children().collect();
        let mut out = DetachedSubtree {
            id,
            data,
            children: Vec::with_capacity(children.len()),
        };
        for (oi, c) in children {
            if let Some(sub) = self.snapshot(c) {
                out.children.push((oi, sub));
            }
        }
        Some(out)
    }

    /// Attaches a detached subtree as child `order_index` of `h`, replacing
    /// any existing child there. Returns the handle of the attached root.
    pub(crate) fn attach_child(
        &mut self,
        h: NodeHandle,
        order_index: usize,
        subtree: DetachedSubtree,
    ) -> Result<NodeHandle> {
        let parent = self.get(h)?;
        let expected = self.context.child_id(&parent.id(), order_index);
        if expected != Some(subtree.id) {
            return Err(VoxelError::Structural(format!(
                "subtree {} does not fit child slot {order_index} of node {}",
                subtree.id,
                parent.id()
            )));
        }
        if parent.data().is_some() {
            return Err(VoxelError::Structural(format!(
                "cannot attach children to node {} holding data",
                parent.id()
            )));
        }
        self.remove_child(h, order_index);
        let c = self.build_subtree(h, subtree)?;
        self.get_mut(h)?.set_child(order_index, Some(c));
        Ok(c)
    }

    fn build_subtree(&mut self, parent: NodeHandle, subtree: DetachedSubtree) -> Result<NodeHandle> {
        let h = self.alloc(subtree.id, Some(parent));
        *self.get_mut(h)?.data_slot() = subtree.data;
        for (oi, sub) in subtree.children {
            let c = self.build_subtree(h, sub)?;
            self.get_mut(h)?.set_child(oi, Some(c));
        }
        Ok(h)
    }

    // --- queries ---

    /// Returns `h` and all its descendants in pre-order, children in order
    /// index order.
    pub fn descendants(&self, h: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack = vec![h];
        while let Some(cur) = stack.pop() {
            let Some(node) = self.node(cur) else {
                continue;
            };
            out.push(cur);
            let children: Vec<NodeHandle> = node.children().map(|(_, c)| c).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Returns the leaves of the subtree of `h`, in pre-order.
    pub fn leaves(&self, h: NodeHandle) -> Vec<NodeHandle> {
        self.descendants(h)
            .into_iter()
            .filter(|&c| self.node(c).is_some_and(Node::is_leaf))
            .collect()
    }

    /// Returns the number of nodes below `h`: its children, or with
    /// `recursive` all its descendants.
    pub fn num_nodes(&self, h: NodeHandle, recursive: bool) -> usize {
        let Some(node) = self.node(h) else {
            return 0;
        };
        if !recursive {
            return node.num_children();
        }
        self.descendants(h).len() - 1
    }

    /// Returns the depth of the deepest node in the subtree of `h`.
    pub fn max_depth(&self, h: NodeHandle) -> usize {
        self.descendants(h)
            .into_iter()
            .filter_map(|c| self.node(c).map(Node::depth))
            .max()
            .unwrap_or(0)
    }

    /// Returns the number of faces attached in the subtree of `h` (or to
    /// `h` alone).
    pub fn num_faces(&self, h: NodeHandle, recursive: bool) -> usize {
        let nodes = if recursive { self.descendants(h) } else { vec![h] };
        nodes
            .into_iter()
            .filter_map(|c| match self.data(c) {
                Some(NodeData::FaceVec(faces)) => Some(faces.len()),
                _ => None,
            })
            .sum()
    }

    /// Collects the faces attached in the subtree of `h`.
    pub fn collect_faces(&self, h: NodeHandle) -> Vec<Face> {
        let mut out = Vec::new();
        for c in self.descendants(h) {
            if let Some(NodeData::FaceVec(faces)) = self.data(c) {
                out.extend(faces.iter().cloned());
            }
        }
        out
    }

    /// Computes the area-weighted average color and shading normal of the
    /// faces attached to `h` (and its subtree with `recursive`).
    ///
    /// Faces without a color count as opaque white. Returns the total face
    /// area along with the averages; all zeros if there are no faces.
    pub fn face_color_normal(&self, h: NodeHandle, recursive: bool) -> (f64, [f64; 4], [f64; 3]) {
        let nodes = if recursive { self.descendants(h) } else { vec![h] };
        let mut area = 0.0;
        let mut color = [0.0; 4];
        let mut normal = nalgebra::Vector3::zeros();
        for c in nodes {
            let Some(NodeData::FaceVec(faces)) = self.data(c) else {
                continue;
            };
            for face in faces {
                let a = face.area();
                let fc = face.color().unwrap_or([1.0; 4]);
                for (acc, v) in color.iter_mut().zip(fc) {
                    *acc += a * v;
                }
                normal += face.shading_normal() * a;
                area += a;
            }
        }
        if area <= 0.0 {
            return (0.0, [0.0; 4], [0.0; 3]);
        }
        for v in &mut color {
            *v /= area;
        }
        normal /= area;
        (area, color, [normal.x, normal.y, normal.z])
    }

    /// Approximate heap memory used by the tree, in bytes.
    pub fn memory_size(&self) -> usize {
        let slots = self.slots.capacity() * std::mem::size_of::<Slot>();
        let faces: usize = self
            .slots
            .iter()
            .filter_map(|s| match s.node.as_ref()?.data() {
                Some(NodeData::FaceVec(f)) => Some(f.capacity() * std::mem::size_of::<Face>()),
                _ => None,
            })
            .sum();
        slots + faces + self.free_list.capacity() * std::mem::size_of::<usize>()
    }

    /// Renders the subtree of `h` as indented text, one node per line.
    pub fn to_text(&self, h: NodeHandle, recursive: bool) -> String {
        let mut out = String::new();
        let mut stack = vec![(h, 0usize)];
        while let Some((cur, indent)) = stack.pop() {
            let Some(node) = self.node(cur) else {
                continue;
            };
            let _ = write!(out, "{:indent$}{}", "", node.id(), indent = indent * 2);
            match node.data() {
                Some(data) => {
                    let _ = write!(out, " data={:?}", data.data_type());
                    let class = node.voxel_class();
                    if !class.is_empty() {
                        let _ = write!(out, " class={class:?}");
                    }
                }
                None if !node.is_leaf() => {
                    let _ = write!(out, " children={:08b}", node.child_mask());
                }
                None => {}
            }
            out.push('\n');
            if recursive {
                let children: Vec<NodeHandle> = node.children().map(|(_, c)| c).collect();
                stack.extend(children.into_iter().rev().map(|c| (c, indent + 1)));
            }
        }
        out
    }

    pub(crate) fn log_summary(&self, what: &str) {
        debug!(
            "{what}: {} nodes, max depth {}, {} leaves",
            self.len,
            self.max_depth(self.root),
            self.leaves(self.root).len()
        );
    }
}

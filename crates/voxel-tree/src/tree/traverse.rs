//! Filtered traversal of a voxel tree.

use log::trace;

use crate::processor::{NodeFilter, NodeProcessor};
use crate::Result;

use super::{NodeHandle, VoxelTree};

impl VoxelTree {
    /// Collects the nodes of the subtree of `h` that pass `filter`, in
    /// pre-order.
    ///
    /// The filter's maximum depth bounds the descent. Without `recursive`,
    /// only `h` itself is considered. Returns the number of nodes appended
    /// to `out`.
    pub fn find(
        &self,
        h: NodeHandle,
        filter: Option<&NodeFilter>,
        recursive: bool,
        out: &mut Vec<NodeHandle>,
    ) -> usize {
        let Some(node) = self.node(h) else {
            return 0;
        };
        if filter.and_then(|f| f.max_depth).is_some_and(|m| node.depth() > m) {
            return 0;
        }
        let mut found = 0;
        if filter.is_none_or(|f| f.accepts(self, h)) {
            out.push(h);
            found += 1;
        }
        if recursive {
            for (_, c) in node.children() {
                found += self.find(c, filter, true, out);
            }
        }
        found
    }

    /// Runs processors over the subtree of `h`.
    ///
    /// Nodes passing `filter` are entered: `pre` runs on them before their
    /// children and `post` after. A `pre` result containing `FINISHED`
    /// stops the descent below that node, but `post` still runs on it.
    /// Nodes failing the filter are not processed, but their children are
    /// still visited. The filter's maximum depth bounds the descent.
    ///
    /// Returns the number of entered nodes.
    pub fn process(
        &mut self,
        h: NodeHandle,
        mut pre: Option<&mut dyn NodeProcessor>,
        filter: Option<&NodeFilter>,
        mut post: Option<&mut dyn NodeProcessor>,
        recursive: bool,
    ) -> Result<usize> {
        self.process_node(h, &mut pre, filter, &mut post, recursive)
    }

    fn process_node(
        &mut self,
        h: NodeHandle,
        pre: &mut Option<&mut dyn NodeProcessor>,
        filter: Option<&NodeFilter>,
        post: &mut Option<&mut dyn NodeProcessor>,
        recursive: bool,
    ) -> Result<usize> {
        let node = self.get(h)?;
        if filter.and_then(|f| f.max_depth).is_some_and(|m| node.depth() > m) {
            return Ok(0);
        }
        let mut count = 0;
        let mut descend = recursive;
        let entered = filter.is_none_or(|f| f.accepts(self, h));
        if entered {
            count += 1;
            if let Some(p) = pre.as_mut() {
                let r = p.process(self, h, None)?;
                if r.is_finished() {
                    trace!("processing finished at {:?}", h);
                    descend = false;
                }
            }
        }
        if descend {
            // Processors may restructure the tree, so re-read the children.
            let children: Vec<NodeHandle> = match self.node(h) {
                Some(n) => n.children().map(|(_, c)| c).collect(),
                None => Vec::new(),
            };
            for c in children {
                if self.contains(c) {
                    count += self.process_node(c, pre, filter, post, true)?;
                }
            }
        }
        if entered {
            if let Some(p) = post.as_mut() {
                p.process(self, h, None)?;
            }
        }
        Ok(count)
    }
}

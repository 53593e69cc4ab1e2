use crate::query::NodeIntersection;
use crate::tree::{NodeHandle, VoxelTree};
use crate::Result;

use super::{NodeProcessor, ProcessingResult};

/// Materializes missing children of each processed node.
///
/// See [`VoxelTree::fill`] for the meaning of the parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillProcessor {
    pub clear_existing: bool,
    pub recursive: bool,
    pub max_depth: Option<usize>,
    created: usize,
}

impl FillProcessor {
    pub fn new(clear_existing: bool, recursive: bool, max_depth: Option<usize>) -> Self {
        Self {
            clear_existing,
            recursive,
            max_depth,
            created: 0,
        }
    }

    /// Total number of nodes created so far.
    pub fn num_created(&self) -> usize {
        self.created
    }
}

impl NodeProcessor for FillProcessor {
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        _hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        self.created += tree.fill(node, self.clear_existing, self.recursive, self.max_depth)?;
        Ok(ProcessingResult::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use std::sync::Arc;

    #[test]
    fn fills_to_max_depth() {
        let mut tree = VoxelTree::new(Arc::new(Context::new(4, 2, 1.0, 1e-6).unwrap()));
        let root = tree.root();
        let mut fill = FillProcessor::new(false, true, Some(2));
        assert_eq!(fill.process(&mut tree, root, None).unwrap(), ProcessingResult::OK);
        assert_eq!(fill.num_created(), 8 + 64);
        assert_eq!(tree.max_depth(root), 2);
    }

    #[test]
    fn non_recursive_fill_creates_one_level() {
        let mut tree = VoxelTree::new(Arc::new(Context::new(4, 2, 1.0, 1e-6).unwrap()));
        let root = tree.root();
        let mut fill = FillProcessor::new(false, false, None);
        fill.process(&mut tree, root, None).unwrap();
        assert_eq!(tree.len(), 9);
    }
}

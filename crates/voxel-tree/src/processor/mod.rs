//! Pluggable per-node behaviors.
//!
//! A [`NodeProcessor`] is invoked on nodes during traversal
//! ([`VoxelTree::process`]), ray queries ([`intersect_ray`]) and
//! voxelization ([`voxelize_faces`]). Processors compose as a chain: a
//! [`Chained`] processor runs its source first and only runs its own step if
//! the source did not signal [`ProcessingResult::FINISHED`].
//!
//! # Example
//!
//! ```ignore
//! use voxel_tree::processor::{FillProcessor, NodeFilter};
//!
//! let filter = NodeFilter::new().with_max_depth(2);
//! let mut fill = FillProcessor::new(false, false, Some(3));
//! let count = tree.process(tree.root(), Some(&mut fill), Some(&filter), None, true)?;
//! ```
//!
//! # Provided processors
//!
//! - [`NodeFilter`]: depth, region, data type, leaf status and class criteria
//! - [`FillProcessor`]: materializes missing children
//! - [`IobEvalProcessor`]: classifies voxels inside or outside from votes
//! - [`WallThicknessProcessor`]: maps wall thickness to color indices
//! - [`VoxelizationProcessor`]: writes voxelization payloads
//! - [`IntersectionProcessor`]: records ray stabbing votes
//!
//! [`VoxelTree::process`]: crate::VoxelTree::process
//! [`intersect_ray`]: crate::query::intersect_ray
//! [`voxelize_faces`]: crate::voxelize::voxelize_faces

use bitflags::bitflags;

use crate::query::NodeIntersection;
use crate::tree::{NodeHandle, VoxelTree};
use crate::Result;

mod fill;
mod filter;
mod intersection;
mod iob_eval;
mod voxelization;
mod wall_thickness;

pub use fill::FillProcessor;
pub use filter::NodeFilter;
pub use intersection::IntersectionProcessor;
pub use iob_eval::IobEvalProcessor;
pub use voxelization::{VoxelizationProcessor, VoxelizationTarget};
pub use wall_thickness::{color_index, WallThicknessMode, WallThicknessProcessor};

bitflags! {
    /// Result of processing a node. The empty set is the unknown result.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProcessingResult: u8 {
        const OK = 1;
        const FAILED = 2;
        /// Stop: do not descend further or run later chain members.
        const FINISHED = 4;
        /// The node passed a filter.
        const PASS = 8;
    }
}

impl ProcessingResult {
    pub const UNKNOWN: ProcessingResult = ProcessingResult::empty();

    #[inline]
    pub fn is_finished(self) -> bool {
        self.contains(ProcessingResult::FINISHED)
    }

    #[inline]
    pub fn is_pass(self) -> bool {
        self.contains(ProcessingResult::PASS)
    }
}

/// Behavior applied to a node.
///
/// `hit` carries the ray intersection when the processor is driven by a ray
/// query; it is `None` for plain traversal.
pub trait NodeProcessor {
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult>;

    /// Called before a batch of nodes (one ray of a ray grid) is processed.
    fn begin(&mut self) {}

    /// Called after a batch of nodes has been processed.
    fn finish(&mut self, _tree: &mut VoxelTree) -> Result<()> {
        Ok(())
    }
}

impl<P: NodeProcessor + ?Sized> NodeProcessor for &mut P {
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        (**self).process(tree, node, hit)
    }

    fn begin(&mut self) {
        (**self).begin();
    }

    fn finish(&mut self, tree: &mut VoxelTree) -> Result<()> {
        (**self).finish(tree)
    }
}

/// Two processors run as a chain: `source` first, then `step`.
#[derive(Debug, Clone)]
pub struct Chained<S, P> {
    source: S,
    step: P,
}

impl<S, P> Chained<S, P> {
    pub fn new(source: S, step: P) -> Self {
        Self { source, step }
    }

    pub fn into_parts(self) -> (S, P) {
        (self.source, self.step)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn step(&self) -> &P {
        &self.step
    }
}

impl<S: NodeProcessor, P: NodeProcessor> NodeProcessor for Chained<S, P> {
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        let r = self.source.process(tree, node, hit)?;
        if r.is_finished() {
            return Ok(r);
        }
        Ok(r | self.step.process(tree, node, hit)?)
    }

    fn begin(&mut self) {
        self.source.begin();
        self.step.begin();
    }

    fn finish(&mut self, tree: &mut VoxelTree) -> Result<()> {
        self.source.finish(tree)?;
        self.step.finish(tree)
    }
}

/// Chaining combinator for processors.
pub trait ProcessorExt: NodeProcessor + Sized {
    /// Returns a processor that runs `self`, then `step` unless `self`
    /// finished.
    fn chain<P: NodeProcessor>(self, step: P) -> Chained<Self, P> {
        Chained::new(self, step)
    }
}

impl<T: NodeProcessor> ProcessorExt for T {}

/// A processor that calls a closure for each node.
pub struct FnProcessor<F>
where
    F: FnMut(&mut VoxelTree, NodeHandle, Option<&NodeIntersection>) -> Result<ProcessingResult>,
{
    func: F,
}

impl<F> FnProcessor<F>
where
    F: FnMut(&mut VoxelTree, NodeHandle, Option<&NodeIntersection>) -> Result<ProcessingResult>,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> NodeProcessor for FnProcessor<F>
where
    F: FnMut(&mut VoxelTree, NodeHandle, Option<&NodeIntersection>) -> Result<ProcessingResult>,
{
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        (self.func)(tree, node, hit)
    }
}

/// A processor that records every node it sees, with its intersection if
/// driven by a ray query.
#[derive(Debug, Default)]
pub struct CollectingProcessor {
    nodes: Vec<NodeHandle>,
    hits: Vec<NodeIntersection>,
}

impl CollectingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Returns the recorded intersections, in delivery order.
    pub fn hits(&self) -> &[NodeIntersection] {
        &self.hits
    }

    pub fn into_nodes(self) -> Vec<NodeHandle> {
        self.nodes
    }
}

impl NodeProcessor for CollectingProcessor {
    fn process(
        &mut self,
        _tree: &mut VoxelTree,
        node: NodeHandle,
        hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        self.nodes.push(node);
        if let Some(hit) = hit {
            self.hits.push(*hit);
        }
        Ok(ProcessingResult::OK)
    }
}

use crate::query::NodeIntersection;
use crate::tree::{NodeData, NodeHandle, VoxelTree};
use crate::Result;

use super::{NodeProcessor, ProcessingResult};

/// Maps `v` from `[v_min, v_max]` linearly onto `[min_ci, max_ci]`.
///
/// Values outside the range clamp to the nearest end. A zero-width value
/// range maps to the middle index. The result is `None` if either index is
/// unset or a range is inverted.
pub fn color_index(v: u16, v_min: u16, v_max: u16, min_ci: Option<u16>, max_ci: Option<u16>) -> Option<u16> {
    let (min_ci, max_ci) = (min_ci?, max_ci?);
    if max_ci < min_ci || v_max < v_min {
        return None;
    }
    let cr = u32::from(max_ci - min_ci);
    if v_max == v_min {
        return Some((cr / 2) as u16 + min_ci);
    }
    if v >= v_max {
        return Some(max_ci);
    }
    if v <= v_min {
        return Some(min_ci);
    }
    let ci = u32::from(v - v_min) * cr / u32::from(v_max - v_min);
    Some(ci as u16 + min_ci)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WallThicknessMode {
    /// Record the global range of wall thickness.
    #[default]
    Scan,
    /// Assign color indices from the recorded range.
    Assign,
}

/// Two-pass wall thickness processor.
///
/// In scan mode it records the smallest and largest per-node minimum wall
/// thickness of all IOB records it sees. In assign mode it maps each node's
/// minimum wall thickness onto the color index range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallThicknessProcessor {
    pub mode: WallThicknessMode,
    /// Zero means not yet recorded.
    pub min_wall_thickness: u16,
    pub max_wall_thickness: u16,
    pub min_color_index: Option<u16>,
    pub max_color_index: Option<u16>,
}

impl WallThicknessProcessor {
    pub fn new(min_color_index: Option<u16>, max_color_index: Option<u16>) -> Self {
        Self {
            min_color_index,
            max_color_index,
            ..Self::default()
        }
    }

    pub fn set_mode(&mut self, mode: WallThicknessMode) {
        self.mode = mode;
    }

    /// Forgets the recorded wall thickness range.
    pub fn reset(&mut self) {
        self.min_wall_thickness = 0;
        self.max_wall_thickness = 0;
    }

    fn scan(&mut self, wt: u16) {
        if self.min_wall_thickness == 0 || (wt > 0 && wt < self.min_wall_thickness) {
            self.min_wall_thickness = wt;
        }
        if self.max_wall_thickness == 0 || (wt > 0 && wt > self.max_wall_thickness) {
            self.max_wall_thickness = wt;
        }
    }
}

impl NodeProcessor for WallThicknessProcessor {
    fn process(
        &mut self,
        tree: &mut VoxelTree,
        node: NodeHandle,
        _hit: Option<&NodeIntersection>,
    ) -> Result<ProcessingResult> {
        let Some(NodeData::VoxelIob(iob)) = tree.data_mut(node) else {
            return Ok(ProcessingResult::OK);
        };
        let wt = iob.min_wall_thickness().map_or(0, |(t, _)| t);
        match self.mode {
            WallThicknessMode::Scan => self.scan(wt),
            WallThicknessMode::Assign => {
                iob.color_index = color_index(
                    wt,
                    self.min_wall_thickness,
                    self.max_wall_thickness,
                    self.min_color_index,
                    self.max_color_index,
                );
            }
        }
        Ok(ProcessingResult::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::IobData;
    use crate::Context;
    use std::sync::Arc;

    #[test]
    fn color_index_maps_linearly_and_clamps() {
        assert_eq!(color_index(5, 0, 10, Some(100), Some(200)), Some(150));
        assert_eq!(color_index(12, 2, 10, Some(100), Some(200)), Some(200));
        assert_eq!(color_index(1, 2, 10, Some(100), Some(200)), Some(100));
        assert_eq!(color_index(4, 4, 4, Some(10), Some(20)), Some(15));
    }

    #[test]
    fn color_index_unspecified_cases() {
        assert_eq!(color_index(5, 0, 10, None, Some(200)), None);
        assert_eq!(color_index(5, 0, 10, Some(300), Some(200)), None);
        assert_eq!(color_index(5, 10, 0, Some(100), Some(200)), None);
    }

    #[test]
    fn scan_then_assign() {
        let mut tree = VoxelTree::new(Arc::new(Context::new(3, 2, 1.0, 1e-6).unwrap()));
        let root = tree.root();
        tree.create_children(root).unwrap();
        let thickness = [[2, 0, 5], [0, 0, 0], [8, 9, 8]];
        let mut handles = Vec::new();
        for (oi, wt) in thickness.iter().enumerate() {
            let h = tree.child(root, oi).unwrap();
            let iob = IobData {
                wall_thickness: *wt,
                ..IobData::default()
            };
            tree.set_data(h, NodeData::VoxelIob(iob)).unwrap();
            handles.push(h);
        }
        let mut p = WallThicknessProcessor::new(Some(0), Some(60));
        for &h in &handles {
            p.process(&mut tree, h, None).unwrap();
        }
        assert_eq!((p.min_wall_thickness, p.max_wall_thickness), (2, 8));

        p.set_mode(WallThicknessMode::Assign);
        for &h in &handles {
            p.process(&mut tree, h, None).unwrap();
        }
        let ci = |h| match tree.data(h) {
            Some(NodeData::VoxelIob(d)) => d.color_index,
            _ => None,
        };
        assert_eq!(ci(handles[0]), Some(0));
        assert_eq!(ci(handles[1]), Some(0), "unknown thickness clamps low");
        assert_eq!(ci(handles[2]), Some(60));
    }
}

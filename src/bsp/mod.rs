//! Binary space partitioning.
//!
//! `bsp::build` consumes the map's lines plus the mesh that receives
//! geometry created while splitting, and produces a [`BspTree`]: a binary
//! tree whose internal nodes are partition lines and whose leaves are
//! convex polygonal subspaces. The algorithm is the classic cost-driven
//! recursive splitter: pick the candidate segment whose partition line
//! splits the fewest others while keeping the two sides balanced, divide,
//! recurse, and emit a leaf once no candidate can improve the division.

mod evaluate;
mod partitioner;
mod seg;
mod superblock;
mod tree;

use glam::DVec2;

use crate::map::line::LineId;
use crate::map::sector::SectorId;

pub use partitioner::{BspBuildResult, build};
pub use tree::{
    BspElement, BspLeaf, BspLeafId, BspNode, BspNodeId, BspTree, ConvexSubspace, SubspaceId,
};

/// Cost attributed to splitting an existing segment, versus leaving
/// segments whole on one side.
pub const DEFAULT_SPLIT_COST_FACTOR: i32 = 7;

/// Build-time diagnostics delivered synchronously to the caller; these
/// report map-data defects, none of which abort the build.
pub trait BuildListener {
    /// A line with a front sector behaves as a one-way window; `back_open`
    /// is the sector visible through its back.
    fn one_way_window(&mut self, _line: LineId, _back_open: SectorId) {}

    /// A leaf's half-edge ring does not close; `near` approximates the gap.
    fn unclosed_sector(&mut self, _sector: SectorId, _near: DVec2) {}

    /// The map is being torn down.
    fn map_deleted(&mut self) {}
}

/// Listener that ignores every notification.
pub struct NullListener;

impl BuildListener for NullListener {}

//! Line segment working set for the partitioner.

use glam::DVec2;

use crate::geom::Aabb;
use crate::map::line::{LineId, SideIndex};
use crate::map::sector::SectorId;
use crate::mesh::VertexId;

pub(super) type SegIdx = usize;

/// A directed segment under partitioning. Map segments reference the
/// line side they came from; closure segments generated along partition
/// lines have no line side but still carry the sector whose interior
/// they border on their front.
#[derive(Debug, Clone)]
pub(super) struct LineSeg {
    pub from: DVec2,
    pub to: DVec2,
    pub from_vertex: VertexId,
    pub to_vertex: VertexId,
    pub line_side: Option<(LineId, SideIndex)>,
    pub sector: Option<SectorId>,
    /// Sector on the far (left) side of the directed segment, used when
    /// probing whether the space bracketing a vertex is open or void.
    pub back_sector: Option<SectorId>,
}

impl LineSeg {
    pub fn direction(&self) -> DVec2 {
        self.to - self.from
    }

    pub fn length(&self) -> f64 {
        self.direction().length()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.from, self.to)
    }

    pub fn midpoint(&self) -> DVec2 {
        (self.from + self.to) * 0.5
    }

    pub fn is_map(&self) -> bool {
        self.line_side.is_some()
    }
}

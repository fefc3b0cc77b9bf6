//! Lines, sides, surface sections and the segments clipped from them.

use bitflags::bitflags;
use glam::{DVec2, DVec3};

use crate::geom::Aabb;
use crate::map::sector::SectorId;
use crate::map::PolyobjId;
use crate::mesh::{HEdgeId, Mesh, VertexId};
use crate::map::mobj::MobjId;

pub type LineId = u32;
pub type SegmentId = u32;

/// 0 = front (right of the line direction), 1 = back.
pub type SideIndex = usize;

pub const FRONT: SideIndex = 0;
pub const BACK: SideIndex = 1;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineFlags: u16 {
        /// Solid for movement; set automatically on single-sector lines.
        const BLOCKING = 0x0001;
        /// Occludes sound propagation.
        const BLOCK_SOUND = 0x0002;
    }
}

/// Origin point for sound playback, chained per sector after finalization.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoundEmitter {
    pub origin: DVec3,
}

/// One wall section (middle, top or bottom) of a side.
#[derive(Clone, Debug, Default)]
pub struct Surface {
    pub normal: DVec3,
    pub emitter: SoundEmitter,
}

/// The three sections of a side that has geometry.
#[derive(Clone, Debug, Default)]
pub struct Sections {
    pub middle: Surface,
    pub top: Surface,
    pub bottom: Surface,
}

/// One logical side of a line. The front side of a map-authored line
/// always has a sector; a back without one marks a one-sided line.
#[derive(Clone, Debug, Default)]
pub struct Side {
    pub sector: Option<SectorId>,
    pub sections: Option<Sections>,
    /// Segments clipped from this side, sorted by offset from the
    /// side's "from" vertex.
    pub segments: Vec<SegmentId>,
}

impl Side {
    pub fn has_sections(&self) -> bool {
        self.sections.is_some()
    }
}

/// Immutable topological edge between two vertexes.
#[derive(Clone, Debug)]
pub struct Line {
    pub from: VertexId,
    pub to: VertexId,
    pub flags: LineFlags,
    pub sides: [Side; 2],
    /// Set when this line defines part of a polyobj rather than static
    /// map geometry.
    pub polyobj: Option<PolyobjId>,
    /// Back-facing open sector of a detected one-way window.
    pub window_sector: Option<SectorId>,
    /// Mobjs currently touching this line (maintained by link/unlink).
    pub(crate) touching_mobjs: Vec<MobjId>,

    // Cached geometry, refreshed whenever an endpoint is replaced.
    pub from_origin: DVec2,
    pub to_origin: DVec2,
    pub direction: DVec2,
    pub length: f64,
    pub bounds: Aabb,
}

impl Line {
    pub fn new(
        mesh: &Mesh,
        from: VertexId,
        to: VertexId,
        flags: LineFlags,
        front_sector: Option<SectorId>,
        back_sector: Option<SectorId>,
    ) -> Line {
        let mk_side = |sector: Option<SectorId>| Side {
            sections: sector.map(|_| Sections::default()),
            sector,
            segments: Vec::new(),
        };
        let mut line = Line {
            from,
            to,
            flags,
            sides: [mk_side(front_sector), mk_side(back_sector)],
            polyobj: None,
            window_sector: None,
            touching_mobjs: Vec::new(),
            from_origin: DVec2::ZERO,
            to_origin: DVec2::ZERO,
            direction: DVec2::ZERO,
            length: 0.0,
            bounds: Aabb::empty(),
        };
        line.update_geometry(mesh);
        line
    }

    /// Refresh the cached endpoint coordinates, direction and bounds.
    pub fn update_geometry(&mut self, mesh: &Mesh) {
        self.from_origin = mesh.vertex_origin(self.from);
        self.to_origin = mesh.vertex_origin(self.to);
        self.direction = self.to_origin - self.from_origin;
        self.length = self.direction.length();
        self.bounds = Aabb::from_points(self.from_origin, self.to_origin);
    }

    #[inline]
    pub fn front(&self) -> &Side {
        &self.sides[FRONT]
    }

    #[inline]
    pub fn back(&self) -> &Side {
        &self.sides[BACK]
    }

    pub fn front_sector(&self) -> Option<SectorId> {
        self.sides[FRONT].sector
    }

    pub fn back_sector(&self) -> Option<SectorId> {
        self.sides[BACK].sector
    }

    /// Both sides reference the same sector (a map-authoring trick used
    /// for invisible platforms etc.); such lines are ignored by several
    /// geometric passes.
    pub fn is_self_referencing(&self) -> bool {
        self.front_sector().is_some() && self.front_sector() == self.back_sector()
    }

    pub fn is_two_sided(&self) -> bool {
        self.front_sector().is_some() && self.back_sector().is_some()
    }

    pub fn has_zero_length(&self) -> bool {
        self.length < crate::geom::DIST_EPSILON
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        (self.from_origin + self.to_origin) * 0.5
    }

    /// Signed side test: negative = front of the line, positive = back.
    #[inline]
    pub fn point_on_side(&self, p: DVec2) -> f64 {
        self.direction.perp_dot(p - self.from_origin)
    }

    /// Which side of the line is the box on?
    /// `-1` = straddles, `0` = front, `1` = back.
    pub fn box_on_side(&self, bb: &Aabb) -> i32 {
        let mut front = false;
        let mut back = false;
        for &x in &[bb.min.x, bb.max.x] {
            for &y in &[bb.min.y, bb.max.y] {
                if self.point_on_side(DVec2::new(x, y)) < 0.0 {
                    front = true;
                } else {
                    back = true;
                }
                if front && back {
                    return -1;
                }
            }
        }
        if front { 0 } else { 1 }
    }
}

/// A directed sub-interval of a line side's geometry, produced while the
/// BSP builder clips the line.
#[derive(Clone, Debug)]
pub struct Segment {
    pub hedge: HEdgeId,
    pub line: LineId,
    pub side: SideIndex,
    pub length: f64,
    /// Distance from the side's "from" vertex to this segment's start.
    pub offset: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_with(points: &[(f64, f64)]) -> (Mesh, Vec<VertexId>) {
        let mut mesh = Mesh::new();
        let ids = points
            .iter()
            .map(|&(x, y)| mesh.new_vertex(DVec2::new(x, y)))
            .collect();
        (mesh, ids)
    }

    #[test]
    fn side_tests_follow_direction() {
        let (mesh, vs) = mesh_with(&[(0.0, 0.0), (64.0, 0.0)]);
        let line = Line::new(&mesh, vs[0], vs[1], LineFlags::empty(), Some(0), None);
        assert!(line.point_on_side(DVec2::new(32.0, -8.0)) < 0.0); // front
        assert!(line.point_on_side(DVec2::new(32.0, 8.0)) > 0.0); // back

        let below = Aabb::from_points(DVec2::new(10.0, -20.0), DVec2::new(20.0, -10.0));
        let across = Aabb::from_points(DVec2::new(10.0, -10.0), DVec2::new(20.0, 10.0));
        assert_eq!(line.box_on_side(&below), 0);
        assert_eq!(line.box_on_side(&across), -1);
    }

    #[test]
    fn sections_follow_sectors() {
        let (mesh, vs) = mesh_with(&[(0.0, 0.0), (64.0, 0.0)]);
        let one_sided = Line::new(&mesh, vs[0], vs[1], LineFlags::empty(), Some(0), None);
        assert!(one_sided.front().has_sections());
        assert!(!one_sided.back().has_sections());
        assert!(!one_sided.is_two_sided());

        let two_sided = Line::new(&mesh, vs[0], vs[1], LineFlags::empty(), Some(0), Some(1));
        assert!(two_sided.is_two_sided());
        assert!(!two_sided.is_self_referencing());

        let self_ref = Line::new(&mesh, vs[0], vs[1], LineFlags::empty(), Some(0), Some(0));
        assert!(self_ref.is_self_referencing());
    }
}

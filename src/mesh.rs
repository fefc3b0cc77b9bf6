//! Half-edge mesh arena.
//!
//! Vertices, half-edges and faces live in flat vectors and reference one
//! another by index, so partially built geometry never leaves dangling
//! pointers. Every half-edge has a twin; `next` links are only present
//! once an edge has been stitched into a face ring.

use glam::DVec2;

use crate::geom::Aabb;
use crate::map::line::{LineId, SideIndex};

pub type VertexId = u32;
pub type HEdgeId = u32;
pub type FaceId = u32;

/// 2-D point in map space. Position is immutable once the map leaves
/// edit mode.
#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub origin: DVec2,
}

/// Back-reference from a half-edge to the map element it was clipped from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentRef {
    pub line: LineId,
    pub side: SideIndex,
}

/// One directed side of a mesh edge.
#[derive(Clone, Debug)]
pub struct HEdge {
    pub origin: VertexId,
    pub twin: HEdgeId,
    /// Next half-edge in the face ring (clockwise); `None` until stitched.
    pub next: Option<HEdgeId>,
    pub face: Option<FaceId>,
    /// Map element this half-edge borders, if any. `None` for partition
    /// artifacts ("minisegs") and bare twins.
    pub segment: Option<SegmentRef>,
}

/// A closed ring of half-edges (a convex polygon once the BSP is built).
#[derive(Clone, Debug)]
pub struct Face {
    pub first: HEdgeId,
    pub hedge_count: u32,
    pub bounds: Aabb,
}

#[derive(Default)]
pub struct Mesh {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) hedges: Vec<HEdge>,
    pub(crate) faces: Vec<Face>,
}

impl Mesh {
    pub fn new() -> Mesh {
        Mesh::default()
    }

    /*──────────────────────── vertices ────────────────────────*/

    pub fn new_vertex(&mut self, origin: DVec2) -> VertexId {
        self.vertices.push(Vertex { origin });
        (self.vertices.len() - 1) as VertexId
    }

    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id as usize]
    }

    #[inline]
    pub fn vertex_origin(&self, id: VertexId) -> DVec2 {
        self.vertices[id as usize].origin
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Find an existing vertex within `epsilon` of `p`, or insert a new
    /// one. Splitting dedups the intersection vertex through this.
    pub fn find_or_insert_vertex(&mut self, p: DVec2, epsilon: f64) -> VertexId {
        for (i, v) in self.vertices.iter().enumerate() {
            if (v.origin.x - p.x).abs() <= epsilon && (v.origin.y - p.y).abs() <= epsilon {
                return i as VertexId;
            }
        }
        self.new_vertex(p)
    }

    /*──────────────────────── half-edges ────────────────────────*/

    /// Create a half-edge pair spanning `from → to` / `to → from`.
    /// Returns (forward, backward).
    pub fn new_hedge_pair(&mut self, from: VertexId, to: VertexId) -> (HEdgeId, HEdgeId) {
        let fwd = self.hedges.len() as HEdgeId;
        let bwd = fwd + 1;
        self.hedges.push(HEdge {
            origin: from,
            twin: bwd,
            next: None,
            face: None,
            segment: None,
        });
        self.hedges.push(HEdge {
            origin: to,
            twin: fwd,
            next: None,
            face: None,
            segment: None,
        });
        (fwd, bwd)
    }

    #[inline]
    pub fn hedge(&self, id: HEdgeId) -> &HEdge {
        &self.hedges[id as usize]
    }

    #[inline]
    pub fn hedge_mut(&mut self, id: HEdgeId) -> &mut HEdge {
        &mut self.hedges[id as usize]
    }

    pub fn hedge_count(&self) -> usize {
        self.hedges.len()
    }

    /// Origin of the half-edge's destination (its twin's origin).
    #[inline]
    pub fn hedge_to_origin(&self, id: HEdgeId) -> DVec2 {
        let twin = self.hedges[id as usize].twin;
        self.vertex_origin(self.hedges[twin as usize].origin)
    }

    #[inline]
    pub fn hedge_from_origin(&self, id: HEdgeId) -> DVec2 {
        self.vertex_origin(self.hedges[id as usize].origin)
    }

    /*──────────────────────── faces ────────────────────────*/

    pub fn new_face(&mut self, first: HEdgeId, hedge_count: u32, bounds: Aabb) -> FaceId {
        self.faces.push(Face {
            first,
            hedge_count,
            bounds,
        });
        let id = (self.faces.len() - 1) as FaceId;
        // Attribute the ring.
        let mut h = first;
        loop {
            self.hedges[h as usize].face = Some(id);
            match self.hedges[h as usize].next {
                Some(n) if n != first => h = n,
                _ => break,
            }
        }
        id
    }

    #[inline]
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id as usize]
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Iterate the half-edge ring of a face, starting at `first`.
    pub fn face_ring(&self, id: FaceId) -> FaceRing<'_> {
        let first = self.faces[id as usize].first;
        FaceRing {
            mesh: self,
            first,
            cur: Some(first),
        }
    }
}

pub struct FaceRing<'a> {
    mesh: &'a Mesh,
    first: HEdgeId,
    cur: Option<HEdgeId>,
}

impl Iterator for FaceRing<'_> {
    type Item = HEdgeId;

    fn next(&mut self) -> Option<HEdgeId> {
        let cur = self.cur?;
        let next = self.mesh.hedge(cur).next;
        self.cur = match next {
            Some(n) if n != self.first => Some(n),
            _ => None,
        };
        Some(cur)
    }
}

//! The finalized world map and its spatial queries.
//!
//! A [`Map`] only exists after [`MapEditor::end_editing`] succeeds, so
//! every map in circulation has a BSP tree, blockmaps and sector
//! geometry. Queries that enumerate elements take a caller-owned
//! [`ValidCount`] so concurrent iterations never trample each other's
//! dedup stamps.

pub mod line;
pub mod mobj;
pub mod polyobj;
pub mod sector;

mod edit;
mod window;

use bitflags::bitflags;
use glam::{DVec2, DVec3};
use smallvec::SmallVec;
use thiserror::Error;

use crate::blockmap::Blockmap;
use crate::bsp::{BspLeafId, BspTree, BuildListener, SubspaceId};
use crate::contact::{Lumobj, LumobjId, MAX_LUMOBJS};
use crate::geom::{Aabb, DIST_EPSILON};
use crate::mesh::{HEdgeId, Mesh};
use crate::sight::{LineSightTest, SightFlags};
use crate::valid::ValidCount;

pub use edit::{BuildError, MapEditor};
pub use line::{Line, LineFlags, LineId, Segment, SegmentId, SideIndex};
pub use mobj::{Mobj, MobjId, MobjLinkFlags, Thinkers};
pub use polyobj::{Polyobj, PolyobjId};
pub use sector::{Sector, SectorCluster, SectorId};

/// Requests naming a map element that does not exist, plus the few hard
/// resource limits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("unknown vertex {0}")]
    UnknownVertex(u32),
    #[error("unknown line {0}")]
    UnknownLine(LineId),
    #[error("unknown sector {0}")]
    UnknownSector(SectorId),
    #[error("unknown polyobj {0}")]
    UnknownPolyobj(PolyobjId),
    #[error("unknown subspace {0}")]
    UnknownSubspace(SubspaceId),
    #[error("unknown segment {0}")]
    UnknownSegment(SegmentId),
    #[error("unknown mobj {0}")]
    UnknownMobj(MobjId),
    #[error("unknown lumobj {0}")]
    UnknownLumobj(LumobjId),
    #[error("lumobj limit reached ({MAX_LUMOBJS})")]
    LumobjLimit,
}

bitflags! {
    /// Filters for line box iteration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LineIterFlags: u8 {
        /// Only lines attributed to a sector.
        const SECTOR = 0x1;
    }
}

/// Lines incident at a vertex, ordered clockwise by outgoing angle, with
/// counts of one- and two-sided owners (window detection feeds on the
/// parity of `ones`).
#[derive(Clone, Debug, Default)]
pub struct VertexOwners {
    pub owners: Vec<LineId>,
    pub ones: u16,
    pub twos: u16,
}

pub struct Map {
    pub(crate) mesh: Mesh,
    pub(crate) lines: Vec<Line>,
    pub(crate) sectors: Vec<Sector>,
    pub(crate) polyobjs: Vec<Polyobj>,
    pub(crate) segments: Vec<Segment>,
    pub(crate) vertex_owners: Vec<VertexOwners>,
    pub(crate) bounds: Aabb,
    pub(crate) bsp: BspTree,
    pub(crate) line_blockmap: Blockmap<LineId>,
    pub(crate) mobj_blockmap: Blockmap<MobjId>,
    pub(crate) polyobj_blockmap: Blockmap<PolyobjId>,
    pub(crate) subspace_blockmap: Blockmap<SubspaceId>,
    pub(crate) thinkers: Thinkers,
    pub(crate) lumobjs: Vec<Lumobj>,
}

impl Map {
    /*──────────────────────── element access ────────────────────────*/

    pub fn line(&self, id: LineId) -> Result<&Line, MapError> {
        self.lines.get(id as usize).ok_or(MapError::UnknownLine(id))
    }

    pub fn sector(&self, id: SectorId) -> Result<&Sector, MapError> {
        self.sectors
            .get(id as usize)
            .ok_or(MapError::UnknownSector(id))
    }

    pub fn sector_mut(&mut self, id: SectorId) -> Result<&mut Sector, MapError> {
        self.sectors
            .get_mut(id as usize)
            .ok_or(MapError::UnknownSector(id))
    }

    pub fn polyobj(&self, id: PolyobjId) -> Result<&Polyobj, MapError> {
        self.polyobjs
            .get(id as usize)
            .ok_or(MapError::UnknownPolyobj(id))
    }

    pub fn subspace(&self, id: SubspaceId) -> Result<&crate::bsp::ConvexSubspace, MapError> {
        if (id as usize) < self.bsp.subspace_count() {
            Ok(self.bsp.subspace(id))
        } else {
            Err(MapError::UnknownSubspace(id))
        }
    }

    pub fn segment(&self, id: SegmentId) -> Result<&Segment, MapError> {
        self.segments
            .get(id as usize)
            .ok_or(MapError::UnknownSegment(id))
    }

    pub fn mobj(&self, id: MobjId) -> Result<&Mobj, MapError> {
        self.thinkers.get(id).ok_or(MapError::UnknownMobj(id))
    }

    pub fn mobj_mut(&mut self, id: MobjId) -> Result<&mut Mobj, MapError> {
        self.thinkers.get_mut(id).ok_or(MapError::UnknownMobj(id))
    }

    pub fn lumobj(&self, id: LumobjId) -> Result<&Lumobj, MapError> {
        self.lumobjs
            .get(id as usize)
            .ok_or(MapError::UnknownLumobj(id))
    }

    pub fn vertex_owners(&self, vertex: u32) -> Result<&VertexOwners, MapError> {
        self.vertex_owners
            .get(vertex as usize)
            .ok_or(MapError::UnknownVertex(vertex))
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    pub fn polyobj_count(&self) -> usize {
        self.polyobjs.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn lumobj_count(&self) -> usize {
        self.lumobjs.len()
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn bsp(&self) -> &BspTree {
        &self.bsp
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn thinkers(&self) -> &Thinkers {
        &self.thinkers
    }

    /// A generation counter sized for this map's element populations.
    pub fn new_valid_count(&self) -> ValidCount {
        ValidCount::new(
            self.lines.len(),
            self.sectors.len(),
            self.bsp.subspace_count(),
            self.polyobjs.len(),
        )
    }

    /*──────────────────────── point location ────────────────────────*/

    /// Leaf containing `point`; never fails, void regions included.
    pub fn bsp_leaf_at(&self, point: DVec2) -> BspLeafId {
        self.bsp.leaf_at(point)
    }

    /// Fixed-precision variant for callers that share coordinates with
    /// the sight tracer.
    pub fn bsp_leaf_at_fixed(&self, point: DVec2) -> BspLeafId {
        self.bsp.leaf_at_fixed(point)
    }

    pub fn sector_at(&self, point: DVec2) -> Option<SectorId> {
        self.bsp.leaf(self.bsp.leaf_at(point)).sector
    }

    pub fn subspace_at(&self, point: DVec2) -> Option<SubspaceId> {
        self.bsp.leaf(self.bsp.leaf_at(point)).subspace
    }

    /// Subspace on the far side of a boundary half-edge, found by probing
    /// just past the edge midpoint. `None` for void or degenerate edges.
    pub(crate) fn subspace_behind(&self, hedge: HEdgeId) -> Option<SubspaceId> {
        let a = self.mesh.hedge_from_origin(hedge);
        let b = self.mesh.hedge_to_origin(hedge);
        let d = b - a;
        let len = d.length();
        if len < DIST_EPSILON {
            return None;
        }
        let probe = (a + b) * 0.5 + d.perp() / len * (2.0 * DIST_EPSILON);
        let subspace = self.subspace_at(probe)?;
        // Leaf regions stretch over void, so the located subspace may not
        // actually reach the probe. Accept it only if the probe falls
        // inside its ring.
        let face = self.bsp.subspace(subspace).face;
        for h in self.mesh.face_ring(face) {
            let ra = self.mesh.hedge_from_origin(h);
            let rd = self.mesh.hedge_to_origin(h) - ra;
            let rlen = rd.length();
            if rlen < DIST_EPSILON {
                continue;
            }
            if rd.perp_dot(probe - ra) / rlen > DIST_EPSILON {
                return None;
            }
        }
        Some(subspace)
    }

    /*──────────────────────── box queries ────────────────────────*/

    /// Visit each line whose geometry passes through a blockmap cell
    /// overlapped by `bb`, at most once. Returns `false` if aborted.
    pub fn for_all_lines_in_box(
        &self,
        vc: &mut ValidCount,
        bb: &Aabb,
        flags: LineIterFlags,
        mut func: impl FnMut(LineId) -> bool,
    ) -> bool {
        vc.begin();
        self.line_blockmap.for_all_in_box(bb, |id| {
            if vc.visit_line(id) {
                if flags.contains(LineIterFlags::SECTOR)
                    && self.lines[id as usize].front_sector().is_none()
                {
                    return true;
                }
                return func(id);
            }
            true
        })
    }

    /// Mobjs are blockmap-linked at their origin cell only, so no dedup
    /// stamp is needed. Callers grow `bb` by the largest mobj radius they
    /// care about.
    pub fn for_all_mobjs_in_box(&self, bb: &Aabb, func: impl FnMut(MobjId) -> bool) -> bool {
        self.mobj_blockmap.for_all_in_box(bb, func)
    }

    pub fn for_all_polyobjs_in_box(
        &self,
        vc: &mut ValidCount,
        bb: &Aabb,
        mut func: impl FnMut(PolyobjId) -> bool,
    ) -> bool {
        vc.begin();
        self.polyobj_blockmap.for_all_in_box(bb, |id| {
            if vc.visit_polyobj(id) {
                return func(id);
            }
            true
        })
    }

    pub fn for_all_subspaces_in_box(
        &self,
        vc: &mut ValidCount,
        bb: &Aabb,
        mut func: impl FnMut(SubspaceId) -> bool,
    ) -> bool {
        vc.begin();
        self.subspace_blockmap.for_all_in_box(bb, |id| {
            if vc.visit_subspace(id) {
                return func(id);
            }
            true
        })
    }

    /*──────────────────────── mobj linkage ────────────────────────*/

    pub fn add_mobj(&mut self, origin: DVec3, radius: f64, height: f64) -> MobjId {
        self.thinkers.insert(origin, radius, height)
    }

    /// Unlinks and removes a mobj. Unknown ids error.
    pub fn remove_mobj(&mut self, id: MobjId) -> Result<(), MapError> {
        self.unlink_mobj(id)?;
        self.thinkers.remove(id);
        Ok(())
    }

    /// Link the mobj into the structures named by `flags` at its current
    /// origin. Aspects already linked stay as they are; callers must
    /// unlink before moving a mobj.
    pub fn link_mobj(&mut self, id: MobjId, flags: MobjLinkFlags) -> Result<(), MapError> {
        let (origin, bounds, already) = {
            let m = self.thinkers.get(id).ok_or(MapError::UnknownMobj(id))?;
            (m.origin, m.bounds(), m.linked)
        };
        // Fixed precision keeps leaf assignment consistent with the
        // sight tracer's integer math.
        let leaf = self.bsp.leaf_at_fixed(origin.truncate());
        let sector = self.bsp.leaf(leaf).sector;

        let link_sector = flags.contains(MobjLinkFlags::SECTOR)
            && !already.contains(MobjLinkFlags::SECTOR);
        let link_blockmap = flags.contains(MobjLinkFlags::BLOCKMAP)
            && !already.contains(MobjLinkFlags::BLOCKMAP);
        let link_lines = flags.contains(MobjLinkFlags::LINES)
            && !already.contains(MobjLinkFlags::LINES);

        if link_sector {
            if let Some(s) = sector {
                self.sectors[s as usize].mobjs.push(id);
            }
        }
        if link_blockmap {
            self.mobj_blockmap.link_point(origin.truncate(), id);
        }

        let mut touched: SmallVec<[LineId; 8]> = SmallVec::new();
        if link_lines {
            self.line_blockmap.for_all_in_box(&bounds, |lid| {
                if !touched.contains(&lid) {
                    let line = &self.lines[lid as usize];
                    if (line.front_sector().is_some() || line.back_sector().is_some())
                        && line.bounds.overlaps(&bounds)
                        && line.box_on_side(&bounds) == -1
                    {
                        touched.push(lid);
                    }
                }
                true
            });
            for &lid in &touched {
                self.lines[lid as usize].touching_mobjs.push(id);
            }
        }

        let m = self.thinkers.get_mut(id).ok_or(MapError::UnknownMobj(id))?;
        m.bsp_leaf = Some(leaf);
        if link_sector {
            m.sector = sector;
            m.linked |= MobjLinkFlags::SECTOR;
        }
        if link_blockmap {
            m.linked |= MobjLinkFlags::BLOCKMAP;
        }
        if link_lines {
            m.touching_lines = touched;
            m.linked |= MobjLinkFlags::LINES;
        }
        Ok(())
    }

    /// Undo every aspect of linkage and report what was undone. A second
    /// call is a no-op returning the empty set.
    pub fn unlink_mobj(&mut self, id: MobjId) -> Result<MobjLinkFlags, MapError> {
        let (origin, sector, was, touched) = {
            let m = self.thinkers.get(id).ok_or(MapError::UnknownMobj(id))?;
            (m.origin, m.sector, m.linked, m.touching_lines.clone())
        };
        if was.contains(MobjLinkFlags::SECTOR) {
            if let Some(s) = sector {
                self.sectors[s as usize].mobjs.retain(|&m| m != id);
            }
        }
        if was.contains(MobjLinkFlags::BLOCKMAP) {
            self.mobj_blockmap.unlink_point(origin.truncate(), id);
        }
        if was.contains(MobjLinkFlags::LINES) {
            for &lid in &touched {
                self.lines[lid as usize].touching_mobjs.retain(|&m| m != id);
            }
        }
        let m = self.thinkers.get_mut(id).ok_or(MapError::UnknownMobj(id))?;
        m.linked = MobjLinkFlags::empty();
        m.sector = None;
        m.touching_lines.clear();
        Ok(was)
    }

    /*──────────────────────── polyobj linkage ────────────────────────*/

    pub fn link_polyobj(&mut self, id: PolyobjId) -> Result<(), MapError> {
        let po = self
            .polyobjs
            .get(id as usize)
            .ok_or(MapError::UnknownPolyobj(id))?;
        if po.linked {
            return Ok(());
        }
        let (origin, bounds) = (po.origin, po.bounds);
        self.polyobj_blockmap.link_box(&bounds, id);
        let subspace = self.subspace_at(origin);
        if let Some(ss) = subspace {
            self.bsp.subspace_mut(ss).polyobjs.push(id);
        }
        let po = &mut self.polyobjs[id as usize];
        po.subspace = subspace;
        po.linked = true;
        Ok(())
    }

    pub fn unlink_polyobj(&mut self, id: PolyobjId) -> Result<(), MapError> {
        let po = self
            .polyobjs
            .get(id as usize)
            .ok_or(MapError::UnknownPolyobj(id))?;
        if !po.linked {
            return Ok(());
        }
        let (bounds, subspace) = (po.bounds, po.subspace);
        self.polyobj_blockmap.unlink_box(&bounds, id);
        if let Some(ss) = subspace {
            self.bsp.subspace_mut(ss).polyobjs.retain(|&p| p != id);
        }
        let po = &mut self.polyobjs[id as usize];
        po.subspace = None;
        po.linked = false;
        Ok(())
    }

    /*──────────────────────── touch queries ────────────────────────*/

    pub fn for_all_lines_touching_mobj(
        &self,
        id: MobjId,
        mut func: impl FnMut(LineId) -> bool,
    ) -> Result<bool, MapError> {
        let m = self.thinkers.get(id).ok_or(MapError::UnknownMobj(id))?;
        for &lid in &m.touching_lines {
            if !func(lid) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn for_all_mobjs_touching_line(
        &self,
        id: LineId,
        mut func: impl FnMut(MobjId) -> bool,
    ) -> Result<bool, MapError> {
        let line = self.line(id)?;
        for &m in &line.touching_mobjs {
            if !func(m) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sectors the mobj touches: its own chain sector plus both sides of
    /// every touched line, visited once each. The set is collated first
    /// so the callback may safely relink the same mobj.
    pub fn for_all_sectors_touching_mobj(
        &self,
        vc: &mut ValidCount,
        id: MobjId,
        mut func: impl FnMut(SectorId) -> bool,
    ) -> Result<bool, MapError> {
        let m = self.thinkers.get(id).ok_or(MapError::UnknownMobj(id))?;
        vc.begin();
        let mut collated: SmallVec<[SectorId; 8]> = SmallVec::new();
        if let Some(s) = m.sector {
            if vc.visit_sector(s) {
                collated.push(s);
            }
        }
        for &lid in &m.touching_lines {
            let line = &self.lines[lid as usize];
            for side in &line.sides {
                if let Some(s) = side.sector {
                    if vc.visit_sector(s) {
                        collated.push(s);
                    }
                }
            }
        }
        for s in collated {
            if !func(s) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /*──────────────────────── lumobjs ────────────────────────*/

    pub fn add_lumobj(&mut self, origin: DVec3, radius: f64) -> Result<LumobjId, MapError> {
        if self.lumobjs.len() >= MAX_LUMOBJS {
            return Err(MapError::LumobjLimit);
        }
        self.lumobjs.push(Lumobj { origin, radius });
        Ok((self.lumobjs.len() - 1) as LumobjId)
    }

    /*──────────────────────── clusters ────────────────────────*/

    /// (Re)build the edge-adjacency clusters of one sector. Subspaces
    /// merge when any half-edge of one borders the other; partition
    /// artifacts count, so a convex room split only by the BSP still
    /// forms a single cluster.
    pub fn build_clusters(&mut self, sector: SectorId) -> Result<(), MapError> {
        let subspaces = self.sector(sector)?.subspaces.clone();

        // Neighbor lists restricted to this sector.
        let mut adjacency: Vec<(SubspaceId, Vec<SubspaceId>)> = Vec::new();
        for &ss in &subspaces {
            let mut neighbors = Vec::new();
            let face = self.bsp.subspace(ss).face;
            for h in self.mesh.face_ring(face) {
                if let Some(other) = self.subspace_behind(h) {
                    if other != ss
                        && self.bsp.subspace(other).sector == Some(sector)
                        && !neighbors.contains(&other)
                    {
                        neighbors.push(other);
                    }
                }
            }
            adjacency.push((ss, neighbors));
        }

        // Iterative pairwise merging until no two sets touch.
        let mut sets: Vec<Vec<SubspaceId>> = subspaces.iter().map(|&s| vec![s]).collect();
        loop {
            let mut merged = false;
            'outer: for i in 0..sets.len() {
                for j in (i + 1)..sets.len() {
                    let touches = sets[i].iter().any(|&a| {
                        adjacency
                            .iter()
                            .find(|(s, _)| *s == a)
                            .is_some_and(|(_, n)| sets[j].iter().any(|b| n.contains(b)))
                    });
                    if touches {
                        let absorbed = sets.remove(j);
                        sets[i].extend(absorbed);
                        merged = true;
                        break 'outer;
                    }
                }
            }
            if !merged {
                break;
            }
        }

        let mut clusters = Vec::with_capacity(sets.len());
        for (idx, members) in sets.into_iter().enumerate() {
            let mut bounds = Aabb::empty();
            for &ss in &members {
                bounds.expand(&self.bsp.subspace(ss).bounds);
                self.bsp.subspace_mut(ss).cluster = Some(idx);
            }
            clusters.push(SectorCluster {
                sector,
                subspaces: members,
                bounds,
            });
        }
        self.sectors[sector as usize].clusters = clusters;
        Ok(())
    }

    /*──────────────────────── line of sight ────────────────────────*/

    /// Is there an unobstructed straight path between `from` and `to`
    /// within the given slope cone?
    pub fn check_line_of_sight(
        &self,
        vc: &mut ValidCount,
        from: DVec3,
        to: DVec3,
        bottom_slope: f64,
        top_slope: f64,
        flags: SightFlags,
    ) -> bool {
        LineSightTest::new(self, vc, from, to, bottom_slope, top_slope, flags).trace()
    }

    /*──────────────────────── teardown ────────────────────────*/

    /// Consumes the map, notifying the listener before the data drops.
    pub fn dismantle(self, listener: &mut dyn BuildListener) {
        listener.map_deleted();
    }
}

#[cfg(test)]
mod tests {
    use glam::{DVec2, DVec3};

    use super::*;
    use crate::testutil::{
        RecordingListener, square_room, two_connected_rooms, two_disjoint_rooms,
    };

    const BORDER: LineId = 3; // fixture creation order

    #[test]
    fn point_location_agrees_between_float_and_fixed() {
        let map = two_connected_rooms();
        for &(x, y, sector) in &[(64.0, 64.0, 0), (192.0, 64.0, 1), (130.0, 100.0, 1)] {
            let p = DVec2::new(x, y);
            assert_eq!(map.sector_at(p), Some(sector), "at {p:?}");
            assert_eq!(map.bsp_leaf_at(p), map.bsp_leaf_at_fixed(p), "at {p:?}");
        }
    }

    #[test]
    fn box_query_finds_the_border_once() {
        let map = two_connected_rooms();
        let mut vc = map.new_valid_count();
        // The box straddles a cell boundary; cell-granular queries may
        // report other lines sharing those cells, but never a line twice.
        let bb = Aabb::from_points(DVec2::new(120.0, 56.0), DVec2::new(136.0, 72.0));
        let mut hits = Vec::new();
        map.for_all_lines_in_box(&mut vc, &bb, LineIterFlags::empty(), |id| {
            hits.push(id);
            true
        });
        assert_eq!(hits.iter().filter(|&&id| id == BORDER).count(), 1);
        let mut dedup = hits.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), hits.len());
    }

    #[test]
    fn box_query_abort_stops_iteration() {
        let map = square_room(128.0);
        let mut vc = map.new_valid_count();
        let mut seen = 0;
        let completed = map.for_all_lines_in_box(
            &mut vc,
            map.bounds(),
            LineIterFlags::empty(),
            |_| {
                seen += 1;
                false
            },
        );
        assert!(!completed);
        assert_eq!(seen, 1);
    }

    #[test]
    fn mobj_linking_round_trip() {
        let mut map = two_connected_rooms();
        let id = map.add_mobj(DVec3::new(126.0, 64.0, 10.0), 8.0, 56.0);
        map.link_mobj(id, MobjLinkFlags::all()).unwrap();

        let m = map.mobj(id).unwrap();
        assert_eq!(m.sector, Some(0));
        assert_eq!(
            m.bsp_leaf,
            Some(map.bsp_leaf_at_fixed(DVec2::new(126.0, 64.0)))
        );
        assert!(m.touching_lines.contains(&BORDER));
        let mut back = Vec::new();
        map.for_all_mobjs_touching_line(BORDER, |m| {
            back.push(m);
            true
        })
        .unwrap();
        assert_eq!(back, vec![id]);

        let mut vc = map.new_valid_count();
        let mut sectors = Vec::new();
        map.for_all_sectors_touching_mobj(&mut vc, id, |s| {
            sectors.push(s);
            true
        })
        .unwrap();
        assert!(sectors.contains(&0));
        assert!(sectors.contains(&1)); // reaches through the border

        let undone = map.unlink_mobj(id).unwrap();
        assert_eq!(undone, MobjLinkFlags::all());
        assert_eq!(map.unlink_mobj(id).unwrap(), MobjLinkFlags::empty());
        let m = map.mobj(id).unwrap();
        assert_eq!(m.sector, None);
        assert!(m.touching_lines.is_empty());
        let mut any = false;
        map.for_all_mobjs_touching_line(BORDER, |_| {
            any = true;
            true
        })
        .unwrap();
        assert!(!any);
    }

    #[test]
    fn remove_mobj_unlinks_first() {
        let mut map = square_room(128.0);
        let id = map.add_mobj(DVec3::new(64.0, 64.0, 0.0), 16.0, 56.0);
        map.link_mobj(id, MobjLinkFlags::all()).unwrap();
        map.remove_mobj(id).unwrap();
        assert!(matches!(map.mobj(id), Err(MapError::UnknownMobj(_))));
        assert!(map.sector(0).unwrap().mobjs.is_empty());
    }

    #[test]
    fn connected_rooms_form_one_cluster_each() {
        let map = two_connected_rooms();
        assert_eq!(map.sector(0).unwrap().clusters.len(), 1);
        assert_eq!(map.sector(1).unwrap().clusters.len(), 1);
    }

    #[test]
    fn disjoint_rooms_split_their_sector_into_two_clusters() {
        let map = two_disjoint_rooms();
        let sector = map.sector(0).unwrap();
        assert_eq!(sector.clusters.len(), 2);
        let total: usize = sector.clusters.iter().map(|c| c.subspaces.len()).sum();
        assert_eq!(total, sector.subspaces.len());
    }

    #[test]
    fn lumobj_limit_is_enforced() {
        let mut map = square_room(128.0);
        let origin = DVec3::new(64.0, 64.0, 32.0);
        for _ in 0..MAX_LUMOBJS {
            map.add_lumobj(origin, 32.0).unwrap();
        }
        assert_eq!(map.add_lumobj(origin, 32.0), Err(MapError::LumobjLimit));
    }

    #[test]
    fn unknown_ids_error() {
        let map = square_room(128.0);
        assert_eq!(map.line(99).err(), Some(MapError::UnknownLine(99)));
        assert_eq!(map.sector(99).err(), Some(MapError::UnknownSector(99)));
        assert_eq!(map.mobj(7).err(), Some(MapError::UnknownMobj(7)));
    }

    #[test]
    fn sector_split_by_an_open_border_stays_one_cluster() {
        use crate::bsp::NullListener;
        use crate::testutil::{add_ring, rect_ring};

        let mut editor = MapEditor::new();
        let s = editor.create_sector(1.0, 0.0, 128.0);
        add_ring(
            &mut editor,
            &rect_ring(DVec2::ZERO, DVec2::new(256.0, 128.0)),
            s,
        );
        let a = editor.create_vertex(DVec2::new(128.0, 0.0));
        let b = editor.create_vertex(DVec2::new(128.0, 128.0));
        editor
            .create_line(a, b, LineFlags::empty(), Some(s), Some(s))
            .unwrap();
        let map = editor.end_editing(&mut NullListener).unwrap();

        let sector = map.sector(s).unwrap();
        assert_eq!(sector.subspaces.len(), 2);
        assert_eq!(sector.clusters.len(), 1);
    }

    #[test]
    fn dismantle_notifies_listener() {
        let map = square_room(128.0);
        let mut listener = RecordingListener::default();
        map.dismantle(&mut listener);
        assert!(listener.deleted);
    }
}

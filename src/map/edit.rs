//! Map editing and finalization.
//!
//! A map starts life in a [`MapEditor`], which accepts raw vertexes,
//! lines, sectors and polyobjs in any order. [`MapEditor::end_editing`]
//! consumes the editor and runs the finalization pipeline: vertex
//! pruning, owner rings, window detection, the BSP build, blockmaps and
//! per-sector wiring. Only a successful pipeline yields a [`Map`], so
//! spatial queries can never observe a half-built world.

use glam::{DVec2, DVec3};
use log::{debug, info, warn};
use thiserror::Error;

use crate::blockmap::{Blockmap, CELL_SIZE};
use crate::bsp::{self, BuildListener, DEFAULT_SPLIT_COST_FACTOR};
use crate::geom::Aabb;
use crate::map::line::{FRONT, Line, LineFlags, LineId, Segment, SegmentId};
use crate::map::mobj::Thinkers;
use crate::map::polyobj::{Polyobj, PolyobjId};
use crate::map::sector::{Sector, SectorId};
use crate::map::window;
use crate::map::{Map, MapError, VertexOwners};
use crate::mesh::{Mesh, SegmentRef, VertexId};
use crate::valid::ValidCount;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("map has no line geometry")]
    EmptyMap,
    #[error(transparent)]
    Map(#[from] MapError),
}

/// Accumulates editable map data until finalization.
pub struct MapEditor {
    mesh: Mesh,
    lines: Vec<Line>,
    sectors: Vec<Sector>,
    polyobjs: Vec<Polyobj>,
    split_cost_factor: i32,
}

impl Default for MapEditor {
    fn default() -> MapEditor {
        MapEditor::new()
    }
}

impl MapEditor {
    pub fn new() -> MapEditor {
        MapEditor {
            mesh: Mesh::new(),
            lines: Vec::new(),
            sectors: Vec::new(),
            polyobjs: Vec::new(),
            split_cost_factor: DEFAULT_SPLIT_COST_FACTOR,
        }
    }

    /// Tune the cost the partitioner attributes to splitting a segment.
    pub fn set_split_cost_factor(&mut self, factor: i32) {
        self.split_cost_factor = factor;
    }

    pub fn create_vertex(&mut self, origin: DVec2) -> VertexId {
        self.mesh.new_vertex(origin)
    }

    pub fn create_sector(
        &mut self,
        light_level: f32,
        floor_height: f64,
        ceiling_height: f64,
    ) -> SectorId {
        self.sectors
            .push(Sector::new(light_level, floor_height, ceiling_height));
        (self.sectors.len() - 1) as SectorId
    }

    pub fn create_line(
        &mut self,
        from: VertexId,
        to: VertexId,
        flags: LineFlags,
        front_sector: Option<SectorId>,
        back_sector: Option<SectorId>,
    ) -> Result<LineId, MapError> {
        for v in [from, to] {
            if v as usize >= self.mesh.vertex_count() {
                return Err(MapError::UnknownVertex(v));
            }
        }
        for s in [front_sector, back_sector].into_iter().flatten() {
            if s as usize >= self.sectors.len() {
                return Err(MapError::UnknownSector(s));
            }
        }
        self.lines
            .push(Line::new(&self.mesh, from, to, flags, front_sector, back_sector));
        Ok((self.lines.len() - 1) as LineId)
    }

    /// Registers a polyobj over already-created lines. The lines are
    /// withdrawn from static geometry and follow the polyobj instead.
    pub fn create_polyobj(
        &mut self,
        origin: DVec2,
        lines: Vec<LineId>,
    ) -> Result<PolyobjId, MapError> {
        for &l in &lines {
            if l as usize >= self.lines.len() {
                return Err(MapError::UnknownLine(l));
            }
        }
        let id = self.polyobjs.len() as PolyobjId;
        for &l in &lines {
            self.lines[l as usize].polyobj = Some(id);
        }
        let mut po = Polyobj::new(origin);
        po.lines = lines;
        self.polyobjs.push(po);
        Ok(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Finalize the map. Build diagnostics (one-way windows, unclosed
    /// sectors) go to `listener` as they are discovered.
    pub fn end_editing(mut self, listener: &mut dyn BuildListener) -> Result<Map, BuildError> {
        if self.lines.is_empty() {
            return Err(BuildError::EmptyMap);
        }

        prune_vertexes(&mut self.mesh, &mut self.lines);

        // Lines with a single sector are solid by definition.
        for line in &mut self.lines {
            if line.front_sector().is_some() != line.back_sector().is_some() {
                line.flags |= LineFlags::BLOCKING;
            }
        }

        let vertex_owners = build_vertex_owners(&self.mesh, &self.lines);

        let mut bounds = Aabb::empty();
        for line in &self.lines {
            bounds.expand(&line.bounds);
        }

        let mut line_blockmap = Blockmap::new(bounds.grown(8.0), CELL_SIZE);
        for (id, line) in self.lines.iter().enumerate() {
            line_blockmap.link_line(line.from_origin, line.to_origin, id as LineId);
        }

        // Window scan runs before the BSP so the partitioner can close
        // the open backs of confirmed windows.
        let mut vc = ValidCount::new(self.lines.len(), self.sectors.len(), 0, 0);
        let effects = window::find_one_way_windows(
            &self.lines,
            &vertex_owners,
            &bounds,
            &line_blockmap,
            &mut vc,
        );
        for effect in effects {
            info!(
                "line {} is a one-way window into sector {}",
                effect.line, effect.back_open
            );
            listener.one_way_window(effect.line, effect.back_open);
            self.lines[effect.line as usize].window_sector = Some(effect.back_open);
        }

        // Polyobj lines become mesh geometry of their own, outside the BSP.
        let mut segments: Vec<Segment> = Vec::new();
        for po_index in 0..self.polyobjs.len() {
            let mut po_bounds = Aabb::empty();
            let line_ids = self.polyobjs[po_index].lines.clone();
            for lid in line_ids {
                let line = &self.lines[lid as usize];
                let (from, to, length, line_bounds) =
                    (line.from, line.to, line.length, line.bounds);
                let (hedge, _) = self.mesh.new_hedge_pair(from, to);
                self.mesh.hedge_mut(hedge).segment = Some(SegmentRef {
                    line: lid,
                    side: FRONT,
                });
                let seg_id = segments.len() as SegmentId;
                segments.push(Segment {
                    hedge,
                    line: lid,
                    side: FRONT,
                    length,
                    offset: 0.0,
                });
                self.lines[lid as usize].sides[FRONT].segments.push(seg_id);
                po_bounds.expand(&line_bounds);
            }
            self.polyobjs[po_index].bounds = po_bounds;
        }

        let participating: Vec<LineId> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.polyobj.is_none())
            .map(|(id, _)| id as LineId)
            .collect();

        debug!(
            "building BSP over {} line(s), split cost factor {}",
            participating.len(),
            self.split_cost_factor
        );
        let built = bsp::build(
            &mut self.mesh,
            &self.lines,
            &participating,
            self.split_cost_factor,
            listener,
        )
        .ok_or(BuildError::EmptyMap)?;
        info!(
            "BSP: {} node(s), {} leaf(s), {} subspace(s), {} segment(s), {} vertex(es) added",
            built.tree.node_count(),
            built.tree.leaf_count(),
            built.tree.subspace_count(),
            built.tree.segment_count(),
            built.tree.vertexes_added()
        );

        for seg in built.segments {
            let id = segments.len() as SegmentId;
            self.lines[seg.line as usize].sides[seg.side].segments.push(id);
            segments.push(seg);
        }
        for line in &mut self.lines {
            for side in &mut line.sides {
                side.segments.sort_by(|&a, &b| {
                    segments[a as usize]
                        .offset
                        .total_cmp(&segments[b as usize].offset)
                });
            }
        }

        for line in &mut self.lines {
            setup_surfaces(line, &self.sectors);
        }

        let mut subspace_blockmap = Blockmap::new(bounds.grown(8.0), CELL_SIZE);
        for (i, ss) in built.tree.subspaces().iter().enumerate() {
            if !ss.bounds.is_empty() {
                subspace_blockmap.link_box(&ss.bounds, i as u32);
            }
        }

        let mut map = Map {
            mesh: self.mesh,
            lines: self.lines,
            sectors: self.sectors,
            polyobjs: self.polyobjs,
            segments,
            vertex_owners,
            bounds,
            bsp: built.tree,
            line_blockmap,
            mobj_blockmap: Blockmap::new(bounds.grown(8.0), CELL_SIZE),
            polyobj_blockmap: Blockmap::new(bounds.grown(8.0), CELL_SIZE),
            subspace_blockmap,
            thinkers: Thinkers::new(),
            lumobjs: Vec::new(),
        };

        // Sector wiring: referencing sides, attributed subspaces, bounds
        // and the emitter chains.
        for lid in 0..map.lines.len() {
            for si in 0..2 {
                if let Some(s) = map.lines[lid].sides[si].sector {
                    map.sectors[s as usize].sides.push((lid as LineId, si));
                }
            }
        }
        for ssid in 0..map.bsp.subspace_count() {
            let ss = map.bsp.subspace(ssid as u32);
            if let Some(s) = ss.sector {
                let ss_bounds = ss.bounds;
                let sector = &mut map.sectors[s as usize];
                sector.subspaces.push(ssid as u32);
                sector.bounds.expand(&ss_bounds);
            }
        }
        for s in 0..map.sectors.len() {
            map.sectors[s].chain_sound_emitters();
        }

        for po in 0..map.polyobjs.len() {
            map.link_polyobj(po as PolyobjId)?;
        }
        for s in 0..map.sectors.len() {
            map.build_clusters(s as SectorId)?;
        }

        Ok(map)
    }
}

/// Merge vertexes sharing integer-rounded coordinates, rewrite line
/// endpoints, then drop every vertex no line references.
fn prune_vertexes(mesh: &mut Mesh, lines: &mut [Line]) {
    let n = mesh.vertex_count();
    if n == 0 {
        return;
    }

    let key = |v: u32| {
        let o = mesh.vertex_origin(v);
        (o.x as i64, o.y as i64)
    };
    let mut order: Vec<u32> = (0..n as u32).collect();
    order.sort_by_key(|&v| (key(v), v));

    let mut rep: Vec<u32> = (0..n as u32).collect();
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && key(order[j]) == key(order[i]) {
            rep[order[j] as usize] = order[i];
            j += 1;
        }
        i = j;
    }
    for line in lines.iter_mut() {
        line.from = rep[line.from as usize];
        line.to = rep[line.to as usize];
    }

    let mut used = vec![false; n];
    for line in lines.iter() {
        used[line.from as usize] = true;
        used[line.to as usize] = true;
    }
    let mut remap = vec![0u32; n];
    let old = std::mem::take(&mut mesh.vertices);
    for (idx, vertex) in old.into_iter().enumerate() {
        if used[idx] {
            remap[idx] = mesh.vertices.len() as u32;
            mesh.vertices.push(vertex);
        }
    }
    let kept = mesh.vertices.len();
    for line in lines.iter_mut() {
        line.from = remap[line.from as usize];
        line.to = remap[line.to as usize];
        line.update_geometry(mesh);
    }
    if kept < n {
        debug!("pruned {} vertex(es)", n - kept);
    }
}

/// Per-vertex owner rings: incident lines sorted clockwise by outgoing
/// angle, with one-/two-sided counts.
fn build_vertex_owners(mesh: &Mesh, lines: &[Line]) -> Vec<VertexOwners> {
    let mut tips: Vec<Vec<(f64, LineId)>> = vec![Vec::new(); mesh.vertex_count()];
    let mut counts: Vec<(u16, u16)> = vec![(0, 0); mesh.vertex_count()];

    for (id, line) in lines.iter().enumerate() {
        let one_sided = line.front_sector().is_some() != line.back_sector().is_some();
        let two_sided = line.is_two_sided();
        if line.from == line.to {
            warn!("line {id} loops on vertex {}", line.from);
        }
        for (k, (v, dir)) in [(line.from, line.direction), (line.to, -line.direction)]
            .into_iter()
            .enumerate()
        {
            if k == 1 && line.from == line.to {
                continue; // Count a degenerate loop once.
            }
            tips[v as usize].push((dir.y.atan2(dir.x), id as LineId));
            let c = &mut counts[v as usize];
            if one_sided {
                c.0 += 1;
            } else if two_sided {
                c.1 += 1;
            }
        }
    }

    tips.into_iter()
        .zip(counts)
        .map(|(mut list, (ones, twos))| {
            list.sort_by(|a, b| b.0.total_cmp(&a.0)); // clockwise
            VertexOwners {
                owners: list.into_iter().map(|(_, id)| id).collect(),
                ones,
                twos,
            }
        })
        .collect()
}

/// Wall surface normals and sound emitter origins, derived from the
/// line geometry and the adjoining sector planes.
fn setup_surfaces(line: &mut Line, sectors: &[Sector]) {
    if line.length <= 0.0 {
        return;
    }
    let d = line.direction / line.length;
    let center = line.center();
    for si in 0..2 {
        let heights = line.sides[si]
            .sector
            .map(|s| (sectors[s as usize].floor.height, sectors[s as usize].ceiling.height));
        let normal = if si == FRONT {
            DVec3::new(d.y, -d.x, 0.0)
        } else {
            DVec3::new(-d.y, d.x, 0.0)
        };
        if let Some(sections) = &mut line.sides[si].sections {
            let (floor, ceiling) = heights.unwrap_or((0.0, 0.0));
            let at = |z: f64| DVec3::new(center.x, center.y, z);
            sections.middle.normal = normal;
            sections.middle.emitter.origin = at((floor + ceiling) * 0.5);
            sections.bottom.normal = normal;
            sections.bottom.emitter.origin = at(floor);
            sections.top.normal = normal;
            sections.top.emitter.origin = at(ceiling);
        }
    }
}

//! Recursive space partitioner.
//!
//! Clips every participating line side into directed segments, then
//! recursively divides the set: pick the cheapest partition candidate,
//! split spanning segments at deduplicated mesh vertexes, close the gaps
//! along the partition line with closure segments so every region keeps a
//! watertight boundary, and emit a convex leaf once no candidate divides
//! the remaining map segments.

use std::cmp::Ordering;

use glam::DVec2;
use log::{debug, warn};

use crate::bsp::evaluate;
use crate::bsp::seg::{LineSeg, SegIdx};
use crate::bsp::superblock::SuperBlocks;
use crate::bsp::tree::{BspElement, BspLeaf, BspLeafId, BspNode, BspTree, ConvexSubspace};
use crate::bsp::BuildListener;
use crate::geom::{Aabb, DIST_EPSILON, Partition};
use crate::map::line::{BACK, FRONT, Line, LineId, Segment};
use crate::map::sector::SectorId;
use crate::mesh::{Mesh, SegmentRef, VertexId};

/// Tolerance for tip angles when probing openness around a vertex.
const ANGLE_EPSILON: f64 = 1e-6;

/// Everything the partitioner produces besides mesh geometry.
pub struct BspBuildResult {
    pub tree: BspTree,
    pub segments: Vec<Segment>,
}

/// Builds the BSP for `participating` lines. Returns `None` only when
/// there is no usable line data at all.
pub fn build(
    mesh: &mut Mesh,
    lines: &[Line],
    participating: &[LineId],
    split_cost_factor: i32,
    listener: &mut dyn BuildListener,
) -> Option<BspBuildResult> {
    let vertexes_before = mesh.vertex_count();
    let mut p = Partitioner {
        mesh,
        lines,
        factor: split_cost_factor,
        listener,
        segs: Vec::new(),
        elements: Vec::new(),
        leafs: Vec::new(),
        subspaces: Vec::new(),
        segments: Vec::new(),
    };

    let work = p.create_initial_segs(participating);
    if work.is_empty() {
        return None;
    }
    let mut bounds = Aabb::empty();
    for &i in &work {
        bounds.expand(&p.segs[i].bounds());
    }
    let root = p.divide(work, bounds.grown(8.0));

    let segment_count = p.segs.len();
    let tree = BspTree {
        elements: p.elements,
        root,
        leafs: p.leafs,
        subspaces: p.subspaces,
        segment_count,
        vertexes_added: p.mesh.vertex_count() - vertexes_before,
    };
    Some(BspBuildResult {
        tree,
        segments: p.segments,
    })
}

/// A point where segment geometry touches the current partition line,
/// parameterized by distance along the partition direction.
struct Cut {
    t: f64,
    vertex: VertexId,
}

/// Outgoing edge direction at a vertex with the sectors to either side,
/// used to decide whether the space bracketing an angle is open.
struct Tip {
    angle: f64,
    right: Option<SectorId>,
    left: Option<SectorId>,
}

struct Partitioner<'a> {
    mesh: &'a mut Mesh,
    lines: &'a [Line],
    factor: i32,
    listener: &'a mut dyn BuildListener,
    segs: Vec<LineSeg>,
    elements: Vec<BspElement>,
    leafs: Vec<BspLeaf>,
    subspaces: Vec<ConvexSubspace>,
    segments: Vec<Segment>,
}

impl Partitioner<'_> {
    /// One segment per side with geometry. One-way windows contribute a
    /// sector-bearing closure segment for their open back so that leaf
    /// attribution behind the window works out.
    fn create_initial_segs(&mut self, participating: &[LineId]) -> Vec<SegIdx> {
        let mut work = Vec::new();
        for &id in participating {
            let line = &self.lines[id as usize];
            if line.has_zero_length() {
                warn!("line {id} has zero length; not partitioned");
                continue;
            }
            let front_sector = line.front_sector();
            let back_sector = line.back_sector();
            let window = line.window_sector;

            work.push(self.segs.len());
            self.segs.push(LineSeg {
                from: line.from_origin,
                to: line.to_origin,
                from_vertex: line.from,
                to_vertex: line.to,
                line_side: Some((id, FRONT)),
                sector: front_sector,
                back_sector: back_sector.or(window),
            });

            if back_sector.is_some() {
                work.push(self.segs.len());
                self.segs.push(LineSeg {
                    from: line.to_origin,
                    to: line.from_origin,
                    from_vertex: line.to,
                    to_vertex: line.from,
                    line_side: Some((id, BACK)),
                    sector: back_sector,
                    back_sector: front_sector,
                });
            } else if let Some(window_sector) = window {
                work.push(self.segs.len());
                self.segs.push(LineSeg {
                    from: line.to_origin,
                    to: line.from_origin,
                    from_vertex: line.to,
                    to_vertex: line.from,
                    line_side: None,
                    sector: Some(window_sector),
                    back_sector: front_sector,
                });
            }
        }
        work
    }

    fn divide(&mut self, work: Vec<SegIdx>, region_bounds: Aabb) -> u32 {
        let mut blocks = SuperBlocks::new(region_bounds);
        for &i in &work {
            blocks.push(&self.segs[i], i);
        }
        let Some(part_idx) = evaluate::choose_partition(&self.segs, &work, &blocks, self.factor)
        else {
            return self.make_leaf(&work);
        };

        let partition = Partition::new(
            self.segs[part_idx].from,
            self.segs[part_idx].direction(),
        );
        let pdir = partition.direction.normalize();

        let mut front: Vec<SegIdx> = Vec::new();
        let mut back: Vec<SegIdx> = Vec::new();
        let mut on_line: Vec<SegIdx> = Vec::new();
        let mut cuts: Vec<Cut> = Vec::new();

        for idx in work {
            let (a, b) = {
                let s = &self.segs[idx];
                (partition.perp_distance(s.from), partition.perp_distance(s.to))
            };
            if a.abs() <= DIST_EPSILON && b.abs() <= DIST_EPSILON {
                // Collinear with the partition; direction picks the side.
                self.record_cut(&mut cuts, &partition, pdir, self.segs[idx].from_vertex);
                self.record_cut(&mut cuts, &partition, pdir, self.segs[idx].to_vertex);
                on_line.push(idx);
                if self.segs[idx].direction().dot(partition.direction) >= 0.0 {
                    front.push(idx);
                } else {
                    back.push(idx);
                }
            } else if a <= DIST_EPSILON && b <= DIST_EPSILON {
                if a.abs() <= DIST_EPSILON {
                    self.record_cut(&mut cuts, &partition, pdir, self.segs[idx].from_vertex);
                } else if b.abs() <= DIST_EPSILON {
                    self.record_cut(&mut cuts, &partition, pdir, self.segs[idx].to_vertex);
                }
                front.push(idx);
            } else if a >= -DIST_EPSILON && b >= -DIST_EPSILON {
                if a.abs() <= DIST_EPSILON {
                    self.record_cut(&mut cuts, &partition, pdir, self.segs[idx].from_vertex);
                } else if b.abs() <= DIST_EPSILON {
                    self.record_cut(&mut cuts, &partition, pdir, self.segs[idx].to_vertex);
                }
                back.push(idx);
            } else {
                let tail = self.split_seg(idx, &partition);
                self.record_cut(&mut cuts, &partition, pdir, self.segs[idx].to_vertex);
                if a < 0.0 {
                    front.push(idx);
                    back.push(tail);
                } else {
                    back.push(idx);
                    front.push(tail);
                }
            }
        }

        self.close_partition_gaps(&partition, pdir, cuts, &on_line, &mut front, &mut back);

        let front_bounds = self.bounds_of(&front);
        let back_bounds = self.bounds_of(&back);
        let front_child = self.divide(front, front_bounds.grown(8.0));
        let back_child = self.divide(back, back_bounds.grown(8.0));

        self.elements.push(BspElement::Node(BspNode {
            partition,
            bounds: [front_bounds, back_bounds],
            children: [front_child, back_child],
        }));
        (self.elements.len() - 1) as u32
    }

    /// Splits `idx` where it crosses the partition, reusing a mesh vertex
    /// within epsilon of the intersection. Returns the tail fragment.
    fn split_seg(&mut self, idx: SegIdx, partition: &Partition) -> SegIdx {
        let (from, dir) = (self.segs[idx].from, self.segs[idx].direction());
        let frac = partition.intersect_fraction(from, dir);
        let v = self
            .mesh
            .find_or_insert_vertex(from + dir * frac, DIST_EPSILON);
        let at = self.mesh.vertex_origin(v);

        let tail_idx = self.segs.len();
        let seg = &mut self.segs[idx];
        let tail = LineSeg {
            from: at,
            to: seg.to,
            from_vertex: v,
            to_vertex: seg.to_vertex,
            line_side: seg.line_side,
            sector: seg.sector,
            back_sector: seg.back_sector,
        };
        seg.to = at;
        seg.to_vertex = v;
        self.segs.push(tail);
        tail_idx
    }

    fn record_cut(&self, cuts: &mut Vec<Cut>, partition: &Partition, pdir: DVec2, v: VertexId) {
        let t = (self.mesh.vertex_origin(v) - partition.origin).dot(pdir);
        cuts.push(Cut { t, vertex: v });
    }

    /// Creates closure segment pairs over the open spans of the partition
    /// line, so both child regions stay bounded. A span is open when no
    /// collinear segment covers it and the sectors probed at both of its
    /// ends agree that map interior touches the line there.
    fn close_partition_gaps(
        &mut self,
        partition: &Partition,
        pdir: DVec2,
        mut cuts: Vec<Cut>,
        on_line: &[SegIdx],
        front: &mut Vec<SegIdx>,
        back: &mut Vec<SegIdx>,
    ) {
        cuts.sort_by(|a, b| {
            a.t.partial_cmp(&b.t)
                .unwrap_or(Ordering::Equal)
                .then(a.vertex.cmp(&b.vertex))
        });
        cuts.dedup_by(|next, prev| (next.t - prev.t).abs() <= DIST_EPSILON);

        let covered: Vec<(f64, f64)> = on_line
            .iter()
            .map(|&i| {
                let s = &self.segs[i];
                let t0 = (s.from - partition.origin).dot(pdir);
                let t1 = (s.to - partition.origin).dot(pdir);
                (t0.min(t1), t0.max(t1))
            })
            .collect();

        let mut spans: Vec<(VertexId, VertexId, SectorId)> = Vec::new();
        for pair in cuts.windows(2) {
            let (c0, c1) = (&pair[0], &pair[1]);
            if c1.t - c0.t <= DIST_EPSILON {
                continue;
            }
            let mid = 0.5 * (c0.t + c1.t);
            if covered.iter().any(|&(lo, hi)| lo <= mid && mid <= hi) {
                continue;
            }
            let fwd = self.sector_open_at(front, back, c0.vertex, pdir);
            let rev = self.sector_open_at(front, back, c1.vertex, -pdir);
            match (fwd, rev) {
                (Some(s0), Some(s1)) => {
                    if s0 != s1 {
                        warn!(
                            "partition span near {:?} bordered by sectors {s0} and {s1}",
                            partition.origin + pdir * mid
                        );
                    }
                    spans.push((c0.vertex, c1.vertex, s0));
                }
                (None, None) => {}
                _ => {
                    debug!(
                        "half-open span along partition near {:?}",
                        partition.origin + pdir * mid
                    );
                }
            }
        }

        for (v0, v1, sector) in spans {
            let p0 = self.mesh.vertex_origin(v0);
            let p1 = self.mesh.vertex_origin(v1);
            front.push(self.segs.len());
            self.segs.push(LineSeg {
                from: p0,
                to: p1,
                from_vertex: v0,
                to_vertex: v1,
                line_side: None,
                sector: Some(sector),
                back_sector: Some(sector),
            });
            back.push(self.segs.len());
            self.segs.push(LineSeg {
                from: p1,
                to: p0,
                from_vertex: v1,
                to_vertex: v0,
                line_side: None,
                sector: Some(sector),
                back_sector: Some(sector),
            });
        }
    }

    /// Which sector, if any, occupies the space leaving `vertex` in
    /// direction `dir`? Probes the angular gap between the edge tips
    /// incident at the vertex; `None` means the space there is void.
    fn sector_open_at(
        &self,
        front: &[SegIdx],
        back: &[SegIdx],
        vertex: VertexId,
        dir: DVec2,
    ) -> Option<SectorId> {
        let mut tips: Vec<Tip> = Vec::new();
        for &i in front.iter().chain(back.iter()) {
            let s = &self.segs[i];
            if s.from_vertex == vertex {
                let d = s.direction();
                tips.push(Tip {
                    angle: d.y.atan2(d.x),
                    right: s.sector,
                    left: s.back_sector,
                });
            }
            if s.to_vertex == vertex {
                let d = -s.direction();
                tips.push(Tip {
                    angle: d.y.atan2(d.x),
                    right: s.back_sector,
                    left: s.sector,
                });
            }
        }
        if tips.is_empty() {
            return None;
        }
        tips.sort_by(|a, b| a.angle.partial_cmp(&b.angle).unwrap_or(Ordering::Equal));

        let angle = dir.y.atan2(dir.x);
        for tip in &tips {
            if tip.angle > angle + ANGLE_EPSILON {
                return tip.right;
            }
        }
        // Wrapped past the highest tip.
        tips[0].right
    }

    fn bounds_of(&self, set: &[SegIdx]) -> Aabb {
        let mut bounds = Aabb::empty();
        for &i in set {
            bounds.expand(&self.segs[i].bounds());
        }
        bounds
    }

    /// Assembles a convex leaf from the remaining segments: orders them
    /// clockwise around the centroid, stitches a half-edge ring, and
    /// records the map segments clipped from line sides.
    fn make_leaf(&mut self, work: &[SegIdx]) -> u32 {
        let leaf_id = self.leafs.len() as BspLeafId;

        let sector = work
            .iter()
            .filter_map(|&i| {
                let s = &self.segs[i];
                if s.is_map() { s.sector } else { None }
            })
            .next()
            .or_else(|| work.iter().filter_map(|&i| self.segs[i].sector).next());

        if work.len() < 3 {
            if !work.is_empty() {
                warn!(
                    "degenerate leaf with {} segment(s) near {:?}",
                    work.len(),
                    self.segs[work[0]].from
                );
            }
            self.leafs.push(BspLeaf {
                subspace: None,
                sector,
            });
            self.elements.push(BspElement::Leaf(leaf_id));
            return (self.elements.len() - 1) as u32;
        }

        if sector.is_none() {
            warn!(
                "leaf with {} segment(s) near {:?} has no sector",
                work.len(),
                self.segs[work[0]].from
            );
        }

        let mut centroid = DVec2::ZERO;
        for &i in work {
            centroid += self.segs[i].midpoint();
        }
        centroid /= work.len() as f64;

        let mut sorted: Vec<(f64, SegIdx)> = work
            .iter()
            .map(|&i| {
                let d = self.segs[i].midpoint() - centroid;
                (d.y.atan2(d.x), i)
            })
            .collect();
        // Descending angle = clockwise winding, interior on each
        // segment's front.
        sorted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut bounds = Aabb::empty();
        for &(_, i) in &sorted {
            bounds.expand(&self.segs[i].bounds());
        }

        for w in 0..sorted.len() {
            let cur = &self.segs[sorted[w].1];
            let next = &self.segs[sorted[(w + 1) % sorted.len()].1];
            if cur.to.distance(next.from) > DIST_EPSILON {
                if let Some(sector) = sector {
                    self.listener.unclosed_sector(sector, cur.to);
                }
                break;
            }
        }

        let mut ring = Vec::with_capacity(sorted.len());
        for &(_, i) in &sorted {
            let seg = &self.segs[i];
            let (hedge, _) = self.mesh.new_hedge_pair(seg.from_vertex, seg.to_vertex);
            self.mesh.hedge_mut(hedge).segment = seg
                .line_side
                .map(|(line, side)| SegmentRef { line, side });
            ring.push(hedge);
        }
        for w in 0..ring.len() {
            self.mesh.hedge_mut(ring[w]).next = Some(ring[(w + 1) % ring.len()]);
        }
        let face = self.mesh.new_face(ring[0], ring.len() as u32, bounds);

        for (w, &(_, i)) in sorted.iter().enumerate() {
            let seg = &self.segs[i];
            if let Some((line_id, side)) = seg.line_side {
                let line = &self.lines[line_id as usize];
                let side_from = if side == FRONT {
                    line.from_origin
                } else {
                    line.to_origin
                };
                self.segments.push(Segment {
                    hedge: ring[w],
                    line: line_id,
                    side,
                    length: seg.length(),
                    offset: side_from.distance(seg.from),
                });
            }
        }

        let subspace_id = self.subspaces.len() as u32;
        self.subspaces.push(ConvexSubspace {
            face,
            sector,
            leaf: leaf_id,
            cluster: None,
            polyobjs: Vec::new(),
            bounds,
        });
        self.leafs.push(BspLeaf {
            subspace: Some(subspace_id),
            sector,
        });
        self.elements.push(BspElement::Leaf(leaf_id));
        (self.elements.len() - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use crate::map::{LineFlags, MapEditor};
    use crate::testutil::{
        RecordingListener, square_room, two_connected_rooms, two_disjoint_rooms,
    };

    #[test]
    fn convex_room_is_a_single_leaf() {
        let map = square_room(128.0);
        let bsp = map.bsp();
        assert_eq!(bsp.node_count(), 0);
        assert_eq!(bsp.leaf_count(), 1);
        assert_eq!(bsp.subspace_count(), 1);
        assert_eq!(bsp.segment_count(), 4);
        assert_eq!(bsp.vertexes_added(), 0);
        assert_eq!(bsp.subspace(0).sector, Some(0));
    }

    #[test]
    fn leaf_ring_is_closed() {
        let map = square_room(128.0);
        let mesh = map.mesh();
        let ring: Vec<_> = mesh.face_ring(map.bsp().subspace(0).face).collect();
        assert_eq!(ring.len(), 4);
        for (i, &h) in ring.iter().enumerate() {
            let next = ring[(i + 1) % ring.len()];
            assert_eq!(mesh.hedge(h).next, Some(next));
            // Head to tail with no gaps.
            let end = mesh.vertex_origin(mesh.hedge(mesh.hedge(h).twin).origin);
            assert!(end.distance(mesh.vertex_origin(mesh.hedge(next).origin)) < 1e-9);
        }
    }

    fn ring_points(map: &crate::map::Map, subspace: u32) -> Vec<DVec2> {
        let mesh = map.mesh();
        mesh.face_ring(map.bsp().subspace(subspace).face)
            .map(|h| mesh.hedge_from_origin(h))
            .collect()
    }

    #[test]
    fn leaf_rings_turn_one_way() {
        let map = two_connected_rooms();
        for ss in 0..map.bsp().subspace_count() as u32 {
            let pts = ring_points(&map, ss);
            assert!(pts.len() >= 3);
            for i in 0..pts.len() {
                let a = pts[i];
                let b = pts[(i + 1) % pts.len()];
                let c = pts[(i + 2) % pts.len()];
                // Clockwise winding: never a left turn.
                assert!((b - a).perp_dot(c - b) <= 1e-9, "subspace {ss} corner {i}");
            }
        }
    }

    #[test]
    fn leaf_areas_cover_the_map() {
        let map = two_connected_rooms();
        let mut total = 0.0;
        for ss in 0..map.bsp().subspace_count() as u32 {
            let pts = ring_points(&map, ss);
            let mut twice = 0.0;
            for i in 0..pts.len() {
                let a = pts[i];
                let b = pts[(i + 1) % pts.len()];
                twice += a.perp_dot(b);
            }
            total += twice.abs() * 0.5;
        }
        // Two abutting 128x128 rooms.
        assert!((total - 256.0 * 128.0).abs() < 1e-6, "total area {total}");
    }

    #[test]
    fn two_sided_border_becomes_the_partition() {
        let map = two_connected_rooms();
        let bsp = map.bsp();
        assert_eq!(bsp.node_count(), 1);
        assert_eq!(bsp.leaf_count(), 2);
        assert_eq!(bsp.subspace_count(), 2);
        // 7 front segments plus the border's back segment.
        assert_eq!(bsp.segment_count(), 8);
        let sectors: Vec<_> = bsp.subspaces().iter().map(|s| s.sector).collect();
        assert!(sectors.contains(&Some(0)));
        assert!(sectors.contains(&Some(1)));
    }

    #[test]
    fn disjoint_rooms_never_share_a_subspace() {
        let map = two_disjoint_rooms();
        let left = map.subspace_at(DVec2::new(64.0, 64.0));
        let right = map.subspace_at(DVec2::new(576.0, 64.0));
        assert!(left.is_some());
        assert!(right.is_some());
        assert_ne!(left, right);
        // The east edge of the left room borders void, not the far room.
        let face = map.bsp().subspace(left.unwrap()).face;
        let east = map
            .mesh()
            .face_ring(face)
            .find(|&h| {
                let mid = (map.mesh().hedge_from_origin(h) + map.mesh().hedge_to_origin(h)) * 0.5;
                (mid.x - 128.0).abs() < 1e-9
            })
            .unwrap();
        assert_eq!(map.subspace_behind(east), None);
    }

    #[test]
    fn concave_room_divides_and_counts_split_vertexes() {
        // An L-shaped room: the one partition that makes both halves
        // convex must cut a boundary edge mid-span.
        let mut editor = MapEditor::new();
        let s = editor.create_sector(1.0, 0.0, 128.0);
        let pts = [
            DVec2::new(0.0, 0.0),
            DVec2::new(0.0, 128.0),
            DVec2::new(64.0, 128.0),
            DVec2::new(64.0, 64.0),
            DVec2::new(128.0, 64.0),
            DVec2::new(128.0, 0.0),
        ];
        let vs: Vec<_> = pts.iter().map(|&p| editor.create_vertex(p)).collect();
        for i in 0..vs.len() {
            editor
                .create_line(vs[i], vs[(i + 1) % vs.len()], LineFlags::empty(), Some(s), None)
                .unwrap();
        }
        let map = editor
            .end_editing(&mut RecordingListener::default())
            .unwrap();
        let bsp = map.bsp();
        assert_eq!(bsp.node_count(), 1);
        assert_eq!(bsp.subspace_count(), 2);
        assert_eq!(bsp.vertexes_added(), 1);
        for ss in bsp.subspaces() {
            assert_eq!(ss.sector, Some(s));
        }
    }

    #[test]
    fn builds_are_deterministic() {
        let a = two_connected_rooms();
        let b = two_connected_rooms();
        assert_eq!(a.bsp().node_count(), b.bsp().node_count());
        assert_eq!(a.bsp().subspace_count(), b.bsp().subspace_count());
        assert_eq!(a.bsp().segment_count(), b.bsp().segment_count());
        for &(x, y) in &[(5.0, 5.0), (64.0, 64.0), (130.0, 90.0), (255.0, 1.0)] {
            let p = DVec2::new(x, y);
            assert_eq!(a.bsp().leaf_at(p), b.bsp().leaf_at(p));
        }
    }

    #[test]
    fn unclosed_sector_is_reported() {
        // A square missing its south edge cannot close its leaf ring.
        let mut editor = MapEditor::new();
        let s = editor.create_sector(1.0, 0.0, 128.0);
        let a = editor.create_vertex(DVec2::new(0.0, 0.0));
        let b = editor.create_vertex(DVec2::new(0.0, 128.0));
        let c = editor.create_vertex(DVec2::new(128.0, 128.0));
        let d = editor.create_vertex(DVec2::new(128.0, 0.0));
        editor.create_line(a, b, LineFlags::empty(), Some(s), None).unwrap();
        editor.create_line(b, c, LineFlags::empty(), Some(s), None).unwrap();
        editor.create_line(c, d, LineFlags::empty(), Some(s), None).unwrap();
        let mut listener = RecordingListener::default();
        let _map = editor.end_editing(&mut listener).unwrap();
        assert_eq!(listener.unclosed, vec![s]);
    }
}

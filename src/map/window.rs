//! One-way window detection.
//!
//! Some maps fake windows with a one-sided line whose missing back should
//! actually show (and belong to) a nearby sector. Candidates are found by
//! counting one-sided line owners per vertex (an odd count at a vertex
//! with other owners betrays the trick), then confirmed by casting along
//! the dominant axis through the line's center and inspecting the nearest
//! hit on either side.

use glam::DVec2;

use crate::blockmap::Blockmap;
use crate::geom::{Aabb, DIST_EPSILON};
use crate::map::VertexOwners;
use crate::map::line::{Line, LineId};
use crate::map::sector::SectorId;
use crate::valid::ValidCount;

/// A confirmed window line and the sector its back is facing.
pub(crate) struct WindowEffect {
    pub line: LineId,
    pub back_open: SectorId,
}

struct TestParams<'a> {
    front_dist: f64,
    back_dist: f64,
    front_open: Option<SectorId>,
    back_open: Option<SectorId>,
    test_line: LineId,
    test_dir: DVec2,
    center: DVec2,
    cast_horizontal: bool,
    lines: &'a [Line],
}

fn test_for_window_effect(id: LineId, p: &mut TestParams<'_>) {
    if id == p.test_line {
        return;
    }
    let line = &p.lines[id as usize];
    if line.is_self_referencing() || line.has_zero_length() {
        return;
    }

    let (dist, is_front, hit_sector);
    if p.cast_horizontal {
        if line.direction.y.abs() < DIST_EPSILON {
            return;
        }
        if line.bounds.max.y < p.center.y - DIST_EPSILON
            || line.bounds.min.y > p.center.y + DIST_EPSILON
        {
            return;
        }
        let d = (line.from_origin.x
            + (p.center.y - line.from_origin.y) * line.direction.x / line.direction.y)
            - p.center.x;
        is_front = (p.test_dir.y > 0.0) != (d > 0.0);
        dist = d.abs();
        let dir = (p.test_dir.y > 0.0) ^ (line.direction.y > 0.0);
        hit_sector = line.sides[(dir ^ !is_front) as usize].sector;
    } else {
        if line.direction.x.abs() < DIST_EPSILON {
            return;
        }
        if line.bounds.max.x < p.center.x - DIST_EPSILON
            || line.bounds.min.x > p.center.x + DIST_EPSILON
        {
            return;
        }
        let d = (line.from_origin.y
            + (p.center.x - line.from_origin.x) * line.direction.y / line.direction.x)
            - p.center.y;
        is_front = (p.test_dir.x > 0.0) == (d > 0.0);
        dist = d.abs();
        let dir = (p.test_dir.x > 0.0) ^ (line.direction.x > 0.0);
        hit_sector = line.sides[(dir ^ !is_front) as usize].sector;
    }

    // Overlapping lines are too close to judge.
    if dist < DIST_EPSILON {
        return;
    }

    if is_front {
        if dist < p.front_dist {
            p.front_dist = dist;
            p.front_open = hit_sector;
        }
    } else if dist < p.back_dist {
        p.back_dist = dist;
        p.back_open = hit_sector;
    }
}

fn might_have_window_effect(line: &Line, owners: &[VertexOwners]) -> bool {
    if line.polyobj.is_some() {
        return false;
    }
    if line.front_sector().is_some() && line.back_sector().is_some() {
        return false;
    }
    if line.front_sector().is_none() || line.has_zero_length() {
        return false;
    }
    // An odd number of one-sided owners at a shared vertex betrays a
    // window construct.
    for v in [line.from, line.to] {
        let o = &owners[v as usize];
        if o.ones % 2 == 1 && o.ones + o.twos > 1 {
            return true;
        }
    }
    false
}

/// Scans every candidate line and returns the confirmed windows. Leaves
/// the line data untouched; the caller applies the results.
pub(crate) fn find_one_way_windows(
    lines: &[Line],
    owners: &[VertexOwners],
    bounds: &Aabb,
    line_blockmap: &Blockmap<LineId>,
    vc: &mut ValidCount,
) -> Vec<WindowEffect> {
    let mut found = Vec::new();
    for (id, line) in lines.iter().enumerate() {
        if !might_have_window_effect(line, owners) {
            continue;
        }

        let cast_horizontal = line.direction.x.abs() < line.direction.y.abs();
        let mut p = TestParams {
            front_dist: f64::MAX,
            back_dist: f64::MAX,
            front_open: None,
            back_open: None,
            test_line: id as LineId,
            test_dir: line.direction,
            center: line.center(),
            cast_horizontal,
            lines,
        };

        // Restrict the scan to the band the cast can actually hit.
        let mut scan = *bounds;
        if cast_horizontal {
            scan.min.y = line.bounds.min.y - DIST_EPSILON;
            scan.max.y = line.bounds.max.y + DIST_EPSILON;
        } else {
            scan.min.x = line.bounds.min.x - DIST_EPSILON;
            scan.max.x = line.bounds.max.x + DIST_EPSILON;
        }

        vc.begin();
        line_blockmap.for_all_in_box(&scan, |other| {
            if vc.visit_line(other) {
                let o = &lines[other as usize];
                if o.front_sector().is_some() || o.back_sector().is_some() {
                    test_for_window_effect(other, &mut p);
                }
            }
            true
        });

        if let (Some(front_open), Some(back_open)) = (p.front_open, p.back_open) {
            if line.front_sector() == Some(back_open) {
                found.push(WindowEffect {
                    line: id as LineId,
                    back_open: front_open,
                });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use crate::testutil::{RecordingListener, add_ring, rect_ring, window_map};
    use crate::map::MapEditor;

    #[test]
    fn one_way_window_is_detected_and_applied() {
        let (map, window, listener) = window_map();
        assert_eq!(listener.windows, vec![(window, 0)]);
        assert_eq!(map.line(window).unwrap().window_sector, Some(0));
        // The phantom back keeps the open room attributed to its sector.
        assert_eq!(map.sector_at(DVec2::new(64.0, 64.0)), Some(0));
        assert_eq!(map.sector_at(DVec2::new(192.0, 64.0)), Some(1));
    }

    #[test]
    fn plain_walls_are_not_windows() {
        let mut editor = MapEditor::new();
        let sector = editor.create_sector(1.0, 0.0, 128.0);
        add_ring(
            &mut editor,
            &rect_ring(DVec2::ZERO, DVec2::splat(128.0)),
            sector,
        );
        let mut listener = RecordingListener::default();
        let map = editor.end_editing(&mut listener).unwrap();
        assert!(listener.windows.is_empty());
        assert!(map.line(0).unwrap().window_sector.is_none());
    }
}

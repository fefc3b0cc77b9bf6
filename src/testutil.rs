//! Shared map fixtures for tests.

use glam::DVec2;

use crate::bsp::{BuildListener, NullListener};
use crate::map::{LineFlags, LineId, Map, MapEditor, SectorId};
use crate::mesh::VertexId;

/// Build diagnostics recorder.
#[derive(Default)]
pub(crate) struct RecordingListener {
    pub windows: Vec<(LineId, SectorId)>,
    pub unclosed: Vec<SectorId>,
    pub deleted: bool,
}

impl BuildListener for RecordingListener {
    fn one_way_window(&mut self, line: LineId, sector: SectorId) {
        self.windows.push((line, sector));
    }

    fn unclosed_sector(&mut self, sector: SectorId, _near: DVec2) {
        self.unclosed.push(sector);
    }

    fn map_deleted(&mut self) {
        self.deleted = true;
    }
}

/// Corner ring of a rectangle, ordered so the interior lies on the
/// front (right) side of every edge.
pub(crate) fn rect_ring(min: DVec2, max: DVec2) -> [DVec2; 4] {
    [
        min,
        DVec2::new(min.x, max.y),
        max,
        DVec2::new(max.x, min.y),
    ]
}

/// One-sided boundary loop around `corners`, all fronts facing `sector`.
pub(crate) fn add_ring(editor: &mut MapEditor, corners: &[DVec2], sector: SectorId) -> Vec<LineId> {
    let vs: Vec<VertexId> = corners.iter().map(|&c| editor.create_vertex(c)).collect();
    let mut lines = Vec::with_capacity(vs.len());
    for i in 0..vs.len() {
        let line = editor
            .create_line(
                vs[i],
                vs[(i + 1) % vs.len()],
                LineFlags::empty(),
                Some(sector),
                None,
            )
            .unwrap();
        lines.push(line);
    }
    lines
}

/// A single square room, `size` units across, one sector.
pub(crate) fn square_room(size: f64) -> Map {
    let mut editor = MapEditor::new();
    let sector = editor.create_sector(1.0, 0.0, 128.0);
    add_ring(
        &mut editor,
        &rect_ring(DVec2::ZERO, DVec2::splat(size)),
        sector,
    );
    editor.end_editing(&mut NullListener).unwrap()
}

/// Two 128x128 rooms sharing a two-sided border at x = 128. Sector 0 is
/// the left room, sector 1 the right. Floor/ceiling heights differ so
/// sight tests can exercise the slope ranges.
pub(crate) fn two_connected_rooms() -> Map {
    let mut editor = MapEditor::new();
    let s0 = editor.create_sector(1.0, 0.0, 128.0);
    let s1 = editor.create_sector(0.5, 16.0, 96.0);

    let a = editor.create_vertex(DVec2::new(0.0, 0.0));
    let b = editor.create_vertex(DVec2::new(0.0, 128.0));
    let c = editor.create_vertex(DVec2::new(128.0, 128.0));
    let d = editor.create_vertex(DVec2::new(128.0, 0.0));
    let e = editor.create_vertex(DVec2::new(256.0, 128.0));
    let f = editor.create_vertex(DVec2::new(256.0, 0.0));

    // Left room.
    editor.create_line(a, b, LineFlags::empty(), Some(s0), None).unwrap();
    editor.create_line(b, c, LineFlags::empty(), Some(s0), None).unwrap();
    editor.create_line(d, a, LineFlags::empty(), Some(s0), None).unwrap();
    // Shared border, front facing the left room.
    editor.create_line(c, d, LineFlags::empty(), Some(s0), Some(s1)).unwrap();
    // Right room.
    editor.create_line(c, e, LineFlags::empty(), Some(s1), None).unwrap();
    editor.create_line(e, f, LineFlags::empty(), Some(s1), None).unwrap();
    editor.create_line(f, d, LineFlags::empty(), Some(s1), None).unwrap();

    editor.end_editing(&mut NullListener).unwrap()
}

/// Two far-apart square rooms attributed to the same sector; its
/// subspaces cannot touch, so clustering must split them.
pub(crate) fn two_disjoint_rooms() -> Map {
    let mut editor = MapEditor::new();
    let sector = editor.create_sector(1.0, 0.0, 128.0);
    add_ring(
        &mut editor,
        &rect_ring(DVec2::ZERO, DVec2::splat(128.0)),
        sector,
    );
    add_ring(
        &mut editor,
        &rect_ring(DVec2::new(512.0, 0.0), DVec2::new(640.0, 128.0)),
        sector,
    );
    editor.end_editing(&mut NullListener).unwrap()
}

/// Two side-by-side rooms whose border at x = 128 is authored one-sided,
/// facing the right room. The back opens into the left room, which makes
/// the border a one-way window. Returns the map, the border line id and
/// the recorded diagnostics.
pub(crate) fn window_map() -> (Map, LineId, RecordingListener) {
    let mut editor = MapEditor::new();
    let s0 = editor.create_sector(1.0, 0.0, 128.0);
    let s1 = editor.create_sector(1.0, 0.0, 128.0);

    let a = editor.create_vertex(DVec2::new(0.0, 0.0));
    let b = editor.create_vertex(DVec2::new(0.0, 128.0));
    let c = editor.create_vertex(DVec2::new(128.0, 128.0));
    let d = editor.create_vertex(DVec2::new(128.0, 0.0));
    let e = editor.create_vertex(DVec2::new(256.0, 128.0));
    let f = editor.create_vertex(DVec2::new(256.0, 0.0));

    // Left room, open on its right edge.
    editor.create_line(a, b, LineFlags::empty(), Some(s0), None).unwrap();
    editor.create_line(b, c, LineFlags::empty(), Some(s0), None).unwrap();
    editor.create_line(d, a, LineFlags::empty(), Some(s0), None).unwrap();
    // The window: one-sided, front facing the right room.
    let window = editor
        .create_line(d, c, LineFlags::empty(), Some(s1), None)
        .unwrap();
    // Right room.
    editor.create_line(c, e, LineFlags::empty(), Some(s1), None).unwrap();
    editor.create_line(e, f, LineFlags::empty(), Some(s1), None).unwrap();
    editor.create_line(f, d, LineFlags::empty(), Some(s1), None).unwrap();

    let mut listener = RecordingListener::default();
    let map = editor.end_editing(&mut listener).unwrap();
    (map, window, listener)
}

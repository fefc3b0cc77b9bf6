//! Uniform-grid spatial index.
//!
//! One cell covers 128×128 map units by default. Cells hold small inline
//! vectors of element ids; an element whose bounds overlap several cells
//! is linked into each of them, so a box query may report it once per
//! cell. Callers needing uniqueness stamp elements with a
//! [`ValidCount`](crate::valid::ValidCount) pass.

use glam::DVec2;
use smallvec::SmallVec;

use crate::geom::Aabb;

/// Side length of one blockmap cell in map units.
pub const CELL_SIZE: f64 = 128.0;

type Cell<T> = SmallVec<[T; 8]>;

pub struct Blockmap<T> {
    bounds: Aabb,
    cell_size: f64,
    width: i32,
    height: i32,
    cells: Vec<Cell<T>>,
}

impl<T: Copy + PartialEq> Blockmap<T> {
    /// Construct a grid covering `bounds`. Dimensions round up so the
    /// whole box is covered; a degenerate box still yields one cell.
    pub fn new(bounds: Aabb, cell_size: f64) -> Blockmap<T> {
        let width = ((bounds.width() / cell_size).ceil() as i32).max(1);
        let height = ((bounds.height() / cell_size).ceil() as i32).max(1);
        Blockmap {
            bounds,
            cell_size,
            width,
            height,
            cells: vec![Cell::new(); (width * height) as usize],
        }
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /*──────────────────────── cell addressing ────────────────────────*/

    #[inline]
    fn cell_of(&self, p: DVec2) -> (i32, i32) {
        (
            ((p.x - self.bounds.min.x) / self.cell_size).floor() as i32,
            ((p.y - self.bounds.min.y) / self.cell_size).floor() as i32,
        )
    }

    #[inline]
    fn in_grid(&self, (cx, cy): (i32, i32)) -> bool {
        cx >= 0 && cx < self.width && cy >= 0 && cy < self.height
    }

    #[inline]
    fn index(&self, (cx, cy): (i32, i32)) -> usize {
        (cy * self.width + cx) as usize
    }

    /// Cell index containing `p`, or `None` when outside the grid.
    pub(crate) fn cell_index_at(&self, p: DVec2) -> Option<usize> {
        let c = self.cell_of(p);
        self.in_grid(c).then(|| self.index(c))
    }

    pub(crate) fn cell(&self, index: usize) -> &[T] {
        &self.cells[index]
    }

    /*──────────────────────── linking ────────────────────────*/

    /// Link `elem` into the cell containing `p`. Out-of-bounds origins
    /// are a silent no-op; dynamic objects may momentarily leave the map.
    pub fn link_point(&mut self, p: DVec2, elem: T) {
        if let Some(i) = self.cell_index_at(p) {
            self.cells[i].push(elem);
        }
    }

    pub fn unlink_point(&mut self, p: DVec2, elem: T) {
        if let Some(i) = self.cell_index_at(p) {
            if let Some(at) = self.cells[i].iter().position(|&e| e == elem) {
                self.cells[i].swap_remove(at);
            }
        }
    }

    /// Link `elem` into every cell its bounds overlap.
    pub fn link_box(&mut self, bb: &Aabb, elem: T) {
        let (x1, y1, x2, y2) = self.clamped_range(bb);
        for cy in y1..=y2 {
            for cx in x1..=x2 {
                let i = self.index((cx, cy));
                self.cells[i].push(elem);
            }
        }
    }

    pub fn unlink_box(&mut self, bb: &Aabb, elem: T) {
        let (x1, y1, x2, y2) = self.clamped_range(bb);
        for cy in y1..=y2 {
            for cx in x1..=x2 {
                let i = self.index((cx, cy));
                if let Some(at) = self.cells[i].iter().position(|&e| e == elem) {
                    self.cells[i].swap_remove(at);
                }
            }
        }
    }

    /// Link `elem` into exactly those cells the segment `from → to`
    /// passes through (incremental grid traversal, not the segment's
    /// bounding box — a diagonal line must not produce false negatives
    /// on cell boundaries).
    pub fn link_line(&mut self, from: DVec2, to: DVec2, elem: T) {
        let dir = to - from;
        let (mut cx, mut cy) = self.cell_of(from);
        let (ex, ey) = self.cell_of(to);

        let step_x: i32 = if dir.x > 0.0 { 1 } else { -1 };
        let step_y: i32 = if dir.y > 0.0 { 1 } else { -1 };

        // Parametric distance to the next vertical / horizontal cell edge.
        let next_edge = |c: i32, step: i32, min: f64, fromc: f64, d: f64| -> f64 {
            if d == 0.0 {
                return f64::INFINITY;
            }
            let boundary = min + (c + if step > 0 { 1 } else { 0 }) as f64 * self.cell_size;
            (boundary - fromc) / d
        };

        let mut t_max_x = next_edge(cx, step_x, self.bounds.min.x, from.x, dir.x);
        let mut t_max_y = next_edge(cy, step_y, self.bounds.min.y, from.y, dir.y);
        let t_delta_x = if dir.x == 0.0 {
            f64::INFINITY
        } else {
            (self.cell_size / dir.x).abs()
        };
        let t_delta_y = if dir.y == 0.0 {
            f64::INFINITY
        } else {
            (self.cell_size / dir.y).abs()
        };

        // The traversal is bounded by the grid perimeter; the guard keeps
        // degenerate float input from looping.
        let mut guard = (self.width + self.height + 4) * 2;
        loop {
            if self.in_grid((cx, cy)) {
                let i = self.index((cx, cy));
                self.cells[i].push(elem);
            }
            if (cx == ex && cy == ey) || guard == 0 {
                break;
            }
            guard -= 1;
            if t_max_x < t_max_y {
                t_max_x += t_delta_x;
                cx += step_x;
            } else {
                t_max_y += t_delta_y;
                cy += step_y;
            }
        }
    }

    pub fn unlink_all(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /*──────────────────────── queries ────────────────────────*/

    fn clamped_range(&self, bb: &Aabb) -> (i32, i32, i32, i32) {
        let (x1, y1) = self.cell_of(bb.min);
        let (x2, y2) = self.cell_of(bb.max);
        (
            x1.clamp(0, self.width - 1),
            y1.clamp(0, self.height - 1),
            x2.clamp(0, self.width - 1),
            y2.clamp(0, self.height - 1),
        )
    }

    /// Visit every element linked into a cell overlapped by `bb`.
    /// Elements spanning several cells are visited once per cell.
    /// Returns `false` if the callback aborted the iteration.
    pub fn for_all_in_box<F>(&self, bb: &Aabb, mut func: F) -> bool
    where
        F: FnMut(T) -> bool,
    {
        let (x1, y1, x2, y2) = self.clamped_range(bb);
        for cy in y1..=y2 {
            for cx in x1..=x2 {
                for &elem in &self.cells[self.index((cx, cy))] {
                    if !func(elem) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Visit the raw cell indices overlapped by `bb` (used by the
    /// contact spreader to mark whole cells as processed).
    pub(crate) fn for_all_cells_in_box<F>(&self, bb: &Aabb, mut func: F)
    where
        F: FnMut(usize),
    {
        let (x1, y1, x2, y2) = self.clamped_range(bb);
        for cy in y1..=y2 {
            for cx in x1..=x2 {
                func(self.index((cx, cy)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Blockmap<u32> {
        Blockmap::new(
            Aabb::from_points(DVec2::new(0.0, 0.0), DVec2::new(512.0, 512.0)),
            CELL_SIZE,
        )
    }

    #[test]
    fn dimensions_round_up() {
        let bm: Blockmap<u32> = Blockmap::new(
            Aabb::from_points(DVec2::ZERO, DVec2::new(300.0, 100.0)),
            CELL_SIZE,
        );
        assert_eq!((bm.width(), bm.height()), (3, 1));
    }

    #[test]
    fn point_link_and_query() {
        let mut bm = grid();
        bm.link_point(DVec2::new(64.0, 64.0), 7);
        let mut seen = Vec::new();
        bm.for_all_in_box(
            &Aabb::from_points(DVec2::new(0.0, 0.0), DVec2::new(128.0, 128.0)),
            |e| {
                seen.push(e);
                true
            },
        );
        assert_eq!(seen, vec![7]);

        // Query box far away sees nothing.
        seen.clear();
        bm.for_all_in_box(
            &Aabb::from_points(DVec2::new(300.0, 300.0), DVec2::new(400.0, 400.0)),
            |e| {
                seen.push(e);
                true
            },
        );
        assert!(seen.is_empty());
    }

    #[test]
    fn out_of_bounds_link_is_noop() {
        let mut bm = grid();
        bm.link_point(DVec2::new(-1000.0, -1000.0), 1);
        let all = bm.bounds().grown(2000.0);
        let mut count = 0;
        bm.for_all_in_box(&all, |_| {
            count += 1;
            true
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn box_link_spans_cells() {
        let mut bm = grid();
        bm.link_box(
            &Aabb::from_points(DVec2::new(100.0, 100.0), DVec2::new(200.0, 200.0)),
            3,
        );
        // Object overlaps 4 cells; a query over one of them still finds it.
        let mut found = false;
        bm.for_all_in_box(
            &Aabb::from_points(DVec2::new(130.0, 130.0), DVec2::new(140.0, 140.0)),
            |e| {
                found = e == 3;
                true
            },
        );
        assert!(found);
    }

    #[test]
    fn line_link_follows_diagonal() {
        let mut bm = grid();
        bm.link_line(DVec2::new(10.0, 10.0), DVec2::new(500.0, 500.0), 9);
        // The diagonal passes through (250, 250) but not (450, 60).
        let mut hit = false;
        bm.for_all_in_box(
            &Aabb::from_points(DVec2::new(250.0, 250.0), DVec2::new(251.0, 251.0)),
            |_| {
                hit = true;
                true
            },
        );
        assert!(hit);
        let mut miss = false;
        bm.for_all_in_box(
            &Aabb::from_points(DVec2::new(440.0, 50.0), DVec2::new(460.0, 70.0)),
            |_| {
                miss = true;
                true
            },
        );
        assert!(!miss);
    }

    #[test]
    fn early_exit_propagates() {
        let mut bm = grid();
        bm.link_point(DVec2::new(10.0, 10.0), 1);
        bm.link_point(DVec2::new(20.0, 20.0), 2);
        let mut visits = 0;
        let completed = bm.for_all_in_box(
            &Aabb::from_points(DVec2::ZERO, DVec2::new(512.0, 512.0)),
            |_| {
                visits += 1;
                false
            },
        );
        assert!(!completed);
        assert_eq!(visits, 1);
    }

    #[test]
    fn unlink_removes() {
        let mut bm = grid();
        let bb = Aabb::from_points(DVec2::new(10.0, 10.0), DVec2::new(40.0, 40.0));
        bm.link_box(&bb, 5);
        bm.unlink_box(&bb, 5);
        let mut any = false;
        bm.for_all_in_box(&bb, |_| {
            any = true;
            true
        });
        assert!(!any);
    }
}

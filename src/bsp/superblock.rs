//! Hierarchical holding structure for segments awaiting partitioning.
//!
//! Blocks subdivide along their longer axis, so partition evaluation can
//! reject whole blocks on one side of a candidate without visiting their
//! contents; each block tracks segment totals at or under it.

use crate::bsp::seg::{LineSeg, SegIdx};
use crate::geom::Aabb;

/// Blocks at or below this size hold segments directly.
const MIN_BLOCK_SIZE: f64 = 256.0;

#[derive(Debug)]
pub(super) struct Block {
    bounds: Aabb,
    segs: Vec<SegIdx>,
    map_count: usize,
    part_count: usize,
    children: [Option<usize>; 2],
}

#[derive(Debug)]
pub(super) struct SuperBlocks {
    blocks: Vec<Block>,
}

impl SuperBlocks {
    pub fn new(bounds: Aabb) -> Self {
        SuperBlocks {
            blocks: vec![Block {
                bounds,
                segs: Vec::new(),
                map_count: 0,
                part_count: 0,
                children: [None, None],
            }],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn bounds(&self, block: usize) -> &Aabb {
        &self.blocks[block].bounds
    }

    pub fn segs(&self, block: usize) -> &[SegIdx] {
        &self.blocks[block].segs
    }

    /// Segment totals at or under `block`, split into map and partition
    /// closure counts.
    pub fn counts(&self, block: usize) -> (usize, usize) {
        (self.blocks[block].map_count, self.blocks[block].part_count)
    }

    pub fn children(&self, block: usize) -> [Option<usize>; 2] {
        self.blocks[block].children
    }

    /// Descends to the smallest block that wholly contains the segment,
    /// subdividing lazily, and stores it there.
    pub fn push(&mut self, seg: &LineSeg, idx: SegIdx) {
        let sb = seg.bounds();
        let is_map = seg.is_map();
        let mut cur = 0;
        loop {
            let b = &mut self.blocks[cur];
            if is_map {
                b.map_count += 1;
            } else {
                b.part_count += 1;
            }
            let bounds = b.bounds;
            let (w, h) = (bounds.width(), bounds.height());
            if w.max(h) <= MIN_BLOCK_SIZE {
                b.segs.push(idx);
                return;
            }
            // Split the longer axis at its midpoint.
            let (vertical, mid) = if w >= h {
                (false, 0.5 * (bounds.min.x + bounds.max.x))
            } else {
                (true, 0.5 * (bounds.min.y + bounds.max.y))
            };
            let (lo, hi) = if vertical {
                (sb.min.y, sb.max.y)
            } else {
                (sb.min.x, sb.max.x)
            };
            let child = if hi <= mid {
                0
            } else if lo >= mid {
                1
            } else {
                b.segs.push(idx);
                return;
            };
            cur = match self.blocks[cur].children[child] {
                Some(next) => next,
                None => {
                    let mut cb = bounds;
                    if vertical {
                        if child == 0 {
                            cb.max.y = mid;
                        } else {
                            cb.min.y = mid;
                        }
                    } else if child == 0 {
                        cb.max.x = mid;
                    } else {
                        cb.min.x = mid;
                    }
                    let next = self.blocks.len();
                    self.blocks.push(Block {
                        bounds: cb,
                        segs: Vec::new(),
                        map_count: 0,
                        part_count: 0,
                        children: [None, None],
                    });
                    self.blocks[cur].children[child] = Some(next);
                    next
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn seg(from: DVec2, to: DVec2) -> LineSeg {
        LineSeg {
            from,
            to,
            from_vertex: 0,
            to_vertex: 0,
            line_side: Some((0, 0)),
            sector: None,
            back_sector: None,
        }
    }

    #[test]
    fn push_descends_and_counts() {
        let mut blocks = SuperBlocks::new(Aabb::from_points(
            DVec2::new(0.0, 0.0),
            DVec2::new(1024.0, 1024.0),
        ));
        let a = seg(DVec2::new(10.0, 10.0), DVec2::new(50.0, 10.0));
        let b = seg(DVec2::new(900.0, 900.0), DVec2::new(900.0, 950.0));
        blocks.push(&a, 0);
        blocks.push(&b, 1);
        assert_eq!(blocks.counts(blocks.root()), (2, 0));
        // Segments in opposite corners must not share a leaf block.
        assert!(blocks.segs(blocks.root()).is_empty());
        let kids = blocks.children(blocks.root());
        assert!(kids[0].is_some() && kids[1].is_some());
    }

    #[test]
    fn straddling_seg_stays_at_root() {
        let mut blocks = SuperBlocks::new(Aabb::from_points(
            DVec2::new(0.0, 0.0),
            DVec2::new(1024.0, 1024.0),
        ));
        let s = seg(DVec2::new(100.0, 500.0), DVec2::new(900.0, 500.0));
        blocks.push(&s, 0);
        assert_eq!(blocks.segs(blocks.root()), &[0]);
    }
}

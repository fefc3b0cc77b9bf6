//! Partition candidate evaluation.

use crate::bsp::seg::{LineSeg, SegIdx};
use crate::bsp::superblock::SuperBlocks;
use crate::geom::{DIST_EPSILON, Partition, SHORT_SEG_EPSILON};

#[derive(Default)]
struct Cost {
    total: f64,
    splits: usize,
    front: usize,
    back: usize,
    map_front: usize,
    map_back: usize,
}

/// Picks the map segment whose partition line divides the working set at
/// the lowest cost. Returns `None` when no candidate produces a valid
/// division, which is the recursion's convexity terminator.
pub(super) fn choose_partition(
    segs: &[LineSeg],
    work: &[SegIdx],
    blocks: &SuperBlocks,
    split_cost_factor: i32,
) -> Option<SegIdx> {
    let mut best: Option<(SegIdx, f64)> = None;
    for &idx in work {
        let cand = &segs[idx];
        if !cand.is_map() {
            continue;
        }
        let partition = Partition::new(cand.from, cand.direction());
        if let Some(mut cost) = evaluate(segs, blocks, &partition, split_cost_factor) {
            // Short candidates make numerically poor partition lines.
            if cand.length() < SHORT_SEG_EPSILON {
                cost += split_cost_factor as f64 * 2.0;
            }
            let better = match best {
                Some((_, best_cost)) => cost < best_cost,
                None => true,
            };
            if better {
                best = Some((idx, cost));
            }
        }
    }
    best.map(|(idx, _)| idx)
}

/// Costs one candidate, pruning whole blocks that sit entirely on one
/// side. `None` means the candidate fails to divide the map segments.
fn evaluate(
    segs: &[LineSeg],
    blocks: &SuperBlocks,
    partition: &Partition,
    split_cost_factor: i32,
) -> Option<f64> {
    let mut cost = Cost::default();
    eval_block(segs, blocks, blocks.root(), partition, split_cost_factor, &mut cost);
    if cost.map_front == 0 || cost.map_back == 0 {
        return None;
    }
    cost.total += cost.splits as f64 * split_cost_factor as f64;
    cost.total += (cost.front as f64 - cost.back as f64).abs();
    Some(cost.total)
}

fn eval_block(
    segs: &[LineSeg],
    blocks: &SuperBlocks,
    block: usize,
    partition: &Partition,
    split_cost_factor: i32,
    cost: &mut Cost,
) {
    match partition.box_on_side(blocks.bounds(block)) {
        Some(0) => {
            let (map, part) = blocks.counts(block);
            cost.map_front += map;
            cost.front += map + part;
        }
        Some(_) => {
            let (map, part) = blocks.counts(block);
            cost.map_back += map;
            cost.back += map + part;
        }
        None => {
            for &idx in blocks.segs(block) {
                eval_seg(&segs[idx], partition, split_cost_factor, cost);
            }
            for child in blocks.children(block).into_iter().flatten() {
                eval_block(segs, blocks, child, partition, split_cost_factor, cost);
            }
        }
    }
}

fn eval_seg(seg: &LineSeg, partition: &Partition, split_cost_factor: i32, cost: &mut Cost) {
    let a = partition.perp_distance(seg.from);
    let b = partition.perp_distance(seg.to);
    let is_map = seg.is_map();

    if a.abs() <= DIST_EPSILON && b.abs() <= DIST_EPSILON {
        // Collinear: direction decides the side.
        if seg.direction().dot(partition.direction) >= 0.0 {
            tally_front(is_map, cost);
        } else {
            tally_back(is_map, cost);
        }
    } else if a <= DIST_EPSILON && b <= DIST_EPSILON {
        tally_front(is_map, cost);
    } else if a >= -DIST_EPSILON && b >= -DIST_EPSILON {
        tally_back(is_map, cost);
    } else {
        // Spanning: one fragment lands on each side.
        cost.splits += 1;
        tally_front(is_map, cost);
        tally_back(is_map, cost);
        // Splits shaving off a sliver cost extra.
        let frac = a / (a - b);
        let len = seg.length();
        let cut = frac.min(1.0 - frac) * len;
        if cut < SHORT_SEG_EPSILON {
            cost.total += split_cost_factor as f64;
        }
    }
}

fn tally_front(is_map: bool, cost: &mut Cost) {
    cost.front += 1;
    if is_map {
        cost.map_front += 1;
    }
}

fn tally_back(is_map: bool, cost: &mut Cost) {
    cost.back += 1;
    if is_map {
        cost.map_back += 1;
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::geom::Aabb;

    fn seg(from: DVec2, to: DVec2) -> LineSeg {
        LineSeg {
            from,
            to,
            from_vertex: 0,
            to_vertex: 0,
            line_side: Some((0, 0)),
            sector: Some(0),
            back_sector: None,
        }
    }

    #[test]
    fn short_candidates_lose_to_a_collinear_long_one() {
        // Two dividers on the same line x = 64; only the penalty for the
        // 2-unit candidate separates their costs.
        let segs = vec![
            seg(DVec2::new(64.0, 100.0), DVec2::new(64.0, 102.0)),
            seg(DVec2::new(64.0, 0.0), DVec2::new(64.0, 64.0)),
            seg(DVec2::new(0.0, 0.0), DVec2::new(0.0, 64.0)),
            seg(DVec2::new(128.0, 0.0), DVec2::new(128.0, 64.0)),
        ];
        let mut blocks = SuperBlocks::new(Aabb::from_points(
            DVec2::new(0.0, 0.0),
            DVec2::new(128.0, 102.0),
        ));
        let work: Vec<SegIdx> = (0..segs.len()).collect();
        for &i in &work {
            blocks.push(&segs[i], i);
        }
        assert_eq!(choose_partition(&segs, &work, &blocks, 7), Some(1));
    }
}

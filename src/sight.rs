//! Line of sight testing.
//!
//! Traces a ray through the BSP, narrowing an open vertical slope cone at
//! every crossed line until it closes (blocked) or the target leaf is
//! reached. Side tests and intercept fractions use 16.16 fixed point so
//! results are bit-stable across platforms.

use bitflags::bitflags;
use glam::DVec3;

use crate::bsp::BspElement;
use crate::fixed::{self, Fixed};
use crate::geom::Aabb;
use crate::map::Map;
use crate::map::line::{FRONT, LineId, SideIndex};
use crate::valid::ValidCount;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SightFlags: u32 {
        /// Pass through lines from their back (left) side.
        const PASS_LEFT = 0x1;
        /// Pass over one-sided walls shorter than the ray.
        const PASS_OVER = 0x2;
        /// Pass under hanging one-sided walls.
        const PASS_UNDER = 0x4;
    }
}

const RTOP: u8 = 0x1;
const RBOTTOM: u8 = 0x2;

/// One sight trace. Construct, then call [`trace`](Self::trace).
pub struct LineSightTest<'a> {
    map: &'a Map,
    vc: &'a mut ValidCount,
    flags: SightFlags,
    from: DVec3,
    to: DVec3,
    bottom_slope: f64,
    top_slope: f64,
    ray_origin: [Fixed; 2],
    ray_direction: [Fixed; 2],
    ray_bounds: Aabb,
}

impl<'a> LineSightTest<'a> {
    pub fn new(
        map: &'a Map,
        vc: &'a mut ValidCount,
        from: DVec3,
        to: DVec3,
        bottom_slope: f64,
        top_slope: f64,
        flags: SightFlags,
    ) -> LineSightTest<'a> {
        LineSightTest {
            map,
            vc,
            flags,
            from,
            to,
            bottom_slope,
            top_slope,
            ray_origin: [fixed::to_fixed(from.x), fixed::to_fixed(from.y)],
            ray_direction: [fixed::to_fixed(to.x - from.x), fixed::to_fixed(to.y - from.y)],
            ray_bounds: Aabb::from_points(from.truncate(), to.truncate()),
        }
    }

    /// Runs the trace. `true` means an unobstructed line exists between
    /// the endpoints within the slope cone.
    pub fn trace(mut self) -> bool {
        self.vc.begin();
        self.top_slope = self.to.z + self.top_slope - self.from.z;
        self.bottom_slope = self.to.z + self.bottom_slope - self.from.z;
        self.cross_element(self.map.bsp.root())
    }

    /// Does the ray pass the line as seen from `side`?
    fn cross_line(&mut self, line_id: LineId, side: SideIndex) -> bool {
        if !self.vc.visit_line(line_id) {
            return true; // Already handled.
        }
        let line = &self.map.lines[line_id as usize];

        // Quick bounding-box rejection.
        if !line.bounds.overlaps(&self.ray_bounds) {
            return true;
        }

        let v1 = [
            fixed::to_fixed(line.from_origin.x),
            fixed::to_fixed(line.from_origin.y),
        ];
        let v2 = [
            fixed::to_fixed(line.to_origin.x),
            fixed::to_fixed(line.to_origin.y),
        ];
        if fixed::point_on_line_side(v1, self.ray_origin, self.ray_direction)
            == fixed::point_on_line_side(v2, self.ray_origin, self.ray_direction)
        {
            return true;
        }

        let line_dir = [
            fixed::to_fixed(line.direction.x),
            fixed::to_fixed(line.direction.y),
        ];
        let from_p = [fixed::to_fixed(self.from.x), fixed::to_fixed(self.from.y)];
        let to_p = [fixed::to_fixed(self.to.x), fixed::to_fixed(self.to.y)];
        if fixed::point_on_line_side(from_p, v1, line_dir)
            == fixed::point_on_line_side(to_p, v1, line_dir)
        {
            return true;
        }

        // The passable side of a one-way window has no sections.
        if !line.sides[side].has_sections() {
            return true;
        }
        let Some(front_sec_id) = line.sides[side].sector else {
            return false;
        };
        let front_sec = &self.map.sectors[front_sec_id as usize];
        let back_sec = line.sides[side ^ 1]
            .sector
            .map(|id| &self.map.sectors[id as usize]);

        let mut no_back = back_sec.is_none();
        if let Some(back) = back_sec {
            if !no_back && !self.flags.contains(SightFlags::PASS_LEFT) {
                // A closed door counts as one-sided.
                no_back = !(back.floor.height < front_sec.ceiling.height)
                    || !(front_sec.floor.height < back.ceiling.height);
            }
        }

        if no_back {
            if self.flags.contains(SightFlags::PASS_LEFT)
                && line.point_on_side(self.from.truncate()) < 0.0
            {
                return true;
            }
            if !self
                .flags
                .intersects(SightFlags::PASS_OVER | SightFlags::PASS_UNDER)
            {
                return false;
            }
        }

        // Which vertical ranges are partially closed here?
        let mut ranges = 0u8;
        if no_back {
            ranges |= RTOP;
        } else if let Some(back) = back_sec {
            if back.floor.height != front_sec.floor.height {
                ranges |= RBOTTOM;
            }
            if back.ceiling.height != front_sec.ceiling.height {
                ranges |= RTOP;
            }
        }
        if ranges == 0 {
            return true;
        }

        let frac = fixed::to_f64(fixed::intercept_fraction(
            self.ray_origin,
            self.ray_direction,
            v1,
            line_dir,
        ));

        if self.flags.contains(SightFlags::PASS_OVER)
            && self.bottom_slope > (front_sec.ceiling.height - self.from.z) / frac
        {
            return true;
        }
        if self.flags.contains(SightFlags::PASS_UNDER)
            && self.top_slope < (front_sec.floor.height - self.from.z) / frac
        {
            return true;
        }

        if ranges & RTOP != 0 {
            let top = match back_sec {
                Some(back) if !no_back => front_sec.ceiling.height.min(back.ceiling.height),
                _ => front_sec.ceiling.height,
            };
            let slope = (top - self.from.z) / frac;
            let floor_slope = (front_sec.floor.height - self.from.z) / frac;

            if ((slope < self.top_slope)
                ^ (no_back && !self.flags.contains(SightFlags::PASS_OVER)))
                || (no_back && self.top_slope > floor_slope)
            {
                self.top_slope = slope;
            }
            if ((slope < self.bottom_slope)
                ^ (no_back && !self.flags.contains(SightFlags::PASS_UNDER)))
                || (no_back && self.bottom_slope > floor_slope)
            {
                self.bottom_slope = slope;
            }
        }

        if ranges & RBOTTOM != 0 {
            let bottom = match back_sec {
                Some(back) if !no_back => front_sec.floor.height.max(back.floor.height),
                _ => front_sec.floor.height,
            };
            let slope = (bottom - self.from.z) / frac;
            if slope > self.bottom_slope {
                self.bottom_slope = slope;
            }
            if slope > self.top_slope {
                self.top_slope = slope;
            }
        }

        self.top_slope > self.bottom_slope
    }

    /// Does the ray pass through the subspace's boundary and any polyobjs
    /// parked inside it?
    fn cross_subspace(&mut self, id: crate::bsp::SubspaceId) -> bool {
        let map = self.map;
        let subspace = map.bsp.subspace(id);

        for &po in &subspace.polyobjs {
            for &line in &map.polyobjs[po as usize].lines {
                if !self.cross_line(line, FRONT) {
                    return false;
                }
            }
        }

        for h in map.mesh.face_ring(subspace.face) {
            if let Some(seg) = map.mesh.hedge(h).segment {
                if !self.cross_line(seg.line, seg.side) {
                    return false;
                }
            }
        }
        true
    }

    /// Descends the tree crossing the from-side subtree first wherever
    /// the ray straddles a partition.
    fn cross_element(&mut self, start: u32) -> bool {
        let map = self.map;
        let mut cur = start;
        loop {
            match map.bsp.element(cur) {
                BspElement::Node(node) => {
                    let from_side = node.partition.point_on_side(self.from.truncate());
                    let to_side = node.partition.point_on_side(self.to.truncate());
                    if from_side != to_side {
                        if !self.cross_element(node.children[from_side]) {
                            return false;
                        }
                        cur = node.children[to_side];
                    } else {
                        cur = node.children[from_side];
                    }
                }
                BspElement::Leaf(leaf_id) => {
                    return match map.bsp.leaf(*leaf_id).subspace {
                        Some(subspace) => self.cross_subspace(subspace),
                        // No subspace geometry implies a mapping error.
                        None => false,
                    };
                }
            }
        }
    }
}

//! The thinker registry: dynamic map objects ("mobjs") and the state the
//! spatial layer maintains for them.

use bitflags::bitflags;
use glam::{DVec2, DVec3};
use smallvec::SmallVec;

use crate::bsp::BspLeafId;
use crate::geom::Aabb;
use crate::map::line::LineId;
use crate::map::sector::SectorId;

pub type MobjId = u32;

bitflags! {
    /// Which spatial structures a mobj is linked into.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MobjLinkFlags: u8 {
        /// Sector mobj chain.
        const SECTOR = 0x01;
        /// Mobj blockmap cell.
        const BLOCKMAP = 0x02;
        /// Line touch rings.
        const LINES = 0x04;
    }
}

#[derive(Clone, Debug)]
pub struct Mobj {
    pub origin: DVec3,
    pub radius: f64,
    pub height: f64,
    /// Leaf at the mobj origin; valid while linked.
    pub bsp_leaf: Option<BspLeafId>,
    pub(crate) sector: Option<SectorId>,
    pub(crate) linked: MobjLinkFlags,
    pub(crate) touching_lines: SmallVec<[LineId; 8]>,
}

impl Mobj {
    pub fn bounds(&self) -> Aabb {
        let o = DVec2::new(self.origin.x, self.origin.y);
        Aabb {
            min: o - DVec2::splat(self.radius),
            max: o + DVec2::splat(self.radius),
        }
    }

    pub fn linked_flags(&self) -> MobjLinkFlags {
        self.linked
    }
}

/// Slab-style registry; removed slots are recycled so ids stay dense.
#[derive(Default)]
pub struct Thinkers {
    mobjs: Vec<Option<Mobj>>,
    free: Vec<MobjId>,
}

impl Thinkers {
    pub fn new() -> Thinkers {
        Thinkers::default()
    }

    pub fn insert(&mut self, origin: DVec3, radius: f64, height: f64) -> MobjId {
        let mobj = Mobj {
            origin,
            radius,
            height,
            bsp_leaf: None,
            sector: None,
            linked: MobjLinkFlags::empty(),
            touching_lines: SmallVec::new(),
        };
        if let Some(id) = self.free.pop() {
            self.mobjs[id as usize] = Some(mobj);
            id
        } else {
            self.mobjs.push(Some(mobj));
            (self.mobjs.len() - 1) as MobjId
        }
    }

    /// Caller must have unlinked the mobj first.
    pub fn remove(&mut self, id: MobjId) {
        if let Some(slot) = self.mobjs.get_mut(id as usize) {
            if slot.take().is_some() {
                self.free.push(id);
            }
        }
    }

    pub fn get(&self, id: MobjId) -> Option<&Mobj> {
        self.mobjs.get(id as usize).and_then(|m| m.as_ref())
    }

    pub fn get_mut(&mut self, id: MobjId) -> Option<&mut Mobj> {
        self.mobjs.get_mut(id as usize).and_then(|m| m.as_mut())
    }

    pub fn len(&self) -> usize {
        self.mobjs.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity of the id space (including recycled slots); blockmaps and
    /// stamp arrays size themselves from this.
    pub fn slot_count(&self) -> usize {
        self.mobjs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_recycled() {
        let mut reg = Thinkers::new();
        let a = reg.insert(DVec3::ZERO, 16.0, 56.0);
        let b = reg.insert(DVec3::new(64.0, 0.0, 0.0), 16.0, 56.0);
        assert_ne!(a, b);
        reg.remove(a);
        assert!(reg.get(a).is_none());
        let c = reg.insert(DVec3::ONE, 8.0, 16.0);
        assert_eq!(a, c);
        assert_eq!(reg.len(), 2);
    }
}

//! Frame contacts: which mobjs and light sources touch which subspaces.
//!
//! Contacts are declared per frame, linked into dedicated blockmaps by
//! origin, then spread outward from their origin subspace across open
//! edges until their radius gives out. Spreading is lazy per blockmap
//! cell; only cells overlapped by a requested region are processed.

use glam::{DVec2, DVec3};
use smallvec::SmallVec;

use crate::blockmap::{Blockmap, CELL_SIZE};
use crate::bsp::SubspaceId;
use crate::geom::Aabb;
use crate::map::Map;
use crate::map::mobj::MobjId;
use crate::valid::ValidCount;

pub type LumobjId = u32;

/// Hard cap on light sources per map.
pub const MAX_LUMOBJS: usize = 8192;

/// A luminous object: point light with a world radius.
#[derive(Clone, Debug)]
pub struct Lumobj {
    pub origin: DVec3,
    pub radius: f64,
}

/// What kind of object established a contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contact {
    Mobj(MobjId),
    Lumobj(LumobjId),
}

impl Contact {
    fn origin(self, map: &Map) -> Option<DVec3> {
        match self {
            Contact::Mobj(id) => map.thinkers.get(id).map(|m| m.origin),
            Contact::Lumobj(id) => map.lumobjs.get(id as usize).map(|l| l.origin),
        }
    }

    fn spread_bounds(self, map: &Map) -> Option<Aabb> {
        let (origin, radius) = match self {
            Contact::Mobj(id) => {
                let m = map.thinkers.get(id)?;
                (m.origin, m.radius)
            }
            Contact::Lumobj(id) => {
                let l = map.lumobjs.get(id as usize)?;
                (l.origin, l.radius)
            }
        };
        let o = DVec2::new(origin.x, origin.y);
        Some(Aabb {
            min: o - DVec2::splat(radius),
            max: o + DVec2::splat(radius),
        })
    }
}

/// Blockmap of linked contacts plus a dirty bit per cell.
struct ContactBlockmap {
    grid: Blockmap<Contact>,
    spread: Vec<bool>,
}

impl ContactBlockmap {
    fn new(bounds: &Aabb) -> ContactBlockmap {
        let grid = Blockmap::new(bounds.grown(8.0), CELL_SIZE);
        let cells = (grid.width() * grid.height()) as usize;
        ContactBlockmap {
            grid,
            spread: vec![false; cells],
        }
    }

    fn clear(&mut self) {
        self.grid.unlink_all();
        self.spread.fill(false);
    }
}

pub struct ContactSystem {
    contacts: Vec<Contact>,
    mobjs: ContactBlockmap,
    lumobjs: ContactBlockmap,
    subspace_mobjs: Vec<SmallVec<[MobjId; 4]>>,
    subspace_lumobjs: Vec<SmallVec<[LumobjId; 4]>>,
}

impl ContactSystem {
    pub fn new(map: &Map) -> ContactSystem {
        ContactSystem {
            contacts: Vec::new(),
            mobjs: ContactBlockmap::new(&map.bounds),
            lumobjs: ContactBlockmap::new(&map.bounds),
            subspace_mobjs: vec![SmallVec::new(); map.bsp.subspace_count()],
            subspace_lumobjs: vec![SmallVec::new(); map.bsp.subspace_count()],
        }
    }

    /// Drops every contact and all spread state from the previous frame.
    pub fn begin_frame(&mut self) {
        self.contacts.clear();
        self.mobjs.clear();
        self.lumobjs.clear();
        for list in &mut self.subspace_mobjs {
            list.clear();
        }
        for list in &mut self.subspace_lumobjs {
            list.clear();
        }
    }

    pub fn add_mobj_contact(&mut self, id: MobjId) {
        self.contacts.push(Contact::Mobj(id));
    }

    pub fn add_lumobj_contact(&mut self, id: LumobjId) {
        self.contacts.push(Contact::Lumobj(id));
    }

    /// Links every declared contact into its blockmap cell. Contacts
    /// whose object no longer exists are skipped.
    pub fn link_all(&mut self, map: &Map) {
        for i in 0..self.contacts.len() {
            let contact = self.contacts[i];
            let Some(origin) = contact.origin(map) else {
                continue;
            };
            let bm = match contact {
                Contact::Mobj(_) => &mut self.mobjs,
                Contact::Lumobj(_) => &mut self.lumobjs,
            };
            bm.grid.link_point(origin.truncate(), contact);
        }
    }

    /// Ensures every contact whose cell overlaps `region` has been spread
    /// to the subspaces it reaches.
    pub fn spread_in_region(&mut self, map: &Map, region: &Aabb, vc: &mut ValidCount) {
        let mut pending: Vec<Contact> = Vec::new();
        for bm in [&mut self.mobjs, &mut self.lumobjs] {
            let spread = &mut bm.spread;
            let grid = &bm.grid;
            grid.for_all_cells_in_box(region, |cell| {
                if !spread[cell] {
                    spread[cell] = true;
                    pending.extend_from_slice(grid.cell(cell));
                }
            });
        }
        for contact in pending {
            self.spread_contact(map, contact, vc);
        }
    }

    /// Flood the contact outward from its origin subspace. Edges are
    /// crossable when they are partition artifacts or two-sided lines
    /// whose vertical opening has not closed.
    fn spread_contact(&mut self, map: &Map, contact: Contact, vc: &mut ValidCount) {
        let Some(origin) = contact.origin(map) else {
            return;
        };
        let Some(bounds) = contact.spread_bounds(map) else {
            return;
        };
        let leaf = map.bsp.leaf_at(origin.truncate());
        let Some(start) = map.bsp.leaf(leaf).subspace else {
            return;
        };

        vc.begin();
        vc.visit_subspace(start);
        let mut stack = vec![start];
        while let Some(ss) = stack.pop() {
            self.add_to_subspace(contact, ss);
            let subspace = map.bsp.subspace(ss);
            for h in map.mesh.face_ring(subspace.face) {
                let a = map.mesh.hedge_from_origin(h);
                let b = map.mesh.hedge_to_origin(h);
                if !Aabb::from_points(a, b).overlaps(&bounds) {
                    continue;
                }
                if let Some(seg) = map.mesh.hedge(h).segment {
                    let line = &map.lines[seg.line as usize];
                    let (Some(fs), Some(bs)) = (line.front_sector(), line.back_sector())
                    else {
                        continue;
                    };
                    let front = &map.sectors[fs as usize];
                    let back = &map.sectors[bs as usize];
                    let top = front.ceiling.height.min(back.ceiling.height);
                    let bottom = front.floor.height.max(back.floor.height);
                    if top <= bottom {
                        continue;
                    }
                }
                let Some(next) = map.subspace_behind(h) else {
                    continue;
                };
                if map.bsp.subspace(next).sector.is_none() {
                    continue;
                }
                if vc.visit_subspace(next) {
                    stack.push(next);
                }
            }
        }
    }

    fn add_to_subspace(&mut self, contact: Contact, subspace: SubspaceId) {
        match contact {
            Contact::Mobj(id) => self.subspace_mobjs[subspace as usize].push(id),
            Contact::Lumobj(id) => self.subspace_lumobjs[subspace as usize].push(id),
        }
    }

    /// Visit the mobj contacts spread to `subspace`. The callback returns
    /// `false` to abort; so does this function.
    pub fn for_all_mobj_contacts(
        &self,
        subspace: SubspaceId,
        mut func: impl FnMut(MobjId) -> bool,
    ) -> bool {
        for &id in &self.subspace_mobjs[subspace as usize] {
            if !func(id) {
                return false;
            }
        }
        true
    }

    pub fn for_all_lumobj_contacts(
        &self,
        subspace: SubspaceId,
        mut func: impl FnMut(LumobjId) -> bool,
    ) -> bool {
        for &id in &self.subspace_lumobjs[subspace as usize] {
            if !func(id) {
                return false;
            }
        }
        true
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }
}

#[cfg(test)]
mod tests {
    use glam::{DVec2, DVec3};

    use super::*;
    use crate::map::MobjLinkFlags;
    use crate::testutil::{two_connected_rooms, two_disjoint_rooms};

    #[test]
    fn lumobj_light_spreads_through_an_open_border() {
        let mut map = two_connected_rooms();
        let id = map.add_lumobj(DVec3::new(126.0, 64.0, 40.0), 32.0).unwrap();
        let left = map.subspace_at(DVec2::new(64.0, 64.0)).unwrap();
        let right = map.subspace_at(DVec2::new(192.0, 64.0)).unwrap();

        let mut contacts = ContactSystem::new(&map);
        contacts.begin_frame();
        contacts.add_lumobj_contact(id);
        contacts.link_all(&map);
        let mut vc = map.new_valid_count();
        contacts.spread_in_region(&map, &map.bounds().clone(), &mut vc);

        for subspace in [left, right] {
            let mut seen = Vec::new();
            contacts.for_all_lumobj_contacts(subspace, |l| {
                seen.push(l);
                true
            });
            assert_eq!(seen, vec![id], "subspace {subspace}");
        }
    }

    #[test]
    fn small_radius_stays_in_its_own_subspace() {
        let mut map = two_connected_rooms();
        let id = map.add_lumobj(DVec3::new(40.0, 64.0, 40.0), 16.0).unwrap();
        let right = map.subspace_at(DVec2::new(192.0, 64.0)).unwrap();

        let mut contacts = ContactSystem::new(&map);
        contacts.begin_frame();
        contacts.add_lumobj_contact(id);
        contacts.link_all(&map);
        let mut vc = map.new_valid_count();
        contacts.spread_in_region(&map, &map.bounds().clone(), &mut vc);

        let mut seen = Vec::new();
        contacts.for_all_lumobj_contacts(right, |l| {
            seen.push(l);
            true
        });
        assert!(seen.is_empty());
    }

    #[test]
    fn mobj_contacts_never_cross_void() {
        let mut map = two_disjoint_rooms();
        let id = map.add_mobj(DVec3::new(120.0, 64.0, 0.0), 200.0, 56.0);
        map.link_mobj(id, MobjLinkFlags::all()).unwrap();
        let far = map.subspace_at(DVec2::new(576.0, 64.0)).unwrap();

        let mut contacts = ContactSystem::new(&map);
        contacts.begin_frame();
        contacts.add_mobj_contact(id);
        contacts.link_all(&map);
        let mut vc = map.new_valid_count();
        contacts.spread_in_region(&map, &map.bounds().clone(), &mut vc);

        let mut seen = Vec::new();
        contacts.for_all_mobj_contacts(far, |m| {
            seen.push(m);
            true
        });
        assert!(seen.is_empty());
        assert_eq!(contacts.contact_count(), 1);
    }

    #[test]
    fn spread_is_lazy_per_region() {
        let mut map = two_connected_rooms();
        let id = map.add_lumobj(DVec3::new(126.0, 64.0, 40.0), 32.0).unwrap();
        let left = map.subspace_at(DVec2::new(64.0, 64.0)).unwrap();

        let mut contacts = ContactSystem::new(&map);
        contacts.begin_frame();
        contacts.add_lumobj_contact(id);
        contacts.link_all(&map);

        // No region spread yet, so no subspace sees the contact.
        let mut seen = Vec::new();
        contacts.for_all_lumobj_contacts(left, |l| {
            seen.push(l);
            true
        });
        assert!(seen.is_empty());

        // Spreading the same region twice must not duplicate contacts.
        let mut vc = map.new_valid_count();
        let region = map.bounds().clone();
        contacts.spread_in_region(&map, &region, &mut vc);
        contacts.spread_in_region(&map, &region, &mut vc);
        seen.clear();
        contacts.for_all_lumobj_contacts(left, |l| {
            seen.push(l);
            true
        });
        assert_eq!(seen, vec![id]);
    }
}

//! Sectors, their planes and post-BSP subspace clusters.

use glam::DVec3;

use crate::bsp::SubspaceId;
use crate::geom::Aabb;
use crate::map::line::{LineId, SideIndex, SoundEmitter};
use crate::map::mobj::MobjId;

pub type SectorId = u32;

/// Floor or ceiling of a sector. Height is the only attribute that
/// mutates after finalization.
#[derive(Clone, Debug)]
pub struct Plane {
    pub height: f64,
    pub emitter: SoundEmitter,
}

impl Plane {
    pub fn new(height: f64) -> Plane {
        Plane {
            height,
            emitter: SoundEmitter::default(),
        }
    }
}

/// Game-logical region: floor/ceiling heights plus a light level. One
/// sector may cover several spatially disjoint groups of BSP leaves.
#[derive(Clone, Debug)]
pub struct Sector {
    pub light_level: f32,
    pub floor: Plane,
    pub ceiling: Plane,
    pub emitter: SoundEmitter,
    /// Sides of lines that reference this sector (front or back).
    pub sides: Vec<(LineId, SideIndex)>,
    /// Convex subspaces attributed to this sector by the BSP build.
    pub subspaces: Vec<SubspaceId>,
    /// Edge-adjacency clusters over `subspaces`; rebuilt wholesale by
    /// `Map::build_clusters`. Clusters reference subspaces, never own them.
    pub clusters: Vec<SectorCluster>,
    /// Mobjs whose origin lies in this sector (the sector chain).
    pub(crate) mobjs: Vec<MobjId>,
    /// Bounds of all subspace geometry attributed to this sector.
    pub bounds: Aabb,
}

impl Sector {
    pub fn new(light_level: f32, floor_height: f64, ceiling_height: f64) -> Sector {
        Sector {
            light_level,
            floor: Plane::new(floor_height),
            ceiling: Plane::new(ceiling_height),
            emitter: SoundEmitter::default(),
            sides: Vec::new(),
            subspaces: Vec::new(),
            clusters: Vec::new(),
            mobjs: Vec::new(),
            bounds: Aabb::empty(),
        }
    }

    /// Chain the sector's emitters: the sector emitter sits at the
    /// bounds center between the planes, plane emitters at their heights.
    pub fn chain_sound_emitters(&mut self) {
        let c = if self.bounds.is_empty() {
            glam::DVec2::ZERO
        } else {
            self.bounds.center()
        };
        let mid = (self.floor.height + self.ceiling.height) * 0.5;
        self.emitter.origin = DVec3::new(c.x, c.y, mid);
        self.floor.emitter.origin = DVec3::new(c.x, c.y, self.floor.height);
        self.ceiling.emitter.origin = DVec3::new(c.x, c.y, self.ceiling.height);
    }
}

/// A maximal set of edge-adjacent convex subspaces sharing one sector.
#[derive(Clone, Debug)]
pub struct SectorCluster {
    pub sector: SectorId,
    pub subspaces: Vec<SubspaceId>,
    pub bounds: Aabb,
}

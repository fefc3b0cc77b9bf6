//! Polyobjs: movable/rotatable sub-assemblies of lines, kept apart from
//! static map geometry and excluded from the BSP build.

use glam::DVec2;

use crate::bsp::SubspaceId;
use crate::geom::Aabb;
use crate::map::line::LineId;

pub type PolyobjId = u32;

#[derive(Clone, Debug)]
pub struct Polyobj {
    pub origin: DVec2,
    pub lines: Vec<LineId>,
    pub bounds: Aabb,
    /// Subspace containing the polyobj origin; refreshed on relink.
    pub subspace: Option<SubspaceId>,
    /// Whether the polyobj is currently linked into the blockmap.
    pub(crate) linked: bool,
}

impl Polyobj {
    pub fn new(origin: DVec2) -> Polyobj {
        Polyobj {
            origin,
            lines: Vec::new(),
            bounds: Aabb::empty(),
            subspace: None,
            linked: false,
        }
    }
}

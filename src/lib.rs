//! World map geometry and spatial queries.
//!
//! The crate builds a queryable 3D game world from editable map data:
//! a half-edge mesh and line/sector records go into a [`MapEditor`],
//! and [`MapEditor::end_editing`] compiles them into an immutable
//! [`Map`] with a cost-driven BSP tree, convex subspaces, blockmaps
//! and sector clusters. The finished map answers point location, box
//! iteration, line-of-sight and object contact queries.

pub mod blockmap;
pub mod bsp;
pub mod contact;
pub mod fixed;
pub mod geom;
pub mod map;
pub mod mesh;
pub mod sight;
pub mod valid;

#[cfg(test)]
pub(crate) mod testutil;

pub use blockmap::{Blockmap, CELL_SIZE};
pub use bsp::{BspLeaf, BspLeafId, BspTree, BuildListener, ConvexSubspace, NullListener, SubspaceId};
pub use contact::{Contact, ContactSystem, Lumobj, LumobjId};
pub use geom::{Aabb, Partition};
pub use map::{
    BuildError, Line, LineFlags, LineId, LineIterFlags, Map, MapEditor, MapError, Mobj, MobjId,
    MobjLinkFlags, Polyobj, PolyobjId, Sector, SectorCluster, SectorId, Segment, SegmentId,
};
pub use mesh::{Mesh, VertexId};
pub use sight::SightFlags;
pub use valid::ValidCount;

//! BSP tree storage and point location.

use glam::DVec2;

use crate::fixed;
use crate::geom::{Aabb, Partition};
use crate::map::polyobj::PolyobjId;
use crate::map::sector::SectorId;
use crate::mesh::FaceId;

pub type BspNodeId = u32;
pub type BspLeafId = u32;
pub type SubspaceId = u32;

/// Internal node: a partition line plus the bounds of each child region.
/// Child 0 lies on the front (right) side of the partition.
#[derive(Debug, Clone)]
pub struct BspNode {
    pub partition: Partition,
    pub bounds: [Aabb; 2],
    pub children: [u32; 2],
}

/// One element of the tree arena.
#[derive(Debug, Clone)]
pub enum BspElement {
    Node(BspNode),
    Leaf(BspLeafId),
}

/// Terminal region of the space partition. Leaves with degenerate
/// geometry carry no subspace; `sector` is the attributed map sector,
/// absent for void regions outside the playable area.
#[derive(Debug, Clone)]
pub struct BspLeaf {
    pub subspace: Option<SubspaceId>,
    pub sector: Option<SectorId>,
}

/// Convex polygon geometry attributed to a leaf.
#[derive(Debug, Clone)]
pub struct ConvexSubspace {
    pub face: FaceId,
    pub sector: Option<SectorId>,
    pub leaf: BspLeafId,
    /// Index into the owning sector's cluster list, assigned when the
    /// sector's clusters are built.
    pub cluster: Option<usize>,
    pub polyobjs: Vec<PolyobjId>,
    pub bounds: Aabb,
}

/// The built tree. Elements live in one arena; `root` is always valid
/// for a successfully built map.
#[derive(Debug)]
pub struct BspTree {
    pub(crate) elements: Vec<BspElement>,
    pub(crate) root: u32,
    pub(crate) leafs: Vec<BspLeaf>,
    pub(crate) subspaces: Vec<ConvexSubspace>,
    /// Line segments produced by the build, including partition-closure
    /// segments that map to no line.
    pub(crate) segment_count: usize,
    /// Vertexes the splitter added to the mesh.
    pub(crate) vertexes_added: usize,
}

impl BspTree {
    pub fn root(&self) -> u32 {
        self.root
    }

    pub fn element(&self, id: u32) -> &BspElement {
        &self.elements[id as usize]
    }

    pub fn leaf(&self, id: BspLeafId) -> &BspLeaf {
        &self.leafs[id as usize]
    }

    pub fn subspace(&self, id: SubspaceId) -> &ConvexSubspace {
        &self.subspaces[id as usize]
    }

    pub(crate) fn subspace_mut(&mut self, id: SubspaceId) -> &mut ConvexSubspace {
        &mut self.subspaces[id as usize]
    }

    pub fn node_count(&self) -> usize {
        self.elements.len() - self.leafs.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leafs.len()
    }

    pub fn subspace_count(&self) -> usize {
        self.subspaces.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn vertexes_added(&self) -> usize {
        self.vertexes_added
    }

    pub fn subspaces(&self) -> &[ConvexSubspace] {
        &self.subspaces
    }

    /// Locates the leaf containing `point` by descending from the root.
    /// Total: every point maps to some leaf, playable or void.
    pub fn leaf_at(&self, point: DVec2) -> BspLeafId {
        let mut cur = self.root;
        loop {
            match &self.elements[cur as usize] {
                BspElement::Node(node) => {
                    let side = node.partition.point_on_side(point);
                    cur = node.children[side];
                }
                BspElement::Leaf(leaf) => return *leaf,
            }
        }
    }

    /// Fixed-point variant of [`leaf_at`](Self::leaf_at), descending with
    /// 16.16 side tests so that callers sharing coordinates with the
    /// fixed-point tracer see identical leaf assignment.
    pub fn leaf_at_fixed(&self, point: DVec2) -> BspLeafId {
        let px = fixed::to_fixed(point.x);
        let py = fixed::to_fixed(point.y);
        let mut cur = self.root;
        loop {
            match &self.elements[cur as usize] {
                BspElement::Node(node) => {
                    let ox = fixed::to_fixed(node.partition.origin.x);
                    let oy = fixed::to_fixed(node.partition.origin.y);
                    let dx = fixed::to_fixed(node.partition.direction.x);
                    let dy = fixed::to_fixed(node.partition.direction.y);
                    let side = fixed::point_on_line_side([px, py], [ox, oy], [dx, dy]) as usize;
                    cur = node.children[side];
                }
                BspElement::Leaf(leaf) => return *leaf,
            }
        }
    }
}

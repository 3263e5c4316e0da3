//! Element records for the octree registry

use smallvec::SmallVec;

use crate::math::Aabb;
use super::octant::OctantId;
use super::pairs::PairKey;

/// Handle to a registered element. Handles start at 1 and are never
/// reused for the lifetime of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    /// Raw numeric value of the handle.
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// One query match: the element's owner payload and caller subindex.
#[derive(Clone, Debug, PartialEq)]
pub struct CullHit<T> {
    pub owner: T,
    pub subindex: i32,
}

/// Where an element is resident: the octant and its position in that
/// octant's resident vector. The index is patched whenever another
/// resident is swap-removed past it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OctantOwner {
    pub octant: OctantId,
    pub index: u32,
}

pub(crate) struct Element<T> {
    pub owner: T,
    pub subindex: i32,
    pub aabb: Aabb,
    /// Region covered by the octant(s) the element was inserted under.
    /// While a move stays inside it, the tree structure is untouched.
    pub container_aabb: Aabb,
    pub pairable: bool,
    pub pairable_type: u32,
    pub pairable_mask: u32,
    pub last_pass: u64,
    /// Smallest octant enclosing every current residency; reinsertion on
    /// move starts from here.
    pub common_parent: Option<OctantId>,
    /// An element straddling split planes can be resident in up to 8
    /// sibling octants at once.
    pub octant_owners: SmallVec<[OctantOwner; 8]>,
    pub pair_list: Vec<PairKey>,
}

impl<T> Element<T> {
    pub fn new(
        owner: T,
        aabb: Aabb,
        subindex: i32,
        pairable: bool,
        pairable_type: u32,
        pairable_mask: u32,
    ) -> Self {
        Self {
            owner,
            subindex,
            aabb,
            container_aabb: Aabb::default(),
            pairable,
            pairable_type,
            pairable_mask,
            last_pass: 0,
            common_parent: None,
            octant_owners: SmallVec::new(),
            pair_list: Vec::new(),
        }
    }
}

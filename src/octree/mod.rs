//! Dynamic bounding-volume octree for culling and overlap pair tracking.
//!
//! Elements are registered with an AABB and an opaque owner payload, live
//! in the smallest octants that hold them, and can be queried by convex
//! volume, box, segment or point. An optional pairing overlay tracks
//! exact AABB overlaps between pairable elements and reports begin/end
//! through a [`PairListener`].
//!
//! The tree is single-threaded by contract: every operation, queries
//! included, takes `&mut self` (queries stamp per-element visit counters
//! instead of allocating visited sets).

pub mod config;
pub mod element;
pub mod octant;
pub mod pairs;
mod cull;
mod tree;

pub use config::OctreeConfig;
pub use element::{CullHit, ElementId};
pub use pairs::{PairInfo, PairListener};

use std::collections::HashMap;
use std::fmt::Write as _;

use smallvec::SmallVec;

use crate::core::types::Result;
use crate::core::Error;
use crate::math::Aabb;

use element::{Element, OctantOwner};
use octant::{OctantArena, OctantId};
use pairs::{PairData, PairKey};

/// Upper bound on root size; growth past this indicates corrupt input.
pub const SIZE_LIMIT: f32 = 1e15;

/// Dynamic octree over owner payloads of type `T`.
///
/// `T` is cloned into query results and compared (by `PartialEq`) only to
/// suppress pairing between sub-shapes of the same owner.
pub struct Octree<T> {
    elements: HashMap<ElementId, Element<T>>,
    octants: OctantArena,
    pairs: HashMap<PairKey, PairData>,
    listener: Option<Box<dyn PairListener<T>>>,
    root: Option<OctantId>,
    next_id: u32,
    /// Monotonic traversal stamp; bumped once per pass that must visit
    /// each octant or element at most once.
    pass: u64,
    unit_size: f32,
    octant_elements_limit: usize,
    /// Currently intersecting tracked pairs.
    pair_count: usize,
    use_pairs: bool,
    cached_lists: bool,
}

impl<T: Clone + PartialEq> Octree<T> {
    pub fn new() -> Self {
        Self::with_config(OctreeConfig::default())
    }

    pub fn with_config(config: OctreeConfig) -> Self {
        let mut tree = Self {
            elements: HashMap::new(),
            octants: OctantArena::new(),
            pairs: HashMap::new(),
            listener: None,
            root: None,
            next_id: 1,
            pass: 1,
            unit_size: config.unit_size,
            octant_elements_limit: 0,
            pair_count: 0,
            use_pairs: config.pairing,
            cached_lists: config.cached_lists,
        };
        tree.set_balance(config.balance);
        tree
    }

    /// Register an element and, unless its AABB is degenerate, insert it
    /// into the tree. Returns the new handle.
    pub fn create(
        &mut self,
        owner: T,
        aabb: Aabb,
        subindex: i32,
        pairable: bool,
        pairable_type: u32,
        pairable_mask: u32,
    ) -> Result<ElementId> {
        validate_aabb(&aabb)?;
        if !aabb.is_degenerate() {
            self.ensure_valid_root(&aabb)?;
        }

        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(
            id,
            Element::new(owner, aabb, subindex, pairable, pairable_type, pairable_mask),
        );

        if !aabb.is_degenerate() {
            let root = self.root.expect("root exists after growth");
            self.insert_element(id, root);
            if self.use_pairs {
                self.element_check_pairs(id);
            }
        }
        Ok(id)
    }

    /// Update an element's AABB, restructuring the tree only when the new
    /// box escapes the region it was inserted under.
    pub fn move_element(&mut self, id: ElementId, aabb: Aabb) -> Result<()> {
        validate_aabb(&aabb)?;
        let e = self.elements.get(&id).ok_or(Error::UnknownElement(id))?;
        let old_aabb = e.aabb;
        let old_solid = !old_aabb.is_degenerate();
        let new_solid = !aabb.is_degenerate();

        if old_solid != new_solid {
            if old_solid {
                // shrinking to nothing is a plain removal
                self.remove_element(id);
                let e = self.elements.get_mut(&id).expect("element checked above");
                e.common_parent = None;
                e.aabb = aabb;
                self.optimize();
            } else {
                self.ensure_valid_root(&aabb)?;
                let e = self.elements.get_mut(&id).expect("element checked above");
                e.common_parent = None;
                e.aabb = aabb;
                let root = self.root.expect("root exists after growth");
                self.insert_element(id, root);
                if self.use_pairs {
                    self.element_check_pairs(id);
                }
            }
            return Ok(());
        }

        if !old_solid {
            return Ok(());
        }

        // fast path: the tree structure is still right for the new box,
        // but neighbors may have moved, so pairing is re-checked anyway
        let (container, pairable) = {
            let e = &self.elements[&id];
            (e.container_aabb, e.pairable)
        };
        if container.encloses(&aabb) {
            let e = self.elements.get_mut(&id).expect("element checked above");
            e.aabb = aabb;
            if self.cached_lists {
                let owners: SmallVec<[OctantId; 8]> =
                    e.octant_owners.iter().map(|o| o.octant).collect();
                for oid in owners {
                    self.octants.get_mut(oid).dirty = true;
                }
            }
            if self.use_pairs {
                self.element_check_pairs(id);
            }
            return Ok(());
        }

        let combined = old_aabb.merged(&aabb);
        self.ensure_valid_root(&combined)?;

        let owners = {
            let e = &self.elements[&id];
            assert!(!e.octant_owners.is_empty(), "solid element has no residency");
            e.octant_owners.clone()
        };
        let mut common_parent = self.elements[&id]
            .common_parent
            .expect("resident element has a common parent");

        self.pass += 1;

        while !self.octants.get(common_parent).aabb.encloses(&aabb) {
            common_parent = self
                .octants
                .get(common_parent)
                .parent
                .expect("grown root encloses the target AABB");
        }

        {
            let e = self.elements.get_mut(&id).expect("element checked above");
            e.octant_owners.clear();
            e.common_parent = None;
            e.aabb = aabb;
        }

        self.insert_element(id, common_parent);

        self.pass += 1;

        // drop the stale residencies; octants emptied by this are freed
        // on the way up, but never above the reinsertion ancestor
        let limit = self.octants.get(common_parent).parent;
        let mut survivors: SmallVec<[OctantOwner; 8]> = SmallVec::new();
        for owner in owners {
            self.detach_resident(owner.octant, self.use_pairs && pairable, owner.index);
            let removed = self.remove_element_pair_and_remove_empty_octants(id, owner.octant, limit);
            if !removed {
                survivors.push(owner);
            }
        }

        if self.use_pairs {
            // old descendant references in anything that survived
            for owner in &survivors {
                self.pass += 1;
                let children = self.octants.get(owner.octant).children;
                for child in children.into_iter().flatten() {
                    self.sweep_pairs(id, child, false);
                }
            }
            self.element_check_pairs(id);
        }

        self.optimize();
        Ok(())
    }

    /// Change pairing flags. A changed tuple re-inserts the element so
    /// its pair relations are rebuilt from scratch.
    pub fn set_pairable(
        &mut self,
        id: ElementId,
        pairable: bool,
        pairable_type: u32,
        pairable_mask: u32,
    ) -> Result<()> {
        let e = self.elements.get(&id).ok_or(Error::UnknownElement(id))?;
        if e.pairable == pairable
            && e.pairable_type == pairable_type
            && e.pairable_mask == pairable_mask
        {
            return Ok(());
        }

        let solid = !e.aabb.is_degenerate();
        if solid {
            self.remove_element(id);
        }

        let e = self.elements.get_mut(&id).expect("element checked above");
        e.pairable = pairable;
        e.pairable_type = pairable_type;
        e.pairable_mask = pairable_mask;
        e.common_parent = None;

        if solid {
            let aabb = e.aabb;
            self.ensure_valid_root(&aabb)?;
            let root = self.root.expect("root exists after growth");
            self.insert_element(id, root);
            if self.use_pairs {
                self.element_check_pairs(id);
            }
        }
        Ok(())
    }

    /// Remove an element from the tree and the registry.
    pub fn erase(&mut self, id: ElementId) -> Result<()> {
        let e = self.elements.get(&id).ok_or(Error::UnknownElement(id))?;
        if !e.aabb.is_degenerate() {
            self.remove_element(id);
        }
        self.elements.remove(&id);
        self.optimize();
        Ok(())
    }

    /// Owner payload of an element.
    pub fn get(&self, id: ElementId) -> Result<&T> {
        self.elements
            .get(&id)
            .map(|e| &e.owner)
            .ok_or(Error::UnknownElement(id))
    }

    /// Caller-supplied subindex of an element.
    pub fn get_subindex(&self, id: ElementId) -> Result<i32> {
        self.elements
            .get(&id)
            .map(|e| e.subindex)
            .ok_or(Error::UnknownElement(id))
    }

    pub fn is_pairable(&self, id: ElementId) -> Result<bool> {
        self.elements
            .get(&id)
            .map(|e| e.pairable)
            .ok_or(Error::UnknownElement(id))
    }

    /// Number of live octants.
    pub fn octant_count(&self) -> usize {
        self.octants.len()
    }

    /// Number of currently intersecting tracked pairs.
    pub fn pair_count(&self) -> usize {
        self.pair_count
    }

    /// Number of registered elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Minimum residents of an octant before it subdivides.
    pub fn set_octant_elements_limit(&mut self, limit: usize) {
        self.octant_elements_limit = limit;
    }

    /// Convenience wrapper over the element limit: 0.0 favors many small
    /// octants (query-heavy loads), 1.0 favors few large octants
    /// (edit-heavy loads). The mapping is empirically tuned.
    pub fn set_balance(&mut self, balance: f32) {
        let v = balance.clamp(0.0, 1.0);
        let v = v * v;
        let v = v * v;
        self.set_octant_elements_limit((v * 8096.0) as usize);
    }

    /// Install (or clear) the overlap listener. Only meaningful on trees
    /// built with pairing enabled.
    pub fn set_pair_listener(&mut self, listener: Option<Box<dyn PairListener<T>>>) {
        self.listener = listener;
    }

    /// Indented per-octant dump of the tree structure, for diagnostics.
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            self.dump_octant(root, 0, &mut out);
        }
        out
    }

    fn dump_octant(&self, oid: OctantId, depth: usize, out: &mut String) {
        let octant = self.octants.get(oid);
        for _ in 0..depth {
            out.push('\t');
        }
        let _ = writeln!(
            out,
            "octant {:?} -> {:?}: children {}, elements {}, pairable {}",
            octant.aabb.min,
            octant.aabb.max,
            octant.children_count,
            octant.elements.len(),
            octant.pairable_elements.len(),
        );
        for child in octant.children.into_iter().flatten() {
            self.dump_octant(child, depth + 1, out);
        }
    }
}

impl<T: Clone + PartialEq> Default for Octree<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_aabb(aabb: &Aabb) -> Result<()> {
    let size = aabb.size();
    let within = |v: f32| v.abs() <= SIZE_LIMIT;
    let ok = aabb.is_finite()
        && within(aabb.min.x)
        && within(aabb.min.y)
        && within(aabb.min.z)
        && within(aabb.max.x)
        && within(aabb.max.y)
        && within(aabb.max.z)
        && size.x >= 0.0
        && size.y >= 0.0
        && size.z >= 0.0
        && size.x <= SIZE_LIMIT
        && size.y <= SIZE_LIMIT
        && size.z <= SIZE_LIMIT;
    if ok { Ok(()) } else { Err(Error::InvalidAabb(*aabb)) }
}

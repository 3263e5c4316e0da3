//! Octant tree maintenance: insertion, root growth, removal cleanup
//!
//! These helpers assume their preconditions hold (live octant ids,
//! consistent residency tokens); the public API in `mod.rs` is the only
//! place inputs are validated.

use crate::core::types::{Result, Vec3};
use crate::core::Error;
use crate::math::Aabb;

use super::element::{ElementId, OctantOwner};
use super::octant::{Octant, OctantId};
use super::{Octree, SIZE_LIMIT};

/// An element becomes resident once it is larger than a quarter of the
/// octant edge.
const OCTANT_DIVISOR: f32 = 4.0;

impl<T: Clone + PartialEq> Octree<T> {
    /// Insert `id` at `oid` or below. May leave the element resident in
    /// several sibling octants when it straddles split planes.
    pub(crate) fn insert_element(&mut self, id: ElementId, oid: OctantId) {
        let (element_aabb, pairable) = {
            let e = &self.elements[&id];
            (e.aabb, e.pairable)
        };
        // inflate so boundary-sized elements don't flap between levels
        let element_size = element_aabb.longest_axis_size() * 1.01;

        let (octant_aabb, children_count) = {
            let octant = self.octants.get(oid);
            (octant.aabb, octant.children_count)
        };
        let resident_here = {
            let octant = self.octants.get(oid);
            let class_len = if pairable {
                octant.pairable_elements.len()
            } else {
                octant.elements.len()
            };
            // splitting below a minimum population just trades one flat
            // scan for eight
            let can_split = class_len >= self.octant_elements_limit;
            !can_split || element_size > octant_aabb.size().x / OCTANT_DIVISOR
        };

        if resident_here {
            let use_pair_list = self.use_pairs && pairable;
            let index = {
                let octant = self.octants.get_mut(oid);
                let list = if use_pair_list {
                    &mut octant.pairable_elements
                } else {
                    &mut octant.elements
                };
                list.push(id);
                let index = (list.len() - 1) as u32;
                octant.dirty = true;
                index
            };
            {
                let e = self.elements.get_mut(&id).expect("inserting a registered element");
                e.octant_owners.push(OctantOwner { octant: oid, index });
                if e.common_parent.is_none() {
                    e.common_parent = Some(oid);
                    e.container_aabb = octant_aabb;
                } else {
                    e.container_aabb = e.container_aabb.merged(&octant_aabb);
                }
            }

            if self.use_pairs && children_count > 0 {
                // elements below this level get exactly one reference
                self.pass += 1;
                let children = self.octants.get(oid).children;
                for child in children.into_iter().flatten() {
                    self.sweep_pairs(id, child, true);
                }
            }
        } else {
            let candidate = self.elements[&id].common_parent.is_none();
            let mut splits = 0;

            for i in 0..8 {
                match self.octants.get(oid).children[i] {
                    Some(child) => {
                        if self.octants.get(child).aabb.intersects(&element_aabb) {
                            self.insert_element(id, child);
                            splits += 1;
                        }
                    }
                    None => {
                        // only materialize a child whose region the
                        // element actually touches
                        let child_aabb = octant_aabb.child_octant(i as u8);
                        if child_aabb.intersects(&element_aabb) {
                            let child = self.octants.insert(Octant::new(child_aabb, Some(oid), i as i8));
                            let octant = self.octants.get_mut(oid);
                            octant.children[i] = Some(child);
                            octant.children_count += 1;
                            self.insert_element(id, child);
                            splits += 1;
                        }
                    }
                }
            }

            if candidate && splits > 1 {
                self.elements
                    .get_mut(&id)
                    .expect("inserting a registered element")
                    .common_parent = Some(oid);
            }
        }

        if self.use_pairs {
            let mut n = 0;
            loop {
                let other = match self.octants.get(oid).pairable_elements.get(n) {
                    Some(&other) => other,
                    None => break,
                };
                n += 1;
                self.pair_reference(id, other);
            }
            if pairable {
                // a pairable element also pairs against plain residents
                let mut n = 0;
                loop {
                    let other = match self.octants.get(oid).elements.get(n) {
                        Some(&other) => other,
                        None => break,
                    };
                    n += 1;
                    self.pair_reference(id, other);
                }
            }
        }
    }

    /// Make sure a root exists and encloses `target`, doubling towards
    /// whichever side keeps coordinates smaller. An existing root is
    /// reparented under new grandparents rather than rebuilt.
    pub(crate) fn ensure_valid_root(&mut self, target: &Aabb) -> Result<()> {
        match self.root {
            None => {
                let mut base = Aabb::new(Vec3::ZERO, Vec3::splat(self.unit_size));
                while !base.encloses(target) {
                    if base.size().x > SIZE_LIMIT {
                        log::error!("octree root cannot grow to enclose {target:?}");
                        return Err(Error::SizeLimit(base.size().x));
                    }
                    let size = base.size();
                    if base.max.x.abs() <= base.min.x.abs() {
                        base.max += size;
                    } else {
                        base.min -= size;
                    }
                }
                log::trace!("octree root created at {:?} -> {:?}", base.min, base.max);
                let root = self.octants.insert(Octant::new(base, None, -1));
                self.root = Some(root);
            }
            Some(mut root) => {
                let mut base = self.octants.get(root).aabb;
                while !base.encloses(target) {
                    if base.size().x > SIZE_LIMIT {
                        log::error!("octree root cannot grow to enclose {target:?}");
                        return Err(Error::SizeLimit(base.size().x));
                    }
                    let size = base.size();
                    // the old root becomes the corner child away from the
                    // growth direction
                    let (grown, slot) = if base.max.x.abs() <= base.min.x.abs() {
                        (Aabb::new(base.min, base.max + size), 0usize)
                    } else {
                        (Aabb::new(base.min - size, base.max), 7usize)
                    };

                    let grandparent = self.octants.insert(Octant::new(grown, None, -1));
                    {
                        let octant = self.octants.get_mut(grandparent);
                        octant.children[slot] = Some(root);
                        octant.children_count = 1;
                    }
                    {
                        let old_root = self.octants.get_mut(root);
                        old_root.parent = Some(grandparent);
                        old_root.parent_index = slot as i8;
                    }

                    base = grown;
                    root = grandparent;
                    self.root = Some(root);
                    log::trace!("octree root grown to {:?} -> {:?}", base.min, base.max);
                }
            }
        }
        Ok(())
    }

    /// Drop one residency record of an element at `oid`, patching the
    /// token of whichever resident got swapped into the vacated slot.
    pub(crate) fn detach_resident(&mut self, oid: OctantId, from_pairable: bool, index: u32) {
        let moved = {
            let octant = self.octants.get_mut(oid);
            let list = if from_pairable {
                &mut octant.pairable_elements
            } else {
                &mut octant.elements
            };
            list.swap_remove(index as usize);
            let moved = list.get(index as usize).copied();
            octant.dirty = true;
            moved
        };

        if let Some(moved) = moved {
            let e = self.elements.get_mut(&moved).expect("resident element is registered");
            let owner = e
                .octant_owners
                .iter_mut()
                .find(|owner| owner.octant == oid)
                .expect("moved resident has a token for this octant");
            owner.index = index;
        }
    }

    /// Walk up from `oid`, unpairing `id` against residents and deleting
    /// emptied octants. Stops at `limit`, or at the first octant that was
    /// neither freed nor freshly unpaired. Returns whether any octant was
    /// removed.
    pub(crate) fn remove_element_pair_and_remove_empty_octants(
        &mut self,
        id: ElementId,
        oid: OctantId,
        limit: Option<OctantId>,
    ) -> bool {
        let mut removed_any = false;
        let mut cur = Some(oid);

        loop {
            if cur == limit {
                return removed_any;
            }
            let oid = cur.expect("removal walk escaped past the root");

            let mut unpaired = false;
            if self.use_pairs && self.octants.get(oid).last_pass != self.pass {
                let mut n = 0;
                loop {
                    let other = match self.octants.get(oid).pairable_elements.get(n) {
                        Some(&other) => other,
                        None => break,
                    };
                    n += 1;
                    self.pair_unreference(id, other);
                }
                if self.elements[&id].pairable {
                    let mut n = 0;
                    loop {
                        let other = match self.octants.get(oid).elements.get(n) {
                            Some(&other) => other,
                            None => break,
                        };
                        n += 1;
                        self.pair_unreference(id, other);
                    }
                }
                self.octants.get_mut(oid).last_pass = self.pass;
                unpaired = true;
            }

            let parent = self.octants.get(oid).parent;
            let mut removed = false;
            if self.octants.get(oid).is_empty() {
                if Some(oid) == self.root {
                    self.root = None;
                } else {
                    let parent_index = self.octants.get(oid).parent_index;
                    assert!((0..8).contains(&parent_index), "corrupt parent index {parent_index}");
                    let parent_octant = self
                        .octants
                        .get_mut(parent.expect("non-root octant has a parent"));
                    parent_octant.children[parent_index as usize] = None;
                    parent_octant.children_count -= 1;
                }
                self.octants.remove(oid);
                removed = true;
                removed_any = true;
            }

            if !removed && !unpaired {
                // already visited and still alive, nothing above changes
                return removed_any;
            }
            cur = parent;
        }
    }

    /// Detach an element from every octant it is resident in, with
    /// pairing teardown and empty-octant cleanup.
    pub(crate) fn remove_element(&mut self, id: ElementId) {
        self.pass += 1;

        let owners = std::mem::take(
            &mut self.elements.get_mut(&id).expect("removing a registered element").octant_owners,
        );
        let pairable = self.elements[&id].pairable;

        for owner in &owners {
            if self.use_pairs {
                // descendants hold one reference each, drop them once
                self.pass += 1;
                let children = self.octants.get(owner.octant).children;
                for child in children.into_iter().flatten() {
                    self.sweep_pairs(id, child, false);
                }
            }
            self.detach_resident(owner.octant, self.use_pairs && pairable, owner.index);
            self.remove_element_pair_and_remove_empty_octants(id, owner.octant, None);
        }

        if self.use_pairs {
            assert!(
                self.elements[&id].pair_list.is_empty(),
                "element retained pair references after removal"
            );
        }
    }

    /// Shrink the root while it is a pass-through node, so tree height
    /// tracks current content rather than historical extent.
    pub(crate) fn optimize(&mut self) {
        while let Some(root) = self.root {
            let octant = self.octants.get(root);
            if octant.children_count >= 2
                || !octant.elements.is_empty()
                || !octant.pairable_elements.is_empty()
            {
                break;
            }

            let new_root = octant.children.into_iter().flatten().next();
            if let Some(new_root) = new_root {
                let promoted = self.octants.get_mut(new_root);
                promoted.parent = None;
                promoted.parent_index = -1;
            }
            self.octants.remove(root);
            self.root = new_root;
        }
    }
}

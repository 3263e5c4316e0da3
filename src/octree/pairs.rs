//! Overlap pair tracking
//!
//! A pair record exists while two mutually pairable elements share at
//! least one octant; the reference count is one per shared octant. The
//! `intersect` flag is the exact AABB overlap test and is what drives
//! the listener callbacks, so two elements can share an octant without
//! ever being reported as touching.

use std::any::Any;

use super::element::ElementId;
use super::octant::OctantId;
use super::Octree;

/// Unordered pair of element ids, stored with the lower id first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PairKey {
    pub a: ElementId,
    pub b: ElementId,
}

impl PairKey {
    pub fn new(a: ElementId, b: ElementId) -> Self {
        if a.0 < b.0 { Self { a, b } } else { Self { a: b, b: a } }
    }
}

pub(crate) struct PairData {
    /// One count per octant where both elements are visible to each
    /// other; the record dies when it reaches zero.
    pub refcount: u32,
    pub intersect: bool,
    /// Whatever the listener's `on_pair` returned, handed back on unpair.
    pub token: Option<Box<dyn Any>>,
}

/// One endpoint of a pair as handed to the listener.
pub struct PairInfo<'a, T> {
    pub id: ElementId,
    pub owner: &'a T,
    pub subindex: i32,
}

/// Receives overlap begin/end notifications.
///
/// Callbacks run synchronously from inside `create`, `move_element`,
/// `set_pairable` and `erase`; they must not call back into the octree.
pub trait PairListener<T> {
    /// Two elements started overlapping. The returned token is stored
    /// with the pair and handed back to
    /// [`on_unpair`](PairListener::on_unpair).
    fn on_pair(&mut self, a: PairInfo<'_, T>, b: PairInfo<'_, T>) -> Option<Box<dyn Any>>;

    /// The overlap ended, or the pair was dropped while still
    /// overlapping.
    fn on_unpair(&mut self, a: PairInfo<'_, T>, b: PairInfo<'_, T>, token: Option<Box<dyn Any>>);
}

impl<T: Clone + PartialEq> Octree<T> {
    /// Add one co-residency reference between two elements, creating the
    /// pair record if this is the first.
    pub(crate) fn pair_reference(&mut self, a: ElementId, b: ElementId) {
        if a == b {
            return;
        }
        {
            let ea = &self.elements[&a];
            let eb = &self.elements[&b];
            // sub-shapes of one owner never pair with each other
            if ea.owner == eb.owner {
                return;
            }
            if (ea.pairable_type & eb.pairable_mask) == 0
                && (eb.pairable_type & ea.pairable_mask) == 0
            {
                return;
            }
        }

        let key = PairKey::new(a, b);
        use std::collections::hash_map::Entry;
        match self.pairs.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().refcount += 1;
            }
            Entry::Vacant(entry) => {
                entry.insert(PairData {
                    refcount: 1,
                    intersect: false,
                    token: None,
                });
                self.elements.get_mut(&a).expect("pair endpoint is registered").pair_list.push(key);
                self.elements.get_mut(&b).expect("pair endpoint is registered").pair_list.push(key);
            }
        }
    }

    /// Drop one co-residency reference; destroys the record (and fires
    /// the unpair callback if the pair was overlapping) at zero.
    pub(crate) fn pair_unreference(&mut self, a: ElementId, b: ElementId) {
        if a == b {
            return;
        }
        let key = PairKey::new(a, b);
        let (dead, was_intersecting, token) = match self.pairs.get_mut(&key) {
            None => return,
            Some(pair) => {
                assert!(pair.refcount > 0, "pair refcount underflow");
                pair.refcount -= 1;
                if pair.refcount == 0 {
                    (true, pair.intersect, pair.token.take())
                } else {
                    (false, false, None)
                }
            }
        };
        if !dead {
            return;
        }

        if was_intersecting {
            self.pair_count -= 1;
            if let Some(listener) = self.listener.as_mut() {
                let ea = &self.elements[&key.a];
                let eb = &self.elements[&key.b];
                listener.on_unpair(
                    PairInfo { id: key.a, owner: &ea.owner, subindex: ea.subindex },
                    PairInfo { id: key.b, owner: &eb.owner, subindex: eb.subindex },
                    token,
                );
            }
        }

        for id in [key.a, key.b] {
            let e = self.elements.get_mut(&id).expect("pair endpoint is registered");
            let pos = e
                .pair_list
                .iter()
                .position(|k| *k == key)
                .expect("pair key listed on endpoint");
            e.pair_list.swap_remove(pos);
        }
        self.pairs.remove(&key);
    }

    /// Re-run the exact AABB test for one pair and fire the listener on
    /// an edge in either direction.
    pub(crate) fn pair_check(&mut self, key: PairKey) {
        let intersect = {
            let ea = &self.elements[&key.a];
            let eb = &self.elements[&key.b];
            ea.aabb.intersects(&eb.aabb)
        };
        let pair = self.pairs.get_mut(&key).expect("pair data for listed key");
        if intersect == pair.intersect {
            return;
        }
        pair.intersect = intersect;

        if intersect {
            self.pair_count += 1;
            if let Some(listener) = self.listener.as_mut() {
                let ea = &self.elements[&key.a];
                let eb = &self.elements[&key.b];
                pair.token = listener.on_pair(
                    PairInfo { id: key.a, owner: &ea.owner, subindex: ea.subindex },
                    PairInfo { id: key.b, owner: &eb.owner, subindex: eb.subindex },
                );
            }
        } else {
            self.pair_count -= 1;
            let token = pair.token.take();
            if let Some(listener) = self.listener.as_mut() {
                let ea = &self.elements[&key.a];
                let eb = &self.elements[&key.b];
                listener.on_unpair(
                    PairInfo { id: key.a, owner: &ea.owner, subindex: ea.subindex },
                    PairInfo { id: key.b, owner: &eb.owner, subindex: eb.subindex },
                    token,
                );
            }
        }
    }

    /// Re-check every tracked pair of one element. Runs on every create,
    /// move and pairing change: the tree structure may be untouched while
    /// overlaps still flip.
    pub(crate) fn element_check_pairs(&mut self, id: ElementId) {
        let mut n = 0;
        loop {
            let Some(&key) = self.elements[&id].pair_list.get(n) else {
                break;
            };
            self.pair_check(key);
            n += 1;
        }
    }

    /// Reference (or unreference) `id` against everything resident at
    /// `oid` and below. Each element is visited at most once per pass.
    pub(crate) fn sweep_pairs(&mut self, id: ElementId, oid: OctantId, acquire: bool) {
        self.sweep_pair_list(id, oid, true, acquire);
        if self.elements[&id].pairable {
            self.sweep_pair_list(id, oid, false, acquire);
        }

        let octant = self.octants.get_mut(oid);
        octant.last_pass = self.pass;
        if octant.children_count == 0 {
            return;
        }
        let children = octant.children;
        for child in children.into_iter().flatten() {
            self.sweep_pairs(id, child, acquire);
        }
    }

    fn sweep_pair_list(&mut self, id: ElementId, oid: OctantId, pairable_list: bool, acquire: bool) {
        let mut n = 0;
        loop {
            let other = {
                let octant = self.octants.get(oid);
                let list = if pairable_list { &octant.pairable_elements } else { &octant.elements };
                match list.get(n) {
                    Some(&other) => other,
                    None => break,
                }
            };
            n += 1;

            if self.elements[&other].last_pass == self.pass {
                continue;
            }
            self.elements.get_mut(&other).expect("resident element is registered").last_pass = self.pass;

            if acquire {
                self.pair_reference(id, other);
            } else {
                self.pair_unreference(id, other);
            }
        }
    }
}

#[cfg(test)]
impl<T: Clone + PartialEq> Octree<T> {
    /// Co-residency reference count of a tracked pair, if any.
    pub(crate) fn pair_refcount(&self, a: ElementId, b: ElementId) -> Option<u32> {
        self.pairs.get(&PairKey::new(a, b)).map(|p| p.refcount)
    }

    /// Number of pair records, intersecting or not.
    pub(crate) fn tracked_pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Number of octants the element is currently resident in.
    pub(crate) fn residency_count(&self, id: ElementId) -> usize {
        self.elements[&id].octant_owners.len()
    }
}

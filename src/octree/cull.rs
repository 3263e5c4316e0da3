//! Query engines: convex volume, AABB, segment and point culls
//!
//! All four run the same traversal; only the shape predicate differs,
//! and the same predicate gates both octant descent and element
//! filtering. Each query bumps the tree-wide pass once so an element
//! resident in several visited octants is reported a single time.

use crate::core::types::Vec3;
use crate::math::convex;
use crate::math::{Aabb, Plane};

use super::element::{CullHit, ElementId};
use super::octant::{Octant, OctantId};
use super::Octree;

impl<T: Clone + PartialEq> Octree<T> {
    /// Collect elements intersecting the convex region described by up
    /// to six inward-facing planes (e.g. a [`Frustum`]'s plane set).
    /// An empty or unbounded region matches nothing.
    ///
    /// [`Frustum`]: crate::math::Frustum
    pub fn cull_convex(
        &mut self,
        planes: &[Plane],
        out: &mut Vec<CullHit<T>>,
        max: usize,
        mask: u32,
    ) -> usize {
        out.clear();
        debug_assert!(planes.len() <= 6, "convex culls take at most 6 planes");
        let Some(root) = self.root else { return 0 };
        if planes.is_empty() {
            return 0;
        }
        let points = convex::convex_points(planes);
        if points.is_empty() {
            log::debug!("convex cull with an empty or unbounded plane set");
            return 0;
        }

        self.pass += 1;
        self.cull_recursive(
            root,
            &|aabb: &Aabb| convex::intersects_convex(aabb, planes, &points),
            out,
            max,
            mask,
        );
        out.len()
    }

    /// Collect elements whose AABB touches `aabb` (boundaries count).
    pub fn cull_aabb(
        &mut self,
        aabb: &Aabb,
        out: &mut Vec<CullHit<T>>,
        max: usize,
        mask: u32,
    ) -> usize {
        out.clear();
        let Some(root) = self.root else { return 0 };
        self.pass += 1;
        let query = *aabb;
        self.cull_recursive(root, &move |aabb: &Aabb| aabb.intersects(&query), out, max, mask);
        out.len()
    }

    /// Collect elements whose AABB is crossed by the segment `from..to`.
    pub fn cull_segment(
        &mut self,
        from: Vec3,
        to: Vec3,
        out: &mut Vec<CullHit<T>>,
        max: usize,
        mask: u32,
    ) -> usize {
        out.clear();
        let Some(root) = self.root else { return 0 };
        self.pass += 1;
        self.cull_recursive(
            root,
            &move |aabb: &Aabb| aabb.intersects_segment(from, to),
            out,
            max,
            mask,
        );
        out.len()
    }

    /// Collect elements whose AABB contains `point`.
    pub fn cull_point(
        &mut self,
        point: Vec3,
        out: &mut Vec<CullHit<T>>,
        max: usize,
        mask: u32,
    ) -> usize {
        out.clear();
        let Some(root) = self.root else { return 0 };
        self.pass += 1;
        self.cull_recursive(root, &move |aabb: &Aabb| aabb.contains_point(point), out, max, mask);
        out.len()
    }

    fn cull_recursive(
        &mut self,
        oid: OctantId,
        test: &dyn Fn(&Aabb) -> bool,
        out: &mut Vec<CullHit<T>>,
        max: usize,
        mask: u32,
    ) {
        if out.len() == max {
            return;
        }

        if !self.scan_residents(oid, false, test, out, max, mask) {
            return;
        }
        if self.use_pairs && !self.scan_residents(oid, true, test, out, max, mask) {
            return;
        }

        let children = self.octants.get(oid).children;
        for child in children.into_iter().flatten() {
            if test(&self.octants.get(child).aabb) {
                self.cull_recursive(child, test, out, max, mask);
                if out.len() == max {
                    return;
                }
            }
        }
    }

    /// Scan one resident list; returns false once the output is full.
    fn scan_residents(
        &mut self,
        oid: OctantId,
        pairable: bool,
        test: &dyn Fn(&Aabb) -> bool,
        out: &mut Vec<CullHit<T>>,
        max: usize,
        mask: u32,
    ) -> bool {
        if self.cached_lists {
            self.refresh_cached_lists(oid);
            let mut n = 0;
            loop {
                let (aabb, id) = {
                    let octant = self.octants.get(oid);
                    let list = if pairable { &octant.clist_pairable } else { &octant.clist };
                    match list.ids.get(n) {
                        Some(&id) => (list.aabbs[n], id),
                        None => break,
                    }
                };
                n += 1;
                // AABB first: it is contiguous in the cached list, the
                // element record is a hash lookup away
                if !test(&aabb) {
                    continue;
                }
                if !self.collect_hit(id, out, max, mask) {
                    return false;
                }
            }
        } else {
            let mut n = 0;
            loop {
                let id = {
                    let octant = self.octants.get(oid);
                    let list = if pairable { &octant.pairable_elements } else { &octant.elements };
                    match list.get(n) {
                        Some(&id) => id,
                        None => break,
                    }
                };
                n += 1;
                let aabb = self.elements[&id].aabb;
                if !test(&aabb) {
                    continue;
                }
                if !self.collect_hit(id, out, max, mask) {
                    return false;
                }
            }
        }
        true
    }

    /// Stamp, filter and append one candidate; returns false when the
    /// output array is full.
    fn collect_hit(&mut self, id: ElementId, out: &mut Vec<CullHit<T>>, max: usize, mask: u32) -> bool {
        let e = self.elements.get_mut(&id).expect("resident element is registered");
        if e.last_pass == self.pass || (self.use_pairs && (e.pairable_type & mask) == 0) {
            return true;
        }
        e.last_pass = self.pass;

        if out.len() < max {
            out.push(CullHit { owner: e.owner.clone(), subindex: e.subindex });
            true
        } else {
            false
        }
    }

    /// Rebuild the octant's flattened scan mirrors if stale.
    fn refresh_cached_lists(&mut self, oid: OctantId) {
        let octant = self.octants.get_mut(oid);
        if !octant.dirty {
            return;
        }
        octant.dirty = false;

        let Octant {
            elements: plain,
            pairable_elements: paired,
            clist,
            clist_pairable,
            ..
        } = octant;
        clist.aabbs.clear();
        clist.ids.clear();
        for &id in plain.iter() {
            clist.aabbs.push(self.elements[&id].aabb);
            clist.ids.push(id);
        }
        clist_pairable.aabbs.clear();
        clist_pairable.ids.clear();
        for &id in paired.iter() {
            clist_pairable.aabbs.push(self.elements[&id].aabb);
            clist_pairable.ids.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::types::{Mat4, Vec3};
    use crate::math::{Aabb, Frustum};
    use crate::octree::Octree;

    fn cube(min: Vec3, size: f32) -> Aabb {
        Aabb::new(min, min + Vec3::splat(size))
    }

    fn owners(hits: &[crate::octree::CullHit<u32>]) -> Vec<u32> {
        let mut v: Vec<_> = hits.iter().map(|h| h.owner).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn test_cull_segment_hits_along_the_line() {
        let mut tree: Octree<u32> = Octree::new();
        tree.create(0, cube(Vec3::new(0.0, 0.0, 0.0), 1.0), 0, false, 0, 1).unwrap();
        tree.create(1, cube(Vec3::new(5.0, 0.0, 0.0), 1.0), 0, false, 0, 1).unwrap();
        tree.create(2, cube(Vec3::new(5.0, 5.0, 0.0), 1.0), 0, false, 0, 1).unwrap();

        let mut hits = Vec::new();
        tree.cull_segment(
            Vec3::new(-1.0, 0.5, 0.5),
            Vec3::new(10.0, 0.5, 0.5),
            &mut hits,
            8,
            u32::MAX,
        );
        assert_eq!(owners(&hits), vec![0, 1]);

        // a segment that stops before the second box
        tree.cull_segment(
            Vec3::new(-1.0, 0.5, 0.5),
            Vec3::new(2.0, 0.5, 0.5),
            &mut hits,
            8,
            u32::MAX,
        );
        assert_eq!(owners(&hits), vec![0]);
    }

    #[test]
    fn test_cull_point_boundary_is_inclusive() {
        let mut tree: Octree<u32> = Octree::new();
        tree.create(0, cube(Vec3::ZERO, 1.0), 0, false, 0, 1).unwrap();
        tree.create(1, cube(Vec3::new(1.0, 0.0, 0.0), 1.0), 0, false, 0, 1).unwrap();

        let mut hits = Vec::new();
        tree.cull_point(Vec3::new(1.0, 0.5, 0.5), &mut hits, 8, u32::MAX);
        // the shared face belongs to both
        assert_eq!(owners(&hits), vec![0, 1]);

        tree.cull_point(Vec3::new(3.0, 0.5, 0.5), &mut hits, 8, u32::MAX);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_cull_convex_with_frustum_planes() {
        let mut tree: Octree<u32> = Octree::new();
        let visible = tree
            .create(0, Aabb::new(Vec3::splat(-0.4), Vec3::splat(0.4)), 0, false, 0, 1)
            .unwrap();
        let off_screen = tree
            .create(1, cube(Vec3::new(10.0, 0.0, 0.0), 1.0), 0, false, 0, 1)
            .unwrap();

        let proj = Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let frustum = Frustum::from_view_projection(&(proj * view));

        let mut hits = Vec::new();
        tree.cull_convex(&frustum.planes, &mut hits, 8, u32::MAX);
        assert_eq!(owners(&hits), vec![0]);
        let _ = (visible, off_screen);
    }

    #[test]
    fn test_cull_convex_degenerate_planes() {
        let mut tree: Octree<u32> = Octree::new();
        tree.create(0, cube(Vec3::ZERO, 1.0), 0, false, 0, 1).unwrap();

        let mut hits = Vec::new();
        // fewer than three planes never bound a region
        let planes = [crate::math::Plane::new(Vec3::X, 0.0)];
        assert_eq!(tree.cull_convex(&planes, &mut hits, 8, u32::MAX), 0);
        assert_eq!(tree.cull_convex(&[], &mut hits, 8, u32::MAX), 0);
    }

    #[test]
    fn test_queries_on_empty_tree() {
        let mut tree: Octree<u32> = Octree::new();
        let mut hits = Vec::new();
        assert_eq!(tree.cull_aabb(&cube(Vec3::ZERO, 1.0), &mut hits, 8, u32::MAX), 0);
        assert_eq!(tree.cull_point(Vec3::ZERO, &mut hits, 8, u32::MAX), 0);
        assert_eq!(
            tree.cull_segment(Vec3::ZERO, Vec3::ONE, &mut hits, 8, u32::MAX),
            0
        );
    }

    #[test]
    fn test_moved_element_found_at_new_place_with_cached_lists() {
        // the cached mirror is rebuilt lazily, so query right after a
        // fast-path move
        let mut tree: Octree<u32> = Octree::new();
        let a = tree.create(0, cube(Vec3::ZERO, 1.0), 0, false, 0, 1).unwrap();
        let mut hits = Vec::new();
        tree.cull_point(Vec3::splat(0.5), &mut hits, 8, u32::MAX);
        assert_eq!(owners(&hits), vec![0]);

        // stays inside the container, no restructuring
        tree.move_element(a, cube(Vec3::new(0.2, 0.0, 0.0), 0.7)).unwrap();
        tree.cull_point(Vec3::new(0.1, 0.1, 0.1), &mut hits, 8, u32::MAX);
        assert!(hits.is_empty());
        tree.cull_point(Vec3::new(0.5, 0.5, 0.5), &mut hits, 8, u32::MAX);
        assert_eq!(owners(&hits), vec![0]);
    }
}

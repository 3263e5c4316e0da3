//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create AABB from center and half-extents
    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get half-extents
    pub fn half_extent(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Extent of the longest axis
    pub fn longest_axis_size(&self) -> f32 {
        let s = self.size();
        s.x.max(s.y).max(s.z)
    }

    /// True if the box has zero extent on any axis (no interior volume)
    pub fn is_degenerate(&self) -> bool {
        let s = self.size();
        s.x <= 0.0 || s.y <= 0.0 || s.z <= 0.0
    }

    /// True if every component is finite
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Check if point is inside AABB (boundary inclusive)
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Check if two AABBs intersect (touching boundaries count)
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Check if `other` lies fully inside this AABB (boundary inclusive)
    pub fn encloses(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x && self.max.x >= other.max.x &&
        self.min.y <= other.min.y && self.max.y >= other.max.y &&
        self.min.z <= other.min.z && self.max.z >= other.max.z
    }

    /// Check if the segment `from..to` passes through the box.
    ///
    /// Clips the segment parameter range against each axis slab.
    pub fn intersects_segment(&self, from: Vec3, to: Vec3) -> bool {
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for i in 0..3 {
            let seg_from = from[i];
            let seg_to = to[i];
            let box_begin = self.min[i];
            let box_end = self.max[i];

            let (cmin, cmax) = if seg_from < seg_to {
                if seg_from > box_end || seg_to < box_begin {
                    return false;
                }
                let length = seg_to - seg_from;
                (
                    if seg_from < box_begin { (box_begin - seg_from) / length } else { 0.0 },
                    if seg_to > box_end { (box_end - seg_from) / length } else { 1.0 },
                )
            } else {
                if seg_to > box_end || seg_from < box_begin {
                    return false;
                }
                let length = seg_to - seg_from;
                (
                    if seg_from > box_end { (box_end - seg_from) / length } else { 0.0 },
                    if seg_to < box_begin { (box_begin - seg_from) / length } else { 1.0 },
                )
            };

            if cmin > t_min {
                t_min = cmin;
            }
            if cmax < t_max {
                t_max = cmax;
            }
            if t_max < t_min {
                return false;
            }
        }

        true
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Return merged AABB containing both
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Get child octant AABB for octree subdivision
    /// index: 0-7 representing xyz octant (bit 0=x, bit 1=y, bit 2=z)
    pub fn child_octant(&self, index: u8) -> Aabb {
        let center = self.center();
        let half = self.half_extent() * 0.5;

        let offset = Vec3::new(
            if index & 1 != 0 { half.x } else { -half.x },
            if index & 2 != 0 { half.y } else { -half.y },
            if index & 4 != 0 { half.z } else { -half.z },
        );

        Aabb::from_center_half_extent(center + offset, half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
        assert_eq!(aabb.size(), Vec3::ONE);
        assert_eq!(aabb.longest_axis_size(), 1.0);
    }

    #[test]
    fn test_contains_point() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::splat(0.5)));
        assert!(aabb.contains_point(Vec3::ONE)); // boundary inclusive
        assert!(!aabb.contains_point(Vec3::splat(2.0)));
    }

    #[test]
    fn test_intersects() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(1.5));
        let c = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let touching = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&touching));
    }

    #[test]
    fn test_encloses() {
        let outer = Aabb::new(Vec3::ZERO, Vec3::splat(4.0));
        let inner = Aabb::new(Vec3::ONE, Vec3::splat(2.0));
        assert!(outer.encloses(&inner));
        assert!(outer.encloses(&outer)); // boundary inclusive
        assert!(!inner.encloses(&outer));
    }

    #[test]
    fn test_degenerate() {
        let flat = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0));
        let solid = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(flat.is_degenerate());
        assert!(!solid.is_degenerate());
        assert!(Aabb::default().is_degenerate());
    }

    #[test]
    fn test_is_finite() {
        let ok = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let bad = Aabb::new(Vec3::ZERO, Vec3::new(f32::NAN, 1.0, 1.0));
        assert!(ok.is_finite());
        assert!(!bad.is_finite());
    }

    #[test]
    fn test_intersects_segment() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        // straight through
        assert!(aabb.intersects_segment(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(2.0, 0.5, 0.5)));
        // reversed direction
        assert!(aabb.intersects_segment(Vec3::new(2.0, 0.5, 0.5), Vec3::new(-1.0, 0.5, 0.5)));
        // stops short
        assert!(!aabb.intersects_segment(Vec3::new(-2.0, 0.5, 0.5), Vec3::new(-1.0, 0.5, 0.5)));
        // misses sideways
        assert!(!aabb.intersects_segment(Vec3::new(-1.0, 5.0, 0.5), Vec3::new(2.0, 5.0, 0.5)));
        // fully inside
        assert!(aabb.intersects_segment(Vec3::splat(0.25), Vec3::splat(0.75)));
    }

    #[test]
    fn test_merged() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let m = a.merged(&b);
        assert_eq!(m.min, Vec3::ZERO);
        assert_eq!(m.max, Vec3::splat(3.0));
    }

    #[test]
    fn test_child_octant() {
        let parent = Aabb::new(Vec3::ZERO, Vec3::splat(2.0));
        let child0 = parent.child_octant(0); // -x, -y, -z
        assert_eq!(child0.min, Vec3::ZERO);
        assert_eq!(child0.max, Vec3::ONE);
        let child7 = parent.child_octant(7); // +x, +y, +z
        assert_eq!(child7.min, Vec3::ONE);
        assert_eq!(child7.max, Vec3::splat(2.0));
    }
}

//! Convex volume helpers for the convex cull path
//!
//! A convex region is described by a small set of inward-facing planes
//! plus the vertex set of their intersection polytope. The vertex set is
//! what lets the AABB test reject boxes that sit outside the polytope but
//! inside every individual half-space.

use smallvec::SmallVec;

use crate::core::types::Vec3;
use super::aabb::Aabb;
use super::frustum::Plane;

/// Vertex set of a plane-bounded polytope; a box has 8 corners.
pub type ConvexPoints = SmallVec<[Vec3; 8]>;

const POINT_EPSILON: f32 = 1e-5;

/// Enumerate the vertices of the convex region bounded by `planes`.
///
/// Every unique triple of planes is intersected and the candidate vertex
/// kept when no other plane places it outside. An empty or unbounded
/// region yields an empty set.
pub fn convex_points(planes: &[Plane]) -> ConvexPoints {
    let mut points = ConvexPoints::new();

    for i in (0..planes.len()).rev() {
        for j in (0..i).rev() {
            for k in (0..j).rev() {
                let Some(candidate) = planes[i].intersect_3(&planes[j], &planes[k]) else {
                    continue;
                };

                let excluded = planes.iter().enumerate().any(|(n, p)| {
                    n != i && n != j && n != k
                        && p.distance_to_point(candidate) < -POINT_EPSILON
                });

                if !excluded {
                    points.push(candidate);
                }
            }
        }
    }

    points
}

/// Test an AABB against a convex region given as planes plus the region's
/// vertex set.
pub fn intersects_convex(aabb: &Aabb, planes: &[Plane], points: &[Vec3]) -> bool {
    // plane side: out when the most-inside corner is behind any plane
    for p in planes {
        let support = Vec3::new(
            if p.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
            if p.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
            if p.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
        );
        if p.distance_to_point(support) < 0.0 {
            return false;
        }
    }

    // vertex side: out when every polytope vertex falls past one face slab
    for axis in 0..3 {
        let mut over = 0;
        let mut under = 0;
        for pt in points {
            if pt[axis] > aabb.max[axis] {
                over += 1;
            }
            if pt[axis] < aabb.min[axis] {
                under += 1;
            }
        }
        if over == points.len() || under == points.len() {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inward planes of the box `[min, max]`.
    fn box_planes(min: Vec3, max: Vec3) -> Vec<Plane> {
        vec![
            Plane::new(Vec3::X, -min.x),
            Plane::new(-Vec3::X, max.x),
            Plane::new(Vec3::Y, -min.y),
            Plane::new(-Vec3::Y, max.y),
            Plane::new(Vec3::Z, -min.z),
            Plane::new(-Vec3::Z, max.z),
        ]
    }

    #[test]
    fn test_box_planes_yield_corners() {
        let planes = box_planes(Vec3::ZERO, Vec3::splat(2.0));
        let points = convex_points(&planes);
        assert_eq!(points.len(), 8);
        for p in &points {
            assert!(p.x == 0.0 || p.x == 2.0);
            assert!(p.y == 0.0 || p.y == 2.0);
            assert!(p.z == 0.0 || p.z == 2.0);
        }
    }

    #[test]
    fn test_too_few_planes_yield_nothing() {
        let planes = [Plane::new(Vec3::X, 0.0), Plane::new(Vec3::Y, 0.0)];
        assert!(convex_points(&planes).is_empty());
    }

    #[test]
    fn test_intersects_convex_plane_rejection() {
        let planes = box_planes(Vec3::ZERO, Vec3::splat(2.0));
        let points = convex_points(&planes);

        let inside = Aabb::new(Vec3::splat(0.5), Vec3::splat(1.5));
        let overlapping = Aabb::new(Vec3::splat(1.5), Vec3::splat(3.0));
        let outside = Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0));

        assert!(intersects_convex(&inside, &planes, &points));
        assert!(intersects_convex(&overlapping, &planes, &points));
        assert!(!intersects_convex(&outside, &planes, &points));
    }

    #[test]
    fn test_intersects_convex_vertex_rejection() {
        // no planes, so only the vertex slab test can reject
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let far = [Vec3::new(5.0, 0.5, 0.5), Vec3::new(6.0, 0.5, 0.5)];
        let near = [Vec3::new(0.5, 0.5, 0.5), Vec3::new(6.0, 0.5, 0.5)];
        assert!(!intersects_convex(&aabb, &[], &far));
        assert!(intersects_convex(&aabb, &[], &near));
    }
}

//! Planes and view frustums for culling
//!
//! Culling planes face inward: a point with a negative signed distance to
//! a plane is outside the volume the plane bounds.

use crate::core::types::{Vec3, Vec4, Mat4};
use super::aabb::Aabb;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// Intersection point of three planes, if they meet in a single point.
    pub fn intersect_3(&self, b: &Plane, c: &Plane) -> Option<Vec3> {
        let denom = self.normal.cross(b.normal).dot(c.normal);
        if denom.abs() < 1e-8 {
            return None;
        }
        Some(
            -(b.normal.cross(c.normal) * self.distance
                + c.normal.cross(self.normal) * b.distance
                + self.normal.cross(b.normal) * c.distance)
                / denom,
        )
    }
}

/// View frustum with 6 planes (Near, Far, Left, Right, Top, Bottom)
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from view-projection matrix
    pub fn from_view_projection(vp: &Mat4) -> Self {
        // rows of the view-projection matrix
        let m = vp.transpose().to_cols_array_2d();
        let row = |i: usize| Vec4::from_array(m[i]);
        let w = row(3);

        let planes = [
            w + row(2), // near
            w - row(2), // far
            w + row(0), // left
            w - row(0), // right
            w - row(1), // top
            w + row(1), // bottom
        ]
        .map(Self::normalize_plane);

        Self { planes }
    }

    fn normalize_plane(plane: Vec4) -> Plane {
        let normal = Vec3::new(plane.x, plane.y, plane.z);
        let len = normal.length();
        Plane {
            normal: normal / len,
            distance: plane.w / len,
        }
    }

    /// Check if point is inside frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        for plane in &self.planes {
            if plane.distance_to_point(point) < 0.0 {
                return false;
            }
        }
        true
    }

    /// Check if AABB intersects frustum (conservative test)
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // Find the corner most aligned with plane normal (p-vertex)
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            // If p-vertex is outside, AABB is completely outside
            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}

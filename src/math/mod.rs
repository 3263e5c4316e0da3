//! Math primitives consumed by the octree

pub mod aabb;
pub mod frustum;
pub mod convex;

pub use aabb::Aabb;
pub use frustum::{Plane, Frustum};

//! Error types for the spatial index

use thiserror::Error;

use crate::math::Aabb;
use crate::octree::ElementId;

/// Main error type for the spatial index
#[derive(Debug, Error)]
pub enum Error {
    /// An AABB with non-finite or out-of-range components reached
    /// `create` or `move_element`. The tree was not mutated.
    #[error("invalid AABB {0:?}: components must be finite and within +/-1e15")]
    InvalidAabb(Aabb),

    /// A handle that was never issued, or whose element was erased.
    #[error("unknown element {0:?}")]
    UnknownElement(ElementId),

    /// Root growth would pass the hard size limit. Usually means the
    /// input AABB was corrupt upstream.
    #[error("octree root size {0} exceeds the size limit, input AABB may contain NaN")]
    SizeLimit(f32),
}

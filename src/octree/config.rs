//! Construction-time options for the octree

use serde::{Deserialize, Serialize};

/// Octree construction options.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OctreeConfig {
    /// Edge length of the root cube before any growth.
    pub unit_size: f32,
    /// Split-eagerness knob in 0..=1. 0.0 splits eagerly (many small
    /// octants, fastest queries), 1.0 keeps elements in fewer larger
    /// octants (cheapest edits).
    pub balance: f32,
    /// Track overlap pairs between pairable elements.
    pub pairing: bool,
    /// Keep flattened per-octant (AABB, element) mirrors for query scans.
    pub cached_lists: bool,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            unit_size: 1.0,
            balance: 0.0,
            pairing: false,
            cached_lists: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OctreeConfig::default();
        assert_eq!(config.unit_size, 1.0);
        assert_eq!(config.balance, 0.0);
        assert!(!config.pairing);
        assert!(config.cached_lists);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = OctreeConfig {
            unit_size: 4.0,
            balance: 0.5,
            pairing: true,
            cached_lists: false,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: OctreeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.unit_size, 4.0);
        assert_eq!(back.balance, 0.5);
        assert!(back.pairing);
        assert!(!back.cached_lists);
    }
}

//! Static registry of campus buildings
//!
//! One record per canonical building, built once at process start and
//! never mutated. The recognition service reports labels as free-form
//! strings; `lookup` is the only path from a raw label to a building,
//! and unknown labels stay unknown (no default-building fallback).

use crate::domain::types::Coordinates;
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

/// Canonical building identifiers, in stable rendering order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildingId {
    BlockA,
    BlockB,
    BlockC,
    BlockD,
    BlockE,
    BlockF,
}

impl BuildingId {
    pub const ALL: [BuildingId; 6] = [
        BuildingId::BlockA,
        BuildingId::BlockB,
        BuildingId::BlockC,
        BuildingId::BlockD,
        BuildingId::BlockE,
        BuildingId::BlockF,
    ];

    /// Canonical label, matching what the recognition model emits
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildingId::BlockA => "Block A",
            BuildingId::BlockB => "Block B",
            BuildingId::BlockC => "Block C",
            BuildingId::BlockD => "Block D",
            BuildingId::BlockE => "Block E",
            BuildingId::BlockF => "Block F",
        }
    }

    /// Legacy label form ("Building X") still emitted by older clients
    fn alias_label(&self) -> &'static str {
        match self {
            BuildingId::BlockA => "Building A",
            BuildingId::BlockB => "Building B",
            BuildingId::BlockC => "Building C",
            BuildingId::BlockD => "Building D",
            BuildingId::BlockE => "Building E",
            BuildingId::BlockF => "Building F",
        }
    }
}

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// Immutable reference data for one building
#[derive(Debug, Clone)]
pub struct BuildingRecord {
    pub id: BuildingId,
    pub position: Coordinates,
    pub info: &'static str,
    pub floor_count: u8,
    pub facilities: SmallVec<[&'static str; 4]>,
}

/// Registry of all campus buildings with O(1) label lookup
pub struct BuildingRegistry {
    records: Vec<BuildingRecord>,
    index_by_label: FxHashMap<&'static str, usize>,
}

impl BuildingRegistry {
    pub fn new() -> Self {
        let records = vec![
            BuildingRecord {
                id: BuildingId::BlockA,
                position: Coordinates::new(31.48222964940498, 74.3035499304804),
                info: "Main Academic Building",
                floor_count: 4,
                facilities: smallvec!["Labs", "Classrooms", "Faculty Offices"],
            },
            BuildingRecord {
                id: BuildingId::BlockB,
                position: Coordinates::new(31.481067391919904, 74.3030048329072),
                info: "Engineering Department",
                floor_count: 3,
                facilities: smallvec!["Computer Labs", "Lecture Halls", "Study Areas"],
            },
            BuildingRecord {
                id: BuildingId::BlockC,
                position: Coordinates::new(31.481178398975324, 74.30288072461302),
                info: "Science Complex",
                floor_count: 5,
                facilities: smallvec!["Research Labs", "Conference Rooms", "Library"],
            },
            BuildingRecord {
                id: BuildingId::BlockD,
                position: Coordinates::new(31.48107824241253, 74.30332310850635),
                info: "Student Center",
                floor_count: 2,
                facilities: smallvec!["Cafeteria", "Study Areas", "Student Services"],
            },
            BuildingRecord {
                id: BuildingId::BlockE,
                position: Coordinates::new(31.481559857421292, 74.30378519760922),
                info: "Administration Block",
                floor_count: 3,
                facilities: smallvec!["Offices", "Meeting Rooms", "Auditorium"],
            },
            BuildingRecord {
                id: BuildingId::BlockF,
                position: Coordinates::new(31.4805443557776, 74.30417136303642),
                info: "Sports Complex",
                floor_count: 2,
                facilities: smallvec!["Gym", "Swimming Pool", "Courts"],
            },
        ];

        // Pre-computed label-to-index map covering canonical and alias forms
        let mut index_by_label = FxHashMap::default();
        for (idx, record) in records.iter().enumerate() {
            index_by_label.insert(record.id.as_label(), idx);
            index_by_label.insert(record.id.alias_label(), idx);
        }

        Self { records, index_by_label }
    }

    /// Resolve a raw label from the recognition service. Case-sensitive
    /// exact match against canonical and alias labels; anything else is
    /// `None`.
    pub fn lookup(&self, raw_label: &str) -> Option<&BuildingRecord> {
        self.index_by_label.get(raw_label).map(|&idx| &self.records[idx])
    }

    /// Record for a known building id. Every id has exactly one record.
    pub fn get(&self, id: BuildingId) -> &BuildingRecord {
        self.records
            .iter()
            .find(|r| r.id == id)
            .unwrap_or_else(|| unreachable!("registry has a record for every BuildingId"))
    }

    /// All buildings in stable A..F order, for deterministic marker
    /// rendering and tests
    pub fn all(&self) -> &[BuildingRecord] {
        &self.records
    }
}

impl Default for BuildingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_canonical_label() {
        let registry = BuildingRegistry::new();
        let record = registry.lookup("Block A").unwrap();
        assert_eq!(record.id, BuildingId::BlockA);
        assert_eq!(record.info, "Main Academic Building");
        assert_eq!(record.floor_count, 4);
    }

    #[test]
    fn test_lookup_alias_label() {
        let registry = BuildingRegistry::new();
        let record = registry.lookup("Building D").unwrap();
        assert_eq!(record.id, BuildingId::BlockD);
    }

    #[test]
    fn test_lookup_unknown_label() {
        let registry = BuildingRegistry::new();
        assert!(registry.lookup("Nonexistent Hall").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = BuildingRegistry::new();
        assert!(registry.lookup("block a").is_none());
        assert!(registry.lookup("BLOCK A").is_none());
    }

    #[test]
    fn test_all_is_stable_order() {
        let registry = BuildingRegistry::new();
        let ids: Vec<BuildingId> = registry.all().iter().map(|r| r.id).collect();
        assert_eq!(ids, BuildingId::ALL);
    }

    #[test]
    fn test_every_id_has_one_record_with_finite_coords() {
        let registry = BuildingRegistry::new();
        for id in BuildingId::ALL {
            let record = registry.get(id);
            assert_eq!(record.id, id);
            assert!(record.position.is_finite());
            assert!(record.position.latitude.abs() <= 90.0);
            assert!(record.position.longitude.abs() <= 180.0);
            assert!(!record.facilities.is_empty());
        }
    }

    #[test]
    fn test_display_uses_canonical_label() {
        assert_eq!(BuildingId::BlockF.to_string(), "Block F");
    }
}

//! JSON persistence of a city layout
//!
//! A save holds the authored roads, the active goal positions and the
//! transforms of every placed building. Loading never reruns placement:
//! [`TownGenerator::rebuild_from`](crate::TownGenerator::rebuild_from)
//! instantiates the recorded buildings verbatim.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TownError};
use crate::placement::{BuildingPrefab, BuildingRecord};
use crate::road::Road;
use crate::town::GeneratedTown;

/// Serializable snapshot of a city
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityData {
    pub roads: Vec<Road>,
    pub goal_positions: Vec<Vec3>,
    /// Older saves carry no buildings; they load with none
    #[serde(default)]
    pub buildings: Vec<BuildingRecord>,
}

impl CityData {
    pub fn new(roads: Vec<Road>, goal_positions: Vec<Vec3>, buildings: Vec<BuildingRecord>) -> Self {
        Self {
            roads,
            goal_positions,
            buildings,
        }
    }

    /// Snapshot a generated town together with its goals
    pub fn from_town(town: &GeneratedTown, goal_positions: &[Vec3]) -> Self {
        Self {
            roads: town.roads.clone(),
            goal_positions: goal_positions.to_vec(),
            buildings: town.building_records(),
        }
    }

    /// Encode as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Fail on the first building whose prefab is not in `prefabs`
    pub fn check_prefabs(&self, prefabs: &[BuildingPrefab]) -> Result<()> {
        match self
            .buildings
            .iter()
            .find(|record| !prefabs.iter().any(|p| p.name == record.prefab))
        {
            Some(record) => Err(TownError::UnknownPrefab(record.prefab.clone())),
            None => Ok(()),
        }
    }

    /// Write the city to `path`, replacing any existing file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| TownError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(
            path = %path.display(),
            roads = self.roads.len(),
            goals = self.goal_positions.len(),
            buildings = self.buildings.len(),
            "city saved"
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| TownError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            roads = data.roads.len(),
            buildings = data.buildings.len(),
            "city loaded"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn sample() -> CityData {
        CityData::new(
            vec![
                Road::with_nodes("main", vec![Vec3::ZERO, Vec3::new(50.0, 0.0, 0.0)]),
                Road::with_nodes("side", vec![Vec3::new(25.0, 0.0, -20.0), Vec3::new(25.0, 0.0, 20.0)]),
            ],
            vec![Vec3::new(40.0, 0.0, 0.0)],
            vec![BuildingRecord {
                prefab: "house".to_string(),
                position: Vec3::new(10.0, 0.5, 12.0),
                rotation: Quat::from_rotation_y(1.2),
                scale: Vec3::ONE,
            }],
        )
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("city.json");

        let data = sample();
        data.save(&path).unwrap();
        let loaded = CityData::load(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_json_is_pretty() {
        let json = sample().to_json().unwrap();
        assert!(json.contains('\n'));
        assert!(json.contains("\"goal_positions\""));
    }

    #[test]
    fn test_missing_buildings_default_to_empty() {
        let json = r#"{ "roads": [], "goal_positions": [[1.0, 0.0, 2.0]] }"#;
        let data = CityData::from_json(json).unwrap();
        assert!(data.buildings.is_empty());
        assert_eq!(data.goal_positions, vec![Vec3::new(1.0, 0.0, 2.0)]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CityData::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, TownError::Io { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn test_malformed_json() {
        let err = CityData::from_json("{ roads: ").unwrap_err();
        assert!(matches!(err, TownError::Serialization(_)));
    }

    #[test]
    fn test_check_prefabs() {
        let data = sample();
        let house = BuildingPrefab::new("house", Vec3::ONE, 1.0);
        assert!(data.check_prefabs(&[house]).is_ok());
        let err = data.check_prefabs(&[]).unwrap_err();
        assert!(matches!(err, TownError::UnknownPrefab(name) if name == "house"));
    }
}

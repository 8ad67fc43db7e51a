//! Reference data service: crops and fertilizers by code.
//!
//! Built once before a run (from YAML or the built-in table) and passed by
//! shared reference afterwards. Lookups of unknown codes fail with a typed
//! error instead of yielding a default record.

use std::collections::BTreeMap;
use std::path::Path;

use furrow_types::{
    CropGrowthParameters, CropId, CropParameters, IrrigationWindow, MineralFertilizer,
    MineralFertilizerId, NMinCropParameters, OrganicFertilizer, OrganicFertilizerId,
    OrganicMatterParameters,
};
use serde::Deserialize;
use tracing::info;

/// Errors from building or querying reference data.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// No crop with this code.
    #[error("unknown crop `{id}`")]
    UnknownCrop {
        /// The requested code.
        id: CropId,
    },

    /// No mineral fertilizer with this code.
    #[error("unknown mineral fertilizer `{id}`")]
    UnknownMineralFertilizer {
        /// The requested code.
        id: MineralFertilizerId,
    },

    /// No organic fertilizer with this code.
    #[error("unknown organic fertilizer `{id}`")]
    UnknownOrganicFertilizer {
        /// The requested code.
        id: OrganicFertilizerId,
    },

    /// The same code appears twice in one table.
    #[error("duplicate reference code `{code}`")]
    Duplicate {
        /// The repeated code.
        code: String,
    },

    /// Failed to read the reference data file.
    #[error("failed to read reference data: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse the reference data YAML.
    #[error("failed to parse reference data: {source}")]
    Yaml {
        /// The underlying YAML error.
        #[from]
        source: serde_yml::Error,
    },
}

/// On-disk layout of a reference data file.
#[derive(Debug, Default, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    crops: Vec<CropParameters>,
    #[serde(default)]
    mineral_fertilizers: Vec<MineralFertilizer>,
    #[serde(default)]
    organic_fertilizers: Vec<OrganicFertilizer>,
}

/// Immutable lookup tables for crops and fertilizers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    crops: BTreeMap<CropId, CropParameters>,
    mineral_fertilizers: BTreeMap<MineralFertilizerId, MineralFertilizer>,
    organic_fertilizers: BTreeMap<OrganicFertilizerId, OrganicFertilizer>,
}

impl ReferenceData {
    /// Build from record lists, rejecting duplicate codes.
    pub fn new(
        crops: Vec<CropParameters>,
        mineral_fertilizers: Vec<MineralFertilizer>,
        organic_fertilizers: Vec<OrganicFertilizer>,
    ) -> Result<Self, ReferenceError> {
        Ok(Self {
            crops: index(crops, |c| c.id.clone())?,
            mineral_fertilizers: index(mineral_fertilizers, |f| f.id.clone())?,
            organic_fertilizers: index(organic_fertilizers, |f| f.id.clone())?,
        })
    }

    /// Load reference data from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ReferenceError> {
        let contents = std::fs::read_to_string(path)?;
        let data = Self::parse(&contents)?;
        info!(
            path = %path.display(),
            crops = data.crops.len(),
            mineral_fertilizers = data.mineral_fertilizers.len(),
            organic_fertilizers = data.organic_fertilizers.len(),
            "Reference data loaded"
        );
        Ok(data)
    }

    /// Parse reference data from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ReferenceError> {
        let file: ReferenceFile = serde_yml::from_str(yaml)?;
        Self::new(file.crops, file.mineral_fertilizers, file.organic_fertilizers)
    }

    /// Look up a crop.
    pub fn crop(&self, id: &CropId) -> Result<&CropParameters, ReferenceError> {
        self.crops
            .get(id)
            .ok_or_else(|| ReferenceError::UnknownCrop { id: id.clone() })
    }

    /// Look up a mineral fertilizer.
    pub fn mineral_fertilizer(
        &self,
        id: &MineralFertilizerId,
    ) -> Result<&MineralFertilizer, ReferenceError> {
        self.mineral_fertilizers
            .get(id)
            .ok_or_else(|| ReferenceError::UnknownMineralFertilizer { id: id.clone() })
    }

    /// Look up an organic fertilizer.
    pub fn organic_fertilizer(
        &self,
        id: &OrganicFertilizerId,
    ) -> Result<&OrganicFertilizer, ReferenceError> {
        self.organic_fertilizers
            .get(id)
            .ok_or_else(|| ReferenceError::UnknownOrganicFertilizer { id: id.clone() })
    }

    /// Number of crops known.
    pub fn crop_count(&self) -> usize {
        self.crops.len()
    }

    /// Add or replace a crop record. Meant for assembling test fixtures.
    pub fn insert_crop(&mut self, crop: CropParameters) {
        self.crops.insert(crop.id.clone(), crop);
    }

    /// The table compiled into the engine: four arable crops, three mineral
    /// and three organic fertilizers.
    pub fn builtin() -> Self {
        let crops = [
            builtin_crop("WW", "winter wheat", &[180.0, 600.0, 450.0, 350.0, 300.0], 0.45, false),
            builtin_crop("WB", "winter barley", &[160.0, 550.0, 400.0, 330.0, 280.0], 0.45, false),
            builtin_crop("SB", "spring barley", &[120.0, 350.0, 400.0, 300.0, 250.0], 0.45, false),
            builtin_crop("SM", "silage maize", &[150.0, 450.0, 500.0, 350.0, 200.0], 0.55, true),
        ];
        let minerals = [
            mineral("CAN", "calcium ammonium nitrate", 0.5, 0.5, 0.0),
            mineral("AS", "ammonium sulphate", 0.0, 1.0, 0.0),
            mineral("U", "urea", 0.0, 0.0, 1.0),
        ];
        let organics = [
            organic("CADLM", "cattle slurry", 0.08, 0.05, 0.5),
            organic("PIS", "pig slurry", 0.06, 0.08, 0.6),
            organic("CAM", "cattle manure", 0.25, 0.02, 0.1),
        ];

        Self {
            crops: crops.into_iter().map(|c| (c.id.clone(), c)).collect(),
            mineral_fertilizers: minerals.into_iter().map(|f| (f.id.clone(), f)).collect(),
            organic_fertilizers: organics.into_iter().map(|f| (f.id.clone(), f)).collect(),
        }
    }
}

fn index<K: Ord + core::fmt::Display, V>(
    records: Vec<V>,
    key: impl Fn(&V) -> K,
) -> Result<BTreeMap<K, V>, ReferenceError> {
    let mut map = BTreeMap::new();
    for record in records {
        let k = key(&record);
        if map.contains_key(&k) {
            return Err(ReferenceError::Duplicate {
                code: k.to_string(),
            });
        }
        map.insert(k, record);
    }
    Ok(map)
}

fn builtin_crop(
    code: &str,
    name: &str,
    stages: &[f64],
    harvest_index: f64,
    auto_harvest: bool,
) -> CropParameters {
    let maturity: f64 = stages.iter().sum();
    CropParameters {
        id: CropId::new(code),
        name: name.to_owned(),
        auto_harvest,
        nmin: NMinCropParameters::default(),
        irrigation_window: IrrigationWindow {
            start: stages.first().copied().unwrap_or(0.0),
            end: maturity * 0.8,
        },
        residues: OrganicMatterParameters::default(),
        growth: CropGrowthParameters {
            stage_temperature_sums: stages.to_vec(),
            harvest_index,
            ..CropGrowthParameters::default()
        },
    }
}

fn mineral(code: &str, name: &str, no3: f64, nh4: f64, urea: f64) -> MineralFertilizer {
    MineralFertilizer {
        id: MineralFertilizerId::new(code),
        name: name.to_owned(),
        nitrate_fraction: no3,
        ammonium_fraction: nh4,
        urea_fraction: urea,
    }
}

fn organic(
    code: &str,
    name: &str,
    dry_matter_content: f64,
    n_concentration: f64,
    ammonium_share: f64,
) -> OrganicFertilizer {
    OrganicFertilizer {
        id: OrganicFertilizerId::new(code),
        name: name.to_owned(),
        dry_matter_content,
        n_concentration,
        ammonium_share,
        organic_matter: OrganicMatterParameters::default(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_known_codes() {
        let data = ReferenceData::builtin();
        assert_eq!(data.crop(&CropId::new("WW")).unwrap().name, "winter wheat");
        assert!(data.mineral_fertilizer(&MineralFertilizerId::new("CAN")).is_ok());
        assert!(data.organic_fertilizer(&OrganicFertilizerId::new("CADLM")).is_ok());
        assert_eq!(data.crop_count(), 4);
    }

    #[test]
    fn unknown_codes_are_typed_errors() {
        let data = ReferenceData::builtin();
        let err = data.crop(&CropId::new("XX")).unwrap_err();
        assert!(matches!(err, ReferenceError::UnknownCrop { id } if id.as_str() == "XX"));
        assert!(matches!(
            data.mineral_fertilizer(&MineralFertilizerId::new("nope")),
            Err(ReferenceError::UnknownMineralFertilizer { .. })
        ));
    }

    #[test]
    fn parses_yaml_tables() {
        let yaml = r"
crops:
  - id: PO
    name: potato
mineral_fertilizers:
  - { id: AN, name: ammonium nitrate, nitrate_fraction: 0.5, ammonium_fraction: 0.5 }
";
        let data = ReferenceData::parse(yaml).unwrap();
        assert_eq!(data.crop_count(), 1);
        assert!(data.mineral_fertilizer(&MineralFertilizerId::new("AN")).is_ok());
        assert!(data.organic_fertilizer(&OrganicFertilizerId::new("CADLM")).is_err());
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let yaml = "crops:\n  - { id: PO, name: a }\n  - { id: PO, name: b }\n";
        assert!(matches!(
            ReferenceData::parse(yaml),
            Err(ReferenceError::Duplicate { code }) if code == "PO"
        ));
    }

    #[test]
    fn load_project_reference_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("reference-data.yaml");
        if path.exists() {
            let data = ReferenceData::from_file(&path).unwrap();
            assert!(data.crop(&CropId::new("GR")).is_ok());
            assert!(data.organic_fertilizer(&OrganicFertilizerId::new("CAM")).is_ok());
        }
    }

    #[test]
    fn reference_data_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReferenceData>();
    }
}

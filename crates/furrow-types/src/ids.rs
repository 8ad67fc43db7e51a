//! Type-safe identifiers.
//!
//! Reference-data records (crops, fertilizers) are keyed by short string
//! codes such as `WW` or `CAN`. Plantings get a run-local counter, and batch
//! runs a time-ordered UUID.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around a reference-data code.
macro_rules! define_code {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from any string-like code.
            pub fn new(code: impl Into<String>) -> Self {
                Self(code.into())
            }

            /// Borrow the code.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(code: &str) -> Self {
                Self(code.to_owned())
            }
        }
    };
}

define_code! {
    /// Code of a crop in the reference data (e.g. `WW` for winter wheat).
    CropId
}

define_code! {
    /// Code of a mineral fertilizer in the reference data (e.g. `CAN`).
    MineralFertilizerId
}

define_code! {
    /// Code of an organic fertilizer in the reference data (e.g. `CADLM`).
    OrganicFertilizerId
}

/// Identity of one planting, unique within a field run.
///
/// Harvest and cutting steps carry the planting they belong to so that a
/// step scheduled for one crop never acts on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlantingId(pub u64);

impl PlantingId {
    /// The identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl core::fmt::Display for PlantingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "planting-{}", self.0)
    }
}

/// Identifier of one batch run of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_transparently() {
        let id = CropId::new("WW");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"WW\"");
        let back: CropId = serde_json::from_str("\"SM\"").unwrap();
        assert_eq!(back.as_str(), "SM");
    }

    #[test]
    fn planting_ids_increase() {
        let first = PlantingId(0);
        assert!(first.next() > first);
        assert_eq!(first.next().to_string(), "planting-1");
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}

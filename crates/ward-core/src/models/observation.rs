//! Observation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An observation as delivered by the incremental feed.
///
/// Everything except the UUID is optional on the wire because a voided
/// tombstone carries no payload. Non-voided records are validated when
/// converted to a cache row.
#[derive(Debug, Clone, Deserialize)]
pub struct WireObservation {
    pub uuid: String,
    #[serde(default)]
    pub patient_uuid: Option<String>,
    #[serde(default)]
    pub encounter_uuid: Option<String>,
    #[serde(default)]
    pub concept_uuid: Option<String>,
    /// Encounter time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enterer_uuid: Option<String>,
    /// Scalar value, or a concept UUID for coded answers
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub voided: bool,
}

impl WireObservation {
    /// Validate and convert to a cache row. Fails with `Validation` when a
    /// required field is missing, in which case only this record is dropped.
    pub fn into_row(self) -> Result<Observation> {
        let missing = |field: &str| {
            Error::Validation(format!("observation {} is missing {field}", self.uuid))
        };
        Ok(Observation {
            uuid: Some(self.uuid.clone()),
            patient_uuid: self.patient_uuid.clone().ok_or_else(|| missing("patient_uuid"))?,
            encounter_uuid: self.encounter_uuid.clone(),
            concept_uuid: self.concept_uuid.clone().ok_or_else(|| missing("concept_uuid"))?,
            encounter_millis: self
                .timestamp
                .ok_or_else(|| missing("timestamp"))?
                .timestamp_millis(),
            enterer_uuid: self.enterer_uuid.clone(),
            value: self.value.unwrap_or_default(),
            submitted: true,
        })
    }
}

/// An observation row in the cache.
///
/// Locally authored rows awaiting server confirmation have no UUID and
/// `submitted = false`; they are purged once the confirming sync completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub uuid: Option<String>,
    pub patient_uuid: String,
    pub encounter_uuid: Option<String>,
    pub concept_uuid: String,
    /// Encounter time in Unix millis
    pub encounter_millis: i64,
    /// UUID of the user who entered the value, when the server reports one
    pub enterer_uuid: Option<String>,
    pub value: String,
    /// False only for temp rows authored on this device
    pub submitted: bool,
}

impl Observation {
    /// Create a temp row for a locally entered value, pending confirmation.
    pub fn unsubmitted(
        patient_uuid: impl Into<String>,
        concept_uuid: impl Into<String>,
        encounter_millis: i64,
        value: impl Into<String>,
    ) -> Self {
        Self {
            uuid: None,
            patient_uuid: patient_uuid.into(),
            encounter_uuid: None,
            concept_uuid: concept_uuid.into(),
            encounter_millis,
            enterer_uuid: None,
            value: value.into(),
            submitted: false,
        }
    }
}

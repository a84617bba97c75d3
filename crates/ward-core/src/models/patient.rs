//! Patient record

use serde::{Deserialize, Serialize};

/// A patient, both on the wire and in the cache.
///
/// Patients arrive over the incremental feed; `voided = true` marks a
/// tombstone that is translated to a hard delete and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub uuid: String,
    /// Human-readable patient identifier (e.g. "GT-132")
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    /// ISO-8601 date of birth
    #[serde(default)]
    pub birthdate: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    /// Current placement in the location tree
    #[serde(default)]
    pub location_uuid: Option<String>,
    #[serde(default, skip_serializing)]
    pub voided: bool,
}

impl Patient {
    /// Display name in "Given Family" form, falling back to the short id.
    pub fn display_name(&self) -> String {
        match (self.given_name.as_deref(), self.family_name.as_deref()) {
            (Some(given), Some(family)) => format!("{given} {family}"),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => self.id.clone().unwrap_or_else(|| self.uuid.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_voided_tombstone_with_only_uuid() {
        let patient: Patient =
            serde_json::from_str(r#"{"uuid": "p1", "voided": true}"#).unwrap();
        assert!(patient.voided);
        assert_eq!(patient.uuid, "p1");
    }

    #[test]
    fn display_name_prefers_full_name() {
        let patient: Patient = serde_json::from_str(
            r#"{"uuid": "p1", "id": "GT-1", "given_name": "Aisha", "family_name": "Diallo"}"#,
        )
        .unwrap();
        assert_eq!(patient.display_name(), "Aisha Diallo");
    }
}

//! Concept record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A clinical concept with its localized names.
///
/// Observation values that reference concepts ("coded" answers) are stored
/// as the concept UUID and resolved to a localized name at query time by the
/// projection layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub uuid: String,
    /// Numeric id used by the form engine
    #[serde(default)]
    pub xform_id: Option<i64>,
    /// "coded", "numeric", "text", ...
    #[serde(default)]
    pub concept_type: Option<String>,
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_concept_with_names() {
        let concept: Concept = serde_json::from_str(
            r#"{"uuid": "c1", "xform_id": 5, "concept_type": "coded",
                "names": {"en": "Fever", "fr": "Fièvre"}}"#,
        )
        .unwrap();
        assert_eq!(concept.names.get("fr").map(String::as_str), Some("Fièvre"));
        assert_eq!(concept.concept_type.as_deref(), Some("coded"));
    }
}

//! Location record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A node in the location tree, with its localized display names.
///
/// `parent_uuid` forms a self-referential tree that must remain acyclic;
/// acyclicity is a server-side invariant, not checked here. Names arrive as
/// an unordered locale-to-text map with no stable child identity, so a name
/// change is stored by replacing the whole name set for the location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uuid: String,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

impl Location {
    /// Display name for the given locale, if one is registered.
    pub fn name(&self, locale: &str) -> Option<&str> {
        self.names.get(locale).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_location_with_name_map() {
        let location: Location = serde_json::from_str(
            r#"{"uuid": "l1", "parent_uuid": "root", "names": {"en": "Tent 1", "fr": "Tente 1"}}"#,
        )
        .unwrap();
        assert_eq!(location.name("fr"), Some("Tente 1"));
        assert_eq!(location.name("pt"), None);
    }

    #[test]
    fn equality_covers_name_map() {
        let a: Location =
            serde_json::from_str(r#"{"uuid": "l1", "names": {"en": "Tent 1"}}"#).unwrap();
        let b: Location =
            serde_json::from_str(r#"{"uuid": "l1", "names": {"en": "Tent One"}}"#).unwrap();
        assert_ne!(a, b);
    }
}

//! Treatment order record

use serde::{Deserialize, Serialize};

/// A treatment order for a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub uuid: String,
    #[serde(default)]
    pub patient_uuid: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    /// When the order takes effect, Unix millis
    #[serde(default, alias = "start")]
    pub start_millis: Option<i64>,
    /// When the order expires, Unix millis; open-ended if absent
    #[serde(default, alias = "stop")]
    pub stop_millis: Option<i64>,
    #[serde(default, skip_serializing)]
    pub voided: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_start_stop_aliases() {
        let order: Order = serde_json::from_str(
            r#"{"uuid": "or1", "patient_uuid": "p1", "instructions": "Paracetamol 500mg",
                "start": 1000, "stop": 2000}"#,
        )
        .unwrap();
        assert_eq!(order.start_millis, Some(1000));
        assert_eq!(order.stop_millis, Some(2000));
    }
}

//! Chart structure records

use serde::{Deserialize, Serialize};

/// A chart definition as served by the server: an ordered forest of groups,
/// each listing the concepts it displays.
#[derive(Debug, Clone, Deserialize)]
pub struct WireChart {
    pub uuid: String,
    #[serde(default)]
    pub groups: Vec<WireChartGroup>,
}

/// One group within a chart. The group itself is a concept, so its display
/// name is localized through the concept names table.
#[derive(Debug, Clone, Deserialize)]
pub struct WireChartGroup {
    pub uuid: String,
    #[serde(default)]
    pub concepts: Vec<String>,
}

/// One row of the flattened chart structure in the cache.
///
/// `seq` is assigned in server order when the structure is stored and is the
/// sole source of display ordering for the projection layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartItem {
    pub chart_uuid: String,
    pub seq: i64,
    pub group_uuid: String,
    pub concept_uuid: String,
}

impl WireChart {
    /// Flatten into ordered cache rows, numbering from `first_seq`.
    pub fn into_items(self, first_seq: i64) -> Vec<ChartItem> {
        let mut seq = first_seq;
        let mut items = Vec::new();
        for group in self.groups {
            for concept_uuid in group.concepts {
                items.push(ChartItem {
                    chart_uuid: self.uuid.clone(),
                    seq,
                    group_uuid: group.uuid.clone(),
                    concept_uuid,
                });
                seq += 1;
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_items_numbers_rows_in_server_order() {
        let chart: WireChart = serde_json::from_str(
            r#"{"uuid": "ch1", "groups": [
                {"uuid": "g1", "concepts": ["c1", "c2"]},
                {"uuid": "g2", "concepts": ["c3"]}]}"#,
        )
        .unwrap();
        let items = chart.into_items(10);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].seq, 10);
        assert_eq!(items[2].seq, 12);
        assert_eq!(items[2].group_uuid, "g2");
        assert_eq!(items[2].concept_uuid, "c3");
    }
}

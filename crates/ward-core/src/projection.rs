//! Localized read projections over the cache.
//!
//! Three query shapes, all pure functions of committed cache state. They are
//! set-oriented joins rather than row-by-row lookups so a reader always sees
//! a consistent snapshot: localization and "pick newest" resolve against the
//! same committed state as the rows themselves.
//!
//! Coded observation values are concept UUIDs; they are resolved to display
//! names by a LEFT JOIN against `concept_names` in the requested locale.
//! Numeric and free-text values fall through the COALESCE unresolved.

use rusqlite::params;
use serde::Serialize;

use crate::error::Result;
use crate::store::CacheStore;

/// One row of a chart's static skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSkeletonRow {
    pub group_name: String,
    pub concept_uuid: String,
    pub concept_name: String,
}

/// One (chart row, observation) pair for a patient. `encounter_millis` and
/// the value fields are `None` when the patient has no observation for the
/// concept; the row still appears so charts render their full structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientChartRow {
    pub group_name: String,
    pub concept_uuid: String,
    pub concept_name: String,
    pub encounter_millis: Option<i64>,
    pub value: Option<String>,
    pub localized_value: Option<String>,
}

/// The newest observation a patient has for one concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MostRecentRow {
    pub concept_uuid: String,
    pub concept_name: String,
    pub concept_type: Option<String>,
    pub encounter_millis: i64,
    pub value: String,
    pub localized_value: String,
}

/// The chart's static structure (no observation data), localized.
///
/// An unknown chart or an unregistered locale yields an empty list.
pub fn empty_chart(
    store: &CacheStore,
    chart_uuid: &str,
    locale: &str,
) -> Result<Vec<ChartSkeletonRow>> {
    let conn = store.lock()?;
    let mut stmt = conn.prepare(
        "SELECT group_names.name, items.concept_uuid, names.name
         FROM chart_items AS items
             INNER JOIN concept_names names
                 ON items.concept_uuid = names.concept_uuid AND names.locale = ?2
             INNER JOIN concept_names group_names
                 ON items.group_uuid = group_names.concept_uuid AND group_names.locale = ?2
         WHERE items.chart_uuid = ?1
         ORDER BY items.seq",
    )?;
    let rows = stmt
        .query_map(params![chart_uuid, locale], |row| {
            Ok(ChartSkeletonRow {
                group_name: row.get(0)?,
                concept_uuid: row.get(1)?,
                concept_name: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Every chart row joined with the patient's observations for that concept,
/// ordered by chart sequence then encounter time. Rows without observations
/// survive the LEFT JOIN with empty values.
pub fn patient_chart(
    store: &CacheStore,
    chart_uuid: &str,
    patient_uuid: &str,
    locale: &str,
) -> Result<Vec<PatientChartRow>> {
    let conn = store.lock()?;
    let mut stmt = conn.prepare(
        "SELECT group_names.name,
                items.concept_uuid,
                names.name,
                obs.encounter_millis,
                obs.value,
                COALESCE(value_names.name, obs.value)
         FROM chart_items AS items
             INNER JOIN concept_names names
                 ON items.concept_uuid = names.concept_uuid AND names.locale = ?3
             INNER JOIN concept_names group_names
                 ON items.group_uuid = group_names.concept_uuid AND group_names.locale = ?3
             LEFT JOIN observations obs
                 ON items.concept_uuid = obs.concept_uuid AND obs.patient_uuid = ?2
             LEFT JOIN concept_names value_names
                 ON obs.value = value_names.concept_uuid AND value_names.locale = ?3
         WHERE items.chart_uuid = ?1
         ORDER BY items.seq, obs.encounter_millis, obs.rowid",
    )?;
    let rows = stmt
        .query_map(params![chart_uuid, patient_uuid, locale], |row| {
            Ok(PatientChartRow {
                group_name: row.get(0)?,
                concept_uuid: row.get(1)?,
                concept_name: row.get(2)?,
                encounter_millis: row.get(3)?,
                value: row.get(4)?,
                localized_value: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// For every concept the patient has an observation for, only the single
/// observation with the greatest encounter time, ordered by concept UUID.
pub fn most_recent_chart(
    store: &CacheStore,
    patient_uuid: &str,
    locale: &str,
) -> Result<Vec<MostRecentRow>> {
    let conn = store.lock()?;
    let mut stmt = conn.prepare(
        "SELECT obs.concept_uuid,
                names.name,
                concepts.concept_type,
                obs.encounter_millis,
                obs.value,
                COALESCE(value_names.name, obs.value)
         FROM observations AS obs
             INNER JOIN (
                 SELECT concept_uuid, MAX(encounter_millis) AS max_millis
                 FROM observations
                 WHERE patient_uuid = ?1
                 GROUP BY concept_uuid
             ) newest
                 ON obs.concept_uuid = newest.concept_uuid
                     AND obs.encounter_millis = newest.max_millis
             INNER JOIN concept_names names
                 ON obs.concept_uuid = names.concept_uuid AND names.locale = ?2
             INNER JOIN concepts
                 ON obs.concept_uuid = concepts.uuid
             LEFT JOIN concept_names value_names
                 ON obs.value = value_names.concept_uuid AND value_names.locale = ?2
         WHERE obs.patient_uuid = ?1
         ORDER BY obs.concept_uuid, obs.rowid",
    )?;
    let rows = stmt
        .query_map(params![patient_uuid, locale], |row| {
            Ok(MostRecentRow {
                concept_uuid: row.get(0)?,
                concept_name: row.get(1)?,
                concept_type: row.get(2)?,
                encounter_millis: row.get(3)?,
                value: row.get(4)?,
                localized_value: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ChartItem, Concept, Observation};
    use crate::store::Op;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn concept(uuid: &str, names: &[(&str, &str)]) -> Concept {
        Concept {
            uuid: uuid.into(),
            xform_id: None,
            concept_type: Some("numeric".into()),
            names: names
                .iter()
                .map(|(locale, name)| ((*locale).to_string(), (*name).to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn obs(uuid: &str, concept_uuid: &str, millis: i64, value: &str) -> Observation {
        Observation {
            uuid: Some(uuid.into()),
            patient_uuid: "p1".into(),
            encounter_uuid: None,
            concept_uuid: concept_uuid.into(),
            encounter_millis: millis,
            enterer_uuid: None,
            value: value.into(),
            submitted: true,
        }
    }

    fn setup() -> CacheStore {
        let store = CacheStore::new(Database::open_in_memory().unwrap());
        store
            .apply(vec![
                Op::UpsertConcept(concept("grp", &[("en", "Vitals"), ("fr", "Signes vitaux")])),
                Op::UpsertConcept(concept("temp", &[("en", "Temperature"), ("fr", "Température")])),
                Op::UpsertConcept(concept("yes", &[("en", "Yes"), ("fr", "Oui")])),
                Op::UpsertConcept(concept("mobile", &[("en", "Mobility"), ("fr", "Mobilité")])),
                Op::InsertChartItem(ChartItem {
                    chart_uuid: "ch1".into(),
                    seq: 0,
                    group_uuid: "grp".into(),
                    concept_uuid: "temp".into(),
                }),
                Op::InsertChartItem(ChartItem {
                    chart_uuid: "ch1".into(),
                    seq: 1,
                    group_uuid: "grp".into(),
                    concept_uuid: "mobile".into(),
                }),
            ])
            .unwrap();
        store
    }

    #[test]
    fn empty_chart_is_localized_and_ordered() {
        let store = setup();
        let rows = empty_chart(&store, "ch1", "fr").unwrap();
        assert_eq!(
            rows,
            vec![
                ChartSkeletonRow {
                    group_name: "Signes vitaux".into(),
                    concept_uuid: "temp".into(),
                    concept_name: "Température".into(),
                },
                ChartSkeletonRow {
                    group_name: "Signes vitaux".into(),
                    concept_uuid: "mobile".into(),
                    concept_name: "Mobilité".into(),
                },
            ]
        );
    }

    #[test]
    fn unregistered_locale_yields_empty_result() {
        let store = setup();
        assert!(empty_chart(&store, "ch1", "sw").unwrap().is_empty());
    }

    #[test]
    fn unknown_chart_yields_empty_result() {
        let store = setup();
        assert!(empty_chart(&store, "nope", "en").unwrap().is_empty());
    }

    #[test]
    fn patient_chart_keeps_rows_without_observations() {
        let store = setup();
        store
            .apply(vec![Op::UpsertObservation(obs("o1", "temp", 100, "38.2"))])
            .unwrap();
        let rows = patient_chart(&store, "ch1", "p1", "en").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].concept_uuid, "temp");
        assert_eq!(rows[0].localized_value.as_deref(), Some("38.2"));
        assert_eq!(rows[1].concept_uuid, "mobile");
        assert_eq!(rows[1].encounter_millis, None);
        assert_eq!(rows[1].localized_value, None);
    }

    #[test]
    fn coded_values_resolve_to_localized_names() {
        let store = setup();
        store
            .apply(vec![Op::UpsertObservation(obs("o1", "mobile", 100, "yes"))])
            .unwrap();
        let rows = patient_chart(&store, "ch1", "p1", "fr").unwrap();
        let mobile = rows.iter().find(|r| r.concept_uuid == "mobile").unwrap();
        assert_eq!(mobile.value.as_deref(), Some("yes"));
        assert_eq!(mobile.localized_value.as_deref(), Some("Oui"));
    }

    #[test]
    fn most_recent_chart_picks_newest_per_concept() {
        let store = setup();
        store
            .apply(vec![
                Op::UpsertObservation(obs("o1", "temp", 100, "37.0")),
                Op::UpsertObservation(obs("o2", "temp", 300, "39.1")),
                Op::UpsertObservation(obs("o3", "temp", 200, "38.0")),
                Op::UpsertObservation(obs("o4", "mobile", 50, "yes")),
            ])
            .unwrap();
        let rows = most_recent_chart(&store, "p1", "en").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].concept_uuid, "mobile");
        assert_eq!(rows[0].localized_value, "Yes");
        assert_eq!(rows[1].concept_uuid, "temp");
        assert_eq!(rows[1].encounter_millis, 300);
        assert_eq!(rows[1].value, "39.1");
    }

    #[test]
    fn most_recent_chart_ignores_other_patients() {
        let store = setup();
        let mut other = obs("o9", "temp", 900, "41.0");
        other.patient_uuid = "p2".into();
        store
            .apply(vec![
                Op::UpsertObservation(obs("o1", "temp", 100, "37.0")),
                Op::UpsertObservation(other),
            ])
            .unwrap();
        let rows = most_recent_chart(&store, "p1", "en").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].encounter_millis, 100);
    }
}

//! Write operations applied to the cache store.
//!
//! `Op` is a closed enum: every write the sync engine can perform is a
//! variant here, so an unsupported resource/operation combination is
//! unrepresentable. All upserts key on UUID — redelivering a page after a
//! crash overwrites instead of erroring.

use rusqlite::{params, Transaction};

use crate::error::Result;
use crate::models::{ChartItem, Concept, Form, Location, Observation, Order, Patient, User};

/// A cached resource collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Patients,
    Locations,
    Concepts,
    Observations,
    Orders,
    Users,
    Forms,
    ChartItems,
}

impl Resource {
    /// The cache table backing this resource (also the sync-cursor key).
    pub const fn table(self) -> &'static str {
        match self {
            Self::Patients => "patients",
            Self::Locations => "locations",
            Self::Concepts => "concepts",
            Self::Observations => "observations",
            Self::Orders => "orders",
            Self::Users => "users",
            Self::Forms => "forms",
            Self::ChartItems => "chart_items",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// One write operation. Batches of these are applied atomically.
#[derive(Debug, Clone)]
pub enum Op {
    UpsertPatient(Patient),
    DeletePatient(String),
    /// Upserts the location row and replaces its localized names wholesale.
    /// Names have no stable child identity, so they are never field-diffed.
    UpsertLocation(Location),
    DeleteLocation(String),
    /// Upserts the concept row and replaces its localized names.
    UpsertConcept(Concept),
    DeleteAllConcepts,
    UpsertObservation(Observation),
    DeleteObservation(String),
    UpsertOrder(Order),
    DeleteOrder(String),
    UpsertUser(User),
    DeleteAllUsers,
    UpsertForm(Form),
    DeleteForm(String),
    InsertChartItem(ChartItem),
    DeleteAllChartItems,
}

impl Op {
    /// The resource whose subscribers must be notified after commit.
    pub const fn resource(&self) -> Resource {
        match self {
            Self::UpsertPatient(_) | Self::DeletePatient(_) => Resource::Patients,
            Self::UpsertLocation(_) | Self::DeleteLocation(_) => Resource::Locations,
            Self::UpsertConcept(_) | Self::DeleteAllConcepts => Resource::Concepts,
            Self::UpsertObservation(_) | Self::DeleteObservation(_) => Resource::Observations,
            Self::UpsertOrder(_) | Self::DeleteOrder(_) => Resource::Orders,
            Self::UpsertUser(_) | Self::DeleteAllUsers => Resource::Users,
            Self::UpsertForm(_) | Self::DeleteForm(_) => Resource::Forms,
            Self::InsertChartItem(_) | Self::DeleteAllChartItems => Resource::ChartItems,
        }
    }

    /// Whether this op removes rows rather than writing them.
    pub const fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeletePatient(_)
                | Self::DeleteLocation(_)
                | Self::DeleteAllConcepts
                | Self::DeleteObservation(_)
                | Self::DeleteOrder(_)
                | Self::DeleteAllUsers
                | Self::DeleteForm(_)
                | Self::DeleteAllChartItems
        )
    }

    /// Execute this op inside the given transaction, returning rows affected.
    pub(super) fn apply(&self, tx: &Transaction<'_>) -> Result<usize> {
        let affected = match self {
            Self::UpsertPatient(p) => tx.execute(
                "INSERT INTO patients
                    (uuid, id, given_name, family_name, birthdate, sex, location_uuid)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (uuid) DO UPDATE SET
                    id = excluded.id,
                    given_name = excluded.given_name,
                    family_name = excluded.family_name,
                    birthdate = excluded.birthdate,
                    sex = excluded.sex,
                    location_uuid = excluded.location_uuid",
                params![
                    p.uuid,
                    p.id,
                    p.given_name,
                    p.family_name,
                    p.birthdate,
                    p.sex,
                    p.location_uuid
                ],
            )?,
            Self::DeletePatient(uuid) => {
                tx.execute("DELETE FROM patients WHERE uuid = ?1", params![uuid])?
            }
            Self::UpsertLocation(location) => {
                let mut affected = tx.execute(
                    "INSERT INTO locations (uuid, parent_uuid) VALUES (?1, ?2)
                     ON CONFLICT (uuid) DO UPDATE SET parent_uuid = excluded.parent_uuid",
                    params![location.uuid, location.parent_uuid],
                )?;
                affected += tx.execute(
                    "DELETE FROM location_names WHERE location_uuid = ?1",
                    params![location.uuid],
                )?;
                for (locale, name) in &location.names {
                    affected += tx.execute(
                        "INSERT INTO location_names (location_uuid, locale, name)
                         VALUES (?1, ?2, ?3)",
                        params![location.uuid, locale, name],
                    )?;
                }
                affected
            }
            Self::DeleteLocation(uuid) => {
                let mut affected =
                    tx.execute("DELETE FROM locations WHERE uuid = ?1", params![uuid])?;
                affected += tx.execute(
                    "DELETE FROM location_names WHERE location_uuid = ?1",
                    params![uuid],
                )?;
                affected
            }
            Self::UpsertConcept(concept) => {
                let mut affected = tx.execute(
                    "INSERT INTO concepts (uuid, xform_id, concept_type) VALUES (?1, ?2, ?3)
                     ON CONFLICT (uuid) DO UPDATE SET
                        xform_id = excluded.xform_id,
                        concept_type = excluded.concept_type",
                    params![concept.uuid, concept.xform_id, concept.concept_type],
                )?;
                affected += tx.execute(
                    "DELETE FROM concept_names WHERE concept_uuid = ?1",
                    params![concept.uuid],
                )?;
                for (locale, name) in &concept.names {
                    affected += tx.execute(
                        "INSERT INTO concept_names (concept_uuid, locale, name)
                         VALUES (?1, ?2, ?3)",
                        params![concept.uuid, locale, name],
                    )?;
                }
                affected
            }
            Self::DeleteAllConcepts => {
                let mut affected = tx.execute("DELETE FROM concepts", [])?;
                affected += tx.execute("DELETE FROM concept_names", [])?;
                affected
            }
            Self::UpsertObservation(obs) => tx.execute(
                "INSERT INTO observations
                    (uuid, patient_uuid, encounter_uuid, concept_uuid,
                     encounter_millis, enterer_uuid, value, submitted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (uuid) DO UPDATE SET
                    patient_uuid = excluded.patient_uuid,
                    encounter_uuid = excluded.encounter_uuid,
                    concept_uuid = excluded.concept_uuid,
                    encounter_millis = excluded.encounter_millis,
                    enterer_uuid = excluded.enterer_uuid,
                    value = excluded.value,
                    submitted = excluded.submitted",
                params![
                    obs.uuid,
                    obs.patient_uuid,
                    obs.encounter_uuid,
                    obs.concept_uuid,
                    obs.encounter_millis,
                    obs.enterer_uuid,
                    obs.value,
                    i64::from(obs.submitted)
                ],
            )?,
            Self::DeleteObservation(uuid) => {
                tx.execute("DELETE FROM observations WHERE uuid = ?1", params![uuid])?
            }
            Self::UpsertOrder(order) => tx.execute(
                "INSERT INTO orders
                    (uuid, patient_uuid, instructions, start_millis, stop_millis)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (uuid) DO UPDATE SET
                    patient_uuid = excluded.patient_uuid,
                    instructions = excluded.instructions,
                    start_millis = excluded.start_millis,
                    stop_millis = excluded.stop_millis",
                params![
                    order.uuid,
                    order.patient_uuid,
                    order.instructions,
                    order.start_millis,
                    order.stop_millis
                ],
            )?,
            Self::DeleteOrder(uuid) => {
                tx.execute("DELETE FROM orders WHERE uuid = ?1", params![uuid])?
            }
            Self::UpsertUser(user) => tx.execute(
                "INSERT INTO users (uuid, full_name) VALUES (?1, ?2)
                 ON CONFLICT (uuid) DO UPDATE SET full_name = excluded.full_name",
                params![user.uuid, user.full_name],
            )?,
            Self::DeleteAllUsers => tx.execute("DELETE FROM users", [])?,
            Self::UpsertForm(form) => tx.execute(
                "INSERT INTO forms (uuid, name, version) VALUES (?1, ?2, ?3)
                 ON CONFLICT (uuid) DO UPDATE SET
                    name = excluded.name,
                    version = excluded.version",
                params![form.uuid, form.name, form.version],
            )?,
            Self::DeleteForm(uuid) => {
                tx.execute("DELETE FROM forms WHERE uuid = ?1", params![uuid])?
            }
            Self::InsertChartItem(item) => tx.execute(
                "INSERT INTO chart_items (chart_uuid, seq, group_uuid, concept_uuid)
                 VALUES (?1, ?2, ?3, ?4)",
                params![item.chart_uuid, item.seq, item.group_uuid, item.concept_uuid],
            )?,
            Self::DeleteAllChartItems => tx.execute("DELETE FROM chart_items", [])?,
        };
        Ok(affected)
    }
}

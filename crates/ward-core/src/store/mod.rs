//! The cache store: typed, transactional access to the local SQLite cache.
//!
//! All writes go through [`CacheStore::apply`], which executes a batch of
//! [`Op`]s in a single transaction. Either the whole batch lands or none of
//! it does, so readers never observe a half-applied server response. Change
//! notifications are delivered only after commit.

mod ops;

pub use ops::{Op, Resource};

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Form, Location, Observation, Order, Patient, User};

/// Emitted to subscribers after a committed write touches a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub resource: Resource,
}

struct Subscriber {
    /// `None` subscribes to every resource.
    filter: Option<Resource>,
    sender: Sender<ChangeEvent>,
}

/// Shared handle to the cache. Cheap to clone via `Arc`.
pub struct CacheStore {
    conn: Mutex<Connection>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl CacheStore {
    pub fn new(database: Database) -> Self {
        Self {
            conn: Mutex::new(database.into_connection()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("cache store lock poisoned".into()))
    }

    /// Apply a batch of write operations atomically.
    ///
    /// Returns the number of rows affected. Subscribers for every touched
    /// resource are notified after the transaction commits, never before.
    pub fn apply(&self, ops: Vec<Op>) -> Result<usize> {
        if ops.is_empty() {
            return Ok(0);
        }
        let mut touched = BTreeSet::new();
        let mut affected = 0;
        {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            for op in &ops {
                affected += op.apply(&tx)?;
                touched.insert(op.resource());
            }
            tx.commit()?;
        }
        self.notify(&touched);
        Ok(affected)
    }

    /// Subscribe to change events, optionally filtered to one resource.
    ///
    /// Events are fire-and-forget: a subscriber that has gone away is
    /// silently dropped on the next notification.
    pub fn subscribe(&self, filter: Option<Resource>) -> Receiver<ChangeEvent> {
        let (sender, receiver) = mpsc::channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(Subscriber { filter, sender });
        }
        receiver
    }

    fn notify(&self, touched: &BTreeSet<Resource>) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|subscriber| {
            for &resource in touched {
                if subscriber.filter.is_none_or(|f| f == resource)
                    && subscriber.sender.send(ChangeEvent { resource }).is_err()
                {
                    return false;
                }
            }
            true
        });
    }

    // ---- Sync cursors ----

    /// The persisted incremental sync token for a resource, if any.
    pub fn sync_cursor(&self, resource: Resource) -> Result<Option<String>> {
        let conn = self.lock()?;
        let token = conn
            .query_row(
                "SELECT sync_token FROM sync_cursors WHERE table_name = ?1",
                params![resource.table()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token)
    }

    /// Persist the incremental sync token for a resource.
    ///
    /// Callers must invoke this only after the batch the token describes has
    /// been committed; writing it first would lose records on a crash.
    pub fn set_sync_cursor(&self, resource: Resource, token: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sync_cursors (table_name, sync_token) VALUES (?1, ?2)
             ON CONFLICT (table_name) DO UPDATE SET sync_token = excluded.sync_token",
            params![resource.table(), token],
        )?;
        Ok(())
    }

    /// Drop the persisted cursor for a resource, forcing a from-scratch fetch.
    pub fn clear_sync_cursor(&self, resource: Resource) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM sync_cursors WHERE table_name = ?1",
            params![resource.table()],
        )?;
        Ok(())
    }

    /// All persisted cursors as (table, token) pairs.
    pub fn sync_cursors(&self) -> Result<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT table_name, sync_token FROM sync_cursors ORDER BY table_name")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ---- Full sync bookkeeping ----

    /// Record that a full sync cycle has begun.
    pub fn record_full_sync_start(&self, millis: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sync_log", [])?;
        conn.execute(
            "INSERT INTO sync_log (full_sync_start_millis, full_sync_end_millis)
             VALUES (?1, NULL)",
            params![millis],
        )?;
        Ok(())
    }

    /// Record that the full sync cycle begun earlier completed.
    pub fn record_full_sync_end(&self, millis: i64) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sync_log SET full_sync_end_millis = ?1",
            params![millis],
        )?;
        if updated == 0 {
            tracing::warn!("No full sync start on record; storing end time alone");
            conn.execute(
                "INSERT INTO sync_log (full_sync_start_millis, full_sync_end_millis)
                 VALUES (NULL, ?1)",
                params![millis],
            )?;
        }
        Ok(())
    }

    /// Start and end times of the last full sync, if one has been recorded.
    /// The end is `None` while a full sync is in progress or was interrupted.
    pub fn last_full_sync(&self) -> Result<Option<(Option<i64>, Option<i64>)>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT full_sync_start_millis, full_sync_end_millis FROM sync_log",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    // ---- Local (unsubmitted) observations ----

    /// Store an observation authored locally, ahead of server confirmation.
    pub fn add_unsubmitted_observation(&self, observation: &Observation) -> Result<()> {
        self.apply(vec![Op::UpsertObservation(observation.clone())])?;
        Ok(())
    }

    /// Delete every temporary observation row. Called when a sync cycle
    /// finishes, at which point confirmed copies have arrived from the server.
    pub fn purge_unsubmitted_observations(&self) -> Result<usize> {
        let purged = {
            let conn = self.lock()?;
            conn.execute("DELETE FROM observations WHERE uuid IS NULL", [])?
        };
        if purged > 0 {
            let mut touched = BTreeSet::new();
            touched.insert(Resource::Observations);
            self.notify(&touched);
        }
        Ok(purged)
    }

    // ---- Snapshot readers ----

    pub fn patients(&self) -> Result<Vec<Patient>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT uuid, id, given_name, family_name, birthdate, sex, location_uuid
             FROM patients ORDER BY family_name, given_name, uuid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Patient {
                    uuid: row.get(0)?,
                    id: row.get(1)?,
                    given_name: row.get(2)?,
                    family_name: row.get(3)?,
                    birthdate: row.get(4)?,
                    sex: row.get(5)?,
                    location_uuid: row.get(6)?,
                    voided: false,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn patient(&self, uuid: &str) -> Result<Option<Patient>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT uuid, id, given_name, family_name, birthdate, sex, location_uuid
                 FROM patients WHERE uuid = ?1",
                params![uuid],
                |row| {
                    Ok(Patient {
                        uuid: row.get(0)?,
                        id: row.get(1)?,
                        given_name: row.get(2)?,
                        family_name: row.get(3)?,
                        birthdate: row.get(4)?,
                        sex: row.get(5)?,
                        location_uuid: row.get(6)?,
                        voided: false,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// All cached locations with their localized names attached.
    pub fn locations(&self) -> Result<Vec<Location>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT uuid, parent_uuid FROM locations ORDER BY uuid")?;
        let mut locations = stmt
            .query_map([], |row| {
                Ok(Location {
                    uuid: row.get(0)?,
                    parent_uuid: row.get(1)?,
                    names: BTreeMap::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut stmt = conn.prepare("SELECT location_uuid, locale, name FROM location_names")?;
        let names = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (location_uuid, locale, name) in names {
            if let Some(location) = locations.iter_mut().find(|l| l.uuid == location_uuid) {
                location.names.insert(locale, name);
            }
        }
        Ok(locations)
    }

    pub fn forms(&self) -> Result<Vec<Form>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT uuid, name, version FROM forms ORDER BY name, uuid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Form {
                    uuid: row.get(0)?,
                    name: row.get(1)?,
                    version: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT uuid, full_name FROM users ORDER BY full_name")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(User {
                    uuid: row.get(0)?,
                    full_name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// A patient's observations in encounter-time order, including any
    /// temporary rows not yet confirmed by the server.
    pub fn observations_for_patient(&self, patient_uuid: &str) -> Result<Vec<Observation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT uuid, patient_uuid, encounter_uuid, concept_uuid,
                    encounter_millis, enterer_uuid, value, submitted
             FROM observations WHERE patient_uuid = ?1
             ORDER BY encounter_millis, uuid",
        )?;
        let rows = stmt
            .query_map(params![patient_uuid], |row| {
                Ok(Observation {
                    uuid: row.get(0)?,
                    patient_uuid: row.get(1)?,
                    encounter_uuid: row.get(2)?,
                    concept_uuid: row.get(3)?,
                    encounter_millis: row.get(4)?,
                    enterer_uuid: row.get(5)?,
                    value: row.get(6)?,
                    submitted: row.get::<_, i64>(7)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// A patient's treatment orders, earliest first.
    pub fn orders_for_patient(&self, patient_uuid: &str) -> Result<Vec<Order>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT uuid, patient_uuid, instructions, start_millis, stop_millis
             FROM orders WHERE patient_uuid = ?1
             ORDER BY start_millis, uuid",
        )?;
        let rows = stmt
            .query_map(params![patient_uuid], |row| {
                Ok(Order {
                    uuid: row.get(0)?,
                    patient_uuid: row.get(1)?,
                    instructions: row.get(2)?,
                    start_millis: row.get(3)?,
                    stop_millis: row.get(4)?,
                    voided: false,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> CacheStore {
        CacheStore::new(Database::open_in_memory().unwrap())
    }

    fn patient(uuid: &str, given: &str) -> Patient {
        Patient {
            uuid: uuid.into(),
            id: Some("A1".into()),
            given_name: Some(given.into()),
            family_name: Some("Diallo".into()),
            birthdate: None,
            sex: None,
            location_uuid: None,
            voided: false,
        }
    }

    #[test]
    fn apply_upserts_by_uuid() {
        let store = setup();
        store
            .apply(vec![Op::UpsertPatient(patient("p1", "Amara"))])
            .unwrap();
        store
            .apply(vec![Op::UpsertPatient(patient("p1", "Amara-Jane"))])
            .unwrap();
        let patients = store.patients().unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].given_name.as_deref(), Some("Amara-Jane"));
    }

    #[test]
    fn mixed_batch_lands_together() {
        let store = setup();
        store
            .apply(vec![
                Op::UpsertPatient(patient("p1", "Amara")),
                Op::UpsertObservation(Observation {
                    uuid: Some("o1".into()),
                    patient_uuid: "p1".into(),
                    encounter_uuid: Some("e1".into()),
                    concept_uuid: "c1".into(),
                    encounter_millis: 100,
                    enterer_uuid: Some("u1".into()),
                    value: "36.6".into(),
                    submitted: true,
                }),
                Op::DeleteObservation("missing".into()),
            ])
            .unwrap();
        assert_eq!(store.patients().unwrap().len(), 1);
        let observations = store.observations_for_patient("p1").unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].enterer_uuid.as_deref(), Some("u1"));
    }

    #[test]
    fn cursor_roundtrip() {
        let store = setup();
        assert_eq!(store.sync_cursor(Resource::Patients).unwrap(), None);
        store.set_sync_cursor(Resource::Patients, "tok-1").unwrap();
        store.set_sync_cursor(Resource::Patients, "tok-2").unwrap();
        assert_eq!(
            store.sync_cursor(Resource::Patients).unwrap().as_deref(),
            Some("tok-2")
        );
        store.clear_sync_cursor(Resource::Patients).unwrap();
        assert_eq!(store.sync_cursor(Resource::Patients).unwrap(), None);
    }

    #[test]
    fn subscribers_notified_after_commit() {
        let store = setup();
        let patients_rx = store.subscribe(Some(Resource::Patients));
        let all_rx = store.subscribe(None);
        store
            .apply(vec![
                Op::UpsertPatient(patient("p1", "Amara")),
                Op::UpsertUser(User {
                    uuid: "u1".into(),
                    full_name: Some("Dr. Osei".into()),
                }),
            ])
            .unwrap();
        assert_eq!(
            patients_rx.try_recv().unwrap(),
            ChangeEvent {
                resource: Resource::Patients
            }
        );
        assert!(patients_rx.try_recv().is_err());
        let mut seen: Vec<_> = all_rx.try_iter().map(|e| e.resource).collect();
        seen.sort();
        assert_eq!(seen, vec![Resource::Patients, Resource::Users]);
    }

    #[test]
    fn purge_removes_only_temporary_observations() {
        let store = setup();
        let confirmed = Observation {
            uuid: Some("o1".into()),
            patient_uuid: "p1".into(),
            encounter_uuid: None,
            concept_uuid: "c1".into(),
            encounter_millis: 100,
            enterer_uuid: None,
            value: "36.6".into(),
            submitted: true,
        };
        store
            .apply(vec![Op::UpsertObservation(confirmed)])
            .unwrap();
        store
            .add_unsubmitted_observation(&Observation::unsubmitted(
                "p1", "c2", 200, "Yes",
            ))
            .unwrap();
        assert_eq!(store.observations_for_patient("p1").unwrap().len(), 2);
        assert_eq!(store.purge_unsubmitted_observations().unwrap(), 1);
        let remaining = store.observations_for_patient("p1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].uuid.as_deref(), Some("o1"));
    }

    #[test]
    fn full_sync_times_roundtrip() {
        let store = setup();
        assert_eq!(store.last_full_sync().unwrap(), None);
        store.record_full_sync_start(1000).unwrap();
        assert_eq!(store.last_full_sync().unwrap(), Some((Some(1000), None)));
        store.record_full_sync_end(2000).unwrap();
        assert_eq!(
            store.last_full_sync().unwrap(),
            Some((Some(1000), Some(2000)))
        );
    }

    #[test]
    fn locations_reader_attaches_names() {
        let store = setup();
        let loc = Location {
            uuid: "l1".into(),
            parent_uuid: Some("root".into()),
            names: BTreeMap::from([
                ("en".into(), "Triage".into()),
                ("fr".into(), "Tri".into()),
            ]),
        };
        store.apply(vec![Op::UpsertLocation(loc.clone())]).unwrap();
        let cached = store.locations().unwrap();
        assert_eq!(cached, vec![loc]);
    }
}

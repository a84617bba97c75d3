//! One worker per synchronized resource.

mod charts;
mod concepts;
mod forms;
mod incremental;
mod locations;
mod observations;
mod orders;
mod patients;
mod users;

pub use charts::ChartsSyncWorker;
pub use concepts::ConceptsSyncWorker;
pub use forms::FormsSyncWorker;
pub use locations::LocationsSyncWorker;
pub use observations::ObservationsSyncWorker;
pub use orders::OrdersSyncWorker;
pub use patients::PatientsSyncWorker;
pub use users::UsersSyncWorker;

use serde::de::DeserializeOwned;

use crate::store::Resource;
use crate::sync::SyncStats;

/// Decode a full-snapshot record list, dropping (and counting) records that
/// fail to decode so one bad record never aborts a refresh.
fn decode_records<T: DeserializeOwned>(
    values: Vec<serde_json::Value>,
    resource: Resource,
    stats: &mut SyncStats,
) -> Vec<T> {
    let mut records = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value(value) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(%resource, %error, "Dropping undecodable record");
                stats.dropped += 1;
            }
        }
    }
    records
}

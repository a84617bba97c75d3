//! Incremental sync of patients.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Patient;
use crate::store::{Op, Resource};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

use super::incremental::sync_one_page;

pub struct PatientsSyncWorker;

#[async_trait]
impl SyncWorker for PatientsSyncWorker {
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool> {
        sync_one_page::<Patient, _>(ctx, Resource::Patients, "patients", stats, |patient| {
            if patient.voided {
                Ok(vec![Op::DeletePatient(patient.uuid)])
            } else {
                Ok(vec![Op::UpsertPatient(patient)])
            }
        })
        .await
    }
}

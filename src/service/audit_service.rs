// service/audit_service.rs
use uuid::Uuid;

use crate::{
    db::{jobdb::JobExt, SharedStore},
    models::jobmodel::*,
    service::error::ServiceError,
};

#[derive(Debug, Clone)]
pub struct AuditService {
    store: SharedStore,
}

impl AuditService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Appends a lifecycle event. The transition it describes is already
    /// committed, so a failed write is logged rather than returned.
    pub async fn log_transition(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        from_status: Option<JobStatus>,
        job: &Job,
    ) {
        tracing::info!(
            job_id = %job.id,
            actor_id = ?actor_id,
            from = ?from_status,
            to = job.status.to_str(),
            "{}",
            action
        );

        let event = NewJobEvent {
            job_id: job.id,
            actor_id,
            action: action.to_string(),
            from_status,
            to_status: job.status,
        };

        if let Err(e) = self.store.insert_job_event(event).await {
            tracing::warn!("Failed to record audit event {} for job {}: {}", action, job.id, e);
        }
    }

    pub async fn job_history(&self, job_id: Uuid) -> Result<Vec<JobEvent>, ServiceError> {
        Ok(self.store.list_job_events(job_id).await?)
    }
}

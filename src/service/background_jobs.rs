// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::AppState;

/// Expires drafts and open requests nobody took within the configured window.
pub async fn start_job_expiry_job(app_state: Arc<AppState>) {
    let mut interval = interval(Duration::from_secs(app_state.env.expiry_sweep_secs));
    let max_age = chrono::Duration::days(app_state.env.job_expiry_days);

    loop {
        interval.tick().await;

        tracing::info!("Running job expiry sweep at {}", Utc::now());

        match app_state.job_service.expire_stale_jobs(max_age).await {
            Ok(expired) if expired.is_empty() => {
                tracing::debug!("Job expiry sweep completed: nothing to expire")
            }
            Ok(expired) => tracing::info!(
                "Job expiry sweep completed: {} jobs expired",
                expired.len()
            ),
            Err(e) => tracing::error!("Job expiry sweep failed: {}", e),
        }
    }
}

// db/jobdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{db::DBClient, error::StoreError};
use crate::models::jobmodel::*;

/// Job, proposal and review persistence.
///
/// Status columns are never written directly: every status change goes
/// through one of the conditional transition methods, which return `None`
/// when the row was no longer in the expected state.
#[async_trait]
pub trait JobExt {
    async fn insert_job(&self, job: NewJob) -> Result<Job, StoreError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    async fn find_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError>;

    async fn insert_proposal(&self, proposal: NewProposal) -> Result<Proposal, StoreError>;

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<Proposal>, StoreError>;

    async fn find_proposal(
        &self,
        job_id: Uuid,
        professional_id: Uuid,
    ) -> Result<Option<Proposal>, StoreError>;

    /// Newest first.
    async fn list_proposals(&self, job_id: Uuid) -> Result<Vec<Proposal>, StoreError>;

    async fn list_proposals_by_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<Proposal>, StoreError>;

    async fn transition_job(
        &self,
        job_id: Uuid,
        from: &[JobStatus],
        change: JobTransition,
    ) -> Result<Option<Job>, StoreError>;

    /// Moves an `open` job to `to`, assigns the proposal's professional,
    /// accepts the proposal and rejects every other pending one.
    async fn assign_from_proposal(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
        professional_id: Uuid,
        to: JobStatus,
        quoted_price: Option<i64>,
    ) -> Result<Option<(Job, Proposal)>, StoreError>;

    /// `visit_scheduled -> quoted`; the proposal carries the quote and goes back
    /// to `pending`.
    async fn record_final_quote(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
        professional_id: Uuid,
        price: i64,
        description: String,
    ) -> Result<Option<(Job, Proposal)>, StoreError>;

    /// `quoted -> accepted` together with the quoted proposal.
    async fn accept_final_quote(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<(Job, Proposal)>, StoreError>;

    /// Rejects a pending proposal while its job is still `open`.
    async fn reject_proposal(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<Proposal>, StoreError>;

    /// Inserts the review and completes the job in one unit. A second review
    /// for the same job fails with `StoreError::UniqueViolation`.
    async fn complete_with_review(
        &self,
        job_id: Uuid,
        from: &[JobStatus],
        review: NewReview,
    ) -> Result<Option<(Job, Review)>, StoreError>;

    async fn get_review_for_job(&self, job_id: Uuid) -> Result<Option<Review>, StoreError>;

    /// Expires `draft` and `open` jobs created before `cutoff`.
    async fn expire_jobs_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, StoreError>;

    async fn insert_job_event(&self, event: NewJobEvent) -> Result<JobEvent, StoreError>;

    async fn list_job_events(&self, job_id: Uuid) -> Result<Vec<JobEvent>, StoreError>;
}

#[async_trait]
impl JobExt for DBClient {
    async fn insert_job(&self, job: NewJob) -> Result<Job, StoreError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs
            (client_id, target_professional_id, title, description, category, address,
            photo_urls, request_type, status, client_budget_max, urgency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#
        )
        .bind(job.client_id)
        .bind(job.target_professional_id)
        .bind(job.title)
        .bind(job.description)
        .bind(job.category)
        .bind(job.address)
        .bind(job.photo_urls)
        .bind(job.request_type)
        .bind(job.status)
        .bind(job.client_budget_max)
        .bind(job.urgency)
        .fetch_one(&self.pool)
        .await?;

        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    async fn find_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE ($1::uuid[] IS NULL OR id = ANY($1))
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::uuid IS NULL OR professional_id = $3)
              AND ($4::uuid IS NULL OR target_professional_id = $4)
              AND ($5::job_status[] IS NULL OR status = ANY($5))
              AND ($6::request_type IS NULL OR request_type = $6)
            ORDER BY created_at DESC
            "#
        )
        .bind(filter.ids)
        .bind(filter.client_id)
        .bind(filter.professional_id)
        .bind(filter.target_professional_id)
        .bind(filter.statuses)
        .bind(filter.request_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn insert_proposal(&self, proposal: NewProposal) -> Result<Proposal, StoreError> {
        let proposal = sqlx::query_as::<_, Proposal>(
            r#"
            INSERT INTO proposals
            (job_id, professional_id, proposal_type, quoted_price, message,
            visit_date, visit_time_slot, visit_cost, visit_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#
        )
        .bind(proposal.job_id)
        .bind(proposal.professional_id)
        .bind(proposal.proposal_type)
        .bind(proposal.quoted_price)
        .bind(proposal.message)
        .bind(proposal.visit_date)
        .bind(proposal.visit_time_slot)
        .bind(proposal.visit_cost)
        .bind(proposal.visit_notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(proposal)
    }

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<Proposal>, StoreError> {
        let proposal = sqlx::query_as::<_, Proposal>("SELECT * FROM proposals WHERE id = $1")
            .bind(proposal_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(proposal)
    }

    async fn find_proposal(
        &self,
        job_id: Uuid,
        professional_id: Uuid,
    ) -> Result<Option<Proposal>, StoreError> {
        let proposal = sqlx::query_as::<_, Proposal>(
            "SELECT * FROM proposals WHERE job_id = $1 AND professional_id = $2"
        )
        .bind(job_id)
        .bind(professional_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(proposal)
    }

    async fn list_proposals(&self, job_id: Uuid) -> Result<Vec<Proposal>, StoreError> {
        let proposals = sqlx::query_as::<_, Proposal>(
            "SELECT * FROM proposals WHERE job_id = $1 ORDER BY created_at DESC"
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(proposals)
    }

    async fn list_proposals_by_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<Proposal>, StoreError> {
        let proposals = sqlx::query_as::<_, Proposal>(
            "SELECT * FROM proposals WHERE professional_id = $1 ORDER BY created_at DESC"
        )
        .bind(professional_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(proposals)
    }

    async fn transition_job(
        &self,
        job_id: Uuid,
        from: &[JobStatus],
        change: JobTransition,
    ) -> Result<Option<Job>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = $2,
                professional_id = CASE WHEN $3 THEN NULL ELSE professional_id END,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($4)
            RETURNING *
            "#
        )
        .bind(job_id)
        .bind(change.to)
        .bind(change.clear_professional)
        .bind(from.to_vec())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };

        if change.reject_pending {
            sqlx::query(
                r#"
                UPDATE proposals SET status = 'rejected', updated_at = NOW()
                WHERE job_id = $1 AND status = 'pending'
                "#
            )
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(job))
    }

    async fn assign_from_proposal(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
        professional_id: Uuid,
        to: JobStatus,
        quoted_price: Option<i64>,
    ) -> Result<Option<(Job, Proposal)>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken here serializes competing acceptances; the loser
        // re-evaluates the WHERE clause against the committed status.
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = $2, professional_id = $3,
                quoted_price = COALESCE($4, quoted_price), updated_at = NOW()
            WHERE id = $1 AND status = 'open'
            RETURNING *
            "#
        )
        .bind(job_id)
        .bind(to)
        .bind(professional_id)
        .bind(quoted_price)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };

        let proposal = sqlx::query_as::<_, Proposal>(
            r#"
            UPDATE proposals SET status = 'accepted', updated_at = NOW()
            WHERE id = $1 AND job_id = $2 AND professional_id = $3 AND status = 'pending'
            RETURNING *
            "#
        )
        .bind(proposal_id)
        .bind(job_id)
        .bind(professional_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(proposal) = proposal else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE proposals SET status = 'rejected', updated_at = NOW()
            WHERE job_id = $1 AND id <> $2 AND status = 'pending'
            "#
        )
        .bind(job_id)
        .bind(proposal_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((job, proposal)))
    }

    async fn record_final_quote(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
        professional_id: Uuid,
        price: i64,
        description: String,
    ) -> Result<Option<(Job, Proposal)>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET status = 'quoted', quoted_price = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'visit_scheduled' AND professional_id = $2
            RETURNING *
            "#
        )
        .bind(job_id)
        .bind(professional_id)
        .bind(price)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };

        let proposal = sqlx::query_as::<_, Proposal>(
            r#"
            UPDATE proposals
            SET status = 'pending', quoted_price = $3, final_quote_description = $4,
                updated_at = NOW()
            WHERE id = $1 AND job_id = $2
            RETURNING *
            "#
        )
        .bind(proposal_id)
        .bind(job_id)
        .bind(price)
        .bind(description)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(proposal) = proposal else {
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some((job, proposal)))
    }

    async fn accept_final_quote(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<(Job, Proposal)>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET status = 'accepted', updated_at = NOW()
            WHERE id = $1 AND status = 'quoted'
            RETURNING *
            "#
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };

        let proposal = sqlx::query_as::<_, Proposal>(
            r#"
            UPDATE proposals SET status = 'accepted', updated_at = NOW()
            WHERE id = $1 AND job_id = $2 AND status = 'pending'
            RETURNING *
            "#
        )
        .bind(proposal_id)
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(proposal) = proposal else {
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some((job, proposal)))
    }

    async fn reject_proposal(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<Proposal>, StoreError> {
        let proposal = sqlx::query_as::<_, Proposal>(
            r#"
            UPDATE proposals p SET status = 'rejected', updated_at = NOW()
            FROM jobs j
            WHERE p.id = $1 AND p.job_id = $2 AND p.status = 'pending'
              AND j.id = p.job_id AND j.status = 'open'
            RETURNING p.*
            "#
        )
        .bind(proposal_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(proposal)
    }

    async fn complete_with_review(
        &self,
        job_id: Uuid,
        from: &[JobStatus],
        review: NewReview,
    ) -> Result<Option<(Job, Review)>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#
        )
        .bind(job_id)
        .bind(from.to_vec())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };

        // A duplicate surfaces as UniqueViolation and the dropped transaction
        // rolls the status change back.
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (job_id, reviewer_id, reviewee_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(review.job_id)
        .bind(review.reviewer_id)
        .bind(review.reviewee_id)
        .bind(review.rating)
        .bind(review.comment)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((job, review)))
    }

    async fn get_review_for_job(&self, job_id: Uuid) -> Result<Option<Review>, StoreError> {
        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(review)
    }

    async fn expire_jobs_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let jobs = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET status = 'expired', professional_id = NULL, updated_at = NOW()
            WHERE status IN ('draft', 'open') AND created_at < $1
            RETURNING *
            "#
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        if !jobs.is_empty() {
            let ids: Vec<Uuid> = jobs.iter().map(|job| job.id).collect();
            sqlx::query(
                r#"
                UPDATE proposals SET status = 'rejected', updated_at = NOW()
                WHERE job_id = ANY($1) AND status = 'pending'
                "#
            )
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(jobs)
    }

    async fn insert_job_event(&self, event: NewJobEvent) -> Result<JobEvent, StoreError> {
        let event = sqlx::query_as::<_, JobEvent>(
            r#"
            INSERT INTO job_events (job_id, actor_id, action, from_status, to_status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(event.job_id)
        .bind(event.actor_id)
        .bind(event.action)
        .bind(event.from_status)
        .bind(event.to_status)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    async fn list_job_events(&self, job_id: Uuid) -> Result<Vec<JobEvent>, StoreError> {
        let events = sqlx::query_as::<_, JobEvent>(
            "SELECT * FROM job_events WHERE job_id = $1 ORDER BY created_at ASC"
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}

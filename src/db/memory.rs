// db/memory.rs
//
// In-process entity store used when STORE_BACKEND=memory and by the test
// suites. One mutex guards every table, so each trait method is atomic in the
// same way a single Postgres transaction is.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{chatdb::ChatExt, error::StoreError, jobdb::JobExt, profiledb::ProfileExt};
use crate::models::{chatmodels::*, jobmodel::*, usermodel::Profile};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    jobs: Vec<Job>,
    proposals: Vec<Proposal>,
    reviews: Vec<Review>,
    messages: Vec<Message>,
    events: Vec<JobEvent>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing clock so ordering by timestamp is total.
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn job_mut(&mut self, job_id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == job_id)
    }

    fn proposal_mut(&mut self, proposal_id: Uuid) -> Option<&mut Proposal> {
        self.proposals.iter_mut().find(|p| p.id == proposal_id)
    }

    fn job_status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs.iter().find(|job| job.id == job_id).map(|job| job.status)
    }

    fn reject_pending(&mut self, job_id: Uuid, except: Option<Uuid>, at: DateTime<Utc>) {
        for proposal in self.proposals.iter_mut() {
            if proposal.job_id == job_id
                && proposal.status == ProposalStatus::Pending
                && Some(proposal.id) != except
            {
                proposal.status = ProposalStatus::Rejected;
                proposal.updated_at = at;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(mut rows: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    rows
}

#[async_trait]
impl JobExt for MemoryStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();
        let job = Job {
            id: Uuid::new_v4(),
            client_id: job.client_id,
            professional_id: None,
            target_professional_id: job.target_professional_id,
            title: job.title,
            description: job.description,
            category: job.category,
            address: job.address,
            photo_urls: job.photo_urls,
            request_type: job.request_type,
            status: job.status,
            quoted_price: None,
            client_budget_max: job.client_budget_max,
            urgency: job.urgency,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        tables.jobs.push(job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.jobs.iter().find(|job| job.id == job_id).cloned())
    }

    async fn find_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let tables = self.tables.lock().await;
        let jobs = tables
            .jobs
            .iter()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        Ok(newest_first(jobs, |job: &Job| job.created_at))
    }

    async fn insert_proposal(&self, proposal: NewProposal) -> Result<Proposal, StoreError> {
        let mut tables = self.tables.lock().await;
        let exists = tables.proposals.iter().any(|p| {
            p.job_id == proposal.job_id && p.professional_id == proposal.professional_id
        });
        if exists {
            return Err(StoreError::UniqueViolation(
                "proposals_one_per_professional".to_string(),
            ));
        }

        let now = tables.now();
        let proposal = Proposal {
            id: Uuid::new_v4(),
            job_id: proposal.job_id,
            professional_id: proposal.professional_id,
            proposal_type: proposal.proposal_type,
            status: ProposalStatus::Pending,
            quoted_price: proposal.quoted_price,
            message: proposal.message,
            visit_date: proposal.visit_date,
            visit_time_slot: proposal.visit_time_slot,
            visit_cost: proposal.visit_cost,
            visit_notes: proposal.visit_notes,
            final_quote_description: None,
            created_at: now,
            updated_at: now,
        };
        tables.proposals.push(proposal.clone());
        Ok(proposal)
    }

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<Proposal>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.proposals.iter().find(|p| p.id == proposal_id).cloned())
    }

    async fn find_proposal(
        &self,
        job_id: Uuid,
        professional_id: Uuid,
    ) -> Result<Option<Proposal>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .proposals
            .iter()
            .find(|p| p.job_id == job_id && p.professional_id == professional_id)
            .cloned())
    }

    async fn list_proposals(&self, job_id: Uuid) -> Result<Vec<Proposal>, StoreError> {
        let tables = self.tables.lock().await;
        let proposals = tables
            .proposals
            .iter()
            .filter(|p| p.job_id == job_id)
            .cloned()
            .collect();
        Ok(newest_first(proposals, |p: &Proposal| p.created_at))
    }

    async fn list_proposals_by_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<Proposal>, StoreError> {
        let tables = self.tables.lock().await;
        let proposals = tables
            .proposals
            .iter()
            .filter(|p| p.professional_id == professional_id)
            .cloned()
            .collect();
        Ok(newest_first(proposals, |p: &Proposal| p.created_at))
    }

    async fn transition_job(
        &self,
        job_id: Uuid,
        from: &[JobStatus],
        change: JobTransition,
    ) -> Result<Option<Job>, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.job_status(job_id) {
            Some(status) if from.contains(&status) => {}
            _ => return Ok(None),
        }

        let now = tables.now();
        if change.reject_pending {
            tables.reject_pending(job_id, None, now);
        }
        let Some(job) = tables.job_mut(job_id) else {
            return Ok(None);
        };
        job.status = change.to;
        if change.clear_professional {
            job.professional_id = None;
        }
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn assign_from_proposal(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
        professional_id: Uuid,
        to: JobStatus,
        quoted_price: Option<i64>,
    ) -> Result<Option<(Job, Proposal)>, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.job_status(job_id) != Some(JobStatus::Open) {
            return Ok(None);
        }
        let proposal_ok = tables.proposals.iter().any(|p| {
            p.id == proposal_id
                && p.job_id == job_id
                && p.professional_id == professional_id
                && p.status == ProposalStatus::Pending
        });
        if !proposal_ok {
            return Ok(None);
        }

        let now = tables.now();
        tables.reject_pending(job_id, Some(proposal_id), now);

        let Some(proposal) = tables.proposal_mut(proposal_id) else {
            return Ok(None);
        };
        proposal.status = ProposalStatus::Accepted;
        proposal.updated_at = now;
        let proposal = proposal.clone();

        let Some(job) = tables.job_mut(job_id) else {
            return Ok(None);
        };
        job.status = to;
        job.professional_id = Some(professional_id);
        if quoted_price.is_some() {
            job.quoted_price = quoted_price;
        }
        job.updated_at = now;

        Ok(Some((job.clone(), proposal)))
    }

    async fn record_final_quote(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
        professional_id: Uuid,
        price: i64,
        description: String,
    ) -> Result<Option<(Job, Proposal)>, StoreError> {
        let mut tables = self.tables.lock().await;
        let job_ok = tables.jobs.iter().any(|job| {
            job.id == job_id
                && job.status == JobStatus::VisitScheduled
                && job.professional_id == Some(professional_id)
        });
        let proposal_ok = tables
            .proposals
            .iter()
            .any(|p| p.id == proposal_id && p.job_id == job_id);
        if !job_ok || !proposal_ok {
            return Ok(None);
        }

        let now = tables.now();
        let Some(proposal) = tables.proposal_mut(proposal_id) else {
            return Ok(None);
        };
        proposal.status = ProposalStatus::Pending;
        proposal.quoted_price = Some(price);
        proposal.final_quote_description = Some(description);
        proposal.updated_at = now;
        let proposal = proposal.clone();

        let Some(job) = tables.job_mut(job_id) else {
            return Ok(None);
        };
        job.status = JobStatus::Quoted;
        job.quoted_price = Some(price);
        job.updated_at = now;

        Ok(Some((job.clone(), proposal)))
    }

    async fn accept_final_quote(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<(Job, Proposal)>, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.job_status(job_id) != Some(JobStatus::Quoted) {
            return Ok(None);
        }
        let proposal_ok = tables.proposals.iter().any(|p| {
            p.id == proposal_id && p.job_id == job_id && p.status == ProposalStatus::Pending
        });
        if !proposal_ok {
            return Ok(None);
        }

        let now = tables.now();
        let Some(proposal) = tables.proposal_mut(proposal_id) else {
            return Ok(None);
        };
        proposal.status = ProposalStatus::Accepted;
        proposal.updated_at = now;
        let proposal = proposal.clone();

        let Some(job) = tables.job_mut(job_id) else {
            return Ok(None);
        };
        job.status = JobStatus::Accepted;
        job.updated_at = now;

        Ok(Some((job.clone(), proposal)))
    }

    async fn reject_proposal(
        &self,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Option<Proposal>, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.job_status(job_id) != Some(JobStatus::Open) {
            return Ok(None);
        }

        let now = tables.now();
        let Some(proposal) = tables.proposal_mut(proposal_id) else {
            return Ok(None);
        };
        if proposal.job_id != job_id || proposal.status != ProposalStatus::Pending {
            return Ok(None);
        }
        proposal.status = ProposalStatus::Rejected;
        proposal.updated_at = now;
        Ok(Some(proposal.clone()))
    }

    async fn complete_with_review(
        &self,
        job_id: Uuid,
        from: &[JobStatus],
        review: NewReview,
    ) -> Result<Option<(Job, Review)>, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.job_status(job_id) {
            Some(status) if from.contains(&status) => {}
            _ => return Ok(None),
        }
        if tables.reviews.iter().any(|r| r.job_id == job_id) {
            return Err(StoreError::UniqueViolation("reviews_job_id_key".to_string()));
        }

        let now = tables.now();
        let review = Review {
            id: Uuid::new_v4(),
            job_id: review.job_id,
            reviewer_id: review.reviewer_id,
            reviewee_id: review.reviewee_id,
            rating: review.rating,
            comment: review.comment,
            created_at: now,
        };
        tables.reviews.push(review.clone());

        let Some(job) = tables.job_mut(job_id) else {
            return Ok(None);
        };
        job.status = JobStatus::Completed;
        job.completed_at = Some(now);
        job.updated_at = now;

        Ok(Some((job.clone(), review)))
    }

    async fn get_review_for_job(&self, job_id: Uuid) -> Result<Option<Review>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.reviews.iter().find(|r| r.job_id == job_id).cloned())
    }

    async fn expire_jobs_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();

        let mut expired = Vec::new();
        for job in tables.jobs.iter_mut() {
            if matches!(job.status, JobStatus::Draft | JobStatus::Open) && job.created_at < cutoff {
                job.status = JobStatus::Expired;
                job.professional_id = None;
                job.updated_at = now;
                expired.push(job.clone());
            }
        }
        for job in &expired {
            tables.reject_pending(job.id, None, now);
        }

        Ok(expired)
    }

    async fn insert_job_event(&self, event: NewJobEvent) -> Result<JobEvent, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();
        let event = JobEvent {
            id: Uuid::new_v4(),
            job_id: event.job_id,
            actor_id: event.actor_id,
            action: event.action,
            from_status: event.from_status,
            to_status: event.to_status,
            created_at: now,
        };
        tables.events.push(event.clone());
        Ok(event)
    }

    async fn list_job_events(&self, job_id: Uuid) -> Result<Vec<JobEvent>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChatExt for MemoryStore {
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();
        let message = Message {
            id: Uuid::new_v4(),
            job_id: message.job_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            message_type: message.message_type,
            metadata: message.metadata,
            flagged: message.flagged,
            flag_categories: message.flag_categories,
            created_at: now,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.messages.iter().find(|m| m.id == message_id).cloned())
    }

    async fn list_messages(
        &self,
        job_id: Uuid,
        user_one_id: Uuid,
        user_two_id: Uuid,
    ) -> Result<Vec<Message>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| {
                m.job_id == job_id && m.involves(user_one_id) && m.involves(user_two_id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileExt for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.profiles.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job(client_id: Uuid) -> NewJob {
        NewJob {
            client_id,
            target_professional_id: None,
            title: "Pérdida en el baño".to_string(),
            description: "Gotea la canilla del lavatorio".to_string(),
            category: "plomeria".to_string(),
            address: "Av. Corrientes 1234".to_string(),
            photo_urls: vec![],
            request_type: RequestType::Open,
            status: JobStatus::Open,
            client_budget_max: None,
            urgency: Urgency::Medium,
        }
    }

    fn price_proposal(job_id: Uuid, professional_id: Uuid, price: i64) -> NewProposal {
        NewProposal {
            job_id,
            professional_id,
            proposal_type: ProposalType::Price,
            quoted_price: Some(price),
            message: Some("Lo resuelvo en el día".to_string()),
            visit_date: None,
            visit_time_slot: None,
            visit_cost: None,
            visit_notes: None,
        }
    }

    #[tokio::test]
    async fn duplicate_proposal_is_a_unique_violation() {
        let store = MemoryStore::new();
        let job = store.insert_job(new_job(Uuid::new_v4())).await.unwrap();
        let pro = Uuid::new_v4();

        store.insert_proposal(price_proposal(job.id, pro, 1000)).await.unwrap();
        let err = store
            .insert_proposal(price_proposal(job.id, pro, 2000))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn proposals_are_listed_newest_first() {
        let store = MemoryStore::new();
        let job = store.insert_job(new_job(Uuid::new_v4())).await.unwrap();
        let first = store
            .insert_proposal(price_proposal(job.id, Uuid::new_v4(), 1000))
            .await
            .unwrap();
        let second = store
            .insert_proposal(price_proposal(job.id, Uuid::new_v4(), 2000))
            .await
            .unwrap();

        let listed = store.list_proposals(job.id).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn transition_is_conditional_on_current_status() {
        let store = MemoryStore::new();
        let job = store.insert_job(new_job(Uuid::new_v4())).await.unwrap();

        let missed = store
            .transition_job(job.id, &[JobStatus::Accepted], JobTransition::to(JobStatus::InProgress))
            .await
            .unwrap();
        assert!(missed.is_none());

        let cancelled = store
            .transition_job(job.id, &[JobStatus::Open], JobTransition::closing(JobStatus::Cancelled))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn assign_rejects_competing_proposals() {
        let store = MemoryStore::new();
        let job = store.insert_job(new_job(Uuid::new_v4())).await.unwrap();
        let winner_pro = Uuid::new_v4();
        let winner = store
            .insert_proposal(price_proposal(job.id, winner_pro, 1000))
            .await
            .unwrap();
        let loser = store
            .insert_proposal(price_proposal(job.id, Uuid::new_v4(), 1200))
            .await
            .unwrap();

        let (job, proposal) = store
            .assign_from_proposal(job.id, winner.id, winner_pro, JobStatus::Accepted, Some(1000))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(job.professional_id, Some(winner_pro));
        assert_eq!(proposal.status, ProposalStatus::Accepted);
        let loser = store.get_proposal(loser.id).await.unwrap().unwrap();
        assert_eq!(loser.status, ProposalStatus::Rejected);
    }

    #[tokio::test]
    async fn expiry_only_touches_stale_open_jobs() {
        let store = MemoryStore::new();
        let stale = store.insert_job(new_job(Uuid::new_v4())).await.unwrap();
        let cutoff = Utc::now() + Duration::seconds(1);

        let expired = store.expire_jobs_before(cutoff).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);
        assert_eq!(expired[0].status, JobStatus::Expired);

        let again = store.expire_jobs_before(cutoff).await.unwrap();
        assert!(again.is_empty());
    }
}

// service/job_service.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{error::StoreError, jobdb::JobExt, profiledb::ProfileExt, SharedStore},
    dtos::jobdtos::*,
    models::{
        jobmodel::*,
        usermodel::{Actor, UserRole, VerificationStatus},
    },
    service::{
        audit_service::AuditService,
        error::ServiceError,
        negotiation::{self, CommissionRate, ProposalDraft},
    },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LifecyclePolicy {
    pub commission_rate: CommissionRate,
    /// Only verified professionals may bid.
    pub require_verified_professionals: bool,
}

/// The only component allowed to change job and proposal status.
#[derive(Debug, Clone)]
pub struct JobService {
    store: SharedStore,
    audit_service: Arc<AuditService>,
    policy: LifecyclePolicy,
}

impl JobService {
    pub fn new(
        store: SharedStore,
        audit_service: Arc<AuditService>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            store,
            audit_service,
            policy,
        }
    }

    pub fn commission_rate(&self) -> CommissionRate {
        self.policy.commission_rate
    }

    pub async fn create_job(
        &self,
        actor: Actor,
        details: JobDetailsDto,
        request_type: RequestType,
    ) -> Result<Job, ServiceError> {
        self.insert_job(actor, details, request_type, JobStatus::Open).await
    }

    pub async fn create_draft(
        &self,
        actor: Actor,
        details: JobDetailsDto,
        request_type: RequestType,
    ) -> Result<Job, ServiceError> {
        self.insert_job(actor, details, request_type, JobStatus::Draft).await
    }

    async fn insert_job(
        &self,
        actor: Actor,
        details: JobDetailsDto,
        request_type: RequestType,
        status: JobStatus,
    ) -> Result<Job, ServiceError> {
        if actor.role != UserRole::Client {
            return Err(ServiceError::Forbidden(actor.id, "create jobs"));
        }
        details.validate()?;

        match (request_type, details.target_professional_id) {
            (RequestType::Direct, None) => {
                return Err(ServiceError::Validation(
                    "direct requests need a target professional".to_string(),
                ))
            }
            (RequestType::Open, Some(_)) => {
                return Err(ServiceError::Validation(
                    "open requests cannot target a professional".to_string(),
                ))
            }
            (RequestType::Direct, Some(target)) if target == actor.id => {
                return Err(ServiceError::Validation(
                    "a job cannot target its own client".to_string(),
                ))
            }
            _ => {}
        }

        let job = self
            .store
            .insert_job(NewJob {
                client_id: actor.id,
                target_professional_id: details.target_professional_id,
                title: details.title.trim().to_string(),
                description: details.description.trim().to_string(),
                category: details.category.trim().to_string(),
                address: details.address.trim().to_string(),
                photo_urls: details.photo_urls,
                request_type,
                status,
                client_budget_max: details.client_budget_max,
                urgency: details.urgency,
            })
            .await?;

        self.audit_service
            .log_transition(Some(actor.id), "job_created", None, &job)
            .await;

        Ok(job)
    }

    pub async fn publish_job(&self, actor: Actor, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        ensure_client(actor, &job, "publish this job")?;
        ensure_status(&job, &[JobStatus::Draft])?;

        let published = self
            .store
            .transition_job(job_id, &[JobStatus::Draft], JobTransition::to(JobStatus::Open))
            .await?;
        let published = match published {
            Some(job) => job,
            None => return Err(self.lost_race(job_id, &[JobStatus::Draft]).await),
        };

        self.audit_service
            .log_transition(Some(actor.id), "job_published", Some(job.status), &published)
            .await;

        Ok(published)
    }

    /// Permission scoped lookup: a job the caller may not see is reported as
    /// missing.
    pub async fn get_job(&self, actor: Actor, job_id: Uuid) -> Result<Job, ServiceError> {
        self.load_visible_job(actor, job_id).await
    }

    pub async fn list_jobs_for(
        &self,
        actor: Actor,
        view: Option<JobView>,
    ) -> Result<Vec<Job>, ServiceError> {
        let statuses = view.map(|v| v.statuses().to_vec());

        let filter = match actor.role {
            UserRole::Client => JobFilter {
                client_id: Some(actor.id),
                statuses,
                ..Default::default()
            },
            UserRole::Professional => {
                // A professional only ever reaches a job through a proposal.
                let proposals = self.store.list_proposals_by_professional(actor.id).await?;
                if proposals.is_empty() {
                    return Ok(Vec::new());
                }
                JobFilter {
                    ids: Some(proposals.into_iter().map(|p| p.job_id).collect()),
                    statuses,
                    ..Default::default()
                }
            }
            UserRole::Admin => JobFilter {
                statuses,
                ..Default::default()
            },
        };

        Ok(self.store.find_jobs(filter).await?)
    }

    /// Open jobs a professional can bid on: every public request plus direct
    /// requests aimed at them.
    pub async fn available_jobs(&self, actor: Actor) -> Result<Vec<Job>, ServiceError> {
        if actor.role != UserRole::Professional {
            return Err(ServiceError::Forbidden(actor.id, "browse available jobs"));
        }

        let mut jobs = self
            .store
            .find_jobs(JobFilter {
                statuses: Some(vec![JobStatus::Open]),
                request_type: Some(RequestType::Open),
                ..Default::default()
            })
            .await?;
        let direct = self
            .store
            .find_jobs(JobFilter {
                statuses: Some(vec![JobStatus::Open]),
                target_professional_id: Some(actor.id),
                ..Default::default()
            })
            .await?;

        jobs.extend(direct);
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    pub async fn submit_proposal(
        &self,
        actor: Actor,
        job_id: Uuid,
        draft: ProposalDraft,
    ) -> Result<Proposal, ServiceError> {
        if actor.role != UserRole::Professional {
            return Err(ServiceError::Forbidden(actor.id, "submit proposals"));
        }
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;
        if job.client_id == actor.id {
            return Err(ServiceError::Forbidden(actor.id, "bid on their own job"));
        }
        // Drafts and direct requests for someone else stay hidden; any other
        // public job that is no longer open is a state error.
        let addressed = job.status != JobStatus::Draft
            && match job.request_type {
                RequestType::Open => true,
                RequestType::Direct => job.target_professional_id == Some(actor.id),
            };
        if !addressed {
            return Err(ServiceError::JobNotFound(job_id));
        }
        ensure_status(&job, &[JobStatus::Open])?;

        draft.validate(Utc::now().date_naive())?;

        if self.store.find_proposal(job_id, actor.id).await?.is_some() {
            return Err(ServiceError::DuplicateProposal(job_id, actor.id));
        }

        if self.policy.require_verified_professionals {
            let verified = self
                .store
                .get_profile(actor.id)
                .await?
                .map(|p| p.verification_status == VerificationStatus::Verified)
                .unwrap_or(false);
            if !verified {
                return Err(ServiceError::Forbidden(actor.id, "bid before identity verification"));
            }
        }

        let proposal = match self
            .store
            .insert_proposal(draft.into_new_proposal(job_id, actor.id))
            .await
        {
            Ok(proposal) => proposal,
            Err(StoreError::UniqueViolation(_)) => {
                return Err(ServiceError::DuplicateProposal(job_id, actor.id))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            job_id = %job_id,
            proposal_id = %proposal.id,
            professional_id = %actor.id,
            kind = ?proposal.proposal_type,
            "proposal submitted"
        );

        Ok(proposal)
    }

    /// Newest first. Clients see every bid on their job, professionals only
    /// their own.
    pub async fn list_proposals(
        &self,
        actor: Actor,
        job_id: Uuid,
    ) -> Result<Vec<Proposal>, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        let proposals = self.store.list_proposals(job_id).await?;

        if actor.is_admin() || job.client_id == actor.id {
            return Ok(proposals);
        }
        Ok(proposals
            .into_iter()
            .filter(|p| p.professional_id == actor.id)
            .collect())
    }

    pub async fn accept_proposal(
        &self,
        actor: Actor,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<ProposalDecision, ServiceError> {
        self.take_proposal(actor, job_id, proposal_id, ProposalType::Price, "proposal_accepted")
            .await
    }

    pub async fn confirm_visit(
        &self,
        actor: Actor,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<ProposalDecision, ServiceError> {
        self.take_proposal(actor, job_id, proposal_id, ProposalType::Visit, "visit_confirmed")
            .await
    }

    async fn take_proposal(
        &self,
        actor: Actor,
        job_id: Uuid,
        proposal_id: Uuid,
        track: ProposalType,
        action: &'static str,
    ) -> Result<ProposalDecision, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        ensure_client(actor, &job, "decide on proposals for this job")?;
        ensure_status(&job, &[JobStatus::Open])?;

        let proposal = self.load_proposal_for(&job, proposal_id).await?;
        negotiation::ensure_takeable(&proposal, track)?;

        let quoted_price = match track {
            ProposalType::Price => proposal.quoted_price,
            ProposalType::Visit => None,
        };

        let outcome = self
            .store
            .assign_from_proposal(
                job_id,
                proposal.id,
                proposal.professional_id,
                negotiation::accepted_status_for(track),
                quoted_price,
            )
            .await?;

        let Some((updated_job, proposal)) = outcome else {
            return Err(self.lost_race(job_id, &[JobStatus::Open]).await);
        };

        self.audit_service
            .log_transition(Some(actor.id), action, Some(job.status), &updated_job)
            .await;

        Ok(ProposalDecision {
            job: updated_job,
            proposal,
        })
    }

    pub async fn reject_proposal(
        &self,
        actor: Actor,
        job_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<Proposal, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        ensure_client(actor, &job, "decide on proposals for this job")?;
        ensure_status(&job, &[JobStatus::Open])?;

        let proposal = self.load_proposal_for(&job, proposal_id).await?;
        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal.id, proposal.status));
        }

        match self.store.reject_proposal(job_id, proposal_id).await? {
            Some(rejected) => {
                tracing::info!(job_id = %job_id, proposal_id = %proposal_id, "proposal rejected");
                Ok(rejected)
            }
            None => Err(self.lost_race(job_id, &[JobStatus::Open]).await),
        }
    }

    pub async fn submit_final_quote(
        &self,
        actor: Actor,
        job_id: Uuid,
        price: i64,
        description: String,
    ) -> Result<ProposalDecision, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        ensure_assigned(actor, &job, "quote this job")?;
        ensure_status(&job, &[JobStatus::VisitScheduled])?;
        negotiation::validate_final_quote(price, &description)?;

        let proposal = self
            .store
            .find_proposal(job_id, actor.id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        let outcome = self
            .store
            .record_final_quote(job_id, proposal.id, actor.id, price, description.trim().to_string())
            .await?;

        let Some((updated_job, proposal)) = outcome else {
            return Err(self.lost_race(job_id, &[JobStatus::VisitScheduled]).await);
        };

        self.audit_service
            .log_transition(Some(actor.id), "final_quote_submitted", Some(job.status), &updated_job)
            .await;

        Ok(ProposalDecision {
            job: updated_job,
            proposal,
        })
    }

    pub async fn accept_final_quote(
        &self,
        actor: Actor,
        job_id: Uuid,
    ) -> Result<ProposalDecision, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        ensure_client(actor, &job, "accept quotes for this job")?;
        ensure_status(&job, &[JobStatus::Quoted])?;

        let professional_id = job
            .professional_id
            .ok_or(ServiceError::InvalidJobStatus(job.id, job.status))?;
        let proposal = self
            .store
            .find_proposal(job_id, professional_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        let outcome = self.store.accept_final_quote(job_id, proposal.id).await?;
        let Some((updated_job, proposal)) = outcome else {
            return Err(self.lost_race(job_id, &[JobStatus::Quoted]).await);
        };

        self.audit_service
            .log_transition(Some(actor.id), "final_quote_accepted", Some(job.status), &updated_job)
            .await;

        Ok(ProposalDecision {
            job: updated_job,
            proposal,
        })
    }

    pub async fn start_job(&self, actor: Actor, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        ensure_assigned(actor, &job, "start this job")?;
        ensure_status(&job, &[JobStatus::Accepted])?;

        let started = self
            .store
            .transition_job(job_id, &[JobStatus::Accepted], JobTransition::to(JobStatus::InProgress))
            .await?;
        let Some(started) = started else {
            return Err(self.lost_race(job_id, &[JobStatus::Accepted]).await);
        };

        self.audit_service
            .log_transition(Some(actor.id), "job_started", Some(job.status), &started)
            .await;

        Ok(started)
    }

    /// Closes the job with the client's review. A second call for the same
    /// job reports `AlreadyReviewed` and writes nothing.
    pub async fn complete_job(
        &self,
        actor: Actor,
        job_id: Uuid,
        body: CompleteJobDto,
    ) -> Result<JobCompletion, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        ensure_client(actor, &job, "complete this job")?;

        if self.store.get_review_for_job(job_id).await?.is_some() {
            return Err(ServiceError::AlreadyReviewed(job_id));
        }

        body.validate()?;
        const COMPLETABLE: [JobStatus; 2] = [JobStatus::Accepted, JobStatus::InProgress];
        ensure_status(&job, &COMPLETABLE)?;

        let professional_id = job
            .professional_id
            .ok_or(ServiceError::InvalidJobStatus(job.id, job.status))?;

        let review = NewReview {
            job_id,
            reviewer_id: actor.id,
            reviewee_id: professional_id,
            rating: body.rating,
            comment: body.comment.trim().to_string(),
        };

        let outcome = match self.store.complete_with_review(job_id, &COMPLETABLE, review).await {
            Ok(outcome) => outcome,
            Err(StoreError::UniqueViolation(_)) => {
                return Err(ServiceError::AlreadyReviewed(job_id))
            }
            Err(e) => return Err(e.into()),
        };
        let Some((completed, review)) = outcome else {
            return Err(self.lost_race(job_id, &COMPLETABLE).await);
        };

        self.audit_service
            .log_transition(Some(actor.id), "job_completed", Some(job.status), &completed)
            .await;

        Ok(JobCompletion {
            job: completed,
            review,
        })
    }

    pub async fn cancel_job(&self, actor: Actor, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        let allowed = actor.is_admin()
            || job.client_id == actor.id
            || job.professional_id == Some(actor.id);
        if !allowed {
            return Err(ServiceError::Forbidden(actor.id, "cancel this job"));
        }
        if job.status.is_terminal() {
            return Err(ServiceError::InvalidJobStatus(job.id, job.status));
        }

        // No payment is captured at any point, so nothing needs compensating.
        let cancelled = self
            .store
            .transition_job(
                job_id,
                &JobStatus::NON_TERMINAL,
                JobTransition::closing(JobStatus::Cancelled),
            )
            .await?;
        let Some(cancelled) = cancelled else {
            return Err(self.lost_race(job_id, &JobStatus::NON_TERMINAL).await);
        };

        self.audit_service
            .log_transition(Some(actor.id), "job_cancelled", Some(job.status), &cancelled)
            .await;

        Ok(cancelled)
    }

    /// Expires drafts and open requests older than `older_than`.
    pub async fn expire_stale_jobs(&self, older_than: Duration) -> Result<Vec<Job>, ServiceError> {
        let cutoff = Utc::now() - older_than;
        let expired = self.store.expire_jobs_before(cutoff).await?;

        for job in &expired {
            self.audit_service
                .log_transition(None, "job_expired", None, job)
                .await;
        }

        Ok(expired)
    }

    /// Contact details of the other party, released once work is agreed.
    pub async fn contact_details(
        &self,
        actor: Actor,
        job_id: Uuid,
    ) -> Result<ContactDetailsDto, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;

        let counterpart = if job.client_id == actor.id {
            job.professional_id
        } else if job.professional_id == Some(actor.id) {
            Some(job.client_id)
        } else {
            return Err(ServiceError::Forbidden(actor.id, "see contact details for this job"));
        };

        if !job.status.releases_contact() {
            return Err(ServiceError::InvalidJobStatus(job.id, job.status));
        }
        let counterpart = counterpart.ok_or(ServiceError::InvalidJobStatus(job.id, job.status))?;

        let profile = self
            .store
            .get_profile(counterpart)
            .await?
            .ok_or(ServiceError::ProfileNotFound(counterpart))?;

        Ok(ContactDetailsDto {
            user_id: profile.id,
            full_name: profile.full_name,
            phone: profile.phone,
            email: profile.email,
        })
    }

    pub async fn earnings_summary(&self, actor: Actor) -> Result<EarningsSummaryDto, ServiceError> {
        if actor.role != UserRole::Professional {
            return Err(ServiceError::Forbidden(actor.id, "view earnings"));
        }

        let jobs = self
            .store
            .find_jobs(JobFilter {
                professional_id: Some(actor.id),
                statuses: Some(vec![JobStatus::Completed]),
                ..Default::default()
            })
            .await?;

        let rate = self.policy.commission_rate;
        // Totals are accumulated wide and clamped so stored rows can never wrap.
        let (gross, commission) = jobs
            .iter()
            .filter_map(|job| job.quoted_price)
            .fold((0i128, 0i128), |(gross, commission), price| {
                (
                    gross + i128::from(price),
                    commission + i128::from(rate.commission_for(price)),
                )
            });
        let clamp = |total: i128| i64::try_from(total).unwrap_or(i64::MAX);

        Ok(EarningsSummaryDto {
            completed_jobs: jobs.len(),
            gross: clamp(gross),
            commission: clamp(commission),
            net: clamp(gross - commission),
            commission_rate: rate.as_fraction(),
        })
    }

    pub async fn job_history(&self, actor: Actor, job_id: Uuid) -> Result<Vec<JobEvent>, ServiceError> {
        let job = self.load_visible_job(actor, job_id).await?;
        if !actor.is_admin() && !job.is_participant(actor.id) {
            return Err(ServiceError::Forbidden(actor.id, "see the history of this job"));
        }
        self.audit_service.job_history(job_id).await
    }

    async fn load_visible_job(&self, actor: Actor, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        if self.can_view(actor, &job).await? {
            Ok(job)
        } else {
            Err(ServiceError::JobNotFound(job_id))
        }
    }

    async fn can_view(&self, actor: Actor, job: &Job) -> Result<bool, ServiceError> {
        if actor.is_admin() || job.is_participant(actor.id) {
            return Ok(true);
        }
        if actor.role != UserRole::Professional {
            return Ok(false);
        }
        if job.status == JobStatus::Open && job.request_type == RequestType::Open {
            return Ok(true);
        }
        Ok(self.store.find_proposal(job.id, actor.id).await?.is_some())
    }

    async fn load_proposal_for(&self, job: &Job, proposal_id: Uuid) -> Result<Proposal, ServiceError> {
        match self.store.get_proposal(proposal_id).await? {
            Some(proposal) if proposal.job_id == job.id => Ok(proposal),
            _ => Err(ServiceError::ProposalNotFound(proposal_id)),
        }
    }

    /// Explains why a conditional write matched nothing.
    async fn lost_race(&self, job_id: Uuid, expected: &[JobStatus]) -> ServiceError {
        match self.store.get_job(job_id).await {
            Ok(Some(job)) if !expected.contains(&job.status) => {
                ServiceError::InvalidJobStatus(job.id, job.status)
            }
            Ok(Some(_)) => ServiceError::ConcurrentUpdate(job_id),
            Ok(None) => ServiceError::JobNotFound(job_id),
            Err(e) => e.into(),
        }
    }
}

fn ensure_client(actor: Actor, job: &Job, action: &'static str) -> Result<(), ServiceError> {
    if job.client_id != actor.id {
        return Err(ServiceError::Forbidden(actor.id, action));
    }
    Ok(())
}

fn ensure_assigned(actor: Actor, job: &Job, action: &'static str) -> Result<(), ServiceError> {
    if job.professional_id != Some(actor.id) {
        return Err(ServiceError::Forbidden(actor.id, action));
    }
    Ok(())
}

fn ensure_status(job: &Job, allowed: &[JobStatus]) -> Result<(), ServiceError> {
    if !allowed.contains(&job.status) {
        return Err(ServiceError::InvalidJobStatus(job.id, job.status));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        db::memory::MemoryStore,
        models::usermodel::Profile,
        service::error::ErrorKind,
    };
    use std::collections::HashSet;

    pub(crate) struct Fixture {
        pub store: SharedStore,
        pub service: JobService,
        pub client: Actor,
    }

    pub(crate) fn fixture_with(policy: LifecyclePolicy) -> Fixture {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let audit = Arc::new(AuditService::new(store.clone()));
        let service = JobService::new(store.clone(), audit, policy);
        Fixture {
            store,
            service,
            client: Actor::client(Uuid::new_v4()),
        }
    }

    pub(crate) fn fixture() -> Fixture {
        fixture_with(LifecyclePolicy::default())
    }

    pub(crate) fn details() -> JobDetailsDto {
        JobDetailsDto {
            title: "Arreglar canilla de la cocina".to_string(),
            description: "Pierde agua constantemente desde ayer".to_string(),
            category: "plomeria".to_string(),
            address: "Av. Rivadavia 5000, CABA".to_string(),
            photo_urls: vec!["https://cdn.chambea.app/fotos/1.jpg".to_string()],
            client_budget_max: Some(25_000),
            urgency: Urgency::High,
            target_professional_id: None,
        }
    }

    pub(crate) fn price(amount: i64) -> ProposalDraft {
        ProposalDraft::Price {
            quoted_price: amount,
            message: "Puedo ir mañana a primera hora".to_string(),
        }
    }

    fn visit() -> ProposalDraft {
        ProposalDraft::Visit {
            visit_date: Utc::now().date_naive() + Duration::days(2),
            visit_time_slot: VisitSlot::Morning,
            visit_cost: 0,
            visit_notes: "Tengo que ver el estado de la cañería".to_string(),
        }
    }

    fn review(rating: i32) -> CompleteJobDto {
        CompleteJobDto {
            rating,
            comment: "Excelente trabajo".to_string(),
        }
    }

    async fn assert_invariants(store: &SharedStore, job_id: Uuid) {
        let job = store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(
            job.professional_id.is_some(),
            job.status.has_professional(),
            "professional assignment out of sync with {:?}",
            job.status
        );

        let proposals = store.list_proposals(job_id).await.unwrap();
        let accepted = proposals
            .iter()
            .filter(|p| p.status == ProposalStatus::Accepted)
            .count();
        assert!(accepted <= 1, "{} accepted proposals", accepted);

        let pairs: HashSet<Uuid> = proposals.iter().map(|p| p.professional_id).collect();
        assert_eq!(pairs.len(), proposals.len());
    }

    #[tokio::test]
    async fn create_job_starts_open() {
        let f = fixture();
        let job = f
            .service
            .create_job(f.client, details(), RequestType::Open)
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Open);
        assert_eq!(job.client_id, f.client.id);
        assert!(job.professional_id.is_none());
        assert_invariants(&f.store, job.id).await;
    }

    #[tokio::test]
    async fn create_job_requires_title_description_and_address() {
        let f = fixture();
        for blank in ["title", "description", "address"] {
            let mut body = details();
            match blank {
                "title" => body.title = "   ".to_string(),
                "description" => body.description = String::new(),
                _ => body.address = String::new(),
            }
            let err = f
                .service
                .create_job(f.client, body, RequestType::Open)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "blank {}", blank);
        }
    }

    #[tokio::test]
    async fn direct_requests_need_a_target() {
        let f = fixture();
        let err = f
            .service
            .create_job(f.client, details(), RequestType::Direct)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let target = Actor::professional(Uuid::new_v4());
        let outsider = Actor::professional(Uuid::new_v4());
        let mut body = details();
        body.target_professional_id = Some(target.id);
        let job = f
            .service
            .create_job(f.client, body, RequestType::Direct)
            .await
            .unwrap();

        let available = f.service.available_jobs(target).await.unwrap();
        assert!(available.iter().any(|j| j.id == job.id));
        let hidden = f.service.available_jobs(outsider).await.unwrap();
        assert!(hidden.iter().all(|j| j.id != job.id));

        let err = f
            .service
            .submit_proposal(outsider, job.id, price(9_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        f.service.submit_proposal(target, job.id, price(9_000)).await.unwrap();
    }

    #[tokio::test]
    async fn only_clients_create_jobs() {
        let f = fixture();
        let err = f
            .service
            .create_job(Actor::professional(Uuid::new_v4()), details(), RequestType::Open)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[tokio::test]
    async fn scenario_a_accepting_a_price_proposal() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro_a = Actor::professional(Uuid::new_v4());
        let pro_b = Actor::professional(Uuid::new_v4());

        let cheap = f.service.submit_proposal(pro_a, job.id, price(10_000)).await.unwrap();
        let pricey = f.service.submit_proposal(pro_b, job.id, price(12_000)).await.unwrap();

        let decision = f.service.accept_proposal(f.client, job.id, cheap.id).await.unwrap();
        assert_eq!(decision.job.status, JobStatus::Accepted);
        assert_eq!(decision.job.quoted_price, Some(10_000));
        assert_eq!(decision.job.professional_id, Some(pro_a.id));
        assert_eq!(decision.proposal.status, ProposalStatus::Accepted);

        let loser = f.store.get_proposal(pricey.id).await.unwrap().unwrap();
        assert_eq!(loser.status, ProposalStatus::Rejected);

        let err = f
            .service
            .accept_proposal(f.client, job.id, pricey.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_invariants(&f.store, job.id).await;
    }

    #[tokio::test]
    async fn accept_on_non_open_job_changes_nothing() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, price(8_000)).await.unwrap();
        let cancelled = f.service.cancel_job(f.client, job.id).await.unwrap();

        let proposals_before = f.store.list_proposals(job.id).await.unwrap();
        let err = f
            .service
            .accept_proposal(f.client, job.id, proposal.id)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidJobStatus(_, JobStatus::Cancelled)));
        assert_eq!(f.store.get_job(job.id).await.unwrap().unwrap(), cancelled);
        assert_eq!(f.store.list_proposals(job.id).await.unwrap(), proposals_before);
    }

    #[tokio::test]
    async fn accept_proposal_rejects_visit_proposals() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, visit()).await.unwrap();

        let err = f
            .service
            .accept_proposal(f.client, job.id, proposal.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::WrongProposalType(_, ProposalType::Visit)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn scenario_b_visit_then_quote() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let rival = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, visit()).await.unwrap();
        let rival_bid = f.service.submit_proposal(rival, job.id, price(5_000)).await.unwrap();

        let scheduled = f.service.confirm_visit(f.client, job.id, proposal.id).await.unwrap();
        assert_eq!(scheduled.job.status, JobStatus::VisitScheduled);
        assert_eq!(scheduled.job.professional_id, Some(pro.id));
        assert_eq!(scheduled.proposal.status, ProposalStatus::Accepted);
        assert_invariants(&f.store, job.id).await;

        // The price track is closed once the visit is confirmed.
        let err = f
            .service
            .accept_proposal(f.client, job.id, rival_bid.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let quoted = f
            .service
            .submit_final_quote(pro, job.id, 20_000, "Cambio completo del flexible".to_string())
            .await
            .unwrap();
        assert_eq!(quoted.job.status, JobStatus::Quoted);
        assert_eq!(quoted.job.quoted_price, Some(20_000));
        assert_eq!(quoted.proposal.status, ProposalStatus::Pending);
        assert_eq!(quoted.proposal.quoted_price, Some(20_000));
        assert_invariants(&f.store, job.id).await;

        let accepted = f.service.accept_final_quote(f.client, job.id).await.unwrap();
        assert_eq!(accepted.job.status, JobStatus::Accepted);
        assert_eq!(accepted.proposal.status, ProposalStatus::Accepted);
        assert_invariants(&f.store, job.id).await;
    }

    #[tokio::test]
    async fn final_quote_only_from_assigned_professional() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let other = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, visit()).await.unwrap();
        f.service.submit_proposal(other, job.id, price(1_000)).await.unwrap();
        f.service.confirm_visit(f.client, job.id, proposal.id).await.unwrap();

        let err = f
            .service
            .submit_final_quote(other, job.id, 20_000, "Presupuesto alternativo".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        let err = f.service.accept_final_quote(f.client, job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn scenario_c_complete_once() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, price(10_000)).await.unwrap();
        f.service.accept_proposal(f.client, job.id, proposal.id).await.unwrap();

        let done = f.service.complete_job(f.client, job.id, review(5)).await.unwrap();
        assert_eq!(done.job.status, JobStatus::Completed);
        assert!(done.job.completed_at.is_some());
        assert_eq!(done.review.rating, 5);
        assert_eq!(done.review.reviewee_id, pro.id);

        let err = f.service.complete_job(f.client, job.id, review(4)).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyReviewed(_)));
        let stored = f.store.get_review_for_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.id, done.review.id);
        assert_invariants(&f.store, job.id).await;
    }

    #[tokio::test]
    async fn complete_validates_rating_and_state() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();

        let err = f.service.complete_job(f.client, job.id, review(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let pro = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, price(10_000)).await.unwrap();
        f.service.accept_proposal(f.client, job.id, proposal.id).await.unwrap();

        let err = f.service.complete_job(f.client, job.id, review(6)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = f.service.complete_job(pro, job.id, review(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[tokio::test]
    async fn scenario_d_duplicate_proposal() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let original = f.service.submit_proposal(pro, job.id, price(10_000)).await.unwrap();

        let err = f
            .service
            .submit_proposal(pro, job.id, price(7_000))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateProposal(_, _)));

        let stored = f.store.get_proposal(original.id).await.unwrap().unwrap();
        assert_eq!(stored, original);
        assert_invariants(&f.store, job.id).await;
    }

    #[tokio::test]
    async fn proposals_require_an_open_job() {
        let f = fixture();
        let job = f.service.create_draft(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());

        // Drafts are invisible to professionals.
        let err = f.service.submit_proposal(pro, job.id, price(1_000)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let published = f.service.publish_job(f.client, job.id).await.unwrap();
        assert_eq!(published.status, JobStatus::Open);
        let first = f.service.submit_proposal(pro, job.id, price(1_000)).await.unwrap();
        f.service.accept_proposal(f.client, job.id, first.id).await.unwrap();

        let late = Actor::professional(Uuid::new_v4());
        let err = f.service.submit_proposal(late, job.id, price(900)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        f.service.cancel_job(f.client, job.id).await.unwrap();
        let err = f.service.submit_proposal(late, job.id, price(900)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_invariants(&f.store, job.id).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acceptance_has_a_single_winner() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let first = f
            .service
            .submit_proposal(Actor::professional(Uuid::new_v4()), job.id, price(10_000))
            .await
            .unwrap();
        let second = f
            .service
            .submit_proposal(Actor::professional(Uuid::new_v4()), job.id, price(11_000))
            .await
            .unwrap();

        let (svc_a, svc_b) = (f.service.clone(), f.service.clone());
        let (client, job_id) = (f.client, job.id);
        let (first_id, second_id) = (first.id, second.id);
        let a = tokio::spawn(async move { svc_a.accept_proposal(client, job_id, first_id).await });
        let b = tokio::spawn(async move { svc_b.accept_proposal(client, job_id, second_id).await });
        let results = [a.await.unwrap(), b.await.unwrap()];

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for result in &results {
            if let Err(e) = result {
                assert_eq!(e.kind(), ErrorKind::InvalidState);
            }
        }
        assert_invariants(&f.store, job.id).await;
    }

    #[tokio::test]
    async fn reject_then_accept_another() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let a = f
            .service
            .submit_proposal(Actor::professional(Uuid::new_v4()), job.id, price(15_000))
            .await
            .unwrap();
        let b = f
            .service
            .submit_proposal(Actor::professional(Uuid::new_v4()), job.id, price(14_000))
            .await
            .unwrap();

        let rejected = f.service.reject_proposal(f.client, job.id, a.id).await.unwrap();
        assert_eq!(rejected.status, ProposalStatus::Rejected);

        let err = f.service.accept_proposal(f.client, job.id, a.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidProposalStatus(_, ProposalStatus::Rejected)));

        f.service.accept_proposal(f.client, job.id, b.id).await.unwrap();
        assert_invariants(&f.store, job.id).await;
    }

    #[tokio::test]
    async fn cancel_clears_assignment_and_voids_bids() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, visit()).await.unwrap();
        let pending = f
            .service
            .submit_proposal(Actor::professional(Uuid::new_v4()), job.id, price(3_000))
            .await
            .unwrap();
        let other_job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();

        f.service.confirm_visit(f.client, job.id, proposal.id).await.unwrap();
        let cancelled = f.service.cancel_job(pro, job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.professional_id.is_none());
        assert_eq!(
            f.store.get_proposal(pending.id).await.unwrap().unwrap().status,
            ProposalStatus::Rejected
        );
        assert_invariants(&f.store, job.id).await;

        let err = f.service.cancel_job(f.client, job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let stranger = Actor::client(Uuid::new_v4());
        let err = f.service.cancel_job(stranger, other_job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let admin = Actor::admin(Uuid::new_v4());
        f.service.cancel_job(admin, other_job.id).await.unwrap();
    }

    #[tokio::test]
    async fn start_moves_accepted_to_in_progress() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, price(10_000)).await.unwrap();

        let err = f.service.start_job(pro, job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        f.service.accept_proposal(f.client, job.id, proposal.id).await.unwrap();
        let started = f.service.start_job(pro, job.id).await.unwrap();
        assert_eq!(started.status, JobStatus::InProgress);

        let done = f.service.complete_job(f.client, job.id, review(4)).await.unwrap();
        assert_eq!(done.job.status, JobStatus::Completed);
        assert_invariants(&f.store, job.id).await;

        let history = f.service.job_history(f.client, job.id).await.unwrap();
        let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(
            actions,
            vec!["job_created", "proposal_accepted", "job_started", "job_completed"]
        );
    }

    #[tokio::test]
    async fn contact_details_released_on_acceptance() {
        let f = fixture();
        let pro = Actor::professional(Uuid::new_v4());
        f.store
            .upsert_profile(Profile {
                id: pro.id,
                full_name: "Juan Pérez".to_string(),
                role: UserRole::Professional,
                phone: Some("+54 11 5555 0000".to_string()),
                email: Some("juan@example.com".to_string()),
                verification_status: VerificationStatus::Verified,
            })
            .await
            .unwrap();
        f.store
            .upsert_profile(Profile {
                id: f.client.id,
                full_name: "Ana Gómez".to_string(),
                role: UserRole::Client,
                phone: Some("+54 11 4444 0000".to_string()),
                email: None,
                verification_status: VerificationStatus::Verified,
            })
            .await
            .unwrap();

        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let proposal = f.service.submit_proposal(pro, job.id, price(10_000)).await.unwrap();

        let err = f.service.contact_details(f.client, job.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        f.service.accept_proposal(f.client, job.id, proposal.id).await.unwrap();
        let for_client = f.service.contact_details(f.client, job.id).await.unwrap();
        assert_eq!(for_client.full_name, "Juan Pérez");
        let for_pro = f.service.contact_details(pro, job.id).await.unwrap();
        assert_eq!(for_pro.user_id, f.client.id);
    }

    #[tokio::test]
    async fn unverified_professionals_blocked_when_required() {
        let f = fixture_with(LifecyclePolicy {
            require_verified_professionals: true,
            ..Default::default()
        });
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());

        let err = f.service.submit_proposal(pro, job.id, price(1_000)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        f.store
            .upsert_profile(Profile {
                id: pro.id,
                full_name: "Marta Ríos".to_string(),
                role: UserRole::Professional,
                phone: None,
                email: None,
                verification_status: VerificationStatus::Verified,
            })
            .await
            .unwrap();
        f.service.submit_proposal(pro, job.id, price(1_000)).await.unwrap();
    }

    #[tokio::test]
    async fn views_and_earnings() {
        let f = fixture();
        let pro = Actor::professional(Uuid::new_v4());

        let done = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let p = f.service.submit_proposal(pro, done.id, price(10_000)).await.unwrap();
        f.service.accept_proposal(f.client, done.id, p.id).await.unwrap();
        f.service.complete_job(f.client, done.id, review(5)).await.unwrap();

        let active = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let p = f.service.submit_proposal(pro, active.id, price(3_333)).await.unwrap();
        f.service.accept_proposal(f.client, active.id, p.id).await.unwrap();

        let open = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();

        let client_open = f.service.list_jobs_for(f.client, Some(JobView::Open)).await.unwrap();
        assert_eq!(client_open.iter().map(|j| j.id).collect::<Vec<_>>(), vec![open.id]);
        let client_all = f.service.list_jobs_for(f.client, None).await.unwrap();
        assert_eq!(client_all.len(), 3);
        assert_eq!(client_all[0].id, open.id);

        let pro_active = f.service.list_jobs_for(pro, Some(JobView::Active)).await.unwrap();
        assert_eq!(pro_active.iter().map(|j| j.id).collect::<Vec<_>>(), vec![active.id]);
        let pro_done = f.service.list_jobs_for(pro, Some(JobView::Completed)).await.unwrap();
        assert_eq!(pro_done.len(), 1);

        let earnings = f.service.earnings_summary(pro).await.unwrap();
        assert_eq!(
            earnings,
            EarningsSummaryDto {
                completed_jobs: 1,
                gross: 10_000,
                commission: 1_500,
                net: 8_500,
                commission_rate: 0.15,
            }
        );

        let err = f.service.earnings_summary(f.client).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[tokio::test]
    async fn earnings_never_overflow() {
        let f = fixture();
        let pro = Actor::professional(Uuid::new_v4());

        let open = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let err = f
            .service
            .submit_proposal(pro, open.id, price(negotiation::MAX_PRICE + 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Rows written before the cap existed still have to add up.
        for _ in 0..2 {
            let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
            let stored = f
                .store
                .insert_proposal(price(i64::MAX / 2 + 1).into_new_proposal(job.id, pro.id))
                .await
                .unwrap();
            f.service.accept_proposal(f.client, job.id, stored.id).await.unwrap();
            f.service.complete_job(f.client, job.id, review(4)).await.unwrap();
        }

        let earnings = f.service.earnings_summary(pro).await.unwrap();
        assert_eq!(earnings.completed_jobs, 2);
        assert_eq!(earnings.gross, i64::MAX);
        assert!(earnings.commission > 0);
        assert!(earnings.net > 0 && earnings.net < earnings.gross);
    }

    #[tokio::test]
    async fn professionals_only_see_their_own_proposals() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let a = Actor::professional(Uuid::new_v4());
        let b = Actor::professional(Uuid::new_v4());
        let first = f.service.submit_proposal(a, job.id, price(1_000)).await.unwrap();
        let second = f.service.submit_proposal(b, job.id, price(2_000)).await.unwrap();

        let all = f.service.list_proposals(f.client, job.id).await.unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let own = f.service.list_proposals(a, job.id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, first.id);
    }

    #[tokio::test]
    async fn expiry_closes_stale_jobs() {
        let f = fixture();
        let job = f.service.create_job(f.client, details(), RequestType::Open).await.unwrap();
        let pro = Actor::professional(Uuid::new_v4());
        let proposal = f.service.submit_proposal(pro, job.id, price(1_000)).await.unwrap();

        let none = f.service.expire_stale_jobs(Duration::days(30)).await.unwrap();
        assert!(none.is_empty());

        let expired = f.service.expire_stale_jobs(Duration::seconds(-1)).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, JobStatus::Expired);
        assert_eq!(
            f.store.get_proposal(proposal.id).await.unwrap().unwrap().status,
            ProposalStatus::Rejected
        );
        assert_invariants(&f.store, job.id).await;
    }
}

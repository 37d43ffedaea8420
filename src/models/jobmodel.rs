// models/jobmodel.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgHasArrayType, PgTypeInfo};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "request_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Visible to every professional.
    #[default]
    Open,
    /// Urgent contact aimed at a single professional.
    Direct,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "job_status", rename_all = "snake_case", no_pg_array)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    Open,
    VisitScheduled,
    Quoted,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    Expired,
}

impl JobStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Open => "open",
            JobStatus::VisitScheduled => "visit_scheduled",
            JobStatus::Quoted => "quoted",
            JobStatus::Accepted => "accepted",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Expired
        )
    }

    /// Statuses in which the job carries an assigned professional.
    pub fn has_professional(&self) -> bool {
        matches!(
            self,
            JobStatus::VisitScheduled
                | JobStatus::Quoted
                | JobStatus::Accepted
                | JobStatus::InProgress
                | JobStatus::Completed
        )
    }

    /// Once here the counterpart's contact details are released.
    pub fn releases_contact(&self) -> bool {
        matches!(
            self,
            JobStatus::Accepted | JobStatus::InProgress | JobStatus::Completed
        )
    }

    pub const NON_TERMINAL: [JobStatus; 6] = [
        JobStatus::Draft,
        JobStatus::Open,
        JobStatus::VisitScheduled,
        JobStatus::Quoted,
        JobStatus::Accepted,
        JobStatus::InProgress,
    ];
}

impl PgHasArrayType for JobStatus {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_job_status")
    }
}

/// Grouping used by the dashboards.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobView {
    Open,
    Active,
    Completed,
    Closed,
}

impl JobView {
    pub fn statuses(&self) -> &'static [JobStatus] {
        match self {
            JobView::Open => &[JobStatus::Draft, JobStatus::Open],
            JobView::Active => &[
                JobStatus::VisitScheduled,
                JobStatus::Quoted,
                JobStatus::Accepted,
                JobStatus::InProgress,
            ],
            JobView::Completed => &[JobStatus::Completed],
            JobView::Closed => &[JobStatus::Cancelled, JobStatus::Expired],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "urgency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Emergency,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "proposal_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    Price,
    Visit,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "proposal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "visit_slot", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VisitSlot {
    /// 08:00 to 12:00
    Morning,
    /// 12:00 to 16:00
    Afternoon,
    /// 16:00 to 20:00
    Evening,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub client_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub target_professional_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub address: String,
    pub photo_urls: Vec<String>,
    pub request_type: RequestType,
    pub status: JobStatus,
    pub quoted_price: Option<i64>,
    pub client_budget_max: Option<i64>,
    pub urgency: Urgency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.client_id == user_id
            || self.professional_id == Some(user_id)
            || self.target_professional_id == Some(user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Proposal {
    pub id: Uuid,
    pub job_id: Uuid,
    pub professional_id: Uuid,
    pub proposal_type: ProposalType,
    pub status: ProposalStatus,
    pub quoted_price: Option<i64>,
    pub message: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub visit_time_slot: Option<VisitSlot>,
    pub visit_cost: Option<i64>,
    pub visit_notes: Option<String>,
    pub final_quote_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub job_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobEvent {
    pub id: Uuid,
    pub job_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub from_status: Option<JobStatus>,
    pub to_status: JobStatus,
    pub created_at: DateTime<Utc>,
}

// Insert payloads handed to the store. The store assigns ids and timestamps.

#[derive(Debug, Clone)]
pub struct NewJob {
    pub client_id: Uuid,
    pub target_professional_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub address: String,
    pub photo_urls: Vec<String>,
    pub request_type: RequestType,
    pub status: JobStatus,
    pub client_budget_max: Option<i64>,
    pub urgency: Urgency,
}

#[derive(Debug, Clone)]
pub struct NewProposal {
    pub job_id: Uuid,
    pub professional_id: Uuid,
    pub proposal_type: ProposalType,
    pub quoted_price: Option<i64>,
    pub message: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub visit_time_slot: Option<VisitSlot>,
    pub visit_cost: Option<i64>,
    pub visit_notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub job_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Clone)]
pub struct NewJobEvent {
    pub job_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub from_status: Option<JobStatus>,
    pub to_status: JobStatus,
}

/// A single-row status change applied only while the job is in one of the
/// expected statuses.
#[derive(Debug, Clone, Copy)]
pub struct JobTransition {
    pub to: JobStatus,
    pub clear_professional: bool,
    pub reject_pending: bool,
}

impl JobTransition {
    pub fn to(status: JobStatus) -> Self {
        Self {
            to: status,
            clear_professional: false,
            reject_pending: false,
        }
    }

    /// Closing transitions drop the assignment and void outstanding bids.
    pub fn closing(status: JobStatus) -> Self {
        Self {
            to: status,
            clear_professional: true,
            reject_pending: true,
        }
    }
}

/// Equality filters for job listings; `None` means unfiltered.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub ids: Option<Vec<Uuid>>,
    pub client_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub target_professional_id: Option<Uuid>,
    pub statuses: Option<Vec<JobStatus>>,
    pub request_type: Option<RequestType>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&job.id))
            && self.client_id.map_or(true, |id| job.client_id == id)
            && self
                .professional_id
                .map_or(true, |id| job.professional_id == Some(id))
            && self
                .target_professional_id
                .map_or(true, |id| job.target_professional_id == Some(id))
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&job.status))
            && self.request_type.map_or(true, |rt| job.request_type == rt)
    }
}

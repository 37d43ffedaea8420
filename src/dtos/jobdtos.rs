use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::jobmodel::*;

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn valid_photo_urls(urls: &[String]) -> Result<(), ValidationError> {
    if urls.iter().all(|url| validator::validate_url(url.as_str())) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_photo_url"))
    }
}

// Job DTOs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JobDetailsDto {
    #[serde(default)]
    #[validate(
        length(max = 120, message = "Title must be at most 120 characters"),
        custom = "not_blank"
    )]
    pub title: String,

    #[serde(default)]
    #[validate(
        length(max = 4000, message = "Description must be at most 4000 characters"),
        custom = "not_blank"
    )]
    pub description: String,

    #[serde(default)]
    #[validate(length(max = 80, message = "Category must be at most 80 characters"))]
    pub category: String,

    #[serde(default)]
    #[validate(
        length(max = 300, message = "Address must be at most 300 characters"),
        custom = "not_blank"
    )]
    pub address: String,

    #[serde(default)]
    #[validate(custom = "valid_photo_urls")]
    pub photo_urls: Vec<String>,

    #[validate(range(min = 1, message = "Budget must be positive"))]
    pub client_budget_max: Option<i64>,

    #[serde(default)]
    pub urgency: Urgency,

    /// Required for direct requests, forbidden for open ones.
    pub target_professional_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobDto {
    #[serde(default)]
    pub request_type: RequestType,

    #[serde(flatten)]
    pub details: JobDetailsDto,
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub view: Option<JobView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobDetailResponse {
    pub job: Job,
    pub proposals: Vec<Proposal>,
}

// Negotiation DTOs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalQuoteDto {
    pub price: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompleteJobDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[serde(default)]
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct CommissionQuery {
    pub price: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalDecision {
    pub job: Job,
    pub proposal: Proposal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobCompletion {
    pub job: Job,
    pub review: Review,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactDetailsDto {
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EarningsSummaryDto {
    pub completed_jobs: usize,
    pub gross: i64,
    pub commission: i64,
    pub net: i64,
    pub commission_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }

    /// Repeated submissions the user should see as already done.
    pub fn no_op(message: &str) -> ApiResponse<()> {
        ApiResponse {
            status: "success".to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

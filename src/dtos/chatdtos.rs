use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{chatmodels::Message, jobmodel::*},
    service::contact_guard::LeakVerdict,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageDto {
    pub receiver_id: Uuid,

    #[validate(length(min = 1, max = 4000, message = "Message must be between 1 and 4000 characters"))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuoteOfferDto {
    #[validate(range(min = 1, max = 1000000000, message = "Price must be between 1 and 1000000000"))]
    pub price: i64,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: String,

    #[validate(range(min = 1, max = 720))]
    pub estimated_hours: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondQuoteDto {
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// The other side of the conversation.
    pub with: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GuardCheckDto {
    #[validate(length(max = 4000))]
    pub content: String,
}

/// A sent message together with the warning shown to the sender.
#[derive(Debug, Serialize, Deserialize)]
pub struct SentMessageDto {
    pub message: Message,
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuoteOfferOutcome {
    pub message: Message,
    pub proposal: Proposal,
    pub job: Job,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuoteReplyOutcome {
    pub message: Message,
    pub proposal: Proposal,
    pub job: Job,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GuardCheckResponse {
    #[serde(flatten)]
    pub verdict: LeakVerdict,
    pub warning: Option<String>,
}

// service/chat_service.rs
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::{
    db::{chatdb::ChatExt, jobdb::JobExt, SharedStore},
    dtos::chatdtos::{QuoteOfferOutcome, QuoteReplyOutcome},
    models::{
        chatmodels::*,
        jobmodel::*,
        usermodel::{Actor, UserRole},
    },
    service::{
        chat_hub::{ChatHub, ChatSubscription},
        contact_guard::{self, LeakVerdict},
        error::ServiceError,
        job_service::JobService,
        negotiation::ProposalDraft,
    },
};

const MAX_MESSAGE_CHARS: usize = 4000;

/// Banner shown to the sender of a flagged message.
pub fn leak_warning(verdict: &LeakVerdict) -> Option<String> {
    verdict.suspicious.then(|| {
        "Por tu seguridad, mantené la conversación y los pagos dentro de Chambea".to_string()
    })
}

#[derive(Debug, Clone)]
pub struct ChatService {
    store: SharedStore,
    job_service: Arc<JobService>,
    hub: ChatHub,
}

impl ChatService {
    pub fn new(store: SharedStore, job_service: Arc<JobService>, hub: ChatHub) -> Self {
        Self {
            store,
            job_service,
            hub,
        }
    }

    /// Persists a text message. Suspected contact details are flagged, never
    /// blocked.
    pub async fn send_message(
        &self,
        actor: Actor,
        job_id: Uuid,
        receiver_id: Uuid,
        content: String,
    ) -> Result<(Message, LeakVerdict), ServiceError> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(ServiceError::Validation("message cannot be empty".to_string()));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ServiceError::Validation(format!(
                "message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let job = self.job_service.get_job(actor, job_id).await?;
        self.ensure_conversation(&job, actor.id, receiver_id).await?;

        self.record(job_id, actor.id, receiver_id, content, MessageType::Text, None)
            .await
    }

    /// Oldest first.
    pub async fn list_messages(
        &self,
        actor: Actor,
        job_id: Uuid,
        other_id: Uuid,
    ) -> Result<Vec<Message>, ServiceError> {
        let job = self.job_service.get_job(actor, job_id).await?;
        if !actor.is_admin() {
            self.ensure_conversation(&job, actor.id, other_id).await?;
        }
        Ok(self.store.list_messages(job_id, actor.id, other_id).await?)
    }

    /// A price offered from the chat becomes a proposal on an open job and
    /// the final quote on a job with a scheduled visit.
    pub async fn send_quote_offer(
        &self,
        actor: Actor,
        job_id: Uuid,
        price: i64,
        description: String,
        estimated_hours: Option<u32>,
    ) -> Result<QuoteOfferOutcome, ServiceError> {
        if actor.role != UserRole::Professional {
            return Err(ServiceError::Forbidden(actor.id, "send quotes"));
        }
        let job = self.job_service.get_job(actor, job_id).await?;

        let (job, proposal) = match job.status {
            JobStatus::Open => {
                let draft = ProposalDraft::Price {
                    quoted_price: price,
                    message: description.clone(),
                };
                let proposal = self.job_service.submit_proposal(actor, job_id, draft).await?;
                (job, proposal)
            }
            JobStatus::VisitScheduled => {
                let decision = self
                    .job_service
                    .submit_final_quote(actor, job_id, price, description.clone())
                    .await?;
                (decision.job, decision.proposal)
            }
            status => return Err(ServiceError::InvalidJobStatus(job.id, status)),
        };

        let breakdown = self.job_service.commission_rate().breakdown(price);
        let metadata = json!({
            "proposal_id": proposal.id,
            "price": price,
            "estimated_hours": estimated_hours,
            "commission": breakdown.commission,
            "net": breakdown.net,
        });

        let (message, _) = self
            .record(
                job_id,
                actor.id,
                job.client_id,
                description.trim().to_string(),
                MessageType::QuoteOffer,
                Some(metadata),
            )
            .await?;

        Ok(QuoteOfferOutcome {
            message,
            proposal,
            job,
        })
    }

    pub async fn respond_to_quote(
        &self,
        actor: Actor,
        message_id: Uuid,
        accept: bool,
    ) -> Result<QuoteReplyOutcome, ServiceError> {
        let offer = self
            .store
            .get_message(message_id)
            .await?
            .ok_or(ServiceError::MessageNotFound(message_id))?;

        if offer.receiver_id != actor.id {
            return Err(ServiceError::Forbidden(actor.id, "answer this quote"));
        }
        if offer.message_type != MessageType::QuoteOffer {
            return Err(ServiceError::Validation("message is not a quote offer".to_string()));
        }
        let proposal_id = offer
            .proposal_id()
            .ok_or_else(|| ServiceError::Validation("quote offer has no proposal".to_string()))?;

        let job = self.job_service.get_job(actor, offer.job_id).await?;

        let (job, proposal) = match (accept, job.status) {
            (true, JobStatus::Open) => {
                let decision = self
                    .job_service
                    .accept_proposal(actor, job.id, proposal_id)
                    .await?;
                (decision.job, decision.proposal)
            }
            (true, JobStatus::Quoted) if job.professional_id == Some(offer.sender_id) => {
                let decision = self.job_service.accept_final_quote(actor, job.id).await?;
                (decision.job, decision.proposal)
            }
            (false, JobStatus::Open) => {
                let proposal = self
                    .job_service
                    .reject_proposal(actor, job.id, proposal_id)
                    .await?;
                (job, proposal)
            }
            (_, status) => return Err(ServiceError::InvalidJobStatus(job.id, status)),
        };

        let (message_type, content) = if accept {
            (MessageType::QuoteAccepted, "Presupuesto aceptado")
        } else {
            (MessageType::QuoteRejected, "Presupuesto rechazado")
        };
        let metadata = json!({
            "proposal_id": proposal.id,
            "reply_to": offer.id,
        });

        let (message, _) = self
            .record(
                job.id,
                actor.id,
                offer.sender_id,
                content.to_string(),
                message_type,
                Some(metadata),
            )
            .await?;

        Ok(QuoteReplyOutcome {
            message,
            proposal,
            job,
        })
    }

    /// Live feed of a job's chat for one of its parties. Participants only
    /// see their own conversation; admins see every message on the job.
    pub async fn subscribe(&self, actor: Actor, job_id: Uuid) -> Result<ChatSubscription, ServiceError> {
        let job = self.job_service.get_job(actor, job_id).await?;
        if !actor.is_admin()
            && job.client_id != actor.id
            && !self.is_professional_party(&job, actor.id).await?
        {
            return Err(ServiceError::Forbidden(actor.id, "follow this chat"));
        }
        let viewer = (!actor.is_admin()).then_some(actor.id);
        Ok(self.hub.subscribe(job_id, viewer))
    }

    async fn record(
        &self,
        job_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: String,
        message_type: MessageType,
        metadata: Option<serde_json::Value>,
    ) -> Result<(Message, LeakVerdict), ServiceError> {
        let verdict = contact_guard::inspect(&content);
        if verdict.suspicious {
            tracing::warn!(
                job_id = %job_id,
                sender_id = %sender_id,
                categories = ?verdict.category_names(),
                "possible contact details shared in chat"
            );
        }

        let message = self
            .store
            .insert_message(NewMessage {
                job_id,
                sender_id,
                receiver_id,
                content,
                message_type,
                metadata,
                flagged: verdict.suspicious,
                flag_categories: verdict.category_names(),
            })
            .await?;

        let delivered = self.hub.publish(&message);
        tracing::debug!(message_id = %message.id, delivered, "chat message stored");

        Ok((message, verdict))
    }

    /// A conversation runs between the job's client and one professional
    /// involved with it.
    async fn ensure_conversation(
        &self,
        job: &Job,
        user_id: Uuid,
        other_id: Uuid,
    ) -> Result<(), ServiceError> {
        let professional = if user_id == job.client_id {
            other_id
        } else if other_id == job.client_id {
            user_id
        } else {
            return Err(ServiceError::Forbidden(user_id, "chat on this job"));
        };

        if professional == job.client_id || !self.is_professional_party(job, professional).await? {
            return Err(ServiceError::Forbidden(user_id, "chat on this job"));
        }
        Ok(())
    }

    async fn is_professional_party(&self, job: &Job, user_id: Uuid) -> Result<bool, ServiceError> {
        if job.professional_id == Some(user_id) || job.target_professional_id == Some(user_id) {
            return Ok(true);
        }
        Ok(self.store.find_proposal(job.id, user_id).await?.is_some())
    }
}

use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::error::StoreError,
    error::HttpError,
    models::jobmodel::{JobStatus, ProposalStatus, ProposalType},
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job {0} is not in a status that allows this action (current: {1:?})")]
    InvalidJobStatus(Uuid, JobStatus),

    #[error("Proposal {0} is {1:?}, expected pending")]
    InvalidProposalStatus(Uuid, ProposalStatus),

    #[error("Proposal {0} is a {1:?} proposal and cannot be used here")]
    WrongProposalType(Uuid, ProposalType),

    #[error("Job {0} changed while the request was in flight")]
    ConcurrentUpdate(Uuid),

    #[error("Professional {1} already sent a proposal for job {0}")]
    DuplicateProposal(Uuid, Uuid),

    #[error("Job {0} has already been reviewed")]
    AlreadyReviewed(Uuid),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Proposal {0} not found")]
    ProposalNotFound(Uuid),

    #[error("Message {0} not found")]
    MessageNotFound(Uuid),

    #[error("Profile {0} not found")]
    ProfileNotFound(Uuid),

    #[error("User {0} is not allowed to {1}")]
    Forbidden(Uuid, &'static str),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// The coarse error classes callers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidState,
    DuplicateProposal,
    AlreadyReviewed,
    NotFound,
    Permission,
    Internal,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,

            ServiceError::InvalidJobStatus(_, _)
            | ServiceError::InvalidProposalStatus(_, _)
            | ServiceError::WrongProposalType(_, _)
            | ServiceError::ConcurrentUpdate(_) => ErrorKind::InvalidState,

            ServiceError::DuplicateProposal(_, _) => ErrorKind::DuplicateProposal,
            ServiceError::AlreadyReviewed(_) => ErrorKind::AlreadyReviewed,

            ServiceError::JobNotFound(_)
            | ServiceError::ProposalNotFound(_)
            | ServiceError::MessageNotFound(_)
            | ServiceError::ProfileNotFound(_) => ErrorKind::NotFound,

            ServiceError::Forbidden(_, _) => ErrorKind::Permission,
            ServiceError::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::InvalidState
            | ErrorKind::DuplicateProposal
            | ErrorKind::AlreadyReviewed => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Permission => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message shown to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Validation(details) => format!("Revisá los datos: {}", details),
            ServiceError::InvalidJobStatus(_, _) | ServiceError::ConcurrentUpdate(_) => {
                "El trabajo ya no admite esta acción".to_string()
            }
            ServiceError::InvalidProposalStatus(_, _) => {
                "La propuesta ya no está disponible".to_string()
            }
            ServiceError::WrongProposalType(_, _) => {
                "Esta acción no corresponde a este tipo de propuesta".to_string()
            }
            ServiceError::DuplicateProposal(_, _) => {
                "Ya enviaste una propuesta para este trabajo".to_string()
            }
            ServiceError::AlreadyReviewed(_) => "Ya calificaste este trabajo".to_string(),
            ServiceError::JobNotFound(_) => "Trabajo no encontrado".to_string(),
            ServiceError::ProposalNotFound(_) => "Propuesta no encontrada".to_string(),
            ServiceError::MessageNotFound(_) => "Mensaje no encontrado".to_string(),
            ServiceError::ProfileNotFound(_) => "Perfil no encontrado".to_string(),
            ServiceError::Forbidden(_, _) => {
                "No tenés permiso para realizar esta acción".to_string()
            }
            ServiceError::Store(_) => "Ocurrió un error inesperado, intentá de nuevo".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(errors.to_string())
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        if error.kind() == ErrorKind::Internal {
            tracing::error!("Internal service error: {}", error);
        }
        HttpError::new(error.user_message(), error.status_code())
    }
}

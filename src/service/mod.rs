pub mod audit_service;
pub mod background_jobs;
pub mod chat_hub;
pub mod chat_service;
pub mod contact_guard;
pub mod error;
pub mod job_service;
pub mod negotiation;

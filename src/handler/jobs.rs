// handler/jobs.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    dtos::jobdtos::*,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    service::{error::ServiceError, negotiation::ProposalDraft},
    AppState,
};

pub fn jobs_handler() -> Router {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/drafts", post(create_draft))
        .route("/jobs/available", get(available_jobs))
        .route("/jobs/:job_id", get(get_job_details))
        .route("/jobs/:job_id/publish", put(publish_job))
        .route(
            "/jobs/:job_id/proposals",
            post(submit_proposal).get(list_proposals),
        )
        .route(
            "/jobs/:job_id/proposals/:proposal_id/accept",
            put(accept_proposal),
        )
        .route(
            "/jobs/:job_id/proposals/:proposal_id/confirm-visit",
            put(confirm_visit),
        )
        .route(
            "/jobs/:job_id/proposals/:proposal_id/reject",
            put(reject_proposal),
        )
        .route("/jobs/:job_id/final-quote", post(submit_final_quote))
        .route("/jobs/:job_id/final-quote/accept", put(accept_final_quote))
        .route("/jobs/:job_id/start", put(start_job))
        .route("/jobs/:job_id/complete", put(complete_job))
        .route("/jobs/:job_id/cancel", put(cancel_job))
        .route("/jobs/:job_id/contact", get(get_contact_details))
        .route("/jobs/:job_id/history", get(get_job_history))
        .route("/earnings", get(get_earnings))
        .route("/proposals/commission", get(preview_commission))
}

pub async fn create_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state
        .job_service
        .create_job(auth.actor, body.details, body.request_type)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Trabajo publicado", job)),
    ))
}

pub async fn create_draft(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state
        .job_service
        .create_draft(auth.actor, body.details, body.request_type)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Borrador guardado", job)),
    ))
}

pub async fn publish_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.publish_job(auth.actor, job_id).await?;

    Ok(Json(ApiResponse::success("Trabajo publicado", job)))
}

pub async fn list_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(query): Query<JobListQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let jobs = app_state
        .job_service
        .list_jobs_for(auth.actor, query.view)
        .await?;

    Ok(Json(ApiResponse::success("Trabajos obtenidos", jobs)))
}

pub async fn available_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let jobs = app_state.job_service.available_jobs(auth.actor).await?;

    Ok(Json(ApiResponse::success("Trabajos disponibles", jobs)))
}

pub async fn get_job_details(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.get_job(auth.actor, job_id).await?;
    let proposals = app_state
        .job_service
        .list_proposals(auth.actor, job_id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Detalle del trabajo",
        JobDetailResponse { job, proposals },
    )))
}

pub async fn submit_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<ProposalDraft>,
) -> Result<impl IntoResponse, HttpError> {
    let proposal = app_state
        .job_service
        .submit_proposal(auth.actor, job_id, body)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Propuesta enviada", proposal)),
    ))
}

pub async fn list_proposals(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let proposals = app_state
        .job_service
        .list_proposals(auth.actor, job_id)
        .await?;

    Ok(Json(ApiResponse::success("Propuestas obtenidas", proposals)))
}

pub async fn accept_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path((job_id, proposal_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    let decision = app_state
        .job_service
        .accept_proposal(auth.actor, job_id, proposal_id)
        .await?;

    Ok(Json(ApiResponse::success("Propuesta aceptada", decision)))
}

pub async fn confirm_visit(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path((job_id, proposal_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    let decision = app_state
        .job_service
        .confirm_visit(auth.actor, job_id, proposal_id)
        .await?;

    Ok(Json(ApiResponse::success("Visita confirmada", decision)))
}

pub async fn reject_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path((job_id, proposal_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    let proposal = app_state
        .job_service
        .reject_proposal(auth.actor, job_id, proposal_id)
        .await?;

    Ok(Json(ApiResponse::success("Propuesta rechazada", proposal)))
}

pub async fn submit_final_quote(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<FinalQuoteDto>,
) -> Result<impl IntoResponse, HttpError> {
    let decision = app_state
        .job_service
        .submit_final_quote(auth.actor, job_id, body.price, body.description)
        .await?;

    Ok(Json(ApiResponse::success("Presupuesto enviado", decision)))
}

pub async fn accept_final_quote(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let decision = app_state
        .job_service
        .accept_final_quote(auth.actor, job_id)
        .await?;

    Ok(Json(ApiResponse::success("Presupuesto aceptado", decision)))
}

pub async fn start_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.start_job(auth.actor, job_id).await?;

    Ok(Json(ApiResponse::success("Trabajo iniciado", job)))
}

pub async fn complete_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<CompleteJobDto>,
) -> Result<Response, HttpError> {
    match app_state
        .job_service
        .complete_job(auth.actor, job_id, body)
        .await
    {
        Ok(completion) => Ok(Json(ApiResponse::success("Trabajo finalizado", completion)).into_response()),
        // A repeated completion is reported as done, not as a failure.
        Err(e @ ServiceError::AlreadyReviewed(_)) => {
            Ok(Json(ApiResponse::<()>::no_op(&e.user_message())).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn cancel_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.cancel_job(auth.actor, job_id).await?;

    Ok(Json(ApiResponse::success("Trabajo cancelado", job)))
}

pub async fn get_contact_details(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let contact = app_state
        .job_service
        .contact_details(auth.actor, job_id)
        .await?;

    Ok(Json(ApiResponse::success("Datos de contacto", contact)))
}

pub async fn get_job_history(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let events = app_state.job_service.job_history(auth.actor, job_id).await?;

    Ok(Json(ApiResponse::success("Historial del trabajo", events)))
}

pub async fn get_earnings(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let summary = app_state.job_service.earnings_summary(auth.actor).await?;

    Ok(Json(ApiResponse::success("Resumen de ganancias", summary)))
}

pub async fn preview_commission(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<CommissionQuery>,
) -> Result<impl IntoResponse, HttpError> {
    if query.price <= 0 {
        return Err(HttpError::bad_request("El precio debe ser mayor a cero"));
    }
    let breakdown = app_state.job_service.commission_rate().breakdown(query.price);

    Ok(Json(ApiResponse::success("Comisión calculada", breakdown)))
}

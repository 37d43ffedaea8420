// handler/profile.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::profiledb::ProfileExt,
    dtos::jobdtos::ApiResponse,
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddeware,
    models::usermodel::{Profile, VerificationStatus},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SyncProfileDto {
    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub full_name: String,

    #[validate(length(max = 40))]
    pub phone: Option<String>,

    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerificationDto {
    pub verification_status: VerificationStatus,
}

pub fn profile_handler() -> Router {
    Router::new()
        .route("/profile/me", get(get_my_profile).put(sync_my_profile))
        .route("/profiles/:user_id/verification", put(set_verification_status))
}

pub async fn get_my_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = app_state
        .store
        .get_profile(auth.actor.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Perfil no encontrado"))?;

    Ok(Json(ApiResponse::success("Perfil obtenido", profile)))
}

/// Mirrors name and contact data from the identity provider. Role comes from
/// the token and verification status is left untouched.
pub async fn sync_my_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<SyncProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let existing = app_state
        .store
        .get_profile(auth.actor.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let verification_status = existing
        .map(|p| p.verification_status)
        .unwrap_or(VerificationStatus::Pending);

    let profile = app_state
        .store
        .upsert_profile(Profile {
            id: auth.actor.id,
            full_name: body.full_name.trim().to_string(),
            role: auth.actor.role,
            phone: body.phone,
            email: body.email,
            verification_status,
        })
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(ApiResponse::success("Perfil actualizado", profile)))
}

pub async fn set_verification_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<VerificationDto>,
) -> Result<impl IntoResponse, HttpError> {
    if !auth.actor.is_admin() {
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    let mut profile = app_state
        .store
        .get_profile(user_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Perfil no encontrado"))?;

    profile.verification_status = body.verification_status;
    let profile = app_state
        .store
        .upsert_profile(profile)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    tracing::info!(
        user_id = %user_id,
        admin_id = %auth.actor.id,
        status = ?profile.verification_status,
        "verification status updated"
    );

    Ok(Json(ApiResponse::success("Verificación actualizada", profile)))
}

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorMessage, HttpError},
    models::usermodel::Actor,
    utils::token,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct JWTAuthMiddeware {
    pub actor: Actor,
}

pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.to_owned())
        });

    let token = token.ok_or_else(|| {
        HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string())
    })?;

    let actor = token::decode_token(token, app_state.env.jwt_secret.as_bytes()).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())
    })?;

    req.extensions_mut().insert(JWTAuthMiddeware { actor });

    Ok(next.run(req).await)
}

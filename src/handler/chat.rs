// handler/chat.rs
use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use futures::{future, stream, Stream, StreamExt};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{chatdtos::*, jobdtos::ApiResponse},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    service::{chat_service::leak_warning, contact_guard},
    AppState,
};

pub fn chat_handler() -> Router {
    Router::new()
        .route(
            "/jobs/:job_id/messages",
            get(get_messages).post(send_message),
        )
        .route("/jobs/:job_id/messages/stream", get(stream_messages))
        .route("/jobs/:job_id/quote-offers", post(send_quote_offer))
        .route("/messages/:message_id/respond", post(respond_to_quote))
        .route("/chat/guard", post(check_message))
}

pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (message, verdict) = app_state
        .chat_service
        .send_message(auth.actor, job_id, body.receiver_id, body.content)
        .await?;
    let warning = leak_warning(&verdict);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Mensaje enviado",
            SentMessageDto { message, warning },
        )),
    ))
}

pub async fn get_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let messages = app_state
        .chat_service
        .list_messages(auth.actor, job_id, query.with)
        .await?;

    Ok(Json(ApiResponse::success("Mensajes obtenidos", messages)))
}

/// Server-sent events for the caller's conversations on one job. The stream
/// owns the subscription, so a client disconnect releases it.
pub async fn stream_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HttpError> {
    let subscription = app_state.chat_service.subscribe(auth.actor, job_id).await?;

    let events = stream::unfold(subscription, |mut subscription| async move {
        subscription
            .recv()
            .await
            .map(|message| (message, subscription))
    })
    .filter_map(|message| {
        let event = Event::default()
            .event(message.message_type.to_str())
            .json_data(&message);
        future::ready(match event {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!("Dropping chat event {}: {}", message.id, e);
                None
            }
        })
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub async fn send_quote_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<QuoteOfferDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let outcome = app_state
        .chat_service
        .send_quote_offer(
            auth.actor,
            job_id,
            body.price,
            body.description,
            body.estimated_hours,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Presupuesto enviado", outcome)),
    ))
}

pub async fn respond_to_quote(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(message_id): Path<Uuid>,
    Json(body): Json<RespondQuoteDto>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state
        .chat_service
        .respond_to_quote(auth.actor, message_id, body.accept)
        .await?;

    let message = if body.accept {
        "Presupuesto aceptado"
    } else {
        "Presupuesto rechazado"
    };

    Ok(Json(ApiResponse::success(message, outcome)))
}

/// Lets the client warn before a message is even sent.
pub async fn check_message(Json(body): Json<GuardCheckDto>) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let verdict = contact_guard::inspect(&body.content);
    let warning = leak_warning(&verdict);

    Ok(Json(ApiResponse::success(
        "Mensaje analizado",
        GuardCheckResponse { verdict, warning },
    )))
}

//! Message handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::messages::SendMessageCommand;
use crate::infra::http::AppState;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{
    ListQuery, MessagePartPayload, MessageResponse, SendMessageRequest,
};
use crate::infra::http::rooms::parse_room_id;

pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = SendMessageCommand {
        room_id: parse_room_id(&room_id)?,
        user_id: payload.user_id,
        parts: payload
            .parts
            .into_iter()
            .map(MessagePartPayload::into_part)
            .collect(),
    };
    let message = state.messages.send_message(command).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::from_record(&message)),
    ))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window = query.window()?;
    let messages = state
        .messages
        .list_messages(parse_room_id(&room_id)?, window)
        .await?;
    let body: Vec<MessageResponse> = messages.iter().map(MessageResponse::from_record).collect();
    Ok(Json(body))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .messages
        .get_message(parse_room_id(&room_id)?, message_id)
        .await?;
    Ok(Json(MessageResponse::from_record(&message)))
}

//! Room handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bson::oid::ObjectId;

use crate::infra::http::AppState;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{CreateRoomRequest, ListQuery, RoomResponse};

pub(super) fn parse_room_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw)
        .map_err(|_| ApiError::bad_request(format!("`{raw}` is not a valid room id")))
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = state.rooms.create_room(payload.into_command()).await?;
    Ok((StatusCode::CREATED, Json(RoomResponse::from_record(&room))))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let room = state.rooms.get_room(parse_room_id(&room_id)?).await?;
    Ok(Json(RoomResponse::from_record(&room)))
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window = query.window()?;
    let rooms = state.rooms.list_rooms(window).await?;
    let body: Vec<RoomResponse> = rooms.iter().map(RoomResponse::from_record).collect();
    Ok(Json(body))
}

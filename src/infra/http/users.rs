//! User handlers.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::Query as MultiQuery;

use crate::domain::entities::UserRecord;
use crate::infra::http::AppState;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{
    CreateUserRequest, ListQuery, UpdateUserRequest, UserResponse, UsersByIdsQuery,
};

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.create_user(payload.into_command()).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from_record(&user))))
}

pub async fn batch_create_users(
    State(state): State<AppState>,
    Json(payload): Json<Vec<CreateUserRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let commands = payload
        .into_iter()
        .map(CreateUserRequest::into_command)
        .collect();
    let users = state.users.create_users(commands).await?;
    let body: Vec<UserResponse> = users.iter().map(UserResponse::from_record).collect();
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn get_user(Extension(user): Extension<UserRecord>) -> Json<UserResponse> {
    Json(UserResponse::from_record(&user))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window = query.window()?;
    let users = state.users.list_users(window).await?;
    let body: Vec<UserResponse> = users.iter().map(UserResponse::from_record).collect();
    Ok(Json(body))
}

pub async fn list_users_by_ids(
    State(state): State<AppState>,
    MultiQuery(query): MultiQuery<UsersByIdsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.users.list_users_by_ids(&query.id).await?;
    let body: Vec<UserResponse> = users.iter().map(UserResponse::from_record).collect();
    Ok(Json(body))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .update_user(payload.into_command(user_id))
        .await?;
    Ok(Json(UserResponse::from_record(&user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.users.delete_user(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

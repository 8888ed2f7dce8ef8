//! HTTP surface: the route table the original Chatkit-style API declares,
//! with the unimplemented remainder answering `501 Not Implemented`.

pub mod error;
mod messages;
pub mod middleware;
pub mod models;
mod rooms;
mod users;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Router, middleware as axum_middleware};

use crate::application::error::ErrorReport;
use crate::application::messages::MessageService;
use crate::application::repos::StorePing;
use crate::application::rooms::RoomService;
use crate::application::users::UserService;

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub rooms: RoomService,
    pub messages: MessageService,
    pub store: Arc<dyn StorePing>,
}

pub fn build_router(state: AppState) -> Router {
    let user_scoped = Router::new()
        .route(
            "/{user_id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/{user_id}/joined_rooms", get(not_implemented))
        .route("/{user_id}/joinable_rooms", get(not_implemented))
        .route("/{user_id}/join", post(not_implemented))
        .route("/{user_id}/leave", post(not_implemented))
        .route(
            "/{user_id}/roles",
            get(not_implemented)
                .put(not_implemented)
                .delete(not_implemented),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_user,
        ));

    let users_router = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .merge(user_scoped);

    let rooms_router = Router::new()
        .route("/", post(rooms::create_room).get(rooms::list_rooms))
        .route(
            "/{room_id}",
            get(rooms::get_room)
                .put(not_implemented)
                .delete(not_implemented),
        )
        .route("/{room_id}/users/add", put(not_implemented))
        .route("/{room_id}/users/remove", put(not_implemented))
        .route("/{room_id}/typing_indicators", post(not_implemented))
        .route("/{room_id}/attachments", post(not_implemented))
        .route(
            "/{room_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/{room_id}/messages/{message_id}",
            get(messages::get_message)
                .put(not_implemented)
                .delete(not_implemented),
        )
        .route(
            "/{room_id}/files/{file_name}",
            get(not_implemented).delete(not_implemented),
        );

    let roles_router = Router::new()
        .route("/", get(not_implemented).post(not_implemented))
        .route("/{role_name}/scope/{scope_type}", delete(not_implemented))
        .route(
            "/{role_name}/scope/{scope_name}/permissions",
            get(not_implemented).put(not_implemented),
        );

    let cursors_router = Router::new()
        .route(
            "/0/rooms/{room_id}/users/{user_id}",
            get(not_implemented).put(not_implemented),
        )
        .route("/0/rooms/{room_id}", get(not_implemented))
        .route("/0/users/{user_id}", get(not_implemented));

    Router::new()
        .route("/healthz", get(health))
        .route("/api/batch_users", post(users::batch_create_users))
        .route("/api/users_by_ids", get(users::list_users_by_ids))
        .nest("/api/users", users_router)
        .nest("/api/rooms", rooms_router)
        .nest("/api/roles", roles_router)
        .nest("/api/cursors", cursors_router)
        .route("/api/token", post(not_implemented))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn not_implemented() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}

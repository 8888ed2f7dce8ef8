use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::messages::MessageError;
use crate::application::repos::RepoError;
use crate::application::rooms::RoomError;
use crate::application::users::UserError;

pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE_KEY: &str = "duplicate_key";
    pub const STALE_WRITE: &str = "stale_write";
    pub const STORE_UNAVAILABLE: &str = "store_unavailable";
    pub const OPERATION_TIMEOUT: &str = "operation_timeout";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, None)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION_FAILED,
            message,
            None,
        )
    }

    fn from_repo(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::not_found("resource not found"),
            RepoError::Duplicate { id } => Self::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE_KEY,
                "identifier already exists",
                Some(id),
            ),
            RepoError::StaleWrite => Self::new(
                StatusCode::CONFLICT,
                codes::STALE_WRITE,
                "entity changed since it was read",
                None,
            ),
            RepoError::Timeout => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                codes::OPERATION_TIMEOUT,
                "listing exceeded its read deadline",
                None,
            ),
            RepoError::Unavailable(detail) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::STORE_UNAVAILABLE,
                "document store unavailable",
                Some(detail),
            ),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::MissingField(_) => Self::validation(err.to_string()),
            UserError::Repo(err) => Self::from_repo(err),
        }
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::MissingField(_) => Self::validation(err.to_string()),
            RoomError::Repo(err) => Self::from_repo(err),
        }
    }
}

impl From<MessageError> for ApiError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::MissingField(_) | MessageError::EmptyParts => {
                Self::validation(err.to_string())
            }
            MessageError::Repo(err) => Self::from_repo(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.hint.clone().unwrap_or_else(|| self.message.clone());
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Attach a structured report so the logging middleware can emit
        // diagnostics without the client body carrying them.
        ErrorReport::from_message(
            "infra::http",
            self.status,
            format!("{}: {detail}", self.code),
        )
        .attach(&mut response);
        response
    }
}

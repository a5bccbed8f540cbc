use std::collections::BTreeMap;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::{access::DenyReason, users::repo::RepoError};

/// Field name -> messages, rendered as the 400 body.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub type ApiResult<T> = Result<T, ApiError>;

pub const DUPLICATE_USERNAME_MSG: &str = "A user with that username already exists.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input")]
    Validation(FieldErrors),
    #[error("username already taken")]
    DuplicateUser,
    #[error("Authentication credentials were not provided or are invalid.")]
    Unauthenticated,
    #[error("No active account found with the given credentials.")]
    InvalidCredentials,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("Not found.")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateUser => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => ApiError::Unauthenticated,
            DenyReason::NotOwner => ApiError::Forbidden,
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::DuplicateUsername => ApiError::DuplicateUser,
            RepoError::Db(e) => ApiError::Internal(e.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(fields) => (status, Json(fields)).into_response(),
            ApiError::DuplicateUser => {
                (status, Json(json!({ "username": [DUPLICATE_USERNAME_MSG] }))).into_response()
            }
            ApiError::Unauthenticated | ApiError::InvalidCredentials => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "detail": self.to_string() })),
            )
                .into_response(),
            ApiError::Internal(ref e) => {
                error!(error = %e, "internal error");
                (status, Json(json!({ "detail": "Internal server error." }))).into_response()
            }
            _ => (status, Json(json!({ "detail": self.to_string() }))).into_response(),
        }
    }
}

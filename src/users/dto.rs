use axum::{extract::rejection::JsonRejection, Json};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;
use crate::error::{ApiError, ApiResult, FieldErrors};

/// Fields a client may send on create and update.
pub const WRITABLE_FIELDS: [&str; 4] = ["username", "password", "first_name", "last_name"];

pub const NON_FIELD_ERRORS: &str = "non_field_errors";
pub const NOT_A_STRING_MSG: &str = "Not a valid string.";

fn non_field(msg: impl Into<String>) -> ApiError {
    let mut errors = FieldErrors::new();
    errors.insert(NON_FIELD_ERRORS.to_string(), vec![msg.into()]);
    ApiError::Validation(errors)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Decodes a user request body. A missing, malformed or mistyped body
/// becomes a validation error keyed by field where one can be named.
pub fn parse_body<T: DeserializeOwned>(body: Result<Json<Value>, JsonRejection>) -> ApiResult<T> {
    let Json(value) = body.map_err(|rejection| non_field(rejection.body_text()))?;
    let Value::Object(map) = &value else {
        return Err(non_field(format!(
            "Invalid data. Expected a dictionary, but got {}.",
            json_kind(&value)
        )));
    };

    let mut errors = FieldErrors::new();
    for field in WRITABLE_FIELDS {
        match map.get(field) {
            Some(v) if !(v.is_string() || v.is_null()) => {
                errors.insert(field.to_string(), vec![NOT_A_STRING_MSG.to_string()]);
            }
            _ => {}
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    serde_json::from_value(value).map_err(|e| non_field(e.to_string()))
}

/// Body of `POST /users/`. Required fields are optional here so that a
/// missing field is reported per field instead of as a parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Body of `PUT` and `PATCH /users/:id`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// PUT: every writable profile field must be present.
    Full,
    /// PATCH: only present fields change.
    Partial,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            is_superuser: u.is_superuser,
            date_joined: u.date_joined,
        }
    }
}

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{parse_body, PublicUser, UpdateMode},
    services,
};
use crate::{
    access::{authorize, Operation, Principal},
    auth::extractors::MaybeAuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/", post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(put_user).patch(patch_user).delete(delete_user),
        )
}

/// An id that does not parse names no account.
fn user_id(path: Result<Path<Uuid>, PathRejection>) -> ApiResult<Uuid> {
    path.map(|Path(id)| id).map_err(|e| {
        debug!(error = %e, "unparsable user id");
        ApiError::NotFound
    })
}

/// POST /users/
#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, HeaderMap, Json<PublicUser>)> {
    let payload = parse_body(body)?;
    let user = services::create_user(state.users.as_ref(), payload).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/users/{}", user.id).parse() {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(user.into())))
}

#[instrument(skip(state, caller))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<PublicUser>> {
    if state.config.require_auth_for_reads && caller.is_none() {
        return Err(ApiError::Unauthenticated);
    }
    let user = services::get_user(state.users.as_ref(), user_id(path)?).await?;
    Ok(Json(user.into()))
}

/// PUT /users/:id
#[instrument(skip(state, caller, body))]
pub async fn put_user(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<PublicUser>> {
    update(&state, caller, user_id(path)?, body, UpdateMode::Full).await
}

/// PATCH /users/:id
#[instrument(skip(state, caller, body))]
pub async fn patch_user(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<PublicUser>> {
    update(&state, caller, user_id(path)?, body, UpdateMode::Partial).await
}

/// The body is only decoded once the caller has passed the gate.
async fn update(
    state: &AppState,
    caller: Option<Principal>,
    id: Uuid,
    body: Result<Json<Value>, JsonRejection>,
    mode: UpdateMode,
) -> ApiResult<Json<PublicUser>> {
    guard(state, caller, id, Operation::Update).await?;
    let payload = parse_body(body)?;
    let user = services::update_user(state.users.as_ref(), id, payload, mode).await?;
    Ok(Json(user.into()))
}

/// DELETE /users/:id
#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = user_id(path)?;
    guard(&state, caller, id, Operation::Delete).await?;
    services::delete_user(state.users.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Loads the target account and runs it through the access gate.
async fn guard(
    state: &AppState,
    caller: Option<Principal>,
    id: Uuid,
    op: Operation,
) -> ApiResult<()> {
    let target = services::get_user(state.users.as_ref(), id).await?;
    authorize(caller.as_ref(), &target, op)
        .into_result()
        .map_err(|reason| {
            warn!(target_id = %id, caller = ?caller.map(|p| p.id), ?op, ?reason, "access denied");
            ApiError::from(reason)
        })
}

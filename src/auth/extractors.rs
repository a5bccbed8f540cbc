use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{debug, warn};

use super::jwt::JwtKeys;
use crate::{access::Principal, error::ApiError, state::AppState};

/// Resolves the caller from the bearer token, if any.
///
/// A missing, malformed or rejected token yields `None`; the access gate
/// turns that into a 401 for protected operations. Only storage failures
/// reject the request here.
pub struct MaybeAuthUser(pub Option<Principal>);

/// Accepts `Bearer <token>` with any case for the scheme and any whitespace
/// between scheme and token.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || parts.next().is_some() {
        return None;
    }
    Some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            if parts.headers.contains_key(AUTHORIZATION) {
                warn!("malformed Authorization header");
            }
            return Ok(MaybeAuthUser(None));
        };

        let claims = match JwtKeys::from_ref(state).verify(token) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                return Ok(MaybeAuthUser(None));
            }
        };

        let user = state
            .users
            .find_by_id(claims.sub)
            .await
            .context("load token subject")?;
        match user {
            Some(u) => Ok(MaybeAuthUser(Some(Principal::from(&u)))),
            None => {
                debug!(user_id = %claims.sub, "token subject no longer exists");
                Ok(MaybeAuthUser(None))
            }
        }
    }
}

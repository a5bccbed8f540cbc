use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{TokenRequest, TokenResponse},
    jwt::JwtKeys,
};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    users::services,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/token", post(obtain_token))
}

/// POST /auth/token
#[instrument(skip(state, payload))]
pub async fn obtain_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = services::authenticate(state.users.as_ref(), &payload.username, &payload.password)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;

    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: keys.access_ttl.as_secs(),
        user: user.into(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn issued_token_authorizes_owner_patch() {
        let (state, _repo) = AppState::fake_with_config(AppState::test_config());
        let app = build_app(state);

        let (status, created) = post_json(
            &app,
            "/users/",
            json!({ "username": "alice", "password": "wonderland" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, token) = post_json(
            &app,
            "/auth/token",
            json!({ "username": "alice", "password": "wonderland" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(token["token_type"], "Bearer");
        assert_eq!(token["user"]["id"], created["id"]);
        let access = token["access_token"].as_str().unwrap();

        let req = Request::builder()
            .method("PATCH")
            .uri(format!("/users/{}", created["id"].as_str().unwrap()))
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "last_name": "Liddell" }).to_string()))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (state, _repo) = AppState::fake_with_config(AppState::test_config());
        let app = build_app(state);
        post_json(&app, "/users/", json!({ "username": "bob", "password": "right" })).await;

        let (status, body) = post_json(
            &app,
            "/auth/token",
            json!({ "username": "bob", "password": "wrong" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("access_token").is_none());
    }
}

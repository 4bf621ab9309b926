use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::Role,
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest, UpdateUserRequest},
        middleware::{
            admin_only, authorize, authorize_owner, require_auth, CurrentUser, ADMIN_ONLY,
        },
        repo_types::UserChanges,
        services::{check_credentials, hash_password, is_valid_email, register_user},
    },
    error::{AppError, AuthError, StoreError},
    extract::{ApiJson, ApiPath},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login))
}

pub fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/user/me", get(get_me))
        .route("/user", get(list_users).route_layer(middleware::from_fn(admin_only)))
        .route(
            "/user/:id",
            get(get_user)
                .put(update_user)
                .merge(delete(delete_user).route_layer(middleware::from_fn(admin_only))),
        )
        .route_layer(middleware::from_fn_with_state(state.keys.clone(), require_auth))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = register_user(
        &state,
        &payload.name,
        &payload.email,
        payload.password,
        Role::User,
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = check_credentials(&state, &payload.email, payload.password).await?;
    let token = state.keys.issue(user.id, user.role)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        user: user.into(),
        token,
        expires_in: state.keys.ttl().as_secs(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<PublicUser>, AppError> {
    // A valid token for a deleted account is treated like any other bad token.
    let user = state.users.find_by_id(identity.subject).await?.ok_or_else(|| {
        warn!(user_id = %identity.subject, "token subject no longer exists");
        AppError::Auth(AuthError::Invalid)
    })?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    authorize_owner(&identity, id)?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<PublicUser>, AppError> {
    authorize_owner(&identity, id)?;
    if payload.role.is_some() {
        authorize(&identity, ADMIN_ONLY)?;
    }

    let name = payload.name.map(|n| n.trim().to_string());
    if matches!(&name, Some(n) if n.is_empty()) {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    let email = payload.email.map(|e| e.trim().to_string());
    if matches!(&email, Some(e) if !is_valid_email(e)) {
        return Err(AppError::Validation("invalid email".into()));
    }
    let password_hash = match payload.password {
        Some(p) => Some(hash_password(&state, p).await?),
        None => None,
    };

    let changes = UserChanges {
        name,
        email,
        password_hash,
        role: payload.role,
    };
    let user = match state.users.update(id, changes).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AppError::NotFound("user")),
        Err(StoreError::Conflict) => {
            return Err(AppError::Validation("email already registered".into()))
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, by = %identity.subject, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound("user"));
    }
    info!(user_id = %id, by = %identity.subject, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::claims::Role};
    use axum::{
        body::Body,
        http::{header, Request},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register_and_login(app: &Router, email: &str) -> (Uuid, String) {
        let res = send(
            app,
            "POST",
            "/user/register",
            None,
            Some(json!({ "name": "Someone", "email": email, "password": "pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let res = send(
            app,
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": email, "password": "pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (id, body["token"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn register_login_round_trip() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let res = send(
            &app,
            "POST",
            "/user/register",
            None,
            Some(json!({ "name": "A", "email": "a@x.com", "password": "pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let registered = json_body(res).await;
        assert_eq!(registered["email"], "a@x.com");
        assert_eq!(registered["role"], "user");
        assert!(registered.get("password_hash").is_none());

        let res = send(
            &app,
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "wrong" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let wrong_password = json_body(res).await;

        let res = send(
            &app,
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "ghost@x.com", "password": "pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await, wrong_password);

        let res = send(
            &app,
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["expires_in"], 3600);
        let identity = state
            .keys
            .verify(body["token"].as_str().unwrap())
            .expect("token should verify");
        assert_eq!(identity.role, Role::User);
        assert_eq!(identity.subject.to_string(), body["user"]["id"].as_str().unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_bad_request() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let payload = json!({ "name": "A", "email": "a@x.com", "password": "pw" });

        let res = send(&app, "POST", "/user/register", None, Some(payload.clone())).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let res = send(&app, "POST", "/user/register", None, Some(payload)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.users.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_requests_get_json_400() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let res = send(
            &app,
            "POST",
            "/user/register",
            None,
            Some(json!({ "name": "A", "email": "a@x.com" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
        let body = json_body(res).await;
        assert_eq!(body["error"], "request body has missing or mistyped fields");
        assert!(state.users.list().await.unwrap().is_empty());

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/user/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("email=a@x.com&password=pw"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "request body is not valid JSON");

        let token = state.keys.issue(Uuid::new_v4(), Role::Admin).unwrap();
        let res = send(&app, "GET", "/user/not-a-uuid", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "invalid path parameter");
    }

    #[tokio::test]
    async fn me_requires_token() {
        let app = build_app(AppState::fake());
        let res = send(&app, "GET", "/user/me", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let (id, token) = register_and_login(&app, "me@x.com").await;
        let res = send(&app, "GET", "/user/me", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["id"], id.to_string());
    }

    #[tokio::test]
    async fn user_admin_routes_are_gated() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let (alice, alice_token) = register_and_login(&app, "alice@x.com").await;
        let (bob, _) = register_and_login(&app, "bob@x.com").await;
        let admin_token = state.keys.issue(Uuid::new_v4(), Role::Admin).unwrap();

        let res = send(&app, "GET", "/user", Some(&alice_token), None).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let res = send(&app, "GET", "/user", Some(&admin_token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await.as_array().unwrap().len(), 2);

        let res = send(&app, "GET", &format!("/user/{alice}"), Some(&alice_token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = send(&app, "GET", &format!("/user/{bob}"), Some(&alice_token), None).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = send(&app, "DELETE", &format!("/user/{bob}"), Some(&alice_token), None).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let res = send(&app, "DELETE", &format!("/user/{bob}"), Some(&admin_token), None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&app, "DELETE", &format!("/user/{bob}"), Some(&admin_token), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_admin_changes_roles() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let (alice, alice_token) = register_and_login(&app, "alice@x.com").await;
        let uri = format!("/user/{alice}");

        let res = send(&app, "PUT", &uri, Some(&alice_token), Some(json!({ "role": "admin" }))).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = send(&app, "PUT", &uri, Some(&alice_token), Some(json!({ "name": "Alice" }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["name"], "Alice");

        let admin_token = state.keys.issue(Uuid::new_v4(), Role::Admin).unwrap();
        let res = send(&app, "PUT", &uri, Some(&admin_token), Some(json!({ "role": "admin" }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["role"], "admin");
    }

    #[tokio::test]
    async fn password_change_takes_effect() {
        let app = build_app(AppState::fake());
        let (alice, token) = register_and_login(&app, "alice@x.com").await;
        let res = send(
            &app,
            "PUT",
            &format!("/user/{alice}"),
            Some(&token),
            Some(json!({ "password": "new-pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(
            &app,
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "alice@x.com", "password": "pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = send(
            &app,
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "alice@x.com", "password": "new-pw" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}

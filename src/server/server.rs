use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{debug, info};

use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::{
    log_requests, make_catalog_routes, make_playlist_routes, state::*, RequestsLoggingLevel,
    ServerConfig,
};
use crate::cache::CacheStore;
use crate::error::{ServiceError, ServiceResult};
use crate::store::FullStore;
use crate::user::AuthTokenValue;

pub const BUILD_HASH: &str = env!("BUILD_HASH");

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// `{"status":"success","data":...}`
pub(super) fn success_data(status: StatusCode, data: Value) -> Response {
    (status, Json(json!({ "status": "success", "data": data }))).into_response()
}

/// `{"status":"success","message":...}`
pub(super) fn success_message(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "success", "message": message })),
    )
        .into_response()
}

/// Unwraps a JSON body, turning malformed payloads into a 400 envelope.
pub(super) fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> ServiceResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServiceError::invariant(rejection.body_text()))
}

#[derive(Deserialize, Debug)]
struct RegisterBody {
    pub username: String,
    pub password: String,
    pub fullname: String,
}

#[derive(Deserialize)]
struct LoginBody {
    pub username: String,
    pub password: String,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    payload: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = json_payload(payload)?;
    debug!("register() called for {}", body.username);
    let user_id = user_manager.register_user(&body.username, &body.password, &body.fullname)?;
    Ok(success_data(
        StatusCode::CREATED,
        json!({ "userId": user_id }),
    ))
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    payload: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = json_payload(payload)?;
    let auth_token = user_manager.login(&body.username, &body.password)?;

    let cookie_value = HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly",
        COOKIE_SESSION_TOKEN_KEY, auth_token.value.0
    ))
    .context("Auth token is not a valid header value")?;

    let mut response = success_data(
        StatusCode::CREATED,
        json!({ "accessToken": auth_token.value.0 }),
    );
    response
        .headers_mut()
        .insert(header::SET_COOKIE, cookie_value);
    Ok(response)
}

async fn logout(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Result<Response, ServiceError> {
    user_manager.logout(&AuthTokenValue(session.token))?;

    let expired_cookie = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
        .same_site(SameSite::Lax)
        .build();
    let cookie_value = HeaderValue::from_str(&expired_cookie.to_string())
        .context("Expired cookie is not a valid header value")?;

    let mut response = success_message(StatusCode::OK, "Signed out");
    response
        .headers_mut()
        .insert(header::SET_COOKIE, cookie_value);
    Ok(response)
}

pub fn make_app(
    config: ServerConfig,
    store: Arc<dyn FullStore>,
    cache: Arc<dyn CacheStore>,
) -> Router {
    let state = ServerState::new(config.clone(), store, cache, BUILD_HASH.to_string());

    let auth_routes: Router = Router::new()
        .route("/users", post(register))
        .route("/authentications", post(login).delete(logout))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .merge(auth_routes)
        .merge(make_catalog_routes(state.clone()))
        .merge(make_playlist_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    store: Arc<dyn FullStore>,
    cache: Arc<dyn CacheStore>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    frontend_dir_path: Option<String>,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        frontend_dir_path,
    };
    let app = make_app(config, store, cache);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::store::SqliteStore;
    use axum::{body::Body, http::Request};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(dir.path().join("test.db")).unwrap());
        let app = make_app(
            ServerConfig::default(),
            store,
            Arc::new(InMemoryCacheStore::new()),
        );
        (app, dir)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn formats_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(
            format_uptime(Duration::from_secs(86_400 + 3600 * 2 + 60 * 3 + 4)),
            "1d 02:03:04"
        );
    }

    #[tokio::test]
    async fn responds_unauthorized_on_protected_routes() {
        let (app, _dir) = test_app();

        let protected_routes = vec![
            ("DELETE", "/authentications"),
            ("POST", "/albums/album-123/likes"),
            ("POST", "/playlists"),
            ("GET", "/playlists"),
            ("DELETE", "/playlists/playlist-123"),
            ("POST", "/playlists/playlist-123/songs"),
            ("GET", "/playlists/playlist-123/songs"),
            ("DELETE", "/playlists/playlist-123/songs"),
            ("GET", "/playlists/playlist-123/activities"),
            ("POST", "/collaborations"),
            ("DELETE", "/collaborations"),
        ];

        for (method, route) in protected_routes.into_iter() {
            let request = Request::builder()
                .method(method)
                .uri(route)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(
                response.status(),
                StatusCode::UNAUTHORIZED,
                "{} {}",
                method,
                route
            );
        }
    }

    #[tokio::test]
    async fn unknown_bearer_token_is_unauthorized() {
        let (app, _dir) = test_app();
        let request = Request::builder()
            .uri("/playlists")
            .header(header::AUTHORIZATION, "Bearer not-a-real-token")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["status"], "fail");
    }

    #[tokio::test]
    async fn home_reports_stats() {
        let (app, _dir) = test_app();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["uptime"].as_str().unwrap().starts_with("0d"));
        assert_eq!(body["hash"], BUILD_HASH);
    }

    #[tokio::test]
    async fn register_login_and_use_the_token() {
        let (app, _dir) = test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/users",
                json!({"username": "alice", "password": "secret", "fullname": "Alice"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert!(body["data"]["userId"]
            .as_str()
            .unwrap()
            .starts_with("user-"));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/authentications",
                json!({"username": "alice", "password": "secret"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("session_token="));
        let token = body_json(response).await["data"]["accessToken"]
            .as_str()
            .unwrap()
            .to_string();

        let request = Request::builder()
            .uri("/playlists")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["playlists"], json!([]));
    }

    #[tokio::test]
    async fn maps_errors_to_status_codes() {
        let (app, _dir) = test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/albums/album-missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"status": "fail", "message": "Album not found"})
        );

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/albums",
                json!({"name": "Too old", "year": 1200}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/albums", json!({"year": 2000})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["status"], "fail");

        let user = json!({"username": "bob", "password": "pw", "fullname": "Bob"});
        let response = app
            .clone()
            .oneshot(json_request("POST", "/users", user.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = app
            .clone()
            .oneshot(json_request("POST", "/users", user))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(json_request(
                "POST",
                "/authentications",
                json!({"username": "bob", "password": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

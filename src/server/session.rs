use super::state::ServerState;
use crate::ids::UserId;
use crate::user::AuthTokenValue;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use tracing::{debug, error};

#[derive(Debug)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";
const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, PartialEq, Eq)]
pub enum SessionExtractionError {
    MissingCredentials,
    InternalError,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SessionExtractionError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "status": "fail",
                    "message": "Missing or invalid authentication token",
                })),
            )
                .into_response(),
            SessionExtractionError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "internal server error",
                })),
            )
                .into_response(),
        }
    }
}

async fn extract_session_token_from_cookies(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Option<String> {
    // CookieJar extraction is infallible.
    let jar = match CookieJar::from_request_parts(parts, ctx).await {
        Ok(jar) => jar,
        Err(never) => match never {},
    };
    jar.get(COOKIE_SESSION_TOKEN_KEY)
        .map(Cookie::value)
        .filter(|value| !value.is_empty())
        .map(|s| s.to_string())
}

fn extract_session_token_from_headers(parts: &Parts) -> Option<String> {
    let raw = parts.headers.get(HEADER_SESSION_TOKEN_KEY)?.to_str().ok()?;
    let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

async fn extract_session_from_request_parts(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Result<Option<Session>, SessionExtractionError> {
    let token = match extract_session_token_from_cookies(parts, ctx)
        .await
        .or_else(|| extract_session_token_from_headers(parts))
    {
        None => {
            debug!("No token in cookies nor headers.");
            return Ok(None);
        }
        Some(x) => x,
    };

    let auth_token_value = AuthTokenValue(token);
    let auth_token = match ctx.user_manager.get_auth_token(&auth_token_value) {
        Ok(Some(token)) => {
            debug!("Found auth token for user_id={}", token.user_id);
            if let Err(e) = ctx
                .user_manager
                .update_auth_token_last_used(&auth_token_value)
            {
                debug!("Failed to update auth token last_used timestamp: {}", e);
            }
            token
        }
        Ok(None) => {
            debug!("Auth token not found in database");
            return Ok(None);
        }
        Err(e) => {
            error!("Failed to get auth token from database: {:#}", e);
            return Err(SessionExtractionError::InternalError);
        }
    };

    Ok(Some(Session {
        user_id: auth_token.user_id,
        token: auth_token.value.0,
    }))
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx)
            .await?
            .ok_or(SessionExtractionError::MissingCredentials)
    }
}

use super::api_error::ApiError;
use super::state::ServerState;
use crate::library_store::{wall_clock_nanos, UserId};
use crate::user::AuthTokenValue;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error};

#[derive(Debug)]
pub struct Session {
    pub user_id: UserId,
    pub token: AuthTokenValue,
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

fn extract_session_token_from_cookies(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(|c| c.value().to_string())
}

/// Accepts both `Bearer <token>` and a bare token.
fn extract_session_token_from_headers(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(HEADER_SESSION_TOKEN_KEY)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

async fn extract_session_from_request_parts(
    parts: &Parts,
    ctx: &ServerState,
) -> Result<Session, ApiError> {
    let token = extract_session_token_from_headers(parts)
        .or_else(|| extract_session_token_from_cookies(parts))
        .ok_or_else(|| {
            debug!("No token in headers nor cookies.");
            ApiError::invalid_token()
        })?;

    let value = AuthTokenValue(token);
    let auth_token = match ctx.store.read_auth_token(&value) {
        Ok(Some(token)) => token,
        Ok(None) => {
            debug!("Auth token not found in database");
            return Err(ApiError::invalid_token());
        }
        Err(err) => {
            error!("Failed to read auth token: {}", err);
            return Err(ApiError::internal());
        }
    };

    if auth_token.is_expired(wall_clock_nanos(), ctx.config.token_ttl_nanos()) {
        debug!("Auth token of user {} expired", auth_token.user_id);
        if let Err(err) = ctx.store.delete_auth_token(&value) {
            debug!("Failed to drop expired token: {}", err);
        }
        return Err(ApiError::invalid_token());
    }

    Ok(Session {
        user_id: auth_token.user_id,
        token: auth_token.value,
    })
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx).await
    }
}

impl OptionalFromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(extract_session_from_request_parts(parts, ctx).await.ok())
    }
}

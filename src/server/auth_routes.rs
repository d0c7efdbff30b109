use super::api_error::{ApiError, ApiJson};
use super::metrics::record_login_attempt;
use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::state::ServerState;
use crate::library_store::UserId;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Deserialize, Serialize)]
pub struct LoginBody {
    pub user_name: String,
    pub password: String,
}

impl std::fmt::Debug for LoginBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginBody")
            .field("user_name", &self.user_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: UserId,
    /// Seconds.
    pub expires_in: u64,
}

fn session_cookie(value: &str, max_age_sec: u64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        COOKIE_SESSION_TOKEN_KEY, value, max_age_sec
    ))
    .ok()
}

async fn post_token(
    State(state): State<ServerState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Response, ApiError> {
    debug!("post_token() called with {:?}", body);
    let start = Instant::now();

    let user = match state.store.authenticate(&body.user_name, &body.password) {
        Ok(Some(user)) => user,
        Ok(None) => {
            record_login_attempt("failure", start.elapsed());
            info!("Failed login for '{}'", body.user_name);
            return Err(ApiError::invalid_credentials());
        }
        Err(err) => {
            record_login_attempt("error", start.elapsed());
            return Err(err.into());
        }
    };

    let token = state.store.add_auth_token(&user.id).map_err(|err| {
        error!("Error with auth token generation: {}", err);
        ApiError::from(err)
    })?;
    record_login_attempt("success", start.elapsed());

    let body = TokenResponse {
        access_token: token.value.0.clone(),
        token_type: "bearer".to_string(),
        user_id: user.id,
        expires_in: state.config.token_ttl_sec,
    };
    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    if let Some(cookie) = session_cookie(&token.value.0, state.config.token_ttl_sec) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

async fn delete_token(
    State(state): State<ServerState>,
    session: Session,
) -> Result<Response, ApiError> {
    state.store.delete_auth_token(&session.token)?;
    debug!("User {} logged out", session.user_id);

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Some(cookie) = session_cookie("", 0) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

pub fn make_auth_routes(state: ServerState) -> Router {
    Router::new()
        .route("/token", post(post_token).delete(delete_token))
        .with_state(state)
}

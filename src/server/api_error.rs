use crate::library_store::StoreError;
use crate::server::metrics::record_error;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    NotFound,
    Validation,
    InvalidToken,
    InvalidCredentials,
    Internal,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::Validation => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidToken | ApiErrorCode::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::NotFound => "not_found",
            ApiErrorCode::Validation => "validation",
            ApiErrorCode::InvalidToken => "invalid_token",
            ApiErrorCode::InvalidCredentials => "invalid_credentials",
            ApiErrorCode::Internal => "internal",
        }
    }
}

/// The JSON body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error_code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(error_code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            error_code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Validation, message)
    }

    pub fn invalid_token() -> Self {
        Self::new(ApiErrorCode::InvalidToken, "missing, expired or revoked token")
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ApiErrorCode::InvalidCredentials, "wrong user name or password")
    }

    pub fn internal() -> Self {
        Self::new(ApiErrorCode::Internal, "internal server error")
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::new(ApiErrorCode::NotFound, err.to_string()),
            StoreError::Validation(message) => ApiError::validation(message),
            StoreError::Sqlite(_) | StoreError::Other(_) => {
                error!("Store failure: {:#}", err);
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        record_error(self.error_code.as_str());
        (self.error_code.status(), Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
pub type ApiCreated<T> = Result<(StatusCode, Json<T>), ApiError>;

/// `axum::Json` whose rejections come out as validation errors.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

/// `axum::extract::Query` whose rejections come out as validation errors.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library_store::EntityKind;

    #[test]
    fn store_errors_map_to_codes() {
        let not_found: ApiError = StoreError::not_found(EntityKind::Song, "abc").into();
        assert_eq!(not_found.error_code, ApiErrorCode::NotFound);
        assert_eq!(not_found.error_code.status(), StatusCode::NOT_FOUND);

        let validation: ApiError = StoreError::validation("bad ref").into();
        assert_eq!(validation, ApiError::validation("bad ref"));

        let internal: ApiError = StoreError::Other(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(internal.error_code, ApiErrorCode::Internal);
        assert!(!internal.message.contains("disk"));
    }

    #[test]
    fn codes_serialize_snake_case() {
        let body = serde_json::to_value(ApiError::invalid_token()).unwrap();
        assert_eq!(body["error_code"], "invalid_token");
        assert_eq!(
            serde_json::to_value(ApiErrorCode::InvalidCredentials).unwrap(),
            "invalid_credentials"
        );
    }
}

//! Request logging middleware

use crate::server::metrics::record_http_request;
use axum::extract::{MatchedPath, State};
use axum::{body::Body, http::Request, middleware::Next, response::IntoResponse};
use std::time::Instant;
use tracing::info;

#[derive(PartialEq, PartialOrd, Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const UNMATCHED_PATH: &str = "unmatched";

pub async fn log_requests(
    State(level): State<RequestsLoggingLevel>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let start = Instant::now();

    let method = request.method().to_string();
    let uri = request.uri().to_string();
    // route templates keep the metrics label cardinality bounded
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, uri);
    }

    if level >= RequestsLoggingLevel::Headers {
        info!("  Req Headers:");
        for (name, value) in request.headers().iter() {
            if name == axum::http::header::AUTHORIZATION || name == axum::http::header::COOKIE {
                info!("    {:?}: <redacted>", name);
            } else {
                info!("    {:?}: {:?}", name, value);
            }
        }
    }

    let response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        info!("  Resp Headers:");
        for (name, value) in response.headers().iter() {
            if name == axum::http::header::SET_COOKIE {
                info!("    {:?}: <redacted>", name);
            } else {
                info!("    {:?}: {:?}", name, value);
            }
        }
    }

    let status = response.status().as_u16();
    let duration = start.elapsed();

    if level > RequestsLoggingLevel::None {
        info!("<<< {} ({}ms)", status, duration.as_millis());
    }

    record_http_request(&method, &route, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::RequestsLoggingLevel;
    use clap::ValueEnum;

    #[test]
    fn level_ordering() {
        let none = RequestsLoggingLevel::None;

        assert!(none < RequestsLoggingLevel::Headers);
        assert!(RequestsLoggingLevel::Path > RequestsLoggingLevel::None);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            RequestsLoggingLevel::from_str("HEADERS", true).unwrap(),
            RequestsLoggingLevel::Headers
        );
        assert!(RequestsLoggingLevel::from_str("body", true).is_err());
    }
}

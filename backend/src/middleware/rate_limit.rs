use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorError,
    GovernorLayer,
};

use crate::config::Config;
use crate::error::{ErrorResponse, FieldErrors};

pub type AuthRateLimiter = GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware, Body>;

/// Per-IP limiter for the unauthenticated auth endpoints: a burst of
/// `RATE_LIMIT_AUTH_MAX_REQUESTS`, refilled evenly over the window.
pub fn create_auth_rate_limiter(config: &Config) -> anyhow::Result<AuthRateLimiter> {
    let burst_size = config.rate_limit_auth_max_requests.max(1);
    let window = Duration::from_secs(config.rate_limit_auth_window_seconds.max(1));
    let period = (window / burst_size).max(Duration::from_millis(1));

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .period(period)
            .burst_size(burst_size)
            .key_extractor(PeerIpKeyExtractor)
            .use_headers()
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    Ok(GovernorLayer::new(governor_conf).error_handler(rate_limit_error_handler))
}

fn rate_limit_error_handler(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::warn!(wait_time, "Rate limit exceeded");
            let mut response = json_error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
                Some(wait_time),
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unable to determine request identity.",
            None,
        ),
        GovernorError::Other { code, msg, headers } => {
            let mut response = json_error_response(
                code,
                &msg.unwrap_or_else(|| "Rate limit error".to_string()),
                None,
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
    }
}

fn json_error_response(
    status: StatusCode,
    message: &str,
    retry_after: Option<u64>,
) -> Response<Body> {
    let body = ErrorResponse {
        success: false,
        errors: FieldErrors::single("auth", message),
    };
    let body = serde_json::to_vec(&body).unwrap_or_default();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(retry_after) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert("retry-after", value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn config(max_requests: u32, window_seconds: u64) -> Config {
        let mut config = Config::default();
        config.rate_limit_auth_max_requests = max_requests;
        config.rate_limit_auth_window_seconds = window_seconds;
        config
    }

    #[test]
    fn create_auth_rate_limiter_uses_config_values() {
        assert!(create_auth_rate_limiter(&config(10, 60)).is_ok());
    }

    #[test]
    fn create_auth_rate_limiter_handles_zero_values() {
        assert!(create_auth_rate_limiter(&config(0, 0)).is_ok());
    }

    #[tokio::test]
    async fn too_many_requests_uses_error_envelope() {
        let response = rate_limit_error_handler(GovernorError::TooManyRequests {
            wait_time: 5,
            headers: None,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get("retry-after").and_then(|v| v.to_str().ok()),
            Some("5")
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(
            json["errors"]["auth"][0],
            "Too many requests. Please try again later."
        );
    }

    #[test]
    fn unable_to_extract_key_is_internal_error() {
        let response = rate_limit_error_handler(GovernorError::UnableToExtractKey);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(CONTENT_TYPE).is_some());
    }

    #[test]
    fn other_error_keeps_status_and_headers() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-custom", HeaderValue::from_static("value"));

        let response = rate_limit_error_handler(GovernorError::Other {
            code: StatusCode::BAD_REQUEST,
            msg: Some("error with headers".to_string()),
            headers: Some(headers),
        });
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("x-custom").is_some());
    }
}

use std::env;

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use crate::core::errors::ApiError;

/// Static bearer token gating the bulk run endpoint.
#[derive(Debug, Clone)]
pub struct ApiToken {
    value: String,
}

impl ApiToken {
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Resolves the bulk-endpoint token: env var, then config, then a generated
/// one-off token that is logged so local callers can pick it up.
pub fn init_api_token(configured: Option<String>) -> ApiToken {
    if let Ok(token) = env::var("POLICYQUERY_API_TOKEN") {
        if !token.trim().is_empty() {
            return ApiToken { value: token };
        }
    }

    if let Some(token) = configured {
        if !token.trim().is_empty() {
            return ApiToken { value: token };
        }
    }

    let token = Uuid::new_v4().to_string();
    tracing::warn!(
        "No API token configured; generated one for this process: {}",
        token
    );
    ApiToken { value: token }
}

/// Validates an `Authorization: Bearer <token>` header against the expected
/// token. Missing header is unauthorized; a malformed header or a wrong token
/// is forbidden.
pub fn require_bearer(headers: &HeaderMap, expected: &ApiToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    let mut parts = header_value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && token == expected.value() =>
        {
            Ok(())
        }
        _ => Err(ApiError::Forbidden),
    }
}

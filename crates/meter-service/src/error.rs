//! API error type and its HTTP rendering.
//!
//! The wire shape is a flat `{error, details?}` body for every rejected
//! request, not a nested `{error:{code,message}}` — the billing service is
//! free to invent its own schema, but this proxy's contract with its own
//! clients is fixed and must not drift from it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors surfaced to the HTTP layer, one variant per rejected-request kind.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// `x-api-key` header absent or not a string.
    #[error("Missing x-api-key header")]
    MissingCredential,

    /// Credential present but failed verification (bad signature, expired,
    /// malformed, or missing user-identifier claim).
    #[error("Invalid or expired token")]
    InvalidCredential(String),

    /// Credential verified but the caller's balance does not permit the
    /// request.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// The billing service could not be reached and no stale-within-grace
    /// snapshot was available.
    #[error("Billing service unavailable")]
    BillingUnavailable,

    /// The upstream Anthropic API could not be reached.
    #[error("Failed to reach Anthropic API")]
    UpstreamUnreachable,

    /// Any other internal failure; not part of the documented external
    /// interface but kept as a catch-all so a handler bug degrades to a 500
    /// response instead of panicking the task.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            Self::MissingCredential => (StatusCode::UNAUTHORIZED, None),
            Self::InvalidCredential(details) => (StatusCode::UNAUTHORIZED, Some(details.clone())),
            Self::InsufficientBalance => (StatusCode::PAYMENT_REQUIRED, None),
            Self::BillingUnavailable => (StatusCode::SERVICE_UNAVAILABLE, None),
            Self::UpstreamUnreachable => (StatusCode::BAD_GATEWAY, None),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let error = match &self {
            Self::Internal(_) => "internal error".to_string(),
            Self::InvalidCredential(_) => "Invalid or expired token".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error, details })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_credential_matches_spec_message() {
        let resp = ApiError::MissingCredential.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let value = body_json(resp).await;
        assert_eq!(value["error"], "Missing x-api-key header");
        assert!(value.get("details").is_none());
    }

    #[tokio::test]
    async fn invalid_credential_carries_details() {
        let resp = ApiError::InvalidCredential("signature mismatch".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let value = body_json(resp).await;
        assert_eq!(value["error"], "Invalid or expired token");
        assert_eq!(value["details"], "signature mismatch");
    }

    #[tokio::test]
    async fn insufficient_balance_is_402() {
        let resp = ApiError::InsufficientBalance.into_response();
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn billing_unavailable_is_503() {
        let resp = ApiError::BillingUnavailable.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn upstream_unreachable_is_502() {
        let resp = ApiError::UpstreamUnreachable.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}

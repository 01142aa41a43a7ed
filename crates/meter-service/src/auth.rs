//! Bearer-credential verification and the `Principal` extractor (C2).

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use meter_core::Principal;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

/// Verify `credential` against `secret` and extract the principal.
///
/// Accepts the user identifier from whichever of `userId`, `sub`, `id` is
/// present first in the decoded claim set.
pub fn verify(credential: &str, secret: &str) -> Result<Principal, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Value>(credential, &decoding_key, &validation).map_err(|err| {
        tracing::debug!(error = %err, "credential verification failed");
        ApiError::InvalidCredential(err.to_string())
    })?;

    let user_id = Principal::user_id_from_claims(&token_data.claims)
        .ok_or_else(|| ApiError::InvalidCredential("token carries no user identifier claim".to_string()))?;

    Ok(Principal::new(user_id, token_data.claims))
}

/// The authenticated caller, extracted from the `x-api-key` header.
///
/// The header carries the bearer credential directly (not an `Authorization:
/// Bearer` prefix); the same string is later forwarded to the billing
/// service unchanged.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub principal: Principal,
    pub credential: String,
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::MissingCredential)?
            .to_string();

        let principal = verify(&credential, &state.config.jwt_secret)?;

        Ok(Self { principal, credential })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token_with_claims(claims: &Value, secret: &str) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn verifies_valid_token_and_extracts_user_id() {
        let secret = "top-secret";
        let claims = json!({ "userId": "user-123", "exp": 9_999_999_999i64 });
        let token = token_with_claims(&claims, secret);

        let principal = verify(&token, secret).unwrap();
        assert_eq!(principal.user_id, "user-123");
    }

    #[test]
    fn falls_back_to_sub_claim() {
        let secret = "top-secret";
        let claims = json!({ "sub": "user-456", "exp": 9_999_999_999i64 });
        let token = token_with_claims(&claims, secret);

        let principal = verify(&token, secret).unwrap();
        assert_eq!(principal.user_id, "user-456");
    }

    #[test]
    fn rejects_token_missing_user_identifier() {
        let secret = "top-secret";
        let claims = json!({ "aud": "proxy", "exp": 9_999_999_999i64 });
        let token = token_with_claims(&claims, secret);

        assert!(matches!(verify(&token, secret), Err(ApiError::InvalidCredential(_))));
    }

    #[test]
    fn rejects_token_signed_with_wrong_secret() {
        let claims = json!({ "userId": "user-123", "exp": 9_999_999_999i64 });
        let token = token_with_claims(&claims, "secret-a");

        assert!(matches!(verify(&token, "secret-b"), Err(ApiError::InvalidCredential(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let secret = "top-secret";
        let claims = json!({ "userId": "user-123", "exp": 1_000_000_000i64 });
        let token = token_with_claims(&claims, secret);

        assert!(matches!(verify(&token, secret), Err(ApiError::InvalidCredential(_))));
    }
}

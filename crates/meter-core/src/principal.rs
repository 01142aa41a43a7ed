//! The authenticated caller identity attached to a request after C2 verifies
//! its bearer credential.

use serde_json::Value;

/// Identity extracted from a verified JWT.
///
/// `user_id` is read from the `userId`, `sub`, or `id` claim, in that order
/// (first one present wins); `claims` retains the full decoded claim set for
/// handlers that need more than the user id.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: String,
    pub claims: Value,
}

impl Principal {
    #[must_use]
    pub fn new(user_id: impl Into<String>, claims: Value) -> Self {
        Self { user_id: user_id.into(), claims }
    }

    /// Extract `user_id` from a decoded claim set using the `userId` / `sub`
    /// / `id` fallback order.
    #[must_use]
    pub fn user_id_from_claims(claims: &Value) -> Option<String> {
        for key in ["userId", "sub", "id"] {
            if let Some(value) = claims.get(key).and_then(Value::as_str) {
                return Some(value.to_string());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_user_id_claim_over_sub() {
        let claims = json!({ "userId": "u-1", "sub": "u-2" });
        assert_eq!(Principal::user_id_from_claims(&claims).as_deref(), Some("u-1"));
    }

    #[test]
    fn falls_back_to_sub_then_id() {
        let claims = json!({ "sub": "u-2" });
        assert_eq!(Principal::user_id_from_claims(&claims).as_deref(), Some("u-2"));

        let claims = json!({ "id": "u-3" });
        assert_eq!(Principal::user_id_from_claims(&claims).as_deref(), Some("u-3"));
    }

    #[test]
    fn missing_claims_yields_none() {
        let claims = json!({ "aud": "proxy" });
        assert_eq!(Principal::user_id_from_claims(&claims), None);
    }
}

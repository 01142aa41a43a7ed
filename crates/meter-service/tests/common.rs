//! Shared test harness for meter-service integration tests.
//!
//! Both the billing service and the upstream Anthropic API are stood in for
//! by `wiremock` servers — `meter_service::Config::anthropic_api_base_url`
//! exists specifically so tests can point the proxy at one instead of the
//! public internet.

#![allow(dead_code)]

use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use wiremock::MockServer;

use meter_service::{create_router, AppState, Config};

pub const JWT_SECRET: &str = "integration-test-secret";

pub struct TestHarness {
    pub server: TestServer,
    pub billing: MockServer,
    pub anthropic: MockServer,
}

impl TestHarness {
    pub async fn new() -> Self {
        let billing = MockServer::start().await;
        let anthropic = MockServer::start().await;

        let config = Config {
            port: 0,
            anthropic_api_key: "sk-ant-shared-key".to_string(),
            anthropic_api_base_url: anthropic.uri(),
            jwt_secret: JWT_SECRET.to_string(),
            domestic_api_url: billing.uri(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 5,
        };

        let state = AppState::new(config);
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("failed to start test server");

        Self { server, billing, anthropic }
    }

    /// A bearer credential for `user_id`, signed with [`JWT_SECRET`].
    pub fn token_for(&self, user_id: &str) -> String {
        let claims = json!({ "userId": user_id, "exp": 9_999_999_999i64 });
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
    }
}

//! HTTP client for the external billing service.
//!
//! Handles the two billing-service calls the proxy makes: fetching a user's
//! current balance (used to populate the balance cache, C3) and posting a
//! completed usage report (C5). Both calls forward the caller's own bearer
//! credential; the proxy never mints or downgrades it.

use std::time::Duration;

use meter_core::{BalanceSnapshot, UsageReport};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Errors returned by the billing-service client.
#[derive(Debug, thiserror::Error)]
pub enum BillingClientError {
    /// The HTTP request itself failed (connection, TLS, timeout).
    #[error("billing request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The billing service responded with a non-success status.
    #[error("billing service returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Default, Deserialize)]
struct BalanceResponse {
    #[serde(default)]
    balance: f64,
    #[serde(default, rename = "freeTokens")]
    free_tokens: f64,
    #[serde(default, rename = "claudeBalance")]
    claude_balance: f64,
}

/// The exact wire shape of a usage-report POST body. `UsageReport` itself
/// carries `user_id` for internal bookkeeping (the retry queue, logging), but
/// the billing service identifies the caller from the forwarded bearer
/// credential, not from the payload, so `user_id` is deliberately left out
/// here.
#[derive(Debug, Serialize)]
struct UsagePayload<'a> {
    model: &'a str,
    provider: &'a str,
    #[serde(rename = "inputTokens")]
    input_tokens: u64,
    #[serde(rename = "outputTokens")]
    output_tokens: u64,
    #[serde(rename = "cacheReadTokens")]
    cache_read_tokens: u64,
    #[serde(rename = "cacheWriteTokens")]
    cache_creation_tokens: u64,
    #[serde(rename = "totalTokens")]
    total_tokens: u64,
    cost: f64,
    currency: &'a str,
}

impl<'a> From<&'a UsageReport> for UsagePayload<'a> {
    fn from(report: &'a UsageReport) -> Self {
        Self {
            model: &report.model,
            provider: &report.provider,
            input_tokens: report.input_tokens,
            output_tokens: report.output_tokens,
            cache_read_tokens: report.cache_read_tokens,
            cache_creation_tokens: report.cache_creation_tokens,
            total_tokens: report.total_tokens,
            cost: report.cost,
            currency: &report.currency,
        }
    }
}

/// Client for the external billing service.
#[derive(Debug, Clone)]
pub struct BillingClient {
    client: Client,
    base_url: String,
}

impl BillingClient {
    /// Build a client with a bounded per-request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest` client cannot be built, which only
    /// happens if the TLS backend fails to initialize.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().expect("failed to build HTTP client");

        Self { client, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    /// Fetch the current balance for `user_id`, authenticating with the
    /// caller's own credential. Does not itself attach an expiry; callers
    /// set one based on the configured cache TTL.
    pub async fn get_balance(
        &self,
        credential: &str,
        now: std::time::Instant,
        ttl: Duration,
    ) -> Result<BalanceSnapshot, BillingClientError> {
        let url = format!("{}/api/billing/balance", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {credential}"))
            .header("Content-Type", "application/json")
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingClientError::Api { status: status.as_u16(), body });
        }

        let parsed: BalanceResponse = response.json().await.unwrap_or_default();

        Ok(BalanceSnapshot::new(parsed.balance, parsed.free_tokens, parsed.claude_balance, now + ttl))
    }

    /// Post a completed usage report, authenticating with the caller's own
    /// credential. Idempotency is not assumed: the retry queue (C5) only
    /// retries reports that never got an HTTP response, never ones the
    /// billing service acknowledged with an error.
    pub async fn report_usage(&self, credential: &str, report: &UsageReport) -> Result<(), BillingClientError> {
        let url = format!("{}/api/billing/usage", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {credential}"))
            .header("Content-Type", "application/json")
            .json(&UsagePayload::from(report))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingClientError::Api { status: status.as_u16(), body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_core::UsageTokens;

    #[test]
    fn usage_payload_omits_user_id() {
        let usage = UsageTokens { input_tokens: 500, output_tokens: 150, cache_read_tokens: 100, cache_creation_tokens: 0 };
        let report = UsageReport::new("user-1", "claude-sonnet-4-6", usage, 0.003_78);

        let value = serde_json::to_value(UsagePayload::from(&report)).unwrap();

        assert!(value.get("userId").is_none());
        assert_eq!(value["model"], "claude-sonnet-4-6");
        assert_eq!(value["totalTokens"], 750);
        assert_eq!(value["currency"], "USD");
    }
}

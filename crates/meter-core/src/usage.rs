//! Token-usage counters and the usage report posted back to the billing
//! service (C4 / C5 data shapes).

use serde::{Deserialize, Serialize};

/// Token counters extracted from a single Messages API response, streaming or
/// not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTokens {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl UsageTokens {
    /// Sum of all four counters.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_creation_tokens
    }
}

/// The usage report posted to the billing service after a metered request
/// completes (C5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageReport {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub model: String,
    pub provider: String,
    #[serde(rename = "inputTokens")]
    pub input_tokens: u64,
    #[serde(rename = "outputTokens")]
    pub output_tokens: u64,
    #[serde(rename = "cacheReadTokens")]
    pub cache_read_tokens: u64,
    #[serde(rename = "cacheWriteTokens")]
    pub cache_creation_tokens: u64,
    #[serde(rename = "totalTokens")]
    pub total_tokens: u64,
    pub cost: f64,
    pub currency: String,
}

impl UsageReport {
    /// Build a report from observed usage and its computed USD cost.
    #[must_use]
    pub fn new(user_id: impl Into<String>, model: impl Into<String>, usage: UsageTokens, cost: f64) -> Self {
        Self {
            user_id: user_id.into(),
            model: model.into(),
            provider: "anthropic".to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_read_tokens: usage.cache_read_tokens,
            cache_creation_tokens: usage.cache_creation_tokens,
            total_tokens: usage.total(),
            cost,
            currency: "USD".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_all_four_counters() {
        let usage = UsageTokens { input_tokens: 10, output_tokens: 5, cache_read_tokens: 2, cache_creation_tokens: 1 };
        assert_eq!(usage.total(), 18);
    }

    #[test]
    fn report_serializes_with_expected_field_names() {
        let usage = UsageTokens { input_tokens: 500, output_tokens: 150, cache_read_tokens: 100, cache_creation_tokens: 0 };
        let report = UsageReport::new("user-1", "claude-sonnet-4-6", usage, 0.003_78);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["totalTokens"], 750);
        assert_eq!(value["cacheWriteTokens"], 0);
        assert_eq!(value["currency"], "USD");
    }
}

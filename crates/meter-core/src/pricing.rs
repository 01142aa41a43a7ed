//! Pricing table for the Anthropic Messages API (C1).
//!
//! Maps a model id to its per-million-token USD prices and computes the cost
//! of a completed request from observed token usage.

use std::collections::HashMap;

use crate::usage::UsageTokens;

/// Per-million-token USD pricing for a single model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// USD per 1,000,000 input tokens.
    pub input: f64,
    /// USD per 1,000,000 output tokens.
    pub output: f64,
    /// USD per 1,000,000 cache-read tokens.
    pub cache_read: f64,
    /// USD per 1,000,000 cache-write (cache-creation) tokens.
    pub cache_write: f64,
}

/// Static model-id -> `ModelPricing` table with a default fallback row.
///
/// Lookup is an exact match on the model id; unknown ids resolve to
/// [`PricingTable::default_pricing`].
#[derive(Debug, Clone)]
pub struct PricingTable {
    rows: HashMap<String, ModelPricing>,
    default_row: ModelPricing,
}

impl PricingTable {
    /// Cost of one million tokens for each price point. Divided back out in
    /// [`PricingTable::cost`].
    const PER_MILLION: f64 = 1_000_000.0;

    /// Look up the pricing row for `model`, falling back to the default row.
    #[must_use]
    pub fn pricing_for(&self, model: &str) -> ModelPricing {
        self.rows.get(model).copied().unwrap_or(self.default_row)
    }

    /// Compute the USD cost of `usage` at `model`'s price point.
    ///
    /// `cost = (input*input_price + output*output_price +
    /// cache_read*cache_read_price + cache_creation*cache_write_price) /
    /// 1_000_000`. The result is a non-negative real number; compare with a
    /// tolerance, not exact equality (floating point).
    #[must_use]
    pub fn cost(&self, model: &str, usage: &UsageTokens) -> f64 {
        let pricing = self.pricing_for(model);

        let input_cost = usage.input_tokens as f64 * pricing.input;
        let output_cost = usage.output_tokens as f64 * pricing.output;
        let cache_read_cost = usage.cache_read_tokens as f64 * pricing.cache_read;
        let cache_write_cost = usage.cache_creation_tokens as f64 * pricing.cache_write;

        (input_cost + output_cost + cache_read_cost + cache_write_cost) / Self::PER_MILLION
    }

    /// Insert or replace the pricing row for `model`.
    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.rows.insert(model.into(), pricing);
    }

    /// The fallback row used for unknown model ids.
    #[must_use]
    pub const fn default_pricing(&self) -> ModelPricing {
        self.default_row
    }
}

impl Default for PricingTable {
    /// Seeds the table with the published Anthropic Messages API prices as of
    /// this writing. Prices are USD per million tokens.
    fn default() -> Self {
        let mut rows = HashMap::new();

        rows.insert(
            "claude-opus-4-1".to_string(),
            ModelPricing { input: 15.0, output: 75.0, cache_read: 1.5, cache_write: 18.75 },
        );
        rows.insert(
            "claude-sonnet-4-6".to_string(),
            ModelPricing { input: 3.0, output: 15.0, cache_read: 0.3, cache_write: 3.75 },
        );
        rows.insert(
            "claude-sonnet-4-6-20250514".to_string(),
            ModelPricing { input: 3.0, output: 15.0, cache_read: 0.3, cache_write: 3.75 },
        );
        rows.insert(
            "claude-3-5-haiku-20241022".to_string(),
            ModelPricing { input: 0.8, output: 4.0, cache_read: 0.08, cache_write: 1.0 },
        );

        Self {
            rows,
            default_row: ModelPricing { input: 3.0, output: 15.0, cache_read: 0.3, cache_write: 3.75 },
        }
    }
}

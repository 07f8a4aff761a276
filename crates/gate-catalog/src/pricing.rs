// SPDX-License-Identifier: MIT OR Apache-2.0
//! `PricingCatalog`: per-model token pricing for the budget controller (SPEC_FULL §4.4).

use gate_error::{ClaweeError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// USD price per 1000 tokens, input and output priced independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    /// USD per 1000 input tokens.
    pub input_price_per_1k: f64,
    /// USD per 1000 output tokens.
    pub output_price_per_1k: f64,
}

impl ModelPrice {
    /// `input_tokens/1000 * input_price + output_tokens/1000 * output_price`.
    #[must_use]
    pub fn cost_usd(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_price_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_price_per_1k
    }
}

/// Per-model prices, with an optional `"*"` fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingCatalog {
    /// Prices keyed by exact model id, plus an optional `"*"` entry.
    pub prices: BTreeMap<String, ModelPrice>,
}

impl PricingCatalog {
    /// Looks up the exact model price, falling back to `"*"`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigPricingMissingModel`] if neither an exact
    /// entry nor a `"*"` fallback exists, per SPEC_FULL §4.4 "fail closed".
    pub fn price(&self, model_id: &str) -> Result<ModelPrice, ClaweeError> {
        self.prices
            .get(model_id)
            .or_else(|| self.prices.get("*"))
            .copied()
            .ok_or_else(|| {
                ClaweeError::new(ErrorCode::ConfigPricingMissingModel, "pricing catalog has no entry for model")
                    .with_context("model_id", model_id)
            })
    }

    /// Estimates the USD cost of a request against `model_id`.
    pub fn cost_usd(&self, model_id: &str, input_tokens: u64, output_tokens: u64) -> Result<f64, ClaweeError> {
        Ok(self.price(model_id)?.cost_usd(input_tokens, output_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(input: f64, output: f64) -> ModelPrice {
        ModelPrice { input_price_per_1k: input, output_price_per_1k: output }
    }

    #[test]
    fn cost_usd_scales_by_thousand_tokens() {
        let p = price(1.0, 2.0);
        assert!((p.cost_usd(1000, 1000) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_model_price_wins_over_wildcard() {
        let mut prices = BTreeMap::new();
        prices.insert("*".to_string(), price(1.0, 1.0));
        prices.insert("gpt-x".to_string(), price(2.0, 2.0));
        let catalog = PricingCatalog { prices };
        assert_eq!(catalog.price("gpt-x").unwrap(), price(2.0, 2.0));
    }

    #[test]
    fn falls_back_to_wildcard_when_no_exact_entry() {
        let mut prices = BTreeMap::new();
        prices.insert("*".to_string(), price(1.0, 1.0));
        let catalog = PricingCatalog { prices };
        assert_eq!(catalog.price("unknown").unwrap(), price(1.0, 1.0));
    }

    #[test]
    fn missing_model_and_wildcard_fails_closed() {
        let catalog = PricingCatalog::default();
        let result = catalog.price("unknown");
        assert_eq!(result.unwrap_err().code, ErrorCode::ConfigPricingMissingModel);
    }
}

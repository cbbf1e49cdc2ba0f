//! Cost table keyed by model string (spec §4.6: "per-million-token prices
//! for input / cache-write / cache-read / output").

use crate::provider::Usage;

#[derive(Debug, Clone, Copy)]
pub struct ModelPrices {
    /// USD per million input tokens.
    pub input: f64,
    /// USD per million cache-write tokens.
    pub cache_write: f64,
    /// USD per million cache-read tokens.
    pub cache_read: f64,
    /// USD per million output tokens.
    pub output: f64,
}

/// Looks up per-million-token prices for a model, falling back to the
/// haiku-class table for any unrecognized model string rather than
/// panicking — cost accounting degrades gracefully, it never blocks a call.
pub fn prices_for(model: &str) -> ModelPrices {
    if model.contains("opus") {
        ModelPrices { input: 15.0, cache_write: 18.75, cache_read: 1.5, output: 75.0 }
    } else if model.contains("sonnet") {
        ModelPrices { input: 3.0, cache_write: 3.75, cache_read: 0.3, output: 15.0 }
    } else if model.contains("haiku") {
        ModelPrices { input: 0.8, cache_write: 1.0, cache_read: 0.08, output: 4.0 }
    } else {
        ModelPrices { input: 3.0, cache_write: 3.75, cache_read: 0.3, output: 15.0 }
    }
}

pub fn compute_cost(model: &str, usage: &Usage) -> f64 {
    let p = prices_for(model);
    let million = 1_000_000.0;
    (usage.input_tokens as f64 / million) * p.input
        + (usage.cache_creation_input_tokens as f64 / million) * p.cache_write
        + (usage.cache_read_input_tokens as f64 / million) * p.cache_read
        + (usage.output_tokens as f64 / million) * p.output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haiku_is_cheaper_than_sonnet_per_token() {
        let usage = Usage { input_tokens: 1_000_000, cache_creation_input_tokens: 0, cache_read_input_tokens: 0, output_tokens: 0 };
        assert!(compute_cost("claude-haiku-4-5", &usage) < compute_cost("claude-sonnet-4-5", &usage));
    }

    #[test]
    fn unknown_model_falls_back_to_sonnet_class_pricing() {
        let usage = Usage { input_tokens: 1_000_000, ..Default::default() };
        assert_eq!(compute_cost("some-future-model", &usage), compute_cost("claude-sonnet-4-5", &usage));
    }
}

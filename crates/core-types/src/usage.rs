use serde::{Deserialize, Serialize};

/// Raw token counters lifted from one `assistant` transcript line's
/// `message.usage` block.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_read_tokens
            + self.cache_creation_tokens
    }
}

/// Per-1M-token pricing for one model family, in USD.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub cache_read_per_million: f64,
    pub cache_creation_per_million: f64,
}

impl ModelPricing {
    pub const fn new(
        input_per_million: f64,
        output_per_million: f64,
        cache_read_per_million: f64,
        cache_creation_per_million: f64,
    ) -> Self {
        Self {
            input_per_million,
            output_per_million,
            cache_read_per_million,
            cache_creation_per_million,
        }
    }

    pub fn cost(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 * self.input_per_million
            + usage.output_tokens as f64 * self.output_per_million
            + usage.cache_read_tokens as f64 * self.cache_read_per_million
            + usage.cache_creation_tokens as f64 * self.cache_creation_per_million)
            / 1_000_000.0
    }
}

/// The pricing table from §4.10. `UNKNOWN` is the conservative fallback row
/// used whenever a transcript names a model not listed here.
pub const OPUS_4X: ModelPricing = ModelPricing::new(15.00, 75.00, 1.50, 18.75);
pub const SONNET: ModelPricing = ModelPricing::new(3.00, 15.00, 0.30, 3.75);
pub const HAIKU_35: ModelPricing = ModelPricing::new(0.80, 4.00, 0.08, 1.00);
pub const UNKNOWN: ModelPricing = ModelPricing::new(3.00, 15.00, 0.30, 3.75);

/// Resolve a transcript `model` string to its pricing row, falling back to
/// `UNKNOWN` for anything not recognized.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let m = model.to_ascii_lowercase();
    if m.contains("opus") {
        OPUS_4X
    } else if m.contains("sonnet") {
        SONNET
    } else if m.contains("haiku") {
        HAIKU_35
    } else {
        UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_uses_fallback_and_yields_finite_cost() {
        let pricing = pricing_for_model("some-future-model-9000");
        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 500,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        };
        let cost = pricing.cost(usage);
        assert!(cost.is_finite());
        assert!(cost > 0.0);
    }

    #[test]
    fn opus_is_priced_higher_than_haiku() {
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 0,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        };
        assert!(OPUS_4X.cost(usage) > HAIKU_35.cost(usage));
    }
}

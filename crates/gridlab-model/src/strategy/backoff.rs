use std::time::Duration;

use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

/// Exponential backoff between readiness probes.
///
/// Attempt `n` (0-based) waits `min(first_ms * factor^n, max_ms)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct BackoffStrategy {
    pub first_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            first_ms: 100,
            max_ms: 5_000,
            factor: 2.0,
        }
    }
}

impl BackoffStrategy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = if self.factor.is_finite() && self.factor >= 1.0 {
            self.factor
        } else {
            1.0
        };
        let exp = factor.powi(attempt.min(64) as i32);
        let raw = (self.first_ms as f64) * exp;
        let capped = if raw.is_finite() {
            raw.min(self.max_ms as f64)
        } else {
            self.max_ms as f64
        };
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::BackoffStrategy;
    use std::time::Duration;

    #[test]
    fn grows_exponentially_until_capped() {
        let b = BackoffStrategy {
            first_ms: 100,
            max_ms: 1_000,
            factor: 2.0,
        };
        assert_eq!(b.delay_for(0), Duration::from_millis(100));
        assert_eq!(b.delay_for(1), Duration::from_millis(200));
        assert_eq!(b.delay_for(3), Duration::from_millis(800));
        assert_eq!(b.delay_for(4), Duration::from_millis(1_000));
        assert_eq!(b.delay_for(1_000), Duration::from_millis(1_000));
    }

    #[test]
    fn factor_below_one_is_treated_as_constant() {
        let b = BackoffStrategy {
            first_ms: 250,
            max_ms: 10_000,
            factor: 0.5,
        };
        assert_eq!(b.delay_for(5), Duration::from_millis(250));
    }
}

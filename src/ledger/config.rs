use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Scoring weights and thresholds for ledger reconciliation.
///
/// Scores are in `[0, 1]`. The three weights are normalized by their sum, so
/// they need not add up to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Weight of amount agreement.
    pub amount_weight: f64,
    /// Weight of date proximity.
    pub date_weight: f64,
    /// Weight of description similarity.
    pub text_weight: f64,
    /// Differences up to this absolute amount count as equal.
    pub amount_abs_tolerance: Decimal,
    /// Relative amount difference beyond which an entry is excluded.
    pub amount_window_pct: f64,
    /// Entries further than this many days from the issue date are excluded.
    pub date_window_days: i64,
    /// Minimum score for a single automatic match.
    pub confident_threshold: f64,
    /// Minimum score for an entry to be offered as a candidate at all.
    pub relevance_floor: f64,
    /// The best candidate must lead the runner-up by more than this.
    pub tie_margin: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            amount_weight: 0.60,
            date_weight: 0.25,
            text_weight: 0.15,
            amount_abs_tolerance: dec!(0.01),
            amount_window_pct: 0.30,
            date_window_days: 5,
            confident_threshold: 0.85,
            relevance_floor: 0.30,
            tie_margin: 0.05,
        }
    }
}

/// Builder for [`MatcherConfig`].
///
/// # Example
///
/// ```
/// use nfe_import::ledger::MatcherConfigBuilder;
///
/// let config = MatcherConfigBuilder::new()
///     .date_window_days(3)
///     .confident_threshold(0.9)
///     .build();
/// assert_eq!(config.date_window_days, 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MatcherConfigBuilder {
    config: MatcherConfig,
}

impl MatcherConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(mut self, amount: f64, date: f64, text: f64) -> Self {
        self.config.amount_weight = amount;
        self.config.date_weight = date;
        self.config.text_weight = text;
        self
    }

    pub fn amount_abs_tolerance(mut self, tolerance: Decimal) -> Self {
        self.config.amount_abs_tolerance = tolerance;
        self
    }

    pub fn amount_window_pct(mut self, pct: f64) -> Self {
        self.config.amount_window_pct = pct;
        self
    }

    pub fn date_window_days(mut self, days: i64) -> Self {
        self.config.date_window_days = days;
        self
    }

    pub fn confident_threshold(mut self, threshold: f64) -> Self {
        self.config.confident_threshold = threshold;
        self
    }

    pub fn relevance_floor(mut self, floor: f64) -> Self {
        self.config.relevance_floor = floor;
        self
    }

    pub fn tie_margin(mut self, margin: f64) -> Self {
        self.config.tie_margin = margin;
        self
    }

    pub fn build(self) -> MatcherConfig {
        self.config
    }
}

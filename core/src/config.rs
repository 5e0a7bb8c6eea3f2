// ── Kioo Config ───────────────────────────────────────────────────────────
// The configuration surface for the analytical pipeline, loadable from
// TOML the way the teacher's app loads its settings; every component
// takes a `&CoreConfig` rather than hard-coding a threshold, so
// recalibration against clinical feedback is a config change.

use serde::{Deserialize, Serialize};

use crate::atoms::constants::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub baseline_window_days: u32,
    pub baseline_min_samples: u32,
    pub dissonance_low_threshold: f64,
    pub dissonance_high_threshold: f64,
    pub overnight_lookback_days: u32,
    pub overnight_max_concurrent_users: usize,
    pub encryption_pbkdf2_iterations: u32,
    pub cache_max_entries: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            baseline_window_days: DEFAULT_BASELINE_WINDOW_DAYS,
            baseline_min_samples: DEFAULT_BASELINE_MIN_SAMPLES,
            dissonance_low_threshold: DEFAULT_DISSONANCE_LOW_THRESHOLD,
            dissonance_high_threshold: DEFAULT_DISSONANCE_HIGH_THRESHOLD,
            overnight_lookback_days: DEFAULT_OVERNIGHT_LOOKBACK_DAYS,
            overnight_max_concurrent_users: DEFAULT_OVERNIGHT_MAX_CONCURRENT_USERS,
            encryption_pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl CoreConfig {
    /// Parse from a TOML document. Unset fields fall back to defaults
    /// (`#[serde(default)]` on the struct covers both whole-struct and
    /// per-field omission).
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Build a `SentimentAnalyzer` sized per `cache_max_entries`.
    pub fn sentiment_analyzer(&self) -> crate::sentiment::SentimentAnalyzer {
        crate::sentiment::SentimentAnalyzer::new(self.cache_max_entries)
    }

    /// Build a `DissonanceEngine` with the configured band cutoffs.
    pub fn dissonance_engine(&self) -> crate::dissonance::DissonanceEngine {
        crate::dissonance::DissonanceEngine::new(self.dissonance_low_threshold, self.dissonance_high_threshold)
    }

    /// Build a `BaselineTracker` with the configured window and sample floor.
    pub fn baseline_tracker(&self) -> crate::baseline::BaselineTracker {
        crate::baseline::BaselineTracker::new(self.baseline_window_days, self.baseline_min_samples)
    }

    /// Build an `OvernightBuilder` with the configured PBKDF2 iteration count.
    pub fn overnight_builder(&self) -> crate::overnight::OvernightBuilder {
        crate::overnight::OvernightBuilder::new(self.encryption_pbkdf2_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = CoreConfig::default();
        assert_eq!(c.baseline_window_days, 30);
        assert_eq!(c.baseline_min_samples, 15);
        assert_eq!(c.overnight_max_concurrent_users, 8);
        assert_eq!(c.encryption_pbkdf2_iterations, 100_000);
        assert_eq!(c.cache_max_entries, 1_000);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let c = CoreConfig::from_toml("baseline_min_samples = 20\n").unwrap();
        assert_eq!(c.baseline_min_samples, 20);
        assert_eq!(c.baseline_window_days, 30);
    }

    #[test]
    fn factories_honor_overridden_thresholds() {
        let c = CoreConfig::from_toml("dissonance_low_threshold = 0.1\ndissonance_high_threshold = 0.5\n").unwrap();
        let engine = c.dissonance_engine();
        let analyzer = c.sentiment_analyzer();
        let record = engine.score(
            &analyzer,
            &crate::records::Transcript {
                session_id: crate::atoms::types::SessionId::from("s"),
                seq: 1,
                text: "I am okay".to_string(),
                language: crate::atoms::types::Language::En,
                confidence: None,
            },
            None,
        );
        // No voice emotion -> unclear record regardless of thresholds, but
        // construction with custom cutoffs must not panic or misbehave.
        assert_eq!(record.interpretation, crate::atoms::types::Interpretation::Unclear);
    }
}

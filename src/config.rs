// src/config.rs
//
// Central configuration for the précis training harness.
// This is the single source of truth for run scheduling (rounds, updates,
// replay capacity), reward composition weights and penalty shaping.
//
// Validation happens once, at startup, before any environment stepping:
// non-positive rounds / capacity / batch size are Configuration errors.

use serde::{Deserialize, Serialize};

use crate::error::{PrecisError, Result};

/// Weights for composing the scalar reward from the quality metrics.
///
/// reward = w_similarity * similarity
///        + w_coverage   * coverage_ratio
///        + w_novelty    * novelty_ratio
///        - garbled_penalty
///        - word_penalty
///
/// All weights are non-negative; the penalties are shaped separately by
/// [`PenaltyConfig`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardWeights {
    /// Weight on the symmetric text-similarity score.
    pub similarity: f64,
    /// Weight on salient-vocabulary coverage of the chapter.
    pub coverage: f64,
    /// Weight on candidate novelty (anti-verbatim-copy term).
    pub novelty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            similarity: 0.6,
            coverage: 0.3,
            novelty: 0.1,
        }
    }
}

/// Threshold-then-scale shaping for the garbled and word-noncompliance
/// penalties: penalty = scale * max(0, ratio - floor).
///
/// Zero ratio always yields zero penalty; penalties increase monotonically
/// with their source ratio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// Linear scale applied above the floor.
    pub scale: f64,
    /// Ratio below which no penalty accrues.
    pub floor: f64,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            scale: 0.5,
            floor: 0.0,
        }
    }
}

impl PenaltyConfig {
    /// Shape a ratio in [0,1] into a non-negative penalty.
    pub fn apply(&self, ratio: f64) -> f64 {
        self.scale * (ratio - self.floor).max(0.0)
    }
}

/// Full run configuration for the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Human-readable config / release version.
    pub version: String,
    /// Number of training rounds (full passes over the chapter sequence).
    pub rounds: u32,
    /// Maximum number of transitions held by the replay buffer.
    pub replay_capacity: usize,
    /// Transitions sampled per agent update.
    pub batch_size: usize,
    /// Deferred agent updates performed after each round.
    /// 0 means "one update per step of the round" (resolved at run time).
    pub post_round_updates: u32,
    /// Optional cap on chapters per round (smoke runs).
    pub max_chapters: Option<usize>,
    /// Deterministic seed for policy sampling + replay sampling.
    pub seed: u64,
    /// Reward composition weights.
    pub reward_weights: RewardWeights,
    /// Garbled-text penalty shaping.
    pub garbled_penalty: PenaltyConfig,
    /// Word-noncompliance penalty shaping.
    pub word_penalty: PenaltyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "precis-v0.3.0".to_string(),
            rounds: 1,
            replay_capacity: 32,
            batch_size: 4,
            post_round_updates: 0,
            max_chapters: None,
            seed: 0,
            reward_weights: RewardWeights::default(),
            garbled_penalty: PenaltyConfig::default(),
            word_penalty: PenaltyConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration before the run starts.
    ///
    /// Fatal (Configuration) on non-positive rounds / capacity / batch size,
    /// negative weights, or a zero max-chapter cap.
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(PrecisError::configuration("rounds must be positive"));
        }
        if self.replay_capacity == 0 {
            return Err(PrecisError::configuration(
                "replay_capacity must be positive",
            ));
        }
        if self.batch_size == 0 {
            return Err(PrecisError::configuration("batch_size must be positive"));
        }
        if let Some(0) = self.max_chapters {
            return Err(PrecisError::configuration(
                "max_chapters must be positive when provided",
            ));
        }
        let w = &self.reward_weights;
        if w.similarity < 0.0 || w.coverage < 0.0 || w.novelty < 0.0 {
            return Err(PrecisError::configuration(
                "reward weights must be non-negative",
            ));
        }
        for (name, p) in [
            ("garbled_penalty", &self.garbled_penalty),
            ("word_penalty", &self.word_penalty),
        ] {
            if p.scale < 0.0 || !(0.0..=1.0).contains(&p.floor) {
                return Err(PrecisError::configuration(format!(
                    "{name}: scale must be non-negative and floor in [0,1]"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_non_positive_parameters_rejected() {
        let mut cfg = Config::default();
        cfg.rounds = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.replay_capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.max_chapters = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_negative_weights_rejected() {
        let mut cfg = Config::default();
        cfg.reward_weights.coverage = -0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.garbled_penalty.scale = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_penalty_shaping() {
        let p = PenaltyConfig {
            scale: 0.5,
            floor: 0.0,
        };
        assert_eq!(p.apply(0.0), 0.0);
        assert!((p.apply(0.4) - 0.2).abs() < 1e-12);

        let thresholded = PenaltyConfig {
            scale: 2.0,
            floor: 0.25,
        };
        assert_eq!(thresholded.apply(0.2), 0.0);
        assert!((thresholded.apply(0.75) - 1.0).abs() < 1e-12);
    }
}

//! Tunable configuration: cache lifetimes, weak-area thresholds and
//! recommendation weights.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuizError, Result};

/// Weights of the recommendation score.
///
/// `score = weak_area_weight * weak + staleness_weight * (1 - recency)
///        + recent_wrong_weight * recent_wrong_share`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// Bonus for questions in a weak category or weak difficulty tier.
    pub weak_area_weight: f64,
    /// Bonus for material not seen recently (full bonus for unseen questions).
    pub staleness_weight: f64,
    /// Bonus for sharing a category with the user's recent mistakes.
    pub recent_wrong_weight: f64,
    /// How many of the latest wrong answers count as "recent".
    pub recent_wrong_window: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            weak_area_weight: 0.5,
            staleness_weight: 0.3,
            recent_wrong_weight: 0.2,
            recent_wrong_window: 10,
        }
    }
}

/// Top-level configuration of a [`QuizSystem`](crate::QuizSystem).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Lifetime of cached question lookups, in seconds.
    pub cache_ttl_secs: f64,
    /// Lifetime of cached per-user statistics, in seconds.
    pub stats_ttl_secs: f64,
    /// Maximum number of cache entries before FIFO eviction kicks in.
    pub cache_max_entries: usize,
    /// A category or difficulty whose accuracy is below this is "weak".
    pub weak_accuracy_threshold: f64,
    /// Minimum records in a group before it can be called weak.
    pub weak_min_attempts: u32,
    /// Similarity needed for a fill-in-the-blank answer to count as correct.
    pub fill_blank_similarity: f64,
    pub recommend: RecommendConfig,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600.0,
            stats_ttl_secs: 300.0,
            cache_max_entries: 1000,
            weak_accuracy_threshold: 0.6,
            weak_min_attempts: 3,
            fill_blank_similarity: 0.85,
            recommend: RecommendConfig::default(),
        }
    }
}

impl QuizConfig {
    /// Reject values that would make the cache or scorer misbehave.
    pub fn validate(&self) -> Result<()> {
        check_ttl("cache_ttl_secs", self.cache_ttl_secs)?;
        check_ttl("stats_ttl_secs", self.stats_ttl_secs)?;
        if self.cache_max_entries == 0 {
            return Err(QuizError::InvalidConfig(
                "cache_max_entries must be at least 1".into(),
            ));
        }
        check_unit("weak_accuracy_threshold", self.weak_accuracy_threshold)?;
        check_unit("fill_blank_similarity", self.fill_blank_similarity)?;

        let r = &self.recommend;
        for (name, weight) in [
            ("recommend.weak_area_weight", r.weak_area_weight),
            ("recommend.staleness_weight", r.staleness_weight),
            ("recommend.recent_wrong_weight", r.recent_wrong_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(QuizError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.cache_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.stats_ttl_secs)
    }
}

fn check_ttl(name: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(QuizError::InvalidConfig(format!(
            "{name} must be a non-negative number of seconds, got {secs}"
        )));
    }
    Ok(())
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(QuizError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

/// Load and validate a TOML config file. Missing keys take their defaults.
pub fn load_config_from(path: &Path) -> Result<QuizConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| QuizError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })?;
    let config: QuizConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

//! The `config` module defines [`PipelineConfig`], constructed from defaults and optionally
//! overridden by a TOML file and CLI flags — never an env-loaded global singleton, so that a
//! single process can run more than one configuration (e.g. in tests) without interference.
use crate::error::MatchResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable thresholds and limits for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Trigram-similarity floor for L2's conservative candidate search.
    pub l2_candidate_threshold: f64,
    /// Trigram-similarity floor for L3a's group-fuzzy candidate search.
    pub l3a_candidate_threshold: f64,
    /// Trigram-similarity floor for L3b's individual-fuzzy candidate search.
    pub l3b_candidate_threshold: f64,
    /// Average fact-row confidence below which a planning group qualifies for L3a.
    pub l3a_group_confidence_ceiling: f64,
    /// Number of documents processed per batch, for batch-transactional writes and progress
    /// reporting granularity.
    pub batch_size: usize,
    /// Worker count for the `rayon` pool backing the matching layers. `None` lets `rayon` size
    /// itself from `std::thread::available_parallelism()`, clamped to `[4, 16]` by
    /// [`crate::worker_pool::build_pool`].
    pub worker_count: Option<usize>,
    /// Per-query timeout for a candidate search against the address corpus.
    pub query_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            l2_candidate_threshold: 0.55,
            l3a_candidate_threshold: 0.50,
            l3b_candidate_threshold: 0.60,
            l3a_group_confidence_ceiling: 0.70,
            batch_size: 500,
            worker_count: None,
            query_timeout_ms: 5_000,
        }
    }
}

impl PipelineConfig {
    /// Loads a config by layering a TOML file's contents over [`PipelineConfig::default`].
    /// Missing fields in the file keep their default value.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MatchResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let overrides: PartialPipelineConfig = toml::from_str(&text)?;
        Ok(overrides.apply_to(Self::default()))
    }
}

/// Mirrors [`PipelineConfig`] with every field optional, so a TOML file may set only the
/// thresholds it cares about.
#[derive(Debug, Clone, Default, Deserialize)]
struct PartialPipelineConfig {
    l2_candidate_threshold: Option<f64>,
    l3a_candidate_threshold: Option<f64>,
    l3b_candidate_threshold: Option<f64>,
    l3a_group_confidence_ceiling: Option<f64>,
    batch_size: Option<usize>,
    worker_count: Option<usize>,
    query_timeout_ms: Option<u64>,
}

impl PartialPipelineConfig {
    fn apply_to(self, mut base: PipelineConfig) -> PipelineConfig {
        if let Some(v) = self.l2_candidate_threshold {
            base.l2_candidate_threshold = v;
        }
        if let Some(v) = self.l3a_candidate_threshold {
            base.l3a_candidate_threshold = v;
        }
        if let Some(v) = self.l3b_candidate_threshold {
            base.l3b_candidate_threshold = v;
        }
        if let Some(v) = self.l3a_group_confidence_ceiling {
            base.l3a_group_confidence_ceiling = v;
        }
        if let Some(v) = self.batch_size {
            base.batch_size = v;
        }
        if self.worker_count.is_some() {
            base.worker_count = self.worker_count;
        }
        if let Some(v) = self.query_timeout_ms {
            base.query_timeout_ms = v;
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_thresholds() {
        let config = PipelineConfig::default();
        assert_eq!(config.l2_candidate_threshold, 0.55);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.worker_count, None);
    }

    #[test]
    fn partial_override_keeps_unset_fields_at_default() {
        let overrides = PartialPipelineConfig {
            batch_size: Some(250),
            ..Default::default()
        };
        let config = overrides.apply_to(PipelineConfig::default());
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.l2_candidate_threshold, 0.55);
    }
}

/*!
 * Application configuration module.
 *
 * This module handles the configuration for matching, quality gating, the
 * task queue, and batch orchestration, including loading, validating and
 * saving configuration settings.
 */

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Term matching configuration
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Quality gate configuration
    #[serde(default)]
    pub quality: QualityConfig,

    /// Task queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Batch orchestration configuration
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Term matching configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchingConfig {
    /// Minimum term length (in characters) for partial matching
    #[serde(default = "default_partial_min_length")]
    pub partial_min_length: usize,

    /// Similarity threshold for fuzzy matching (0.0-1.0)
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            partial_min_length: default_partial_min_length(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

/// Quality gate configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityConfig {
    /// Confidence threshold for automatic approval (0.0-1.0).
    /// Scores in [threshold/2, threshold) are held as pending.
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            approval_threshold: default_approval_threshold(),
        }
    }
}

/// Task queue configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    /// Maximum number of simultaneously admitted tasks
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Maximum retries before a task fails permanently
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            max_retry_attempts: default_max_retry_attempts(),
        }
    }
}

/// Batch orchestration configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchConfig {
    /// Maximum retries per file before it fails permanently
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Minutes without an update before a processing batch counts as stale
    #[serde(default = "default_stale_threshold_minutes")]
    pub stale_threshold_minutes: i64,

    /// Maximum failed files requeued per auto-recovery call
    #[serde(default = "default_auto_recovery_limit")]
    pub auto_recovery_limit: usize,

    /// TTL in seconds for persisted batch records
    #[serde(default = "default_record_ttl_seconds")]
    pub record_ttl_seconds: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: default_max_retry_attempts(),
            stale_threshold_minutes: default_stale_threshold_minutes(),
            auto_recovery_limit: default_auto_recovery_limit(),
            record_ttl_seconds: default_record_ttl_seconds(),
        }
    }
}

fn default_partial_min_length() -> usize {
    3
}

fn default_fuzzy_threshold() -> f32 {
    0.8
}

fn default_approval_threshold() -> f32 {
    0.8
}

fn default_concurrency_limit() -> usize {
    3
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_stale_threshold_minutes() -> i64 {
    30
}

fn default_auto_recovery_limit() -> usize {
    3
}

fn default_record_ttl_seconds() -> u64 {
    21_600
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.matching.fuzzy_threshold) {
            return Err(anyhow!(
                "fuzzy_threshold must be between 0.0 and 1.0, got {}",
                self.matching.fuzzy_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.quality.approval_threshold) {
            return Err(anyhow!(
                "approval_threshold must be between 0.0 and 1.0, got {}",
                self.quality.approval_threshold
            ));
        }
        if self.queue.concurrency_limit == 0 {
            return Err(anyhow!("concurrency_limit must be at least 1"));
        }
        if self.batch.stale_threshold_minutes <= 0 {
            return Err(anyhow!("stale_threshold_minutes must be positive"));
        }
        if self.batch.record_ttl_seconds == 0 {
            return Err(anyhow!("record_ttl_seconds must be positive"));
        }
        Ok(())
    }
}

//! Configuration System
//!
//! Tuning parameters for retrieval, the reply gate, round shape and storage,
//! loaded from a TOML file so they can be adjusted without recompiling. Every
//! section is defaulted; a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Memory retrieval weights and decay.
    pub retrieval: RetrievalConfig,
    /// Reply gate offsets and decay.
    pub gate: GateConfig,
    /// Per-round dispatch shape.
    pub round: RoundConfig,
    /// Embedding settings for the offline embedder.
    pub embedding: EmbeddingConfig,
    /// Message id generation.
    pub ids: IdConfig,
    /// Scenario storage location.
    pub storage: StorageConfig,
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Toml)
    }

    /// Serializes the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Weights for the four retrieval components plus the recency decay rate.
///
/// All weights are non-negative; the default of 1.0 each gives the four
/// components equal contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub recency_weight: f32,
    pub importance_weight: f32,
    pub relevance_weight: f32,
    pub emotion_weight: f32,
    /// Exponential decay rate per hour for the recency component.
    pub recency_decay_rate: f32,
    /// Default number of memories returned by retrieval.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            recency_weight: 1.0,
            importance_weight: 1.0,
            relevance_weight: 1.0,
            emotion_weight: 1.0,
            recency_decay_rate: 0.005,
            top_k: 5,
        }
    }
}

/// Reply gate tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Offset when the reply chain reaches a message by this agent
    /// (amplifies reply probability).
    pub reply_to_self_offset: f32,
    /// Offset for a reply chain not involving this agent (dampens).
    pub reply_other_offset: f32,
    /// Offset for a fresh post.
    pub fresh_post_offset: f32,
    /// Multiplier applied to stored intensity when the gate skips.
    pub skip_decay: f32,
    /// Constant added to the reflection-trigger threshold.
    pub reflection_bias: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            reply_to_self_offset: 0.3,
            reply_other_offset: 3.0,
            fresh_post_offset: 1.0,
            skip_decay: 0.5,
            reflection_bias: 3.0,
        }
    }
}

/// Per-round dispatch shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Cap on events delivered to one agent per round (mandatory entries
    /// always included, the rest sampled up to this total).
    pub fan_out: usize,
    /// Agents forced to post when the queue runs dry.
    pub bootstrap_posts: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            fan_out: 6,
            bootstrap_posts: 2,
        }
    }
}

/// Offline embedder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Fixed embedding vector length.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dimension: 64 }
    }
}

/// Message id generation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdConfig {
    /// When true, re-salt ids until unique against the existing log.
    /// The default preserves the best-effort behavior: collisions are
    /// treated as practically impossible.
    pub enforce_unique: bool,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self { enforce_unique: false }
    }
}

/// Where scenario records are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("output/scenarios"),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML")]
    Toml(#[source] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.retrieval.recency_weight, 1.0);
        assert_eq!(config.retrieval.importance_weight, 1.0);
        assert_eq!(config.retrieval.relevance_weight, 1.0);
        assert_eq!(config.retrieval.emotion_weight, 1.0);
        assert_eq!(config.retrieval.recency_decay_rate, 0.005);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.gate.reply_to_self_offset, 0.3);
        assert_eq!(config.gate.reply_other_offset, 3.0);
        assert_eq!(config.gate.fresh_post_offset, 1.0);
        assert_eq!(config.round.fan_out, 6);
        assert_eq!(config.round.bootstrap_posts, 2);
        assert!(!config.ids.enforce_unique);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [gate]
            reply_other_offset = 5.0

            [round]
            fan_out = 4
        "#;
        let config = SimConfig::from_toml(toml).unwrap();

        assert_eq!(config.gate.reply_other_offset, 5.0);
        assert_eq!(config.round.fan_out, 4);
        // Untouched sections keep defaults.
        assert_eq!(config.gate.reply_to_self_offset, 0.3);
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = SimConfig::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[retrieval]"));
        assert!(toml.contains("[gate]"));

        let parsed = SimConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed.round.fan_out, config.round.fan_out);
        assert_eq!(parsed.gate.skip_decay, config.gate.skip_decay);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(SimConfig::from_toml("retrieval = 'nope").is_err());
    }
}

//! Engine configuration
//!
//! Every threshold and window is a named option. `default()` is the strict
//! profile (0.85 auto-execute, 5 minute rollback window) and `relaxed()` the
//! lab profile (0.80, 20 minutes). A config is loaded from YAML and then
//! overridden by `NETHEAL_*` environment variables.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which reasoner variant the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReasonerKind {
    #[default]
    RuleBased,
    ModelBacked,
}

impl ReasonerKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule_based" | "rules" => Some(ReasonerKind::RuleBased),
            "model_backed" | "model" => Some(ReasonerKind::ModelBacked),
            _ => None,
        }
    }
}

/// Settings for the model-backed reasoner's client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    pub endpoint: String,
    /// Model name sent with each request
    pub name: String,
    /// Name of the environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Per-call budget; the rule-based fallback answers when exceeded
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
}

/// Model call budget when none is configured
pub const DEFAULT_MODEL_TIMEOUT_MS: u64 = 3_000;

fn default_model_timeout_ms() -> u64 {
    DEFAULT_MODEL_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum confidence for `can_auto_execute`
    pub auto_execute_threshold: f64,

    /// Below this confidence the decision degrades to action `none`
    pub min_confidence_for_recommendation: f64,

    /// Rollback window stamped on every decision, in minutes
    pub default_rollback_window_min: u32,

    /// Time budget for execute / approve / rollback
    pub execution_timeout_ms: u64,

    pub reasoner: ReasonerKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,

    /// JSONL audit file; memory-only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_path: Option<String>,

    pub listen_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_execute_threshold: 0.85,
            min_confidence_for_recommendation: 0.60,
            default_rollback_window_min: 5,
            execution_timeout_ms: 5_000,
            reasoner: ReasonerKind::RuleBased,
            model: None,
            audit_path: None,
            listen_addr: "0.0.0.0:8787".to_string(),
        }
    }
}

impl EngineConfig {
    /// Looser gate and longer rollback window
    pub fn relaxed() -> Self {
        Self {
            auto_execute_threshold: 0.80,
            default_rollback_window_min: 20,
            ..Self::default()
        }
    }

    /// Load from YAML; missing keys take their defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    /// Apply `NETHEAL_*` overrides from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("NETHEAL_AUTO_EXECUTE_THRESHOLD") {
            self.auto_execute_threshold = parse_var("NETHEAL_AUTO_EXECUTE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("NETHEAL_MIN_CONFIDENCE_FOR_RECOMMENDATION") {
            self.min_confidence_for_recommendation =
                parse_var("NETHEAL_MIN_CONFIDENCE_FOR_RECOMMENDATION", &v)?;
        }
        if let Some(v) = lookup("NETHEAL_ROLLBACK_WINDOW_MIN") {
            self.default_rollback_window_min = parse_var("NETHEAL_ROLLBACK_WINDOW_MIN", &v)?;
        }
        if let Some(v) = lookup("NETHEAL_EXECUTION_TIMEOUT_MS") {
            self.execution_timeout_ms = parse_var("NETHEAL_EXECUTION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("NETHEAL_REASONER") {
            self.reasoner = ReasonerKind::parse(&v)
                .ok_or_else(|| EngineError::Config(format!("NETHEAL_REASONER: unknown reasoner {}", v)))?;
        }
        if let Some(endpoint) = lookup("NETHEAL_MODEL_ENDPOINT") {
            let name = lookup("NETHEAL_MODEL_NAME")
                .or_else(|| self.model.as_ref().map(|m| m.name.clone()))
                .unwrap_or_default();
            let base = self.model.take();
            self.model = Some(ModelConfig {
                endpoint,
                name,
                api_key_env: base.as_ref().and_then(|m| m.api_key_env.clone()),
                timeout_ms: base.map(|m| m.timeout_ms).unwrap_or_else(default_model_timeout_ms),
            });
        } else if let (Some(name), Some(model)) = (lookup("NETHEAL_MODEL_NAME"), self.model.as_mut()) {
            model.name = name;
        }
        if let Some(v) = lookup("NETHEAL_AUDIT_PATH") {
            self.audit_path = Some(v);
        }
        if let Some(v) = lookup("NETHEAL_ADDR") {
            self.listen_addr = v;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("auto_execute_threshold", self.auto_execute_threshold),
            ("min_confidence_for_recommendation", self.min_confidence_for_recommendation),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!("{} must be within 0.0-1.0, got {}", name, value)));
            }
        }
        if self.min_confidence_for_recommendation > self.auto_execute_threshold {
            return Err(EngineError::Config(format!(
                "min_confidence_for_recommendation ({}) exceeds auto_execute_threshold ({})",
                self.min_confidence_for_recommendation, self.auto_execute_threshold
            )));
        }
        if self.execution_timeout_ms == 0 {
            return Err(EngineError::Config("execution_timeout_ms must be > 0".to_string()));
        }
        if self.reasoner == ReasonerKind::ModelBacked {
            match &self.model {
                Some(m) if !m.endpoint.is_empty() && !m.name.is_empty() => {}
                _ => {
                    return Err(EngineError::Config(
                        "model_backed reasoner requires model.endpoint and model.name".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{}: cannot parse {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.auto_execute_threshold, 0.85);
        assert_eq!(config.default_rollback_window_min, 5);
        assert_eq!(config.reasoner, ReasonerKind::RuleBased);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_relaxed_preset() {
        let config = EngineConfig::relaxed();
        assert_eq!(config.auto_execute_threshold, 0.80);
        assert_eq!(config.default_rollback_window_min, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml("auto_execute_threshold: 0.9\n").unwrap();
        assert_eq!(config.auto_execute_threshold, 0.9);
        assert_eq!(config.min_confidence_for_recommendation, 0.60);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(EngineConfig::from_yaml("auto_execute_threshold: 1.5\n").is_err());
        assert!(EngineConfig::from_yaml(
            "auto_execute_threshold: 0.5\nmin_confidence_for_recommendation: 0.7\n"
        )
        .is_err());
        assert!(EngineConfig::from_yaml("reasoner: model_backed\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("NETHEAL_AUTO_EXECUTE_THRESHOLD", "0.8"),
            ("NETHEAL_ROLLBACK_WINDOW_MIN", "20"),
            ("NETHEAL_REASONER", "model_backed"),
            ("NETHEAL_MODEL_ENDPOINT", "http://localhost:11434/v1"),
            ("NETHEAL_MODEL_NAME", "llama3"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.auto_execute_threshold, 0.8);
        assert_eq!(config.default_rollback_window_min, 20);
        assert_eq!(config.reasoner, ReasonerKind::ModelBacked);
        assert_eq!(config.model.unwrap().name, "llama3");
    }

    #[test]
    fn test_env_override_parse_error() {
        let result = EngineConfig::default()
            .with_overrides(|k| (k == "NETHEAL_EXECUTION_TIMEOUT_MS").then(|| "soon".to_string()));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}

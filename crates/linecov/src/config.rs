//! Coverage configuration
//!
//! Loaded from YAML or JSON, or assembled with [`CoverageConfig::builder`].
//!
//! ```yaml
//! empty_total_policy: not_applicable
//! attribution: innermost
//! max_diagnostics: 500
//! recorder_capacity: 1024
//! ```

use crate::diagnostics::DEFAULT_MAX_DIAGNOSTICS;
use crate::recorder::DEFAULT_RECORDER_CAPACITY;
use crate::result::{LinecovError, LinecovResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How to report a percentage when there is nothing to cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyTotalPolicy {
    /// No percentage (`None`)
    #[default]
    NotApplicable,
    /// Vacuously 100%
    FullCoverage,
}

/// Which methods a line is attributed to when methods nest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribution {
    /// Only the innermost method
    #[default]
    Innermost,
    /// Every method whose range contains the line
    AllEnclosing,
}

/// Coverage engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Percentage reporting for zero totals
    pub empty_total_policy: EmptyTotalPolicy,
    /// Method attribution used for test targets
    pub attribution: Attribution,
    /// Maximum retained merge diagnostics
    pub max_diagnostics: usize,
    /// Initial location capacity of new recorders
    pub recorder_capacity: usize,
}

impl CoverageConfig {
    /// Create a builder for coverage config
    #[must_use]
    pub fn builder() -> CoverageConfigBuilder {
        CoverageConfigBuilder::default()
    }

    /// Parse YAML
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed or has unknown values
    pub fn from_yaml_str(yaml: &str) -> LinecovResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| LinecovError::Config {
            message: e.to_string(),
        })?;
        Ok(config.normalized())
    }

    /// Parse JSON
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or has unknown values
    pub fn from_json_str(json: &str) -> LinecovResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| LinecovError::Config {
            message: e.to_string(),
        })?;
        Ok(config.normalized())
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, the extension is unknown,
    /// or parsing fails
    pub fn load(path: &Path) -> LinecovResult<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(LinecovError::Config {
                message: format!("unsupported config extension: {other:?}"),
            }),
        }
    }

    /// Zero limits fall back to defaults
    fn normalized(mut self) -> Self {
        if self.max_diagnostics == 0 {
            self.max_diagnostics = DEFAULT_MAX_DIAGNOSTICS;
        }
        if self.recorder_capacity == 0 {
            self.recorder_capacity = DEFAULT_RECORDER_CAPACITY;
        }
        self
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            empty_total_policy: EmptyTotalPolicy::NotApplicable,
            attribution: Attribution::Innermost,
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
            recorder_capacity: DEFAULT_RECORDER_CAPACITY,
        }
    }
}

/// Builder for coverage configuration
#[derive(Debug, Default)]
pub struct CoverageConfigBuilder {
    empty_total_policy: EmptyTotalPolicy,
    attribution: Attribution,
    max_diagnostics: usize,
    recorder_capacity: usize,
}

impl CoverageConfigBuilder {
    /// Set the empty-total policy
    #[must_use]
    pub fn empty_total_policy(mut self, policy: EmptyTotalPolicy) -> Self {
        self.empty_total_policy = policy;
        self
    }

    /// Set method attribution
    #[must_use]
    pub fn attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    /// Set the diagnostic cap
    #[must_use]
    pub fn max_diagnostics(mut self, max: usize) -> Self {
        self.max_diagnostics = max;
        self
    }

    /// Set recorder capacity
    #[must_use]
    pub fn recorder_capacity(mut self, capacity: usize) -> Self {
        self.recorder_capacity = capacity;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> CoverageConfig {
        CoverageConfig {
            empty_total_policy: self.empty_total_policy,
            attribution: self.attribution,
            max_diagnostics: self.max_diagnostics,
            recorder_capacity: self.recorder_capacity,
        }
        .normalized()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoverageConfig::default();
        assert_eq!(config.empty_total_policy, EmptyTotalPolicy::NotApplicable);
        assert_eq!(config.attribution, Attribution::Innermost);
        assert_eq!(config.max_diagnostics, DEFAULT_MAX_DIAGNOSTICS);
    }

    #[test]
    fn test_builder_zero_limits_use_defaults() {
        let config = CoverageConfig::builder()
            .empty_total_policy(EmptyTotalPolicy::FullCoverage)
            .attribution(Attribution::AllEnclosing)
            .build();
        assert_eq!(config.empty_total_policy, EmptyTotalPolicy::FullCoverage);
        assert_eq!(config.attribution, Attribution::AllEnclosing);
        assert_eq!(config.max_diagnostics, DEFAULT_MAX_DIAGNOSTICS);
        assert_eq!(config.recorder_capacity, DEFAULT_RECORDER_CAPACITY);
    }

    #[test]
    fn test_yaml_partial_fills_defaults() {
        let config = CoverageConfig::from_yaml_str("attribution: all_enclosing\n").unwrap();
        assert_eq!(config.attribution, Attribution::AllEnclosing);
        assert_eq!(config.empty_total_policy, EmptyTotalPolicy::NotApplicable);
        assert_eq!(config.recorder_capacity, DEFAULT_RECORDER_CAPACITY);
    }

    #[test]
    fn test_yaml_unknown_policy_is_error() {
        let err = CoverageConfig::from_yaml_str("empty_total_policy: sometimes\n").unwrap_err();
        assert!(matches!(err, LinecovError::Config { .. }));
    }

    #[test]
    fn test_json_config() {
        let config =
            CoverageConfig::from_json_str(r#"{"empty_total_policy":"full_coverage","max_diagnostics":3}"#)
                .unwrap();
        assert_eq!(config.empty_total_policy, EmptyTotalPolicy::FullCoverage);
        assert_eq!(config.max_diagnostics, 3);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("linecov.yaml");
        std::fs::write(&yaml, "max_diagnostics: 7\n").unwrap();
        assert_eq!(CoverageConfig::load(&yaml).unwrap().max_diagnostics, 7);

        let toml = dir.path().join("linecov.toml");
        std::fs::write(&toml, "max_diagnostics = 7\n").unwrap();
        assert!(CoverageConfig::load(&toml).is_err());
    }
}

//! Container configuration.
//!
//! [`ContainerConfig`] can be built in code, read from the environment, or
//! parsed from JSON (and YAML with the `yaml` feature). Unknown keys are
//! rejected so typos surface at startup.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

pub const ENV_MAX_DEPTH: &str = "RESOLVIT_MAX_DEPTH";
pub const ENV_PROTOTYPE_CACHE_DIR: &str = "RESOLVIT_PROTOTYPE_CACHE_DIR";
pub const ENV_AUTOWIRE: &str = "RESOLVIT_AUTOWIRE";

/// Default bound on nested resolutions per top-level call.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Settings applied when a container is built.
///
/// # Examples
///
/// ```rust
/// use resolvit::{ContainerBuilder, ContainerConfig};
///
/// let config = ContainerConfig::from_json_str(r#"{ "max_depth": 32, "autowire": false }"#).unwrap();
/// assert_eq!(config.max_depth, 32);
///
/// let container = ContainerBuilder::new().with_config(config).build();
/// assert!(!container.config().autowire);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    /// Nested resolutions allowed before failing with `DepthExceeded`.
    pub max_depth: usize,
    /// Directory for the persisted prototype tier. `None` keeps prototypes
    /// in memory only.
    pub prototype_cache_dir: Option<PathBuf>,
    /// Build registered classes that have no binding.
    pub autowire: bool,
    /// Report cache hits to the metrics sink, not just constructions.
    pub record_cache_hits: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            prototype_cache_dir: None,
            autowire: true,
            record_cache_hits: false,
        }
    }
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `RESOLVIT_*` environment variables.
    ///
    /// Unset variables keep their default; set but unparseable ones are an
    /// error.
    pub fn from_env() -> DiResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = read_var(ENV_MAX_DEPTH) {
            config.max_depth = raw
                .parse()
                .map_err(|_| DiError::Config(format!("{} must be a positive integer, got {:?}", ENV_MAX_DEPTH, raw)))?;
        }
        if let Some(raw) = read_var(ENV_PROTOTYPE_CACHE_DIR) {
            config.prototype_cache_dir = Some(PathBuf::from(raw));
        }
        if let Some(raw) = read_var(ENV_AUTOWIRE) {
            config.autowire = parse_bool(&raw)
                .ok_or_else(|| DiError::Config(format!("{} must be a boolean, got {:?}", ENV_AUTOWIRE, raw)))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> DiResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| DiError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> DiResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| DiError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_prototype_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prototype_cache_dir = Some(dir.into());
        self
    }

    pub fn with_autowire(mut self, autowire: bool) -> Self {
        self.autowire = autowire;
        self
    }

    pub fn with_record_cache_hits(mut self, record: bool) -> Self {
        self.record_cache_hits = record;
        self
    }

    pub fn validate(&self) -> DiResult<()> {
        if self.max_depth == 0 {
            return Err(DiError::Config("max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.max_depth, 256);
        assert!(config.autowire);
        assert!(config.prototype_cache_dir.is_none());
        assert!(!config.record_cache_hits);
    }

    #[test]
    fn test_json_partial_and_unknown_keys() {
        let config = ContainerConfig::from_json_str(r#"{ "prototype_cache_dir": "/tmp/protos" }"#).unwrap();
        assert_eq!(config.prototype_cache_dir, Some(PathBuf::from("/tmp/protos")));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);

        assert!(matches!(
            ContainerConfig::from_json_str(r#"{ "max_dept": 3 }"#),
            Err(DiError::Config(_))
        ));
        assert!(matches!(
            ContainerConfig::from_json_str(r#"{ "max_depth": 0 }"#),
            Err(DiError::Config(_))
        ));
    }

    #[test]
    fn test_bool_parsing() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_yaml() {
        let config = ContainerConfig::from_yaml_str("max_depth: 12\nrecord_cache_hits: true\n").unwrap();
        assert_eq!(config.max_depth, 12);
        assert!(config.record_cache_hits);
    }
}

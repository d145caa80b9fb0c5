//! Per-compilation configuration.

use crate::error::SqlResult;
use serde::{Deserialize, Serialize};

/// Configuration consumed by a [`LabelResolver`](crate::labels::LabelResolver)
/// and the diagnostic renderer.
///
/// Can be loaded from TOML:
///
/// ```
/// let config = sqltree::CompileConfig::from_toml_str("max_identifier_length = 30").unwrap();
/// assert_eq!(config.max_identifier_length, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Longest identifier the target accepts. Longer generated labels are truncated.
    pub max_identifier_length: usize,
    /// Prefix used when rendering bound parameters.
    pub bind_prefix: String,
    /// Separator between an anonymous label's hint and its counter.
    pub label_separator: String,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            max_identifier_length: 63,
            bind_prefix: ":".to_string(),
            label_separator: "_".to_string(),
        }
    }
}

impl CompileConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> SqlResult<Self> {
        let config: CompileConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the maximum identifier length.
    pub fn with_max_identifier_length(mut self, len: usize) -> Self {
        self.max_identifier_length = len;
        self
    }

    /// Set the bind parameter prefix.
    pub fn with_bind_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bind_prefix = prefix.into();
        self
    }

    /// Set the anonymous label separator.
    pub fn with_label_separator(mut self, separator: impl Into<String>) -> Self {
        self.label_separator = separator.into();
        self
    }

    /// Reject values that would make label truncation impossible.
    pub fn validate(&self) -> SqlResult<()> {
        if self.max_identifier_length < 8 {
            return Err(crate::SqlError::Config(format!(
                "max_identifier_length must be at least 8, got {}",
                self.max_identifier_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompileConfig::new();
        assert_eq!(config.max_identifier_length, 63);
        assert_eq!(config.bind_prefix, ":");
        assert_eq!(config.label_separator, "_");
    }

    #[test]
    fn test_from_toml_partial() {
        let config = CompileConfig::from_toml_str("bind_prefix = \"@\"\n").unwrap();
        assert_eq!(config.bind_prefix, "@");
        assert_eq!(config.max_identifier_length, 63);
    }

    #[test]
    fn test_from_toml_rejects_tiny_limit() {
        let err = CompileConfig::from_toml_str("max_identifier_length = 3").unwrap_err();
        assert!(err.to_string().contains("max_identifier_length"));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(CompileConfig::from_toml_str("max_identifier_length = \"x\"").is_err());
    }
}

//! Parser configuration and error policy

use serde::{Deserialize, Serialize};

/// What happens to accumulated parse errors once parsing completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Return `Err` when any error was recorded
    Surface,
    /// Always return the outcome; the caller inspects its errors
    Inspect,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::Inspect
    }
}

/// Parser settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub error_policy: ErrorPolicy,

    /// Maximum number of error records kept (0 = unlimited)
    pub max_errors: usize,

    /// Strip surrounding spaces from field values before storing them
    pub trim_whitespace: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Inspect,
            max_errors: 0,
            trim_whitespace: false,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn surface() -> Self {
        Self {
            error_policy: ErrorPolicy::Surface,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    #[must_use]
    pub fn trimmed(mut self) -> Self {
        self.trim_whitespace = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_inspect() {
        let config = ParserConfig::default();
        assert_eq!(config.error_policy, ErrorPolicy::Inspect);
        assert_eq!(config.max_errors, 0);
        assert_eq!(ParserConfig::surface().error_policy, ErrorPolicy::Surface);
    }

    #[test]
    fn test_policy_names() {
        let policy: ErrorPolicy = serde_json::from_str("\"surface\"").unwrap();
        assert_eq!(policy, ErrorPolicy::Surface);
    }
}

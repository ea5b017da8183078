//! Engine configuration file

use anyhow::{Context, Result};
use edi_parser::ParserConfig;
use edi_serializer::WriterConfig;
use edi_validation::{ReportFormat, ValidationConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Settings read from `--config`; every section is optional
///
/// ```yaml
/// parser:
///   error_policy: inspect
///   trim_whitespace: true
/// validation:
///   strictness: moderate
/// writer:
///   line_breaks: true
/// report: json
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub parser: ParserConfig,
    pub validation: ValidationConfig,
    pub writer: WriterConfig,
    /// Format of error reports
    pub report: ReportFormat,
}

impl EngineConfig {
    /// Read a YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file is a valid configuration
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The file at `path`, or the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_dialect::Dialect;
    use edi_parser::ErrorPolicy;
    use edi_validation::StrictnessLevel;
    use std::io::Write;

    #[test]
    fn test_sections_are_optional() {
        let config = EngineConfig::from_yaml("validation:\n  strictness: lenient\n").unwrap();
        assert_eq!(config.validation.strictness, StrictnessLevel::Lenient);
        assert!(config.validation.check_controls);
        assert_eq!(config.parser, ParserConfig::default());
        assert_eq!(config.report, ReportFormat::Text);
    }

    #[test]
    fn test_full_file() {
        let yaml = r#"
parser:
  error_policy: surface
  max_errors: 10
writer:
  dialect: edifact
  emit_una: true
  delimiters:
    segment: "'"
    field: "+"
    component: ":"
    repeat: "*"
    release: "?"
    decimal: ","
report: json
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.parser.error_policy, ErrorPolicy::Surface);
        assert_eq!(config.parser.max_errors, 10);
        assert_eq!(config.writer.dialect, Dialect::Edifact);
        assert!(config.writer.emit_una);
        let delimiters = config.writer.delimiters.unwrap();
        assert_eq!(delimiters.repeat, Some('*'));
        assert_eq!(delimiters.decimal, ',');
        assert_eq!(config.report, ReportFormat::Json);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(EngineConfig::from_yaml("color: neon\n").is_err());
        assert!(EngineConfig::from_yaml("report: html\n").is_err());
    }

    #[test]
    fn test_empty_file() {
        assert_eq!(EngineConfig::from_yaml("\n").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "writer:\n  line_breaks: true").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert!(config.writer.line_breaks);

        let missing = EngineConfig::load(Path::new("/nonexistent/edi.yaml")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read config file"));
    }
}

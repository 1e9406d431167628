//! Comparison settings, loadable from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationStyles;
use crate::errors::ConfigError;

/// Thresholds, attachment kinds and annotation styles for a comparison run.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// figure_threshold = 0.9
///
/// [styles.delete]
/// color = [0.8, 0.0, 0.0]
/// stroke_width = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Minimum similarity for a sentence pair to count as matched.
    pub sentence_threshold: f64,
    /// Minimum similarity for a figure pair to count as matched.
    pub figure_threshold: f64,
    /// Minimum similarity for a table pair to count as matched.
    pub table_threshold: f64,
    /// Attachment suffixes treated as tables, matched case-insensitively.
    pub table_extensions: Vec<String>,
    /// Attachment suffixes treated as figures, matched case-insensitively.
    pub figure_extensions: Vec<String>,
    pub styles: AnnotationStyles,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            sentence_threshold: 0.65,
            figure_threshold: 0.8,
            table_threshold: 0.65,
            table_extensions: vec![".xlsx".into(), ".xls".into(), ".csv".into()],
            figure_extensions: vec![".png".into(), ".jpg".into(), ".jpeg".into()],
            styles: AnnotationStyles::default(),
        }
    }
}

impl CompareConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject thresholds outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("sentence_threshold", self.sentence_threshold),
            ("figure_threshold", self.figure_threshold),
            ("table_threshold", self.table_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

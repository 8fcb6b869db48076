//! Keyword classification of validator output.
//!
//! The validator's text output is not a stable format, so lines are
//! classified by keyword presence only. Error keywords are checked first
//! and win: a line such as "no errors found" is classified as an error.
//! That precedence is kept as is and is a known source of false errors.

use serde::{Deserialize, Serialize};

use crate::config::ValidatorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineClass {
    Error,
    Warning,
    Info,
}

/// Non-empty, trimmed output lines sorted into the three classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedOutput {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputClassifier {
    error_keywords: Vec<String>,
    warning_keywords: Vec<String>,
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::from_config(&ValidatorConfig::default())
    }
}

impl OutputClassifier {
    pub fn new(error_keywords: Vec<String>, warning_keywords: Vec<String>) -> Self {
        let lower = |v: Vec<String>| v.into_iter().map(|k| k.to_lowercase()).collect();
        Self {
            error_keywords: lower(error_keywords),
            warning_keywords: lower(warning_keywords),
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(
            config.error_keywords.clone(),
            config.warning_keywords.clone(),
        )
    }

    pub fn classify_line(&self, line: &str) -> LineClass {
        let lowered = line.to_lowercase();
        if self.error_keywords.iter().any(|k| lowered.contains(k.as_str())) {
            LineClass::Error
        } else if self.warning_keywords.iter().any(|k| lowered.contains(k.as_str())) {
            LineClass::Warning
        } else {
            LineClass::Info
        }
    }

    pub fn parse(&self, output: &str) -> ParsedOutput {
        let mut parsed = ParsedOutput::default();
        for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let bucket = match self.classify_line(line) {
                LineClass::Error => &mut parsed.errors,
                LineClass::Warning => &mut parsed.warnings,
                LineClass::Info => &mut parsed.info,
            };
            bucket.push(line.to_string());
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_line_is_an_error() {
        let c = OutputClassifier::default();
        assert_eq!(
            c.classify_line("Schema validation error: missing required property 'title'"),
            LineClass::Error
        );
    }

    #[test]
    fn error_keywords_take_precedence_over_warnings() {
        let c = OutputClassifier::default();
        assert_eq!(c.classify_line("WARNING: constraint not met"), LineClass::Error);
        assert_eq!(c.classify_line("warn: deprecated prop"), LineClass::Warning);
        // Known misclassification kept for compatibility.
        assert_eq!(c.classify_line("No errors found"), LineClass::Error);
        assert_eq!(c.classify_line("Loaded 3 documents"), LineClass::Info);
    }

    #[test]
    fn parse_skips_blank_lines_and_trims() {
        let c = OutputClassifier::default();
        let parsed = c.parse("  Validating ssp.json\n\n  ERROR: bad uuid  \nwarning: long title\n");
        assert_eq!(parsed.errors, vec!["ERROR: bad uuid"]);
        assert_eq!(parsed.warnings, vec!["warning: long title"]);
        assert_eq!(parsed.info, vec!["Validating ssp.json"]);
    }

    #[test]
    fn keywords_are_configurable() {
        let c = OutputClassifier::new(vec!["FATAL".into()], vec!["notice".into()]);
        assert_eq!(c.classify_line("fatal: stop"), LineClass::Error);
        assert_eq!(c.classify_line("Notice: check"), LineClass::Warning);
        assert_eq!(c.classify_line("error: not configured"), LineClass::Info);
    }
}

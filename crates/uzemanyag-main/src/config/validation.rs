// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Magyar Üzemanyagárak.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

/// Problems found in an [`AppConfig`](super::AppConfig), addressed by field path
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Prevent the configuration from being used
    pub errors: Vec<ValidationIssue>,
    /// Logged at startup, the configuration is still used
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn add_error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(field, message));
    }

    pub fn add_warning(&mut self, field: &'static str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// All errors as one line, `field: message; ...`
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// e.g. "home_assistant.base_url"
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_errors_fail() {
        let mut result = ValidationResult::default();
        result.add_warning("home_assistant.token", "No token configured");
        assert!(!result.has_errors());
        assert_eq!(result.error_summary(), "");

        result.add_error("system.log_level", "Unknown log level 'loud'");
        result.add_error("home_assistant.token", "Token cannot be empty");
        assert!(result.has_errors());
        assert_eq!(
            result.error_summary(),
            "system.log_level: Unknown log level 'loud'; home_assistant.token: Token cannot be empty"
        );
    }

    #[test]
    fn test_merge_keeps_section_order() {
        let mut top = ValidationResult::default();
        top.add_error("system.log_level", "bad");
        let mut section = ValidationResult::default();
        section.add_error("home_assistant.base_url", "bad");
        section.add_warning("home_assistant.enabled", "ignored");

        top.merge(section);

        let fields: Vec<&str> = top.errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, ["system.log_level", "home_assistant.base_url"]);
        assert_eq!(
            top.warnings,
            [ValidationIssue::new("home_assistant.enabled", "ignored")]
        );
    }
}

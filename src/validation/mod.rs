//! Configuration diagnostics and input validation.

pub mod paths;
pub mod report;
pub mod url;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// The configuration file as a whole is unusable.
    Error,
    /// A section was defaulted or a feature omitted.
    Warning,
}

/// A validation issue found during configuration resolution.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Path to the problematic config field (e.g., "crawler_run_config.cache_mode").
    pub path: String,
    /// Description of the issue.
    pub message: String,
    /// Optional suggestion for fixing the issue.
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Creates a new error-level validation issue.
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Error,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Creates a new warning-level validation issue.
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Warning,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Adds a suggestion to this validation issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Issues collected while resolving a configuration.
#[derive(Debug, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Creates an empty validation result.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Adds an issue to the result.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Logs an issue, then adds it to the result.
    pub fn record(&mut self, issue: ValidationIssue) {
        match issue.severity {
            ValidationSeverity::Error => tracing::error!(
                path = %issue.path,
                message = %issue.message,
                suggestion = ?issue.suggestion,
                "Config error"
            ),
            ValidationSeverity::Warning => tracing::warn!(
                path = %issue.path,
                message = %issue.message,
                suggestion = ?issue.suggestion,
                "Config validation warning"
            ),
        }
        self.add(issue);
    }

    /// Returns true if there are no errors (warnings are allowed).
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == ValidationSeverity::Error)
    }

    /// Returns an iterator over error-level issues.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Error)
    }

    /// Returns an iterator over warning-level issues.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
    }

    /// Returns all issues in the order they were found.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Returns the total number of issues.
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Returns the number of errors.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// Finds the known name closest to `input` using Levenshtein distance.
pub fn closest_match<'a>(input: &str, known: &[&'a str]) -> Option<&'a str> {
    known
        .iter()
        .min_by_key(|k| strsim::levenshtein(input, k))
        .copied()
}

/// Builds a "did you mean" suggestion when `input` is reasonably close to a known name.
pub fn did_you_mean(input: &str, known: &[&str]) -> Option<String> {
    let candidate = closest_match(input, known)?;
    let distance = strsim::levenshtein(&input.to_lowercase(), &candidate.to_lowercase());
    (distance <= candidate.len() / 2).then(|| format!("Did you mean '{}'?", candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_make_the_result_invalid() {
        let mut result = ValidationResult::new();
        result.add(ValidationIssue::warning("output_format", "unknown"));
        assert!(result.is_valid());

        result.add(ValidationIssue::error("config.json", "missing"));
        assert!(!result.is_valid());
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.issue_count(), 2);
    }

    #[test]
    fn suggestions_only_for_near_misses() {
        let known = ["markdown", "fit_markdown", "html"];
        assert_eq!(
            did_you_mean("fit_markdwn", &known).as_deref(),
            Some("Did you mean 'fit_markdown'?")
        );
        assert_eq!(did_you_mean("zzzzzzzzzzzzzzzz", &known), None);
    }
}

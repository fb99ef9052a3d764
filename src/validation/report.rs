//! Validation report formatting.
//!
//! Issues are grouped by the config section they belong to. File-level
//! errors (missing file, bad JSON) come first.

use super::{ValidationIssue, ValidationResult, ValidationSeverity};
use crate::config::section::SectionKey;

/// Formats a validation result into a human-readable report.
pub fn format_report(result: &ValidationResult) -> String {
    if result.issue_count() == 0 {
        return "Configuration is valid.".to_string();
    }

    let (file_level, by_section) = group(result.issues());
    let mut report = String::new();

    if !file_level.is_empty() {
        report.push_str("\nConfig File Unusable\n");
        report.push_str("====================\n");
        for issue in &file_level {
            report.push_str(&format_issue(issue, &issue.path));
        }
    }

    for (key, issues) in &by_section {
        report.push_str(&format!("\n[{}]\n", key));
        for issue in issues {
            report.push_str(&format_issue(issue, relative_path(&issue.path, *key)));
        }
    }

    let warnings = result.warnings().count();
    let errors = result.error_count();
    report.push_str("\n---\n");
    report.push_str(&format!(
        "{} warning(s), {} error(s) in {} section(s)\n",
        warnings,
        errors,
        by_section.len()
    ));

    if file_level.is_empty() {
        report.push_str("Sections not listed use the configured values.\n");
    } else {
        report.push_str("Every section falls back to its default.\n");
    }

    report
}

type SectionGroups<'a> = Vec<(SectionKey, Vec<&'a ValidationIssue>)>;

/// Splits issues into file-level ones and per-section groups in section order.
fn group(issues: &[ValidationIssue]) -> (Vec<&ValidationIssue>, SectionGroups<'_>) {
    let mut file_level = Vec::new();
    let mut by_section: SectionGroups<'_> = Vec::new();

    for issue in issues {
        match section_of(&issue.path) {
            Some(key) => match by_section.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(issue),
                None => by_section.push((key, vec![issue])),
            },
            None => file_level.push(issue),
        }
    }

    by_section.sort_by_key(|(key, _)| SectionKey::ALL.iter().position(|k| k == key));
    (file_level, by_section)
}

/// The section an issue path falls under, by its first segment.
fn section_of(path: &str) -> Option<SectionKey> {
    let head = path.split('.').next().unwrap_or(path);
    SectionKey::ALL.into_iter().find(|key| key.as_str() == head)
}

/// The issue path below its section, or the section itself.
fn relative_path(path: &str, key: SectionKey) -> &str {
    path.strip_prefix(key.as_str())
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(path)
}

fn format_issue(issue: &ValidationIssue, shown: &str) -> String {
    let prefix = match issue.severity {
        ValidationSeverity::Error => "ERROR",
        ValidationSeverity::Warning => "WARNING",
    };

    let mut output = format!("  {} {}\n", prefix, shown);
    output.push_str(&format!("    └─ {}\n", issue.message));

    if let Some(suggestion) = &issue.suggestion {
        output.push_str(&format!("       {}\n", suggestion));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_result_reports_valid() {
        assert_eq!(format_report(&ValidationResult::new()), "Configuration is valid.");
    }

    #[test]
    fn warnings_are_grouped_under_their_section() {
        let mut result = ValidationResult::new();
        result.add(
            ValidationIssue::warning("crawler_run_config.cache_mode", "Unknown cache mode 'bypas'")
                .with_suggestion("Did you mean 'BYPASS'?"),
        );
        result.add(
            ValidationIssue::warning("output_format", "Unknown output format 'htm'")
                .with_suggestion("Did you mean 'html'?"),
        );
        result.add(ValidationIssue::warning(
            "crawler_run_config.markdown_generator_config.content_filter_choice",
            "Unknown content filter choice 'prune'",
        ));

        let report = format_report(&result);
        assert!(!report.contains("Config File Unusable"));
        assert!(report.contains("\n[crawler_run_config]\n"));
        assert!(report.contains("WARNING cache_mode"));
        assert!(report.contains("WARNING markdown_generator_config.content_filter_choice"));
        assert!(report.contains("Did you mean 'html'?"));
        assert!(report.contains("3 warning(s), 0 error(s) in 2 section(s)"));

        let output_at = report.find("[output_format]").unwrap();
        let run_at = report.find("[crawler_run_config]").unwrap();
        assert!(output_at < run_at);
    }

    #[test]
    fn file_errors_come_before_sections() {
        let mut result = ValidationResult::new();
        result.add(ValidationIssue::warning("browser_config", "Expected an object"));
        result.add(ValidationIssue::error(
            "/srv/config.yaml",
            "Config file '/srv/config.yaml' is not a .json file",
        ));

        let report = format_report(&result);
        let file_at = report.find("Config File Unusable").unwrap();
        let section_at = report.find("[browser_config]").unwrap();
        assert!(file_at < section_at);
        assert!(report.contains("ERROR /srv/config.yaml"));
        assert!(report.contains("Every section falls back to its default."));
    }
}

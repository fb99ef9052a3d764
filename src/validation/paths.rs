//! Path validation for the configuration file.

use std::path::Path;

use super::{ValidationIssue, ValidationResult};
use crate::error::ConfigError;

/// Validates that the configuration path exists and names a `.json` file.
pub fn validate(path: &Path) -> ValidationResult {
    let mut result = ValidationResult::new();
    let shown = path.display().to_string();

    for (fault, suggestion) in faults(path) {
        result.add(
            ValidationIssue::error(shown.clone(), fault.to_string()).with_suggestion(suggestion),
        );
    }

    result
}

/// The construction-time gate, reporting the first reason it is closed.
pub fn check(path: &Path) -> Result<(), ConfigError> {
    match faults(path).into_iter().next() {
        Some((fault, _)) => Err(fault),
        None => Ok(()),
    }
}

/// True iff the path exists and has a `.json` extension.
pub fn is_usable(path: &Path) -> bool {
    check(path).is_ok()
}

fn faults(path: &Path) -> Vec<(ConfigError, &'static str)> {
    let mut faults = Vec::new();
    if !path.exists() {
        faults.push((
            ConfigError::NotFound {
                path: path.to_path_buf(),
            },
            "Create the file or pass --config",
        ));
    }
    if !has_json_extension(path) {
        faults.push((
            ConfigError::NotJson {
                path: path.to_path_buf(),
            },
            "Rename the file with a .json extension",
        ));
    }
    faults
}

/// Checks the extension case-insensitively.
fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn existing_json_file_is_usable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.JSON");
        std::fs::write(&path, "{}").unwrap();

        assert!(is_usable(&path));
        assert!(validate(&path).is_valid());
    }

    #[test]
    fn missing_or_wrong_extension_closes_the_gate() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("config.yaml");
        std::fs::write(&yaml, "a: 1").unwrap();

        assert!(!is_usable(&yaml));
        assert!(!is_usable(&dir.path().join("absent.json")));
        assert_eq!(validate(&dir.path().join("absent.yaml")).error_count(), 2);
    }

    #[test]
    fn check_names_the_reason_the_gate_is_closed() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("config.yaml");
        std::fs::write(&yaml, "a: 1").unwrap();
        let absent = dir.path().join("absent.json");

        assert!(matches!(check(&absent), Err(ConfigError::NotFound { path }) if path == absent));
        assert!(matches!(check(&yaml), Err(ConfigError::NotJson { path }) if path == yaml));

        let messages: Vec<String> = validate(&absent).errors().map(|i| i.message.clone()).collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("does not exist"));
    }
}

//! Configuration file loading and parsing.

use std::path::Path;

use super::section::{ConfigDocument, Section, SectionKey};
use crate::error::ConfigError;

/// Reads the configuration file from disk and parses it.
pub fn read_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    ConfigDocument::parse(path, &content)
}

/// Reads the configuration file, degrading to a section-less document on any fault.
pub fn load_document(path: &Path) -> ConfigDocument {
    match read_document(path) {
        Ok(document) => {
            tracing::info!(
                path = %path.display(),
                fingerprint = document.fingerprint().unwrap_or_default(),
                sections = document.root().len(),
                "Configuration document loaded"
            );
            document
        }
        Err(e) => {
            tracing::warn!(error = %e, "Configuration unavailable, defaults will be used");
            ConfigDocument::unavailable(e)
        }
    }
}

/// Loads a single section straight from disk.
///
/// Returns `{}` for mapping sections and `""` for text sections when the file
/// is unreadable, malformed, has a non-object root, or the section is absent
/// or of the wrong type.
pub fn load_config_section(path: &Path, key: SectionKey) -> Section {
    load_document(path).section(key)
}

//! Section keys and the parsed configuration document.
//!
//! A [`ConfigDocument`] is parsed once per cache epoch. Every presence,
//! emptiness and shape check afterwards runs against the in-memory root map.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

/// JSON object type used for mapping-shaped sections.
pub type Mapping = Map<String, Value>;

/// Identifier of a top-level configuration section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKey {
    OutputFormat,
    BrowserConfig,
    CrawlerRunConfig,
    MarkdownGeneratorConfig,
    ContentFilterChoice,
    PruningContentFilterConfig,
    Bm25ContentFilterConfig,
}

impl SectionKey {
    /// Every recognized section, in document order.
    pub const ALL: [SectionKey; 7] = [
        SectionKey::OutputFormat,
        SectionKey::BrowserConfig,
        SectionKey::CrawlerRunConfig,
        SectionKey::MarkdownGeneratorConfig,
        SectionKey::ContentFilterChoice,
        SectionKey::PruningContentFilterConfig,
        SectionKey::Bm25ContentFilterConfig,
    ];

    /// The key as it appears in the JSON document.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::OutputFormat => "output_format",
            SectionKey::BrowserConfig => "browser_config",
            SectionKey::CrawlerRunConfig => "crawler_run_config",
            SectionKey::MarkdownGeneratorConfig => "markdown_generator_config",
            SectionKey::ContentFilterChoice => "content_filter_choice",
            SectionKey::PruningContentFilterConfig => "pruning_content_filter_config",
            SectionKey::Bm25ContentFilterConfig => "BM25_content_filter_config",
        }
    }

    /// The JSON shape this section must have.
    pub fn shape(self) -> SectionShape {
        match self {
            SectionKey::OutputFormat | SectionKey::ContentFilterChoice => SectionShape::Text,
            _ => SectionShape::Mapping,
        }
    }

    /// Value substituted when the section is absent, empty or malformed.
    pub fn default_section(self) -> Section {
        match self.shape() {
            SectionShape::Text => Section::Text(String::new()),
            SectionShape::Mapping => Section::Mapping(Mapping::new()),
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared JSON shape of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionShape {
    /// A JSON string.
    Text,
    /// A JSON object.
    Mapping,
}

/// A section value that passed the shape check.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Text(String),
    Mapping(Mapping),
}

impl Section {
    /// Returns true for an empty string or an empty object.
    pub fn is_empty(&self) -> bool {
        match self {
            Section::Text(text) => text.is_empty(),
            Section::Mapping(mapping) => mapping.is_empty(),
        }
    }

    /// Returns the string value, if this is a text section.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Section::Text(text) => Some(text),
            Section::Mapping(_) => None,
        }
    }

    /// Consumes the section, returning the object if this is a mapping.
    pub fn into_mapping(self) -> Option<Mapping> {
        match self {
            Section::Mapping(mapping) => Some(mapping),
            Section::Text(_) => None,
        }
    }
}

/// Outcome of probing a section: the three-way branch builders act on,
/// plus the shape fault that counts as "empty" for defaulting purposes.
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    /// The key is not in the mapping.
    Missing,
    /// The key is present with an empty string or empty object.
    Empty,
    /// The key is present with a value of the wrong JSON type.
    WrongShape { found: &'static str },
    /// The key is present with a usable value.
    Present(Section),
}

impl Presence {
    /// Collapses the presence into the section, if usable.
    pub fn into_section(self) -> Option<Section> {
        match self {
            Presence::Present(section) => Some(section),
            _ => None,
        }
    }
}

/// Checks `key` inside an arbitrary JSON object.
pub fn presence_in(mapping: &Mapping, key: SectionKey) -> Presence {
    let Some(value) = mapping.get(key.as_str()) else {
        return Presence::Missing;
    };

    let section = match (key.shape(), value) {
        (SectionShape::Text, Value::String(text)) => Section::Text(text.clone()),
        (SectionShape::Mapping, Value::Object(object)) => Section::Mapping(object.clone()),
        (_, other) => {
            return Presence::WrongShape {
                found: json_type_name(other),
            }
        }
    };

    if section.is_empty() {
        Presence::Empty
    } else {
        Presence::Present(section)
    }
}

/// The parsed configuration file for one cache epoch.
#[derive(Debug)]
pub struct ConfigDocument {
    root: Mapping,
    fingerprint: Option<String>,
    loaded_at: DateTime<Utc>,
    fault: Option<ConfigError>,
}

impl ConfigDocument {
    /// Parses file content into a document whose root must be an object.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let root = match value {
            Value::Object(root) => root,
            other => {
                return Err(ConfigError::RootNotObject {
                    path: path.to_path_buf(),
                    found: json_type_name(&other),
                })
            }
        };

        Ok(Self {
            root,
            fingerprint: Some(hex::encode(Sha256::digest(content.as_bytes()))),
            loaded_at: Utc::now(),
            fault: None,
        })
    }

    /// Builds a document with no sections, remembering why the file was unusable.
    pub fn unavailable(fault: ConfigError) -> Self {
        Self {
            root: Mapping::new(),
            fingerprint: None,
            loaded_at: Utc::now(),
            fault: Some(fault),
        }
    }

    /// Builds a document with no sections and no fault.
    pub fn empty() -> Self {
        Self {
            root: Mapping::new(),
            fingerprint: None,
            loaded_at: Utc::now(),
            fault: None,
        }
    }

    /// SHA-256 of the file content this document was parsed from.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// When this document was read.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Why the file could not be used, if it could not.
    pub fn fault(&self) -> Option<&ConfigError> {
        self.fault.as_ref()
    }

    /// The root object.
    pub fn root(&self) -> &Mapping {
        &self.root
    }

    /// True iff the root contains `key`, whatever its value.
    pub fn section_exists(&self, key: SectionKey) -> bool {
        self.root.contains_key(key.as_str())
    }

    /// True iff the section is absent, empty or of the wrong shape.
    pub fn section_is_empty(&self, key: SectionKey) -> bool {
        !matches!(self.presence(key), Presence::Present(_))
    }

    /// Checks a top-level section.
    pub fn presence(&self, key: SectionKey) -> Presence {
        presence_in(&self.root, key)
    }

    /// Returns the section value, or the key's typed default on any fault.
    pub fn section(&self, key: SectionKey) -> Section {
        match self.presence(key) {
            Presence::Present(section) => section,
            Presence::WrongShape { found } => {
                tracing::warn!(
                    section = %key,
                    found,
                    "Config section has the wrong JSON type, using default"
                );
                key.default_section()
            }
            Presence::Missing | Presence::Empty => key.default_section(),
        }
    }
}

/// Human-readable JSON type name for diagnostics.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

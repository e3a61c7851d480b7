use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Reserved top-level section carrying the MCF format version
pub const MCF_SECTION: &str = "mcf";

/// Section-level key naming a parent MCF file to inherit from
pub const BASE_MCF_KEY: &str = "base_mcf";

/// MCF format version written by the extractor
pub const MCF_VERSION: &str = "1.0.0";

/// Where an MCF document comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum McfSource {
    /// An already parsed mapping, used as-is
    Mapping(Mapping),
    /// YAML text
    Text(String),
    /// A YAML file on disk
    Path(PathBuf),
}

impl McfSource {
    /// Human readable label used in log lines and error messages.
    pub fn describe(&self) -> String {
        match self {
            McfSource::Mapping(_) => "<mapping>".to_string(),
            McfSource::Text(_) => "<string>".to_string(),
            McfSource::Path(p) => p.display().to_string(),
        }
    }
}

/// A string containing `metadata` is YAML text, anything else is a path.
impl From<&str> for McfSource {
    fn from(value: &str) -> Self {
        if value.contains("metadata") {
            McfSource::Text(value.to_string())
        } else {
            McfSource::Path(PathBuf::from(value))
        }
    }
}

impl From<String> for McfSource {
    fn from(value: String) -> Self {
        if value.contains("metadata") {
            McfSource::Text(value)
        } else {
            McfSource::Path(PathBuf::from(value))
        }
    }
}

impl From<&Path> for McfSource {
    fn from(value: &Path) -> Self {
        McfSource::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for McfSource {
    fn from(value: PathBuf) -> Self {
        McfSource::Path(value)
    }
}

impl From<Mapping> for McfSource {
    fn from(value: Mapping) -> Self {
        McfSource::Mapping(value)
    }
}

impl From<McfRecord> for McfSource {
    fn from(value: McfRecord) -> Self {
        McfSource::Mapping(value.into_mapping())
    }
}

/// The merged result of an MCF document and all of its `base_mcf` parents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct McfRecord {
    sections: Mapping,
}

impl McfRecord {
    pub fn new(sections: Mapping) -> Self {
        McfRecord { sections }
    }

    /// The `mcf.version` value, if present and a string
    pub fn version(&self) -> Option<&str> {
        self.get(MCF_SECTION, "version").and_then(Value::as_str)
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    /// Look up `section.key`
    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.section(section)
            .and_then(Value::as_mapping)
            .and_then(|m| m.get(key))
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.sections
    }

    pub fn into_mapping(self) -> Mapping {
        self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(&self.sections)?)
    }
}

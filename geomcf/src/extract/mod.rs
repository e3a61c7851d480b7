// Field extraction: ISO 19139 XML → flat property set → MCF mapping.

mod table;
mod xml;

pub use table::{McfField, PathTable, PropertyPath, MCF_FIELDS};
pub use xml::{resolve_path, XmlElement};

use crate::error::{GeoMcfError, Result};
use crate::mcf::{write_mcf, MCF_SECTION, MCF_VERSION};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// The value extracted for one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    None,
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    fn from_matches(mut matches: Vec<String>) -> Self {
        match matches.len() {
            0 => FieldValue::None,
            1 => FieldValue::Scalar(matches.remove(0)),
            _ => FieldValue::List(matches),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FieldValue::None)
    }

    pub fn to_yaml(&self) -> Value {
        match self {
            FieldValue::None => Value::Null,
            FieldValue::Scalar(s) => Value::String(s.clone()),
            FieldValue::List(items) => {
                Value::Sequence(items.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Always a sequence: `None` is empty, a scalar is a one-item list.
    pub fn to_yaml_list(&self) -> Value {
        match self {
            FieldValue::None => Value::Sequence(Vec::new()),
            FieldValue::Scalar(s) => Value::Sequence(vec![Value::String(s.clone())]),
            FieldValue::List(_) => self.to_yaml(),
        }
    }
}

/// Extracted properties in path-table order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatPropertySet {
    values: Vec<(String, FieldValue)>,
}

impl FlatPropertySet {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.values.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolve every property of `table` against a parsed document. The fallback
/// path is consulted only when the primary path has no matches.
pub fn extract_properties(root: &XmlElement, table: &PathTable) -> FlatPropertySet {
    let mut properties = FlatPropertySet::default();

    for entry in table.iter() {
        let mut matches = resolve_path(root, &entry.primary);
        if matches.is_empty() {
            if let Some(fallback) = &entry.fallback {
                matches = resolve_path(root, fallback);
            }
        }
        properties.insert(entry.name, FieldValue::from_matches(matches));
    }

    properties
}

/// Build an MCF document (`mcf` version section plus `metadata`) from
/// extracted properties. Properties missing from the set are written as null.
pub fn build_mcf(properties: &FlatPropertySet) -> Mapping {
    let mut version = Mapping::new();
    version.insert("version".into(), MCF_VERSION.into());

    let mut metadata = Mapping::new();
    for field in MCF_FIELDS {
        let value = properties.get(field.property).unwrap_or(&FieldValue::None);
        let yaml = if field.list {
            value.to_yaml_list()
        } else {
            value.to_yaml()
        };
        metadata.insert(field.key.into(), yaml);
    }

    let mut document = Mapping::new();
    document.insert(MCF_SECTION.into(), Value::Mapping(version));
    document.insert("metadata".into(), Value::Mapping(metadata));
    document
}

/// Parse an XML string and build its MCF document.
pub fn xml_to_mcf(xml: &str) -> Result<Mapping> {
    let root = XmlElement::parse(xml)?;
    let properties = extract_properties(&root, PathTable::iso19139());
    if properties.iter().all(|(_, value)| value.is_none()) {
        log::warn!("no known metadata properties found under <{}>", root.name);
    }
    Ok(build_mcf(&properties))
}

/// Extract `xml_path` into `<mcf_dir>/<stem>.yml` and return the written path.
pub fn extract_file(xml_path: &Path, mcf_dir: &Path) -> Result<PathBuf> {
    let xml = std::fs::read_to_string(xml_path).map_err(|source| GeoMcfError::Read {
        path: xml_path.to_path_buf(),
        source,
    })?;
    let stem = xml_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            GeoMcfError::Extraction(format!("invalid file name: {}", xml_path.display()))
        })?;

    let document = xml_to_mcf(&xml)?;
    let mcf_path = mcf_dir.join(format!("{stem}.yml"));
    write_mcf(&mcf_path, &document)?;
    log::info!("wrote {}", mcf_path.display());

    Ok(mcf_path)
}

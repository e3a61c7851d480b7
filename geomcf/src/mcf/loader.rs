use super::types::{McfRecord, McfSource, BASE_MCF_KEY};
use crate::error::{GeoMcfError, Result};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A parsed MCF document together with the directory its `base_mcf`
/// references are resolved against.
struct LoadedDocument {
    label: String,
    base_dir: PathBuf,
    canonical: Option<PathBuf>,
    mapping: Mapping,
}

/// Load an MCF document, follow its `base_mcf` chain and merge everything
/// into a single record.
pub fn read_mcf(source: impl Into<McfSource>) -> Result<McfRecord> {
    let source = source.into();
    log::debug!("reading MCF {}", source.describe());

    let mut chain = Vec::new();
    let mut visits = Visits::default();
    collect_documents(source, &mut chain, &mut visits)?;

    let record = McfRecord::new(merge_documents(chain));

    match record.version() {
        Some(version) => log::info!("MCF version: {version}"),
        None => log::info!("no MCF version specified"),
    }

    Ok(record)
}

/// Merge documents in order. New sections are copied whole, existing mapping
/// sections are updated key by key. `base_mcf` directives are dropped.
pub fn merge_documents<I>(documents: I) -> Mapping
where
    I: IntoIterator<Item = Mapping>,
{
    let mut merged = Mapping::new();

    for document in documents {
        for (section, value) in document {
            match strip_base_mcf(value) {
                Value::Mapping(incoming) => match merged.get_mut(&section) {
                    Some(Value::Mapping(existing)) => {
                        log::debug!("section {} exists. Adding options", section_name(&section));
                        for (key, option) in incoming {
                            existing.insert(key, option);
                        }
                    }
                    _ => {
                        log::debug!("section {} does not exist. Adding", section_name(&section));
                        merged.insert(section, Value::Mapping(incoming));
                    }
                },
                other => {
                    merged.insert(section, other);
                }
            }
        }
    }

    merged
}

/// Serialize a mapping to a YAML file.
pub fn write_mcf(path: &Path, mapping: &Mapping) -> Result<()> {
    let yaml = serde_yaml::to_string(mapping)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Canonical paths seen while walking the inclusion graph.
#[derive(Default)]
struct Visits {
    /// Files on the current inclusion path
    in_progress: HashSet<PathBuf>,
    /// Files already pushed to the chain
    included: HashSet<PathBuf>,
}

/// Depth-first walk of the inclusion graph. Bases land in `chain` before the
/// document that references them. A file reached a second time through
/// another parent keeps its first position and is not merged again.
fn collect_documents(
    source: McfSource,
    chain: &mut Vec<Mapping>,
    visits: &mut Visits,
) -> Result<()> {
    let document = load_document(source)?;

    if let Some(canonical) = &document.canonical {
        if visits.in_progress.contains(canonical) {
            return Err(GeoMcfError::CircularInclusion {
                path: canonical.clone(),
            });
        }
        if visits.included.contains(canonical) {
            log::debug!("{} already included", document.label);
            return Ok(());
        }
        visits.in_progress.insert(canonical.clone());
    }

    for base in base_references(&document)? {
        let base_path = document.base_dir.join(&base);
        log::debug!("{} inherits from {}", document.label, base_path.display());
        collect_documents(McfSource::Path(base_path), chain, visits)?;
    }

    if let Some(canonical) = document.canonical {
        visits.in_progress.remove(&canonical);
        visits.included.insert(canonical);
    }

    chain.push(document.mapping);
    Ok(())
}

fn load_document(source: McfSource) -> Result<LoadedDocument> {
    let label = source.describe();

    match source {
        McfSource::Mapping(mapping) => {
            log::debug!("mcf object is already a mapping");
            Ok(LoadedDocument {
                label,
                base_dir: PathBuf::new(),
                canonical: None,
                mapping,
            })
        }
        McfSource::Text(text) => {
            log::debug!("mcf object is a string");
            Ok(LoadedDocument {
                mapping: parse_mapping(&text, &label)?,
                label,
                base_dir: PathBuf::new(),
                canonical: None,
            })
        }
        McfSource::Path(path) => {
            log::debug!("mcf object is a file path");
            let content = std::fs::read_to_string(&path).map_err(|source| GeoMcfError::Read {
                path: path.clone(),
                source,
            })?;
            let canonical = std::fs::canonicalize(&path)
                .map_err(|source| GeoMcfError::Read {
                    path: path.clone(),
                    source,
                })?;
            let base_dir = canonical
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();

            Ok(LoadedDocument {
                mapping: parse_mapping(&content, &label)?,
                label,
                base_dir,
                canonical: Some(canonical),
            })
        }
    }
}

/// Parse YAML text whose top level must be a mapping. An empty document is an
/// empty mapping.
fn parse_mapping(text: &str, label: &str) -> Result<Mapping> {
    let value: Value = serde_yaml::from_str(text)?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => Err(GeoMcfError::Mcf(format!(
            "{label}: top level must be a mapping, got {}",
            type_name(&other)
        ))),
    }
}

/// `base_mcf` values of every section, in section order.
fn base_references(document: &LoadedDocument) -> Result<Vec<String>> {
    let mut bases = Vec::new();

    for (section, value) in &document.mapping {
        let Some(base) = value.as_mapping().and_then(|m| m.get(BASE_MCF_KEY)) else {
            continue;
        };
        match base.as_str() {
            Some(path) => bases.push(path.to_string()),
            None => {
                return Err(GeoMcfError::Mcf(format!(
                    "{}: {}.{BASE_MCF_KEY} must be a string path",
                    document.label,
                    section_name(section)
                )))
            }
        }
    }

    Ok(bases)
}

fn strip_base_mcf(value: Value) -> Value {
    match value {
        Value::Mapping(mut mapping) => {
            mapping.remove(BASE_MCF_KEY);
            Value::Mapping(mapping)
        }
        other => other,
    }
}

fn section_name(section: &Value) -> String {
    match section {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

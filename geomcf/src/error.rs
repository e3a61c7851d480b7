use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoMcfError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing metadata template '{name}' (searched: {})", display_paths(.search_path))]
    MissingTemplate {
        name: String,
        search_path: Vec<PathBuf>,
    },

    #[error("Invalid date string: {value}")]
    InvalidDate { value: String },

    #[error("Circular base_mcf inclusion: {}", .path.display())]
    CircularInclusion { path: PathBuf },

    #[error("MCF error: {0}")]
    Mcf(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("{0}")]
    Other(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, GeoMcfError>;

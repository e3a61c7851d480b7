pub mod batch;
pub mod config;
pub mod date;
pub mod error;
pub mod extract;
pub mod mcf;
pub mod render;

pub use batch::{run_batch, BatchConfig, BatchListener, BatchReport, LogListener};
pub use config::ProjectConfig;
pub use date::{normalize_datestring, DateFormat, DateValue};
pub use error::{GeoMcfError, Result};
pub use extract::{extract_file, xml_to_mcf};
pub use mcf::{read_mcf, McfRecord, McfSource};
pub use render::{render_template, Renderer, RendererConfig, SchemaSelection};

/// Crate version, exposed to templates as `software_version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Templates shipped with the crate
pub const BUNDLED_TEMPLATES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

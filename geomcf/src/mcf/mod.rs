// Metadata control files: YAML documents that may inherit from each other
// through `base_mcf` references.

mod loader;
mod types;

pub use loader::{merge_documents, read_mcf, write_mcf};
pub use types::{McfRecord, McfSource, BASE_MCF_KEY, MCF_SECTION, MCF_VERSION};

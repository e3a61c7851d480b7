use crate::batch::{BatchConfig, FAIL_DIR, INPUT_DIR, MCF_DIR, OUTPUT_DIR};
use crate::error::{GeoMcfError, Result};
use crate::render::{RendererConfig, SchemaSelection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up by [`ProjectConfig::discover`]
pub const CONFIG_FILE: &str = "geomcf.yaml";

/// Environment variable overriding the templates directory
pub const TEMPLATES_ENV: &str = "GEOMCF_TEMPLATES";

/// Optional per-project settings read from `geomcf.yaml`. Relative paths are
/// resolved against the directory holding the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    #[serde(default)]
    pub default_schema: Option<String>,
    #[serde(default)]
    pub batch: BatchSettings,
    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_mcf_dir")]
    pub mcf_dir: PathBuf,
    #[serde(default = "default_fail_dir")]
    pub fail_dir: PathBuf,
    #[serde(default)]
    pub schema_local: Option<PathBuf>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            mcf_dir: default_mcf_dir(),
            fail_dir: default_fail_dir(),
            schema_local: None,
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from(INPUT_DIR)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(OUTPUT_DIR)
}

fn default_mcf_dir() -> PathBuf {
    PathBuf::from(MCF_DIR)
}

fn default_fail_dir() -> PathBuf {
    PathBuf::from(FAIL_DIR)
}

impl ProjectConfig {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GeoMcfError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse_str(&content, root)
    }

    /// Parse config YAML whose relative paths resolve against `root`.
    pub fn parse_str(content: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut config: ProjectConfig = if content.trim().is_empty() {
            ProjectConfig::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| GeoMcfError::Config(format!("invalid {CONFIG_FILE}: {e}")))?
        };
        config.root = root.into();
        Ok(config)
    }

    /// `<dir>/geomcf.yaml` if it exists, defaults rooted at `dir` otherwise.
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            log::debug!("loading {}", path.display());
            Self::load(&path)
        } else {
            Ok(ProjectConfig {
                root: dir.to_path_buf(),
                ..Default::default()
            })
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured templates directory, or the bundled templates.
    pub fn templates_dir(&self) -> PathBuf {
        match &self.templates_dir {
            Some(dir) => self.resolve(dir),
            None => PathBuf::from(crate::BUNDLED_TEMPLATES_DIR),
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig::new(self.templates_dir())
    }

    /// Batch layout under `root` (the config's own root when `None`).
    /// Without an explicit `schema`, the configured `schema_local` wins over
    /// `default_schema`.
    pub fn batch_config(
        &self,
        root: Option<&Path>,
        schema: Option<SchemaSelection>,
    ) -> Result<BatchConfig> {
        let root = root.unwrap_or(self.root.as_path());
        let settings = &self.batch;

        let schema = match (schema, &settings.schema_local, &self.default_schema) {
            (Some(selection), _, _) if !selection.is_empty() => selection,
            (_, Some(local), _) => SchemaSelection::local(self.resolve(local)),
            (_, None, Some(schema)) => SchemaSelection::named(schema.clone()),
            (_, None, None) => {
                return Err(GeoMcfError::Config(
                    "batch needs a schema: set default_schema or batch.schema_local".into(),
                ))
            }
        };

        Ok(BatchConfig {
            input_dir: root.join(&settings.input_dir),
            output_dir: root.join(&settings.output_dir),
            mcf_dir: root.join(&settings.mcf_dir),
            fail_dir: root.join(&settings.fail_dir),
            schema,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

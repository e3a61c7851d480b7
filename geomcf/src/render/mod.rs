// MCF → XML rendering through a schema's Jinja templates.
//
// A schema is a directory of templates holding an entry template
// (`main.j2`). Templates are looked up in the schema directory first and
// then in the templates root, so schemas can share macros kept under
// `common/`.

mod helpers;
mod pretty;

pub use helpers::{
    get_charstring, get_distribution_language, select_localized, Localized, DEFAULT_LANGUAGE,
};
pub use pretty::pretty_print;

use crate::error::{GeoMcfError, Result};
use crate::mcf::{read_mcf, McfSource};
use minijinja::value::Value;
use minijinja::{context, AutoEscape, Environment, ErrorKind, Template};
use std::path::{Component, Path, PathBuf};

/// Name of the template every schema must provide
pub const ENTRY_TEMPLATE: &str = "main.j2";

/// Directory of shared macros, never listed as a schema
pub const COMMON_DIR: &str = "common";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    pub templates_dir: PathBuf,
    /// Exposed to templates as `software_version`
    pub software_version: String,
    pub entry_template: String,
}

impl RendererConfig {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        RendererConfig {
            templates_dir: templates_dir.into(),
            software_version: crate::VERSION.to_string(),
            entry_template: ENTRY_TEMPLATE.to_string(),
        }
    }

    pub fn with_software_version(mut self, version: impl Into<String>) -> Self {
        self.software_version = version.into();
        self
    }

    pub fn with_entry_template(mut self, name: impl Into<String>) -> Self {
        self.entry_template = name.into();
        self
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig::new(crate::BUNDLED_TEMPLATES_DIR)
    }
}

/// Which templates to render with: a named schema under the templates root,
/// a custom directory, or both (the custom directory is searched first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSelection {
    pub schema: Option<String>,
    pub schema_local: Option<PathBuf>,
}

impl SchemaSelection {
    pub fn named(schema: impl Into<String>) -> Self {
        SchemaSelection {
            schema: Some(schema.into()),
            schema_local: None,
        }
    }

    pub fn local(dir: impl Into<PathBuf>) -> Self {
        SchemaSelection {
            schema: None,
            schema_local: Some(dir.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_none() && self.schema_local.is_none()
    }

    /// Directories searched for templates, in lookup order.
    pub fn search_path(&self, templates_dir: &Path) -> Result<Vec<PathBuf>> {
        if self.is_empty() {
            return Err(GeoMcfError::Config(
                "either a schema or a schema_local directory is required".into(),
            ));
        }

        let mut path = Vec::with_capacity(3);
        if let Some(local) = &self.schema_local {
            path.push(local.clone());
        }
        if let Some(schema) = &self.schema {
            if !is_relative_name(schema) {
                return Err(GeoMcfError::Config(format!("invalid schema name '{schema}'")));
            }
            path.push(templates_dir.join(schema));
        }
        path.push(templates_dir.to_path_buf());

        Ok(path)
    }
}

pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Renderer { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Read an MCF (following `base_mcf` chains) and render it to a
    /// pretty-printed XML string.
    pub fn render(&self, mcf: impl Into<McfSource>, selection: &SchemaSelection) -> Result<String> {
        let search_path = selection.search_path(&self.config.templates_dir)?;
        log::debug!("template search path: {:?}", search_path);

        let env = self.environment(search_path.clone());
        let template = self.entry_template(&env, search_path)?;

        let record = read_mcf(mcf)?;

        log::debug!("processing template {}", self.config.entry_template);
        let xml = template
            .render(context! {
                record => Value::from_serialize(&record),
                software_version => self.config.software_version.as_str(),
            })
            .map_err(render_error)?;

        pretty_print(&xml)
    }

    /// Check that `selection` resolves to a loadable entry template without
    /// rendering anything.
    pub fn check_schema(&self, selection: &SchemaSelection) -> Result<()> {
        let search_path = selection.search_path(&self.config.templates_dir)?;
        let env = self.environment(search_path.clone());
        self.entry_template(&env, search_path)?;
        Ok(())
    }

    fn entry_template<'env>(
        &self,
        env: &'env Environment<'static>,
        search_path: Vec<PathBuf>,
    ) -> Result<Template<'env, 'env>> {
        env.get_template(&self.config.entry_template)
            .map_err(|e| match e.kind() {
                ErrorKind::TemplateNotFound => GeoMcfError::MissingTemplate {
                    name: self.config.entry_template.clone(),
                    search_path,
                },
                _ => GeoMcfError::Template(e),
            })
    }

    /// Schema directories under the templates root, sorted by name.
    pub fn supported_schemas(&self) -> Result<Vec<String>> {
        let entries =
            std::fs::read_dir(&self.config.templates_dir).map_err(|source| GeoMcfError::Read {
                path: self.config.templates_dir.clone(),
                source,
            })?;

        let mut schemas = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name != COMMON_DIR && !name.starts_with('.') {
                    schemas.push(name.to_string());
                }
            }
        }
        schemas.sort();

        Ok(schemas)
    }

    fn environment(&self, search_path: Vec<PathBuf>) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_loader(move |name| load_template(&search_path, name));

        env.add_function("get_charstring", helpers::get_charstring_fn);
        env.add_filter("get_charstring", helpers::get_charstring_fn);
        env.add_function("get_distribution_language", helpers::get_distribution_language_fn);
        env.add_filter("get_distribution_language", helpers::get_distribution_language_fn);
        env.add_function("normalize_datestring", helpers::normalize_datestring_fn);
        env.add_filter("normalize_datestring", helpers::normalize_datestring_fn);
        env.add_function("zip", helpers::zip_fn);
        env.add_filter("xmlescape", helpers::xml_escape_fn);

        env
    }
}

/// Render `mcf` with a fresh [`Renderer`] built from `config`.
pub fn render_template(
    config: &RendererConfig,
    mcf: impl Into<McfSource>,
    schema: Option<&str>,
    schema_local: Option<&Path>,
) -> Result<String> {
    let selection = SchemaSelection {
        schema: schema.map(str::to_string),
        schema_local: schema_local.map(Path::to_path_buf),
    };
    Renderer::new(config.clone()).render(mcf, &selection)
}

fn load_template(
    search_path: &[PathBuf],
    name: &str,
) -> std::result::Result<Option<String>, minijinja::Error> {
    if !is_relative_name(name) {
        return Ok(None);
    }

    for dir in search_path {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return std::fs::read_to_string(&candidate).map(Some).map_err(|e| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template {}", candidate.display()),
                )
                .with_source(e)
            });
        }
    }

    Ok(None)
}

/// Only plain relative names; no `..`, root or drive components.
fn is_relative_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Surface helper failures (bad dates) as themselves rather than as a
/// generic template error.
fn render_error(err: minijinja::Error) -> GeoMcfError {
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(GeoMcfError::InvalidDate { value }) = cause.downcast_ref::<GeoMcfError>() {
            return GeoMcfError::InvalidDate {
                value: value.clone(),
            };
        }
        source = cause.source();
    }
    GeoMcfError::Template(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const RECORD: &str = r#"
mcf:
  version: 1.0
metadata:
  identifier: lake-survey-2017
  datestamp: 2017-03-01 00:00:00
identification:
  title_en: Lake Survey
  title_fr: Relevé du lac
"#;

    fn setup_templates() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("common")).unwrap();
        fs::create_dir_all(root.join("simple")).unwrap();
        fs::create_dir_all(root.join("dated")).unwrap();

        fs::write(
            root.join("common/macros.j2"),
            "{% macro field(name, value) %}<{{ name }}>{{ value|xmlescape }}</{{ name }}>{% endmacro %}",
        )
        .unwrap();
        fs::write(
            root.join("simple/main.j2"),
            r#"{% import "common/macros.j2" as m %}
{% set title = get_charstring('title', record.identification, 'fr', 'en') %}
<record version="{{ software_version }}">

  {{ m.field('id', record.metadata.identifier) }}
  {{ m.field('title', title[0]) }}
  {% if title[1] %}{{ m.field('title_alt', title[1]) }}{% endif %}
  {{ m.field('date', record.metadata.datestamp|normalize_datestring) }}
</record>
"#,
        )
        .unwrap();
        fs::write(
            root.join("dated/main.j2"),
            "<d>{{ normalize_datestring(record.metadata.bad_date) }}</d>",
        )
        .unwrap();

        tmp
    }

    fn renderer(templates: &TempDir) -> Renderer {
        Renderer::new(RendererConfig::new(templates.path()).with_software_version("9.9.9"))
    }

    #[test]
    fn test_render_named_schema() {
        let templates = setup_templates();
        let xml = renderer(&templates)
            .render(RECORD, &SchemaSelection::named("simple"))
            .unwrap();

        let expected = [
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<record version="9.9.9">"#,
            "  <id>lake-survey-2017</id>",
            "  <title>Relevé du lac</title>",
            "  <title_alt>Lake Survey</title_alt>",
            "  <date>2017-03-01</date>",
            "</record>",
        ]
        .join("\n");
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_render_local_schema_takes_precedence() {
        let templates = setup_templates();
        let local = TempDir::new().unwrap();
        fs::write(
            local.path().join("main.j2"),
            "<local>{{ record.metadata.identifier }}</local>",
        )
        .unwrap();

        let selection = SchemaSelection {
            schema: Some("simple".into()),
            schema_local: Some(local.path().to_path_buf()),
        };
        let xml = renderer(&templates).render(RECORD, &selection).unwrap();
        assert!(xml.ends_with("<local>lake-survey-2017</local>"));
    }

    #[test]
    fn test_local_schema_can_import_common_macros() {
        let templates = setup_templates();
        let local = TempDir::new().unwrap();
        fs::write(
            local.path().join("main.j2"),
            r#"{% import "common/macros.j2" as m %}{{ m.field('id', record.metadata.identifier) }}"#,
        )
        .unwrap();

        let xml = renderer(&templates)
            .render(RECORD, &SchemaSelection::local(local.path()))
            .unwrap();
        assert!(xml.ends_with("<id>lake-survey-2017</id>"));
    }

    #[test]
    fn test_missing_entry_template() {
        let templates = setup_templates();
        let err = renderer(&templates)
            .render(RECORD, &SchemaSelection::named("iso-nope"))
            .unwrap_err();

        match err {
            GeoMcfError::MissingTemplate { name, search_path } => {
                assert_eq!(name, ENTRY_TEMPLATE);
                assert_eq!(search_path[0], templates.path().join("iso-nope"));
            }
            other => panic!("expected MissingTemplate, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_entry_template_name() {
        let templates = setup_templates();
        fs::write(
            templates.path().join("simple/record.j2"),
            "<entry>{{ record.metadata.identifier }}</entry>",
        )
        .unwrap();

        let renderer = Renderer::new(
            RendererConfig::new(templates.path()).with_entry_template("record.j2"),
        );
        assert_eq!(renderer.config().entry_template, "record.j2");

        let xml = renderer
            .render(RECORD, &SchemaSelection::named("simple"))
            .unwrap();
        assert!(xml.ends_with("<entry>lake-survey-2017</entry>"));
    }

    #[test]
    fn test_check_schema() {
        let templates = setup_templates();
        let renderer = renderer(&templates);

        renderer.check_schema(&SchemaSelection::named("simple")).unwrap();
        assert!(matches!(
            renderer.check_schema(&SchemaSelection::named("iso-nope")),
            Err(GeoMcfError::MissingTemplate { .. })
        ));
        assert!(matches!(
            renderer.check_schema(&SchemaSelection::local(templates.path().join("nowhere"))),
            Err(GeoMcfError::MissingTemplate { .. })
        ));
    }

    #[test]
    fn test_no_schema_is_config_error() {
        let templates = setup_templates();
        let err = renderer(&templates)
            .render(RECORD, &SchemaSelection::default())
            .unwrap_err();
        assert!(matches!(err, GeoMcfError::Config(_)));
    }

    #[test]
    fn test_schema_name_cannot_escape_root() {
        let templates = setup_templates();
        let err = renderer(&templates)
            .render(RECORD, &SchemaSelection::named("../elsewhere"))
            .unwrap_err();
        assert!(matches!(err, GeoMcfError::Config(_)));
    }

    #[test]
    fn test_loader_rejects_traversal() {
        let templates = setup_templates();
        let search_path = vec![templates.path().join("simple")];
        assert!(load_template(&search_path, "../common/macros.j2")
            .unwrap()
            .is_none());
        assert!(load_template(&search_path, "main.j2").unwrap().is_some());
    }

    #[test]
    fn test_invalid_date_surfaces_value() {
        let templates = setup_templates();
        let record = "metadata:\n  bad_date: $Date$\n";
        let err = renderer(&templates)
            .render(record, &SchemaSelection::named("dated"))
            .unwrap_err();

        match err {
            GeoMcfError::InvalidDate { value } => assert_eq!(value, "$Date$"),
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn test_supported_schemas_sorted_without_common() {
        let templates = setup_templates();
        fs::write(templates.path().join("README.md"), "not a schema").unwrap();

        let schemas = renderer(&templates).supported_schemas().unwrap();
        assert_eq!(schemas, vec!["dated".to_string(), "simple".to_string()]);
    }

    #[test]
    fn test_render_template_convenience() {
        let templates = setup_templates();
        let config = RendererConfig::new(templates.path());
        let xml = render_template(&config, RECORD, Some("simple"), None).unwrap();
        assert!(xml.contains(&format!(r#"<record version="{}">"#, crate::VERSION)));
    }

    #[test]
    fn test_bundled_iso19139_schema() {
        let renderer = Renderer::new(RendererConfig::default());
        assert!(renderer
            .supported_schemas()
            .unwrap()
            .contains(&"iso19139".to_string()));

        let xml = renderer
            .render(RECORD, &SchemaSelection::named("iso19139"))
            .unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("lake-survey-2017"));
        assert!(xml.contains("<gco:CharacterString>Lake Survey</gco:CharacterString>"));
    }

    #[test]
    fn test_bundled_schema_renders_extracted_record() {
        let source = r#"<gmd:MD_Metadata xmlns:gmd="http://www.isotc211.org/2005/gmd" xmlns:gco="http://www.isotc211.org/2005/gco">
  <gmd:fileIdentifier><gco:CharacterString>rivers &amp; lakes</gco:CharacterString></gmd:fileIdentifier>
  <gmd:dateStamp><gco:Date>2017-03-01</gco:Date></gmd:dateStamp>
  <gmd:identificationInfo><gmd:MD_DataIdentification>
    <gmd:descriptiveKeywords><gmd:MD_Keywords>
      <gmd:keyword><gco:CharacterString>water</gco:CharacterString></gmd:keyword>
    </gmd:MD_Keywords></gmd:descriptiveKeywords>
    <gmd:topicCategory><gmd:MD_TopicCategoryCode>inlandWaters</gmd:MD_TopicCategoryCode></gmd:topicCategory>
  </gmd:MD_DataIdentification></gmd:identificationInfo>
</gmd:MD_Metadata>"#;
        let mcf = crate::extract::xml_to_mcf(source).unwrap();

        let xml = Renderer::new(RendererConfig::default())
            .render(mcf, &SchemaSelection::named("iso19139"))
            .unwrap();
        assert!(xml.contains("<gco:CharacterString>rivers &amp; lakes</gco:CharacterString>"));
        assert!(xml.contains("<gco:DateTime>2017-03-01</gco:DateTime>"));
        assert!(xml.contains("<gco:CharacterString>water</gco:CharacterString>"));
        assert!(xml.contains("<gmd:MD_TopicCategoryCode>inlandWaters</gmd:MD_TopicCategoryCode>"));
        assert!(!xml.contains("gmd:lineage"));
    }
}

use crate::error::{GeoMcfError, Result};
use crate::extract::extract_file;
use crate::render::{Renderer, SchemaSelection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const INPUT_DIR: &str = "xml_input_dir";
pub const OUTPUT_DIR: &str = "xml_output_dir";
pub const MCF_DIR: &str = "ymls_dts_dir";
pub const FAIL_DIR: &str = "fail_dts_dir";

/// Directories the batch reads from and writes to, plus the schema used to
/// render every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mcf_dir: PathBuf,
    pub fail_dir: PathBuf,
    pub schema: SchemaSelection,
}

impl BatchConfig {
    /// The fixed directory layout under `root`.
    pub fn under(root: &Path, schema: SchemaSelection) -> Self {
        BatchConfig {
            input_dir: root.join(INPUT_DIR),
            output_dir: root.join(OUTPUT_DIR),
            mcf_dir: root.join(MCF_DIR),
            fail_dir: root.join(FAIL_DIR),
            schema,
        }
    }
}

/// Receives per-file outcomes as the batch runs.
pub trait BatchListener {
    fn converted(&mut self, _name: &str, _output: &Path) {}
    fn quarantined(&mut self, _name: &str, _reason: &GeoMcfError) {}
}

/// Forwards batch outcomes to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl BatchListener for LogListener {
    fn converted(&mut self, name: &str, output: &Path) {
        log::info!("converted {name} -> {}", output.display());
    }

    fn quarantined(&mut self, name: &str, reason: &GeoMcfError) {
        log::warn!("quarantined {name}: {reason}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantinedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub converted: Vec<String>,
    pub quarantined: Vec<QuarantinedFile>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    fn quarantine(&mut self, listener: &mut dyn BatchListener, name: &str, reason: GeoMcfError) {
        listener.quarantined(name, &reason);
        self.quarantined.push(QuarantinedFile {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Convert every `*.xml` in the input directory: extract it to an MCF, then
/// render every MCF in the MCF directory with the configured schema.
///
/// The schema is checked once up front, so a missing template fails the run
/// before any file is touched. Per-file failures never abort the run. A file
/// that fails to extract has its source XML moved to the fail directory; a
/// file that fails to render has both its MCF and its source XML moved there.
pub fn run_batch(
    renderer: &Renderer,
    config: &BatchConfig,
    listener: &mut dyn BatchListener,
) -> Result<BatchReport> {
    let started = Instant::now();
    let mut report = BatchReport::default();

    if !config.input_dir.is_dir() {
        return Err(GeoMcfError::Config(format!(
            "input directory {} does not exist",
            config.input_dir.display()
        )));
    }
    renderer.check_schema(&config.schema)?;
    for dir in [&config.output_dir, &config.mcf_dir, &config.fail_dir] {
        std::fs::create_dir_all(dir)?;
    }

    for xml_path in list_files(&config.input_dir, "xml")? {
        let name = file_stem(&xml_path);
        log::debug!("extracting {}", xml_path.display());
        if let Err(e) = extract_file(&xml_path, &config.mcf_dir) {
            quarantine_files(&[&xml_path], &config.fail_dir);
            report.quarantine(listener, &name, e);
        }
    }

    for mcf_path in list_files(&config.mcf_dir, "yml")? {
        let name = file_stem(&mcf_path);
        let output = config.output_dir.join(format!("{name}.xml"));

        let result = renderer
            .render(mcf_path.as_path(), &config.schema)
            .and_then(|xml| std::fs::write(&output, xml).map_err(GeoMcfError::from));

        match result {
            Ok(()) => {
                listener.converted(&name, &output);
                report.converted.push(name);
            }
            Err(e) => {
                let source = config.input_dir.join(format!("{name}.xml"));
                quarantine_files(&[&mcf_path, &source], &config.fail_dir);
                report.quarantine(listener, &name, e);
            }
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    log::info!(
        "batch finished in {} ms: {} converted, {} quarantined",
        report.elapsed_ms,
        report.converted.len(),
        report.quarantined.len()
    );

    Ok(report)
}

/// Files in `dir` with the given extension, sorted.
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let dir = dir
        .to_str()
        .ok_or_else(|| GeoMcfError::Config(format!("non UTF-8 path: {}", dir.display())))?;
    let pattern = format!("{}/*.{extension}", glob::Pattern::escape(dir));

    let paths = glob::glob(&pattern)
        .map_err(|e| GeoMcfError::Config(format!("bad glob pattern '{pattern}': {e}")))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("skipping unreadable entry: {e}"),
        }
    }
    files.sort();

    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Move each existing file into `fail_dir`, keeping its name.
fn quarantine_files(paths: &[&Path], fail_dir: &Path) {
    for path in paths {
        if !path.exists() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = fail_dir.join(file_name);
        if let Err(e) = std::fs::rename(path, &target) {
            log::error!(
                "could not move {} to {}: {e}",
                path.display(),
                target.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RendererConfig;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const GOOD_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gmd:MD_Metadata xmlns:gmd="http://www.isotc211.org/2005/gmd" xmlns:gco="http://www.isotc211.org/2005/gco">
  <gmd:fileIdentifier><gco:CharacterString>REPLACE_ID</gco:CharacterString></gmd:fileIdentifier>
  <gmd:dateStamp><gco:Date>2017-03-01</gco:Date></gmd:dateStamp>
</gmd:MD_Metadata>"#;

    fn setup_batch() -> (TempDir, TempDir, BatchConfig) {
        let work = TempDir::new().unwrap();
        let templates = TempDir::new().unwrap();
        fs::create_dir_all(templates.path().join("plain")).unwrap();
        fs::write(
            templates.path().join("plain/main.j2"),
            "<record><id>{{ record.metadata.identifier }}</id>\
             <date>{{ record.metadata.datestamp|normalize_datestring }}</date></record>",
        )
        .unwrap();

        let config = BatchConfig::under(work.path(), SchemaSelection::named("plain"));
        fs::create_dir_all(&config.input_dir).unwrap();
        (work, templates, config)
    }

    fn write_input(config: &BatchConfig, name: &str, id: &str) {
        fs::write(
            config.input_dir.join(format!("{name}.xml")),
            GOOD_XML.replace("REPLACE_ID", id),
        )
        .unwrap();
    }

    #[derive(Default)]
    struct Recorder {
        converted: Vec<String>,
        quarantined: Vec<String>,
    }

    impl BatchListener for Recorder {
        fn converted(&mut self, name: &str, _output: &Path) {
            self.converted.push(name.to_string());
        }

        fn quarantined(&mut self, name: &str, _reason: &GeoMcfError) {
            self.quarantined.push(name.to_string());
        }
    }

    #[test]
    fn test_converts_all_files() {
        let (_work, templates, config) = setup_batch();
        write_input(&config, "b", "second");
        write_input(&config, "a", "first");

        let renderer = Renderer::new(RendererConfig::new(templates.path()));
        let mut recorder = Recorder::default();
        let report = run_batch(&renderer, &config, &mut recorder).unwrap();

        assert_eq!(report.converted, vec!["a".to_string(), "b".to_string()]);
        assert!(report.quarantined.is_empty());
        assert_eq!(recorder.converted, report.converted);

        let output = fs::read_to_string(config.output_dir.join("a.xml")).unwrap();
        assert!(output.contains("<id>first</id>"));
        assert!(output.contains("<date>2017-03-01</date>"));
        assert!(config.mcf_dir.join("b.yml").exists());
    }

    #[test]
    fn test_render_failure_quarantines_both_files() {
        let (_work, templates, config) = setup_batch();
        write_input(&config, "good", "fine");
        write_input(&config, "bad", "broken");

        // Two root elements for the 'broken' record
        fs::write(
            templates.path().join("plain/main.j2"),
            "<record><id>{{ record.metadata.identifier }}</id>\
             <date>{{ record.metadata.datestamp|normalize_datestring }}</date></record>{% if record.metadata.identifier == 'broken' %}<extra/>{% endif %}",
        )
        .unwrap();

        let renderer = Renderer::new(RendererConfig::new(templates.path()));
        let report = run_batch(&renderer, &config, &mut LogListener).unwrap();

        assert_eq!(report.converted, vec!["good".to_string()]);
        assert_eq!(report.quarantined.len(), 1);
        assert_eq!(report.quarantined[0].name, "bad");

        assert!(config.fail_dir.join("bad.yml").exists());
        assert!(config.fail_dir.join("bad.xml").exists());
        assert!(!config.input_dir.join("bad.xml").exists());
        assert!(!config.mcf_dir.join("bad.yml").exists());
        assert!(config.output_dir.join("good.xml").exists());
        assert!(!config.output_dir.join("bad.xml").exists());
    }

    #[test]
    fn test_extraction_failure_quarantines_source_only() {
        let (_work, templates, config) = setup_batch();
        write_input(&config, "ok", "fine");
        fs::write(config.input_dir.join("garbled.xml"), "<MD_Metadata><oops>").unwrap();

        let renderer = Renderer::new(RendererConfig::new(templates.path()));
        let mut recorder = Recorder::default();
        let report = run_batch(&renderer, &config, &mut recorder).unwrap();

        assert_eq!(report.converted, vec!["ok".to_string()]);
        assert_eq!(recorder.quarantined, vec!["garbled".to_string()]);
        assert!(config.fail_dir.join("garbled.xml").exists());
        assert!(!config.fail_dir.join("garbled.yml").exists());
    }

    #[test]
    fn test_missing_input_dir_fails_batch() {
        let work = TempDir::new().unwrap();
        let config = BatchConfig::under(work.path(), SchemaSelection::named("plain"));
        let renderer = Renderer::new(RendererConfig::new(work.path()));

        let err = run_batch(&renderer, &config, &mut LogListener).unwrap_err();
        assert!(matches!(err, GeoMcfError::Config(_)));
    }

    #[test]
    fn test_missing_schema_fails_before_quarantine() {
        let (_work, templates, mut config) = setup_batch();
        write_input(&config, "a", "first");
        config.schema = SchemaSelection::named("not-there");

        let renderer = Renderer::new(RendererConfig::new(templates.path()));
        let err = run_batch(&renderer, &config, &mut LogListener).unwrap_err();

        assert!(matches!(err, GeoMcfError::MissingTemplate { .. }));
        assert!(config.input_dir.join("a.xml").exists());
        assert!(!config.fail_dir.exists());
    }

    #[test]
    fn test_report_serializes() {
        let report = BatchReport {
            converted: vec!["a".into()],
            quarantined: vec![QuarantinedFile {
                name: "b".into(),
                reason: "Invalid date string: $Date$".into(),
            }],
            elapsed_ms: 12,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["quarantined"][0]["name"], "b");
        assert_eq!(json["elapsed_ms"], 12);
    }
}

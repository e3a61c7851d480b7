use clap::error::ErrorKind;
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use geomcf::config::TEMPLATES_ENV;
use geomcf::{
    extract_file, run_batch, LogListener, ProjectConfig, Renderer, RendererConfig,
    SchemaSelection,
};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process;

/// geomcf: render YAML metadata control files (MCF) to ISO metadata XML,
/// extract MCFs from existing XML, and batch-convert whole directories
#[derive(Parser)]
#[command(name = "geomcf", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Project config file (default: ./geomcf.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Templates root directory
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for reports
    #[arg(long, default_value = "yaml", global = true)]
    format: OutputFormat,

    #[command(flatten)]
    generate: GenerateArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Args)]
struct GenerateArgs {
    /// MCF file to render
    #[arg(long)]
    mcf: Option<PathBuf>,

    /// Write the XML here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    schema: SchemaArgs,
}

#[derive(Args)]
struct SchemaArgs {
    /// Name of a bundled or configured schema
    #[arg(long, conflicts_with = "schema_local")]
    schema: Option<String>,

    /// Directory holding a custom schema's templates
    #[arg(long = "schema_local")]
    schema_local: Option<PathBuf>,
}

impl SchemaArgs {
    fn selection(&self) -> SchemaSelection {
        SchemaSelection {
            schema: self.schema.clone(),
            schema_local: self.schema_local.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Extract an MCF file from an ISO 19139 XML record
    Extract {
        /// Source XML file
        xml: PathBuf,
        /// Directory for the generated .yml (default: current directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Convert every XML in the input directory, quarantining failures
    Batch {
        /// Working root holding the batch directories
        #[arg(long)]
        root: Option<PathBuf>,
        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// List the schemas available under the templates root
    Schemas,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let project = match &cli.config {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::discover(&std::env::current_dir()?)?,
    };
    let renderer = Renderer::new(renderer_config(&cli, &project));
    log::debug!("templates root: {}", renderer.config().templates_dir.display());

    match cli.command {
        Some(Command::Extract { xml, out_dir }) => {
            let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&out_dir)?;
            let mcf = extract_file(&xml, &out_dir)?;
            print_output(
                &serde_json::json!({ "ok": true, "mcf": mcf.display().to_string() }),
                &cli.format,
            )?;
        }

        Some(Command::Batch { root, schema }) => {
            let config = project.batch_config(root.as_deref(), Some(schema.selection()))?;
            if let Some(name) = &config.schema.schema {
                ensure_supported(&renderer, name)?;
            }
            let report = run_batch(&renderer, &config, &mut LogListener)?;
            print_output(&serde_json::to_value(&report)?, &cli.format)?;
        }

        Some(Command::Schemas) => {
            let schemas = renderer.supported_schemas()?;
            print_output(&serde_json::json!(schemas), &cli.format)?;
        }

        None => generate(&renderer, &project, cli.generate)?,
    }

    Ok(())
}

fn renderer_config(cli: &Cli, project: &ProjectConfig) -> RendererConfig {
    let templates_dir = cli
        .templates
        .clone()
        .or_else(|| std::env::var_os(TEMPLATES_ENV).map(PathBuf::from))
        .unwrap_or_else(|| project.templates_dir());
    RendererConfig::new(templates_dir)
}

fn generate(
    renderer: &Renderer,
    project: &ProjectConfig,
    args: GenerateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut selection = args.schema.selection();
    if selection.is_empty() {
        selection.schema = project.default_schema.clone();
    }

    let mcf = match args.mcf {
        Some(mcf) if !selection.is_empty() => mcf,
        _ => Cli::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing arguments")
            .exit(),
    };
    if let Some(name) = &selection.schema {
        ensure_supported(renderer, name)?;
    }

    let content = renderer.render(mcf.as_path(), &selection)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, content)?;
            log::info!("wrote {}", path.display());
        }
        None => page(&content)?,
    }

    Ok(())
}

/// Local schema directories are trusted as given; named schemas must exist.
fn ensure_supported(renderer: &Renderer, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let supported = renderer.supported_schemas()?;
    if !supported.iter().any(|s| s == name) {
        Cli::command()
            .error(
                ErrorKind::InvalidValue,
                format!(
                    "invalid schema '{name}' (supported: {})",
                    supported.join(", ")
                ),
            )
            .exit();
    }
    Ok(())
}

/// Send output through `$PAGER` (default `less`) when stdout is a terminal.
fn page(content: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = std::io::stdout();
    if !stdout.is_terminal() {
        println!("{content}");
        return Ok(());
    }

    let pager = std::env::var("PAGER").unwrap_or_else(|_| "less".to_string());
    let mut parts = pager.split_whitespace();
    let Some(program) = parts.next() else {
        println!("{content}");
        return Ok(());
    };

    let child = process::Command::new(program)
        .args(parts)
        .stdin(process::Stdio::piped())
        .spawn();

    match child {
        Ok(mut child) => {
            if let Some(stdin) = child.stdin.as_mut() {
                // The pager may quit before reading everything
                let _ = writeln!(stdin, "{content}");
            }
            child.wait()?;
        }
        Err(e) => {
            log::warn!("could not start pager '{pager}': {e}");
            println!("{content}");
        }
    }

    Ok(())
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_flags_parse() {
        let cli = Cli::try_parse_from([
            "geomcf",
            "--mcf",
            "lake.yml",
            "--schema",
            "iso19139",
            "--output",
            "lake.xml",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.generate.mcf, Some(PathBuf::from("lake.yml")));
        assert_eq!(cli.generate.schema.schema.as_deref(), Some("iso19139"));
    }

    #[test]
    fn test_schema_and_schema_local_conflict() {
        let result = Cli::try_parse_from([
            "geomcf",
            "--mcf",
            "lake.yml",
            "--schema",
            "iso19139",
            "--schema_local",
            "templates/custom",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_subcommand_with_globals() {
        let cli = Cli::try_parse_from([
            "geomcf",
            "batch",
            "--root",
            "work",
            "--schema_local",
            "templates/dts",
            "-vv",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Command::Batch { root, schema }) => {
                assert_eq!(root, Some(PathBuf::from("work")));
                assert_eq!(schema.schema_local, Some(PathBuf::from("templates/dts")));
            }
            _ => panic!("expected batch command"),
        }
    }

    #[test]
    fn test_generate_flags_conflict_with_subcommand() {
        assert!(Cli::try_parse_from(["geomcf", "--mcf", "a.yml", "schemas"]).is_err());
    }
}

//! fluxpand - expand Flux HelmRelease objects into generated manifests
//!
//! Reads a multi-document YAML stream, renders the charts every HelmRelease
//! references, and writes the stream back with the generated manifests
//! appended so downstream linters see what a GitOps controller would
//! materialize.

use clap::{Args, Parser, Subcommand};
use miette::{miette, IntoDiagnostic, Result};
use std::io::Read;
use std::path::PathBuf;

use fluxpand_core::{CancellationToken, KubeVersion};
use fluxpand_expand::{ExpandOptions, Expander};
use fluxpand_repo::Credentials;

#[derive(Parser)]
#[command(name = "fluxpand")]
#[command(version)]
#[command(about = "Expands HelmRelease objects into generated manifests", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments for the implicit `expand` subcommand
    #[command(flatten)]
    expand: ExpandArgs,

    /// Log level (debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format (text or json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand HelmRelease objects in a YAML stream (the default)
    Expand(ExpandArgs),
}

#[derive(Args, Default)]
struct ExpandArgs {
    /// Input files; `-` or no arguments mean standard input
    inputs: Vec<String>,

    /// Path to the repository credentials file
    #[arg(long)]
    credentials_file: Option<PathBuf>,

    /// Kubernetes version passed as Capabilities.KubeVersion
    #[arg(long)]
    kube_version: Option<String>,

    /// Comma-separated API versions added to Capabilities.APIVersions
    #[arg(long, value_delimiter = ',')]
    api_versions: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format)?;

    let args = match cli.command {
        Some(Commands::Expand(args)) => args,
        None => cli.expand,
    };
    run_expand(args)
}

fn init_logging(level: &str, format: &str) -> Result<()> {
    let level = match level {
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        other => {
            return Err(miette!(
                "unable to parse --log-level value {} (must be one of: debug, info, warn, error)",
                other
            ));
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr);
    match format {
        "text" => builder.init(),
        "json" => builder.json().init(),
        other => {
            return Err(miette!(
                "invalid --log-format value {} (valid values are text or json)",
                other
            ));
        }
    }
    Ok(())
}

fn run_expand(args: ExpandArgs) -> Result<()> {
    let input = read_inputs(&args.inputs)?;

    let credentials = match &args.credentials_file {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|e| {
                miette!("unable to open credentials file {}: {}", path.display(), e)
            })?;
            Credentials::from_reader(file).into_diagnostic()?
        }
        None => Credentials::new(),
    };

    let kube_version = args
        .kube_version
        .as_deref()
        .map(KubeVersion::parse)
        .transpose()
        .into_diagnostic()?;

    let options = ExpandOptions {
        kube_version,
        api_versions: args.api_versions,
        enable_chart_cache: true,
    };

    let expander =
        Expander::with_default_clients(CancellationToken::new()).into_diagnostic()?;

    tracing::info!("starting expansion");
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    expander
        .expand_helm_releases(credentials, &input, &mut out, &options)
        .into_diagnostic()?;
    Ok(())
}

/// Concatenate the input files into one YAML stream
///
/// Files are joined with document separators; `-` and the empty argument
/// list read standard input.
fn read_inputs(inputs: &[String]) -> Result<String> {
    if inputs.is_empty() {
        return read_stdin();
    }

    let mut combined = String::new();
    for (index, input) in inputs.iter().enumerate() {
        if index > 0 {
            combined.push_str("\n---\n");
        }
        if input == "-" {
            combined.push_str(&read_stdin()?);
        } else {
            let content = std::fs::read_to_string(input)
                .map_err(|e| miette!("unable to open input file {}: {}", input, e))?;
            combined.push_str(&content);
        }
    }
    Ok(combined)
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .into_diagnostic()?;
    Ok(content)
}

//! Binary entry point for the query interface CLI.
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sombra_repo::{
    contract::{ContractValidator, Diagnostic, Severity},
    manifest::{Manifest, ManifestError},
    query::memory::InMemoryEngine,
    repo::QueryRepository,
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sombra-repo",
    version,
    about = "Validate and plan Sombra query interfaces",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Statically validate every query method in a manifest
    Check(CheckCmd),
    /// Build the dispatch table of every interface in a manifest
    Plan(PlanCmd),
}

#[derive(Args, Debug)]
struct CheckCmd {
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,

    #[arg(long, help = "Do not suggest bindings for unbound parameters")]
    no_suggest: bool,

    #[arg(long, help = "Fail when any warning is reported")]
    deny_warnings: bool,
}

#[derive(Args, Debug)]
struct PlanCmd {
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct CheckReport {
    manifest: String,
    interfaces: usize,
    methods: usize,
    errors: usize,
    warnings: usize,
    success: bool,
    diagnostics: Vec<InterfaceDiagnostic>,
}

#[derive(Debug, Serialize)]
struct InterfaceDiagnostic {
    interface: String,
    #[serde(flatten)]
    diagnostic: Diagnostic,
}

#[derive(Debug, Serialize)]
struct PlanReport {
    manifest: String,
    success: bool,
    interfaces: Vec<InterfacePlan>,
}

#[derive(Debug, Serialize)]
struct InterfacePlan {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<PlanError>,
    methods: Vec<MethodPlan>,
}

#[derive(Debug, Serialize)]
struct PlanError {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct MethodPlan {
    name: String,
    converter: &'static str,
    bindings: Vec<String>,
    query: String,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn run(cli: Cli) -> Result<bool, CliError> {
    match cli.command {
        Command::Check(cmd) => {
            let report = check(&cmd)?;
            emit(cli.format, &report, || print_check_text(&report))?;
            Ok(report.success)
        }
        Command::Plan(cmd) => {
            let report = plan(&cmd.manifest)?;
            emit(cli.format, &report, || print_plan_text(&report))?;
            Ok(report.success)
        }
    }
}

fn check(cmd: &CheckCmd) -> Result<CheckReport, CliError> {
    let manifest = Manifest::load(&cmd.manifest)?;
    let mut options = manifest.options;
    if cmd.no_suggest {
        options.suggest_bindings = false;
    }
    options.deny_warnings |= cmd.deny_warnings;

    let validator = ContractValidator::with_options(InMemoryEngine::new(), options.validator());
    let mut diagnostics = Vec::new();
    for interface in &manifest.interfaces {
        diagnostics.extend(
            validator
                .validate_interface(interface)
                .into_iter()
                .map(|diagnostic| InterfaceDiagnostic {
                    interface: interface.name.clone(),
                    diagnostic,
                }),
        );
    }
    let errors = diagnostics.iter().filter(|d| d.diagnostic.is_error()).count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.diagnostic.severity == Severity::Warning)
        .count();
    let success = errors == 0 && !(options.deny_warnings && warnings > 0);
    Ok(CheckReport {
        manifest: cmd.manifest.display().to_string(),
        interfaces: manifest.interfaces.len(),
        methods: manifest.method_count(),
        errors,
        warnings,
        success,
        diagnostics,
    })
}

fn plan(path: &Path) -> Result<PlanReport, CliError> {
    let manifest = Manifest::load(path)?;
    let repo = QueryRepository::new(Arc::new(InMemoryEngine::new()));
    let interfaces: Vec<_> = manifest
        .interfaces
        .iter()
        .map(|interface| match repo.build(interface) {
            Ok(proxy) => InterfacePlan {
                name: interface.name.clone(),
                error: None,
                methods: proxy
                    .executions()
                    .map(|execution| MethodPlan {
                        name: execution.method().to_owned(),
                        converter: execution.converter().name(),
                        bindings: execution.declaration().bindings().map(str::to_owned).collect(),
                        query: execution.declaration().text().to_owned(),
                    })
                    .collect(),
            },
            Err(err) => InterfacePlan {
                name: interface.name.clone(),
                error: Some(PlanError {
                    code: err.code(),
                    message: err.to_string(),
                }),
                methods: Vec::new(),
            },
        })
        .collect();
    Ok(PlanReport {
        manifest: path.display().to_string(),
        success: interfaces.iter().all(|plan| plan.error.is_none()),
        interfaces,
    })
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), CliError>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_check_text(report: &CheckReport) {
    for entry in &report.diagnostics {
        println!("{}: {}", entry.interface, entry.diagnostic);
    }
    if !report.diagnostics.is_empty() {
        println!();
    }
    println!(
        "Checked {} methods in {} interfaces: {} errors, {} warnings",
        report.methods, report.interfaces, report.errors, report.warnings
    );
}

fn print_plan_text(report: &PlanReport) {
    for interface in &report.interfaces {
        match &interface.error {
            Some(err) => println!("{}: failed [{}] {}", interface.name, err.code, err.message),
            None => {
                println!("{}:", interface.name);
                for method in &interface.methods {
                    println!(
                        "  {} -> {} ({}) bindings=[{}]",
                        method.name,
                        method.converter,
                        method.query,
                        method.bindings.join(", ")
                    );
                }
            }
        }
    }
}

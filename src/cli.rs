use crate::annotation::{AnnotationScanner, DEFAULT_NAMESPACE};
use crate::builder::{BuildOutcome, SemanticModelBuilder};
use crate::codegen::FailurePolicy;
use crate::config::{self, GeneratorConfig, DEFAULT_OUTPUT_DIR};
use crate::output::OutputCoordinator;
use crate::parser::AstParser;
use crate::scanner::FileScanner;
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;

/// lambdagen - Generate AWS Lambda entry points from annotated Rust services
#[derive(Parser, Debug)]
#[command(name = "lambdagen")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Root directory of the crate to scan
    #[arg(short = 'p', long = "project", value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// Output directory name, relative to the project root
    #[arg(short = 'o', long = "output", value_name = "NAME", default_value = DEFAULT_OUTPUT_DIR)]
    pub output: String,

    /// Annotation namespace
    #[arg(long = "namespace", value_name = "NS", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Library crate name (read from Cargo.toml if not specified)
    #[arg(long = "crate-name", value_name = "NAME")]
    pub crate_name: Option<String>,

    /// What generated code does when a path or query value does not convert
    #[arg(long = "on-coercion-failure", value_enum, default_value = "respond")]
    pub on_coercion_failure: FailurePolicy,

    /// Do not run rustfmt on generated entry points
    #[arg(long = "no-format")]
    pub no_format: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Modules to scan: directories or .rs files relative to the project root
    #[arg(value_name = "MODULE", required = true)]
    pub modules: Vec<String>,
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub modules_processed: usize,
    pub modules_failed: usize,
    pub services: usize,
    pub handlers_registered: usize,
    pub declarations_skipped: usize,
    pub units_written: usize,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    // Validate project path exists
    if !args.project.exists() {
        anyhow::bail!("Project path does not exist: {}", args.project.display());
    }

    // Validate project path is a directory
    if !args.project.is_dir() {
        anyhow::bail!("Project path is not a directory: {}", args.project.display());
    }

    info!("Project path: {}", args.project.display());
    info!("Output directory: {}", args.output);
    info!("Modules: {}", args.modules.join(", "));
    if args.namespace != DEFAULT_NAMESPACE {
        info!("Annotation namespace: {}", args.namespace);
    }

    Ok(args)
}

/// Builds the run configuration, reading the crate name from the manifest when needed
pub fn build_config(args: &CliArgs) -> Result<GeneratorConfig> {
    let crate_name = match &args.crate_name {
        Some(name) => name.replace('-', "_"),
        None => config::read_crate_name(&args.project)?,
    };
    debug!("Crate name: {}", crate_name);

    let mut config = GeneratorConfig::new(args.project.clone(), crate_name);
    config.output_dir = args.output.clone();
    config.namespace = args.namespace.clone();
    config.failure_policy = args.on_coercion_failure;
    config.format = !args.no_format;
    Ok(config)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<RunSummary> {
    let config = build_config(&args)?;
    run_with_config(&config, &args.modules)
}

/// Processes each module in order, then renders everything that registered.
///
/// A module that fails to scan, parse, build or register is logged and skipped. Filesystem
/// and render failures stop the run.
pub fn run_with_config(config: &GeneratorConfig, modules: &[String]) -> Result<RunSummary> {
    info!("Starting generation for crate {}...", config.crate_name);

    let scanner = AnnotationScanner::new(config.namespace.clone());
    let mut coordinator = OutputCoordinator::new();
    let mut summary = RunSummary::default();

    for module in modules {
        summary.modules_processed += 1;
        info!("Processing module {}", module);

        let outcome = match build_module(config, &scanner, module) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Module {} failed: {:#}", module, e);
                summary.modules_failed += 1;
                continue;
            }
        };

        let services = outcome.services.len();
        summary.declarations_skipped += outcome.skipped.len();

        match coordinator.register_module(outcome.services) {
            Ok(registered) => {
                summary.services += services;
                summary.handlers_registered += registered;
                debug!("Module {} registered {} handler(s)", module, registered);
            }
            Err(e) => {
                error!("Module {} failed: {}", module, e);
                summary.modules_failed += 1;
            }
        }
    }

    if coordinator.is_empty() {
        warn!("No handlers found");
    }

    summary.units_written = coordinator
        .render(config)
        .context("Failed to write generated units")?;

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Modules processed: {}", summary.modules_processed);
    info!("  - Modules failed: {}", summary.modules_failed);
    info!("  - Services: {}", summary.services);
    info!("  - Handlers: {}", summary.handlers_registered);
    info!("  - Declarations skipped: {}", summary.declarations_skipped);
    info!("  - Units written: {}", summary.units_written);

    Ok(summary)
}

fn build_module(config: &GeneratorConfig, scanner: &AnnotationScanner, module: &str) -> Result<BuildOutcome> {
    let module_path = config.module_path(module);
    let scan_result = FileScanner::new(module_path).scan()?;

    debug!("Found {} Rust files in {}", scan_result.rust_files.len(), module);
    for warning in &scan_result.warnings {
        warn!("{}", warning);
    }

    let parsed_files = AstParser::parse_module(&scan_result.rust_files, &config.crate_name, &config.src_root())?;
    let outcome = SemanticModelBuilder::new(scanner, &parsed_files).build()?;
    Ok(outcome)
}

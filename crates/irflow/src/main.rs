use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use irflow_analysis::{PropertyStatus, PropertyVerifier, VerificationResult};
use irflow_core::dataflow::{ConstantPropagation, FunctionReport, SolveStats, SolverStrategy};
use irflow_core::ir::{Function, FunctionSpec};
use irflow_core::transform::constant_folding;
use irflow_core::{AnalysisConfig, OutputFormat};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "irflow")]
#[command(about = "Constant propagation and folding over a three-address IR")]
#[command(version)]
struct Cli {
    /// Function descriptions (JSON): one function or an array of functions per file
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Analysis configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixpoint strategy: iterative or worklist
    #[arg(short, long)]
    strategy: Option<SolverStrategy>,

    /// Fold proven constants into the IR after the analysis
    #[arg(long)]
    fold: bool,

    /// Check solver and folding properties on every function
    #[arg(long)]
    verify: bool,

    /// Emit JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// File values first, then command-line overrides
    fn resolve_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        config.fold |= self.fold;
        config.verify |= self.verify;
        if self.json {
            config.output = OutputFormat::Json;
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct FunctionOutput {
    report: FunctionReport,
    stats: SolveStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    folded: Option<FunctionSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification: Option<VerificationResult>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_functions(path: &Path) -> Result<Vec<Function>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let specs = parse_specs(&text).with_context(|| format!("failed to parse {}", path.display()))?;
    specs
        .iter()
        .map(|spec| {
            spec.build()
                .with_context(|| format!("invalid function '{}' in {}", spec.name, path.display()))
        })
        .collect()
}

/// A file holds either one function description or an array of them
fn parse_specs(text: &str) -> serde_json::Result<Vec<FunctionSpec>> {
    if text.trim_start().starts_with('[') {
        serde_json::from_str(text)
    } else {
        serde_json::from_str::<FunctionSpec>(text).map(|spec| vec![spec])
    }
}

/// Solve, optionally verify and fold one function, writing the text report as it goes
fn analyse_function(func: Function, config: &AnalysisConfig, out: &mut impl Write) -> Result<FunctionOutput> {
    let mut cp = ConstantPropagation::new();
    let stats = cp.solve(&func, config.strategy);
    debug!(function = %func.name, ?stats, "analysis converged");

    let text = config.output == OutputFormat::Text;
    if text {
        cp.print_result(&func, out)?;
    }
    let report = cp.report(&func);
    let verification = config.verify.then(|| PropertyVerifier::new().verify_function(&func));

    let mut func = func;
    let folded = config.fold.then(|| {
        constant_folding(&cp, &mut func);
        FunctionSpec::from(&func)
    });

    if text {
        if config.fold {
            writeln!(out, "Folded:")?;
            write!(out, "{func}")?;
        }
        if let Some(result) = &verification {
            print_verification(out, result)?;
        }
    }

    Ok(FunctionOutput {
        report,
        stats,
        folded,
        verification,
    })
}

fn print_verification(out: &mut impl Write, result: &VerificationResult) -> io::Result<()> {
    for (name, status) in &result.properties {
        match status {
            PropertyStatus::Proven => writeln!(out, "{} {}", "✓".green(), name)?,
            PropertyStatus::Failed(reason) => writeln!(out, "{} {}: {}", "✗".red(), name.bold(), reason)?,
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.resolve_config()?;
    info!(strategy = %config.strategy, fold = config.fold, verify = config.verify, "starting analysis");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut outputs = Vec::new();
    let mut failed = Vec::new();

    for path in &cli.inputs {
        for func in load_functions(path)? {
            let output = analyse_function(func, &config, &mut out)?;
            if let Some(result) = output.verification.as_ref().filter(|result| !result.all_proven()) {
                failed.push(result.function.clone());
            }
            outputs.push(output);
        }
    }

    if config.output == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut out, &outputs).context("failed to write JSON output")?;
        writeln!(out)?;
    }
    out.flush()?;

    if !failed.is_empty() {
        bail!("property verification failed for: {}", failed.join(", "));
    }
    Ok(())
}

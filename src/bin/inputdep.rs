//! Command line driver for the input-dependency analysis.
//!
//! Runs the analysis over a Test IR (TIR) file and prints the requested
//! reports to stdout.
//!
//! # Usage
//!
//! ```bash
//! inputdep program.tir --print-deps --print-nondet
//! inputdep program.tir --entry=start --scope=interprocedural --input-fn=read
//! inputdep program.tir --config analysis.toml -vv
//! ```

use clap::{Parser, ValueEnum};
use inputdep::core::{AnalysisConfig, InputScope};
use inputdep::test_ir::{render, ReportOptions, TestIR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "inputdep")]
#[command(about = "Input-dependency analysis for SSA control-flow graphs", long_about = None)]
struct Cli {
    /// TIR file to analyse
    file: PathBuf,

    /// TOML analysis configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entry procedure whose parameters are inputs
    #[arg(long)]
    entry: Option<String>,

    /// Which parameters seed the input set
    #[arg(long, value_enum)]
    scope: Option<Scope>,

    /// Callee whose result and pointer arguments are input (repeatable)
    #[arg(long = "input-fn")]
    input_functions: Vec<String>,

    /// Global whose content is input (repeatable)
    #[arg(long = "input-global")]
    input_globals: Vec<String>,

    /// Analyse procedures one after another
    #[arg(long)]
    sequential: bool,

    #[arg(long)]
    print_ir: bool,

    #[arg(long)]
    print_rpo: bool,

    /// Per-instruction dependency facts (the default report)
    #[arg(long)]
    print_deps: bool,

    /// Out-argument, call argument and return facts
    #[arg(long)]
    print_effects: bool,

    /// Blocks reached only through input-dependent decisions
    #[arg(long)]
    print_nondet: bool,

    #[arg(long)]
    print_cut_vertices: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scope {
    EntryArguments,
    AllArguments,
    Interprocedural,
}

impl From<Scope> for InputScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::EntryArguments => InputScope::EntryArguments,
            Scope::AllArguments => InputScope::AllArguments,
            Scope::Interprocedural => InputScope::Interprocedural,
        }
    }
}

impl Cli {
    fn config(&self) -> Result<AnalysisConfig, String> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path).map_err(|e| e.to_string())?,
            None => AnalysisConfig::default(),
        };
        if let Some(entry) = &self.entry {
            config.entry_function = entry.clone();
        }
        if let Some(scope) = self.scope {
            config.input_scope = scope.into();
        }
        config.input_functions.extend(self.input_functions.iter().cloned());
        config.input_globals.extend(self.input_globals.iter().cloned());
        if self.sequential {
            config.parallel = false;
        }
        Ok(config)
    }

    fn report_options(&self) -> Result<ReportOptions, String> {
        let any_report = self.print_ir
            || self.print_rpo
            || self.print_deps
            || self.print_effects
            || self.print_nondet
            || self.print_cut_vertices;
        Ok(ReportOptions {
            print_ir: self.print_ir,
            print_rpo: self.print_rpo,
            print_deps: self.print_deps || !any_report,
            print_effects: self.print_effects,
            print_nondet: self.print_nondet,
            print_cut_vertices: self.print_cut_vertices,
            config: self.config()?,
        })
    }
}

fn run(cli: &Cli) -> Result<String, String> {
    let text = std::fs::read_to_string(&cli.file)
        .map_err(|e| format!("failed to read {}: {}", cli.file.display(), e))?;
    let ir = TestIR::parse(&text).map_err(|e| e.to_string())?;
    render(&ir, &cli.report_options()?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    match run(&cli) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

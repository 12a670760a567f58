//! FileCheck-style test validation for TIR files.
//!
//! This module parses RUN and CHECK directives from TIR files, runs the
//! analysis the RUN line asks for and validates the textual report against
//! the expected patterns, similar to LLVM's FileCheck tool but implemented
//! in a Rust-native way.
//!
//! RUN options:
//! - `--print-ir`, `--print-rpo`, `--print-deps`, `--print-effects`,
//!   `--print-nondet`, `--print-cut-vertices`
//! - `--entry=NAME`, `--scope=entry-arguments|all-arguments|interprocedural`
//! - `--input-fn=NAME`, `--input-global=NAME` (repeatable)

use super::{SyntacticAliasOracle, TestIR, TestIRAdaptor};
use crate::analysis::{cut_vertices, report, ModuleAnalysis, NonDeterministicBlocks};
use crate::core::{AnalysisConfig, CfgAnalyzer, InputScope, IrAdaptor};
use std::fmt::Write;

/// A CHECK directive extracted from a TIR file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDirective {
    /// CHECK: pattern - Match pattern on this or a later line
    Check(String),
    /// CHECK-LABEL: pattern - Label for a section
    CheckLabel(String),
    /// CHECK-NEXT: pattern - Match on the next line
    CheckNext(String),
    /// CHECK-NOT: pattern - Must not occur before the next match
    CheckNot(String),
    /// CHECK-EMPTY - Match empty line
    CheckEmpty,
    /// COM: comment - Comment, ignored
    Comment(String),
}

/// A RUN directive specifying how to execute the test
#[derive(Debug, Clone)]
pub struct RunDirective {
    pub command: String,
    pub args: Vec<String>,
}

/// Test specification extracted from a TIR file
#[derive(Debug)]
pub struct TestSpec {
    pub run_directives: Vec<RunDirective>,
    pub check_directives: Vec<CheckDirective>,
    pub tir_content: String,
}

impl TestSpec {
    /// Parse a TIR file to extract test specifications
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut run_directives = Vec::new();
        let mut check_directives = Vec::new();
        let mut tir_lines = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(run_cmd) = trimmed.strip_prefix("; RUN:") {
                let parts: Vec<&str> = run_cmd.split_whitespace().collect();
                if let Some((command, args)) = parts.split_first() {
                    run_directives.push(RunDirective {
                        command: command.to_string(),
                        args: args.iter().map(|s| s.to_string()).collect(),
                    });
                }
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-LABEL:") {
                check_directives.push(CheckDirective::CheckLabel(pattern.trim().to_string()));
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-NEXT:") {
                check_directives.push(CheckDirective::CheckNext(pattern.trim().to_string()));
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-NOT:") {
                check_directives.push(CheckDirective::CheckNot(pattern.trim().to_string()));
            } else if trimmed.starts_with("; CHECK-EMPTY") {
                check_directives.push(CheckDirective::CheckEmpty);
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK:") {
                check_directives.push(CheckDirective::Check(pattern.trim().to_string()));
            } else if let Some(comment) = trimmed.strip_prefix("; COM:") {
                check_directives.push(CheckDirective::Comment(comment.trim().to_string()));
            } else if trimmed.starts_with("; CHECK") {
                return Err(format!("Unknown check directive: {}", trimmed));
            } else {
                tir_lines.push(line);
            }
        }

        if run_directives.is_empty() {
            return Err("No RUN directive found".to_string());
        }

        Ok(TestSpec { run_directives, check_directives, tir_content: tir_lines.join("\n") })
    }
}

/// Which reports to render, and the analysis configuration behind them.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub print_ir: bool,
    pub print_rpo: bool,
    pub print_deps: bool,
    pub print_effects: bool,
    pub print_nondet: bool,
    pub print_cut_vertices: bool,
    pub config: AnalysisConfig,
}

impl ReportOptions {
    /// Options from the arguments of a RUN line.
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        // Output must not depend on thread scheduling.
        let mut options = Self { config: AnalysisConfig::default().with_parallel(false), ..Self::default() };
        for arg in args {
            match arg.as_str() {
                "--print-ir" => options.print_ir = true,
                "--print-rpo" => options.print_rpo = true,
                "--print-deps" => options.print_deps = true,
                "--print-effects" => options.print_effects = true,
                "--print-nondet" => options.print_nondet = true,
                "--print-cut-vertices" => options.print_cut_vertices = true,
                "%s" => {}
                other => {
                    if let Some(name) = other.strip_prefix("--entry=") {
                        options.config.entry_function = name.to_string();
                    } else if let Some(name) = other.strip_prefix("--input-fn=") {
                        options.config.input_functions.push(name.to_string());
                    } else if let Some(name) = other.strip_prefix("--input-global=") {
                        options.config.input_globals.push(name.to_string());
                    } else if let Some(scope) = other.strip_prefix("--scope=") {
                        options.config.input_scope = match scope {
                            "entry-arguments" => InputScope::EntryArguments,
                            "all-arguments" => InputScope::AllArguments,
                            "interprocedural" => InputScope::Interprocedural,
                            _ => return Err(format!("Unknown input scope: {}", scope)),
                        };
                    } else {
                        return Err(format!("Unknown RUN option: {}", other));
                    }
                }
            }
        }
        Ok(options)
    }

    fn needs_analysis(&self) -> bool {
        self.print_deps || self.print_effects || self.print_nondet
    }
}

/// Render the requested reports for every defined function of `ir`.
pub fn render(ir: &TestIR, options: &ReportOptions) -> Result<String, String> {
    let adaptor = TestIRAdaptor::new(ir);
    let mut output = String::new();

    if options.print_ir {
        output.push_str(&ir.print());
    }

    let analysis = if options.needs_analysis() {
        let oracle = SyntacticAliasOracle::new(adaptor);
        let module = ModuleAnalysis::new(&adaptor, &oracle, &options.config);
        Some(module.run().map_err(|e| e.to_string())?)
    } else {
        None
    };

    let mut cfg = CfgAnalyzer::new();
    for func in adaptor.funcs() {
        if adaptor.func_is_declaration(func) {
            continue;
        }
        let func_name = adaptor.func_link_name(func);
        let has_entry = cfg.switch_func(&adaptor, func);

        if options.print_rpo && has_entry {
            push_line(&mut output, format_args!("RPO for func {}", func_name));
            for (idx, block) in cfg.order().iter().enumerate() {
                push_line(&mut output, format_args!("{}: {}", idx, adaptor.block_name(*block)));
            }
            push_line(&mut output, format_args!("End RPO"));
        }

        if options.print_cut_vertices && has_entry {
            let blocks = cut_vertices(&adaptor, &cfg);
            report::write_cut_vertices(&mut output, &adaptor, func, &blocks).map_err(|e| e.to_string())?;
        }

        let Some(module) = &analysis else {
            continue;
        };
        let result = match module.function(func) {
            Some(Ok(result)) => result,
            Some(Err(err)) => {
                push_line(&mut output, format_args!("Analysis failed for {}: {}", func_name, err));
                continue;
            }
            None => continue,
        };
        let written = (|| -> std::fmt::Result {
            if options.print_deps {
                report::write_dependencies(&mut output, &adaptor, result)?;
            }
            if options.print_effects {
                report::write_effects(&mut output, &adaptor, result)?;
            }
            if options.print_nondet {
                let nondet = NonDeterministicBlocks::analyze(&adaptor, result);
                report::write_non_deterministic(&mut output, &adaptor, func, &nondet)?;
            }
            Ok(())
        })();
        written.map_err(|e| e.to_string())?;
    }

    Ok(output)
}

fn push_line(output: &mut String, line: std::fmt::Arguments<'_>) {
    // Writing to a String cannot fail.
    let _ = writeln!(output, "{}", line);
}

/// Test runner that executes TIR tests
pub struct TestRunner {
    verbose: bool,
}

impl TestRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run a TIR test and validate output
    pub fn run_test(&self, spec: &TestSpec) -> Result<(), String> {
        let ir = TestIR::parse(&spec.tir_content).map_err(|e| e.to_string())?;

        for run_dir in &spec.run_directives {
            let output = render(&ir, &ReportOptions::from_args(&run_dir.args)?)?;
            if self.verbose {
                log::info!("output of '{} {}':\n{}", run_dir.command, run_dir.args.join(" "), output);
            }
            self.validate_output(&output, &spec.check_directives)?;
        }

        Ok(())
    }

    /// Validate output against CHECK directives
    pub fn validate_output(&self, output: &str, directives: &[CheckDirective]) -> Result<(), String> {
        let output_lines: Vec<_> = output.lines().collect();
        let mut line_idx = 0;
        let mut forbidden: Vec<&str> = Vec::new();

        for directive in directives {
            match directive {
                CheckDirective::Comment(_) => continue,

                CheckDirective::CheckNot(pattern) => forbidden.push(pattern),

                CheckDirective::Check(pattern) | CheckDirective::CheckLabel(pattern) => {
                    let found = output_lines
                        .iter()
                        .skip(line_idx)
                        .position(|line| line.contains(pattern.as_str()));
                    let Some(idx) = found else {
                        let kind = if matches!(directive, CheckDirective::Check(_)) { "CHECK" } else { "CHECK-LABEL" };
                        return Err(format!("{}: pattern '{}' not found in output", kind, pattern));
                    };
                    check_forbidden(&output_lines[line_idx..line_idx + idx], &forbidden)?;
                    forbidden.clear();
                    line_idx += idx + 1;
                    if self.verbose {
                        log::info!("'{}' found at line {}", pattern, line_idx - 1);
                    }
                }

                CheckDirective::CheckNext(pattern) => {
                    let Some(line) = output_lines.get(line_idx) else {
                        return Err(format!("CHECK-NEXT: no more lines, expected '{}'", pattern));
                    };
                    if !line.contains(pattern.as_str()) {
                        return Err(format!("CHECK-NEXT: expected '{}' but got '{}'", pattern, line));
                    }
                    forbidden.clear();
                    line_idx += 1;
                }

                CheckDirective::CheckEmpty => {
                    let Some(line) = output_lines.get(line_idx) else {
                        continue; // End of output counts as empty
                    };
                    if !line.trim().is_empty() {
                        return Err(format!("CHECK-EMPTY: expected empty line but got '{}'", line));
                    }
                    line_idx += 1;
                }
            }
        }

        check_forbidden(&output_lines[line_idx.min(output_lines.len())..], &forbidden)
    }
}

fn check_forbidden(lines: &[&str], forbidden: &[&str]) -> Result<(), String> {
    for pattern in forbidden {
        if let Some(line) = lines.iter().find(|line| line.contains(pattern)) {
            return Err(format!("CHECK-NOT: pattern '{}' found in '{}'", pattern, line));
        }
    }
    Ok(())
}

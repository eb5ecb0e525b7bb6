//! vcxproj-inspect: find broken references and mismatched GUIDs across
//! Visual C++ solutions and projects.
//!
//! Walks the given directories for `.sln` and `.vcxproj` files, builds the
//! reference graph between them, reports every inconsistency found and can
//! repair the ones with a known fix.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Args, Commands, InspectArgs, ScanArgs};
use colored::Colorize;
use dialoguer::Confirm;
use std::path::Path;
use std::process::ExitCode;
use vcxproj_inspect::analyzer;
use vcxproj_inspect::defect::{Defect, defect_table};
use vcxproj_inspect::scanner::display_path;
use vcxproj_inspect::{CancelToken, Inspector, fix, report};

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_tracing(args.quiet, args.verbose) {
        eprintln!("{} {:#}", "warn:".yellow().bold(), err);
    }

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("VCXPROJ_INSPECT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn run(args: Args) -> Result<ExitCode> {
    match args.command {
        Commands::Inspect(inspect) => cmd_inspect(&inspect, args.verbose),
        Commands::Scan(scan) => cmd_scan(&scan),
        Commands::Analyzers => cmd_analyzers(),
    }
}

fn cmd_inspect(args: &InspectArgs, verbose: bool) -> Result<ExitCode> {
    let cancel = CancelToken::new();
    let mut report = Inspector::new(args.to_options()).run(&cancel)?;

    if args.interactive {
        let base_dir = report.base_dir.clone();
        let outcome = fix::apply_confirmed(&mut report.defects, |file, defects| {
            confirm_file(file, defects, &base_dir)
        });
        report.fix = Some(outcome);
        report.refresh_summary();
    }

    if args.json {
        println!("{}", report::to_json(&report)?);
    } else {
        report::write_console(&mut std::io::stdout().lock(), &report, verbose)?;
        let fixable = report.defects.iter().filter(|d| d.is_fixable()).count();
        if fixable > 0 && report.fix.is_none() {
            println!(
                "\n{} {} defect(s) can be fixed, use --fix to apply",
                "hint:".cyan().bold(),
                fixable
            );
        }
    }

    if let Some(dir) = &args.csv {
        let written = report::write_csv(dir, &report)?;
        eprintln!(
            "{} Wrote {} tables to {}",
            "info:".blue().bold(),
            written.len(),
            dir.display()
        );
    }

    Ok(if args.fail_on.fails(report.worst_severity()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Shows the fixes pending for `file` and asks whether to apply them.
fn confirm_file(file: &Path, defects: &[&Defect], base_dir: &Path) -> bool {
    println!(
        "\n{} {}",
        "Would update:".yellow().bold(),
        display_path(file, base_dir)
    );
    for defect in defects {
        let edit = defect.fix().map(|fix| fix.edit());
        println!("  {}: {}", defect.line().to_string().dimmed(), defect.description());
        if let Some(edit) = edit {
            println!("    {} {}", "-".red(), edit.expected.trim_end().red());
            if !edit.replacement.is_empty() {
                println!("    {} {}", "+".green(), edit.replacement.green());
            }
        }
    }

    Confirm::new()
        .with_prompt("Apply these fixes?")
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn cmd_scan(args: &ScanArgs) -> Result<ExitCode> {
    let inspector = Inspector::new(args.to_options());
    let base_dir = inspector.base_dir()?;
    let files = inspector.scan(&CancelToken::new())?;

    println!("Would inspect {} files:", files.len());
    for file in files.solutions.iter().chain(&files.projects) {
        println!("  {}", display_path(file, &base_dir));
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_analyzers() -> Result<ExitCode> {
    println!("{}", "Analyzers:".bold());
    for entry in analyzer::registry() {
        let state = if entry.default_enabled {
            "default".green()
        } else {
            "opt-in".yellow()
        };
        println!("  {:<18} {:<8} {}", entry.name, state, entry.description);
    }

    println!("\n{}", "Defect codes:".bold());
    for info in defect_table() {
        println!("  {:<4} {:<15} {}", info.code, info.severity, info.name);
    }

    Ok(ExitCode::SUCCESS)
}

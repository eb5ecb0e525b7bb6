//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API:
//! running an inspection, listing the files one would cover, and listing the
//! available analyzers with the defect codes they report.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vcxproj_inspect::InspectorOptions;
use vcxproj_inspect::defect::Severity;

/// Find broken references and mismatched GUIDs across Visual C++ solutions and projects.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Log progress and every defect as it is found.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect solutions and projects and report defects.
    Inspect(InspectArgs),

    /// List files that would be inspected without opening them.
    Scan(ScanArgs),

    /// List analyzers and the defect codes they can report.
    Analyzers,
}

/// Where to look, shared by `inspect` and `scan`.
#[derive(Debug, clap::Args)]
pub struct ScanArgs {
    /// Directories to search. Defaults to current directory.
    #[arg(short, long = "dirs", value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Regular expressions for paths to exclude, matched against the path
    /// relative to the base directory (e.g. "^third_party", "/obj$").
    /// By default, entries starting with `.` are excluded.
    #[arg(short = 'x', long, value_name = "REGEX")]
    pub exclude: Vec<String>,

    /// Disable default exclusion of `.` prefixed entries.
    #[arg(long)]
    pub no_default_excludes: bool,

    /// Directory that reported paths are relative to. Defaults to the first search directory.
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,
}

impl ScanArgs {
    pub fn to_options(&self) -> InspectorOptions {
        let defaults = InspectorOptions::default();
        InspectorOptions {
            roots: if self.dirs.is_empty() {
                defaults.roots.clone()
            } else {
                self.dirs.clone()
            },
            exclude: self.exclude.clone(),
            default_excludes: !self.no_default_excludes,
            base_dir: self.base_dir.clone(),
            ..defaults
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Follow <Import> elements and include imported files in the graph.
    #[arg(long)]
    pub follow_imports: bool,

    /// Apply available fixes to project files.
    #[arg(long)]
    pub fix: bool,

    /// Confirm each file's fixes before applying them. Implies --fix.
    #[arg(short, long)]
    pub interactive: bool,

    /// Run only this analyzer. Repeatable. See `analyzers` for names.
    #[arg(long = "analyzer", value_name = "NAME")]
    pub analyzers: Vec<String>,

    /// Skip this analyzer. Repeatable.
    #[arg(long, value_name = "NAME")]
    pub skip: Vec<String>,

    /// Emit JSON instead of human-readable output.
    #[arg(long)]
    pub json: bool,

    /// Also write CSV tables (defects, solutions, projects, references,
    /// properties, imports) into this directory.
    #[arg(long, value_name = "DIR")]
    pub csv: Option<PathBuf>,

    /// Lowest unresolved defect severity that makes the exit status non-zero.
    #[arg(long, value_enum, default_value_t = FailOn::Error)]
    pub fail_on: FailOn,
}

impl InspectArgs {
    pub fn to_options(&self) -> InspectorOptions {
        InspectorOptions {
            follow_imports: self.follow_imports,
            // Interactive fixing happens after the run, one file at a time.
            auto_fix: self.fix && !self.interactive,
            analyzers: self.analyzers.clone(),
            skip: self.skip.clone(),
            ..self.scan.to_options()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailOn {
    Never,
    Warning,
    Error,
}

impl FailOn {
    pub fn fails(self, worst: Option<Severity>) -> bool {
        match self {
            FailOn::Never => false,
            FailOn::Warning => worst.is_some(),
            FailOn::Error => worst.is_some_and(|severity| severity >= Severity::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("vcxproj-inspect").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn inspect_options_from_flags() {
        let args = parse(&[
            "inspect", "-d", "src", "-d", "lib", "-x", "^third_party", "--follow-imports", "--fix",
            "--analyzer", "missing-items", "--skip", "orphans", "--fail-on", "warning",
        ]);
        let Commands::Inspect(inspect) = args.command else {
            panic!("expected inspect");
        };
        let options = inspect.to_options();
        assert_eq!(options.roots, vec![PathBuf::from("src"), PathBuf::from("lib")]);
        assert_eq!(options.exclude, vec!["^third_party"]);
        assert!(options.default_excludes);
        assert!(options.follow_imports);
        assert!(options.auto_fix);
        assert_eq!(options.analyzers, vec!["missing-items"]);
        assert_eq!(options.skip, vec!["orphans"]);
        assert_eq!(inspect.fail_on, FailOn::Warning);
    }

    #[test]
    fn defaults_search_current_directory() {
        let args = parse(&["scan", "--no-default-excludes"]);
        let Commands::Scan(scan) = args.command else {
            panic!("expected scan");
        };
        let options = scan.to_options();
        assert_eq!(options.roots, vec![PathBuf::from(".")]);
        assert!(!options.default_excludes);
        assert!(!options.auto_fix);
    }

    #[test]
    fn interactive_defers_fixing() {
        let args = parse(&["-v", "inspect", "-i", "--fix"]);
        assert!(args.verbose);
        let Commands::Inspect(inspect) = args.command else {
            panic!("expected inspect");
        };
        assert!(inspect.interactive);
        assert!(!inspect.to_options().auto_fix);
        assert_eq!(inspect.fail_on, FailOn::Error);
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let result = Args::try_parse_from(["vcxproj-inspect", "-v", "-q", "analyzers"]);
        assert!(result.is_err());
    }

    #[test]
    fn exit_policy() {
        assert!(!FailOn::Never.fails(Some(Severity::Internal)));
        assert!(FailOn::Warning.fails(Some(Severity::Warning)));
        assert!(!FailOn::Warning.fails(None));
        assert!(!FailOn::Error.fails(Some(Severity::Warning)));
        assert!(FailOn::Error.fails(Some(Severity::Error)));
        assert!(FailOn::Error.fails(Some(Severity::Internal)));
    }
}

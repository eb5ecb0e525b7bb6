//! One inspection run: discover, build, analyze, and optionally fix.

use crate::analyzer;
use crate::builder::GraphBuilder;
use crate::cancel::CancelToken;
use crate::defect::{DefectCatalog, DefectState, Severity, TracingSink, defect_table};
use crate::fix::{self, FixOutcome};
use crate::graph::{EntityKind, ProjectOrigin, ReferenceGraph};
use crate::scanner::{self, DiscoveredFiles, ScanOptions};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Everything a run can be configured with.
#[derive(Debug, Clone)]
pub struct InspectorOptions {
    /// Directories to search for solutions and projects.
    pub roots: Vec<PathBuf>,
    /// Regular expressions matched against paths relative to the base directory.
    pub exclude: Vec<String>,
    /// Skip `.`-prefixed entries.
    pub default_excludes: bool,
    /// Base for display paths; the first root when unset.
    pub base_dir: Option<PathBuf>,
    pub follow_imports: bool,
    pub auto_fix: bool,
    /// Analyzers to run; empty means the default set.
    pub analyzers: Vec<String>,
    pub skip: Vec<String>,
}

impl Default for InspectorOptions {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from(".")],
            exclude: Vec::new(),
            default_excludes: true,
            base_dir: None,
            follow_imports: false,
            auto_fix: false,
            analyzers: Vec::new(),
            skip: Vec::new(),
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files_scanned: usize,
    pub solutions: usize,
    pub valid_solutions: usize,
    pub projects: usize,
    pub valid_projects: usize,
    pub warnings: usize,
    pub errors: usize,
    pub internal_errors: usize,
    pub fixed: usize,
    pub failed_to_fix: usize,
}

impl Summary {
    fn collect(files: &DiscoveredFiles, graph: &ReferenceGraph, defects: &DefectCatalog) -> Self {
        let count = |kind| graph.entities_of_kind(kind).count();
        let valid = |kind| {
            graph
                .entities_of_kind(kind)
                .filter(|(_, entity)| entity.is_valid())
                .count()
        };
        Self {
            files_scanned: files.len(),
            solutions: count(EntityKind::Solution),
            valid_solutions: valid(EntityKind::Solution),
            // Imported files are not projects of their own.
            projects: graph
                .projects()
                .filter(|(_, _, project)| project.origin == ProjectOrigin::Native)
                .count(),
            valid_projects: graph.native_projects().count(),
            warnings: defects.count_severity(Severity::Warning),
            errors: defects.count_severity(Severity::Error),
            internal_errors: defects.count_severity(Severity::Internal),
            fixed: defects.count_state(DefectState::Fixed),
            failed_to_fix: defects.count_state(DefectState::FailedToFix),
        }
    }
}

/// The result of a completed run.
#[derive(Debug)]
pub struct InspectionReport {
    pub base_dir: PathBuf,
    pub files: DiscoveredFiles,
    pub graph: ReferenceGraph,
    pub defects: DefectCatalog,
    pub summary: Summary,
    /// Present when fixes were applied during the run.
    pub fix: Option<FixOutcome>,
}

impl InspectionReport {
    /// Recomputes the summary, e.g. after fixes were applied outside the run.
    pub fn refresh_summary(&mut self) {
        self.summary = Summary::collect(&self.files, &self.graph, &self.defects);
    }

    /// The most severe defect still unresolved.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.defects
            .iter()
            .filter(|defect| defect.state() != DefectState::Fixed)
            .map(|defect| defect.severity())
            .max()
    }
}

pub struct Inspector {
    options: InspectorOptions,
}

impl Inspector {
    pub fn new(options: InspectorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &InspectorOptions {
        &self.options
    }

    /// Absolute base directory for display paths.
    pub fn base_dir(&self) -> Result<PathBuf> {
        let base = match (&self.options.base_dir, self.options.roots.first()) {
            (Some(base), _) => base.clone(),
            (None, Some(root)) => root.clone(),
            (None, None) => PathBuf::from("."),
        };
        scanner::absolute(&base)
    }

    /// Lists the files a run would inspect.
    pub fn scan(&self, cancel: &CancelToken) -> Result<DiscoveredFiles> {
        let options = ScanOptions {
            exclude: scanner::compile_excludes(&self.options.exclude)?,
            default_excludes: self.options.default_excludes,
            base_dir: self.base_dir()?,
        };
        info!(roots = self.options.roots.len(), "collecting files");
        scanner::collect_files(&self.options.roots, &options, cancel)
    }

    /// Runs the full inspection.
    ///
    /// Data problems never fail the run; they end up in the report's defects.
    /// Errors are configuration problems (bad pattern, missing root) and
    /// cancellation.
    pub fn run(&self, cancel: &CancelToken) -> Result<InspectionReport> {
        let base_dir = self.base_dir()?;
        let files = self.scan(cancel)?;

        let mut defects = DefectCatalog::new();
        defects.attach(Box::new(TracingSink));

        let graph = GraphBuilder::new(&base_dir)
            .follow_imports(self.options.follow_imports)
            .build(&files, &mut defects, cancel)
            .context("Failed to build reference graph")?;

        defects.check_code_uniqueness(&defect_table());

        let analyzers = analyzer::select(&self.options.analyzers, &self.options.skip, &mut defects);
        for analyzer in &analyzers {
            info!(analyzer = analyzer.name(), "running analyzer");
            analyzer.run(&graph, &mut defects, cancel)?;
        }

        let fix = self.options.auto_fix.then(|| fix::apply_all(&mut defects));

        let summary = Summary::collect(&files, &graph, &defects);
        info!(
            defects = defects.len(),
            errors = summary.errors,
            warnings = summary.warnings,
            "inspection finished"
        );
        Ok(InspectionReport {
            base_dir,
            files,
            graph,
            defects,
            summary,
            fix,
        })
    }
}

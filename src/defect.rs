//! Defects, their code table, and the append-only catalog.
//!
//! Every inconsistency the inspector finds is recorded as a [`Defect`]. Code
//! and severity come from one static table keyed by [`DefectKind`]; the
//! catalog scans that table for code collisions once per run and reports any
//! it finds as internal defects rather than refusing to run.

use crate::rewriter::TextEdit;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Internal,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Internal => "internal error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Lifecycle of a defect: `Found`, then at most one transition during fixing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefectState {
    Found,
    Fixed,
    FailedToFix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DefectKind {
    AnalyzerNotFound,
    SolutionOpenFailure,
    ProjectOpenFailure,
    DefectCodeDuplicate,
    ProjectHasNoGuid,
    ProjectGuidMismatch,
    ProjectRefBroken,
    ProjectRefDuplicate,
    ProjectGuidIsDuplicated,
    SolutionRefBroken,
    SolutionRefDuplicate,
    SolutionGuidMismatch,
    GuidStringInvalid,
    MissingProject,
    ProjectIsOrphan,
    ItemNotFound,
}

/// One row of the defect code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DefectInfo {
    pub name: &'static str,
    pub code: &'static str,
    pub severity: Severity,
}

impl DefectKind {
    pub const ALL: [DefectKind; 16] = [
        DefectKind::AnalyzerNotFound,
        DefectKind::SolutionOpenFailure,
        DefectKind::ProjectOpenFailure,
        DefectKind::DefectCodeDuplicate,
        DefectKind::ProjectHasNoGuid,
        DefectKind::ProjectGuidMismatch,
        DefectKind::ProjectRefBroken,
        DefectKind::ProjectRefDuplicate,
        DefectKind::ProjectGuidIsDuplicated,
        DefectKind::SolutionRefBroken,
        DefectKind::SolutionRefDuplicate,
        DefectKind::SolutionGuidMismatch,
        DefectKind::GuidStringInvalid,
        DefectKind::MissingProject,
        DefectKind::ProjectIsOrphan,
        DefectKind::ItemNotFound,
    ];

    pub fn info(self) -> DefectInfo {
        use Severity::*;
        let (name, code, severity) = match self {
            DefectKind::AnalyzerNotFound => ("AnalyzerNotFound", "A1", Internal),
            DefectKind::SolutionOpenFailure => ("SolutionOpenFailure", "A2", Error),
            DefectKind::ProjectOpenFailure => ("ProjectOpenFailure", "A3", Error),
            DefectKind::DefectCodeDuplicate => ("DefectCodeDuplicate", "A4", Internal),
            DefectKind::ProjectHasNoGuid => ("ProjectHasNoGuid", "B1", Warning),
            DefectKind::ProjectGuidMismatch => ("ProjectGuidMismatch", "B2", Error),
            DefectKind::ProjectRefBroken => ("ProjectRefBroken", "B3", Error),
            DefectKind::ProjectRefDuplicate => ("ProjectRefDuplicate", "B4", Error),
            DefectKind::ProjectGuidIsDuplicated => ("ProjectGuidIsDuplicated", "B5", Warning),
            DefectKind::SolutionRefBroken => ("SolutionRefBroken", "B6", Error),
            DefectKind::SolutionRefDuplicate => ("SolutionRefDuplicate", "B7", Error),
            DefectKind::SolutionGuidMismatch => ("SolutionGuidMismatch", "B8", Error),
            DefectKind::GuidStringInvalid => ("GuidStringInvalid", "B9", Error),
            DefectKind::MissingProject => ("MissingProject", "B10", Error),
            DefectKind::ProjectIsOrphan => ("ProjectIsOrphan", "B11", Warning),
            DefectKind::ItemNotFound => ("ItemNotFound", "B12", Error),
        };
        DefectInfo {
            name,
            code,
            severity,
        }
    }

    pub fn code(self) -> &'static str {
        self.info().code
    }

    pub fn severity(self) -> Severity {
        self.info().severity
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

/// The full code table, in declaration order.
pub fn defect_table() -> Vec<DefectInfo> {
    DefectKind::ALL.iter().map(|kind| kind.info()).collect()
}

/// A deferred repair, interpreted by the fix engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum FixCommand {
    /// Rewrites the GUID recorded on a `ProjectReference`.
    SetReferenceIdentifier { file: PathBuf, edit: TextEdit },
    /// Deletes an item element from a project.
    RemoveItem { file: PathBuf, edit: TextEdit },
}

impl FixCommand {
    pub fn file(&self) -> &Path {
        match self {
            FixCommand::SetReferenceIdentifier { file, .. } | FixCommand::RemoveItem { file, .. } => {
                file
            }
        }
    }

    pub fn edit(&self) -> &TextEdit {
        match self {
            FixCommand::SetReferenceIdentifier { edit, .. } | FixCommand::RemoveItem { edit, .. } => {
                edit
            }
        }
    }
}

/// A reported inconsistency.
///
/// Everything but the state and fix error is fixed at construction.
#[derive(Debug, Clone, Serialize)]
pub struct Defect {
    kind: DefectKind,
    code: &'static str,
    severity: Severity,
    filename: String,
    line: usize,
    description: String,
    state: DefectState,
    fix_error: String,
    #[serde(skip)]
    fix: Option<FixCommand>,
}

impl Defect {
    pub fn new(
        kind: DefectKind,
        filename: impl Into<String>,
        line: usize,
        description: impl Into<String>,
    ) -> Self {
        let info = kind.info();
        Self {
            kind,
            code: info.code,
            severity: info.severity,
            filename: filename.into(),
            line,
            description: description.into(),
            state: DefectState::Found,
            fix_error: String::new(),
            fix: None,
        }
    }

    pub fn with_fix(mut self, fix: FixCommand) -> Self {
        self.fix = Some(fix);
        self
    }

    pub fn kind(&self) -> DefectKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> DefectState {
        self.state
    }

    pub fn fix_error(&self) -> &str {
        &self.fix_error
    }

    pub fn fix(&self) -> Option<&FixCommand> {
        self.fix.as_ref()
    }

    /// True while a fix is attached and has not been attempted yet.
    pub fn is_fixable(&self) -> bool {
        self.fix.is_some() && self.state == DefectState::Found
    }

    pub fn location(&self) -> Location<'_> {
        Location(self)
    }

    /// Severity and code, e.g. `error B2`.
    pub fn tag(&self) -> String {
        format!("{} {}", self.severity, self.code)
    }

    pub(crate) fn mark_fixed(&mut self) {
        if self.state == DefectState::Found {
            self.state = DefectState::Fixed;
        }
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        if self.state == DefectState::Found {
            self.state = DefectState::FailedToFix;
            self.fix_error = error.into();
        }
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}: {}", self.location(), self.tag(), self.description)
    }
}

/// The `<filename>(<line>): ` prefix of a rendered defect.
///
/// The line is left out when it is 0, and the whole prefix when there is no file.
pub struct Location<'a>(&'a Defect);

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defect = self.0;
        if defect.filename.is_empty() {
            return Ok(());
        }
        f.write_str(&defect.filename)?;
        if defect.line != 0 {
            write!(f, "({})", defect.line)?;
        }
        f.write_str(": ")
    }
}

/// Receives every defect as it is added to a catalog.
pub trait DefectSink {
    fn defect_added(&mut self, defect: &Defect);
}

/// Forwards defects to `tracing` as they are found.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DefectSink for TracingSink {
    fn defect_added(&mut self, defect: &Defect) {
        debug!(
            code = defect.code(),
            severity = defect.severity().label(),
            file = defect.filename(),
            line = defect.line(),
            "{}",
            defect.description()
        );
    }
}

/// Append-only defect store shared by every phase of a run.
#[derive(Default)]
pub struct DefectCatalog {
    defects: Vec<Defect>,
    sinks: Vec<Box<dyn DefectSink>>,
}

impl DefectCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, sink: Box<dyn DefectSink>) {
        self.sinks.push(sink);
    }

    pub fn add(&mut self, defect: Defect) {
        for sink in &mut self.sinks {
            sink.defect_added(&defect);
        }
        self.defects.push(defect);
    }

    /// Reports every pair of distinct table rows that share a code.
    ///
    /// Violations are recorded as internal defects; the run continues.
    pub fn check_code_uniqueness(&mut self, table: &[DefectInfo]) {
        for (i, first) in table.iter().enumerate() {
            for second in &table[i + 1..] {
                if first.code == second.code && first.name != second.name {
                    self.add(Defect::new(
                        DefectKind::DefectCodeDuplicate,
                        "",
                        0,
                        format!(
                            "Defect kinds {} and {} share code {}",
                            first.name, second.name, first.code
                        ),
                    ));
                }
            }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Defect> {
        self.defects.iter()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Defect] {
        &mut self.defects
    }

    pub fn as_slice(&self) -> &[Defect] {
        &self.defects
    }

    pub fn len(&self) -> usize {
        self.defects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn of_kind(&self, kind: DefectKind) -> impl Iterator<Item = &Defect> {
        self.defects.iter().filter(move |d| d.kind == kind)
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.defects.iter().filter(|d| d.severity == severity).count()
    }

    pub fn count_state(&self, state: DefectState) -> usize {
        self.defects.iter().filter(|d| d.state == state).count()
    }
}

impl fmt::Debug for DefectCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefectCatalog")
            .field("defects", &self.defects)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn code_table_is_unique() {
        let mut catalog = DefectCatalog::new();
        catalog.check_code_uniqueness(&defect_table());
        assert!(catalog.is_empty(), "unexpected: {:?}", catalog.as_slice());
    }

    #[test]
    fn table_covers_every_kind() {
        let table = defect_table();
        assert_eq!(table.len(), DefectKind::ALL.len());
        assert_eq!(DefectKind::MissingProject.code(), "B10");
        assert_eq!(DefectKind::ProjectIsOrphan.severity(), Severity::Warning);
        assert_eq!(DefectKind::DefectCodeDuplicate.severity(), Severity::Internal);
    }

    #[test]
    fn shared_code_reported_once_per_pair() {
        let table = [
            DefectInfo {
                name: "ProjectHasNoGuid",
                code: "B1",
                severity: Severity::Warning,
            },
            DefectInfo {
                name: "ProjectGuidMismatch",
                code: "B1",
                severity: Severity::Warning,
            },
            DefectInfo {
                name: "ProjectRefBroken",
                code: "B3",
                severity: Severity::Error,
            },
        ];
        let mut catalog = DefectCatalog::new();
        catalog.check_code_uniqueness(&table);

        assert_eq!(catalog.len(), 1);
        let defect = &catalog.as_slice()[0];
        assert_eq!(defect.kind(), DefectKind::DefectCodeDuplicate);
        assert_eq!(defect.severity(), Severity::Internal);
        assert!(defect.description().contains("ProjectHasNoGuid"));
        assert!(defect.description().contains("ProjectGuidMismatch"));
        assert!(defect.description().contains("B1"));
    }

    #[test]
    fn renders_location_severity_and_code() {
        let defect = Defect::new(
            DefectKind::ProjectRefBroken,
            "App/App.vcxproj",
            14,
            "Referenced project Lib/Lib.vcxproj doesn't exist",
        );
        insta::assert_snapshot!(
            defect.to_string(),
            @"App/App.vcxproj(14): error B3: Referenced project Lib/Lib.vcxproj doesn't exist"
        );
    }

    #[test]
    fn rendering_omits_missing_location() {
        let defect = Defect::new(DefectKind::ProjectIsOrphan, "Lib.vcxproj", 0, "orphan");
        assert_eq!(defect.to_string(), "Lib.vcxproj: warning B11: orphan");

        let defect = Defect::new(DefectKind::DefectCodeDuplicate, "", 0, "dup");
        assert_eq!(defect.to_string(), "internal error A4: dup");
    }

    #[test]
    fn state_transitions_only_from_found() {
        let mut defect = Defect::new(DefectKind::ItemNotFound, "a", 1, "x");
        defect.mark_failed("disk full");
        assert_eq!(defect.state(), DefectState::FailedToFix);
        assert_eq!(defect.fix_error(), "disk full");

        defect.mark_fixed();
        assert_eq!(defect.state(), DefectState::FailedToFix);
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl DefectSink for Recorder {
        fn defect_added(&mut self, defect: &Defect) {
            self.0.borrow_mut().push(defect.code().to_string());
        }
    }

    #[test]
    fn sinks_see_each_added_defect() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut catalog = DefectCatalog::new();
        catalog.attach(Box::new(Recorder(Rc::clone(&seen))));

        catalog.add(Defect::new(DefectKind::ProjectHasNoGuid, "a", 0, "x"));
        catalog.add(Defect::new(DefectKind::MissingProject, "b", 0, "y"));

        assert_eq!(*seen.borrow(), vec!["B1", "B10"]);
        assert_eq!(catalog.count_severity(Severity::Error), 1);
        assert_eq!(catalog.of_kind(DefectKind::ProjectHasNoGuid).count(), 1);
    }
}

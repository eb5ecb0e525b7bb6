//! Consistency analysis over a built reference graph.
//!
//! Each analyzer is an independent pass: it reads the graph, appends defects,
//! and never looks at another analyzer's output. Repairs are attached to
//! defects as [`FixCommand`] values and only carried out later by the fix
//! engine, so the graph stays untouched for the whole analysis phase.

use crate::cancel::{CancelToken, Cancelled};
use crate::defect::{Defect, DefectCatalog, DefectKind, FixCommand};
use crate::graph::{Entity, EntityKind, LinkKind, ProjectReference, ReferenceGraph};
use crate::guid::{self, Guid};
use crate::rewriter::TextEdit;
use crate::scanner::resolve;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

/// A read-only pass over the graph.
pub trait Analyzer {
    fn name(&self) -> &'static str;

    /// Appends every defect found to `defects`.
    ///
    /// Fails only when `cancel` is triggered; data problems are always defects.
    fn run(
        &self,
        graph: &ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled>;
}

/// One row of the compiled-in analyzer table.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerEntry {
    pub name: &'static str,
    pub description: &'static str,
    /// Whether the analyzer runs when no explicit selection is given.
    pub default_enabled: bool,
    factory: fn() -> Box<dyn Analyzer>,
}

impl AnalyzerEntry {
    pub fn create(&self) -> Box<dyn Analyzer> {
        (self.factory)()
    }
}

static REGISTRY: [AnalyzerEntry; 5] = [
    AnalyzerEntry {
        name: GuidUniqueness::NAME,
        description: "Projects must not share a ProjectGuid",
        default_enabled: true,
        factory: || Box::new(GuidUniqueness),
    },
    AnalyzerEntry {
        name: GuidMismatch::NAME,
        description: "GUIDs recorded on references must match the referenced project",
        default_enabled: true,
        factory: || Box::new(GuidMismatch),
    },
    AnalyzerEntry {
        name: Orphans::NAME,
        description: "Projects should reference at least one other project",
        default_enabled: true,
        factory: || Box::new(Orphans),
    },
    AnalyzerEntry {
        name: MissingProjects::NAME,
        description: "Solutions must contain the projects their projects reference",
        default_enabled: true,
        factory: || Box::new(MissingProjects),
    },
    AnalyzerEntry {
        name: MissingItems::NAME,
        description: "Items must name files that exist",
        default_enabled: false,
        factory: || Box::new(MissingItems),
    },
];

/// All known analyzers, in the order they run.
pub fn registry() -> &'static [AnalyzerEntry] {
    &REGISTRY
}

/// Instantiates the analyzers to run.
///
/// With an empty `only`, every default-enabled analyzer is selected; otherwise
/// exactly the named ones. Names in `skip` are then removed. Unknown names in
/// either list are reported as [`DefectKind::AnalyzerNotFound`] and ignored.
pub fn select(only: &[String], skip: &[String], defects: &mut DefectCatalog) -> Vec<Box<dyn Analyzer>> {
    for name in only.iter().chain(skip) {
        if lookup(name).is_none() {
            defects.add(Defect::new(
                DefectKind::AnalyzerNotFound,
                "",
                0,
                format!("Unknown analyzer '{}'", name),
            ));
        }
    }

    let matches = |names: &[String], entry: &AnalyzerEntry| {
        names.iter().any(|name| name.eq_ignore_ascii_case(entry.name))
    };
    registry()
        .iter()
        .filter(|entry| {
            if only.is_empty() {
                entry.default_enabled
            } else {
                matches(only, entry)
            }
        })
        .filter(|entry| !matches(skip, entry))
        .map(AnalyzerEntry::create)
        .collect()
}

fn lookup(name: &str) -> Option<&'static AnalyzerEntry> {
    registry()
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// Two projects claiming the same GUID. The first one discovered keeps it.
pub struct GuidUniqueness;

impl GuidUniqueness {
    pub const NAME: &'static str = "guid-uniqueness";
}

impl Analyzer for GuidUniqueness {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(
        &self,
        graph: &ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled> {
        let mut owners: HashMap<Guid, &Entity> = HashMap::new();
        for (_, entity, project, _) in graph.native_projects() {
            cancel.check()?;
            let Some(id) = project.id else {
                continue;
            };
            match owners.entry(id) {
                Entry::Occupied(first) => defects.add(Defect::new(
                    DefectKind::ProjectGuidIsDuplicated,
                    &entity.display_path,
                    project.id_line,
                    format!(
                        "GUID {} is already used by project {}",
                        id,
                        first.get().display_path
                    ),
                )),
                Entry::Vacant(slot) => {
                    slot.insert(entity);
                }
            }
        }
        Ok(())
    }
}

/// A reference recording a GUID other than the target's own.
///
/// Mismatches on project references carry a fix that rewrites the recorded
/// GUID, when the target has one and the reference has a `<Project>` element.
pub struct GuidMismatch;

impl GuidMismatch {
    pub const NAME: &'static str = "guid-mismatch";
}

impl Analyzer for GuidMismatch {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(
        &self,
        graph: &ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled> {
        // Unparsable targets have no id, so any recorded GUID disagrees with them.
        for (target, entity, project) in graph.projects() {
            for link in graph.links_to(target, LinkKind::Reference) {
                cancel.check()?;
                let Some(reference) = link.as_reference() else {
                    continue;
                };
                if reference.id == project.id {
                    continue;
                }

                let source = graph.entity(link.from);
                let description = format!(
                    "GUID {} in the reference doesn't match GUID {} of project {}",
                    guid::describe(reference.id),
                    guid::describe(project.id),
                    entity.display_path
                );
                let defect = match source.kind() {
                    EntityKind::Solution => Defect::new(
                        DefectKind::SolutionGuidMismatch,
                        &source.display_path,
                        link.line(),
                        description,
                    ),
                    EntityKind::Project => {
                        let defect = Defect::new(
                            DefectKind::ProjectGuidMismatch,
                            &source.display_path,
                            link.line(),
                            description,
                        );
                        match identifier_fix(&source.full_path, reference, project.id) {
                            Some(fix) => defect.with_fix(fix),
                            None => defect,
                        }
                    }
                };
                defects.add(defect);
            }
        }
        Ok(())
    }
}

fn identifier_fix(file: &Path, reference: &ProjectReference, id: Option<Guid>) -> Option<FixCommand> {
    let id = id?.to_string();
    let site = reference.site.as_ref()?;
    let edit = match &site.text {
        // Only the GUID itself; whitespace around it stays.
        Some(text) => {
            let start = text.span.start + (text.raw.len() - text.raw.trim_start().len());
            let recorded = text.raw.trim();
            TextEdit::new(start..start + recorded.len(), recorded, id)
        }
        // Empty element: write it out in full.
        None => TextEdit::new(
            site.element.span.clone(),
            site.element.raw.clone(),
            format!("<{0}>{1}</{0}>", site.name, id),
        ),
    };
    Some(FixCommand::SetReferenceIdentifier {
        file: file.to_path_buf(),
        edit,
    })
}

/// A project that references no other project.
pub struct Orphans;

impl Orphans {
    pub const NAME: &'static str = "orphans";
}

impl Analyzer for Orphans {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(
        &self,
        graph: &ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled> {
        for (id, entity, _, _) in graph.native_projects() {
            cancel.check()?;
            if graph.links_from(id, LinkKind::Reference).next().is_none() {
                defects.add(Defect::new(
                    DefectKind::ProjectIsOrphan,
                    &entity.display_path,
                    0,
                    "Project has no project references",
                ));
            }
        }
        Ok(())
    }
}

/// A solution missing a project that one of its own projects references.
///
/// Looks exactly one hop past the solution's members.
pub struct MissingProjects;

impl MissingProjects {
    pub const NAME: &'static str = "missing-projects";
}

impl Analyzer for MissingProjects {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(
        &self,
        graph: &ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled> {
        let valid = |id| graph.entity(id).is_valid();
        for (solution, entity, _) in graph.solutions() {
            if !entity.is_valid() {
                continue;
            }
            for project in graph.linked_from(solution, LinkKind::Reference).filter(|&id| valid(id)) {
                for referenced in graph.linked_from(project, LinkKind::Reference).filter(|&id| valid(id)) {
                    cancel.check()?;
                    if graph.has_link(solution, referenced, LinkKind::Reference) {
                        continue;
                    }
                    defects.add(Defect::new(
                        DefectKind::MissingProject,
                        &entity.display_path,
                        0,
                        format!(
                            "Project {} is referenced by {} but is not part of the solution",
                            graph.entity(referenced).display_path,
                            graph.entity(project).display_path
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Items that are not source files.
const NON_FILE_ITEMS: [&str; 5] = [
    "ProjectConfiguration",
    "ProjectReference",
    "ProjectCapability",
    "PropertyPageSchema",
    "BuildMacro",
];

/// Item includes naming a file that does not exist. Fixed by removing the item.
pub struct MissingItems;

impl MissingItems {
    pub const NAME: &'static str = "missing-items";
}

impl Analyzer for MissingItems {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(
        &self,
        graph: &ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled> {
        for (_, entity, _, tree) in graph.native_projects() {
            let dir = entity.full_path.parent().unwrap_or(Path::new(""));
            for item in &tree.items {
                cancel.check()?;
                if NON_FILE_ITEMS
                    .iter()
                    .any(|kind| kind.eq_ignore_ascii_case(&item.item_type))
                    || !is_literal_path(&item.include)
                    || resolve(dir, &item.include).exists()
                {
                    continue;
                }
                let fix = FixCommand::RemoveItem {
                    file: entity.full_path.clone(),
                    edit: TextEdit::new(item.source.span.clone(), item.source.raw.clone(), ""),
                };
                defects.add(
                    Defect::new(
                        DefectKind::ItemNotFound,
                        &entity.display_path,
                        item.line,
                        format!("Item {} '{}' doesn't exist", item.item_type, item.include),
                    )
                    .with_fix(fix),
                );
            }
        }
        Ok(())
    }
}

/// True for a single path without properties, transforms, wildcards or lists.
fn is_literal_path(include: &str) -> bool {
    let include = include.trim();
    !include.is_empty()
        && !["$(", "%(", "@(", "*", "?", ";"]
            .iter()
            .any(|pattern| include.contains(pattern))
}

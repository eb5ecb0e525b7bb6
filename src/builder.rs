//! Turns discovered files into a [`ReferenceGraph`].
//!
//! Building runs in phases, each finished before the next starts:
//!
//! 1. open every solution and project, recording failures as defects and
//!    still registering an invalid entity for the file
//! 2. optionally follow `<Import>` elements to further project files
//! 3. resolve solution members to projects
//! 4. resolve `ProjectReference` items to projects
//!
//! Reference resolution lives here rather than in an analyzer because links
//! must exist before any analyzer runs, and analyzers never change the graph.

use crate::cancel::{CancelToken, Cancelled};
use crate::defect::{Defect, DefectCatalog, DefectKind};
use crate::graph::{
    Entity, EntityBody, EntityId, EntityKind, GraphError, ImportLink, Link, LinkBody, LinkKind,
    ProjectEntity, ProjectOrigin, ProjectReference, ReferenceGraph,
};
use crate::guid;
use crate::project::{Item, MsBuildReader, ProjectReader};
use crate::scanner::{DiscoveredFiles, PROJECT_EXTENSION, display_path, has_extension, resolve};
use crate::solution::{ProjectType, SlnReader, SolutionMember, SolutionReader};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub struct GraphBuilder {
    base_dir: PathBuf,
    follow_imports: bool,
    solution_reader: Box<dyn SolutionReader>,
    project_reader: Box<dyn ProjectReader>,
}

enum Resolution {
    Missing,
    AlreadyLinked,
    Target(EntityId),
}

impl GraphBuilder {
    /// A builder reading files from disk; display paths are relative to `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            follow_imports: false,
            solution_reader: Box::new(SlnReader),
            project_reader: Box::new(MsBuildReader),
        }
    }

    pub fn follow_imports(mut self, follow: bool) -> Self {
        self.follow_imports = follow;
        self
    }

    pub fn with_readers(
        mut self,
        solutions: impl SolutionReader + 'static,
        projects: impl ProjectReader + 'static,
    ) -> Self {
        self.solution_reader = Box::new(solutions);
        self.project_reader = Box::new(projects);
        self
    }

    pub fn build(
        &self,
        files: &DiscoveredFiles,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<ReferenceGraph, BuildError> {
        info!(
            solutions = files.solutions.len(),
            projects = files.projects.len(),
            "building reference graph"
        );
        let mut graph = ReferenceGraph::new();

        for path in &files.solutions {
            cancel.check()?;
            let entity = self.open_solution(path, defects);
            graph.add_entity(entity)?;
        }
        for path in &files.projects {
            cancel.check()?;
            let entity = self.open_project(path, ProjectOrigin::Native, defects);
            graph.add_entity(entity)?;
        }

        if self.follow_imports {
            self.add_imports(&mut graph, defects, cancel)?;
        }
        self.link_solutions(&mut graph, defects, cancel)?;
        self.link_projects(&mut graph, defects, cancel)?;

        info!(
            entities = graph.len(),
            links = graph.links().count(),
            "reference graph built"
        );
        Ok(graph)
    }

    fn display(&self, path: &Path) -> String {
        display_path(path, &self.base_dir)
    }

    fn open_solution(&self, path: &Path, defects: &mut DefectCatalog) -> Entity {
        let shown = self.display(path);
        let members = match self.solution_reader.read(path) {
            Ok(members) => {
                debug!(path = %shown, members = members.len(), "opened solution");
                Some(members)
            }
            Err(err) => {
                defects.add(Defect::new(
                    DefectKind::SolutionOpenFailure,
                    &shown,
                    0,
                    format!("Can't open solution: {:#}", err),
                ));
                None
            }
        };
        Entity::solution(path.to_path_buf(), shown, members)
    }

    /// Imported files are not required to carry a project GUID.
    fn open_project(&self, path: &Path, origin: ProjectOrigin, defects: &mut DefectCatalog) -> Entity {
        let shown = self.display(path);
        let tree = match self.project_reader.read(path) {
            Ok(tree) => {
                debug!(path = %shown, ?origin, "opened project");
                Some(tree)
            }
            Err(err) => {
                defects.add(Defect::new(
                    DefectKind::ProjectOpenFailure,
                    &shown,
                    0,
                    format!("Can't open project: {:#}", err),
                ));
                None
            }
        };

        let mut project = ProjectEntity {
            origin,
            tree: None,
            id: None,
            id_line: 0,
        };
        if let (Some(tree), ProjectOrigin::Native) = (&tree, origin) {
            match tree.property("ProjectGuid") {
                Some(property) => {
                    project.id = guid::parse(&property.value, &shown, property.line, defects);
                    project.id_line = property.line;
                }
                None => defects.add(Defect::new(
                    DefectKind::ProjectHasNoGuid,
                    &shown,
                    0,
                    "Project has no ProjectGuid property",
                )),
            }
        }
        project.tree = tree;

        Entity {
            full_path: path.to_path_buf(),
            display_path: shown,
            body: EntityBody::Project(project),
        }
    }

    /// Breadth-first over every parsed project, adding imported files as they are reached.
    fn add_imports(
        &self,
        graph: &mut ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), BuildError> {
        let mut queue: VecDeque<EntityId> = graph
            .projects()
            .filter(|(_, entity, _)| entity.is_valid())
            .map(|(id, _, _)| id)
            .collect();

        while let Some(source) = queue.pop_front() {
            cancel.check()?;
            let entity = graph.entity(source);
            let dir = directory(&entity.full_path);
            let imports = entity
                .as_project()
                .and_then(|project| project.tree.as_ref())
                .map(|tree| tree.imports.clone())
                .unwrap_or_default();

            for import in imports {
                if import.project.contains("$(") {
                    debug!(import = %import.project, "skipping import with property reference");
                    continue;
                }
                let path = resolve(&dir, &import.project);
                let target = match graph.find(&path) {
                    Some(id) => id,
                    None if path.is_file() => {
                        let entity = self.open_project(&path, ProjectOrigin::Imported, defects);
                        let id = graph.add_entity(entity)?;
                        queue.push_back(id);
                        id
                    }
                    None => {
                        debug!(import = %path.display(), "skipping import of missing file");
                        continue;
                    }
                };
                if target == source
                    || graph.entity(target).kind() != EntityKind::Project
                    || graph.has_link(source, target, LinkKind::Import)
                {
                    continue;
                }
                graph.add_link(Link {
                    from: source,
                    to: target,
                    body: LinkBody::Import(ImportLink {
                        label: import.label.unwrap_or_default(),
                        line: import.line,
                    }),
                })?;
            }
        }
        Ok(())
    }

    /// Links each solution to its native project members.
    fn link_solutions(
        &self,
        graph: &mut ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), BuildError> {
        let solutions: Vec<(EntityId, PathBuf, String, Vec<SolutionMember>)> = graph
            .solutions()
            .filter_map(|(id, entity, solution)| {
                let members = solution.members.clone()?;
                Some((id, directory(&entity.full_path), entity.display_path.clone(), members))
            })
            .collect();

        for (source, dir, filename, members) in solutions {
            for member in members {
                cancel.check()?;
                let path = resolve(&dir, &member.path);
                if member.project_type != ProjectType::MsBuild
                    || !has_extension(&path, PROJECT_EXTENSION)
                {
                    debug!(member = %member.name, "skipping non-native solution member");
                    continue;
                }

                let target_display = self.display(&path);
                match resolution(graph, source, &path) {
                    Resolution::Missing => defects.add(Defect::new(
                        DefectKind::SolutionRefBroken,
                        &filename,
                        member.line,
                        format!("Solution references project {} which doesn't exist", target_display),
                    )),
                    Resolution::AlreadyLinked => defects.add(Defect::new(
                        DefectKind::SolutionRefDuplicate,
                        &filename,
                        member.line,
                        format!("Project {} is referenced more than once", target_display),
                    )),
                    Resolution::Target(target) => {
                        let id = guid::parse(&member.guid, &filename, member.line, defects);
                        graph.add_link(Link {
                            from: source,
                            to: target,
                            body: LinkBody::Reference(ProjectReference {
                                id,
                                line: member.line,
                                site: None,
                            }),
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Links each native project to the projects its `ProjectReference` items name.
    fn link_projects(
        &self,
        graph: &mut ReferenceGraph,
        defects: &mut DefectCatalog,
        cancel: &CancelToken,
    ) -> Result<(), BuildError> {
        let projects: Vec<(EntityId, PathBuf, String, Vec<Item>)> = graph
            .native_projects()
            .map(|(id, entity, _, tree)| {
                (
                    id,
                    directory(&entity.full_path),
                    entity.display_path.clone(),
                    tree.items_of_type("ProjectReference").cloned().collect(),
                )
            })
            .collect();

        for (source, dir, filename, items) in projects {
            for item in items {
                cancel.check()?;
                let path = resolve(&dir, &item.include);
                let target_display = self.display(&path);
                match resolution(graph, source, &path) {
                    Resolution::Missing => defects.add(Defect::new(
                        DefectKind::ProjectRefBroken,
                        &filename,
                        item.line,
                        format!("Referenced project {} doesn't exist", target_display),
                    )),
                    Resolution::AlreadyLinked => defects.add(Defect::new(
                        DefectKind::ProjectRefDuplicate,
                        &filename,
                        item.line,
                        format!("Project {} is referenced more than once", target_display),
                    )),
                    Resolution::Target(target) => {
                        let site = item.metadata("Project").cloned();
                        // An empty <Project/> is invalid text, not a missing identifier.
                        let id = site.as_ref().and_then(|metadata| {
                            guid::parse(&metadata.value, &filename, metadata.line, defects)
                        });
                        let line = site.as_ref().map_or(item.line, |metadata| metadata.line);
                        graph.add_link(Link {
                            from: source,
                            to: target,
                            body: LinkBody::Reference(ProjectReference { id, line, site }),
                        })?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn resolution(graph: &ReferenceGraph, source: EntityId, path: &Path) -> Resolution {
    match graph.find_project(path) {
        None => Resolution::Missing,
        Some(target) if graph.has_link(source, target, LinkKind::Reference) => {
            Resolution::AlreadyLinked
        }
        Some(target) => Resolution::Target(target),
    }
}

fn directory(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

//! The reference graph: solutions and projects as entities, references and
//! imports as directed links.
//!
//! Entities live in an arena indexed by [`EntityId`] and keyed by their
//! case-insensitive path. Links are appended once and indexed both ways, so
//! "what does X reference" and "who references X" are equally cheap. All
//! query methods are lazy iterators over the arena.

use crate::guid::Guid;
use crate::project::{Metadata, ProjectTree};
use crate::scanner::path_key;
use crate::solution::SolutionMember;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Contract violations while populating the graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("entity already registered: {0}")]
    DuplicateEntity(PathBuf),
    #[error("link endpoint is not a registered entity: {0:?}")]
    UnknownEntity(EntityId),
    #[error("{kind:?} link from {from} to {to} already exists")]
    DuplicateLink {
        kind: LinkKind,
        from: PathBuf,
        to: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Solution,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LinkKind {
    Reference,
    Import,
}

/// A solution or project file.
#[derive(Debug, Clone)]
pub struct Entity {
    pub full_path: PathBuf,
    pub display_path: String,
    pub body: EntityBody,
}

#[derive(Debug, Clone)]
pub enum EntityBody {
    Solution(SolutionEntity),
    Project(ProjectEntity),
}

/// `members` is `None` when the solution failed to parse.
#[derive(Debug, Clone, Default)]
pub struct SolutionEntity {
    pub members: Option<Vec<SolutionMember>>,
}

/// Whether a project was discovered directly or only reached through an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProjectOrigin {
    Native,
    Imported,
}

/// `tree` is `None` when the project failed to parse.
#[derive(Debug, Clone)]
pub struct ProjectEntity {
    pub origin: ProjectOrigin,
    pub tree: Option<ProjectTree>,
    pub id: Option<Guid>,
    pub id_line: usize,
}

impl Entity {
    pub fn solution(
        full_path: PathBuf,
        display_path: String,
        members: Option<Vec<SolutionMember>>,
    ) -> Self {
        Self {
            full_path,
            display_path,
            body: EntityBody::Solution(SolutionEntity { members }),
        }
    }

    pub fn project(
        full_path: PathBuf,
        display_path: String,
        origin: ProjectOrigin,
        tree: Option<ProjectTree>,
    ) -> Self {
        Self {
            full_path,
            display_path,
            body: EntityBody::Project(ProjectEntity {
                origin,
                tree,
                id: None,
                id_line: 0,
            }),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self.body {
            EntityBody::Solution(_) => EntityKind::Solution,
            EntityBody::Project(_) => EntityKind::Project,
        }
    }

    /// True when the backing file parsed.
    pub fn is_valid(&self) -> bool {
        match &self.body {
            EntityBody::Solution(solution) => solution.members.is_some(),
            EntityBody::Project(project) => project.tree.is_some(),
        }
    }

    pub fn as_solution(&self) -> Option<&SolutionEntity> {
        match &self.body {
            EntityBody::Solution(solution) => Some(solution),
            EntityBody::Project(_) => None,
        }
    }

    pub fn as_project(&self) -> Option<&ProjectEntity> {
        match &self.body {
            EntityBody::Project(project) => Some(project),
            EntityBody::Solution(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.body {
            EntityBody::Solution(_) => "Solution",
            EntityBody::Project(project) => match project.origin {
                ProjectOrigin::Native => "Project",
                ProjectOrigin::Imported => "Import",
            },
        }
    }
}

/// A directed edge between two registered entities.
#[derive(Debug, Clone)]
pub struct Link {
    pub from: EntityId,
    pub to: EntityId,
    pub body: LinkBody,
}

#[derive(Debug, Clone)]
pub enum LinkBody {
    Reference(ProjectReference),
    Import(ImportLink),
}

/// A solution membership or a `ProjectReference` item.
#[derive(Debug, Clone)]
pub struct ProjectReference {
    /// GUID recorded at the reference site, if present and well-formed.
    pub id: Option<Guid>,
    pub line: usize,
    /// The `<Project>` metadata element, for project-to-project references.
    pub site: Option<Metadata>,
}

#[derive(Debug, Clone)]
pub struct ImportLink {
    pub label: String,
    pub line: usize,
}

impl Link {
    pub fn kind(&self) -> LinkKind {
        match self.body {
            LinkBody::Reference(_) => LinkKind::Reference,
            LinkBody::Import(_) => LinkKind::Import,
        }
    }

    pub fn line(&self) -> usize {
        match &self.body {
            LinkBody::Reference(reference) => reference.line,
            LinkBody::Import(import) => import.line,
        }
    }

    pub fn as_reference(&self) -> Option<&ProjectReference> {
        match &self.body {
            LinkBody::Reference(reference) => Some(reference),
            LinkBody::Import(_) => None,
        }
    }

    pub fn as_import(&self) -> Option<&ImportLink> {
        match &self.body {
            LinkBody::Import(import) => Some(import),
            LinkBody::Reference(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReferenceGraph {
    entities: Vec<Entity>,
    index: HashMap<String, EntityId>,
    links: Vec<Link>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    joined: HashSet<(EntityId, EntityId, LinkKind)>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity under its case-insensitive path.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, GraphError> {
        let key = path_key(&entity.full_path);
        if self.index.contains_key(&key) {
            return Err(GraphError::DuplicateEntity(entity.full_path));
        }
        let id = EntityId(self.entities.len());
        self.index.insert(key, id);
        self.entities.push(entity);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        Ok(id)
    }

    /// Appends a link. Both endpoints must be registered and no link of the
    /// same kind may already join them.
    pub fn add_link(&mut self, link: Link) -> Result<(), GraphError> {
        for endpoint in [link.from, link.to] {
            if endpoint.0 >= self.entities.len() {
                return Err(GraphError::UnknownEntity(endpoint));
            }
        }
        if !self.joined.insert((link.from, link.to, link.kind())) {
            return Err(GraphError::DuplicateLink {
                kind: link.kind(),
                from: self.entity(link.from).full_path.clone(),
                to: self.entity(link.to).full_path.clone(),
            });
        }
        let index = self.links.len();
        self.outgoing[link.from.0].push(index);
        self.incoming[link.to.0].push(index);
        self.links.push(link);
        Ok(())
    }

    pub fn find(&self, path: &Path) -> Option<EntityId> {
        self.index.get(&path_key(path)).copied()
    }

    /// Like [`find`](Self::find), but only matches projects.
    pub fn find_project(&self, path: &Path) -> Option<EntityId> {
        self.find(path)
            .filter(|&id| self.entity(id).kind() == EntityKind::Project)
    }

    /// # Panics
    ///
    /// If `id` was not issued by this graph.
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(index, entity)| (EntityId(index), entity))
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities().filter(move |(_, entity)| entity.kind() == kind)
    }

    pub fn solutions(&self) -> impl Iterator<Item = (EntityId, &Entity, &SolutionEntity)> {
        self.entities()
            .filter_map(|(id, entity)| entity.as_solution().map(|s| (id, entity, s)))
    }

    pub fn projects(&self) -> impl Iterator<Item = (EntityId, &Entity, &ProjectEntity)> {
        self.entities()
            .filter_map(|(id, entity)| entity.as_project().map(|p| (id, entity, p)))
    }

    /// Valid projects that were discovered directly, with their parsed trees.
    pub fn native_projects(
        &self,
    ) -> impl Iterator<Item = (EntityId, &Entity, &ProjectEntity, &ProjectTree)> {
        self.projects().filter_map(|(id, entity, project)| {
            match (project.origin, project.tree.as_ref()) {
                (ProjectOrigin::Native, Some(tree)) => Some((id, entity, project, tree)),
                _ => None,
            }
        })
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn links_from(&self, id: EntityId, kind: LinkKind) -> impl Iterator<Item = &Link> {
        self.outgoing[id.0]
            .iter()
            .map(|&index| &self.links[index])
            .filter(move |link| link.kind() == kind)
    }

    pub fn links_to(&self, id: EntityId, kind: LinkKind) -> impl Iterator<Item = &Link> {
        self.incoming[id.0]
            .iter()
            .map(|&index| &self.links[index])
            .filter(move |link| link.kind() == kind)
    }

    /// Targets of `id`'s outgoing links of `kind`.
    pub fn linked_from(&self, id: EntityId, kind: LinkKind) -> impl Iterator<Item = EntityId> {
        self.links_from(id, kind).map(|link| link.to)
    }

    pub fn has_link(&self, from: EntityId, to: EntityId, kind: LinkKind) -> bool {
        self.joined.contains(&(from, to, kind))
    }
}

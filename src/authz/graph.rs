use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use crate::authz::errors::AuthzError;
use crate::authz::hierarchy::{HierarchyIndex, NodeId};
use crate::authz::policy::PolicyRecord;
use crate::authz::types::{Resource, Specifier, Subject, SubjectKind};

/// Something stored in a [`Registry`], identified by a unique key.
pub trait Entity: Clone {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

impl Entity for Subject {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Entity for Resource {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Entity for Specifier {
    type Key = (String, String);

    fn key(&self) -> (String, String) {
        (self.key.clone(), self.value.clone())
    }
}

/// All nodes of one entity kind plus their `ChildOf` hierarchy.
#[derive(Debug, Clone)]
pub struct Registry<T: Entity> {
    entries: Vec<T>,
    by_key: HashMap<T::Key, NodeId>,
    hierarchy: HierarchyIndex,
}

impl<T: Entity> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_key: HashMap::new(),
            hierarchy: HierarchyIndex::new(),
        }
    }
}

impl<T: Entity> Registry<T> {
    pub fn id(&self, key: &T::Key) -> Option<NodeId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.entries.get(id.index())
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    /// Callers check for duplicates first; a repeated key would shadow the earlier node.
    pub(crate) fn insert(&mut self, entity: T) -> NodeId {
        let id = self.hierarchy.add_node();
        self.by_key.insert(entity.key(), id);
        self.entries.push(entity);
        id
    }

    pub(crate) fn link(&mut self, child: NodeId, parent: NodeId) {
        self.hierarchy.link(child, parent);
    }

    /// Map node ids back to entities, failing on ids this registry never issued.
    pub fn resolve<'a>(
        &'a self,
        ids: impl IntoIterator<Item = NodeId>,
        what: &str,
    ) -> Result<Vec<&'a T>, AuthzError> {
        ids.into_iter()
            .map(|id| {
                self.get(id).ok_or_else(|| {
                    AuthzError::Inconsistent(format!("dangling {what} node #{}", id.index()))
                })
            })
            .collect()
    }
}

/// Which hierarchy a membership query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Subject,
    Resource,
    Specifier,
}

/// In-memory graph: three entity registries and the policies joining them.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub(crate) subjects: Registry<Subject>,
    pub(crate) resources: Registry<Resource>,
    pub(crate) specifiers: Registry<Specifier>,
    pub(crate) policies: BTreeMap<String, PolicyRecord>,
    /// HAS_POLICY edges, subject side.
    pub(crate) policies_by_subject: HashMap<NodeId, BTreeSet<String>>,
    /// HAS_POLICY edges, resource side.
    pub(crate) policies_by_resource: HashMap<NodeId, BTreeSet<String>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subjects(&self) -> &Registry<Subject> {
        &self.subjects
    }

    pub fn resources(&self) -> &Registry<Resource> {
        &self.resources
    }

    pub fn specifiers(&self) -> &Registry<Specifier> {
        &self.specifiers
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    pub fn index(&self, kind: EntityKind) -> &HierarchyIndex {
        match kind {
            EntityKind::Subject => self.subjects.hierarchy(),
            EntityKind::Resource => self.resources.hierarchy(),
            EntityKind::Specifier => self.specifiers.hierarchy(),
        }
    }

    pub fn is_ancestor_or_self(&self, kind: EntityKind, ancestor: NodeId, node: NodeId) -> bool {
        self.index(kind).is_ancestor_or_self(ancestor, node)
    }

    pub fn descendants_or_self(&self, kind: EntityKind, node: NodeId) -> BTreeSet<NodeId> {
        self.index(kind).descendants_or_self(node)
    }

    pub fn subject_id(&self, name: &str) -> Option<NodeId> {
        self.subjects.id(&name.to_string())
    }

    pub fn resource_id(&self, name: &str) -> Option<NodeId> {
        self.resources.id(&name.to_string())
    }

    /// Create a subject under zero or more existing Group parents.
    /// Every parent is checked before anything is written.
    pub fn create_subject(&mut self, subject: Subject, parents: &[&str]) -> Result<Subject, AuthzError> {
        if self.subjects.contains(&subject.name) {
            return Err(AuthzError::DuplicateSubject(subject.name));
        }
        let parent_ids = parents
            .iter()
            .map(|p| self.group_parent(&subject.name, p))
            .collect::<Result<Vec<_>, _>>()?;

        let id = self.subjects.insert(subject.clone());
        for parent in parent_ids {
            self.subjects.link(id, parent);
        }
        tracing::debug!(subject = %subject, ?parents, "created subject");
        Ok(subject)
    }

    /// Add a `ChildOf` edge between two existing subjects.
    pub fn link_subject(&mut self, child: &str, parent: &str) -> Result<(), AuthzError> {
        let child_id = self
            .subject_id(child)
            .ok_or_else(|| AuthzError::SubjectNotFound(child.to_string()))?;
        let parent_id = self.group_parent(child, parent)?;
        self.subjects.link(child_id, parent_id);
        tracing::debug!(child, parent, "linked subject");
        Ok(())
    }

    fn group_parent(&self, child: &str, parent: &str) -> Result<NodeId, AuthzError> {
        let id = self
            .subject_id(parent)
            .ok_or_else(|| AuthzError::SubjectNotFound(parent.to_string()))?;
        match self.subjects.get(id) {
            Some(s) if s.kind == SubjectKind::Group => Ok(id),
            Some(_) => Err(AuthzError::ParentNotGroup {
                child: child.to_string(),
                parent: parent.to_string(),
            }),
            None => Err(AuthzError::Inconsistent(format!(
                "subject `{parent}` indexed without a node"
            ))),
        }
    }

    /// Create a resource under zero or more existing parents (no kind restriction).
    pub fn create_resource(&mut self, resource: Resource, parents: &[&str]) -> Result<Resource, AuthzError> {
        if self.resources.contains(&resource.name) {
            return Err(AuthzError::DuplicateResource(resource.name));
        }
        let parent_ids = parents
            .iter()
            .map(|p| {
                self.resource_id(p)
                    .ok_or_else(|| AuthzError::ResourceNotFound(p.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let id = self.resources.insert(resource.clone());
        for parent in parent_ids {
            self.resources.link(id, parent);
        }
        tracing::debug!(resource = %resource, ?parents, "created resource");
        Ok(resource)
    }

    pub fn link_resource(&mut self, child: &str, parent: &str) -> Result<(), AuthzError> {
        let child_id = self
            .resource_id(child)
            .ok_or_else(|| AuthzError::ResourceNotFound(child.to_string()))?;
        let parent_id = self
            .resource_id(parent)
            .ok_or_else(|| AuthzError::ResourceNotFound(parent.to_string()))?;
        self.resources.link(child_id, parent_id);
        tracing::debug!(child, parent, "linked resource");
        Ok(())
    }
}

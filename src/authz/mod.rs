pub mod document;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod hierarchy;
pub mod loader;
pub mod policy;
pub mod product;
pub mod query;
pub mod specifier;
pub mod types;
pub mod web;

use std::collections::BTreeSet;

use parking_lot::RwLock;

use errors::AuthzError;
use graph::Graph;
use query::{CanQuery, HowCanQuery, WhatCanQuery, WhoCanQuery};
use types::{Policy, PolicyDraft, PolicyFilter, Resource, Specifier, SpecifierMap, Subject};

/// Shared authorization state.
///
/// Queries and policy reads take the read lock; every mutation holds the
/// write lock across its validation and write, so a half-built policy is
/// never visible to a concurrent query.
#[derive(Debug, Default)]
pub struct Otter {
    graph: RwLock<Graph>,
}

impl Otter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: Graph) -> Self {
        Self {
            graph: RwLock::new(graph),
        }
    }

    // ---------- entities ----------

    pub fn create_subject(&self, subject: Subject, parents: &[&str]) -> Result<Subject, AuthzError> {
        self.graph.write().create_subject(subject, parents)
    }

    pub fn link_subject(&self, child: &str, parent: &str) -> Result<(), AuthzError> {
        self.graph.write().link_subject(child, parent)
    }

    pub fn create_resource(&self, resource: Resource, parents: &[&str]) -> Result<Resource, AuthzError> {
        self.graph.write().create_resource(resource, parents)
    }

    pub fn link_resource(&self, child: &str, parent: &str) -> Result<(), AuthzError> {
        self.graph.write().link_resource(child, parent)
    }

    pub fn create_specifier(&self, specifier: Specifier) -> Result<Specifier, AuthzError> {
        self.graph.write().create_specifier(specifier)
    }

    pub fn create_specifier_child(
        &self,
        specifier: Specifier,
        parent: &Specifier,
    ) -> Result<Specifier, AuthzError> {
        self.graph.write().create_specifier_child(specifier, parent)
    }

    pub fn known_keys(&self) -> BTreeSet<String> {
        self.graph.read().known_keys()
    }

    pub fn subjects(&self) -> Vec<Subject> {
        let graph = self.graph.read();
        let mut subjects: Vec<Subject> = graph.subjects().iter().cloned().collect();
        subjects.sort();
        subjects
    }

    pub fn resources(&self) -> Vec<Resource> {
        let graph = self.graph.read();
        let mut resources: Vec<Resource> = graph.resources().iter().cloned().collect();
        resources.sort();
        resources
    }

    // ---------- policies ----------

    pub fn create_policy(&self, draft: &PolicyDraft) -> Result<Policy, AuthzError> {
        self.graph.write().create_policy(draft)
    }

    pub fn get_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, AuthzError> {
        self.graph.read().get_policies(filter)
    }

    pub fn get_policy(&self, id: &str) -> Result<Policy, AuthzError> {
        self.graph.read().get_policy(id)
    }

    pub fn delete_policy(&self, policy: &Policy) -> Result<(), AuthzError> {
        self.delete_policy_by_id(&policy.id)
    }

    /// Remove a policy by id. Unknown ids are not an error.
    pub fn delete_policy_by_id(&self, id: &str) -> Result<(), AuthzError> {
        self.graph.write().delete_policy(id)
    }

    /// Replace `old` with a policy built from `new`: create first, then
    /// delete. The two steps take the write lock separately, so a reader
    /// in between sees both policies. A failed create leaves `old` intact.
    pub fn update_policy(&self, old: &Policy, new: &PolicyDraft) -> Result<Policy, AuthzError> {
        if old.id.is_empty() {
            return Err(AuthzError::PolicyIdRequired);
        }
        let created = self.create_policy(new)?;
        if let Err(e) = self.delete_policy(old) {
            tracing::warn!(
                old = %old.id,
                new = %created.id,
                error = %e,
                "delete step of policy update failed, removing replacement"
            );
            if let Err(rollback) = self.delete_policy(&created) {
                tracing::error!(policy_id = %created.id, error = %rollback, "rollback failed");
            }
            return Err(e);
        }
        tracing::debug!(old = %old.id, new = %created.id, "updated policy");
        Ok(created)
    }

    // ---------- queries ----------

    pub fn can(&self, query: &CanQuery) -> Result<bool, AuthzError> {
        engine::can(&self.graph.read(), query)
    }

    pub fn who_can(&self, query: &WhoCanQuery) -> Result<Vec<Subject>, AuthzError> {
        engine::who_can(&self.graph.read(), query)
    }

    pub fn what_can(&self, query: &WhatCanQuery) -> Result<Vec<Resource>, AuthzError> {
        engine::what_can(&self.graph.read(), query)
    }

    pub fn how_can(&self, query: &HowCanQuery) -> Result<Vec<SpecifierMap>, AuthzError> {
        engine::how_can(&self.graph.read(), query)
    }

    /// A stored subject by name.
    pub fn subject(&self, name: &str) -> Option<Subject> {
        let graph = self.graph.read();
        graph
            .subject_id(name)
            .and_then(|id| graph.subjects().get(id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::types::Action;

    fn otter() -> Otter {
        let otter = Otter::new();
        otter.create_subject(Subject::group("Group1"), &[]).unwrap();
        otter
            .create_subject(Subject::principal("Principal1"), &["Group1"])
            .unwrap();
        otter.create_resource(Resource::new("_"), &[]).unwrap();
        otter
            .create_resource(Resource::new("Resource1"), &["_"])
            .unwrap();
        otter
    }

    #[test]
    fn test_update_replaces_policy() {
        let otter = otter();
        let old = otter
            .create_policy(&PolicyDraft::new("Group1", Action::Read, "Resource1"))
            .unwrap();
        let new = otter
            .update_policy(&old, &PolicyDraft::new("Group1", Action::Write, "Resource1"))
            .unwrap();

        assert_ne!(new.id, old.id);
        assert_eq!(new.action, Action::Write);
        assert!(matches!(otter.get_policy(&old.id), Err(AuthzError::PolicyNotFound(_))));
        assert_eq!(otter.get_policies(&PolicyFilter::default()).unwrap(), vec![new]);
    }

    #[test]
    fn test_failed_update_keeps_old() {
        let otter = otter();
        let old = otter
            .create_policy(&PolicyDraft::new("Group1", Action::Read, "Resource1"))
            .unwrap();
        let err = otter
            .update_policy(&old, &PolicyDraft::new("Ghost", Action::Read, "Resource1"))
            .unwrap_err();
        assert!(matches!(err, AuthzError::SubjectNotFound(_)));
        assert_eq!(otter.get_policy(&old.id).unwrap(), old);
    }

    #[test]
    fn test_update_requires_old_id() {
        let otter = otter();
        let mut old = otter
            .create_policy(&PolicyDraft::new("Group1", Action::Read, "Resource1"))
            .unwrap();
        old.id.clear();
        let err = otter
            .update_policy(&old, &PolicyDraft::new("Group1", Action::Write, "Resource1"))
            .unwrap_err();
        assert!(matches!(err, AuthzError::PolicyIdRequired));
        assert_eq!(otter.get_policies(&PolicyFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_takes_policy() {
        let otter = otter();
        let p = otter
            .create_policy(&PolicyDraft::new("Group1", Action::Read, "Resource1"))
            .unwrap();
        otter.delete_policy(&p).unwrap();
        assert!(otter.get_policies(&PolicyFilter::default()).unwrap().is_empty());
        otter.delete_policy_by_id(&p.id).unwrap();
    }

    #[test]
    fn test_listings_sorted() {
        let otter = otter();
        let names: Vec<_> = otter.resources().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Resource1", "_"]);
        let names: Vec<_> = otter.subjects().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Group1", "Principal1"]);

        assert!(otter.known_keys().is_empty());
        let root = otter.create_specifier(Specifier::root()).unwrap();
        otter
            .create_specifier_child(Specifier::wildcard("Role"), &root)
            .unwrap();
        assert_eq!(otter.known_keys().into_iter().collect::<Vec<_>>(), vec!["Role"]);
        assert_eq!(
            otter.subject("Principal1"),
            Some(Subject::principal("Principal1"))
        );
        assert!(otter.subject("Nobody").is_none());
    }

    #[test]
    fn test_queries_through_facade() {
        let otter = otter();
        otter
            .create_policy(&PolicyDraft::new("Group1", Action::Read, "Resource1"))
            .unwrap();
        assert!(otter
            .can(&CanQuery::new("Principal1").perform(Action::Read).on("Resource1"))
            .unwrap());
        assert_eq!(
            otter
                .who_can(&WhoCanQuery::new(Action::Read).on("Resource1"))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_shared_across_threads() {
        let otter = std::sync::Arc::new(otter());
        otter
            .create_policy(&PolicyDraft::new("Group1", Action::Read, "Resource1"))
            .unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let otter = otter.clone();
                std::thread::spawn(move || {
                    otter
                        .can(&CanQuery::new("Principal1").perform(Action::Read).on("Resource1"))
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}

use std::collections::{BTreeMap, BTreeSet, HashMap};

use uuid::Uuid;

use crate::authz::errors::AuthzError;
use crate::authz::graph::Graph;
use crate::authz::hierarchy::NodeId;
use crate::authz::types::{Action, Policy, PolicyDraft, PolicyFilter, SpecifierMap, WILDCARD};

/// Stored form of a policy: node ids instead of names. `scopes` holds the
/// action-labelled edges, one specifier node per normalized key.
#[derive(Debug, Clone)]
pub struct PolicyRecord {
    pub id: String,
    pub subject: NodeId,
    pub resource: NodeId,
    pub action: Action,
    pub scopes: BTreeMap<String, NodeId>,
}

impl Graph {
    /// Create a policy. Scopes are normalized against the keys known right
    /// now; keys introduced later are never added to this policy.
    pub fn create_policy(&mut self, draft: &PolicyDraft) -> Result<Policy, AuthzError> {
        let subject = self
            .subject_id(&draft.subject)
            .ok_or_else(|| AuthzError::SubjectNotFound(draft.subject.clone()))?;
        let resource = self
            .resource_id(&draft.resource)
            .ok_or_else(|| AuthzError::ResourceNotFound(draft.resource.clone()))?;
        if draft.specifiers.contains_key(WILDCARD) {
            return Err(AuthzError::InvalidSpecifier(
                "`*` is the root key and cannot scope a policy".into(),
            ));
        }

        let normalized = self.normalize(&draft.specifiers);
        let scopes = normalized
            .iter()
            .map(|(key, value)| {
                self.specifier_id(key, value)
                    .map(|id| (key.clone(), id))
                    .ok_or_else(|| AuthzError::SpecifierNotFound {
                        key: key.clone(),
                        value: value.clone(),
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let id = Uuid::new_v4().to_string();
        let record = PolicyRecord {
            id: id.clone(),
            subject,
            resource,
            action: draft.action,
            scopes,
        };
        self.policies_by_subject
            .entry(subject)
            .or_default()
            .insert(id.clone());
        self.policies_by_resource
            .entry(resource)
            .or_default()
            .insert(id.clone());
        self.policies.insert(id.clone(), record);

        tracing::debug!(
            policy_id = %id,
            subject = %draft.subject,
            resource = %draft.resource,
            action = %draft.action,
            specifiers = ?normalized,
            "created policy"
        );

        self.get_policy(&id)
    }

    /// Policies matching every present axis of `filter`.
    pub fn get_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>, AuthzError> {
        let subject = match &filter.subject {
            Some(name) => match self.subject_id(name) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let resource = match &filter.resource {
            Some(name) => match self.resource_id(name) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let scope_filter = match filter.specifiers.as_ref().filter(|m| !m.is_empty()) {
            Some(raw) => match self.resolve_filter(&self.normalize(raw)) {
                Some(resolved) => Some(resolved),
                // a filter value with no node can never be covered
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut policies = Vec::new();
        for record in self.policies.values() {
            if subject.is_some_and(|s| s != record.subject)
                || resource.is_some_and(|r| r != record.resource)
                || filter.action.is_some_and(|a| a != record.action)
            {
                continue;
            }
            if let Some(resolved) = &scope_filter {
                if !self.covers(&record.scopes, resolved) {
                    continue;
                }
            }
            policies.push(self.materialize(record)?);
        }

        tracing::info!(
            subject = ?filter.subject,
            resource = ?filter.resource,
            action = ?filter.action,
            specifiers = ?filter.specifiers,
            rows = policies.len(),
            "Policy.Get"
        );
        Ok(policies)
    }

    pub fn get_policy(&self, id: &str) -> Result<Policy, AuthzError> {
        if id.is_empty() {
            return Err(AuthzError::PolicyIdRequired);
        }
        let record = self
            .policies
            .get(id)
            .ok_or_else(|| AuthzError::PolicyNotFound(id.to_string()))?;
        self.materialize(record)
    }

    /// Detach and remove a policy. Unknown ids are not an error.
    pub fn delete_policy(&mut self, id: &str) -> Result<(), AuthzError> {
        if id.is_empty() {
            return Err(AuthzError::PolicyIdRequired);
        }
        let Some(record) = self.policies.remove(id) else {
            tracing::debug!(policy_id = id, "delete of unknown policy ignored");
            return Ok(());
        };
        detach(&mut self.policies_by_subject, record.subject, id);
        detach(&mut self.policies_by_resource, record.resource, id);
        tracing::debug!(policy_id = id, "deleted policy");
        Ok(())
    }

    pub(crate) fn policies_of_subject(&self, subject: NodeId) -> impl Iterator<Item = &PolicyRecord> {
        self.policies_by_subject
            .get(&subject)
            .into_iter()
            .flatten()
            .filter_map(|id| self.policies.get(id))
    }

    pub(crate) fn policies_of_resource(&self, resource: NodeId) -> impl Iterator<Item = &PolicyRecord> {
        self.policies_by_resource
            .get(&resource)
            .into_iter()
            .flatten()
            .filter_map(|id| self.policies.get(id))
    }

    /// Turn a record back into names, surfacing dangling ids as `Inconsistent`.
    pub(crate) fn materialize(&self, record: &PolicyRecord) -> Result<Policy, AuthzError> {
        let subject = self.subjects.get(record.subject).ok_or_else(|| {
            AuthzError::Inconsistent(format!("policy `{}` has no subject", record.id))
        })?;
        let resource = self.resources.get(record.resource).ok_or_else(|| {
            AuthzError::Inconsistent(format!("policy `{}` has no resource", record.id))
        })?;
        let specifiers = record
            .scopes
            .iter()
            .map(|(key, node)| {
                self.specifiers
                    .get(*node)
                    .map(|s| (key.clone(), s.value.clone()))
                    .ok_or_else(|| {
                        AuthzError::Inconsistent(format!(
                            "policy `{}` scope `{key}` points nowhere",
                            record.id
                        ))
                    })
            })
            .collect::<Result<SpecifierMap, AuthzError>>()?;

        Ok(Policy {
            id: record.id.clone(),
            subject: subject.clone(),
            resource: resource.clone(),
            action: record.action,
            specifiers,
        })
    }
}

/// Drop `id` from a node's policy set, and the set once it is empty.
fn detach(index: &mut HashMap<NodeId, BTreeSet<String>>, node: NodeId, id: &str) {
    if let Some(ids) = index.get_mut(&node) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(&node);
        }
    }
}

use std::collections::{BTreeSet, HashSet};

use crate::authz::errors::AuthzError;
use crate::authz::graph::{EntityKind, Graph};
use crate::authz::hierarchy::NodeId;
use crate::authz::policy::PolicyRecord;
use crate::authz::product::cartesian_product;
use crate::authz::query::{CanQuery, HowCanQuery, WhatCanQuery, WhoCanQuery};
use crate::authz::types::{Action, Resource, SpecifierMap, Subject};

/// Can `subject` (or one of its groups) perform `action` on `resource` (or
/// one of its ancestors), with the normalized specifiers covered in full?
pub fn can(graph: &Graph, query: &CanQuery) -> Result<bool, AuthzError> {
    let q = query.validate()?;

    let allowed = match (graph.subject_id(q.subject), graph.resource_id(q.resource)) {
        (Some(subject), Some(resource)) => match graph.resolve_filter(&graph.normalize(q.specifiers)) {
            Some(filter) => {
                let resources = graph.index(EntityKind::Resource).ancestors_or_self(resource);
                granting_policies(graph, subject, q.action)
                    .any(|p| resources.contains(&p.resource) && graph.covers(&p.scopes, &filter))
            }
            None => false,
        },
        _ => false,
    };

    tracing::info!(
        subject = q.subject,
        action = %q.action,
        resource = q.resource,
        specifiers = ?q.specifiers,
        allowed,
        "Can"
    );
    Ok(allowed)
}

/// Every subject for which `Can` holds: subjects bound to a matching policy
/// and all of their descendants.
pub fn who_can(graph: &Graph, query: &WhoCanQuery) -> Result<Vec<Subject>, AuthzError> {
    let (action, resource_name) = query.validate()?;

    let mut found = BTreeSet::new();
    if let (Some(resource), Some(filter)) = (
        graph.resource_id(resource_name),
        graph.resolve_filter(&graph.normalize(&query.specifiers)),
    ) {
        for ancestor in graph.index(EntityKind::Resource).ancestors_or_self(resource) {
            for policy in graph.policies_of_resource(ancestor) {
                if policy.action == action && graph.covers(&policy.scopes, &filter) {
                    found.extend(graph.descendants_or_self(EntityKind::Subject, policy.subject));
                }
            }
        }
    }

    let mut subjects: Vec<Subject> = graph
        .subjects()
        .resolve(found, "subject")?
        .into_iter()
        .cloned()
        .collect();
    subjects.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::info!(
        action = %action,
        resource = resource_name,
        specifiers = ?query.specifiers,
        subjects = subjects.len(),
        "WhoCan"
    );
    Ok(subjects)
}

/// Every resource `subject` can act on: resources bound to a matching policy
/// and their descendants, restricted to the subtree of `under` when given.
pub fn what_can(graph: &Graph, query: &WhatCanQuery) -> Result<Vec<Resource>, AuthzError> {
    let (subject_name, action) = query.validate()?;

    let mut found = BTreeSet::new();
    let scope = match &query.under {
        Some(name) => graph.resource_id(name).map(Some),
        None => Some(None),
    };
    if let (Some(subject), Some(filter), Some(under)) = (
        graph.subject_id(subject_name),
        graph.resolve_filter(&graph.normalize(&query.specifiers)),
        scope,
    ) {
        for policy in granting_policies(graph, subject, action) {
            if !graph.covers(&policy.scopes, &filter) {
                continue;
            }
            found.extend(
                graph
                    .descendants_or_self(EntityKind::Resource, policy.resource)
                    .into_iter()
                    .filter(|r| {
                        under.map_or(true, |u| {
                            graph.is_ancestor_or_self(EntityKind::Resource, u, *r)
                        })
                    }),
            );
        }
    }

    let mut resources: Vec<Resource> = graph
        .resources()
        .resolve(found, "resource")?
        .into_iter()
        .cloned()
        .collect();
    resources.sort();

    tracing::info!(
        subject = subject_name,
        action = %action,
        under = ?query.under,
        specifiers = ?query.specifiers,
        resources = resources.len(),
        "WhatCan"
    );
    Ok(resources)
}

/// Enumerate the concrete values of the keys missing from `specifiers` that
/// would satisfy some applicable policy.
///
/// A policy applies when it is bound to an ancestor-or-self of the subject
/// and of the resource, carries `action`, and covers the keys the caller
/// already supplied (only those; the filter is not normalized). Each
/// applicable policy contributes the product of its per-key candidates
/// merged with the supplied keys. A policy with no remaining keys
/// contributes the supplied map itself.
pub fn how_can(graph: &Graph, query: &HowCanQuery) -> Result<Vec<SpecifierMap>, AuthzError> {
    let q = query.validate()?;

    let mut combinations = BTreeSet::new();
    if let (Some(subject), Some(resource), Some(filter)) = (
        graph.subject_id(q.subject),
        graph.resource_id(q.resource),
        graph.resolve_filter(q.specifiers),
    ) {
        let resources = graph.index(EntityKind::Resource).ancestors_or_self(resource);
        for policy in granting_policies(graph, subject, q.action) {
            if !resources.contains(&policy.resource) || !graph.covers(&policy.scopes, &filter) {
                continue;
            }
            combinations.extend(completions(graph, policy, q.specifiers)?);
        }
    }

    let combinations: Vec<SpecifierMap> = combinations.into_iter().collect();
    tracing::info!(
        subject = q.subject,
        action = %q.action,
        resource = q.resource,
        specifiers = ?q.specifiers,
        combinations = combinations.len(),
        "HowCan"
    );
    Ok(combinations)
}

/// Policies carrying `action` bound to `subject` or any group above it.
fn granting_policies(
    graph: &Graph,
    subject: NodeId,
    action: Action,
) -> impl Iterator<Item = &PolicyRecord> {
    let ancestors: HashSet<NodeId> = graph.index(EntityKind::Subject).ancestors_or_self(subject);
    ancestors
        .into_iter()
        .flat_map(move |s| graph.policies_of_subject(s))
        .filter(move |p| p.action == action)
}

fn completions(
    graph: &Graph,
    policy: &PolicyRecord,
    known: &SpecifierMap,
) -> Result<Vec<SpecifierMap>, AuthzError> {
    let mut keys = Vec::new();
    let mut lists = Vec::new();
    for (key, scope) in &policy.scopes {
        if known.contains_key(key) {
            continue;
        }
        keys.push(key.clone());
        lists.push(graph.candidate_values(*scope)?);
    }

    if keys.is_empty() {
        return Ok(vec![known.clone()]);
    }

    Ok(cartesian_product(&lists)
        .into_iter()
        .map(|values| {
            let mut combination = known.clone();
            combination.extend(keys.iter().cloned().zip(values));
            combination
        })
        .collect())
}

//! Specifier trees: one tree per key, each grafted under the `*=*` root
//! through that key's `key=*` wildcard node.

use std::collections::BTreeSet;

use crate::authz::errors::AuthzError;
use crate::authz::graph::{EntityKind, Graph};
use crate::authz::hierarchy::NodeId;
use crate::authz::types::{Specifier, SpecifierMap, WILDCARD};

/// Fill every key of `known_keys` missing from `raw` with the wildcard.
pub fn normalize(raw: &SpecifierMap, known_keys: &BTreeSet<String>) -> SpecifierMap {
    let mut normalized = raw.clone();
    for key in known_keys {
        normalized
            .entry(key.clone())
            .or_insert_with(|| WILDCARD.to_string());
    }
    normalized
}

impl Graph {
    pub fn specifier_id(&self, key: &str, value: &str) -> Option<NodeId> {
        self.specifiers.id(&(key.to_string(), value.to_string()))
    }

    /// Insert a bare specifier node. Duplicates are a conflict, and the
    /// only `*` keyed node allowed is the `*=*` root itself.
    pub fn create_specifier(&mut self, specifier: Specifier) -> Result<Specifier, AuthzError> {
        if specifier.key == WILDCARD && !specifier.is_root() {
            return Err(AuthzError::InvalidSpecifier(format!(
                "`{specifier}`: the `*` key is reserved for the `*=*` root"
            )));
        }
        self.ensure_new_specifier(&specifier)?;
        self.specifiers.insert(specifier.clone());
        tracing::debug!(specifier = %specifier, "created specifier");
        Ok(specifier)
    }

    /// Insert `specifier` as a child of `parent`, which must share its key
    /// or be the universal root.
    pub fn create_specifier_child(
        &mut self,
        specifier: Specifier,
        parent: &Specifier,
    ) -> Result<Specifier, AuthzError> {
        if specifier.key != parent.key && !parent.is_root() {
            return Err(AuthzError::SpecifierKeyMismatch {
                key: specifier.key,
                parent_key: parent.key.clone(),
            });
        }
        if parent.is_root() && specifier.key == WILDCARD {
            return Err(AuthzError::NestedRoot);
        }
        let parent_id = self
            .specifier_id(&parent.key, &parent.value)
            .ok_or_else(|| AuthzError::SpecifierNotFound {
                key: parent.key.clone(),
                value: parent.value.clone(),
            })?;
        self.ensure_new_specifier(&specifier)?;

        let id = self.specifiers.insert(specifier.clone());
        self.specifiers.link(id, parent_id);
        tracing::debug!(specifier = %specifier, parent = %parent, "created specifier");
        Ok(specifier)
    }

    fn ensure_new_specifier(&self, specifier: &Specifier) -> Result<(), AuthzError> {
        if self.specifier_id(&specifier.key, &specifier.value).is_some() {
            return Err(AuthzError::DuplicateSpecifier {
                key: specifier.key.clone(),
                value: specifier.value.clone(),
            });
        }
        Ok(())
    }

    /// Every key carried by some specifier node, the root's `*` excluded.
    pub fn known_keys(&self) -> BTreeSet<String> {
        self.specifiers
            .iter()
            .filter(|s| s.key != WILDCARD)
            .map(|s| s.key.clone())
            .collect()
    }

    pub fn normalize(&self, raw: &SpecifierMap) -> SpecifierMap {
        normalize(raw, &self.known_keys())
    }

    /// True iff `context_value` lies in the subtree of `policy_value` for `key`.
    /// Unknown values are contained in nothing.
    pub fn scope_contains(&self, key: &str, policy_value: &str, context_value: &str) -> bool {
        match (
            self.specifier_id(key, policy_value),
            self.specifier_id(key, context_value),
        ) {
            (Some(scope), Some(ctx)) => {
                self.is_ancestor_or_self(EntityKind::Specifier, scope, ctx)
            }
            _ => false,
        }
    }

    /// Resolve each `(key, value)` of a filter to its node, or `None` if any
    /// pair names a specifier that does not exist.
    pub(crate) fn resolve_filter(&self, filter: &SpecifierMap) -> Option<Vec<(String, NodeId)>> {
        filter
            .iter()
            .map(|(k, v)| self.specifier_id(k, v).map(|id| (k.clone(), id)))
            .collect()
    }

    /// Coverage test: every filter key has a scope on the policy that is an
    /// ancestor-or-self of the filter's node.
    pub(crate) fn covers(
        &self,
        scopes: &std::collections::BTreeMap<String, NodeId>,
        filter: &[(String, NodeId)],
    ) -> bool {
        filter.iter().all(|(key, node)| {
            scopes
                .get(key)
                .is_some_and(|scope| self.is_ancestor_or_self(EntityKind::Specifier, *scope, *node))
        })
    }

    /// Concrete values a scope node admits: the node and its subtree, or for a
    /// wildcard every non-wildcard value of that key. A wildcard over an empty
    /// tree admits only itself.
    pub(crate) fn candidate_values(&self, scope: NodeId) -> Result<Vec<String>, AuthzError> {
        let subtree = self.descendants_or_self(EntityKind::Specifier, scope);
        let nodes = self.specifiers.resolve(subtree, "specifier")?;
        let Some(head) = self.specifiers.get(scope) else {
            return Err(AuthzError::Inconsistent(format!(
                "dangling specifier node #{}",
                scope.index()
            )));
        };

        if !head.is_wildcard() {
            return Ok(nodes.into_iter().map(|s| s.value.clone()).collect());
        }
        let concrete: Vec<String> = nodes
            .into_iter()
            .filter(|s| !s.is_wildcard())
            .map(|s| s.value.clone())
            .collect();
        if concrete.is_empty() {
            Ok(vec![WILDCARD.to_string()])
        } else {
            Ok(concrete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `*=*` -> `Role=*` -> `Role=admin` -> `Role=user`, and `*=*` -> `Env=*` -> {dev, prod}
    fn tree() -> Graph {
        let mut g = Graph::new();
        let root = g.create_specifier(Specifier::root()).unwrap();
        let role = g
            .create_specifier_child(Specifier::wildcard("Role"), &root)
            .unwrap();
        let admin = g
            .create_specifier_child(Specifier::new("Role", "admin"), &role)
            .unwrap();
        g.create_specifier_child(Specifier::new("Role", "user"), &admin)
            .unwrap();
        let env = g
            .create_specifier_child(Specifier::wildcard("Env"), &root)
            .unwrap();
        g.create_specifier_child(Specifier::new("Env", "dev"), &env)
            .unwrap();
        g.create_specifier_child(Specifier::new("Env", "prod"), &env)
            .unwrap();
        g
    }

    #[test]
    fn test_normalize_fills_missing_keys() {
        let known = BTreeSet::from(["Env".to_string(), "Role".to_string()]);
        let raw = SpecifierMap::from([("Role".to_string(), "admin".to_string())]);
        let normalized = normalize(&raw, &known);
        assert_eq!(normalized.get("Role").map(String::as_str), Some("admin"));
        assert_eq!(normalized.get("Env").map(String::as_str), Some("*"));
        assert_eq!(normalized.len(), 2);

        // keys outside the known set are kept as given
        let raw = SpecifierMap::from([("Tier".to_string(), "gold".to_string())]);
        assert_eq!(normalize(&raw, &known).len(), 3);
    }

    #[test]
    fn test_known_keys_excludes_root() {
        let g = tree();
        let keys: Vec<_> = g.known_keys().into_iter().collect();
        assert_eq!(keys, vec!["Env", "Role"]);
    }

    #[test]
    fn test_key_mismatch_rejected() {
        let mut g = tree();
        let err = g
            .create_specifier_child(Specifier::new("Env", "qa"), &Specifier::wildcard("Role"))
            .unwrap_err();
        assert!(matches!(err, AuthzError::SpecifierKeyMismatch { .. }));
    }

    #[test]
    fn test_nested_root_rejected() {
        let mut g = tree();
        let err = g
            .create_specifier_child(Specifier::new("*", "again"), &Specifier::root())
            .unwrap_err();
        assert!(matches!(err, AuthzError::NestedRoot));
    }

    #[test]
    fn test_star_key_reserved_for_root() {
        let mut g = tree();
        assert!(matches!(
            g.create_specifier(Specifier::new("*", "fake")),
            Err(AuthzError::InvalidSpecifier(_))
        ));
        assert!(g.specifier_id("*", "fake").is_none());
    }

    #[test]
    fn test_only_root_accepts_foreign_keys() {
        let mut g = tree();
        // a `*` keyed parent other than `*=*` is just another key
        let err = g
            .create_specifier_child(Specifier::new("Role", "guest"), &Specifier::new("*", "fake"))
            .unwrap_err();
        assert!(matches!(
            err,
            AuthzError::SpecifierKeyMismatch { ref parent_key, .. } if parent_key == "*"
        ));
        assert!(g.specifier_id("Role", "guest").is_none());
    }

    #[test]
    fn test_any_key_under_root() {
        let mut g = tree();
        g.create_specifier_child(Specifier::new("Tier", "gold"), &Specifier::root())
            .unwrap();
        assert!(g.known_keys().contains("Tier"));
    }

    #[test]
    fn test_duplicate_and_missing_parent() {
        let mut g = tree();
        assert!(matches!(
            g.create_specifier(Specifier::new("Role", "admin")),
            Err(AuthzError::DuplicateSpecifier { .. })
        ));
        assert!(matches!(
            g.create_specifier_child(Specifier::new("Zone", "eu"), &Specifier::wildcard("Zone")),
            Err(AuthzError::SpecifierNotFound { .. })
        ));
    }

    #[test]
    fn test_scope_contains() {
        let g = tree();
        // wildcard admits every value of its key
        assert!(g.scope_contains("Role", "*", "admin"));
        assert!(g.scope_contains("Role", "*", "user"));
        // subtree
        assert!(g.scope_contains("Role", "admin", "user"));
        assert!(g.scope_contains("Role", "admin", "admin"));
        // never upward
        assert!(!g.scope_contains("Role", "admin", "*"));
        assert!(!g.scope_contains("Role", "user", "admin"));
        // leaves admit only themselves
        assert!(!g.scope_contains("Env", "dev", "prod"));
        // unknown values
        assert!(!g.scope_contains("Role", "*", "guest"));
    }

    #[test]
    fn test_candidate_values() {
        let g = tree();
        let role_any = g.specifier_id("Role", "*").unwrap();
        let mut values = g.candidate_values(role_any).unwrap();
        values.sort();
        assert_eq!(values, vec!["admin", "user"]);

        let admin = g.specifier_id("Role", "admin").unwrap();
        let mut values = g.candidate_values(admin).unwrap();
        values.sort();
        assert_eq!(values, vec!["admin", "user"]);

        let dev = g.specifier_id("Env", "dev").unwrap();
        assert_eq!(g.candidate_values(dev).unwrap(), vec!["dev"]);
    }

    #[test]
    fn test_candidate_values_empty_wildcard() {
        let mut g = tree();
        g.create_specifier_child(Specifier::wildcard("Zone"), &Specifier::root())
            .unwrap();
        let zone = g.specifier_id("Zone", "*").unwrap();
        assert_eq!(g.candidate_values(zone).unwrap(), vec!["*"]);
    }
}

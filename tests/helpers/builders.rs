use otter::authz::errors::AuthzError;
use otter::authz::types::{Action, Policy, PolicyDraft, Resource, Specifier, Subject, SubjectKind};
use otter::authz::Otter;

/// Builder for creating test subjects
pub struct SubjectBuilder {
    name: String,
    kind: SubjectKind,
    parents: Vec<String>,
}

impl SubjectBuilder {
    pub fn principal(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: SubjectKind::Principal,
            parents: Vec::new(),
        }
    }

    pub fn group(name: &str) -> Self {
        Self {
            kind: SubjectKind::Group,
            ..Self::principal(name)
        }
    }

    pub fn child_of(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }

    pub fn create(self, otter: &Otter) -> Subject {
        let parents: Vec<&str> = self.parents.iter().map(String::as_str).collect();
        otter
            .create_subject(
                Subject {
                    name: self.name,
                    kind: self.kind,
                },
                &parents,
            )
            .expect("Failed to create test subject")
    }
}

/// Builder for creating test resources
pub struct ResourceBuilder {
    name: String,
    parents: Vec<String>,
}

impl ResourceBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parents: Vec::new(),
        }
    }

    pub fn child_of(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }

    pub fn create(self, otter: &Otter) -> Resource {
        let parents: Vec<&str> = self.parents.iter().map(String::as_str).collect();
        otter
            .create_resource(Resource::new(self.name), &parents)
            .expect("Failed to create test resource")
    }
}

/// Builder for one key's specifier tree, grafted under the `*=*` root.
/// The root is created on first use.
pub struct SpecifierTreeBuilder {
    key: String,
    nodes: Vec<(String, String)>,
}

impl SpecifierTreeBuilder {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            nodes: Vec::new(),
        }
    }

    /// Add `value` under the key's wildcard.
    pub fn value(self, value: &str) -> Self {
        self.value_under(value, "*")
    }

    /// Add `value` under an earlier value of the same key.
    pub fn value_under(mut self, value: &str, parent: &str) -> Self {
        self.nodes.push((value.to_string(), parent.to_string()));
        self
    }

    pub fn create(self, otter: &Otter) {
        let root = Specifier::root();
        // an earlier tree may have created it
        match otter.create_specifier(root.clone()) {
            Ok(_) | Err(AuthzError::DuplicateSpecifier { .. }) => {}
            Err(e) => panic!("Failed to create specifier root: {e}"),
        }
        otter
            .create_specifier_child(Specifier::wildcard(self.key.as_str()), &root)
            .expect("Failed to create key wildcard");
        for (value, parent) in self.nodes {
            otter
                .create_specifier_child(
                    Specifier::new(self.key.as_str(), value),
                    &Specifier::new(self.key.as_str(), parent),
                )
                .expect("Failed to create test specifier");
        }
    }
}

/// Builder for creating test policies
pub struct PolicyBuilder {
    draft: PolicyDraft,
}

impl PolicyBuilder {
    pub fn grant(subject: &str, action: Action, resource: &str) -> Self {
        Self {
            draft: PolicyDraft::new(subject, action, resource),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.draft = self.draft.with(key, value);
        self
    }

    pub fn draft(&self) -> &PolicyDraft {
        &self.draft
    }

    pub fn create(self, otter: &Otter) -> Policy {
        otter
            .create_policy(&self.draft)
            .expect("Failed to create test policy")
    }
}

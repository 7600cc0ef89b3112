use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::authz::errors::AuthzError;

/// Value of the wildcard specifier, and the key of the universal root node.
pub const WILDCARD: &str = "*";

/// key -> value attribute map. Ordered so results and logs are deterministic.
pub type SpecifierMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "READ", alias = "Read", alias = "read")]
    Read,
    #[serde(rename = "WRITE", alias = "Write", alias = "write")]
    Write,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "READ",
            Action::Write => "WRITE",
        }
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READ" => Ok(Action::Read),
            "WRITE" => Ok(Action::Write),
            _ => Err(AuthzError::InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubjectKind {
    Principal,
    Group,
}

impl FromStr for SubjectKind {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Principal" => Ok(SubjectKind::Principal),
            "Group" => Ok(SubjectKind::Group),
            _ => Err(AuthzError::InvalidSubjectKind(s.to_string())),
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Principal => f.write_str("Principal"),
            SubjectKind::Group => f.write_str("Group"),
        }
    }
}

/// A requester identity. Names are globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub kind: SubjectKind,
}

impl Subject {
    pub fn principal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SubjectKind::Principal,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SubjectKind::Group,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One attribute node, e.g. `Role=admin`. `*=*` is the universal root and
/// `Role=*` the wildcard of the `Role` tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Specifier {
    pub key: String,
    pub value: String,
}

impl Specifier {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn root() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    pub fn wildcard(key: impl Into<String>) -> Self {
        Self::new(key, WILDCARD)
    }

    pub fn is_root(&self) -> bool {
        self.key == WILDCARD && self.value == WILDCARD
    }

    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Parse a single `key=value` pair as accepted by `--with`.
pub fn parse_specifier_pair(s: &str) -> Result<(String, String), AuthzError> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| AuthzError::InvalidSpecifier(format!("`{s}` (expected key=value)")))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return Err(AuthzError::InvalidSpecifier(format!(
            "`{s}` (key and value must be non-empty)"
        )));
    }
    Ok((key.to_string(), value.to_string()))
}

/// A stored grant of `action` from `subject` to `resource`, scoped by the
/// normalized `specifiers` fixed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub subject: Subject,
    pub resource: Resource,
    pub action: Action,
    #[serde(default)]
    pub specifiers: SpecifierMap,
}

/// Input to `Policy.Create`: subject and resource are referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub subject: String,
    pub resource: String,
    pub action: Action,
    #[serde(default)]
    pub specifiers: SpecifierMap,
}

impl PolicyDraft {
    pub fn new(subject: impl Into<String>, action: Action, resource: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            action,
            specifiers: SpecifierMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.specifiers.insert(key.into(), value.into());
        self
    }
}

/// Filter for `Policy.Get`. Absent fields are unconstrained; an empty
/// specifier map counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFilter {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub specifiers: Option<SpecifierMap>,
}

// ---------- API response types ----------

#[derive(Debug, Serialize, Deserialize)]
pub struct CanResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WhoCanResponse {
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WhatCanResponse {
    pub resources: Vec<Resource>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HowCanResponse {
    pub combinations: Vec<SpecifierMap>,
}

//! Parameters of the four read queries.
//!
//! Each query is an immutable value built with consuming setters (every
//! step returns a modified copy, so call order does not matter) and checked
//! by `validate` before the engine touches the graph. The same structs are
//! the JSON bodies of the HTTP API.

use serde::{Deserialize, Serialize};

use crate::authz::errors::AuthzError;
use crate::authz::types::{Action, SpecifierMap};

/// Can `subject` perform `action` on `resource` with `specifiers`?
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanQuery {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub specifiers: SpecifierMap,
}

/// Validated [`CanQuery`]; also the shape of a validated [`HowCanQuery`].
#[derive(Debug, Clone, Copy)]
pub struct Bound<'q> {
    pub subject: &'q str,
    pub action: Action,
    pub resource: &'q str,
    pub specifiers: &'q SpecifierMap,
}

impl CanQuery {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Default::default()
        }
    }

    pub fn perform(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn on(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with(mut self, specifiers: SpecifierMap) -> Self {
        self.specifiers = specifiers;
        self
    }

    pub fn validate(&self) -> Result<Bound<'_>, AuthzError> {
        Ok(Bound {
            subject: required(&self.subject, "subject")?,
            action: self.action.ok_or(AuthzError::MissingField("action"))?,
            resource: required(&self.resource, "resource")?,
            specifiers: &self.specifiers,
        })
    }
}

/// Which subjects can perform `action` on `resource` with `specifiers`?
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoCanQuery {
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub specifiers: SpecifierMap,
}

impl WhoCanQuery {
    pub fn new(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Default::default()
        }
    }

    pub fn on(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with(mut self, specifiers: SpecifierMap) -> Self {
        self.specifiers = specifiers;
        self
    }

    pub fn validate(&self) -> Result<(Action, &str), AuthzError> {
        Ok((
            self.action.ok_or(AuthzError::MissingField("action"))?,
            required(&self.resource, "resource")?,
        ))
    }
}

/// Which resources under `under` can `subject` perform `action` on?
/// Without `under` every resource is considered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatCanQuery {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub under: Option<String>,
    #[serde(default)]
    pub specifiers: SpecifierMap,
}

impl WhatCanQuery {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Default::default()
        }
    }

    pub fn perform(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn under(mut self, resource: impl Into<String>) -> Self {
        self.under = Some(resource.into());
        self
    }

    pub fn with(mut self, specifiers: SpecifierMap) -> Self {
        self.specifiers = specifiers;
        self
    }

    pub fn validate(&self) -> Result<(&str, Action), AuthzError> {
        Ok((
            required(&self.subject, "subject")?,
            self.action.ok_or(AuthzError::MissingField("action"))?,
        ))
    }
}

/// Which combinations of the remaining specifier keys would let `subject`
/// perform `action` on `resource`, given the `specifiers` already held?
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HowCanQuery {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub specifiers: SpecifierMap,
}

impl HowCanQuery {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Default::default()
        }
    }

    pub fn perform(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn on(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with(mut self, specifiers: SpecifierMap) -> Self {
        self.specifiers = specifiers;
        self
    }

    pub fn validate(&self) -> Result<Bound<'_>, AuthzError> {
        Ok(Bound {
            subject: required(&self.subject, "subject")?,
            action: self.action.ok_or(AuthzError::MissingField("action"))?,
            resource: required(&self.resource, "resource")?,
            specifiers: &self.specifiers,
        })
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, AuthzError> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AuthzError::MissingField(name)),
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    // ---------- validation ----------
    #[error("Incomplete query: `{0}` must be set")]
    #[diagnostic(
        code(otter::authz::missing_field),
        help("Can and HowCan need subject, action and resource; WhoCan needs action and resource; WhatCan needs subject and action")
    )]
    MissingField(&'static str),

    #[error("Policy ID is required")]
    #[diagnostic(code(otter::authz::policy_id_required))]
    PolicyIdRequired,

    #[error("Invalid action `{0}`")]
    #[diagnostic(code(otter::authz::invalid_action), help("Supported actions: READ, WRITE"))]
    InvalidAction(String),

    #[error("Invalid subject kind `{0}`")]
    #[diagnostic(
        code(otter::authz::invalid_subject_kind),
        help("Supported subject kinds: Principal, Group")
    )]
    InvalidSubjectKind(String),

    #[error("Invalid specifier {0}")]
    #[diagnostic(
        code(otter::authz::invalid_specifier),
        help("Specifiers are key=value pairs; `*` is reserved as the root key")
    )]
    InvalidSpecifier(String),

    // ---------- referential ----------
    #[error("Subject `{0}` not found")]
    #[diagnostic(code(otter::authz::subject_not_found))]
    SubjectNotFound(String),

    #[error("Resource `{0}` not found")]
    #[diagnostic(code(otter::authz::resource_not_found))]
    ResourceNotFound(String),

    #[error("Specifier `{key}={value}` not found")]
    #[diagnostic(
        code(otter::authz::specifier_not_found),
        help("Create the specifier (and its key's `*` wildcard node) before referencing it")
    )]
    SpecifierNotFound { key: String, value: String },

    #[error("Policy `{0}` not found")]
    #[diagnostic(code(otter::authz::policy_not_found))]
    PolicyNotFound(String),

    // ---------- invariants ----------
    #[error("Cannot create `{child}` under `{parent}`: only Group subjects can have children")]
    #[diagnostic(code(otter::authz::parent_not_group))]
    ParentNotGroup { child: String, parent: String },

    #[error("Cannot create child specifier with key `{key}` under key `{parent_key}`")]
    #[diagnostic(
        code(otter::authz::specifier_key_mismatch),
        help("A specifier's parent must share its key, or be the `*=*` root")
    )]
    SpecifierKeyMismatch { key: String, parent_key: String },

    #[error("Cannot create a `*` keyed specifier under the `*=*` root")]
    #[diagnostic(code(otter::authz::nested_root))]
    NestedRoot,

    // ---------- conflicts ----------
    #[error("Subject `{0}` already exists")]
    #[diagnostic(code(otter::authz::duplicate_subject))]
    DuplicateSubject(String),

    #[error("Resource `{0}` already exists")]
    #[diagnostic(code(otter::authz::duplicate_resource))]
    DuplicateResource(String),

    #[error("Specifier `{key}={value}` already exists")]
    #[diagnostic(code(otter::authz::duplicate_specifier))]
    DuplicateSpecifier { key: String, value: String },

    // ---------- internal ----------
    #[error("Inconsistent graph state: {0}")]
    #[diagnostic(code(otter::authz::inconsistent))]
    Inconsistent(String),

    // ---------- fixtures ----------
    #[error("Failed to load fixture file `{path}`")]
    #[diagnostic(
        code(otter::authz::fixture_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    FixtureLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fixture: {0}")]
    #[diagnostic(
        code(otter::authz::invalid_fixture),
        help("Fixture files contain `subject`, `resource`, `specifier` and `policy` KDL nodes")
    )]
    InvalidFixture(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(otter::authz::kdl_parse),
        help("Check your KDL file syntax, see https://kdl.dev for the specification")
    )]
    KdlParse(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(otter::authz::io))]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthzError::MissingField(_)
            | AuthzError::PolicyIdRequired
            | AuthzError::InvalidAction(_)
            | AuthzError::InvalidSubjectKind(_)
            | AuthzError::InvalidSpecifier(_)
            | AuthzError::InvalidFixture(_)
            | AuthzError::KdlParse(_) => StatusCode::BAD_REQUEST,
            AuthzError::SubjectNotFound(_)
            | AuthzError::ResourceNotFound(_)
            | AuthzError::SpecifierNotFound { .. }
            | AuthzError::PolicyNotFound(_) => StatusCode::NOT_FOUND,
            AuthzError::ParentNotGroup { .. }
            | AuthzError::SpecifierKeyMismatch { .. }
            | AuthzError::NestedRoot => StatusCode::UNPROCESSABLE_ENTITY,
            AuthzError::DuplicateSubject(_)
            | AuthzError::DuplicateResource(_)
            | AuthzError::DuplicateSpecifier { .. } => StatusCode::CONFLICT,
            AuthzError::Inconsistent(_) | AuthzError::FixtureLoad { .. } | AuthzError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "authz request failed");
        }
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthzError::MissingField("subject").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthzError::PolicyNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AuthzError::NestedRoot.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            AuthzError::DuplicateSubject("g".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthzError::Inconsistent("dangling".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        let err = AuthzError::ParentNotGroup {
            child: "Principal9".into(),
            parent: "Principal1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot create `Principal9` under `Principal1`: only Group subjects can have children"
        );
        let err = AuthzError::SpecifierNotFound {
            key: "Role".into(),
            value: "*".into(),
        };
        assert_eq!(err.to_string(), "Specifier `Role=*` not found");
    }
}

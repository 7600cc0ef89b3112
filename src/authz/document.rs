use kdl::{KdlDocument, KdlNode};

use crate::authz::errors::AuthzError;
use crate::authz::types::{Action, PolicyDraft, Resource, Specifier, Subject, SubjectKind};

/// One top-level node of a fixture document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Subject {
        subject: Subject,
        parents: Vec<String>,
    },
    Resource {
        resource: Resource,
        parents: Vec<String>,
    },
    Specifier {
        specifier: Specifier,
        parent: Option<Specifier>,
    },
    Policy(PolicyDraft),
}

/// Parse a KDL fixture document into its declarations.
pub fn parse_kdl_document(source: &str) -> Result<Vec<Declaration>, AuthzError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AuthzError::KdlParse(e.to_string()))?;

    let mut declarations = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "subject" => {
                let name = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidFixture(
                        "subject node requires a name (e.g. subject \"Group1\" kind=\"Group\")"
                            .into(),
                    )
                })?;
                let kind = match string_prop(node, "kind") {
                    Some(kind) => kind.parse::<SubjectKind>()?,
                    None => SubjectKind::Principal,
                };
                let parents = parent_names(node, "subject", &name)?;
                declarations.push(Declaration::Subject {
                    subject: Subject { name, kind },
                    parents,
                });
            }
            "resource" => {
                let name = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidFixture(
                        "resource node requires a name (e.g. resource \"Resource1\")".into(),
                    )
                })?;
                let parents = parent_names(node, "resource", &name)?;
                declarations.push(Declaration::Resource {
                    resource: Resource::new(name),
                    parents,
                });
            }
            "specifier" => {
                let specifier = key_value(node).ok_or_else(|| {
                    AuthzError::InvalidFixture(
                        "specifier node requires a key and a value (e.g. specifier \"Role\" \"admin\")"
                            .into(),
                    )
                })?;

                let mut parent = None;
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        match child.name().value() {
                            "parent" if parent.is_none() => {
                                parent = Some(key_value(child).ok_or_else(|| {
                                    AuthzError::InvalidFixture(format!(
                                        "parent of specifier `{specifier}` requires a key and a value"
                                    ))
                                })?);
                            }
                            "parent" => {
                                return Err(AuthzError::InvalidFixture(format!(
                                    "specifier `{specifier}` has more than one parent"
                                )));
                            }
                            other => {
                                return Err(AuthzError::InvalidFixture(format!(
                                    "unexpected child `{other}` in specifier `{specifier}` (expected `parent`)"
                                )));
                            }
                        }
                    }
                }

                declarations.push(Declaration::Specifier { specifier, parent });
            }
            "policy" => {
                let subject = string_prop(node, "subject").ok_or_else(|| {
                    AuthzError::InvalidFixture("policy missing `subject` property".into())
                })?;
                let resource = string_prop(node, "resource").ok_or_else(|| {
                    AuthzError::InvalidFixture(format!(
                        "policy for `{subject}` missing `resource` property"
                    ))
                })?;
                let action = string_prop(node, "action")
                    .ok_or_else(|| {
                        AuthzError::InvalidFixture(format!(
                            "policy `{subject}` -> `{resource}` missing `action` property (READ or WRITE)"
                        ))
                    })?
                    .parse::<Action>()?;

                let mut draft = PolicyDraft::new(subject, action, resource);
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        match child.name().value() {
                            "with" => {
                                let pair = key_value(child).ok_or_else(|| {
                                    AuthzError::InvalidFixture(format!(
                                        "`with` in policy `{}` -> `{}` requires a key and a value",
                                        draft.subject, draft.resource
                                    ))
                                })?;
                                draft = draft.with(pair.key, pair.value);
                            }
                            other => {
                                return Err(AuthzError::InvalidFixture(format!(
                                    "unexpected child `{other}` in policy (expected `with`)"
                                )));
                            }
                        }
                    }
                }

                declarations.push(Declaration::Policy(draft));
            }
            other => {
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(declarations)
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &KdlNode) -> Option<String> {
    string_args(node).into_iter().next()
}

fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// `node "key" "value"`
fn key_value(node: &KdlNode) -> Option<Specifier> {
    match string_args(node).as_slice() {
        [key, value] => Some(Specifier::new(key.as_str(), value.as_str())),
        _ => None,
    }
}

/// Names from `parent "NAME"` children.
fn parent_names(node: &KdlNode, what: &str, name: &str) -> Result<Vec<String>, AuthzError> {
    let Some(children) = node.children() else {
        return Ok(Vec::new());
    };
    children
        .nodes()
        .iter()
        .map(|child| match child.name().value() {
            "parent" => first_string_arg(child).ok_or_else(|| {
                AuthzError::InvalidFixture(format!("parent of {what} `{name}` requires a name"))
            }),
            other => Err(AuthzError::InvalidFixture(format!(
                "unexpected child `{other}` in {what} `{name}` (expected `parent`)"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entities() {
        let kdl = r#"
subject "Group2" kind="Group"
subject "Group1" kind="Group" {
    parent "Group2"
}
subject "Principal1" {
    parent "Group1"
}
resource "_"
resource "Resource1" {
    parent "_"
}
"#;
        let decls = parse_kdl_document(kdl).unwrap();
        assert_eq!(decls.len(), 5);
        assert_eq!(
            decls[1],
            Declaration::Subject {
                subject: Subject::group("Group1"),
                parents: vec!["Group2".into()],
            }
        );
        // kind defaults to Principal
        assert_eq!(
            decls[2],
            Declaration::Subject {
                subject: Subject::principal("Principal1"),
                parents: vec!["Group1".into()],
            }
        );
        assert_eq!(
            decls[4],
            Declaration::Resource {
                resource: Resource::new("Resource1"),
                parents: vec!["_".into()],
            }
        );
    }

    #[test]
    fn test_parse_specifiers_and_policy() {
        let kdl = r#"
specifier "*" "*"
specifier "Role" "*" {
    parent "*" "*"
}
policy subject="Principal3" resource="_" action="READ" {
    with "Role" "admin"
}
"#;
        let decls = parse_kdl_document(kdl).unwrap();
        assert_eq!(
            decls[0],
            Declaration::Specifier {
                specifier: Specifier::root(),
                parent: None,
            }
        );
        assert_eq!(
            decls[1],
            Declaration::Specifier {
                specifier: Specifier::wildcard("Role"),
                parent: Some(Specifier::root()),
            }
        );
        assert_eq!(
            decls[2],
            Declaration::Policy(PolicyDraft::new("Principal3", Action::Read, "_").with("Role", "admin"))
        );
    }

    #[test]
    fn test_unknown_nodes_skipped() {
        let decls = parse_kdl_document("comment \"hello\"\nresource \"_\"").unwrap();
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            parse_kdl_document("subject {"),
            Err(AuthzError::KdlParse(_))
        ));
        assert!(matches!(
            parse_kdl_document("subject kind=\"Group\""),
            Err(AuthzError::InvalidFixture(_))
        ));
        assert!(matches!(
            parse_kdl_document("subject \"x\" kind=\"Robot\""),
            Err(AuthzError::InvalidSubjectKind(_))
        ));
        assert!(matches!(
            parse_kdl_document("specifier \"Role\""),
            Err(AuthzError::InvalidFixture(_))
        ));
        assert!(matches!(
            parse_kdl_document("specifier \"Role\" \"a\" {\n parent \"Role\" \"*\"\n parent \"*\" \"*\"\n}"),
            Err(AuthzError::InvalidFixture(_))
        ));
        assert!(matches!(
            parse_kdl_document("policy subject=\"a\" resource=\"b\" action=\"DELETE\""),
            Err(AuthzError::InvalidAction(_))
        ));
        assert!(matches!(
            parse_kdl_document("policy subject=\"a\" resource=\"b\""),
            Err(AuthzError::InvalidFixture(_))
        ));
        assert!(matches!(
            parse_kdl_document("resource \"r\" {\n owner \"x\"\n}"),
            Err(AuthzError::InvalidFixture(_))
        ));
    }
}

use std::path::Path;

use crate::authz::document::{parse_kdl_document, Declaration};
use crate::authz::errors::AuthzError;
use crate::authz::graph::Graph;

/// Load every `.kdl` fixture file in `dir`, sorted by path, into a fresh
/// graph. Declarations apply in order; the first failure aborts the load.
pub fn load_fixtures(dir: &Path) -> Result<Graph, AuthzError> {
    if !dir.is_dir() {
        return Err(AuthzError::InvalidFixture(format!(
            "fixtures directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    let mut graph = Graph::new();
    let mut file_count = 0;

    for entry in entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| AuthzError::FixtureLoad {
                path: path.display().to_string(),
                source,
            })?;
        apply(&mut graph, parse_kdl_document(&contents)?)?;
        file_count += 1;
    }

    tracing::info!(
        files = file_count,
        subjects = graph.subjects().len(),
        resources = graph.resources().len(),
        specifiers = graph.specifiers().len(),
        policies = graph.policy_count(),
        "Loaded fixtures"
    );

    Ok(graph)
}

/// Run each declaration through the regular creation operations.
pub fn apply(graph: &mut Graph, declarations: Vec<Declaration>) -> Result<(), AuthzError> {
    for declaration in declarations {
        match declaration {
            Declaration::Subject { subject, parents } => {
                let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
                graph.create_subject(subject, &parents)?;
            }
            Declaration::Resource { resource, parents } => {
                let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
                graph.create_resource(resource, &parents)?;
            }
            Declaration::Specifier {
                specifier,
                parent: Some(parent),
            } => {
                graph.create_specifier_child(specifier, &parent)?;
            }
            Declaration::Specifier {
                specifier,
                parent: None,
            } => {
                graph.create_specifier(specifier)?;
            }
            Declaration::Policy(draft) => {
                graph.create_policy(&draft)?;
            }
        }
    }
    Ok(())
}

pub mod builders;

pub use builders::{PolicyBuilder, ResourceBuilder, SpecifierTreeBuilder, SubjectBuilder};

use std::path::PathBuf;

use otter::authz::loader::load_fixtures;
use otter::authz::types::SpecifierMap;
use otter::authz::Otter;

/// The graph described by `fixtures/reference.kdl`.
pub fn reference_otter() -> Otter {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    Otter::from_graph(load_fixtures(&dir).expect("Failed to load reference fixtures"))
}

pub fn specs(pairs: &[(&str, &str)]) -> SpecifierMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

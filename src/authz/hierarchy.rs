//! Parent-pointer graph over integer node ids.
//!
//! Each entity kind (subjects, resources, specifiers) owns one index. Nodes
//! may have several parents, so the structure is a DAG in general; cycles
//! are tolerated by every traversal through a visited set.

use std::collections::{BTreeSet, HashSet, VecDeque};

/// Arena slot of a node inside one [`HierarchyIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn dangling_for_tests() -> Self {
        NodeId(usize::MAX)
    }
}

#[derive(Debug, Clone, Default)]
struct Links {
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    links: Vec<Links>,
}

impl HierarchyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a detached node.
    pub fn add_node(&mut self) -> NodeId {
        self.links.push(Links::default());
        NodeId(self.links.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.links.len()
    }

    /// Record `child -[ChildOf]-> parent`. Repeated edges are stored once.
    pub fn link(&mut self, child: NodeId, parent: NodeId) {
        if self.links[child.0].parents.contains(&parent) {
            return;
        }
        self.links[child.0].parents.push(parent);
        self.links[parent.0].children.push(child);
    }

    pub fn parents(&self, node: NodeId) -> &[NodeId] {
        &self.links[node.0].parents
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.links[node.0].children
    }

    /// True iff `ancestor == node` or a `ChildOf` path leads from `node` to `ancestor`.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        if ancestor == node {
            return true;
        }
        self.walk(node, |links| &links.parents)
            .into_iter()
            .any(|n| n == ancestor)
    }

    pub fn ancestors_or_self(&self, node: NodeId) -> HashSet<NodeId> {
        self.walk(node, |links| &links.parents).into_iter().collect()
    }

    /// `node` plus everything reachable by following `ChildOf` edges backward.
    pub fn descendants_or_self(&self, node: NodeId) -> BTreeSet<NodeId> {
        self.walk(node, |links| &links.children).into_iter().collect()
    }

    /// Breadth-first closure in one direction, `start` included.
    fn walk<'a>(&'a self, start: NodeId, next: impl Fn(&'a Links) -> &'a Vec<NodeId>) -> Vec<NodeId> {
        let mut seen = HashSet::from([start]);
        let mut order = vec![start];
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for &n in next(&self.links[current.0]) {
                if seen.insert(n) {
                    order.push(n);
                    queue.push_back(n);
                }
            }
        }

        order
    }
}

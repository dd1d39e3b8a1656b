//! Per-statement graph under construction
//!
//! An append-only arena of operation specs. Nodes are addressed by
//! [`NodeIndex`] until the assembler assigns graph-wide ids, and edges are
//! index pairs kept in the order they were wired.

use crate::graph::operation::OperationSpec;

/// Position of a node within one [`Subgraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Nodes and edges of one statement's pipeline
#[derive(Debug, Clone, Default)]
pub struct Subgraph {
    nodes: Vec<OperationSpec>,
    edges: Vec<(NodeIndex, NodeIndex)>,
}

impl Subgraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node without parents
    pub fn add_source(&mut self, spec: OperationSpec) -> NodeIndex {
        self.push(spec)
    }

    /// Append a node wired below `parent`
    pub fn add(&mut self, spec: OperationSpec, parent: NodeIndex) -> NodeIndex {
        self.add_with_parents(spec, &[parent])
    }

    /// Append a node wired below each of `parents`, edges in slice order
    pub fn add_with_parents(&mut self, spec: OperationSpec, parents: &[NodeIndex]) -> NodeIndex {
        let child = self.push(spec);
        self.edges
            .extend(parents.iter().map(|&parent| (parent, child)));
        child
    }

    fn push(&mut self, spec: OperationSpec) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(spec);
        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: NodeIndex) -> Option<&OperationSpec> {
        self.nodes.get(index.0)
    }

    pub fn nodes(&self) -> &[OperationSpec] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(NodeIndex, NodeIndex)] {
        &self.edges
    }

    /// Consume into nodes and index edges
    pub fn into_parts(self) -> (Vec<OperationSpec>, Vec<(NodeIndex, NodeIndex)>) {
        (self.nodes, self.edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::operation::{GroupSpec, RangeSpec, YieldSpec};

    #[test]
    fn test_edges_follow_construction_order() {
        let mut sub = Subgraph::new();
        let range = sub.add_source(OperationSpec::Range(RangeSpec::new(0, 1)));
        let a = sub.add(OperationSpec::Group(GroupSpec { by: vec![] }), range);
        let b = sub.add(OperationSpec::Group(GroupSpec { by: vec![] }), range);
        let out = sub.add_with_parents(
            OperationSpec::Yield(YieldSpec { name: "0".into() }),
            &[b, a],
        );

        assert_eq!(sub.len(), 4);
        assert_eq!(
            sub.edges(),
            &[(range, a), (range, b), (b, out), (a, out)]
        );
        assert_eq!(out.index(), 3);
        assert!(sub.get(out).is_some());
        assert!(sub.get(NodeIndex(9)).is_none());
    }
}
